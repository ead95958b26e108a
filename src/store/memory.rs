//! In-memory store. Evaluates predicates with the same three-valued logic the SQL backend gets.

use super::{Row, Store};
use crate::config::{ColumnType, ModelDescriptor};
use crate::error::StoreError;
use crate::predicate::coerce_cell;
use crate::predicate::eval::compare;
use crate::query::{AssembledQuery, Projection};
use crate::spec::Direction;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use tokio::sync::RwLock;

type Table = Vec<Map<String, Value>>;

/// Tables keyed by lowercased model name. Every call takes the lock once, so mutations are
/// all-or-nothing.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Table>>,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore::default()
    }

    /// Seed a table. Non-object values are skipped.
    pub fn with_rows(mut self, model: &str, rows: Vec<Value>) -> Self {
        let table = self.tables.get_mut().entry(model.to_lowercase()).or_default();
        table.extend(rows.into_iter().filter_map(|r| match r {
            Value::Object(m) => Some(m),
            _ => None,
        }));
        self
    }

    /// Snapshot of a table's rows.
    pub async fn rows(&self, model: &str) -> Table {
        self.tables
            .read()
            .await
            .get(&model.to_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    /// Number of `Store` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

fn key(model: &ModelDescriptor) -> String {
    model.name.to_lowercase()
}

/// Payload cells in their column's canonical form; timestamps compare as text afterwards.
fn coerce_payload(model: &ModelDescriptor, payload: &Map<String, Value>) -> Result<Map<String, Value>, StoreError> {
    payload
        .iter()
        .map(|(k, v)| {
            let column = model
                .column(k)
                .ok_or_else(|| StoreError::Backend(format!("column \"{}\" does not exist", k)))?;
            let v = coerce_cell(k, column.type_, v)
                .map_err(|_| StoreError::Backend(format!("invalid input value for column \"{}\": {}", k, v)))?;
            Ok((k.clone(), v))
        })
        .collect()
}

fn matches(query: &AssembledQuery, row: &Map<String, Value>) -> bool {
    query.predicate.as_ref().map_or(true, |p| p.matches(row))
}

/// NULLs sort last ascending and first descending, as PostgreSQL does.
fn order_rows(rows: &mut [Map<String, Value>], field: &str, direction: Direction) {
    rows.sort_by(|a, b| {
        let x = a.get(field).filter(|v| !v.is_null());
        let y = b.get(field).filter(|v| !v.is_null());
        let ord = match (x, y) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => compare(x, y).unwrap_or(Ordering::Equal),
        };
        match direction {
            Direction::Asc => ord,
            Direction::Desc => ord.reverse(),
        }
    });
}

/// All result rows, ignoring the limit.
fn evaluate(query: &AssembledQuery, table: &[Map<String, Value>]) -> Vec<Row> {
    let mut hits: Table = table.iter().filter(|r| matches(query, r)).cloned().collect();
    match &query.projection {
        Projection::Rows => {
            if let Some(o) = &query.order_by {
                order_rows(&mut hits, &o.field, o.direction);
            }
            let columns: Vec<&str> = query.model.column_names().collect();
            hits.into_iter()
                .map(|r| {
                    let entity = columns
                        .iter()
                        .map(|c| (c.to_string(), r.get(*c).cloned().unwrap_or(Value::Null)))
                        .collect();
                    Row::Entity(entity)
                })
                .collect()
        }
        Projection::Grouped { keys, count, .. } => {
            // first-seen order of groups
            let mut groups: Vec<(Vec<Value>, i64)> = Vec::new();
            for r in &hits {
                let k: Vec<Value> = keys.iter().map(|c| r.get(c).cloned().unwrap_or(Value::Null)).collect();
                let counted = count
                    .as_ref()
                    .map_or(0, |c| i64::from(r.get(c).map_or(false, |v| !v.is_null())));
                match groups.iter_mut().find(|(gk, _)| *gk == k) {
                    Some((_, n)) => *n += counted,
                    None => groups.push((k, counted)),
                }
            }
            groups
                .into_iter()
                .map(|(k, n)| {
                    let mut tuple = Vec::with_capacity(k.len() + 1);
                    if count.is_some() {
                        tuple.push(Value::from(n));
                    }
                    tuple.extend(k);
                    Row::Tuple(tuple)
                })
                .collect()
        }
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn fetch(&self, query: &AssembledQuery) -> Result<Vec<Row>, StoreError> {
        self.tick();
        let tables = self.tables.read().await;
        let table = tables.get(&key(&query.model)).map(Vec::as_slice).unwrap_or(&[]);
        let mut rows = evaluate(query, table);
        if let Some(n) = query.limit {
            rows.truncate(n as usize);
        }
        Ok(rows)
    }

    async fn count(&self, query: &AssembledQuery) -> Result<u64, StoreError> {
        self.tick();
        let tables = self.tables.read().await;
        let table = tables.get(&key(&query.model)).map(Vec::as_slice).unwrap_or(&[]);
        Ok(evaluate(query, table).len() as u64)
    }

    async fn insert(&self, model: &ModelDescriptor, payload: &Map<String, Value>) -> Result<Option<Value>, StoreError> {
        self.tick();
        let payload = coerce_payload(model, payload)?;
        let mut tables = self.tables.write().await;
        let table = tables.entry(key(model)).or_default();
        let mut row: Map<String, Value> = model
            .columns
            .iter()
            .map(|c| (c.name.clone(), payload.get(&c.name).cloned().unwrap_or(Value::Null)))
            .collect();

        let id = match &model.primary_key {
            Some(pk) => {
                let current = row.get(pk).cloned().unwrap_or(Value::Null);
                let id = if current.is_null() && model.column(pk).map(|c| c.type_) == Some(ColumnType::Integer) {
                    let next = table
                        .iter()
                        .filter_map(|r| r.get(pk).and_then(Value::as_i64))
                        .max()
                        .unwrap_or(0)
                        + 1;
                    Value::from(next)
                } else {
                    current
                };
                if !id.is_null() && table.iter().any(|r| r.get(pk) == Some(&id)) {
                    return Err(StoreError::Backend(format!("duplicate key value for \"{}\"", pk)));
                }
                row.insert(pk.clone(), id.clone());
                Some(id)
            }
            None => None,
        };
        table.push(row);
        Ok(id)
    }

    async fn update(&self, query: &AssembledQuery, payload: &Map<String, Value>) -> Result<u64, StoreError> {
        self.tick();
        if payload.is_empty() {
            return Ok(0);
        }
        let payload = coerce_payload(&query.model, payload)?;
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&key(&query.model)) else {
            return Ok(0);
        };
        let mut changed = 0;
        for row in table.iter_mut().filter(|r| matches(query, r)) {
            for (k, v) in &payload {
                row.insert(k.clone(), v.clone());
            }
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete(&self, query: &AssembledQuery) -> Result<u64, StoreError> {
        self.tick();
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&key(&query.model)) else {
            return Ok(0);
        };
        let before = table.len();
        table.retain(|r| !matches(query, r));
        Ok((before - table.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelRegistry;
    use crate::predicate::{compile, TreePolicy};
    use crate::query::assemble;
    use crate::spec::{FilterTriple, GroupField, GroupOp, OrderBy};
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::new().with_rows(
            "dbblacklist",
            vec![
                json!({"id": 1, "datatype": "ip", "datavalue": "10.0.0.1", "date_added": null}),
                json!({"id": 2, "datatype": "ip", "datavalue": "10.0.0.2", "date_added": null}),
                json!({"id": 3, "datatype": "domain", "datavalue": "bad.example", "date_added": null}),
                json!({"id": 4, "datatype": null, "datavalue": "x", "date_added": null}),
            ],
        )
    }

    fn query(filters: &[FilterTriple], group: &[GroupField], order: Option<&OrderBy>) -> AssembledQuery {
        let m = ModelRegistry::builtin().unwrap().resolve("dbblacklist");
        let c = compile(&m, filters, None, TreePolicy::Strict).unwrap();
        assemble(m, c.predicate, group, order).unwrap()
    }

    #[tokio::test]
    async fn grouped_counts_skip_nulls() {
        let s = store();
        let q = query(&[], &[GroupField::new("datatype", GroupOp::Count)], None);
        let rows = s.fetch(&q).await.unwrap();
        assert_eq!(
            rows,
            vec![
                Row::Tuple(vec![json!(2), json!("ip")]),
                Row::Tuple(vec![json!(1), json!("domain")]),
                Row::Tuple(vec![json!(0), Value::Null]),
            ]
        );
        assert_eq!(s.count(&q).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn ordering_and_limit() {
        let s = store();
        let order = OrderBy {
            field: "id".into(),
            direction: Direction::Desc,
        };
        let q = query(&[FilterTriple::new("datatype", "eq", "ip")], &[], Some(&order)).with_limit(Some(1));
        let rows = s.fetch(&q).await.unwrap();
        assert_eq!(rows.len(), 1);
        match &rows[0] {
            Row::Entity(m) => assert_eq!(m["id"], json!(2)),
            Row::Tuple(_) => panic!("expected entity"),
        }
        assert_eq!(s.count(&q).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn insert_assigns_next_id_and_delete_removes_matches() {
        let s = store();
        let m = ModelRegistry::builtin().unwrap().resolve("dbblacklist");
        let mut payload = Map::new();
        payload.insert("datatype".into(), json!("ip"));
        let id = s.insert(&m, &payload).await.unwrap();
        assert_eq!(id, Some(json!(5)));

        let q = query(&[FilterTriple::new("datatype", "eq", "ip")], &[], None);
        assert_eq!(s.delete(&q).await.unwrap(), 3);
        assert_eq!(s.rows("dbblacklist").await.len(), 2);
        assert_eq!(s.calls(), 2);
    }

    #[tokio::test]
    async fn written_timestamps_compare_with_filter_values() {
        let s = MemoryStore::new();
        let m = ModelRegistry::builtin().unwrap().resolve("dbblacklist");
        let mut payload = Map::new();
        payload.insert("datatype".into(), json!("ip"));
        payload.insert("date_added".into(), json!("2024-01-01 10:00:00"));
        s.insert(&m, &payload).await.unwrap();

        let later = query(&[FilterTriple::new("date_added", "gt", "2024-01-01 09:00:00")], &[], None);
        assert_eq!(s.count(&later).await.unwrap(), 1);

        let mut moved = Map::new();
        moved.insert("date_added".into(), json!("2023-12-31 23:00:00"));
        assert_eq!(s.update(&later, &moved).await.unwrap(), 1);
        assert_eq!(s.count(&later).await.unwrap(), 0);

        payload.insert("date_added".into(), json!("yesterday"));
        assert!(s.insert(&m, &payload).await.is_err());
    }
}
