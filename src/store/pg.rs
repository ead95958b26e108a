//! PostgreSQL store over a sqlx pool.

use super::{Row, Store};
use crate::config::ModelDescriptor;
use crate::error::StoreError;
use crate::query::AssembledQuery;
use crate::sql::{self, QueryBuf};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgPool, Postgres};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn bind_all(q: &QueryBuf) -> Query<'_, Postgres, PgArguments> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

#[async_trait]
impl Store for PgStore {
    async fn fetch(&self, query: &AssembledQuery) -> Result<Vec<Row>, StoreError> {
        let q = sql::select(query);
        let rows = bind_all(&q).fetch_all(&self.pool).await?;
        let grouped = query.is_grouped();
        Ok(rows
            .iter()
            .map(|r| if grouped { Row::Tuple(row_to_tuple(r)) } else { Row::Entity(row_to_map(r)) })
            .collect())
    }

    async fn count(&self, query: &AssembledQuery) -> Result<u64, StoreError> {
        let q = sql::count(query);
        tracing::debug!(sql = %q.sql, params = ?q.params, "count");
        let mut scalar = sqlx::query_scalar::<_, i64>(&q.sql);
        for p in &q.params {
            scalar = scalar.bind(p.clone());
        }
        let n = scalar.fetch_one(&self.pool).await?;
        Ok(n.max(0) as u64)
    }

    async fn insert(&self, model: &ModelDescriptor, payload: &Map<String, Value>) -> Result<Option<Value>, StoreError> {
        let q = sql::insert(model, payload);
        let mut tx = self.pool.begin().await?;
        let id = if model.primary_key.is_some() {
            let row = bind_all(&q).fetch_optional(&mut *tx).await?;
            row.map(|r| cell_to_value(&r, 0))
        } else {
            bind_all(&q).execute(&mut *tx).await?;
            None
        };
        tx.commit().await?;
        Ok(id)
    }

    async fn update(&self, query: &AssembledQuery, payload: &Map<String, Value>) -> Result<u64, StoreError> {
        if payload.is_empty() {
            return Ok(0);
        }
        let q = sql::update(query, payload);
        let mut tx = self.pool.begin().await?;
        let done = bind_all(&q).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(done.rows_affected())
    }

    async fn delete(&self, query: &AssembledQuery) -> Result<u64, StoreError> {
        let q = sql::delete(query);
        let mut tx = self.pool.begin().await?;
        let done = bind_all(&q).execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(done.rows_affected())
    }
}

fn row_to_map(row: &PgRow) -> Map<String, Value> {
    use sqlx::{Column, Row as _};
    row.columns()
        .iter()
        .map(|col| (col.name().to_string(), cell_to_value(row, col.ordinal())))
        .collect()
}

fn row_to_tuple(row: &PgRow) -> Vec<Value> {
    use sqlx::Row as _;
    (0..row.len()).map(|i| cell_to_value(row, i)).collect()
}

/// Decode one cell by trying the column types the registry can declare.
fn cell_to_value(row: &PgRow, idx: usize) -> Value {
    use sqlx::Row as _;
    if let Ok(Some(n)) = row.try_get::<Option<i64>, _>(idx) {
        return Value::from(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<i32>, _>(idx) {
        return Value::from(n);
    }
    if let Ok(Some(n)) = row.try_get::<Option<f64>, _>(idx) {
        return serde_json::Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null);
    }
    if let Ok(Some(b)) = row.try_get::<Option<bool>, _>(idx) {
        return Value::Bool(b);
    }
    if let Ok(Some(u)) = row.try_get::<Option<uuid::Uuid>, _>(idx) {
        return Value::String(u.to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::NaiveDateTime>, _>(idx) {
        return Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string());
    }
    if let Ok(Some(d)) = row.try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx) {
        return Value::String(d.to_rfc3339());
    }
    if let Ok(Some(s)) = row.try_get::<Option<String>, _>(idx) {
        return Value::String(s);
    }
    if let Ok(Some(j)) = row.try_get::<Option<Value>, _>(idx) {
        return j;
    }
    Value::Null
}
