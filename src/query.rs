//! Query assembly: predicate + grouping + ordering against a model.

use crate::config::ModelDescriptor;
use crate::error::QueryError;
use crate::predicate::Predicate;
use crate::spec::{GroupField, GroupOp, OrderBy};
use serde::Serialize;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Projection {
    /// Every column of the model; rows are entities.
    Rows,
    /// Aggregate tuples laid out as `columns`.
    Grouped {
        /// Output names in tuple order (`count` first when present).
        columns: Vec<String>,
        /// GROUP BY columns.
        keys: Vec<String>,
        /// Column whose non-null values are counted.
        count: Option<String>,
    },
}

/// A storage-independent query, ready for a `Store` to execute.
#[derive(Clone, Debug, Serialize)]
pub struct AssembledQuery {
    #[serde(skip)]
    pub model: Arc<ModelDescriptor>,
    #[serde(rename = "model")]
    pub model_name: String,
    pub projection: Projection,
    pub predicate: Option<Predicate>,
    pub order_by: Option<OrderBy>,
    pub limit: Option<u32>,
}

impl AssembledQuery {
    pub fn with_limit(mut self, limit: Option<u32>) -> Self {
        self.limit = limit;
        self
    }

    pub fn is_grouped(&self) -> bool {
        matches!(self.projection, Projection::Grouped { .. })
    }

    /// Names of the values each result row carries, in order.
    pub fn output_columns(&self) -> Vec<String> {
        match &self.projection {
            Projection::Rows => self.model.column_names().map(String::from).collect(),
            Projection::Grouped { columns, .. } => columns.clone(),
        }
    }
}

/// Build the query. Grouped queries ignore `order_by`; output order is up to the store.
pub fn assemble(
    model: Arc<ModelDescriptor>,
    predicate: Option<Predicate>,
    group_by: &[GroupField],
    order_by: Option<&OrderBy>,
) -> Result<AssembledQuery, QueryError> {
    if !model.known {
        return Err(QueryError::UnknownModel(model.name.clone()));
    }

    let projection = if group_by.is_empty() {
        Projection::Rows
    } else {
        for g in group_by {
            if model.column(&g.field).is_none() {
                return Err(QueryError::InvalidFilter(format!("Invalid groupby column: {}", g.field)));
            }
        }
        let count = group_by
            .iter()
            .find(|g| g.op == GroupOp::Count)
            .map(|g| g.field.clone());
        let keys: Vec<String> = group_by.iter().map(|g| g.field.clone()).collect();
        let mut columns = Vec::with_capacity(keys.len() + 1);
        if count.is_some() {
            columns.push("count".to_string());
        }
        columns.extend(keys.iter().cloned());
        Projection::Grouped { columns, keys, count }
    };

    let order_by = match (order_by, &projection) {
        (Some(o), Projection::Rows) => {
            if model.column(&o.field).is_none() {
                return Err(QueryError::InvalidFilter(format!("Invalid orderby column: {}", o.field)));
            }
            Some(o.clone())
        }
        (Some(o), Projection::Grouped { .. }) => {
            tracing::debug!(field = %o.field, "ordering ignored for grouped query");
            None
        }
        (None, _) => None,
    };

    Ok(AssembledQuery {
        model_name: model.name.clone(),
        model,
        projection,
        predicate,
        order_by,
        limit: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelRegistry;
    use crate::spec::Direction;

    fn registry() -> ModelRegistry {
        ModelRegistry::builtin().expect("builtin")
    }

    #[test]
    fn grouped_projection_puts_count_first() {
        let m = registry().resolve("dbblacklist");
        let q = assemble(
            m,
            None,
            &[
                GroupField::new("datatype", GroupOp::Count),
                GroupField::new("datavalue", GroupOp::Group),
            ],
            Some(&OrderBy {
                field: "id".into(),
                direction: Direction::Desc,
            }),
        )
        .expect("assemble");
        assert_eq!(q.output_columns(), vec!["count", "datatype", "datavalue"]);
        assert_eq!(q.order_by, None);
        match q.projection {
            Projection::Grouped { keys, count, .. } => {
                assert_eq!(keys, vec!["datatype", "datavalue"]);
                assert_eq!(count.as_deref(), Some("datatype"));
            }
            Projection::Rows => panic!("expected grouped"),
        }
    }

    #[test]
    fn group_without_aggregate_has_no_count_column() {
        let m = registry().resolve("dbblacklist");
        let q = assemble(m, None, &[GroupField::new("datatype", GroupOp::Group)], None).unwrap();
        assert_eq!(q.output_columns(), vec!["datatype"]);
    }

    #[test]
    fn rejects_unknown_model_and_columns() {
        let reg = registry();
        assert!(matches!(
            assemble(reg.resolve("ghost"), None, &[], None),
            Err(QueryError::UnknownModel(_))
        ));
        let order = OrderBy {
            field: "nope".into(),
            direction: Direction::Asc,
        };
        assert!(assemble(reg.resolve("dbuser"), None, &[], Some(&order)).is_err());
        assert!(assemble(reg.resolve("dbuser"), None, &[GroupField::new("nope", GroupOp::Count)], None).is_err());
    }
}
