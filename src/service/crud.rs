//! Insert/update/delete against a store, validated against the visible schema.

use crate::config::ModelDescriptor;
use crate::error::QueryError;
use crate::query::AssembledQuery;
use crate::response::Message;
use crate::spec::CrudOp;
use crate::store::Store;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Replaces the default insert for one model (e.g. hashing credentials before storing a user).
#[async_trait]
pub trait InsertHook: Send + Sync {
    async fn insert(
        &self,
        store: &dyn Store,
        model: &ModelDescriptor,
        payload: &Map<String, Value>,
    ) -> Result<Message, QueryError>;
}

pub struct CrudExecutor<'a> {
    store: &'a dyn Store,
    hooks: &'a HashMap<String, Arc<dyn InsertHook>>,
}

impl<'a> CrudExecutor<'a> {
    pub fn new(store: &'a dyn Store, hooks: &'a HashMap<String, Arc<dyn InsertHook>>) -> Self {
        CrudExecutor { store, hooks }
    }

    /// Run `verb` against the rows `query` matches. `visible` is the caller's visible schema;
    /// payload keys outside it are rejected before anything is written. A registered insert
    /// hook receives the raw payload and does its own validation.
    pub async fn execute(
        &self,
        verb: &str,
        query: &AssembledQuery,
        payload: &Map<String, Value>,
        visible: &[String],
    ) -> Result<Message, QueryError> {
        let op = CrudOp::parse(verb).ok_or_else(|| QueryError::InvalidCrudOperation(verb.to_string()))?;
        let model = query.model.as_ref();
        match op {
            CrudOp::Insert => {
                if let Some(hook) = self.hooks.get(&model.name.to_lowercase()) {
                    tracing::info!(model = %model.name, "insert via hook");
                    return hook.insert(self.store, model, payload).await;
                }
                check_columns(payload, visible)?;
                let id = self.store.insert(model, payload).await?;
                tracing::info!(model = %model.name, id = ?id, "insert");
                Ok(Message::success("Insert Success.").with_id(id))
            }
            CrudOp::Update => {
                if payload.is_empty() {
                    return Err(QueryError::MissingColumnData);
                }
                check_columns(payload, visible)?;
                let n = self.store.update(query, payload).await?;
                tracing::info!(model = %model.name, rows = n, "update");
                Ok(Message::success("Update Success."))
            }
            CrudOp::Delete => {
                let n = self.store.delete(query).await?;
                tracing::info!(model = %model.name, rows = n, "delete");
                Ok(Message::success("Delete Success."))
            }
        }
    }
}

fn check_columns(payload: &Map<String, Value>, visible: &[String]) -> Result<(), QueryError> {
    match payload.keys().find(|k| !visible.iter().any(|c| c == *k)) {
        Some(bad) => Err(QueryError::InvalidColumnData(bad.clone())),
        None => Ok(()),
    }
}
