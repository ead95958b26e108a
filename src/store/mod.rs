//! Storage boundary: executes assembled queries and mutations.

mod memory;
mod pg;

pub use memory::MemoryStore;
pub use pg::PgStore;

use crate::config::ModelDescriptor;
use crate::error::StoreError;
use crate::query::AssembledQuery;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};

/// One result row. Flat queries yield entities; grouped queries yield tuples laid out
/// as the query's projection.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Row {
    Entity(Map<String, Value>),
    Tuple(Vec<Value>),
}

#[async_trait]
pub trait Store: Send + Sync {
    /// Rows for the query, honoring its limit.
    async fn fetch(&self, query: &AssembledQuery) -> Result<Vec<Row>, StoreError>;

    /// Rows (or groups) the query matches, ignoring its limit.
    async fn count(&self, query: &AssembledQuery) -> Result<u64, StoreError>;

    /// Insert one row; returns the new primary key when the model has one.
    async fn insert(&self, model: &ModelDescriptor, payload: &Map<String, Value>) -> Result<Option<Value>, StoreError>;

    /// Apply `payload` to every matched row in one transaction. Returns rows changed.
    async fn update(&self, query: &AssembledQuery, payload: &Map<String, Value>) -> Result<u64, StoreError>;

    /// Remove every matched row in one transaction. Returns rows removed.
    async fn delete(&self, query: &AssembledQuery) -> Result<u64, StoreError>;
}
