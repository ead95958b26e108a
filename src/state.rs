//! Shared application state for all routes.

use crate::engine::QueryEngine;
use sqlx::PgPool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<QueryEngine>,
    /// Probed by the readiness route; `None` when the engine runs without a database.
    pub pool: Option<PgPool>,
}
