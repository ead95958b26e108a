//! dynquery: declarative query, CRUD and result-shaping layer with per-model access control.

pub mod access;
pub mod config;
pub mod engine;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod migration;
pub mod predicate;
pub mod query;
pub mod response;
pub mod routes;
pub mod service;
pub mod shape;
pub mod spec;
pub mod sql;
pub mod state;
pub mod store;

pub use config::{load_from_path, resolve, ModelDescriptor, ModelRegistry};
pub use engine::{QueryEngine, QueryOptions};
pub use error::{AccessKind, ApiError, ConfigError, QueryError, StoreError};
pub use migration::{ensure_database_exists, ensure_tables};
pub use predicate::{Predicate, TreePolicy};
pub use response::{Message, QueryOutcome, ResultBody, ResultSet};
pub use routes::{common_routes, common_routes_with_ready, query_routes};
pub use service::InsertHook;
pub use spec::{QuerySpec, QuerySpecBuilder};
pub use state::AppState;
pub use store::{MemoryStore, PgStore, Row, Store};
