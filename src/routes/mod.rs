//! Router builders.

mod common;
mod query;
pub use common::{common_routes, common_routes_with_ready};
pub use query::query_routes;
