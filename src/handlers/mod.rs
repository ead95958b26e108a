//! HTTP handlers for the query endpoint.

pub mod query;
pub use query::*;
