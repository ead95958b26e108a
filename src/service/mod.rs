//! CRUD execution over a `Store`.

mod crud;
pub use crud::{CrudExecutor, InsertHook};
