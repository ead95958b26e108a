//! Request extractors.

mod access;
pub use access::{AccessLevel, ACCESS_LEVEL_HEADER};
