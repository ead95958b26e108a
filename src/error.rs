//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("duplicate model name: {0}")]
    DuplicateModel(String),
    #[error("model {model}: unknown column '{column}' referenced by {kind}")]
    UnknownColumn {
        model: String,
        column: String,
        kind: &'static str,
    },
    #[error("model {model}: column '{column}' lists unknown operator '{op}'")]
    UnknownOperator {
        model: String,
        column: String,
        op: String,
    },
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Which side of the access gate rejected a request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessKind::Read => f.write_str("Read"),
            AccessKind::Write => f.write_str("Write"),
        }
    }
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("storage: {0}")]
    Backend(String),
}

/// Failures of the query pipeline. Display strings are the user-visible messages.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Database Model does not exist.")]
    UnknownModel(String),
    #[error("User does not have {0} access.")]
    AccessDenied(AccessKind),
    #[error("{0}")]
    InvalidFilter(String),
    #[error("Invalid query: {0}")]
    InvalidSpec(String),
    #[error("Invalid CRUD operation.")]
    InvalidCrudOperation(String),
    #[error("Invalid column data.")]
    InvalidColumnData(String),
    #[error("Missing column data.")]
    MissingColumnData,
    #[error("key: {{{0}}} does not exist or restricted")]
    KeyNotFound(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<sqlx::Error> for QueryError {
    fn from(e: sqlx::Error) -> Self {
        QueryError::Store(StoreError::Db(e))
    }
}

/// Errors raised by the HTTP adapter before a request reaches the pipeline.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ApiError::Db(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
