//! Raw model config types matching the JSON model file.

use serde::{Deserialize, Serialize};

/// Column type tag. Decides value coercion, SQL casts and the default operator set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    Float,
    Text,
    Boolean,
    Timestamp,
    Uuid,
    /// Structured document column; queryable by path.
    Json,
}

impl ColumnType {
    /// PostgreSQL type used for parameter casts and DDL.
    pub fn pg_type(&self) -> &'static str {
        match self {
            ColumnType::Integer => "bigint",
            ColumnType::Float => "double precision",
            ColumnType::Text => "text",
            ColumnType::Boolean => "boolean",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Uuid => "uuid",
            ColumnType::Json => "jsonb",
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnType,
    /// Replaces the type's default operator set when present.
    #[serde(default)]
    pub operators: Option<Vec<String>>,
}

/// Required clearance per operation. Missing levels deny everything.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RightsConfig {
    #[serde(default)]
    pub r: Option<i64>,
    #[serde(default)]
    pub w: Option<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Lookup name; matched case-insensitively.
    pub name: String,
    pub table: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub primary_key: Option<String>,
    pub columns: Vec<ColumnConfig>,
    /// Column names that must never be returned or written through the generic path.
    #[serde(default)]
    pub restricted: Vec<String>,
    #[serde(default)]
    pub rights: RightsConfig,
}

/// Top-level shape of a models file.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ModelsFile {
    pub models: Vec<ModelConfig>,
}
