//! Build the model registry from config structs, a JSON file, or the embedded default table.

use crate::config::resolved::{ColumnInfo, ModelDescriptor, ModelRegistry, Operator};
use crate::config::types::*;
use crate::config::validate;
use crate::error::ConfigError;
use std::path::Path;

/// Models shipped with the crate (compiled in).
const BUILTIN_MODELS: &str = include_str!("../../config/models.json");

/// Build the registry from model configs (validates first).
pub fn resolve(models: &[ModelConfig]) -> Result<ModelRegistry, ConfigError> {
    validate(models)?;
    let descriptors = models.iter().map(resolve_model).collect();
    Ok(ModelRegistry::new(descriptors))
}

fn resolve_model(m: &ModelConfig) -> ModelDescriptor {
    let columns = m
        .columns
        .iter()
        .map(|c| {
            let mut info = ColumnInfo::new(c.name.clone(), c.type_);
            if let Some(ops) = &c.operators {
                info.operators = ops.iter().filter_map(|o| Operator::from_name(o)).collect();
            }
            info
        })
        .collect();
    ModelDescriptor {
        name: m.name.clone(),
        known: true,
        schema_name: m.schema.clone(),
        table_name: m.table.clone(),
        primary_key: m.primary_key.clone(),
        columns,
        restricted: m.restricted.iter().cloned().collect(),
        read_level: m.rights.r,
        write_level: m.rights.w,
    }
}

/// Parse a models document (`{"models": [...]}`).
pub fn parse_models(json: &str) -> Result<Vec<ModelConfig>, ConfigError> {
    let file: ModelsFile = serde_json::from_str(json).map_err(|e| ConfigError::Load(e.to_string()))?;
    Ok(file.models)
}

/// Load and resolve a models file from disk.
pub async fn load_from_path(path: impl AsRef<Path>) -> Result<ModelRegistry, ConfigError> {
    let path = path.as_ref();
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    let models = parse_models(&raw)?;
    tracing::info!(path = %path.display(), models = models.len(), "loaded model config");
    resolve(&models)
}

impl ModelRegistry {
    /// The fixed default model table.
    pub fn builtin() -> Result<ModelRegistry, ConfigError> {
        resolve(&parse_models(BUILTIN_MODELS)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnType;

    #[test]
    fn builtin_table_has_expected_rights() {
        let reg = ModelRegistry::builtin().expect("builtin models");
        let user = reg.resolve("dbUser");
        assert!(user.known);
        assert_eq!(user.read_level, Some(1));
        assert_eq!(user.write_level, Some(4));
        assert!(user.restricted.contains("password_hash"));

        let interact = reg.resolve("dbagenthostinteract");
        assert_eq!(interact.write_level, Some(1));

        let test = reg.resolve("TestTable");
        assert_eq!(test.column("data").map(|c| c.type_), Some(ColumnType::Json));
    }

    #[test]
    fn operator_override_replaces_defaults() {
        let models = parse_models(
            r#"{"models": [{"name": "m", "table": "m", "columns": [
                {"name": "code", "type": "text", "operators": ["eq", "in_"]}
            ]}]}"#,
        )
        .expect("parse");
        let reg = resolve(&models).expect("resolve");
        let m = reg.resolve("m");
        let code = m.column("code").expect("column");
        assert_eq!(code.operators, vec![Operator::Eq, Operator::In]);
        assert_eq!(code.resolve_operator("like"), None);
        // rights omitted: no access either way
        assert_eq!(m.read_level, None);
    }
}
