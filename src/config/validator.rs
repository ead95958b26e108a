//! Model config validation: unique names and column references.

use crate::config::{ModelConfig, Operator};
use crate::error::ConfigError;
use std::collections::HashSet;

pub fn validate(models: &[ModelConfig]) -> Result<(), ConfigError> {
    let mut names = HashSet::new();
    for m in models {
        if m.name.trim().is_empty() {
            return Err(ConfigError::Validation("model name must not be empty".into()));
        }
        if !names.insert(m.name.to_lowercase()) {
            return Err(ConfigError::DuplicateModel(m.name.clone()));
        }
        if m.table.trim().is_empty() {
            return Err(ConfigError::Validation(format!("model {}: table must not be empty", m.name)));
        }

        let mut columns = HashSet::new();
        for c in &m.columns {
            if !columns.insert(c.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "model {}: duplicate column '{}'",
                    m.name, c.name
                )));
            }
            if let Some(ops) = &c.operators {
                for op in ops {
                    if Operator::from_name(op).is_none() {
                        return Err(ConfigError::UnknownOperator {
                            model: m.name.clone(),
                            column: c.name.clone(),
                            op: op.clone(),
                        });
                    }
                }
            }
        }

        for r in &m.restricted {
            if !columns.contains(r.as_str()) {
                return Err(ConfigError::UnknownColumn {
                    model: m.name.clone(),
                    column: r.clone(),
                    kind: "restricted",
                });
            }
        }
        if let Some(pk) = &m.primary_key {
            if !columns.contains(pk.as_str()) {
                return Err(ConfigError::UnknownColumn {
                    model: m.name.clone(),
                    column: pk.clone(),
                    kind: "primary_key",
                });
            }
        }
    }
    Ok(())
}
