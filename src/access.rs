//! Access gate: numeric clearance against a model's read/write levels.

use crate::config::ModelDescriptor;
use crate::error::{AccessKind, QueryError};

/// Missing levels (unknown model) deny.
pub fn check_read(model: &ModelDescriptor, access_level: i64) -> Result<(), QueryError> {
    check(model.read_level, access_level, AccessKind::Read)
}

pub fn check_write(model: &ModelDescriptor, access_level: i64) -> Result<(), QueryError> {
    check(model.write_level, access_level, AccessKind::Write)
}

fn check(required: Option<i64>, access_level: i64, kind: AccessKind) -> Result<(), QueryError> {
    match required {
        Some(level) if access_level >= level => Ok(()),
        _ => Err(QueryError::AccessDenied(kind)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelRegistry;

    #[test]
    fn levels_compare_numerically() {
        let reg = ModelRegistry::builtin().unwrap();
        let user = reg.resolve("dbuser");
        assert!(check_read(&user, 0).is_err());
        assert!(check_read(&user, 1).is_ok());
        assert!(check_write(&user, 3).is_err());
        assert!(check_write(&user, 4).is_ok());
        assert!(check_write(&user, 99).is_ok());
    }

    #[test]
    fn unknown_model_denies_every_level() {
        let reg = ModelRegistry::builtin().unwrap();
        let ghost = reg.resolve("ghost");
        for level in [i64::MIN, 0, 1, i64::MAX] {
            assert!(matches!(check_read(&ghost, level), Err(QueryError::AccessDenied(AccessKind::Read))));
            assert!(matches!(check_write(&ghost, level), Err(QueryError::AccessDenied(AccessKind::Write))));
        }
    }
}
