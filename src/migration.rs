//! DDL bootstrap for registered models. Idempotent: every statement uses IF NOT EXISTS.

use crate::config::{ColumnType, ModelDescriptor, ModelRegistry};
use crate::error::ApiError;
use sqlx::{ConnectOptions, PgPool};
use std::collections::BTreeSet;
use std::str::FromStr;

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// CREATE TABLE statement for one model. Integer primary keys become identity columns.
pub fn create_table_sql(model: &ModelDescriptor) -> String {
    let table = match &model.schema_name {
        Some(schema) => format!("{}.{}", quote(schema), quote(&model.table_name)),
        None => quote(&model.table_name),
    };
    let defs: Vec<String> = model
        .columns
        .iter()
        .map(|c| {
            let is_pk = model.primary_key.as_deref() == Some(c.name.as_str());
            match (is_pk, c.type_) {
                (true, ColumnType::Integer) => format!("{} BIGSERIAL PRIMARY KEY", quote(&c.name)),
                (true, t) => format!("{} {} PRIMARY KEY", quote(&c.name), t.pg_type().to_uppercase()),
                (false, t) => format!("{} {}", quote(&c.name), t.pg_type().to_uppercase()),
            }
        })
        .collect();
    format!("CREATE TABLE IF NOT EXISTS {} ({})", table, defs.join(", "))
}

/// Create schemas and tables for every registered model.
pub async fn ensure_tables(pool: &PgPool, registry: &ModelRegistry) -> Result<(), ApiError> {
    let schemas: BTreeSet<&str> = registry.models().filter_map(|m| m.schema_name.as_deref()).collect();
    for schema in schemas {
        sqlx::query(&format!("CREATE SCHEMA IF NOT EXISTS {}", quote(schema)))
            .execute(pool)
            .await?;
    }
    for name in registry.names() {
        let model = registry.resolve(name);
        let ddl = create_table_sql(&model);
        tracing::debug!(sql = %ddl, "ensure table");
        sqlx::query(&ddl).execute(pool).await?;
    }
    tracing::info!(models = registry.names().len(), "tables ensured");
    Ok(())
}

/// Create the database named in `database_url` when missing, connecting through `postgres`.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), ApiError> {
    let (admin_url, db_name) = split_db_name(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| ApiError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        sqlx::query(&format!("CREATE DATABASE {}", quote(&db_name)))
            .execute(&mut conn)
            .await?;
        tracing::info!(database = %db_name, "database created");
    }
    Ok(())
}

fn split_db_name(url: &str) -> Result<(String, String), ApiError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| ApiError::BadRequest("DATABASE_URL: no path".into()))?
        + 1;
    let db_name = url[path_start..].split('?').next().unwrap_or("").trim().to_string();
    Ok((format!("{}postgres", &url[..path_start]), db_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_for_builtin_user_table() {
        let reg = ModelRegistry::builtin().unwrap();
        assert_eq!(
            create_table_sql(&reg.resolve("dbuser")),
            "CREATE TABLE IF NOT EXISTS \"users\" (\"id\" BIGSERIAL PRIMARY KEY, \"username\" TEXT, \
             \"email\" TEXT, \"password_hash\" TEXT, \"access_id\" BIGINT, \"date_added\" TIMESTAMP)"
        );
    }

    #[test]
    fn database_name_split() {
        let (admin, name) = split_db_name("postgres://u:p@localhost:5432/dynquery?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres");
        assert_eq!(name, "dynquery");
    }
}
