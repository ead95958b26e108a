//! Query server: loads the model registry (MODELS_PATH or the builtin table), connects to
//! DATABASE_URL when set (in-memory store otherwise) and mounts the common and query routes.

use axum::Router;
use dynquery::{
    common_routes_with_ready, ensure_database_exists, ensure_tables, load_from_path, query_routes, AppState,
    MemoryStore, ModelRegistry, PgStore, QueryEngine, QueryOptions, Store, TreePolicy,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::limit::RequestBodyLimitLayer;
use tracing_subscriber::EnvFilter;

const BODY_LIMIT: usize = 1024 * 1024;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dynquery=info".parse()?))
        .init();

    let registry = match std::env::var("MODELS_PATH") {
        Ok(path) => load_from_path(&path).await?,
        Err(_) => ModelRegistry::builtin()?,
    };
    let registry = Arc::new(registry);

    let (store, pool): (Arc<dyn Store>, _) = match std::env::var("DATABASE_URL") {
        Ok(url) => {
            ensure_database_exists(&url).await?;
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(&url)
                .await?;
            ensure_tables(&pool, &registry).await?;
            (Arc::new(PgStore::new(pool.clone())) as Arc<dyn Store>, Some(pool))
        }
        Err(_) => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            (Arc::new(MemoryStore::new()) as Arc<dyn Store>, None)
        }
    };

    let tree_policy = match std::env::var("TREE_POLICY").as_deref() {
        Ok("strict") => TreePolicy::Strict,
        _ => TreePolicy::Lenient,
    };
    let engine = QueryEngine::new(registry, store).with_options(QueryOptions { tree_policy });
    let state = AppState {
        engine: Arc::new(engine),
        pool,
    };

    let app = Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .merge(query_routes(state))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT));

    let addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
