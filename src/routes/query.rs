//! Query routes: `GET|POST /query/:model`.

use crate::handlers::query::{query_get, query_post};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn query_routes(state: AppState) -> Router {
    Router::new()
        .route("/query/:model", get(query_get).post(query_post))
        .with_state(state)
}
