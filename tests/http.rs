use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use dynquery::{common_routes_with_ready, query_routes, AppState, MemoryStore, ModelRegistry, QueryEngine};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app(store: Arc<MemoryStore>) -> Router {
    let engine = QueryEngine::new(Arc::new(ModelRegistry::builtin().unwrap()), store);
    let state = AppState {
        engine: Arc::new(engine),
        pool: None,
    };
    Router::new()
        .merge(common_routes_with_ready(state.clone()))
        .merge(query_routes(state))
}

fn seeded() -> Arc<MemoryStore> {
    Arc::new(MemoryStore::new().with_rows(
        "dbwhitelist",
        vec![
            json!({"id": 1, "datatype": "ip", "datavalue": "10.0.0.1", "date_added": null}),
            json!({"id": 2, "datatype": "domain", "datavalue": "ok.example", "date_added": null}),
        ],
    ))
}

async fn body_json(res: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn get_with_access_header() {
    let res = app(seeded())
        .oneshot(
            Request::get("/query/dbwhitelist?filter=datatype,eq,ip&inc_fields=id,datavalue")
                .header("X-Access-Level", "1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(
        body_json(res).await,
        json!({"data": [{"id": 1, "datavalue": "10.0.0.1"}], "count": 1, "total": 1})
    );
}

#[tokio::test]
async fn missing_header_is_denied_and_bad_header_rejected() {
    let res = app(seeded())
        .oneshot(Request::get("/query/dbwhitelist").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await["message"], json!("User does not have Read access."));

    let res = app(seeded())
        .oneshot(
            Request::get("/query/dbwhitelist")
                .header("X-Access-Level", "admin")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn post_update_with_json_body() {
    let store = seeded();
    let body = json!({"data": {"datavalue": "10.0.0.9"}});
    let res = app(store.clone())
        .oneshot(
            Request::post("/query/dbwhitelist?crud=update&filter=id,eq,1")
                .header("X-Access-Level", "4")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let out = body_json(res).await;
    assert_eq!(out["message"], json!("Update Success."));
    assert_eq!(out["total"], json!(1));
    assert_eq!(store.rows("dbwhitelist").await[0]["datavalue"], json!("10.0.0.9"));
}

#[tokio::test]
async fn ready_without_database() {
    let res = app(seeded())
        .oneshot(Request::get("/ready").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(body_json(res).await, json!({"status": "ok", "models": 9}));
}
