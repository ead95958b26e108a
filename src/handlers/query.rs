//! `GET|POST /query/:model`: raw request keys from the query string, payload and filter
//! document from the JSON body (or the `data`/`qjson` query keys).

use crate::error::ApiError;
use crate::extractors::AccessLevel;
use crate::response::QueryOutcome;
use crate::spec::QuerySpec;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

#[derive(Debug, Default, Deserialize)]
pub struct QueryBody {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub qjson: Option<Value>,
}

/// Accept JSON values or JSON-encoded strings.
fn decode(v: Value, what: &str) -> Result<Value, ApiError> {
    match v {
        Value::String(s) => serde_json::from_str(&s).map_err(|e| ApiError::BadRequest(format!("{}: {}", what, e))),
        other => Ok(other),
    }
}

fn payload_map(v: Value) -> Result<Map<String, Value>, ApiError> {
    match decode(v, "data")? {
        Value::Object(m) => Ok(m),
        Value::Null => Ok(Map::new()),
        _ => Err(ApiError::BadRequest("data must be a JSON object".into())),
    }
}

async fn run(
    state: &AppState,
    model: String,
    level: i64,
    mut args: HashMap<String, String>,
    body: QueryBody,
) -> Result<Json<QueryOutcome>, ApiError> {
    let data = body.data.or_else(|| args.remove("data").map(Value::String));
    let qjson = body.qjson.or_else(|| args.remove("qjson").map(Value::String));

    let mut builder = QuerySpec::builder(model).access_level(level).request_args(args);
    if let Some(d) = data {
        builder = builder.payload(payload_map(d)?);
    }
    if let Some(q) = qjson {
        builder = builder.qjson(decode(q, "qjson")?);
    }
    Ok(Json(state.engine.generate_from(builder).await))
}

pub async fn query_get(
    State(state): State<AppState>,
    AccessLevel(level): AccessLevel,
    Path(model): Path<String>,
    Query(args): Query<HashMap<String, String>>,
) -> Result<Json<QueryOutcome>, ApiError> {
    run(&state, model, level, args, QueryBody::default()).await
}

pub async fn query_post(
    State(state): State<AppState>,
    AccessLevel(level): AccessLevel,
    Path(model): Path<String>,
    Query(args): Query<HashMap<String, String>>,
    body: Option<Json<QueryBody>>,
) -> Result<Json<QueryOutcome>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    run(&state, model, level, args, body).await
}
