use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use indexmap::IndexMap;
use log::error;
use serde_json::{json, Value as JsonValue};

use footpath_core::model::network::AttrValue;
use footpath_core::model::profile::{status_document, QueryStatus};
use footpath_core::storage::GraphStore;

use super::queries;
use super::server_error::ServerError;
use super::state::SharedState;

/// service summary: graph status and the loaded profiles.
pub async fn info(State(state): State<SharedState>) -> Json<JsonValue> {
    let profiles: Vec<JsonValue> = state
        .profiles
        .iter()
        .map(|p| {
            json!({
                "id": p.id,
                "name": p.name,
                "precalculate": p.precalculate,
            })
        })
        .collect();
    let status = if state.graph.is_some() {
        QueryStatus::Ok
    } else {
        QueryStatus::NoGraph
    };
    Json(json!({ "status": status.as_str(), "profiles": profiles }))
}

pub async fn shortest_path(
    State(state): State<SharedState>,
    Path(profile): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    run_query(state, profile, params, |state, idx, params, args| {
        let lon1 = float_param(&params, "lon1")?;
        let lat1 = float_param(&params, "lat1")?;
        let lon2 = float_param(&params, "lon2")?;
        let lat2 = float_param(&params, "lat2")?;
        Ok(Box::new(move |store: &GraphStore| {
            queries::shortest_path_query(
                store,
                &state.profiles[idx],
                lon1,
                lat1,
                lon2,
                lat2,
                &args,
            )
        }))
    })
    .await
}

pub async fn shortest_path_tree(
    State(state): State<SharedState>,
    Path(profile): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    run_query(state, profile, params, |state, idx, params, args| {
        let lon = float_param(&params, "lon")?;
        let lat = float_param(&params, "lat")?;
        let max_cost = float_param(&params, "max_cost")?;
        Ok(Box::new(move |store: &GraphStore| {
            queries::shortest_path_tree_query(
                store,
                &state.profiles[idx],
                lon,
                lat,
                max_cost,
                &args,
            )
        }))
    })
    .await
}

pub async fn reachable_tree(
    State(state): State<SharedState>,
    Path(profile): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    run_query(state, profile, params, |state, idx, params, args| {
        let lon = float_param(&params, "lon")?;
        let lat = float_param(&params, "lat")?;
        let max_cost = float_param(&params, "max_cost")?;
        Ok(Box::new(move |store: &GraphStore| {
            queries::reachable_tree_query(
                store,
                &state.profiles[idx],
                lon,
                lat,
                max_cost,
                &args,
            )
        }))
    })
    .await
}

type QueryFn =
    Box<dyn FnOnce(&GraphStore) -> Result<JsonValue, ServerError> + Send + 'static>;

/// shared request plumbing: resolve the profile, parse its typed
/// arguments, build the query closure, and run it on the blocking pool
/// while holding the store lock. domain failures come back as HTTP-200
/// status envelopes by convention.
async fn run_query<F>(
    state: SharedState,
    profile: String,
    params: HashMap<String, String>,
    build: F,
) -> Response
where
    F: FnOnce(
        SharedState,
        usize,
        &HashMap<String, String>,
        IndexMap<String, AttrValue>,
    ) -> Result<QueryFn, String>,
{
    // endpoints are addressed as /<route>/<profile>.json
    let profile_id = profile.strip_suffix(".json").unwrap_or(&profile);
    let idx = match state.profiles.iter().position(|p| p.id == profile_id) {
        Some(idx) => idx,
        None => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("no such profile: {}", profile_id) })),
            )
                .into_response()
        }
    };

    if state.graph.is_none() {
        return Json(status_document(QueryStatus::NoGraph)).into_response();
    }

    let args = match state.profiles[idx].parse_args(params.iter()) {
        Ok(args) => args,
        Err(e) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": e.to_string() })),
            )
                .into_response()
        }
    };

    let query = match build(state.clone(), idx, &params, args) {
        Ok(query) => query,
        Err(message) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "errors": message })),
            )
                .into_response()
        }
    };

    let worker_state = state.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let graph = worker_state
            .graph
            .as_ref()
            .expect("graph presence checked before dispatch");
        let store = match graph.lock() {
            Ok(store) => store,
            Err(poisoned) => poisoned.into_inner(),
        };
        query(&store)
    })
    .await;

    match joined {
        Ok(Ok(document)) => Json(document).into_response(),
        Ok(Err(e)) => {
            error!("query failed: {}", e);
            let body = if state.debug {
                json!({ "error": e.to_string() })
            } else {
                json!({ "error": "internal error" })
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
        Err(e) => {
            error!("query task panicked: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
                .into_response()
        }
    }
}

fn float_param(params: &HashMap<String, String>, name: &str) -> Result<f64, String> {
    let raw = params
        .get(name)
        .ok_or_else(|| format!("missing required parameter: {}", name))?;
    raw.parse::<f64>()
        .map_err(|_| format!("invalid value for {}: {}", name, raw))
}
