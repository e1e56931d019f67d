//! HTTP API handlers — exposes server-side replica state as JSON.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use sync_agent::Replica;
use sync_core::kind::{make_key, Kind};

#[derive(Clone)]
pub struct ApiState {
    pub replica: Arc<Replica>,
    pub started_at: Instant,
    pub shutdown_tx: tokio::sync::broadcast::Sender<()>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub uptime_secs: u64,
    pub kinds: Vec<KindSummary>,
}

#[derive(Serialize)]
pub struct KindSummary {
    pub kind: String,
    pub objects: usize,
}

pub async fn handle_status(State(state): State<ApiState>) -> Json<StatusResponse> {
    let kinds = state
        .replica
        .kinds()
        .into_iter()
        .map(|kind| {
            let objects = state.replica.count_for(&kind);
            KindSummary { kind: kind.to_string(), objects }
        })
        .collect();

    Json(StatusResponse {
        uptime_secs: state.started_at.elapsed().as_secs(),
        kinds,
    })
}

#[derive(Serialize)]
pub struct ReplicaEntry {
    pub key: String,
    pub hash: String,
}

#[derive(Serialize)]
pub struct ReplicaListResponse {
    pub entries: Vec<ReplicaEntry>,
}

pub async fn handle_replica_list(
    State(state): State<ApiState>,
    Path((group, version, resource)): Path<(String, String, String)>,
) -> Json<ReplicaListResponse> {
    let kind = Kind::new(group, version, resource);
    let entries = state
        .replica
        .entries_for(&kind)
        .into_iter()
        .map(|(key, hash)| ReplicaEntry { key, hash: hex::encode(hash) })
        .collect();
    Json(ReplicaListResponse { entries })
}

pub async fn handle_replica_get(
    State(state): State<ApiState>,
    Path((group, version, resource, namespace, name)): Path<(String, String, String, String, String)>,
) -> Result<Json<serde_json::Value>, (StatusCode, String)> {
    let kind = Kind::new(group, version, resource);
    let key = make_key(&namespace, &name);
    let bytes = state
        .replica
        .get(&kind, &key)
        .ok_or((StatusCode::NOT_FOUND, format!("no object {key} tracked for {kind}")))?;
    serde_json::from_slice(&bytes).map(Json).map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

#[derive(Serialize)]
pub struct ShutdownResponse {
    pub message: String,
}

pub async fn handle_shutdown(State(state): State<ApiState>) -> Json<ShutdownResponse> {
    tracing::info!("shutdown requested via API");
    let _ = state.shutdown_tx.send(());
    Json(ShutdownResponse { message: "shutdown initiated".to_string() })
}
