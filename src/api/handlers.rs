use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;

use crate::{errors::ApiError, server::AppState};

pub async fn create_vm(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
    Json(doc): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    info!(%namespace, "API: create virtual machine");
    let created = state.vm_store.create(&namespace, doc).await?;
    Ok(Json(created))
}

pub async fn update_vm(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(doc): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    info!(%namespace, %name, "API: update virtual machine");
    let updated = state.vm_store.update(&namespace, &name, doc).await?;
    Ok(Json(updated))
}

pub async fn delete_vm(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let removed_disks = parse_removed_disks(params.get("removedDisks"));
    info!(
        %namespace, %name,
        removed_disks = ?removed_disks,
        "API: delete virtual machine"
    );
    let deleted =
        state.vm_store.delete(&namespace, &name, &removed_disks).await?;
    Ok(Json(deleted))
}

pub async fn get_vm(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let vm = state.vm_store.get(&namespace, &name).await?;
    let doc = serde_json::to_value(&*vm)
        .map_err(|e| ApiError::InternalServerError(e.to_string()))?;
    Ok(Json(doc))
}

pub async fn list_vms(
    State(state): State<AppState>,
    Path(namespace): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let vms = state.vm_store.list(&namespace).await?;
    let docs: Vec<Value> = vms
        .iter()
        .map(|vm| serde_json::to_value(&**vm))
        .collect::<Result<_, _>>()
        .map_err(|e| ApiError::InternalServerError(e.to_string()))?;
    Ok(Json(Value::Array(docs)))
}

/// `removedDisks` arrives as a comma-separated list of attachment names.
fn parse_removed_disks(raw: Option<&String>) -> Vec<String> {
    raw.map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .collect()
    })
    .unwrap_or_default()
}
