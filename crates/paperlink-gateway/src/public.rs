use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::error::ApiResult;
use crate::state::SharedState;

pub async fn health() -> &'static str {
    "ok"
}

pub async fn status(State(state): State<SharedState>) -> ApiResult<Json<Value>> {
    let documents = state.store.document_count()?;
    let migrations_applied = state.store.applied_migrations()?.len();

    Ok(Json(json!({
        "status": "running",
        "documents": documents,
        "migrations_applied": migrations_applied,
    })))
}
