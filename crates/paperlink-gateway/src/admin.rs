//! Admin API handlers: migrations, settings, storage, database maintenance,
//! and audit log access.

use std::collections::{BTreeMap, HashMap};

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use paperlink_common::{Page, format_bytes};
use paperlink_db::export::{default_export_range, parse_export_date};
use paperlink_db::{ExportFormat, maintenance};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;

use crate::error::ApiResult;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

#[derive(Deserialize)]
pub struct RestoreRequest {
    pub filename: String,
}

#[derive(Deserialize)]
pub struct ResetRequest {
    #[serde(default)]
    pub confirm: String,
}

#[derive(Deserialize)]
pub struct ExportQuery {
    pub format: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Display contract: every registry migration with its applied/pending state.
pub async fn list_migrations(State(state): State<SharedState>) -> ApiResult<Json<Value>> {
    let statuses = state.store.migration_statuses()?;
    let migrations: Vec<Value> = statuses
        .iter()
        .map(|s| {
            json!({
                "name": s.name,
                "applied": s.is_applied(),
                "applied_at": s.applied_at,
            })
        })
        .collect();
    Ok(Json(json!({ "migrations": migrations })))
}

pub async fn run_migrations(State(state): State<SharedState>) -> ApiResult<Json<Value>> {
    let report = state.store.run_pending()?;
    info!("admin migration run: {}", report.summary());
    Ok(Json(json!({
        "success": report.succeeded(),
        "message": report.summary(),
        "report": report,
    })))
}

pub async fn list_settings(
    State(state): State<SharedState>,
) -> ApiResult<Json<BTreeMap<String, Vec<paperlink_db::Setting>>>> {
    Ok(Json(state.store.settings_by_category()?))
}

/// Update settings in bulk. Each key reports its own outcome; a non-editable
/// setting does not abort the rest of the batch.
pub async fn update_settings(
    State(state): State<SharedState>,
    Json(updates): Json<HashMap<String, String>>,
) -> ApiResult<Json<Value>> {
    let mut results: BTreeMap<String, String> = BTreeMap::new();
    for (key, value) in &updates {
        match state.store.set_setting(key, value) {
            Ok(()) => {
                results.insert(key.clone(), "updated".to_string());
            }
            Err(e) => {
                results.insert(key.clone(), e.to_string());
            }
        }
    }
    Ok(Json(json!({ "results": results })))
}

pub async fn storage_report(
    State(state): State<SharedState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Value>> {
    let page = Page::new(query.page.unwrap_or(1), state.store.items_per_page());
    let report = state.store.storage_report(page)?;

    let mut body = serde_json::to_value(&report).map_err(paperlink_common::Error::from)?;
    if let Some(obj) = body.as_object_mut() {
        obj.insert(
            "formatted_total".to_string(),
            json!(format_bytes(report.usage.total_bytes)),
        );
        obj.insert(
            "formatted_max".to_string(),
            json!(format_bytes(report.max_bytes)),
        );
    }
    Ok(Json(body))
}

pub async fn database_stats(State(state): State<SharedState>) -> ApiResult<Json<Value>> {
    let stats = state.store.db_stats()?;
    Ok(Json(json!(stats)))
}

pub async fn create_backup(State(state): State<SharedState>) -> ApiResult<Json<Value>> {
    let path = state.store.backup(&state.backup_dir())?;
    Ok(Json(json!({
        "file": path.file_name().and_then(|n| n.to_str()),
    })))
}

pub async fn list_backups(State(state): State<SharedState>) -> ApiResult<Json<Value>> {
    let backups = maintenance::list_backups(&state.backup_dir())?;
    let backups: Vec<Value> = backups
        .iter()
        .map(|b| {
            json!({
                "filename": b.filename,
                "size": b.size,
                "formatted_size": format_bytes(b.size),
                "created": b.created,
            })
        })
        .collect();
    Ok(Json(json!({ "backups": backups })))
}

/// Structure of a backup file, for the pre-restore comparison view.
pub async fn backup_stats(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> ApiResult<Json<Value>> {
    paperlink_security::safe_backup_filename(&filename)?;
    let stats = maintenance::stats_from_file(&state.backup_dir().join(&filename))?;
    Ok(Json(json!(stats)))
}

pub async fn delete_backup(
    State(state): State<SharedState>,
    Path(filename): Path<String>,
) -> ApiResult<StatusCode> {
    state.store.delete_backup(&state.backup_dir(), &filename)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn restore_backup(
    State(state): State<SharedState>,
    Json(request): Json<RestoreRequest>,
) -> ApiResult<Json<Value>> {
    paperlink_security::safe_backup_filename(&request.filename)?;
    state
        .store
        .restore(&state.backup_dir().join(&request.filename))?;
    Ok(Json(json!({ "restored": request.filename })))
}

/// Destructive: requires the confirm phrase in the body. A backup is taken
/// automatically before the schema is rebuilt.
pub async fn reset_database(
    State(state): State<SharedState>,
    Json(request): Json<ResetRequest>,
) -> ApiResult<Json<Value>> {
    paperlink_security::confirm_destructive(&request.confirm)?;
    let backup = state.store.reset(&state.backup_dir())?;
    Ok(Json(json!({
        "reset": true,
        "backup": backup.file_name().and_then(|n| n.to_str()),
    })))
}

pub async fn list_logs(
    State(state): State<SharedState>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<Value>> {
    let page = Page::new(query.page.unwrap_or(1), state.store.items_per_page());
    let total = state.store.audit_log_count()?;
    let logs = state.store.list_audit_logs(page)?;

    Ok(Json(json!({
        "logs": logs,
        "total": total,
        "page": page.number,
        "total_pages": page.total_pages(total),
    })))
}

pub async fn export_logs(
    State(state): State<SharedState>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<Response> {
    let format: ExportFormat = query.format.as_deref().unwrap_or("csv").parse()?;
    let (default_start, default_end) = default_export_range();
    let start = match query.start_date.as_deref() {
        Some(s) => parse_export_date(s)?,
        None => default_start,
    };
    let end = match query.end_date.as_deref() {
        Some(s) => parse_export_date(s)?,
        None => default_end,
    };

    let body = state.store.export_audit_logs(start, end, format)?;
    let filename = format!("audit_logs_{start}_{end}.{}", format.extension());

    let response = (
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response();
    Ok(response)
}
