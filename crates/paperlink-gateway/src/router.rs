use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::http::header::AUTHORIZATION;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use paperlink_security::verify_admin_token;
use serde_json::json;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;
use crate::{admin, public};

/// Build the full route tree: public endpoints plus the token-gated admin API.
pub fn build_router(state: SharedState) -> Router {
    let admin_routes = Router::new()
        .route("/migrations", get(admin::list_migrations))
        .route("/migrations/run", post(admin::run_migrations))
        .route(
            "/settings",
            get(admin::list_settings).put(admin::update_settings),
        )
        .route("/storage", get(admin::storage_report))
        .route("/database", get(admin::database_stats))
        .route("/database/backup", post(admin::create_backup))
        .route("/database/backups", get(admin::list_backups))
        .route("/database/backups/{filename}", delete(admin::delete_backup))
        .route("/database/backups/{filename}/stats", get(admin::backup_stats))
        .route("/database/restore", post(admin::restore_backup))
        .route("/database/reset", post(admin::reset_database))
        .route("/logs", get(admin::list_logs))
        .route("/logs/export", get(admin::export_logs))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(public::health))
        .route("/api/status", get(public::status))
        .nest("/api/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Admin gate: constant-time bearer token check. Without a configured token
/// the admin API is disabled outright rather than left open.
async fn require_admin(State(state): State<SharedState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.config.admin.token.as_deref() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "error": "admin API disabled: no admin token configured" })),
        )
            .into_response();
    };

    let presented = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match presented {
        Some(token) if verify_admin_token(expected, token) => next.run(req).await,
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid or missing admin token" })),
        )
            .into_response(),
    }
}
