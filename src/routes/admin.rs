//! Audit trail administration.
//!
//! Every endpoint here requires the `access_log.view` operation.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};

use crate::app::AppState;
use crate::authz::{self, operations};
use crate::errors::AppError;
use crate::jwt::AuthUser;
use crate::models::access_log::{AccessLog, AccessLogQuery};
use crate::models::rbac::Operation;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/access-logs", get(list_access_logs))
        .route("/operations", get(list_operations))
}

/// Most recent report access attempts
#[utoipa::path(
    get,
    path = "/admin/access-logs",
    tag = "Admin",
    params(AccessLogQuery),
    responses(
        (status = 200, description = "Access logs, newest first", body = Vec<AccessLog>),
        (status = 403, description = "Missing access_log.view"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_access_logs(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<AccessLogQuery>,
) -> Result<Json<Vec<AccessLog>>, AppError> {
    authz::require(state.graph.as_ref(), auth.user_id, operations::ACCESS_LOG_VIEW).await?;

    let logs = state.access_logs.recent(query.limit, query.user_id).await?;
    Ok(Json(logs))
}

/// Registered operations
#[utoipa::path(
    get,
    path = "/admin/operations",
    tag = "Admin",
    responses(
        (status = 200, description = "All operations", body = Vec<Operation>),
        (status = 403, description = "Missing access_log.view"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_operations(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Operation>>, AppError> {
    authz::require(state.graph.as_ref(), auth.user_id, operations::ACCESS_LOG_VIEW).await?;

    Ok(Json(state.graph.list_operations().await?))
}
