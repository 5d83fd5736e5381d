use axum::extract::State;
use axum::Json;

use crate::app::AppState;
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::rbac::EffectiveOperations;

/// Operations the caller can perform, with the roles granting each
#[utoipa::path(
    get,
    path = "/me/operations",
    tag = "Me",
    responses((status = 200, description = "Effective operations", body = EffectiveOperations)),
    security(("bearerAuth" = []))
)]
pub async fn my_operations(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<EffectiveOperations>> {
    Ok(Json(state.graph.effective_operations(auth.user_id).await?))
}
