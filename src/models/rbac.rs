use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

// =============================================================================
// OPERATION
// =============================================================================

/// A permission unit. `code` is the stable handle used by checks; audit rows
/// store `id`, so renaming a code never orphans history.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct Operation {
    pub id: i64,
    pub name: String,
    #[schema(example = "sales_230.export")]
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// EFFECTIVE OPERATIONS (computed)
// =============================================================================

/// Union, over the caller's roles, of operations whose grant flag is set.
#[derive(Debug, Serialize, ToSchema)]
pub struct EffectiveOperations {
    pub user_id: i64,
    pub operations: Vec<EffectiveOperation>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EffectiveOperation {
    pub code: String,
    pub name: String,
    /// Roles that grant this operation.
    pub granted_by: Vec<String>,
}
