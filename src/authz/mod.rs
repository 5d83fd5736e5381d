//! Authorization: the role/operation permission graph.
//!
//! A user may perform an operation when at least one of their roles holds a
//! grant for it with the access flag set. Operations are addressed by code.
//! There is no super-user shortcut and no enforcement mode: a failed lookup
//! never turns into an allow.

mod graph;

pub use graph::SqlitePermissionGraph;

use async_trait::async_trait;

use crate::errors::AppError;
use crate::models::rbac::Operation;

/// Well-known operation codes
pub mod operations {
    // Sales 230 (uninvoiced sales orders)
    pub const SALES_230_VIEW: &str = "sales_230.view";
    pub const SALES_230_EXPORT: &str = "sales_230.export";

    // Receivables 610
    pub const RECEIVABLES_610_VIEW: &str = "receivables_610.view";
    pub const RECEIVABLES_610_EXPORT: &str = "receivables_610.export";

    // Audit trail
    pub const ACCESS_LOG_VIEW: &str = "access_log.view";
}

#[derive(thiserror::Error, Debug)]
pub enum AuthzError {
    /// No operation is registered under this code.
    #[error("operation not found: {0}")]
    NotFound(String),
    /// The store could not answer. Callers must treat this as "not allowed".
    #[error("permission store unavailable")]
    Unavailable(#[from] sqlx::Error),
}

#[async_trait]
pub trait PermissionGraph: Send + Sync {
    async fn find_operation(&self, code: &str) -> Result<Operation, AuthzError>;

    /// True when any role of `user_id` grants `operation_id` with the flag set.
    async fn has_operation_access(&self, user_id: i64, operation_id: i64) -> Result<bool, AuthzError>;

    async fn has_access(&self, user_id: i64, code: &str) -> Result<bool, AuthzError> {
        let operation = self.find_operation(code).await?;
        self.has_operation_access(user_id, operation.id).await
    }
}

/// Resolves `code` and checks `user_id` against it, for handlers outside the
/// report pipeline.
pub async fn require(graph: &dyn PermissionGraph, user_id: i64, code: &str) -> Result<Operation, AppError> {
    let operation = graph.find_operation(code).await?;
    let allowed = graph.has_operation_access(user_id, operation.id).await?;

    if !allowed {
        tracing::debug!(user_id, operation = %code, "permission denied");
        return Err(AppError::forbidden("you don't have permission to perform this operation"));
    }

    Ok(operation)
}

impl From<AuthzError> for AppError {
    fn from(value: AuthzError) -> Self {
        match value {
            AuthzError::NotFound(code) => {
                tracing::error!(operation = %code, "operation is not registered");
                AppError::forbidden("you don't have permission to perform this operation")
            }
            AuthzError::Unavailable(err) => {
                tracing::error!(error = %err, "permission check failed");
                AppError::service_unavailable("permission check is temporarily unavailable")
            }
        }
    }
}
