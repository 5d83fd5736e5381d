use async_trait::async_trait;
use chrono::SecondsFormat;
use sqlx::SqlitePool;

use super::AuditError;
use crate::db::row_parsers::access_log_from_row;
use crate::errors::AppError;
use crate::models::access_log::{AccessLog, AccessStatus, NewAccessLog};

pub const DEFAULT_RECENT_LIMIT: i64 = 10;
pub const MAX_RECENT_LIMIT: i64 = 100;

const ACCESS_LOG_COLUMNS: &str = "id, user_id, operation_id, access_time, search_params, ip_address, status";

#[async_trait]
pub trait AccessLogStore: Send + Sync {
    /// Appends a `pending` row and returns its id.
    async fn insert(&self, entry: &NewAccessLog) -> Result<i64, AuditError>;

    /// Moves a `pending` row to `status`. Returns false when no pending row
    /// with that id exists.
    async fn update_status(&self, log_id: i64, status: AccessStatus) -> Result<bool, AuditError>;
}

#[derive(Debug, Clone)]
pub struct SqliteAccessLogStore {
    pool: SqlitePool,
}

impl SqliteAccessLogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, log_id: i64) -> Result<Option<AccessLog>, AppError> {
        let row = sqlx::query(&format!("SELECT {ACCESS_LOG_COLUMNS} FROM access_logs WHERE id = ?"))
            .bind(log_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(access_log_from_row).transpose()?)
    }

    /// Newest first, optionally for one user.
    pub async fn recent(&self, limit: Option<i64>, user_id: Option<i64>) -> Result<Vec<AccessLog>, AppError> {
        let limit = clamp_limit(limit);

        let rows = match user_id {
            Some(user_id) => {
                sqlx::query(&format!(
                    "SELECT {ACCESS_LOG_COLUMNS} FROM access_logs WHERE user_id = ? ORDER BY access_time DESC, id DESC LIMIT ?"
                ))
                .bind(user_id)
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {ACCESS_LOG_COLUMNS} FROM access_logs ORDER BY access_time DESC, id DESC LIMIT ?"
                ))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        let logs = rows.iter().map(access_log_from_row).collect::<Result<_, _>>()?;
        Ok(logs)
    }
}

#[async_trait]
impl AccessLogStore for SqliteAccessLogStore {
    async fn insert(&self, entry: &NewAccessLog) -> Result<i64, AuditError> {
        let result = sqlx::query(
            r#"
            INSERT INTO access_logs (user_id, operation_id, access_time, search_params, ip_address, status)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.operation_id)
        .bind(entry.access_time.to_rfc3339_opts(SecondsFormat::Micros, true))
        .bind(&entry.search_params)
        .bind(&entry.ip_address)
        .bind(AccessStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    async fn update_status(&self, log_id: i64, status: AccessStatus) -> Result<bool, AuditError> {
        if status == AccessStatus::Pending {
            return Err(AuditError::NotTerminal);
        }

        let result = sqlx::query("UPDATE access_logs SET status = ? WHERE id = ? AND status = ?")
            .bind(status.as_str())
            .bind(log_id)
            .bind(AccessStatus::Pending.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

/// Missing or non-positive means the default; anything above the cap is capped.
pub fn clamp_limit(limit: Option<i64>) -> i64 {
    match limit {
        Some(n) if n > MAX_RECENT_LIMIT => MAX_RECENT_LIMIT,
        Some(n) if n > 0 => n,
        _ => DEFAULT_RECENT_LIMIT,
    }
}
