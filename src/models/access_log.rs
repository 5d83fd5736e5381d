use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of an access log row: created `Pending`, moved once to a
/// terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    Pending,
    Success,
    Error,
}

impl AccessStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessStatus::Pending => "pending",
            AccessStatus::Success => "success",
            AccessStatus::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(AccessStatus::Pending),
            "success" => Some(AccessStatus::Success),
            "error" => Some(AccessStatus::Error),
            _ => None,
        }
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AccessLog {
    pub id: i64,
    pub user_id: i64,
    pub operation_id: i64,
    pub access_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_params: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    pub status: AccessStatus,
}

/// Insert payload for a fresh `pending` row.
#[derive(Debug, Clone)]
pub struct NewAccessLog {
    pub user_id: i64,
    pub operation_id: i64,
    pub access_time: DateTime<Utc>,
    pub search_params: String,
    pub ip_address: Option<String>,
}

#[derive(Debug, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AccessLogQuery {
    /// Number of rows to return (1-100, default 10).
    pub limit: Option<i64>,
    /// Restrict to one user's attempts.
    pub user_id: Option<i64>,
}
