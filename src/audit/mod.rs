//! Access audit trail.
//!
//! Every authorized report run gets one `access_logs` row: written `pending`
//! before the data source is touched, then moved once to `success` or
//! `error`. Audit writes never block the report itself; a failed write is
//! logged and the run continues without a record.

mod context;
mod store;

pub use context::RequestContext;
pub use store::{clamp_limit, AccessLogStore, SqliteAccessLogStore, DEFAULT_RECENT_LIMIT, MAX_RECENT_LIMIT};

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::models::access_log::{AccessStatus, NewAccessLog};

/// Stands in for a record that could not be written. Finishing it is a no-op.
pub const NO_AUDIT_RECORD: i64 = 0;

const PARAMS_PLACEHOLDER: &str = r#"{"error":"failed to marshal search parameters"}"#;

#[derive(thiserror::Error, Debug)]
pub enum AuditError {
    #[error("access log store failed")]
    Store(#[from] sqlx::Error),
    #[error("access log can only move to a terminal status")]
    NotTerminal,
}

#[derive(Clone)]
pub struct AccessAuditor {
    store: Arc<dyn AccessLogStore>,
}

impl AccessAuditor {
    pub fn new(store: Arc<dyn AccessLogStore>) -> Self {
        Self { store }
    }

    pub async fn try_begin(
        &self,
        user_id: i64,
        operation_id: i64,
        search_params: String,
        ip_address: Option<String>,
    ) -> Result<i64, AuditError> {
        let entry = NewAccessLog {
            user_id,
            operation_id,
            access_time: Utc::now(),
            search_params,
            ip_address,
        };

        self.store.insert(&entry).await
    }

    /// Opens a pending record. On store failure the returned guard carries
    /// [`NO_AUDIT_RECORD`] and the caller proceeds unaudited.
    pub async fn begin(
        &self,
        user_id: i64,
        operation_id: i64,
        search_params: String,
        ip_address: Option<String>,
    ) -> PendingAccess {
        let log_id = match self.try_begin(user_id, operation_id, search_params, ip_address).await {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!(user_id, operation_id, error = %err, "failed to write access log");
                NO_AUDIT_RECORD
            }
        };

        PendingAccess {
            auditor: self.clone(),
            log_id,
            finished: false,
        }
    }

    /// Best effort. Errors are logged, never returned.
    pub async fn finish(&self, log_id: i64, status: AccessStatus) {
        if log_id <= NO_AUDIT_RECORD {
            return;
        }

        match self.store.update_status(log_id, status).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!(log_id, status = %status, "access log was not pending"),
            Err(err) => tracing::warn!(log_id, status = %status, error = %err, "failed to update access log"),
        }
    }
}

/// An open audit record. Dropping it unfinished (a cancelled request, a
/// panic) closes the record as `error` on the current runtime.
#[must_use = "a pending access record must be finished"]
pub struct PendingAccess {
    auditor: AccessAuditor,
    log_id: i64,
    finished: bool,
}

impl PendingAccess {
    pub fn log_id(&self) -> i64 {
        self.log_id
    }

    pub async fn finish(mut self, status: AccessStatus) {
        self.auditor.finish(self.log_id, status).await;
        self.finished = true;
    }
}

impl Drop for PendingAccess {
    fn drop(&mut self) {
        if self.finished || self.log_id <= NO_AUDIT_RECORD {
            return;
        }

        let auditor = self.auditor.clone();
        let log_id = self.log_id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    auditor.finish(log_id, AccessStatus::Error).await;
                });
            }
            Err(_) => tracing::warn!(log_id, "access log left pending: no runtime to finish it"),
        }
    }
}

/// JSON for the `search_params` column. Never fails: an unserializable value
/// is recorded as a fixed placeholder.
pub fn serialize_params<T: Serialize>(params: &T) -> String {
    serde_json::to_string(params).unwrap_or_else(|err| {
        tracing::warn!(error = %err, "failed to serialize search parameters");
        PARAMS_PLACEHOLDER.to_string()
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<HashMap<i64, AccessStatus>>,
        fail_insert: bool,
    }

    #[async_trait]
    impl AccessLogStore for MemoryStore {
        async fn insert(&self, _entry: &NewAccessLog) -> Result<i64, AuditError> {
            if self.fail_insert {
                return Err(AuditError::Store(sqlx::Error::PoolTimedOut));
            }
            let mut rows = self.rows.lock().unwrap();
            let id = rows.len() as i64 + 1;
            rows.insert(id, AccessStatus::Pending);
            Ok(id)
        }

        async fn update_status(&self, log_id: i64, status: AccessStatus) -> Result<bool, AuditError> {
            let mut rows = self.rows.lock().unwrap();
            match rows.get_mut(&log_id) {
                Some(current) if *current == AccessStatus::Pending => {
                    *current = status;
                    Ok(true)
                }
                _ => Ok(false),
            }
        }
    }

    fn status_of(store: &MemoryStore, id: i64) -> Option<AccessStatus> {
        store.rows.lock().unwrap().get(&id).copied()
    }

    #[tokio::test]
    async fn failed_insert_yields_sentinel() {
        let store = Arc::new(MemoryStore { fail_insert: true, ..Default::default() });
        let auditor = AccessAuditor::new(store.clone());

        let pending = auditor.begin(1, 1, "{}".into(), None).await;
        assert_eq!(pending.log_id(), NO_AUDIT_RECORD);
        pending.finish(AccessStatus::Success).await;
        assert!(store.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn status_moves_once() {
        let store = Arc::new(MemoryStore::default());
        let auditor = AccessAuditor::new(store.clone());

        let pending = auditor.begin(1, 2, "{}".into(), Some("10.0.0.1".into())).await;
        let id = pending.log_id();
        assert_eq!(status_of(&store, id), Some(AccessStatus::Pending));

        pending.finish(AccessStatus::Success).await;
        auditor.finish(id, AccessStatus::Error).await;
        assert_eq!(status_of(&store, id), Some(AccessStatus::Success));
    }

    #[tokio::test]
    async fn dropped_record_is_closed_as_error() {
        let store = Arc::new(MemoryStore::default());
        let auditor = AccessAuditor::new(store.clone());

        let pending = auditor.begin(1, 2, "{}".into(), None).await;
        let id = pending.log_id();
        drop(pending);

        for _ in 0..50 {
            if status_of(&store, id) != Some(AccessStatus::Pending) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(status_of(&store, id), Some(AccessStatus::Error));
    }

    #[test]
    fn unserializable_params_use_placeholder() {
        let mut bad = HashMap::new();
        bad.insert((1, 2), "tuple keys are not valid json object keys");

        let json = serialize_params(&bad);
        assert_eq!(json, PARAMS_PLACEHOLDER);
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed.get("error").is_some());
    }
}
