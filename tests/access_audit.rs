use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::tempdir;

use erp_reports::audit::{AccessAuditor, AccessLogStore, AuditError, SqliteAccessLogStore, NO_AUDIT_RECORD};
use erp_reports::models::access_log::AccessStatus;

async fn setup_store(dir: &tempfile::TempDir) -> Result<Arc<SqliteAccessLogStore>> {
    let opts = SqliteConnectOptions::new()
        .filename(dir.path().join("audit.db"))
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator = sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    Ok(Arc::new(SqliteAccessLogStore::new(pool)))
}

#[tokio::test]
async fn record_moves_from_pending_to_success_once() -> Result<()> {
    let dir = tempdir()?;
    let store = setup_store(&dir).await?;
    let auditor = AccessAuditor::new(store.clone());

    let pending = auditor
        .begin(7, 1, r#"{"period":"7days"}"#.to_string(), Some("10.0.0.5".to_string()))
        .await;
    let log_id = pending.log_id();
    assert!(log_id > NO_AUDIT_RECORD);

    let row = store.find(log_id).await?.expect("row written");
    assert_eq!(row.status, AccessStatus::Pending);
    assert_eq!(row.user_id, 7);
    assert_eq!(row.operation_id, 1);
    assert_eq!(row.ip_address.as_deref(), Some("10.0.0.5"));
    assert_eq!(row.search_params.as_deref(), Some(r#"{"period":"7days"}"#));

    pending.finish(AccessStatus::Success).await;
    assert_eq!(store.find(log_id).await?.expect("row").status, AccessStatus::Success);

    // terminal rows never move again
    auditor.finish(log_id, AccessStatus::Error).await;
    assert_eq!(store.find(log_id).await?.expect("row").status, AccessStatus::Success);
    assert!(!store.update_status(log_id, AccessStatus::Error).await?);

    Ok(())
}

#[tokio::test]
async fn pending_is_not_a_valid_transition() -> Result<()> {
    let dir = tempdir()?;
    let store = setup_store(&dir).await?;
    let auditor = AccessAuditor::new(store.clone());

    let log_id = auditor.try_begin(1, 1, "{}".to_string(), None).await?;
    let err = store.update_status(log_id, AccessStatus::Pending).await.unwrap_err();
    assert!(matches!(err, AuditError::NotTerminal));

    auditor.finish(log_id, AccessStatus::Error).await;
    assert_eq!(store.find(log_id).await?.expect("row").status, AccessStatus::Error);

    Ok(())
}

#[tokio::test]
async fn finishing_the_sentinel_touches_nothing() -> Result<()> {
    let dir = tempdir()?;
    let store = setup_store(&dir).await?;
    let auditor = AccessAuditor::new(store.clone());

    auditor.finish(NO_AUDIT_RECORD, AccessStatus::Success).await;
    assert!(store.recent(None, None).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn dropped_guard_closes_record_as_error() -> Result<()> {
    let dir = tempdir()?;
    let store = setup_store(&dir).await?;
    let auditor = AccessAuditor::new(store.clone());

    let log_id = {
        let pending = auditor.begin(3, 2, "{}".to_string(), None).await;
        pending.log_id()
    };

    let mut status = AccessStatus::Pending;
    for _ in 0..50 {
        status = store.find(log_id).await?.expect("row").status;
        if status != AccessStatus::Pending {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(status, AccessStatus::Error);

    Ok(())
}

#[tokio::test]
async fn recent_is_newest_first_clamped_and_filterable() -> Result<()> {
    let dir = tempdir()?;
    let store = setup_store(&dir).await?;
    let auditor = AccessAuditor::new(store.clone());

    let mut ids = Vec::new();
    for i in 0..120 {
        let user_id = if i % 2 == 0 { 1 } else { 2 };
        ids.push(auditor.try_begin(user_id, 1, "{}".to_string(), None).await?);
    }

    let default = store.recent(None, None).await?;
    assert_eq!(default.len(), 10);
    assert_eq!(default[0].id, *ids.last().expect("ids"));

    assert_eq!(store.recent(Some(1000), None).await?.len(), 100);
    assert_eq!(store.recent(Some(0), None).await?.len(), 10);
    assert_eq!(store.recent(Some(3), None).await?.len(), 3);

    let only_user_two = store.recent(Some(100), Some(2)).await?;
    assert_eq!(only_user_two.len(), 60);
    assert!(only_user_two.iter().all(|log| log.user_id == 2));

    Ok(())
}
