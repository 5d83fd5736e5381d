use std::sync::Arc;

use axum::http::Method;
use axum::routing::get;
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::audit::{AccessAuditor, SqliteAccessLogStore};
use crate::authz::SqlitePermissionGraph;
use crate::config::ReportConfig;
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::reports::labels::Labels;
use crate::reports::window::SystemClock;
use crate::reports::{default_catalog, ArtifactStore, ReportCatalog, ReportServices, TabularExporter};
use crate::routes::{admin, health, me, reports};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub graph: Arc<SqlitePermissionGraph>,
    pub access_logs: Arc<SqliteAccessLogStore>,
    pub reports: Arc<ReportCatalog>,
    pub artifacts: ArtifactStore,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, config: ReportConfig) -> Self {
        let graph = Arc::new(SqlitePermissionGraph::new(pool.clone()));
        let access_logs = Arc::new(SqliteAccessLogStore::new(pool.clone()));

        let services = ReportServices {
            graph: graph.clone(),
            auditor: AccessAuditor::new(access_logs.clone()),
            exporter: TabularExporter::new(Arc::new(Labels::vietnamese())),
            clock: Arc::new(SystemClock),
            max_months: config.max_search_months,
            query_timeout: config.query_timeout,
        };

        Self {
            reports: Arc::new(default_catalog(pool.clone(), services)),
            artifacts: ArtifactStore::new(config.download_dir),
            pool,
            jwt: Arc::new(jwt),
            graph,
            access_logs,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let report_config = ReportConfig::from_env()?;

    Ok(create_app_with(pool, jwt_config, report_config))
}

pub fn create_app_with(pool: SqlitePool, jwt: JwtConfig, config: ReportConfig) -> Router {
    let state = AppState::new(pool, jwt, config);

    tracing::info!(
        reports = ?state.reports.keys().collect::<Vec<_>>(),
        download_dir = %state.artifacts.dir().display(),
        "report catalog ready"
    );

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any)
        .expose_headers([axum::http::header::CONTENT_DISPOSITION]);

    Router::new()
        .route("/api/health", get(health::health))
        .route("/me/operations", get(me::my_operations))
        .merge(reports::routes())
        .nest("/admin", admin::routes())
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
