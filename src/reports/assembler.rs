use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::exporter::{Artifact, TabularExporter};
use super::format::display_window;
use super::sources::{ReportSource, SourceError};
use super::window::{resolve, validate_window, Clock, Period, ReportWindow};
use super::ReportError;
use crate::audit::{serialize_params, AccessAuditor, PendingAccess};
use crate::authz::{AuthzError, PermissionGraph};
use crate::models::access_log::AccessStatus;
use crate::models::rbac::Operation;
use crate::models::report::{DateRangeRequest, ReportRow, ResolvedRequest};

/// What makes one report type different from another.
#[derive(Clone)]
pub struct ReportDefinition {
    /// URL key, e.g. `sales-230`.
    pub key: &'static str,
    /// Title prefix for exported files.
    pub export_title: &'static str,
    /// Emitted columns, in order.
    pub columns: &'static [&'static str],
    pub view_operation: &'static str,
    pub export_operation: &'static str,
    pub source: Arc<dyn ReportSource>,
}

/// Collaborators shared by every report type.
#[derive(Clone)]
pub struct ReportServices {
    pub graph: Arc<dyn PermissionGraph>,
    pub auditor: AccessAuditor,
    pub exporter: TabularExporter,
    pub clock: Arc<dyn Clock>,
    pub max_months: u32,
    pub query_timeout: Duration,
}

/// The authenticated caller, as the claims provider vouches for them.
#[derive(Debug, Clone)]
pub struct ReportCaller {
    pub user_id: i64,
    /// 0 when not bound to a department.
    pub department_id: i64,
    pub client_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ReportData {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub window: ReportWindow,
    pub rows: Vec<ReportRow>,
}

pub struct ReportAssembler {
    definition: ReportDefinition,
    services: ReportServices,
}

impl ReportAssembler {
    pub fn new(definition: ReportDefinition, services: ReportServices) -> Self {
        Self { definition, services }
    }

    pub fn definition(&self) -> &ReportDefinition {
        &self.definition
    }

    pub async fn get_report_data(
        &self,
        caller: &ReportCaller,
        request: &DateRangeRequest,
    ) -> Result<ReportData, ReportError> {
        let (window, period) = self.prepare(request)?;
        let operation = self.authorize(caller.user_id, self.definition.view_operation).await?;
        let audit = self.begin_audit(caller, &operation, request, &window).await;

        let rows = match self.fetch(&window, caller.department_id).await {
            Ok(rows) => rows,
            Err(err) => {
                audit.finish(AccessStatus::Error).await;
                return Err(ReportError::DataSourceFailure(err));
            }
        };

        audit.finish(AccessStatus::Success).await;

        Ok(ReportData {
            title: self.view_title(period, &window),
            generated_at: Utc::now(),
            window,
            rows,
        })
    }

    pub async fn export_report(
        &self,
        caller: &ReportCaller,
        request: &DateRangeRequest,
    ) -> Result<Artifact, ReportError> {
        let (window, period) = self.prepare(request)?;
        let operation = self.authorize(caller.user_id, self.definition.export_operation).await?;
        let audit = self.begin_audit(caller, &operation, request, &window).await;

        let rows = match self.fetch(&window, caller.department_id).await {
            Ok(rows) => rows,
            Err(err) => {
                audit.finish(AccessStatus::Error).await;
                return Err(ReportError::DataSourceFailure(err));
            }
        };

        // an empty export is still a completed attempt
        if rows.is_empty() {
            audit.finish(AccessStatus::Success).await;
            return Err(ReportError::NoData);
        }

        let title = self.export_title(period, &window);
        match self.services.exporter.render(&rows, self.definition.columns, &title) {
            Ok(artifact) => {
                audit.finish(AccessStatus::Success).await;
                tracing::info!(
                    report = self.definition.key,
                    user_id = caller.user_id,
                    rows = rows.len(),
                    file_name = %artifact.file_name,
                    "report exported"
                );
                Ok(artifact)
            }
            Err(err) => {
                tracing::error!(report = self.definition.key, error = %err, "failed to render report");
                audit.finish(AccessStatus::Error).await;
                Err(ReportError::RenderFailure(err))
            }
        }
    }

    fn prepare(&self, request: &DateRangeRequest) -> Result<(ReportWindow, Option<Period>), ReportError> {
        let now = self.services.clock.now();
        let window = resolve(request, now)?;
        validate_window(&window, now, self.services.max_months)?;

        let period = request.period().map(str::parse::<Period>).transpose()?;
        tracing::debug!(report = self.definition.key, from = %window.from, to = %window.to, "resolved report window");

        Ok((window, period))
    }

    async fn authorize(&self, user_id: i64, code: &str) -> Result<Operation, ReportError> {
        let denied = || ReportError::PermissionDenied {
            operation: code.to_string(),
        };

        let operation = match self.services.graph.find_operation(code).await {
            Ok(operation) => operation,
            Err(AuthzError::NotFound(_)) => {
                tracing::error!(operation = %code, report = self.definition.key, "operation is not registered");
                return Err(denied());
            }
            Err(AuthzError::Unavailable(err)) => {
                tracing::error!(operation = %code, error = %err, "permission check failed");
                return Err(ReportError::PermissionCheckUnavailable(err));
            }
        };

        match self.services.graph.has_operation_access(user_id, operation.id).await {
            Ok(true) => Ok(operation),
            Ok(false) | Err(AuthzError::NotFound(_)) => {
                tracing::info!(user_id, operation = %code, "report access denied");
                Err(denied())
            }
            Err(AuthzError::Unavailable(err)) => {
                tracing::error!(operation = %code, error = %err, "permission check failed");
                Err(ReportError::PermissionCheckUnavailable(err))
            }
        }
    }

    async fn begin_audit(
        &self,
        caller: &ReportCaller,
        operation: &Operation,
        request: &DateRangeRequest,
        window: &ReportWindow,
    ) -> PendingAccess {
        let params = serialize_params(&ResolvedRequest {
            period: request.period(),
            from_date: window.from,
            to_date: window.to,
        });

        self.services
            .auditor
            .begin(caller.user_id, operation.id, params, caller.client_address.clone())
            .await
    }

    async fn fetch(&self, window: &ReportWindow, department_id: i64) -> Result<Vec<ReportRow>, SourceError> {
        let timeout = self.services.query_timeout;
        let result = match tokio::time::timeout(timeout, self.definition.source.fetch(window, department_id)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::TimedOut(timeout)),
        };

        if let Err(err) = &result {
            tracing::error!(report = self.definition.key, error = %err, "report data source failed");
        }
        result
    }

    fn view_title(&self, period: Option<Period>, window: &ReportWindow) -> String {
        match period {
            Some(period) => format!("Report: {}", self.services.exporter.labels().period(period)),
            None => format!("Report {}", display_window(window)),
        }
    }

    fn export_title(&self, period: Option<Period>, window: &ReportWindow) -> String {
        match period {
            Some(period) => format!(
                "{}: {}",
                self.definition.export_title,
                self.services.exporter.labels().period(period)
            ),
            None => format!("{} {}", self.definition.export_title, display_window(window)),
        }
    }
}

/// Report assemblers by key.
#[derive(Default)]
pub struct ReportCatalog {
    reports: BTreeMap<&'static str, ReportAssembler>,
}

impl ReportCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, assembler: ReportAssembler) {
        self.reports.insert(assembler.definition().key, assembler);
    }

    pub fn get(&self, key: &str) -> Option<&ReportAssembler> {
        self.reports.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.reports.keys().copied()
    }
}
