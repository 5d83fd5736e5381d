//! The report pipeline: resolve a window, authorize, audit, fetch, render.

pub mod artifacts;
pub mod assembler;
pub mod exporter;
pub mod format;
pub mod labels;
pub mod sources;
pub mod window;

pub use artifacts::ArtifactStore;
pub use assembler::{ReportAssembler, ReportCaller, ReportCatalog, ReportData, ReportDefinition, ReportServices};
pub use exporter::{Artifact, RenderError, TabularExporter};
pub use sources::{Receivables610Source, ReportSource, Sales230Source, SourceError};
pub use window::WindowError;

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::authz::operations;

pub const SALES_230: &str = "sales-230";
pub const RECEIVABLES_610: &str = "receivables-610";

pub const SALES_230_COLUMNS: &[&str] = &[
    "document_date",
    "sales_order_number",
    "customer_name",
    "currency_type",
    "currency",
    "detailed_order_number",
    "invoice_number",
    "notes",
];

pub const RECEIVABLES_610_COLUMNS: &[&str] = &[
    "doc_date",
    "ar_type",
    "shipping_order",
    "customer_name",
    "total_amt_trans",
    "total_amt",
    "order_no",
    "invoice_number",
    "notes",
];

#[derive(thiserror::Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    InvalidWindow(#[from] WindowError),
    #[error("permission denied for {operation}")]
    PermissionDenied { operation: String },
    #[error("permission check unavailable")]
    PermissionCheckUnavailable(#[source] sqlx::Error),
    #[error("no data found for the requested window")]
    NoData,
    #[error("report data source failed")]
    DataSourceFailure(#[source] SourceError),
    #[error("report rendering failed")]
    RenderFailure(#[source] RenderError),
}

pub fn sales_230(pool: SqlitePool) -> ReportDefinition {
    ReportDefinition {
        key: SALES_230,
        export_title: "Export Sales 230",
        columns: SALES_230_COLUMNS,
        view_operation: operations::SALES_230_VIEW,
        export_operation: operations::SALES_230_EXPORT,
        source: Arc::new(Sales230Source::new(pool)),
    }
}

pub fn receivables_610(pool: SqlitePool) -> ReportDefinition {
    ReportDefinition {
        key: RECEIVABLES_610,
        export_title: "Export Sales 610",
        columns: RECEIVABLES_610_COLUMNS,
        view_operation: operations::RECEIVABLES_610_VIEW,
        export_operation: operations::RECEIVABLES_610_EXPORT,
        source: Arc::new(Receivables610Source::new(pool)),
    }
}

/// Every report this service knows, wired to the same pipeline services.
pub fn default_catalog(pool: SqlitePool, services: ReportServices) -> ReportCatalog {
    let mut catalog = ReportCatalog::new();
    catalog.register(ReportAssembler::new(sales_230(pool.clone()), services.clone()));
    catalog.register(ReportAssembler::new(receivables_610(pool), services));
    catalog
}
