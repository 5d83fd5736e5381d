//! Report data sources over the ERP mirror tables.
//!
//! Sources hand back display-ready rows: dates as `dd/mm/yyyy`, amounts
//! already formatted for their currency.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use super::format::{display_stored_date, format_local_amount, format_transaction_amount};
use super::window::ReportWindow;
use crate::models::report::ReportRow;

#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("report query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("malformed report row: {0}")]
    Row(String),
    #[error("report query timed out after {0:?}")]
    TimedOut(Duration),
}

#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Rows whose document date lies in `window`. `department_id` 0 means all
    /// departments; whether a non-zero id narrows is up to the source.
    async fn fetch(&self, window: &ReportWindow, department_id: i64) -> Result<Vec<ReportRow>, SourceError>;
}

fn bind_bounds(window: &ReportWindow) -> (String, String) {
    (
        window.from.format("%Y-%m-%d %H:%M:%S").to_string(),
        window.to.format("%Y-%m-%d %H:%M:%S%.9f").to_string(),
    )
}

fn text(row: &SqliteRow, column: &str) -> Result<String, SourceError> {
    row.try_get::<Option<String>, _>(column)
        .map(Option::unwrap_or_default)
        .map_err(|e| SourceError::Row(format!("{column}: {e}")))
}

fn amount(row: &SqliteRow, column: &str) -> Result<f64, SourceError> {
    row.try_get::<Option<f64>, _>(column)
        .map(Option::unwrap_or_default)
        .map_err(|e| SourceError::Row(format!("{column}: {e}")))
}

/// Sales orders that are neither voided nor invoiced yet.
#[derive(Debug, Clone)]
pub struct Sales230Source {
    pool: SqlitePool,
}

impl Sales230Source {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<ReportRow, SourceError> {
        let currency_code = text(row, "currency_code")?;
        let transaction_total = amount(row, "amount")? + amount(row, "tax")?;
        let local_total = amount(row, "local_amount")? + amount(row, "local_tax")?;

        Ok(ReportRow::new()
            .with("document_date", display_stored_date(&text(row, "doc_date")?))
            .with(
                "sales_order_number",
                format!("{}-{}", text(row, "order_type")?, text(row, "order_no")?),
            )
            .with("customer_name", text(row, "customer_name")?)
            .with("currency_type", format_transaction_amount(transaction_total, &currency_code))
            .with("currency", format_local_amount(local_total))
            .with("detailed_order_number", text(row, "detail_order_no")?)
            .with("invoice_number", text(row, "invoice_number")?)
            .with("notes", text(row, "notes")?))
    }
}

#[async_trait]
impl ReportSource for Sales230Source {
    async fn fetch(&self, window: &ReportWindow, department_id: i64) -> Result<Vec<ReportRow>, SourceError> {
        let (from, to) = bind_bounds(window);
        tracing::debug!(%from, %to, department_id, "querying sales 230");

        let rows = sqlx::query(
            r#"
            SELECT doc_date, order_type, order_no, customer_name, currency_code,
                   amount, tax, local_amount, local_tax,
                   detail_order_no, invoice_number, notes
            FROM sales_orders
            WHERE voided = 0 AND invoiced = 0
              AND datetime(doc_date) >= ? AND datetime(doc_date) <= ?
            ORDER BY doc_date, id
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_row).collect()
    }
}

/// Receivable documents, narrowed to the caller's department when one is set.
#[derive(Debug, Clone)]
pub struct Receivables610Source {
    pool: SqlitePool,
}

impl Receivables610Source {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: &SqliteRow) -> Result<ReportRow, SourceError> {
        let currency_code = text(row, "currency_code")?;
        let transaction_total = amount(row, "amount")? + amount(row, "tax")?;
        let local_total = amount(row, "local_amount")? + amount(row, "local_tax")?;

        Ok(ReportRow::new()
            .with("doc_date", display_stored_date(&text(row, "doc_date")?))
            .with("ar_type", format!("{}-{}", text(row, "ar_type")?, text(row, "ar_no")?))
            .with("shipping_order", text(row, "shipping_order")?)
            .with("customer_name", text(row, "customer_name")?)
            .with("total_amt_trans", format_transaction_amount(transaction_total, &currency_code))
            .with("total_amt", format_local_amount(local_total))
            .with("order_no", text(row, "order_no")?)
            .with("invoice_number", text(row, "invoice_number")?)
            .with("notes", text(row, "notes")?))
    }
}

#[async_trait]
impl ReportSource for Receivables610Source {
    async fn fetch(&self, window: &ReportWindow, department_id: i64) -> Result<Vec<ReportRow>, SourceError> {
        let (from, to) = bind_bounds(window);
        tracing::debug!(%from, %to, department_id, "querying receivables 610");

        let rows = sqlx::query(
            r#"
            SELECT doc_date, ar_type, ar_no, shipping_order, customer_name, currency_code,
                   amount, tax, local_amount, local_tax,
                   order_no, invoice_number, notes
            FROM receivables
            WHERE datetime(doc_date) >= ? AND datetime(doc_date) <= ?
              AND (? = 0 OR department_id = ?)
            ORDER BY doc_date, id
            "#,
        )
        .bind(from)
        .bind(to)
        .bind(department_id)
        .bind(department_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::map_row).collect()
    }
}
