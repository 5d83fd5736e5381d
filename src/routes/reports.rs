//! Report endpoints: view, export and download of stored exports.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use crate::app::AppState;
use crate::errors::{AppError, AppResult};
use crate::jwt::AuthUser;
use crate::models::report::{DateRangeRequest, ReportDataResponse};
use crate::reports::exporter::XLSX_CONTENT_TYPE;
use crate::reports::{ReportAssembler, ReportCaller};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/reports/:report_key", post(view_report))
        .route("/reports/:report_key/export", post(export_report))
        .route("/downloads/:file_name", get(download_report))
}

fn assembler<'a>(state: &'a AppState, report_key: &str) -> AppResult<&'a ReportAssembler> {
    state
        .reports
        .get(report_key)
        .ok_or_else(|| AppError::not_found(format!("unknown report: {report_key}")))
}

fn caller(auth: &AuthUser) -> ReportCaller {
    ReportCaller {
        user_id: auth.user_id,
        department_id: auth.department_id,
        client_address: auth.context.ip.clone(),
    }
}

/// Report rows for a date window
#[utoipa::path(
    post,
    path = "/reports/{report_key}",
    tag = "Reports",
    params(("report_key" = String, Path, description = "Report type, e.g. sales-230 or receivables-610")),
    request_body = DateRangeRequest,
    responses(
        (status = 200, description = "Report data (possibly empty)", body = ReportDataResponse),
        (status = 400, description = "Invalid period or date range"),
        (status = 403, description = "Missing view permission"),
        (status = 404, description = "Unknown report"),
        (status = 503, description = "Permission check unavailable"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn view_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(report_key): Path<String>,
    Json(request): Json<DateRangeRequest>,
) -> AppResult<Json<ReportDataResponse>> {
    let assembler = assembler(&state, &report_key)?;
    let data = assembler.get_report_data(&caller(&auth), &request).await?;

    Ok(Json(ReportDataResponse {
        report_name: data.title,
        generated_at: data.generated_at,
        from_date: data.window.from,
        to_date: data.window.to,
        columns: assembler.definition().columns.iter().map(|c| c.to_string()).collect(),
        items: data.rows,
    }))
}

/// Export report rows as a spreadsheet
#[utoipa::path(
    post,
    path = "/reports/{report_key}/export",
    tag = "Reports",
    params(("report_key" = String, Path, description = "Report type, e.g. sales-230 or receivables-610")),
    request_body = DateRangeRequest,
    responses(
        (status = 200, description = "Spreadsheet file", body = String, content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 400, description = "Invalid period or date range"),
        (status = 403, description = "Missing export permission"),
        (status = 404, description = "Unknown report, or no data to export (error = no_data)"),
        (status = 503, description = "Permission check unavailable"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn export_report(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(report_key): Path<String>,
    Json(request): Json<DateRangeRequest>,
) -> AppResult<Response> {
    let assembler = assembler(&state, &report_key)?;
    let artifact = assembler.export_report(&caller(&auth), &request).await?;

    if let Err(err) = state.artifacts.save(&artifact).await {
        tracing::warn!(file_name = %artifact.file_name, error = %err, "failed to store exported report");
    }

    file_response(artifact.content_type, &artifact.file_name, artifact.bytes)
}

/// Download a previously exported file
#[utoipa::path(
    get,
    path = "/downloads/{file_name}",
    tag = "Reports",
    params(("file_name" = String, Path, description = "File name returned by an export")),
    responses(
        (status = 200, description = "Stored file", body = String, content_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
        (status = 400, description = "File name contains a path segment"),
        (status = 404, description = "File not found"),
    ),
    security(("bearerAuth" = []))
)]
pub async fn download_report(
    State(state): State<AppState>,
    _auth: AuthUser,
    Path(file_name): Path<String>,
) -> AppResult<Response> {
    let bytes = state.artifacts.open(&file_name).await?;
    let content_type = if file_name.ends_with(".xlsx") {
        XLSX_CONTENT_TYPE
    } else {
        "application/octet-stream"
    };

    file_response(content_type, &file_name, bytes)
}

fn file_response(content_type: &str, file_name: &str, bytes: Vec<u8>) -> AppResult<Response> {
    let disposition = HeaderValue::from_str(&content_disposition(file_name))
        .map_err(|_| AppError::internal("invalid file name header"))?;
    let content_type =
        HeaderValue::from_str(content_type).map_err(|_| AppError::internal("invalid content type header"))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, content_type), (header::CONTENT_DISPOSITION, disposition)],
        Body::from(bytes),
    )
        .into_response())
}

/// `attachment` with an ASCII fallback name plus the UTF-8 name (RFC 6266).
fn content_disposition(file_name: &str) -> String {
    let fallback: String = file_name
        .chars()
        .map(|c| if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' { c } else { '_' })
        .collect();

    let mut encoded = String::with_capacity(file_name.len() * 3);
    for byte in file_name.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => encoded.push(byte as char),
            _ => encoded.push_str(&format!("%{byte:02X}")),
        }
    }

    format!("attachment; filename=\"{fallback}\"; filename*=UTF-8''{encoded}")
}
