use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::models::access_log::{AccessLog, AccessStatus};
use crate::models::rbac::Operation;

fn decode_error(message: String) -> sqlx::Error {
    sqlx::Error::Decode(message.into())
}

pub(crate) fn parse_datetime(s: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    let s = s.trim();

    // RFC3339 (2025-11-19T12:34:56Z)
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    // SQLite CURRENT_TIMESTAMP, optionally with fractional seconds
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Ok(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive_date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let ndt = naive_date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| decode_error(format!("invalid datetime: {} out of range", s)))?;
        return Ok(Utc.from_utc_datetime(&ndt));
    }

    Err(decode_error(format!("invalid datetime: {}", s)))
}

fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, sqlx::Error>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name)
}

pub fn operation_from_row(row: &SqliteRow) -> Result<Operation, sqlx::Error> {
    let created_at: String = column(row, "created_at")?;
    let updated_at: String = column(row, "updated_at")?;

    Ok(Operation {
        id: column(row, "id")?,
        name: column(row, "name")?,
        code: column(row, "code")?,
        description: column(row, "description")?,
        created_at: parse_datetime(&created_at)?,
        updated_at: parse_datetime(&updated_at)?,
    })
}

pub fn access_log_from_row(row: &SqliteRow) -> Result<AccessLog, sqlx::Error> {
    let access_time: String = column(row, "access_time")?;
    let status_s: String = column(row, "status")?;
    let status = AccessStatus::parse(&status_s)
        .ok_or_else(|| decode_error(format!("invalid access status: {}", status_s)))?;

    Ok(AccessLog {
        id: column(row, "id")?,
        user_id: column(row, "user_id")?,
        operation_id: column(row, "operation_id")?,
        access_time: parse_datetime(&access_time)?,
        search_params: column(row, "search_params")?,
        ip_address: column(row, "ip_address")?,
        status,
    })
}
