use std::path::PathBuf;
use std::time::Duration;

use crate::errors::AppError;

const DEFAULT_MAX_SEARCH_MONTHS: u32 = 6;
const DEFAULT_DOWNLOAD_PATH: &str = "public/downloads";
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Settings for the report pipeline. Loaded once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// How far back (in months) a report window may start.
    pub max_search_months: u32,
    /// Directory exported artifacts are stored in for later download.
    pub download_dir: PathBuf,
    /// Upper bound for a single report data-source query.
    pub query_timeout: Duration,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            max_search_months: DEFAULT_MAX_SEARCH_MONTHS,
            download_dir: PathBuf::from(DEFAULT_DOWNLOAD_PATH),
            query_timeout: Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        }
    }
}

impl ReportConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let max_search_months = std::env::var("MAX_SEARCH_MONTHS")
            .map(|val| val.parse::<u32>())
            .unwrap_or(Ok(DEFAULT_MAX_SEARCH_MONTHS))
            .map_err(|_| AppError::configuration("MAX_SEARCH_MONTHS must be a non-negative integer"))?;

        let download_dir = std::env::var("REPORT_DOWNLOAD_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_DOWNLOAD_PATH));

        let timeout_secs = std::env::var("REPORT_QUERY_TIMEOUT_SECS")
            .map(|val| val.parse::<u64>())
            .unwrap_or(Ok(DEFAULT_QUERY_TIMEOUT_SECS))
            .map_err(|_| AppError::configuration("REPORT_QUERY_TIMEOUT_SECS must be a valid integer"))?;

        if timeout_secs == 0 {
            return Err(AppError::configuration("REPORT_QUERY_TIMEOUT_SECS must be greater than zero"));
        }

        Ok(Self {
            max_search_months,
            download_dir,
            query_timeout: Duration::from_secs(timeout_secs),
        })
    }
}
