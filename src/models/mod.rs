pub mod access_log;
pub mod rbac;
pub mod report;
