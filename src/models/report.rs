use chrono::{DateTime, NaiveDateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use utoipa::ToSchema;

/// Body of the view and export endpoints. Either `period` or both dates.
/// When both are present `period` wins.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct DateRangeRequest {
    /// `YYYY-MM-DD`, `YYYY-MM-DDTHH:MM:SS` or RFC 3339.
    #[serde(default, alias = "fromDate", skip_serializing_if = "Option::is_none")]
    #[schema(example = "2024-03-01")]
    pub from_date: Option<String>,
    #[serde(default, alias = "toDate", skip_serializing_if = "Option::is_none")]
    #[schema(example = "2024-03-15")]
    pub to_date: Option<String>,
    /// One of `7days`, `30days`, `3months`, `currentmonth`, `lastmonth`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(example = "currentmonth")]
    pub period: Option<String>,
}

impl DateRangeRequest {
    pub fn for_period(period: impl Into<String>) -> Self {
        Self {
            period: Some(period.into()),
            ..Self::default()
        }
    }

    pub fn between(from_date: impl Into<String>, to_date: impl Into<String>) -> Self {
        Self {
            from_date: Some(from_date.into()),
            to_date: Some(to_date.into()),
            period: None,
        }
    }

    /// The period symbol, ignoring blanks.
    pub fn period(&self) -> Option<&str> {
        self.period.as_deref().map(str::trim).filter(|p| !p.is_empty())
    }
}

/// The request as it is written to the audit trail: the resolved bounds, not
/// whatever the client sent.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<&'a str>,
    pub from_date: NaiveDateTime,
    pub to_date: NaiveDateTime,
}

/// One display-ready report line. Field order is the order fields were pushed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportRow {
    fields: Vec<(String, String)>,
}

impl ReportRow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: &str, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((field.to_string(), value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Serialize for ReportRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, value) in &self.fields {
            map.serialize_entry(field, value)?;
        }
        map.end()
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReportDataResponse {
    #[schema(example = "Report: Tháng hiện tại")]
    pub report_name: String,
    pub generated_at: DateTime<Utc>,
    pub from_date: NaiveDateTime,
    pub to_date: NaiveDateTime,
    /// Column order of every item.
    pub columns: Vec<String>,
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<ReportRow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_serializes_in_insertion_order() {
        let row = ReportRow::new()
            .with("zeta", "1")
            .with("alpha", "2")
            .with("zeta", "3");
        let json = serde_json::to_string(&row).expect("serialize");
        assert_eq!(json, r#"{"zeta":"3","alpha":"2"}"#);
    }

    #[test]
    fn accepts_camel_case_dates() {
        let req: DateRangeRequest =
            serde_json::from_str(r#"{"fromDate":"2024-01-01","toDate":"2024-01-31"}"#).expect("parse");
        assert_eq!(req.from_date.as_deref(), Some("2024-01-01"));
        assert_eq!(req.to_date.as_deref(), Some("2024-01-31"));
        assert_eq!(req.period(), None);
    }

    #[test]
    fn blank_period_is_absent() {
        assert_eq!(DateRangeRequest::for_period("  ").period(), None);
    }
}
