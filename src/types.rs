use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
use crate::format::format_with_commas;

/// GA4 metric reported by this service
pub const PAGEVIEWS_METRIC: &str = "screenPageViews";

/// Placeholder name used whenever the Admin API lookup fails
pub fn placeholder_name(property_id: &str) -> String {
    format!("Property {}", property_id)
}

/// Inclusive calendar date range sent to the Data API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Yesterday through `today`
    pub fn trailing_day(today: NaiveDate) -> Self {
        Self {
            start: today.pred_opt().unwrap_or(today),
            end: today,
        }
    }

    /// Yesterday through today on the local calendar
    pub fn current() -> Self {
        Self::trailing_day(Local::now().date_naive())
    }
}

/// Result for one property, as returned by the batch endpoints
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyResult {
    pub property_id: String,
    pub property_name: String,
    pub pageviews: Option<u64>,
    pub pageviews_formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub failure: Option<FetchError>,
}

impl PropertyResult {
    pub fn success(property_id: String, property_name: String, pageviews: u64) -> Self {
        Self {
            property_id,
            property_name,
            pageviews: Some(pageviews),
            pageviews_formatted: Some(format_with_commas(pageviews)),
            error: None,
            failure: None,
        }
    }

    pub fn failure(property_id: String, property_name: String, error: FetchError) -> Self {
        Self {
            property_id,
            property_name,
            pageviews: None,
            pageviews_formatted: None,
            error: Some(error.to_string()),
            failure: Some(error),
        }
    }
}

/// Response body of the batch endpoints
#[derive(Debug, Clone, Serialize)]
pub struct BatchResponse {
    pub properties: Vec<PropertyResult>,
    pub total: u64,
}

impl BatchResponse {
    pub fn new(properties: Vec<PropertyResult>) -> Self {
        let total = properties
            .iter()
            .filter_map(|p| p.pageviews)
            .fold(0u64, u64::saturating_add);
        Self { properties, total }
    }
}

/// `runReport` request body
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportRequest {
    pub date_ranges: Vec<ReportDateRange>,
    pub metrics: Vec<Metric>,
}

impl RunReportRequest {
    pub fn pageviews(range: DateRange) -> Self {
        Self {
            date_ranges: vec![ReportDateRange {
                start_date: range.start.format("%Y-%m-%d").to_string(),
                end_date: range.end.format("%Y-%m-%d").to_string(),
            }],
            metrics: vec![Metric {
                name: PAGEVIEWS_METRIC.to_string(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportDateRange {
    pub start_date: String,
    pub end_date: String,
}

#[derive(Debug, Serialize)]
pub struct Metric {
    pub name: String,
}

/// `runReport` response, trimmed to the fields we read
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReportResponse {
    #[serde(default)]
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Row {
    #[serde(default)]
    pub metric_values: Vec<MetricValue>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricValue {
    #[serde(default)]
    pub value: Option<String>,
}

impl RunReportResponse {
    /// Page views from the first row; zero when the report has no rows
    pub fn pageviews(&self) -> Result<u64, FetchError> {
        let Some(row) = self.rows.first() else {
            return Ok(0);
        };

        let raw = row
            .metric_values
            .first()
            .and_then(|v| v.value.as_deref())
            .ok_or_else(|| FetchError::Upstream("report row has no metric value".to_string()))?;

        raw.trim()
            .parse()
            .map_err(|_| FetchError::Upstream(format!("invalid metric value: {:?}", raw)))
    }
}

/// Admin API property, trimmed to the fields we read
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminProperty {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Google API error envelope
#[derive(Debug, Deserialize)]
pub struct GoogleErrorResponse {
    pub error: GoogleError,
}

#[derive(Debug, Deserialize)]
pub struct GoogleError {
    #[serde(default)]
    pub code: Option<u16>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}
