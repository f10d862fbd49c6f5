use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered cultivation unit. The cached status fields mirror the
/// most recent crop analysis; the latest-photo blob is held in its own
/// column and fetched separately from this model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: i64,
    pub serial_number: String,
    pub name: String,
    pub crop_kind: String,
    pub started_at: Option<DateTime<Utc>>,
    pub one_liner: Option<String>,
    pub growth_level: Option<f64>,
    pub risk_score: Option<f64>,
    pub expected_harvest_date: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDevice {
    pub serial_number: String,
    pub name: String,
    pub crop_kind: String,
    pub started_at: Option<DateTime<Utc>>,
}

/// Partial update for the status projection written by the result
/// ingestor. Every field is overwritten; last write wins per device.
#[derive(Debug, Clone)]
pub struct DeviceStatusUpdate {
    pub one_liner: String,
    pub growth_level: f64,
    pub risk_score: f64,
    pub expected_harvest_date: Option<String>,
}
