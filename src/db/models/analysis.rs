use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregate::EnvSnapshot;

/// One completed vision-analysis cycle. Created exactly once per cycle
/// by the result ingestor and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropAnalysis {
    pub id: Option<i64>,
    pub device_id: i64,
    pub growth_rate_pct: f64,
    pub leaf_health_status: String,
    pub estimated_size_cm: f64,
    pub expected_harvest_date: Option<String>,
    /// Environmental averages snapshotted at ingestion time.
    pub env_snapshot: EnvSnapshot,
    pub one_liner: String,
    pub daily_report: String,
    pub analyzed_at: DateTime<Utc>,
}

/// Result row produced by the upstream water model. This core only
/// persists and reads these; scoring happens elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaterAnalysis {
    pub id: Option<i64>,
    pub device_id: i64,
    pub water_score: f64,
    pub risk_level: String,
    pub risk_factor: Option<String>,
    pub prediction: Option<serde_json::Value>,
    pub analyzed_at: DateTime<Utc>,
}
