use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WeeklyReport {
    pub report_id: String,
    pub device_id: i64,
    /// Narrative text stored verbatim as returned by the generator.
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// One checkpoint of the harvest journal timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub days_grown: i64,
    pub size_cm: f64,
    pub health: String,
    pub growth_rate_pct: f64,
    pub analyzed_at: DateTime<Utc>,
    pub one_liner: Option<String>,
    pub entry_text: String,
    /// `data:image/jpeg;base64,...` or None when no photo matched.
    pub photo_base64: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalContent {
    pub crop_kind: String,
    pub device_name: String,
    pub harvested_at: DateTime<Utc>,
    pub timeline: Vec<JournalEntry>,
    pub overview: String,
}

/// End-of-cultivation document. Written once, atomically.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HarvestJournal {
    pub journal_id: String,
    pub device_id: i64,
    pub content: JournalContent,
    pub created_at: DateTime<Utc>,
}
