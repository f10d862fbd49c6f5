use chrono::{DateTime, Utc};

/// Append-only photo history row. Only analysis-classified captures
/// land here; monitoring captures touch the device cache alone.
#[derive(Debug, Clone)]
pub struct GrowthPhoto {
    pub photo_id: Option<i64>,
    pub device_id: i64,
    pub image_data: Vec<u8>,
    pub recorded_at: DateTime<Utc>,
}
