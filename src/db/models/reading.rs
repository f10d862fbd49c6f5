use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One telemetry sample from a device. Channels are free-form numeric
/// key/value pairs (`water_temp`, `ph`, `ec`, ...); unknown keys are
/// stored but ignored by the aggregator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: Option<i64>,
    pub device_id: i64,
    pub channels: HashMap<String, f64>,
    pub recorded_at: DateTime<Utc>,
}

impl SensorReading {
    pub fn channel(&self, name: &str) -> Option<f64> {
        self.channels.get(name).copied()
    }
}
