//! Windowed environmental statistics over raw sensor channels.
//!
//! Means are computed per channel over the readings that carry that
//! channel; a channel absent from the whole window yields 0.0, which
//! callers must read as "no data" rather than a true zero.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::db::{Database, SensorReading};

/// Trailing window used for both dispatch-time and ingestion-time
/// context. The two invocations query independently and may disagree
/// when readings arrive in between.
pub const ENV_WINDOW_HOURS: i64 = 24;

/// Mean values of the tracked channels over one window, each rounded to
/// its fixed per-channel precision.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EnvSnapshot {
    pub water_temp: f64,
    pub humidity: f64,
    pub lux: f64,
    pub ph: f64,
    pub air_temp: f64,
    pub ec: f64,
    #[serde(rename = "do")]
    pub dissolved_oxygen: f64,
}

/// Aggregate the trailing 24-hour window ending at `until`.
pub async fn trailing_24h(
    db: &Database,
    device_id: i64,
    until: DateTime<Utc>,
) -> Result<EnvSnapshot> {
    let from = until - Duration::hours(ENV_WINDOW_HOURS);
    let readings = db.readings_in_window(device_id, from, until).await?;
    Ok(snapshot(&readings))
}

pub fn snapshot(readings: &[SensorReading]) -> EnvSnapshot {
    EnvSnapshot {
        water_temp: round_to(channel_mean(readings, "water_temp"), 1),
        humidity: round_to(channel_mean(readings, "humidity"), 1),
        lux: round_to(channel_mean(readings, "lux"), 0),
        ph: round_to(channel_mean(readings, "ph"), 2),
        air_temp: round_to(channel_mean(readings, "air_temp"), 1),
        ec: round_to(channel_mean(readings, "ec"), 1),
        dissolved_oxygen: round_to(channel_mean(readings, "do"), 1),
    }
}

fn channel_mean(readings: &[SensorReading], name: &str) -> f64 {
    let values: Vec<f64> = readings
        .iter()
        .filter_map(|reading| reading.channel(name))
        .collect();
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
