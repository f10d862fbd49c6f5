use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_json, row_error},
    models::SensorReading,
};

impl Database {
    pub async fn insert_sensor_reading(&self, reading: &SensorReading) -> Result<()> {
        let record = reading.clone();
        self.execute(move |conn| {
            let channels_json = serde_json::to_string(&record.channels)
                .context("failed to serialize sensor channels")?;
            conn.execute(
                "INSERT INTO sensor_readings (device_id, channels_json, recorded_at)
                 VALUES (?1, ?2, ?3)",
                params![
                    record.device_id,
                    channels_json,
                    record.recorded_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert sensor reading")?;
            Ok(())
        })
        .await
    }

    /// Readings recorded after `from` and up to `until`, oldest first.
    pub async fn readings_in_window(
        &self,
        device_id: i64,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT reading_id, device_id, channels_json, recorded_at
                 FROM sensor_readings
                 WHERE device_id = ?1 AND recorded_at > ?2 AND recorded_at <= ?3
                 ORDER BY recorded_at ASC",
            )?;

            let readings_iter = stmt.query_map(
                params![device_id, from.to_rfc3339(), until.to_rfc3339()],
                |row| {
                    let channels_json: String = row.get(2)?;
                    let recorded_at_raw: String = row.get(3)?;

                    Ok(SensorReading {
                        id: row.get(0)?,
                        device_id: row.get(1)?,
                        channels: parse_json(&channels_json, "sensor channels")
                            .map_err(row_error)?,
                        recorded_at: parse_datetime(&recorded_at_raw, "recorded_at")
                            .map_err(row_error)?,
                    })
                },
            )?;

            let mut readings = Vec::new();
            for reading in readings_iter {
                readings.push(reading?);
            }
            Ok(readings)
        })
        .await
    }
}
