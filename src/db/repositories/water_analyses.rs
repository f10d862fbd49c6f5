use anyhow::{Context, Result};
use rusqlite::params;

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_json, row_error},
    models::WaterAnalysis,
};

impl Database {
    pub async fn insert_water_analysis(&self, analysis: &WaterAnalysis) -> Result<i64> {
        let record = analysis.clone();
        self.execute(move |conn| {
            let prediction_json = record
                .prediction
                .as_ref()
                .map(serde_json::to_string)
                .transpose()
                .context("failed to serialize water prediction")?;
            conn.execute(
                "INSERT INTO water_analyses (
                    device_id, water_score, risk_level, risk_factor, prediction_json, analyzed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.device_id,
                    record.water_score,
                    record.risk_level,
                    record.risk_factor,
                    prediction_json,
                    record.analyzed_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert water analysis")?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn latest_water_analysis(&self, device_id: i64) -> Result<Option<WaterAnalysis>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT water_id, device_id, water_score, risk_level, risk_factor,
                        prediction_json, analyzed_at
                 FROM water_analyses
                 WHERE device_id = ?1
                 ORDER BY analyzed_at DESC
                 LIMIT 1",
            )?;
            let mut rows = stmt.query(params![device_id])?;
            match rows.next()? {
                Some(row) => {
                    let prediction_json: Option<String> = row.get(5)?;
                    let analyzed_at_raw: String = row.get(6)?;
                    Ok(Some(WaterAnalysis {
                        id: row.get(0)?,
                        device_id: row.get(1)?,
                        water_score: row.get(2)?,
                        risk_level: row.get(3)?,
                        risk_factor: row.get(4)?,
                        prediction: prediction_json
                            .as_deref()
                            .map(|raw| parse_json(raw, "water prediction"))
                            .transpose()
                            .map_err(row_error)?,
                        analyzed_at: parse_datetime(&analyzed_at_raw, "analyzed_at")
                            .map_err(row_error)?,
                    }))
                }
                None => Ok(None),
            }
        })
        .await
    }
}
