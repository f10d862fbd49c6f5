use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_json, row_error},
    models::CropAnalysis,
};

const ANALYSIS_COLUMNS: &str = "analysis_id, device_id, growth_rate_pct, leaf_health_status, \
     estimated_size_cm, expected_harvest_date, env_snapshot_json, one_liner, daily_report, \
     analyzed_at";

fn analysis_from_row(row: &Row<'_>) -> rusqlite::Result<CropAnalysis> {
    let env_json: String = row.get(6)?;
    let analyzed_at_raw: String = row.get(9)?;

    Ok(CropAnalysis {
        id: row.get(0)?,
        device_id: row.get(1)?,
        growth_rate_pct: row.get(2)?,
        leaf_health_status: row.get(3)?,
        estimated_size_cm: row.get(4)?,
        expected_harvest_date: row.get(5)?,
        env_snapshot: parse_json(&env_json, "env snapshot").map_err(row_error)?,
        one_liner: row.get(7)?,
        daily_report: row.get(8)?,
        analyzed_at: parse_datetime(&analyzed_at_raw, "analyzed_at").map_err(row_error)?,
    })
}

impl Database {
    pub async fn insert_crop_analysis(&self, analysis: &CropAnalysis) -> Result<i64> {
        let record = analysis.clone();
        self.execute(move |conn| {
            let env_json = serde_json::to_string(&record.env_snapshot)
                .context("failed to serialize env snapshot")?;
            conn.execute(
                "INSERT INTO crop_analyses (
                    device_id,
                    growth_rate_pct,
                    leaf_health_status,
                    estimated_size_cm,
                    expected_harvest_date,
                    env_snapshot_json,
                    one_liner,
                    daily_report,
                    analyzed_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    record.device_id,
                    record.growth_rate_pct,
                    record.leaf_health_status,
                    record.estimated_size_cm,
                    record.expected_harvest_date,
                    env_json,
                    record.one_liner,
                    record.daily_report,
                    record.analyzed_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert crop analysis")?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    pub async fn latest_crop_analysis(&self, device_id: i64) -> Result<Option<CropAnalysis>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ANALYSIS_COLUMNS} FROM crop_analyses
                 WHERE device_id = ?1
                 ORDER BY analyzed_at DESC
                 LIMIT 1"
            ))?;
            let mut rows = stmt.query(params![device_id])?;
            match rows.next()? {
                Some(row) => Ok(Some(analysis_from_row(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    /// Analyses recorded after `from`, oldest first.
    pub async fn crop_analyses_since(
        &self,
        device_id: i64,
        from: DateTime<Utc>,
    ) -> Result<Vec<CropAnalysis>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ANALYSIS_COLUMNS} FROM crop_analyses
                 WHERE device_id = ?1 AND analyzed_at > ?2
                 ORDER BY analyzed_at ASC"
            ))?;
            let analyses_iter =
                stmt.query_map(params![device_id, from.to_rfc3339()], analysis_from_row)?;

            let mut analyses = Vec::new();
            for analysis in analyses_iter {
                analyses.push(analysis?);
            }
            Ok(analyses)
        })
        .await
    }

    /// Entire analysis history for a device, oldest first.
    pub async fn all_crop_analyses(&self, device_id: i64) -> Result<Vec<CropAnalysis>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ANALYSIS_COLUMNS} FROM crop_analyses
                 WHERE device_id = ?1
                 ORDER BY analyzed_at ASC"
            ))?;
            let analyses_iter = stmt.query_map(params![device_id], analysis_from_row)?;

            let mut analyses = Vec::new();
            for analysis in analyses_iter {
                analyses.push(analysis?);
            }
            Ok(analyses)
        })
        .await
    }
}
