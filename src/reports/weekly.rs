use std::sync::Arc;

use chrono::{Duration, Utc};
use log::info;
use uuid::Uuid;

use crate::db::{CropAnalysis, Database, WeeklyReport};
use crate::error::PipelineError;
use crate::narrative::{DeviceDescriptor, NarrativeGenerator};
use crate::reports::BuildOutcome;

pub const WEEKLY_WINDOW_DAYS: i64 = 7;
pub const MIN_WEEKLY_ROWS: usize = 3;

pub struct WeeklyReportBuilder {
    db: Database,
    narrative: Arc<dyn NarrativeGenerator>,
}

/// One plain-text line per analysis row, fed to the weekly contract.
fn summarize_history(rows: &[CropAnalysis]) -> String {
    rows.iter()
        .map(|row| {
            format!(
                "- {}: growth {:.1}%, status '{}', avg temp {:.1}C",
                row.analyzed_at.date_naive(),
                row.growth_rate_pct,
                row.leaf_health_status,
                row.env_snapshot.water_temp,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

impl WeeklyReportBuilder {
    pub fn new(db: Database, narrative: Arc<dyn NarrativeGenerator>) -> Self {
        Self { db, narrative }
    }

    /// Build and persist one weekly report from the trailing 7 days of
    /// analysis history. No dedup: cadence is the caller's decision.
    pub async fn build(
        &self,
        device_id: i64,
    ) -> Result<BuildOutcome<WeeklyReport>, PipelineError> {
        let device = self
            .db
            .get_device(device_id)
            .await?
            .ok_or_else(|| PipelineError::UnknownDevice(device_id.to_string()))?;

        let from = Utc::now() - Duration::days(WEEKLY_WINDOW_DAYS);
        let rows = self.db.crop_analyses_since(device_id, from).await?;
        if rows.len() < MIN_WEEKLY_ROWS {
            return Ok(BuildOutcome::InsufficientData {
                have: rows.len(),
                need: MIN_WEEKLY_ROWS,
            });
        }

        let descriptor = DeviceDescriptor {
            name: device.name,
            crop_kind: device.crop_kind,
        };
        let summary = summarize_history(&rows);
        let content = self.narrative.weekly(&descriptor, &summary).await?;

        let report = WeeklyReport {
            report_id: Uuid::new_v4().to_string(),
            device_id,
            content,
            created_at: Utc::now(),
        };
        self.db.insert_weekly_report(&report).await?;

        info!(
            "weekly report stored for device {device_id} ({} rows summarized)",
            rows.len()
        );
        Ok(BuildOutcome::Built(report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::EnvSnapshot;

    fn row(day: i64, growth: f64, temp: f64) -> CropAnalysis {
        CropAnalysis {
            id: None,
            device_id: 1,
            growth_rate_pct: growth,
            leaf_health_status: "Good".into(),
            estimated_size_cm: 10.0,
            expected_harvest_date: None,
            env_snapshot: EnvSnapshot {
                water_temp: temp,
                ..EnvSnapshot::default()
            },
            one_liner: "steady".into(),
            daily_report: "fine".into(),
            analyzed_at: Utc::now() - Duration::days(day),
        }
    }

    #[test]
    fn history_summary_renders_one_line_per_row() {
        let rows = vec![row(2, 40.0, 21.5), row(1, 45.0, 22.0)];
        let summary = summarize_history(&rows);
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("growth 40.0%"));
        assert!(lines[1].contains("avg temp 22.0C"));
    }
}
