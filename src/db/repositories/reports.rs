use anyhow::{Context, Result};
use rusqlite::params;

use crate::db::{
    connection::Database,
    helpers::{parse_datetime, parse_json, row_error},
    models::{HarvestJournal, WeeklyReport},
};

impl Database {
    pub async fn insert_weekly_report(&self, report: &WeeklyReport) -> Result<()> {
        let record = report.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO weekly_reports (report_id, device_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.report_id,
                    record.device_id,
                    record.content,
                    record.created_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert weekly report")?;
            Ok(())
        })
        .await
    }

    pub async fn latest_weekly_report(&self, device_id: i64) -> Result<Option<WeeklyReport>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT report_id, device_id, content, created_at
                 FROM weekly_reports
                 WHERE device_id = ?1
                 ORDER BY created_at DESC
                 LIMIT 1",
            )?;
            let mut rows = stmt.query(params![device_id])?;
            match rows.next()? {
                Some(row) => {
                    let created_at_raw: String = row.get(3)?;
                    Ok(Some(WeeklyReport {
                        report_id: row.get(0)?,
                        device_id: row.get(1)?,
                        content: row.get(2)?,
                        created_at: parse_datetime(&created_at_raw, "created_at")
                            .map_err(row_error)?,
                    }))
                }
                None => Ok(None),
            }
        })
        .await
    }

    pub async fn weekly_report_count(&self, device_id: i64) -> Result<i64> {
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM weekly_reports WHERE device_id = ?1",
                params![device_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
    }

    /// The journal document is serialized and written in one statement,
    /// so a partially assembled journal can never land in the store.
    pub async fn insert_harvest_journal(&self, journal: &HarvestJournal) -> Result<()> {
        let record = journal.clone();
        self.execute(move |conn| {
            let content_json = serde_json::to_string(&record.content)
                .context("failed to serialize journal content")?;
            conn.execute(
                "INSERT INTO harvest_journals (journal_id, device_id, content_json, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.journal_id,
                    record.device_id,
                    content_json,
                    record.created_at.to_rfc3339(),
                ],
            )
            .with_context(|| "failed to insert harvest journal")?;
            Ok(())
        })
        .await
    }

    pub async fn latest_harvest_journal(
        &self,
        device_id: i64,
    ) -> Result<Option<HarvestJournal>> {
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT journal_id, device_id, content_json, created_at
                 FROM harvest_journals
                 WHERE device_id = ?1
                 ORDER BY created_at DESC
                 LIMIT 1",
            )?;
            let mut rows = stmt.query(params![device_id])?;
            match rows.next()? {
                Some(row) => {
                    let content_json: String = row.get(2)?;
                    let created_at_raw: String = row.get(3)?;
                    Ok(Some(HarvestJournal {
                        journal_id: row.get(0)?,
                        device_id: row.get(1)?,
                        content: parse_json(&content_json, "journal content")
                            .map_err(row_error)?,
                        created_at: parse_datetime(&created_at_raw, "created_at")
                            .map_err(row_error)?,
                    }))
                }
                None => Ok(None),
            }
        })
        .await
    }
}
