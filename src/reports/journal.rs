//! End-of-cultivation growth journal assembly.
//!
//! Five checkpoints are picked by rank across the full analysis
//! history, each matched to its temporally nearest photo, narrated, and
//! written out as one atomic document.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::{DateTime, Utc};
use log::{info, warn};
use uuid::Uuid;

use crate::db::{
    CropAnalysis, Database, GrowthPhoto, HarvestJournal, JournalContent, JournalEntry,
};
use crate::error::PipelineError;
use crate::narrative::{DeviceDescriptor, NarrativeGenerator, TimelinePoint, FALLBACK_JOURNAL_ENTRY};
use crate::reports::BuildOutcome;

pub const JOURNAL_CHECKPOINTS: usize = 5;
const CHECKPOINT_RATIOS: [f64; JOURNAL_CHECKPOINTS] = [0.0, 0.25, 0.5, 0.75, 1.0];

/// Rank-spaced checkpoint indices into an ordered list of `count`
/// records: `min(floor((count-1) * ratio), count-1)` per ratio.
/// Deterministic; always includes the first and last record.
pub fn checkpoint_indices(count: usize) -> Vec<usize> {
    CHECKPOINT_RATIOS
        .iter()
        .map(|ratio| {
            let idx = ((count - 1) as f64 * ratio).floor() as usize;
            idx.min(count - 1)
        })
        .collect()
}

/// Linear minimum-distance scan; ties fall to the earlier row. Fine at
/// the photo volumes a single device accumulates.
pub fn nearest_photo<'a>(
    photos: &'a [GrowthPhoto],
    at: DateTime<Utc>,
) -> Option<&'a GrowthPhoto> {
    photos.iter().min_by_key(|photo| {
        (photo.recorded_at - at)
            .num_milliseconds()
            .unsigned_abs()
    })
}

fn data_url(image: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(image))
}

fn synthesize_overview(crop_kind: &str, entries: &[JournalEntry]) -> String {
    match (entries.first(), entries.last()) {
        (Some(first), Some(last)) => format!(
            "{} grown over {} days: from {:.1} cm on day {} to {:.1} cm at harvest, \
             finishing at {:.1}% growth in '{}' condition.",
            crop_kind,
            last.days_grown,
            first.size_cm,
            first.days_grown,
            last.size_cm,
            last.growth_rate_pct,
            last.health,
        ),
        _ => format!("{crop_kind} growth journal."),
    }
}

pub struct HarvestJournalBuilder {
    db: Database,
    narrative: Arc<dyn NarrativeGenerator>,
}

impl HarvestJournalBuilder {
    pub fn new(db: Database, narrative: Arc<dyn NarrativeGenerator>) -> Self {
        Self { db, narrative }
    }

    /// Assemble and persist the harvest journal for a device. Triggered
    /// once at cultivation end; the document write is a single insert,
    /// so partial journals never land.
    pub async fn build(
        &self,
        device_id: i64,
    ) -> Result<BuildOutcome<HarvestJournal>, PipelineError> {
        let device = self
            .db
            .get_device(device_id)
            .await?
            .ok_or_else(|| PipelineError::UnknownDevice(device_id.to_string()))?;

        let analyses = self.db.all_crop_analyses(device_id).await?;
        if analyses.len() < JOURNAL_CHECKPOINTS {
            return Ok(BuildOutcome::InsufficientData {
                have: analyses.len(),
                need: JOURNAL_CHECKPOINTS,
            });
        }

        let checkpoints: Vec<&CropAnalysis> = checkpoint_indices(analyses.len())
            .into_iter()
            .map(|idx| &analyses[idx])
            .collect();
        let photos = self.db.photos_for_device(device_id).await?;

        // Day zero falls back to the earliest analysis when the device
        // never recorded a cultivation start.
        let day_zero = device
            .started_at
            .unwrap_or_else(|| checkpoints[0].analyzed_at);

        let timeline: Vec<TimelinePoint> = checkpoints
            .iter()
            .map(|checkpoint| TimelinePoint {
                days_grown: (checkpoint.analyzed_at - day_zero).num_days(),
                size_cm: checkpoint.estimated_size_cm,
                health: checkpoint.leaf_health_status.clone(),
                growth_rate_pct: checkpoint.growth_rate_pct,
                one_liner: Some(checkpoint.one_liner.clone()),
            })
            .collect();

        let descriptor = DeviceDescriptor {
            name: device.name.clone(),
            crop_kind: device.crop_kind.clone(),
        };
        let narratives = match self.narrative.journal(&descriptor, &timeline).await {
            Ok(entries) => entries,
            Err(err) => {
                warn!(
                    "journal narrative failed for device {device_id}, using fallback: {err}"
                );
                vec![FALLBACK_JOURNAL_ENTRY.to_string(); JOURNAL_CHECKPOINTS]
            }
        };

        let entries: Vec<JournalEntry> = checkpoints
            .iter()
            .zip(timeline.iter())
            .enumerate()
            .map(|(index, (checkpoint, point))| JournalEntry {
                days_grown: point.days_grown,
                size_cm: checkpoint.estimated_size_cm,
                health: checkpoint.leaf_health_status.clone(),
                growth_rate_pct: checkpoint.growth_rate_pct,
                analyzed_at: checkpoint.analyzed_at,
                one_liner: Some(checkpoint.one_liner.clone()),
                entry_text: narratives
                    .get(index)
                    .cloned()
                    .unwrap_or_else(|| FALLBACK_JOURNAL_ENTRY.to_string()),
                photo_base64: nearest_photo(&photos, checkpoint.analyzed_at)
                    .map(|photo| data_url(&photo.image_data)),
            })
            .collect();

        let journal = HarvestJournal {
            journal_id: Uuid::new_v4().to_string(),
            device_id,
            content: JournalContent {
                crop_kind: device.crop_kind.clone(),
                device_name: device.name,
                harvested_at: Utc::now(),
                overview: synthesize_overview(&device.crop_kind, &entries),
                timeline: entries,
            },
            created_at: Utc::now(),
        };
        self.db.insert_harvest_journal(&journal).await?;

        info!(
            "harvest journal stored for device {device_id} ({} analyses, {} photos)",
            analyses.len(),
            photos.len()
        );
        Ok(BuildOutcome::Built(journal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn five_records_select_every_index() {
        assert_eq!(checkpoint_indices(5), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn six_records_follow_the_floor_formula() {
        // (6-1) * [0, .25, .5, .75, 1] floored.
        assert_eq!(checkpoint_indices(6), vec![0, 1, 2, 3, 5]);
    }

    #[test]
    fn selection_always_includes_first_and_last() {
        for count in JOURNAL_CHECKPOINTS..40 {
            let indices = checkpoint_indices(count);
            assert_eq!(indices.len(), JOURNAL_CHECKPOINTS);
            assert_eq!(indices[0], 0);
            assert_eq!(indices[4], count - 1);
            let mut sorted = indices.clone();
            sorted.sort_unstable();
            assert_eq!(sorted, indices, "indices must be non-decreasing");
        }
    }

    #[test]
    fn selection_is_idempotent() {
        assert_eq!(checkpoint_indices(17), checkpoint_indices(17));
    }

    fn photo_at(offset_hours: i64, base: DateTime<Utc>) -> GrowthPhoto {
        GrowthPhoto {
            photo_id: None,
            device_id: 1,
            image_data: vec![0xFF],
            recorded_at: base + Duration::hours(offset_hours),
        }
    }

    #[test]
    fn nearest_photo_picks_smallest_absolute_distance() {
        let base = Utc::now();
        let photos = vec![photo_at(0, base), photo_at(10, base), photo_at(26, base)];
        let nearest = nearest_photo(&photos, base + Duration::hours(12))
            .expect("photos exist");
        assert_eq!(nearest.recorded_at, base + Duration::hours(10));
    }

    #[test]
    fn nearest_photo_on_empty_history_is_none() {
        assert!(nearest_photo(&[], Utc::now()).is_none());
    }

    #[test]
    fn overview_spans_first_and_last_checkpoints() {
        let now = Utc::now();
        let entry = |days, size| JournalEntry {
            days_grown: days,
            size_cm: size,
            health: "Good".into(),
            growth_rate_pct: 90.0,
            analyzed_at: now,
            one_liner: None,
            entry_text: "entry".into(),
            photo_base64: None,
        };
        let overview = synthesize_overview("lettuce", &[entry(0, 2.0), entry(30, 15.0)]);
        assert!(overview.contains("30 days"));
        assert!(overview.contains("2.0 cm"));
        assert!(overview.contains("15.0 cm"));
    }
}
