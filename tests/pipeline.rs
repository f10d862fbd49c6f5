//! End-to-end scenarios over a temporary store with fake external
//! services.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tempfile::TempDir;

use verdant::aggregate::{self, EnvSnapshot};
use verdant::db::{CropAnalysis, Database, GrowthPhoto, NewDevice, SensorReading, WaterAnalysis};
use verdant::ingest::{AnalysisEnvelope, AnalysisType, CropPayload};
use verdant::narrative::{
    DailyNarrative, DeviceDescriptor, NarrativeGenerator, TimelinePoint, WaterContext,
    FALLBACK_DAILY_REPORT, FALLBACK_ONE_LINER,
};
use verdant::reports::BuildOutcome;
use verdant::{
    DeviceEvent, EventBus, HarvestJournalBuilder, PipelineError, ResultIngestor,
    WeeklyReportBuilder,
};

struct FakeNarrative {
    fail_daily: bool,
}

#[async_trait]
impl NarrativeGenerator for FakeNarrative {
    async fn daily(
        &self,
        _device: &DeviceDescriptor,
        _env: &EnvSnapshot,
        crop: &CropPayload,
        _water: &WaterContext,
    ) -> Result<DailyNarrative, PipelineError> {
        if self.fail_daily {
            return Err(PipelineError::ExternalService("llm down".into()));
        }
        Ok(DailyNarrative {
            one_line_review: format!("Growing at {:.0}%.", crop.growth_rate_pct),
            daily_report: "All channels nominal.".into(),
        })
    }

    async fn weekly(
        &self,
        device: &DeviceDescriptor,
        history_summary: &str,
    ) -> Result<String, PipelineError> {
        Ok(format!(
            "### Weekly for {}\n{} days summarized",
            device.name,
            history_summary.lines().count()
        ))
    }

    async fn journal(
        &self,
        _device: &DeviceDescriptor,
        timeline: &[TimelinePoint],
    ) -> Result<Vec<String>, PipelineError> {
        Ok(timeline
            .iter()
            .map(|point| format!("Day {}: still growing.", point.days_grown))
            .collect())
    }
}

struct Harness {
    _dir: TempDir,
    db: Database,
    events: Arc<EventBus>,
    device_id: i64,
    started_at: DateTime<Utc>,
}

async fn setup() -> Harness {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::new(dir.path().join("pipeline.sqlite3")).expect("db");
    let started_at = Utc::now() - Duration::days(10);
    let device_id = db
        .insert_device(&NewDevice {
            serial_number: "VD-100".into(),
            name: "bay one".into(),
            crop_kind: "lettuce".into(),
            started_at: Some(started_at),
        })
        .await
        .expect("insert device");

    Harness {
        _dir: dir,
        db,
        events: Arc::new(EventBus::new()),
        device_id,
        started_at,
    }
}

fn crop_payload(growth: f64) -> CropPayload {
    CropPayload {
        growth_rate_pct: growth,
        leaf_health_status: "Good".into(),
        estimated_size_cm: 12.0,
        expected_harvest_date: Some("2026-09-20".into()),
    }
}

async fn insert_analysis(db: &Database, device_id: i64, analyzed_at: DateTime<Utc>, growth: f64) {
    db.insert_crop_analysis(&CropAnalysis {
        id: None,
        device_id,
        growth_rate_pct: growth,
        leaf_health_status: "Good".into(),
        estimated_size_cm: 2.0 + growth / 10.0,
        expected_harvest_date: None,
        env_snapshot: EnvSnapshot {
            water_temp: 21.0,
            ..EnvSnapshot::default()
        },
        one_liner: "steady".into(),
        daily_report: "fine".into(),
        analyzed_at,
    })
    .await
    .expect("insert analysis");
}

// Scenario B: 24h window with ph readings 6.0 and 6.4 averages to 6.2.
#[tokio::test]
async fn aggregation_rounds_ph_to_two_decimals() {
    let harness = setup().await;
    let now = Utc::now();

    for (offset, ph) in [(2i64, 6.0f64), (1, 6.4)] {
        harness
            .db
            .insert_sensor_reading(&SensorReading {
                id: None,
                device_id: harness.device_id,
                channels: [("ph".to_string(), ph)].into_iter().collect(),
                recorded_at: now - Duration::hours(offset),
            })
            .await
            .expect("insert reading");
    }

    let snapshot = aggregate::trailing_24h(&harness.db, harness.device_id, now)
        .await
        .expect("aggregate");
    assert_eq!(snapshot.ph, 6.2);
    assert_eq!(snapshot.lux, 0.0, "absent channel stays at the sentinel");
}

// Scenario C: risk score is the inverted health score, defaulting to 0.
#[tokio::test]
async fn ingestion_caches_inverted_health_score() {
    let harness = setup().await;
    harness
        .db
        .insert_water_analysis(&WaterAnalysis {
            id: None,
            device_id: harness.device_id,
            water_score: 88.0,
            risk_level: "Low".into(),
            risk_factor: None,
            prediction: None,
            analyzed_at: Utc::now() - Duration::hours(3),
        })
        .await
        .expect("insert water analysis");
    let ingestor = ResultIngestor::new(
        harness.db.clone(),
        Arc::clone(&harness.events),
        Arc::new(FakeNarrative { fail_daily: false }),
    );

    ingestor
        .ingest(AnalysisEnvelope {
            analysis_type: AnalysisType::Crop,
            device_id: harness.device_id,
            health_score: Some(80.0),
            data: crop_payload(42.0),
        })
        .await
        .expect("ingest");

    let device = harness
        .db
        .get_device(harness.device_id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(device.risk_score, Some(20.0));
    assert_eq!(device.growth_level, Some(42.0));

    ingestor
        .ingest(AnalysisEnvelope {
            analysis_type: AnalysisType::Crop,
            device_id: harness.device_id,
            health_score: None,
            data: crop_payload(50.0),
        })
        .await
        .expect("ingest");

    let device = harness
        .db
        .get_device(harness.device_id)
        .await
        .expect("get")
        .expect("exists");
    assert_eq!(device.risk_score, Some(0.0));
}

// Scenario D: narrative failure still persists the row with fallback
// text and still publishes the report-updated event.
#[tokio::test]
async fn ingestion_survives_narrative_failure_with_fallbacks() {
    let harness = setup().await;
    let mut rx = harness.events.subscribe("VD-100");
    let ingestor = ResultIngestor::new(
        harness.db.clone(),
        Arc::clone(&harness.events),
        Arc::new(FakeNarrative { fail_daily: true }),
    );

    ingestor
        .ingest(AnalysisEnvelope {
            analysis_type: AnalysisType::Crop,
            device_id: harness.device_id,
            health_score: Some(70.0),
            data: crop_payload(33.0),
        })
        .await
        .expect("ingestion must not fail on narrative failure");

    let stored = harness
        .db
        .latest_crop_analysis(harness.device_id)
        .await
        .expect("query")
        .expect("row persisted");
    assert_eq!(stored.one_liner, FALLBACK_ONE_LINER);
    assert_eq!(stored.daily_report, FALLBACK_DAILY_REPORT);

    let event = rx.recv().await.expect("event published");
    assert_eq!(
        event,
        DeviceEvent::DailyReportUpdated {
            one_liner: FALLBACK_ONE_LINER.to_string(),
            growth_rate_pct: 33.0,
        }
    );
}

#[tokio::test]
async fn ingestion_rejects_unknown_device() {
    let harness = setup().await;
    let ingestor = ResultIngestor::new(
        harness.db.clone(),
        Arc::clone(&harness.events),
        Arc::new(FakeNarrative { fail_daily: false }),
    );

    let err = ingestor
        .ingest(AnalysisEnvelope {
            analysis_type: AnalysisType::Crop,
            device_id: 9999,
            health_score: None,
            data: crop_payload(10.0),
        })
        .await
        .expect_err("unknown device must fail");
    assert!(matches!(err, PipelineError::UnknownDevice(_)));
}

#[tokio::test]
async fn weekly_report_soft_fails_below_three_rows() {
    let harness = setup().await;
    let builder = WeeklyReportBuilder::new(
        harness.db.clone(),
        Arc::new(FakeNarrative { fail_daily: false }),
    );

    insert_analysis(&harness.db, harness.device_id, Utc::now() - Duration::days(1), 40.0).await;
    insert_analysis(&harness.db, harness.device_id, Utc::now() - Duration::days(2), 35.0).await;

    let outcome = builder.build(harness.device_id).await.expect("build");
    assert_eq!(outcome, BuildOutcome::InsufficientData { have: 2, need: 3 });
    assert_eq!(
        harness
            .db
            .weekly_report_count(harness.device_id)
            .await
            .expect("count"),
        0,
        "no report row may be written on the soft failure"
    );
}

#[tokio::test]
async fn weekly_report_persists_narrative_verbatim() {
    let harness = setup().await;
    let builder = WeeklyReportBuilder::new(
        harness.db.clone(),
        Arc::new(FakeNarrative { fail_daily: false }),
    );

    for day in 1..=4 {
        insert_analysis(
            &harness.db,
            harness.device_id,
            Utc::now() - Duration::days(day),
            30.0 + day as f64,
        )
        .await;
    }

    let outcome = builder.build(harness.device_id).await.expect("build");
    let report = outcome.built().expect("report built");
    assert!(report.content.starts_with("### Weekly for bay one"));

    let stored = harness
        .db
        .latest_weekly_report(harness.device_id)
        .await
        .expect("query")
        .expect("row persisted");
    assert_eq!(stored.content, report.content);
}

// Scenario A: 6 analyses spaced 2 days apart select ranked positions
// {0,1,2,3,5} and produce strictly increasing elapsed days.
#[tokio::test]
async fn harvest_journal_selects_equidistant_checkpoints() {
    let harness = setup().await;
    let builder = HarvestJournalBuilder::new(
        harness.db.clone(),
        Arc::new(FakeNarrative { fail_daily: false }),
    );

    for rank in 0..6i64 {
        let analyzed_at = harness.started_at + Duration::days(rank * 2);
        insert_analysis(&harness.db, harness.device_id, analyzed_at, rank as f64 * 10.0).await;
        harness
            .db
            .insert_growth_photo(&GrowthPhoto {
                photo_id: None,
                device_id: harness.device_id,
                image_data: vec![rank as u8; 4],
                recorded_at: analyzed_at + Duration::hours(1),
            })
            .await
            .expect("insert photo");
    }

    let outcome = builder.build(harness.device_id).await.expect("build");
    let journal = outcome.built().expect("journal built");

    let days: Vec<i64> = journal
        .content
        .timeline
        .iter()
        .map(|entry| entry.days_grown)
        .collect();
    assert_eq!(days, vec![0, 2, 4, 6, 10]);
    assert!(days.windows(2).all(|pair| pair[0] < pair[1]));

    let growth: Vec<f64> = journal
        .content
        .timeline
        .iter()
        .map(|entry| entry.growth_rate_pct)
        .collect();
    assert_eq!(growth, vec![0.0, 10.0, 20.0, 30.0, 50.0]);

    for entry in &journal.content.timeline {
        let photo = entry.photo_base64.as_deref().expect("photo matched");
        assert!(photo.starts_with("data:image/jpeg;base64,"));
        assert!(entry.entry_text.starts_with("Day "));
    }

    let stored = harness
        .db
        .latest_harvest_journal(harness.device_id)
        .await
        .expect("query")
        .expect("row persisted");
    assert_eq!(stored.journal_id, journal.journal_id);
    assert_eq!(stored.content.timeline.len(), 5);
}

#[tokio::test]
async fn harvest_journal_soft_fails_below_five_analyses() {
    let harness = setup().await;
    let builder = HarvestJournalBuilder::new(
        harness.db.clone(),
        Arc::new(FakeNarrative { fail_daily: false }),
    );

    for rank in 0..4i64 {
        insert_analysis(
            &harness.db,
            harness.device_id,
            harness.started_at + Duration::days(rank),
            10.0,
        )
        .await;
    }

    let outcome = builder.build(harness.device_id).await.expect("build");
    assert_eq!(outcome, BuildOutcome::InsufficientData { have: 4, need: 5 });
    assert!(harness
        .db
        .latest_harvest_journal(harness.device_id)
        .await
        .expect("query")
        .is_none());
}

#[tokio::test]
async fn harvest_journal_tolerates_missing_photos() {
    let harness = setup().await;
    let builder = HarvestJournalBuilder::new(
        harness.db.clone(),
        Arc::new(FakeNarrative { fail_daily: false }),
    );

    for rank in 0..5i64 {
        insert_analysis(
            &harness.db,
            harness.device_id,
            harness.started_at + Duration::days(rank),
            10.0,
        )
        .await;
    }

    let outcome = builder.build(harness.device_id).await.expect("build");
    let journal = outcome.built().expect("journal built");
    assert!(journal
        .content
        .timeline
        .iter()
        .all(|entry| entry.photo_base64.is_none()));
}
