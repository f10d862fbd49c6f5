use std::sync::Arc;

use chrono::Utc;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::aggregate;
use crate::db::{CropAnalysis, Database, DeviceStatusUpdate};
use crate::error::PipelineError;
use crate::events::{DeviceEvent, EventBus};
use crate::narrative::{
    DailyNarrative, DeviceDescriptor, NarrativeGenerator, WaterContext, FALLBACK_DAILY_REPORT,
    FALLBACK_ONE_LINER,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnalysisType {
    #[serde(rename = "CROP")]
    Crop,
}

/// Scored crop payload returned by the vision service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CropPayload {
    pub growth_rate_pct: f64,
    pub leaf_health_status: String,
    pub estimated_size_cm: f64,
    pub expected_harvest_date: Option<String>,
}

/// Callback envelope posted by the vision service when a cycle
/// completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisEnvelope {
    #[serde(rename = "type")]
    pub analysis_type: AnalysisType,
    pub device_id: i64,
    pub health_score: Option<f64>,
    pub data: CropPayload,
}

/// Cached device risk derived from the health score; absent score
/// means no risk signal, not maximum risk.
pub(crate) fn risk_score(health_score: Option<f64>) -> f64 {
    health_score
        .map(|score| (100.0 - score).max(0.0))
        .unwrap_or(0.0)
}

pub struct ResultIngestor {
    db: Database,
    events: Arc<EventBus>,
    narrative: Arc<dyn NarrativeGenerator>,
}

impl ResultIngestor {
    pub fn new(db: Database, events: Arc<EventBus>, narrative: Arc<dyn NarrativeGenerator>) -> Self {
        Self {
            db,
            events,
            narrative,
        }
    }

    /// Consume one scored result. Side effects run in order: aggregate,
    /// narrative, persist, status cache, fanout. Narrative failures fall
    /// back to fixed text; only store failures abort the request.
    pub async fn ingest(&self, envelope: AnalysisEnvelope) -> Result<CropAnalysis, PipelineError> {
        let device = self
            .db
            .get_device(envelope.device_id)
            .await?
            .ok_or_else(|| PipelineError::UnknownDevice(envelope.device_id.to_string()))?;

        let now = Utc::now();

        // Independent of the dispatch-time snapshot; readings that
        // arrived during analysis are included here.
        let env = aggregate::trailing_24h(&self.db, device.device_id, now).await?;

        let descriptor = DeviceDescriptor {
            name: device.name.clone(),
            crop_kind: device.crop_kind.clone(),
        };
        let water = self
            .db
            .latest_water_analysis(device.device_id)
            .await?
            .map(|analysis| WaterContext {
                score: analysis.water_score,
                risk_level: analysis.risk_level,
            })
            .unwrap_or_default();

        let narrative = match self
            .narrative
            .daily(&descriptor, &env, &envelope.data, &water)
            .await
        {
            Ok(narrative) => narrative,
            Err(err) => {
                warn!(
                    "daily narrative failed for device {}, using fallback: {err}",
                    device.device_id
                );
                DailyNarrative {
                    one_line_review: FALLBACK_ONE_LINER.to_string(),
                    daily_report: FALLBACK_DAILY_REPORT.to_string(),
                }
            }
        };

        let mut analysis = CropAnalysis {
            id: None,
            device_id: device.device_id,
            growth_rate_pct: envelope.data.growth_rate_pct,
            leaf_health_status: envelope.data.leaf_health_status.clone(),
            estimated_size_cm: envelope.data.estimated_size_cm,
            expected_harvest_date: envelope.data.expected_harvest_date.clone(),
            env_snapshot: env,
            one_liner: narrative.one_line_review.clone(),
            daily_report: narrative.daily_report,
            analyzed_at: now,
        };
        analysis.id = Some(self.db.insert_crop_analysis(&analysis).await?);

        self.db
            .update_device_status(
                device.device_id,
                &DeviceStatusUpdate {
                    one_liner: narrative.one_line_review.clone(),
                    growth_level: envelope.data.growth_rate_pct,
                    risk_score: risk_score(envelope.health_score),
                    expected_harvest_date: envelope.data.expected_harvest_date.clone(),
                },
            )
            .await?;

        self.events.publish(
            &device.serial_number,
            DeviceEvent::DailyReportUpdated {
                one_liner: narrative.one_line_review,
                growth_rate_pct: envelope.data.growth_rate_pct,
            },
        );

        info!(
            "ingested crop analysis for device {} (growth {:.1}%)",
            device.device_id, envelope.data.growth_rate_pct
        );

        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_score_inverts_health_score() {
        assert_eq!(risk_score(Some(80.0)), 20.0);
        assert_eq!(risk_score(Some(120.0)), 0.0);
        assert_eq!(risk_score(None), 0.0);
    }

    #[test]
    fn envelope_deserializes_from_wire_format() {
        let raw = r#"{
            "type": "CROP",
            "device_id": 7,
            "health_score": 80,
            "data": {
                "growth_rate_pct": 42.5,
                "leaf_health_status": "Good",
                "estimated_size_cm": 11.2,
                "expected_harvest_date": "2026-09-20"
            }
        }"#;
        let envelope: AnalysisEnvelope = serde_json::from_str(raw).expect("should parse");
        assert_eq!(envelope.analysis_type, AnalysisType::Crop);
        assert_eq!(envelope.device_id, 7);
        assert_eq!(envelope.health_score, Some(80.0));
        assert_eq!(envelope.data.leaf_health_status, "Good");
    }

    #[test]
    fn envelope_tolerates_missing_health_score() {
        let raw = r#"{
            "type": "CROP",
            "device_id": 7,
            "data": {
                "growth_rate_pct": 10.0,
                "leaf_health_status": "Fair",
                "estimated_size_cm": 3.0,
                "expected_harvest_date": null
            }
        }"#;
        let envelope: AnalysisEnvelope = serde_json::from_str(raw).expect("should parse");
        assert_eq!(envelope.health_score, None);
    }
}
