use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{error, info};
use serde::{Deserialize, Serialize};

use crate::aggregate;
use crate::db::{Database, GrowthPhoto};
use crate::dispatch::{AnalysisDispatch, CropDispatch};
use crate::error::PipelineError;
use crate::events::{DeviceEvent, EventBus};

/// Classification tag carried by every incoming capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaptureMode {
    /// Frequent, cheap: refresh the latest-photo cache and notify.
    Monitor,
    /// Infrequent, heavy: history row, aggregation, external dispatch.
    Analysis,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureOutcome {
    pub mode: CaptureMode,
    pub photo_url: String,
}

/// Stable virtual reference to a device's cached photo; subscribers
/// re-fetch through it instead of receiving image bytes over fanout.
pub fn photo_url(device_id: i64) -> String {
    format!("/api/devices/{device_id}/photo/latest")
}

/// Computed cultivation age in whole days, floored, never below one.
/// A device with no recorded start date counts as day one.
pub(crate) fn days_grown(started_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> i64 {
    started_at
        .map(|started| (now - started).num_days().max(1))
        .unwrap_or(1)
}

pub struct CaptureDispatcher {
    db: Database,
    events: Arc<EventBus>,
    dispatch: Arc<dyn AnalysisDispatch>,
}

impl CaptureDispatcher {
    pub fn new(db: Database, events: Arc<EventBus>, dispatch: Arc<dyn AnalysisDispatch>) -> Self {
        Self {
            db,
            events,
            dispatch,
        }
    }

    /// Entry point for device photo uploads. Monitoring captures must
    /// stay cheap; they end after the cache refresh and fanout notify.
    pub async fn handle_capture(
        &self,
        serial: &str,
        mode: CaptureMode,
        image: &[u8],
    ) -> Result<CaptureOutcome, PipelineError> {
        if image.is_empty() {
            return Err(PipelineError::MissingPayload);
        }

        let device = self
            .db
            .get_device_by_serial(serial)
            .await?
            .ok_or_else(|| PipelineError::UnknownDevice(serial.to_string()))?;

        let now = Utc::now();
        self.db
            .update_latest_photo(device.device_id, image.to_vec())
            .await?;

        let url = photo_url(device.device_id);
        self.events.publish(
            serial,
            DeviceEvent::NewMonitoringPhoto {
                photo_url: url.clone(),
                timestamp: now,
            },
        );

        if mode == CaptureMode::Monitor {
            return Ok(CaptureOutcome {
                mode,
                photo_url: url,
            });
        }

        info!("analysis capture for device {}", device.device_id);

        self.db
            .insert_growth_photo(&GrowthPhoto {
                photo_id: None,
                device_id: device.device_id,
                image_data: image.to_vec(),
                recorded_at: now,
            })
            .await?;

        let env = aggregate::trailing_24h(&self.db, device.device_id, now).await?;
        let request = CropDispatch {
            device_id: device.device_id,
            image: image.to_vec(),
            days_grown: days_grown(device.started_at, now),
            avg_temp: env.water_temp,
            avg_humidity: env.humidity,
            total_lux: env.lux,
            water_ph: env.ph,
        };

        // Detached: the capture request returns before the external
        // call resolves, and a dispatch failure never fails the capture.
        let dispatch = Arc::clone(&self.dispatch);
        let device_id = device.device_id;
        tokio::spawn(async move {
            if let Err(err) = dispatch.dispatch_crop(request).await {
                error!("crop dispatch failed for device {device_id}: {err}");
            }
        });

        self.events.publish(
            serial,
            DeviceEvent::AnalysisStarted {
                photo_url: url.clone(),
            },
        );

        Ok(CaptureOutcome {
            mode,
            photo_url: url,
        })
    }
}
