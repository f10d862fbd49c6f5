use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;
use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 64;

/// Live update pushed to viewers of one device. Channels are keyed by
/// the device's serial number, matching what browsers join rooms with.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DeviceEvent {
    /// The latest-photo cache changed; subscribers re-fetch from the
    /// virtual URL instead of receiving raw bytes.
    NewMonitoringPhoto {
        photo_url: String,
        timestamp: DateTime<Utc>,
    },
    AnalysisStarted { photo_url: String },
    DailyReportUpdated {
        one_liner: String,
        growth_rate_pct: f64,
    },
}

/// In-process fanout. Lossy toward slow subscribers: a receiver that
/// lags past the channel capacity drops the oldest events.
pub struct EventBus {
    channels: Mutex<HashMap<String, broadcast::Sender<DeviceEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    pub fn subscribe(&self, serial: &str) -> broadcast::Receiver<DeviceEvent> {
        self.sender_for(serial).subscribe()
    }

    /// Publish to whoever is listening on this serial. Events published
    /// with no subscribers are dropped silently.
    pub fn publish(&self, serial: &str, event: DeviceEvent) {
        let sender = self.sender_for(serial);
        let _ = sender.send(event);
    }

    fn sender_for(&self, serial: &str) -> broadcast::Sender<DeviceEvent> {
        let mut guard = match self.channels.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("event bus mutex poisoned, continuing");
                poisoned.into_inner()
            }
        };
        guard
            .entry(serial.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe("VD-001");

        bus.publish(
            "VD-001",
            DeviceEvent::AnalysisStarted {
                photo_url: "/api/devices/1/photo/latest".into(),
            },
        );

        let event = rx.recv().await.expect("event should arrive");
        assert_eq!(
            event,
            DeviceEvent::AnalysisStarted {
                photo_url: "/api/devices/1/photo/latest".into(),
            }
        );
    }

    #[tokio::test]
    async fn channels_are_isolated_per_serial() {
        let bus = EventBus::new();
        let mut rx_other = bus.subscribe("VD-002");

        bus.publish(
            "VD-001",
            DeviceEvent::AnalysisStarted {
                photo_url: "/api/devices/1/photo/latest".into(),
            },
        );

        assert!(rx_other.try_recv().is_err());
    }
}
