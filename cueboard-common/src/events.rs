//! Event types for the cueboard playback engine
//!
//! # Architecture
//!
//! Cueboard uses hybrid communication:
//! - **EventBus** (tokio::broadcast): one-to-many event broadcasting
//! - **Command channels** (tokio::mpsc): request to a single worker
//! - **Shared state** (Arc<RwLock<T>>): read-heavy access
//!
//! Every playback-visible state change is announced as an [`AudioEvent`].
//! Events are fire-only: the engine never waits for a consumer, and a missing
//! consumer is not an error. The serialized form uses the camelCase wire names
//! the host protocol expects (`audioHasStartedPlaying`, `complete`, ...).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Playback events emitted by the engine and its adapters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AudioEvent {
    /// A channel of the asset started playing (plain or fade-step start)
    AudioHasStartedPlaying {
        asset_id: String,
        timestamp: DateTime<Utc>,
    },

    /// The asset's cursor channel was paused
    AudioHasPausedPlaying {
        asset_id: String,
        timestamp: DateTime<Utc>,
    },

    /// The asset's cursor channel resumed after a pause
    AudioHasResumedPlaying {
        asset_id: String,
        timestamp: DateTime<Utc>,
    },

    /// All channels of the asset were stopped (or a stop-side fade step ran)
    AudioHasStoppedPlaying {
        asset_id: String,
        timestamp: DateTime<Utc>,
    },

    /// A single-channel asset reached its natural end of playback
    ///
    /// Only emitted for assets preloaded with exactly one channel; with more
    /// channels end-of-playback is ambiguous and never reported.
    Complete {
        asset_id: String,
        timestamp: DateTime<Utc>,
    },

    /// The remote-control surface pressed "next track"
    NextTrackCommandWasPressed {
        asset_id: String,
        timestamp: DateTime<Utc>,
    },

    /// The remote-control surface pressed "previous track"
    PreviousTrackCommandWasPressed {
        asset_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Raw frame forwarding from the output-stage buffer tap
    ///
    /// The field name is part of the wire protocol. The payload is raw sample
    /// data copied off the render path, not frequency-domain data.
    AudioVisualizationData {
        frequency_bins: Vec<f32>,
        timestamp: DateTime<Utc>,
    },

    /// A playback-side failure that is reported as an event, not a command
    /// error (for example playing an asset whose channel pool is empty)
    AudioError {
        asset_id: String,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl AudioEvent {
    /// Get event type as string for filtering
    pub fn event_type(&self) -> &str {
        match self {
            AudioEvent::AudioHasStartedPlaying { .. } => "audioHasStartedPlaying",
            AudioEvent::AudioHasPausedPlaying { .. } => "audioHasPausedPlaying",
            AudioEvent::AudioHasResumedPlaying { .. } => "audioHasResumedPlaying",
            AudioEvent::AudioHasStoppedPlaying { .. } => "audioHasStoppedPlaying",
            AudioEvent::Complete { .. } => "complete",
            AudioEvent::NextTrackCommandWasPressed { .. } => "nextTrackCommandWasPressed",
            AudioEvent::PreviousTrackCommandWasPressed { .. } => "previousTrackCommandWasPressed",
            AudioEvent::AudioVisualizationData { .. } => "audioVisualizationData",
            AudioEvent::AudioError { .. } => "audioError",
        }
    }

    /// Asset identifier carried by the event, if it names one
    pub fn asset_id(&self) -> Option<&str> {
        match self {
            AudioEvent::AudioHasStartedPlaying { asset_id, .. }
            | AudioEvent::AudioHasPausedPlaying { asset_id, .. }
            | AudioEvent::AudioHasResumedPlaying { asset_id, .. }
            | AudioEvent::AudioHasStoppedPlaying { asset_id, .. }
            | AudioEvent::Complete { asset_id, .. }
            | AudioEvent::NextTrackCommandWasPressed { asset_id, .. }
            | AudioEvent::PreviousTrackCommandWasPressed { asset_id, .. }
            | AudioEvent::AudioError { asset_id, .. } => Some(asset_id),
            AudioEvent::AudioVisualizationData { .. } => None,
        }
    }

    /// Playback started event for `asset_id`, stamped now
    pub fn started(asset_id: impl Into<String>) -> Self {
        AudioEvent::AudioHasStartedPlaying {
            asset_id: asset_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// Playback paused event for `asset_id`, stamped now
    pub fn paused(asset_id: impl Into<String>) -> Self {
        AudioEvent::AudioHasPausedPlaying {
            asset_id: asset_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// Playback resumed event for `asset_id`, stamped now
    pub fn resumed(asset_id: impl Into<String>) -> Self {
        AudioEvent::AudioHasResumedPlaying {
            asset_id: asset_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// Playback stopped event for `asset_id`, stamped now
    pub fn stopped(asset_id: impl Into<String>) -> Self {
        AudioEvent::AudioHasStoppedPlaying {
            asset_id: asset_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// Natural end-of-playback event for `asset_id`, stamped now
    pub fn complete(asset_id: impl Into<String>) -> Self {
        AudioEvent::Complete {
            asset_id: asset_id.into(),
            timestamp: Utc::now(),
        }
    }

    /// Playback-side error event for `asset_id`, stamped now
    pub fn error(asset_id: impl Into<String>, message: impl Into<String>) -> Self {
        AudioEvent::AudioError {
            asset_id: asset_id.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Central event distribution bus for engine-wide events
///
/// The EventBus uses tokio::broadcast internally, providing:
/// - Non-blocking publish (slow subscribers don't block producers)
/// - Multiple concurrent subscribers
/// - Automatic cleanup when subscribers drop
/// - Lagged message detection for slow subscribers
///
/// # Examples
///
/// ```
/// use cueboard_common::events::{AudioEvent, EventBus};
/// use std::sync::Arc;
///
/// let bus = Arc::new(EventBus::new(256));
/// let mut rx = bus.subscribe();
///
/// bus.emit(AudioEvent::started("boom")).ok();
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<AudioEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// `capacity` is the number of events buffered before the oldest events
    /// are dropped for lagging subscribers.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<AudioEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists, or
    /// `Err` when nobody is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: AudioEvent,
    ) -> Result<usize, broadcast::error::SendError<AudioEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case
    ///
    /// Playback events are fire-only, so most emit sites use this form.
    pub fn emit_lossy(&self, event: AudioEvent) {
        let _ = self.tx.send(event);
    }

    /// Configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of currently attached subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

// ========================================
// Tests
// ========================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_eventbus_new() {
        let bus = EventBus::new(100);
        assert_eq!(bus.capacity(), 100);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(100);
        let _rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_eventbus_emit_no_subscribers() {
        let bus = EventBus::new(100);

        // Should return error when no subscribers
        assert!(bus.emit(AudioEvent::started("boom")).is_err());

        // Lossy form swallows the same case
        bus.emit_lossy(AudioEvent::stopped("boom"));
    }

    #[tokio::test]
    async fn test_eventbus_emit_with_subscriber() {
        let bus = Arc::new(EventBus::new(100));
        let mut rx = bus.subscribe();

        assert!(bus.emit(AudioEvent::started("boom")).is_ok());

        let received = rx.recv().await.unwrap();
        match received {
            AudioEvent::AudioHasStartedPlaying { asset_id, .. } => {
                assert_eq!(asset_id, "boom");
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }

    #[test]
    fn test_event_wire_names() {
        let cases = [
            (AudioEvent::started("a"), "audioHasStartedPlaying"),
            (AudioEvent::paused("a"), "audioHasPausedPlaying"),
            (AudioEvent::resumed("a"), "audioHasResumedPlaying"),
            (AudioEvent::stopped("a"), "audioHasStoppedPlaying"),
            (AudioEvent::complete("a"), "complete"),
            (AudioEvent::error("a", "m"), "audioError"),
        ];

        for (event, expected) in cases {
            assert_eq!(event.event_type(), expected);
            let value = serde_json::to_value(&event).unwrap();
            assert_eq!(value["type"], expected);
            assert_eq!(value["assetId"], "a");
        }
    }

    #[test]
    fn test_visualization_event_payload() {
        let event = AudioEvent::AudioVisualizationData {
            frequency_bins: vec![0.0, 0.5, -0.5],
            timestamp: Utc::now(),
        };

        assert!(event.asset_id().is_none());

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "audioVisualizationData");
        assert_eq!(value["frequencyBins"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_event_roundtrip() {
        let event = AudioEvent::error("boom", "no channels");
        let json = serde_json::to_string(&event).unwrap();
        let back: AudioEvent = serde_json::from_str(&json).unwrap();

        match back {
            AudioEvent::AudioError {
                asset_id, message, ..
            } => {
                assert_eq!(asset_id, "boom");
                assert_eq!(message, "no channels");
            }
            other => panic!("Wrong event type received: {:?}", other),
        }
    }
}
