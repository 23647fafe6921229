//! Output-stage buffer tap
//!
//! Copies raw frames off the audio render path and forwards them outward as
//! `audioVisualizationData` events. The render side must never block, take a
//! lock shared with the registry, or allocate, so the handoff is a
//! lock-free SPSC ring buffer: the callback pushes what fits and silently
//! drops the rest, and a forwarding task drains whole frames on an interval.
//!
//! The tap is purely observational. Nothing else in the engine depends on
//! it, and an absent or stalled consumer costs the render path nothing.

use cueboard_common::events::{AudioEvent, EventBus};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::debug;

/// Render-side half of the tap
///
/// Safe to call from the audio callback: `ingest` is wait-free and never
/// allocates.
pub struct TapProducer {
    producer: HeapProd<f32>,
}

impl TapProducer {
    /// Push samples into the tap, returning how many were accepted
    ///
    /// Samples that do not fit are dropped; the render path never waits for
    /// the consumer.
    pub fn ingest(&mut self, samples: &[f32]) -> usize {
        self.producer.push_slice(samples)
    }
}

/// Forwarding half of the tap
///
/// Drains whole frames from the ring buffer and emits each as an
/// `audioVisualizationData` event.
pub struct BufferTapSink {
    consumer: HeapCons<f32>,
    events: EventBus,
    frame_len: usize,
    poll: Duration,
}

impl BufferTapSink {
    /// Create a tap forwarding `frame_len`-sample frames
    ///
    /// `capacity_frames` sizes the ring buffer; the render side drops
    /// samples once it is full.
    pub fn new(
        events: EventBus,
        frame_len: usize,
        capacity_frames: usize,
        poll: Duration,
    ) -> (TapProducer, BufferTapSink) {
        let ring = HeapRb::<f32>::new(frame_len * capacity_frames.max(2));
        let (producer, consumer) = ring.split();

        (
            TapProducer { producer },
            BufferTapSink {
                consumer,
                events,
                frame_len,
                poll,
            },
        )
    }

    /// Spawn the forwarding loop
    ///
    /// Runs until aborted; an idle producer simply yields no events.
    pub fn spawn(mut self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = interval(self.poll);
            let mut frame = vec![0.0f32; self.frame_len];

            debug!(frame_len = self.frame_len, "Buffer tap forwarding started");

            loop {
                tick.tick().await;

                while self.consumer.occupied_len() >= self.frame_len {
                    let got = self.consumer.pop_slice(&mut frame);
                    if got < self.frame_len {
                        break;
                    }

                    self.events.emit_lossy(AudioEvent::AudioVisualizationData {
                        frequency_bins: frame.clone(),
                        timestamp: chrono::Utc::now(),
                    });
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_ingested_frames_are_forwarded() {
        let events = EventBus::new(64);
        let (mut producer, sink) =
            BufferTapSink::new(events.clone(), 4, 8, Duration::from_millis(5));
        let mut rx = events.subscribe();
        let handle = sink.spawn();

        let accepted = producer.ingest(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8]);
        assert_eq!(accepted, 8);

        let first = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("no event forwarded")
            .unwrap();
        match first {
            AudioEvent::AudioVisualizationData { frequency_bins, .. } => {
                assert_eq!(frequency_bins, vec![0.1, 0.2, 0.3, 0.4]);
            }
            other => panic!("unexpected event {:?}", other),
        }

        handle.abort();
    }

    #[tokio::test]
    async fn test_overflow_drops_instead_of_blocking() {
        let events = EventBus::new(64);
        // Tiny ring: 4-sample frames, 2 frames of capacity
        let (mut producer, _sink) =
            BufferTapSink::new(events, 4, 2, Duration::from_millis(5));

        let accepted = producer.ingest(&[0.0; 64]);
        assert!(accepted <= 8);
    }

    #[tokio::test]
    async fn test_partial_frame_is_held_back() {
        let events = EventBus::new(64);
        let (mut producer, sink) =
            BufferTapSink::new(events.clone(), 4, 8, Duration::from_millis(5));
        let mut rx = events.subscribe();
        let handle = sink.spawn();

        producer.ingest(&[0.1, 0.2]);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(rx.try_recv().is_err());

        handle.abort();
    }
}
