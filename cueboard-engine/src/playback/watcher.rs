//! Natural end-of-playback notification
//!
//! Only a single-channel asset has an unambiguous end of playback, so the
//! watcher is an explicit capability that can only be constructed for
//! engines with exactly one channel. Multi-channel engines do not have
//! completion notification at all; that is a documented property of the
//! pool, not a silent no-op.
//!
//! The watcher polls the registered entry on an interval, edge-detects the
//! playing-to-finished transition, and emits `complete`. It exits on its own
//! once the asset disappears from the registry.

use crate::playback::asset::{AssetEntry, AudioAssetEngine};
use cueboard_common::events::{AudioEvent, EventBus};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::debug;

/// Shared registry storage the watcher observes
pub(crate) type SharedAssets = Arc<RwLock<HashMap<String, AssetEntry>>>;

/// Poller that forwards a single-channel asset's natural end as `complete`
pub struct CompletionWatcher {
    asset_id: String,
    assets: Weak<RwLock<HashMap<String, AssetEntry>>>,
    events: EventBus,
    poll: Duration,
}

impl CompletionWatcher {
    /// Create a watcher for `engine`, or None when the pool size makes
    /// completion ambiguous
    pub(crate) fn try_new(
        engine: &AudioAssetEngine,
        assets: &SharedAssets,
        events: EventBus,
        poll: Duration,
    ) -> Option<Self> {
        if engine.channel_count() != 1 {
            return None;
        }

        Some(Self {
            asset_id: engine.asset_id().to_string(),
            assets: Arc::downgrade(assets),
            events,
            poll,
        })
    }

    /// Spawn the watch loop
    pub(crate) fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let mut tick = interval(self.poll);
        let mut was_playing = false;

        loop {
            tick.tick().await;

            let Some(assets) = self.assets.upgrade() else {
                break;
            };

            let probe = {
                let guard = assets.read().await;
                match guard.get(&self.asset_id) {
                    Some(AssetEntry::MultiChannel(engine)) => engine.completion_probe(),
                    _ => break, // unloaded, or replaced by something unexpected
                }
            };

            let Some((playing, finished)) = probe else {
                break;
            };

            if playing {
                was_playing = true;
            } else if was_playing && finished {
                was_playing = false;
                debug!(asset_id = %self.asset_id, "Playback ran to completion");
                self.events
                    .emit_lossy(AudioEvent::complete(&self.asset_id));
            }
        }

        debug!(asset_id = %self.asset_id, "Completion watcher exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::DecodedAudio;
    use crate::playback::channel::Channel;
    use tokio::time::{sleep, timeout};

    fn shared_single(duration_secs: f64, events: &EventBus) -> SharedAssets {
        let frames = (duration_secs * 44100.0) as usize;
        let audio = Arc::new(DecodedAudio::new(vec![0.0; frames * 2], 44100));
        let channels = vec![Channel::new(audio, 1.0)];
        let engine =
            AudioAssetEngine::from_channels("once", channels, 1.0, 0.05, events.clone());

        let mut map = HashMap::new();
        map.insert("once".to_string(), AssetEntry::MultiChannel(engine));
        Arc::new(RwLock::new(map))
    }

    #[tokio::test]
    async fn test_complete_emitted_once_per_playthrough() {
        let events = EventBus::new(64);
        let assets = shared_single(0.08, &events);
        let mut rx = events.subscribe();

        let watcher = {
            let guard = assets.read().await;
            let AssetEntry::MultiChannel(engine) = guard.get("once").unwrap() else {
                unreachable!();
            };
            CompletionWatcher::try_new(engine, &assets, events.clone(), Duration::from_millis(10))
                .unwrap()
        };
        let handle = watcher.spawn();

        // Start playback after the watcher is live
        {
            let mut guard = assets.write().await;
            let Some(AssetEntry::MultiChannel(engine)) = guard.get_mut("once") else {
                unreachable!();
            };
            engine.play(0.0);
        }

        let event = timeout(Duration::from_secs(2), async {
            loop {
                match rx.recv().await.unwrap() {
                    AudioEvent::Complete { asset_id, .. } => break asset_id,
                    _ => continue,
                }
            }
        })
        .await
        .expect("complete event not emitted");
        assert_eq!(event, "once");

        // A finished channel left alone does not re-fire
        sleep(Duration::from_millis(100)).await;
        let mut extra = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, AudioEvent::Complete { .. }) {
                extra += 1;
            }
        }
        assert_eq!(extra, 0);

        handle.abort();
    }

    #[tokio::test]
    async fn test_watcher_exits_after_unload() {
        let events = EventBus::new(64);
        let assets = shared_single(1.0, &events);

        let watcher = {
            let guard = assets.read().await;
            let AssetEntry::MultiChannel(engine) = guard.get("once").unwrap() else {
                unreachable!();
            };
            CompletionWatcher::try_new(engine, &assets, events.clone(), Duration::from_millis(10))
                .unwrap()
        };
        let handle = watcher.spawn();

        assets.write().await.remove("once");

        timeout(Duration::from_secs(2), handle)
            .await
            .expect("watcher did not exit")
            .unwrap();
    }

    #[tokio::test]
    async fn test_not_constructible_for_multi_channel() {
        let events = EventBus::new(64);
        let audio = Arc::new(DecodedAudio::new(vec![0.0; 8820], 44100));
        let channels = vec![
            Channel::new(audio.clone(), 1.0),
            Channel::new(audio, 1.0),
        ];
        let engine =
            AudioAssetEngine::from_channels("many", channels, 1.0, 0.05, events.clone());
        let assets: SharedAssets = Arc::new(RwLock::new(HashMap::new()));

        assert!(CompletionWatcher::try_new(
            &engine,
            &assets,
            events,
            Duration::from_millis(10)
        )
        .is_none());
    }
}
