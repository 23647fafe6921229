//! Remote-control surface adapter
//!
//! Adapts transport events from the system remote-control surface into
//! registry calls and re-emits the two skip commands as named events. The
//! bridge is stateless and fully decoupled from engine internals: it only
//! sees the registry's public surface.
//!
//! There is no "now playing" pointer. Every command acts on whichever
//! channel-pooled asset the registry's iteration yields first, which is not
//! necessarily the one audible. That limitation is inherited from the
//! surface this engine was built against and is preserved deliberately.

use crate::error::Result;
use crate::registry::AssetRegistry;
use chrono::Utc;
use cueboard_common::events::AudioEvent;
use cueboard_common::types::{NowPlayingInfo, TransportCommand};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Destination for now-playing metadata
///
/// The platform adapter implements this; the default implementation only
/// logs, which keeps headless hosts working.
pub trait NowPlayingSurface: Send + Sync {
    fn update(&self, info: &NowPlayingInfo);
}

/// Logging now-playing surface for hosts without a platform adapter
pub struct LogNowPlaying;

impl NowPlayingSurface for LogNowPlaying {
    fn update(&self, info: &NowPlayingInfo) {
        info!(
            title = %info.title,
            artist = %info.artist,
            elapsed_secs = info.elapsed_secs,
            duration_secs = info.duration_secs,
            "Now playing updated"
        );
    }
}

/// Bridge between the system transport surface and the registry
pub struct RemoteControlBridge {
    registry: AssetRegistry,
    surface: Arc<dyn NowPlayingSurface>,
}

impl RemoteControlBridge {
    /// Create a bridge with the logging now-playing surface
    pub fn new(registry: AssetRegistry) -> Self {
        Self::with_surface(registry, Arc::new(LogNowPlaying))
    }

    /// Create a bridge pushing now-playing metadata to `surface`
    pub fn with_surface(registry: AssetRegistry, surface: Arc<dyn NowPlayingSurface>) -> Self {
        Self { registry, surface }
    }

    /// Spawn the command loop, consuming transport events until the sender
    /// side closes
    pub fn spawn(self, mut commands: mpsc::Receiver<TransportCommand>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Remote control bridge attached");
            while let Some(command) = commands.recv().await {
                self.handle(command).await;
            }
            info!("Remote control bridge detached");
        })
    }

    /// Apply one transport command
    pub async fn handle(&self, command: TransportCommand) {
        let Some(asset_id) = self.registry.first_engine_id().await else {
            debug!(?command, "Transport command with no registered engine");
            return;
        };

        // Resolve-then-delegate can race an unload; a vanished asset is a
        // non-event for the transport surface
        let result = match command {
            TransportCommand::Play => self.registry.resume(&asset_id).await,
            TransportCommand::Pause => self.registry.pause(&asset_id).await,
            TransportCommand::Seek { position_secs } => {
                self.registry.seek(&asset_id, position_secs).await
            }
            TransportCommand::NextTrack => {
                self.registry
                    .events()
                    .emit_lossy(AudioEvent::NextTrackCommandWasPressed {
                        asset_id: asset_id.clone(),
                        timestamp: Utc::now(),
                    });
                Ok(())
            }
            TransportCommand::PreviousTrack => {
                self.registry
                    .events()
                    .emit_lossy(AudioEvent::PreviousTrackCommandWasPressed {
                        asset_id: asset_id.clone(),
                        timestamp: Utc::now(),
                    });
                Ok(())
            }
        };

        if let Err(e) = result {
            debug!(asset_id = %asset_id, "Transport command failed: {}", e);
        }
    }

    /// Push title/artist plus the asset's elapsed time and duration to the
    /// now-playing surface
    pub async fn update_now_playing(
        &self,
        asset_id: &str,
        title: Option<String>,
        artist: Option<String>,
    ) -> Result<()> {
        let elapsed_secs = self.registry.current_time(asset_id).await?;
        let duration_secs = self.registry.duration(asset_id).await?;

        let info = NowPlayingInfo {
            title: title.unwrap_or_default(),
            artist: artist.unwrap_or_default(),
            elapsed_secs,
            duration_secs,
            playback_rate: 1.0,
        };

        self.surface.update(&info);
        Ok(())
    }
}
