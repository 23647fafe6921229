//! Shared types exchanged between the engine and host-facing adapters

use serde::{Deserialize, Serialize};

/// Transport events arriving from the system remote-control surface
///
/// The platform hookup that produces these (media keys, lock-screen
/// transport, headset buttons) is the host's concern; the engine only
/// consumes the decoded commands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TransportCommand {
    /// Resume playback
    Play,
    /// Pause playback
    Pause,
    /// Move the playback position
    Seek { position_secs: f64 },
    /// Skip forward; forwarded as a named event, never acted on directly
    NextTrack,
    /// Skip backward; forwarded as a named event, never acted on directly
    PreviousTrack,
}

/// Metadata pushed to the system now-playing surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NowPlayingInfo {
    pub title: String,
    pub artist: String,
    /// Elapsed playback time of the asset, in seconds
    pub elapsed_secs: f64,
    /// Total duration of the asset, in seconds
    pub duration_secs: f64,
    /// Always 1.0; the engine has no variable-rate playback
    pub playback_rate: f64,
}
