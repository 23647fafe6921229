//! Playback components
//!
//! Channel pool playback for preloaded assets: the per-channel transport
//! state machine, the per-asset engine multiplexing a fixed pool of
//! channels, and the completion watcher for single-channel assets.

pub mod asset;
pub mod channel;
pub mod watcher;

pub use asset::{AssetEntry, AudioAssetEngine, SystemSoundHandle};
pub use channel::Channel;
pub use watcher::CompletionWatcher;
