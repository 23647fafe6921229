//! # Cueboard Engine Library
//!
//! Embedded audio-asset playback engine: preload short sound effects and
//! longer tracks under string identifiers, play them through fixed pools of
//! pre-decoded channels, fade volume in fixed steps, and surface transport
//! control to a system remote-control surface.
//!
//! **Architecture:** per-asset channel pools over a wall-clock transport
//! model, owned by a process-wide registry that serializes preload-class and
//! play-class commands through two ordered tokio work queues. State changes
//! broadcast on an event bus; decoding uses symphonia, the optional output
//! stage uses cpal.

pub mod audio;
pub mod config;
pub mod error;
pub mod paths;
pub mod playback;
pub mod registry;
pub mod remote;
pub mod tap;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use registry::{AssetRegistry, PreloadRequest};
