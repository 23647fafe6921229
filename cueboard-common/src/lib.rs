//! # Cueboard Common Library
//!
//! Shared event definitions and types for the cueboard playback engine.
//!
//! The engine crate and any host-facing adapters (remote control surface,
//! buffer tap consumers) communicate exclusively through the [`events::EventBus`]
//! and the types defined here, so this crate carries no playback logic of its
//! own.

pub mod events;
pub mod types;

pub use events::{AudioEvent, EventBus};
pub use types::{NowPlayingInfo, TransportCommand};
