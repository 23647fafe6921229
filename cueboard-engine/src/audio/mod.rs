//! Audio processing components
//!
//! Decoding of asset files into channel-ready sample buffers, and the
//! optional cpal output stage the buffer tap attaches to.

pub mod decode;
pub mod output;

pub use decode::{decode_file, DecodedAudio};
pub use output::{FrameSource, OutputStage, SilenceSource};
