//! Audio output stage using cpal
//!
//! Opens the default output device and runs a callback-driven f32 stream.
//! The callback pulls frames from an injected [`FrameSource`] and mirrors
//! whatever it rendered into an optional [`TapProducer`], which is where the
//! buffer tap observes the output stage.
//!
//! The engine and registry are fully functional without this module; hosts
//! that render through their own pipeline simply never construct an
//! `OutputStage`.

use crate::error::{Error, Result};
use crate::tap::TapProducer;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Source of rendered frames for the output callback
///
/// Implementations must be wait-free: the callback runs on the
/// latency-sensitive render context.
pub trait FrameSource: Send {
    /// Fill `buf` with interleaved samples
    fn fill(&mut self, buf: &mut [f32]);
}

/// Renders silence; the default source when the host has nothing to play
/// through the stage
pub struct SilenceSource;

impl FrameSource for SilenceSource {
    fn fill(&mut self, buf: &mut [f32]) {
        buf.fill(0.0);
    }
}

/// Audio output manager wrapping a cpal stream
pub struct OutputStage {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    /// Set by the audio callback when the stream reports an error
    error_flag: Arc<AtomicBool>,
}

impl OutputStage {
    /// Open the default output device
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No output device available".to_string()))?;

        let supported = device
            .default_output_config()
            .map_err(|e| Error::AudioOutput(format!("Failed to get device config: {}", e)))?;

        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.config();

        info!(
            device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
            sample_rate = config.sample_rate.0,
            channels = config.channels,
            "Opened audio output device"
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            error_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Start the output stream
    ///
    /// Every callback fills from `source`, then mirrors the buffer into
    /// `tap` when one is installed. The tap never blocks the callback.
    pub fn start(&mut self, mut source: Box<dyn FrameSource>, mut tap: Option<TapProducer>) -> Result<()> {
        if self.stream.is_some() {
            warn!("Output stream already running");
            return Ok(());
        }

        if self.sample_format != SampleFormat::F32 {
            return Err(Error::AudioOutput(format!(
                "Unsupported device sample format: {:?}",
                self.sample_format
            )));
        }

        let error_flag = Arc::clone(&self.error_flag);

        let stream = self
            .device
            .build_output_stream(
                &self.config,
                move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                    source.fill(data);
                    if let Some(tap) = tap.as_mut() {
                        tap.ingest(data);
                    }
                },
                move |e| {
                    error!("Audio stream error: {}", e);
                    error_flag.store(true, Ordering::Relaxed);
                },
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

        self.stream = Some(stream);
        info!("Audio output stream started");
        Ok(())
    }

    /// Stop and drop the stream
    pub fn stop(&mut self) {
        if self.stream.take().is_some() {
            info!("Audio output stream stopped");
        }
    }

    /// Device sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate.0
    }

    /// Device channel count
    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    /// Whether the stream has reported an error since starting
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::Relaxed)
    }
}

impl Drop for OutputStage {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_source_zeroes_buffer() {
        let mut source = SilenceSource;
        let mut buf = vec![1.0f32; 64];
        source.fill(&mut buf);
        assert!(buf.iter().all(|&s| s == 0.0));
    }

    #[test]
    #[ignore = "requires an audio output device"]
    fn test_open_and_start_default_device() {
        let mut stage = OutputStage::new().unwrap();
        stage.start(Box::new(SilenceSource), None).unwrap();
        assert!(stage.sample_rate() > 0);
        stage.stop();
    }
}
