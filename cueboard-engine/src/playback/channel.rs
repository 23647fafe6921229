//! Single playback channel
//!
//! One independently playable instance of an asset's decoded audio. Position
//! is a wall-clock model: a playing channel derives its position from the
//! instant it started, so queries never touch the render path. Actual device
//! rendering is the host output stage's concern.
//!
//! Channels are owned exclusively by one engine and only mutated from the
//! context serializing that engine's commands.

use crate::audio::decode::DecodedAudio;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Transport state of a channel
///
/// `Stopped` and `Paused` both retain a position; stopping does not rewind,
/// matching the backing player semantics the engine was built against.
#[derive(Debug, Clone, Copy)]
enum Transport {
    Stopped { at: f64 },
    Playing { started: Instant, from: f64 },
    Paused { at: f64 },
}

/// One pre-decoded, independently playable channel
#[derive(Debug, Clone)]
pub struct Channel {
    audio: Arc<DecodedAudio>,
    volume: f32,
    looping: bool,
    transport: Transport,
}

impl Channel {
    /// Create a primed channel at the given volume
    pub fn new(audio: Arc<DecodedAudio>, volume: f32) -> Self {
        Self {
            audio,
            volume: volume.clamp(0.0, 1.0),
            looping: false,
            transport: Transport::Stopped { at: 0.0 },
        }
    }

    /// Total duration of the channel's audio in seconds
    pub fn duration_secs(&self) -> f64 {
        self.audio.duration_secs()
    }

    /// Current playback position in seconds
    ///
    /// Playing channels clamp to the duration once past the end (or wrap when
    /// looping); a start instant scheduled in the future reports the start
    /// position until the instant passes.
    pub fn position_secs(&self) -> f64 {
        match self.transport {
            Transport::Stopped { at } | Transport::Paused { at } => at,
            Transport::Playing { started, from } => {
                let elapsed = Instant::now().saturating_duration_since(started);
                let raw = from + elapsed.as_secs_f64();
                let duration = self.duration_secs();

                if duration <= 0.0 {
                    0.0
                } else if self.looping {
                    raw % duration
                } else {
                    raw.min(duration)
                }
            }
        }
    }

    /// Whether the channel is currently producing audio
    ///
    /// A non-looping channel that ran past its end is no longer playing even
    /// though nothing explicitly stopped it.
    pub fn is_playing(&self) -> bool {
        match self.transport {
            Transport::Playing { started, from } => {
                if self.looping {
                    return true;
                }
                let elapsed = Instant::now().saturating_duration_since(started);
                from + elapsed.as_secs_f64() < self.duration_secs()
            }
            _ => false,
        }
    }

    /// Whether playback ran to its natural end without being stopped
    pub fn finished_naturally(&self) -> bool {
        match self.transport {
            Transport::Playing { started, from } => {
                if self.looping {
                    return false;
                }
                let duration = self.duration_secs();
                let elapsed = Instant::now().saturating_duration_since(started);
                duration > 0.0 && from + elapsed.as_secs_f64() >= duration
            }
            _ => false,
        }
    }

    /// Start playback from `time` seconds
    pub fn play_from(&mut self, time: f64) {
        let from = time.clamp(0.0, self.duration_secs());
        self.transport = Transport::Playing {
            started: Instant::now(),
            from,
        };
    }

    /// Pause, retaining the current position
    pub fn pause(&mut self) {
        if let Transport::Playing { .. } = self.transport {
            self.transport = Transport::Paused {
                at: self.position_secs(),
            };
        }
    }

    /// Resume from the retained position, scheduled `offset` in the future
    ///
    /// The offset leaves the render path a moment to pick the channel up
    /// cleanly instead of cutting in at the exact current time.
    pub fn resume(&mut self, offset: Duration) {
        match self.transport {
            Transport::Paused { at } | Transport::Stopped { at } => {
                self.transport = Transport::Playing {
                    started: Instant::now() + offset,
                    from: at,
                };
            }
            Transport::Playing { .. } => {}
        }
    }

    /// Stop playback, retaining the current position
    pub fn stop(&mut self) {
        self.transport = Transport::Stopped {
            at: self.position_secs(),
        };
    }

    /// Move the playback position without affecting play state
    pub fn seek(&mut self, time: f64) {
        let time = time.clamp(0.0, self.duration_secs());
        let finished = self.finished_naturally();

        self.transport = match self.transport {
            // A channel that already ran out does not restart on seek
            Transport::Playing { .. } if finished => Transport::Stopped { at: time },
            Transport::Playing { .. } => Transport::Playing {
                started: Instant::now(),
                from: time,
            },
            Transport::Paused { .. } => Transport::Paused { at: time },
            Transport::Stopped { .. } => Transport::Stopped { at: time },
        };
    }

    /// Current channel volume
    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Set the channel volume immediately
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
    }

    /// Apply one fade step, never exceeding `ceiling`
    pub fn bump_volume(&mut self, step: f32, ceiling: f32) {
        if self.volume < ceiling {
            self.volume = (self.volume + step).min(ceiling);
        }
    }

    /// Whether the channel loops indefinitely
    pub fn looping(&self) -> bool {
        self.looping
    }

    /// Enable or disable indefinite looping
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }
}
