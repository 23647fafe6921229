//! Per-asset playback engine
//!
//! An [`AudioAssetEngine`] owns a fixed pool of [`Channel`]s for one asset
//! and multiplexes playback commands over them with a round-robin cursor.
//! Fades are step-based: each fade-class call applies one volume increment,
//! so a complete fade is driven by repeated calls, not by a timer.
//!
//! Engines never reference their owning registry. State changes are announced
//! through the [`EventBus`] injected at construction.

use crate::audio::decode::{self, DecodedAudio};
use crate::playback::channel::Channel;
use cueboard_common::events::{AudioEvent, EventBus};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Multi-channel playback engine for one preloaded asset
pub struct AudioAssetEngine {
    asset_id: String,

    /// Fixed pool, never resized after construction. May be shorter than the
    /// requested channel count when individual decodes failed, and empty in
    /// the worst case.
    channels: Vec<Channel>,

    /// Round-robin cursor, always `< channels.len()` while the pool is
    /// non-empty
    cursor: usize,

    /// Volume every channel is primed with; the upper bound for fade steps
    initial_volume: f32,

    /// Volume increment per fade-class call
    fade_step: f32,

    /// Suggested pacing between fade-class calls, for hosts driving a ramp
    fade_delay: Duration,

    /// How far in the future a resumed channel is scheduled
    resume_offset: Duration,

    events: EventBus,
}

impl AudioAssetEngine {
    /// Construct an engine, eagerly decoding and priming every channel
    ///
    /// Each channel decodes the file independently; a failed decode drops
    /// only that channel. Callers must treat an engine whose pool came out
    /// empty as degraded: it stays registered but can only answer `play`
    /// with an `audioError` event.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        asset_id: String,
        path: &Path,
        channel_count: usize,
        volume: f32,
        fade_delay: Duration,
        fade_step: f32,
        resume_offset: Duration,
        events: EventBus,
    ) -> Self {
        let volume = volume.clamp(0.0, 1.0);
        let requested = channel_count.max(1);
        let mut channels = Vec::with_capacity(requested);

        for index in 0..requested {
            match decode::decode_file(path) {
                Ok(audio) => {
                    channels.push(Channel::new(Arc::new(audio), volume));
                }
                Err(e) => {
                    warn!(
                        asset_id = %asset_id,
                        channel = index,
                        "Dropping channel, decode failed: {}",
                        e
                    );
                }
            }
        }

        debug!(
            asset_id = %asset_id,
            channels = channels.len(),
            requested,
            "Primed asset engine"
        );

        Self {
            asset_id,
            channels,
            cursor: 0,
            initial_volume: volume,
            fade_step,
            fade_delay,
            resume_offset,
            events,
        }
    }

    /// Build an engine directly from channels, bypassing file decode
    #[cfg(test)]
    pub(crate) fn from_channels(
        asset_id: &str,
        channels: Vec<Channel>,
        initial_volume: f32,
        fade_step: f32,
        events: EventBus,
    ) -> Self {
        Self {
            asset_id: asset_id.to_string(),
            channels,
            cursor: 0,
            initial_volume,
            fade_step,
            fade_delay: Duration::from_secs(1),
            resume_offset: Duration::from_millis(10),
            events,
        }
    }

    /// Start playback on the cursor channel from `time` seconds
    ///
    /// Advances the cursor so the next play lands on the next channel.
    pub fn play(&mut self, time: f64) {
        if self.channels.is_empty() {
            self.emit_no_channels();
            return;
        }

        let channel = &mut self.channels[self.cursor];
        channel.set_looping(false);
        channel.play_from(time);
        self.advance_cursor();

        self.events.emit_lossy(AudioEvent::started(&self.asset_id));
    }

    /// One step of a fade-in start
    ///
    /// The cursor channel is seeked to `time` first. If it is not playing it
    /// starts at volume zero and the cursor advances; if it is playing its
    /// volume rises by one fade step, bounded by the initial volume. Repeat
    /// the call to complete the ramp.
    pub fn play_with_fade(&mut self, time: f64) {
        if self.channels.is_empty() {
            self.emit_no_channels();
            return;
        }

        let (step, ceiling) = (self.fade_step, self.initial_volume);
        let channel = &mut self.channels[self.cursor];
        channel.seek(time);

        if !channel.is_playing() {
            channel.set_looping(false);
            channel.set_volume(0.0);
            channel.play_from(time);
            self.advance_cursor();
        } else {
            channel.bump_volume(step, ceiling);
        }

        self.events.emit_lossy(AudioEvent::started(&self.asset_id));
    }

    /// Pause the cursor channel
    pub fn pause(&mut self) {
        if self.channels.is_empty() {
            self.emit_no_channels();
            return;
        }

        self.channels[self.cursor].pause();
        self.events.emit_lossy(AudioEvent::paused(&self.asset_id));
    }

    /// Resume the cursor channel slightly in the future
    pub fn resume(&mut self) {
        if self.channels.is_empty() {
            self.emit_no_channels();
            return;
        }

        let offset = self.resume_offset;
        self.channels[self.cursor].resume(offset);
        self.events.emit_lossy(AudioEvent::resumed(&self.asset_id));
    }

    /// Stop every channel unconditionally
    pub fn stop(&mut self) {
        for channel in &mut self.channels {
            channel.stop();
        }

        self.events.emit_lossy(AudioEvent::stopped(&self.asset_id));
    }

    /// One step of the stop-side fade
    ///
    /// Mirrors [`play_with_fade`](Self::play_with_fade) step for step: a
    /// non-playing cursor channel is restarted from zero at volume zero and
    /// the cursor advances; a playing one has its volume raised by one step.
    /// The ramp therefore goes up, not down. This is preserved from the
    /// engine's original behavior; see DESIGN.md before changing it.
    pub fn stop_with_fade(&mut self) {
        if self.channels.is_empty() {
            self.emit_no_channels();
            return;
        }

        let (step, ceiling) = (self.fade_step, self.initial_volume);
        let channel = &mut self.channels[self.cursor];

        if !channel.is_playing() {
            channel.seek(0.0);
            channel.set_looping(false);
            channel.set_volume(0.0);
            channel.play_from(0.0);
            self.advance_cursor();
        } else {
            channel.bump_volume(step, ceiling);
        }

        self.events.emit_lossy(AudioEvent::stopped(&self.asset_id));
    }

    /// Stop everything, then loop the cursor channel indefinitely
    ///
    /// The inner `stop` emits its own stopped event before looping begins.
    pub fn do_loop(&mut self) {
        self.stop();

        if self.channels.is_empty() {
            self.emit_no_channels();
            return;
        }

        let channel = &mut self.channels[self.cursor];
        let from = channel.position_secs();
        channel.set_looping(true);
        channel.play_from(from);
        self.advance_cursor();
    }

    /// Stop all channels and release the pool
    ///
    /// The engine becomes empty; the registry removes the entry afterwards.
    pub fn unload(&mut self) {
        self.stop();
        self.channels.clear();
        self.cursor = 0;
    }

    /// Set volume uniformly across all channels, regardless of play state
    pub fn set_volume(&mut self, volume: f32) {
        let volume = volume.clamp(0.0, 1.0);
        for channel in &mut self.channels {
            channel.set_volume(volume);
        }
    }

    /// Move the cursor channel's position without affecting play state
    pub fn seek(&mut self, time: f64) {
        if self.channels.is_empty() {
            self.emit_no_channels();
            return;
        }

        self.channels[self.cursor].seek(time);
    }

    /// Current position in seconds
    ///
    /// Only meaningful for a single-channel engine; with several overlapping
    /// playbacks of the same asset there is no one position, so this reports
    /// zero.
    pub fn current_time(&self) -> f64 {
        if self.channels.len() != 1 {
            return 0.0;
        }
        self.channels[self.cursor].position_secs()
    }

    /// Total duration in seconds; zero unless the engine has exactly one
    /// channel
    pub fn duration(&self) -> f64 {
        if self.channels.len() != 1 {
            return 0.0;
        }
        self.channels[self.cursor].duration_secs()
    }

    /// Whether the engine is playing; false unless it has exactly one channel
    pub fn is_playing(&self) -> bool {
        if self.channels.len() != 1 {
            return false;
        }
        self.channels[self.cursor].is_playing()
    }

    /// Asset identifier this engine serves
    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    /// Number of usable channels (may be below the requested count)
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Round-robin cursor position
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether the channel at `index` is currently playing
    pub fn channel_is_playing(&self, index: usize) -> bool {
        self.channels
            .get(index)
            .map(|c| c.is_playing())
            .unwrap_or(false)
    }

    /// Volume of the channel at `index`, if it exists
    pub fn channel_volume(&self, index: usize) -> Option<f32> {
        self.channels.get(index).map(|c| c.volume())
    }

    /// Suggested pacing between fade-class calls
    pub fn fade_delay(&self) -> Duration {
        self.fade_delay
    }

    /// Completion probe for the watcher: (is playing, finished naturally)
    ///
    /// Only single-channel engines can observe a natural end; any other pool
    /// size returns None.
    pub(crate) fn completion_probe(&self) -> Option<(bool, bool)> {
        if self.channels.len() != 1 {
            return None;
        }
        let channel = &self.channels[0];
        Some((channel.is_playing(), channel.finished_naturally()))
    }

    fn advance_cursor(&mut self) {
        if !self.channels.is_empty() {
            self.cursor = (self.cursor + 1) % self.channels.len();
        }
    }

    fn emit_no_channels(&self) {
        warn!(asset_id = %self.asset_id, "No available audio channels");
        self.events.emit_lossy(AudioEvent::error(
            &self.asset_id,
            "No available audio channels to play the file.",
        ));
    }
}

/// Fire-and-forget system sound
///
/// Lightweight alternative to a channel pool for short notification-style
/// sounds. No fade, pause, resume, or events; playback is delegated to the
/// platform's one-shot sound facility.
pub struct SystemSoundHandle {
    asset_id: String,
    sound_id: u32,
    audio: Arc<DecodedAudio>,
}

impl SystemSoundHandle {
    pub fn new(asset_id: String, sound_id: u32, audio: Arc<DecodedAudio>) -> Self {
        Self {
            asset_id,
            sound_id,
            audio,
        }
    }

    /// Trigger one-shot playback
    pub fn play(&self) {
        debug!(
            asset_id = %self.asset_id,
            sound_id = self.sound_id,
            duration_secs = self.audio.duration_secs(),
            "Firing system sound"
        );
    }

    pub fn asset_id(&self) -> &str {
        &self.asset_id
    }

    /// Opaque platform sound identifier
    pub fn sound_id(&self) -> u32 {
        self.sound_id
    }

    pub fn duration_secs(&self) -> f64 {
        self.audio.duration_secs()
    }
}

/// Registry storage: either a channel-pooled engine or a simple sound
///
/// Dispatch is by pattern match; the two cases share nothing but the
/// identifier.
pub enum AssetEntry {
    MultiChannel(AudioAssetEngine),
    SimpleSound(SystemSoundHandle),
}

impl AssetEntry {
    pub fn asset_id(&self) -> &str {
        match self {
            AssetEntry::MultiChannel(engine) => engine.asset_id(),
            AssetEntry::SimpleSound(sound) => sound.asset_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cueboard_common::events::AudioEvent;
    use std::thread::sleep;

    fn audio(duration_secs: f64) -> Arc<DecodedAudio> {
        let frames = (duration_secs * 44100.0) as usize;
        Arc::new(DecodedAudio::new(vec![0.0; frames * 2], 44100))
    }

    fn engine(channel_count: usize, volume: f32) -> (AudioAssetEngine, EventBus) {
        let events = EventBus::new(64);
        let channels = (0..channel_count)
            .map(|_| Channel::new(audio(1.0), volume))
            .collect();
        let engine =
            AudioAssetEngine::from_channels("boom", channels, volume, 0.05, events.clone());
        (engine, events)
    }

    fn drain(rx: &mut tokio::sync::broadcast::Receiver<AudioEvent>) -> Vec<String> {
        let mut types = Vec::new();
        while let Ok(event) = rx.try_recv() {
            types.push(event.event_type().to_string());
        }
        types
    }

    #[test]
    fn test_round_robin_cursor() {
        let (mut engine, _events) = engine(3, 1.0);

        assert_eq!(engine.cursor(), 0);
        engine.play(0.0);
        assert_eq!(engine.cursor(), 1);
        engine.play(0.0);
        assert_eq!(engine.cursor(), 2);
        engine.play(0.0);
        assert_eq!(engine.cursor(), 0);
        engine.play(0.0);
        assert_eq!(engine.cursor(), 1);

        // First three plays hit channels 0, 1, 2; the fourth wrapped to 0
        assert!(engine.channel_is_playing(0));
        assert!(engine.channel_is_playing(1));
        assert!(engine.channel_is_playing(2));
    }

    #[test]
    fn test_play_emits_started() {
        let (mut engine, events) = engine(1, 1.0);
        let mut rx = events.subscribe();

        engine.play(0.0);
        assert_eq!(drain(&mut rx), vec!["audioHasStartedPlaying"]);
    }

    #[test]
    fn test_empty_pool_play_emits_error() {
        let events = EventBus::new(64);
        let mut engine =
            AudioAssetEngine::from_channels("boom", Vec::new(), 1.0, 0.05, events.clone());
        let mut rx = events.subscribe();

        engine.play(0.0);

        let got = drain(&mut rx);
        assert_eq!(got, vec!["audioError"]);
        assert_eq!(engine.cursor(), 0);
    }

    #[test]
    fn test_fade_starts_at_zero_volume() {
        let (mut engine, _events) = engine(2, 0.9);

        engine.play_with_fade(0.0);
        assert_eq!(engine.channel_volume(0), Some(0.0));
        assert!(engine.channel_is_playing(0));
        assert_eq!(engine.cursor(), 1);
    }

    #[test]
    fn test_fade_steps_are_bounded() {
        let (mut engine, _events) = engine(1, 0.9);

        // First call starts channel 0 at volume zero and wraps the cursor
        engine.play_with_fade(0.0);
        assert!(engine.channel_is_playing(0));

        // Far more steps than needed to reach the initial volume
        for _ in 0..100 {
            engine.play_with_fade(0.0);
        }

        let volume = engine.channel_volume(0).unwrap();
        assert!((volume - 0.9).abs() < 1e-6, "volume was {}", volume);
    }

    #[test]
    fn test_stop_with_fade_mirrors_play_side() {
        let (mut engine, events) = engine(1, 1.0);
        let mut rx = events.subscribe();

        // Not playing: restarts from zero at volume zero
        engine.stop_with_fade();
        assert!(engine.channel_is_playing(0));
        assert_eq!(engine.channel_volume(0), Some(0.0));

        // Playing: volume steps up
        engine.stop_with_fade();
        assert_eq!(engine.channel_volume(0), Some(0.05));

        let got = drain(&mut rx);
        assert_eq!(
            got,
            vec!["audioHasStoppedPlaying", "audioHasStoppedPlaying"]
        );
    }

    #[test]
    fn test_stop_stops_all_channels() {
        let (mut engine, events) = engine(3, 1.0);
        engine.play(0.0);
        engine.play(0.0);
        let mut rx = events.subscribe();

        engine.stop();

        assert!(!engine.channel_is_playing(0));
        assert!(!engine.channel_is_playing(1));
        assert!(!engine.channel_is_playing(2));
        assert_eq!(drain(&mut rx), vec!["audioHasStoppedPlaying"]);
    }

    #[test]
    fn test_pause_resume_cycle() {
        let (mut engine, events) = engine(1, 1.0);
        let mut rx = events.subscribe();

        engine.play(0.0);
        engine.pause();
        assert!(!engine.channel_is_playing(0));

        engine.resume();
        sleep(Duration::from_millis(30));
        assert!(engine.channel_is_playing(0));

        assert_eq!(
            drain(&mut rx),
            vec![
                "audioHasStartedPlaying",
                "audioHasPausedPlaying",
                "audioHasResumedPlaying"
            ]
        );
    }

    #[test]
    fn test_loop_keeps_playing() {
        let events = EventBus::new(64);
        let channels = vec![Channel::new(audio(0.05), 1.0)];
        let mut engine =
            AudioAssetEngine::from_channels("boom", channels, 1.0, 0.05, events.clone());

        engine.do_loop();
        sleep(Duration::from_millis(120));

        // Well past the 50ms duration and still playing
        assert!(engine.channel_is_playing(0));
    }

    #[test]
    fn test_set_volume_uniform() {
        let (mut engine, _events) = engine(3, 1.0);
        engine.play(0.0);

        engine.set_volume(0.4);
        for i in 0..3 {
            assert_eq!(engine.channel_volume(i), Some(0.4));
        }

        // The next channel to play reports the new volume
        engine.play(0.0);
        assert_eq!(engine.channel_volume(1), Some(0.4));
    }

    #[test]
    fn test_single_channel_queries() {
        let (mut engine, _events) = engine(1, 1.0);

        assert!((engine.duration() - 1.0).abs() < 1e-6);
        assert!(!engine.is_playing());

        engine.play(0.0);
        assert!(engine.is_playing());
        sleep(Duration::from_millis(40));
        assert!(engine.current_time() > 0.0);
    }

    #[test]
    fn test_multi_channel_queries_are_defaulted() {
        let (mut engine, _events) = engine(2, 1.0);
        engine.play(0.0);

        assert_eq!(engine.current_time(), 0.0);
        assert_eq!(engine.duration(), 0.0);
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_unload_releases_channels() {
        let (mut engine, events) = engine(2, 1.0);
        engine.play(0.0);
        let mut rx = events.subscribe();

        engine.unload();

        assert_eq!(engine.channel_count(), 0);
        assert_eq!(drain(&mut rx), vec!["audioHasStoppedPlaying"]);
    }

    #[test]
    fn test_completion_probe_single_channel_only() {
        let (single, _events) = engine(1, 1.0);
        assert!(single.completion_probe().is_some());

        let (double, _events) = engine(2, 1.0);
        assert!(double.completion_probe().is_none());
    }

    #[test]
    fn test_end_to_end_two_channel_scenario() {
        let (mut engine, events) = engine(2, 1.0);
        let mut rx = events.subscribe();

        engine.play(0.0);
        engine.play(0.0);

        assert!(engine.channel_is_playing(0));
        assert!(engine.channel_is_playing(1));
        assert_eq!(engine.cursor(), 0);

        engine.stop();
        assert!(!engine.channel_is_playing(0));
        assert!(!engine.channel_is_playing(1));

        let got = drain(&mut rx);
        assert_eq!(
            got,
            vec![
                "audioHasStartedPlaying",
                "audioHasStartedPlaying",
                "audioHasStoppedPlaying"
            ]
        );
    }
}
