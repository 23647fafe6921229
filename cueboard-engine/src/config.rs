//! Configuration for the cueboard engine
//!
//! All settings carry built-in defaults defined in code; a TOML file is
//! optional and overrides individual fields. The binary layers CLI flags on
//! top. Nothing here changes at runtime except the two `configure()` flags
//! (fade mode, focus), which live on the registry.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Engine configuration, loadable from TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Start with fade mode enabled (equivalent to `configure(fade: true)`)
    pub fade: bool,

    /// Start with exclusive audio focus requested
    ///
    /// Session policy itself is the platform's concern; the engine stores and
    /// reports the flag.
    pub focus_audio: bool,

    /// Volume increment applied per fade-class call (0.0 to 1.0)
    pub fade_step: f32,

    /// Default per-asset fade delay in seconds, used when a preload does not
    /// specify one
    pub fade_delay_secs: f64,

    /// How far in the future a resumed channel is scheduled, in milliseconds
    pub resume_offset_ms: u64,

    /// Poll interval of the completion watcher for single-channel assets
    pub completion_poll_ms: u64,

    /// EventBus channel capacity
    pub event_capacity: usize,

    /// Depth of the loader and transport command queues
    pub queue_depth: usize,

    /// Base directory for non-URL asset paths
    ///
    /// Defaults to the user's document directory, falling back to the current
    /// working directory.
    pub base_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            fade: false,
            focus_audio: false,
            fade_step: 0.05,
            fade_delay_secs: 1.0,
            resume_offset_ms: 10,
            completion_poll_ms: 100,
            event_capacity: 256,
            queue_depth: 64,
            base_dir: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: EngineConfig = toml::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {}", path.as_ref().display(), e)))?;

        info!("Loaded configuration from {}", path.as_ref().display());
        Ok(config)
    }

    /// Resolved base directory for non-URL asset paths
    pub fn resolve_base_dir(&self) -> PathBuf {
        if let Some(dir) = &self.base_dir {
            return dir.clone();
        }

        dirs::document_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Resume scheduling offset as a Duration
    pub fn resume_offset(&self) -> Duration {
        Duration::from_millis(self.resume_offset_ms)
    }

    /// Completion watcher poll interval as a Duration
    pub fn completion_poll(&self) -> Duration {
        Duration::from_millis(self.completion_poll_ms)
    }
}
