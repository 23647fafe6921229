//! Process-wide asset registry
//!
//! Owns every preloaded asset and is the sole authority for identifier
//! lifetime. Mutating command families run through two ordered work queues,
//! each drained by a single worker task:
//!
//! - **loader queue**: preload, unload
//! - **transport queue**: play, stop
//!
//! Within a queue, operations complete in submission order and never
//! interleave; nothing is guaranteed across queues or across assets. Because
//! a preload executes start to finish inside the loader worker (and the
//! insert re-checks occupancy), two preloads for the same identifier can
//! never both pass the duplicate check.
//!
//! The remaining per-channel commands and the read-only queries execute
//! directly against the stored engine under the map lock, matching their
//! synchronous semantics.

use crate::audio::decode;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::paths;
use crate::playback::asset::{AssetEntry, AudioAssetEngine, SystemSoundHandle};
use crate::playback::watcher::{CompletionWatcher, SharedAssets};
use cueboard_common::events::{AudioEvent, EventBus};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, RwLock};
use tracing::{debug, info, warn};

/// Arguments of a preload command
///
/// Defaults match the host protocol: one channel, full volume,
/// bundle-relative path, and the configured engine-wide fade delay.
#[derive(Debug, Clone)]
pub struct PreloadRequest {
    pub asset_id: String,
    pub asset_path: String,
    pub volume: f32,
    pub channels: usize,
    /// Per-asset fade delay override; None uses the engine default
    pub fade_delay_secs: Option<f64>,
    pub is_url: bool,
    pub as_simple_sound: bool,
}

impl PreloadRequest {
    pub fn new(asset_id: impl Into<String>, asset_path: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            asset_path: asset_path.into(),
            volume: 1.0,
            channels: 1,
            fade_delay_secs: None,
            is_url: false,
            as_simple_sound: false,
        }
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_fade_delay(mut self, secs: f64) -> Self {
        self.fade_delay_secs = Some(secs);
        self
    }

    pub fn from_url(mut self) -> Self {
        self.is_url = true;
        self
    }

    /// Preload as a fire-and-forget system sound instead of a channel pool
    pub fn simple(mut self) -> Self {
        self.as_simple_sound = true;
        self
    }
}

/// Loader-queue commands (preload-class work)
enum LoaderCommand {
    Preload {
        request: PreloadRequest,
        reply: oneshot::Sender<Result<()>>,
    },
    Unload {
        asset_id: String,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Transport-queue commands (play-class work)
enum TransportJob {
    Play {
        asset_id: String,
        time: f64,
        reply: oneshot::Sender<Result<()>>,
    },
    Stop {
        asset_id: String,
        reply: oneshot::Sender<Result<()>>,
    },
}

struct RegistryInner {
    /// The single piece of shared mutable state; every mutation happens
    /// under the write lock
    assets: SharedAssets,

    events: EventBus,

    /// Global fade mode: play becomes a fade-in step, stop becomes a
    /// stop-side fade step
    fade_mode: AtomicBool,

    /// Exclusive audio focus requested; stored and reported only
    focus_audio: AtomicBool,

    /// Source of opaque system-sound identifiers
    next_sound_id: AtomicU32,

    base_dir: PathBuf,
    config: EngineConfig,
}

/// Handle to the asset registry
///
/// Cheap to clone; all clones share the same map and worker queues. Must be
/// created inside a tokio runtime, which the worker tasks are spawned onto.
#[derive(Clone)]
pub struct AssetRegistry {
    inner: Arc<RegistryInner>,
    loader_tx: mpsc::Sender<LoaderCommand>,
    transport_tx: mpsc::Sender<TransportJob>,
}

impl AssetRegistry {
    /// Create a registry and start its worker tasks
    pub fn new(config: EngineConfig) -> Self {
        let events = EventBus::new(config.event_capacity);
        let base_dir = config.resolve_base_dir();

        info!(base_dir = %base_dir.display(), "Creating asset registry");

        let inner = Arc::new(RegistryInner {
            assets: Arc::new(RwLock::new(HashMap::new())),
            events,
            fade_mode: AtomicBool::new(config.fade),
            focus_audio: AtomicBool::new(config.focus_audio),
            next_sound_id: AtomicU32::new(1),
            base_dir,
            config,
        });

        let (loader_tx, loader_rx) = mpsc::channel(inner.config.queue_depth);
        let (transport_tx, transport_rx) = mpsc::channel(inner.config.queue_depth);

        tokio::spawn(Self::loader_worker(Arc::clone(&inner), loader_rx));
        tokio::spawn(Self::transport_worker(Arc::clone(&inner), transport_rx));

        Self {
            inner,
            loader_tx,
            transport_tx,
        }
    }

    // ========================================
    // Configuration
    // ========================================

    /// Set global fade mode and audio-focus exclusivity
    ///
    /// Never fails. Fade mode changes the semantics of play and stop for all
    /// engines from this point on.
    pub fn configure(&self, fade: bool, focus: bool) {
        self.inner.fade_mode.store(fade, Ordering::Relaxed);
        self.inner.focus_audio.store(focus, Ordering::Relaxed);
        info!(fade, focus, "Registry configured");
    }

    /// Whether fade mode is currently enabled
    pub fn fade_mode(&self) -> bool {
        self.inner.fade_mode.load(Ordering::Relaxed)
    }

    /// Whether exclusive audio focus was requested
    pub fn focus_audio(&self) -> bool {
        self.inner.focus_audio.load(Ordering::Relaxed)
    }

    // ========================================
    // Loader-queue commands
    // ========================================

    /// Preload an asset under a unique identifier
    ///
    /// The whole operation (duplicate check, path resolution, decoding,
    /// insertion) runs as one loader-queue operation.
    pub async fn preload(&self, request: PreloadRequest) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.loader_tx
            .send(LoaderCommand::Preload { request, reply })
            .await
            .map_err(|_| Error::Internal("loader worker is gone".to_string()))?;
        rx.await
            .map_err(|_| Error::Internal("loader worker dropped the reply".to_string()))?
    }

    /// Release an asset's channels and remove its entry
    ///
    /// Succeeds as a no-op when the identifier is absent.
    pub async fn unload(&self, asset_id: &str) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.loader_tx
            .send(LoaderCommand::Unload {
                asset_id: asset_id.to_string(),
                reply,
            })
            .await
            .map_err(|_| Error::Internal("loader worker is gone".to_string()))?;
        rx.await
            .map_err(|_| Error::Internal("loader worker dropped the reply".to_string()))?
    }

    // ========================================
    // Transport-queue commands
    // ========================================

    /// Play an asset from `time` seconds
    ///
    /// Channel-pooled assets dispatch to the plain or fade-step start
    /// depending on fade mode; simple sounds fire directly.
    pub async fn play(&self, asset_id: &str, time: f64) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.transport_tx
            .send(TransportJob::Play {
                asset_id: asset_id.to_string(),
                time,
                reply,
            })
            .await
            .map_err(|_| Error::Internal("transport worker is gone".to_string()))?;
        rx.await
            .map_err(|_| Error::Internal("transport worker dropped the reply".to_string()))?
    }

    /// Stop an asset
    ///
    /// With fade mode on, stop is a stop-side fade step rather than an
    /// immediate silence.
    pub async fn stop(&self, asset_id: &str) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.transport_tx
            .send(TransportJob::Stop {
                asset_id: asset_id.to_string(),
                reply,
            })
            .await
            .map_err(|_| Error::Internal("transport worker is gone".to_string()))?;
        rx.await
            .map_err(|_| Error::Internal("transport worker dropped the reply".to_string()))?
    }

    // ========================================
    // Direct per-channel commands
    // ========================================

    /// Pause the asset's cursor channel
    pub async fn pause(&self, asset_id: &str) -> Result<()> {
        self.with_engine(asset_id, |engine| engine.pause()).await
    }

    /// Resume the asset's cursor channel
    pub async fn resume(&self, asset_id: &str) -> Result<()> {
        self.with_engine(asset_id, |engine| engine.resume()).await
    }

    /// Loop the asset's cursor channel indefinitely
    pub async fn do_loop(&self, asset_id: &str) -> Result<()> {
        self.with_engine(asset_id, |engine| engine.do_loop()).await
    }

    /// Move the asset's cursor channel position
    pub async fn seek(&self, asset_id: &str, time: f64) -> Result<()> {
        self.with_engine(asset_id, |engine| engine.seek(time)).await
    }

    /// Set volume uniformly across the asset's channels
    pub async fn set_volume(&self, asset_id: &str, volume: f32) -> Result<()> {
        self.with_engine(asset_id, |engine| engine.set_volume(volume))
            .await
    }

    // ========================================
    // Read-only queries
    // ========================================

    /// Current position in seconds (single-channel assets only; zero
    /// otherwise)
    pub async fn current_time(&self, asset_id: &str) -> Result<f64> {
        self.query_engine(asset_id, |engine| engine.current_time())
            .await
    }

    /// Duration in seconds (single-channel assets only; zero otherwise)
    pub async fn duration(&self, asset_id: &str) -> Result<f64> {
        self.query_engine(asset_id, |engine| engine.duration()).await
    }

    /// Whether the asset is playing (single-channel assets only; false
    /// otherwise)
    pub async fn is_playing(&self, asset_id: &str) -> Result<bool> {
        self.query_engine(asset_id, |engine| engine.is_playing())
            .await
    }

    /// Identifier of an arbitrary registered channel-pooled asset
    ///
    /// Iteration order decides which; there is no notion of a "now playing"
    /// asset. The remote-control bridge is the consumer of this.
    pub async fn first_engine_id(&self) -> Option<String> {
        let guard = self.inner.assets.read().await;
        guard
            .values()
            .find_map(|entry| match entry {
                AssetEntry::MultiChannel(engine) => Some(engine.asset_id().to_string()),
                AssetEntry::SimpleSound(_) => None,
            })
    }

    /// Number of registered assets
    pub async fn len(&self) -> usize {
        self.inner.assets.read().await.len()
    }

    /// Whether the registry holds no assets
    pub async fn is_empty(&self) -> bool {
        self.inner.assets.read().await.is_empty()
    }

    /// Whether an identifier is registered
    pub async fn contains(&self, asset_id: &str) -> bool {
        self.inner.assets.read().await.contains_key(asset_id)
    }

    // ========================================
    // Events
    // ========================================

    /// The registry's event bus
    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }

    /// Subscribe to all playback events
    pub fn subscribe(&self) -> broadcast::Receiver<AudioEvent> {
        self.inner.events.subscribe()
    }

    // ========================================
    // Shutdown
    // ========================================

    /// Stop every engine and clear the registry
    ///
    /// The only bulk clear; per-asset lifetime otherwise ends with `unload`.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.assets.write().await;
        for entry in guard.values_mut() {
            if let AssetEntry::MultiChannel(engine) = entry {
                engine.unload();
            }
        }
        guard.clear();
        info!("Registry shut down");
    }

    // ========================================
    // Internals
    // ========================================

    async fn with_engine<T>(
        &self,
        asset_id: &str,
        f: impl FnOnce(&mut AudioAssetEngine) -> T,
    ) -> Result<T> {
        if asset_id.is_empty() {
            return Err(Error::InvalidAssetId);
        }

        let mut guard = self.inner.assets.write().await;
        match guard.get_mut(asset_id) {
            Some(AssetEntry::MultiChannel(engine)) => Ok(f(engine)),
            // Simple sounds have no channels to command; they resolve like a
            // missing entry, as the original surface did
            _ => Err(Error::AssetNotFound(asset_id.to_string())),
        }
    }

    async fn query_engine<T>(
        &self,
        asset_id: &str,
        f: impl FnOnce(&AudioAssetEngine) -> T,
    ) -> Result<T> {
        if asset_id.is_empty() {
            return Err(Error::InvalidAssetId);
        }

        let guard = self.inner.assets.read().await;
        match guard.get(asset_id) {
            Some(AssetEntry::MultiChannel(engine)) => Ok(f(engine)),
            _ => Err(Error::AssetNotFound(asset_id.to_string())),
        }
    }

    async fn loader_worker(inner: Arc<RegistryInner>, mut rx: mpsc::Receiver<LoaderCommand>) {
        debug!("Loader worker started");
        while let Some(command) = rx.recv().await {
            match command {
                LoaderCommand::Preload { request, reply } => {
                    let result = Self::preload_op(&inner, request).await;
                    let _ = reply.send(result);
                }
                LoaderCommand::Unload { asset_id, reply } => {
                    let result = Self::unload_op(&inner, asset_id).await;
                    let _ = reply.send(result);
                }
            }
        }
        debug!("Loader worker stopped");
    }

    async fn transport_worker(inner: Arc<RegistryInner>, mut rx: mpsc::Receiver<TransportJob>) {
        debug!("Transport worker started");
        while let Some(job) = rx.recv().await {
            match job {
                TransportJob::Play {
                    asset_id,
                    time,
                    reply,
                } => {
                    let result = Self::play_op(&inner, asset_id, time).await;
                    let _ = reply.send(result);
                }
                TransportJob::Stop { asset_id, reply } => {
                    let result = Self::stop_op(&inner, asset_id).await;
                    let _ = reply.send(result);
                }
            }
        }
        debug!("Transport worker stopped");
    }

    async fn preload_op(inner: &Arc<RegistryInner>, request: PreloadRequest) -> Result<()> {
        if request.asset_id.is_empty() {
            return Err(Error::InvalidAssetId);
        }

        // Fast duplicate check before the expensive decode. The loader queue
        // is the only inserter, so the check cannot race another preload;
        // the insert below still re-checks occupancy.
        if inner.assets.read().await.contains_key(&request.asset_id) {
            return Err(Error::AssetAlreadyExists(request.asset_id));
        }

        let path =
            paths::resolve_asset_path(&inner.base_dir, &request.asset_path, request.is_url)?;

        let entry = if request.as_simple_sound {
            let audio = {
                let path = path.clone();
                tokio::task::spawn_blocking(move || decode::decode_file(&path))
                    .await
                    .map_err(|e| Error::Internal(format!("decode task failed: {}", e)))?
            }
            .map_err(|e| {
                warn!(asset_id = %request.asset_id, "System sound unreadable: {}", e);
                Error::AssetPathInvalid(request.asset_path.clone())
            })?;

            let sound_id = inner.next_sound_id.fetch_add(1, Ordering::Relaxed);
            AssetEntry::SimpleSound(SystemSoundHandle::new(
                request.asset_id.clone(),
                sound_id,
                Arc::new(audio),
            ))
        } else {
            let engine = {
                let asset_id = request.asset_id.clone();
                let events = inner.events.clone();
                let path = path.clone();
                let channels = request.channels;
                let volume = request.volume;
                let fade_delay = Duration::from_secs_f64(
                    request
                        .fade_delay_secs
                        .unwrap_or(inner.config.fade_delay_secs)
                        .max(0.0),
                );
                let fade_step = inner.config.fade_step;
                let resume_offset = inner.config.resume_offset();

                tokio::task::spawn_blocking(move || {
                    AudioAssetEngine::new(
                        asset_id,
                        &path,
                        channels,
                        volume,
                        fade_delay,
                        fade_step,
                        resume_offset,
                        events,
                    )
                })
                .await
                .map_err(|e| Error::Internal(format!("decode task failed: {}", e)))?
            };

            AssetEntry::MultiChannel(engine)
        };

        let mut guard = inner.assets.write().await;
        match guard.entry(request.asset_id.clone()) {
            Entry::Occupied(_) => Err(Error::AssetAlreadyExists(request.asset_id)),
            Entry::Vacant(slot) => {
                if let AssetEntry::MultiChannel(engine) = &entry {
                    if let Some(watcher) = CompletionWatcher::try_new(
                        engine,
                        &inner.assets,
                        inner.events.clone(),
                        inner.config.completion_poll(),
                    ) {
                        watcher.spawn();
                    }

                    info!(
                        asset_id = %request.asset_id,
                        channels = engine.channel_count(),
                        "Preloaded asset"
                    );
                } else {
                    info!(asset_id = %request.asset_id, "Preloaded system sound");
                }

                slot.insert(entry);
                Ok(())
            }
        }
    }

    async fn unload_op(inner: &Arc<RegistryInner>, asset_id: String) -> Result<()> {
        let mut guard = inner.assets.write().await;
        match guard.remove(&asset_id) {
            Some(AssetEntry::MultiChannel(mut engine)) => {
                engine.unload();
                info!(asset_id = %asset_id, "Unloaded asset");
            }
            Some(AssetEntry::SimpleSound(_)) => {
                info!(asset_id = %asset_id, "Unloaded system sound");
            }
            None => {
                debug!(asset_id = %asset_id, "Unload of unknown asset ignored");
            }
        }
        Ok(())
    }

    async fn play_op(inner: &Arc<RegistryInner>, asset_id: String, time: f64) -> Result<()> {
        let fade = inner.fade_mode.load(Ordering::Relaxed);

        let mut guard = inner.assets.write().await;
        match guard.get_mut(&asset_id) {
            Some(AssetEntry::MultiChannel(engine)) => {
                if fade {
                    engine.play_with_fade(time);
                } else {
                    engine.play(time);
                }
                Ok(())
            }
            Some(AssetEntry::SimpleSound(sound)) => {
                sound.play();
                Ok(())
            }
            None => Err(Error::AssetNotFound(asset_id)),
        }
    }

    async fn stop_op(inner: &Arc<RegistryInner>, asset_id: String) -> Result<()> {
        let fade = inner.fade_mode.load(Ordering::Relaxed);

        let mut guard = inner.assets.write().await;
        match guard.get_mut(&asset_id) {
            Some(AssetEntry::MultiChannel(engine)) => {
                if fade {
                    engine.stop_with_fade();
                } else {
                    engine.stop();
                }
                Ok(())
            }
            // Fire-and-forget sounds have nothing to stop
            Some(AssetEntry::SimpleSound(_)) => Ok(()),
            None => Err(Error::AssetNotFound(asset_id)),
        }
    }
}
