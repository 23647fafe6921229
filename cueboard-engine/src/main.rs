//! Cueboard - command line driver
//!
//! Preloads the given audio files into the registry and plays them,
//! printing every playback event as it fires. Exists to exercise the engine
//! end to end; embedded hosts use the library surface directly.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cueboard_common::events::AudioEvent;
use cueboard_engine::audio::{OutputStage, SilenceSource};
use cueboard_engine::tap::BufferTapSink;
use cueboard_engine::{AssetRegistry, EngineConfig, PreloadRequest};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pacing between fade steps when driving a ramp from the CLI
const FADE_PACE: Duration = Duration::from_millis(80);

/// Command-line arguments for cueboard
#[derive(Parser, Debug)]
#[command(name = "cueboard")]
#[command(about = "Channel-pooled audio asset playback")]
#[command(version)]
struct Args {
    /// Audio files to preload and play
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Channels per asset (overlapping plays of the same asset)
    #[arg(short, long, default_value_t = 1)]
    channels: usize,

    /// Initial volume (0.0 to 1.0)
    #[arg(short, long, default_value_t = 1.0)]
    volume: f32,

    /// Enable fade mode and drive the fade-in ramp
    #[arg(long)]
    fade: bool,

    /// Loop playback indefinitely instead of playing once
    #[arg(long = "loop")]
    loop_playback: bool,

    /// Path to a TOML configuration file
    #[arg(long, env = "CUEBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Open the output device and forward visualization frames
    #[arg(long)]
    tap: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cueboard_engine=info,cueboard=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => EngineConfig::load(path).context("Failed to load configuration")?,
        None => EngineConfig::default(),
    };
    if args.fade {
        config.fade = true;
    }
    let fade_step = config.fade_step;

    let registry = AssetRegistry::new(config);

    // Print every playback event as JSON
    let mut events = registry.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            if matches!(event, AudioEvent::AudioVisualizationData { .. }) {
                continue; // far too chatty for stdout
            }
            match serde_json::to_string(&event) {
                Ok(json) => println!("{}", json),
                Err(e) => warn!("Failed to serialize event: {}", e),
            }
        }
    });

    // Optional output stage with the buffer tap attached
    let mut _output = None;
    let mut tap_task = None;
    if args.tap {
        let (producer, sink) = BufferTapSink::new(
            registry.events().clone(),
            1024,
            8,
            Duration::from_millis(50),
        );
        tap_task = Some(sink.spawn());

        match OutputStage::new() {
            Ok(mut stage) => {
                stage
                    .start(Box::new(SilenceSource), Some(producer))
                    .context("Failed to start output stream")?;
                _output = Some(stage);
            }
            Err(e) => warn!("Output stage unavailable, tap disabled: {}", e),
        }
    }

    // Preload every file under its stem name
    let mut asset_ids = Vec::new();
    for file in &args.files {
        let path = file
            .canonicalize()
            .with_context(|| format!("Cannot resolve {}", file.display()))?;
        let asset_id = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "asset".to_string());

        registry
            .preload(
                PreloadRequest::new(&asset_id, path.to_string_lossy())
                    .with_channels(args.channels)
                    .with_volume(args.volume),
            )
            .await
            .with_context(|| format!("Failed to preload {}", file.display()))?;

        asset_ids.push(asset_id);
    }

    // Subscribe before playback starts so no completion can slip past
    let exit_events = registry.subscribe();

    // Start playback
    let mut completions_expected = 0;
    for asset_id in &asset_ids {
        if args.loop_playback {
            registry.do_loop(asset_id).await?;
            continue;
        }

        if registry.fade_mode() {
            // Step fades are call-driven; ramp up to the initial volume
            let steps = (args.volume / fade_step).ceil().max(1.0) as usize;
            for _ in 0..=steps {
                registry.play(asset_id, 0.0).await?;
                tokio::time::sleep(FADE_PACE).await;
            }
        } else {
            registry.play(asset_id, 0.0).await?;
        }

        if args.channels == 1 {
            completions_expected += 1;
        }
    }

    wait_for_exit(exit_events, completions_expected).await;

    registry.shutdown().await;
    if let Some(task) = tap_task {
        task.abort();
    }

    info!("Done");
    Ok(())
}

/// Wait until every single-channel asset completes, or Ctrl+C
async fn wait_for_exit(
    mut events: tokio::sync::broadcast::Receiver<AudioEvent>,
    mut completions_expected: usize,
) {
    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
            event = events.recv() => {
                if let Ok(AudioEvent::Complete { asset_id, .. }) = event {
                    info!(asset_id = %asset_id, "Playback complete");
                    if completions_expected > 0 {
                        completions_expected -= 1;
                        if completions_expected == 0 {
                            break;
                        }
                    }
                }
            }
        }
    }
}
