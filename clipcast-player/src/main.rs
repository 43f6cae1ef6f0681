//! clipcast - Main entry point
//!
//! Wires the playback core to an in-process voice transport and a
//! line-oriented event source on stdin. Each line is
//! `<origin_id> <channel_id> <message text>`; transmitted frames are paced at
//! the Opus frame rate and can be recorded to a container file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use clipcast_common::events::PlaybackEvent;
use clipcast_player::audio::write_frame;
use clipcast_player::config::{Config, ConfigOverrides};
use clipcast_player::dispatch::{InboundMessage, TriggerDispatcher};
use clipcast_player::playback::{FrameStore, PlaybackCoordinator, PlaybackEngine, PlaybackOutcome};
use clipcast_player::state::SharedState;
use clipcast_player::transport::{ChannelGateway, TransmittedFrame};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Opus frames carry 20ms of audio
const FRAME_DURATION: Duration = Duration::from_millis(20);

/// Command-line arguments for clipcast
#[derive(Parser, Debug)]
#[command(name = "clipcast")]
#[command(about = "Plays sound clips into a voice channel when chat messages trigger them")]
#[command(version)]
struct Args {
    /// TOML configuration file
    #[arg(short, long, env = "CLIPCAST_CONFIG")]
    config: Option<PathBuf>,

    /// Folder containing clip container files
    #[arg(short, long, env = "CLIPCAST_DATA_FOLDER")]
    data_folder: Option<PathBuf>,

    /// Frames a clip plays before a newer trigger may cut it off
    #[arg(short, long, env = "CLIPCAST_GRACE_PLAY_PERIOD")]
    grace_play_period: Option<usize>,

    /// Our own user id; its messages never trigger clips
    #[arg(long, env = "CLIPCAST_SELF_ID")]
    self_id: Option<String>,

    /// Append every transmitted frame to this container file
    #[arg(long)]
    record: Option<PathBuf>,

    /// Frames buffered between playback and the output
    #[arg(long, default_value = "64")]
    output_buffer: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(
        "clipcast",
        ConfigOverrides {
            config_path: args.config.clone(),
            data_folder: args.data_folder.clone(),
            grace_play_period: args.grace_play_period,
            self_id: args.self_id.clone(),
        },
    )
    .context("Failed to load configuration")?;

    // RUST_LOG wins over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!(
                    "clipcast={0},clipcast_player={0},clipcast_common={0}",
                    config.log_level
                )
                .into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting clipcast {} ({}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!(
        "Clips from {} (*.{}), grace period {} frames, destination {}",
        config.data_folder.display(),
        config.clip_extension,
        config.grace_play_period,
        config.dispatch.destination
    );
    if config.dispatch.allowed_channels.is_empty() {
        warn!("allowed_channels is empty: no message will trigger a clip");
    }
    if config.mapping.is_empty() {
        warn!("sound_map is empty: no trigger token is mapped");
    }

    let state = Arc::new(SharedState::new());
    let frame_store = Arc::new(FrameStore::new(
        config.data_folder.clone(),
        config.clip_extension.clone(),
    ));

    if config.preload {
        let clip_ids = config.mapping.clip_ids();
        let loaded = frame_store.preload(clip_ids.iter()).await;
        info!("Preloaded {}/{} clips", loaded, clip_ids.len());
    }

    let (gateway, frames_rx) = ChannelGateway::new(args.output_buffer.max(1));
    let engine = Arc::new(PlaybackEngine::new(
        Arc::new(gateway),
        frame_store,
        Arc::new(PlaybackCoordinator::new()),
        Arc::clone(&state),
        config.grace_play_period,
    ));
    let dispatcher = TriggerDispatcher::new(engine, config.mapping.clone(), config.dispatch.clone());

    let output = tokio::spawn(drain_frames(frames_rx, args.record.clone()));
    let monitor = tokio::spawn(log_events(state.subscribe_events()));

    info!("clipcast is now running. Press CTRL-C to exit.");

    let event_source = tokio::select! {
        result = run_event_source(&dispatcher) => Some(result),
        received = shutdown_signal() => {
            info!("Received {}, stopping playback", received);
            None
        }
    };

    match event_source {
        Some(result) => {
            result?;
            // Dropping the dispatcher closes the transport so the output drains
            drop(dispatcher);
            match output.await {
                Ok(result) => result?,
                Err(e) => warn!("Frame output task failed: {}", e),
            }
        }
        None => output.abort(),
    }

    monitor.abort();

    let stats = state.stats();
    info!(
        "Shutdown complete: {} started, {} completed, {} preempted, {} failed",
        stats.started, stats.completed, stats.preempted, stats.failed
    );
    Ok(())
}

/// Feed stdin lines to the dispatcher until EOF, then wait for in-flight clips
async fn run_event_source(dispatcher: &TriggerDispatcher) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut attempts: Vec<JoinHandle<clipcast_player::Result<PlaybackOutcome>>> = Vec::new();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match InboundMessage::parse_line(&line) {
            Some(message) => {
                attempts.retain(|attempt| !attempt.is_finished());
                attempts.extend(dispatcher.on_event(&message));
            }
            None if line.trim().is_empty() => {}
            None => warn!("Ignoring malformed event line: {:?}", line),
        }
    }

    info!("Event source closed, waiting for {} playback attempts", attempts.len());
    for attempt in attempts {
        if let Err(e) = attempt.await {
            warn!("Playback task failed: {}", e);
        }
    }
    Ok(())
}

/// Consume transmitted frames at the Opus frame rate, optionally recording them
async fn drain_frames(
    mut frames: mpsc::Receiver<TransmittedFrame>,
    record: Option<PathBuf>,
) -> Result<()> {
    let mut recorder = match record {
        Some(path) => {
            let file = File::create(&path)
                .await
                .with_context(|| format!("Failed to create recording {}", path.display()))?;
            info!("Recording transmitted frames to {}", path.display());
            Some(BufWriter::new(file))
        }
        None => None,
    };

    let mut ticker = tokio::time::interval(FRAME_DURATION);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut delivered: u64 = 0;
    let mut encoded = Vec::new();

    while let Some(TransmittedFrame { destination, frame }) = frames.recv().await {
        ticker.tick().await;

        if let Some(writer) = recorder.as_mut() {
            encoded.clear();
            write_frame(&mut encoded, &frame).context("Failed to encode frame")?;
            writer
                .write_all(&encoded)
                .await
                .context("Failed to record frame")?;
        }

        delivered += 1;
        if delivered % 250 == 0 {
            debug!("{} frames delivered to {}", delivered, destination);
        }
    }

    if let Some(mut writer) = recorder {
        writer.flush().await.context("Failed to flush recording")?;
    }
    info!("Frame output closed after {} frames", delivered);
    Ok(())
}

/// Log every playback event as JSON
async fn log_events(mut events: broadcast::Receiver<PlaybackEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(json) => match event.attempt_id() {
                    Some(attempt_id) => debug!("Attempt {} event: {}", attempt_id, json),
                    None => debug!("Event: {}", json),
                },
                Err(e) => warn!("Could not serialize {} event: {}", event.event_type(), e),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Event log lagged, {} events skipped", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Wait for Ctrl+C or SIGTERM and return which one arrived
async fn shutdown_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal as unix_signal, SignalKind};

        let mut terminate =
            unix_signal(SignalKind::terminate()).expect("Failed to install SIGTERM handler");
        tokio::select! {
            result = signal::ctrl_c() => {
                result.expect("Failed to listen for Ctrl+C");
                "Ctrl+C"
            }
            _ = terminate.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
        "Ctrl+C"
    }
}
