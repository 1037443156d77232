//! Speech CLI (voicepack-speak) - main entry point
//!
//! Synthesizes one sentence in the requested mode and plays it on the
//! default output device.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voicepack_common::config::{resolve_root_folder, TomlConfig, CONFIG_FILE_NAME};
use voicepack_common::db::init_database_pool;
use voicepack_common::{EventBus, Mode, VoicePackEvent};
use voicepack_speak::audio::AudioOutput;
use voicepack_speak::clock::{PlaybackClock, TransportState};
use voicepack_speak::synthesis::{
    AudioBufferCache, InMemoryOffsetIndex, LocalInference, RemoteSynthesizer, Sentence, SpliceSynthesizer,
    SynthesisMode, SynthesisRequest, SynthesisRouter, UnavailableEngine,
};
use voicepack_sync::layout::PackageLayout;
use voicepack_sync::store::SqliteComponentStore;
use voicepack_sync::sync::{PackageSync, SyncSettings};

/// Command-line arguments for voicepack-speak
#[derive(Parser, Debug)]
#[command(name = "voicepack-speak")]
#[command(about = "Synthesize and play a sentence")]
#[command(version)]
struct Args {
    /// Synthesis mode: online, offline or lightweight
    #[arg(short, long, default_value = "online")]
    mode: Mode,

    /// Language code
    #[arg(short, long, required_unless_present = "list_devices")]
    language: Option<String>,

    /// Voice name
    #[arg(short, long, required_unless_present = "list_devices")]
    voice: Option<String>,

    /// Speaking rate
    #[arg(short, long, default_value_t = 1.0)]
    speed: f32,

    /// Offset index JSON for lightweight mode
    #[arg(long)]
    offsets: Option<PathBuf>,

    /// Download missing package components before synthesizing
    #[arg(long)]
    download: bool,

    /// Output device name (default device when omitted)
    #[arg(long)]
    device: Option<String>,

    /// Print the available output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Root folder holding the database and configuration
    #[arg(short, long, env = "VOICEPACK_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// Configuration file (defaults to <root>/voicepack.toml)
    #[arg(short, long, env = "VOICEPACK_CONFIG")]
    config: Option<PathBuf>,

    /// Sentence to speak; whitespace separates fragments
    #[arg(required_unless_present = "list_devices")]
    text: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let bootstrap_root = resolve_root_folder(args.root_folder.as_deref(), None);
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| bootstrap_root.join(CONFIG_FILE_NAME));
    let config = TomlConfig::load(&config_path).context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "voicepack_speak={},voicepack_sync={},voicepack_common={}",
                    config.logging.level, config.logging.level, config.logging.level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if !config_path.exists() {
        warn!("Config file {} not found, using built-in defaults", config_path.display());
    }

    if args.list_devices {
        for name in AudioOutput::list_devices().context("Failed to list output devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let (Some(language), Some(voice), Some(text)) = (&args.language, &args.voice, &args.text) else {
        bail!("--language, --voice and TEXT are required");
    };

    let sentence = Sentence::from_text(text);
    if sentence.is_empty() {
        bail!("Nothing to say");
    }

    let root_folder = resolve_root_folder(args.root_folder.as_deref(), config.root_folder.as_deref());
    let db_path = config.database_path(&root_folder);
    let pool = init_database_pool(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let event_bus = EventBus::default();
    let store = Arc::new(SqliteComponentStore::new(pool));
    let timeout = Duration::from_millis(config.request_timeout_ms);
    let sync = PackageSync::new(
        Arc::clone(&store),
        PackageLayout::builtin().with_overrides(&config.components),
        SyncSettings {
            target_version: config.target_version.clone(),
            package_url_prefix: config.package_url_prefix.clone(),
            request_timeout: timeout,
        },
        event_bus.clone(),
    )
    .context("Failed to initialize package sync")?;

    if args.download && args.mode != Mode::Remote {
        let progress = tokio::spawn(log_progress(event_bus.clone()));
        let outcome = sync
            .download(language, voice, args.mode)
            .await
            .context("Download failed to start")?;
        progress.abort();

        info!("Download finished: {}", outcome.report.status);
        for failure in &outcome.report.failed {
            warn!("  {}: {}", failure.component, failure.error);
        }
    }

    let reconciliation = sync
        .inspect(language, voice, args.mode)
        .await
        .context("Failed to inspect installed package")?;
    info!(
        "Package {}/{} ({}): {}",
        language, voice, args.mode, reconciliation.status
    );

    let mode = SynthesisMode::resolve(
        args.mode,
        reconciliation.installed_version.clone(),
        language,
        voice,
    )
    .context("Run again with --download to install the package")?;

    let mut offsets = InMemoryOffsetIndex::new();
    if let (Some(path), Some(version)) = (&args.offsets, mode.installed_version()) {
        offsets
            .load_package_file(path, version, language, voice)
            .context("Failed to load offset index")?;
    } else if mode.mode() == Mode::LocalSplice {
        warn!("No offset index given; every fragment will be silent");
    }

    let remote = match RemoteSynthesizer::new(&config.remote_api_url, timeout) {
        Ok(remote) => Some(remote),
        Err(e) => {
            warn!("Remote synthesis unavailable: {}", e);
            None
        }
    };

    let router = SynthesisRouter::new(
        remote,
        LocalInference::new(UnavailableEngine),
        SpliceSynthesizer::new(store, Arc::new(offsets)),
        Arc::new(AudioBufferCache::with_capacity(config.cache_capacity)),
    )
    .with_event_bus(event_bus.clone());

    let request = SynthesisRequest::new(language, voice, mode, args.speed, sentence);
    let buffer = router.synthesize(&request).await.context("Synthesis failed")?;
    info!(
        "Playing {:.2}s of audio for '{}'",
        buffer.duration_secs(),
        request.sentence.text()
    );

    let output = AudioOutput::open(args.device.as_deref()).context("Failed to open audio output")?;
    let mut clock = PlaybackClock::new(output).with_event_bus(event_bus);
    clock.load(buffer);
    clock.play().context("Failed to start playback")?;

    let mut frame = tokio::time::interval(Duration::from_millis(1000 / 60));
    let ctrl_c = signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = frame.tick() => {
                clock.tick();
                if matches!(clock.state(), TransportState::Stopped { .. }) {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C, stopping playback");
                clock.stop();
                break;
            }
        }
    }

    Ok(())
}

/// Log download progress until aborted
async fn log_progress(event_bus: EventBus) {
    let mut rx = event_bus.subscribe();
    while let Ok(event) = rx.recv().await {
        match event {
            VoicePackEvent::DownloadProgress { ratio, .. } => {
                info!("Downloading: {:.0}%", ratio * 100.0);
            }
            VoicePackEvent::ComponentSaved { component, version, .. } => {
                info!("Saved {} ({})", component, version);
            }
            _ => {}
        }
    }
}
