//! vhidd: virtual HID daemon entry point.
//!
//! Loads the configuration, builds the three emulated devices, and feeds them
//! commands from stdin or a script until end of input or Ctrl-C.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()          -- TOML file, defaults when absent
//!  └─ DeviceSet::new()       -- keyboard, pointer, touch + event sinks
//!  └─ either
//!       ├─ replay             -- offline: Recording::replay with synchronous drains
//!       └─ run_commands
//!            ├─ DeviceRuntime  (one Tokio worker per device)
//!            └─ InjectUseCase  (one command per input line)
//!  └─ final report on stdout
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use vhid_core::{ConfigurationStore, Recording};
use vhid_daemon::application::inject::InjectUseCase;
use vhid_daemon::application::runtime::{DeviceRuntime, DeviceSet, DynSink};
use vhid_daemon::infrastructure::command_source::{CommandSource, LineCommandSource};
use vhid_daemon::infrastructure::event_log::{Fanout, JsonLinesSink, SharedWriter, TracingSink};
use vhid_daemon::infrastructure::report;
use vhid_daemon::infrastructure::storage::config::{config_file_path, load_config, save_config};

#[derive(Debug, Parser)]
#[command(name = "vhidd", version, about = "Virtual keyboard, pointer and touch surface daemon")]
struct Cli {
    /// Config file (default: $XDG_CONFIG_HOME/vhid/config.toml).
    #[arg(short, long, env = "VHID_CONFIG")]
    config: Option<PathBuf>,

    /// Read commands from this file instead of stdin.
    #[arg(short, long)]
    script: Option<PathBuf>,

    /// JSON-lines event log; overrides `daemon.event_log`.
    #[arg(long)]
    events_out: Option<PathBuf>,

    /// Save every injected stimulus to this file.
    #[arg(long, conflicts_with = "replay")]
    record: Option<PathBuf>,

    /// Replay a recorded stimulus file instead of reading commands.
    #[arg(long, conflicts_with = "script")]
    replay: Option<PathBuf>,

    /// Print the final statistics as JSON instead of text.
    #[arg(long)]
    json_stats: bool,

    /// Write the final device settings back to the config file.
    #[arg(long)]
    save_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => config_file_path()?,
    };
    let mut config = load_config(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;

    // Replies go to stdout, so logs go to stderr.  `RUST_LOG` wins over the file.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.daemon.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(config = %config_path.display(), "vhidd starting");

    let store = Arc::new(ConfigurationStore::from_settings(&config.device_settings())?);

    // ── Event sinks ───────────────────────────────────────────────────────────
    let event_log = cli.events_out.clone().or_else(|| config.daemon.event_log.clone());
    let writer = match &event_log {
        Some(path) => {
            let writer = SharedWriter::append(path)
                .with_context(|| format!("opening event log {}", path.display()))?;
            info!(path = %path.display(), "writing events");
            Some(writer)
        }
        None => None,
    };
    let devices = Arc::new(DeviceSet::new(store, config.touch_bounds(), |_| -> DynSink {
        let fanout = Fanout::new().with(TracingSink);
        match &writer {
            Some(writer) => Box::new(fanout.with(JsonLinesSink::new(writer.clone()))),
            None => Box::new(fanout),
        }
    }));

    // ── Run ───────────────────────────────────────────────────────────────────
    if let Some(path) = &cli.replay {
        let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
        let recording = Recording::read_from(BufReader::new(file))?;
        let summary = devices.replay(&recording);
        info!(
            stimuli = recording.len(),
            accepted = summary.accepted,
            dropped = summary.dropped,
            rejected = summary.rejected,
            "replay finished"
        );
    } else {
        run_commands(&cli, Arc::clone(&devices)).await?;
    }

    if let Some(writer) = &writer {
        writer.flush().context("flushing event log")?;
    }

    let snapshot = devices.statistics().snapshot();
    let settings = devices.config.snapshot();
    if cli.json_stats {
        println!("{}", report::render_json(&snapshot, &settings)?);
    } else {
        print!("{}", report::render_text(&snapshot, &settings));
    }

    if cli.save_config {
        config.apply_device_settings(&settings);
        save_config(&config_path, &config)?;
        info!(path = %config_path.display(), "settings saved");
    }

    info!("vhidd stopped");
    Ok(())
}

/// Reads commands until end of input or Ctrl-C, then drains and stops the workers.
async fn run_commands(cli: &Cli, devices: Arc<DeviceSet>) -> anyhow::Result<()> {
    let runtime = DeviceRuntime::start(Arc::clone(&devices));
    let mut use_case = InjectUseCase::new(Arc::clone(&devices), runtime.handle());
    if cli.record.is_some() {
        use_case = use_case.with_recording();
    }

    let mut source: Box<dyn CommandSource> = match &cli.script {
        Some(path) => Box::new(
            LineCommandSource::open(path)
                .await
                .with_context(|| format!("opening script {}", path.display()))?,
        ),
        None => Box::new(LineCommandSource::stdin()),
    };

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("vhidd ready.  Press Ctrl-C to exit.");
    loop {
        let next = tokio::select! {
            _ = &mut ctrl_c => {
                info!("shutdown signal received");
                break;
            }
            next = source.next_command() => next,
        };

        match next {
            Ok(Some(command)) => match use_case.execute(command) {
                Ok(reply) => println!("{}", report::render_reply(&reply, &devices.config.snapshot())),
                Err(e) => {
                    warn!(line = source.line_number(), "{e}");
                    println!("error: {e}");
                }
            },
            Ok(None) => break,
            Err(e) if e.is_fatal() => {
                error!("command input failed: {e}");
                break;
            }
            Err(e) => {
                warn!(line = source.line_number(), "{e}");
                println!("error: line {}: {e}", source.line_number());
            }
        }
    }

    let drained = runtime.shutdown().await;
    info!(drained, "final drain complete");

    if let (Some(path), Some(recording)) = (&cli.record, use_case.take_recording()) {
        let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
        let mut out = BufWriter::new(file);
        recording.write_to(&mut out)?;
        out.flush()?;
        info!(path = %path.display(), stimuli = recording.len(), "recording saved");
    }
    Ok(())
}
