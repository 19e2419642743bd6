//! TwinGuard Simulation Daemon
//!
//! Runs the evil-twin simulation and speaks newline-delimited JSON over
//! stdio: one command per line on stdin, one response or event per line on
//! stdout. Logs go to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn, Level};
use tracing_subscriber::{fmt, EnvFilter};

use twinguard_core::{Command, ProcessConfig, Response, SimConfig, SimConfigBuilder, Simulation};
use twinguard_game::Sensitivity;

/// TwinGuard simulation node
///
/// Simulates devices, access points and evil-twin impersonators.
#[derive(Parser, Debug)]
#[command(name = "twinguard-node")]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON config file (port, timestampToleranceSecs, serverClockSkewSecs,
    /// packetBurstRatePerDevice, simulation)
    #[arg(short, long, env = "TWINGUARD_CONFIG")]
    config: Option<PathBuf>,

    /// Initial timestamp tolerance in seconds (5-300)
    #[arg(long, env = "TWINGUARD_TOLERANCE_SECS")]
    tolerance_secs: Option<u64>,

    /// Clock skew applied to issued timestamps, in seconds
    #[arg(long, env = "TWINGUARD_CLOCK_SKEW_SECS", allow_hyphen_values = true)]
    clock_skew_secs: Option<i64>,

    /// Packets per second per device
    #[arg(long, env = "TWINGUARD_PACKET_RATE")]
    packets_per_sec: Option<u32>,

    /// Initial data sensitivity (non, sensitive)
    #[arg(long, env = "TWINGUARD_SENSITIVITY")]
    sensitivity: Option<Sensitivity>,

    /// Seed the simulation RNG for reproducible runs
    #[arg(long, env = "TWINGUARD_SEED")]
    seed: Option<u64>,

    /// Disable periodic guest AP spawning
    #[arg(long, env = "TWINGUARD_NO_ADVERSARY", default_value = "false")]
    no_adversary: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TWINGUARD_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Log format (plain, json)
    #[arg(long, env = "TWINGUARD_LOG_FORMAT", default_value = "plain")]
    log_format: String,
}

fn setup_logging(log_level: &str, log_format: &str) -> Result<()> {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // stdout carries the protocol
    match log_format.to_lowercase().as_str() {
        "json" => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
        _ => {
            let subscriber = fmt::Subscriber::builder()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)
                .context("Failed to set subscriber")?;
        }
    }

    Ok(())
}

/// Build the simulation config: file first, then CLI/env overrides.
fn build_config(args: &Args) -> Result<SimConfig> {
    let base = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            let process = ProcessConfig::from_json(&text)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?;
            if let Some(port) = process.port {
                debug!(port, "port setting ignored by stdio transport");
            }
            process.into_sim_config()
        }
        None => SimConfig::default(),
    };

    let mut builder = SimConfigBuilder::from_config(base);
    if let Some(secs) = args.tolerance_secs {
        builder = builder.with_timestamp_tolerance_secs(secs);
    }
    if let Some(skew) = args.clock_skew_secs {
        builder = builder.with_clock_skew_secs(skew);
    }
    if let Some(rate) = args.packets_per_sec {
        builder = builder.with_packets_per_sec(rate);
    }
    if let Some(mode) = args.sensitivity {
        builder = builder.with_sensitivity(mode);
    }
    if let Some(seed) = args.seed {
        builder = builder.with_rng_seed(seed);
    }
    if args.no_adversary {
        builder = builder.disable_adversary();
    }

    builder.build_validated().context("Invalid configuration")
}

/// Single writer so lines from events and responses never interleave.
async fn run_writer(mut lines: mpsc::Receiver<String>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(line) = lines.recv().await {
        stdout.write_all(line.as_bytes()).await?;
        stdout.write_all(b"\n").await?;
        stdout.flush().await?;
    }
    Ok(())
}

/// Forward every simulation event to the writer.
async fn forward_events(mut events: broadcast::Receiver<twinguard_core::Event>, out: mpsc::Sender<String>) {
    loop {
        match events.recv().await {
            Ok(event) => match serde_json::to_string(&event) {
                Ok(line) => {
                    if out.send(line).await.is_err() {
                        break;
                    }
                }
                Err(e) => warn!(event = event.name(), error = %e, "failed to encode event"),
            },
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "event stream lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Read commands from stdin until EOF.
async fn read_commands(sim: Simulation, out: mpsc::Sender<String>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let response = match Command::parse(line) {
            Ok(command) => {
                debug!(command = command.name(), "command received");
                sim.execute(command).await
            }
            Err(e) => {
                warn!(error = %e, "unreadable command");
                Response::Ignored {
                    reason: e.to_string(),
                }
            }
        };

        let encoded = serde_json::to_string(&response).context("Failed to encode response")?;
        if out.send(encoded).await.is_err() {
            break;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logging
    setup_logging(&args.log_level, &args.log_format)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "Starting TwinGuard node"
    );

    let config = build_config(&args)?;
    info!(
        tolerance_secs = config.protocol.timestamp_tolerance_secs,
        packets_per_sec = config.traffic.packets_per_sec,
        sensitivity = %config.initial_sensitivity,
        adversary = config.adversary.enabled,
        "Configuration loaded"
    );

    let sim = Simulation::new(config).context("Failed to initialize simulation")?;

    let (out_tx, out_rx) = mpsc::channel::<String>(1024);
    let writer = tokio::spawn(run_writer(out_rx));
    let forwarder = tokio::spawn(forward_events(sim.subscribe(), out_tx.clone()));

    sim.start().await;
    info!("Simulation running; reading commands from stdin");

    tokio::select! {
        result = read_commands(sim.clone(), out_tx) => {
            match result {
                Ok(()) => info!("stdin closed"),
                Err(e) => warn!(error = %e, "command reader stopped"),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("Shutting down TwinGuard node...");
    sim.shutdown().await;

    // Dropping the simulation closes the event stream, which ends the
    // forwarder and then the writer.
    drop(sim);
    if let Err(e) = forwarder.await {
        warn!(error = %e, "event forwarder ended abnormally");
    }
    match writer.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "stdout writer failed"),
        Err(e) => warn!(error = %e, "stdout writer ended abnormally"),
    }

    info!("TwinGuard node stopped");
    Ok(())
}
