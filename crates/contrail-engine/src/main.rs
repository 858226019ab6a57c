//! Contrail engine binary.
//!
//! Wires the trail subsystem to a console-driven stand-in for a game
//! server: each stdin line is a player event or an operator query (see
//! [`console`]). Particles go to a sink that logs them at `debug`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `contrail-config.yaml` (or `CONTRAIL_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Load player preferences from `players.yml`
//! 4. Build the host, sink, color cycle, and emitter registry
//! 5. Read console lines until `stop`, end of input, or Ctrl-C
//! 6. Cancel every emitter and flush preferences

mod console;
mod error;
mod sink;

use std::path::PathBuf;
use std::sync::Arc;

use contrail_core::color_cycle::ColorCycle;
use contrail_core::config::ContrailConfig;
use contrail_core::emitter::EmitterContext;
use contrail_core::host::{Host, MemoryHost, RenderSink};
use contrail_core::preferences::PreferenceStore;
use contrail_core::registry::EmitterRegistry;
use contrail_store::YamlPreferenceStore;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::console::{Console, ConsoleCommand, Flow};
use crate::error::EngineError;
use crate::sink::LoggingSink;

/// Default configuration file, relative to the working directory.
const CONFIG_FILE: &str = "contrail-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration or preferences cannot be loaded, or
/// if the console cannot be read.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("contrail-engine starting");
    match &config_path {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }
    info!(
        enabled = config.particles.enabled,
        effect = %config.particles.effect,
        amount = config.particles.amount,
        frequency = config.particles.frequency,
        period_ms = u64::try_from(config.firing_period().as_millis()).unwrap_or(u64::MAX),
        default_variant = %config.particles.default_variant,
        "Particle settings"
    );

    // 3. Load player preferences.
    let store = Arc::new(YamlPreferenceStore::load(&config.storage.players_file)?);

    // 4. Assemble the trail subsystem.
    let host = Arc::new(MemoryHost::new());
    let sink = Arc::new(LoggingSink::new());
    let context = Arc::new(EmitterContext::from_config(
        &config,
        Arc::clone(&host) as Arc<dyn Host>,
        Arc::clone(&sink) as Arc<dyn RenderSink>,
        Arc::new(ColorCycle::rainbow()),
    ));
    let registry = Arc::new(EmitterRegistry::new(
        context,
        Arc::clone(&store) as Arc<dyn PreferenceStore>,
    ));
    let console = Console::new(host, Arc::clone(&registry), config.messages.clone());
    info!("Trail subsystem ready, reading console");

    // 5. Run the console.
    let outcome = run_console(console).await;

    // 6. Shut down.
    let report = registry.shutdown().await;
    info!(
        cancelled = report.cancelled,
        flushed = report.flushed,
        particles = sink.emitted(),
        "contrail-engine shutdown complete"
    );

    outcome?;
    Ok(())
}

/// Load the configuration file named by `CONTRAIL_CONFIG`, or
/// `contrail-config.yaml` in the working directory.
///
/// Returns the path actually read, or `None` when the file is absent and
/// defaults were used.
fn load_config() -> Result<(ContrailConfig, Option<PathBuf>), EngineError> {
    let path = std::env::var_os("CONTRAIL_CONFIG")
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    if path.exists() {
        let config = ContrailConfig::from_file(&path)?;
        Ok((config, Some(path)))
    } else {
        let mut config = ContrailConfig::default();
        config.storage.apply_env_overrides();
        Ok((config, None))
    }
}

/// Read console lines until `stop`, end of input, or Ctrl-C.
async fn run_console(mut console: Console) -> Result<(), EngineError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            result = &mut interrupt => {
                result?;
                info!("Interrupt received");
                return Ok(());
            }
        };
        let Some(line) = line else {
            info!("Console input closed");
            return Ok(());
        };

        let reply = match ConsoleCommand::parse(&line) {
            Ok(None) => continue,
            Ok(Some(command)) => match console.execute(command).await {
                Ok((Flow::Stop, reply)) => {
                    write_line(&mut stdout, &reply).await?;
                    return Ok(());
                }
                Ok((Flow::Continue, reply)) => reply,
                Err(e) => format!("error: {e}"),
            },
            Err(e) => {
                warn!(line = %line, error = %e, "Rejected console line");
                format!("error: {e}")
            }
        };
        write_line(&mut stdout, &reply).await?;
    }
}

async fn write_line(stdout: &mut tokio::io::Stdout, text: &str) -> Result<(), EngineError> {
    stdout.write_all(text.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}
