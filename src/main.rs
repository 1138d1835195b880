//! SparshaIO - Pressure sensor streaming daemon
//!
//! ## Link
//!
//! - **Attached**: if the configured device path exists (e.g. `/dev/rfcomm0`),
//!   frames are written straight to it.
//! - **Accepted**: otherwise the first free TCP port in the configured range
//!   is bound and one peer is accepted.
//!
//! The peer sends `start` / `stop`; frames (`v1;v2;...;vN\n`) flow only while
//! started.

use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use sparsha_io::config::Config;
use sparsha_io::error::{Error, Result};
use sparsha_io::link;
use sparsha_io::sampler::Sampler;
use sparsha_io::sensors::create_channels;
use sparsha_io::streaming::Supervisor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

const DEFAULT_CONFIG_PATH: &str = "/etc/sparsha.toml";

#[derive(Parser, Debug)]
#[command(name = "sparsha-io", version, about = "Pressure sensor streaming daemon")]
struct Args {
    /// Config file (defaults to /etc/sparsha.toml)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Config file as a positional argument
    #[arg(value_name = "CONFIG", conflicts_with = "config")]
    config_positional: Option<PathBuf>,

    /// Override the pre-bound device path
    #[arg(long, value_name = "PATH")]
    device: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,
}

/// Where the running configuration came from
#[derive(Debug, PartialEq)]
enum ConfigOrigin {
    /// A file named on the command line
    Explicit(PathBuf),
    /// The default path, which existed
    DefaultFile(PathBuf),
    /// No file at the default path; built-in values
    BuiltIn(PathBuf),
}

impl ConfigOrigin {
    /// Running without a config file is worth a warning
    fn log(&self) {
        match self {
            ConfigOrigin::Explicit(path) | ConfigOrigin::DefaultFile(path) => {
                log::info!("Using config: {}", path.display())
            }
            ConfigOrigin::BuiltIn(path) => {
                log::warn!("{} not found, using built-in defaults", path.display())
            }
        }
    }
}

/// Read the explicit file, else `default_path` if present, else defaults
fn resolve_config(explicit: Option<&Path>, default_path: &Path) -> Result<(Config, ConfigOrigin)> {
    match explicit {
        Some(path) => Ok((Config::load(path)?, ConfigOrigin::Explicit(path.to_path_buf()))),
        None if default_path.exists() => Ok((
            Config::load(default_path)?,
            ConfigOrigin::DefaultFile(default_path.to_path_buf()),
        )),
        None => Ok((Config::default(), ConfigOrigin::BuiltIn(default_path.to_path_buf()))),
    }
}

/// Load the config and apply command-line overrides
fn load_config(args: &Args) -> Result<(Config, ConfigOrigin)> {
    let explicit = args.config.as_deref().or(args.config_positional.as_deref());
    let (mut config, origin) = resolve_config(explicit, Path::new(DEFAULT_CONFIG_PATH))?;

    if let Some(device) = &args.device {
        config.link.device_path = device.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    config.validate()?;

    Ok((config, origin))
}

/// Clear `running` on SIGINT/SIGTERM
fn setup_signal_handler(running: Arc<AtomicBool>) -> Result<()> {
    let mut signals = Signals::new([SIGINT, SIGTERM])?;

    thread::Builder::new()
        .name("signal-handler".to_string())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                log::info!("Received signal {}, initiating shutdown...", sig);
                running.store(false, Ordering::Relaxed);
            }
        })?;
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();
    let (config, origin) = load_config(&args)?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    )
    .init();

    log::info!("SparshaIO v{} starting...", env!("CARGO_PKG_VERSION"));
    origin.log();

    let running = Arc::new(AtomicBool::new(true));
    setup_signal_handler(Arc::clone(&running))?;

    // Hardware first: a missing converter should fail before any peer connects
    let channels = create_channels(&config.sensors)?;
    let sampler = Sampler::new(channels, config.sensors.full_scale);

    let mut link = match link::establish(&config.link, &running) {
        Ok(link) => link,
        Err(Error::Shutdown) => {
            log::info!("Shutdown before a peer connected");
            return Ok(());
        }
        Err(e) => {
            log::error!("No transport available: {}", e);
            return Err(e);
        }
    };
    log::info!(
        "Link established ({:?} via {:?}) with {}",
        link.mode(),
        link.kind(),
        link.peer()
    );

    let (command_tx, command_rx) = crossbeam_channel::unbounded();
    link.start_inbound(command_tx, Arc::clone(&running))?;

    let mut supervisor = Supervisor::new(sampler, link, command_rx, &config.streaming);
    supervisor.run(&running)?;

    log::info!("SparshaIO stopped");
    Ok(())
}
