use std::path::{Path, PathBuf};

use clap::Args;
use replay_pipeline::{ReplayConfig, WaitStrategy};
use telemetry_api::Field;

use super::error::ReplayServerError;

/// Config file looked up in the working directory when `--config` is not set.
pub const DEFAULT_CONFIG: &str = "replay.toml";

// ═══════════════════════════════════════════════════════════════
//  CLI args
// ═══════════════════════════════════════════════════════════════

#[derive(Args, Clone, Debug)]
pub struct ReplayArgs {
    /// Flight log to replay (CSV, `#` comments)
    pub log: PathBuf,

    /// TCP port to listen on
    pub port: u16,

    /// Path to the TOML config [default: replay.toml if present]
    #[arg(long, env = "REPLAY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Listen address (default 127.0.0.1)
    #[arg(long)]
    pub host: Option<String>,

    /// Send every field of each record
    #[arg(long, conflicts_with = "select")]
    pub full: bool,

    /// Field to send, by label (repeatable), e.g. --select Altitude
    #[arg(long = "select", value_name = "NAME")]
    pub select: Vec<Field>,

    /// Pacing: sleep (default) or spin
    #[arg(long)]
    pub wait: Option<WaitStrategy>,
}

// ═══════════════════════════════════════════════════════════════
//  Effective config
// ═══════════════════════════════════════════════════════════════

/// Final configuration after merging: defaults < config file < CLI.
#[derive(Debug)]
pub struct Effective {
    pub log: PathBuf,
    pub port: u16,
    /// File the config was read from, if any.
    pub source: Option<PathBuf>,
    pub config: ReplayConfig,
}

impl Effective {
    pub fn new(args: &ReplayArgs) -> Result<Self, ReplayServerError> {
        let (source, mut config) = match &args.config {
            Some(path) => (Some(path.clone()), ReplayConfig::load(path)?),
            None if Path::new(DEFAULT_CONFIG).exists() => {
                (Some(PathBuf::from(DEFAULT_CONFIG)), ReplayConfig::load(DEFAULT_CONFIG)?)
            }
            None => (None, ReplayConfig::default()),
        };

        if let Some(host) = &args.host {
            config.host = host.clone();
        }
        if args.full {
            config.full = true;
        }
        if !args.select.is_empty() {
            config.selection = args.select.clone();
            config.full = false;
        }
        if let Some(wait) = args.wait {
            config.pacing.wait = wait;
        }
        config.validate()?;

        Ok(Self { log: args.log.clone(), port: args.port, source, config })
    }
}
