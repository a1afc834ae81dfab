use std::path::Path;
use std::time::Duration;

use format_csv::ReaderOptions;
use framing_delimited::DelimitedConfig;
use serde::Deserialize;
use telemetry_api::{Field, FieldSchema, Selection};

use crate::clock::{Pacer, WaitStrategy};
use crate::scheduler::SchedulerOptions;
use crate::PipelineError;

// ═══════════════════════════════════════════════════════════════
//  Replay Config
// ═══════════════════════════════════════════════════════════════

/// TOML configuration of a replay. Every key is optional.
///
/// ```toml
/// host = "127.0.0.1"
/// selection = ["Time", "Altitude", "Vertical velocity"]
///
/// [pacing]
/// wait = "spin"
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReplayConfig {
    /// Listening host (default `127.0.0.1`).
    pub host: String,
    /// Fields sent per record, by label.
    pub selection: Vec<Field>,
    /// Send every field of the schema, ignoring `selection`.
    pub full: bool,
    pub reader: ReaderOptions,
    pub pacing: PacingConfig,
    pub connection: ConnectionConfig,
    pub framing: DelimitedConfig,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            selection: Selection::TELEMETRY.to_vec(),
            full: false,
            reader: ReaderOptions::default(),
            pacing: PacingConfig::default(),
            connection: ConnectionConfig::default(),
            framing: DelimitedConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PacingConfig {
    pub wait: WaitStrategy,
    /// Longest single sleep of the `sleep` strategy.
    pub granularity_ms: u64,
    pub slack_ms: u64,
    /// 0 disables progress logging.
    pub progress_every: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            wait: WaitStrategy::Sleep,
            granularity_ms: 5,
            slack_ms: 50,
            progress_every: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConnectionConfig {
    /// Back-off after a failed accept.
    pub accept_retry_ms: u64,
    pub nodelay: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { accept_retry_ms: 1000, nodelay: true }
    }
}

impl ConnectionConfig {
    pub fn accept_retry(&self) -> Duration {
        Duration::from_millis(self.accept_retry_ms)
    }
}

impl ReplayConfig {
    /// Load and validate a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::Config {
            context: "read",
            detail: format!("{}: {e}", path.display()),
        })?;
        Self::from_toml(&content).map_err(|e| match e {
            PipelineError::Config { context, detail } => PipelineError::Config {
                context,
                detail: format!("{}: {detail}", path.display()),
            },
            other => other,
        })
    }

    pub fn from_toml(content: &str) -> Result<Self, PipelineError> {
        let config: Self = toml::from_str(content).map_err(|e| PipelineError::Config {
            context: "parse",
            detail: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Schema-independent checks.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid = |detail: String| PipelineError::Config { context: "validate", detail };
        if self.host.trim().is_empty() {
            return Err(invalid("host is empty".into()));
        }
        if !self.full && self.selection.is_empty() {
            return Err(invalid("selection is empty and full = false".into()));
        }
        self.reader.validate().map_err(|e| invalid(e.message().to_string()))?;
        if self.framing.delimiter.is_empty() {
            return Err(invalid("framing delimiter is empty".into()));
        }
        if self.pacing.wait == WaitStrategy::Sleep && self.pacing.granularity_ms == 0 {
            return Err(invalid("pacing.granularity_ms must be > 0 with wait = \"sleep\"".into()));
        }
        Ok(())
    }

    /// Fields to send, checked against `schema`. `None` means the full
    /// record.
    pub fn selection(&self, schema: &FieldSchema) -> Result<Option<Selection>, PipelineError> {
        if self.full {
            return Ok(None);
        }
        Selection::new(self.selection.iter().copied(), schema)
            .map(Some)
            .map_err(|e| PipelineError::Config { context: "selection", detail: e.to_string() })
    }

    pub fn pacer(&self) -> Pacer {
        Pacer::new(self.pacing.wait, Duration::from_millis(self.pacing.granularity_ms))
    }

    pub fn scheduler_options(&self) -> SchedulerOptions {
        SchedulerOptions {
            pacer: self.pacer(),
            slack: Duration::from_millis(self.pacing.slack_ms),
            progress_every: self.pacing.progress_every,
        }
    }
}
