//! Layered daemon configuration
//!
//! Precedence (lowest to highest): built-in defaults, `--config` file,
//! `PULSE__*` environment variables, command-line flags.
//!
//! ```text
//! PULSE__QUEUE__MAX_CONCURRENT_REQUESTS=5 \
//! PULSE__COLLECTOR_URL=https://collector.example.com/events \
//!     pulse-relay --config pulse.toml
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use config::{Config, Environment, File};
use pulse_core::domain::QueueConfig;
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_COLLECTOR_URL: &str = "http://127.0.0.1:8080/events";
pub const DEFAULT_DB_PATH: &str = "~/.pulse/queue.db";
pub const DEFAULT_DRAIN_TIMEOUT_SECS: u64 = 30;

const ENV_PREFIX: &str = "PULSE";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Parser)]
#[command(name = "pulse-relay")]
#[command(about = "Relay newline-delimited JSON events from stdin to a collector", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML, JSON or YAML)
    #[arg(short, long, env = "PULSE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Collector endpoint receiving POSTed events
    #[arg(long)]
    pub collector_url: Option<String>,

    /// SQLite database holding the persisted queue
    #[arg(long)]
    pub db_path: Option<String>,

    /// Seconds to keep delivering after stdin closes
    #[arg(long)]
    pub drain_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub queue: QueueConfig,
    pub collector_url: String,
    pub db_path: String,
    pub drain_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
            db_path: DEFAULT_DB_PATH.to_string(),
            drain_timeout_secs: DEFAULT_DRAIN_TIMEOUT_SECS,
        }
    }
}

impl Settings {
    pub fn load(cli: &Cli) -> Result<Self> {
        Self::load_with_env(cli, environment())
    }

    fn load_with_env(cli: &Cli, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = &cli.config {
            builder = builder.add_source(File::from(path.as_path()).required(true));
        }

        let settings: Settings = builder
            .add_source(env)
            .set_override_option("collector_url", cli.collector_url.clone())?
            .set_override_option("db_path", cli.db_path.clone())?
            .set_override_option("drain_timeout_secs", cli.drain_timeout_secs)?
            .build()
            .context("Failed to load configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings
            .queue
            .validate()
            .context("Invalid queue configuration")?;
        Ok(settings)
    }

    /// Database path with `~` and environment variables expanded
    pub fn expanded_db_path(&self) -> Result<String> {
        shellexpand::full(&self.db_path)
            .map(|path| path.into_owned())
            .with_context(|| format!("Cannot expand database path {}", self.db_path))
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}
