use anyhow::{Context, Result, bail};
use clap::Parser;
use std::{env, path::PathBuf};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: PathBuf,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Simple Storage Service backed by plain files and CSV tables")]
pub struct Args {
    /// Host to bind to (overrides TRIPLE_S_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides TRIPLE_S_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Root directory for buckets (overrides TRIPLE_S_DIR)
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse(), |name| env::var(name))
    }

    /// Merge parsed arguments over values looked up with `lookup`; CLI wins.
    pub fn merge(
        args: Args,
        lookup: impl Fn(&str) -> Result<String, env::VarError>,
    ) -> Result<Self> {
        let env_host = lookup("TRIPLE_S_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match lookup("TRIPLE_S_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing TRIPLE_S_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 8080,
            Err(err) => return Err(err).context("reading TRIPLE_S_PORT"),
        };
        let env_dir = lookup("TRIPLE_S_DIR").unwrap_or_else(|_| "data".into());

        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.dir.unwrap_or_else(|| PathBuf::from(env_dir)),
        };

        if cfg.port == 0 {
            bail!("port 0 is reserved and cannot be used");
        }
        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
