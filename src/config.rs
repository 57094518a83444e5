use crate::error::{GatewayError, GatewayResult};
use crate::session::SessionOptions;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub gateway: GatewayConfig,
    pub session: SessionConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub listen: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:2323".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub rows: u16,
    pub recv_buffer_bytes: usize,
    pub send_buffer_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rows: 24,
            recv_buffer_bytes: 1024,
            send_buffer_bytes: 1024,
        }
    }
}

impl From<&SessionConfig> for SessionOptions {
    fn from(config: &SessionConfig) -> Self {
        Self {
            rows: config.rows,
            recv_capacity: config.recv_buffer_bytes,
            send_capacity: config.send_buffer_bytes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[derive(Debug, Parser)]
#[command(author, version = crate::version::VERSION, about)]
pub struct Cli {
    /// Path to the configuration file (defaults to ./telgate.toml).
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// TCP address to listen on.
    #[arg(long)]
    pub listen: Option<String>,
    /// Terminal height assumed for cursor tracking.
    #[arg(long)]
    pub rows: Option<u16>,
    #[arg(long)]
    pub log_level: Option<String>,
}

impl Config {
    pub fn load(args: &Cli) -> GatewayResult<Self> {
        let mut config = if let Some(path) = &args.config {
            Self::from_file(path)?
        } else if Path::new("telgate.toml").exists() {
            Self::from_file(Path::new("telgate.toml"))?
        } else {
            Self::default()
        };

        config.apply_env();
        config.apply_cli(args);
        Ok(config)
    }

    fn from_file(path: &Path) -> GatewayResult<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            GatewayError::Config(format!("failed to read {}: {err}", path.display()))
        })?;
        let parsed: Self = toml::from_str(&content).map_err(|err| {
            GatewayError::Config(format!("failed to parse {}: {err}", path.display()))
        })?;
        Ok(parsed)
    }

    fn apply_env(&mut self) {
        if let Ok(value) = env::var("TELGATE_LISTEN") {
            self.gateway.listen = value;
        }
        if let Ok(value) = env::var("TELGATE_ROWS")
            && let Ok(rows) = value.parse()
        {
            self.session.rows = rows;
        }
        if let Ok(value) = env::var("TELGATE_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Ok(value) = env::var("TELGATE_LOG_FORMAT") {
            self.logging.format = value;
        }
    }

    fn apply_cli(&mut self, args: &Cli) {
        if let Some(listen) = &args.listen {
            self.gateway.listen = listen.clone();
        }
        if let Some(rows) = args.rows {
            self.session.rows = rows;
        }
        if let Some(level) = &args.log_level {
            self.logging.level = level.clone();
        }
    }
}
