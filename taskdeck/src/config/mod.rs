//! Configuration system for the taskdeck client.
//!
//! Supports layered configuration with the following priority (highest first):
//! 1. CLI arguments
//! 2. Environment variables (via clap `env` attribute)
//! 3. TOML config file (`~/.config/taskdeck/config.toml`)
//! 4. Compiled defaults
//!
//! Missing config file is not an error (defaults are used). An explicit
//! `--config` path that doesn't exist is an error.

use std::path::PathBuf;

use taskdeck_proto::task::UserId;

use crate::net::NetConfig;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Failed to parse the TOML configuration.
    #[error("failed to parse config file: {0}")]
    ParseToml(#[from] toml::de::Error),
}

// ---------------------------------------------------------------------------
// TOML file structs (all fields Option for partial overrides)
// ---------------------------------------------------------------------------

/// Top-level TOML config file structure.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerFileConfig,
    session: SessionFileConfig,
}

/// `[server]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct ServerFileConfig {
    base_url: Option<String>,
    socket_url: Option<String>,
    channel_capacity: Option<usize>,
}

/// `[session]` section of the config file.
#[derive(Debug, Default, serde::Deserialize)]
#[serde(default)]
struct SessionFileConfig {
    token: Option<String>,
    user_id: Option<u64>,
}

// ---------------------------------------------------------------------------
// Resolved configuration (concrete types, all fields populated)
// ---------------------------------------------------------------------------

/// Fully resolved client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base URL of the task service.
    pub base_url: Option<String>,
    /// Live-event WebSocket URL. When unset, derived from `base_url`.
    pub socket_url: Option<String>,
    /// Session bearer token.
    pub token: Option<String>,
    /// The local user's id, for self-origin suppression.
    pub user_id: Option<u64>,
    /// Channel capacity for command/event mpsc channels.
    pub channel_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            socket_url: None,
            token: None,
            user_id: None,
            channel_capacity: 64,
        }
    }
}

impl ClientConfig {
    /// Load configuration by merging CLI args, env vars, and a TOML file.
    ///
    /// CLI args and env vars are parsed via `clap`. If `--config` is given
    /// and the file does not exist, returns an error. If no `--config` is
    /// given, the default path (`~/.config/taskdeck/config.toml`) is tried
    /// and silently ignored if missing.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the explicit config file cannot be read
    /// or parsed.
    pub fn load(cli: &CliArgs) -> Result<Self, ConfigError> {
        let file = load_config_file(cli.config.as_deref())?;
        Ok(Self::resolve(cli, &file))
    }

    /// Resolve a `ClientConfig` from CLI args and a parsed config file.
    ///
    /// Priority: CLI > file > default. This is separated from `load()` to
    /// enable unit testing without CLI parsing.
    #[must_use]
    fn resolve(cli: &CliArgs, file: &ConfigFile) -> Self {
        let defaults = Self::default();

        Self {
            base_url: cli
                .server_url
                .clone()
                .or_else(|| file.server.base_url.clone()),
            socket_url: cli
                .socket_url
                .clone()
                .or_else(|| file.server.socket_url.clone()),
            token: cli.token.clone().or_else(|| file.session.token.clone()),
            user_id: cli.user_id.or(file.session.user_id),
            channel_capacity: file
                .server
                .channel_capacity
                .unwrap_or(defaults.channel_capacity),
        }
    }

    /// Build a [`NetConfig`] from this configuration, if all required
    /// session fields are present.
    ///
    /// When `socket_url` is unset it is derived from `base_url` by
    /// switching the scheme to `ws`/`wss` and appending `/ws/tasks`.
    ///
    /// Returns `None` if `base_url`, `token`, or `user_id` is missing.
    #[must_use]
    pub fn to_net_config(&self) -> Option<NetConfig> {
        let base_url = self.base_url.clone()?;
        let token = self.token.clone()?;
        let user_id = self.user_id?;

        let socket_url = self
            .socket_url
            .clone()
            .unwrap_or_else(|| derive_socket_url(&base_url));

        let mut config = NetConfig::new(base_url, socket_url, token, UserId(user_id));
        config.channel_capacity = self.channel_capacity;
        Some(config)
    }
}

/// CLI arguments parsed by clap.
///
/// Environment variables are supported via `env` attributes so a session
/// can be configured without touching the config file.
#[derive(clap::Parser, Debug, Default)]
#[command(version, about = "Task-management client with live sync")]
pub struct CliArgs {
    /// REST base URL of the task service.
    #[arg(long, env = "TASKDECK_SERVER")]
    pub server_url: Option<String>,

    /// Live-event WebSocket URL (default: derived from the server URL).
    #[arg(long, env = "TASKDECK_SOCKET")]
    pub socket_url: Option<String>,

    /// Session bearer token.
    #[arg(long, env = "TASKDECK_TOKEN")]
    pub token: Option<String>,

    /// Your user id (for suppressing echoes of your own changes).
    #[arg(long, env = "TASKDECK_USER_ID")]
    pub user_id: Option<u64>,

    /// Path to config file (default: `~/.config/taskdeck/config.toml`).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level filter (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TASKDECK_LOG")]
    pub log_level: String,

    /// Path to log file (default: stderr only).
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Internal helpers
// ---------------------------------------------------------------------------

/// Derives the live-event endpoint from the REST base URL.
fn derive_socket_url(base_url: &str) -> String {
    let trimmed = base_url.trim_end_matches('/');
    let ws_base = if let Some(rest) = trimmed.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        trimmed.to_string()
    };
    format!("{ws_base}/ws/tasks")
}

/// Load and parse a TOML config file.
///
/// If `explicit_path` is `Some`, the file must exist (error if not).
/// If `explicit_path` is `None`, the default path is tried and missing file
/// is treated as empty config.
fn load_config_file(explicit_path: Option<&std::path::Path>) -> Result<ConfigFile, ConfigError> {
    let path = if let Some(p) = explicit_path {
        let contents = std::fs::read_to_string(p).map_err(|e| ConfigError::ReadFile {
            path: p.to_path_buf(),
            source: e,
        })?;
        return Ok(toml::from_str(&contents)?);
    } else {
        let Some(config_dir) = dirs::config_dir() else {
            // No config dir available — use defaults.
            return Ok(ConfigFile::default());
        };
        config_dir.join("taskdeck").join("config.toml")
    };

    match std::fs::read_to_string(&path) {
        Ok(contents) => Ok(toml::from_str(&contents)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ConfigFile::default()),
        Err(e) => Err(ConfigError::ReadFile { path, source: e }),
    }
}
