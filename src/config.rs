use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::sync::DEFAULT_CAPACITY;

// Intervals tuned against the live dashboard; kept as constants, not derived.

/// Session check cache lifetime and throttle window
pub const SESSION_CHECK_SECS: u64 = 10;
/// Overview/growth polling cadence, cache lifetime and throttle window
pub const POLL_SECS: u64 = 60;
/// Transaction history cache lifetime
pub const HISTORY_TTL_SECS: u64 = 120;
/// Upper bound on one remote call
pub const CALL_TIMEOUT_SECS: u64 = 30;
/// Text search debounce window
pub const DEBOUNCE_MS: u64 = 300;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  /// Where the session snapshot database lives (defaults to the data dir)
  pub snapshot_path: Option<PathBuf>,
  /// Directory for log files (defaults to the data dir)
  pub log_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  pub url: String,
  /// Transport-level request timeout
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  CALL_TIMEOUT_SECS
}

/// Caching, throttling and polling knobs. Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
  pub overview_ttl_secs: u64,
  pub overview_interval_secs: u64,
  pub growth_ttl_secs: u64,
  pub growth_interval_secs: u64,
  pub transactions_ttl_secs: u64,
  pub transactions_interval_secs: u64,
  pub session_ttl_secs: u64,
  pub session_interval_secs: u64,
  pub call_timeout_secs: u64,
  pub cache_capacity: usize,
  pub debounce_ms: u64,
  pub poll_interval_secs: u64,
  pub per_page: u32,
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      overview_ttl_secs: POLL_SECS,
      overview_interval_secs: POLL_SECS,
      growth_ttl_secs: POLL_SECS,
      growth_interval_secs: POLL_SECS,
      transactions_ttl_secs: HISTORY_TTL_SECS,
      transactions_interval_secs: 0,
      session_ttl_secs: SESSION_CHECK_SECS,
      session_interval_secs: SESSION_CHECK_SECS,
      call_timeout_secs: CALL_TIMEOUT_SECS,
      cache_capacity: DEFAULT_CAPACITY,
      debounce_ms: DEBOUNCE_MS,
      poll_interval_secs: POLL_SECS,
      per_page: crate::api::DEFAULT_PER_PAGE,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./walletsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/walletsync/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/walletsync/config.yaml\n\
                 with at least:\n  api:\n    url: https://wallet.example.com/api"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("walletsync.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("walletsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  /// Parse configuration from YAML text.
  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    if config.sync.per_page == 0 {
      return Err(eyre!("sync.per_page must be at least 1"));
    }
    Ok(config)
  }

  /// Get the API token from the environment, if set.
  ///
  /// Checks WALLETSYNC_API_TOKEN.
  pub fn api_token() -> Option<String> {
    std::env::var("WALLETSYNC_API_TOKEN")
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}
