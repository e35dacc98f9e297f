use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub remote: RemoteConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  /// Override for the database directory (defaults to the platform data dir)
  pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  pub url: String,
  /// Per-request timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How long cached query results stay fresh
  #[serde(default = "default_ttl_secs")]
  pub ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  /// Delay between a became-reachable transition and the sync it triggers,
  /// so a connection that is still stabilizing isn't raced
  #[serde(default = "default_settle_delay_ms")]
  pub settle_delay_ms: u64,
  /// How often `finq watch` probes the remote service
  #[serde(default = "default_probe_interval_secs")]
  pub probe_interval_secs: u64,
  /// Attempt count at which a repeatedly failing pending operation is
  /// logged as suspect
  #[serde(default = "default_warn_attempts")]
  pub warn_attempts: u32,
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_ttl_secs() -> u64 {
  3600
}

fn default_settle_delay_ms() -> u64 {
  1000
}

fn default_probe_interval_secs() -> u64 {
  30
}

fn default_warn_attempts() -> u32 {
  5
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      ttl_secs: default_ttl_secs(),
    }
  }
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      settle_delay_ms: default_settle_delay_ms(),
      probe_interval_secs: default_probe_interval_secs(),
      warn_attempts: default_warn_attempts(),
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./finq.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/finq/config.yaml
  ///
  /// `FINQ_REMOTE_URL` overrides the configured remote URL.
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

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => {
        return Err(eyre!(
          "No configuration file found. Create one at ~/.config/finq/config.yaml\n\
                 with at least:\n  remote:\n    url: https://your-service-endpoint"
        ))
      }
    };

    if let Ok(url) = std::env::var("FINQ_REMOTE_URL") {
      config.remote.url = url;
    }

    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("finq.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("finq").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: Config = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Resolved database location.
  pub fn db_path(&self) -> Result<PathBuf> {
    if let Some(dir) = &self.data_dir {
      return Ok(dir.join("finq.db"));
    }
    Ok(crate::store::Store::default_path()?)
  }
}
