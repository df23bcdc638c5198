use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::worker::WorkerSettings;

/// Environment variable that overrides `script_url` from the config file.
pub const SCRIPT_URL_ENV: &str = "SHELLCACHE_SCRIPT_URL";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  /// Worker registration URL, e.g. `https://ledger.example/sw.js?v=2.0.1`
  pub script_url: Option<String>,
  #[serde(default = "default_cache_prefix")]
  pub cache_prefix: String,
  /// Document served to offline navigations
  #[serde(default = "default_shell_document")]
  pub shell_document: String,
  /// Paths fetched at install time, relative to the worker script
  #[serde(default = "default_precache")]
  pub precache: Vec<String>,
  #[serde(default)]
  pub network: NetworkConfig,
  /// Also write logs to this file
  pub log_file: Option<PathBuf>,
  /// Cache database location (defaults to the platform data directory)
  pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetworkConfig {
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  #[serde(default = "default_user_agent")]
  pub user_agent: String,
}

impl Default for NetworkConfig {
  fn default() -> Self {
    Self {
      timeout_secs: default_timeout_secs(),
      user_agent: default_user_agent(),
    }
  }
}

impl Default for Config {
  fn default() -> Self {
    Self {
      script_url: None,
      cache_prefix: default_cache_prefix(),
      shell_document: default_shell_document(),
      precache: default_precache(),
      network: NetworkConfig::default(),
      log_file: None,
      database: None,
    }
  }
}

fn default_cache_prefix() -> String {
  "ledger-cache-v".to_string()
}

fn default_shell_document() -> String {
  "index.html".to_string()
}

/// App shell of the bookkeeping PWA.
fn default_precache() -> Vec<String> {
  [
    "index.html",
    "expenses.html",
    "products.html",
    "movements.html",
    "inventory.html",
    "manifest.json",
    "css/styles.css",
    "js/app.js",
    "js/storage.js",
    "js/components.js",
    "js/expenses.js",
    "js/products.js",
    "js/movements.js",
    "js/inventory.js",
  ]
  .iter()
  .map(|p| p.to_string())
  .collect()
}

fn default_timeout_secs() -> u64 {
  10
}

fn default_user_agent() -> String {
  format!("shellcache/{}", env!("CARGO_PKG_VERSION"))
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./shellcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/shellcache/config.yaml
  ///
  /// Without any file the built-in defaults are used.
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
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("shellcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("shellcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Apply command line and environment overrides.
  ///
  /// Precedence for the script URL: flag, then `SHELLCACHE_SCRIPT_URL`, then file.
  pub fn with_overrides(mut self, script_url: Option<String>, database: Option<PathBuf>) -> Self {
    if let Some(url) = script_url.or_else(|| std::env::var(SCRIPT_URL_ENV).ok()) {
      self.script_url = Some(url);
    }
    if database.is_some() {
      self.database = database;
    }
    self
  }

  pub fn script_url(&self) -> Result<&str> {
    self.script_url.as_deref().ok_or_else(|| {
      eyre!(
        "No worker script URL configured. Set script_url in ~/.config/shellcache/config.yaml,\n\
         export {} or pass --script-url.",
        SCRIPT_URL_ENV
      )
    })
  }

  pub fn worker_settings(&self) -> Result<WorkerSettings> {
    Ok(WorkerSettings {
      script_url: self.script_url()?.to_string(),
      cache_prefix: self.cache_prefix.clone(),
      shell_document: self.shell_document.clone(),
      precache: self.precache.clone(),
    })
  }

  /// Get the cache database path.
  pub fn database_path(&self) -> Result<PathBuf> {
    if let Some(path) = &self.database {
      return Ok(path.clone());
    }

    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("shellcache").join("cache.db"))
  }
}
