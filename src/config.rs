use chrono::Duration;
use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::crude::client::Credentials;

const DEFAULT_ENDPOINT: &str = "http://localhost:8080";
const DEFAULT_SCHEMA_TTL_SECS: u64 = 600;
const DEFAULT_SESSION_COOKIE: &str = "crude_session";

/// Resolved configuration, built once at start-up and passed to components.
#[derive(Debug, Clone)]
pub struct Config {
  pub endpoint: Url,
  /// Directory holding the per-endpoint caches
  pub cache_dir: PathBuf,
  /// How long a cached schema is trusted
  pub schema_freshness: Duration,
  pub credentials: Credentials,
  pub log_file: Option<PathBuf>,
}

/// Optional settings file. Secrets never live here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
  pub endpoint: Option<String>,
  pub cache_dir: Option<PathBuf>,
  pub schema_ttl_secs: Option<u64>,
  /// Cookie name used when authenticating with CRUDE_SESSION
  pub session_cookie: Option<String>,
  pub log_file: Option<PathBuf>,
}

/// Values taken from the process environment.
#[derive(Debug, Clone, Default)]
pub struct Env {
  pub endpoint: Option<String>,
  pub cache_dir: Option<PathBuf>,
  pub api_key: Option<String>,
  pub session: Option<String>,
}

impl Env {
  pub fn from_process() -> Self {
    fn var(name: &str) -> Option<String> {
      std::env::var(name).ok().filter(|v| !v.trim().is_empty())
    }

    Self {
      endpoint: var("CRUDE_API_ENDPOINT"),
      cache_dir: var("CRUDE_CACHE_DIR").map(PathBuf::from),
      api_key: var("CRUDE_API_KEY"),
      session: var("CRUDE_SESSION"),
    }
  }
}

/// Settings given on the command line; these win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
  pub endpoint: Option<String>,
  pub cache_dir: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file, environment and command-line overrides.
  ///
  /// File search order:
  /// 1. Explicit path if provided (must exist)
  /// 2. ./crude.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/crude/config.yaml
  ///
  /// Running without a file is fine; defaults apply.
  pub fn load(explicit_path: Option<&Path>, overrides: Overrides) -> Result<Self> {
    let file = match explicit_path {
      Some(p) if p.exists() => Self::load_from_path(p)?,
      Some(p) => return Err(eyre!("Config file not found: {}", p.display())),
      None => match Self::find_config_file() {
        Some(p) => Self::load_from_path(&p)?,
        None => FileConfig::default(),
      },
    };

    Self::resolve(file, Env::from_process(), overrides)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("crude.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("crude").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<FileConfig> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    let config: FileConfig = serde_yaml::from_str(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))?;

    Ok(config)
  }

  /// Combine the sources, later ones winning: file, environment, overrides.
  pub fn resolve(file: FileConfig, env: Env, overrides: Overrides) -> Result<Self> {
    let endpoint = overrides
      .endpoint
      .or(env.endpoint)
      .or(file.endpoint)
      .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    let endpoint = parse_endpoint(&endpoint)?;

    let cache_dir = overrides
      .cache_dir
      .or(env.cache_dir)
      .or(file.cache_dir)
      .unwrap_or_else(default_cache_dir);

    let ttl = file.schema_ttl_secs.unwrap_or(DEFAULT_SCHEMA_TTL_SECS);
    let schema_freshness = i64::try_from(ttl)
      .ok()
      .and_then(Duration::try_seconds)
      .ok_or_else(|| eyre!("schema_ttl_secs is out of range: {}", ttl))?;

    let credentials = match (env.api_key, env.session) {
      (Some(key), _) => Credentials::ApiKey(key),
      (None, Some(value)) => Credentials::SessionCookie {
        name: file
          .session_cookie
          .unwrap_or_else(|| DEFAULT_SESSION_COOKIE.to_string()),
        value,
      },
      (None, None) => {
        return Err(eyre!(
          "No credentials found. Set CRUDE_API_KEY or CRUDE_SESSION environment variable."
        ))
      }
    };

    Ok(Self {
      endpoint,
      cache_dir,
      schema_freshness,
      credentials,
      log_file: file.log_file,
    })
  }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
  let url = Url::parse(raw.trim()).map_err(|e| eyre!("Invalid endpoint '{}': {}", raw, e))?;
  match url.scheme() {
    "http" | "https" => Ok(url),
    other => Err(eyre!(
      "Invalid endpoint '{}': scheme must be http or https, not {}",
      raw,
      other
    )),
  }
}

fn default_cache_dir() -> PathBuf {
  dirs::home_dir()
    .map(|home| home.join(".crude"))
    .unwrap_or_else(|| PathBuf::from(".crude"))
}
