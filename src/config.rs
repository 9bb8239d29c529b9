use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  /// Per-resource staleness thresholds. Hand-tuned; see [`StaleConfig`].
  #[serde(default)]
  pub stale: StaleConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL of the Cortes backend, e.g. "https://api.cortes.app/v1/"
  pub url: String,
  /// Request timeout in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
  30
}

/// Staleness thresholds per resource, in seconds.
///
/// Values mirror how often each resource actually changes: chat lists and
/// message feeds move constantly, plans almost never. Kept as plain
/// configuration rather than a derived policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaleConfig {
  pub chats_secs: u64,
  pub messages_secs: u64,
  pub settings_secs: u64,
  pub members_secs: u64,
  pub logs_secs: u64,
  pub notifications_secs: u64,
  pub user_secs: u64,
  pub plans_secs: u64,
}

impl Default for StaleConfig {
  fn default() -> Self {
    Self {
      chats_secs: 30,
      messages_secs: 30,
      settings_secs: 60,
      members_secs: 60,
      logs_secs: 60,
      notifications_secs: 60,
      user_secs: 300,
      plans_secs: 600,
    }
  }
}

impl StaleConfig {
  pub fn chats(&self) -> Duration {
    Duration::from_secs(self.chats_secs)
  }

  pub fn messages(&self) -> Duration {
    Duration::from_secs(self.messages_secs)
  }

  pub fn settings(&self) -> Duration {
    Duration::from_secs(self.settings_secs)
  }

  pub fn members(&self) -> Duration {
    Duration::from_secs(self.members_secs)
  }

  pub fn logs(&self) -> Duration {
    Duration::from_secs(self.logs_secs)
  }

  pub fn notifications(&self) -> Duration {
    Duration::from_secs(self.notifications_secs)
  }

  pub fn user(&self) -> Duration {
    Duration::from_secs(self.user_secs)
  }

  pub fn plans(&self) -> Duration {
    Duration::from_secs(self.plans_secs)
  }
}

impl Config {
  /// Build a configuration programmatically from a base URL, with default
  /// staleness thresholds. Useful for tests and embedding.
  pub fn with_url(url: impl Into<String>) -> Self {
    Self {
      api: ApiConfig {
        url: url.into(),
        timeout_secs: default_timeout_secs(),
      },
      stale: StaleConfig::default(),
    }
  }

  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./cortes.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/cortes/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(Error::Config(format!(
          "config file not found: {}",
          p.display()
        )));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(Error::Config(
        "no configuration file found; create one at ~/.config/cortes/config.yaml".to_string(),
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("cortes.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("cortes").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
      Error::Config(format!(
        "failed to read config file {}: {}",
        path.display(),
        e
      ))
    })?;

    let config: Config = serde_yaml::from_str(&contents).map_err(|e| {
      Error::Config(format!(
        "failed to parse config file {}: {}",
        path.display(),
        e
      ))
    })?;

    Ok(config)
  }

  /// Get the Cortes API token from environment variables.
  ///
  /// Checks CORTES_API_TOKEN first, then CORTES_TOKEN as fallback.
  pub fn api_token() -> Result<String> {
    std::env::var("CORTES_API_TOKEN")
      .or_else(|_| std::env::var("CORTES_TOKEN"))
      .map_err(|_| {
        Error::Config(
          "API token not found; set CORTES_API_TOKEN or CORTES_TOKEN environment variable"
            .to_string(),
        )
      })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn stale_defaults_match_resource_volatility() {
    let stale = StaleConfig::default();
    assert_eq!(stale.chats(), Duration::from_secs(30));
    assert_eq!(stale.notifications(), Duration::from_secs(60));
    assert_eq!(stale.user(), Duration::from_secs(300));
    assert_eq!(stale.plans(), Duration::from_secs(600));
  }

  #[test]
  fn parses_partial_stale_overrides() {
    let yaml = r#"
api:
  url: "https://api.example.test/v1/"
stale:
  chats_secs: 5
"#;
    let config: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(config.stale.chats(), Duration::from_secs(5));
    // Untouched fields keep their defaults
    assert_eq!(config.stale.plans(), Duration::from_secs(600));
    assert_eq!(config.api.timeout_secs, 30);
  }
}
