use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::source::{DataOptions, EditKey, ReadOnlyPolicy, SpeciesDeletePolicy};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
  pub backend: BackendConfig,
  pub source: SourceKind,
  pub fixture: FixtureConfig,
  pub read_only_policy: ReadOnlyPolicy,
  pub species_delete_policy: SpeciesDeletePolicy,
  /// Page URL the session was opened from; its `edit` parameter carries the edit key
  pub page_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
  Remote,
  /// Static JSON data; read-only
  #[default]
  Fixture,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
  pub url: String,
  /// Use the backend's count/filter endpoints instead of computing from the cached lists
  pub server_queries: bool,
}

impl Default for BackendConfig {
  fn default() -> Self {
    Self {
      url: "http://localhost:8000".to_string(),
      server_queries: false,
    }
  }
}

/// Paths to fixture files; the bundled data is used when unset.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FixtureConfig {
  pub species: Option<PathBuf>,
  pub observations: Option<PathBuf>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./aviary.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/aviary/config.yaml
  ///
  /// Without any file the defaults apply.
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
    let local = PathBuf::from("aviary.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("aviary").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    // An empty document is valid and means "all defaults".
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    Ok(serde_yaml::from_str(contents)?)
  }

  pub fn data_options(&self) -> DataOptions {
    DataOptions {
      read_only_policy: self.read_only_policy,
      species_delete_policy: self.species_delete_policy,
      server_queries: self.backend.server_queries,
    }
  }

  /// Edit key from the configured page URL, checked against `secret`.
  pub fn edit_key(&self, secret: Option<&str>) -> Result<EditKey> {
    let Some(page_url) = &self.page_url else {
      return Ok(EditKey::none());
    };
    let url = Url::parse(page_url).map_err(|e| eyre!("Invalid page_url {}: {}", page_url, e))?;
    Ok(EditKey::from_page_url(&url, secret))
  }

  /// Get the edit secret from environment variables.
  ///
  /// Checks AVIARY_EDIT_KEY first, then EDIT_LINK_KEY as fallback.
  pub fn get_edit_secret() -> Option<String> {
    std::env::var("AVIARY_EDIT_KEY")
      .or_else(|_| std::env::var("EDIT_LINK_KEY"))
      .ok()
      .filter(|s| !s.is_empty())
  }
}
