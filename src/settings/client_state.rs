//! Per-client state: settings, visited markers and the map zoom.

use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;

use super::definition::{Settings, SettingsError, SettingsLayout};
use super::store::StateStorage;

pub const SETTINGS_KEY: &str = "aviary-settings";
pub const VISITED_MARKERS_KEY: &str = "aviary-visited-markers";
pub const MAP_ZOOM_KEY: &str = "aviary-map-zoom";

pub const DEFAULT_MAP_ZOOM: f64 = 13.0;

/// Marker size factor for a map zoom level.
///
/// Grows linearly from 0 at zoom 5 to 0.9 at zoom 15.
pub fn marker_scale(zoom: f64) -> f64 {
  let t = ((zoom - 5.0) / 10.0).clamp(0.0, 1.0);
  0.9 * t
}

pub struct ClientState<S> {
  storage: S,
  layout: SettingsLayout,
}

impl<S: StateStorage> ClientState<S> {
  pub fn new(storage: S, layout: SettingsLayout) -> Self {
    Self { storage, layout }
  }

  pub fn layout(&self) -> &SettingsLayout {
    &self.layout
  }

  /// Stored settings merged over the defaults.
  ///
  /// A corrupt stored document is logged and treated as absent.
  pub fn settings(&self) -> Result<Settings, SettingsError> {
    let Some(raw) = self.storage.get(SETTINGS_KEY)? else {
      return Ok(self.layout.defaults());
    };
    match serde_json::from_str::<BTreeMap<String, Value>>(&raw) {
      Ok(stored) => Ok(Settings::from_stored(&self.layout, stored)),
      Err(e) => {
        warn!(error = %e, "ignoring unreadable stored settings");
        Ok(self.layout.defaults())
      }
    }
  }

  pub fn save_settings(&self, settings: &Settings) -> Result<(), SettingsError> {
    let raw = serde_json::to_string(settings).map_err(|e| SettingsError::Storage(e.to_string()))?;
    self.storage.set(SETTINGS_KEY, &raw)
  }

  /// Validate and persist a single change, returning the new settings.
  pub fn update_setting(&self, key: &str, raw: &str) -> Result<Settings, SettingsError> {
    let definition = self
      .layout
      .find(key)
      .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))?;
    let value = definition.parse(raw)?;
    let mut settings = self.settings()?;
    settings.set(&self.layout, key, value)?;
    self.save_settings(&settings)?;
    Ok(settings)
  }

  pub fn reset_settings(&self) -> Result<(), SettingsError> {
    self.storage.remove(SETTINGS_KEY)
  }

  /// Observation ids whose markers were opened, oldest first.
  pub fn visited_markers(&self) -> Result<Vec<String>, SettingsError> {
    let Some(raw) = self.storage.get(VISITED_MARKERS_KEY)? else {
      return Ok(Vec::new());
    };
    Ok(serde_json::from_str(&raw).unwrap_or_else(|e| {
      warn!(error = %e, "ignoring unreadable visited markers");
      Vec::new()
    }))
  }

  pub fn is_visited(&self, observation_id: &str) -> Result<bool, SettingsError> {
    Ok(
      self
        .visited_markers()?
        .iter()
        .any(|id| id == observation_id),
    )
  }

  /// Returns `false` if the marker was already visited.
  pub fn mark_visited(&self, observation_id: &str) -> Result<bool, SettingsError> {
    let mut visited = self.visited_markers()?;
    if visited.iter().any(|id| id == observation_id) {
      return Ok(false);
    }
    visited.push(observation_id.to_string());
    let raw = serde_json::to_string(&visited).map_err(|e| SettingsError::Storage(e.to_string()))?;
    self.storage.set(VISITED_MARKERS_KEY, &raw)?;
    Ok(true)
  }

  pub fn clear_visited(&self) -> Result<(), SettingsError> {
    self.storage.remove(VISITED_MARKERS_KEY)
  }

  pub fn map_zoom(&self) -> Result<f64, SettingsError> {
    Ok(
      self
        .storage
        .get(MAP_ZOOM_KEY)?
        .and_then(|raw| raw.parse::<f64>().ok())
        .filter(|z| z.is_finite())
        .unwrap_or(DEFAULT_MAP_ZOOM),
    )
  }

  pub fn set_map_zoom(&self, zoom: f64) -> Result<(), SettingsError> {
    if !zoom.is_finite() || zoom < 0.0 {
      return Err(SettingsError::InvalidNumber {
        key: MAP_ZOOM_KEY.to_string(),
      });
    }
    self.storage.set(MAP_ZOOM_KEY, &zoom.to_string())
  }
}
