//! Declarative settings: groups of typed entries with defaults.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SettingsError {
  #[error("unknown setting '{0}'")]
  UnknownKey(String),
  #[error("setting '{key}' expects a {expected} value")]
  WrongType { key: String, expected: &'static str },
  #[error("setting '{key}' must be between {min} and {max}")]
  OutOfRange { key: String, min: f64, max: f64 },
  #[error("'{key}' must be a non-negative finite number")]
  InvalidNumber { key: String },
  #[error("setting '{key}' must move in steps of {step}")]
  OffStep { key: String, step: f64 },
  #[error("setting '{key}' must be one of: {allowed}")]
  UnknownOption { key: String, allowed: String },
  #[error("state storage error: {0}")]
  Storage(String),
}

/// A stored setting value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
  Bool(bool),
  Number(f64),
  Text(String),
}

impl SettingValue {
  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Self::Bool(b) => Some(*b),
      _ => None,
    }
  }

  pub fn as_number(&self) -> Option<f64> {
    match self {
      Self::Number(n) => Some(*n),
      _ => None,
    }
  }

  pub fn as_text(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }
}

impl std::fmt::Display for SettingValue {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Bool(b) => write!(f, "{}", b),
      Self::Number(n) => write!(f, "{}", n),
      Self::Text(s) => write!(f, "{}", s),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SelectOption {
  pub value: &'static str,
  pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SettingKind {
  Checkbox,
  Range { min: f64, max: f64, step: f64 },
  Select { options: Vec<SelectOption> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingDefinition {
  pub key: &'static str,
  pub label: &'static str,
  pub help: &'static str,
  pub kind: SettingKind,
  pub default: SettingValue,
  pub hidden: bool,
}

impl SettingDefinition {
  /// Check that `value` has the right type and lies within the kind's limits.
  pub fn validate(&self, value: &SettingValue) -> Result<(), SettingsError> {
    let key = self.key.to_string();
    match &self.kind {
      SettingKind::Checkbox => value.as_bool().map(|_| ()).ok_or(SettingsError::WrongType {
        key,
        expected: "boolean",
      }),
      SettingKind::Range { min, max, step } => {
        let n = value.as_number().ok_or_else(|| SettingsError::WrongType {
          key: key.clone(),
          expected: "number",
        })?;
        if n < *min || n > *max {
          return Err(SettingsError::OutOfRange {
            key,
            min: *min,
            max: *max,
          });
        }
        let steps = (n - min) / step;
        if (steps - steps.round()).abs() > 1e-9 {
          return Err(SettingsError::OffStep { key, step: *step });
        }
        Ok(())
      }
      SettingKind::Select { options } => {
        let text = value.as_text().ok_or_else(|| SettingsError::WrongType {
          key: key.clone(),
          expected: "text",
        })?;
        if options.iter().any(|o| o.value == text) {
          Ok(())
        } else {
          Err(SettingsError::UnknownOption {
            key,
            allowed: options
              .iter()
              .map(|o| o.value)
              .collect::<Vec<_>>()
              .join(", "),
          })
        }
      }
    }
  }

  /// Parse command-line text into a value of this setting's type.
  pub fn parse(&self, raw: &str) -> Result<SettingValue, SettingsError> {
    let value = match &self.kind {
      SettingKind::Checkbox => match raw.trim().to_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => SettingValue::Bool(true),
        "false" | "off" | "no" | "0" => SettingValue::Bool(false),
        _ => {
          return Err(SettingsError::WrongType {
            key: self.key.to_string(),
            expected: "boolean",
          })
        }
      },
      SettingKind::Range { .. } => {
        SettingValue::Number(raw.trim().parse().map_err(|_| SettingsError::WrongType {
          key: self.key.to_string(),
          expected: "number",
        })?)
      }
      SettingKind::Select { .. } => SettingValue::Text(raw.trim().to_string()),
    };
    self.validate(&value)?;
    Ok(value)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SettingGroup {
  pub name: &'static str,
  pub settings: Vec<SettingDefinition>,
}

/// All known settings, in display order.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsLayout {
  pub groups: Vec<SettingGroup>,
}

const BEHAVIOR_OPTIONS: [SelectOption; 2] = [
  SelectOption {
    value: "directly",
    label: "Open directly",
  },
  SelectOption {
    value: "manually",
    label: "Open manually",
  },
];

fn checkbox(key: &'static str, label: &'static str, help: &'static str) -> SettingDefinition {
  SettingDefinition {
    key,
    label,
    help,
    kind: SettingKind::Checkbox,
    default: SettingValue::Bool(true),
    hidden: false,
  }
}

fn behavior(
  key: &'static str,
  label: &'static str,
  help: &'static str,
  default: &'static str,
) -> SettingDefinition {
  SettingDefinition {
    key,
    label,
    help,
    kind: SettingKind::Select {
      options: BEHAVIOR_OPTIONS.to_vec(),
    },
    default: SettingValue::Text(default.to_string()),
    hidden: false,
  }
}

impl SettingsLayout {
  /// The presentation's settings.
  pub fn standard() -> Self {
    Self {
      groups: vec![
        SettingGroup {
          name: "Gallery",
          settings: vec![
            SettingDefinition {
              key: "galleryZoom",
              label: "Images per row",
              help: "How many images the gallery shows in one row.",
              kind: SettingKind::Range {
                min: 2.0,
                max: 8.0,
                step: 1.0,
              },
              default: SettingValue::Number(4.0),
              hidden: false,
            },
            checkbox(
              "showBorders",
              "Show image borders",
              "Draw a border around gallery images.",
            ),
            checkbox(
              "showObservedTag",
              "Show observed tag",
              "Tag images of species that have observations.",
            ),
            checkbox(
              "showBirdNames",
              "Show species names",
              "Print the species name below each gallery image.",
            ),
          ],
        },
        SettingGroup {
          name: "Map",
          settings: vec![checkbox(
            "showMapVisitedMarkers",
            "Show visited observations",
            "Keep markers of already visited observations on the map.",
          )],
        },
        SettingGroup {
          name: "Presentation",
          settings: vec![
            behavior(
              "fullscreenGalleryGalleryBehavior",
              "Fullscreen gallery (gallery view)",
              "Whether the fullscreen gallery opens when the presentation starts.",
              "directly",
            ),
            behavior(
              "fullscreenGalleryMapBehavior",
              "Fullscreen gallery (map view)",
              "Whether the fullscreen gallery opens when switching to the map.",
              "manually",
            ),
            checkbox(
              "includeObservationImagesInGallery",
              "Include observation images",
              "Add observation photos to the presentation gallery.",
            ),
          ],
        },
      ],
    }
  }

  pub fn definitions(&self) -> impl Iterator<Item = &SettingDefinition> {
    self.groups.iter().flat_map(|g| g.settings.iter())
  }

  pub fn find(&self, key: &str) -> Option<&SettingDefinition> {
    self.definitions().find(|d| d.key == key)
  }

  pub fn defaults(&self) -> Settings {
    Settings {
      values: self
        .definitions()
        .map(|d| (d.key.to_string(), d.default.clone()))
        .collect(),
    }
  }
}

/// Current value of every setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings {
  values: BTreeMap<String, SettingValue>,
}

impl Settings {
  /// Merge stored values over the defaults; unknown or invalid entries are
  /// dropped.
  pub fn from_stored(layout: &SettingsLayout, stored: BTreeMap<String, Value>) -> Self {
    let mut settings = layout.defaults();
    for (key, raw) in stored {
      let Some(definition) = layout.find(&key) else {
        continue;
      };
      let Ok(value) = serde_json::from_value::<SettingValue>(raw) else {
        continue;
      };
      if definition.validate(&value).is_ok() {
        settings.values.insert(key, value);
      }
    }
    settings
  }

  pub fn get(&self, key: &str) -> Option<&SettingValue> {
    self.values.get(key)
  }

  pub fn get_bool(&self, key: &str) -> Option<bool> {
    self.get(key).and_then(SettingValue::as_bool)
  }

  pub fn get_number(&self, key: &str) -> Option<f64> {
    self.get(key).and_then(SettingValue::as_number)
  }

  pub fn get_text(&self, key: &str) -> Option<&str> {
    self.get(key).and_then(SettingValue::as_text)
  }

  pub fn set(
    &mut self,
    layout: &SettingsLayout,
    key: &str,
    value: SettingValue,
  ) -> Result<(), SettingsError> {
    let definition = layout
      .find(key)
      .ok_or_else(|| SettingsError::UnknownKey(key.to_string()))?;
    definition.validate(&value)?;
    self.values.insert(key.to_string(), value);
    Ok(())
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingValue)> {
    self.values.iter().map(|(k, v)| (k.as_str(), v))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_defaults() {
    let layout = SettingsLayout::standard();
    let settings = layout.defaults();
    assert_eq!(settings.get_number("galleryZoom"), Some(4.0));
    assert_eq!(settings.get_bool("showBorders"), Some(true));
    assert_eq!(
      settings.get_text("fullscreenGalleryMapBehavior"),
      Some("manually")
    );
    assert_eq!(settings.iter().count(), 8);
  }

  #[test]
  fn test_defaults_are_valid() {
    let layout = SettingsLayout::standard();
    for definition in layout.definitions() {
      definition.validate(&definition.default).unwrap();
    }
  }

  #[test]
  fn test_set_validates() {
    let layout = SettingsLayout::standard();
    let mut settings = layout.defaults();

    settings
      .set(&layout, "galleryZoom", SettingValue::Number(6.0))
      .unwrap();
    assert_eq!(settings.get_number("galleryZoom"), Some(6.0));

    assert!(matches!(
      settings.set(&layout, "galleryZoom", SettingValue::Number(9.0)),
      Err(SettingsError::OutOfRange { .. })
    ));
    assert!(matches!(
      settings.set(&layout, "galleryZoom", SettingValue::Number(3.5)),
      Err(SettingsError::OffStep { .. })
    ));
    assert!(matches!(
      settings.set(&layout, "showBorders", SettingValue::Number(1.0)),
      Err(SettingsError::WrongType { .. })
    ));
    assert!(matches!(
      settings.set(
        &layout,
        "fullscreenGalleryGalleryBehavior",
        SettingValue::Text("sometimes".to_string())
      ),
      Err(SettingsError::UnknownOption { .. })
    ));
    assert_eq!(
      settings.set(&layout, "theme", SettingValue::Bool(true)),
      Err(SettingsError::UnknownKey("theme".to_string()))
    );
  }

  #[test]
  fn test_parse_from_text() {
    let layout = SettingsLayout::standard();
    let zoom = layout.find("galleryZoom").unwrap();
    assert_eq!(zoom.parse("5").unwrap(), SettingValue::Number(5.0));
    assert!(zoom.parse("five").is_err());

    let borders = layout.find("showBorders").unwrap();
    assert_eq!(borders.parse("off").unwrap(), SettingValue::Bool(false));
  }

  #[test]
  fn test_from_stored_merges_and_drops() {
    let layout = SettingsLayout::standard();
    let stored: BTreeMap<String, Value> = [
      ("galleryZoom".to_string(), json!(3)),
      ("showBorders".to_string(), json!("yes")),
      ("legacyKey".to_string(), json!(true)),
    ]
    .into_iter()
    .collect();

    let settings = Settings::from_stored(&layout, stored);
    assert_eq!(settings.get_number("galleryZoom"), Some(3.0));
    assert_eq!(settings.get_bool("showBorders"), Some(true));
    assert!(settings.get("legacyKey").is_none());
  }

  #[test]
  fn test_serializes_as_flat_map() {
    let settings = SettingsLayout::standard().defaults();
    let value = serde_json::to_value(&settings).unwrap();
    assert_eq!(value["galleryZoom"], json!(4.0));
    assert_eq!(value["fullscreenGalleryGalleryBehavior"], json!("directly"));
  }
}
