//! Domain types shared by every data source.
//!
//! Field names follow the backend's camelCase JSON so the same structs are
//! used on the wire and in memory.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

use super::fit::ImageFit;

/// IUCN red list category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConservationStatus {
  /// Least Concern
  #[default]
  Lc,
  /// Near Threatened
  Nt,
  /// Vulnerable
  Vu,
  /// Endangered
  En,
  /// Critically Endangered
  Cr,
  /// Extinct in the Wild
  Ew,
  /// Extinct
  Ex,
}

impl ConservationStatus {
  pub const ALL: [ConservationStatus; 7] = [
    Self::Lc,
    Self::Nt,
    Self::Vu,
    Self::En,
    Self::Cr,
    Self::Ew,
    Self::Ex,
  ];

  pub fn code(self) -> &'static str {
    match self {
      Self::Lc => "LC",
      Self::Nt => "NT",
      Self::Vu => "VU",
      Self::En => "EN",
      Self::Cr => "CR",
      Self::Ew => "EW",
      Self::Ex => "EX",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::Lc => "Least Concern",
      Self::Nt => "Near Threatened",
      Self::Vu => "Vulnerable",
      Self::En => "Endangered",
      Self::Cr => "Critically Endangered",
      Self::Ew => "Extinct in the Wild",
      Self::Ex => "Extinct",
    }
  }
}

/// An image with optional attribution and crop settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirdImage {
  pub url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub author: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub license: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fit: Option<ImageFit>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub width: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub height: Option<u32>,
}

impl BirdImage {
  pub fn new(url: impl Into<String>) -> Self {
    Self {
      url: url.into(),
      author: None,
      license: None,
      description: None,
      fit: None,
      width: None,
      height: None,
    }
  }

  /// Width over height, 1.0 when the intrinsic size is unknown.
  pub fn aspect_ratio(&self) -> f64 {
    match (self.width, self.height) {
      (Some(w), Some(h)) if w > 0 && h > 0 => f64::from(w) / f64::from(h),
      _ => 1.0,
    }
  }

  /// The stored fit, or the identity fit when none is set.
  pub fn effective_fit(&self) -> ImageFit {
    self.fit.unwrap_or_default()
  }

  /// Fetchable address of the image.
  ///
  /// Absolute urls are returned as stored. Relative upload paths are served
  /// by the backend's `/image/{file}` route, which resizes to `height` when
  /// one is given.
  pub fn resolve_url(&self, base_url: &str, height: Option<u32>) -> String {
    if self.url.starts_with("http") {
      return self.url.clone();
    }
    let path = match self.url.strip_prefix("/uploads/") {
      Some(file) => format!("/image/{}", file),
      None => self.url.clone(),
    };
    let mut resolved = format!("{}{}", base_url.trim_end_matches('/'), path);
    if let Some(h) = height {
      resolved.push_str(&format!("?h={}", h));
    }
    resolved
  }

  pub fn validate(&self) -> Result<(), ValidationError> {
    if !(self.url.starts_with('/') || self.url.starts_with("http")) {
      return Err(ValidationError::new(
        "image.url",
        format!(
          "'{}' must be relative (/uploads/...) or absolute (http...)",
          self.url
        ),
      ));
    }
    if let Some(fit) = &self.fit {
      fit.validate()?;
    }
    Ok(())
  }
}

/// Decimal-degree coordinates of a sighting.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
  pub latitude: f64,
  pub longitude: f64,
}

impl LatLng {
  pub fn validate(&self) -> Result<(), ValidationError> {
    if !(-90.0..=90.0).contains(&self.latitude) {
      return Err(ValidationError::new(
        "location.latitude",
        format!("{} is outside [-90, 90]", self.latitude),
      ));
    }
    if !(-180.0..=180.0).contains(&self.longitude) {
      return Err(ValidationError::new(
        "location.longitude",
        format!("{} is outside [-180, 180]", self.longitude),
      ));
    }
    Ok(())
  }
}

/// Sonogram image URLs of a birdsong recording.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sonogram {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub small: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub med: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub large: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub full: Option<String>,
}

/// Oscillogram image URLs of a birdsong recording.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oscillogram {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub small: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub med: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub large: Option<String>,
}

/// Metadata of a recording in the external birdsong archive.
///
/// Field names mirror the archive's own API, which is why they are terse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
  pub id: String,
  /// Genus
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub gen: Option<String>,
  /// Species epithet
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sp: Option<String>,
  /// Subspecies
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub ssp: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub grp: Option<String>,
  /// English name
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub en: Option<String>,
  /// Recordist
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rec: Option<String>,
  /// Country
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cnt: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub loc: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub lat: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub lon: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub alt: Option<String>,
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub kind: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sex: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub stage: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub method: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub url: Option<String>,
  /// Audio file URL
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub file: Option<String>,
  #[serde(rename = "file-name", default, skip_serializing_if = "Option::is_none")]
  pub file_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sono: Option<Sonogram>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub osci: Option<Oscillogram>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub lic: Option<String>,
  /// Quality rating, "A" (best) to "E"
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub q: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub length: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub time: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub date: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub uploaded: Option<String>,
  /// Other species audible in the background
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub also: Vec<String>,
  /// Remarks
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub rmk: Option<String>,
  #[serde(rename = "animal-seen", default, skip_serializing_if = "Option::is_none")]
  pub animal_seen: Option<String>,
  #[serde(rename = "playback-used", default, skip_serializing_if = "Option::is_none")]
  pub playback_used: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub temp: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub regnr: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub auto: Option<String>,
  /// Recording device
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub dvc: Option<String>,
  /// Microphone
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub mic: Option<String>,
  /// Sample rate
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub smp: Option<String>,
}

/// A bird species with its gallery images.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirdSpecies {
  pub id: String,
  pub common_name: String,
  pub scientific_name: String,
  pub family: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub conservation_status: Option<ConservationStatus>,
  #[serde(default)]
  pub images: Vec<BirdImage>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub recordings: Vec<Recording>,
}

impl BirdSpecies {
  /// New species whose id is the slug of its scientific name.
  pub fn new(
    common_name: impl Into<String>,
    scientific_name: impl Into<String>,
    family: impl Into<String>,
  ) -> Self {
    let scientific_name = scientific_name.into();
    Self {
      id: slugify(&scientific_name),
      common_name: common_name.into(),
      scientific_name,
      family: family.into(),
      conservation_status: None,
      images: Vec::new(),
      recordings: Vec::new(),
    }
  }

  /// Conservation status, treating a missing value as least concern.
  pub fn effective_status(&self) -> ConservationStatus {
    self.conservation_status.unwrap_or_default()
  }

  /// The first image is the gallery cover.
  pub fn cover_image(&self) -> Option<&BirdImage> {
    self.images.first()
  }

  pub fn validate(&self) -> Result<(), ValidationError> {
    if self.id.trim().is_empty() {
      return Err(ValidationError::new("id", "must not be empty"));
    }
    if self.common_name.trim().is_empty() {
      return Err(ValidationError::new("commonName", "must not be empty"));
    }
    if self.scientific_name.trim().is_empty() {
      return Err(ValidationError::new("scientificName", "must not be empty"));
    }
    self.images.iter().try_for_each(BirdImage::validate)
  }
}

/// A single sighting of a species.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BirdObservation {
  pub id: String,
  pub species_id: String,
  /// ISO 8601 date or datetime, kept as entered
  pub date: String,
  pub location: LatLng,
  pub observer: String,
  pub title: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub notes: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image: Option<BirdImage>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub recording: Option<Recording>,
  #[serde(default)]
  pub mystery: bool,
  #[serde(default = "default_true")]
  pub include_audio_in_marker: bool,
}

fn default_true() -> bool {
  true
}

impl BirdObservation {
  /// New observation with a freshly generated id.
  pub fn new(
    species_id: impl Into<String>,
    date: impl Into<String>,
    location: LatLng,
    observer: impl Into<String>,
    title: impl Into<String>,
  ) -> Self {
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      species_id: species_id.into(),
      date: date.into(),
      location,
      observer: observer.into(),
      title: title.into(),
      notes: None,
      image: None,
      recording: None,
      mystery: false,
      include_audio_in_marker: true,
    }
  }

  pub fn validate(&self) -> Result<(), ValidationError> {
    if self.id.trim().is_empty() {
      return Err(ValidationError::new("id", "must not be empty"));
    }
    if self.species_id.trim().is_empty() {
      return Err(ValidationError::new("speciesId", "must not be empty"));
    }
    if !is_iso_date(&self.date) {
      return Err(ValidationError::new(
        "date",
        format!("'{}' is not an ISO 8601 string", self.date),
      ));
    }
    self.location.validate()?;
    match &self.image {
      Some(image) => image.validate(),
      None => Ok(()),
    }
  }
}

/// Turn a scientific name into a species id: lowercase, and every run of
/// characters outside `[a-z0-9]` collapsed into one `-`.
pub fn slugify(name: &str) -> String {
  let mut slug = String::with_capacity(name.len());
  let mut in_gap = false;

  for c in name.chars().flat_map(char::to_lowercase) {
    if c.is_ascii_lowercase() || c.is_ascii_digit() {
      slug.push(c);
      in_gap = false;
    } else if !in_gap {
      slug.push('-');
      in_gap = true;
    }
  }

  slug
}

/// Accepts the forms the backend accepts: plain dates, naive datetimes and
/// offset datetimes (with `Z` standing for UTC).
pub fn is_iso_date(value: &str) -> bool {
  let value = value.replace('Z', "+00:00");

  DateTime::parse_from_rfc3339(&value).is_ok()
    || NaiveDateTime::parse_from_str(&value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
    || NaiveDateTime::parse_from_str(&value, "%Y-%m-%d %H:%M:%S%.f").is_ok()
    || NaiveDateTime::parse_from_str(&value, "%Y-%m-%dT%H:%M").is_ok()
    || NaiveDate::parse_from_str(&value, "%Y-%m-%d").is_ok()
}
