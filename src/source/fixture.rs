//! Provider serving static JSON, for offline and demo use.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::birds::{BirdImage, BirdObservation, BirdSpecies};
use crate::error::{DataError, Result};

use super::transport::FileUpload;
use super::BirdProvider;

const BUNDLED_SPECIES: &str = include_str!("../../assets/species.json");
const BUNDLED_OBSERVATIONS: &str = include_str!("../../assets/observations.json");

#[derive(Deserialize)]
struct SpeciesFile {
  species: Vec<BirdSpecies>,
}

#[derive(Deserialize)]
struct ObservationsFile {
  observations: Vec<BirdObservation>,
}

/// Read-only provider over a fixed data set.
///
/// Mutations are never forwarded here by `BirdData`; calling them directly
/// fails with [`DataError::ReadOnly`].
#[derive(Debug, Clone, Default)]
pub struct FixtureProvider {
  species: Vec<BirdSpecies>,
  observations: Vec<BirdObservation>,
}

impl FixtureProvider {
  pub fn new(species: Vec<BirdSpecies>, observations: Vec<BirdObservation>) -> Self {
    Self {
      species,
      observations,
    }
  }

  /// The data set compiled into the binary.
  pub fn bundled() -> Result<Self> {
    Self::from_json(BUNDLED_SPECIES, BUNDLED_OBSERVATIONS)
  }

  /// Parse `{"species": [...]}` and `{"observations": [...]}` documents.
  pub fn from_json(species_json: &str, observations_json: &str) -> Result<Self> {
    let species: SpeciesFile = serde_json::from_str(species_json)
      .map_err(|e| DataError::Fixture(format!("species: {}", e)))?;
    let observations: ObservationsFile = serde_json::from_str(observations_json)
      .map_err(|e| DataError::Fixture(format!("observations: {}", e)))?;

    Ok(Self::new(species.species, observations.observations))
  }

  pub fn from_paths(species_path: &Path, observations_path: &Path) -> Result<Self> {
    let read = |path: &Path| {
      std::fs::read_to_string(path)
        .map_err(|e| DataError::Fixture(format!("{}: {}", path.display(), e)))
    };
    let provider = Self::from_json(&read(species_path)?, &read(observations_path)?)?;
    info!(
      species = provider.species.len(),
      observations = provider.observations.len(),
      "fixture data loaded"
    );
    Ok(provider)
  }
}

#[async_trait]
impl BirdProvider for FixtureProvider {
  fn name(&self) -> &'static str {
    "fixture"
  }

  fn is_read_only(&self) -> bool {
    true
  }

  async fn fetch_species(&self) -> Result<Vec<BirdSpecies>> {
    Ok(self.species.clone())
  }

  async fn fetch_observations(&self) -> Result<Vec<BirdObservation>> {
    Ok(self.observations.clone())
  }

  async fn save_species(&self, _species: &BirdSpecies) -> Result<()> {
    Err(DataError::ReadOnly {
      operation: "save_species",
    })
  }

  async fn save_observation(&self, _observation: &BirdObservation) -> Result<()> {
    Err(DataError::ReadOnly {
      operation: "save_observation",
    })
  }

  async fn delete_species(&self, _species_id: &str) -> Result<()> {
    Err(DataError::ReadOnly {
      operation: "delete_species",
    })
  }

  async fn delete_observation(&self, _observation_id: &str) -> Result<()> {
    Err(DataError::ReadOnly {
      operation: "delete_observation",
    })
  }

  async fn upload_image(&self, _file: FileUpload) -> Result<BirdImage> {
    Err(DataError::ReadOnly {
      operation: "upload_image",
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::source::{BirdData, DataOptions, MutationOutcome, ReadOnlyPolicy};
  use std::collections::HashSet;
  use std::sync::Arc;

  #[test]
  fn test_bundled_data_is_valid() {
    let provider = FixtureProvider::bundled().unwrap();
    assert!(!provider.species.is_empty());

    let species_ids: HashSet<&str> = provider.species.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(species_ids.len(), provider.species.len());
    let observation_ids: HashSet<&str> =
      provider.observations.iter().map(|o| o.id.as_str()).collect();
    assert_eq!(observation_ids.len(), provider.observations.len());
    for species in &provider.species {
      species.validate().unwrap();
    }
    for observation in &provider.observations {
      observation.validate().unwrap();
      assert!(provider
        .species
        .iter()
        .any(|s| s.id == observation.species_id));
    }
  }

  #[test]
  fn test_bad_json_is_fixture_error() {
    let err = FixtureProvider::from_json("{}", r#"{"observations": []}"#).unwrap_err();
    assert!(matches!(err, DataError::Fixture(msg) if msg.starts_with("species")));
  }

  #[test]
  fn test_from_paths() {
    let dir = tempfile::tempdir().unwrap();
    let species = dir.path().join("species.json");
    let observations = dir.path().join("observations.json");
    std::fs::write(&species, r#"{"species": []}"#).unwrap();
    std::fs::write(&observations, r#"{"observations": []}"#).unwrap();

    let provider = FixtureProvider::from_paths(&species, &observations).unwrap();
    assert!(provider.species.is_empty());

    let missing = dir.path().join("missing.json");
    assert!(FixtureProvider::from_paths(&missing, &observations).is_err());
  }

  #[tokio::test]
  async fn test_save_is_a_visible_no_op() {
    let provider = FixtureProvider::bundled().unwrap();
    let before = provider.species.clone();
    let data = BirdData::new(Arc::new(provider), DataOptions::default());

    let mut changed = before[0].clone();
    changed.common_name = "Renamed".to_string();
    let outcome = data.save_bird_species(&changed).await.unwrap();

    assert_eq!(outcome, MutationOutcome::Ignored);
    assert_eq!(*data.get_bird_species().await.unwrap(), before);
  }

  #[tokio::test]
  async fn test_reject_policy_surfaces_read_only() {
    let data = BirdData::new(
      Arc::new(FixtureProvider::bundled().unwrap()),
      DataOptions {
        read_only_policy: ReadOnlyPolicy::Reject,
        ..DataOptions::default()
      },
    );

    let err = data.delete_bird_species("parus-major").await.unwrap_err();
    assert!(matches!(err, DataError::ReadOnly { .. }));
    assert!(data.species_exists("parus-major").await.unwrap());
  }

  #[tokio::test]
  async fn test_derived_queries_over_fixture() {
    let data = BirdData::new(
      Arc::new(FixtureProvider::bundled().unwrap()),
      DataOptions::default(),
    );

    assert_eq!(data.get_species_count().await.unwrap(), 3);
    assert!(data.species_has_observations("parus-major").await.unwrap());
    assert!(!data
      .species_has_observations("streptopelia-turtur")
      .await
      .unwrap());
    let by_id = data
      .get_bird_species_by_id("erithacus-rubecula")
      .await
      .unwrap()
      .unwrap();
    assert_eq!(by_id.common_name, "European Robin");
  }
}
