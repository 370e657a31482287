use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::birds::{BirdImage, BirdObservation, BirdSpecies};
use crate::cache::{find_by_key, CacheStatus, CollectionCache};
use crate::error::{DataError, Result, ValidationError};

use super::transport::FileUpload;
use super::{BirdProvider, Shortcut};

/// What a mutation against a read-only provider does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadOnlyPolicy {
  /// Log a warning and report [`MutationOutcome::Ignored`]
  #[default]
  Warn,
  /// Fail with [`DataError::ReadOnly`]
  Reject,
}

/// What happens to observations when their species is deleted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeciesDeletePolicy {
  /// Delete the species only; its observations keep a dangling `speciesId`
  #[default]
  Orphan,
  /// Delete the species' observations first
  Cascade,
  /// Refuse while any observation references the species
  Restrict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataOptions {
  pub read_only_policy: ReadOnlyPolicy,
  pub species_delete_policy: SpeciesDeletePolicy,
  /// Prefer dedicated backend endpoints for derived queries
  pub server_queries: bool,
}

/// Result of a mutation that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum MutationOutcome<T = ()> {
  Applied(T),
  /// Skipped because the provider is read-only
  Ignored,
}

impl<T> MutationOutcome<T> {
  pub fn is_applied(&self) -> bool {
    matches!(self, Self::Applied(_))
  }

  pub fn applied(self) -> Option<T> {
    match self {
      Self::Applied(value) => Some(value),
      Self::Ignored => None,
    }
  }
}

/// Session-scoped data access over one provider.
///
/// Owns one cache slot per collection. Reads are served from the cache;
/// each successful mutation invalidates the collection it touched.
pub struct BirdData<P: ?Sized> {
  provider: Arc<P>,
  species: CollectionCache<BirdSpecies>,
  observations: CollectionCache<BirdObservation>,
  options: DataOptions,
}

impl<P: BirdProvider + ?Sized + 'static> BirdData<P> {
  pub fn new(provider: Arc<P>, options: DataOptions) -> Self {
    info!(
      provider = provider.name(),
      read_only = provider.is_read_only(),
      "data source ready"
    );
    Self {
      provider,
      species: CollectionCache::new("species"),
      observations: CollectionCache::new("observations"),
      options,
    }
  }

  pub fn provider(&self) -> &P {
    &self.provider
  }

  pub fn options(&self) -> DataOptions {
    self.options
  }

  pub fn is_read_only(&self) -> bool {
    self.provider.is_read_only()
  }

  pub fn species_status(&self) -> CacheStatus {
    self.species.status()
  }

  pub fn observations_status(&self) -> CacheStatus {
    self.observations.status()
  }

  /// Reset both collections.
  pub fn clear_cache(&self) {
    self.species.invalidate();
    self.observations.invalidate();
  }

  // --------------------------------------------------------------------------
  // Reads
  // --------------------------------------------------------------------------

  pub async fn get_bird_species(&self) -> Result<Arc<Vec<BirdSpecies>>> {
    let provider = Arc::clone(&self.provider);
    self
      .species
      .get(move || async move { provider.fetch_species().await })
      .await
  }

  pub async fn get_bird_observations(&self) -> Result<Arc<Vec<BirdObservation>>> {
    let provider = Arc::clone(&self.provider);
    self
      .observations
      .get(move || async move { provider.fetch_observations().await })
      .await
  }

  /// Species with exactly this id, `None` when there is none.
  pub async fn get_bird_species_by_id(&self, species_id: &str) -> Result<Option<BirdSpecies>> {
    if self.options.server_queries {
      if let Shortcut::Answered(found) = self.provider.server_species_by_id(species_id).await? {
        return Ok(found);
      }
    }
    let species = self.get_bird_species().await?;
    Ok(find_by_key(&species, species_id).cloned())
  }

  /// Observations of one species, in collection order.
  pub async fn get_bird_observations_by_species_id(
    &self,
    species_id: &str,
  ) -> Result<Vec<BirdObservation>> {
    if self.options.server_queries {
      if let Shortcut::Answered(found) = self
        .provider
        .server_observations_by_species(species_id)
        .await?
      {
        return Ok(found);
      }
    }
    let observations = self.get_bird_observations().await?;
    Ok(
      observations
        .iter()
        .filter(|o| o.species_id == species_id)
        .cloned()
        .collect(),
    )
  }

  pub async fn species_has_observations(&self, species_id: &str) -> Result<bool> {
    if self.options.server_queries {
      if let Shortcut::Answered(answer) = self
        .provider
        .server_species_has_observations(species_id)
        .await?
      {
        return Ok(answer);
      }
    }
    let observations = self.get_bird_observations().await?;
    Ok(observations.iter().any(|o| o.species_id == species_id))
  }

  pub async fn species_exists(&self, species_id: &str) -> Result<bool> {
    let species = self.get_bird_species().await?;
    Ok(find_by_key(&species, species_id).is_some())
  }

  pub async fn get_species_count(&self) -> Result<usize> {
    if self.options.server_queries {
      if let Shortcut::Answered(count) = self.provider.server_species_count().await? {
        return Ok(count);
      }
    }
    Ok(self.get_bird_species().await?.len())
  }

  pub async fn get_observation_count(&self) -> Result<usize> {
    if self.options.server_queries {
      if let Shortcut::Answered(count) = self.provider.server_observation_count().await? {
        return Ok(count);
      }
    }
    Ok(self.get_bird_observations().await?.len())
  }

  // --------------------------------------------------------------------------
  // Mutations
  // --------------------------------------------------------------------------

  /// `Some(outcome)` when the provider is read-only and the call must stop.
  fn read_only_guard<T>(
    &self,
    operation: &'static str,
    target: &str,
  ) -> Result<Option<MutationOutcome<T>>> {
    if !self.provider.is_read_only() {
      return Ok(None);
    }
    match self.options.read_only_policy {
      ReadOnlyPolicy::Warn => {
        warn!(
          provider = self.provider.name(),
          operation,
          target,
          "mutation called on a read-only data source"
        );
        Ok(Some(MutationOutcome::Ignored))
      }
      ReadOnlyPolicy::Reject => Err(DataError::ReadOnly { operation }),
    }
  }

  pub async fn save_bird_species(&self, species: &BirdSpecies) -> Result<MutationOutcome> {
    species.validate()?;
    if let Some(outcome) = self.read_only_guard("save_bird_species", &species.id)? {
      return Ok(outcome);
    }

    info!(species_id = %species.id, "saving species");
    self.provider.save_species(species).await?;
    self.species.invalidate();
    Ok(MutationOutcome::Applied(()))
  }

  pub async fn save_bird_observation(
    &self,
    observation: &BirdObservation,
  ) -> Result<MutationOutcome> {
    observation.validate()?;
    if let Some(outcome) = self.read_only_guard("save_bird_observation", &observation.id)? {
      return Ok(outcome);
    }

    info!(observation_id = %observation.id, species_id = %observation.species_id, "saving observation");
    self.provider.save_observation(observation).await?;
    self.observations.invalidate();
    Ok(MutationOutcome::Applied(()))
  }

  /// Delete a species, handling its observations per [`SpeciesDeletePolicy`].
  pub async fn delete_bird_species(&self, species_id: &str) -> Result<MutationOutcome> {
    if let Some(outcome) = self.read_only_guard("delete_bird_species", species_id)? {
      return Ok(outcome);
    }

    match self.options.species_delete_policy {
      SpeciesDeletePolicy::Orphan => {}
      SpeciesDeletePolicy::Restrict => {
        let dependents = self.get_bird_observations_by_species_id(species_id).await?;
        if !dependents.is_empty() {
          return Err(DataError::SpeciesInUse {
            species_id: species_id.to_string(),
            count: dependents.len(),
          });
        }
      }
      SpeciesDeletePolicy::Cascade => {
        let dependents = self.get_bird_observations_by_species_id(species_id).await?;
        let mut result = Ok(());
        for observation in &dependents {
          info!(observation_id = %observation.id, species_id, "cascading delete");
          result = self.provider.delete_observation(&observation.id).await;
          if result.is_err() {
            break;
          }
        }
        if !dependents.is_empty() {
          self.observations.invalidate();
        }
        result?;
      }
    }

    info!(species_id, "deleting species");
    self.provider.delete_species(species_id).await?;
    self.species.invalidate();
    Ok(MutationOutcome::Applied(()))
  }

  pub async fn delete_bird_observation(&self, observation_id: &str) -> Result<MutationOutcome> {
    if let Some(outcome) = self.read_only_guard("delete_bird_observation", observation_id)? {
      return Ok(outcome);
    }

    info!(observation_id, "deleting observation");
    self.provider.delete_observation(observation_id).await?;
    self.observations.invalidate();
    Ok(MutationOutcome::Applied(()))
  }

  /// Upload an image; the returned [`BirdImage`] is not attached to anything.
  pub async fn upload_image(&self, file: FileUpload) -> Result<MutationOutcome<BirdImage>> {
    if let Some(outcome) = self.read_only_guard("upload_image", &file.file_name)? {
      return Ok(outcome);
    }
    if !file.content_type.starts_with("image/") {
      return Err(
        ValidationError::new(
          "contentType",
          format!("'{}' is not an image type", file.content_type),
        )
        .into(),
      );
    }

    info!(file = %file.file_name, "uploading image");
    let image = self.provider.upload_image(file).await?;
    Ok(MutationOutcome::Applied(image))
  }
}
