//! Data sources for species and observations.
//!
//! A provider implements the minimal [`BirdProvider`] capability set.
//! [`BirdData`] wraps any provider, owns the collection caches, and offers
//! the derived queries and cache-invalidating mutations on top of it.

mod data;
pub mod fixture;
pub mod remote;
pub mod transport;

use async_trait::async_trait;

use crate::birds::{BirdImage, BirdObservation, BirdSpecies};
use crate::error::Result;

pub use data::{BirdData, DataOptions, MutationOutcome, ReadOnlyPolicy, SpeciesDeletePolicy};
pub use fixture::FixtureProvider;
pub use remote::RemoteProvider;
pub use transport::{ApiRequest, EditKey, FileUpload, HttpTransport, Transport};

/// Answer of an optional server-side query.
#[derive(Debug, Clone, PartialEq)]
pub enum Shortcut<T> {
  /// The provider has no dedicated endpoint; compute it client-side
  Unsupported,
  Answered(T),
}

/// Capabilities every data source must provide.
#[async_trait]
pub trait BirdProvider: Send + Sync {
  /// Short name used in log output
  fn name(&self) -> &'static str;

  /// Read-only providers never receive mutation calls from [`BirdData`].
  fn is_read_only(&self) -> bool {
    false
  }

  async fn fetch_species(&self) -> Result<Vec<BirdSpecies>>;

  async fn fetch_observations(&self) -> Result<Vec<BirdObservation>>;

  /// Create or update by id.
  async fn save_species(&self, species: &BirdSpecies) -> Result<()>;

  /// Create or update by id.
  async fn save_observation(&self, observation: &BirdObservation) -> Result<()>;

  async fn delete_species(&self, species_id: &str) -> Result<()>;

  async fn delete_observation(&self, observation_id: &str) -> Result<()>;

  /// Store an image file and describe it as a [`BirdImage`].
  async fn upload_image(&self, file: FileUpload) -> Result<BirdImage>;

  async fn server_species_by_id(&self, _species_id: &str) -> Result<Shortcut<Option<BirdSpecies>>> {
    Ok(Shortcut::Unsupported)
  }

  async fn server_species_has_observations(&self, _species_id: &str) -> Result<Shortcut<bool>> {
    Ok(Shortcut::Unsupported)
  }

  async fn server_species_count(&self) -> Result<Shortcut<usize>> {
    Ok(Shortcut::Unsupported)
  }

  async fn server_observation_count(&self) -> Result<Shortcut<usize>> {
    Ok(Shortcut::Unsupported)
  }

  async fn server_observations_by_species(
    &self,
    _species_id: &str,
  ) -> Result<Shortcut<Vec<BirdObservation>>> {
    Ok(Shortcut::Unsupported)
  }
}
