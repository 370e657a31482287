//! Caching implementations for bird types.

use crate::cache::Cacheable;

use super::types::{BirdObservation, BirdSpecies};

impl Cacheable for BirdSpecies {
  fn cache_key(&self) -> &str {
    &self.id
  }
}

impl Cacheable for BirdObservation {
  fn cache_key(&self) -> &str {
    &self.id
  }
}
