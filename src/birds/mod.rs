pub mod api_types;
mod cache;
pub mod fit;
pub mod types;

pub use fit::{FitBounds, ImageFit};
pub use types::{
  slugify, BirdImage, BirdObservation, BirdSpecies, ConservationStatus, LatLng, Recording,
};
