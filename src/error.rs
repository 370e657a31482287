//! Error types for the bird data access layer.

use thiserror::Error;

/// Failure raised by a transport, provider or the data layer itself.
///
/// Values are `Clone` so that a single failed fetch can be handed to every
/// caller that joined it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DataError {
  /// The request never reached the server (connection, DNS, TLS...).
  #[error("transport error: {0}")]
  Transport(String),

  /// The server answered with a non-success status.
  #[error("Request failed ({status}): {status_text}")]
  RequestFailed { status: u16, status_text: String },

  /// The response body could not be decoded into the expected shape.
  #[error("failed to decode response: {0}")]
  Decode(String),

  /// Bundled or on-disk fixture data could not be loaded.
  #[error("failed to load fixture: {0}")]
  Fixture(String),

  #[error(transparent)]
  Validation(#[from] ValidationError),

  /// A mutation was attempted against a read-only provider.
  #[error("{operation} rejected: data source is read-only")]
  ReadOnly { operation: &'static str },

  /// Species deletion refused because observations still reference it.
  #[error("species {species_id} still has {count} observation(s)")]
  SpeciesInUse { species_id: String, count: usize },
}

impl DataError {
  /// HTTP status for `RequestFailed`, `None` otherwise.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::RequestFailed { status, .. } => Some(*status),
      _ => None,
    }
  }
}

/// A model value that the backend would refuse.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
  pub field: &'static str,
  pub reason: String,
}

impl ValidationError {
  pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
    Self {
      field,
      reason: reason.into(),
    }
  }
}

pub type Result<T, E = DataError> = std::result::Result<T, E>;
