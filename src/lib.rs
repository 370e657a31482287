//! Data access for a bird-watching gallery: species, observations, images
//! and the client-local state around them.

pub mod birds;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod settings;
pub mod source;

pub use error::{DataError, Result, ValidationError};
