//! Crop and zoom transform for showing an image in a square or round frame.
//!
//! Offsets are normalized: `-1` pans fully left/up, `1` fully right/down.
//! The clamp keeps the scaled image covering the whole frame, with a small
//! gutter so panning does not feel stuck at the edge.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

const GUTTER: f64 = 0.002;
const ZOOM_INTENSITY: f64 = 0.0015;
const PAN_SENSITIVITY: f64 = 300.0;

pub const MIN_EDIT_SCALE: f64 = 1.0;
pub const MAX_EDIT_SCALE: f64 = 4.0;

/// Range the backend accepts for a stored scale.
pub const STORED_SCALE_RANGE: std::ops::RangeInclusive<f64> = 0.5..=5.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageFit {
  #[serde(default = "default_scale")]
  pub scale: f64,
  #[serde(default)]
  pub offset_x: f64,
  #[serde(default)]
  pub offset_y: f64,
}

fn default_scale() -> f64 {
  1.0
}

impl Default for ImageFit {
  fn default() -> Self {
    Self {
      scale: 1.0,
      offset_x: 0.0,
      offset_y: 0.0,
    }
  }
}

/// Largest allowed absolute offsets for one scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitBounds {
  pub max_offset_x: f64,
  pub max_offset_y: f64,
}

impl FitBounds {
  pub fn for_scale(scale: f64, aspect: f64) -> Self {
    let (width, height) = if aspect >= 1.0 {
      (aspect * scale, scale)
    } else {
      (scale, scale / aspect)
    };

    Self {
      max_offset_x: ((width - 1.0) / width + GUTTER).max(0.0),
      max_offset_y: ((height - 1.0) / height + GUTTER).max(0.0),
    }
  }
}

impl ImageFit {
  pub fn new(scale: f64, offset_x: f64, offset_y: f64) -> Self {
    Self {
      scale,
      offset_x,
      offset_y,
    }
  }

  /// Same scale, offsets pulled back inside the cover bounds for `aspect`.
  pub fn clamped(self, aspect: f64) -> Self {
    let bounds = FitBounds::for_scale(self.scale, aspect);
    Self {
      scale: self.scale,
      offset_x: self
        .offset_x
        .clamp(-bounds.max_offset_x, bounds.max_offset_x),
      offset_y: self
        .offset_y
        .clamp(-bounds.max_offset_y, bounds.max_offset_y),
    }
  }

  /// Wheel zoom: positive `delta_y` zooms out, negative zooms in.
  pub fn zoom_by_delta(self, delta_y: f64, aspect: f64) -> Self {
    let factor = (-delta_y * ZOOM_INTENSITY).exp();
    let scale = (self.scale * factor).clamp(MIN_EDIT_SCALE, MAX_EDIT_SCALE);
    Self { scale, ..self }.clamped(aspect)
  }

  /// Drag pan measured in screen pixels from `origin`.
  pub fn pan_from(origin: Self, dx_px: f64, dy_px: f64, aspect: f64) -> Self {
    Self {
      scale: origin.scale,
      offset_x: origin.offset_x + dx_px / PAN_SENSITIVITY,
      offset_y: origin.offset_y + dy_px / PAN_SENSITIVITY,
    }
    .clamped(aspect)
  }

  pub fn reset() -> Self {
    Self::default()
  }

  /// True when the offsets lie within the cover bounds.
  pub fn covers(&self, aspect: f64) -> bool {
    let bounds = FitBounds::for_scale(self.scale, aspect);
    self.offset_x.abs() <= bounds.max_offset_x && self.offset_y.abs() <= bounds.max_offset_y
  }

  pub fn validate(&self) -> Result<(), ValidationError> {
    if !STORED_SCALE_RANGE.contains(&self.scale) {
      return Err(ValidationError::new(
        "fit.scale",
        format!("{} is outside [0.5, 5]", self.scale),
      ));
    }
    for (field, value) in [("fit.offsetX", self.offset_x), ("fit.offsetY", self.offset_y)] {
      if !(-1.0..=1.0).contains(&value) {
        return Err(ValidationError::new(
          field,
          format!("{} is outside [-1, 1]", value),
        ));
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
  }

  #[test]
  fn test_square_unzoomed_has_only_gutter() {
    let bounds = FitBounds::for_scale(1.0, 1.0);
    assert!(approx(bounds.max_offset_x, GUTTER));
    assert!(approx(bounds.max_offset_y, GUTTER));
  }

  #[test]
  fn test_landscape_allows_horizontal_pan() {
    let bounds = FitBounds::for_scale(1.0, 2.0);
    assert!(approx(bounds.max_offset_x, 0.5 + GUTTER));
    assert!(approx(bounds.max_offset_y, GUTTER));
  }

  #[test]
  fn test_portrait_allows_vertical_pan() {
    let bounds = FitBounds::for_scale(2.0, 0.5);
    // width = 2, height = 4
    assert!(approx(bounds.max_offset_x, 0.5 + GUTTER));
    assert!(approx(bounds.max_offset_y, 0.75 + GUTTER));
  }

  #[test]
  fn test_clamp_pulls_offsets_in() {
    let fit = ImageFit::new(2.0, 0.9, -0.9).clamped(1.0);
    assert!(approx(fit.offset_x, 0.5 + GUTTER));
    assert!(approx(fit.offset_y, -(0.5 + GUTTER)));
    assert!(fit.covers(1.0));
  }

  #[test]
  fn test_zoom_is_bounded_and_reclamps() {
    let zoomed_in = ImageFit::default().zoom_by_delta(-10_000.0, 1.0);
    assert_eq!(zoomed_in.scale, MAX_EDIT_SCALE);

    let panned = ImageFit::new(MAX_EDIT_SCALE, 0.7, 0.0);
    let zoomed_out = panned.zoom_by_delta(10_000.0, 1.0);
    assert_eq!(zoomed_out.scale, MIN_EDIT_SCALE);
    assert!(approx(zoomed_out.offset_x, GUTTER));
  }

  #[test]
  fn test_zoom_step() {
    let fit = ImageFit::default().zoom_by_delta(-100.0, 1.0);
    assert!(approx(fit.scale, (0.15f64).exp()));
  }

  #[test]
  fn test_pan_uses_pixel_sensitivity() {
    let origin = ImageFit::new(2.0, 0.0, 0.0);
    let fit = ImageFit::pan_from(origin, 30.0, -60.0, 1.0);
    assert!(approx(fit.offset_x, 0.1));
    assert!(approx(fit.offset_y, -0.2));
  }

  #[test]
  fn test_validate_stored_ranges() {
    assert!(ImageFit::new(0.4, 0.0, 0.0).validate().is_err());
    assert!(ImageFit::new(1.0, 1.2, 0.0).validate().is_err());
    assert!(ImageFit::reset().validate().is_ok());
  }
}
