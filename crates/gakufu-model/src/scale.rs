//! Sheet scale: the measured interline distance.
//!
//! Most detection tolerances are expressed as fractions of the
//! interline (the distance between two adjacent staff lines) so that
//! the same constants work at any scan resolution. [`Scale`] converts
//! those fractions into pixel distances. It is read-only once the
//! scale step has completed.

use serde::{Deserialize, Serialize};

/// A distance expressed as a fraction of the sheet interline.
///
/// The unit-independent form of every tolerance constant: a detector
/// saying "the two dots must be within 0.25 interline horizontally"
/// stores `InterlineFraction(0.25)` and lets [`Scale::to_pixels`]
/// resolve it against the sheet at hand.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterlineFraction(pub f64);

/// Per-sheet linear unit, measured by the scale step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scale {
    /// Modal distance from one staff-line center to the next, in pixels.
    interline: f64,
    /// Modal staff-line thickness, in pixels.
    line_thickness: f64,
}

impl Scale {
    /// Create a scale from measured interline and line thickness.
    #[must_use]
    pub const fn new(interline: f64, line_thickness: f64) -> Self {
        Self {
            interline,
            line_thickness,
        }
    }

    /// The interline distance in pixels.
    #[must_use]
    pub const fn interline(&self) -> f64 {
        self.interline
    }

    /// The staff-line thickness in pixels.
    #[must_use]
    pub const fn line_thickness(&self) -> f64 {
        self.line_thickness
    }

    /// Convert an interline fraction into a pixel distance.
    #[must_use]
    pub fn to_pixels(&self, fraction: InterlineFraction) -> f64 {
        fraction.0 * self.interline
    }
}
