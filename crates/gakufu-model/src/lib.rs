//! gakufu-model: glyph and system data model (sans-IO).
//!
//! The sheet-wide glyph registry, the vertical system regions that
//! partition a sheet, and the geometry/scale primitives shared by the
//! recognition pipeline and the pattern detectors. This crate knows
//! nothing about pipeline steps -- it only models what a sheet contains
//! once recognition has started populating it.

pub mod geometry;
pub mod glyph;
pub mod registry;
pub mod scale;
pub mod shape;
pub mod system;

pub use geometry::{Point, Rect};
pub use glyph::{Glyph, GlyphId};
pub use registry::GlyphRegistry;
pub use scale::{InterlineFraction, Scale};
pub use shape::{Shape, ShapeEvaluator, ShapeSet, grades};
pub use system::{StaffInfo, SystemId, SystemInfo, SystemScope};
