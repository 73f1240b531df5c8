//! Glyphs: recognized or candidate connected shapes.

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect};
use crate::shape::Shape;
use crate::system::SystemId;

/// Stable identity of a glyph within its sheet's registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GlyphId(pub u32);

/// A connected ink shape extracted from the sheet.
///
/// Identity and geometry are fixed at registration; the shape label,
/// its confidence grade, and the pitch position evolve as recognition
/// progresses. Glyphs are owned by the sheet-wide [`GlyphRegistry`]
/// (systems hold non-owning [`GlyphId`] references) and are *retired*
/// rather than destroyed when fused into a compound, preserving
/// traceability of what each compound was built from.
///
/// [`GlyphRegistry`]: crate::registry::GlyphRegistry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Glyph {
    id: GlyphId,
    bounds: Rect,
    centroid: Point,
    /// Ink weight: the number of foreground pixels.
    weight: u32,
    shape: Option<Shape>,
    grade: f64,
    manual: bool,
    pitch_position: Option<f64>,
    system: Option<SystemId>,
    active: bool,
    parts: Vec<GlyphId>,
}

impl Glyph {
    pub(crate) const fn new(id: GlyphId, bounds: Rect, centroid: Point, weight: u32) -> Self {
        Self {
            id,
            bounds,
            centroid,
            weight,
            shape: None,
            grade: 0.0,
            manual: false,
            pitch_position: None,
            system: None,
            active: true,
            parts: Vec::new(),
        }
    }

    /// Registry identity.
    #[must_use]
    pub const fn id(&self) -> GlyphId {
        self.id
    }

    /// Bounding box in pixels.
    #[must_use]
    pub const fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Ink centroid in pixels.
    #[must_use]
    pub const fn centroid(&self) -> Point {
        self.centroid
    }

    /// Number of foreground pixels.
    #[must_use]
    pub const fn weight(&self) -> u32 {
        self.weight
    }

    /// Current shape label, if any.
    #[must_use]
    pub const fn shape(&self) -> Option<Shape> {
        self.shape
    }

    /// Confidence of the current shape label.
    #[must_use]
    pub const fn grade(&self) -> f64 {
        self.grade
    }

    /// Whether the shape was assigned by hand (and must not be
    /// overridden by automatic recognition).
    #[must_use]
    pub const fn is_manual_shape(&self) -> bool {
        self.manual
    }

    /// Staff-relative vertical position of the centroid, in half
    /// interlines: 0 on the staff midline, negative above.
    #[must_use]
    pub const fn pitch_position(&self) -> Option<f64> {
        self.pitch_position
    }

    /// The system this glyph belongs to (0 or 1 memberships).
    #[must_use]
    pub const fn system(&self) -> Option<SystemId> {
        self.system
    }

    /// Whether the glyph is still live (not fused into a compound).
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Constituent glyphs, for compounds; empty otherwise.
    #[must_use]
    pub fn parts(&self) -> &[GlyphId] {
        &self.parts
    }

    /// Assign a shape with its confidence grade.
    pub const fn set_shape(&mut self, shape: Option<Shape>, grade: f64) {
        self.shape = shape;
        self.grade = grade;
    }

    /// Assign a shape by hand; manual shapes survive re-recognition.
    pub const fn set_manual_shape(&mut self, shape: Shape) {
        self.shape = Some(shape);
        self.grade = 1.0;
        self.manual = true;
    }

    /// Record the staff-relative pitch position.
    pub const fn set_pitch_position(&mut self, pitch: f64) {
        self.pitch_position = Some(pitch);
    }

    pub(crate) const fn set_system(&mut self, system: Option<SystemId>) {
        self.system = system;
    }

    pub(crate) fn set_parts(&mut self, parts: Vec<GlyphId>) {
        self.parts = parts;
    }

    pub(crate) const fn retire(&mut self) {
        self.active = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyph(id: u32) -> Glyph {
        Glyph::new(
            GlyphId(id),
            Rect::new(0.0, 0.0, 4.0, 4.0),
            Point::new(2.0, 2.0),
            9,
        )
    }

    #[test]
    fn fresh_glyph_is_active_and_unclassified() {
        let g = glyph(1);
        assert!(g.is_active());
        assert_eq!(g.shape(), None);
        assert_eq!(g.system(), None);
        assert!(g.parts().is_empty());
    }

    #[test]
    fn set_shape_records_grade() {
        let mut g = glyph(1);
        g.set_shape(Some(Shape::Dot), 0.7);
        assert_eq!(g.shape(), Some(Shape::Dot));
        assert!((g.grade() - 0.7).abs() < f64::EPSILON);
        assert!(!g.is_manual_shape());
    }

    #[test]
    fn manual_shape_is_flagged() {
        let mut g = glyph(1);
        g.set_manual_shape(Shape::Barline);
        assert!(g.is_manual_shape());
        assert!((g.grade() - 1.0).abs() < f64::EPSILON);
    }
}
