//! Shape labels, shape families, and the classifier seam.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::glyph::Glyph;

/// The shape label a glyph may carry once classified.
///
/// Deliberately small: only the shapes the built-in steps and the
/// pattern detectors actually produce. External classifiers plugged in
/// through [`ShapeEvaluator`] grade against [`ShapeSet`] families, so
/// adding a variant does not ripple through the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shape {
    /// A small round dot (augmentation dot, bass-clef dot, staccato).
    Dot,
    /// An F clef, possibly rebuilt from segmented parts.
    BassClef,
    /// A G clef.
    TrebleClef,
    /// A measure-separating vertical barline.
    Barline,
    /// A note stem.
    Stem,
    /// A filled notehead.
    NoteheadBlack,
    /// A short ledger dash outside the staff.
    Ledger,
    /// Anything recognized as non-musical ink.
    Clutter,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Dot => "dot",
            Self::BassClef => "bass-clef",
            Self::TrebleClef => "treble-clef",
            Self::Barline => "barline",
            Self::Stem => "stem",
            Self::NoteheadBlack => "notehead-black",
            Self::Ledger => "ledger",
            Self::Clutter => "clutter",
        };
        f.write_str(name)
    }
}

/// A named family of related shapes, used as a classification target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeSet {
    name: &'static str,
    shapes: &'static [Shape],
}

impl ShapeSet {
    /// The bass clef family.
    pub const BASS_CLEFS: Self = Self {
        name: "BassClefs",
        shapes: &[Shape::BassClef],
    };

    /// All clef shapes.
    pub const CLEFS: Self = Self {
        name: "Clefs",
        shapes: &[Shape::BassClef, Shape::TrebleClef],
    };

    /// Family name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// The member shapes.
    #[must_use]
    pub const fn shapes(&self) -> &'static [Shape] {
        self.shapes
    }

    /// Whether `shape` belongs to this family.
    #[must_use]
    pub fn contains(&self, shape: Shape) -> bool {
        self.shapes.contains(&shape)
    }

    /// The shape assigned to a compound promoted against this family.
    ///
    /// Families are never empty, but the signature stays total rather
    /// than panicking on a malformed constant.
    #[must_use]
    pub fn representative(&self) -> Option<Shape> {
        self.shapes.first().copied()
    }
}

/// Minimum acceptance grades for shape assignment.
///
/// A grade is a confidence in `[0, 1]`; a candidate whose grade falls
/// below the relevant floor is not promoted.
pub mod grades {
    /// Floor for clef compounds rebuilt by pattern detectors.
    pub const CLEF_MIN: f64 = 0.30;

    /// Floor for ordinary symbol assignment.
    pub const SYMBOL_MIN: f64 = 0.15;
}

/// External shape-classification capability.
///
/// The engine submits a group of glyphs and a target family; the
/// classifier answers with a confidence grade in `[0, 1]`. The trained
/// classifier itself is outside this workspace -- detectors and steps
/// only depend on this seam.
pub trait ShapeEvaluator: Send + Sync {
    /// Grade how plausibly `parts`, fused into one glyph, form a shape
    /// of `family`.
    fn evaluate(&self, parts: &[&Glyph], family: &ShapeSet) -> f64;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn family_membership() {
        assert!(ShapeSet::BASS_CLEFS.contains(Shape::BassClef));
        assert!(!ShapeSet::BASS_CLEFS.contains(Shape::TrebleClef));
        assert!(ShapeSet::CLEFS.contains(Shape::TrebleClef));
    }

    #[test]
    fn representative_is_first_member() {
        assert_eq!(ShapeSet::BASS_CLEFS.representative(), Some(Shape::BassClef));
        assert_eq!(ShapeSet::CLEFS.representative(), Some(Shape::BassClef));
    }

    #[test]
    fn shape_display_names() {
        assert_eq!(Shape::Dot.to_string(), "dot");
        assert_eq!(Shape::BassClef.to_string(), "bass-clef");
    }

    #[test]
    fn shape_serde_round_trip() {
        let json = serde_json::to_string(&Shape::Barline).unwrap();
        let back: Shape = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Shape::Barline);
    }
}
