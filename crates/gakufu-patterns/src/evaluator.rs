//! Default heuristic shape evaluator.
//!
//! A stand-in for the trained glyph classifier, which lives outside
//! this workspace and is consumed through the
//! [`ShapeEvaluator`] seam. The heuristic grades a part group by how
//! densely its ink fills the union of its bounding boxes; fragmented
//! noise spread over a large area grades low, a tight cluster of real
//! symbol fragments grades high.

use gakufu_model::{Glyph, ShapeEvaluator, ShapeSet};

/// Ink-coverage grading heuristic.
#[derive(Debug, Default, Clone, Copy)]
pub struct CoverageEvaluator;

impl CoverageEvaluator {
    /// Create the evaluator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ShapeEvaluator for CoverageEvaluator {
    fn evaluate(&self, parts: &[&Glyph], _family: &ShapeSet) -> f64 {
        let Some(first) = parts.first() else {
            return 0.0;
        };
        let mut bounds = first.bounds();
        let mut weight = 0.0;
        for part in parts {
            bounds = bounds.union(&part.bounds());
            weight += f64::from(part.weight());
        }
        (weight / bounds.area().max(1.0)).clamp(0.0, 1.0)
    }
}
