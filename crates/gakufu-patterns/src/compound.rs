//! Generic compound building: fuse a cluster of primitive glyphs into
//! one recognized symbol.
//!
//! The engine is parameterized by a [`CompoundAdapter`], the single
//! extension point concrete detectors implement. The adapter supplies
//! the reference-geometry computation (where to look around a seed) and
//! the candidate-suitability policy (which neighbors may be absorbed);
//! the engine supplies everything else: assembly, grading through the
//! external classifier, and promotion.

use gakufu_model::{
    Glyph, GlyphId, GlyphRegistry, Point, Rect, Scale, ShapeEvaluator, ShapeSet, SystemInfo,
};

/// Errors raised by pattern runs.
///
/// These are programming-contract violations, fatal to the current
/// pattern run only; the pipeline and other systems are unaffected.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PatternError {
    /// [`CompoundAdapter::reference_box`] was invoked before any seed
    /// was supplied through [`CompoundAdapter::set_seed`].
    #[error("compound seed has not been set")]
    SeedNotSet,
}

/// The seed glyph's identity and geometry, handed to the adapter
/// before any reference-box computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedContext {
    /// The seed glyph.
    pub id: GlyphId,
    /// Its ink centroid.
    pub centroid: Point,
    /// Its bounding box.
    pub bounds: Rect,
}

/// Per-detector policy plugged into [`CompoundBuilder`].
pub trait CompoundAdapter {
    /// Record the seed the next [`reference_box`] call is anchored on.
    ///
    /// [`reference_box`]: Self::reference_box
    fn set_seed(&mut self, seed: SeedContext);

    /// The pixel region, anchored on the current seed, in which
    /// neighboring glyphs are gathered for the compound.
    ///
    /// # Errors
    ///
    /// [`PatternError::SeedNotSet`] when called before [`set_seed`].
    ///
    /// [`set_seed`]: Self::set_seed
    fn reference_box(&self) -> Result<Rect, PatternError>;

    /// The shape family the assembled group is graded against.
    fn target_family(&self) -> &ShapeSet;

    /// The minimum acceptable grade for promotion.
    fn min_grade(&self) -> f64;

    /// Whether a neighboring glyph may be absorbed into the compound.
    ///
    /// Default policy: accept any glyph that does not carry a manually
    /// assigned shape conflicting with the target family.
    fn is_candidate_suitable(&self, glyph: &Glyph) -> bool {
        !glyph.is_manual_shape()
            || glyph
                .shape()
                .is_some_and(|shape| self.target_family().contains(shape))
    }
}

/// The shape-agnostic compound building engine.
///
/// One builder serves a whole pattern pass: it carries the sheet
/// [`Scale`] (for adapters converting interline fractions) and the
/// external [`ShapeEvaluator`] the assembled groups are graded by.
pub struct CompoundBuilder<'a> {
    scale: Scale,
    evaluator: &'a dyn ShapeEvaluator,
}

impl<'a> CompoundBuilder<'a> {
    /// Create a builder for one sheet.
    #[must_use]
    pub const fn new(scale: Scale, evaluator: &'a dyn ShapeEvaluator) -> Self {
        Self { scale, evaluator }
    }

    /// The sheet scale.
    #[must_use]
    pub const fn scale(&self) -> Scale {
        self.scale
    }

    /// Attempt to build a compound around `seed`.
    ///
    /// Gathers every active glyph of the seed's system that intersects
    /// the adapter's reference box and passes its suitability policy,
    /// grades the group against the adapter's target family, and
    /// promotes it iff the grade meets the adapter's floor. On success
    /// the constituents are retired and replaced in the system's glyph
    /// set by the new compound, whose id is returned.
    ///
    /// Returns `Ok(None)` when the seed is gone (already fused by an
    /// earlier promotion), the group is rejected by the classifier, or
    /// the target family is empty.
    ///
    /// # Errors
    ///
    /// Propagates [`PatternError`] from the adapter; the system is
    /// left unchanged in that case.
    pub fn build_compound(
        &self,
        system: &mut SystemInfo,
        registry: &mut GlyphRegistry,
        seed: GlyphId,
        adapter: &mut dyn CompoundAdapter,
    ) -> Result<Option<GlyphId>, PatternError> {
        let Some(seed_glyph) = registry.get(seed).filter(|g| g.is_active()) else {
            return Ok(None);
        };
        adapter.set_seed(SeedContext {
            id: seed,
            centroid: seed_glyph.centroid(),
            bounds: seed_glyph.bounds(),
        });
        let reference = adapter.reference_box()?;

        // Parts are restricted to the seed's own system: a compound
        // never straddles two systems.
        let parts: Vec<GlyphId> = registry
            .intersecting(reference)
            .into_iter()
            .filter(|&id| {
                registry.get(id).is_some_and(|glyph| {
                    glyph.is_active()
                        && glyph.system() == Some(system.id())
                        && (id == seed || adapter.is_candidate_suitable(glyph))
                })
            })
            .collect();
        if !parts.contains(&seed) {
            return Ok(None);
        }

        let members: Vec<&Glyph> = parts.iter().filter_map(|&id| registry.get(id)).collect();
        let grade = self.evaluator.evaluate(&members, adapter.target_family());
        drop(members);
        if grade < adapter.min_grade() {
            tracing::debug!(
                family = adapter.target_family().name(),
                grade,
                floor = adapter.min_grade(),
                "compound rejected"
            );
            return Ok(None);
        }

        let Some(shape) = adapter.target_family().representative() else {
            return Ok(None);
        };
        let Some(compound) = registry.promote_compound(&parts, shape, grade) else {
            return Ok(None);
        };
        system.replace_with_compound(registry, &parts, compound);
        tracing::debug!(
            family = adapter.target_family().name(),
            parts = parts.len(),
            grade,
            "compound promoted"
        );
        Ok(Some(compound))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gakufu_model::{Shape, SystemId};

    /// Evaluator returning a fixed grade, recording nothing.
    struct FixedGrade(f64);

    impl ShapeEvaluator for FixedGrade {
        fn evaluate(&self, _parts: &[&Glyph], _family: &ShapeSet) -> f64 {
            self.0
        }
    }

    /// Adapter gathering everything within `reach` pixels of the seed.
    struct BoxAdapter {
        reach: f64,
        seed: Option<SeedContext>,
    }

    impl BoxAdapter {
        const fn new(reach: f64) -> Self {
            Self { reach, seed: None }
        }
    }

    impl CompoundAdapter for BoxAdapter {
        fn set_seed(&mut self, seed: SeedContext) {
            self.seed = Some(seed);
        }

        fn reference_box(&self) -> Result<Rect, PatternError> {
            let seed = self.seed.ok_or(PatternError::SeedNotSet)?;
            let c = seed.centroid;
            Ok(Rect::new(
                c.x - self.reach,
                c.y - self.reach,
                2.0 * self.reach,
                2.0 * self.reach,
            ))
        }

        fn target_family(&self) -> &ShapeSet {
            &ShapeSet::BASS_CLEFS
        }

        fn min_grade(&self) -> f64 {
            0.5
        }
    }

    fn setup() -> (SystemInfo, GlyphRegistry, GlyphId, GlyphId) {
        let mut registry = GlyphRegistry::new();
        let mut system = SystemInfo::new(SystemId(0), 0.0, 100.0, vec![]);
        let a = registry.register(Rect::new(10.0, 10.0, 4.0, 4.0), Point::new(12.0, 12.0), 12);
        let b = registry.register(Rect::new(10.0, 20.0, 4.0, 4.0), Point::new(12.0, 22.0), 12);
        system.adopt(&mut registry, a);
        system.adopt(&mut registry, b);
        (system, registry, a, b)
    }

    #[test]
    fn reference_box_before_seed_is_contract_error() {
        let adapter = BoxAdapter::new(10.0);
        assert_eq!(adapter.reference_box(), Err(PatternError::SeedNotSet));
    }

    #[test]
    fn promotes_group_meeting_grade_floor() {
        let (mut system, mut registry, a, b) = setup();
        let evaluator = FixedGrade(0.9);
        let builder = CompoundBuilder::new(Scale::new(10.0, 2.0), &evaluator);
        let mut adapter = BoxAdapter::new(15.0);

        let compound = builder
            .build_compound(&mut system, &mut registry, a, &mut adapter)
            .unwrap()
            .unwrap();

        assert_eq!(system.glyphs().len(), 1);
        assert!(system.glyphs().contains(&compound));
        let glyph = registry.get(compound).unwrap();
        assert_eq!(glyph.shape(), Some(Shape::BassClef));
        assert_eq!(glyph.parts(), &[a, b]);
        assert!(!registry.get(a).unwrap().is_active());
        assert!(!registry.get(b).unwrap().is_active());
    }

    #[test]
    fn rejects_group_below_grade_floor() {
        let (mut system, mut registry, a, b) = setup();
        let evaluator = FixedGrade(0.1);
        let builder = CompoundBuilder::new(Scale::new(10.0, 2.0), &evaluator);
        let mut adapter = BoxAdapter::new(15.0);

        let outcome = builder
            .build_compound(&mut system, &mut registry, a, &mut adapter)
            .unwrap();

        assert_eq!(outcome, None);
        assert_eq!(system.glyphs().len(), 2);
        assert!(registry.get(a).unwrap().is_active());
        assert!(registry.get(b).unwrap().is_active());
    }

    #[test]
    fn retired_seed_is_a_no_op() {
        let (mut system, mut registry, a, _b) = setup();
        registry.retire(a);
        let evaluator = FixedGrade(0.9);
        let builder = CompoundBuilder::new(Scale::new(10.0, 2.0), &evaluator);
        let mut adapter = BoxAdapter::new(15.0);

        let outcome = builder
            .build_compound(&mut system, &mut registry, a, &mut adapter)
            .unwrap();
        assert_eq!(outcome, None);
    }

    #[test]
    fn manual_conflicting_shape_is_not_absorbed() {
        let (mut system, mut registry, a, b) = setup();
        registry.get_mut(b).unwrap().set_manual_shape(Shape::Barline);
        let evaluator = FixedGrade(0.9);
        let builder = CompoundBuilder::new(Scale::new(10.0, 2.0), &evaluator);
        let mut adapter = BoxAdapter::new(15.0);

        let compound = builder
            .build_compound(&mut system, &mut registry, a, &mut adapter)
            .unwrap()
            .unwrap();

        // Only the seed went in; the manual barline survived untouched.
        assert_eq!(registry.get(compound).unwrap().parts(), &[a]);
        assert!(registry.get(b).unwrap().is_active());
        assert!(system.glyphs().contains(&b));
    }

    #[test]
    fn glyphs_of_other_systems_are_ignored() {
        let (mut system, mut registry, a, _b) = setup();
        let mut other = SystemInfo::new(SystemId(1), 100.0, 200.0, vec![]);
        let foreign =
            registry.register(Rect::new(10.0, 14.0, 4.0, 4.0), Point::new(12.0, 16.0), 12);
        other.adopt(&mut registry, foreign);

        let evaluator = FixedGrade(0.9);
        let builder = CompoundBuilder::new(Scale::new(10.0, 2.0), &evaluator);
        let mut adapter = BoxAdapter::new(15.0);

        let compound = builder
            .build_compound(&mut system, &mut registry, a, &mut adapter)
            .unwrap()
            .unwrap();

        assert!(!registry.get(compound).unwrap().parts().contains(&foreign));
        assert!(registry.get(foreign).unwrap().is_active());
    }
}
