//! Bass clef detection from segmented vertical two-dot patterns.
//!
//! A bass clef often comes out of symbol extraction as separate
//! fragments, but its two dots survive reliably: one around pitch -3,
//! one around pitch -1, vertically aligned on the same staff. This
//! detector seeds on the top dot, pairs it with a bottom dot, and asks
//! the compound engine to rebuild the clef from the neighborhood left
//! of and below the dots.

use gakufu_model::{
    GlyphId, GlyphRegistry, InterlineFraction, Point, Rect, Scale, Shape, ShapeSet, SystemInfo,
    grades,
};

use crate::compound::{CompoundAdapter, CompoundBuilder, PatternError, SeedContext};
use crate::suite::GlyphPattern;

/// Tolerance on the dot abscissa offset, as an interline fraction.
const MAX_DOT_DX: InterlineFraction = InterlineFraction(0.25);

/// Ordinate tolerance on a dot pitch position.
const MAX_DOT_PITCH_DY: f64 = 0.5;

/// Expected pitch of the top and bottom clef dots.
const TOP_DOT_PITCH: f64 = -3.0;
const BOTTOM_DOT_PITCH: f64 = -1.0;

/// Detector for segmented bass clefs.
#[derive(Debug, Default, Clone, Copy)]
pub struct BassClefPattern;

impl BassClefPattern {
    /// Create the detector.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

/// Whether a glyph is a dot near the given pitch position.
fn is_dot_near(registry: &GlyphRegistry, id: GlyphId, pitch: f64) -> bool {
    registry.get(id).is_some_and(|glyph| {
        glyph.is_active()
            && glyph.shape() == Some(Shape::Dot)
            && glyph
                .pitch_position()
                .is_some_and(|p| (p - pitch).abs() <= MAX_DOT_PITCH_DY)
    })
}

impl GlyphPattern for BassClefPattern {
    fn name(&self) -> &'static str {
        "bass"
    }

    fn run_pattern(
        &self,
        system: &mut SystemInfo,
        registry: &mut GlyphRegistry,
        builder: &CompoundBuilder<'_>,
    ) -> Result<usize, PatternError> {
        let mut successes = 0;
        let max_dot_dx = builder.scale().to_pixels(MAX_DOT_DX);
        let ids: Vec<GlyphId> = system.glyphs().iter().copied().collect();

        for &top in &ids {
            // Look for the top dot.
            if !is_dot_near(registry, top, TOP_DOT_PITCH) {
                continue;
            }
            let Some(top_centroid) = registry.get(top).map(gakufu_model::Glyph::centroid) else {
                continue;
            };
            let top_staff = system.staff_at(top_centroid);

            // Look for a bottom dot right underneath, on the same staff.
            // Every satisfying partner is attempted: partner uniqueness
            // is not assumed.
            for &bot in &ids {
                if bot == top || !is_dot_near(registry, bot, BOTTOM_DOT_PITCH) {
                    continue;
                }
                let Some(bot_centroid) = registry.get(bot).map(gakufu_model::Glyph::centroid)
                else {
                    continue;
                };
                if (bot_centroid.x - top_centroid.x).abs() > max_dot_dx {
                    continue;
                }
                if system.staff_at(bot_centroid) != top_staff {
                    continue;
                }

                tracing::debug!(top = top.0, bottom = bot.0, "got bass dots");
                let mut adapter = BassAdapter::new(builder.scale());
                if builder
                    .build_compound(system, registry, top, &mut adapter)?
                    .is_some()
                {
                    successes += 1;
                }
            }
        }

        Ok(successes)
    }
}

/// Compound adapter rebuilding bass clefs around a top-dot seed.
struct BassAdapter {
    scale: Scale,
    seed: Option<SeedContext>,
}

impl BassAdapter {
    const fn new(scale: Scale) -> Self {
        Self { scale, seed: None }
    }
}

impl CompoundAdapter for BassAdapter {
    fn set_seed(&mut self, seed: SeedContext) {
        self.seed = Some(seed);
    }

    fn reference_box(&self) -> Result<Rect, PatternError> {
        let seed = self.seed.ok_or(PatternError::SeedNotSet)?;
        let c = seed.centroid;
        let interline = self.scale.interline();
        // The clef body sits left of the dots and extends below them.
        Ok(Rect::at_point(c).stretched_to(Point::new(
            2.0f64.mul_add(-interline, c.x),
            3.0f64.mul_add(interline, c.y),
        )))
    }

    fn target_family(&self) -> &ShapeSet {
        &ShapeSet::BASS_CLEFS
    }

    fn min_grade(&self) -> f64 {
        grades::CLEF_MIN
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gakufu_model::{Glyph, ShapeEvaluator, StaffInfo, SystemId};

    struct FixedGrade(f64);

    impl ShapeEvaluator for FixedGrade {
        fn evaluate(&self, _parts: &[&Glyph], _family: &ShapeSet) -> f64 {
            self.0
        }
    }

    const INTERLINE: f64 = 10.0;

    /// One staff with lines at y = 100, 110, ..., 140 (midline 120).
    fn staff() -> StaffInfo {
        StaffInfo::new(vec![100.0, 110.0, 120.0, 130.0, 140.0])
    }

    fn dot(system: &mut SystemInfo, registry: &mut GlyphRegistry, x: f64, y: f64) -> GlyphId {
        let id = registry.register(
            Rect::new(x - 1.5, y - 1.5, 3.0, 3.0),
            Point::new(x, y),
            9,
        );
        let pitch = system.staves()[0].pitch_position(y);
        let glyph = registry.get_mut(id).unwrap();
        glyph.set_shape(Some(Shape::Dot), 0.8);
        glyph.set_pitch_position(pitch);
        system.adopt(registry, id);
        id
    }

    fn setup() -> (SystemInfo, GlyphRegistry) {
        (
            SystemInfo::new(SystemId(0), 50.0, 200.0, vec![staff()]),
            GlyphRegistry::new(),
        )
    }

    #[test]
    fn aligned_dot_pair_builds_one_compound() {
        let (mut system, mut registry) = setup();
        // Pitch -3 is y=105, pitch -1 is y=115.
        let top = dot(&mut system, &mut registry, 60.0, 105.0);
        let bot = dot(&mut system, &mut registry, 60.0, 115.0);

        let evaluator = FixedGrade(0.9);
        let builder = CompoundBuilder::new(Scale::new(INTERLINE, 1.0), &evaluator);
        let successes = BassClefPattern::new()
            .run_pattern(&mut system, &mut registry, &builder)
            .unwrap();

        assert_eq!(successes, 1);
        assert_eq!(system.glyphs().len(), 1);
        let compound_id = *system.glyphs().iter().next().unwrap();
        let compound = registry.get(compound_id).unwrap();
        assert_eq!(compound.shape(), Some(Shape::BassClef));
        assert_eq!(compound.parts(), &[top, bot]);
        assert!(!registry.get(top).unwrap().is_active());
        assert!(!registry.get(bot).unwrap().is_active());
    }

    #[test]
    fn horizontally_distant_partner_is_rejected() {
        let (mut system, mut registry) = setup();
        let top = dot(&mut system, &mut registry, 60.0, 105.0);
        // 0.25 interline = 2.5 px; this partner is 5 px off.
        let bot = dot(&mut system, &mut registry, 65.0, 115.0);

        let evaluator = FixedGrade(0.9);
        let builder = CompoundBuilder::new(Scale::new(INTERLINE, 1.0), &evaluator);
        let successes = BassClefPattern::new()
            .run_pattern(&mut system, &mut registry, &builder)
            .unwrap();

        assert_eq!(successes, 0);
        assert_eq!(system.glyphs().len(), 2);
        assert!(registry.get(top).unwrap().is_active());
        assert!(registry.get(bot).unwrap().is_active());
    }

    #[test]
    fn wrong_pitch_is_not_a_seed() {
        let (mut system, mut registry) = setup();
        // Both dots near the midline: neither matches pitch -3.
        dot(&mut system, &mut registry, 60.0, 119.0);
        dot(&mut system, &mut registry, 60.0, 121.0);

        let evaluator = FixedGrade(0.9);
        let builder = CompoundBuilder::new(Scale::new(INTERLINE, 1.0), &evaluator);
        let successes = BassClefPattern::new()
            .run_pattern(&mut system, &mut registry, &builder)
            .unwrap();
        assert_eq!(successes, 0);
    }

    #[test]
    fn classifier_rejection_leaves_originals() {
        let (mut system, mut registry) = setup();
        dot(&mut system, &mut registry, 60.0, 105.0);
        dot(&mut system, &mut registry, 60.0, 115.0);

        let evaluator = FixedGrade(0.0);
        let builder = CompoundBuilder::new(Scale::new(INTERLINE, 1.0), &evaluator);
        let successes = BassClefPattern::new()
            .run_pattern(&mut system, &mut registry, &builder)
            .unwrap();

        assert_eq!(successes, 0);
        assert_eq!(system.glyphs().len(), 2);
    }
}
