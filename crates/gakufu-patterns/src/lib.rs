//! gakufu-patterns: compound glyph building and pattern detection.
//!
//! The generic two-phase engine lives in [`compound`]: phase 1 finds
//! candidate seed glyphs, phase 2 gathers the suitable neighbors inside
//! an adapter-supplied reference box, grades the group through the
//! external shape classifier, and promotes it into one compound glyph.
//! Concrete detectors ([`bass`]) supply only the seeding predicates and
//! a [`CompoundAdapter`]; the engine itself is shape-agnostic.

pub mod bass;
pub mod compound;
pub mod evaluator;
pub mod suite;

pub use bass::BassClefPattern;
pub use compound::{CompoundAdapter, CompoundBuilder, PatternError, SeedContext};
pub use evaluator::CoverageEvaluator;
pub use suite::{GlyphPattern, PatternSuite};
