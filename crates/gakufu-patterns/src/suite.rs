//! Pattern detectors and the per-system suite runner.

use gakufu_model::{GlyphRegistry, SystemInfo};

use crate::compound::{CompoundBuilder, PatternError};

/// One concrete pattern detector.
///
/// A detector scans a system's glyph set for a characteristic
/// configuration (its seeding and partner predicates) and asks the
/// [`CompoundBuilder`] to fuse each satisfying cluster. It reports how
/// many compounds a pass promoted, so callers can iterate to a fixed
/// point.
pub trait GlyphPattern {
    /// Detector name, for logging.
    fn name(&self) -> &'static str;

    /// Run one pass over the system, returning the number of
    /// successful promotions.
    ///
    /// # Errors
    ///
    /// Propagates the detector's [`PatternError`]; the failure aborts
    /// only this run, the system remains consistent.
    fn run_pattern(
        &self,
        system: &mut SystemInfo,
        registry: &mut GlyphRegistry,
        builder: &CompoundBuilder<'_>,
    ) -> Result<usize, PatternError>;
}

/// An ordered collection of detectors, run to a fixed point.
#[derive(Default)]
pub struct PatternSuite {
    patterns: Vec<Box<dyn GlyphPattern>>,
}

impl PatternSuite {
    /// An empty suite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard detector lineup.
    #[must_use]
    pub fn standard() -> Self {
        let mut suite = Self::new();
        suite.add(Box::new(crate::bass::BassClefPattern::new()));
        suite
    }

    /// Append a detector.
    pub fn add(&mut self, pattern: Box<dyn GlyphPattern>) {
        self.patterns.push(pattern);
    }

    /// Run every detector over `system`, repeating full passes until
    /// one promotes nothing. Returns the total promotion count.
    ///
    /// # Errors
    ///
    /// Stops at the first detector failure; promotions made by earlier
    /// passes are kept.
    pub fn run(
        &self,
        system: &mut SystemInfo,
        registry: &mut GlyphRegistry,
        builder: &CompoundBuilder<'_>,
    ) -> Result<usize, PatternError> {
        let mut total = 0;
        loop {
            let mut pass = 0;
            for pattern in &self.patterns {
                let successes = pattern.run_pattern(system, registry, builder)?;
                if successes > 0 {
                    tracing::debug!(
                        pattern = pattern.name(),
                        system = system.id().0,
                        successes,
                        "pattern pass"
                    );
                }
                pass += successes;
            }
            total += pass;
            if pass == 0 {
                return Ok(total);
            }
        }
    }
}
