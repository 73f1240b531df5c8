//! Standard implementations of every step in the catalog.
//!
//! Each stage is a free function in its own module; [`StandardSteps`]
//! dispatches to them and implements [`StepImpl`] for the whole
//! catalog, so one instance can be registered for every step.

mod grid;
mod picture;
mod scale;
mod symbols;
mod translate;

use std::sync::Arc;

use gakufu_model::{ShapeEvaluator, SystemScope};
use gakufu_patterns::CoverageEvaluator;

use crate::config::StageConfig;
use crate::driver::{StepImpl, StepParam, StepRegistry};
use crate::error::StepError;
use crate::sheet::SheetBody;
use crate::step::Step;

impl StepRegistry {
    /// A registry with the built-in implementation behind every step.
    #[must_use]
    pub fn standard(config: StageConfig) -> Self {
        let mut registry = Self::empty();
        let steps: Arc<StandardSteps> = Arc::new(StandardSteps::new(config));
        for step in Step::ALL {
            registry.register(step, Arc::<StandardSteps>::clone(&steps));
        }
        registry
    }
}

/// The built-in recognition stages.
pub struct StandardSteps {
    config: StageConfig,
    evaluator: Arc<dyn ShapeEvaluator>,
}

impl StandardSteps {
    #[must_use]
    pub fn new(config: StageConfig) -> Self {
        Self::with_evaluator(config, Arc::new(CoverageEvaluator::new()))
    }

    /// Swaps in a different shape evaluator for the pattern step.
    #[must_use]
    pub fn with_evaluator(config: StageConfig, evaluator: Arc<dyn ShapeEvaluator>) -> Self {
        Self { config, evaluator }
    }
}

impl Default for StandardSteps {
    fn default() -> Self {
        Self::new(StageConfig::default())
    }
}

impl std::fmt::Debug for StandardSteps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StandardSteps")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StepImpl for StandardSteps {
    fn run(
        &self,
        step: Step,
        body: &mut SheetBody,
        param: &StepParam,
        scope: &SystemScope,
    ) -> Result<(), StepError> {
        // The steps up to system construction estimate whole-sheet
        // geometry. A restricted replay must keep that geometry, and
        // with it every out-of-scope system, exactly as it stands.
        if !scope.is_all() && step <= Step::Systems {
            tracing::debug!(%step, "whole-sheet step kept as-is under restricted scope");
            return Ok(());
        }
        match step {
            Step::Load => picture::load(body),
            Step::Scale => scale::estimate(body, &self.config),
            Step::Skew => grid::estimate_skew(body, &self.config),
            Step::Lines => grid::detect_lines(body, &self.config),
            Step::Horizontals => grid::detect_horizontals(body, &self.config),
            Step::Systems => grid::build_systems(body, &self.config),
            Step::Measures => symbols::detect_measures(body, &self.config, scope),
            Step::Symbols => symbols::extract_glyphs(body, &self.config, scope),
            Step::Verticals => symbols::tag_stems(body, &self.config, scope),
            Step::Patterns => translate::run_patterns(body, self.evaluator.as_ref(), scope),
            Step::Score => translate::build_summary(body),
            Step::Export => translate::export(body, param),
        }
    }
}
