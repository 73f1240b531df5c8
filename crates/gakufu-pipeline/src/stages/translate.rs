//! Pattern reassembly, score summarization, and export.

use serde::Serialize;

use gakufu_model::{Shape, ShapeEvaluator, SystemScope};
use gakufu_patterns::{CompoundBuilder, PatternSuite};

use crate::driver::StepParam;
use crate::error::StepError;
use crate::log::StepLog;
use crate::sheet::{ScoreSummary, SheetBody, Skew, SystemSummary};

/// Runs the standard pattern suite to a fixed point in every in-scope
/// system.
///
/// # Errors
///
/// [`StepError::NoScale`], [`StepError::NoSystems`], or a
/// [`StepError::Pattern`] from a detector.
pub(super) fn run_patterns(
    body: &mut SheetBody,
    evaluator: &dyn ShapeEvaluator,
    scope: &SystemScope,
) -> Result<(), StepError> {
    let scale = body.scale.ok_or(StepError::NoScale)?;
    if body.systems.is_empty() {
        return Err(StepError::NoSystems);
    }
    let builder = CompoundBuilder::new(scale, evaluator);
    let suite = PatternSuite::standard();

    let mut promoted = 0usize;
    for index in 0..body.systems.len() {
        if !scope.includes(body.systems[index].id()) {
            continue;
        }
        promoted += suite.run(&mut body.systems[index], &mut body.glyphs, &builder)?;
    }
    tracing::info!(promoted, "pattern suite finished");
    Ok(())
}

/// Summarizes every system from its current glyphs and measure count.
/// The summary always covers the whole sheet; out-of-scope systems are
/// simply reported as they stand.
///
/// # Errors
///
/// [`StepError::NoSystems`].
pub(super) fn build_summary(body: &mut SheetBody) -> Result<(), StepError> {
    if body.systems.is_empty() {
        return Err(StepError::NoSystems);
    }
    let mut systems = Vec::with_capacity(body.systems.len());
    for (index, system) in body.systems.iter().enumerate() {
        let mut glyphs = 0usize;
        let mut clefs = 0usize;
        let mut dots = 0usize;
        let mut stems = 0usize;
        for &id in system.glyphs() {
            let Some(glyph) = body.glyphs.get(id) else {
                continue;
            };
            if !glyph.is_active() {
                continue;
            }
            glyphs += 1;
            match glyph.shape() {
                Some(Shape::BassClef | Shape::TrebleClef) => clefs += 1,
                Some(Shape::Dot) => dots += 1,
                Some(Shape::Stem) => stems += 1,
                _ => {}
            }
        }
        systems.push(SystemSummary {
            system: system.id().0,
            staves: system.staves().len(),
            measures: body.measure_counts.get(index).copied().unwrap_or(0),
            glyphs,
            clefs,
            dots,
            stems,
        });
    }
    body.summary = Some(ScoreSummary { systems });
    Ok(())
}

#[derive(Serialize)]
struct ExportDocument<'a> {
    target: Option<&'a std::path::Path>,
    scale: Option<gakufu_model::Scale>,
    skew: Option<Skew>,
    log: &'a StepLog,
    summary: &'a ScoreSummary,
}

/// Serializes the recognition result to JSON and stores it on the
/// sheet. Writing the document anywhere is left to the caller; an
/// [`StepParam::ExportPath`] only records the intended destination in
/// the document.
///
/// # Errors
///
/// [`StepError::NoSummary`] before the score step, or
/// [`StepError::Export`] when serialization fails.
pub(super) fn export(body: &mut SheetBody, param: &StepParam) -> Result<(), StepError> {
    let summary = body.summary.as_ref().ok_or(StepError::NoSummary)?;
    let target = match param {
        StepParam::ExportPath(path) => Some(path.as_path()),
        StepParam::None => None,
    };
    let document = ExportDocument {
        target,
        scale: body.scale,
        skew: body.skew,
        log: &body.log,
        summary,
    };
    let json = serde_json::to_string_pretty(&document)?;
    tracing::debug!(bytes = json.len(), "export document built");
    body.export = Some(json);
    Ok(())
}
