//! gakufu-pipeline: step orchestration for sheet recognition (sans-IO).
//!
//! A sheet advances through a fixed catalog of steps, from image
//! decoding to an exportable score summary. The [`StepDriver`] pulls in
//! every not-yet-done mandatory step when a target is requested, keeps
//! a per-sheet completion log, and can replay the tail of the pipeline
//! for a restricted set of systems after a manual correction.
//!
//! This crate performs **no file I/O** -- sheets are built from
//! in-memory bytes and the export step produces an in-memory JSON
//! document. Reading images and writing documents live in the `gakufu`
//! binary.

pub mod config;
pub mod driver;
pub mod error;
pub mod event;
pub mod log;
pub mod sheet;
pub mod stages;
pub mod step;

pub use config::StageConfig;
pub use driver::{StepDriver, StepImpl, StepParam, StepRegistry};
pub use error::StepError;
pub use event::{NullSink, StepEvent, StepSink, TraceSink};
pub use log::StepLog;
pub use sheet::{ScoreSummary, Sheet, SheetBody, Skew, SystemSummary};
pub use stages::StandardSteps;
pub use step::{Step, UnknownStep};

/// Processes raw image bytes up to `target` with the standard steps
/// and default configuration, returning the finished sheet.
///
/// # Errors
///
/// The first [`StepError`] a step raises; the returned error leaves no
/// sheet behind, so callers that want to inspect partial results should
/// drive their own [`Sheet`] through a [`StepDriver`] instead.
pub fn process(name: &str, image_bytes: Vec<u8>, target: Step) -> Result<Sheet, StepError> {
    let sheet = Sheet::new(name, image_bytes);
    let registry = StepRegistry::standard(StageConfig::default());
    let driver = StepDriver::new(&registry, &NullSink);
    driver.perform_until(&sheet, target, &StepParam::None)?;
    Ok(sheet)
}
