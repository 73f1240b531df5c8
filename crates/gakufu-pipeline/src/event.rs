use std::time::Duration;

use crate::step::Step;

/// Progress notifications emitted by the driver while a sheet is
/// processed. Observers must treat these as read-only signals; the
/// driver still holds the sheet lock when they fire.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum StepEvent {
    /// A target step was requested, whatever the outcome of the run.
    /// Recorded last so a script of requests can replay the session.
    Requested { target: Step },
    Started { step: Step },
    Completed { step: Step, elapsed: Duration },
    Failed { step: Step, message: String },
    /// Free-form progress text, such as a refresh of an already-done
    /// target.
    Message(String),
}

/// Receiver for [`StepEvent`]s. Implementations must not block and must
/// not call back into the driver for the same sheet.
pub trait StepSink: Send + Sync {
    fn on_event(&self, sheet: &str, event: StepEvent);
}

/// Sink that discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl StepSink for NullSink {
    fn on_event(&self, _sheet: &str, _event: StepEvent) {}
}

/// Sink that forwards events to the `tracing` subscriber.
#[derive(Clone, Copy, Debug, Default)]
pub struct TraceSink;

impl StepSink for TraceSink {
    fn on_event(&self, sheet: &str, event: StepEvent) {
        match event {
            StepEvent::Requested { target } => {
                tracing::debug!(sheet, step = %target, "step requested");
            }
            StepEvent::Started { step } => {
                tracing::debug!(sheet, %step, "step started");
            }
            StepEvent::Completed { step, elapsed } => {
                tracing::info!(sheet, %step, ?elapsed, "step completed");
            }
            StepEvent::Failed { step, message } => {
                tracing::warn!(sheet, %step, message, "step failed");
            }
            StepEvent::Message(text) => {
                tracing::debug!(sheet, "{text}");
            }
        }
    }
}
