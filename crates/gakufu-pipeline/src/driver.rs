use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use gakufu_model::SystemScope;

use crate::error::StepError;
use crate::event::{StepEvent, StepSink};
use crate::sheet::{Sheet, SheetBody};
use crate::step::Step;

/// Extra input forwarded verbatim to step implementations.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub enum StepParam {
    #[default]
    None,
    /// Destination the caller intends for the export document. The
    /// standard export step records it in the document but performs no
    /// file IO itself.
    ExportPath(PathBuf),
}

/// One step's worth of work. Implementations receive exclusive access
/// to the sheet body and must leave it untouched when they fail partway
/// in a way that would corrupt earlier results.
pub trait StepImpl: Send + Sync {
    fn run(
        &self,
        step: Step,
        body: &mut SheetBody,
        param: &StepParam,
        scope: &SystemScope,
    ) -> Result<(), StepError>;
}

/// Ordinal-indexed table of step implementations.
pub struct StepRegistry {
    entries: Vec<Option<Arc<dyn StepImpl>>>,
}

impl StepRegistry {
    /// A registry with no implementations at all. Useful for tests and
    /// for callers that assemble a custom pipeline piece by piece.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: vec![None; Step::COUNT],
        }
    }

    /// Replaces the implementation for `step`, returning the previous
    /// one if any.
    pub fn register(
        &mut self,
        step: Step,
        implementation: Arc<dyn StepImpl>,
    ) -> Option<Arc<dyn StepImpl>> {
        self.entries[step.ordinal()].replace(implementation)
    }

    #[must_use]
    pub fn get(&self, step: Step) -> Option<&dyn StepImpl> {
        self.entries[step.ordinal()].as_deref()
    }
}

impl std::fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registered: Vec<Step> = Step::ALL
            .into_iter()
            .filter(|step| self.get(*step).is_some())
            .collect();
        f.debug_struct("StepRegistry")
            .field("registered", &registered)
            .finish()
    }
}

/// Drives sheets through the step catalog.
///
/// The driver holds the sheet lock for a whole request, so two requests
/// on the same sheet serialize while different sheets run freely in
/// parallel.
pub struct StepDriver<'a> {
    registry: &'a StepRegistry,
    sink: &'a dyn StepSink,
}

impl<'a> StepDriver<'a> {
    #[must_use]
    pub const fn new(registry: &'a StepRegistry, sink: &'a dyn StepSink) -> Self {
        Self { registry, sink }
    }

    /// Brings `sheet` up to `target`, running every not-yet-done
    /// mandatory step on the way plus the target itself.
    ///
    /// When the sheet is already at or past the target nothing runs;
    /// observers get a refresh message instead. The request itself is
    /// notified in every case, including failures, so a recorded
    /// session can be replayed.
    pub fn perform_until(
        &self,
        sheet: &Sheet,
        target: Step,
        param: &StepParam,
    ) -> Result<(), StepError> {
        let mut body = sheet.lock();
        let outcome = match body.log.first_incomplete() {
            Some(from) if from <= target && !body.log.is_done(target) => {
                let steps = Step::mandatory_range(from, target);
                self.run_steps(sheet.name(), &mut body, &steps, param, &SystemScope::All)
            }
            _ => {
                self.sink.on_event(
                    sheet.name(),
                    StepEvent::Message(format!("step {target} already done")),
                );
                Ok(())
            }
        };
        self.sink
            .on_event(sheet.name(), StepEvent::Requested { target });
        outcome
    }

    /// Re-runs every mandatory step after `step`, up to the furthest
    /// mandatory step the sheet has completed, restricted to `scope`.
    /// A no-op when nothing comes after `step` yet.
    pub fn replay_after(
        &self,
        sheet: &Sheet,
        step: Step,
        scope: &SystemScope,
    ) -> Result<(), StepError> {
        let mut body = sheet.lock();
        let Some(first) = step.next() else {
            return Ok(());
        };
        let Some(last) = body.log.latest_mandatory() else {
            return Ok(());
        };
        if first > last {
            return Ok(());
        }
        let steps: Vec<Step> = Step::range(first, last)
            .filter(|candidate| candidate.is_mandatory())
            .collect();
        self.run_steps(sheet.name(), &mut body, &steps, &StepParam::None, scope)
    }

    /// The sheet's last step of its unbroken completed prefix.
    #[must_use]
    pub fn current_step(&self, sheet: &Sheet) -> Option<Step> {
        sheet.lock().log.completed_prefix()
    }

    #[must_use]
    pub fn is_done(&self, sheet: &Sheet, step: Step) -> bool {
        sheet.lock().log.is_done(step)
    }

    fn run_steps(
        &self,
        name: &str,
        body: &mut SheetBody,
        steps: &[Step],
        param: &StepParam,
        scope: &SystemScope,
    ) -> Result<(), StepError> {
        for &step in steps {
            self.sink.on_event(name, StepEvent::Started { step });
            let started = Instant::now();
            let outcome = match self.registry.get(step) {
                None => Err(StepError::Unimplemented(step)),
                Some(implementation) => implementation.run(step, body, param, scope),
            };
            match outcome {
                Ok(()) => {
                    body.log.mark_done(step);
                    let elapsed = started.elapsed();
                    tracing::debug!(sheet = name, %step, ?elapsed, "step completed");
                    self.sink
                        .on_event(name, StepEvent::Completed { step, elapsed });
                }
                Err(error) => {
                    tracing::warn!(sheet = name, %step, %error, "step failed");
                    self.sink.on_event(
                        name,
                        StepEvent::Failed {
                            step,
                            message: error.to_string(),
                        },
                    );
                    return Err(error);
                }
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for StepDriver<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepDriver")
            .field("registry", self.registry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;
    use crate::event::NullSink;

    /// Records every step it runs, optionally failing at one of them.
    struct Recorder {
        runs: Mutex<Vec<(Step, bool)>>,
        fail_at: Option<Step>,
        delay: Option<Duration>,
    }

    impl Recorder {
        fn new() -> Self {
            Self {
                runs: Mutex::new(Vec::new()),
                fail_at: None,
                delay: None,
            }
        }

        fn failing_at(step: Step) -> Self {
            Self {
                fail_at: Some(step),
                ..Self::new()
            }
        }

        fn runs(&self) -> Vec<(Step, bool)> {
            self.runs.lock().unwrap().clone()
        }

        fn steps(&self) -> Vec<Step> {
            self.runs().into_iter().map(|(step, _)| step).collect()
        }
    }

    impl StepImpl for Recorder {
        fn run(
            &self,
            step: Step,
            _body: &mut SheetBody,
            _param: &StepParam,
            scope: &SystemScope,
        ) -> Result<(), StepError> {
            if let Some(delay) = self.delay {
                std::thread::sleep(delay);
            }
            self.runs.lock().unwrap().push((step, scope.is_all()));
            if self.fail_at == Some(step) {
                return Err(StepError::NoSystems);
            }
            Ok(())
        }
    }

    fn registry_with(recorder: &Arc<Recorder>) -> StepRegistry {
        let mut registry = StepRegistry::empty();
        for step in Step::ALL {
            registry.register(step, Arc::<Recorder>::clone(recorder));
        }
        registry
    }

    /// Collects events for inspection.
    #[derive(Default)]
    struct EventLog(Mutex<Vec<StepEvent>>);

    impl StepSink for EventLog {
        fn on_event(&self, _sheet: &str, event: StepEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    impl EventLog {
        fn events(&self) -> Vec<StepEvent> {
            self.0.lock().unwrap().clone()
        }
    }

    #[test]
    fn perform_until_runs_the_mandatory_prefix() {
        let recorder = Arc::new(Recorder::new());
        let registry = registry_with(&recorder);
        let driver = StepDriver::new(&registry, &NullSink);
        let sheet = Sheet::new("demo", Vec::new());

        driver
            .perform_until(&sheet, Step::Skew, &StepParam::None)
            .unwrap();

        assert_eq!(recorder.steps(), vec![Step::Load, Step::Scale, Step::Skew]);
        assert_eq!(driver.current_step(&sheet), Some(Step::Skew));
        assert!(driver.is_done(&sheet, Step::Scale));
        assert!(!driver.is_done(&sheet, Step::Lines));
    }

    #[test]
    fn repeated_target_is_a_refresh_not_a_rerun() {
        let recorder = Arc::new(Recorder::new());
        let registry = registry_with(&recorder);
        let events = EventLog::default();
        let driver = StepDriver::new(&registry, &events);
        let sheet = Sheet::new("demo", Vec::new());

        driver
            .perform_until(&sheet, Step::Skew, &StepParam::None)
            .unwrap();
        driver
            .perform_until(&sheet, Step::Skew, &StepParam::None)
            .unwrap();
        driver
            .perform_until(&sheet, Step::Scale, &StepParam::None)
            .unwrap();

        assert_eq!(recorder.steps(), vec![Step::Load, Step::Scale, Step::Skew]);
        let messages = events
            .events()
            .into_iter()
            .filter(|event| matches!(event, StepEvent::Message(_)))
            .count();
        assert_eq!(messages, 2);
        let requests: Vec<Step> = events
            .events()
            .into_iter()
            .filter_map(|event| match event {
                StepEvent::Requested { target } => Some(target),
                _ => None,
            })
            .collect();
        assert_eq!(requests, vec![Step::Skew, Step::Skew, Step::Scale]);
    }

    #[test]
    fn advancing_skips_already_done_steps() {
        let recorder = Arc::new(Recorder::new());
        let registry = registry_with(&recorder);
        let driver = StepDriver::new(&registry, &NullSink);
        let sheet = Sheet::new("demo", Vec::new());

        driver
            .perform_until(&sheet, Step::Scale, &StepParam::None)
            .unwrap();
        driver
            .perform_until(&sheet, Step::Lines, &StepParam::None)
            .unwrap();

        assert_eq!(
            recorder.steps(),
            vec![Step::Load, Step::Scale, Step::Skew, Step::Lines],
        );
    }

    #[test]
    fn optional_target_runs_alone_after_the_mandatory_chain() {
        let recorder = Arc::new(Recorder::new());
        let registry = registry_with(&recorder);
        let driver = StepDriver::new(&registry, &NullSink);
        let sheet = Sheet::new("demo", Vec::new());

        driver
            .perform_until(&sheet, Step::Score, &StepParam::None)
            .unwrap();
        assert_eq!(recorder.steps().len(), 11);
        assert!(!driver.is_done(&sheet, Step::Export));

        driver
            .perform_until(&sheet, Step::Export, &StepParam::None)
            .unwrap();
        assert_eq!(recorder.steps().len(), 12);
        assert_eq!(recorder.steps().last(), Some(&Step::Export));
        assert!(driver.is_done(&sheet, Step::Export));
    }

    #[test]
    fn failure_preserves_completed_work_and_stops_the_run() {
        let recorder = Arc::new(Recorder::failing_at(Step::Skew));
        let registry = registry_with(&recorder);
        let events = EventLog::default();
        let driver = StepDriver::new(&registry, &events);
        let sheet = Sheet::new("demo", Vec::new());

        let outcome = driver.perform_until(&sheet, Step::Lines, &StepParam::None);
        assert!(matches!(outcome, Err(StepError::NoSystems)));

        assert_eq!(driver.current_step(&sheet), Some(Step::Scale));
        assert!(!driver.is_done(&sheet, Step::Skew));
        assert!(!driver.is_done(&sheet, Step::Lines));
        // The failed request is still recorded.
        assert!(events
            .events()
            .contains(&StepEvent::Requested { target: Step::Lines }));
    }

    #[test]
    fn rerequesting_after_failure_resumes_at_the_failed_step() {
        let recorder = Arc::new(Recorder::failing_at(Step::Skew));
        let registry = registry_with(&recorder);
        let driver = StepDriver::new(&registry, &NullSink);
        let sheet = Sheet::new("demo", Vec::new());

        assert!(driver
            .perform_until(&sheet, Step::Lines, &StepParam::None)
            .is_err());
        assert!(driver
            .perform_until(&sheet, Step::Lines, &StepParam::None)
            .is_err());

        assert_eq!(
            recorder.steps(),
            vec![Step::Load, Step::Scale, Step::Skew, Step::Skew],
        );
    }

    #[test]
    fn missing_implementation_is_reported_not_skipped() {
        let registry = StepRegistry::empty();
        let driver = StepDriver::new(&registry, &NullSink);
        let sheet = Sheet::new("demo", Vec::new());

        let outcome = driver.perform_until(&sheet, Step::Load, &StepParam::None);
        assert!(matches!(outcome, Err(StepError::Unimplemented(Step::Load))));
        assert_eq!(driver.current_step(&sheet), None);
    }

    #[test]
    fn replay_reruns_from_after_the_step_to_latest_mandatory() {
        let recorder = Arc::new(Recorder::new());
        let registry = registry_with(&recorder);
        let driver = StepDriver::new(&registry, &NullSink);
        let sheet = Sheet::new("demo", Vec::new());

        driver
            .perform_until(&sheet, Step::Systems, &StepParam::None)
            .unwrap();
        let scope = SystemScope::only([gakufu_model::SystemId(1)]);
        driver.replay_after(&sheet, Step::Lines, &scope).unwrap();

        let mut expected: Vec<(Step, bool)> = Step::mandatory_range(Step::Load, Step::Systems)
            .into_iter()
            .map(|step| (step, true))
            .collect();
        expected.extend([(Step::Horizontals, false), (Step::Systems, false)]);
        assert_eq!(recorder.runs(), expected);
    }

    #[test]
    fn replay_with_nothing_after_is_a_no_op() {
        let recorder = Arc::new(Recorder::new());
        let registry = registry_with(&recorder);
        let driver = StepDriver::new(&registry, &NullSink);
        let sheet = Sheet::new("demo", Vec::new());

        driver
            .perform_until(&sheet, Step::Skew, &StepParam::None)
            .unwrap();
        recorder.runs.lock().unwrap().clear();

        driver
            .replay_after(&sheet, Step::Skew, &SystemScope::All)
            .unwrap();
        driver
            .replay_after(&sheet, Step::LAST, &SystemScope::All)
            .unwrap();

        assert!(recorder.runs().is_empty());

        let fresh = Sheet::new("fresh", Vec::new());
        driver
            .replay_after(&fresh, Step::Load, &SystemScope::All)
            .unwrap();
        assert!(recorder.runs().is_empty());
    }

    #[test]
    fn concurrent_requests_on_one_sheet_serialize() {
        let recorder = Arc::new(Recorder {
            delay: Some(Duration::from_millis(2)),
            ..Recorder::new()
        });
        let registry = registry_with(&recorder);
        let events = EventLog::default();
        let driver = StepDriver::new(&registry, &events);
        let sheet = Sheet::new("demo", Vec::new());

        std::thread::scope(|scope| {
            let first = scope.spawn(|| {
                driver
                    .perform_until(&sheet, Step::Skew, &StepParam::None)
                    .unwrap();
            });
            let second = scope.spawn(|| {
                driver
                    .perform_until(&sheet, Step::Skew, &StepParam::None)
                    .unwrap();
            });
            first.join().unwrap();
            second.join().unwrap();
        });

        // Whichever thread loses the race sees the work already done.
        assert_eq!(recorder.steps(), vec![Step::Load, Step::Scale, Step::Skew]);

        // Every started step finishes before the next one starts.
        let mut open: Option<Step> = None;
        for event in events.events() {
            match event {
                StepEvent::Started { step } => {
                    assert_eq!(open, None);
                    open = Some(step);
                }
                StepEvent::Completed { step, .. } => {
                    assert_eq!(open, Some(step));
                    open = None;
                }
                _ => {}
            }
        }
        assert_eq!(open, None);
    }
}
