use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::step::Step;

/// Completion record for one sheet.
///
/// Only successful steps are recorded, so a failure in the middle of a
/// run leaves the log at the last step that actually finished.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct StepLog {
    completed: BTreeSet<Step>,
    latest: Option<Step>,
    latest_mandatory: Option<Step>,
}

impl StepLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_done(&self, step: Step) -> bool {
        self.completed.contains(&step)
    }

    /// The furthest completed step, regardless of gaps before it.
    #[must_use]
    pub const fn latest(&self) -> Option<Step> {
        self.latest
    }

    /// The furthest completed mandatory step.
    #[must_use]
    pub const fn latest_mandatory(&self) -> Option<Step> {
        self.latest_mandatory
    }

    pub fn mark_done(&mut self, step: Step) {
        self.completed.insert(step);
        if self.latest.is_none_or(|latest| step > latest) {
            self.latest = Some(step);
        }
        if step.is_mandatory() && self.latest_mandatory.is_none_or(|latest| step > latest) {
            self.latest_mandatory = Some(step);
        }
    }

    /// The step right after the furthest completed one, if any remains.
    #[must_use]
    pub fn first_incomplete(&self) -> Option<Step> {
        match self.latest {
            None => Some(Step::FIRST),
            Some(latest) => latest.next(),
        }
    }

    /// The last step of the unbroken completed prefix of the catalog.
    /// `None` when even the first step has not completed.
    #[must_use]
    pub fn completed_prefix(&self) -> Option<Step> {
        let mut prefix = None;
        for step in Step::ALL {
            if !self.is_done(step) {
                break;
            }
            prefix = Some(step);
        }
        prefix
    }
}
