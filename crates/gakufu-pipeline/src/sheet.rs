use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use gakufu_model::{GlyphRegistry, Rect, Scale, SystemInfo};

use crate::log::StepLog;

/// Global skew of the picture, in radians. Positive tilts the staff
/// lines down toward the right.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct Skew {
    pub angle: f64,
}

/// Recognition result for one system, as reported by the score step.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SystemSummary {
    pub system: u32,
    pub staves: usize,
    pub measures: usize,
    pub glyphs: usize,
    pub clefs: usize,
    pub dots: usize,
    pub stems: usize,
}

/// Sheet-level recognition result.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ScoreSummary {
    pub systems: Vec<SystemSummary>,
}

/// All mutable state of a sheet being processed. Step implementations
/// receive exclusive access to this while the owning [`Sheet`] is
/// locked.
#[derive(Debug, Default)]
pub struct SheetBody {
    source: Vec<u8>,
    pub picture: Option<image::GrayImage>,
    pub scale: Option<Scale>,
    pub skew: Option<Skew>,
    /// Row coordinates of detected staff lines, top to bottom.
    pub staff_lines: Vec<f64>,
    /// Horizontal segments found outside the staves.
    pub horizontals: Vec<Rect>,
    pub systems: Vec<SystemInfo>,
    /// Measure count per system, indexed by system ordinal.
    pub measure_counts: Vec<usize>,
    pub glyphs: GlyphRegistry,
    pub summary: Option<ScoreSummary>,
    /// Serialized recognition result; writing it anywhere is the
    /// caller's business.
    pub export: Option<String>,
    pub log: StepLog,
}

impl SheetBody {
    #[must_use]
    pub fn new(source: Vec<u8>) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn source(&self) -> &[u8] {
        &self.source
    }

    /// The system containing `y`, or failing that the one whose center
    /// line is closest. Ties go to the earlier system.
    #[must_use]
    pub fn system_index_at(&self, y: f64) -> Option<usize> {
        if let Some(index) = self.systems.iter().position(|system| system.contains_y(y)) {
            return Some(index);
        }
        let mut best: Option<(usize, f64)> = None;
        for (index, system) in self.systems.iter().enumerate() {
            let distance = (system.center_y() - y).abs();
            if best.is_none_or(|(_, nearest)| distance < nearest) {
                best = Some((index, distance));
            }
        }
        best.map(|(index, _)| index)
    }

    #[must_use]
    pub fn system_at(&self, y: f64) -> Option<&SystemInfo> {
        self.system_index_at(y).map(|index| &self.systems[index])
    }
}

/// A sheet under recognition. The body is guarded by a mutex so that
/// concurrent step requests for the same sheet serialize; distinct
/// sheets never contend.
#[derive(Debug)]
pub struct Sheet {
    name: String,
    body: Mutex<SheetBody>,
}

impl Sheet {
    #[must_use]
    pub fn new(name: impl Into<String>, source: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            body: Mutex::new(SheetBody::new(source)),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Exclusive access to the sheet state. A panic in a previous
    /// holder does not wedge the sheet; the state it left behind is
    /// still internally consistent because the log only records
    /// completed steps.
    pub fn lock(&self) -> MutexGuard<'_, SheetBody> {
        self.body.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
