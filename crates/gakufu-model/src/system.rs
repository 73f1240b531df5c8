//! Systems: the vertical regions that partition a sheet.
//!
//! A system groups one or more staves plus the glyphs whose ink falls
//! inside its ordinate band. Systems hold non-owning [`GlyphId`]
//! references; the glyphs themselves live in the sheet's
//! [`GlyphRegistry`](crate::registry::GlyphRegistry).

use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use crate::geometry::Point;
use crate::glyph::GlyphId;
use crate::registry::GlyphRegistry;

/// Index of a system within its sheet, in top-to-bottom order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SystemId(pub u32);

/// One five-line staff, described by its line-center ordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaffInfo {
    /// Line-center ordinates, ascending.
    lines: Vec<f64>,
    /// Mean gap between adjacent lines (at least 1 pixel, so pitch
    /// computation stays total even on degenerate staves).
    interline: f64,
}

impl StaffInfo {
    /// Build a staff from its line-center ordinates (ascending).
    #[must_use]
    pub fn new(mut lines: Vec<f64>) -> Self {
        lines.sort_by(f64::total_cmp);
        let interline = if lines.len() > 1 {
            let span = lines[lines.len() - 1] - lines[0];
            let gaps = lines.len() - 1;
            // usize -> f64 is exact for any realistic line count.
            #[allow(clippy::cast_precision_loss)]
            (span / gaps as f64).max(1.0)
        } else {
            1.0
        };
        Self { lines, interline }
    }

    /// Line-center ordinates, ascending.
    #[must_use]
    pub fn lines(&self) -> &[f64] {
        &self.lines
    }

    /// Top line ordinate.
    #[must_use]
    pub fn top(&self) -> f64 {
        self.lines.first().copied().unwrap_or(0.0)
    }

    /// Bottom line ordinate.
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.lines.last().copied().unwrap_or(0.0)
    }

    /// Ordinate of the staff midline.
    #[must_use]
    pub fn midline(&self) -> f64 {
        f64::midpoint(self.top(), self.bottom())
    }

    /// The staff's own interline, in pixels.
    #[must_use]
    pub const fn interline(&self) -> f64 {
        self.interline
    }

    /// Staff-relative vertical position of an ordinate, in half
    /// interlines: 0 on the midline, -4 on the top line, +4 on the
    /// bottom line, negative above the midline.
    #[must_use]
    pub fn pitch_position(&self, y: f64) -> f64 {
        2.0 * (y - self.midline()) / self.interline
    }
}

/// A vertical region of the sheet, owning staff geometry and a set of
/// glyph references.
#[derive(Debug, Clone)]
pub struct SystemInfo {
    id: SystemId,
    top: f64,
    bottom: f64,
    staves: Vec<StaffInfo>,
    glyphs: BTreeSet<GlyphId>,
}

impl SystemInfo {
    /// Create a system covering `[top, bottom]` with its staves.
    #[must_use]
    pub const fn new(id: SystemId, top: f64, bottom: f64, staves: Vec<StaffInfo>) -> Self {
        Self {
            id,
            top,
            bottom,
            staves,
            glyphs: BTreeSet::new(),
        }
    }

    /// System identity.
    #[must_use]
    pub const fn id(&self) -> SystemId {
        self.id
    }

    /// Top ordinate bound.
    #[must_use]
    pub const fn top(&self) -> f64 {
        self.top
    }

    /// Bottom ordinate bound.
    #[must_use]
    pub const fn bottom(&self) -> f64 {
        self.bottom
    }

    /// Center-line ordinate of the system band.
    #[must_use]
    pub fn center_y(&self) -> f64 {
        f64::midpoint(self.top, self.bottom)
    }

    /// Whether an ordinate falls inside the system band.
    #[must_use]
    pub fn contains_y(&self, y: f64) -> bool {
        y >= self.top && y <= self.bottom
    }

    /// The system's staves, top to bottom.
    #[must_use]
    pub fn staves(&self) -> &[StaffInfo] {
        &self.staves
    }

    /// The staff closest to a point, by midline distance.
    ///
    /// Ties go to the earlier staff (strict-less comparison while
    /// scanning top to bottom), the same policy as system lookup.
    #[must_use]
    pub fn staff_at(&self, point: Point) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, staff) in self.staves.iter().enumerate() {
            let distance = (point.y - staff.midline()).abs();
            if best.is_none_or(|(_, d)| distance < d) {
                best = Some((idx, distance));
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// The glyphs currently attached to this system.
    #[must_use]
    pub const fn glyphs(&self) -> &BTreeSet<GlyphId> {
        &self.glyphs
    }

    /// Attach a glyph to this system, recording the membership on the
    /// glyph itself. A glyph belongs to at most one system; the caller
    /// must not pass a glyph already owned by another system.
    pub fn adopt(&mut self, registry: &mut GlyphRegistry, id: GlyphId) {
        debug_assert!(
            registry
                .get(id)
                .is_none_or(|g| g.system().is_none() || g.system() == Some(self.id)),
            "glyph adopted by a second system"
        );
        registry.assign_system(id, Some(self.id));
        self.glyphs.insert(id);
    }

    /// Detach a glyph from this system.
    pub fn release(&mut self, registry: &mut GlyphRegistry, id: GlyphId) {
        if self.glyphs.remove(&id) {
            registry.assign_system(id, None);
        }
    }

    /// Detach every glyph (used when a scoped replay re-extracts the
    /// system's symbols from scratch).
    pub fn release_all(&mut self, registry: &mut GlyphRegistry) {
        for id in std::mem::take(&mut self.glyphs) {
            registry.assign_system(id, None);
            registry.retire(id);
        }
    }

    /// Swap a promoted compound in for its constituents.
    pub fn replace_with_compound(
        &mut self,
        registry: &mut GlyphRegistry,
        parts: &[GlyphId],
        compound: GlyphId,
    ) {
        for part in parts {
            self.glyphs.remove(part);
        }
        self.adopt(registry, compound);
    }

    /// Order-independent fingerprint of the system's active glyph set:
    /// identities, shapes, grades, geometry, and pitch positions.
    ///
    /// Two calls return the same value iff no member glyph was added,
    /// removed, or mutated in between -- the check scoped replays use
    /// to prove out-of-scope systems untouched.
    #[must_use]
    pub fn signature(&self, registry: &GlyphRegistry) -> u64 {
        let mut hasher = SipHasher13::new();
        for &id in &self.glyphs {
            let Some(glyph) = registry.get(id) else {
                continue;
            };
            id.hash(&mut hasher);
            glyph.shape().hash(&mut hasher);
            glyph.grade().to_bits().hash(&mut hasher);
            glyph.bounds().x.to_bits().hash(&mut hasher);
            glyph.bounds().y.to_bits().hash(&mut hasher);
            glyph.bounds().width.to_bits().hash(&mut hasher);
            glyph.bounds().height.to_bits().hash(&mut hasher);
            if let Some(pitch) = glyph.pitch_position() {
                pitch.to_bits().hash(&mut hasher);
            }
            glyph.is_active().hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// Which systems a pipeline request applies to.
///
/// `All` is the whole-sheet default; `Only` restricts replays to the
/// systems whose glyphs a local edit invalidated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SystemScope {
    /// Every system of the sheet.
    #[default]
    All,
    /// Only the listed systems.
    Only(BTreeSet<SystemId>),
}

impl SystemScope {
    /// Restrict to the given systems.
    #[must_use]
    pub fn only<I: IntoIterator<Item = SystemId>>(systems: I) -> Self {
        Self::Only(systems.into_iter().collect())
    }

    /// Whether a system is covered by this scope.
    #[must_use]
    pub fn includes(&self, id: SystemId) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(&id),
        }
    }

    /// Whether the scope covers the whole sheet.
    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}
