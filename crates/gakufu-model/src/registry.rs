//! The sheet-wide glyph registry.
//!
//! Owns every glyph of a sheet and keeps a spatial index over the
//! bounding boxes of the *active* ones, so pattern detectors can ask
//! "which glyphs intersect this reference box" without scanning the
//! whole sheet. Retired glyphs (constituents of a promoted compound)
//! stay in the slab for traceability but leave the index.

use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};

use crate::geometry::{Point, Rect};
use crate::glyph::{Glyph, GlyphId};
use crate::shape::Shape;
use crate::system::SystemId;

type IndexedBox = GeomWithData<Rectangle<[f64; 2]>, GlyphId>;

fn indexed_box(bounds: Rect, id: GlyphId) -> IndexedBox {
    GeomWithData::new(
        Rectangle::from_corners([bounds.x, bounds.y], [bounds.right(), bounds.bottom()]),
        id,
    )
}

/// Registry of all glyphs of one sheet.
#[derive(Debug, Default)]
pub struct GlyphRegistry {
    glyphs: Vec<Glyph>,
    index: RTree<IndexedBox>,
}

impl GlyphRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly extracted glyph and return its identity.
    pub fn register(&mut self, bounds: Rect, centroid: Point, weight: u32) -> GlyphId {
        let id = GlyphId(u32::try_from(self.glyphs.len()).unwrap_or(u32::MAX));
        self.glyphs.push(Glyph::new(id, bounds, centroid, weight));
        self.index.insert(indexed_box(bounds, id));
        id
    }

    /// Look up a glyph (active or retired).
    #[must_use]
    pub fn get(&self, id: GlyphId) -> Option<&Glyph> {
        self.glyphs.get(id.0 as usize)
    }

    /// Mutable lookup.
    pub fn get_mut(&mut self, id: GlyphId) -> Option<&mut Glyph> {
        self.glyphs.get_mut(id.0 as usize)
    }

    /// Total number of glyphs ever registered, retired included.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.glyphs.len()
    }

    /// Whether nothing has been registered yet.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.glyphs.is_empty()
    }

    /// Iterate over the active glyphs.
    pub fn iter_active(&self) -> impl Iterator<Item = &Glyph> {
        self.glyphs.iter().filter(|g| g.is_active())
    }

    /// Active glyphs whose bounding box intersects `rect`, in id order.
    #[must_use]
    pub fn intersecting(&self, rect: Rect) -> Vec<GlyphId> {
        let envelope = AABB::from_corners([rect.x, rect.y], [rect.right(), rect.bottom()]);
        let mut ids: Vec<GlyphId> = self
            .index
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Retire a glyph: mark it inactive and drop it from the spatial
    /// index. The glyph itself remains queryable through [`get`].
    ///
    /// [`get`]: Self::get
    pub fn retire(&mut self, id: GlyphId) {
        if let Some(glyph) = self.glyphs.get_mut(id.0 as usize)
            && glyph.is_active()
        {
            let bounds = glyph.bounds();
            glyph.retire();
            self.index.remove(&indexed_box(bounds, id));
        }
    }

    /// Record which system a glyph belongs to (or `None` to detach it).
    pub fn assign_system(&mut self, id: GlyphId, system: Option<SystemId>) {
        if let Some(glyph) = self.glyphs.get_mut(id.0 as usize) {
            glyph.set_system(system);
        }
    }

    /// Fuse `parts` into one new compound glyph carrying `shape` at
    /// `grade`. The constituents are retired (not destroyed); the
    /// compound inherits their system membership, the union of their
    /// boxes, and a weight-weighted centroid.
    ///
    /// Returns `None` when `parts` is empty or names unknown glyphs.
    pub fn promote_compound(
        &mut self,
        parts: &[GlyphId],
        shape: Shape,
        grade: f64,
    ) -> Option<GlyphId> {
        let members: Vec<&Glyph> = parts
            .iter()
            .map(|&id| self.get(id))
            .collect::<Option<_>>()?;
        let first = members.first()?;

        let mut bounds = first.bounds();
        let mut weight: u64 = 0;
        let mut weight_f = 0.0;
        let mut cx = 0.0;
        let mut cy = 0.0;
        let mut pitch_sum = 0.0;
        let mut pitch_weight = 0.0;
        let system = first.system();
        for member in &members {
            bounds = bounds.union(&member.bounds());
            let w = f64::from(member.weight());
            weight += u64::from(member.weight());
            weight_f += w;
            cx += member.centroid().x * w;
            cy += member.centroid().y * w;
            if let Some(pitch) = member.pitch_position() {
                pitch_sum += pitch * w;
                pitch_weight += w;
            }
        }
        let total = weight_f.max(1.0);
        let centroid = Point::new(cx / total, cy / total);

        let id = self.register(bounds, centroid, u32::try_from(weight).unwrap_or(u32::MAX));
        for &part in parts {
            self.retire(part);
        }
        if let Some(compound) = self.get_mut(id) {
            compound.set_shape(Some(shape), grade);
            compound.set_system(system);
            compound.set_parts(parts.to_vec());
            if pitch_weight > 0.0 {
                compound.set_pitch_position(pitch_sum / pitch_weight);
            }
        }
        Some(id)
    }
}
