//! Glyph extraction and coarse classification.
//!
//! Barlines are measured directly on the binary picture, column by
//! column. Glyphs come from connected components of the picture with
//! the staff line rows erased; erasing the lines cuts symbols that
//! cross them into fragments, which the pattern step later reassembles
//! into compounds.
//!
//! All three stages honor a restricted system scope: out-of-scope
//! systems keep their measure counts and their glyphs untouched.

use std::collections::BTreeMap;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use gakufu_model::{Glyph, GlyphId, Point, Rect, Shape, SystemScope};

use crate::config::StageConfig;
use crate::error::StepError;
use crate::sheet::SheetBody;

use super::picture;

/// Confidence assigned to coarse size-based tags. Pattern detectors
/// override it with an evaluator grade when they promote a compound.
const COARSE_GRADE: f64 = 0.5;
const STEM_GRADE: f64 = 0.4;

/// Counts measures per system from barline columns.
///
/// A column whose ink covers at least `barline_ratio` of the staff band
/// is part of a barline; adjacent barline columns merge. N barlines
/// enclose N - 1 measures.
///
/// # Errors
///
/// [`StepError::NoPicture`] or [`StepError::NoSystems`].
pub(super) fn detect_measures(
    body: &mut SheetBody,
    config: &StageConfig,
    scope: &SystemScope,
) -> Result<(), StepError> {
    let picture = body.picture.as_ref().ok_or(StepError::NoPicture)?;
    if body.systems.is_empty() {
        return Err(StepError::NoSystems);
    }
    let binary = picture::binarize(picture, config);
    if body.measure_counts.len() != body.systems.len() {
        body.measure_counts = vec![0; body.systems.len()];
    }

    for (index, system) in body.systems.iter().enumerate() {
        if !scope.includes(system.id()) {
            continue;
        }
        let Some((band_top, band_bottom)) = staff_band(system) else {
            continue;
        };
        let band_height = band_bottom - band_top;
        if band_height <= 0.0 {
            continue;
        }
        let y_first = band_top.floor().max(0.0) as u32;
        let y_last = (band_bottom.ceil() as u32).min(binary.height().saturating_sub(1));

        let mut barlines = 0usize;
        let mut inside = false;
        for x in 0..binary.width() {
            let ink = (y_first..=y_last)
                .filter(|&y| picture::is_ink(&binary, x, y))
                .count() as f64;
            let is_barline = ink >= config.barline_ratio * band_height;
            if is_barline && !inside {
                barlines += 1;
            }
            inside = is_barline;
        }
        body.measure_counts[index] = barlines.saturating_sub(1);
        tracing::debug!(system = system.id().0, barlines, "measures counted");
    }
    Ok(())
}

/// Vertical span from the first staff's top line to the last staff's
/// bottom line.
fn staff_band(system: &gakufu_model::SystemInfo) -> Option<(f64, f64)> {
    let first = system.staves().first()?;
    let last = system.staves().last()?;
    Some((first.top(), last.bottom()))
}

/// Extracts glyphs as connected components of the line-erased picture
/// and tags dots by size.
///
/// In-scope systems first retire all their existing glyphs, then adopt
/// the freshly extracted ones; components falling into out-of-scope
/// systems are discarded so those systems stay exactly as they were.
///
/// # Errors
///
/// [`StepError::NoPicture`], [`StepError::NoScale`], or
/// [`StepError::NoSystems`].
pub(super) fn extract_glyphs(
    body: &mut SheetBody,
    config: &StageConfig,
    scope: &SystemScope,
) -> Result<(), StepError> {
    let picture = body.picture.as_ref().ok_or(StepError::NoPicture)?;
    let scale = body.scale.ok_or(StepError::NoScale)?;
    if body.systems.is_empty() {
        return Err(StepError::NoSystems);
    }
    let mut binary = picture::binarize(picture, config);
    erase_staff_lines(&mut binary, &body.staff_lines, scale.line_thickness());

    for system in &mut body.systems {
        if scope.includes(system.id()) {
            system.release_all(&mut body.glyphs);
        }
    }

    let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));
    let mut components: BTreeMap<u32, ComponentStats> = BTreeMap::new();
    for (x, y, pixel) in labels.enumerate_pixels() {
        let label = pixel.0[0];
        if label == 0 {
            continue;
        }
        components
            .entry(label)
            .and_modify(|stats| stats.add(x, y))
            .or_insert_with(|| ComponentStats::new(x, y));
    }

    let interline = scale.interline();
    let mut extracted = 0usize;
    for stats in components.values() {
        if stats.weight < config.min_glyph_weight {
            continue;
        }
        let centroid = stats.centroid();
        let Some(index) = body.system_index_at(centroid.y) else {
            continue;
        };
        if !scope.includes(body.systems[index].id()) {
            continue;
        }
        let bounds = stats.bounds();
        let id = body.glyphs.register(bounds, centroid, stats.weight);
        body.systems[index].adopt(&mut body.glyphs, id);
        extracted += 1;

        let pitch = body.systems[index].staff_at(centroid).map(|staff| {
            body.systems[index].staves()[staff].pitch_position(centroid.y)
        });
        let Some(glyph) = body.glyphs.get_mut(id) else {
            continue;
        };
        if let Some(pitch) = pitch {
            glyph.set_pitch_position(pitch);
        }
        if is_dot_sized(bounds, interline, config) {
            glyph.set_shape(Some(Shape::Dot), COARSE_GRADE);
        }
    }

    tracing::debug!(extracted, "glyphs extracted");
    Ok(())
}

/// Blanks every row lying on a staff line.
fn erase_staff_lines(binary: &mut GrayImage, lines: &[f64], thickness: f64) {
    let reach = thickness.max(1.0) * 0.75;
    for y in 0..binary.height() {
        let row = f64::from(y);
        if lines.iter().any(|&line| (row - line).abs() <= reach) {
            for x in 0..binary.width() {
                binary.put_pixel(x, y, Luma([0]));
            }
        }
    }
}

fn is_dot_sized(bounds: Rect, interline: f64, config: &StageConfig) -> bool {
    let larger = bounds.width.max(bounds.height);
    let smaller = bounds.width.min(bounds.height);
    if smaller <= 0.0 {
        return false;
    }
    larger <= config.max_dot_interlines * interline
        && smaller >= config.min_dot_interlines * interline
        && larger / smaller <= 2.0
}

/// Tags tall thin unclassified glyphs as stems.
///
/// # Errors
///
/// [`StepError::NoScale`].
pub(super) fn tag_stems(
    body: &mut SheetBody,
    config: &StageConfig,
    scope: &SystemScope,
) -> Result<(), StepError> {
    let scale = body.scale.ok_or(StepError::NoScale)?;
    let interline = scale.interline();
    let candidates: Vec<GlyphId> = body
        .glyphs
        .iter_active()
        .filter(|glyph| glyph.shape().is_none())
        .filter(|glyph| glyph.system().is_some_and(|id| scope.includes(id)))
        .filter(|glyph| {
            let bounds = glyph.bounds();
            bounds.width > 0.0
                && bounds.height / bounds.width >= config.min_stem_aspect
                && bounds.height >= config.min_stem_interlines * interline
        })
        .map(Glyph::id)
        .collect();
    let stems = candidates.len();
    for id in candidates {
        if let Some(glyph) = body.glyphs.get_mut(id) {
            glyph.set_shape(Some(Shape::Stem), STEM_GRADE);
        }
    }
    tracing::debug!(stems, "stems tagged");
    Ok(())
}

/// Running bounds and centroid of one connected component.
struct ComponentStats {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    sum_x: f64,
    sum_y: f64,
    weight: u32,
}

impl ComponentStats {
    const fn new(x: u32, y: u32) -> Self {
        Self {
            min_x: x,
            min_y: y,
            max_x: x,
            max_y: y,
            sum_x: x as f64,
            sum_y: y as f64,
            weight: 1,
        }
    }

    fn add(&mut self, x: u32, y: u32) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.sum_x += f64::from(x);
        self.sum_y += f64::from(y);
        self.weight += 1;
    }

    fn centroid(&self) -> Point {
        let weight = f64::from(self.weight);
        Point::new(self.sum_x / weight, self.sum_y / weight)
    }

    fn bounds(&self) -> Rect {
        Rect::new(
            f64::from(self.min_x),
            f64::from(self.min_y),
            f64::from(self.max_x - self.min_x + 1),
            f64::from(self.max_y - self.min_y + 1),
        )
    }
}
