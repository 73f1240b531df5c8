//! Page geometry: skew, staff lines, stray horizontals, and systems.
//!
//! These stages work on the whole picture. Staff lines are found by
//! horizontal projection, grouped into staves by their spacing, and
//! staves are grouped into systems by the white gaps between them. The
//! resulting system bands partition the full page height, so every
//! later y-coordinate lookup lands in exactly one system.

use gakufu_model::{Rect, StaffInfo, SystemId, SystemInfo};

use crate::config::StageConfig;
use crate::error::StepError;
use crate::sheet::{SheetBody, Skew};

use super::picture;

/// Minimum staff line count for a usable sheet (one full staff).
const MIN_STAFF_LINES: usize = 5;

/// Estimates the global skew angle by shearing the ink projection.
///
/// The horizontal projection of a staff-bearing page is sharpest when
/// the shear matches the page's tilt, so the angle that maximizes the
/// projection's concentration is the skew. Ties prefer the smaller
/// tilt, which keeps an already-straight page at zero.
///
/// # Errors
///
/// [`StepError::NoPicture`] before the load step.
pub(super) fn estimate_skew(body: &mut SheetBody, config: &StageConfig) -> Result<(), StepError> {
    let picture = body.picture.as_ref().ok_or(StepError::NoPicture)?;
    let binary = picture::binarize(picture, config);
    let height = binary.height() as usize;
    let margin = (f64::from(binary.width()) * config.max_skew).ceil() as usize + 1;

    const SAMPLES: i32 = 14;
    let mut best_angle: f64 = 0.0;
    let mut best_score = 0u64;
    for i in -SAMPLES..=SAMPLES {
        let angle = f64::from(i) * config.max_skew / f64::from(SAMPLES);
        let mut bins = vec![0u64; height + 2 * margin];
        for (x, y, pixel) in binary.enumerate_pixels() {
            if pixel.0[0] == 0 {
                continue;
            }
            let shifted = f64::from(x).mul_add(-angle, f64::from(y)) + margin as f64;
            if let Some(slot) = bins.get_mut(shifted.round().max(0.0) as usize) {
                *slot += 1;
            }
        }
        let score: u64 = bins.iter().map(|&count| count * count).sum();
        if score > best_score || (score == best_score && angle.abs() < best_angle.abs()) {
            best_score = score;
            best_angle = angle;
        }
    }

    tracing::debug!(angle = best_angle, "skew estimated");
    body.skew = Some(Skew { angle: best_angle });
    Ok(())
}

/// Detects staff line rows by horizontal projection.
///
/// A row whose ink covers at least `staff_line_ratio` of the width is
/// part of a line; adjacent flagged rows merge into one line whose
/// center is their ink-weighted mean.
///
/// # Errors
///
/// [`StepError::NoPicture`], [`StepError::NoScale`], or
/// [`StepError::NoStaffLines`] when fewer than five lines are found.
pub(super) fn detect_lines(body: &mut SheetBody, config: &StageConfig) -> Result<(), StepError> {
    let picture = body.picture.as_ref().ok_or(StepError::NoPicture)?;
    body.scale.ok_or(StepError::NoScale)?;
    let binary = picture::binarize(picture, config);
    let minimum_ink = config.staff_line_ratio * f64::from(binary.width());

    let mut centers = Vec::new();
    let mut cluster: Vec<(u32, u64)> = Vec::new();
    for y in 0..binary.height() {
        let ink = (0..binary.width())
            .filter(|&x| picture::is_ink(&binary, x, y))
            .count() as u64;
        if (ink as f64) < minimum_ink {
            continue;
        }
        if cluster.last().is_some_and(|&(last, _)| y - last > 1) {
            centers.push(cluster_center(&cluster));
            cluster.clear();
        }
        cluster.push((y, ink));
    }
    if !cluster.is_empty() {
        centers.push(cluster_center(&cluster));
    }

    if centers.len() < MIN_STAFF_LINES {
        return Err(StepError::NoStaffLines {
            found: centers.len(),
            minimum: MIN_STAFF_LINES,
        });
    }
    tracing::debug!(lines = centers.len(), "staff lines detected");
    body.staff_lines = centers;
    Ok(())
}

/// Ink-weighted mean row of a cluster of flagged rows.
fn cluster_center(cluster: &[(u32, u64)]) -> f64 {
    let mut weighted = 0.0;
    let mut total = 0.0;
    for &(y, ink) in cluster {
        weighted += f64::from(y) * ink as f64;
        total += ink as f64;
    }
    if total > 0.0 { weighted / total } else { 0.0 }
}

/// Collects horizontal ink segments away from the staff lines, such as
/// ledger lines and ending brackets. Finding none is not an error.
///
/// # Errors
///
/// [`StepError::NoPicture`] or [`StepError::NoScale`].
pub(super) fn detect_horizontals(
    body: &mut SheetBody,
    config: &StageConfig,
) -> Result<(), StepError> {
    let picture = body.picture.as_ref().ok_or(StepError::NoPicture)?;
    let scale = body.scale.ok_or(StepError::NoScale)?;
    let binary = picture::binarize(picture, config);
    let interline = scale.interline();
    let thickness = scale.line_thickness().max(1.0);
    let min_length = 0.8 * interline;
    let max_length = 5.0 * interline;

    let mut segments = Vec::new();
    for y in 0..binary.height() {
        let row = f64::from(y);
        if body
            .staff_lines
            .iter()
            .any(|&line| (row - line).abs() <= interline / 2.0)
        {
            continue;
        }
        let mut start: Option<u32> = None;
        for x in 0..=binary.width() {
            let ink = x < binary.width() && picture::is_ink(&binary, x, y);
            match (start, ink) {
                (None, true) => start = Some(x),
                (Some(from), false) => {
                    let length = f64::from(x - from);
                    if length >= min_length && length <= max_length {
                        segments.push(Rect::new(f64::from(from), row, length, thickness));
                    }
                    start = None;
                }
                _ => {}
            }
        }
    }

    tracing::debug!(segments = segments.len(), "horizontals collected");
    body.horizontals = segments;
    Ok(())
}

/// Groups staff lines into staves and staves into systems, and gives
/// each system a band of the page.
///
/// Consecutive lines closer than 1.5 interlines belong to one staff;
/// staves separated by less than `system_gap_interlines` interlines of
/// white belong to one system. Band boundaries fall midway between
/// adjacent systems, and the first and last bands extend to the page
/// edges. Rebuilding the systems discards all previously extracted
/// glyphs, since their memberships would be stale.
///
/// # Errors
///
/// [`StepError::NoPicture`], [`StepError::NoScale`], or
/// [`StepError::NoSystems`] when no staff lines are available.
pub(super) fn build_systems(body: &mut SheetBody, config: &StageConfig) -> Result<(), StepError> {
    let picture = body.picture.as_ref().ok_or(StepError::NoPicture)?;
    let height = f64::from(picture.height());
    let scale = body.scale.ok_or(StepError::NoScale)?;
    if body.staff_lines.is_empty() {
        return Err(StepError::NoSystems);
    }
    let interline = scale.interline();

    let mut staves: Vec<StaffInfo> = Vec::new();
    let mut lines: Vec<f64> = Vec::new();
    for &line in &body.staff_lines {
        if lines
            .last()
            .is_some_and(|&previous| line - previous > 1.5 * interline)
        {
            staves.push(StaffInfo::new(std::mem::take(&mut lines)));
        }
        lines.push(line);
    }
    if !lines.is_empty() {
        staves.push(StaffInfo::new(lines));
    }

    let mut grouped: Vec<Vec<StaffInfo>> = Vec::new();
    let mut current: Vec<StaffInfo> = Vec::new();
    for staff in staves {
        let gap_before = current
            .last()
            .is_some_and(|previous| staff.top() - previous.bottom() > config.system_gap_interlines * interline);
        if gap_before {
            grouped.push(std::mem::take(&mut current));
        }
        current.push(staff);
    }
    if !current.is_empty() {
        grouped.push(current);
    }
    if grouped.is_empty() {
        return Err(StepError::NoSystems);
    }

    let extents: Vec<(f64, f64)> = grouped
        .iter()
        .map(|staves| {
            staves
                .first()
                .zip(staves.last())
                .map_or((0.0, height), |(first, last)| (first.top(), last.bottom()))
        })
        .collect();
    let count = grouped.len();
    let mut systems = Vec::with_capacity(count);
    for (index, staves) in grouped.into_iter().enumerate() {
        let top = if index == 0 {
            0.0
        } else {
            f64::midpoint(extents[index - 1].1, extents[index].0)
        };
        let bottom = if index + 1 == count {
            height
        } else {
            f64::midpoint(extents[index].1, extents[index + 1].0)
        };
        systems.push(SystemInfo::new(SystemId(index as u32), top, bottom, staves));
    }

    tracing::info!(systems = systems.len(), "systems built");
    body.systems = systems;
    body.glyphs = gakufu_model::GlyphRegistry::new();
    body.measure_counts = vec![0; count];
    body.summary = None;
    Ok(())
}
