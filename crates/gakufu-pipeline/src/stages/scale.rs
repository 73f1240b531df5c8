//! Sheet scale measurement from vertical run lengths.
//!
//! Walking every column of the binary picture yields runs of ink and
//! runs of paper. On a staff-bearing sheet the modal ink run is the
//! staff line thickness and the modal paper run is the gap between two
//! staff lines, so interline = modal ink + modal paper. This is robust
//! against symbols, which are far less frequent than line crossings.

use gakufu_model::Scale;

use crate::config::StageConfig;
use crate::error::StepError;
use crate::sheet::SheetBody;

use super::picture;

/// Measures interline and line thickness and stores them on the sheet.
///
/// # Errors
///
/// [`StepError::NoPicture`] before the load step,
/// [`StepError::DegenerateScale`] when the measurement is unusable
/// (blank page, or an interline too small or too large to be a staff).
pub(super) fn estimate(body: &mut SheetBody, config: &StageConfig) -> Result<(), StepError> {
    let picture = body.picture.as_ref().ok_or(StepError::NoPicture)?;
    let binary = picture::binarize(picture, config);
    let height = binary.height() as usize;

    let mut ink_runs = vec![0u64; height + 1];
    let mut paper_runs = vec![0u64; height + 1];
    for x in 0..binary.width() {
        let mut run = 0usize;
        let mut ink = false;
        for y in 0..binary.height() {
            let pixel_ink = picture::is_ink(&binary, x, y);
            if pixel_ink == ink {
                run += 1;
            } else {
                record(&mut ink_runs, &mut paper_runs, ink, run);
                ink = pixel_ink;
                run = 1;
            }
        }
        record(&mut ink_runs, &mut paper_runs, ink, run);
    }

    let Some(line_thickness) = modal_length(&ink_runs) else {
        return Err(StepError::DegenerateScale { interline: 0.0 });
    };
    let Some(gap) = modal_length(&paper_runs) else {
        return Err(StepError::DegenerateScale { interline: 0.0 });
    };
    let interline = (line_thickness + gap) as f64;
    if interline < 4.0 || interline > f64::from(binary.height()) / 4.0 {
        return Err(StepError::DegenerateScale { interline });
    }

    tracing::debug!(interline, line_thickness, "sheet scale measured");
    body.scale = Some(Scale::new(interline, line_thickness as f64));
    Ok(())
}

fn record(ink_runs: &mut [u64], paper_runs: &mut [u64], ink: bool, run: usize) {
    if run == 0 {
        return;
    }
    if ink {
        ink_runs[run] += 1;
    } else {
        paper_runs[run] += 1;
    }
}

/// The most frequent run length, shortest first on ties. Zero-length
/// runs never occur; an all-zero histogram yields `None`.
fn modal_length(histogram: &[u64]) -> Option<usize> {
    let mut best: Option<(usize, u64)> = None;
    for (length, &count) in histogram.iter().enumerate().skip(1) {
        if count > 0 && best.is_none_or(|(_, top)| count > top) {
            best = Some((length, count));
        }
    }
    best.map(|(length, _)| length)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::{GrayImage, Luma};

    use super::*;

    fn config() -> StageConfig {
        StageConfig {
            binarization_threshold: Some(128),
            ..StageConfig::default()
        }
    }

    /// White page with five one-pixel staff lines every 10 rows.
    fn staff_picture() -> GrayImage {
        let mut picture = GrayImage::from_pixel(200, 160, Luma([255]));
        for line in 0..5u32 {
            let y = 50 + line * 10;
            for x in 10..190 {
                picture.put_pixel(x, y, Luma([0]));
            }
        }
        picture
    }

    #[test]
    fn staff_runs_yield_the_interline() {
        let mut body = SheetBody::new(Vec::new());
        body.picture = Some(staff_picture());
        estimate(&mut body, &config()).unwrap();
        let scale = body.scale.unwrap();
        assert!((scale.interline() - 10.0).abs() < f64::EPSILON);
        assert!((scale.line_thickness() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn blank_page_has_no_scale() {
        let mut body = SheetBody::new(Vec::new());
        body.picture = Some(GrayImage::from_pixel(50, 50, Luma([255])));
        let outcome = estimate(&mut body, &config());
        assert!(matches!(
            outcome,
            Err(StepError::DegenerateScale { .. })
        ));
        assert!(body.scale.is_none());
    }

    #[test]
    fn missing_picture_is_reported() {
        let mut body = SheetBody::new(Vec::new());
        let outcome = estimate(&mut body, &config());
        assert!(matches!(outcome, Err(StepError::NoPicture)));
    }
}
