//! Image decoding and binarization.
//!
//! The load step accepts raw image bytes (PNG, JPEG, BMP, WebP) and
//! produces a single-channel grayscale picture. Later stages binarize
//! it on demand through [`binarize`], which marks ink as foreground.

use image::{GrayImage, Luma};

use crate::config::StageConfig;
use crate::error::StepError;
use crate::sheet::SheetBody;

/// Decodes the sheet's source bytes into its grayscale picture.
///
/// # Errors
///
/// [`StepError::EmptyInput`] when the source is empty,
/// [`StepError::ImageDecode`] when the bytes are not a decodable image.
pub(super) fn load(body: &mut SheetBody) -> Result<(), StepError> {
    if body.source().is_empty() {
        return Err(StepError::EmptyInput);
    }
    let decoded = image::load_from_memory(body.source())?;
    let picture = decoded.into_luma8();
    tracing::debug!(
        width = picture.width(),
        height = picture.height(),
        "sheet picture loaded"
    );
    body.picture = Some(picture);
    Ok(())
}

/// Binary view of the picture: ink becomes 255, paper becomes 0.
///
/// Sheet music is dark ink on light paper, so a pixel is ink when it is
/// darker than the threshold. The threshold comes from the config or,
/// absent that, from Otsu's method on the picture itself.
pub(super) fn binarize(picture: &GrayImage, config: &StageConfig) -> GrayImage {
    let threshold = config
        .binarization_threshold
        .unwrap_or_else(|| imageproc::contrast::otsu_level(picture));
    GrayImage::from_fn(picture.width(), picture.height(), |x, y| {
        if picture.get_pixel(x, y).0[0] < threshold {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Whether the binary pixel at `(x, y)` is ink.
pub(super) fn is_ink(binary: &GrayImage, x: u32, y: u32) -> bool {
    binary.get_pixel(x, y).0[0] != 0
}
