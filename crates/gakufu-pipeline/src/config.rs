use serde::{Deserialize, Serialize};

/// Tunables for the standard step implementations.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct StageConfig {
    /// Fixed binarization threshold; `None` picks one with Otsu's
    /// method per sheet.
    pub binarization_threshold: Option<u8>,
    /// Minimum fraction of a row that must be ink for the row to count
    /// as part of a staff line.
    pub staff_line_ratio: f64,
    /// Minimum fraction of the staff band a column must cover to count
    /// as a barline.
    pub barline_ratio: f64,
    /// Vertical gap between staves, in interlines, beyond which a new
    /// system starts.
    pub system_gap_interlines: f64,
    /// Largest dimension of a dot candidate, as a fraction of the
    /// interline.
    pub max_dot_interlines: f64,
    /// Smallest dimension of a dot candidate, as a fraction of the
    /// interline.
    pub min_dot_interlines: f64,
    /// Minimum height over width for a glyph to be tagged as a stem.
    pub min_stem_aspect: f64,
    /// Minimum stem height, in interlines.
    pub min_stem_interlines: f64,
    /// Glyphs lighter than this many pixels are dropped as noise.
    pub min_glyph_weight: u32,
    /// Half-width of the skew search window, in radians.
    pub max_skew: f64,
}

impl StageConfig {
    pub const DEFAULT_STAFF_LINE_RATIO: f64 = 0.5;
    pub const DEFAULT_BARLINE_RATIO: f64 = 0.8;
    pub const DEFAULT_SYSTEM_GAP_INTERLINES: f64 = 6.0;
    pub const DEFAULT_MAX_DOT_INTERLINES: f64 = 0.8;
    pub const DEFAULT_MIN_DOT_INTERLINES: f64 = 0.15;
    pub const DEFAULT_MIN_STEM_ASPECT: f64 = 3.0;
    pub const DEFAULT_MIN_STEM_INTERLINES: f64 = 1.5;
    pub const DEFAULT_MIN_GLYPH_WEIGHT: u32 = 4;
    pub const DEFAULT_MAX_SKEW: f64 = 0.035;
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            binarization_threshold: None,
            staff_line_ratio: Self::DEFAULT_STAFF_LINE_RATIO,
            barline_ratio: Self::DEFAULT_BARLINE_RATIO,
            system_gap_interlines: Self::DEFAULT_SYSTEM_GAP_INTERLINES,
            max_dot_interlines: Self::DEFAULT_MAX_DOT_INTERLINES,
            min_dot_interlines: Self::DEFAULT_MIN_DOT_INTERLINES,
            min_stem_aspect: Self::DEFAULT_MIN_STEM_ASPECT,
            min_stem_interlines: Self::DEFAULT_MIN_STEM_INTERLINES,
            min_glyph_weight: Self::DEFAULT_MIN_GLYPH_WEIGHT,
            max_skew: Self::DEFAULT_MAX_SKEW,
        }
    }
}
