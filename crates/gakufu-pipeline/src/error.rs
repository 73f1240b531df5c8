use crate::step::Step;

/// Failures raised by step implementations or by the driver itself.
#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("source image data is empty")]
    EmptyInput,

    #[error("failed to decode sheet image: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("sheet picture is not loaded")]
    NoPicture,

    #[error("sheet scale is not available")]
    NoScale,

    #[error("measured interline {interline:.1} px is out of the usable range")]
    DegenerateScale { interline: f64 },

    #[error("fewer than {minimum} staff lines detected ({found})")]
    NoStaffLines { found: usize, minimum: usize },

    #[error("no systems detected")]
    NoSystems,

    #[error("no implementation registered for step {0}")]
    Unimplemented(Step),

    #[error("pattern run failed: {0}")]
    Pattern(#[from] gakufu_patterns::PatternError),

    #[error("score summary is not available")]
    NoSummary,

    #[error("export serialization failed: {0}")]
    Export(#[from] serde_json::Error),
}
