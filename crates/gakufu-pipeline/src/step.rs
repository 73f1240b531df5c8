use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The processing steps a sheet goes through, in chronological order.
///
/// The derived `Ord` follows declaration order, so comparing two steps
/// compares their position in the pipeline.
#[derive(
    Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum Step {
    /// Decode the source image into the sheet picture.
    Load,
    /// Measure interline and line thickness from run lengths.
    Scale,
    /// Estimate the global skew angle of the picture.
    Skew,
    /// Detect staff line rows.
    Lines,
    /// Collect horizontal segments outside the staves (ledgers, endings).
    Horizontals,
    /// Group staff lines into staves and staves into systems.
    Systems,
    /// Detect barlines and count measures per system.
    Measures,
    /// Extract glyphs from the line-erased picture and tag coarse shapes.
    Symbols,
    /// Tag vertical sticks (stems) among the remaining glyphs.
    Verticals,
    /// Run the compound pattern suite to a fixed point in every system.
    Patterns,
    /// Build the per-system score summary.
    Score,
    /// Serialize the recognition result; optional, never run implicitly.
    Export,
}

impl Step {
    /// Every step, in pipeline order.
    pub const ALL: [Self; 12] = [
        Self::Load,
        Self::Scale,
        Self::Skew,
        Self::Lines,
        Self::Horizontals,
        Self::Systems,
        Self::Measures,
        Self::Symbols,
        Self::Verticals,
        Self::Patterns,
        Self::Score,
        Self::Export,
    ];

    pub const COUNT: usize = Self::ALL.len();
    pub const FIRST: Self = Self::Load;
    pub const LAST: Self = Self::Export;

    /// Position in the pipeline, starting at zero.
    #[must_use]
    pub const fn ordinal(self) -> usize {
        self as usize
    }

    /// Mandatory steps are pulled in automatically when a later target is
    /// requested; optional ones run only when named as the target.
    #[must_use]
    pub const fn is_mandatory(self) -> bool {
        !matches!(self, Self::Export)
    }

    /// Display tab the step's results belong to. Several steps share a tab.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Load | Self::Scale | Self::Skew => "Picture",
            Self::Lines | Self::Horizontals => "Lines",
            Self::Systems | Self::Measures => "Systems",
            Self::Symbols | Self::Verticals | Self::Patterns | Self::Score | Self::Export => {
                "Glyphs"
            }
        }
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::Load => "decode the source image",
            Self::Scale => "measure interline and line thickness",
            Self::Skew => "estimate the global skew angle",
            Self::Lines => "detect staff line rows",
            Self::Horizontals => "collect horizontal segments outside the staves",
            Self::Systems => "group staves into systems",
            Self::Measures => "detect barlines and count measures",
            Self::Symbols => "extract glyphs and tag coarse shapes",
            Self::Verticals => "tag vertical sticks",
            Self::Patterns => "run the compound pattern suite",
            Self::Score => "build the score summary",
            Self::Export => "serialize the recognition result",
        }
    }

    /// The step right after this one, if any.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::ALL.get(self.ordinal() + 1).copied()
    }

    /// All steps from `from` through `to`, inclusive. Empty when `from`
    /// comes after `to`.
    pub fn range(from: Self, to: Self) -> impl Iterator<Item = Self> {
        Self::ALL
            .into_iter()
            .filter(move |step| *step >= from && *step <= to)
    }

    /// The mandatory steps within `from..=to`, with `to` itself always
    /// included even when optional. Empty when `from` comes after `to`.
    #[must_use]
    pub fn mandatory_range(from: Self, to: Self) -> Vec<Self> {
        if from > to {
            return Vec::new();
        }
        let mut steps: Vec<Self> = Self::range(from, to)
            .filter(|step| step.is_mandatory())
            .collect();
        if steps.last() != Some(&to) {
            steps.push(to);
        }
        steps
    }

    /// Machine-readable name, matching the serde representation.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Scale => "scale",
            Self::Skew => "skew",
            Self::Lines => "lines",
            Self::Horizontals => "horizontals",
            Self::Systems => "systems",
            Self::Measures => "measures",
            Self::Symbols => "symbols",
            Self::Verticals => "verticals",
            Self::Patterns => "patterns",
            Self::Score => "score",
            Self::Export => "export",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error for parsing a step name that is not in the catalog.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("unknown step name: {0:?}")]
pub struct UnknownStep(pub String);

impl FromStr for Step {
    type Err = UnknownStep;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|step| step.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStep(s.to_owned()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn ordinals_follow_declaration_order() {
        for (index, step) in Step::ALL.into_iter().enumerate() {
            assert_eq!(step.ordinal(), index);
        }
        assert_eq!(Step::FIRST.ordinal(), 0);
        assert_eq!(Step::LAST.ordinal(), Step::COUNT - 1);
    }

    #[test]
    fn ordering_matches_pipeline_position() {
        assert!(Step::Load < Step::Scale);
        assert!(Step::Patterns < Step::Score);
        assert!(Step::Score < Step::Export);
    }

    #[test]
    fn next_walks_the_catalog() {
        assert_eq!(Step::Load.next(), Some(Step::Scale));
        assert_eq!(Step::Score.next(), Some(Step::Export));
        assert_eq!(Step::Export.next(), None);
    }

    #[test]
    fn only_export_is_optional() {
        let optional: Vec<Step> = Step::ALL
            .into_iter()
            .filter(|step| !step.is_mandatory())
            .collect();
        assert_eq!(optional, vec![Step::Export]);
    }

    #[test]
    fn mandatory_range_appends_optional_target() {
        let steps = Step::mandatory_range(Step::Score, Step::Export);
        assert_eq!(steps, vec![Step::Score, Step::Export]);
    }

    #[test]
    fn mandatory_range_is_empty_when_reversed() {
        assert!(Step::mandatory_range(Step::Score, Step::Load).is_empty());
    }

    #[test]
    fn mandatory_range_covers_full_pipeline() {
        let steps = Step::mandatory_range(Step::FIRST, Step::Score);
        assert_eq!(steps.len(), 11);
        assert_eq!(steps.first(), Some(&Step::Load));
        assert_eq!(steps.last(), Some(&Step::Score));
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for step in Step::ALL {
            assert_eq!(step.name().parse::<Step>().unwrap(), step);
        }
        assert_eq!("SYMBOLS".parse::<Step>().unwrap(), Step::Symbols);
        assert!("engrave".parse::<Step>().is_err());
    }
}
