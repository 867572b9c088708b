//! Aggregation of per-tile outcomes into the final selection.
//!
//! The 3-4 match range is a heuristic for this CAPTCHA style: counts
//! outside it are flagged, never rejected.

use std::fmt;

use crate::error::DecaptchaError;

use super::grid::TILE_COUNT;
use super::types::TileOutcome;

/// Fewest matches a typical challenge expects.
pub const EXPECTED_MIN_MATCHES: usize = 3;

/// Most matches a typical challenge expects.
pub const EXPECTED_MAX_MATCHES: usize = 4;

/// Ascending, duplicate-free set of tile indices in `0..9`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet(Vec<usize>);

impl SelectionSet {
    /// Build a set from arbitrary indices; out-of-range values are dropped.
    pub fn from_indices(indices: impl IntoIterator<Item = usize>) -> Self {
        let mut indices: Vec<usize> = indices.into_iter().filter(|&i| i < TILE_COUNT).collect();
        indices.sort_unstable();
        indices.dedup();
        Self(indices)
    }

    pub fn indices(&self) -> &[usize] {
        &self.0
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.binary_search(&index).is_ok()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Comma separated with no spaces, e.g. `0,3,4,7`.
impl fmt::Display for SelectionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .0
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(",");
        f.write_str(&joined)
    }
}

/// Sanity-check signal for an unusual number of matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountWarning {
    TooFew(usize),
    TooMany(usize),
}

impl fmt::Display for CountWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CountWarning::TooFew(n) => write!(
                f,
                "Less than {} squares selected ({})",
                EXPECTED_MIN_MATCHES, n
            ),
            CountWarning::TooMany(n) => write!(
                f,
                "More than {} squares selected ({})",
                EXPECTED_MAX_MATCHES, n
            ),
        }
    }
}

/// Result of aggregation: the selection plus an optional count warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregate {
    pub selection: SelectionSet,
    pub warning: Option<CountWarning>,
}

/// Check a match count against the expected range.
pub fn count_warning(count: usize) -> Option<CountWarning> {
    if count < EXPECTED_MIN_MATCHES {
        Some(CountWarning::TooFew(count))
    } else if count > EXPECTED_MAX_MATCHES {
        Some(CountWarning::TooMany(count))
    } else {
        None
    }
}

/// Collect selected tiles. Fails with `NoMatch` when nothing was selected.
///
/// Outcomes may arrive in any order and may be fewer than 9; missing
/// tiles count as unselected.
pub fn aggregate(outcomes: &[TileOutcome]) -> Result<Aggregate, DecaptchaError> {
    let selection = SelectionSet::from_indices(
        outcomes.iter().filter(|o| o.selected).map(|o| o.index),
    );

    if selection.is_empty() {
        return Err(DecaptchaError::NoMatch);
    }

    let warning = count_warning(selection.len());
    Ok(Aggregate { selection, warning })
}
