//! Type definitions shared across the solving pipeline.

use super::selection::{CountWarning, SelectionSet};

/// Per-tile result of one classification request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileOutcome {
    /// Row-major tile index (0-8)
    pub index: usize,
    /// Whether the oracle judged the tile to contain the target
    pub selected: bool,
    /// Raw `content` text from the server, if a response was parsed
    pub response: Option<String>,
    /// Why the tile was skipped, if its request failed
    pub error: Option<String>,
}

impl TileOutcome {
    pub fn classified(index: usize, response: String, selected: bool) -> Self {
        Self {
            index,
            selected,
            response: Some(response),
            error: None,
        }
    }

    /// A tile whose request failed counts as unselected.
    pub fn failed(index: usize, error: String) -> Self {
        Self {
            index,
            selected: false,
            response: None,
            error: Some(error),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Everything a run produces, handed to the CLI and the preview renderer.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Tiles judged positive, ascending
    pub selection: SelectionSet,
    /// One outcome per tile, sorted by index
    pub outcomes: Vec<TileOutcome>,
    /// Set when the match count falls outside the usual range
    pub warning: Option<CountWarning>,
    /// Side length of the source image in pixels
    pub image_side: u32,
    /// Side length of each tile in pixels
    pub tile_side: u32,
}

impl Solution {
    pub fn failed_tiles(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }
}
