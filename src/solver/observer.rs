//! Event sink injected into the pipeline.
//!
//! Components report what happened through a `SolveObserver` instead of
//! logging directly, so callers decide where events go.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, info, warn};

use crate::error::DecaptchaError;

use super::selection::CountWarning;
use super::types::TileOutcome;

/// Receives pipeline events. Every method defaults to a no-op.
pub trait SolveObserver: Send + Sync {
    fn image_loaded(&self, _width: u32, _height: u32) {}

    fn tile_classified(&self, _outcome: &TileOutcome) {}

    fn tile_failed(&self, _index: usize, _error: &DecaptchaError) {}

    fn count_warning(&self, _warning: CountWarning) {}
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SolveObserver for TracingObserver {
    fn image_loaded(&self, width: u32, height: u32) {
        debug!("Preprocessed image: {}x{}", width, height);
    }

    fn tile_classified(&self, outcome: &TileOutcome) {
        info!(
            "Square {}: {}",
            outcome.index,
            outcome.response.as_deref().unwrap_or_default()
        );
        if outcome.selected {
            info!("Found match in square {}", outcome.index);
        }
    }

    fn tile_failed(&self, index: usize, err: &DecaptchaError) {
        match err {
            DecaptchaError::Parse(detail) => {
                error!("Invalid JSON response for square {}: {}", index, detail)
            }
            _ => warn!("Failed to get response for square {}: {}", index, err),
        }
    }

    fn count_warning(&self, warning: CountWarning) {
        warn!("{}", warning);
    }
}

/// A recorded pipeline event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveEvent {
    ImageLoaded { width: u32, height: u32 },
    TileClassified { index: usize, selected: bool },
    TileFailed { index: usize, message: String },
    CountWarning(CountWarning),
}

/// Keeps every event in memory, in arrival order.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<SolveEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SolveEvent> {
        self.lock().clone()
    }

    fn push(&self, event: SolveEvent) {
        self.lock().push(event);
    }

    /// Events are only ever appended, so a poisoned list is still consistent.
    fn lock(&self) -> MutexGuard<'_, Vec<SolveEvent>> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl SolveObserver for RecordingObserver {
    fn image_loaded(&self, width: u32, height: u32) {
        self.push(SolveEvent::ImageLoaded { width, height });
    }

    fn tile_classified(&self, outcome: &TileOutcome) {
        self.push(SolveEvent::TileClassified {
            index: outcome.index,
            selected: outcome.selected,
        });
    }

    fn tile_failed(&self, index: usize, err: &DecaptchaError) {
        self.push(SolveEvent::TileFailed {
            index,
            message: err.to_string(),
        });
    }

    fn count_warning(&self, warning: CountWarning) {
        self.push(SolveEvent::CountWarning(warning));
    }
}
