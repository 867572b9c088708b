//! Grid CAPTCHA solving with a vision completion server.

pub mod generation;
pub mod grid;
pub mod image_prep;
pub mod observer;
pub mod pipeline;
pub mod prompts;
pub mod selection;
pub mod types;
pub mod vision;

pub use generation::{default_generation_params, resolve_generation_params, GenerationParams};
pub use grid::{split_grid, Tile, TILE_COUNT};
pub use image_prep::{load_and_preprocess, TileFormat};
pub use observer::{RecordingObserver, SolveEvent, SolveObserver, TracingObserver};
pub use pipeline::{Solver, SolverConfig};
pub use selection::{aggregate, CountWarning, SelectionSet};
pub use types::*;
pub use vision::{ContainsDigitOracle, ResponseOracle, VisionClient};
