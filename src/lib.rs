//! decaptcha: solve "select all squares containing X" grid CAPTCHAs.
//!
//! The pipeline stages are:
//!
//! 1. **Preprocess** – load, check the image is square, blur.
//! 2. **Split** – cut a 3x3 grid of equal tiles, row-major.
//! 3. **Classify** – ask a vision completion server about each tile.
//! 4. **Aggregate** – collect the matching indices and sanity-check the count.

pub mod error;
pub mod preview;
pub mod solver;

pub use error::DecaptchaError;
pub use solver::{SelectionSet, Solution, Solver, SolverConfig};

/// Install the global `tracing` subscriber, writing to stderr.
///
/// `RUST_LOG` takes precedence over `default_filter` when set.
pub fn init_tracing(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    // A subscriber may already be installed (tests, embedding callers).
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
