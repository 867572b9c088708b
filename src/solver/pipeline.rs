//! End-to-end solving: preprocess, split, classify, aggregate.
//!
//! Tiles are classified with at most `concurrency` requests in flight.
//! Each task carries its tile index, and outcomes are sorted by index
//! before aggregation, so completion order never leaks into the result.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};
use url::Url;

use crate::error::DecaptchaError;

use super::generation::GenerationParams;
use super::grid::{split_grid, tile_side, Tile, TILE_COUNT};
use super::image_prep::{load_and_preprocess, TileFormat, DEFAULT_BLUR_RADIUS};
use super::observer::{SolveObserver, TracingObserver};
use super::prompts::{render_prompt, DEFAULT_PROMPT_TEMPLATE};
use super::selection::aggregate;
use super::types::{Solution, TileOutcome};
use super::vision::{ContainsDigitOracle, ResponseOracle, VisionClient, DEFAULT_TIMEOUT};

/// Completion endpoint used when none is given.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080/completion";

/// Requests in flight when none is given.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Settings for one solving run.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// What the challenge asks for, e.g. "traffic light"
    pub target: String,
    /// Prompt template containing `{target}`
    pub prompt_template: String,
    pub server_url: String,
    pub blur_radius: u32,
    pub timeout: Duration,
    /// Maximum concurrent tile requests (1-9)
    pub concurrency: usize,
    pub tile_format: TileFormat,
    pub generation: GenerationParams,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            target: String::new(),
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            server_url: DEFAULT_SERVER_URL.to_string(),
            blur_radius: DEFAULT_BLUR_RADIUS,
            timeout: DEFAULT_TIMEOUT,
            concurrency: DEFAULT_CONCURRENCY,
            tile_format: TileFormat::default(),
            generation: GenerationParams::default(),
        }
    }
}

impl SolverConfig {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Self::default()
        }
    }

    /// Check the settings and return the parsed server URL.
    pub fn validate(&self) -> Result<Url, DecaptchaError> {
        if !(1..=TILE_COUNT).contains(&self.concurrency) {
            return Err(DecaptchaError::Config(format!(
                "concurrency must be between 1 and {}, got {}",
                TILE_COUNT, self.concurrency
            )));
        }
        if self.timeout.is_zero() {
            return Err(DecaptchaError::Config("timeout must be greater than zero".to_string()));
        }

        let url = Url::parse(&self.server_url).map_err(|e| {
            DecaptchaError::Config(format!("Invalid server URL '{}': {}", self.server_url, e))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(DecaptchaError::Config(format!(
                "Unsupported server URL scheme '{}'. Supported: http, https",
                other
            ))),
        }
    }

    /// The classification prompt with the target substituted in.
    pub fn prompt(&self) -> String {
        render_prompt(&self.prompt_template, &self.target)
    }
}

/// Runs the whole pipeline against one image.
pub struct Solver {
    config: SolverConfig,
    client: VisionClient,
    oracle: Arc<dyn ResponseOracle>,
    observer: Arc<dyn SolveObserver>,
}

impl Solver {
    /// Build a solver with the default oracle and a `tracing` observer.
    pub fn new(config: SolverConfig) -> Result<Self, DecaptchaError> {
        let url = config.validate()?;
        let client = VisionClient::new(
            url,
            config.timeout,
            config.generation.clone(),
            config.tile_format,
        )?;

        Ok(Self {
            config,
            client,
            oracle: Arc::new(ContainsDigitOracle),
            observer: Arc::new(TracingObserver),
        })
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn ResponseOracle>) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn SolveObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Solve the CAPTCHA at `image_path`.
    ///
    /// # Errors
    /// - `NotFound`, `Read`, `Shape` before any request is sent
    /// - `NoMatch` if no tile was selected
    ///
    /// Per-tile failures are reported to the observer and count as unselected.
    pub async fn solve(&self, image_path: &Path) -> Result<Solution, DecaptchaError> {
        let image = load_and_preprocess(image_path, self.config.blur_radius)?;
        let image_side = image.width();
        self.observer.image_loaded(image.width(), image.height());

        let tiles = split_grid(&image);
        drop(image);

        let prompt = self.config.prompt();
        info!(
            "Classifying {} squares against '{}' with {} request(s) in flight",
            tiles.len(),
            self.config.target,
            self.config.concurrency
        );

        let outcomes = self.classify_tiles(tiles, prompt).await;

        let aggregate = aggregate(&outcomes)?;
        if let Some(warning) = aggregate.warning {
            self.observer.count_warning(warning);
        }

        Ok(Solution {
            selection: aggregate.selection,
            outcomes,
            warning: aggregate.warning,
            image_side,
            tile_side: tile_side(image_side),
        })
    }

    /// Classify every tile, returning outcomes sorted by tile index.
    pub async fn classify_tiles(&self, tiles: Vec<Tile>, prompt: String) -> Vec<TileOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let prompt: Arc<str> = Arc::from(prompt);
        let mut tasks = JoinSet::new();

        for tile in tiles {
            let semaphore = Arc::clone(&semaphore);
            let prompt = Arc::clone(&prompt);
            let client = self.client.clone();
            let oracle = Arc::clone(&self.oracle);
            let observer = Arc::clone(&self.observer);

            tasks.spawn(async move {
                let index = tile.index;
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return TileOutcome::failed(index, "request pool closed".to_string());
                    }
                };

                match client.classify(&tile, &prompt, oracle.as_ref()).await {
                    Ok((content, selected)) => {
                        let outcome = TileOutcome::classified(index, content, selected);
                        observer.tile_classified(&outcome);
                        outcome
                    }
                    Err(err) => {
                        observer.tile_failed(index, &err);
                        TileOutcome::failed(index, err.to_string())
                    }
                }
            });
        }

        let mut outcomes = Vec::with_capacity(TILE_COUNT);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => warn!("Tile classification task failed: {}", e),
            }
        }

        outcomes.sort_by_key(|o| o.index);
        outcomes
    }
}
