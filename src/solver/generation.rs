//! Sampling parameters for the completion endpoint.
//!
//! Provides three loading methods:
//! - `default_generation_params()` - embedded defaults compiled into the binary
//! - `load_generation_params(path)` - a custom TOML file
//! - `resolve_generation_params(path)` - explicit path, then the user config dir, then defaults

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default parameters embedded in the binary at compile time.
const DEFAULT_GENERATION: &str = include_str!("../../config/generation.toml");

/// Sampling parameters sent with every tile request.
///
/// Field names match the llama.cpp `/completion` API and are serialized
/// verbatim into the request body. Fields missing from a TOML override
/// keep their default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    pub stream: bool,
    pub n_predict: i32,
    pub temperature: f64,
    pub stop: Vec<String>,
    pub repeat_last_n: i32,
    pub repeat_penalty: f64,
    pub top_k: i32,
    pub top_p: f64,
    pub min_p: f64,
    pub tfs_z: f64,
    pub typical_p: f64,
    pub presence_penalty: f64,
    pub frequency_penalty: f64,
    pub mirostat: i32,
    pub mirostat_tau: f64,
    pub mirostat_eta: f64,
    pub grammar: String,
    pub n_probs: i32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            stream: false,
            n_predict: 400,
            temperature: 0.1,
            stop: vec!["</s>".into(), "Llama:".into(), "User:".into()],
            repeat_last_n: 256,
            repeat_penalty: 1.18,
            top_k: 40,
            top_p: 0.5,
            min_p: 0.05,
            tfs_z: 1.0,
            typical_p: 1.0,
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            mirostat: 0,
            mirostat_tau: 5.0,
            mirostat_eta: 0.1,
            grammar: String::new(),
            n_probs: 0,
        }
    }
}

/// Load generation parameters from a TOML file at the given path.
pub fn load_generation_params(path: &Path) -> Result<GenerationParams> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read generation config {}", path.display()))?;
    let params: GenerationParams = toml::from_str(&content)
        .with_context(|| format!("Invalid generation config {}", path.display()))?;
    Ok(params)
}

/// Get the default generation parameters embedded in the binary.
pub fn default_generation_params() -> GenerationParams {
    toml::from_str(DEFAULT_GENERATION).expect("embedded generation.toml must be valid TOML")
}

/// Per-user override location: `<config dir>/decaptcha/generation.toml`.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("decaptcha").join("generation.toml"))
}

/// Pick the generation parameters for a run.
///
/// An explicit path must load. The user config file is used only if it
/// exists; otherwise the embedded defaults apply.
pub fn resolve_generation_params(explicit: Option<&Path>) -> Result<GenerationParams> {
    if let Some(path) = explicit {
        info!("Loading generation config from {}", path.display());
        return load_generation_params(path);
    }

    if let Some(path) = user_config_path().filter(|p| p.is_file()) {
        info!("Loading generation config from {}", path.display());
        return load_generation_params(&path);
    }

    debug!("Using embedded generation config");
    Ok(default_generation_params())
}
