//! Vision completion calls used to classify individual tiles.
//!
//! One POST per tile, no retries. Whatever goes wrong with a single
//! request is reported as `Transport` or `Parse` so the caller can mark
//! the tile unselected and carry on.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::DecaptchaError;

use super::generation::GenerationParams;
use super::grid::Tile;
use super::image_prep::{encode_tile_base64, TileFormat};
use super::prompts::{build_completion_prompt, IMAGE_SLOT_ID};

/// Default request timeout for the completion server.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Turns the server's free-text answer into a yes/no decision.
pub trait ResponseOracle: Send + Sync {
    fn is_match(&self, content: &str) -> bool;
}

/// Matches whenever the literal character `1` appears anywhere in the text,
/// including inside longer answers such as "10" or "1 bicycle".
#[derive(Debug, Default, Clone, Copy)]
pub struct ContainsDigitOracle;

impl ResponseOracle for ContainsDigitOracle {
    fn is_match(&self, content: &str) -> bool {
        content.contains('1')
    }
}

#[derive(Debug, Serialize)]
struct ImageData {
    data: String,
    id: i32,
}

/// Request body for the llama.cpp `/completion` endpoint.
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    #[serde(flatten)]
    generation: &'a GenerationParams,
    image_data: Vec<ImageData>,
    cache_prompt: bool,
    slot_id: i32,
    prompt: String,
}

impl<'a> CompletionRequest<'a> {
    fn new(generation: &'a GenerationParams, image_base64: String, prompt: &str) -> Self {
        Self {
            generation,
            image_data: vec![ImageData {
                data: image_base64,
                id: IMAGE_SLOT_ID,
            }],
            cache_prompt: true,
            slot_id: -1,
            prompt: build_completion_prompt(prompt),
        }
    }
}

/// Pull the `content` text out of a completion response body.
///
/// The body must be a JSON object. A missing or non-string `content`
/// reads as empty text.
pub fn extract_content(body: &str) -> Result<String, DecaptchaError> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| DecaptchaError::Parse(e.to_string()))?;

    let object = value
        .as_object()
        .ok_or_else(|| DecaptchaError::Parse("response is not a JSON object".to_string()))?;

    Ok(object
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string())
}

/// HTTP client for the completion server.
#[derive(Debug, Clone)]
pub struct VisionClient {
    client: reqwest::Client,
    server_url: Url,
    generation: GenerationParams,
    format: TileFormat,
}

impl VisionClient {
    pub fn new(
        server_url: Url,
        timeout: Duration,
        generation: GenerationParams,
        format: TileFormat,
    ) -> Result<Self, DecaptchaError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DecaptchaError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            server_url,
            generation,
            format,
        })
    }

    /// Send one tile with the prompt and return the server's `content` text.
    pub async fn complete(&self, tile: &Tile, prompt: &str) -> Result<String, DecaptchaError> {
        let image_base64 = encode_tile_base64(tile, self.format)?;
        let body = CompletionRequest::new(&self.generation, image_base64, prompt);

        debug!("Sending square {} to {}", tile.index, self.server_url);
        let response = self
            .client
            .post(self.server_url.clone())
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    DecaptchaError::Transport(format!("request timed out for square {}", tile.index))
                } else {
                    DecaptchaError::Transport(format!("request failed for square {}: {}", tile.index, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DecaptchaError::Transport(format!(
                "HTTP {} {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        let text = response
            .text()
            .await
            .map_err(|e| DecaptchaError::Transport(format!("Failed to read response body: {}", e)))?;

        extract_content(&text)
    }

    /// Classify one tile: request a completion and hand the text to the oracle.
    pub async fn classify(
        &self,
        tile: &Tile,
        prompt: &str,
        oracle: &dyn ResponseOracle,
    ) -> Result<(String, bool), DecaptchaError> {
        let content = self.complete(tile, prompt).await?;
        let selected = oracle.is_match(&content);
        Ok((content, selected))
    }
}
