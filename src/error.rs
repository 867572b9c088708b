use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecaptchaError {
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Error opening the file: {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Invalid image shape {width}x{height}: {reason}")]
    Shape {
        width: u32,
        height: u32,
        reason: String,
    },

    #[error("Failed to encode tile {index}: {message}")]
    Encode { index: usize, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid JSON response: {0}")]
    Parse(String),

    #[error("Failed to solve the CAPTCHA: no tiles matched")]
    NoMatch,

    #[error("Config error: {0}")]
    Config(String),
}

impl DecaptchaError {
    /// Process exit code for an error that ends the run.
    pub fn exit_code(&self) -> u8 {
        1
    }
}
