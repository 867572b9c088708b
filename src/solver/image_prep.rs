//! Image loading, validation, blurring, and tile encoding.
//!
//! CAPTCHA grids are assumed square. Anything else is a usage error and
//! is rejected before a single request leaves the process.

use std::io::Cursor;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageError, ImageFormat, ImageReader, RgbImage};
use tracing::debug;

use crate::error::DecaptchaError;

use super::grid::{Tile, GRID_SIZE};

/// Blur radius used when none is given.
pub const DEFAULT_BLUR_RADIUS: u32 = 2;

/// Compressed format tiles are sent in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileFormat {
    #[default]
    Jpeg,
    /// Lossless; the server sees exactly the tile's pixels.
    Png,
}

impl TileFormat {
    fn image_format(self) -> ImageFormat {
        match self {
            TileFormat::Jpeg => ImageFormat::Jpeg,
            TileFormat::Png => ImageFormat::Png,
        }
    }

    /// Media type of the encoded bytes.
    pub fn media_type(self) -> &'static str {
        match self {
            TileFormat::Jpeg => "image/jpeg",
            TileFormat::Png => "image/png",
        }
    }
}

/// Load a square image from disk and blur it ahead of tiling.
///
/// # Errors
/// - `NotFound` if `path` does not exist
/// - `Read` if the file cannot be decoded as an image
/// - `Shape` if the image is not square or too small for a 3x3 grid
pub fn load_and_preprocess(path: &Path, blur_radius: u32) -> Result<RgbImage, DecaptchaError> {
    let image = open_rgb(path)?;
    let (width, height) = image.dimensions();
    debug!("Loaded image {}: {}x{}", path.display(), width, height);

    validate_square(width, height)?;

    Ok(apply_blur(image, blur_radius))
}

/// Open an image file as RGB8, mapping failures onto the error taxonomy.
///
/// The format is detected from the file's leading bytes, so the extension
/// may be missing or wrong.
pub fn open_rgb(path: &Path) -> Result<RgbImage, DecaptchaError> {
    if !path.exists() {
        return Err(DecaptchaError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let read_error = |source: ImageError| DecaptchaError::Read {
        path: path.to_path_buf(),
        source,
    };

    let image = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|e| read_error(ImageError::IoError(e)))?
        .decode()
        .map_err(read_error)?;

    Ok(image.to_rgb8())
}

fn validate_square(width: u32, height: u32) -> Result<(), DecaptchaError> {
    if width != height {
        return Err(DecaptchaError::Shape {
            width,
            height,
            reason: "image is not a square".to_string(),
        });
    }
    if width < GRID_SIZE {
        return Err(DecaptchaError::Shape {
            width,
            height,
            reason: format!("image is too small for a {0}x{0} grid", GRID_SIZE),
        });
    }
    Ok(())
}

/// Gaussian blur with sigma equal to `radius`. Radius 0 leaves the image untouched.
pub fn apply_blur(image: RgbImage, radius: u32) -> RgbImage {
    if radius == 0 {
        return image;
    }
    image::imageops::blur(&image, radius as f32)
}

/// Encode a tile into compressed image bytes, entirely in memory.
pub fn encode_tile(tile: &Tile, format: TileFormat) -> Result<Vec<u8>, DecaptchaError> {
    let mut buffer = Cursor::new(Vec::new());
    tile.image
        .write_to(&mut buffer, format.image_format())
        .map_err(|e| DecaptchaError::Encode {
            index: tile.index,
            message: e.to_string(),
        })?;
    Ok(buffer.into_inner())
}

/// Encode a tile and wrap the bytes in standard base64 for the JSON payload.
pub fn encode_tile_base64(tile: &Tile, format: TileFormat) -> Result<String, DecaptchaError> {
    let bytes = encode_tile(tile, format)?;
    debug!(
        "Encoded tile {} as {}: {} bytes",
        tile.index,
        format.media_type(),
        bytes.len()
    );
    Ok(STANDARD.encode(&bytes))
}
