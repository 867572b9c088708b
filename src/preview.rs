//! Visual check of a solution: unselected squares dimmed, selected ones outlined.
//!
//! Presentation only. Nothing here feeds back into the selection.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::{Rgb, RgbImage};
use tracing::info;

use crate::solver::grid::{tile_origin, tile_side, TILE_COUNT};
use crate::solver::image_prep::open_rgb;
use crate::solver::SelectionSet;

/// Outline colour for selected squares.
pub const BORDER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);

/// Draw the overlay on a copy of the original (unblurred) image.
///
/// Tiles are sized from the shorter side, so non-square input only leaves
/// its excess strip untouched.
pub fn render_preview(original: &RgbImage, selection: &SelectionSet) -> RgbImage {
    let mut image = original.clone();
    let side = tile_side(image.width().min(image.height()));
    if side == 0 {
        return image;
    }

    for index in 0..TILE_COUNT {
        let (x, y) = tile_origin(index, side);
        if selection.contains(index) {
            draw_border(&mut image, x, y, side);
        } else {
            darken(&mut image, x, y, side);
        }
    }
    image
}

fn darken(image: &mut RgbImage, x: u32, y: u32, side: u32) {
    for dy in 0..side {
        for dx in 0..side {
            let pixel = image.get_pixel_mut(x + dx, y + dy);
            for channel in pixel.0.iter_mut() {
                *channel /= 2;
            }
        }
    }
}

fn draw_border(image: &mut RgbImage, x: u32, y: u32, side: u32) {
    let last = side - 1;
    for i in 0..side {
        image.put_pixel(x + i, y, BORDER_COLOR);
        image.put_pixel(x + i, y + last, BORDER_COLOR);
        image.put_pixel(x, y + i, BORDER_COLOR);
        image.put_pixel(x + last, y + i, BORDER_COLOR);
    }
}

/// Re-open the original image, render the overlay, and show it.
///
/// With `output` set the PNG is written there and nothing is opened.
/// Otherwise it goes to a kept temporary file opened in the system viewer.
/// Returns the path written.
pub fn show_preview(image_path: &Path, selection: &SelectionSet, output: Option<&Path>) -> Result<PathBuf> {
    let original = open_rgb(image_path)
        .with_context(|| format!("Failed to reopen {} for preview", image_path.display()))?;
    let preview = render_preview(&original, selection);

    if let Some(path) = output {
        preview
            .save(path)
            .with_context(|| format!("Failed to write preview to {}", path.display()))?;
        info!("Preview written to {}", path.display());
        return Ok(path.to_path_buf());
    }

    let file = tempfile::Builder::new()
        .prefix("decaptcha-preview-")
        .suffix(".png")
        .tempfile()
        .context("Failed to create preview file")?;
    let (_, path) = file.keep().context("Failed to keep preview file")?;

    preview
        .save(&path)
        .with_context(|| format!("Failed to write preview to {}", path.display()))?;
    open_in_viewer(&path)?;
    info!("Preview opened from {}", path.display());
    Ok(path)
}

/// Launch the platform's default image viewer.
fn open_in_viewer(path: &Path) -> Result<()> {
    let mut cmd = if cfg!(target_os = "macos") {
        std::process::Command::new("open")
    } else if cfg!(target_os = "windows") {
        let mut cmd = std::process::Command::new("cmd");
        cmd.args(["/C", "start", ""]);
        cmd
    } else {
        std::process::Command::new("xdg-open")
    };

    cmd.arg(path)
        .spawn()
        .with_context(|| format!("Failed to open image viewer for {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn grey(side: u32) -> RgbImage {
        RgbImage::from_pixel(side, side, Rgb([200, 100, 51]))
    }

    #[test]
    fn test_unselected_tiles_are_halved() {
        let preview = render_preview(&grey(90), &SelectionSet::from_indices([4]));
        assert_eq!(preview.get_pixel(15, 15), &Rgb([100, 50, 25]));
        assert_eq!(preview.get_pixel(75, 75), &Rgb([100, 50, 25]));
    }

    #[test]
    fn test_selected_tiles_are_outlined() {
        let preview = render_preview(&grey(90), &SelectionSet::from_indices([4]));
        // tile 4 spans 30..60
        assert_eq!(preview.get_pixel(30, 30), &BORDER_COLOR);
        assert_eq!(preview.get_pixel(59, 45), &BORDER_COLOR);
        assert_eq!(preview.get_pixel(45, 59), &BORDER_COLOR);
        assert_eq!(preview.get_pixel(45, 45), &Rgb([200, 100, 51]), "interior untouched");
    }

    #[test]
    fn test_non_square_input_stays_in_bounds() {
        for (width, height) in [(90, 60), (60, 90)] {
            let original = RgbImage::from_pixel(width, height, Rgb([200, 100, 51]));
            let preview = render_preview(&original, &SelectionSet::from_indices([8]));

            assert_eq!(preview.dimensions(), (width, height));
            // 60px short side: tile 8 spans 40..60
            assert_eq!(preview.get_pixel(40, 40), &BORDER_COLOR);
            assert_eq!(preview.get_pixel(10, 10), &Rgb([100, 50, 25]));
            assert_eq!(preview.get_pixel(width - 1, height - 1), &Rgb([200, 100, 51]));
        }
    }

    #[test]
    fn test_original_is_not_mutated() {
        let original = grey(30);
        let _ = render_preview(&original, &SelectionSet::from_indices([0]));
        assert!(original.pixels().all(|p| p == &Rgb([200, 100, 51])));
    }

    #[test]
    fn test_show_preview_writes_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("captcha.png");
        grey(60).save(&input).unwrap();
        let output = dir.path().join("preview.png");

        let written = show_preview(&input, &SelectionSet::from_indices([0, 8]), Some(&output)).unwrap();
        assert_eq!(written, output);

        let saved = image::open(&output).unwrap().to_rgb8();
        assert_eq!(saved.get_pixel(0, 0), &BORDER_COLOR);
        assert_eq!(saved.get_pixel(30, 30), &Rgb([100, 50, 25]));
    }

    #[test]
    fn test_show_preview_missing_input() {
        let dir = TempDir::new().unwrap();
        let result = show_preview(&dir.path().join("gone.png"), &SelectionSet::default(), None);
        assert!(result.is_err());
    }
}
