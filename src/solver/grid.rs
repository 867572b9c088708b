//! Row-major 3x3 tiling of a square CAPTCHA image.

use image::{imageops, RgbImage};
use tracing::debug;

/// Tiles per row and per column.
pub const GRID_SIZE: u32 = 3;

/// Total number of tiles in the grid.
pub const TILE_COUNT: usize = (GRID_SIZE * GRID_SIZE) as usize;

/// One cell of the grid, tagged with its row-major index.
#[derive(Debug, Clone)]
pub struct Tile {
    pub index: usize,
    pub image: RgbImage,
}

impl Tile {
    pub fn new(index: usize, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn side(&self) -> u32 {
        self.image.width()
    }
}

/// Side length of every tile cut from an image of the given width.
pub fn tile_side(image_width: u32) -> u32 {
    image_width / GRID_SIZE
}

/// Top-left pixel of tile `index`.
pub fn tile_origin(index: usize, side: u32) -> (u32, u32) {
    let column = index as u32 % GRID_SIZE;
    let row = index as u32 / GRID_SIZE;
    (column * side, row * side)
}

/// Split an image into 9 equal square tiles, row 0 left to right first.
///
/// Widths that are not a multiple of 3 lose their remainder pixels on the
/// right and bottom edges.
pub fn split_grid(image: &RgbImage) -> Vec<Tile> {
    let side = tile_side(image.width());
    let remainder = image.width() - side * GRID_SIZE;
    if remainder > 0 {
        debug!("Dropping {} remainder pixel(s) on the right and bottom edges", remainder);
    }

    (0..TILE_COUNT)
        .map(|index| {
            let (x, y) = tile_origin(index, side);
            Tile::new(index, imageops::crop_imm(image, x, y, side, side).to_image())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Each tile painted with a colour derived from its index.
    fn indexed_image(side: u32) -> RgbImage {
        let tile = side / GRID_SIZE;
        RgbImage::from_fn(side, side, |x, y| {
            let col = (x / tile).min(GRID_SIZE - 1);
            let row = (y / tile).min(GRID_SIZE - 1);
            let index = (row * GRID_SIZE + col) as u8;
            Rgb([index * 20, 0, 255 - index * 20])
        })
    }

    #[test]
    fn test_split_produces_nine_tiles() {
        for side in [3, 9, 100, 300, 301, 302] {
            let tiles = split_grid(&RgbImage::new(side, side));
            assert_eq!(tiles.len(), TILE_COUNT, "side {}", side);
            for tile in &tiles {
                assert_eq!(tile.side(), side / 3, "side {}", side);
                assert_eq!(tile.image.height(), side / 3, "side {}", side);
            }
        }
    }

    #[test]
    fn test_tiles_are_row_major() {
        let tiles = split_grid(&indexed_image(300));
        for (i, tile) in tiles.iter().enumerate() {
            assert_eq!(tile.index, i);
            let expected = Rgb([i as u8 * 20, 0, 255 - i as u8 * 20]);
            assert_eq!(tile.image.get_pixel(0, 0), &expected, "tile {} top-left", i);
            assert_eq!(tile.image.get_pixel(99, 99), &expected, "tile {} bottom-right", i);
        }
    }

    #[test]
    fn test_remainder_pixels_are_dropped() {
        let mut image = RgbImage::new(302, 302);
        for i in 0..302 {
            image.put_pixel(300, i, Rgb([255, 0, 0]));
            image.put_pixel(301, i, Rgb([255, 0, 0]));
            image.put_pixel(i, 300, Rgb([255, 0, 0]));
            image.put_pixel(i, 301, Rgb([255, 0, 0]));
        }

        let tiles = split_grid(&image);
        assert!(tiles
            .iter()
            .all(|t| t.image.pixels().all(|p| p == &Rgb([0, 0, 0]))));
    }

    #[test]
    fn test_tile_origin() {
        assert_eq!(tile_origin(0, 100), (0, 0));
        assert_eq!(tile_origin(2, 100), (200, 0));
        assert_eq!(tile_origin(3, 100), (0, 100));
        assert_eq!(tile_origin(4, 100), (100, 100));
        assert_eq!(tile_origin(8, 100), (200, 200));
    }

    #[test]
    fn test_split_is_deterministic() {
        let image = indexed_image(99);
        let first = split_grid(&image);
        let second = split_grid(&image);
        for (a, b) in first.iter().zip(second.iter()) {
            assert_eq!(a.index, b.index);
            assert_eq!(a.image, b.image);
        }
    }
}
