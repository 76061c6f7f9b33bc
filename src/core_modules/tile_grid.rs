// THEORY:
// The `TileGrid` turns a frame geometry and a tile size into the set of tiles the
// mosaic transform visits. It is derived per call and never stored in a frame.
//
// Key architectural principles:
// 1.  **Integer Division**: The grid has `width / tile_width` columns and
//     `height / tile_height` rows. Every tile is exactly `tile_width x tile_height`.
// 2.  **Uncovered Remainder**: When the frame is not an exact multiple of the tile
//     size, a strip on the right and/or bottom edge belongs to no tile. Nothing in
//     the engine ever visits it; `covered_width` / `covered_height` describe where it
//     starts so that callers can pre-fill it.
// 3.  **Validation at the Door**: A zero tile size would divide by zero and a tile
//     larger than the frame would produce an empty grid. Both are rejected here,
//     before any pixel is touched.

use crate::core_modules::error::{MosaicError, Result};
use crate::core_modules::frame::FrameLayout;
use crate::core_modules::tile::tile::Tile;

/// A validated division of a frame into equally sized tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    /// The geometry of the frame being tiled.
    layout: FrameLayout,
    /// The width of a single tile in pixels.
    tile_width: usize,
    /// The height of a single tile in pixels.
    tile_height: usize,
    /// The width of the grid in tiles (frame width / tile width).
    columns: usize,
    /// The height of the grid in tiles (frame height / tile height).
    rows: usize,
}

impl TileGrid {
    pub fn new(layout: FrameLayout, tile_width: usize, tile_height: usize) -> Result<Self> {
        if tile_width == 0 || tile_height == 0 {
            return Err(MosaicError::invalid_argument(format!(
                "tile size must be positive, got {tile_width}x{tile_height}"
            )));
        }

        let columns = layout.width() / tile_width;
        let rows = layout.height() / tile_height;
        if columns == 0 || rows == 0 {
            return Err(MosaicError::invalid_argument(format!(
                "tile {tile_width}x{tile_height} does not fit in a {}x{} frame",
                layout.width(),
                layout.height()
            )));
        }

        Ok(Self {
            layout,
            tile_width,
            tile_height,
            columns,
            rows,
        })
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn tile_width(&self) -> usize {
        self.tile_width
    }

    pub fn tile_height(&self) -> usize {
        self.tile_height
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn tile_count(&self) -> usize {
        self.columns * self.rows
    }

    /// Pixels from the left edge that belong to some tile.
    pub fn covered_width(&self) -> usize {
        self.columns * self.tile_width
    }

    /// Pixels from the top edge that belong to some tile.
    pub fn covered_height(&self) -> usize {
        self.rows * self.tile_height
    }

    /// True when the tiles cover every pixel of the frame.
    pub fn is_exact(&self) -> bool {
        self.covered_width() == self.layout.width() && self.covered_height() == self.layout.height()
    }

    pub fn tile(&self, column: usize, row: usize) -> Option<Tile> {
        if column >= self.columns || row >= self.rows {
            return None;
        }
        Some(Tile::new(column, row, self.tile_width, self.tile_height))
    }

    /// All tiles in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = Tile> + '_ {
        (0..self.tile_count()).map(move |tile_index| {
            let row = tile_index / self.columns;
            let column = tile_index % self.columns;
            Tile::new(column, row, self.tile_width, self.tile_height)
        })
    }

    /// The tiles of one grid row, left to right. Empty past the last row.
    pub fn tiles_in_row(&self, row: usize) -> impl Iterator<Item = Tile> + '_ {
        let columns = if row < self.rows { self.columns } else { 0 };
        (0..columns).map(move |column| Tile::new(column, row, self.tile_width, self.tile_height))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(width: usize, height: usize) -> FrameLayout {
        FrameLayout::packed(width, height, 3).expect("valid layout")
    }

    #[test]
    fn reference_geometry_is_40_by_40() {
        let grid = TileGrid::new(layout(640, 480), 16, 12).expect("valid grid");

        assert_eq!(grid.columns(), 40);
        assert_eq!(grid.rows(), 40);
        assert_eq!(grid.tile_count(), 1600);
        assert!(grid.is_exact());
    }

    #[test]
    fn remainder_is_left_uncovered() {
        let grid = TileGrid::new(layout(10, 7), 4, 3).expect("valid grid");

        assert_eq!((grid.columns(), grid.rows()), (2, 2));
        assert_eq!(grid.covered_width(), 8);
        assert_eq!(grid.covered_height(), 6);
        assert!(!grid.is_exact());
    }

    #[test]
    fn tiles_are_row_major() {
        let grid = TileGrid::new(layout(6, 4), 2, 2).expect("valid grid");
        let origins: Vec<_> = grid.tiles().map(|tile| (tile.x, tile.y)).collect();

        assert_eq!(origins, vec![(0, 0), (2, 0), (4, 0), (0, 2), (2, 2), (4, 2)]);
        assert_eq!(grid.tiles_in_row(1).count(), 3);
        assert_eq!(grid.tiles_in_row(2).count(), 0);
        assert_eq!(grid.tile(2, 1), Some(Tile::new(2, 1, 2, 2)));
        assert_eq!(grid.tile(3, 0), None);
    }

    #[test]
    fn zero_tile_size_is_rejected() {
        assert!(matches!(
            TileGrid::new(layout(8, 8), 0, 4),
            Err(MosaicError::InvalidArgument(_))
        ));
        assert!(matches!(
            TileGrid::new(layout(8, 8), 4, 0),
            Err(MosaicError::InvalidArgument(_))
        ));
    }

    #[test]
    fn tile_larger_than_frame_is_rejected() {
        assert!(matches!(
            TileGrid::new(layout(8, 8), 9, 4),
            Err(MosaicError::InvalidArgument(_))
        ));
        assert!(matches!(
            TileGrid::new(layout(8, 8), 4, 9),
            Err(MosaicError::InvalidArgument(_))
        ));
    }
}
