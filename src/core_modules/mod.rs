pub mod error;
pub mod frame;
pub mod mosaic;
pub mod tile;
pub mod tile_grid;
