// THEORY:
// The `mosaic` module is the heart of the engine: it takes a source frame and writes
// either the tiled block average or a verbatim copy into a destination frame.
//
// Key architectural principles:
// 1.  **Same Region, Different Values**: Enabled and disabled modes walk exactly the
//     same tiles and touch exactly the same bytes (the first three channels of every
//     covered pixel). Toggling the effect therefore never changes *where* the
//     destination is written, only *what* is written there.
// 2.  **Validate, Then Compute**: Tile size and buffer geometry are checked before the
//     first tile is visited. A rejected call returns an error and leaves the
//     destination untouched; there is no partially written frame.
// 3.  **Disjoint Tiles**: Each tile reads and writes its own rectangle and shares no
//     accumulator with any other tile. The parallel variant exploits this by cutting
//     the destination into one band per tile row and handing the bands to rayon.
//     The result is byte-identical to the sequential path.
// 4.  **No Allocation**: The sequential path allocates nothing. The parallel path
//     allocates the list of band handles, plus a dedicated rayon pool when an
//     explicit worker count is requested.
//
// The toggle is a plain `enabled` parameter. Where it is stored and when it flips is
// the caller's business (see `pipeline::EffectState`).

use crate::core_modules::error::{MosaicError, Result};
use crate::core_modules::frame::{Frame, FrameBandMut};
use crate::core_modules::tile_grid::TileGrid;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::fmt;

/// What the transform writes into each tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MosaicMode {
    /// Every tile is replaced by its average color.
    #[default]
    Mosaic,
    /// Every tile is copied verbatim.
    Passthrough,
}

impl MosaicMode {
    pub fn is_enabled(self) -> bool {
        matches!(self, MosaicMode::Mosaic)
    }
}

impl From<bool> for MosaicMode {
    fn from(enabled: bool) -> Self {
        if enabled {
            MosaicMode::Mosaic
        } else {
            MosaicMode::Passthrough
        }
    }
}

impl fmt::Display for MosaicMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MosaicMode::Mosaic => write!(f, "mosaic"),
            MosaicMode::Passthrough => write!(f, "passthrough"),
        }
    }
}

/// Checks the tile size against the source and the destination against the source.
pub fn validate(
    source: &Frame,
    destination: &Frame,
    tile_width: usize,
    tile_height: usize,
) -> Result<TileGrid> {
    let grid = TileGrid::new(source.layout(), tile_width, tile_height)?;

    if !source.layout().same_geometry(&destination.layout()) {
        return Err(MosaicError::DimensionMismatch {
            source_layout: source.layout(),
            destination_layout: destination.layout(),
        });
    }

    Ok(grid)
}

/// Writes the mosaic (or a copy, when `enabled` is false) of `source` into
/// `destination`.
///
/// Pixels to the right of the last full tile column or below the last full tile row
/// are not written and keep their previous value.
pub fn transform(
    source: &Frame,
    destination: &mut Frame,
    tile_width: usize,
    tile_height: usize,
    enabled: bool,
) -> Result<()> {
    let grid = validate(source, destination, tile_width, tile_height)?;

    let mut band = destination.as_band_mut();
    for tile in grid.tiles() {
        tile.apply(source, &mut band, enabled);
    }

    Ok(())
}

/// Same contract and output as [`transform`], with tile rows spread over `workers`
/// threads. `workers == 0` runs on rayon's global pool (one thread per logical CPU).
pub fn transform_parallel(
    source: &Frame,
    destination: &mut Frame,
    tile_width: usize,
    tile_height: usize,
    enabled: bool,
    workers: usize,
) -> Result<()> {
    let grid = validate(source, destination, tile_width, tile_height)?;

    if workers == 1 || grid.rows() == 1 {
        return transform(source, destination, tile_width, tile_height, enabled);
    }

    let pool = match workers {
        0 => None,
        n => Some(
            ThreadPoolBuilder::new()
                .num_threads(n.min(grid.rows()))
                .build()
                .map_err(|_| MosaicError::WorkerUnavailable)?,
        ),
    };

    // Bands past the last tile row only hold the bottom remainder.
    let bands: Vec<_> = destination.bands_mut(tile_height).take(grid.rows()).collect();
    let render = move || {
        bands
            .into_par_iter()
            .for_each(|mut band| render_band(&grid, source, &mut band, enabled));
    };

    match pool {
        Some(pool) => pool.install(render),
        None => render(),
    }

    Ok(())
}

fn render_band(grid: &TileGrid, source: &Frame, band: &mut FrameBandMut<'_>, enabled: bool) {
    let row = band.first_row() / grid.tile_height();
    for tile in grid.tiles_in_row(row) {
        tile.apply(source, band, enabled);
    }
}

/// Copies every channel of the right and bottom strips that no tile covers from
/// `source` into `destination`.
pub fn copy_remainder(
    source: &Frame,
    destination: &mut Frame,
    tile_width: usize,
    tile_height: usize,
) -> Result<()> {
    let grid = validate(source, destination, tile_width, tile_height)?;
    let (width, height) = (source.width(), source.height());
    let (covered_width, covered_height) = (grid.covered_width(), grid.covered_height());

    destination.copy_region(source, covered_width, 0, width - covered_width, height)?;
    destination.copy_region(source, 0, covered_height, covered_width, height - covered_height)
}
