// THEORY:
// The `Tile` module represents one rectangular cell of the mosaic grid. It is the unit
// over which the engine either averages or copies, and it is the only place where
// pixels are actually summed.
//
// Key architectural principles:
// 1.  **Spatial Pooling**: A tile collapses `width * height` pixels into one color.
//     The sum for each channel is kept in a `u64`, wide enough for `255 * width *
//     height` on any tile that fits in memory, then divided with truncation.
// 2.  **Geometry Only**: A `Tile` does not own pixels. It knows where it sits in the
//     frame and reads or writes through `FrameLayout::offset`, so the same tile can
//     be applied to a source frame and to a destination band with a different stride.
// 3.  **Three Channels**: Only the first three channels are averaged, filled or
//     copied. A fourth channel in the destination keeps whatever it held.

pub mod tile {
    use crate::core_modules::frame::{Byte, COLOR_CHANNELS, Frame, FrameBandMut};

    /// One averaged value per color channel, in source channel order.
    pub type TileColor = [Byte; COLOR_CHANNELS];
    pub type ChannelSum = u64;

    /// A fixed-size rectangle of the frame, addressed in pixels.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Tile {
        /// The column index of this tile in the grid.
        pub column: usize,
        /// The row index of this tile in the grid.
        pub row: usize,
        /// The x coordinate of the tile's top-left pixel.
        pub x: usize,
        /// The y coordinate of the tile's top-left pixel.
        pub y: usize,
        /// The width of the tile in pixels.
        pub width: usize,
        /// The height of the tile in pixels.
        pub height: usize,
    }

    impl Tile {
        pub fn new(column: usize, row: usize, width: usize, height: usize) -> Self {
            Self {
                column,
                row,
                x: column * width,
                y: row * height,
                width,
                height,
            }
        }

        pub fn pixel_count(&self) -> usize {
            self.width * self.height
        }

        /// Per-channel sums over the tile.
        pub fn channel_sums(&self, source: &Frame) -> [ChannelSum; COLOR_CHANNELS] {
            let layout = source.layout();
            let data = source.data();
            let mut sums = [0 as ChannelSum; COLOR_CHANNELS];

            for y in self.y..self.y + self.height {
                for x in self.x..self.x + self.width {
                    for (channel, sum) in sums.iter_mut().enumerate() {
                        *sum += data[layout.offset(x, y, channel)] as ChannelSum;
                    }
                }
            }

            sums
        }

        /// The truncated mean of each color channel, clamped to `0..=255`.
        pub fn average_color(&self, source: &Frame) -> TileColor {
            let count = self.pixel_count() as ChannelSum;
            if count == 0 {
                return [0; COLOR_CHANNELS];
            }

            let sums = self.channel_sums(source);
            let mut color: TileColor = [0; COLOR_CHANNELS];
            for (value, sum) in color.iter_mut().zip(sums) {
                *value = (sum / count).clamp(0, Byte::MAX as ChannelSum) as Byte;
            }
            color
        }

        /// Writes `color` to every pixel of the tile.
        pub fn fill(&self, destination: &mut FrameBandMut<'_>, color: TileColor) {
            for y in self.y..self.y + self.height {
                for x in self.x..self.x + self.width {
                    for (channel, value) in color.iter().enumerate() {
                        destination.set(x, y, channel, *value);
                    }
                }
            }
        }

        /// Copies the color channels of every pixel of the tile from `source`.
        pub fn copy(&self, source: &Frame, destination: &mut FrameBandMut<'_>) {
            let layout = source.layout();
            let data = source.data();

            for y in self.y..self.y + self.height {
                for x in self.x..self.x + self.width {
                    for channel in 0..COLOR_CHANNELS {
                        destination.set(x, y, channel, data[layout.offset(x, y, channel)]);
                    }
                }
            }
        }

        /// Averages the tile when `enabled`, copies it otherwise.
        pub fn apply(&self, source: &Frame, destination: &mut FrameBandMut<'_>, enabled: bool) {
            if enabled {
                let color = self.average_color(source);
                self.fill(destination, color);
            } else {
                self.copy(source, destination);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::tile::*;
    use crate::core_modules::frame::{Frame, FrameLayout};

    fn solid(width: usize, height: usize, channels: usize, pixel: &[u8]) -> Frame {
        let data = pixel.iter().copied().cycle().take(width * height * channels).collect();
        Frame::from_vec(FrameLayout::packed(width, height, channels).expect("layout"), data)
            .expect("frame")
    }

    #[test]
    fn tile_origin_follows_grid_position() {
        let tile = Tile::new(3, 2, 16, 12);
        assert_eq!((tile.x, tile.y), (48, 24));
        assert_eq!(tile.pixel_count(), 192);
    }

    #[test]
    fn constant_tile_averages_to_itself() {
        let frame = solid(4, 4, 3, &[12, 200, 255]);
        let tile = Tile::new(0, 0, 4, 4);

        assert_eq!(tile.average_color(&frame), [12, 200, 255]);
    }

    #[test]
    fn half_black_half_white_truncates_to_127() {
        let mut data = vec![0u8; 4 * 2 * 3];
        for byte in &mut data[12..] {
            *byte = 255;
        }
        let frame = Frame::from_vec(FrameLayout::packed(4, 2, 3).expect("layout"), data)
            .expect("frame");
        let tile = Tile::new(0, 0, 4, 2);

        assert_eq!(tile.channel_sums(&frame), [1020, 1020, 1020]);
        assert_eq!(tile.average_color(&frame), [127, 127, 127]);
    }

    #[test]
    fn large_tile_sum_does_not_overflow() {
        let frame = solid(512, 512, 3, &[255, 255, 255]);
        let tile = Tile::new(0, 0, 512, 512);

        assert_eq!(tile.channel_sums(&frame), [255 * 512 * 512; 3]);
        assert_eq!(tile.average_color(&frame), [255, 255, 255]);
    }

    #[test]
    fn fill_leaves_fourth_channel_alone() {
        let mut destination = solid(2, 2, 4, &[0, 0, 0, 9]);
        let tile = Tile::new(0, 0, 2, 2);

        tile.fill(&mut destination.as_band_mut(), [1, 2, 3]);

        for y in 0..2 {
            for x in 0..2 {
                assert_eq!(destination.pixel(x, y), Some(&[1u8, 2, 3, 9][..]));
            }
        }
    }

    #[test]
    fn copy_moves_only_the_tile() {
        let source = Frame::from_vec(
            FrameLayout::packed(4, 1, 3).expect("layout"),
            (1..=12).collect(),
        )
        .expect("frame");
        let mut destination = Frame::new(source.layout());
        let tile = Tile::new(1, 0, 2, 1);

        tile.copy(&source, &mut destination.as_band_mut());

        assert_eq!(destination.data(), &[0, 0, 0, 0, 0, 0, 7, 8, 9, 10, 11, 12]);
    }
}
