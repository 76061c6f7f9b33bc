// THEORY:
// The `Frame` module is the most fundamental unit of the mosaic engine. A frame is a
// "dumb" owned byte buffer plus the geometry needed to find any byte inside it.
//
// Key architectural principles:
// 1.  **One Indexing Function**: Every byte address in the engine is produced by
//     `FrameLayout::offset(x, y, channel)`. Tiles, the sequential transform and the
//     banded parallel transform all go through it, so a padded row stride is honoured
//     everywhere or nowhere.
// 2.  **Padded Strides**: Capture devices hand out rows aligned to 4, 16 or 64 bytes.
//     `row_stride` is therefore a separate field that may exceed `width * channels`;
//     the bytes between the end of a row's pixels and the start of the next row are
//     never read or written by the transform.
// 3.  **Channel Agnostic**: Channels are stored in the order the producer gave them.
//     The engine only promises that the first three channels are averaged or copied;
//     it never assumes RGB versus BGR and never touches a fourth channel.
// 4.  **Validate Once**: Geometry is checked when a layout is built and again when a
//     frame adopts it. After that, `offset` is plain arithmetic.

use crate::core_modules::error::{MosaicError, Result};
use image::{RgbImage, RgbaImage};
use std::fmt;

pub type Byte = u8;
pub type Bytes = Vec<Byte>;

/// The number of leading channels the engine averages or copies.
pub const COLOR_CHANNELS: usize = 3;

/// The geometry of an interleaved, row-major pixel buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameLayout {
    /// The width of the frame in pixels.
    width: usize,
    /// The height of the frame in pixels.
    height: usize,
    /// Interleaved bytes per pixel (at least 3).
    channels: usize,
    /// Bytes from the start of one row to the start of the next.
    row_stride: usize,
}

impl FrameLayout {
    pub fn new(width: usize, height: usize, channels: usize, row_stride: usize) -> Result<Self> {
        let layout = Self {
            width,
            height,
            channels,
            row_stride,
        };
        layout.validate()?;
        Ok(layout)
    }

    /// A layout without row padding.
    pub fn packed(width: usize, height: usize, channels: usize) -> Result<Self> {
        let row_stride = width.checked_mul(channels).ok_or_else(|| {
            MosaicError::invalid_argument(format!("row of {width} pixels x {channels} channels overflows"))
        })?;
        Self::new(width, height, channels, row_stride)
    }

    /// The same pixels without row padding.
    pub fn to_packed(&self) -> Result<Self> {
        Self::packed(self.width, self.height, self.channels)
    }

    /// Checks the channel count and that `row_stride * height` is addressable with
    /// every row holding its pixels.
    pub fn validate(&self) -> Result<()> {
        let Self {
            width,
            height,
            channels,
            row_stride,
        } = *self;

        if channels < COLOR_CHANNELS {
            return Err(MosaicError::invalid_argument(format!(
                "frame needs at least {COLOR_CHANNELS} channels, got {channels}"
            )));
        }

        let row_bytes = width.checked_mul(channels).ok_or_else(|| {
            MosaicError::invalid_argument(format!("row of {width} pixels x {channels} channels overflows"))
        })?;

        if row_stride < row_bytes {
            return Err(MosaicError::invalid_argument(format!(
                "row stride {row_stride} is smaller than {row_bytes} bytes of pixel data"
            )));
        }

        row_stride.checked_mul(height).ok_or_else(|| {
            MosaicError::invalid_argument(format!("{height} rows of {row_stride} bytes overflows"))
        })?;

        Ok(())
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn row_stride(&self) -> usize {
        self.row_stride
    }

    /// Byte offset of channel `channel` of pixel `(x, y)`.
    #[inline]
    pub fn offset(&self, x: usize, y: usize, channel: usize) -> usize {
        y * self.row_stride + x * self.channels + channel
    }

    /// Bytes of pixel data in one row, excluding padding.
    pub fn row_bytes(&self) -> usize {
        self.width * self.channels
    }

    /// The shortest buffer that can hold this layout. The padding after the
    /// last row is not required.
    pub fn min_len(&self) -> usize {
        if self.width == 0 || self.height == 0 {
            return 0;
        }
        (self.height - 1) * self.row_stride + self.row_bytes()
    }

    /// True when both layouts describe the same pixels, regardless of stride.
    pub fn same_geometry(&self, other: &FrameLayout) -> bool {
        self.width == other.width && self.height == other.height && self.channels == other.channels
    }

    pub fn is_packed(&self) -> bool {
        self.row_stride == self.row_bytes()
    }
}

impl fmt::Display for FrameLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{}x{} (stride {})",
            self.width, self.height, self.channels, self.row_stride
        )
    }
}

/// An owned, interleaved pixel buffer with a possibly padded row stride.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    layout: FrameLayout,
    data: Bytes,
}

impl Frame {
    /// Allocates a zeroed frame, including the padding of the last row.
    pub fn new(layout: FrameLayout) -> Self {
        Self {
            data: vec![0; layout.row_stride * layout.height],
            layout,
        }
    }

    pub fn from_vec(layout: FrameLayout, data: Bytes) -> Result<Self> {
        layout.validate()?;

        let expected = layout.min_len();
        if data.len() < expected {
            return Err(MosaicError::BufferTooSmall {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { layout, data })
    }

    pub fn from_raw(
        width: usize,
        height: usize,
        channels: usize,
        row_stride: usize,
        data: Bytes,
    ) -> Result<Self> {
        Self::from_vec(FrameLayout::new(width, height, channels, row_stride)?, data)
    }

    /// Builds a 3-channel frame from an `image` buffer. Channel order is kept.
    pub fn from_rgb_image(image: &RgbImage) -> Result<Self> {
        let layout = FrameLayout::packed(image.width() as usize, image.height() as usize, 3)?;
        Self::from_vec(layout, image.as_raw().clone())
    }

    /// Builds a 4-channel frame. The fourth channel is carried but never processed.
    pub fn from_rgba_image(image: &RgbaImage) -> Result<Self> {
        let layout = FrameLayout::packed(image.width() as usize, image.height() as usize, 4)?;
        Self::from_vec(layout, image.as_raw().clone())
    }

    /// Repacks the first three channels into an `image` buffer, dropping row padding
    /// and any extra channels.
    pub fn to_rgb_image(&self) -> Result<RgbImage> {
        let width = u32::try_from(self.layout.width)
            .map_err(|_| MosaicError::invalid_argument("frame too wide for an image buffer"))?;
        let height = u32::try_from(self.layout.height)
            .map_err(|_| MosaicError::invalid_argument("frame too tall for an image buffer"))?;

        let mut packed = Vec::with_capacity(self.layout.width * self.layout.height * COLOR_CHANNELS);
        for y in 0..self.layout.height {
            for x in 0..self.layout.width {
                let start = self.layout.offset(x, y, 0);
                packed.extend_from_slice(&self.data[start..start + COLOR_CHANNELS]);
            }
        }

        RgbImage::from_raw(width, height, packed)
            .ok_or_else(|| MosaicError::invalid_argument("packed buffer does not match image size"))
    }

    pub fn layout(&self) -> FrameLayout {
        self.layout
    }

    pub fn width(&self) -> usize {
        self.layout.width
    }

    pub fn height(&self) -> usize {
        self.layout.height
    }

    pub fn channels(&self) -> usize {
        self.layout.channels
    }

    pub fn row_stride(&self) -> usize {
        self.layout.row_stride
    }

    pub fn data(&self) -> &[Byte] {
        &self.data
    }

    /// All channels of pixel `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: usize, y: usize) -> Option<&[Byte]> {
        if x >= self.layout.width || y >= self.layout.height {
            return None;
        }
        let start = self.layout.offset(x, y, 0);
        self.data.get(start..start + self.layout.channels)
    }

    pub fn pixel_mut(&mut self, x: usize, y: usize) -> Option<&mut [Byte]> {
        if x >= self.layout.width || y >= self.layout.height {
            return None;
        }
        let start = self.layout.offset(x, y, 0);
        let channels = self.layout.channels;
        self.data.get_mut(start..start + channels)
    }

    /// The whole frame as a single writable band.
    pub fn as_band_mut(&mut self) -> FrameBandMut<'_> {
        FrameBandMut {
            layout: self.layout,
            first_row: 0,
            data: &mut self.data,
        }
    }

    /// Splits the frame into disjoint horizontal bands of `rows_per_band` rows.
    /// The last band may be shorter.
    pub fn bands_mut(&mut self, rows_per_band: usize) -> impl Iterator<Item = FrameBandMut<'_>> {
        let layout = self.layout;
        let rows_per_band = rows_per_band.max(1);
        self.data
            .chunks_mut(rows_per_band * layout.row_stride.max(1))
            .enumerate()
            .map(move |(index, data)| FrameBandMut {
                layout,
                first_row: index * rows_per_band,
                data,
            })
    }

    /// Copies whole pixels (every channel) of a rectangle from `source` into `self`.
    /// Used to pre-fill the strips a tile grid never visits.
    pub fn copy_region(
        &mut self,
        source: &Frame,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> Result<()> {
        if !self.layout.same_geometry(&source.layout) {
            return Err(MosaicError::DimensionMismatch {
                source_layout: source.layout,
                destination_layout: self.layout,
            });
        }
        let fits = |start: usize, extent: usize, limit: usize| {
            start.checked_add(extent).is_some_and(|end| end <= limit)
        };
        if !fits(x, width, self.layout.width) || !fits(y, height, self.layout.height) {
            return Err(MosaicError::invalid_argument(format!(
                "region {width}x{height} at ({x}, {y}) exceeds {}x{} frame",
                self.layout.width, self.layout.height
            )));
        }
        if width == 0 {
            return Ok(());
        }

        let span = width * self.layout.channels;
        for row in y..y + height {
            let from = source.layout.offset(x, row, 0);
            let to = self.layout.offset(x, row, 0);
            self.data[to..to + span].copy_from_slice(&source.data[from..from + span]);
        }
        Ok(())
    }
}

/// A mutable run of whole rows borrowed from a `Frame`.
///
/// Offsets are computed with the parent frame's `FrameLayout::offset` and rebased to
/// the first row of the band, so code writing into a band addresses pixels with the
/// same frame coordinates it would use on the full frame.
#[derive(Debug)]
pub struct FrameBandMut<'a> {
    layout: FrameLayout,
    first_row: usize,
    data: &'a mut [Byte],
}

impl FrameBandMut<'_> {
    pub fn first_row(&self) -> usize {
        self.first_row
    }

    #[inline]
    pub fn offset(&self, x: usize, y: usize, channel: usize) -> usize {
        self.layout.offset(x, y, channel) - self.layout.offset(0, self.first_row, 0)
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, channel: usize, value: Byte) {
        let index = self.offset(x, y, channel);
        self.data[index] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_honours_padded_stride() {
        let layout = FrameLayout::new(3, 2, 3, 12).expect("valid layout");

        assert_eq!(layout.offset(0, 0, 0), 0);
        assert_eq!(layout.offset(2, 0, 2), 8);
        assert_eq!(layout.offset(0, 1, 0), 12);
        assert_eq!(layout.offset(1, 1, 1), 16);
        assert_eq!(layout.row_bytes(), 9);
        assert_eq!(layout.min_len(), 21);
        assert!(!layout.is_packed());
        assert_eq!(layout.to_string(), "3x2x3 (stride 12)");
        assert!(layout.to_packed().expect("packed").is_packed());
    }

    #[test]
    fn layout_rejects_bad_geometry() {
        assert!(matches!(
            FrameLayout::new(4, 4, 2, 8),
            Err(MosaicError::InvalidArgument(_))
        ));
        assert!(matches!(
            FrameLayout::new(4, 4, 3, 11),
            Err(MosaicError::InvalidArgument(_))
        ));
        assert!(FrameLayout::new(4, 4, 3, 12).is_ok());
    }

    #[test]
    fn from_vec_revalidates_layout() {
        let too_few_channels = FrameLayout {
            width: 4,
            height: 2,
            channels: 1,
            row_stride: 4,
        };
        assert!(matches!(
            Frame::from_vec(too_few_channels, vec![10; 8]),
            Err(MosaicError::InvalidArgument(_))
        ));

        let short_stride = FrameLayout {
            width: 4,
            height: 2,
            channels: 3,
            row_stride: 6,
        };
        assert!(matches!(
            Frame::from_vec(short_stride, vec![10; 24]),
            Err(MosaicError::InvalidArgument(_))
        ));
    }

    #[test]
    fn from_vec_accepts_missing_last_row_padding() {
        let layout = FrameLayout::new(2, 2, 3, 8).expect("valid layout");

        let short = Frame::from_vec(layout, vec![0; 13]);
        assert_eq!(
            short,
            Err(MosaicError::BufferTooSmall {
                expected: 14,
                actual: 13
            })
        );

        let frame = Frame::from_vec(layout, vec![0; 14]).expect("trailing padding is optional");
        assert_eq!(frame.data().len(), 14);
    }

    #[test]
    fn pixel_access_skips_padding() {
        let data = vec![
            1, 2, 3, 4, 5, 6, 99, 99, // row 0
            7, 8, 9, 10, 11, 12, 98, 98, // row 1
        ];
        let frame = Frame::from_raw(2, 2, 3, 8, data).expect("valid frame");

        assert_eq!(frame.pixel(1, 0), Some(&[4u8, 5, 6][..]));
        assert_eq!(frame.pixel(0, 1), Some(&[7u8, 8, 9][..]));
        assert_eq!(frame.pixel(2, 0), None);
        assert_eq!(frame.pixel(0, 2), None);
    }

    #[test]
    fn pixel_mut_writes_through_stride() {
        let mut frame = Frame::new(FrameLayout::new(2, 2, 3, 7).expect("valid layout"));
        assert_eq!(frame.row_stride(), 7);

        frame.pixel_mut(1, 1).expect("in bounds").copy_from_slice(&[1, 2, 3]);

        assert_eq!(&frame.data()[10..13], &[1, 2, 3]);
        assert!(frame.pixel_mut(2, 1).is_none());
    }

    #[test]
    fn rgb_image_keeps_channel_order() {
        let mut rgb = RgbImage::new(2, 2);
        rgb.put_pixel(1, 1, image::Rgb([1, 2, 3]));

        let frame = Frame::from_rgb_image(&rgb).expect("valid frame");

        assert!(frame.layout().is_packed());
        assert_eq!(frame.pixel(1, 1), Some(&[1u8, 2, 3][..]));
        assert_eq!(frame.to_rgb_image().expect("convertible"), rgb);
    }

    #[test]
    fn rgb_image_round_trip_drops_padding_and_alpha() {
        let mut rgba = RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, image::Rgba([10, 20, 30, 40]));
        rgba.put_pixel(1, 0, image::Rgba([50, 60, 70, 80]));

        let frame = Frame::from_rgba_image(&rgba).expect("valid frame");
        assert_eq!(frame.channels(), 4);

        let rgb = frame.to_rgb_image().expect("convertible");
        assert_eq!(rgb.as_raw(), &vec![10, 20, 30, 50, 60, 70]);
    }

    #[test]
    fn bands_address_pixels_in_frame_coordinates() {
        let layout = FrameLayout::new(2, 5, 3, 8).expect("valid layout");
        let mut frame = Frame::new(layout);

        {
            let bands: Vec<_> = frame.bands_mut(2).collect();
            assert_eq!(bands.len(), 3);
            assert_eq!(bands[2].first_row(), 4);
        }

        for mut band in frame.bands_mut(2) {
            let y = band.first_row();
            band.set(1, y, 2, 7);
        }

        assert_eq!(frame.pixel(1, 0), Some(&[0u8, 0, 7][..]));
        assert_eq!(frame.pixel(1, 2), Some(&[0u8, 0, 7][..]));
        assert_eq!(frame.pixel(1, 4), Some(&[0u8, 0, 7][..]));
        assert_eq!(frame.pixel(1, 1), Some(&[0u8, 0, 0][..]));
    }

    #[test]
    fn copy_region_copies_whole_pixels_only_inside_rectangle() {
        let layout = FrameLayout::packed(3, 2, 4).expect("valid layout");
        let source = Frame::from_vec(layout, (0..24).collect()).expect("valid frame");
        let mut destination = Frame::new(layout);

        destination
            .copy_region(&source, 2, 0, 1, 2)
            .expect("region inside frame");

        assert_eq!(destination.pixel(2, 0), Some(&[8u8, 9, 10, 11][..]));
        assert_eq!(destination.pixel(2, 1), Some(&[20u8, 21, 22, 23][..]));
        assert_eq!(destination.pixel(1, 1), Some(&[0u8, 0, 0, 0][..]));
        assert!(destination.copy_region(&source, 2, 0, 2, 1).is_err());
        assert!(matches!(
            destination.copy_region(&source, 1, 0, usize::MAX, 1),
            Err(MosaicError::InvalidArgument(_))
        ));
        assert!(matches!(
            destination.copy_region(&source, 0, usize::MAX, 1, 1),
            Err(MosaicError::InvalidArgument(_))
        ));
    }
}
