//! Owned, bounds-checked pixel storage.
//!
//! A [`PixelBuffer`] stores interleaved RGB or RGBA samples, one or two bytes
//! per channel. Sixteen-bit channels are stored little-endian. Dimensions,
//! depth and alpha are fixed at construction.

use crate::core::color::ColorSample;
use crate::core::error::{ConfigResult, ConfigurationError, FilterError, FilterResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Channel storage depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitDepth {
    /// One byte per channel
    Eight,
    /// Two little-endian bytes per channel
    Sixteen,
}

impl BitDepth {
    /// Parse a depth from its bit count.
    pub fn from_bits(bits: u8) -> ConfigResult<Self> {
        match bits {
            8 => Ok(BitDepth::Eight),
            16 => Ok(BitDepth::Sixteen),
            other => Err(ConfigurationError::UnsupportedDepth(other)),
        }
    }

    /// Bits per channel.
    pub fn bits(self) -> u8 {
        match self {
            BitDepth::Eight => 8,
            BitDepth::Sixteen => 16,
        }
    }

    /// Bytes per channel.
    pub fn bytes_per_channel(self) -> usize {
        match self {
            BitDepth::Eight => 1,
            BitDepth::Sixteen => 2,
        }
    }

    /// Whether samples use the 16-bit range.
    pub fn is_sixteen(self) -> bool {
        self == BitDepth::Sixteen
    }
}

/// Geometry and format of a buffer, shared by whole buffers and row bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Layout {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Channel depth
    pub depth: BitDepth,
    /// Whether a fourth alpha channel is stored
    pub has_alpha: bool,
}

impl Layout {
    /// Number of stored channels (3 or 4).
    pub fn channels(&self) -> usize {
        if self.has_alpha {
            4
        } else {
            3
        }
    }

    /// Bytes per pixel.
    pub fn bytes_per_pixel(&self) -> usize {
        self.channels() * self.depth.bytes_per_channel()
    }

    /// Bytes per row.
    pub fn stride(&self) -> usize {
        self.width as usize * self.bytes_per_pixel()
    }

    /// Total bytes, or `None` if the size overflows.
    pub fn byte_len(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.bytes_per_pixel())
    }

    /// Whether the coordinate lies inside the image.
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    fn offset_in_row(&self, x: u32) -> usize {
        x as usize * self.bytes_per_pixel()
    }

    fn read(&self, bytes: &[u8]) -> ColorSample {
        match self.depth {
            BitDepth::Eight => ColorSample {
                red: bytes[0] as u16,
                green: bytes[1] as u16,
                blue: bytes[2] as u16,
                alpha: if self.has_alpha { bytes[3] as u16 } else { 255 },
                sixteen_bit: false,
            },
            BitDepth::Sixteen => {
                let word = |i: usize| u16::from_le_bytes([bytes[2 * i], bytes[2 * i + 1]]);
                ColorSample {
                    red: word(0),
                    green: word(1),
                    blue: word(2),
                    alpha: if self.has_alpha { word(3) } else { 65535 },
                    sixteen_bit: true,
                }
            }
        }
    }

    fn write(&self, bytes: &mut [u8], color: &ColorSample) {
        let color = color.to_depth(self.depth.is_sixteen());
        let channels = self.channels();
        for c in 0..channels {
            let value = color.channel(c);
            match self.depth {
                BitDepth::Eight => bytes[c] = value.min(255) as u8,
                BitDepth::Sixteen => {
                    let [lo, hi] = value.to_le_bytes();
                    bytes[2 * c] = lo;
                    bytes[2 * c + 1] = hi;
                }
            }
        }
    }
}

/// Rectangular pixel grid with bounds-checked access.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    layout: Layout,
    data: Vec<u8>,
}

impl PixelBuffer {
    /// Allocate a zero-filled buffer.
    ///
    /// Fails with [`FilterError::Allocation`] instead of aborting when the
    /// storage cannot be reserved.
    pub fn new(width: u32, height: u32, depth: BitDepth, has_alpha: bool) -> FilterResult<Self> {
        let layout = Layout {
            width,
            height,
            depth,
            has_alpha,
        };
        let bytes = layout
            .byte_len()
            .ok_or(FilterError::Allocation { bytes: usize::MAX })?;
        let mut data = Vec::new();
        data.try_reserve_exact(bytes)
            .map_err(|_| FilterError::Allocation { bytes })?;
        data.resize(bytes, 0);
        Ok(Self { layout, data })
    }

    /// Allocate a zero-filled buffer with the same layout as `other`.
    pub fn new_like(other: &PixelBuffer) -> FilterResult<Self> {
        let l = other.layout;
        Self::new(l.width, l.height, l.depth, l.has_alpha)
    }

    /// Allocate a buffer with every pixel set to `color`.
    pub fn filled(
        width: u32,
        height: u32,
        depth: BitDepth,
        has_alpha: bool,
        color: &ColorSample,
    ) -> FilterResult<Self> {
        let mut buffer = Self::new(width, height, depth, has_alpha)?;
        buffer.fill(color);
        Ok(buffer)
    }

    /// Wrap existing interleaved bytes.
    pub fn from_raw(
        width: u32,
        height: u32,
        depth: BitDepth,
        has_alpha: bool,
        data: Vec<u8>,
    ) -> FilterResult<Self> {
        let layout = Layout {
            width,
            height,
            depth,
            has_alpha,
        };
        let expected = layout
            .byte_len()
            .ok_or(FilterError::Allocation { bytes: usize::MAX })?;
        if data.len() != expected {
            return Err(ConfigurationError::BufferSize {
                expected,
                got: data.len(),
            }
            .into());
        }
        Ok(Self { layout, data })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.layout.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.layout.height
    }

    /// Channel depth.
    pub fn depth(&self) -> BitDepth {
        self.layout.depth
    }

    /// Whether the buffer stores alpha.
    pub fn has_alpha(&self) -> bool {
        self.layout.has_alpha
    }

    /// Whether samples are 16-bit.
    pub fn is_sixteen_bit(&self) -> bool {
        self.layout.depth.is_sixteen()
    }

    /// Largest channel value.
    pub fn max_value(&self) -> u16 {
        crate::core::color::max_for(self.is_sixteen_bit())
    }

    /// Buffer geometry.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Whether the buffer holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.layout.width == 0 || self.layout.height == 0
    }

    /// Raw interleaved bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Mutable raw interleaved bytes.
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Consume the buffer and return its bytes.
    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// Read a pixel, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<ColorSample> {
        if x >= self.layout.width || y >= self.layout.height {
            return None;
        }
        let start = y as usize * self.layout.stride() + self.layout.offset_in_row(x);
        Some(self.layout.read(&self.data[start..start + self.layout.bytes_per_pixel()]))
    }

    /// Read a pixel with coordinates clamped to the nearest edge.
    ///
    /// Returns a transparent black sample for an empty buffer.
    pub fn pixel_clamped(&self, x: i64, y: i64) -> ColorSample {
        if self.is_empty() {
            return ColorSample {
                sixteen_bit: self.is_sixteen_bit(),
                ..ColorSample::default()
            };
        }
        let cx = x.clamp(0, self.layout.width as i64 - 1) as u32;
        let cy = y.clamp(0, self.layout.height as i64 - 1) as u32;
        let start = cy as usize * self.layout.stride() + self.layout.offset_in_row(cx);
        self.layout
            .read(&self.data[start..start + self.layout.bytes_per_pixel()])
    }

    /// Write a pixel. Returns `false` when out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, color: &ColorSample) -> bool {
        if x >= self.layout.width || y >= self.layout.height {
            return false;
        }
        let start = y as usize * self.layout.stride() + self.layout.offset_in_row(x);
        let end = start + self.layout.bytes_per_pixel();
        self.layout.write(&mut self.data[start..end], color);
        true
    }

    /// Set every pixel to `color`.
    pub fn fill(&mut self, color: &ColorSample) {
        let bpp = self.layout.bytes_per_pixel();
        let layout = self.layout;
        for chunk in self.data.chunks_exact_mut(bpp) {
            layout.write(chunk, color);
        }
    }

    /// Check that `other` has identical dimensions, depth and alpha.
    pub fn check_same_layout(&self, other: &PixelBuffer) -> ConfigResult<()> {
        let (a, b) = (self.layout, other.layout);
        if (a.width, a.height) != (b.width, b.height) {
            return Err(ConfigurationError::DimensionMismatch {
                expected: (a.width, a.height),
                got: (b.width, b.height),
            });
        }
        if a.depth != b.depth {
            return Err(ConfigurationError::DepthMismatch {
                expected: a.depth.bits(),
                got: b.depth.bits(),
            });
        }
        if a.has_alpha != b.has_alpha {
            return Err(ConfigurationError::AlphaMismatch);
        }
        Ok(())
    }

    /// Copy all pixels from a buffer of the same layout.
    pub fn copy_from(&mut self, other: &PixelBuffer) -> ConfigResult<()> {
        other.check_same_layout(self)?;
        self.data.copy_from_slice(&other.data);
        Ok(())
    }

    /// Split the rows into disjoint mutable bands.
    ///
    /// `ranges` must be sorted and non-overlapping; each range is clipped to
    /// the image height and to the end of the previous range.
    pub fn split_rows_mut(&mut self, ranges: &[Range<usize>]) -> Vec<RowBand<'_>> {
        let layout = self.layout;
        let stride = layout.stride();
        let height = layout.height as usize;
        let mut bands = Vec::with_capacity(ranges.len());
        let mut rest: &mut [u8] = &mut self.data;
        let mut consumed = 0usize;

        for range in ranges {
            let start = range.start.max(consumed).min(height);
            let end = range.end.max(start).min(height);
            let (_, tail) = std::mem::take(&mut rest).split_at_mut((start - consumed) * stride);
            let (band, tail) = tail.split_at_mut((end - start) * stride);
            rest = tail;
            consumed = end;
            bands.push(RowBand {
                layout,
                rows: start..end,
                data: band,
            });
        }

        bands
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.layout.width)
            .field("height", &self.layout.height)
            .field("depth", &self.layout.depth)
            .field("has_alpha", &self.layout.has_alpha)
            .field("bytes", &self.data.len())
            .finish()
    }
}

/// A mutable band of consecutive rows borrowed from a [`PixelBuffer`].
///
/// Coordinates are absolute image coordinates; writes outside the band's
/// rows are rejected.
pub struct RowBand<'a> {
    layout: Layout,
    rows: Range<usize>,
    data: &'a mut [u8],
}

impl<'a> RowBand<'a> {
    /// Absolute rows covered by this band.
    pub fn rows(&self) -> Range<usize> {
        self.rows.clone()
    }

    /// Image width.
    pub fn width(&self) -> u32 {
        self.layout.width
    }

    /// Layout of the parent buffer.
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Whether the absolute row belongs to this band.
    pub fn contains_row(&self, y: usize) -> bool {
        self.rows.contains(&y)
    }

    /// Read a pixel in this band.
    pub fn pixel(&self, x: u32, y: usize) -> Option<ColorSample> {
        let start = self.offset(x, y)?;
        Some(self.layout.read(&self.data[start..start + self.layout.bytes_per_pixel()]))
    }

    /// Write a pixel in this band. Returns `false` when outside it.
    pub fn set_pixel(&mut self, x: u32, y: usize, color: &ColorSample) -> bool {
        match self.offset(x, y) {
            Some(start) => {
                let end = start + self.layout.bytes_per_pixel();
                self.layout.write(&mut self.data[start..end], color);
                true
            }
            None => false,
        }
    }

    /// Raw bytes of one row.
    pub fn row_mut(&mut self, y: usize) -> Option<&mut [u8]> {
        if !self.contains_row(y) {
            return None;
        }
        let stride = self.layout.stride();
        let start = (y - self.rows.start) * stride;
        Some(&mut self.data[start..start + stride])
    }

    /// Set every pixel of the band to `color`.
    pub fn fill(&mut self, color: &ColorSample) {
        let bpp = self.layout.bytes_per_pixel();
        let layout = self.layout;
        for chunk in self.data.chunks_exact_mut(bpp) {
            layout.write(chunk, color);
        }
    }

    fn offset(&self, x: u32, y: usize) -> Option<usize> {
        if x >= self.layout.width || !self.contains_row(y) {
            return None;
        }
        Some((y - self.rows.start) * self.layout.stride() + self.layout.offset_in_row(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_buffer_is_zeroed() {
        let buf = PixelBuffer::new(3, 2, BitDepth::Eight, true).unwrap();
        assert_eq!(buf.data().len(), 3 * 2 * 4);
        assert!(buf.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_out_of_bounds_access() {
        let mut buf = PixelBuffer::new(2, 2, BitDepth::Eight, false).unwrap();
        assert!(buf.pixel(2, 0).is_none());
        assert!(!buf.set_pixel(0, 5, &ColorSample::opaque(1, 2, 3, false)));
    }

    #[test]
    fn test_sixteen_bit_storage_is_little_endian() {
        let mut buf = PixelBuffer::new(1, 1, BitDepth::Sixteen, false).unwrap();
        buf.set_pixel(0, 0, &ColorSample::opaque(0x1234, 0, 0xffff, true));
        assert_eq!(&buf.data()[0..2], &[0x34, 0x12]);
        let p = buf.pixel(0, 0).unwrap();
        assert_eq!(p.red, 0x1234);
        assert_eq!(p.alpha, 65535);
    }

    #[test]
    fn test_writing_eight_bit_sample_into_sixteen_bit_buffer() {
        let mut buf = PixelBuffer::new(1, 1, BitDepth::Sixteen, true).unwrap();
        buf.set_pixel(0, 0, &ColorSample::opaque(255, 1, 0, false));
        let p = buf.pixel(0, 0).unwrap();
        assert_eq!((p.red, p.green, p.alpha), (65535, 257, 65535));
    }

    #[test]
    fn test_pixel_clamped() {
        let mut buf = PixelBuffer::new(2, 2, BitDepth::Eight, false).unwrap();
        buf.set_pixel(1, 1, &ColorSample::opaque(9, 9, 9, false));
        assert_eq!(buf.pixel_clamped(10, 10).red, 9);
        assert_eq!(buf.pixel_clamped(-3, -3).red, 0);
    }

    #[test]
    fn test_from_raw_checks_length() {
        let err = PixelBuffer::from_raw(2, 2, BitDepth::Eight, false, vec![0; 5]).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_layout_checks() {
        let a = PixelBuffer::new(2, 2, BitDepth::Eight, false).unwrap();
        let b = PixelBuffer::new(2, 3, BitDepth::Eight, false).unwrap();
        let c = PixelBuffer::new(2, 2, BitDepth::Sixteen, false).unwrap();
        let d = PixelBuffer::new(2, 2, BitDepth::Eight, true).unwrap();
        assert!(matches!(
            a.check_same_layout(&b),
            Err(ConfigurationError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            a.check_same_layout(&c),
            Err(ConfigurationError::DepthMismatch { .. })
        ));
        assert_eq!(a.check_same_layout(&d), Err(ConfigurationError::AlphaMismatch));
    }

    #[test]
    fn test_split_rows_mut_writes_disjoint_bands() {
        let mut buf = PixelBuffer::new(2, 5, BitDepth::Eight, false).unwrap();
        {
            let mut bands = buf.split_rows_mut(&[0..2, 2..5]);
            assert_eq!(bands[0].rows(), 0..2);
            assert_eq!(bands[1].rows(), 2..5);
            assert!(!bands[0].set_pixel(0, 3, &ColorSample::opaque(1, 1, 1, false)));
            assert!(bands[1].set_pixel(1, 4, &ColorSample::opaque(7, 7, 7, false)));
            bands[0].fill(&ColorSample::opaque(3, 3, 3, false));
        }
        assert_eq!(buf.pixel(1, 4).unwrap().red, 7);
        assert_eq!(buf.pixel(0, 1).unwrap().red, 3);
        assert_eq!(buf.pixel(0, 2).unwrap().red, 0);
    }

    #[test]
    fn test_allocation_overflow_is_reported() {
        let err = PixelBuffer::new(u32::MAX, u32::MAX, BitDepth::Sixteen, true);
        assert!(matches!(err, Err(FilterError::Allocation { .. })));
    }
}
