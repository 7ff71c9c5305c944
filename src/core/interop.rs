//! Conversion between [`PixelBuffer`] and the `image` crate.
//!
//! Decoding and encoding stay with the `image` crate; this module only maps
//! pixel layouts across the boundary.

use crate::core::buffer::{BitDepth, PixelBuffer};
use crate::core::error::{ConfigurationError, FilterResult};
use image::{ColorType, DynamicImage, ImageBuffer, Rgb, Rgba};

impl PixelBuffer {
    /// Copy a decoded image into a new buffer.
    ///
    /// Grey and 32-bit float images are widened to RGB(A); the depth becomes
    /// 16-bit for any source with more than 8 bits per channel.
    pub fn from_dynamic_image(image: &DynamicImage) -> FilterResult<Self> {
        let color = image.color();
        let sixteen = matches!(
            color,
            ColorType::L16
                | ColorType::La16
                | ColorType::Rgb16
                | ColorType::Rgba16
                | ColorType::Rgb32F
                | ColorType::Rgba32F
        );
        let alpha = color.has_alpha();
        let (width, height) = (image.width(), image.height());

        let data = match (sixteen, alpha) {
            (false, false) => image.to_rgb8().into_raw(),
            (false, true) => image.to_rgba8().into_raw(),
            (true, false) => words_to_bytes(image.to_rgb16().into_raw()),
            (true, true) => words_to_bytes(image.to_rgba16().into_raw()),
        };
        let depth = if sixteen {
            BitDepth::Sixteen
        } else {
            BitDepth::Eight
        };

        Self::from_raw(width, height, depth, alpha, data)
    }

    /// Copy the buffer into an `image` crate image.
    pub fn to_dynamic_image(&self) -> FilterResult<DynamicImage> {
        let (width, height) = (self.width(), self.height());
        let expected = self.layout().byte_len().unwrap_or(usize::MAX);
        let size_error = || ConfigurationError::BufferSize {
            expected,
            got: self.data().len(),
        };

        let image = match (self.depth(), self.has_alpha()) {
            (BitDepth::Eight, false) => {
                ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, self.data().to_vec())
                    .map(DynamicImage::ImageRgb8)
            }
            (BitDepth::Eight, true) => {
                ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, self.data().to_vec())
                    .map(DynamicImage::ImageRgba8)
            }
            (BitDepth::Sixteen, false) => {
                ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, bytes_to_words(self.data()))
                    .map(DynamicImage::ImageRgb16)
            }
            (BitDepth::Sixteen, true) => {
                ImageBuffer::<Rgba<u16>, _>::from_raw(width, height, bytes_to_words(self.data()))
                    .map(DynamicImage::ImageRgba16)
            }
        };

        Ok(image.ok_or_else(size_error)?)
    }
}

fn words_to_bytes(words: Vec<u16>) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_le_bytes()).collect()
}

fn bytes_to_words(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::color::ColorSample;

    #[test]
    fn test_rgba8_round_trip() {
        let mut buf = PixelBuffer::new(3, 2, BitDepth::Eight, true).unwrap();
        buf.set_pixel(2, 1, &ColorSample::new(10, 20, 30, 40, false));

        let image = buf.to_dynamic_image().unwrap();
        assert_eq!(image.color(), ColorType::Rgba8);

        let back = PixelBuffer::from_dynamic_image(&image).unwrap();
        assert_eq!(back, buf);
    }

    #[test]
    fn test_rgb16_round_trip() {
        let mut buf = PixelBuffer::new(2, 2, BitDepth::Sixteen, false).unwrap();
        buf.set_pixel(0, 1, &ColorSample::opaque(1000, 40000, 65535, true));

        let image = buf.to_dynamic_image().unwrap();
        assert_eq!(image.color(), ColorType::Rgb16);
        assert_eq!(PixelBuffer::from_dynamic_image(&image).unwrap(), buf);
    }

    #[test]
    fn test_grey_is_widened() {
        let grey = DynamicImage::ImageLuma8(ImageBuffer::from_pixel(2, 2, image::Luma([77u8])));
        let buf = PixelBuffer::from_dynamic_image(&grey).unwrap();
        assert!(!buf.has_alpha());
        assert_eq!(buf.pixel(1, 1), Some(ColorSample::opaque(77, 77, 77, false)));
    }
}
