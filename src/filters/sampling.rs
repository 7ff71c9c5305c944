//! Source sampling for inverse-mapped filters.

use crate::core::buffer::PixelBuffer;
use crate::core::color::ColorSample;

/// Nearest sample: coordinates truncate toward zero, then clamp to the edge.
#[inline]
pub fn sample_nearest(src: &PixelBuffer, x: f64, y: f64) -> ColorSample {
    src.pixel_clamped(truncate(x), truncate(y))
}

/// Bilinear blend of the four integer neighbours around `(x, y)`.
///
/// Neighbours outside the image are clamped to the edge. Weights are
/// computed in floating point and the result rounded once per channel, so
/// 8-bit and 16-bit sources go through the same arithmetic at their own
/// scale.
pub fn sample_bilinear(src: &PixelBuffer, x: f64, y: f64) -> ColorSample {
    if !x.is_finite() || !y.is_finite() {
        return sample_nearest(src, 0.0, 0.0);
    }
    let x0 = x.floor();
    let y0 = y.floor();
    let dx = x - x0;
    let dy = y - y0;
    let (ix, iy) = (x0 as i64, y0 as i64);

    let p00 = src.pixel_clamped(ix, iy);
    let p10 = src.pixel_clamped(ix + 1, iy);
    let p01 = src.pixel_clamped(ix, iy + 1);
    let p11 = src.pixel_clamped(ix + 1, iy + 1);

    let w00 = (1.0 - dx) * (1.0 - dy);
    let w10 = dx * (1.0 - dy);
    let w01 = (1.0 - dx) * dy;
    let w11 = dx * dy;

    let mut out = p00;
    for c in 0..4 {
        let v = p00.channel(c) as f64 * w00
            + p10.channel(c) as f64 * w10
            + p01.channel(c) as f64 * w01
            + p11.channel(c) as f64 * w11;
        out.set_channel_f64(c, v);
    }
    out
}

/// Sample with or without anti-aliasing.
#[inline]
pub fn sample(src: &PixelBuffer, x: f64, y: f64, anti_alias: bool) -> ColorSample {
    if anti_alias {
        sample_bilinear(src, x, y)
    } else {
        sample_nearest(src, x, y)
    }
}

#[inline]
fn truncate(v: f64) -> i64 {
    if v.is_finite() {
        v.trunc().clamp(i64::MIN as f64, i64::MAX as f64) as i64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::BitDepth;

    fn ramp() -> PixelBuffer {
        let mut buf = PixelBuffer::new(2, 1, BitDepth::Eight, false).unwrap();
        buf.set_pixel(0, 0, &ColorSample::opaque(0, 0, 0, false));
        buf.set_pixel(1, 0, &ColorSample::opaque(200, 100, 50, false));
        buf
    }

    #[test]
    fn test_bilinear_midpoint() {
        let p = sample_bilinear(&ramp(), 0.5, 0.0);
        assert_eq!((p.red, p.green, p.blue), (100, 50, 25));
    }

    #[test]
    fn test_integer_coordinates_are_exact() {
        let src = ramp();
        assert_eq!(sample_bilinear(&src, 1.0, 0.0), src.pixel(1, 0).unwrap());
        assert_eq!(sample_nearest(&src, 1.9, 0.0), src.pixel(1, 0).unwrap());
    }

    #[test]
    fn test_out_of_range_is_clamped() {
        let src = ramp();
        assert_eq!(sample_nearest(&src, -40.0, 9.0), src.pixel(0, 0).unwrap());
        assert_eq!(sample_bilinear(&src, 50.0, -3.0), src.pixel(1, 0).unwrap());
        assert_eq!(sample(&src, f64::NAN, 0.0, true), src.pixel(0, 0).unwrap());
    }
}
