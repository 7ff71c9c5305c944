//! Depth-independent colour samples.

use serde::{Deserialize, Serialize};

/// Largest channel value of an 8-bit sample.
pub const MAX_8BIT: u16 = 255;
/// Largest channel value of a 16-bit sample.
pub const MAX_16BIT: u16 = 65535;

/// An RGBA pixel value that hides whether it was read from 8-bit or 16-bit
/// storage.
///
/// Channels are always held as integers in the native range of the sample
/// depth. Every setter clamps to that range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ColorSample {
    /// Red channel
    pub red: u16,
    /// Green channel
    pub green: u16,
    /// Blue channel
    pub blue: u16,
    /// Alpha channel
    pub alpha: u16,
    /// Whether channel values are in the 16-bit range
    pub sixteen_bit: bool,
}

impl ColorSample {
    /// Create a sample, clamping each channel to the depth range.
    pub fn new(red: u16, green: u16, blue: u16, alpha: u16, sixteen_bit: bool) -> Self {
        let max = max_for(sixteen_bit);
        Self {
            red: red.min(max),
            green: green.min(max),
            blue: blue.min(max),
            alpha: alpha.min(max),
            sixteen_bit,
        }
    }

    /// Create a fully opaque sample.
    pub fn opaque(red: u16, green: u16, blue: u16, sixteen_bit: bool) -> Self {
        Self::new(red, green, blue, max_for(sixteen_bit), sixteen_bit)
    }

    /// Create a sample from signed values, clamping into range.
    pub fn from_ints(red: i32, green: i32, blue: i32, alpha: i32, sixteen_bit: bool) -> Self {
        let max = max_for(sixteen_bit) as i32;
        let c = |v: i32| v.clamp(0, max) as u16;
        Self {
            red: c(red),
            green: c(green),
            blue: c(blue),
            alpha: c(alpha),
            sixteen_bit,
        }
    }

    /// Largest value a channel may hold.
    pub fn max_value(&self) -> u16 {
        max_for(self.sixteen_bit)
    }

    /// Set the red channel, clamped.
    pub fn set_red(&mut self, value: i32) {
        self.red = self.clamp(value);
    }

    /// Set the green channel, clamped.
    pub fn set_green(&mut self, value: i32) {
        self.green = self.clamp(value);
    }

    /// Set the blue channel, clamped.
    pub fn set_blue(&mut self, value: i32) {
        self.blue = self.clamp(value);
    }

    /// Set the alpha channel, clamped.
    pub fn set_alpha(&mut self, value: i32) {
        self.alpha = self.clamp(value);
    }

    /// Channel by index: 0 red, 1 green, 2 blue, 3 alpha.
    pub fn channel(&self, index: usize) -> u16 {
        match index {
            0 => self.red,
            1 => self.green,
            2 => self.blue,
            _ => self.alpha,
        }
    }

    /// Set a channel by index, clamped.
    pub fn set_channel(&mut self, index: usize, value: i32) {
        let value = self.clamp(value);
        match index {
            0 => self.red = value,
            1 => self.green = value,
            2 => self.blue = value,
            _ => self.alpha = value,
        }
    }

    /// Set a channel from a real value, rounding to nearest.
    pub fn set_channel_f64(&mut self, index: usize, value: f64) {
        let max = self.max_value() as f64;
        let value = if value.is_finite() {
            value.round().clamp(0.0, max)
        } else {
            0.0
        };
        self.set_channel(index, value as i32);
    }

    /// Weighted intensity `0.3 R + 0.59 G + 0.11 B`.
    pub fn intensity(&self) -> f64 {
        0.3 * self.red as f64 + 0.59 * self.green as f64 + 0.11 * self.blue as f64
    }

    /// Convert to another depth. 8 to 16 multiplies by 257; 16 to 8 rounds.
    pub fn to_depth(&self, sixteen_bit: bool) -> Self {
        if sixteen_bit == self.sixteen_bit {
            return *self;
        }
        let convert = |v: u16| -> u16 {
            if sixteen_bit {
                v * 257
            } else {
                ((v as u32 + 128) / 257) as u16
            }
        };
        Self {
            red: convert(self.red),
            green: convert(self.green),
            blue: convert(self.blue),
            alpha: convert(self.alpha),
            sixteen_bit,
        }
    }

    /// Normalised BT.601 YCbCr triple, each component in `[0, 1]`.
    pub fn to_ycbcr(&self) -> [f64; 3] {
        let max = self.max_value() as f64;
        let r = self.red as f64 / max;
        let g = self.green as f64 / max;
        let b = self.blue as f64 / max;
        [
            0.299 * r + 0.587 * g + 0.114 * b,
            0.5 - 0.168_736 * r - 0.331_264 * g + 0.5 * b,
            0.5 + 0.5 * r - 0.418_688 * g - 0.081_312 * b,
        ]
    }

    /// Build a sample from a normalised YCbCr triple.
    pub fn from_ycbcr(ycbcr: [f64; 3], alpha: u16, sixteen_bit: bool) -> Self {
        let [y, cb, cr] = ycbcr;
        let cb = cb - 0.5;
        let cr = cr - 0.5;
        let mut sample = Self {
            alpha: alpha.min(max_for(sixteen_bit)),
            sixteen_bit,
            ..Self::default()
        };
        let max = sample.max_value() as f64;
        sample.set_channel_f64(0, (y + 1.402 * cr) * max);
        sample.set_channel_f64(1, (y - 0.344_136 * cb - 0.714_136 * cr) * max);
        sample.set_channel_f64(2, (y + 1.772 * cb) * max);
        sample
    }

    fn clamp(&self, value: i32) -> u16 {
        value.clamp(0, self.max_value() as i32) as u16
    }
}

/// Largest channel value for the given depth.
pub fn max_for(sixteen_bit: bool) -> u16 {
    if sixteen_bit {
        MAX_16BIT
    } else {
        MAX_8BIT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setters_clamp() {
        let mut c = ColorSample::opaque(10, 20, 30, false);
        c.set_red(300);
        c.set_green(-4);
        assert_eq!(c.red, 255);
        assert_eq!(c.green, 0);

        let mut c = ColorSample::opaque(10, 20, 30, true);
        c.set_blue(70_000);
        assert_eq!(c.blue, 65535);
    }

    #[test]
    fn test_depth_conversion() {
        let c = ColorSample::opaque(255, 128, 0, false);
        let wide = c.to_depth(true);
        assert_eq!(wide.red, 65535);
        assert_eq!(wide.green, 128 * 257);
        assert_eq!(wide.to_depth(false), c);
    }

    #[test]
    fn test_ycbcr_round_trip_is_close() {
        let c = ColorSample::opaque(200, 90, 40, false);
        let back = ColorSample::from_ycbcr(c.to_ycbcr(), c.alpha, false);
        assert!((back.red as i32 - 200).abs() <= 1);
        assert!((back.green as i32 - 90).abs() <= 1);
        assert!((back.blue as i32 - 40).abs() <= 1);
    }

    #[test]
    fn test_intensity_of_white() {
        let c = ColorSample::opaque(255, 255, 255, false);
        assert!((c.intensity() - 255.0).abs() < 1e-9);
    }
}
