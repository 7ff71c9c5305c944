//! Charcoal drawing composite.
//!
//! Five stages, each a full engine pass: edge detection, Gaussian smoothing,
//! per-channel contrast stretch, inversion and a monochrome mix.

use crate::core::action::FilterAction;
use crate::core::buffer::{PixelBuffer, RowBand};
use crate::core::color::ColorSample;
use crate::core::error::{ConfigResult, ConfigurationError, FilterResult};
use crate::core::metadata::{Category, FilterMetadata, ParameterDefinition};
use crate::execution::{FilterContext, ProgressWindow, RunStatus};
use crate::filters::convolution::{
    convolve_2d, convolve_separable, optimal_kernel_width, Kernel1D, Kernel2D,
};
use crate::filters::PixelFilter;
use log::debug;
use parking_lot::Mutex;

/// Per-channel minimum and maximum of red, green and blue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelRange {
    /// Smallest value per channel
    pub min: [u16; 3],
    /// Largest value per channel
    pub max: [u16; 3],
}

impl ChannelRange {
    /// A range that any sample widens.
    pub fn empty() -> Self {
        Self {
            min: [u16::MAX; 3],
            max: [0; 3],
        }
    }

    /// Widen to include `c`.
    pub fn include(&mut self, c: &ColorSample) {
        for i in 0..3 {
            let v = c.channel(i);
            self.min[i] = self.min[i].min(v);
            self.max[i] = self.max[i].max(v);
        }
    }

    /// Union with another range.
    pub fn merge(&mut self, other: &ChannelRange) {
        for i in 0..3 {
            self.min[i] = self.min[i].min(other.min[i]);
            self.max[i] = self.max[i].max(other.max[i]);
        }
    }

    /// Linearly map channel `i` of `v` onto `[0, max]`.
    ///
    /// Flat channels are left alone.
    pub fn stretch(&self, i: usize, v: u16, max: u16) -> f64 {
        let (lo, hi) = (self.min[i], self.max[i]);
        if hi <= lo {
            return v as f64;
        }
        (v.saturating_sub(lo)) as f64 * max as f64 / (hi - lo) as f64
    }
}

/// Scan `buffer` for its per-channel range in one parallel reduction.
pub fn channel_range(
    buffer: &PixelBuffer,
    ctx: &FilterContext<'_>,
    window: ProgressWindow,
) -> (RunStatus, ChannelRange) {
    let total = Mutex::new(ChannelRange::empty());
    let width = buffer.width();
    let status = ctx.for_each_range(buffer.height() as usize, window, |rows| {
        let mut local = ChannelRange::empty();
        for y in rows {
            for x in 0..width {
                local.include(&buffer.pixel_clamped(x as i64, y as i64));
            }
        }
        total.lock().merge(&local);
    });
    (status, total.into_inner())
}

/// Apply `map` to every pixel of `buffer` in place.
fn map_pixels<F>(
    buffer: &mut PixelBuffer,
    ctx: &FilterContext<'_>,
    window: ProgressWindow,
    map: F,
) -> RunStatus
where
    F: Fn(ColorSample) -> ColorSample + Sync,
{
    let width = buffer.width();
    ctx.for_each_row(buffer, window, |band: &mut RowBand<'_>, y| {
        for x in 0..width {
            if let Some(c) = band.pixel(x, y) {
                band.set_pixel(x, y, &map(c));
            }
        }
    })
}

/// Charcoal filter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CharcoalFilter {
    /// Edge kernel radius
    pub pencil: f64,
    /// Smoothing strength; the blur deviation is a tenth of it
    pub smooth: f64,
}

impl Default for CharcoalFilter {
    fn default() -> Self {
        Self::new(5.0, 10.0)
    }
}

impl CharcoalFilter {
    /// Filter identifier.
    pub const ID: &'static str = "charcoal";
    /// Parameter schema version.
    pub const VERSION: u32 = 1;

    /// Create a filter.
    pub fn new(pencil: f64, smooth: f64) -> Self {
        Self { pencil, smooth }
    }

    /// Width of the edge-detection kernel.
    pub fn kernel_width(&self) -> usize {
        optimal_kernel_width(self.pencil, self.smooth)
    }
}

impl PixelFilter for CharcoalFilter {
    fn metadata() -> FilterMetadata {
        FilterMetadata::builder(Self::ID, "Charcoal")
            .description("Render the image as a charcoal drawing")
            .category(Category::Artistic)
            .version(Self::VERSION)
            .parameter(
                ParameterDefinition::new("pencil", 5.0)
                    .with_description("Pencil size")
                    .with_range(1.0, 100.0),
            )
            .parameter(
                ParameterDefinition::new("smooth", 10.0)
                    .with_description("Smoothing")
                    .with_range(1.0, 100.0),
            )
            .build()
    }

    fn from_action(action: &FilterAction) -> ConfigResult<Self> {
        Self::metadata().check(action)?;
        Ok(Self {
            pencil: action.float_or("pencil", 5.0)?,
            smooth: action.float_or("smooth", 10.0)?,
        })
    }

    fn filter_action(&self) -> FilterAction {
        FilterAction::new(Self::ID, Self::VERSION)
            .with_parameter("pencil", self.pencil)
            .with_parameter("smooth", self.smooth)
    }

    fn validate(&self, source: &PixelBuffer) -> ConfigResult<()> {
        for (name, value) in [("pencil", self.pencil), ("smooth", self.smooth)] {
            if !value.is_finite() || !(1.0..=100.0).contains(&value) {
                return Err(ConfigurationError::invalid(name, format!("{} is outside 1..=100", value)));
            }
        }
        let width = self.kernel_width();
        if width > source.width() as usize {
            return Err(ConfigurationError::invalid(
                "pencil",
                format!("kernel width {} exceeds image width {}", width, source.width()),
            ));
        }
        Ok(())
    }

    fn is_noop(&self) -> bool {
        false
    }

    fn render(
        &self,
        source: &PixelBuffer,
        dest: &mut PixelBuffer,
        ctx: &FilterContext<'_>,
    ) -> FilterResult<RunStatus> {
        let width = self.kernel_width();
        debug!("charcoal edge kernel {}x{}", width, width);

        let mut edges = PixelBuffer::new_like(source)?;
        let status = convolve_2d(source, &mut edges, &Kernel2D::edge_detect(width), false, ctx, (0, 30));
        if status.is_cancelled() {
            return Ok(status);
        }

        let blur = Kernel1D::gaussian(self.smooth / 10.0);
        let status = convolve_separable(&edges, dest, &blur, &blur, false, ctx, (30, 60))?;
        if status.is_cancelled() {
            return Ok(status);
        }

        let (status, range) = channel_range(dest, ctx, (60, 70));
        if status.is_cancelled() {
            return Ok(status);
        }
        let max = dest.max_value();
        let status = map_pixels(dest, ctx, (70, 80), |mut c| {
            for i in 0..3 {
                c.set_channel_f64(i, range.stretch(i, c.channel(i), max));
            }
            c
        });
        if status.is_cancelled() {
            return Ok(status);
        }

        let status = map_pixels(dest, ctx, (80, 90), |mut c| {
            for i in 0..3 {
                c.set_channel(i, (max - c.channel(i)) as i32);
            }
            c
        });
        if status.is_cancelled() {
            return Ok(status);
        }

        Ok(map_pixels(dest, ctx, (90, 100), |mut c| {
            let gray = c.intensity();
            for i in 0..3 {
                c.set_channel_f64(i, gray);
            }
            c
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::BitDepth;
    use crate::execution::FilterEngine;
    use crate::filters::apply_filter;

    fn square(size: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(size, size, BitDepth::Eight, true).unwrap();
        for y in 0..size {
            for x in 0..size {
                let inside = x > size / 4 && x < 3 * size / 4 && y > size / 4 && y < 3 * size / 4;
                let v = if inside { 220 } else { 30 };
                buf.set_pixel(x, y, &ColorSample::new(v, v / 2, v, 255, false));
            }
        }
        buf
    }

    #[test]
    fn test_output_is_monochrome() {
        let src = square(40);
        let engine = FilterEngine::with_threads(3).unwrap();
        let ctx = FilterContext::new(&engine);
        let mut dest = PixelBuffer::new_like(&src).unwrap();
        let status = apply_filter(&CharcoalFilter::new(2.0, 10.0), &src, &mut dest, &ctx).unwrap();
        assert!(status.is_completed());

        for y in 0..40 {
            for x in 0..40 {
                let c = dest.pixel(x, y).unwrap();
                assert_eq!(c.red, c.green);
                assert_eq!(c.green, c.blue);
                assert_eq!(c.alpha, 255);
            }
        }
        // flat interior is white after inversion, the outline is darker
        let centre = dest.pixel(20, 20).unwrap().red;
        let edge = dest.pixel(11, 20).unwrap().red;
        assert!(edge < centre);
    }

    #[test]
    fn test_kernel_wider_than_image_is_rejected() {
        let src = square(8);
        let engine = FilterEngine::with_threads(1).unwrap();
        let ctx = FilterContext::new(&engine);
        let mut dest = PixelBuffer::new_like(&src).unwrap();
        let err = apply_filter(&CharcoalFilter::new(20.0, 10.0), &src, &mut dest, &ctx);
        assert!(err.is_err());
        assert_eq!(dest, src);
    }

    #[test]
    fn test_channel_range_reduction() {
        let src = square(16);
        let engine = FilterEngine::with_threads(4).unwrap();
        let ctx = FilterContext::new(&engine);
        let (status, range) = channel_range(&src, &ctx, (0, 100));
        assert!(status.is_completed());
        assert_eq!(range.min, [30, 15, 30]);
        assert_eq!(range.max, [220, 110, 220]);
        assert_eq!(range.stretch(0, 220, 255), 255.0);
        assert_eq!(range.stretch(0, 30, 255), 0.0);
    }

    #[test]
    fn test_same_output_any_thread_count() {
        let src = square(30);
        let filter = CharcoalFilter::default();
        let render = |threads| {
            let engine = FilterEngine::with_threads(threads).unwrap();
            let ctx = FilterContext::new(&engine);
            let mut dest = PixelBuffer::new_like(&src).unwrap();
            apply_filter(&filter, &src, &mut dest, &ctx).unwrap();
            dest
        };
        assert_eq!(render(1), render(4));
    }

    #[test]
    fn test_action_round_trip() {
        let filter = CharcoalFilter::new(3.0, 25.0);
        assert_eq!(CharcoalFilter::from_action(&filter.filter_action()).unwrap(), filter);
    }
}
