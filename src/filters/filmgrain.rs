//! Film grain: tone-dependent noise added in YCbCr space.
//!
//! The image is divided into square grain cells. Every cell gets one shared
//! "lead" offset per enabled channel group, drawn on the calling thread in
//! raster order. Each pixel then adds its cell's lead plus its own secondary
//! noise, drawn from a per-row stream whose seed also comes from the master
//! stream. Output is therefore identical for any worker count.

use crate::core::action::{FilterAction, SEED_PARAMETER};
use crate::core::buffer::PixelBuffer;
use crate::core::color::ColorSample;
use crate::core::error::{ConfigResult, ConfigurationError, FilterResult};
use crate::core::metadata::{Category, FilterMetadata, ParameterDefinition};
use crate::core::random::RandomStream;
use crate::execution::{FilterContext, RunStatus, FULL_WINDOW};
use crate::filters::PixelFilter;

/// Noise range per unit of intensity, in normalised YCbCr units.
const GRAIN_UNIT: f64 = 0.01;

/// A cell whose own tone range falls this far below its anchor's uses its own.
const TONE_OVERRIDE: f64 = 0.1;

/// Largest accepted intensity.
pub const MAX_INTENSITY: u32 = 20;

/// Largest accepted grain cell size.
pub const MAX_GRAIN_SIZE: u32 = 5;

/// Noise strength for one channel group, shaped by tone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToneNoise {
    /// Overall strength, 0 disables the group
    pub intensity: u32,
    /// Shadow gain, -100..=100
    pub shadows: i32,
    /// Midtone gain, -100..=100
    pub midtones: i32,
    /// Highlight gain, -100..=100
    pub highlights: i32,
}

impl Default for ToneNoise {
    fn default() -> Self {
        Self::off()
    }
}

impl ToneNoise {
    /// Noise at `intensity`, strongest in the midtones.
    pub fn new(intensity: u32) -> Self {
        Self {
            intensity,
            shadows: -100,
            midtones: 0,
            highlights: -100,
        }
    }

    /// A disabled group.
    pub fn off() -> Self {
        Self::new(0)
    }

    /// Set the shadow, midtone and highlight gains.
    pub fn with_tones(mut self, shadows: i32, midtones: i32, highlights: i32) -> Self {
        self.shadows = shadows;
        self.midtones = midtones;
        self.highlights = highlights;
        self
    }

    /// Whether this group adds any noise.
    pub fn is_enabled(&self) -> bool {
        self.intensity > 0
    }

    /// Piecewise-linear tone weight in `[0, 1]` for luma `y`.
    pub fn weight(&self, y: f64) -> f64 {
        let s = (self.shadows as f64 + 100.0) / 200.0;
        let m = (self.midtones as f64 + 100.0) / 200.0;
        let h = (self.highlights as f64 + 100.0) / 200.0;
        if (0.0..=0.5).contains(&y) {
            s + 2.0 * (m - s) * y
        } else if (0.5..=1.0).contains(&y) {
            2.0 * (h - m) * y + 2.0 * m - h
        } else {
            1.0
        }
    }

    /// Noise range for luma `y`.
    pub fn range(&self, y: f64) -> f64 {
        self.intensity as f64 * GRAIN_UNIT * self.weight(y)
    }

    fn validate(&self, group: &str) -> ConfigResult<()> {
        if self.intensity > MAX_INTENSITY {
            return Err(ConfigurationError::invalid(
                format!("{}Intensity", group),
                format!("{} exceeds {}", self.intensity, MAX_INTENSITY),
            ));
        }
        for (name, value) in [
            ("Shadows", self.shadows),
            ("Midtones", self.midtones),
            ("Highlights", self.highlights),
        ] {
            if !(-100..=100).contains(&value) {
                return Err(ConfigurationError::invalid(
                    format!("{}{}", group, name),
                    format!("{} is outside -100..=100", value),
                ));
            }
        }
        Ok(())
    }
}

/// Action parameter prefixes, in YCbCr component order.
const GROUPS: [&str; 3] = ["luma", "chromaBlue", "chromaRed"];

/// Film grain filter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct FilmGrainFilter {
    /// Edge length of a grain cell
    pub grain_size: u32,
    /// Photographic (Poisson-like) secondary noise instead of Gaussian
    pub photo_distribution: bool,
    /// Luma noise
    pub luma: ToneNoise,
    /// Blue-difference chroma noise
    pub chroma_blue: ToneNoise,
    /// Red-difference chroma noise
    pub chroma_red: ToneNoise,
    /// Master seed
    pub seed: u32,
}

impl Default for FilmGrainFilter {
    fn default() -> Self {
        Self::new(ToneNoise::new(4))
    }
}

impl FilmGrainFilter {
    /// Filter identifier.
    pub const ID: &'static str = "filmgrain";
    /// Parameter schema version.
    pub const VERSION: u32 = 1;

    /// Luma-only grain with a fresh random seed.
    pub fn new(luma: ToneNoise) -> Self {
        Self {
            grain_size: 1,
            photo_distribution: false,
            luma,
            chroma_blue: ToneNoise::off(),
            chroma_red: ToneNoise::off(),
            seed: RandomStream::non_deterministic_seed(),
        }
    }

    /// Set the chroma groups.
    pub fn with_chroma(mut self, blue: ToneNoise, red: ToneNoise) -> Self {
        self.chroma_blue = blue;
        self.chroma_red = red;
        self
    }

    /// Set the grain cell size.
    pub fn with_grain_size(mut self, size: u32) -> Self {
        self.grain_size = size;
        self
    }

    /// Use the photographic noise distribution.
    pub fn with_photo_distribution(mut self, enabled: bool) -> Self {
        self.photo_distribution = enabled;
        self
    }

    /// Fix the master seed.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    fn groups(&self) -> [&ToneNoise; 3] {
        [&self.luma, &self.chroma_blue, &self.chroma_red]
    }

    /// Secondary per-pixel noise for a group with range `range`.
    fn secondary(&self, rng: &mut RandomStream, range: f64) -> f64 {
        if self.photo_distribution {
            // Centred Poisson of mean lambda, in grain units, approximated by a Gaussian.
            let lambda = (self.grain_size as f64 / 2.0) * (range / 2.0) / GRAIN_UNIT;
            rng.gaussian(lambda.sqrt()) * GRAIN_UNIT
        } else {
            rng.gaussian(range / 2.0)
        }
    }
}

impl PixelFilter for FilmGrainFilter {
    fn metadata() -> FilterMetadata {
        let mut builder = FilterMetadata::builder(Self::ID, "Film Grain")
            .description("Add tone-dependent luma and chroma grain")
            .category(Category::Noise)
            .version(Self::VERSION)
            .randomized()
            .parameter(
                ParameterDefinition::new("grainSize", 1)
                    .with_description("Grain cell edge length")
                    .with_range(1.0, MAX_GRAIN_SIZE as f64),
            )
            .parameter(
                ParameterDefinition::new("photoDistribution", false)
                    .with_description("Photographic noise distribution"),
            );
        let defaults = [ToneNoise::new(4), ToneNoise::off(), ToneNoise::off()];
        for (group, noise) in GROUPS.iter().zip(defaults) {
            builder = builder
                .parameter(
                    ParameterDefinition::new(format!("{}Intensity", group), noise.intensity)
                        .with_description("Noise strength, 0 disables")
                        .with_range(0.0, MAX_INTENSITY as f64),
                )
                .parameter(
                    ParameterDefinition::new(format!("{}Shadows", group), noise.shadows)
                        .with_range(-100.0, 100.0),
                )
                .parameter(
                    ParameterDefinition::new(format!("{}Midtones", group), noise.midtones)
                        .with_range(-100.0, 100.0),
                )
                .parameter(
                    ParameterDefinition::new(format!("{}Highlights", group), noise.highlights)
                        .with_range(-100.0, 100.0),
                );
        }
        builder
            .parameter(
                ParameterDefinition::new(SEED_PARAMETER, 0)
                    .with_description("Master seed")
                    .with_range(0.0, u32::MAX as f64),
            )
            .build()
    }

    fn from_action(action: &FilterAction) -> ConfigResult<Self> {
        Self::metadata().check(action)?;
        let read = |group: &str, intensity: u32| -> ConfigResult<ToneNoise> {
            Ok(ToneNoise {
                intensity: action.u32_or(&format!("{}Intensity", group), intensity)?,
                shadows: action.integer_or(&format!("{}Shadows", group), -100)? as i32,
                midtones: action.integer_or(&format!("{}Midtones", group), 0)? as i32,
                highlights: action.integer_or(&format!("{}Highlights", group), -100)? as i32,
            })
        };
        Ok(Self {
            grain_size: action.u32_or("grainSize", 1)?,
            photo_distribution: action.boolean_or("photoDistribution", false)?,
            luma: read(GROUPS[0], 4)?,
            chroma_blue: read(GROUPS[1], 0)?,
            chroma_red: read(GROUPS[2], 0)?,
            seed: action
                .seed()?
                .unwrap_or_else(RandomStream::non_deterministic_seed),
        })
    }

    fn filter_action(&self) -> FilterAction {
        let mut action = FilterAction::new(Self::ID, Self::VERSION)
            .with_parameter("grainSize", self.grain_size)
            .with_parameter("photoDistribution", self.photo_distribution);
        for (group, noise) in GROUPS.iter().zip(self.groups()) {
            action.add_parameter(format!("{}Intensity", group), noise.intensity);
            action.add_parameter(format!("{}Shadows", group), noise.shadows);
            action.add_parameter(format!("{}Midtones", group), noise.midtones);
            action.add_parameter(format!("{}Highlights", group), noise.highlights);
        }
        action.add_parameter(SEED_PARAMETER, self.seed);
        action
    }

    fn validate(&self, _source: &PixelBuffer) -> ConfigResult<()> {
        if !(1..=MAX_GRAIN_SIZE).contains(&self.grain_size) {
            return Err(ConfigurationError::invalid(
                "grainSize",
                format!("{} is outside 1..={}", self.grain_size, MAX_GRAIN_SIZE),
            ));
        }
        for (group, noise) in GROUPS.iter().zip(self.groups()) {
            noise.validate(group)?;
        }
        Ok(())
    }

    fn is_noop(&self) -> bool {
        self.groups().iter().all(|g| !g.is_enabled())
    }

    fn render(
        &self,
        source: &PixelBuffer,
        dest: &mut PixelBuffer,
        ctx: &FilterContext<'_>,
    ) -> FilterResult<RunStatus> {
        let size = self.grain_size.max(1);
        let (width, height) = (source.width(), source.height());
        let columns = width.div_ceil(size) as usize;
        let rows = height.div_ceil(size) as usize;
        let groups = self.groups();
        let enabled = groups.map(|g| g.is_enabled());

        let mut master = RandomStream::with_seed(self.seed);
        let mut leads = vec![[0.0f64; 3]; columns * rows];
        for lead in leads.iter_mut() {
            for (slot, on) in lead.iter_mut().zip(enabled) {
                if on {
                    *slot = master.number_f64(-0.5, 0.5);
                }
            }
        }
        let row_seeds: Vec<u32> = (0..height).map(|_| master.next_seed()).collect();

        Ok(ctx.for_each_row(dest, FULL_WINDOW, |band, y| {
            let mut rng = RandomStream::with_seed(row_seeds[y]);
            let cell_row = y / size as usize;
            for x in 0..width {
                let cell_col = (x / size) as usize;
                let anchor = source.pixel_clamped(
                    (cell_col as u32 * size) as i64,
                    (cell_row as u32 * size) as i64,
                );
                let anchor_luma = anchor.to_ycbcr()[0];
                let lead = &leads[cell_row * columns + cell_col];

                let original = source.pixel_clamped(x as i64, y as i64);
                let mut ycc = original.to_ycbcr();
                let luma = ycc[0];
                let mut changed = false;

                for (i, noise) in groups.iter().enumerate() {
                    if !enabled[i] {
                        continue;
                    }
                    let reference = noise.range(anchor_luma);
                    let own = noise.range(luma);
                    let override_tone = reference > 0.0 && (reference - own) / reference > TONE_OVERRIDE;
                    let (range, offset) = if override_tone {
                        (own, rng.number_f64(-own / 2.0, own / 2.0))
                    } else {
                        (reference, lead[i] * reference)
                    };
                    if range <= 0.0 {
                        continue;
                    }
                    ycc[i] = (ycc[i] + offset + self.secondary(&mut rng, range)).clamp(0.0, 1.0);
                    changed = true;
                }

                let color = if changed {
                    ColorSample::from_ycbcr(ycc, original.alpha, original.sixteen_bit)
                } else {
                    original
                };
                band.set_pixel(x, y, &color);
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::BitDepth;
    use crate::execution::FilterEngine;
    use crate::filters::apply_filter;

    fn ramp(width: u32, height: u32, depth: BitDepth) -> PixelBuffer {
        let mut buf = PixelBuffer::new(width, height, depth, true).unwrap();
        for y in 0..height {
            for x in 0..width {
                let v = ((x + y) * 255 / (width + height)) as u16;
                let c = ColorSample::new(v, 255 - v, v / 2, 180, false);
                buf.set_pixel(x, y, &c.to_depth(depth.is_sixteen()));
            }
        }
        buf
    }

    fn run(filter: &FilmGrainFilter, src: &PixelBuffer, threads: usize) -> PixelBuffer {
        let engine = FilterEngine::with_threads(threads).unwrap();
        let ctx = FilterContext::new(&engine);
        let mut dest = PixelBuffer::new_like(src).unwrap();
        assert!(apply_filter(filter, src, &mut dest, &ctx).unwrap().is_completed());
        dest
    }

    #[test]
    fn test_tone_weight_interpolation() {
        let noise = ToneNoise::new(10);
        assert_eq!(noise.weight(0.0), 0.0);
        assert_eq!(noise.weight(0.5), 0.5);
        assert_eq!(noise.weight(1.0), 0.0);

        let flat = ToneNoise::new(10).with_tones(100, 100, 100);
        assert_eq!(flat.weight(0.2), 1.0);
        assert_eq!(flat.weight(0.8), 1.0);
    }

    #[test]
    fn test_zero_intensity_is_noop() {
        let src = ramp(16, 16, BitDepth::Eight);
        let filter = FilmGrainFilter::new(ToneNoise::off()).with_seed(1);
        assert!(filter.is_noop());
        assert_eq!(run(&filter, &src, 2), src);
    }

    #[test]
    fn test_same_seed_any_thread_count() {
        let src = ramp(40, 33, BitDepth::Eight);
        let filter = FilmGrainFilter::new(ToneNoise::new(12))
            .with_chroma(ToneNoise::new(5), ToneNoise::new(5))
            .with_grain_size(3)
            .with_seed(31337);
        let one = run(&filter, &src, 1);
        let four = run(&filter, &src, 4);
        assert_eq!(one, four);
        assert_ne!(one, src);

        let other = run(&filter.clone().with_seed(31338), &src, 4);
        assert_ne!(one, other);
    }

    #[test]
    fn test_alpha_is_preserved() {
        let src = ramp(12, 12, BitDepth::Eight);
        let filter = FilmGrainFilter::new(ToneNoise::new(20)).with_photo_distribution(true).with_seed(8);
        let out = run(&filter, &src, 2);
        for y in 0..12 {
            for x in 0..12 {
                assert_eq!(out.pixel(x, y).unwrap().alpha, 180);
            }
        }
    }

    #[test]
    fn test_sixteen_bit_matches_eight_bit() {
        let filter = FilmGrainFilter::new(ToneNoise::new(10).with_tones(0, 0, 0)).with_seed(77);
        let out8 = run(&filter, &ramp(20, 20, BitDepth::Eight), 2);
        let out16 = run(&filter, &ramp(20, 20, BitDepth::Sixteen), 2);
        for y in 0..20 {
            for x in 0..20 {
                let a = out8.pixel(x, y).unwrap().to_depth(true);
                let b = out16.pixel(x, y).unwrap();
                for c in 0..3 {
                    assert!((a.channel(c) as i32 - b.channel(c) as i32).abs() <= 257);
                }
            }
        }
    }

    #[test]
    fn test_invalid_settings_copy_source() {
        let src = ramp(6, 6, BitDepth::Eight);
        let engine = FilterEngine::with_threads(1).unwrap();
        let ctx = FilterContext::new(&engine);
        let mut dest = PixelBuffer::new_like(&src).unwrap();
        let filter = FilmGrainFilter::new(ToneNoise::new(50));
        assert!(apply_filter(&filter, &src, &mut dest, &ctx).is_err());
        assert_eq!(dest, src);
    }

    #[test]
    fn test_action_round_trip() {
        let filter = FilmGrainFilter::new(ToneNoise::new(7).with_tones(-20, 40, 10))
            .with_chroma(ToneNoise::off(), ToneNoise::new(3))
            .with_grain_size(2)
            .with_seed(5);
        let action = filter.filter_action();
        assert_eq!(action.integer("chromaRedIntensity").unwrap(), 3);
        assert_eq!(FilmGrainFilter::from_action(&action).unwrap(), filter);
    }
}
