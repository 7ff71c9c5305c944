//! Geometric distortion effects.
//!
//! Every effect is an inverse mapping: for each destination pixel the warp
//! computes where in the source to read from, and the sample is taken with
//! bilinear anti-aliasing or clamped nearest lookup. Rows are independent,
//! so each pass is a single row-parallel engine run.

use crate::core::action::{FilterAction, SEED_PARAMETER};
use crate::core::buffer::PixelBuffer;
use crate::core::color::ColorSample;
use crate::core::error::{ConfigResult, ConfigurationError, FilterResult};
use crate::core::metadata::{Category, FilterMetadata, ParameterDefinition};
use crate::core::random::RandomStream;
use crate::execution::{FilterContext, RunStatus, FULL_WINDOW};
use crate::filters::sampling::sample;
use crate::filters::PixelFilter;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const DEG_TO_RAD: f64 = PI / 180.0;

/// Available distortion effects. Discriminants are the action `type` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistortionEffect {
    /// Exponential radial bulge
    FishEye = 0,
    /// Rotation growing toward the centre
    Twirl = 1,
    /// Horizontal cylinder projection
    CylindricalHorizontal = 2,
    /// Vertical cylinder projection
    CylindricalVertical = 3,
    /// Both axes
    CylindricalBoth = 4,
    /// Logarithmic radial pinch
    Caricature = 5,
    /// Angle multiplication with quadratic radius
    MultipleCorners = 6,
    /// Rows shifted sinusoidally, wrapping around
    WavesHorizontal = 7,
    /// Columns shifted sinusoidally, wrapping around
    WavesVertical = 8,
    /// Per-pixel sinusoidal offsets from the origin
    BlockWaves1 = 9,
    /// Per-pixel sinusoidal offsets from the centre
    BlockWaves2 = 10,
    /// Concentric ripples
    CircularWaves1 = 11,
    /// Concentric ripples growing with radius
    CircularWaves2 = 12,
    /// Cartesian to polar
    PolarCoordinates = 13,
    /// Polar to cartesian
    UnpolarCoordinates = 14,
    /// Randomly displaced square tiles
    Tile = 15,
}

impl DistortionEffect {
    /// All effects in `type` order.
    pub const ALL: [DistortionEffect; 16] = [
        DistortionEffect::FishEye,
        DistortionEffect::Twirl,
        DistortionEffect::CylindricalHorizontal,
        DistortionEffect::CylindricalVertical,
        DistortionEffect::CylindricalBoth,
        DistortionEffect::Caricature,
        DistortionEffect::MultipleCorners,
        DistortionEffect::WavesHorizontal,
        DistortionEffect::WavesVertical,
        DistortionEffect::BlockWaves1,
        DistortionEffect::BlockWaves2,
        DistortionEffect::CircularWaves1,
        DistortionEffect::CircularWaves2,
        DistortionEffect::PolarCoordinates,
        DistortionEffect::UnpolarCoordinates,
        DistortionEffect::Tile,
    ];

    /// Look up an effect by its `type` value.
    pub fn from_index(index: i64) -> ConfigResult<Self> {
        usize::try_from(index)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(ConfigurationError::UnknownVariant {
                name: "type".to_string(),
                value: index,
            })
    }

    /// The `type` value.
    pub fn index(self) -> i64 {
        self as i64
    }
}

/// Where a destination pixel takes its colour from.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Source {
    /// Same coordinate in the source.
    Keep,
    /// Real coordinate, sampled with the filter's anti-aliasing setting.
    At(f64, f64),
    /// Integer coordinate, clamped to the edge.
    Clamped(i64, i64),
    /// Nothing maps here.
    Blank,
}

/// Image geometry shared by the warps.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    width: i64,
    height: i64,
    half_w: f64,
    half_h: f64,
    x_scale: f64,
    y_scale: f64,
}

impl Geometry {
    fn new(width: u32, height: u32) -> Self {
        let (w, h) = (width as f64, height as f64);
        let (x_scale, y_scale) = if width > height {
            (1.0, w / h)
        } else if height > width {
            (h / w, 1.0)
        } else {
            (1.0, 1.0)
        };
        Self {
            width: width as i64,
            height: height as i64,
            half_w: (width / 2) as f64,
            half_h: (height / 2) as f64,
            x_scale,
            y_scale,
        }
    }

    /// Half the larger side.
    fn max_half(&self) -> f64 {
        self.width.max(self.height) as f64 / 2.0
    }

    fn diagonal(&self) -> f64 {
        ((self.width * self.width + self.height * self.height) as f64).sqrt()
    }
}

/// Precomputed per-effect constants.
#[derive(Debug, Clone)]
enum Warp {
    Radial {
        step: f64,
        lf_coeff: f64,
        rad_max: f64,
    },
    Twirl {
        angle_step: f64,
        rad_max: f64,
    },
    Cylindrical {
        step: f64,
        coeff_x: Option<f64>,
        coeff_y: Option<f64>,
    },
    Corners {
        factor: f64,
        rad_max: f64,
    },
    Waves {
        amplitude: f64,
        frequency: f64,
        horizontal: bool,
    },
    BlockWaves {
        amplitude: f64,
        frequency: f64,
        centred: bool,
    },
    CircularWaves {
        amplitude: f64,
        freq_angle: f64,
        phase: f64,
        proportional: bool,
        rad_max: f64,
    },
    Polar {
        rad_max: f64,
    },
    Unpolar {
        rad_max: f64,
    },
    Tile {
        size: i64,
        columns: i64,
        rows: i64,
        reach: i64,
        offsets: Vec<(i64, i64)>,
    },
}

/// Exponential warp for positive coefficients, logarithmic for negative.
#[inline]
fn radial_warp(r: f64, step: f64, lf_coeff: f64) -> f64 {
    if step > 0.0 {
        ((r / lf_coeff).exp() - 1.0) / step
    } else {
        lf_coeff * (1.0 - step * r).ln()
    }
}

/// `half / ln(|step| * half + 1)`, falling back to 1 when the ratio is undefined.
#[inline]
fn log_scale(half: f64, step: f64) -> f64 {
    let denom = (step.abs() * half + 1.0).ln();
    if half <= 0.0 || denom <= f64::EPSILON || !denom.is_finite() {
        1.0
    } else {
        half / denom
    }
}

impl Warp {
    fn source(&self, g: &Geometry, x: i64, y: i64) -> Source {
        match self {
            Warp::Radial {
                step,
                lf_coeff,
                rad_max,
            } => {
                let th = g.y_scale * (y as f64 - g.half_h);
                let tw = g.x_scale * (x as f64 - g.half_w);
                let r = (th * th + tw * tw).sqrt();
                if r >= *rad_max {
                    return Source::Keep;
                }
                let angle = th.atan2(tw);
                let r = radial_warp(r, *step, *lf_coeff);
                Source::At(
                    g.half_w + (r / g.x_scale) * angle.cos(),
                    g.half_h + (r / g.y_scale) * angle.sin(),
                )
            }
            Warp::Twirl {
                angle_step,
                rad_max,
            } => {
                let th = g.y_scale * (y as f64 - g.half_h);
                let tw = g.x_scale * (x as f64 - g.half_w);
                let r = (th * th + tw * tw).sqrt();
                if r >= *rad_max {
                    return Source::Keep;
                }
                let angle = th.atan2(tw) + angle_step * (rad_max - r);
                Source::At(
                    g.half_w + angle.cos() * (r / g.x_scale),
                    g.half_h + angle.sin() * (r / g.y_scale),
                )
            }
            Warp::Cylindrical {
                step,
                coeff_x,
                coeff_y,
            } => {
                let mut nw = (x as f64 - g.half_w).abs();
                let mut nh = (y as f64 - g.half_h).abs();
                if let Some(cx) = coeff_x {
                    nw = radial_warp(nw, *step, *cx);
                }
                if let Some(cy) = coeff_y {
                    nh = radial_warp(nh, *step, *cy);
                }
                let nw = if x as f64 >= g.half_w { nw } else { -nw };
                let nh = if y as f64 >= g.half_h { nh } else { -nh };
                Source::At(g.half_w + nw, g.half_h + nh)
            }
            Warp::Corners { factor, rad_max } => {
                let nh = g.half_h - y as f64;
                let nw = g.half_w - x as f64;
                let r = (nh * nh + nw * nw).sqrt();
                let angle = nh.atan2(nw) * factor;
                let r = r * r / rad_max;
                Source::At(g.half_w - angle.cos() * r, g.half_h - angle.sin() * r)
            }
            Warp::Waves {
                amplitude,
                frequency,
                horizontal,
            } => {
                if *horizontal {
                    let tx = (amplitude * (frequency * 2.0 * y as f64 * DEG_TO_RAD).sin()).round() as i64;
                    Source::Clamped((x - tx).rem_euclid(g.width), y)
                } else {
                    let ty = (amplitude * (frequency * 2.0 * x as f64 * DEG_TO_RAD).sin()).round() as i64;
                    Source::Clamped(x, (y - ty).rem_euclid(g.height))
                }
            }
            Warp::BlockWaves {
                amplitude,
                frequency,
                centred,
            } => {
                let (bx, by) = if *centred {
                    ((g.width / 2 - x) as f64, (g.height / 2 - y) as f64)
                } else {
                    (x as f64, y as f64)
                };
                let nw = x as f64 + amplitude * (frequency * bx * DEG_TO_RAD).sin();
                let nh = y as f64 + amplitude * (frequency * by * DEG_TO_RAD).cos();
                Source::Clamped(nw.trunc() as i64, nh.trunc() as i64)
            }
            Warp::CircularWaves {
                amplitude,
                freq_angle,
                phase,
                proportional,
                rad_max,
            } => {
                let nw = (g.width / 2 - x) as f64;
                let nh = (g.height / 2 - y) as f64;
                let r = (nw * nw + nh * nh).sqrt();
                let amp = if *proportional {
                    amplitude * r / rad_max
                } else {
                    *amplitude
                };
                let a = freq_angle * r + phase;
                Source::At(x as f64 + amp * a.sin(), y as f64 + amp * a.cos())
            }
            Warp::Polar { rad_max } => {
                let th = g.y_scale * (y as f64 - g.half_h);
                let tw = g.x_scale * (x as f64 - g.half_w);
                let r = (th * th + tw * tw).sqrt();
                let angle = tw.atan2(th);
                Source::At(
                    g.half_w + angle * g.width as f64 / (2.0 * PI),
                    r * g.height as f64 / rad_max,
                )
            }
            Warp::Unpolar { rad_max } => {
                let r = y as f64 * rad_max / g.height as f64;
                let angle = x as f64 * 2.0 * PI / g.width as f64;
                Source::At(
                    g.half_w - (r / g.x_scale) * angle.sin(),
                    g.half_h - (r / g.y_scale) * angle.cos(),
                )
            }
            Warp::Tile {
                size,
                columns,
                rows,
                reach,
                offsets,
            } => tile_source(*size, *columns, *rows, *reach, offsets, g, x, y),
        }
    }
}

/// Find the last tile, in raster drawing order, that covers `(x, y)`.
#[allow(clippy::too_many_arguments)]
fn tile_source(
    size: i64,
    columns: i64,
    rows: i64,
    reach: i64,
    offsets: &[(i64, i64)],
    g: &Geometry,
    x: i64,
    y: i64,
) -> Source {
    let row_lo = ((y - reach).div_euclid(size)).max(0);
    let row_hi = ((y + reach).div_euclid(size)).min(rows - 1);
    let col_lo = ((x - reach).div_euclid(size)).max(0);
    let col_hi = ((x + reach).div_euclid(size)).min(columns - 1);

    for row in (row_lo..=row_hi).rev() {
        for col in (col_lo..=col_hi).rev() {
            let (tx, ty) = offsets[(row * columns + col) as usize];
            let sx = x - tx;
            let sy = y - ty;
            if sx < 0 || sy < 0 || sx >= g.width || sy >= g.height {
                continue;
            }
            if sx.div_euclid(size) == col && sy.div_euclid(size) == row {
                return Source::Clamped(sx, sy);
            }
        }
    }
    Source::Blank
}

/// Distortion filter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DistortionFilter {
    /// Effect to apply
    pub effect: DistortionEffect,
    /// Strength, 0..=100
    pub level: i32,
    /// Frequency or tile size control, 0..=200
    pub iteration: i32,
    /// Bilinear sampling for the smooth warps
    pub anti_alias: bool,
    /// Seed for tile offsets
    pub seed: u32,
}

impl DistortionFilter {
    /// Filter identifier.
    pub const ID: &'static str = "distortion";
    /// Parameter schema version.
    pub const VERSION: u32 = 1;
    /// Largest accepted level.
    pub const MAX_LEVEL: i32 = 100;
    /// Largest accepted iteration.
    pub const MAX_ITERATION: i32 = 200;

    /// Create a filter with anti-aliasing on and a fresh random seed.
    pub fn new(effect: DistortionEffect, level: i32, iteration: i32) -> Self {
        Self {
            effect,
            level,
            iteration,
            anti_alias: true,
            seed: RandomStream::non_deterministic_seed(),
        }
    }

    /// Enable or disable anti-aliasing.
    pub fn with_anti_alias(mut self, anti_alias: bool) -> Self {
        self.anti_alias = anti_alias;
        self
    }

    /// Fix the tile seed.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Edge length of a tile.
    pub fn tile_size(&self) -> i64 {
        (210 - self.iteration as i64).max(1)
    }

    fn warp(&self, g: &Geometry) -> Warp {
        let level = self.level as f64;
        let iteration = self.iteration as f64;
        match self.effect {
            DistortionEffect::FishEye | DistortionEffect::Caricature => {
                let coeff = if self.effect == DistortionEffect::FishEye {
                    level / 5.0
                } else {
                    -level / 5.0
                };
                let step = coeff / 1000.0;
                let rad_max = g.max_half();
                Warp::Radial {
                    step,
                    lf_coeff: log_scale(rad_max, step),
                    rad_max,
                }
            }
            DistortionEffect::Twirl => Warp::Twirl {
                angle_step: level / 10000.0,
                rad_max: g.max_half(),
            },
            DistortionEffect::CylindricalHorizontal
            | DistortionEffect::CylindricalVertical
            | DistortionEffect::CylindricalBoth => {
                let step = level / 1000.0;
                let horizontal = self.effect != DistortionEffect::CylindricalVertical;
                let vertical = self.effect != DistortionEffect::CylindricalHorizontal;
                Warp::Cylindrical {
                    step,
                    coeff_x: horizontal.then(|| log_scale(g.half_w, step)),
                    coeff_y: vertical.then(|| log_scale(g.half_h, step)),
                }
            }
            DistortionEffect::MultipleCorners => Warp::Corners {
                factor: level,
                rad_max: (g.diagonal() / 2.0).max(f64::EPSILON),
            },
            DistortionEffect::WavesHorizontal | DistortionEffect::WavesVertical => Warp::Waves {
                amplitude: level,
                frequency: iteration,
                horizontal: self.effect == DistortionEffect::WavesHorizontal,
            },
            DistortionEffect::BlockWaves1 | DistortionEffect::BlockWaves2 => Warp::BlockWaves {
                amplitude: level,
                frequency: iteration,
                centred: self.effect == DistortionEffect::BlockWaves2,
            },
            DistortionEffect::CircularWaves1 | DistortionEffect::CircularWaves2 => {
                let proportional = self.effect == DistortionEffect::CircularWaves2;
                Warp::CircularWaves {
                    amplitude: level,
                    freq_angle: iteration * DEG_TO_RAD,
                    phase: if proportional { 25.0 * DEG_TO_RAD } else { 0.0 },
                    proportional,
                    rad_max: g.diagonal().max(f64::EPSILON),
                }
            }
            DistortionEffect::PolarCoordinates => Warp::Polar {
                rad_max: g.max_half(),
            },
            DistortionEffect::UnpolarCoordinates => Warp::Unpolar {
                rad_max: g.max_half(),
            },
            DistortionEffect::Tile => {
                let size = self.tile_size();
                let columns = (g.width + size - 1) / size;
                let rows = (g.height + size - 1) / size;
                let random = self.level.max(1);
                let mut stream = RandomStream::with_seed(self.seed);
                let offsets = (0..rows * columns)
                    .map(|_| {
                        let tx = stream.number(-random / 2, random / 2) as i64;
                        let ty = stream.number(-random / 2, random / 2) as i64;
                        (tx, ty)
                    })
                    .collect();
                Warp::Tile {
                    size,
                    columns,
                    rows,
                    reach: (random / 2) as i64 + size,
                    offsets,
                }
            }
        }
    }
}

impl PixelFilter for DistortionFilter {
    fn metadata() -> FilterMetadata {
        FilterMetadata::builder(Self::ID, "Distortion Effects")
            .description("Fisheye, twirl, cylinder, waves, polar and tile distortions")
            .category(Category::Distort)
            .version(Self::VERSION)
            .randomized()
            .parameter(
                ParameterDefinition::new("antiAlias", true)
                    .with_description("Bilinear sampling for smooth warps"),
            )
            .parameter(
                ParameterDefinition::new("type", 0)
                    .with_description("Effect index, 0 (fisheye) to 15 (tile)")
                    .with_choices(DistortionEffect::ALL.iter().map(|e| e.index())),
            )
            .parameter(
                ParameterDefinition::new("iteration", 10)
                    .with_description("Frequency, or tile size as 210 - iteration")
                    .with_range(0.0, Self::MAX_ITERATION as f64),
            )
            .parameter(
                ParameterDefinition::new("level", 50)
                    .with_description("Effect strength")
                    .with_range(0.0, Self::MAX_LEVEL as f64),
            )
            .parameter(
                ParameterDefinition::new(SEED_PARAMETER, 0)
                    .with_description("Tile displacement seed")
                    .with_range(0.0, u32::MAX as f64),
            )
            .build()
    }

    fn from_action(action: &FilterAction) -> ConfigResult<Self> {
        Self::metadata().check(action)?;
        let effect = DistortionEffect::from_index(action.integer_or("type", 0)?)?;
        Ok(Self {
            effect,
            level: action.integer_or("level", 50)? as i32,
            iteration: action.integer_or("iteration", 10)? as i32,
            anti_alias: action.boolean_or("antiAlias", true)?,
            seed: action
                .seed()?
                .unwrap_or_else(RandomStream::non_deterministic_seed),
        })
    }

    fn filter_action(&self) -> FilterAction {
        let mut action = FilterAction::new(Self::ID, Self::VERSION)
            .with_parameter("antiAlias", self.anti_alias)
            .with_parameter("type", self.effect.index())
            .with_parameter("iteration", self.iteration)
            .with_parameter("level", self.level);
        if self.effect == DistortionEffect::Tile {
            action.add_parameter(SEED_PARAMETER, self.seed);
        }
        action
    }

    fn validate(&self, _source: &PixelBuffer) -> ConfigResult<()> {
        if !(0..=Self::MAX_LEVEL).contains(&self.level) {
            return Err(ConfigurationError::invalid(
                "level",
                format!("{} is outside 0..={}", self.level, Self::MAX_LEVEL),
            ));
        }
        if !(0..=Self::MAX_ITERATION).contains(&self.iteration) {
            return Err(ConfigurationError::invalid(
                "iteration",
                format!("{} is outside 0..={}", self.iteration, Self::MAX_ITERATION),
            ));
        }
        Ok(())
    }

    fn is_noop(&self) -> bool {
        match self.effect {
            DistortionEffect::WavesHorizontal | DistortionEffect::WavesVertical => {
                self.level == 0 || self.iteration == 0
            }
            DistortionEffect::PolarCoordinates | DistortionEffect::UnpolarCoordinates => false,
            _ => self.level == 0,
        }
    }

    fn render(
        &self,
        source: &PixelBuffer,
        dest: &mut PixelBuffer,
        ctx: &FilterContext<'_>,
    ) -> FilterResult<RunStatus> {
        let geometry = Geometry::new(source.width(), source.height());
        let warp = self.warp(&geometry);
        let blank = ColorSample {
            sixteen_bit: source.is_sixteen_bit(),
            ..ColorSample::default()
        };
        let width = source.width();
        let anti_alias = self.anti_alias;

        Ok(ctx.for_each_row(dest, FULL_WINDOW, |band, y| {
            for x in 0..width {
                let color = match warp.source(&geometry, x as i64, y as i64) {
                    Source::Keep => source.pixel_clamped(x as i64, y as i64),
                    Source::At(nx, ny) => sample(source, nx, ny, anti_alias),
                    Source::Clamped(ix, iy) => source.pixel_clamped(ix, iy),
                    Source::Blank => blank,
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

    fn pattern(width: u32, height: u32, depth: BitDepth) -> PixelBuffer {
        let sixteen = depth.is_sixteen();
        let mut buf = PixelBuffer::new(width, height, depth, false).unwrap();
        for y in 0..height {
            for x in 0..width {
                let v = ((x * 13 + y * 29) % 256) as u16;
                let c = ColorSample::opaque(v, (x * 7 % 256) as u16, (y * 5 % 256) as u16, false);
                buf.set_pixel(x, y, &c.to_depth(sixteen));
            }
        }
        buf
    }

    fn run(filter: &DistortionFilter, src: &PixelBuffer, threads: usize) -> PixelBuffer {
        let engine = FilterEngine::with_threads(threads).unwrap();
        let ctx = FilterContext::new(&engine);
        let mut dest = PixelBuffer::new_like(src).unwrap();
        let status = apply_filter(filter, src, &mut dest, &ctx).unwrap();
        assert!(status.is_completed());
        dest
    }

    #[test]
    fn test_zero_level_is_noop() {
        let src = pattern(16, 12, BitDepth::Eight);
        for effect in [
            DistortionEffect::FishEye,
            DistortionEffect::Twirl,
            DistortionEffect::CylindricalBoth,
            DistortionEffect::MultipleCorners,
            DistortionEffect::WavesHorizontal,
            DistortionEffect::Tile,
        ] {
            let filter = DistortionFilter::new(effect, 0, 30).with_seed(1);
            assert!(filter.is_noop());
            assert_eq!(run(&filter, &src, 2), src);
        }
    }

    #[test]
    fn test_waves_zero_frequency_is_noop() {
        let filter = DistortionFilter::new(DistortionEffect::WavesVertical, 40, 0);
        assert!(filter.is_noop());
    }

    #[test]
    fn test_horizontal_waves_rotate_rows() {
        let src = pattern(20, 10, BitDepth::Eight);
        let filter = DistortionFilter::new(DistortionEffect::WavesHorizontal, 5, 20);
        let out = run(&filter, &src, 3);

        // sin(0) = 0 leaves row 0 unshifted
        for x in 0..20 {
            assert_eq!(out.pixel(x, 0), src.pixel(x, 0));
        }
        for y in 0..10 {
            let mut a: Vec<u16> = (0..20).map(|x| src.pixel(x, y).unwrap().red).collect();
            let mut b: Vec<u16> = (0..20).map(|x| out.pixel(x, y).unwrap().red).collect();
            a.sort_unstable();
            b.sort_unstable();
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_every_effect_handles_awkward_sizes() {
        for (w, h) in [(1, 1), (1, 7), (9, 2), (31, 17)] {
            let src = pattern(w, h, BitDepth::Eight);
            for effect in DistortionEffect::ALL {
                for anti_alias in [false, true] {
                    let filter = DistortionFilter::new(effect, 70, 150)
                        .with_seed(9)
                        .with_anti_alias(anti_alias);
                    let out = run(&filter, &src, 2);
                    assert_eq!(out.data().len(), src.data().len());
                }
            }
        }
    }

    #[test]
    fn test_pixels_beyond_radius_are_copied() {
        let src = pattern(20, 20, BitDepth::Eight);
        let filter = DistortionFilter::new(DistortionEffect::FishEye, 80, 0);
        let out = run(&filter, &src, 2);
        assert_eq!(out.pixel(0, 0), src.pixel(0, 0));
        assert_eq!(out.pixel(19, 19), src.pixel(19, 19));
    }

    #[test]
    fn test_tile_is_deterministic_across_thread_counts() {
        let src = pattern(64, 48, BitDepth::Eight);
        let filter = DistortionFilter::new(DistortionEffect::Tile, 30, 190).with_seed(4242);
        let one = run(&filter, &src, 1);
        let four = run(&filter, &src, 4);
        assert_eq!(one, four);
        assert_ne!(one, src);

        let other = run(&filter.clone().with_seed(4243), &src, 4);
        assert_ne!(one, other);
    }

    #[test]
    fn test_tile_with_no_displacement_copies() {
        let g = Geometry::new(30, 30);
        let warp = DistortionFilter::new(DistortionEffect::Tile, 1, 195)
            .with_seed(3)
            .warp(&g);
        for y in 0..30 {
            for x in 0..30 {
                assert_eq!(warp.source(&g, x, y), Source::Clamped(x, y));
            }
        }
    }

    #[test]
    fn test_sixteen_bit_matches_eight_bit() {
        let src8 = pattern(24, 18, BitDepth::Eight);
        let src16 = pattern(24, 18, BitDepth::Sixteen);
        let filter = DistortionFilter::new(DistortionEffect::Twirl, 60, 0);

        let out8 = run(&filter, &src8, 2);
        let out16 = run(&filter, &src16, 2);
        for y in 0..18 {
            for x in 0..24 {
                let a = out8.pixel(x, y).unwrap().to_depth(true);
                let b = out16.pixel(x, y).unwrap();
                for c in 0..3 {
                    assert!((a.channel(c) as i32 - b.channel(c) as i32).abs() <= 257);
                }
            }
        }
    }

    #[test]
    fn test_action_round_trip_and_seed() {
        let tile = DistortionFilter::new(DistortionEffect::Tile, 20, 100).with_seed(77);
        let action = tile.filter_action();
        assert_eq!(action.seed().unwrap(), Some(77));
        assert_eq!(DistortionFilter::from_action(&action).unwrap(), tile);

        let twirl = DistortionFilter::new(DistortionEffect::Twirl, 20, 100);
        assert!(!twirl.filter_action().has_parameter(SEED_PARAMETER));

        let bad = FilterAction::new(DistortionFilter::ID, 1).with_parameter("type", 16);
        assert!(DistortionFilter::from_action(&bad).is_err());
        assert!(matches!(
            DistortionEffect::from_index(-1),
            Err(ConfigurationError::UnknownVariant { .. })
        ));
    }

    #[test]
    fn test_out_of_range_level_is_rejected() {
        let src = pattern(4, 4, BitDepth::Eight);
        let engine = FilterEngine::with_threads(1).unwrap();
        let ctx = FilterContext::new(&engine);
        let mut dest = PixelBuffer::new_like(&src).unwrap();
        let filter = DistortionFilter::new(DistortionEffect::FishEye, 500, 0);
        assert!(apply_filter(&filter, &src, &mut dest, &ctx).is_err());
        assert_eq!(dest, src);
    }
}
