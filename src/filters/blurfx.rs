//! Special-effect blurs: zoom, radial, far, motion, softener, shake,
//! focus, smart, frost glass and mosaic.

use crate::core::action::{FilterAction, SEED_PARAMETER};
use crate::core::buffer::PixelBuffer;
use crate::core::color::ColorSample;
use crate::core::error::{ConfigResult, ConfigurationError, FilterResult};
use crate::core::metadata::{Category, FilterMetadata, ParameterDefinition};
use crate::core::random::RandomStream;
use crate::execution::{FilterContext, RunStatus, FULL_WINDOW};
use crate::filters::convolution::{convolve_separable, Kernel1D};
use crate::filters::PixelFilter;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Available blur effects. Discriminants are the action `type` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlurEffect {
    /// Average along the ray toward the centre
    Zoom = 0,
    /// Average along the arc around the centre
    Radial = 1,
    /// Separable far kernel
    Far = 2,
    /// Average along a line at `level` degrees
    Motion = 3,
    /// 7x7 box on light tones, 3x3 on dark ones
    Softener = 4,
    /// Average of four displaced copies
    Shake = 5,
    /// Gaussian blur blended in with distance from the centre
    FocusBlur = 6,
    /// Row then column average of neighbours within a colour threshold
    SmartBlur = 7,
    /// Random neighbour picked by intensity
    FrostGlass = 8,
    /// Cells filled from their centre pixel
    Mosaic = 9,
}

impl BlurEffect {
    /// All effects in `type` order.
    pub const ALL: [BlurEffect; 10] = [
        BlurEffect::Zoom,
        BlurEffect::Radial,
        BlurEffect::Far,
        BlurEffect::Motion,
        BlurEffect::Softener,
        BlurEffect::Shake,
        BlurEffect::FocusBlur,
        BlurEffect::SmartBlur,
        BlurEffect::FrostGlass,
        BlurEffect::Mosaic,
    ];

    /// Look up an effect by its `type` value.
    pub fn from_index(index: i64) -> ConfigResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.index() == index)
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

/// Blur effect filter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct BlurFxFilter {
    /// Effect to apply
    pub effect: BlurEffect,
    /// Effect reach in pixels
    pub distance: i32,
    /// Motion angle in degrees, focus blend radius in tens of pixels,
    /// or smart blur colour threshold
    pub level: i32,
    /// Focus blur keeps the border sharp and blurs the centre
    pub inverse: bool,
    /// Seed for frost glass
    pub seed: u32,
}

impl BlurFxFilter {
    /// Filter identifier.
    pub const ID: &'static str = "blurfx";
    /// Parameter schema version.
    pub const VERSION: u32 = 1;
    /// Largest accepted distance.
    pub const MAX_DISTANCE: i32 = 100;
    /// Largest accepted level.
    pub const MAX_LEVEL: i32 = 360;

    /// Create a filter with a fresh random seed.
    pub fn new(effect: BlurEffect, distance: i32, level: i32) -> Self {
        Self {
            effect,
            distance,
            level,
            inverse: false,
            seed: RandomStream::non_deterministic_seed(),
        }
    }

    /// Swap the sharp and blurred areas of the focus blur.
    pub fn with_inverse(mut self, inverse: bool) -> Self {
        self.inverse = inverse;
        self
    }

    /// Fix the frost glass seed.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    fn render_rows<F>(
        &self,
        source: &PixelBuffer,
        dest: &mut PixelBuffer,
        ctx: &FilterContext<'_>,
        pixel_fn: F,
    ) -> RunStatus
    where
        F: Fn(i64, i64) -> ColorSample + Sync,
    {
        let width = source.width();
        ctx.for_each_row(dest, FULL_WINDOW, |band, y| {
            for x in 0..width {
                band.set_pixel(x, y, &pixel_fn(x as i64, y as i64));
            }
        })
    }
}

/// Channel sums for averaging.
#[derive(Debug, Default, Clone, Copy)]
struct Sum {
    red: i64,
    green: i64,
    blue: i64,
    count: i64,
}

impl Sum {
    #[inline]
    fn add(&mut self, c: &ColorSample) {
        self.red += c.red as i64;
        self.green += c.green as i64;
        self.blue += c.blue as i64;
        self.count += 1;
    }

    /// Truncated average written over `base`, keeping its alpha.
    /// An empty sum leaves `base` as is.
    fn average_into(&self, mut base: ColorSample) -> ColorSample {
        if self.count > 0 {
            base.set_red((self.red / self.count) as i32);
            base.set_green((self.green / self.count) as i32);
            base.set_blue((self.blue / self.count) as i32);
        }
        base
    }
}

fn in_bounds(src: &PixelBuffer, x: i64, y: i64) -> bool {
    src.layout().contains(x, y)
}

fn zoom_pixel(src: &PixelBuffer, distance: f64, x: i64, y: i64) -> ColorSample {
    let (cx, cy) = ((src.width() / 2) as i64, (src.height() / 2) as i64);
    let (w, h) = (src.width() as f64, src.height() as f64);
    let rad_max = (w * w + h * h).sqrt();
    let (nw, nh) = ((cx - x) as f64, (cy - y) as f64);
    let radius = (nw * nw + nh * nh).sqrt();
    let angle = nh.atan2(nw);
    let reach = radius * distance / rad_max;

    let mut sum = Sum::default();
    let mut r = 0.0;
    while r <= reach {
        let px = (cx as f64 - (radius - r) * angle.cos()) as i64;
        let py = (cy as f64 - (radius - r) * angle.sin()) as i64;
        if in_bounds(src, px, py) {
            sum.add(&src.pixel_clamped(px, py));
        }
        r += 1.0;
    }
    sum.average_into(src.pixel_clamped(x, y))
}

fn radial_pixel(src: &PixelBuffer, steps: &[f64], x: i64, y: i64) -> ColorSample {
    let (cx, cy) = ((src.width() / 2) as i64, (src.height() / 2) as i64);
    let (nw, nh) = ((cx - x) as f64, (cy - y) as f64);
    let radius = (nw * nw + nh * nh).sqrt();
    let base = nh.atan2(nw);

    let mut sum = Sum::default();
    for step in steps {
        let angle = base + step;
        let px = (cx as f64 - radius * angle.cos()) as i64;
        let py = (cy as f64 - radius * angle.sin()) as i64;
        if in_bounds(src, px, py) {
            sum.add(&src.pixel_clamped(px, py));
        }
    }
    sum.average_into(src.pixel_clamped(x, y))
}

fn softener_pixel(src: &PixelBuffer, x: i64, y: i64) -> ColorSample {
    let centre = src.pixel_clamped(x, y);
    let gray = (centre.red as i64 + centre.green as i64 + centre.blue as i64) / 3;
    let limit = (src.max_value() / 2) as i64;
    let reach = if gray > limit { 3 } else { 1 };

    let mut sum = Sum::default();
    for a in -reach..=reach {
        for b in -reach..=reach {
            // Neighbours above or left of the image fall back to the centre.
            if y + a < 0 || x + b < 0 {
                sum.add(&centre);
            } else {
                sum.add(&src.pixel_clamped(x + b, y + a));
            }
        }
    }
    sum.average_into(centre)
}

fn shake_pixel(src: &PixelBuffer, distance: i64, x: i64, y: i64) -> ColorSample {
    let mut sum = Sum::default();
    sum.add(&src.pixel_clamped(x, y + distance));
    sum.add(&src.pixel_clamped(x, y - distance));
    sum.add(&src.pixel_clamped(x + distance, y));
    sum.add(&src.pixel_clamped(x - distance, y));
    sum.average_into(src.pixel_clamped(x, y))
}

/// Blend `blurred` over `sharp` by distance from the centre, keeping the
/// sharp pixel's alpha. Inverse mode swaps the two layers.
fn focus_pixel(
    sharp: ColorSample,
    blurred: ColorSample,
    centre: (i64, i64),
    blend_radius: f64,
    inverse: bool,
    x: i64,
    y: i64,
) -> ColorSample {
    let (nw, nh) = ((centre.0 - x) as f64, (centre.1 - y) as f64);
    let radius = (nw * nw + nh * nh).sqrt();
    let factor = if blend_radius > 0.0 {
        (radius / blend_radius).clamp(0.0, 1.0)
    } else {
        1.0
    };
    let (top, bottom) = if inverse { (sharp, blurred) } else { (blurred, sharp) };

    let mut out = sharp;
    for i in 0..3 {
        let v = top.channel(i) as f64 * factor + bottom.channel(i) as f64 * (1.0 - factor);
        out.set_channel_f64(i, v);
    }
    out
}

/// Whether every colour channel of `a` lies within `range` of `b`.
#[inline]
fn within_range(a: &ColorSample, b: &ColorSample, range: i64) -> bool {
    (0..3).all(|i| (a.channel(i) as i64 - b.channel(i) as i64).abs() <= range)
}

/// One smart blur pass along a row (`horizontal`) or column.
///
/// Neighbours are compared against the source colours. Accepted ones
/// contribute their `values` sample, rejected ones the centre's source
/// colour. Neighbours outside the image are skipped.
fn smart_pixel(
    src: &PixelBuffer,
    values: &PixelBuffer,
    radius: i64,
    range: i64,
    horizontal: bool,
    x: i64,
    y: i64,
) -> ColorSample {
    let centre = src.pixel_clamped(x, y);
    let mut sum = Sum::default();
    for a in -radius..=radius {
        let (nx, ny) = if horizontal { (x + a, y) } else { (x, y + a) };
        if !in_bounds(src, nx, ny) {
            continue;
        }
        if within_range(&centre, &src.pixel_clamped(nx, ny), range) {
            sum.add(&values.pixel_clamped(nx, ny));
        } else {
            sum.add(&centre);
        }
    }
    sum.average_into(centre)
}

/// Integer intensity used to bucket frost glass neighbours.
#[inline]
fn bucket(c: &ColorSample) -> u32 {
    c.intensity() as u32
}

/// Pick a neighbour with probability proportional to how common its
/// intensity is, and return the average colour of that intensity.
fn frost_pixel(
    src: &PixelBuffer,
    frost: i64,
    rng: &mut RandomStream,
    scratch: &mut Vec<(u32, ColorSample)>,
    x: i64,
    y: i64,
) -> ColorSample {
    scratch.clear();
    for ny in (y - frost)..=(y + frost) {
        for nx in (x - frost)..=(x + frost) {
            if in_bounds(src, nx, ny) {
                let c = src.pixel_clamped(nx, ny);
                scratch.push((bucket(&c), c));
            }
        }
    }
    let centre = src.pixel_clamped(x, y);
    if scratch.is_empty() {
        return centre;
    }
    scratch.sort_unstable_by_key(|(i, _)| *i);

    let pick = rng.number(0, scratch.len() as i32 - 1) as usize;
    let chosen = scratch[pick].0;
    let mut sum = Sum::default();
    for (_, c) in scratch.iter().filter(|(i, _)| *i == chosen) {
        sum.add(c);
    }
    sum.average_into(centre)
}

impl PixelFilter for BlurFxFilter {
    fn metadata() -> FilterMetadata {
        FilterMetadata::builder(Self::ID, "Blur Effects")
            .description("Zoom, radial, far, motion, softener, shake, focus, smart, frost glass and mosaic blurs")
            .category(Category::Blur)
            .version(Self::VERSION)
            .randomized()
            .parameter(
                ParameterDefinition::new("type", 0)
                    .with_description("Effect index")
                    .with_choices(BlurEffect::ALL.iter().map(|e| e.index())),
            )
            .parameter(
                ParameterDefinition::new("distance", 3)
                    .with_description("Blur reach in pixels")
                    .with_range(0.0, Self::MAX_DISTANCE as f64),
            )
            .parameter(
                ParameterDefinition::new("level", 0)
                    .with_description("Motion angle, focus blend radius (x10) or smart blur threshold")
                    .with_range(0.0, Self::MAX_LEVEL as f64),
            )
            .parameter(
                ParameterDefinition::new("inverse", false)
                    .with_description("Focus blur: sharp border, blurred centre"),
            )
            .parameter(
                ParameterDefinition::new(SEED_PARAMETER, 0)
                    .with_description("Frost glass seed")
                    .with_range(0.0, u32::MAX as f64),
            )
            .build()
    }

    fn from_action(action: &FilterAction) -> ConfigResult<Self> {
        Self::metadata().check(action)?;
        Ok(Self {
            effect: BlurEffect::from_index(action.integer_or("type", 0)?)?,
            distance: action.integer_or("distance", 3)? as i32,
            level: action.integer_or("level", 0)? as i32,
            inverse: action.boolean_or("inverse", false)?,
            seed: action
                .seed()?
                .unwrap_or_else(RandomStream::non_deterministic_seed),
        })
    }

    fn filter_action(&self) -> FilterAction {
        let mut action = FilterAction::new(Self::ID, Self::VERSION)
            .with_parameter("type", self.effect.index())
            .with_parameter("distance", self.distance)
            .with_parameter("level", self.level);
        match self.effect {
            BlurEffect::FocusBlur => action.add_parameter("inverse", self.inverse),
            BlurEffect::FrostGlass => action.add_parameter(SEED_PARAMETER, self.seed),
            _ => {}
        }
        action
    }

    fn validate(&self, _source: &PixelBuffer) -> ConfigResult<()> {
        if !(0..=Self::MAX_DISTANCE).contains(&self.distance) {
            return Err(ConfigurationError::invalid(
                "distance",
                format!("{} is outside 0..={}", self.distance, Self::MAX_DISTANCE),
            ));
        }
        if !(0..=Self::MAX_LEVEL).contains(&self.level) {
            return Err(ConfigurationError::invalid(
                "level",
                format!("{} is outside 0..={}", self.level, Self::MAX_LEVEL),
            ));
        }
        Ok(())
    }

    fn is_noop(&self) -> bool {
        match self.effect {
            BlurEffect::Zoom | BlurEffect::Radial | BlurEffect::Mosaic => self.distance <= 1,
            BlurEffect::Far
            | BlurEffect::Motion
            | BlurEffect::Shake
            | BlurEffect::FocusBlur
            | BlurEffect::SmartBlur => self.distance < 1,
            BlurEffect::Softener | BlurEffect::FrostGlass => false,
        }
    }

    fn render(
        &self,
        source: &PixelBuffer,
        dest: &mut PixelBuffer,
        ctx: &FilterContext<'_>,
    ) -> FilterResult<RunStatus> {
        let distance = self.distance as i64;
        let status = match self.effect {
            BlurEffect::Zoom => {
                let d = self.distance as f64;
                self.render_rows(source, dest, ctx, |x, y| zoom_pixel(source, d, x, y))
            }
            BlurEffect::Radial => {
                let steps: Vec<f64> = (-distance..=distance)
                    .map(|i| i as f64 * PI / 180.0)
                    .collect();
                self.render_rows(source, dest, ctx, |x, y| radial_pixel(source, &steps, x, y))
            }
            BlurEffect::Far => {
                let kernel = Kernel1D::far(self.distance as usize);
                return convolve_separable(source, dest, &kernel, &kernel, false, ctx, FULL_WINDOW);
            }
            BlurEffect::Motion => {
                let angle = if self.level == 0 { 360.0 } else { self.level as f64 };
                let (dx, dy) = ((angle * PI / 180.0).cos(), (angle * PI / 180.0).sin());
                let offsets: Vec<(i64, i64)> = (-distance..=distance)
                    .map(|i| ((i as f64 * dx).round() as i64, (i as f64 * dy).round() as i64))
                    .collect();
                self.render_rows(source, dest, ctx, |x, y| {
                    let mut sum = Sum::default();
                    for (ox, oy) in &offsets {
                        sum.add(&source.pixel_clamped(x + ox, y + oy));
                    }
                    sum.average_into(source.pixel_clamped(x, y))
                })
            }
            BlurEffect::Softener => {
                self.render_rows(source, dest, ctx, |x, y| softener_pixel(source, x, y))
            }
            BlurEffect::Shake => {
                self.render_rows(source, dest, ctx, |x, y| shake_pixel(source, distance, x, y))
            }
            BlurEffect::FocusBlur => {
                let blur = Kernel1D::gaussian(self.distance as f64);
                let status = convolve_separable(source, dest, &blur, &blur, false, ctx, (0, 80))?;
                if status.is_cancelled() {
                    return Ok(status);
                }
                let centre = ((source.width() / 2) as i64, (source.height() / 2) as i64);
                let blend_radius = self.level as f64 * 10.0;
                let inverse = self.inverse;
                let width = source.width();
                ctx.for_each_row(dest, (80, 100), |band, y| {
                    for x in 0..width {
                        if let Some(blurred) = band.pixel(x, y) {
                            let sharp = source.pixel_clamped(x as i64, y as i64);
                            let (xi, yi) = (x as i64, y as i64);
                            let c = focus_pixel(sharp, blurred, centre, blend_radius, inverse, xi, yi);
                            band.set_pixel(x, y, &c);
                        }
                    }
                })
            }
            BlurEffect::SmartBlur => {
                let strength = self.level as i64;
                let range = if source.is_sixteen_bit() {
                    (strength + 1) * 256 - 1
                } else {
                    strength
                };
                let width = source.width();
                let mut rows = PixelBuffer::new_like(source)?;
                let status = ctx.for_each_row(&mut rows, (0, 50), |band, y| {
                    for x in 0..width {
                        let c = smart_pixel(source, source, distance, range, true, x as i64, y as i64);
                        band.set_pixel(x, y, &c);
                    }
                });
                if status.is_cancelled() {
                    return Ok(status);
                }
                ctx.for_each_row(dest, (50, 100), |band, y| {
                    for x in 0..width {
                        let c = smart_pixel(source, &rows, distance, range, false, x as i64, y as i64);
                        band.set_pixel(x, y, &c);
                    }
                })
            }
            BlurEffect::FrostGlass => {
                let frost = distance.clamp(1, 10);
                let mut master = RandomStream::with_seed(self.seed);
                let row_seeds: Vec<u32> = (0..source.height()).map(|_| master.next_seed()).collect();
                let width = source.width();
                ctx.for_each_row_with(dest, FULL_WINDOW, Vec::new, |scratch, band, y| {
                    let mut rng = RandomStream::with_seed(row_seeds[y]);
                    for x in 0..width {
                        let c = frost_pixel(source, frost, &mut rng, scratch, x as i64, y as i64);
                        band.set_pixel(x, y, &c);
                    }
                })
            }
            BlurEffect::Mosaic => {
                let size = distance.max(1);
                self.render_rows(source, dest, ctx, |x, y| {
                    let cx = x / size * size + size / 2;
                    let cy = y / size * size + size / 2;
                    source.pixel_clamped(cx, cy)
                })
            }
        };
        Ok(status)
    }
}
