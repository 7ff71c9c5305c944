//! Raindrops: randomly placed, non-overlapping lens distortions.
//!
//! The output starts as a row-parallel copy of the source. Drops are then
//! placed one at a time on the calling thread: each candidate gets a random
//! centre and size, is rejected if its bounding square touches an occupied
//! pixel, and otherwise is rendered (lens warp, rim shading, local blur) and
//! marked in the [`OccupancyMask`]. An optional excluded area is marked
//! before placement and restored from the source afterwards.

use crate::core::action::{FilterAction, SEED_PARAMETER};
use crate::core::buffer::PixelBuffer;
use crate::core::error::{ConfigResult, ConfigurationError, FilterResult};
use crate::core::metadata::{Category, FilterMetadata, ParameterDefinition};
use crate::core::random::RandomStream;
use crate::execution::{FilterContext, RunStatus};
use crate::filters::PixelFilter;
use log::{debug, warn};

/// Default cap on consecutive rejected placements.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10_000;

/// One flag per pixel marking pixels covered by a placed drop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyMask {
    width: i64,
    height: i64,
    bits: Vec<bool>,
}

impl OccupancyMask {
    /// An empty mask.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as i64,
            height: height as i64,
            bits: vec![false; width as usize * height as usize],
        }
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x >= 0 && y >= 0 && x < self.width && y < self.height {
            Some((y * self.width + x) as usize)
        } else {
            None
        }
    }

    /// Whether `(x, y)` is covered. Outside pixels are never covered.
    pub fn is_occupied(&self, x: i64, y: i64) -> bool {
        self.index(x, y).map(|i| self.bits[i]).unwrap_or(false)
    }

    /// Whether the square of half-size `half` around `(x, y)` is free.
    ///
    /// With `limit_range` the square must also lie inside the image.
    pub fn is_free(&self, x: i64, y: i64, half: i64, limit_range: bool) -> bool {
        for sy in (y - half)..=(y + half) {
            for sx in (x - half)..=(x + half) {
                match self.index(sx, sy) {
                    Some(i) if self.bits[i] => return false,
                    Some(_) => {}
                    None if limit_range => return false,
                    None => {}
                }
            }
        }
        true
    }

    /// Mark the disk of radius `half` around `(x, y)`.
    pub fn mark_disk(&mut self, x: i64, y: i64, half: i64) {
        let limit = (half * half) as f64;
        for sy in (y - half)..=(y + half) {
            for sx in (x - half)..=(x + half) {
                let (dx, dy) = ((sx - x) as f64, (sy - y) as f64);
                if dx * dx + dy * dy <= limit {
                    if let Some(i) = self.index(sx, sy) {
                        self.bits[i] = true;
                    }
                }
            }
        }
    }

    /// Mark every pixel of `area` that lies inside the mask.
    pub fn mark_area(&mut self, area: &ExcludedArea) {
        let (x0, y0) = (area.x as i64, area.y as i64);
        for sy in y0.max(0)..(y0 + area.height as i64).min(self.height) {
            for sx in x0.max(0)..(x0 + area.width as i64).min(self.width) {
                if let Some(i) = self.index(sx, sy) {
                    self.bits[i] = true;
                }
            }
        }
    }

    /// Number of covered pixels.
    pub fn count(&self) -> usize {
        self.bits.iter().filter(|b| **b).count()
    }
}

/// Rectangle kept free of drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExcludedArea {
    /// Left column
    pub x: u32,
    /// Top row
    pub y: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl ExcludedArea {
    /// Whether the rectangle covers no pixel.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A drop that was placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedDrop {
    /// Centre column
    pub x: i64,
    /// Centre row
    pub y: i64,
    /// Diameter
    pub size: i64,
}

/// Rim and highlight shading by radius band and angle, in 8-bit units.
fn shading(radius: f64, angle: f64, half: f64) -> i32 {
    let within = |lo: f64, hi: f64| angle >= lo && angle < hi;
    if radius >= 0.9 * half {
        if within(0.0, 2.25) {
            -80
        } else if within(2.25, 2.5) || within(-0.25, 0.0) {
            -40
        } else {
            0
        }
    } else if radius >= 0.8 * half {
        if within(0.75, 1.5) {
            -40
        } else if within(-0.1, 0.75) || within(1.5, 2.35) {
            -30
        } else {
            0
        }
    } else if radius >= 0.7 * half {
        if within(0.1, 2.0) {
            -20
        } else if within(-2.5, -1.9) {
            60
        } else {
            0
        }
    } else if radius >= 0.6 * half {
        if within(0.5, 1.75) {
            -20
        } else if within(0.0, 0.25) || within(2.0, 2.25) {
            20
        } else {
            0
        }
    } else if radius >= 0.5 * half {
        if within(0.25, 0.5) || within(1.75, 2.0) {
            30
        } else {
            0
        }
    } else if radius >= 0.4 * half {
        if within(0.5, 1.75) {
            40
        } else {
            0
        }
    } else if radius >= 0.3 * half {
        if within(0.0, 2.25) {
            30
        } else {
            0
        }
    } else if radius >= 0.2 * half && within(0.5, 1.75) {
        20
    } else {
        0
    }
}

/// Raindrop filter configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RainDropFilter {
    /// Largest drop diameter
    pub drop_size: u32,
    /// Smallest drop diameter
    pub min_drop_size: u32,
    /// Number of drops to place
    pub amount: u32,
    /// Lens strength, 1..=100
    pub coeff: u32,
    /// Keep drops fully inside the image
    pub limit_range: bool,
    /// Consecutive rejections before placement stops
    pub max_attempts: u32,
    /// Area left untouched
    pub exclude: Option<ExcludedArea>,
    /// Placement seed
    pub seed: u32,
}

impl Default for RainDropFilter {
    fn default() -> Self {
        Self::new(80, 150, 30)
    }
}

impl RainDropFilter {
    /// Filter identifier.
    pub const ID: &'static str = "raindrop";
    /// Parameter schema version.
    pub const VERSION: u32 = 1;
    /// Largest accepted drop size.
    pub const MAX_DROP_SIZE: u32 = 200;
    /// Largest accepted drop count.
    pub const MAX_AMOUNT: u32 = 500;

    /// Create a filter with a fresh random seed.
    pub fn new(drop_size: u32, amount: u32, coeff: u32) -> Self {
        Self {
            drop_size,
            min_drop_size: 0,
            amount,
            coeff,
            limit_range: true,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            exclude: None,
            seed: RandomStream::non_deterministic_seed(),
        }
    }

    /// Keep drops out of the `width` x `height` rectangle at `(x, y)`.
    pub fn with_excluded_area(mut self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let area = ExcludedArea { x, y, width, height };
        self.exclude = (!area.is_empty()).then_some(area);
        self
    }

    /// Set the smallest drop diameter.
    pub fn with_min_drop_size(mut self, size: u32) -> Self {
        self.min_drop_size = size;
        self
    }

    /// Allow drops to be cut by the image border.
    pub fn with_limit_range(mut self, limit_range: bool) -> Self {
        self.limit_range = limit_range;
        self
    }

    /// Set the rejection cap.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Fix the placement seed.
    pub fn with_seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Place drops into `dest`, which must already hold a copy of `source`.
    ///
    /// Returns the placed drops, or `None` when cancelled.
    pub fn place_drops(
        &self,
        source: &PixelBuffer,
        dest: &mut PixelBuffer,
        mask: &mut OccupancyMask,
        ctx: &FilterContext<'_>,
    ) -> Option<Vec<PlacedDrop>> {
        let mut rng = RandomStream::with_seed(self.seed);
        let (w, h) = (source.width() as i32, source.height() as i32);
        let mut placed = Vec::new();

        for i in 0..self.amount {
            let mut attempts = 0;
            loop {
                if !ctx.should_continue() {
                    debug!("raindrop placement cancelled after {} drops", placed.len());
                    return None;
                }
                let drop = PlacedDrop {
                    x: rng.number(0, w - 1) as i64,
                    y: rng.number(0, h - 1) as i64,
                    size: rng.number(self.min_drop_size as i32, self.drop_size as i32) as i64,
                };
                attempts += 1;
                if mask.is_free(drop.x, drop.y, drop.size / 2, self.limit_range) {
                    if self.render_drop(source, dest, &drop, ctx).is_cancelled() {
                        debug!("raindrop rendering cancelled after {} drops", placed.len());
                        return None;
                    }
                    mask.mark_disk(drop.x, drop.y, drop.size / 2);
                    placed.push(drop);
                    break;
                }
                if attempts >= self.max_attempts {
                    warn!(
                        "raindrop placement gave up after {} rejections; placed {} of {} drops",
                        attempts,
                        placed.len(),
                        self.amount
                    );
                    return Some(placed);
                }
            }
            ctx.progress()
                .report(10 + 90 * (i + 1) / self.amount.max(1));
        }
        Some(placed)
    }

    fn render_drop(
        &self,
        source: &PixelBuffer,
        dest: &mut PixelBuffer,
        drop: &PlacedDrop,
        ctx: &FilterContext<'_>,
    ) -> RunStatus {
        let half = drop.size / 2;
        if half < 1 {
            return RunStatus::Completed;
        }
        let half_f = half as f64;
        let coeff = self.coeff.max(1) as f64 * 0.01;
        let div = half_f / (coeff * half_f + 1.0).ln();
        let scale = if source.is_sixteen_bit() { 257 } else { 1 };

        for dy in -half..=half {
            if !ctx.should_continue() {
                return RunStatus::Cancelled;
            }
            for dx in -half..=half {
                let radius = ((dx * dx + dy * dy) as f64).sqrt();
                if radius > half_f {
                    continue;
                }
                let angle = (dy as f64).atan2(dx as f64);
                let lens = ((radius / div).exp() - 1.0) / coeff;
                let sx = (drop.x as f64 + lens * angle.cos()) as i64;
                let sy = (drop.y as f64 + lens * angle.sin()) as i64;
                let (tx, ty) = (drop.x + dx, drop.y + dy);
                if !source.layout().contains(sx, sy) || !dest.layout().contains(tx, ty) {
                    continue;
                }

                let bright = shading(radius, angle, half_f) * scale;
                let from = source.pixel_clamped(sx, sy);
                let mut to = dest.pixel_clamped(tx, ty);
                to.set_red(from.red as i32 + bright);
                to.set_green(from.green as i32 + bright);
                to.set_blue(from.blue as i32 + bright);
                dest.set_pixel(tx as u32, ty as u32, &to);
            }
        }

        // Soften in place, reading pixels already blurred.
        let blur = drop.size / 25 + 1;
        let reach = half + blur;
        for dy in -reach..=reach {
            if !ctx.should_continue() {
                return RunStatus::Cancelled;
            }
            for dx in -reach..=reach {
                let radius = ((dx * dx + dy * dy) as f64).sqrt();
                let (tx, ty) = (drop.x + dx, drop.y + dy);
                if radius > half_f * 1.1 || !dest.layout().contains(tx, ty) {
                    continue;
                }
                let (mut r, mut g, mut b, mut n) = (0i64, 0i64, 0i64, 0i64);
                for by in -blur..=blur {
                    for bx in -blur..=blur {
                        let (nx, ny) = (tx + bx, ty + by);
                        if dest.layout().contains(nx, ny) {
                            let c = dest.pixel_clamped(nx, ny);
                            r += c.red as i64;
                            g += c.green as i64;
                            b += c.blue as i64;
                            n += 1;
                        }
                    }
                }
                let mut to = dest.pixel_clamped(tx, ty);
                to.set_red((r / n) as i32);
                to.set_green((g / n) as i32);
                to.set_blue((b / n) as i32);
                dest.set_pixel(tx as u32, ty as u32, &to);
            }
        }
        RunStatus::Completed
    }

    /// Copy the excluded area back from `source`.
    fn restore_excluded(&self, source: &PixelBuffer, dest: &mut PixelBuffer) {
        let Some(area) = self.exclude else {
            return;
        };
        let x_end = area.x.saturating_add(area.width).min(source.width());
        let y_end = area.y.saturating_add(area.height).min(source.height());
        for y in area.y..y_end {
            for x in area.x..x_end {
                if let Some(c) = source.pixel(x, y) {
                    dest.set_pixel(x, y, &c);
                }
            }
        }
    }
}

impl PixelFilter for RainDropFilter {
    fn metadata() -> FilterMetadata {
        FilterMetadata::builder(Self::ID, "Raindrops")
            .description("Scatter non-overlapping lens-shaped drops over the image")
            .category(Category::Distort)
            .version(Self::VERSION)
            .randomized()
            .parameter(
                ParameterDefinition::new("dropSize", 80)
                    .with_description("Largest drop diameter")
                    .with_range(0.0, Self::MAX_DROP_SIZE as f64),
            )
            .parameter(
                ParameterDefinition::new("minDropSize", 0)
                    .with_description("Smallest drop diameter")
                    .with_range(0.0, Self::MAX_DROP_SIZE as f64),
            )
            .parameter(
                ParameterDefinition::new("amount", 150)
                    .with_description("Number of drops")
                    .with_range(0.0, Self::MAX_AMOUNT as f64),
            )
            .parameter(
                ParameterDefinition::new("coeff", 30)
                    .with_description("Lens strength")
                    .with_range(1.0, 100.0),
            )
            .parameter(
                ParameterDefinition::new("limitRange", true)
                    .with_description("Keep drops inside the image"),
            )
            .parameter(
                ParameterDefinition::new("maxAttempts", DEFAULT_MAX_ATTEMPTS)
                    .with_description("Rejected placements before giving up")
                    .with_range(1.0, u32::MAX as f64),
            )
            .parameter(
                ParameterDefinition::new("excludeX", 0)
                    .with_description("Left column of the area kept free of drops")
                    .with_range(0.0, u32::MAX as f64),
            )
            .parameter(
                ParameterDefinition::new("excludeY", 0)
                    .with_description("Top row of the area kept free of drops")
                    .with_range(0.0, u32::MAX as f64),
            )
            .parameter(
                ParameterDefinition::new("excludeWidth", 0)
                    .with_description("Width of the excluded area, 0 for none")
                    .with_range(0.0, u32::MAX as f64),
            )
            .parameter(
                ParameterDefinition::new("excludeHeight", 0)
                    .with_description("Height of the excluded area, 0 for none")
                    .with_range(0.0, u32::MAX as f64),
            )
            .parameter(
                ParameterDefinition::new(SEED_PARAMETER, 0)
                    .with_description("Placement seed")
                    .with_range(0.0, u32::MAX as f64),
            )
            .build()
    }

    fn from_action(action: &FilterAction) -> ConfigResult<Self> {
        Self::metadata().check(action)?;
        let area = ExcludedArea {
            x: action.u32_or("excludeX", 0)?,
            y: action.u32_or("excludeY", 0)?,
            width: action.u32_or("excludeWidth", 0)?,
            height: action.u32_or("excludeHeight", 0)?,
        };
        Ok(Self {
            drop_size: action.u32_or("dropSize", 80)?,
            min_drop_size: action.u32_or("minDropSize", 0)?,
            amount: action.u32_or("amount", 150)?,
            coeff: action.u32_or("coeff", 30)?,
            limit_range: action.boolean_or("limitRange", true)?,
            max_attempts: action.u32_or("maxAttempts", DEFAULT_MAX_ATTEMPTS)?,
            exclude: (!area.is_empty()).then_some(area),
            seed: action
                .seed()?
                .unwrap_or_else(RandomStream::non_deterministic_seed),
        })
    }

    fn filter_action(&self) -> FilterAction {
        let mut action = FilterAction::new(Self::ID, Self::VERSION)
            .with_parameter("dropSize", self.drop_size)
            .with_parameter("minDropSize", self.min_drop_size)
            .with_parameter("amount", self.amount)
            .with_parameter("coeff", self.coeff)
            .with_parameter("limitRange", self.limit_range)
            .with_parameter("maxAttempts", self.max_attempts);
        if let Some(area) = self.exclude {
            action.add_parameter("excludeX", area.x);
            action.add_parameter("excludeY", area.y);
            action.add_parameter("excludeWidth", area.width);
            action.add_parameter("excludeHeight", area.height);
        }
        action.with_parameter(SEED_PARAMETER, self.seed)
    }

    fn validate(&self, _source: &PixelBuffer) -> ConfigResult<()> {
        if self.drop_size > Self::MAX_DROP_SIZE {
            return Err(ConfigurationError::invalid(
                "dropSize",
                format!("{} exceeds {}", self.drop_size, Self::MAX_DROP_SIZE),
            ));
        }
        if self.min_drop_size > self.drop_size {
            return Err(ConfigurationError::invalid(
                "minDropSize",
                format!("{} exceeds dropSize {}", self.min_drop_size, self.drop_size),
            ));
        }
        if self.amount > Self::MAX_AMOUNT {
            return Err(ConfigurationError::invalid(
                "amount",
                format!("{} exceeds {}", self.amount, Self::MAX_AMOUNT),
            ));
        }
        if !(1..=100).contains(&self.coeff) {
            return Err(ConfigurationError::invalid("coeff", "must be within 1..=100"));
        }
        if self.max_attempts == 0 {
            return Err(ConfigurationError::invalid("maxAttempts", "must be at least 1"));
        }
        Ok(())
    }

    fn is_noop(&self) -> bool {
        self.amount == 0 || self.drop_size == 0
    }

    fn render(
        &self,
        source: &PixelBuffer,
        dest: &mut PixelBuffer,
        ctx: &FilterContext<'_>,
    ) -> FilterResult<RunStatus> {
        let stride = source.layout().stride();
        let status = ctx.for_each_row(dest, (0, 10), |band, y| {
            if let Some(row) = band.row_mut(y) {
                row.copy_from_slice(&source.data()[y * stride..(y + 1) * stride]);
            }
        });
        if status.is_cancelled() {
            return Ok(status);
        }

        let mut mask = OccupancyMask::new(source.width(), source.height());
        if let Some(area) = &self.exclude {
            mask.mark_area(area);
        }
        match self.place_drops(source, dest, &mut mask, ctx) {
            Some(placed) => {
                self.restore_excluded(source, dest);
                debug!("placed {} raindrops covering {} pixels", placed.len(), mask.count());
                Ok(RunStatus::Completed)
            }
            None => Ok(RunStatus::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::BitDepth;
    use crate::core::color::ColorSample;
    use crate::execution::{CancellationToken, FilterEngine};
    use crate::filters::apply_filter;
    use std::f64::consts::PI;

    fn gradient(width: u32, height: u32, depth: BitDepth) -> PixelBuffer {
        let mut buf = PixelBuffer::new(width, height, depth, false).unwrap();
        for y in 0..height {
            for x in 0..width {
                let c = ColorSample::opaque(((x * 3) % 256) as u16, ((y * 2) % 256) as u16, 128, false);
                buf.set_pixel(x, y, &c.to_depth(depth.is_sixteen()));
            }
        }
        buf
    }

    #[test]
    fn test_single_drop_occupies_its_disk() {
        let src = gradient(100, 100, BitDepth::Eight);
        let mut dest = src.clone();
        let engine = FilterEngine::with_threads(1).unwrap();
        let ctx = FilterContext::new(&engine);
        let filter = RainDropFilter::new(20, 1, 30).with_min_drop_size(20).with_seed(7);

        let mut mask = OccupancyMask::new(100, 100);
        let placed = filter.place_drops(&src, &mut dest, &mut mask, &ctx).unwrap();
        assert_eq!(placed.len(), 1);

        let r = (placed[0].size / 2) as f64;
        let count = mask.count() as f64;
        assert!(count >= PI * (r - 1.0) * (r - 1.0));
        assert!(count <= PI * (r + 1.0) * (r + 1.0));
        assert!(mask.is_occupied(placed[0].x, placed[0].y));
        assert_ne!(dest, src);
    }

    #[test]
    fn test_drops_never_overlap() {
        let src = gradient(120, 90, BitDepth::Eight);
        let mut dest = src.clone();
        let engine = FilterEngine::with_threads(1).unwrap();
        let ctx = FilterContext::new(&engine);
        let filter = RainDropFilter::new(16, 40, 30).with_min_drop_size(6).with_seed(11);

        let mut mask = OccupancyMask::new(120, 90);
        let placed = filter.place_drops(&src, &mut dest, &mut mask, &ctx).unwrap();
        for (i, a) in placed.iter().enumerate() {
            for b in &placed[i + 1..] {
                let dist = (((a.x - b.x).pow(2) + (a.y - b.y).pow(2)) as f64).sqrt();
                assert!(dist > (b.size / 2) as f64);
            }
            let half = a.size / 2;
            assert!(a.x - half >= 0 && a.x + half < 120);
            assert!(a.y - half >= 0 && a.y + half < 90);
        }
    }

    #[test]
    fn test_oversized_drop_gives_up() {
        let src = gradient(10, 10, BitDepth::Eight);
        let engine = FilterEngine::with_threads(2).unwrap();
        let ctx = FilterContext::new(&engine);
        let filter = RainDropFilter::new(60, 3, 30)
            .with_min_drop_size(60)
            .with_max_attempts(50)
            .with_seed(1);
        let mut dest = PixelBuffer::new_like(&src).unwrap();
        let status = apply_filter(&filter, &src, &mut dest, &ctx).unwrap();
        assert!(status.is_completed());
        assert_eq!(dest, src);
    }

    #[test]
    fn test_same_seed_same_output() {
        let src = gradient(80, 60, BitDepth::Eight);
        let filter = RainDropFilter::new(30, 12, 40).with_seed(2024);
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
    fn test_sixteen_bit_tracks_eight_bit() {
        let filter = RainDropFilter::new(24, 4, 30).with_min_drop_size(10).with_seed(5);
        let render = |depth| {
            let src = gradient(64, 64, depth);
            let engine = FilterEngine::with_threads(2).unwrap();
            let ctx = FilterContext::new(&engine);
            let mut dest = PixelBuffer::new_like(&src).unwrap();
            apply_filter(&filter, &src, &mut dest, &ctx).unwrap();
            dest
        };
        let out8 = render(BitDepth::Eight);
        let out16 = render(BitDepth::Sixteen);
        for y in 0..64 {
            for x in 0..64 {
                let a = out8.pixel(x, y).unwrap().to_depth(true);
                let b = out16.pixel(x, y).unwrap();
                for c in 0..3 {
                    assert!((a.channel(c) as i32 - b.channel(c) as i32).abs() <= 257 * 3);
                }
            }
        }
    }

    #[test]
    fn test_cancelled_run_reports_status() {
        let src = gradient(40, 40, BitDepth::Eight);
        let engine = FilterEngine::with_threads(1).unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let ctx = FilterContext::new(&engine).with_cancellation(token);
        let mut dest = PixelBuffer::new_like(&src).unwrap();
        let filter = RainDropFilter::new(10, 5, 30).with_seed(3);
        let status = apply_filter(&filter, &src, &mut dest, &ctx).unwrap();
        assert!(status.is_cancelled());
    }

    #[test]
    fn test_cancellation_stops_inside_a_drop() {
        let src = gradient(60, 60, BitDepth::Eight);
        let mut dest = src.clone();
        let engine = FilterEngine::with_threads(1).unwrap();
        let token = CancellationToken::new();
        let ctx = FilterContext::new(&engine).with_cancellation(token.clone());
        let filter = RainDropFilter::new(40, 1, 30).with_seed(8);
        let drop = PlacedDrop { x: 30, y: 30, size: 40 };

        token.cancel();
        assert!(filter.render_drop(&src, &mut dest, &drop, &ctx).is_cancelled());
        assert_eq!(dest, src);

        let ctx = FilterContext::new(&engine);
        assert!(filter.render_drop(&src, &mut dest, &drop, &ctx).is_completed());
        assert_ne!(dest, src);
    }

    #[test]
    fn test_excluded_area_is_untouched() {
        let src = gradient(80, 80, BitDepth::Eight);
        let engine = FilterEngine::with_threads(2).unwrap();
        let ctx = FilterContext::new(&engine);
        let filter = RainDropFilter::new(12, 60, 30)
            .with_min_drop_size(6)
            .with_excluded_area(20, 20, 40, 40)
            .with_seed(77);
        let mut dest = PixelBuffer::new_like(&src).unwrap();
        assert!(apply_filter(&filter, &src, &mut dest, &ctx).unwrap().is_completed());

        assert_ne!(dest, src);
        for y in 20..60 {
            for x in 20..60 {
                assert_eq!(dest.pixel(x, y), src.pixel(x, y));
            }
        }

        let mut mask = OccupancyMask::new(80, 80);
        mask.mark_area(&ExcludedArea { x: 70, y: 75, width: 20, height: 20 });
        assert_eq!(mask.count(), 10 * 5);
        assert!(filter.filter_action().has_parameter("excludeWidth"));
        assert_eq!(RainDropFilter::from_action(&filter.filter_action()).unwrap(), filter);
    }

    #[test]
    fn test_action_round_trip() {
        let filter = RainDropFilter::new(50, 20, 10).with_max_attempts(300).with_seed(42);
        let action = filter.filter_action();
        assert_eq!(action.seed().unwrap(), Some(42));
        assert_eq!(RainDropFilter::from_action(&action).unwrap(), filter);
        assert!(RainDropFilter::new(10, 0, 30).is_noop());
        assert!(!filter.filter_action().has_parameter("excludeX"));
        assert_eq!(RainDropFilter::new(10, 5, 30).with_excluded_area(1, 1, 0, 4).exclude, None);
    }
}
