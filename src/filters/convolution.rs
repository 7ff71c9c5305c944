//! Kernel convolution.
//!
//! Separable kernels run as two engine passes (horizontal into a scratch
//! buffer, then vertical into the destination) with a barrier in between.
//! Full 2D kernels run as a single pass. Borders clamp to the nearest edge
//! pixel. Every output channel is `round(sum(k * n) / sum(k))`, with a
//! normaliser of 1 when the kernel sums to zero.

use crate::core::action::FilterAction;
use crate::core::buffer::{PixelBuffer, RowBand};
use crate::core::color::ColorSample;
use crate::core::error::{ConfigResult, ConfigurationError, FilterResult};
use crate::core::metadata::{Category, Constraint, FilterMetadata, ParameterDefinition};
use crate::execution::{split_window, FilterContext, ProgressWindow, RunStatus};
use crate::filters::PixelFilter;
use serde::{Deserialize, Serialize};

/// Largest kernel side accepted anywhere in the crate.
pub const MAX_KERNEL_WIDTH: usize = 1001;

const DEGENERATE_SUM: f64 = 1e-12;

// ============================================================================
// Kernels
// ============================================================================

/// An odd-length one-dimensional kernel.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel1D {
    weights: Vec<f64>,
}

impl Kernel1D {
    /// Create a kernel; the length must be odd and every weight finite.
    pub fn new(weights: Vec<f64>) -> ConfigResult<Self> {
        if weights.len() % 2 == 0 || weights.len() > MAX_KERNEL_WIDTH {
            return Err(ConfigurationError::InvalidKernel(format!(
                "1D kernel length {} must be odd and at most {}",
                weights.len(),
                MAX_KERNEL_WIDTH
            )));
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(ConfigurationError::InvalidKernel(
                "kernel weights must be finite".into(),
            ));
        }
        Ok(Self { weights })
    }

    /// The kernel `[1]`.
    pub fn identity() -> Self {
        Self { weights: vec![1.0] }
    }

    /// Uniform weights over `2 * radius + 1` taps.
    pub fn box_kernel(radius: usize) -> Self {
        let radius = radius.min(MAX_KERNEL_WIDTH / 2);
        Self {
            weights: vec![1.0; 2 * radius + 1],
        }
    }

    /// Sampled Gaussian, sized by [`optimal_kernel_width`].
    pub fn gaussian(sigma: f64) -> Self {
        if !sigma.is_finite() || sigma <= DEGENERATE_SUM {
            return Self::identity();
        }
        let width = optimal_kernel_width(0.0, sigma);
        let half = (width / 2) as i64;
        let two_sigma2 = 2.0 * sigma * sigma;
        let weights = (-half..=half)
            .map(|u| (-((u * u) as f64) / two_sigma2).exp())
            .collect();
        Self { weights }
    }

    /// The "far" kernel: ends weighted 2 and 3, centre 3, ones elsewhere.
    pub fn far(distance: usize) -> Self {
        let distance = distance.min(MAX_KERNEL_WIDTH / 2);
        if distance == 0 {
            return Self::identity();
        }
        let width = 2 * distance + 1;
        let weights = (0..width)
            .map(|i| {
                if i == 0 {
                    2.0
                } else if i == distance || i == width - 1 {
                    3.0
                } else {
                    1.0
                }
            })
            .collect();
        Self { weights }
    }

    /// Kernel radius.
    pub fn radius(&self) -> usize {
        self.weights.len() / 2
    }

    /// Kernel weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Whether applying the kernel leaves every pixel unchanged.
    pub fn is_identity(&self) -> bool {
        self.weights.len() == 1 && self.weights[0] != 0.0
    }
}

/// A two-dimensional kernel with odd width and height, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct Kernel2D {
    width: usize,
    height: usize,
    weights: Vec<f64>,
}

impl Kernel2D {
    /// Create a kernel, checking odd dimensions and data length.
    pub fn new(width: usize, height: usize, weights: Vec<f64>) -> ConfigResult<Self> {
        if width % 2 == 0 || height % 2 == 0 {
            return Err(ConfigurationError::InvalidKernel(
                "kernel dimensions must be odd".into(),
            ));
        }
        if width > MAX_KERNEL_WIDTH || height > MAX_KERNEL_WIDTH {
            return Err(ConfigurationError::InvalidKernel(format!(
                "kernel dimensions must not exceed {}",
                MAX_KERNEL_WIDTH
            )));
        }
        if weights.len() != width * height {
            return Err(ConfigurationError::InvalidKernel(format!(
                "kernel data size {} doesn't match {}x{}",
                weights.len(),
                width,
                height
            )));
        }
        if weights.iter().any(|w| !w.is_finite()) {
            return Err(ConfigurationError::InvalidKernel(
                "kernel weights must be finite".into(),
            ));
        }
        Ok(Self {
            width,
            height,
            weights,
        })
    }

    /// The 3x3 sharpening kernel.
    pub fn sharpen() -> Self {
        Self {
            width: 3,
            height: 3,
            weights: vec![0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0],
        }
    }

    /// Square edge-detection kernel: all -1 with the centre at `area - 1`.
    pub fn edge_detect(width: usize) -> Self {
        let width = (width.max(1) | 1).min(MAX_KERNEL_WIDTH);
        let area = width * width;
        let mut weights = vec![-1.0; area];
        weights[area / 2] = (area - 1) as f64;
        Self {
            width,
            height: width,
            weights,
        }
    }

    /// Kernel width.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Kernel height.
    pub fn height(&self) -> usize {
        self.height
    }

    /// Row-major weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

/// Smallest odd width that captures a Gaussian to 16-bit precision.
///
/// A positive `radius` fixes the width at `2 * ceil(radius) + 1`. Otherwise
/// the width grows from 5 in steps of two until the normalised tail weight
/// rounds to zero at 16-bit scale, and the last width that still mattered is
/// returned.
pub fn optimal_kernel_width(radius: f64, sigma: f64) -> usize {
    if radius > 0.0 && radius.is_finite() {
        return (2.0 * radius.ceil() + 1.0).min(MAX_KERNEL_WIDTH as f64) as usize;
    }
    if !sigma.is_finite() || sigma <= DEGENERATE_SUM {
        return 1;
    }

    let two_sigma2 = 2.0 * sigma * sigma;
    let gauss = |u: i64| (-((u * u) as f64) / two_sigma2).exp();
    let mut width = 5usize;
    loop {
        let half = (width / 2) as i64;
        let normalize: f64 = (-half..=half).map(gauss).sum();
        let tail = gauss(half) / normalize;
        if (65535.0 * tail) as i64 <= 0 || width >= MAX_KERNEL_WIDTH {
            break;
        }
        width += 2;
    }
    width - 2
}

fn normaliser(sum: f64) -> f64 {
    if sum.abs() <= DEGENERATE_SUM {
        1.0
    } else {
        sum
    }
}

// ============================================================================
// Passes
// ============================================================================

/// Weighted sum of taps written over `origin`'s colour channels.
///
/// Alpha is copied from `origin` unless `include_alpha` is set.
fn weighted_sample(
    taps: impl Iterator<Item = (f64, ColorSample)>,
    origin: ColorSample,
    norm: f64,
    include_alpha: bool,
) -> ColorSample {
    let mut acc = [0.0f64; 4];
    for (k, p) in taps {
        for (c, slot) in acc.iter_mut().enumerate() {
            *slot += k * p.channel(c) as f64;
        }
    }
    let mut out = origin;
    let channels = if include_alpha { 4 } else { 3 };
    for (c, value) in acc.iter().enumerate().take(channels) {
        out.set_channel_f64(c, value / norm);
    }
    out
}

/// Run one horizontal or vertical 1D pass from `src` into `dest`.
pub fn convolve_axis(
    src: &PixelBuffer,
    dest: &mut PixelBuffer,
    kernel: &Kernel1D,
    horizontal: bool,
    include_alpha: bool,
    ctx: &FilterContext<'_>,
    window: ProgressWindow,
) -> RunStatus {
    let norm = normaliser(kernel.weights().iter().sum());
    let r = kernel.radius() as i64;
    let width = src.width();

    ctx.for_each_row(dest, window, |band: &mut RowBand<'_>, y| {
        let yi = y as i64;
        for x in 0..width {
            let xi = x as i64;
            let taps = kernel.weights().iter().enumerate().map(|(i, &k)| {
                let d = i as i64 - r;
                let p = if horizontal {
                    src.pixel_clamped(xi + d, yi)
                } else {
                    src.pixel_clamped(xi, yi + d)
                };
                (k, p)
            });
            let out = weighted_sample(taps, src.pixel_clamped(xi, yi), norm, include_alpha);
            band.set_pixel(x, y, &out);
        }
    })
}

/// Apply a separable kernel: horizontal pass, barrier, vertical pass.
pub fn convolve_separable(
    src: &PixelBuffer,
    dest: &mut PixelBuffer,
    horizontal: &Kernel1D,
    vertical: &Kernel1D,
    include_alpha: bool,
    ctx: &FilterContext<'_>,
    window: ProgressWindow,
) -> FilterResult<RunStatus> {
    let windows = split_window(window, 2);
    let mut scratch = PixelBuffer::new_like(src)?;

    let status = convolve_axis(src, &mut scratch, horizontal, true, include_alpha, ctx, windows[0]);
    if status.is_cancelled() {
        return Ok(status);
    }
    Ok(convolve_axis(&scratch, dest, vertical, false, include_alpha, ctx, windows[1]))
}

/// Apply a full 2D kernel in a single pass.
pub fn convolve_2d(
    src: &PixelBuffer,
    dest: &mut PixelBuffer,
    kernel: &Kernel2D,
    include_alpha: bool,
    ctx: &FilterContext<'_>,
    window: ProgressWindow,
) -> RunStatus {
    let norm = normaliser(kernel.weights().iter().sum());
    let (kw, kh) = (kernel.width() as i64, kernel.height() as i64);
    let (rx, ry) = (kw / 2, kh / 2);
    let width = src.width();

    ctx.for_each_row(dest, window, |band, y| {
        let yi = y as i64;
        for x in 0..width {
            let xi = x as i64;
            let taps = kernel.weights().iter().enumerate().map(|(i, &k)| {
                let i = i as i64;
                let dx = i % kw - rx;
                let dy = i / kw - ry;
                (k, src.pixel_clamped(xi + dx, yi + dy))
            });
            let out = weighted_sample(taps, src.pixel_clamped(xi, yi), norm, include_alpha);
            band.set_pixel(x, y, &out);
        }
    })
}

// ============================================================================
// ConvolutionFilter
// ============================================================================

/// Which kernel a [`ConvolutionFilter`] applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KernelSpec {
    /// Separable Gaussian blur
    Gaussian { sigma: f64 },
    /// Separable box blur
    Box { radius: u32 },
    /// Separable "far" blur
    Far { distance: u32 },
    /// 3x3 sharpen
    Sharpen,
    /// Square edge detector
    EdgeDetect { width: u32 },
    /// Arbitrary 2D kernel
    Custom {
        width: u32,
        height: u32,
        weights: Vec<f64>,
    },
}

impl KernelSpec {
    /// Name used in filter actions.
    pub fn name(&self) -> &'static str {
        match self {
            KernelSpec::Gaussian { .. } => "gaussian",
            KernelSpec::Box { .. } => "box",
            KernelSpec::Far { .. } => "far",
            KernelSpec::Sharpen => "sharpen",
            KernelSpec::EdgeDetect { .. } => "edge",
            KernelSpec::Custom { .. } => "custom",
        }
    }
}

/// A built kernel, ready to run.
#[derive(Debug, Clone, PartialEq)]
pub enum KernelPlan {
    /// Same 1D kernel horizontally and vertically
    Separable(Kernel1D),
    /// Single-pass 2D kernel
    Full(Kernel2D),
}

impl KernelPlan {
    /// Whether the plan reproduces its input.
    pub fn is_identity(&self) -> bool {
        match self {
            KernelPlan::Separable(k) => k.is_identity(),
            KernelPlan::Full(k) => k.width() == 1 && k.height() == 1 && k.weights()[0] != 0.0,
        }
    }
}

/// Generic convolution filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvolutionFilter {
    /// Kernel to apply
    pub kernel: KernelSpec,
    /// Whether alpha is convolved too
    pub include_alpha: bool,
}

impl ConvolutionFilter {
    /// Filter identifier.
    pub const ID: &'static str = "convolution";
    /// Parameter schema version.
    pub const VERSION: u32 = 1;

    /// Create a filter that leaves alpha untouched.
    pub fn new(kernel: KernelSpec) -> Self {
        Self {
            kernel,
            include_alpha: false,
        }
    }

    /// Convolve alpha as well.
    pub fn with_alpha(mut self, include_alpha: bool) -> Self {
        self.include_alpha = include_alpha;
        self
    }

    /// Build the kernel.
    pub fn plan(&self) -> ConfigResult<KernelPlan> {
        Ok(match &self.kernel {
            KernelSpec::Gaussian { sigma } => {
                if !sigma.is_finite() || *sigma < 0.0 {
                    return Err(ConfigurationError::invalid("sigma", "must be a non-negative number"));
                }
                KernelPlan::Separable(Kernel1D::gaussian(*sigma))
            }
            KernelSpec::Box { radius } => KernelPlan::Separable(Kernel1D::box_kernel(*radius as usize)),
            KernelSpec::Far { distance } => KernelPlan::Separable(Kernel1D::far(*distance as usize)),
            KernelSpec::Sharpen => KernelPlan::Full(Kernel2D::sharpen()),
            KernelSpec::EdgeDetect { width } => {
                if width % 2 == 0 {
                    return Err(ConfigurationError::invalid("width", "edge kernel width must be odd"));
                }
                KernelPlan::Full(Kernel2D::edge_detect(*width as usize))
            }
            KernelSpec::Custom {
                width,
                height,
                weights,
            } => KernelPlan::Full(Kernel2D::new(*width as usize, *height as usize, weights.clone())?),
        })
    }
}

impl PixelFilter for ConvolutionFilter {
    fn metadata() -> FilterMetadata {
        FilterMetadata::builder(Self::ID, "Convolution")
            .description("Apply a blur, sharpen, edge or custom kernel")
            .category(Category::Convolution)
            .version(Self::VERSION)
            .parameter(
                ParameterDefinition::new("kernel", "gaussian")
                    .with_description("gaussian, box, far, sharpen, edge or custom"),
            )
            .parameter(
                ParameterDefinition::new("sigma", 1.0)
                    .with_description("Gaussian standard deviation")
                    .with_range(0.0, 100.0),
            )
            .parameter(
                ParameterDefinition::new("radius", 1)
                    .with_description("Box radius or far distance")
                    .with_range(0.0, 100.0),
            )
            .parameter(
                ParameterDefinition::new("width", 3)
                    .with_description("Edge or custom kernel width")
                    .with_range(1.0, MAX_KERNEL_WIDTH as f64),
            )
            .parameter(
                ParameterDefinition::new("height", 3)
                    .with_description("Custom kernel height")
                    .with_range(1.0, MAX_KERNEL_WIDTH as f64),
            )
            .parameter(
                ParameterDefinition::new(
                    "weights",
                    vec![0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0],
                )
                .with_description("Custom kernel weights, row-major")
                .with_constraint(Constraint::OddLength),
            )
            .parameter(
                ParameterDefinition::new("includeAlpha", false)
                    .with_description("Convolve the alpha channel too"),
            )
            .build()
    }

    fn from_action(action: &FilterAction) -> ConfigResult<Self> {
        Self::metadata().check(action)?;
        let kernel = match action.parameter("kernel").map(|_| action.text("kernel")).transpose()? {
            None | Some("gaussian") => KernelSpec::Gaussian {
                sigma: action.float_or("sigma", 1.0)?,
            },
            Some("box") => KernelSpec::Box {
                radius: action.u32_or("radius", 1)?,
            },
            Some("far") => KernelSpec::Far {
                distance: action.u32_or("radius", 1)?,
            },
            Some("sharpen") => KernelSpec::Sharpen,
            Some("edge") => KernelSpec::EdgeDetect {
                width: action.u32_or("width", 3)?,
            },
            Some("custom") => KernelSpec::Custom {
                width: action.u32_or("width", 3)?,
                height: action.u32_or("height", 3)?,
                weights: action.float_list("weights")?.to_vec(),
            },
            Some(other) => {
                return Err(ConfigurationError::invalid(
                    "kernel",
                    format!("unknown kernel '{}'", other),
                ))
            }
        };
        Ok(Self {
            kernel,
            include_alpha: action.boolean_or("includeAlpha", false)?,
        })
    }

    fn filter_action(&self) -> FilterAction {
        let mut action =
            FilterAction::new(Self::ID, Self::VERSION).with_parameter("kernel", self.kernel.name());
        match &self.kernel {
            KernelSpec::Gaussian { sigma } => action.add_parameter("sigma", *sigma),
            KernelSpec::Box { radius } => action.add_parameter("radius", *radius),
            KernelSpec::Far { distance } => action.add_parameter("radius", *distance),
            KernelSpec::Sharpen => {}
            KernelSpec::EdgeDetect { width } => action.add_parameter("width", *width),
            KernelSpec::Custom {
                width,
                height,
                weights,
            } => {
                action.add_parameter("width", *width);
                action.add_parameter("height", *height);
                action.add_parameter("weights", weights.clone());
            }
        }
        action.add_parameter("includeAlpha", self.include_alpha);
        action
    }

    fn validate(&self, _source: &PixelBuffer) -> ConfigResult<()> {
        self.plan().map(|_| ())
    }

    fn is_noop(&self) -> bool {
        self.plan().map(|p| p.is_identity()).unwrap_or(false)
    }

    fn render(
        &self,
        source: &PixelBuffer,
        dest: &mut PixelBuffer,
        ctx: &FilterContext<'_>,
    ) -> FilterResult<RunStatus> {
        match self.plan()? {
            KernelPlan::Separable(kernel) => {
                convolve_separable(source, dest, &kernel, &kernel, self.include_alpha, ctx, (0, 100))
            }
            KernelPlan::Full(kernel) => {
                Ok(convolve_2d(source, dest, &kernel, self.include_alpha, ctx, (0, 100)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::BitDepth;
    use crate::execution::{FilterEngine, FULL_WINDOW};
    use crate::filters::apply_filter;

    fn noise_image(width: u32, height: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(width, height, BitDepth::Eight, true).unwrap();
        for y in 0..height {
            for x in 0..width {
                let v = ((x * 37 + y * 91) % 256) as u16;
                buf.set_pixel(x, y, &ColorSample::new(v, 255 - v, (v * 3) % 256, 200, false));
            }
        }
        buf
    }

    #[test]
    fn test_kernel_validation() {
        assert!(Kernel1D::new(vec![1.0, 2.0]).is_err());
        assert!(Kernel1D::new(vec![f64::NAN]).is_err());
        assert!(Kernel2D::new(3, 3, vec![1.0; 8]).is_err());
        assert!(Kernel2D::new(2, 3, vec![1.0; 6]).is_err());
        assert!(Kernel2D::new(3, 1, vec![1.0; 3]).is_ok());
    }

    #[test]
    fn test_far_kernel_shape() {
        assert_eq!(
            Kernel1D::far(3).weights(),
            &[2.0, 1.0, 1.0, 3.0, 1.0, 1.0, 3.0]
        );
    }

    #[test]
    fn test_edge_kernel_sums_to_zero() {
        let k = Kernel2D::edge_detect(5);
        assert_eq!(k.weights()[12], 24.0);
        assert_eq!(k.weights().iter().sum::<f64>(), 0.0);
    }

    #[test]
    fn test_optimal_kernel_width() {
        assert_eq!(optimal_kernel_width(2.0, 1.0), 5);
        assert_eq!(optimal_kernel_width(0.0, 0.0), 1);
        let narrow = optimal_kernel_width(0.0, 0.5);
        let wide = optimal_kernel_width(0.0, 3.0);
        assert!(narrow % 2 == 1 && wide % 2 == 1);
        assert!(wide > narrow);
    }

    #[test]
    fn test_identity_kernel_reproduces_input() {
        let engine = FilterEngine::with_threads(3).unwrap();
        let ctx = FilterContext::new(&engine);
        let src = noise_image(9, 7);

        let mut dest = PixelBuffer::new_like(&src).unwrap();
        let k = Kernel1D::identity();
        let status = convolve_separable(&src, &mut dest, &k, &k, true, &ctx, FULL_WINDOW).unwrap();
        assert!(status.is_completed());
        assert_eq!(dest, src);

        let mut dest = PixelBuffer::new_like(&src).unwrap();
        let k = Kernel2D::new(1, 1, vec![1.0]).unwrap();
        convolve_2d(&src, &mut dest, &k, false, &ctx, FULL_WINDOW);
        assert_eq!(dest, src);
    }

    #[test]
    fn test_sharpen_on_flat_grey_stays_grey() {
        let engine = FilterEngine::with_threads(2).unwrap();
        let ctx = FilterContext::new(&engine);
        let grey = ColorSample::opaque(128, 128, 128, false);
        let src = PixelBuffer::filled(4, 4, BitDepth::Eight, false, &grey).unwrap();
        let mut dest = PixelBuffer::new_like(&src).unwrap();

        let filter = ConvolutionFilter::new(KernelSpec::Sharpen);
        let status = apply_filter(&filter, &src, &mut dest, &ctx).unwrap();
        assert!(status.is_completed());
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(dest.pixel(x, y), Some(grey));
            }
        }
    }

    #[test]
    fn test_eight_neighbour_sharpen_on_flat_grey() {
        let engine = FilterEngine::with_threads(3).unwrap();
        let ctx = FilterContext::new(&engine);
        let grey = ColorSample::opaque(128, 128, 128, false);
        let src = PixelBuffer::filled(4, 4, BitDepth::Eight, false, &grey).unwrap();
        let mut dest = PixelBuffer::new_like(&src).unwrap();

        let filter = ConvolutionFilter::new(KernelSpec::Custom {
            width: 3,
            height: 3,
            weights: vec![-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0],
        });
        let status = apply_filter(&filter, &src, &mut dest, &ctx).unwrap();
        assert_eq!(status, RunStatus::Completed);
        assert_eq!(dest, src);
    }

    #[test]
    fn test_border_safety_on_tiny_images() {
        let engine = FilterEngine::with_threads(4).unwrap();
        let ctx = FilterContext::new(&engine);
        for (w, h) in [(1, 1), (1, 5), (5, 1), (2, 2)] {
            let src = noise_image(w, h);
            let mut dest = PixelBuffer::new_like(&src).unwrap();
            let filter = ConvolutionFilter::new(KernelSpec::Gaussian { sigma: 4.0 });
            assert!(apply_filter(&filter, &src, &mut dest, &ctx).is_ok());
        }
        let src = PixelBuffer::new(0, 0, BitDepth::Eight, false).unwrap();
        let mut dest = PixelBuffer::new_like(&src).unwrap();
        let filter = ConvolutionFilter::new(KernelSpec::EdgeDetect { width: 5 });
        assert!(apply_filter(&filter, &src, &mut dest, &ctx).unwrap().is_completed());
    }

    #[test]
    fn test_alpha_is_read_through_by_default() {
        let engine = FilterEngine::with_threads(2).unwrap();
        let ctx = FilterContext::new(&engine);
        let src = noise_image(6, 6);
        let mut dest = PixelBuffer::new_like(&src).unwrap();
        let filter = ConvolutionFilter::new(KernelSpec::Box { radius: 2 });
        apply_filter(&filter, &src, &mut dest, &ctx).unwrap();
        assert!((0..6).all(|y| dest.pixel(3, y).unwrap().alpha == 200));
    }

    #[test]
    fn test_box_blur_averages() {
        let engine = FilterEngine::with_threads(1).unwrap();
        let ctx = FilterContext::new(&engine);
        let mut src = PixelBuffer::new(3, 1, BitDepth::Eight, false).unwrap();
        src.set_pixel(0, 0, &ColorSample::opaque(0, 0, 0, false));
        src.set_pixel(1, 0, &ColorSample::opaque(90, 0, 0, false));
        src.set_pixel(2, 0, &ColorSample::opaque(180, 0, 0, false));
        let mut dest = PixelBuffer::new_like(&src).unwrap();

        let k = Kernel1D::box_kernel(1);
        convolve_axis(&src, &mut dest, &k, true, false, &ctx, FULL_WINDOW);
        assert_eq!(dest.pixel(1, 0).unwrap().red, 90);
        // left edge clamps: (0 + 0 + 90) / 3
        assert_eq!(dest.pixel(0, 0).unwrap().red, 30);
    }

    #[test]
    fn test_invalid_custom_kernel_copies_source() {
        let engine = FilterEngine::with_threads(2).unwrap();
        let ctx = FilterContext::new(&engine);
        let src = noise_image(4, 4);
        let mut dest = PixelBuffer::new_like(&src).unwrap();
        let filter = ConvolutionFilter::new(KernelSpec::Custom {
            width: 3,
            height: 3,
            weights: vec![1.0; 4],
        });
        let err = apply_filter(&filter, &src, &mut dest, &ctx).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(dest, src);
    }

    #[test]
    fn test_action_round_trip() {
        let filter = ConvolutionFilter::new(KernelSpec::Far { distance: 4 }).with_alpha(true);
        let action = filter.filter_action();
        assert_eq!(ConvolutionFilter::from_action(&action).unwrap(), filter);

        let bad = FilterAction::new(ConvolutionFilter::ID, 1).with_parameter("kernel", "laplace");
        assert!(ConvolutionFilter::from_action(&bad).is_err());
    }
}
