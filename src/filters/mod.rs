//! Filter module.
//!
//! Every filter implements [`PixelFilter`]. The closed [`Filter`] enum
//! dispatches a replayed [`FilterAction`] to the right implementation, and
//! the [`FilterRegistry`] indexes them by identifier and category.

pub mod blurfx;
pub mod charcoal;
pub mod convolution;
pub mod distortion;
pub mod filmgrain;
pub mod raindrop;
pub mod registry;
pub mod sampling;

pub use blurfx::{BlurEffect, BlurFxFilter};
pub use charcoal::CharcoalFilter;
pub use convolution::{ConvolutionFilter, Kernel1D, Kernel2D, KernelSpec};
pub use distortion::{DistortionEffect, DistortionFilter};
pub use filmgrain::{FilmGrainFilter, ToneNoise};
pub use raindrop::{ExcludedArea, OccupancyMask, RainDropFilter};
pub use registry::{FilterFactory, FilterRegistry, RegistryEntry};

use crate::core::action::FilterAction;
use crate::core::buffer::PixelBuffer;
use crate::core::error::{ConfigResult, ConfigurationError, FilterError, FilterResult};
use crate::core::metadata::FilterMetadata;
use crate::execution::{FilterContext, RunStatus};
use log::{debug, warn};

/// A pixel filter: validated parameters plus a render routine.
///
/// Implementations only provide [`render`](Self::render); the shared
/// layout check, validation fallback and no-op short circuit live in
/// [`apply_filter`].
pub trait PixelFilter {
    /// Static description and parameter schema.
    fn metadata() -> FilterMetadata
    where
        Self: Sized;

    /// Build the filter from a recorded action.
    fn from_action(action: &FilterAction) -> ConfigResult<Self>
    where
        Self: Sized;

    /// Record the parameters, including the realized seed if any.
    fn filter_action(&self) -> FilterAction;

    /// Check the parameters against the source before any work is scheduled.
    fn validate(&self, source: &PixelBuffer) -> ConfigResult<()>;

    /// Whether the parameters leave every pixel unchanged.
    fn is_noop(&self) -> bool;

    /// Write the filtered `source` into `dest`.
    ///
    /// Called only with matching layouts, a non-empty buffer and parameters
    /// that passed [`validate`](Self::validate).
    fn render(
        &self,
        source: &PixelBuffer,
        dest: &mut PixelBuffer,
        ctx: &FilterContext<'_>,
    ) -> FilterResult<RunStatus>;
}

/// Run `filter` from `source` into `dest`.
///
/// - Mismatched layouts are rejected and `dest` is left untouched.
/// - Empty buffers complete immediately.
/// - Invalid parameters make the run a pass-through copy and are reported
///   as a configuration error.
/// - No-op parameters copy the source without scheduling filter work.
///
/// A cancelled run returns [`RunStatus::Cancelled`]; `dest` then holds
/// partial output and should be discarded.
pub fn apply_filter<F>(
    filter: &F,
    source: &PixelBuffer,
    dest: &mut PixelBuffer,
    ctx: &FilterContext<'_>,
) -> FilterResult<RunStatus>
where
    F: PixelFilter + ?Sized,
{
    source.check_same_layout(dest)?;
    if source.is_empty() {
        return Ok(RunStatus::Completed);
    }

    if let Err(err) = filter.validate(source) {
        warn!("rejected filter parameters: {}", err);
        dest.copy_from(source)?;
        return Err(FilterError::Configuration(err));
    }

    if filter.is_noop() {
        debug!("filter parameters are a no-op, copying source");
        dest.copy_from(source)?;
        ctx.progress().finish();
        return Ok(RunStatus::Completed);
    }

    let status = filter.render(source, dest, ctx)?;
    match status {
        RunStatus::Completed => ctx.progress().finish(),
        RunStatus::Cancelled => debug!("filter run cancelled"),
    }
    Ok(status)
}

/// The closed set of built-in filters.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Generic kernel convolution
    Convolution(ConvolutionFilter),
    /// Geometric distortions
    Distortion(DistortionFilter),
    /// Special-effect blurs
    BlurFx(BlurFxFilter),
    /// Raindrops
    RainDrop(RainDropFilter),
    /// Film grain
    FilmGrain(FilmGrainFilter),
    /// Charcoal drawing
    Charcoal(CharcoalFilter),
}

impl Filter {
    /// Metadata of every built-in filter, in listing order.
    pub fn all_metadata() -> Vec<FilterMetadata> {
        vec![
            ConvolutionFilter::metadata(),
            BlurFxFilter::metadata(),
            DistortionFilter::metadata(),
            RainDropFilter::metadata(),
            FilmGrainFilter::metadata(),
            CharcoalFilter::metadata(),
        ]
    }

    /// Build a filter from an action, dispatching on its identifier.
    pub fn from_action(action: &FilterAction) -> ConfigResult<Self> {
        match action.identifier.as_str() {
            ConvolutionFilter::ID => ConvolutionFilter::from_action(action).map(Filter::Convolution),
            DistortionFilter::ID => DistortionFilter::from_action(action).map(Filter::Distortion),
            BlurFxFilter::ID => BlurFxFilter::from_action(action).map(Filter::BlurFx),
            RainDropFilter::ID => RainDropFilter::from_action(action).map(Filter::RainDrop),
            FilmGrainFilter::ID => FilmGrainFilter::from_action(action).map(Filter::FilmGrain),
            CharcoalFilter::ID => CharcoalFilter::from_action(action).map(Filter::Charcoal),
            other => Err(ConfigurationError::UnknownFilter(other.to_string())),
        }
    }

    /// The filter identifier.
    pub fn id(&self) -> &'static str {
        match self {
            Filter::Convolution(_) => ConvolutionFilter::ID,
            Filter::Distortion(_) => DistortionFilter::ID,
            Filter::BlurFx(_) => BlurFxFilter::ID,
            Filter::RainDrop(_) => RainDropFilter::ID,
            Filter::FilmGrain(_) => FilmGrainFilter::ID,
            Filter::Charcoal(_) => CharcoalFilter::ID,
        }
    }

    /// Metadata of this filter's type.
    pub fn metadata(&self) -> FilterMetadata {
        match self {
            Filter::Convolution(_) => ConvolutionFilter::metadata(),
            Filter::Distortion(_) => DistortionFilter::metadata(),
            Filter::BlurFx(_) => BlurFxFilter::metadata(),
            Filter::RainDrop(_) => RainDropFilter::metadata(),
            Filter::FilmGrain(_) => FilmGrainFilter::metadata(),
            Filter::Charcoal(_) => CharcoalFilter::metadata(),
        }
    }

    /// The wrapped filter.
    pub fn as_pixel_filter(&self) -> &dyn PixelFilter {
        match self {
            Filter::Convolution(f) => f,
            Filter::Distortion(f) => f,
            Filter::BlurFx(f) => f,
            Filter::RainDrop(f) => f,
            Filter::FilmGrain(f) => f,
            Filter::Charcoal(f) => f,
        }
    }

    /// Record the parameters.
    pub fn filter_action(&self) -> FilterAction {
        self.as_pixel_filter().filter_action()
    }

    /// Run the filter. See [`apply_filter`].
    pub fn apply(
        &self,
        source: &PixelBuffer,
        dest: &mut PixelBuffer,
        ctx: &FilterContext<'_>,
    ) -> FilterResult<RunStatus> {
        apply_filter(self.as_pixel_filter(), source, dest, ctx)
    }
}

macro_rules! impl_from_filter {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Filter {
                fn from(filter: $ty) -> Self {
                    Filter::$variant(filter)
                }
            }
        )*
    };
}

impl_from_filter!(
    Convolution(ConvolutionFilter),
    Distortion(DistortionFilter),
    BlurFx(BlurFxFilter),
    RainDrop(RainDropFilter),
    FilmGrain(FilmGrainFilter),
    Charcoal(CharcoalFilter),
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::buffer::BitDepth;
    use crate::core::color::ColorSample;
    use crate::execution::FilterEngine;

    fn source() -> PixelBuffer {
        let mut buf = PixelBuffer::new(16, 12, BitDepth::Eight, false).unwrap();
        for y in 0..12 {
            for x in 0..16 {
                buf.set_pixel(x, y, &ColorSample::opaque((x * 15) as u16, (y * 20) as u16, 90, false));
            }
        }
        buf
    }

    #[test]
    fn test_layout_mismatch_leaves_dest_untouched() {
        let engine = FilterEngine::with_threads(2).unwrap();
        let ctx = FilterContext::new(&engine);
        let src = source();
        let marker = ColorSample::opaque(1, 2, 3, false);
        let mut dest = PixelBuffer::filled(4, 4, BitDepth::Eight, false, &marker).unwrap();
        let before = dest.clone();

        let filter = Filter::from(CharcoalFilter::default());
        let err = filter.apply(&src, &mut dest, &ctx).unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(dest, before);

        let mut deep = PixelBuffer::new(16, 12, BitDepth::Sixteen, false).unwrap();
        assert!(filter.apply(&src, &mut deep, &ctx).is_err());
    }

    #[test]
    fn test_empty_buffer_completes() {
        let engine = FilterEngine::with_threads(2).unwrap();
        let ctx = FilterContext::new(&engine);
        let src = PixelBuffer::new(0, 5, BitDepth::Eight, true).unwrap();
        let mut dest = src.clone();
        let filter = Filter::from(DistortionFilter::new(DistortionEffect::Twirl, 40, 0));
        assert_eq!(filter.apply(&src, &mut dest, &ctx).unwrap(), RunStatus::Completed);
    }

    #[test]
    fn test_noop_reports_full_progress() {
        let engine = FilterEngine::with_threads(2).unwrap();
        let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let ctx = FilterContext::new(&engine).with_progress(move |p| sink.lock().push(p));
        let src = source();
        let mut dest = PixelBuffer::new_like(&src).unwrap();

        let filter = Filter::from(DistortionFilter::new(DistortionEffect::WavesHorizontal, 0, 10));
        assert!(filter.apply(&src, &mut dest, &ctx).unwrap().is_completed());
        assert_eq!(dest, src);
        assert_eq!(seen.lock().as_slice(), &[100]);
    }

    #[test]
    fn test_dispatch_by_identifier() {
        for metadata in Filter::all_metadata() {
            let filter = Filter::from_action(&metadata.default_action()).unwrap();
            assert_eq!(filter.id(), metadata.id);
            assert_eq!(filter.metadata(), metadata);
        }
        assert!(matches!(
            Filter::from_action(&FilterAction::new("oilpaint", 1)),
            Err(ConfigurationError::UnknownFilter(_))
        ));
    }

    #[test]
    fn test_replay_from_json_reproduces_output() {
        let engine = FilterEngine::with_threads(3).unwrap();
        let ctx = FilterContext::new(&engine);
        let src = source();

        let original = Filter::from(FilmGrainFilter::new(ToneNoise::new(10)).with_seed(4321));
        let mut first = PixelBuffer::new_like(&src).unwrap();
        original.apply(&src, &mut first, &ctx).unwrap();

        let json = original.filter_action().to_json().unwrap();
        let replayed = Filter::from_action(&FilterAction::from_json(&json).unwrap()).unwrap();
        let mut second = PixelBuffer::new_like(&src).unwrap();
        replayed.apply(&src, &mut second, &ctx).unwrap();

        assert_eq!(replayed, original);
        assert_eq!(first, second);
    }

    #[test]
    fn test_newer_version_is_rejected() {
        let mut action = CharcoalFilter::default().filter_action();
        action.version = CharcoalFilter::VERSION + 1;
        assert!(matches!(
            Filter::from_action(&action),
            Err(ConfigurationError::UnsupportedVersion { .. })
        ));
    }
}
