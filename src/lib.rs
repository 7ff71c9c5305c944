//! # Pixelfx - Parallel Pixel-Buffer Filters
//!
//! Pixelfx applies pixel filters to in-memory raster buffers, spreading the
//! work of each pass across a worker pool while keeping seeded output
//! identical for any thread count.
//!
//! ## Features
//!
//! - **Depth-independent sampling**: 8 and 16 bit buffers, with or without alpha
//! - **Fork-join engine**: row bands run in parallel with coalesced progress and cooperative cancellation
//! - **Seeded randomness**: every randomized filter records its seed so a run can be replayed
//! - **Replayable actions**: filter parameters serialize to JSON and dispatch back to the same filter
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pixelfx::prelude::*;
//!
//! let engine = FilterEngine::new()?;
//! let ctx = FilterContext::new(&engine).with_progress(|p| println!("{}%", p));
//!
//! let source = PixelBuffer::from_dynamic_image(&image::open("input.png")?)?;
//! let mut dest = PixelBuffer::new_like(&source)?;
//!
//! let filter = Filter::from(DistortionFilter::new(DistortionEffect::Twirl, 40, 0));
//! filter.apply(&source, &mut dest, &ctx)?;
//!
//! // The action replays the exact same run later
//! let json = filter.filter_action().to_json()?;
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: Buffers, colour samples, random streams, actions, metadata and errors
//! - [`execution`]: Worker pool, partitioning, progress and cancellation
//! - [`filters`]: The filter families and their registry

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod execution;
pub mod filters;

/// Prelude module for convenient imports.
///
/// Import everything commonly needed with:
/// ```rust,ignore
/// use pixelfx::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use crate::core::action::{FilterAction, ParamValue, SEED_PARAMETER};
    pub use crate::core::buffer::{BitDepth, Layout, PixelBuffer};
    pub use crate::core::color::ColorSample;
    pub use crate::core::config::EngineConfig;
    pub use crate::core::metadata::{Category, Constraint, FilterMetadata, ParameterDefinition};
    pub use crate::core::random::RandomStream;

    // Errors
    pub use crate::core::error::{ConfigResult, ConfigurationError, FilterError, FilterResult};

    // Execution
    pub use crate::execution::{
        CancellationToken, FilterContext, FilterEngine, ProgressState, RunStatus, FULL_WINDOW,
    };

    // Filters
    pub use crate::filters::registry::{FilterFactory, FilterRegistry, RegistryEntry};
    pub use crate::filters::{
        apply_filter, BlurEffect, BlurFxFilter, CharcoalFilter, ConvolutionFilter,
        DistortionEffect, DistortionFilter, FilmGrainFilter, Filter, Kernel1D, Kernel2D,
        KernelSpec, PixelFilter, RainDropFilter, ToneNoise,
    };
}

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
        assert_eq!(super::NAME, "pixelfx");
    }

    #[test]
    fn test_registry_with_builtins() {
        let registry = FilterRegistry::with_builtins();
        assert!(registry.contains("distortion"));
        assert!(registry.contains("raindrop"));
        assert!(registry.contains("filmgrain"));
        assert!(registry.contains("charcoal"));
    }

    #[test]
    fn test_filter_through_prelude() {
        let engine = FilterEngine::with_threads(2).unwrap();
        let ctx = FilterContext::new(&engine);
        let source = PixelBuffer::filled(
            12,
            9,
            BitDepth::Sixteen,
            true,
            &ColorSample::new(4000, 30000, 65535, 65535, true),
        )
        .unwrap();
        let mut dest = PixelBuffer::new_like(&source).unwrap();

        let filter = Filter::from(ConvolutionFilter::new(KernelSpec::Gaussian { sigma: 1.5 }));
        assert_eq!(filter.apply(&source, &mut dest, &ctx).unwrap(), RunStatus::Completed);
        assert_eq!(dest, source);
    }
}
