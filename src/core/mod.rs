//! Core types for the pixelfx filter engine.
//!
//! This module contains the foundational types every filter builds on:
//! - Pixel buffers and depth-independent colour samples
//! - The seeded random stream
//! - Filter actions, metadata and parameter constraints
//! - Engine configuration
//! - Error types

pub mod action;
pub mod buffer;
pub mod color;
pub mod config;
pub mod error;
pub mod interop;
pub mod metadata;
pub mod random;

// Re-export commonly used types
pub use action::{FilterAction, ParamValue, SEED_PARAMETER};
pub use buffer::{BitDepth, Layout, PixelBuffer, RowBand};
pub use color::ColorSample;
pub use config::EngineConfig;
pub use error::{ConfigResult, ConfigurationError, FilterError, FilterResult};
pub use metadata::{Category, Constraint, FilterMetadata, ParameterDefinition};
pub use random::RandomStream;
