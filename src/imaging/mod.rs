//! Image engine: pure Rust, statically linked.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (JPEG, PNG, TIFF, WebP) |
//! | **Scale** | `resize_exact` with Lanczos3 |
//! | **Rotate** | quarter turns, or bilinear onto an expanded canvas |
//! | **Encode** | JPEG / PNG encoders from the `image` crate, TIFF from `tiff` |
//!
//! The module is split into:
//! - **Parameters**: [`Options`] and the value types it is built from
//! - **Calculations**: Pure functions for dimension and angle math (unit testable)
//! - **Backend**: [`ImageEngine`] capability trait + [`RustEngine`]
//! - **Runtime**: process-wide init/terminate and handle accounting

pub mod backend;
pub mod calculations;
mod params;
pub mod runtime;
pub mod rust_backend;

pub use backend::{Dimensions, EngineError, ImageEngine};
pub use params::{Background, Compression, Directives, Format, Options, Quality};
pub use runtime::{InitError, Runtime};
pub use rust_backend::{RustEngine, supported_input_extensions};
