//! Image engine capability trait and shared types.
//!
//! The [`ImageEngine`] trait is the narrow interface the
//! [`Converter`](crate::converter::Converter) drives. An engine is one stateful
//! transformation session: it holds at most one decoded image plus the
//! encoding directives that will shape the exported blob.
//!
//! The production implementation is
//! [`RustEngine`](super::rust_backend::RustEngine). Tests drive the converter
//! against the recording mock in this module's `tests` submodule.

use super::params::{Background, Compression, Format, Quality};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("no image loaded")]
    NoImage,
    #[error("failed to decode image: {0}")]
    Decode(String),
    #[error("invalid target dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("invalid rotation angle: {0}")]
    InvalidAngle(f64),
    #[error("{format} does not support {compression} compression")]
    UnsupportedCompression {
        format: Format,
        compression: Compression,
    },
    #[error("compression quality {0} is outside 0-100")]
    InvalidQuality(u32),
    #[error("no output format set and the source format cannot be re-encoded")]
    NoOutputFormat,
    #[error("failed to encode {format}: {message}")]
    Encode { format: Format, message: String },
    #[error("engine handle already destroyed")]
    Destroyed,
}

/// Current image size as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Capability interface over one engine handle.
///
/// Every method mutates or reads the single image the handle holds. Handles
/// are `Send` so a whole pipeline can move to a worker thread, but nothing
/// here is meant to be shared between threads.
pub trait ImageEngine: Send {
    /// Decode an encoded blob, replacing any image already held.
    fn decode(&mut self, blob: &[u8]) -> Result<(), EngineError>;

    /// Dimensions of the current image.
    fn dimensions(&self) -> Result<Dimensions, EngineError>;

    /// Resize the current image to exactly `width` x `height`.
    fn scale(&mut self, width: u32, height: u32) -> Result<(), EngineError>;

    /// Rotate clockwise by `degrees`, filling exposed canvas with `background`.
    fn rotate(&mut self, degrees: f64, background: Background) -> Result<(), EngineError>;

    fn set_format(&mut self, format: Format) -> Result<(), EngineError>;

    /// Checked against the most recently set format.
    fn set_compression(&mut self, compression: Compression) -> Result<(), EngineError>;

    fn set_quality(&mut self, quality: Quality) -> Result<(), EngineError>;

    /// Encode the current image with the current directives.
    ///
    /// An empty blob means there is nothing to export.
    fn blob(&self) -> Result<Vec<u8>, EngineError>;

    /// Release everything the handle owns. Later calls fail with
    /// [`EngineError::Destroyed`].
    fn destroy(&mut self);
}
