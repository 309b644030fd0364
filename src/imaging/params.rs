//! Parameter types for image conversion.
//!
//! These types describe *what* the engine should produce, not *how*. They are
//! the interface between the [`Converter`](crate::converter::Converter) (which
//! decides which settings to apply) and the [`backend`](super::backend) (which
//! does the actual pixel and codec work).
//!
//! ## Types
//!
//! - [`Format`]: Output container format (JPEG, PNG, TIFF).
//! - [`Compression`]: Encoding-time compression scheme, normally derived from the format.
//! - [`Quality`]: Compression quality (0-100). `0` means "unset, use the default".
//! - [`Background`]: RGBA fill for canvas areas exposed by rotation.
//! - [`Options`]: The mutable converter configuration tying the above together.
//!
//! ## Format → compression derivation
//!
//! | Format | Derived compression |
//! |---|---|
//! | JPEG | [`Compression::Jpeg`] (lossy DCT) |
//! | PNG | [`Compression::Zip`] (lossless deflate) |
//! | TIFF | [`Compression::Zip`] (lossless deflate) |
//! | unset / unrecognized | [`Compression::None`] |
//!
//! The derivation runs only when the format is *set*. An explicit
//! [`Options::set_compression`] afterwards wins.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Format {
    #[serde(rename = "jpg", alias = "jpeg")]
    Jpeg,
    #[serde(rename = "png")]
    Png,
    #[serde(rename = "tiff", alias = "tif")]
    Tiff,
}

impl Format {
    /// Parse a format name or file extension (`jpg`, `jpeg`, `png`, `tif`, `tiff`).
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tif" | "tiff" => Some(Self::Tiff),
            _ => None,
        }
    }

    /// Canonical file extension for output files.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Jpeg => "jpg",
            Self::Png => "png",
            Self::Tiff => "tiff",
        }
    }

    /// The compression scheme each container uses unless told otherwise.
    pub fn implied_compression(self) -> Compression {
        match self {
            Self::Jpeg => Compression::Jpeg,
            Self::Png | Self::Tiff => Compression::Zip,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Jpeg => "JPEG",
            Self::Png => "PNG",
            Self::Tiff => "TIFF",
        })
    }
}

/// Compression scheme applied when the final blob is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// No compression (or the codec's fastest setting where it cannot be disabled).
    None,
    /// JPEG-native lossy DCT.
    Jpeg,
    /// Lossless deflate dictionary coding.
    Zip,
}

impl Compression {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "none" | "no" => Some(Self::None),
            "jpeg" | "jpg" => Some(Self::Jpeg),
            "zip" | "deflate" => Some(Self::Zip),
            _ => None,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::None => "none",
            Self::Jpeg => "jpeg",
            Self::Zip => "zip",
        })
    }
}

/// Compression quality (conventionally 0-100).
///
/// `0` is the "unset" sentinel. Values are not clamped here; range checks are
/// the engine's business so that a bad value surfaces as an engine rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quality(pub u32);

impl Quality {
    pub const UNSET: Self = Self(0);
    pub const MAX: Self = Self(100);

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn is_unset(self) -> bool {
        self.0 == 0
    }

    /// Replace the unset sentinel with the maximum quality.
    pub fn or_default(self) -> Self {
        if self.is_unset() { Self::MAX } else { self }
    }
}

/// RGBA background used to fill canvas exposed by non-quarter-turn rotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Background(pub [u8; 4]);

impl Background {
    pub const WHITE: Self = Self([255, 255, 255, 255]);
    pub const TRANSPARENT: Self = Self([0, 0, 0, 0]);

    /// Parse `#rrggbb` or `#rrggbbaa` (the leading `#` is optional).
    pub fn parse(value: &str) -> Option<Self> {
        let hex = value.trim().trim_start_matches('#');
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        let alpha = if hex.len() == 8 { channel(6)? } else { 255 };
        Some(Self([channel(0)?, channel(2)?, channel(4)?, alpha]))
    }

    pub fn to_hex(self) -> String {
        let [r, g, b, a] = self.0;
        if a == 255 {
            format!("#{r:02x}{g:02x}{b:02x}")
        } else {
            format!("#{r:02x}{g:02x}{b:02x}{a:02x}")
        }
    }
}

impl Default for Background {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Settings handed to the engine by [`Converter::convert`](crate::converter::Converter::convert),
/// after unset fields have been filled in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Directives {
    pub format: Format,
    pub compression: Compression,
    pub quality: Quality,
}

/// Mutable converter configuration.
///
/// Fields are private so that the format → compression derivation cannot be
/// bypassed: the only way to change the format is [`set_target_format`](Self::set_target_format),
/// which always re-derives the compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Options {
    target_format: Option<Format>,
    compression: Option<Compression>,
    quality: Quality,
    background: Background,
}

impl Options {
    /// Empty options: every field unset.
    pub fn new() -> Self {
        Self::default()
    }

    /// JPEG output with JPEG compression at quality 100.
    pub fn jpeg() -> Self {
        let mut options = Self::new();
        options.set_target_format(Some(Format::Jpeg)).set_quality(100);
        options
    }

    pub fn target_format(&self) -> Option<Format> {
        self.target_format
    }

    /// `None` means the compression was never set, which is distinct from
    /// an explicit [`Compression::None`].
    pub fn compression(&self) -> Option<Compression> {
        self.compression
    }

    pub fn quality(&self) -> Quality {
        self.quality
    }

    pub fn background(&self) -> Background {
        self.background
    }

    /// Set the target format and re-derive the compression from it.
    pub fn set_target_format(&mut self, format: Option<Format>) -> &mut Self {
        self.target_format = format;
        self.compression = Some(format.map_or(Compression::None, Format::implied_compression));
        self
    }

    /// Set the target format by name. Unrecognized names clear the format and
    /// derive [`Compression::None`].
    pub fn set_target_format_name(&mut self, name: &str) -> &mut Self {
        self.set_target_format(Format::from_name(name))
    }

    /// Override the derived compression. Survives until the format is set again.
    pub fn set_compression(&mut self, compression: Compression) -> &mut Self {
        self.compression = Some(compression);
        self
    }

    pub fn set_quality(&mut self, quality: u32) -> &mut Self {
        self.quality = Quality::new(quality);
        self
    }

    pub fn set_background(&mut self, background: Background) -> &mut Self {
        self.background = background;
        self
    }

    /// Fill unset fields with defaults: JPEG, the JPEG scheme, quality 100.
    pub fn directives(&self) -> Directives {
        Directives {
            format: self.target_format.unwrap_or(Format::Jpeg),
            compression: self
                .compression
                .unwrap_or_else(|| Format::Jpeg.implied_compression()),
            quality: self.quality.or_default(),
        }
    }
}
