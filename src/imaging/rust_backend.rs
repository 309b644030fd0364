//! Pure Rust engine, the production [`ImageEngine`].
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image::ImageReader` with content sniffing |
//! | Scale | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Rotate (quarter turns) | `rotate90` / `rotate180` / `rotate270` |
//! | Rotate (any angle) | inverse-mapped bilinear sampling onto an expanded canvas |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality 1-100) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (deflate level from quality) |
//! | Encode → TIFF | `tiff::encoder::TiffEncoder` (deflate or uncompressed strips) |
//!
//! ## Compression compatibility
//!
//! | Format | Accepted compression |
//! |---|---|
//! | JPEG | `jpeg`, `none` |
//! | PNG | `zip`, `none` |
//! | TIFF | `zip`, `none` |
//!
//! PNG has no truly uncompressed mode in the encoder; `none` maps to the
//! fastest deflate level. For `zip`, the tens digit of the quality picks the
//! deflate effort (0-3 fast, 4-6 default, 7-10 best). TIFF `zip` writes
//! deflate strips (tag 259 = 8); `none` writes them raw (tag 259 = 1).
//!
//! ## Size limit
//!
//! A resize or arbitrary rotation whose canvas exceeds [`MAX_PIXELS`] is
//! refused with [`EngineError::InvalidDimensions`] before anything is
//! allocated.

use super::backend::{Dimensions, EngineError, ImageEngine};
use super::calculations::{quarter_turns, rotated_bounds};
use super::params::{Background, Compression, Format, Quality};
use super::runtime::{HandleSlot, Runtime};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Rgba, RgbaImage};
use std::borrow::Cow;
use std::io::Cursor;
use std::sync::LazyLock;
use tiff::TiffResult;
use tiff::encoder::TiffEncoder;
use tiff::encoder::colortype::{ColorType, RGB8, RGBA8};
use tiff::encoder::compression::{Compression as TiffCompression, Deflate, Uncompressed};
use tracing::debug;

/// Largest canvas, in pixels, a resize or rotation may produce.
///
/// Lanczos resampling goes through a 16-byte-per-pixel float buffer, so one
/// transform stays around 1 GiB.
pub const MAX_PIXELS: u64 = 1 << 26;

fn within_budget(width: u32, height: u32) -> bool {
    u64::from(width) * u64::from(height) <= MAX_PIXELS
}

/// Extensions whose decoders are compiled in.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Engine handle backed by the `image` crate.
///
/// Holds one decoded image plus the encoding directives. Creating one claims a
/// handle slot on the [`Runtime`]; [`destroy`](ImageEngine::destroy) gives it back.
pub struct RustEngine {
    image: Option<DynamicImage>,
    source_format: Option<ImageFormat>,
    format: Option<Format>,
    compression: Option<Compression>,
    quality: Quality,
    slot: Option<HandleSlot>,
}

impl RustEngine {
    pub fn new(runtime: &Runtime) -> Self {
        Self {
            image: None,
            source_format: None,
            format: None,
            compression: None,
            quality: Quality::UNSET,
            slot: Some(runtime.acquire_handle()),
        }
    }

    fn live(&self) -> Result<(), EngineError> {
        if self.slot.is_none() {
            return Err(EngineError::Destroyed);
        }
        Ok(())
    }

    fn image_mut(&mut self) -> Result<&mut DynamicImage, EngineError> {
        self.live()?;
        self.image.as_mut().ok_or(EngineError::NoImage)
    }

    /// Directives only make sense against a loaded image.
    fn require_image(&self) -> Result<(), EngineError> {
        self.live()?;
        if self.image.is_none() {
            return Err(EngineError::NoImage);
        }
        Ok(())
    }

    /// The directive format, falling back to the decoded source format.
    fn output_format(&self) -> Result<Format, EngineError> {
        if let Some(format) = self.format {
            return Ok(format);
        }
        match self.source_format {
            Some(ImageFormat::Jpeg) => Ok(Format::Jpeg),
            Some(ImageFormat::Png) => Ok(Format::Png),
            Some(ImageFormat::Tiff) => Ok(Format::Tiff),
            _ => Err(EngineError::NoOutputFormat),
        }
    }
}

fn accepts(format: Format, compression: Compression) -> bool {
    matches!(
        (format, compression),
        (_, Compression::None)
            | (Format::Jpeg, Compression::Jpeg)
            | (Format::Png | Format::Tiff, Compression::Zip)
    )
}

fn png_compression(compression: Compression, quality: Quality) -> CompressionType {
    match compression {
        Compression::Zip => match quality.value() / 10 {
            0..=3 => CompressionType::Fast,
            4..=6 => CompressionType::Default,
            _ => CompressionType::Best,
        },
        _ => CompressionType::Fast,
    }
}

/// Reduce to 8-bit RGB(A), which every output codec accepts.
fn as_8bit(image: &DynamicImage) -> Cow<'_, DynamicImage> {
    match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgba8(_) => Cow::Borrowed(image),
        other if other.color().has_alpha() => {
            Cow::Owned(DynamicImage::ImageRgba8(other.to_rgba8()))
        }
        other => Cow::Owned(DynamicImage::ImageRgb8(other.to_rgb8())),
    }
}

fn encode(
    image: &DynamicImage,
    format: Format,
    compression: Compression,
    quality: Quality,
) -> Result<Vec<u8>, EngineError> {
    let mut buffer = Cursor::new(Vec::new());
    let result = match format {
        Format::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            let q = quality.value().clamp(1, 100) as u8;
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, q))
                .map_err(|e| e.to_string())
        }
        Format::Png => as_8bit(image)
            .write_with_encoder(PngEncoder::new_with_quality(
                &mut buffer,
                png_compression(compression, quality),
                PngFilter::Adaptive,
            ))
            .map_err(|e| e.to_string()),
        Format::Tiff => encode_tiff(image, compression, &mut buffer).map_err(|e| e.to_string()),
    };
    result.map_err(|message| EngineError::Encode { format, message })?;
    Ok(buffer.into_inner())
}

fn encode_tiff(
    image: &DynamicImage,
    compression: Compression,
    buffer: &mut Cursor<Vec<u8>>,
) -> TiffResult<()> {
    let image = as_8bit(image);
    let (width, height) = (image.width(), image.height());
    let data = image.as_bytes();
    match (image.color().has_alpha(), compression) {
        (false, Compression::Zip) => {
            write_tiff::<RGB8, _>(buffer, width, height, Deflate::default(), data)
        }
        (false, _) => write_tiff::<RGB8, _>(buffer, width, height, Uncompressed, data),
        (true, Compression::Zip) => {
            write_tiff::<RGBA8, _>(buffer, width, height, Deflate::default(), data)
        }
        (true, _) => write_tiff::<RGBA8, _>(buffer, width, height, Uncompressed, data),
    }
}

fn write_tiff<C, D>(
    buffer: &mut Cursor<Vec<u8>>,
    width: u32,
    height: u32,
    compression: D,
    data: &[u8],
) -> TiffResult<()>
where
    C: ColorType<Inner = u8>,
    D: TiffCompression,
{
    TiffEncoder::new(buffer)?
        .write_image_with_compression::<C, D>(width, height, compression, data)
}

/// Rotate clockwise by an arbitrary angle onto a canvas large enough to hold
/// the whole result. Pixels outside the source take the background colour.
fn rotate_about_center(image: &DynamicImage, degrees: f64, background: Background) -> DynamicImage {
    let src = image.to_rgba8();
    let (src_w, src_h) = src.dimensions();
    let (dst_w, dst_h) = rotated_bounds(src_w, src_h, degrees);
    let fill = Rgba(background.0);

    let (sin, cos) = degrees.to_radians().sin_cos();
    let (src_cx, src_cy) = (src_w as f64 / 2.0, src_h as f64 / 2.0);
    let (dst_cx, dst_cy) = (dst_w as f64 / 2.0, dst_h as f64 / 2.0);

    let dst = RgbaImage::from_fn(dst_w, dst_h, |x, y| {
        let dx = x as f64 + 0.5 - dst_cx;
        let dy = y as f64 + 0.5 - dst_cy;
        // Inverse of a clockwise turn in y-down coordinates.
        let sx = dx * cos + dy * sin + src_cx - 0.5;
        let sy = -dx * sin + dy * cos + src_cy - 0.5;
        sample_bilinear(&src, sx, sy, fill)
    });
    DynamicImage::ImageRgba8(dst)
}

fn sample_bilinear(src: &RgbaImage, x: f64, y: f64, fill: Rgba<u8>) -> Rgba<u8> {
    let (x0, y0) = (x.floor(), y.floor());
    let (fx, fy) = (x - x0, y - y0);
    let (w, h) = (src.width() as f64, src.height() as f64);

    let texel = |tx: f64, ty: f64| -> [f64; 4] {
        if tx < 0.0 || ty < 0.0 || tx >= w || ty >= h {
            fill.0.map(f64::from)
        } else {
            src.get_pixel(tx as u32, ty as u32).0.map(f64::from)
        }
    };

    let top_left = texel(x0, y0);
    let top_right = texel(x0 + 1.0, y0);
    let bottom_left = texel(x0, y0 + 1.0);
    let bottom_right = texel(x0 + 1.0, y0 + 1.0);

    let mut out = [0u8; 4];
    for (i, channel) in out.iter_mut().enumerate() {
        let top = top_left[i] + (top_right[i] - top_left[i]) * fx;
        let bottom = bottom_left[i] + (bottom_right[i] - bottom_left[i]) * fx;
        *channel = (top + (bottom - top) * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgba(out)
}

impl ImageEngine for RustEngine {
    fn decode(&mut self, blob: &[u8]) -> Result<(), EngineError> {
        self.live()?;
        if blob.is_empty() {
            return Err(EngineError::Decode("empty blob".into()));
        }
        let reader = ImageReader::new(Cursor::new(blob))
            .with_guessed_format()
            .map_err(|e| EngineError::Decode(e.to_string()))?;
        let source_format = reader
            .format()
            .ok_or_else(|| EngineError::Decode("unrecognized image format".into()))?;
        let image = reader
            .decode()
            .map_err(|e| EngineError::Decode(e.to_string()))?;

        debug!(
            format = ?source_format,
            width = image.width(),
            height = image.height(),
            "decoded image"
        );
        self.image = Some(image);
        self.source_format = Some(source_format);
        Ok(())
    }

    fn dimensions(&self) -> Result<Dimensions, EngineError> {
        self.live()?;
        self.image
            .as_ref()
            .map(|img| Dimensions::new(img.width(), img.height()))
            .ok_or(EngineError::NoImage)
    }

    fn scale(&mut self, width: u32, height: u32) -> Result<(), EngineError> {
        let image = self.image_mut()?;
        // The vertical pass allocates source width x target height.
        let fits = within_budget(width, height) && within_budget(image.width(), height);
        if width == 0 || height == 0 || !fits {
            return Err(EngineError::InvalidDimensions { width, height });
        }
        if (image.width(), image.height()) != (width, height) {
            *image = image.resize_exact(width, height, FilterType::Lanczos3);
        }
        Ok(())
    }

    fn rotate(&mut self, degrees: f64, background: Background) -> Result<(), EngineError> {
        if !degrees.is_finite() {
            return Err(EngineError::InvalidAngle(degrees));
        }
        let image = self.image_mut()?;
        *image = match quarter_turns(degrees) {
            Some(0) => return Ok(()),
            Some(1) => image.rotate90(),
            Some(2) => image.rotate180(),
            Some(_) => image.rotate270(),
            None => {
                let (width, height) = rotated_bounds(image.width(), image.height(), degrees);
                if !within_budget(width, height) {
                    return Err(EngineError::InvalidDimensions { width, height });
                }
                rotate_about_center(image, degrees, background)
            }
        };
        Ok(())
    }

    /// Setting the format drops any earlier compression directive.
    fn set_format(&mut self, format: Format) -> Result<(), EngineError> {
        self.require_image()?;
        self.format = Some(format);
        self.compression = None;
        Ok(())
    }

    fn set_compression(&mut self, compression: Compression) -> Result<(), EngineError> {
        self.require_image()?;
        match self.format {
            Some(format) if !accepts(format, compression) => {
                return Err(EngineError::UnsupportedCompression {
                    format,
                    compression,
                });
            }
            _ => {}
        }
        self.compression = Some(compression);
        Ok(())
    }

    fn set_quality(&mut self, quality: Quality) -> Result<(), EngineError> {
        self.require_image()?;
        if quality.value() > 100 {
            return Err(EngineError::InvalidQuality(quality.value()));
        }
        self.quality = quality;
        Ok(())
    }

    fn blob(&self) -> Result<Vec<u8>, EngineError> {
        self.live()?;
        let Some(image) = &self.image else {
            return Ok(Vec::new());
        };
        let format = self.output_format()?;
        let compression = self
            .compression
            .unwrap_or_else(|| format.implied_compression());
        encode(image, format, compression, self.quality.or_default())
    }

    fn destroy(&mut self) {
        self.image = None;
        self.source_format = None;
        if self.slot.take().is_some() {
            debug!("engine handle destroyed");
        }
    }
}
