//! Image format detection, validation and decoding.

use std::io::Cursor;

use image::{DynamicImage, ImageError, ImageFormat, ImageReader, Limits};

use crate::GatewayError;

/// Formats accepted when nothing else is configured.
pub const DEFAULT_FORMATS: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::Tiff,
    ImageFormat::Bmp,
    ImageFormat::Gif,
    ImageFormat::WebP,
];

/// Which images the gateway is willing to decode.
#[derive(Debug, Clone)]
pub struct ImageLimits {
    pub allowed_formats: Vec<ImageFormat>,
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            allowed_formats: DEFAULT_FORMATS.to_vec(),
            max_width: 10_000,
            max_height: 10_000,
        }
    }
}

/// An upload decoded into memory, owned by a single request.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub image: DynamicImage,
    pub format: ImageFormat,
}

impl DecodedImage {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Parse a format name as it appears in config files (`"png"`, `"jpg"`, ...).
pub fn parse_format(name: &str) -> Option<ImageFormat> {
    match name.trim().to_lowercase().as_str() {
        "png" => Some(ImageFormat::Png),
        "jpeg" | "jpg" => Some(ImageFormat::Jpeg),
        "tiff" | "tif" => Some(ImageFormat::Tiff),
        "bmp" => Some(ImageFormat::Bmp),
        "gif" => Some(ImageFormat::Gif),
        "webp" => Some(ImageFormat::WebP),
        _ => None,
    }
}

/// Lowercase display name for a format.
pub fn format_name(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "png",
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        ImageFormat::Gif => "gif",
        ImageFormat::WebP => "webp",
        _ => "other",
    }
}

/// Detect the format from magic bytes, check it against `limits` and decode.
///
/// The declared content type of the upload is not trusted; only the bytes are.
pub fn decode_image(data: &[u8], limits: &ImageLimits) -> Result<DecodedImage, GatewayError> {
    let format = image::guess_format(data)
        .map_err(|_| GatewayError::UnsupportedImage("unrecognized image format".to_string()))?;

    if !limits.allowed_formats.contains(&format) {
        return Err(GatewayError::UnsupportedImage(format!(
            "{} images are not accepted",
            format_name(format)
        )));
    }

    let mut decoder_limits = Limits::default();
    decoder_limits.max_image_width = Some(limits.max_width);
    decoder_limits.max_image_height = Some(limits.max_height);

    let mut reader = ImageReader::with_format(Cursor::new(data), format);
    reader.limits(decoder_limits);

    let image = reader.decode().map_err(|e| match e {
        ImageError::Limits(_) => GatewayError::UnsupportedImage(format!(
            "image exceeds the {}x{} limit",
            limits.max_width, limits.max_height
        )),
        other => GatewayError::UnsupportedImage(format!(
            "failed to decode {} image: {}",
            format_name(format),
            other
        )),
    })?;

    Ok(DecodedImage { image, format })
}
