//! Decoding of image blobs referenced by signature and image annotations
//!
//! Sources arrive as data URLs (`data:image/png;base64,...`) or bare base64.
//! PNG is decoded to raw RGB plus an optional alpha channel. JPEG is kept
//! compressed; only its header is read for dimensions.

use crate::error::OverlayError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegDecoder;
use image::{ExtendedColorType, ImageDecoder, ImageFormat};
use std::io::Cursor;

#[derive(Debug, Clone, PartialEq)]
pub enum ImageData {
    /// Baseline or progressive JPEG, embedded as-is
    Jpeg { data: Vec<u8>, components: u8 },
    /// 8-bit RGB samples with optional 8-bit alpha
    Raw { rgb: Vec<u8>, alpha: Option<Vec<u8>> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    pub data: ImageData,
}

fn unavailable(e: image::ImageError) -> OverlayError {
    OverlayError::ResourceUnavailable(format!("image: {}", e))
}

/// Decode an image source string
pub fn decode_image(src: &str) -> Result<DecodedImage, OverlayError> {
    let bytes = source_bytes(src)?;

    match image::guess_format(&bytes) {
        Ok(ImageFormat::Jpeg) => decode_jpeg(bytes),
        Ok(ImageFormat::Png) => decode_raster(&bytes, ImageFormat::Png),
        _ => Err(OverlayError::ResourceUnavailable(
            "unsupported image format (expected PNG or JPEG)".to_string(),
        )),
    }
}

/// Raw bytes behind a data URL or bare base64 string
fn source_bytes(src: &str) -> Result<Vec<u8>, OverlayError> {
    let payload = match src.trim().strip_prefix("data:") {
        Some(rest) => {
            let (meta, data) = rest.split_once(',').ok_or_else(|| {
                OverlayError::ResourceUnavailable("malformed data URL".to_string())
            })?;
            if !meta.ends_with(";base64") {
                return Err(OverlayError::ResourceUnavailable(
                    "data URL is not base64 encoded".to_string(),
                ));
            }
            data
        }
        None => src.trim(),
    };

    let cleaned: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| OverlayError::ResourceUnavailable(format!("invalid base64 image: {}", e)))
}

/// JPEG stays DCT-compressed; the decoder only reads the frame header
fn decode_jpeg(bytes: Vec<u8>) -> Result<DecodedImage, OverlayError> {
    let decoder = JpegDecoder::new(Cursor::new(&bytes)).map_err(unavailable)?;
    let (width, height) = decoder.dimensions();
    let components = match decoder.original_color_type() {
        ExtendedColorType::L8 => 1,
        ExtendedColorType::Cmyk8 => 4,
        _ => 3,
    };
    Ok(DecodedImage {
        width,
        height,
        data: ImageData::Jpeg {
            data: bytes,
            components,
        },
    })
}

fn decode_raster(bytes: &[u8], format: ImageFormat) -> Result<DecodedImage, OverlayError> {
    let decoded = image::load_from_memory_with_format(bytes, format).map_err(unavailable)?;
    let (width, height) = (decoded.width(), decoded.height());

    let (rgb, alpha) = if decoded.color().has_alpha() {
        let rgba = decoded.to_rgba8();
        let pixels = (width as usize) * (height as usize);
        let mut rgb = Vec::with_capacity(pixels * 3);
        let mut alpha = Vec::with_capacity(pixels);
        for px in rgba.pixels() {
            let [r, g, b, a] = px.0;
            rgb.extend_from_slice(&[r, g, b]);
            alpha.push(a);
        }
        (rgb, Some(alpha))
    } else {
        (decoded.to_rgb8().into_raw(), None)
    };

    // Fully opaque alpha adds nothing
    let alpha = alpha.filter(|a| a.iter().any(|&v| v != 255));

    Ok(DecodedImage {
        width,
        height,
        data: ImageData::Raw { rgb, alpha },
    })
}

/// Encode pixels in `format` as a data URL
#[cfg(test)]
pub(crate) fn encoded_data_url(image: image::DynamicImage, format: ImageFormat) -> String {
    let mut out = Vec::new();
    image.write_to(&mut Cursor::new(&mut out), format).unwrap();
    format!("data:{};base64,{}", format.to_mime_type(), STANDARD.encode(out))
}

/// Encode RGBA pixels as a PNG data URL
#[cfg(test)]
pub(crate) fn png_data_url(width: u32, height: u32, rgba: &[u8]) -> String {
    let pixels = image::RgbaImage::from_raw(width, height, rgba.to_vec()).unwrap();
    encoded_data_url(pixels.into(), ImageFormat::Png)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_png_with_alpha() {
        let rgba = [255, 0, 0, 128, 0, 255, 0, 255];
        let decoded = decode_image(&png_data_url(2, 1, &rgba)).unwrap();
        assert_eq!((decoded.width, decoded.height), (2, 1));
        assert_eq!(
            decoded.data,
            ImageData::Raw {
                rgb: vec![255, 0, 0, 0, 255, 0],
                alpha: Some(vec![128, 255]),
            }
        );
    }

    #[test]
    fn test_opaque_png_drops_alpha() {
        let rgba = [10, 20, 30, 255];
        let decoded = decode_image(&png_data_url(1, 1, &rgba)).unwrap();
        assert!(matches!(decoded.data, ImageData::Raw { alpha: None, .. }));
    }

    #[test]
    fn test_bare_base64_accepted() {
        let url = png_data_url(1, 1, &[0, 0, 0, 255]);
        let bare = url.split_once(',').unwrap().1;
        assert!(decode_image(bare).is_ok());
    }

    #[test]
    fn test_jpeg_kept_compressed() {
        let src = encoded_data_url(image::RgbImage::new(3, 2).into(), ImageFormat::Jpeg);
        let decoded = decode_image(&src).unwrap();
        assert_eq!((decoded.width, decoded.height), (3, 2));
        match decoded.data {
            ImageData::Jpeg { data, components } => {
                assert_eq!(components, 3);
                assert_eq!(&data[..2], &[0xFF, 0xD8]);
            }
            other => panic!("expected JPEG passthrough, got {:?}", other),
        }
    }

    #[test]
    fn test_grayscale_jpeg_has_one_component() {
        let src = encoded_data_url(image::GrayImage::new(4, 4).into(), ImageFormat::Jpeg);
        let decoded = decode_image(&src).unwrap();
        assert!(matches!(decoded.data, ImageData::Jpeg { components: 1, .. }));
    }

    #[test]
    fn test_grayscale_png_expands_to_rgb() {
        let gray = image::GrayImage::from_raw(2, 1, vec![0, 200]).unwrap();
        let decoded = decode_image(&encoded_data_url(gray.into(), ImageFormat::Png)).unwrap();
        assert_eq!(
            decoded.data,
            ImageData::Raw {
                rgb: vec![0, 0, 0, 200, 200, 200],
                alpha: None,
            }
        );
    }

    #[test]
    fn test_garbage_is_unavailable() {
        for src in ["data:image/png;base64,!!!", "data:text/plain,hello", "aGVsbG8="] {
            assert!(matches!(
                decode_image(src),
                Err(OverlayError::ResourceUnavailable(_))
            ));
        }
    }
}
