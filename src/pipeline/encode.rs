//! Image encoding: PDF image XObject → `DynamicImage` → base64 PNG data URL.
//!
//! Vision APIs accept images as base64 data URLs inside the JSON body, and
//! they do not understand raw PDF sample data. We decode the XObject
//! ourselves for the common cases (JPEG via `DCTDecode`, and 8-bit
//! Gray/RGB/CMYK samples, optionally Flate-compressed) and re-encode as PNG.
//! The colour space is resolved by
//! the locator; anything it could not resolve (JPX, CCITT, indexed palettes,
//! 16-bit, dangling references) is reported as an error and the caption
//! falls back to the fixed text.

use super::locate::ExtractedImage;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Object, Stream};
use std::io::Cursor;
use thiserror::Error;
use tracing::debug;

/// Why an XObject could not be turned into pixels.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("unsupported image filter {0}")]
    UnsupportedFilter(String),
    #[error("unsupported colour space {0}")]
    UnsupportedColorSpace(String),
    #[error("unsupported bits per component: {0}")]
    UnsupportedDepth(i64),
    #[error("stream decompression failed: {0}")]
    Decompress(String),
    #[error("sample data too short: have {have} bytes, need {need}")]
    ShortData { have: usize, need: usize },
    #[error("image has zero size")]
    Empty,
    #[error(transparent)]
    Image(#[from] image::ImageError),
}

/// Decode an extracted image XObject into pixels.
pub fn decode_image(image: &ExtractedImage) -> Result<DynamicImage, EncodeError> {
    let stream = &image.stream;
    let filters = filter_names(stream);

    match filters.last().map(String::as_str) {
        Some("DCTDecode") if filters.len() == 1 => {
            return Ok(image::load_from_memory_with_format(
                &stream.content,
                ImageFormat::Jpeg,
            )?);
        }
        Some(f @ ("DCTDecode" | "JPXDecode" | "CCITTFaxDecode" | "JBIG2Decode")) => {
            return Err(EncodeError::UnsupportedFilter(f.to_string()));
        }
        _ => {}
    }

    if image.width == 0 || image.height == 0 {
        return Err(EncodeError::Empty);
    }

    let bpc = match stream.dict.get(b"BitsPerComponent") {
        Ok(Object::Integer(b)) => *b,
        _ => 8,
    };
    if bpc != 8 {
        return Err(EncodeError::UnsupportedDepth(bpc));
    }

    let samples = if filters.is_empty() {
        stream.content.clone()
    } else {
        stream
            .decompressed_content()
            .map_err(|e| EncodeError::Decompress(e.to_string()))?
    };

    let (w, h) = (image.width, image.height);
    let pixels = w as usize * h as usize;
    let components = image
        .components
        .ok_or_else(|| EncodeError::UnsupportedColorSpace(color_space_label(stream)))?;
    let need = pixels * components;
    if samples.len() < need {
        return Err(EncodeError::ShortData {
            have: samples.len(),
            need,
        });
    }
    let samples = &samples[..need];

    let img = match components {
        1 => GrayImage::from_raw(w, h, samples.to_vec()).map(DynamicImage::ImageLuma8),
        3 => RgbImage::from_raw(w, h, samples.to_vec()).map(DynamicImage::ImageRgb8),
        _ => RgbImage::from_raw(w, h, cmyk_to_rgb(samples)).map(DynamicImage::ImageRgb8),
    };
    img.ok_or(EncodeError::ShortData {
        have: samples.len(),
        need,
    })
}

/// PNG-encode a decoded image.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, EncodeError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}

/// Decode and PNG-encode the image, returning plain base64.
pub fn to_png_base64(image: &ExtractedImage) -> Result<String, EncodeError> {
    let pixels = decode_image(image)?;
    let png = encode_png(&pixels)?;
    let b64 = STANDARD.encode(&png);
    debug!("Encoded cover image → {} bytes base64", b64.len());
    Ok(b64)
}

/// [`to_png_base64`] wrapped as a `data:` URL.
pub fn to_data_url(image: &ExtractedImage) -> Result<String, EncodeError> {
    Ok(png_data_url(&to_png_base64(image)?))
}

pub fn png_data_url(b64: &str) -> String {
    format!("data:image/png;base64,{b64}")
}

fn filter_names(stream: &Stream) -> Vec<String> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(n)) => vec![String::from_utf8_lossy(n).into_owned()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| match o {
                Object::Name(n) => Some(String::from_utf8_lossy(n).into_owned()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Short description of `/ColorSpace` for error messages.
fn color_space_label(stream: &Stream) -> String {
    match stream.dict.get(b"ColorSpace") {
        Ok(Object::Name(n)) => String::from_utf8_lossy(n).into_owned(),
        Ok(Object::Array(items)) => match items.first() {
            Some(Object::Name(n)) => String::from_utf8_lossy(n).into_owned(),
            _ => "<array>".into(),
        },
        Ok(Object::Reference(id)) => format!("{} {} R", id.0, id.1),
        Ok(_) => "<unknown>".into(),
        Err(_) => "<missing>".into(),
    }
}

/// Naive CMYK → RGB; good enough for a caption model.
fn cmyk_to_rgb(samples: &[u8]) -> Vec<u8> {
    samples
        .chunks_exact(4)
        .flat_map(|px| {
            let k = 255 - px[3] as u16;
            [
                ((255 - px[0] as u16) * k / 255) as u8,
                ((255 - px[1] as u16) * k / 255) as u8,
                ((255 - px[2] as u16) * k / 255) as u8,
            ]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::locate::components_for_name;
    use image::{Rgb, RgbImage};
    use lopdf::dictionary;

    fn extracted(stream: Stream, w: u32, h: u32) -> ExtractedImage {
        let components = match stream.dict.get(b"ColorSpace") {
            Ok(Object::Name(n)) => components_for_name(n),
            _ => None,
        };
        ExtractedImage {
            name: "Im0".into(),
            object_id: (1, 0),
            stream,
            width: w,
            height: h,
            components,
        }
    }

    fn raw(color_space: &str, w: u32, h: u32, data: Vec<u8>) -> ExtractedImage {
        let stream = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => w as i64,
                "Height" => h as i64,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
            },
            data,
        );
        extracted(stream, w, h)
    }

    #[test]
    fn decodes_raw_rgb() {
        let img = decode_image(&raw("DeviceRGB", 2, 1, vec![255, 0, 0, 0, 0, 255])).unwrap();
        let rgb = img.to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([0, 0, 255]));
    }

    #[test]
    fn decodes_raw_gray() {
        let img = decode_image(&raw("DeviceGray", 3, 2, vec![10; 6])).unwrap();
        assert_eq!((img.width(), img.height()), (3, 2));
    }

    #[test]
    fn cmyk_black_is_black() {
        let img = decode_image(&raw("DeviceCMYK", 1, 1, vec![0, 0, 0, 255])).unwrap();
        assert_eq!(img.to_rgb8().get_pixel(0, 0), &Rgb([0, 0, 0]));
    }

    #[test]
    fn decodes_jpeg() {
        let src = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb([0, 128, 255])));
        let mut jpeg = Vec::new();
        src.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg).unwrap();
        let stream = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 8,
                "Height" => 8,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            jpeg,
        );
        let img = decode_image(&extracted(stream, 8, 8)).unwrap();
        assert_eq!((img.width(), img.height()), (8, 8));
    }

    #[test]
    fn short_data_is_an_error() {
        let err = decode_image(&raw("DeviceRGB", 4, 4, vec![0; 5])).unwrap_err();
        assert!(matches!(err, EncodeError::ShortData { need: 48, .. }), "got {err:?}");
    }

    #[test]
    fn jpx_is_unsupported() {
        let stream = Stream::new(
            dictionary! { "Subtype" => "Image", "Filter" => "JPXDecode" },
            vec![0; 4],
        );
        let err = decode_image(&extracted(stream, 1, 1)).unwrap_err();
        assert!(matches!(err, EncodeError::UnsupportedFilter(_)));
    }

    #[test]
    fn data_url_is_png() {
        let url = to_data_url(&raw("DeviceGray", 2, 2, vec![0, 64, 128, 255])).unwrap();
        let b64 = url.strip_prefix("data:image/png;base64,").expect("prefix");
        let png = STANDARD.decode(b64).expect("valid base64");
        assert_eq!(&png[..4], b"\x89PNG");
    }

    #[test]
    fn unresolved_colour_space_is_not_read_as_gray() {
        let stream = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 1,
                "ColorSpace" => Object::Reference((9, 0)),
                "BitsPerComponent" => 8,
            },
            vec![255, 0, 0, 0, 0, 255],
        );
        let err = decode_image(&extracted(stream, 2, 1)).unwrap_err();
        assert!(
            matches!(&err, EncodeError::UnsupportedColorSpace(s) if s == "9 0 R"),
            "got {err:?}"
        );
    }

    #[test]
    fn resolved_icc_rgb_keeps_colours() {
        let stream = Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 1,
                "ColorSpace" => Object::Reference((9, 0)),
                "BitsPerComponent" => 8,
            },
            vec![255, 0, 0, 0, 0, 255],
        );
        let image = ExtractedImage {
            components: Some(3),
            ..extracted(stream, 2, 1)
        };
        let rgb = decode_image(&image).unwrap().to_rgb8();
        assert_eq!(rgb.get_pixel(0, 0), &Rgb([255, 0, 0]));
        assert_eq!(rgb.get_pixel(1, 0), &Rgb([0, 0, 255]));
    }
}
