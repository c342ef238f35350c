//! Image XObjects for PDF embedding.
//!
//! Per PDF spec Section 8.9, raster images are Image XObjects. JPEG data
//! is embedded as-is behind DCTDecode; PNG pixels are decoded with the
//! image crate and re-compressed with Flate. An alpha channel, when it
//! actually varies, becomes a DeviceGray soft mask.

use crate::error::{Error, Result};
use crate::object::Object;
use std::collections::HashMap;
use std::io::Write;

/// Image format for PDF embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedFormat {
    /// JPEG image (DCTDecode filter)
    Jpeg,
    /// Flate-compressed raw pixels (FlateDecode filter)
    Flate,
}

/// Color space for image data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    /// Grayscale (1 component per pixel)
    DeviceGray,
    /// RGB color (3 components per pixel)
    DeviceRGB,
    /// CMYK color (4 components per pixel)
    DeviceCMYK,
}

impl ColorSpace {
    /// PDF name for this color space.
    pub fn pdf_name(&self) -> &'static str {
        match self {
            ColorSpace::DeviceGray => "DeviceGray",
            ColorSpace::DeviceRGB => "DeviceRGB",
            ColorSpace::DeviceCMYK => "DeviceCMYK",
        }
    }
}

/// Decoded image data ready for embedding.
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Color space
    pub color_space: ColorSpace,
    /// Embed format
    pub format: EmbedFormat,
    /// Encoded image data (JPEG bytes or flate-compressed pixels)
    pub data: Vec<u8>,
    /// Flate-compressed alpha channel, present only when it varies
    pub soft_mask: Option<Vec<u8>>,
}

impl ImageData {
    /// Load a JPEG for pass-through embedding.
    pub fn from_jpeg(data: Vec<u8>) -> Result<Self> {
        let (width, height, color_space) = parse_jpeg_header(&data)?;

        Ok(Self {
            width,
            height,
            color_space,
            format: EmbedFormat::Jpeg,
            data,
            soft_mask: None,
        })
    }

    /// Load a PNG, decoding pixels and re-compressing with Flate.
    pub fn from_png(data: &[u8]) -> Result<Self> {
        use image::GenericImageView;

        let img = image::load_from_memory_with_format(data, image::ImageFormat::Png)
            .map_err(|e| Error::Image(format!("PNG decode failed: {}", e)))?;

        let (width, height) = img.dimensions();

        let (color_space, pixels, alpha) = match img.color() {
            image::ColorType::L8 | image::ColorType::L16 => {
                let gray = img.to_luma8();
                (ColorSpace::DeviceGray, gray.into_raw(), None)
            },
            image::ColorType::La8 | image::ColorType::La16 => {
                let la = img.to_luma_alpha8();
                let mut gray = Vec::with_capacity((width * height) as usize);
                let mut alpha_channel = Vec::with_capacity((width * height) as usize);
                for pixel in la.pixels() {
                    gray.push(pixel.0[0]);
                    alpha_channel.push(pixel.0[1]);
                }
                (ColorSpace::DeviceGray, gray, Some(alpha_channel))
            },
            image::ColorType::Rgb8 | image::ColorType::Rgb16 => {
                let rgb = img.to_rgb8();
                (ColorSpace::DeviceRGB, rgb.into_raw(), None)
            },
            image::ColorType::Rgba8 | image::ColorType::Rgba16 => {
                let rgba = img.to_rgba8();
                let mut rgb = Vec::with_capacity((width * height * 3) as usize);
                let mut alpha_channel = Vec::with_capacity((width * height) as usize);
                for pixel in rgba.pixels() {
                    rgb.push(pixel.0[0]);
                    rgb.push(pixel.0[1]);
                    rgb.push(pixel.0[2]);
                    alpha_channel.push(pixel.0[3]);
                }
                (ColorSpace::DeviceRGB, rgb, Some(alpha_channel))
            },
            _ => {
                let rgb = img.to_rgb8();
                (ColorSpace::DeviceRGB, rgb.into_raw(), None)
            },
        };

        // A constant fully-opaque alpha channel carries no information
        let alpha = alpha.filter(|a| a.iter().any(|&v| v != 255));

        let compressed = compress(&pixels)?;
        let soft_mask = alpha.map(|a| compress(&a)).transpose()?;

        Ok(Self {
            width,
            height,
            color_space,
            format: EmbedFormat::Flate,
            data: compressed,
            soft_mask,
        })
    }

    /// Load an image from raw bytes, detecting JPEG or PNG by magic.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() >= 2 && data[0] == 0xFF && data[1] == 0xD8 {
            return Self::from_jpeg(data.to_vec());
        }

        if data.len() >= 8 && &data[0..8] == b"\x89PNG\r\n\x1a\n" {
            return Self::from_png(data);
        }

        Err(Error::Image("unsupported image format (expected PNG or JPEG)".to_string()))
    }

    /// Load an image from a file.
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(&data)
    }

    /// Build the Image XObject stream, wiring the soft mask reference if
    /// one was produced.
    pub fn to_stream(&self, smask_ref: Option<crate::object::ObjectRef>) -> Object {
        let mut dict = HashMap::new();

        dict.insert("Type".to_string(), Object::Name("XObject".to_string()));
        dict.insert("Subtype".to_string(), Object::Name("Image".to_string()));
        dict.insert("Width".to_string(), Object::Integer(self.width as i64));
        dict.insert("Height".to_string(), Object::Integer(self.height as i64));
        dict.insert(
            "ColorSpace".to_string(),
            Object::Name(self.color_space.pdf_name().to_string()),
        );
        dict.insert("BitsPerComponent".to_string(), Object::Integer(8));

        match self.format {
            EmbedFormat::Jpeg => {
                dict.insert("Filter".to_string(), Object::Name("DCTDecode".to_string()));
            },
            EmbedFormat::Flate => {
                dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
            },
        }

        if let Some(smask_ref) = smask_ref {
            dict.insert("SMask".to_string(), Object::Reference(smask_ref));
        }

        Object::Stream {
            dict,
            data: bytes::Bytes::from(self.data.clone()),
        }
    }

    /// Build the soft mask XObject stream, if the image carries alpha.
    pub fn soft_mask_stream(&self) -> Option<Object> {
        self.soft_mask.as_ref().map(|mask_data| {
            let mut dict = HashMap::new();
            dict.insert("Type".to_string(), Object::Name("XObject".to_string()));
            dict.insert("Subtype".to_string(), Object::Name("Image".to_string()));
            dict.insert("Width".to_string(), Object::Integer(self.width as i64));
            dict.insert("Height".to_string(), Object::Integer(self.height as i64));
            dict.insert("ColorSpace".to_string(), Object::Name("DeviceGray".to_string()));
            dict.insert("BitsPerComponent".to_string(), Object::Integer(8));
            dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));

            Object::Stream {
                dict,
                data: bytes::Bytes::from(mask_data.clone()),
            }
        })
    }
}

/// Parse a JPEG header for dimensions and component count.
fn parse_jpeg_header(data: &[u8]) -> Result<(u32, u32, ColorSpace)> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != 0xD8 {
        return Err(Error::Image("not a valid JPEG".to_string()));
    }

    let mut pos = 2;
    while pos < data.len() - 1 {
        if data[pos] != 0xFF {
            pos += 1;
            continue;
        }

        let marker = data[pos + 1];
        pos += 2;

        if marker == 0xFF || marker == 0x00 {
            continue;
        }

        // SOF markers carry the frame header
        if matches!(
            marker,
            0xC0 | 0xC1 | 0xC2 | 0xC3 | 0xC5 | 0xC6 | 0xC7 | 0xC9 | 0xCA | 0xCB | 0xCD | 0xCE
                | 0xCF
        ) {
            if pos + 7 > data.len() {
                return Err(Error::Image("truncated JPEG header".to_string()));
            }

            let height = u16::from_be_bytes([data[pos + 3], data[pos + 4]]) as u32;
            let width = u16::from_be_bytes([data[pos + 5], data[pos + 6]]) as u32;
            let components = data[pos + 7];

            let color_space = match components {
                1 => ColorSpace::DeviceGray,
                4 => ColorSpace::DeviceCMYK,
                _ => ColorSpace::DeviceRGB,
            };

            return Ok((width, height, color_space));
        }

        if pos + 2 > data.len() {
            break;
        }
        let length = u16::from_be_bytes([data[pos], data[pos + 1]]) as usize;
        pos += length;
    }

    Err(Error::Image("could not find JPEG dimensions".to_string()))
}

fn compress(data: &[u8]) -> Result<Vec<u8>> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| Error::Image(format!("compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| Error::Image(format!("compression failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_from_png() {
        let data = png_bytes(10, 8);
        let img = ImageData::from_bytes(&data).unwrap();

        assert_eq!(img.width, 10);
        assert_eq!(img.height, 8);
        assert_eq!(img.color_space, ColorSpace::DeviceRGB);
        assert_eq!(img.format, EmbedFormat::Flate);
        assert!(img.soft_mask.is_none());
    }

    #[test]
    fn test_opaque_alpha_dropped() {
        let img = image::RgbaImage::from_pixel(4, 4, image::Rgba([10, 20, 30, 255]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let parsed = ImageData::from_png(&buf).unwrap();
        assert!(parsed.soft_mask.is_none());
    }

    #[test]
    fn test_varying_alpha_kept() {
        let img = image::RgbaImage::from_fn(4, 4, |x, _| image::Rgba([0, 0, 0, (x * 60) as u8]));
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let parsed = ImageData::from_png(&buf).unwrap();
        assert!(parsed.soft_mask.is_some());
        assert!(parsed.soft_mask_stream().is_some());
    }

    #[test]
    fn test_xobject_dict() {
        let data = png_bytes(5, 5);
        let img = ImageData::from_bytes(&data).unwrap();
        let stream = img.to_stream(None);

        let dict = stream.as_dict().unwrap();
        assert_eq!(dict.get("Subtype").unwrap().as_name(), Some("Image"));
        assert_eq!(dict.get("Width").unwrap().as_integer(), Some(5));
        assert_eq!(dict.get("Filter").unwrap().as_name(), Some("FlateDecode"));
    }

    #[test]
    fn test_unknown_format_rejected() {
        assert!(ImageData::from_bytes(b"GIF89a....").is_err());
    }

    #[test]
    fn test_invalid_jpeg_header() {
        assert!(parse_jpeg_header(&[0x00, 0x00]).is_err());
    }
}
