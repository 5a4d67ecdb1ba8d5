//! Image variants handed to the detector.
//!
//! Some detectors only lock onto finder patterns of one polarity, so every upload is tried twice:
//! once as-is and once as a photometric negative. The order is fixed (original first) and decides
//! the order of duplicate detections in the response.

use std::fmt;

use image::{DynamicImage, GrayImage, imageops};

use super::DecodeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantKind {
    Original,
    Inverted,
}

impl VariantKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantKind::Original => "original",
            VariantKind::Inverted => "inverted",
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single-channel raster derived from an upload.
#[derive(Debug, Clone)]
pub struct ImageVariant {
    pub kind: VariantKind,
    pub image: GrayImage,
}

/// Decode `content` and build the variants in detection order.
///
/// The format is guessed from the leading bytes, so the uploaded name and content type are
/// irrelevant. Inversion happens on the RGB image (alpha dropped) before luma conversion.
pub fn generate(content: &[u8]) -> Result<Vec<ImageVariant>, DecodeError> {
    let decoded = image::load_from_memory(content)?;

    let original = decoded.to_luma8();

    let mut negative = decoded.to_rgb8();
    imageops::invert(&mut negative);
    let inverted = DynamicImage::ImageRgb8(negative).to_luma8();

    Ok(vec![
        ImageVariant {
            kind: VariantKind::Original,
            image: original,
        },
        ImageVariant {
            kind: VariantKind::Inverted,
            image: inverted,
        },
    ])
}
