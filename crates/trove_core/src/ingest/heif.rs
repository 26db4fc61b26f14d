//! HEIC/HEIF pixel decoding via libheif.
//!
//! Compiled only with the `heif` feature; capture metadata for HEIF
//! containers is handled by the metadata module regardless.

use crate::ingest::{IngestError, IngestResult};
use image::{DynamicImage, RgbImage};
use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

/// Decodes the primary image of a HEIF container to RGB pixels.
pub fn decode_heif(raw: &[u8]) -> IngestResult<DynamicImage> {
    let lib_heif = LibHeif::new();
    let context = HeifContext::read_from_bytes(raw)
        .map_err(|err| IngestError::Processing(format!("heif container read failed: {err}")))?;
    let handle = context
        .primary_image_handle()
        .map_err(|err| IngestError::Processing(format!("heif primary image missing: {err}")))?;
    let decoded = lib_heif
        .decode(&handle, ColorSpace::Rgb(RgbChroma::Rgb), None)
        .map_err(|err| IngestError::Processing(format!("heif decode failed: {err}")))?;

    let plane = decoded
        .planes()
        .interleaved
        .ok_or_else(|| IngestError::Processing("heif decode produced no pixel plane".to_string()))?;

    let width = plane.width;
    let height = plane.height;
    let stride = plane.stride;
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
    for row in 0..height as usize {
        let start = row * stride;
        pixels.extend_from_slice(&plane.data[start..start + width as usize * 3]);
    }

    let buffer = RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| IngestError::Processing("heif pixel buffer size mismatch".to_string()))?;
    Ok(DynamicImage::ImageRgb8(buffer))
}
