//! Image normalization pipeline.
//!
//! # Responsibility
//! - Route uploads to a decode path by extension and re-encode to
//!   baseline JPEG at fixed quality.
//! - Resolve capture date, GPS, destination filename and display title.
//!
//! # Invariants
//! - Output is always `.jpg`; destination names are
//!   `{capture-date}-{6 alphanumeric}.jpg`.
//! - Capture date falls back to wall clock when no usable tag exists.
//! - Failures abandon the single upload without side effects.

use crate::ingest::metadata::{extract_capture_metadata, GpsCoordinates};
use crate::ingest::{IngestError, IngestResult};
use chrono::{DateTime, NaiveDate, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;
use std::io::Cursor;
use std::path::Path;

/// Re-encode quality for normalized JPEG output.
pub const JPEG_QUALITY: u8 = 90;

const FILE_SUFFIX_LEN: usize = 6;

/// Result of normalizing one image upload.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedImage {
    /// Normalized baseline JPEG bytes.
    pub jpeg: Vec<u8>,
    /// Resolved capture timestamp (tag chain, else ingestion time).
    pub captured_at: DateTime<Utc>,
    /// Embedded GPS position, when present.
    pub gps: Option<GpsCoordinates>,
    /// Synthesized destination filename.
    pub file_name: String,
    /// Display title: original name with the extension swapped to `.jpg`.
    pub title: String,
}

/// Normalizes one raw upload to JPEG and resolves its capture metadata.
pub fn process_image(raw: &[u8], original_name: &str) -> IngestResult<ProcessedImage> {
    // Tags are read from the source bytes before any pixel work, so the
    // transcoder does not need to carry them through.
    let capture = extract_capture_metadata(raw);

    let decoded = decode_source(raw, original_name)?;
    let jpeg = encode_jpeg(&decoded)?;

    let captured_at = capture.captured_at.unwrap_or_else(Utc::now);
    let file_name = stored_file_name(captured_at.date_naive(), Some("jpg"));
    let title = title_with_jpeg_extension(original_name);

    info!(
        "event=image_normalized module=ingest status=ok bytes_in={} bytes_out={} has_gps={} file={}",
        raw.len(),
        jpeg.len(),
        capture.gps.is_some(),
        file_name
    );

    Ok(ProcessedImage {
        jpeg,
        captured_at,
        gps: capture.gps,
        file_name,
        title,
    })
}

/// Synthesizes a destination filename: ISO date, dash, random suffix,
/// optional extension.
pub fn stored_file_name(date: NaiveDate, extension: Option<&str>) -> String {
    let suffix = random_suffix();
    match extension {
        Some(ext) if !ext.is_empty() => format!("{}-{suffix}.{ext}", date.format("%Y-%m-%d")),
        _ => format!("{}-{suffix}", date.format("%Y-%m-%d")),
    }
}

/// Display title for a normalized image: original stem plus `.jpg`.
pub fn title_with_jpeg_extension(original_name: &str) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("image");
    format!("{stem}.jpg")
}

/// Lowercased extension of an upload name, when it has one.
pub fn file_extension(original_name: &str) -> Option<String> {
    Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn is_heif_extension(original_name: &str) -> bool {
    matches!(file_extension(original_name).as_deref(), Some("heic") | Some("heif"))
}

fn decode_source(raw: &[u8], original_name: &str) -> IngestResult<DynamicImage> {
    if is_heif_extension(original_name) {
        return decode_heif_source(raw);
    }
    image::load_from_memory(raw)
        .map_err(|err| IngestError::Processing(format!("decode failed: {err}")))
}

#[cfg(feature = "heif")]
fn decode_heif_source(raw: &[u8]) -> IngestResult<DynamicImage> {
    crate::ingest::heif::decode_heif(raw)
}

#[cfg(not(feature = "heif"))]
fn decode_heif_source(_raw: &[u8]) -> IngestResult<DynamicImage> {
    log::warn!("event=image_decode module=ingest status=skipped reason=heif_feature_disabled");
    Err(IngestError::UnsupportedFormat(
        "heic/heif (crate built without the `heif` feature)".to_string(),
    ))
}

fn encode_jpeg(decoded: &DynamicImage) -> IngestResult<Vec<u8>> {
    // JPEG carries no alpha channel; flatten to RGB first.
    let rgb = decoded.to_rgb8();
    let mut cursor = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut cursor, JPEG_QUALITY);
    encoder
        .encode_image(&rgb)
        .map_err(|err| IngestError::Processing(format!("jpeg encode failed: {err}")))?;
    Ok(cursor.into_inner())
}

fn random_suffix() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(FILE_SUFFIX_LEN)
        .map(char::from)
        .collect()
}
