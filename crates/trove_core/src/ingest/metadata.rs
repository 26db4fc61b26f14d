//! Embedded capture metadata extraction.
//!
//! # Responsibility
//! - Parse EXIF tags from source image bytes (JPEG, PNG, TIFF, WebP and
//!   HEIF containers).
//! - Resolve capture date and GPS coordinates with defined fallbacks.
//!
//! # Invariants
//! - Metadata is read from the ORIGINAL upload bytes, never from the
//!   normalized output, so transcoding cannot lose tags.
//! - Absent or unreadable metadata is not an error; both fields simply
//!   come back empty.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::io::Cursor;

/// GPS coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsCoordinates {
    /// Positive north, negative south.
    pub lat: f64,
    /// Positive east, negative west.
    pub lng: f64,
}

/// Capture metadata resolved from embedded tags.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CaptureMetadata {
    /// From the original-capture tag, else the creation tag. `None` when
    /// neither is present or parseable; callers fall back to wall clock.
    pub captured_at: Option<DateTime<Utc>>,
    pub gps: Option<GpsCoordinates>,
}

/// Extracts capture metadata from source image bytes.
///
/// Unreadable containers and missing tags yield an empty result.
pub fn extract_capture_metadata(data: &[u8]) -> CaptureMetadata {
    let mut reader = exif::Reader::new();
    reader.continue_on_error(true);
    let mut cursor = Cursor::new(data);

    let parsed = match reader
        .read_from_container(&mut cursor)
        .or_else(|err| err.distill_partial_result(|_| {}))
    {
        Ok(parsed) => parsed,
        Err(_) => return CaptureMetadata::default(),
    };

    CaptureMetadata {
        captured_at: resolve_capture_datetime(&parsed),
        gps: extract_gps(&parsed),
    }
}

/// Resolves the capture date tag chain: original capture time first,
/// then creation time. Each tag may hold colon-delimited EXIF text or a
/// numeric epoch-seconds value.
fn resolve_capture_datetime(parsed: &exif::Exif) -> Option<DateTime<Utc>> {
    for tag in [exif::Tag::DateTimeOriginal, exif::Tag::DateTimeDigitized] {
        if let Some(field) = parsed.get_field(tag, exif::In::PRIMARY) {
            if let Some(datetime) = parse_capture_value(&field.value) {
                return Some(datetime);
            }
        }
    }
    None
}

fn parse_capture_value(value: &exif::Value) -> Option<DateTime<Utc>> {
    match value {
        exif::Value::Ascii(lines) => {
            let first = lines.first()?;
            let text = std::str::from_utf8(first).ok()?;
            parse_datetime_text(text)
        }
        other => {
            let epoch_seconds = other.get_uint(0)?;
            DateTime::from_timestamp(i64::from(epoch_seconds), 0)
        }
    }
}

/// Parses EXIF datetime text (`YYYY:MM:DD HH:MM:SS`). The date portion
/// uses colons and is rewritten to hyphen-delimited ISO form first; a
/// date without a time component resolves to midnight.
pub(crate) fn parse_datetime_text(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (date_part, time_part) = match trimmed.split_once(' ') {
        Some((date, time)) => (date, Some(time.trim())),
        None => (trimmed, None),
    };
    let iso_date = date_part.replace(':', "-");

    match time_part {
        Some(time) => {
            let naive =
                NaiveDateTime::parse_from_str(&format!("{iso_date} {time}"), "%Y-%m-%d %H:%M:%S")
                    .ok()?;
            Some(Utc.from_utc_datetime(&naive))
        }
        None => {
            let date = NaiveDate::parse_from_str(&iso_date, "%Y-%m-%d").ok()?;
            Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
        }
    }
}

fn extract_gps(parsed: &exif::Exif) -> Option<GpsCoordinates> {
    let lat = extract_gps_coordinate(parsed, exif::Tag::GPSLatitude, exif::Tag::GPSLatitudeRef)?;
    let lng = extract_gps_coordinate(parsed, exif::Tag::GPSLongitude, exif::Tag::GPSLongitudeRef)?;
    // Garbage rationals outside WGS84 bounds count as "no position".
    if !lat.is_finite() || !lng.is_finite() || lat.abs() > 90.0 || lng.abs() > 180.0 {
        return None;
    }
    Some(GpsCoordinates { lat, lng })
}

/// Converts one degrees/minutes/seconds rational triple plus its N/S/E/W
/// reference into signed decimal degrees.
fn extract_gps_coordinate(
    parsed: &exif::Exif,
    coord_tag: exif::Tag,
    ref_tag: exif::Tag,
) -> Option<f64> {
    let coord_field = parsed.get_field(coord_tag, exif::In::PRIMARY)?;
    let ref_field = parsed.get_field(ref_tag, exif::In::PRIMARY)?;

    let rationals = match &coord_field.value {
        exif::Value::Rational(values) if !values.is_empty() => values,
        _ => return None,
    };

    let mut decimal = 0.0;
    for (rational, divisor) in rationals.iter().zip([1.0, 60.0, 3600.0]) {
        decimal += rational.to_f64() / divisor;
    }

    let reference = ref_field.display_value().to_string();
    if reference == "S" || reference == "W" {
        decimal = -decimal;
    }
    Some(decimal)
}

#[cfg(test)]
mod tests {
    use super::parse_datetime_text;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_colon_delimited_exif_datetime() {
        let parsed = parse_datetime_text("2023:05:17 10:11:12").unwrap();
        assert_eq!(
            (parsed.year(), parsed.month(), parsed.day()),
            (2023, 5, 17)
        );
        assert_eq!(
            (parsed.hour(), parsed.minute(), parsed.second()),
            (10, 11, 12)
        );
    }

    #[test]
    fn parses_date_only_value_to_midnight() {
        let parsed = parse_datetime_text("2021:12:31").unwrap();
        assert_eq!(
            (parsed.year(), parsed.month(), parsed.day()),
            (2021, 12, 31)
        );
        assert_eq!((parsed.hour(), parsed.minute()), (0, 0));
    }

    #[test]
    fn rejects_garbage_text() {
        assert!(parse_datetime_text("not a date").is_none());
        assert!(parse_datetime_text("").is_none());
        assert!(parse_datetime_text("2023:13:40 99:99:99").is_none());
    }
}
