//! Image and file ingestion.
//!
//! # Responsibility
//! - Normalize arbitrary still-image uploads to baseline JPEG.
//! - Extract embedded capture metadata (date, GPS).
//! - Own the managed media directories and deterministic file naming.
//!
//! # Invariants
//! - A failed decode/transcode abandons that one upload; batch callers
//!   continue with the remaining uploads.
//! - Entities only ever see storage paths relative to the media root.

use std::error::Error;
use std::fmt::{Display, Formatter};

#[cfg(feature = "heif")]
mod heif;
pub mod media_store;
pub mod metadata;
pub mod pipeline;

pub type IngestResult<T> = Result<T, IngestError>;

/// Per-upload ingestion failure.
#[derive(Debug)]
pub enum IngestError {
    /// Decode, transcode or metadata parsing failed.
    Processing(String),
    /// The upload's format has no available decode path.
    UnsupportedFormat(String),
}

impl Display for IngestError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Processing(message) => write!(f, "image processing failed: {message}"),
            Self::UnsupportedFormat(format) => {
                write!(f, "unsupported image format: {format}")
            }
        }
    }
}

impl Error for IngestError {}
