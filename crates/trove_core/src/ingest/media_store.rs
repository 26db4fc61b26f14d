//! Managed media directory for file-bearing entity kinds.
//!
//! # Responsibility
//! - Own the storage root and its per-kind subdirectories.
//! - Write and remove managed files by relative path.
//!
//! # Invariants
//! - Entities only ever persist paths relative to the root, so the root
//!   stays relocatable.
//! - Removing an already-absent file is not an error.

use log::info;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Subdirectory for normalized images.
pub const IMAGES_DIR: &str = "images";
/// Subdirectory for generic files.
pub const FILES_DIR: &str = "files";

/// Filesystem-backed media storage rooted at one relocatable directory.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes normalized image bytes and returns the relative path.
    pub fn write_image(&self, file_name: &str, bytes: &[u8]) -> io::Result<String> {
        self.write_under(IMAGES_DIR, file_name, bytes)
    }

    /// Writes generic file bytes and returns the relative path.
    pub fn write_file(&self, file_name: &str, bytes: &[u8]) -> io::Result<String> {
        self.write_under(FILES_DIR, file_name, bytes)
    }

    /// Removes one managed file by its stored relative path.
    ///
    /// Returns `false` when the file was already gone.
    pub fn remove(&self, relative: &str) -> io::Result<bool> {
        let path = self.resolve(relative)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                info!("event=media_remove module=ingest status=ok path={relative}");
                Ok(true)
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Absolute path of one stored relative path.
    pub fn resolve(&self, relative: &str) -> io::Result<PathBuf> {
        let trimmed = relative.trim_start_matches(['/', '\\']);
        let candidate = Path::new(trimmed);
        // Stored paths are always plain `<dir>/<name>`; anything that
        // climbs out of the root is rejected.
        let escapes = candidate
            .components()
            .any(|component| !matches!(component, Component::Normal(_)));
        if escapes {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid managed path `{relative}`"),
            ));
        }
        Ok(self.root.join(candidate))
    }

    fn write_under(&self, dir: &str, file_name: &str, bytes: &[u8]) -> io::Result<String> {
        let relative = format!("{dir}/{file_name}");
        let path = self.resolve(&relative)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        info!(
            "event=media_write module=ingest status=ok path={relative} bytes={}",
            bytes.len()
        );
        Ok(relative)
    }
}
