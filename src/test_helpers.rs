//! Shared test utilities for the photoweb test suite.
//!
//! Fixture builders for source trees with controlled modification times,
//! synthetic JPEGs, and directory listing helpers.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = TempDir::new().unwrap();
//! write_file(tmp.path(), "2024/a.jpg", b"x", at(1_000));
//! assert_eq!(list_dir(tmp.path()), vec!["2024"]);
//! ```

use image::{ImageEncoder, RgbImage};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

// =========================================================================
// Time
// =========================================================================

/// A fixed point in time, `secs` after the Unix epoch.
pub fn at(secs: u64) -> SystemTime {
    SystemTime::UNIX_EPOCH + Duration::from_secs(secs)
}

// =========================================================================
// Fixture setup
// =========================================================================

/// Write `contents` to `dir/rel` (creating parents) and set its mtime.
pub fn write_file(dir: &Path, rel: &str, contents: &[u8], mtime: SystemTime) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, contents).unwrap();
    crate::staleness::stamp(&path, mtime).unwrap();
    path
}

/// Write several placeholder source files, all with the same mtime.
pub fn write_sources(dir: &Path, names: &[&str], mtime: SystemTime) {
    for name in names {
        write_file(dir, name, name.as_bytes(), mtime);
    }
}

/// Create a small valid JPEG file with the given dimensions.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

// =========================================================================
// Inspection
// =========================================================================

/// Sorted entry names of a directory. Empty if it does not exist.
pub fn list_dir(dir: &Path) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

/// Sorted regular-file names of a directory (subdirectories and dotfiles excluded).
pub fn list_files(dir: &Path) -> Vec<String> {
    list_dir(dir)
        .into_iter()
        .filter(|n| !n.starts_with('.') && dir.join(n).is_file())
        .collect()
}
