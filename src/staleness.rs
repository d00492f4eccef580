//! Modification-time staleness checks and the file-copy primitives built on them.
//!
//! # Equality, not freshness
//!
//! A generated file is up to date iff it exists and its modification time
//! is *equal* (to the second) to its source's. Every write stamps the output
//! with the source's mtime, so a rebuild with untouched sources finds every
//! output current and does nothing. Touching, replacing or restoring an
//! older copy of a source changes its mtime, and the outputs follow.
//!
//! Comparing at whole seconds keeps the check stable across filesystems that
//! store coarser timestamps than the one the source lives on.

use std::fs;
use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Modification time of `path`.
pub fn mtime(path: &Path) -> io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

fn whole_seconds(t: SystemTime) -> i128 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i128,
        Err(e) => -(e.duration().as_secs_f64().ceil() as i128),
    }
}

/// Whether two timestamps match at second granularity.
pub fn same_second(a: SystemTime, b: SystemTime) -> bool {
    whole_seconds(a) == whole_seconds(b)
}

/// Whether `dest` needs regenerating from a source last modified at `source_mtime`.
///
/// A missing or unreadable destination is stale.
pub fn is_stale_at(source_mtime: SystemTime, dest: &Path) -> bool {
    match mtime(dest) {
        Ok(dest_mtime) => !same_second(source_mtime, dest_mtime),
        Err(_) => true,
    }
}

/// Whether `dest` needs regenerating from `source`.
///
/// Errors only when the source itself cannot be stat'ed.
pub fn is_stale(source: &Path, dest: &Path) -> io::Result<bool> {
    Ok(is_stale_at(mtime(source)?, dest))
}

/// Set the modification time of `path`.
pub fn stamp(path: &Path, mtime: SystemTime) -> io::Result<()> {
    let file = fs::OpenOptions::new().write(true).open(path)?;
    file.set_modified(mtime)
}

/// Copy `source` to `dest` when `dest` is stale, then stamp it.
///
/// Returns whether a copy happened.
pub fn copy_if_stale(source: &Path, dest: &Path) -> io::Result<bool> {
    let source_mtime = mtime(source)?;
    if !is_stale_at(source_mtime, dest) {
        return Ok(false);
    }
    fs::copy(source, dest)?;
    stamp(dest, source_mtime)?;
    Ok(true)
}

/// Like [`copy_if_stale`], but a missing `source` is not an error.
pub fn copy_if_exists(source: &Path, dest: &Path) -> io::Result<bool> {
    match fs::metadata(source) {
        Ok(_) => copy_if_stale(source, dest),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Create each directory and its parents.
pub fn make_dirs<P: AsRef<Path>>(dirs: &[P]) -> io::Result<()> {
    for dir in dirs {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

/// Remove a file, treating "not found" as success.
pub fn remove_if_present(path: &Path) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}
