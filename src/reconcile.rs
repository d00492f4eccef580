//! Removal of outputs whose source is no longer selected.
//!
//! The thumbnail directory is the index of what a previous run produced:
//! every regular file in `t/` names one picture. Names not in the current
//! selection lose all four outputs (full-size, `t/`, `p/`, `d/`).
//!
//! Runs before the resize phase, so no resize can race a deletion. An
//! output that is already gone is fine; any other removal failure stops
//! the build with the offending path.

use crate::naming::{OutputNames, THUMB_DIR};
use crate::staleness;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ReconcileError + '_ {
    move |source| ReconcileError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Remove outputs under `dest_dir` for flattened names not in `keep`.
///
/// A missing `t/` means nothing was built yet, and a missing counterpart
/// in `p/`, `d/` or the gallery root is skipped. Returns the removed
/// names, sorted.
pub fn remove_unwanted(
    dest_dir: &Path,
    keep: &BTreeSet<String>,
) -> Result<Vec<String>, ReconcileError> {
    let thumbs = dest_dir.join(THUMB_DIR);
    let entries = match fs::read_dir(&thumbs) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(&thumbs)(e)),
    };

    let mut unwanted = BTreeSet::new();
    for entry in entries {
        let entry = entry.map_err(io_error(&thumbs))?;
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        let name = entry.file_name().to_string_lossy().to_string();
        if !is_dir && !keep.contains(&name) {
            unwanted.insert(name);
        }
    }

    for name in &unwanted {
        tracing::debug!(file = %name, "Removing unwanted picture");
        let outputs = OutputNames::from_flat(name.clone());
        for rel in outputs.all() {
            let path = dest_dir.join(rel);
            staleness::remove_if_present(&path).map_err(io_error(&path))?;
        }
    }
    Ok(unwanted.into_iter().collect())
}
