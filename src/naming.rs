//! Output file naming.
//!
//! Every selected source gets four outputs inside the gallery directory,
//! all sharing one flattened name:
//!
//! | Output | Path |
//! |---|---|
//! | full-size image | `<name>` |
//! | preview | `p/<name>` |
//! | thumbnail | `t/<name>` |
//! | download | `d/<name>` |
//!
//! Sources may come from subdirectories, so the name is built by joining
//! the source's path components with `_`:
//! - `dsc001.jpg` → `dsc001.jpg`
//! - `day1/dsc001.jpg` → `day1_dsc001.jpg`
//! - `2024/day1/dsc001.jpg` → `2024_day1_dsc001.jpg`
//!
//! Two sources in different directories therefore never collide.

pub const THUMB_DIR: &str = "t";
pub const PREVIEW_DIR: &str = "p";
pub const DOWNLOAD_DIR: &str = "d";

/// Flatten a relative source path into a single file name.
pub fn flatten(source: &str) -> String {
    source
        .split(['/', '\\'])
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("_")
}

/// Destination-relative output paths for one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputNames {
    /// Flattened name; also the full-size image path.
    pub image: String,
    pub preview: String,
    pub thumb: String,
    pub download: String,
}

impl OutputNames {
    pub fn for_source(source: &str) -> Self {
        Self::from_flat(flatten(source))
    }

    /// Output paths for an already-flattened name.
    pub fn from_flat(name: String) -> Self {
        Self {
            preview: format!("{PREVIEW_DIR}/{name}"),
            thumb: format!("{THUMB_DIR}/{name}"),
            download: format!("{DOWNLOAD_DIR}/{name}"),
            image: name,
        }
    }

    /// All four paths, full-size image first.
    pub fn all(&self) -> [&str; 4] {
        [&self.image, &self.thumb, &self.preview, &self.download]
    }
}
