//! Picture metadata: tag lookup, conversion, and the reader seam.
//!
//! Metadata comes from embedded EXIF, IPTC and XMP blocks. A
//! [`MetadataReader`] turns a file into a flat [`Tags`] map keyed by
//! `Family.Group.Name` (e.g. `Exif.Photo.FNumber`). [`Metadata::from_tags`]
//! then resolves the fields the gallery uses, each from an ordered list of
//! fallback tags: the first non-empty value wins.
//!
//! ## Field resolution
//!
//! | Field | Tags (in priority order) |
//! |---|---|
//! | title | `Iptc.Application2.ObjectName`, `Iptc.Application2.Headline` |
//! | caption | `Iptc.Application2.Caption` |
//! | orientation | `Exif.Image.Orientation` |
//! | timestamp | `Exif.Photo.DateTimeDigitized`, `Exif.Photo.DateTimeOriginal`, `Exif.Image.DateTime`, then file mtime |
//! | rating | `Xmp.xmp.Rating` |
//! | iso | `Exif.Photo.ISOSpeedRatings` |
//! | exposure | `Exif.Photo.ExposureTime` (kept as `n/d`) |
//! | fstop, focal length | `Exif.Photo.FNumber`, `Exif.Photo.FocalLength` (rational → decimal) |
//!
//! ## Missing metadata
//!
//! A picture with no embedded metadata is not an error: the reader returns
//! [`MetadataError::Absent`], a warning is logged, and the picture proceeds
//! with empty fields and its file mtime as timestamp. Failing to read the
//! file at all is fatal.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

/// Tag names understood by [`Metadata::from_tags`].
pub mod tags {
    pub const OBJECT_NAME: &str = "Iptc.Application2.ObjectName";
    pub const HEADLINE: &str = "Iptc.Application2.Headline";
    pub const CAPTION: &str = "Iptc.Application2.Caption";
    pub const EXPOSURE_TIME: &str = "Exif.Photo.ExposureTime";
    pub const ISO: &str = "Exif.Photo.ISOSpeedRatings";
    pub const FNUMBER: &str = "Exif.Photo.FNumber";
    pub const FOCAL_LENGTH: &str = "Exif.Photo.FocalLength";
    pub const ORIENTATION: &str = "Exif.Image.Orientation";
    pub const DATE_DIGITIZED: &str = "Exif.Photo.DateTimeDigitized";
    pub const DATE_ORIGINAL: &str = "Exif.Photo.DateTimeOriginal";
    pub const DATE_TIME: &str = "Exif.Image.DateTime";
    pub const RATING: &str = "Xmp.xmp.Rating";
}

/// Display format for photo dates, e.g. `03:04 PM Monday, 02 January 2006`.
pub const DATE_FORMAT: &str = "%I:%M %p %A, %d %B %Y";

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// No embedded metadata. Non-fatal.
    #[error("{}: no metadata ({reason})", .path.display())]
    Absent { path: PathBuf, reason: String },
}

/// Flat tag map produced by a [`MetadataReader`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(HashMap<String, String>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value, ignoring blank strings.
    pub fn insert(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        let trimmed = value.trim();
        if !trimmed.is_empty() {
            self.0.insert(key.to_string(), trimmed.to_string());
        }
    }

    /// First non-empty value among `keys`, in order.
    pub fn get(&self, keys: &[&str]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .map(|v| v.as_str())
            .find(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl<const N: usize> From<[(&str, &str); N]> for Tags {
    fn from(pairs: [(&str, &str); N]) -> Self {
        let mut tags = Tags::new();
        for (k, v) in pairs {
            tags.insert(k, v);
        }
        tags
    }
}

/// Source of embedded metadata.
///
/// Shared across worker threads, so implementations must be `Send + Sync`.
pub trait MetadataReader: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Read all known tags from `path`.
    fn read(&self, path: &Path) -> Result<Tags, MetadataError>;
}

/// Resolved metadata for one picture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Metadata {
    pub title: Option<String>,
    pub caption: Option<String>,
    pub orientation: Option<String>,
    pub timestamp: DateTime<Local>,
    pub rating: Option<String>,
    pub iso: Option<String>,
    pub exposure: Option<String>,
    pub fstop: Option<String>,
    pub focal_length: Option<String>,
}

impl Metadata {
    /// Metadata for a picture without embedded tags.
    pub fn empty(mtime: SystemTime) -> Self {
        Self {
            title: None,
            caption: None,
            orientation: None,
            timestamp: DateTime::<Local>::from(mtime),
            rating: None,
            iso: None,
            exposure: None,
            fstop: None,
            focal_length: None,
        }
    }

    /// Resolve fields from a tag map; `mtime` backs the timestamp.
    pub fn from_tags(found: &Tags, mtime: SystemTime) -> Self {
        let owned = |keys: &[&str]| found.get(keys).map(str::to_string);

        let timestamp = match found.get(&[
            tags::DATE_DIGITIZED,
            tags::DATE_ORIGINAL,
            tags::DATE_TIME,
        ]) {
            Some(raw) => parse_timestamp(raw).unwrap_or_else(|| {
                tracing::warn!(date = raw, "Unparseable date, using file time");
                DateTime::<Local>::from(mtime)
            }),
            None => DateTime::<Local>::from(mtime),
        };

        Self {
            title: owned(&[tags::OBJECT_NAME, tags::HEADLINE]),
            caption: owned(&[tags::CAPTION]),
            orientation: owned(&[tags::ORIENTATION]),
            timestamp,
            rating: owned(&[tags::RATING]),
            iso: owned(&[tags::ISO]),
            exposure: owned(&[tags::EXPOSURE_TIME]),
            fstop: found.get(&[tags::FNUMBER]).map(rational_to_decimal),
            focal_length: found.get(&[tags::FOCAL_LENGTH]).map(rational_to_decimal),
        }
    }

    /// Read and resolve metadata, downgrading [`MetadataError::Absent`] to
    /// empty metadata with a warning.
    pub fn load(
        reader: &dyn MetadataReader,
        path: &Path,
        mtime: SystemTime,
    ) -> Result<Self, MetadataError> {
        match reader.read(path) {
            Ok(tags) => Ok(Self::from_tags(&tags, mtime)),
            Err(err @ MetadataError::Absent { .. }) => {
                tracing::warn!("{err}");
                Ok(Self::empty(mtime))
            }
            Err(err) => Err(err),
        }
    }

    /// Timestamp formatted for the gallery descriptor.
    pub fn date_string(&self) -> String {
        self.timestamp.format(DATE_FORMAT).to_string()
    }
}

/// Convert an EXIF rational (`"28/10"`) into a short decimal (`"2.8"`).
///
/// Rounds to two decimals and trims trailing zeros and a trailing dot.
/// Values that are not a well-formed rational are returned unchanged.
pub fn rational_to_decimal(raw: &str) -> String {
    let Some((num, den)) = raw.split_once('/') else {
        return raw.to_string();
    };
    let (Ok(num), Ok(den)) = (num.trim().parse::<f64>(), den.trim().parse::<f64>()) else {
        return raw.to_string();
    };
    if den == 0.0 {
        return raw.to_string();
    }
    let formatted = format!("{:.2}", num / den);
    formatted
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

/// Parse an EXIF date (`2006:01:02 15:04:05`, or with dashes) as local time.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    let raw = raw.trim().trim_end_matches('\0');
    ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .and_then(|naive| Local.from_local_datetime(&naive).earliest())
}
