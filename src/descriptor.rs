//! Gallery and album descriptors, read and written as XML.
//!
//! The browser-side viewer loads `gallery.xml` from each gallery directory
//! and `album.xml` from each album directory. Both are plain element trees
//! with one-space indentation; every field is a child element and empty
//! optional fields are left out:
//!
//! ```xml
//! <gallery>
//!  <title>Iceland</title>
//!  <back>../index.html</back>
//!  <thumb>
//!   <width>160</width>
//!   <height>160</height>
//!  </thumb>
//!  ...
//!  <photo>
//!   <name>dsc001.jpg</name>
//!   <filename>day1_dsc001.jpg</filename>
//!   <original>
//!    <width>4000</width>
//!    <height>3000</height>
//!   </original>
//!   <date>10:15 AM Tuesday, 02 July 2024</date>
//!  </photo>
//! </gallery>
//! ```
//!
//! Templates (`gallery-template.xml`, `album-template.xml`) use the same
//! types and seed fields that are not run-specific, such as `copyright`.

use quick_xml::de::DeError;
use quick_xml::se::{SeError, Serializer};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const GALLERY_FILE: &str = "gallery.xml";
pub const GALLERY_TEMPLATE: &str = "gallery-template.xml";
pub const ALBUM_FILE: &str = "album.xml";
pub const ALBUM_TEMPLATE: &str = "album-template.xml";

#[derive(Error, Debug)]
pub enum DescriptorError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: DeError,
    },
    #[error("XML serialization failed: {0}")]
    Serialize(#[from] SeError),
}

impl DescriptorError {
    /// Whether the descriptor file does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DescriptorError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }
}

/// An XML document type with a fixed root element.
pub trait Descriptor: Serialize + DeserializeOwned {
    const ROOT: &'static str;
}

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// One picture in a gallery.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Photo {
    /// Base file name of the source; not unique across subdirectories.
    pub name: String,
    /// Flattened output name, unique within the gallery.
    #[serde(default)]
    pub filename: String,
    /// Native resolution of the source, before orientation correction.
    #[serde(default)]
    pub original: Size,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iso: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exposure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aperture: Option<String>,
    /// Focal length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
    /// Download path relative to the gallery directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<String>,
}

/// `gallery.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gallery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Link back to the parent album's page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    /// Download archive path relative to the gallery directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumb: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview: Option<Size>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Size>,
    #[serde(rename = "photo", default)]
    pub photos: Vec<Photo>,
}

impl Descriptor for Gallery {
    const ROOT: &'static str = "gallery";
}

/// One child gallery listed in an album.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Album {
    /// Path from the album directory to the gallery's index page.
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Gallery directory relative to the base output directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// `album.xml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlbumPage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub back: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,
    #[serde(rename = "album", default)]
    pub albums: Vec<Album>,
}

impl Descriptor for AlbumPage {
    const ROOT: &'static str = "albumpage";
}

/// Serialize with one-space indentation.
pub fn to_xml<T: Descriptor>(value: &T) -> Result<String, DescriptorError> {
    let mut xml = String::new();
    let mut serializer = Serializer::with_root(&mut xml, Some(T::ROOT))?;
    serializer.indent(' ', 1);
    value.serialize(serializer)?;
    xml.push('\n');
    Ok(xml)
}

pub fn from_xml<T: Descriptor>(text: &str, path: &Path) -> Result<T, DescriptorError> {
    quick_xml::de::from_str(text).map_err(|source| DescriptorError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read<T: Descriptor>(path: &Path) -> Result<T, DescriptorError> {
    let text = fs::read_to_string(path).map_err(|source| DescriptorError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_xml(&text, path)
}

/// Read a template, falling back to an empty descriptor if it is absent.
pub fn read_template<T: Descriptor + Default>(path: &Path) -> Result<T, DescriptorError> {
    match read(path) {
        Err(e) if e.is_not_found() => {
            tracing::debug!(path = %path.display(), "No template, starting empty");
            Ok(T::default())
        }
        other => other,
    }
}

pub fn write<T: Descriptor>(path: &Path, value: &T) -> Result<(), DescriptorError> {
    let xml = to_xml(value)?;
    fs::write(path, xml).map_err(|source| DescriptorError::Io {
        path: path.to_path_buf(),
        source,
    })
}
