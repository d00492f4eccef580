//! Embedded metadata readers.
//!
//! | Reader | EXIF | IPTC | XMP rating |
//! |---|---|---|---|
//! | [`FullReader`] | `kamadak-exif` | [`iptc_parser`](super::iptc_parser) | packet scan |
//! | [`ExifReader`] | `kamadak-exif` | – | – |
//!
//! Both read the file once and parse every block from the same bytes.
//! Values are rendered as strings: rationals as `n/d`, integers in decimal,
//! ASCII as-is. A file with none of the blocks is reported as
//! [`MetadataError::Absent`].

use super::iptc_parser;
use crate::metadata::{MetadataError, MetadataReader, Tags, tags};
use exif::{In, Tag, Value};
use std::io::Cursor;
use std::path::Path;

/// EXIF fields mapped to their tag names.
const EXIF_FIELDS: &[(Tag, &str)] = &[
    (Tag::ExposureTime, tags::EXPOSURE_TIME),
    (Tag::PhotographicSensitivity, tags::ISO),
    (Tag::FNumber, tags::FNUMBER),
    (Tag::FocalLength, tags::FOCAL_LENGTH),
    (Tag::Orientation, tags::ORIENTATION),
    (Tag::DateTimeDigitized, tags::DATE_DIGITIZED),
    (Tag::DateTimeOriginal, tags::DATE_ORIGINAL),
    (Tag::DateTime, tags::DATE_TIME),
];

fn read_bytes(path: &Path) -> Result<Vec<u8>, MetadataError> {
    std::fs::read(path).map_err(|source| MetadataError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Render the first element of an EXIF value as a string.
fn value_string(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).trim().to_string()),
        Value::Short(v) => v.first().map(|n| n.to_string()),
        Value::Long(v) => v.first().map(|n| n.to_string()),
        Value::Byte(v) => v.first().map(|n| n.to_string()),
        Value::Rational(v) => v.first().map(|r| format!("{}/{}", r.num, r.denom)),
        Value::SRational(v) => v.first().map(|r| format!("{}/{}", r.num, r.denom)),
        _ => None,
    }
}

/// Collect EXIF tags into `out`. Returns a description of why no EXIF was
/// found, if none was.
fn collect_exif(bytes: &[u8], out: &mut Tags) -> Result<(), String> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .map_err(|e| e.to_string())?;

    for (tag, key) in EXIF_FIELDS {
        if let Some(field) = exif.get_field(*tag, In::PRIMARY)
            && let Some(value) = value_string(&field.value)
        {
            out.insert(key, value);
        }
    }
    Ok(())
}

/// Find `xmp:Rating` in an XMP packet, either as attribute or element.
fn xmp_rating(bytes: &[u8]) -> Option<String> {
    const KEY: &[u8] = b"xmp:Rating";
    let mut pos = 0;
    while let Some(offset) = find(&bytes[pos..], KEY) {
        let rest = &bytes[pos + offset + KEY.len()..];
        let value = match rest.first() {
            Some(b'=') => rest.get(1..).and_then(|r| {
                let quote = *r.first()?;
                let inner = r.get(1..)?;
                let end = inner.iter().position(|b| *b == quote)?;
                Some(&inner[..end])
            }),
            Some(b'>') => rest.get(1..).and_then(|r| {
                let end = r.iter().position(|b| *b == b'<')?;
                Some(&r[..end])
            }),
            _ => None,
        };
        if let Some(raw) = value {
            let text = String::from_utf8_lossy(raw).trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
        pos += offset + KEY.len();
    }
    None
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// EXIF, IPTC and XMP rating.
#[derive(Debug, Default)]
pub struct FullReader;

impl MetadataReader for FullReader {
    fn name(&self) -> &'static str {
        "full"
    }

    fn read(&self, path: &Path) -> Result<Tags, MetadataError> {
        let bytes = read_bytes(path)?;
        let mut found = Tags::new();

        let exif_missing = collect_exif(&bytes, &mut found).err();

        let iptc = iptc_parser::read_iptc(&bytes);
        if let Some(v) = iptc.object_name {
            found.insert(tags::OBJECT_NAME, v);
        }
        if let Some(v) = iptc.headline {
            found.insert(tags::HEADLINE, v);
        }
        if let Some(v) = iptc.caption {
            found.insert(tags::CAPTION, v);
        }

        if let Some(rating) = xmp_rating(&bytes) {
            found.insert(tags::RATING, rating);
        }

        match exif_missing {
            Some(reason) if found.is_empty() => Err(MetadataError::Absent {
                path: path.to_path_buf(),
                reason,
            }),
            _ => Ok(found),
        }
    }
}

/// EXIF only. Faster, but titles, captions and ratings stay empty.
#[derive(Debug, Default)]
pub struct ExifReader;

impl MetadataReader for ExifReader {
    fn name(&self) -> &'static str {
        "exif"
    }

    fn read(&self, path: &Path) -> Result<Tags, MetadataError> {
        let bytes = read_bytes(path)?;
        let mut found = Tags::new();
        collect_exif(&bytes, &mut found).map_err(|reason| MetadataError::Absent {
            path: path.to_path_buf(),
            reason,
        })?;
        Ok(found)
    }
}
