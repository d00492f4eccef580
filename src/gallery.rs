//! Gallery descriptor assembly.
//!
//! The descriptor is seeded from the gallery template, given the run's
//! header fields (title, back-link, download archive, target sizes), and
//! then receives one [`Photo`] per picture in final order. Photos are added
//! only after the resize phase, when every picture's resolution is known.

use crate::descriptor::{self, DescriptorError, Gallery, Photo, Size};
use crate::imaging::Bounds;
use crate::metadata::{MetadataError, MetadataReader};
use crate::picture::Picture;
use std::path::Path;

/// Run-specific gallery fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryHeader {
    pub title: String,
    pub back: Option<String>,
    /// Archive path, set when downloads are on and zipping is not disabled.
    pub archive: Option<String>,
    pub thumb: Bounds,
    pub preview: Bounds,
    pub image: Bounds,
    /// Whether each photo gets a download link.
    pub downloads: bool,
}

fn size(bounds: Bounds) -> Size {
    Size::new(bounds.width, bounds.height)
}

/// Builds a [`Gallery`] one photo at a time.
#[derive(Debug)]
pub struct GalleryAssembler {
    gallery: Gallery,
    downloads: bool,
}

impl GalleryAssembler {
    /// Start from `template` (if it exists) and apply `header`.
    pub fn from_template(template: &Path, header: &GalleryHeader) -> Result<Self, DescriptorError> {
        let mut gallery: Gallery = descriptor::read_template(template)?;
        gallery.title = Some(header.title.clone());
        if header.back.is_some() {
            gallery.back = header.back.clone();
        }
        if header.archive.is_some() {
            gallery.download = header.archive.clone();
        }
        gallery.thumb = Some(size(header.thumb));
        gallery.preview = Some(size(header.preview));
        gallery.image = Some(size(header.image));
        gallery.photos.clear();
        Ok(Self {
            gallery,
            downloads: header.downloads,
        })
    }

    /// Append the photo record for `picture`.
    pub fn add(&mut self, picture: &Picture, reader: &dyn MetadataReader) -> Result<(), MetadataError> {
        let meta = picture.metadata(reader)?;
        let original = picture
            .dimensions()
            .map(|d| Size::new(d.width, d.height))
            .unwrap_or_default();
        self.gallery.photos.push(Photo {
            name: picture.base_name().to_string(),
            filename: picture.names.image.clone(),
            original,
            title: picture.title().map(str::to_string),
            caption: meta.caption.clone(),
            date: Some(meta.date_string()),
            iso: meta.iso.clone(),
            exposure: meta.exposure.clone(),
            aperture: meta.fstop.clone(),
            length: meta.focal_length.clone(),
            download: self.downloads.then(|| picture.names.download.clone()),
        });
        Ok(())
    }

    pub fn finish(self) -> Gallery {
        self.gallery
    }
}
