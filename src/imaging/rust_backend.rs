//! Pure Rust image processing backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::image_dimensions` (header only) |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Rotate | `DynamicImage::rotate90/180/270` |
//! | Resize (lanczos) | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Resize (fast) | `DynamicImage::thumbnail_exact` (area sampling) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder::new_with_quality` |
//! | Encode → other | format inferred from the destination extension |

use super::backend::{BackendError, Dimensions, ImageBackend, SourceImage};
use super::calculations::fit_within;
use super::params::{Bounds, Quality, Rotation};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::path::Path;
use std::time::SystemTime;

/// Resampling strategy used when shrinking derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resampler {
    /// Lanczos3 windowed sinc. Best quality, slowest.
    #[default]
    Lanczos3,
    /// Integer area sampling. Several times faster, slightly softer.
    Fast,
}

/// Backend built on the `image` crate.
pub struct RustBackend {
    resampler: Resampler,
}

impl RustBackend {
    pub fn new(resampler: Resampler) -> Self {
        Self { resampler }
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new(Resampler::default())
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Save a DynamicImage to the given path, inferring format from extension.
fn save_image(img: &DynamicImage, path: &Path, quality: Quality) -> Result<(), BackendError> {
    let format = ImageFormat::from_path(path).map_err(|e| {
        BackendError::ProcessingFailed(format!("Unsupported output format {}: {e}", path.display()))
    })?;

    match format {
        ImageFormat::Jpeg => save_jpeg(img, path, quality),
        other => img.save_with_format(path, other).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to encode {}: {e}", path.display()))
        }),
    }
}

fn save_jpeg(img: &DynamicImage, path: &Path, quality: Quality) -> Result<(), BackendError> {
    let file = std::fs::File::create(path).map_err(BackendError::Io)?;
    let writer = std::io::BufWriter::new(file);
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(writer, quality.value() as u8);
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    rgb.write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))
}

struct RustImage {
    image: DynamicImage,
    resampler: Resampler,
}

impl SourceImage for RustImage {
    fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.image.width(),
            height: self.image.height(),
        }
    }

    fn rotate(&mut self, rotation: Rotation) {
        // `image` rotates clockwise
        self.image = match rotation {
            Rotation::None => return,
            Rotation::Ccw90 => self.image.rotate270(),
            Rotation::Ccw180 => self.image.rotate180(),
            Rotation::Ccw270 => self.image.rotate90(),
        };
    }

    fn write(
        &self,
        dest: &Path,
        mtime: SystemTime,
        bounds: Bounds,
        quality: Quality,
    ) -> Result<Dimensions, BackendError> {
        let (width, height) = fit_within(self.dimensions().as_tuple(), bounds);

        if (width, height) == self.dimensions().as_tuple() {
            save_image(&self.image, dest, quality)?;
        } else {
            let resized = match self.resampler {
                Resampler::Lanczos3 => self.image.resize_exact(width, height, FilterType::Lanczos3),
                Resampler::Fast => self.image.thumbnail_exact(width, height),
            };
            save_image(&resized, dest, quality)?;
        }

        crate::staleness::stamp(dest, mtime)?;
        Ok(Dimensions { width, height })
    }
}

impl ImageBackend for RustBackend {
    fn name(&self) -> &'static str {
        match self.resampler {
            Resampler::Lanczos3 => "lanczos",
            Resampler::Fast => "fast",
        }
    }

    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!(
                "Failed to read dimensions of {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Dimensions { width, height })
    }

    fn open(&self, path: &Path) -> Result<Box<dyn SourceImage>, BackendError> {
        Ok(Box::new(RustImage {
            image: load_image(path)?,
            resampler: self.resampler,
        }))
    }
}
