//! Image processing and embedded metadata in pure Rust, no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` (header only) |
//! | **Resize** | Lanczos3 or integer area sampling, never upscaled |
//! | **Encode** | JPEG with quality, other formats by extension |
//! | **EXIF** | `kamadak-exif` |
//! | **IPTC** | custom parser (JPEG APP13 + TIFF IFD) |
//! | **XMP rating** | packet scan |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing a derivative
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Embedded**: [`MetadataReader`](crate::metadata::MetadataReader)
//!   implementations ([`FullReader`], [`ExifReader`])

pub mod backend;
mod calculations;
mod embedded;
pub(crate) mod iptc_parser;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, SourceImage};
pub use calculations::fit_within;
pub use embedded::{ExifReader, FullReader};
pub use params::{Bounds, Quality, Rotation};
pub use rust_backend::{Resampler, RustBackend};
