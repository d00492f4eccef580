//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait has two operations: a cheap header-only
//! `identify`, and `open`, which decodes the pixels into a [`SourceImage`].
//! A source image can be rotated in place and written out any number of
//! times at different bounds and qualities.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), with a Lanczos3 and a
//! fast resampler variant. Tests use the recording `MockBackend` below.

use super::params::{Bounds, Quality, Rotation};
use std::path::Path;
use std::time::SystemTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// A decoded source picture ready to be written as derivatives.
pub trait SourceImage: Send {
    /// Current dimensions, after any rotation applied so far.
    fn dimensions(&self) -> Dimensions;

    /// Rotate counter-clockwise in place.
    fn rotate(&mut self, rotation: Rotation);

    /// Scale to fit `bounds` (never upscaling), encode to `dest` and set
    /// its modification time to `mtime`. Returns the written dimensions.
    fn write(
        &self,
        dest: &Path,
        mtime: SystemTime,
        bounds: Bounds,
        quality: Quality,
    ) -> Result<Dimensions, BackendError>;
}

/// Trait for image processing backends.
///
/// Shared across worker threads, so implementations must be `Send + Sync`.
pub trait ImageBackend: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Read image dimensions without decoding pixel data.
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError>;

    /// Decode an image for rotation and derivative writing.
    fn open(&self, path: &Path) -> Result<Box<dyn SourceImage>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::fit_within;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Mock backend that records operations instead of touching pixels.
    ///
    /// `write` still creates a small placeholder file and stamps its mtime,
    /// so staleness checks behave exactly as with a real backend.
    /// Uses Mutex (not RefCell) so it is Sync and works across pool workers.
    #[derive(Default)]
    pub struct MockBackend {
        /// Dimensions by source file name. Unknown names get `default_dims`.
        pub dimensions: Mutex<HashMap<String, Dimensions>>,
        pub default_dims: Option<Dimensions>,
        /// File name whose `open` fails with a processing error.
        pub fail_on: Mutex<Option<String>>,
        pub operations: Arc<Mutex<Vec<RecordedOp>>>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Identify(String),
        Open(String),
        Rotate {
            source: String,
            degrees: u32,
        },
        Write {
            source: String,
            dest: String,
            width: u32,
            height: u32,
            quality: u32,
        },
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::with_default(Dimensions {
                width: 3000,
                height: 2000,
            })
        }

        pub fn with_default(dims: Dimensions) -> Self {
            Self {
                default_dims: Some(dims),
                ..Self::default()
            }
        }

        pub fn set_dimensions(&self, name: &str, dims: Dimensions) {
            self.dimensions
                .lock()
                .unwrap()
                .insert(name.to_string(), dims);
        }

        pub fn fail_on(&self, name: &str) {
            *self.fail_on.lock().unwrap() = Some(name.to_string());
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        pub fn clear_operations(&self) {
            self.operations.lock().unwrap().clear();
        }

        pub fn write_count(&self) -> usize {
            self.get_operations()
                .iter()
                .filter(|op| matches!(op, RecordedOp::Write { .. }))
                .count()
        }

        fn lookup(&self, path: &Path) -> Result<Dimensions, BackendError> {
            let name = file_name(path);
            self.dimensions
                .lock()
                .unwrap()
                .get(&name)
                .copied()
                .or(self.default_dims)
                .ok_or_else(|| BackendError::ProcessingFailed("No mock dimensions".to_string()))
        }
    }

    struct MockImage {
        source: String,
        dims: Dimensions,
        operations: Arc<Mutex<Vec<RecordedOp>>>,
    }

    impl SourceImage for MockImage {
        fn dimensions(&self) -> Dimensions {
            self.dims
        }

        fn rotate(&mut self, rotation: Rotation) {
            if rotation.transposes() {
                self.dims = Dimensions {
                    width: self.dims.height,
                    height: self.dims.width,
                };
            }
            self.operations.lock().unwrap().push(RecordedOp::Rotate {
                source: self.source.clone(),
                degrees: rotation.degrees(),
            });
        }

        fn write(
            &self,
            dest: &Path,
            mtime: SystemTime,
            bounds: Bounds,
            quality: Quality,
        ) -> Result<Dimensions, BackendError> {
            let (width, height) = fit_within(self.dims.as_tuple(), bounds);
            std::fs::write(dest, format!("{}:{width}x{height}", self.source))?;
            crate::staleness::stamp(dest, mtime)?;
            self.operations.lock().unwrap().push(RecordedOp::Write {
                source: self.source.clone(),
                dest: dest.to_string_lossy().to_string(),
                width,
                height,
                quality: quality.value(),
            });
            Ok(Dimensions { width, height })
        }
    }

    impl ImageBackend for MockBackend {
        fn name(&self) -> &'static str {
            "mock"
        }

        fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Identify(file_name(path)));
            self.lookup(path)
        }

        fn open(&self, path: &Path) -> Result<Box<dyn SourceImage>, BackendError> {
            let name = file_name(path);
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Open(name.clone()));
            if self.fail_on.lock().unwrap().as_deref() == Some(name.as_str()) {
                return Err(BackendError::ProcessingFailed(format!(
                    "Failed to decode {}",
                    path.display()
                )));
            }
            Ok(Box::new(MockImage {
                dims: self.lookup(path)?,
                source: name,
                operations: Arc::clone(&self.operations),
            }))
        }
    }

    #[test]
    fn mock_records_identify() {
        let backend = MockBackend::with_default(Dimensions {
            width: 800,
            height: 600,
        });

        let result = backend.identify(Path::new("/test/image.jpg")).unwrap();
        assert_eq!(result.width, 800);
        assert_eq!(result.height, 600);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Identify(p) if p == "image.jpg"));
    }

    #[test]
    fn mock_rotate_swaps_dimensions() {
        let backend = MockBackend::with_default(Dimensions {
            width: 800,
            height: 600,
        });
        let mut img = backend.open(Path::new("/a.jpg")).unwrap();
        img.rotate(Rotation::Ccw90);
        assert_eq!(
            img.dimensions(),
            Dimensions {
                width: 600,
                height: 800
            }
        );
    }

    #[test]
    fn mock_write_stamps_and_records() {
        let tmp = tempfile::TempDir::new().unwrap();
        let backend = MockBackend::new();
        let img = backend.open(Path::new("/src/a.jpg")).unwrap();
        let dest = tmp.path().join("a.jpg");
        let mtime = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_600_000_000);

        let dims = img
            .write(&dest, mtime, Bounds::new(1500, 1200), Quality::new(90))
            .unwrap();

        assert_eq!(dims.as_tuple(), (1500, 1000));
        assert_eq!(std::fs::metadata(&dest).unwrap().modified().unwrap(), mtime);
        assert!(matches!(
            backend.get_operations().last(),
            Some(RecordedOp::Write {
                width: 1500,
                height: 1000,
                quality: 90,
                ..
            })
        ));
    }

    #[test]
    fn mock_fail_on_errors() {
        let backend = MockBackend::new();
        backend.fail_on("bad.jpg");
        assert!(backend.open(Path::new("/x/bad.jpg")).is_err());
        assert!(backend.open(Path::new("/x/good.jpg")).is_ok());
    }
}
