//! Pictures and the two worker-pool phases that process them.
//!
//! A [`Picture`] is one selected source file plus its planned outputs. The
//! [`PictureRegistry`] owns every picture of a run and drives two phases,
//! each on a fresh [`WorkerPool`]:
//!
//! 1. **Metadata** ([`PictureRegistry::load_metadata`]): reads embedded
//!    metadata, only when a later step needs it before resizing (rating
//!    filter, captions, date sort).
//! 2. **Resize** ([`PictureRegistry::resize`]): writes the full-size image,
//!    preview and thumbnail when the full-size output is stale, and keeps
//!    the download copy or symlink in sync.
//!
//! ## Skipped pictures
//!
//! When the full-size output is current, nothing is decoded and none of the
//! three derivatives is rewritten. The picture's resolution is then read
//! from the source header with [`ImageBackend::identify`], so the gallery
//! always reports dimensions without persisting anything between runs.
//! Reported dimensions are the source's native resolution, before any
//! orientation correction.
//!
//! Each picture owns a disjoint set of output files and its lazily filled
//! fields are written by exactly one task, so workers never contend.

use crate::config::DownloadMode;
use crate::imaging::{
    BackendError, Bounds, Dimensions, ImageBackend, Quality, Rotation,
};
use crate::metadata::{Metadata, MetadataError, MetadataReader};
use crate::naming::OutputNames;
use crate::staleness;
use crate::workers::{PoolConfig, WorkerPool};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PictureError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error("{file}: {cause}")]
    Backend {
        file: String,
        #[source]
        cause: BackendError,
    },
    #[error("Cannot start workers: {0}")]
    Pool(#[source] io::Error),
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> PictureError + '_ {
    move |source| PictureError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Target box and quality for one derivative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Derivative {
    pub bounds: Bounds,
    pub quality: Quality,
}

/// What the resize phase produces for every picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizePlan {
    pub image: Derivative,
    pub preview: Derivative,
    pub thumb: Derivative,
    pub download: DownloadMode,
}

/// Result of resizing one picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeOutcome {
    Written,
    Skipped,
}

/// Per-phase totals from [`PictureRegistry::resize`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResizeCounts {
    pub written: usize,
    pub skipped: usize,
}

/// One selected source photo and its planned outputs.
#[derive(Debug)]
pub struct Picture {
    /// Source path relative to the source root, as selected.
    pub source: String,
    /// Source path including the root.
    pub source_path: PathBuf,
    /// Gallery output directory.
    pub dest_dir: PathBuf,
    pub names: OutputNames,
    /// Source modification time; every output is stamped with it.
    pub mtime: SystemTime,
    metadata: OnceLock<Metadata>,
    title_override: OnceLock<String>,
    dimensions: OnceLock<Dimensions>,
}

impl Picture {
    pub fn new(source: &str, root: &Path, dest_dir: &Path) -> Result<Self, PictureError> {
        let source_path = root.join(source);
        let mtime = staleness::mtime(&source_path).map_err(io_error(&source_path))?;
        Ok(Self {
            source: source.to_string(),
            names: OutputNames::for_source(source),
            dest_dir: dest_dir.to_path_buf(),
            source_path,
            mtime,
            metadata: OnceLock::new(),
            title_override: OnceLock::new(),
            dimensions: OnceLock::new(),
        })
    }

    /// Base file name of the source, used for name sorting.
    pub fn base_name(&self) -> &str {
        self.source.rsplit('/').next().unwrap_or(&self.source)
    }

    /// Metadata, read on first use and cached.
    pub fn metadata(&self, reader: &dyn MetadataReader) -> Result<&Metadata, MetadataError> {
        if let Some(loaded) = self.metadata.get() {
            return Ok(loaded);
        }
        let loaded = Metadata::load(reader, &self.source_path, self.mtime)?;
        Ok(self.metadata.get_or_init(|| loaded))
    }

    /// Metadata if it has been read already.
    pub fn loaded_metadata(&self) -> Option<&Metadata> {
        self.metadata.get()
    }

    /// Replace the metadata title. Only the first override sticks.
    pub fn override_title(&self, title: &str) {
        let _ = self.title_override.set(title.to_string());
    }

    /// Title: the override if set, else the metadata title.
    pub fn title(&self) -> Option<&str> {
        self.title_override
            .get()
            .map(String::as_str)
            .or_else(|| self.loaded_metadata().and_then(|m| m.title.as_deref()))
    }

    /// Display resolution, known once the resize phase has run.
    pub fn dimensions(&self) -> Option<Dimensions> {
        self.dimensions.get().copied()
    }

    fn dest(&self, rel: &str) -> PathBuf {
        self.dest_dir.join(rel)
    }

    /// Produce the derivatives if stale and sync the download entry.
    pub fn resize(
        &self,
        backend: &dyn ImageBackend,
        reader: &dyn MetadataReader,
        plan: &ResizePlan,
    ) -> Result<ResizeOutcome, PictureError> {
        let rotation = self
            .metadata(reader)?
            .orientation
            .as_deref()
            .map(Rotation::from_orientation)
            .unwrap_or_default();
        let backend_error = |cause| PictureError::Backend {
            file: self.source.clone(),
            cause,
        };

        let image_path = self.dest(&self.names.image);
        let outcome = if staleness::is_stale_at(self.mtime, &image_path) {
            let mut image = backend.open(&self.source_path).map_err(backend_error)?;
            tracing::debug!(
                source = %self.source,
                width = image.dimensions().width,
                height = image.dimensions().height,
                "Resizing"
            );
            let _ = self.dimensions.set(image.dimensions());
            if rotation != Rotation::None {
                image.rotate(rotation);
            }
            for (rel, derivative) in [
                (&self.names.image, plan.image),
                (&self.names.preview, plan.preview),
                (&self.names.thumb, plan.thumb),
            ] {
                image
                    .write(&self.dest(rel), self.mtime, derivative.bounds, derivative.quality)
                    .map_err(backend_error)?;
            }
            ResizeOutcome::Written
        } else {
            tracing::debug!(file = %self.names.image, "Skipping resize");
            let native = backend
                .identify(&self.source_path)
                .map_err(backend_error)?;
            let _ = self.dimensions.set(native);
            ResizeOutcome::Skipped
        };

        self.sync_download(plan.download)?;
        Ok(outcome)
    }

    /// Make `d/<name>` match the download mode.
    ///
    /// A static copy replaces a symlink and a symlink replaces a copy, so
    /// switching modes between runs converges.
    fn sync_download(&self, mode: DownloadMode) -> Result<(), PictureError> {
        let path = self.dest(&self.names.download);
        let existing = fs::symlink_metadata(&path).ok();
        let is_link = existing.as_ref().is_some_and(|m| m.file_type().is_symlink());

        match mode {
            DownloadMode::None => {}
            DownloadMode::Static => {
                if is_link {
                    staleness::remove_if_present(&path).map_err(io_error(&path))?;
                }
                staleness::copy_if_stale(&self.source_path, &path).map_err(io_error(&path))?;
            }
            DownloadMode::Symlink => {
                if existing.is_some() && !is_link {
                    staleness::remove_if_present(&path).map_err(io_error(&path))?;
                }
                if fs::metadata(&path).is_err() {
                    // Dangling link from a moved source
                    if is_link {
                        staleness::remove_if_present(&path).map_err(io_error(&path))?;
                    }
                    link(&self.source_path, &path).map_err(io_error(&path))?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(unix)]
fn link(target: &Path, path: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, path)
}

#[cfg(not(unix))]
fn link(target: &Path, path: &Path) -> io::Result<()> {
    staleness::copy_if_stale(target, path).map(|_| ())
}

/// All pictures of a run, in gallery order.
#[derive(Debug, Default)]
pub struct PictureRegistry {
    pictures: Vec<Arc<Picture>>,
}

impl PictureRegistry {
    /// Create one picture per selected file. A missing source is fatal.
    pub fn new(files: &[String], root: &Path, dest_dir: &Path) -> Result<Self, PictureError> {
        let pictures = files
            .iter()
            .map(|f| Picture::new(f, root, dest_dir).map(Arc::new))
            .collect::<Result<_, _>>()?;
        Ok(Self { pictures })
    }

    pub fn pictures(&self) -> &[Arc<Picture>] {
        &self.pictures
    }

    pub fn len(&self) -> usize {
        self.pictures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pictures.is_empty()
    }

    /// Keep only pictures matching `keep`. Returns how many were dropped.
    pub fn retain(&mut self, mut keep: impl FnMut(&Picture) -> bool) -> usize {
        let before = self.pictures.len();
        self.pictures.retain(|p| keep(p.as_ref()));
        before - self.pictures.len()
    }

    /// Stable sort.
    pub fn sort_by_key<K: Ord>(&mut self, mut key: impl FnMut(&Picture) -> K) {
        self.pictures.sort_by_key(|p| key(p.as_ref()));
    }

    /// Read metadata for every picture in parallel.
    pub fn load_metadata(
        &self,
        reader: Arc<dyn MetadataReader>,
        pool: &PoolConfig,
    ) -> Result<(), PictureError> {
        run_phase("Reading", &self.pictures, pool, move |picture| {
            picture.metadata(reader.as_ref()).map(|_| ())?;
            Ok(())
        })
    }

    /// Resize every picture in parallel.
    pub fn resize(
        &self,
        backend: Arc<dyn ImageBackend>,
        reader: Arc<dyn MetadataReader>,
        plan: ResizePlan,
        pool: &PoolConfig,
    ) -> Result<ResizeCounts, PictureError> {
        let written = Arc::new(AtomicUsize::new(0));
        let skipped = Arc::new(AtomicUsize::new(0));
        {
            let written = Arc::clone(&written);
            let skipped = Arc::clone(&skipped);
            run_phase("Resizing", &self.pictures, pool, move |picture| {
                let counter = match picture.resize(backend.as_ref(), reader.as_ref(), &plan)? {
                    ResizeOutcome::Written => &written,
                    ResizeOutcome::Skipped => &skipped,
                };
                counter.fetch_add(1, Ordering::Relaxed);
                Ok(())
            })?;
        }
        Ok(ResizeCounts {
            written: written.load(Ordering::Relaxed),
            skipped: skipped.load(Ordering::Relaxed),
        })
    }
}

/// Run `task` once per picture on a fresh pool, stopping at the first error.
fn run_phase<F>(
    label: &str,
    pictures: &[Arc<Picture>],
    pool: &PoolConfig,
    task: F,
) -> Result<(), PictureError>
where
    F: Fn(&Picture) -> Result<(), PictureError> + Send + Sync + 'static,
{
    let task = Arc::new(task);
    let mut workers = WorkerPool::new(label, pool).map_err(PictureError::Pool)?;
    for picture in pictures {
        let picture = Arc::clone(picture);
        let task = Arc::clone(&task);
        if workers.submit(move || task(&picture)).is_err() {
            break;
        }
    }
    workers.wait()
}
