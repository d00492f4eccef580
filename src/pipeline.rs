//! The build driver.
//!
//! [`build`] runs one gallery from config to published descriptor:
//!
//! ```text
//! select ─► metadata phase ─► rating / captions / sort ─► reconcile
//!        ─► resize phase ─► gallery.xml ─► index.html ─► parent album
//! ```
//!
//! Every step is fail-fast: the first error is returned and nothing already
//! written is rolled back. A rerun picks up where it stopped, because
//! outputs that were completed carry their source's mtime and are skipped.
//! The only tolerated problems are exclude patterns that match nothing and
//! pictures without embedded metadata; both are logged as warnings.

use crate::album::{AlbumError, AlbumLinkResolver, AlbumUpdate, Insertion};
use crate::config::{Config, ConfigError, DownloadMode, OptionCode, SortKey};
use crate::descriptor::{self, DescriptorError, GALLERY_FILE, GALLERY_TEMPLATE};
use crate::filter::{self, FilterError, RatingSet};
use crate::gallery::{GalleryAssembler, GalleryHeader};
use crate::imaging::{Bounds, ImageBackend, Quality};
use crate::metadata::{MetadataError, MetadataReader};
use crate::naming::{DOWNLOAD_DIR, PREVIEW_DIR, THUMB_DIR};
use crate::picture::{Derivative, PictureError, PictureRegistry, ResizePlan};
use crate::reconcile::{self, ReconcileError};
use crate::select::{self, SelectError, SelectRules};
use crate::settings::Settings;
use crate::staleness;
use crate::workers::PoolConfig;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Download archive path inside the gallery directory.
pub const ARCHIVE: &str = "d/photos.zip";
const DOWNLOAD_HTACCESS: &str = "download-htaccess";
const INDEX_PAGE: &str = "index.html";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Select(#[from] SelectError),
    #[error(transparent)]
    Filter(#[from] FilterError),
    #[error(transparent)]
    Picture(#[from] PictureError),
    #[error(transparent)]
    Metadata(#[from] MetadataError),
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error(transparent)]
    Album(#[from] AlbumError),
    #[error(transparent)]
    Reconcile(#[from] ReconcileError),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> BuildError + '_ {
    move |source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Everything a build needs besides the gallery config.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Base output directory; the gallery goes to `base/<dir>`.
    pub base: PathBuf,
    /// Directory holding `index.html`, templates and `download-htaccess`.
    pub assets: PathBuf,
    /// Remove the whole gallery directory first.
    pub force: bool,
    pub settings: Settings,
    pub pool: PoolConfig,
}

/// Image and metadata implementations for a run.
#[derive(Clone)]
pub struct Backends {
    pub image: Arc<dyn ImageBackend>,
    pub metadata: Arc<dyn MetadataReader>,
}

/// Album link outcome for the report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlbumReport {
    pub outcome: AlbumUpdate,
    pub path: PathBuf,
}

/// Summary of one build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    pub dest_dir: PathBuf,
    /// Files matched by the selection rules.
    pub selected: usize,
    /// Pictures dropped by the rating filter.
    pub filtered_out: usize,
    /// Pictures whose title came from a `caption` entry.
    pub captioned: usize,
    /// Pictures whose derivatives were (re)written.
    pub written: usize,
    /// Pictures whose derivatives were already current.
    pub skipped: usize,
    /// Outputs of previous runs removed because their source is gone.
    pub removed: Vec<String>,
    /// Photos in the written gallery descriptor.
    pub photos: usize,
    pub album: Option<AlbumReport>,
}

/// Target sizes for this gallery, with config overrides applied.
fn derivatives(config: &Config, settings: &Settings) -> Result<ResizePlan, ConfigError> {
    let thumb = config
        .thumb_size()?
        .map(Bounds::square)
        .unwrap_or(settings.sizes.thumb);
    let image = if config.has(OptionCode::Large) {
        settings.sizes.large
    } else {
        settings.sizes.image
    };
    Ok(ResizePlan {
        image: Derivative {
            bounds: image,
            quality: Quality::new(settings.quality.full),
        },
        preview: Derivative {
            bounds: settings.sizes.preview,
            quality: Quality::new(settings.quality.preview),
        },
        thumb: Derivative {
            bounds: thumb,
            quality: Quality::new(settings.quality.thumb),
        },
        download: config.download_mode(),
    })
}

fn remove_tree(path: &Path) -> Result<(), BuildError> {
    match fs::remove_dir_all(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(io_error(path)(e)),
        _ => Ok(()),
    }
}

/// Build the gallery described by `config` from sources under `source_root`.
pub fn build(
    options: &BuildOptions,
    config: &Config,
    source_root: &Path,
    backends: &Backends,
) -> Result<BuildReport, BuildError> {
    let dir = config.dir()?;
    let dest_dir = options.base.join(dir);
    tracing::info!(dest = %dest_dir.display(), "Building gallery");
    let mut report = BuildReport {
        dest_dir: dest_dir.clone(),
        ..Default::default()
    };

    // Selection and per-gallery options
    let files = select::select(source_root, &SelectRules::from_config(config))?;
    let ratings = RatingSet::from_config(config)?;
    let captions = config.captions();
    let sort = config.sort_key();
    let plan = derivatives(config, &options.settings)?;
    report.selected = files.len();

    // Metadata phase
    let mut registry = PictureRegistry::new(&files, source_root, &dest_dir)?;
    let reader = backends.metadata.as_ref();
    if ratings.is_some() || sort == Some(SortKey::Date) || !captions.is_empty() {
        tracing::info!(count = registry.len(), reader = reader.name(), "Reading metadata");
        registry.load_metadata(Arc::clone(&backends.metadata), &options.pool)?;
    }

    if let Some(ratings) = &ratings {
        report.filtered_out = filter::filter_by_rating(&mut registry, ratings, reader)?;
    }
    if !captions.is_empty() {
        report.captioned = filter::apply_captions(&registry, &captions);
    }
    if let Some(key) = sort {
        filter::sort_pictures(&mut registry, key, reader)?;
    }
    tracing::debug!(
        pictures = ?registry.pictures().iter().map(|p| p.source.as_str()).collect::<Vec<_>>(),
        "Final list"
    );

    // Clear out what is no longer wanted
    if options.force {
        remove_tree(&dest_dir)?;
    } else {
        let keep: BTreeSet<String> = registry
            .pictures()
            .iter()
            .map(|p| p.names.image.clone())
            .collect();
        report.removed = reconcile::remove_unwanted(&dest_dir, &keep)?;
    }

    let download_dir = dest_dir.join(DOWNLOAD_DIR);
    staleness::make_dirs(&[
        dest_dir.clone(),
        dest_dir.join(THUMB_DIR),
        dest_dir.join(PREVIEW_DIR),
    ])
    .map_err(io_error(&dest_dir))?;
    if plan.download == DownloadMode::None {
        remove_tree(&download_dir)?;
    } else {
        staleness::make_dirs(&[&download_dir]).map_err(io_error(&download_dir))?;
        let htaccess = download_dir.join(".htaccess");
        staleness::copy_if_exists(&options.assets.join(DOWNLOAD_HTACCESS), &htaccess)
            .map_err(io_error(&htaccess))?;
    }

    // Resize phase
    tracing::info!(
        count = registry.len(),
        backend = backends.image.name(),
        "Resizing"
    );
    let counts = registry.resize(
        Arc::clone(&backends.image),
        Arc::clone(&backends.metadata),
        plan,
        &options.pool,
    )?;
    report.written = counts.written;
    report.skipped = counts.skipped;

    // Gallery descriptor
    let downloads = plan.download != DownloadMode::None;
    let header = GalleryHeader {
        title: config.title().to_string(),
        back: config.up().map(str::to_string),
        archive: (downloads && !config.has(OptionCode::NoZip)).then(|| ARCHIVE.to_string()),
        thumb: plan.thumb.bounds,
        preview: plan.preview.bounds,
        image: plan.image.bounds,
        downloads,
    };
    let mut assembler =
        GalleryAssembler::from_template(&options.assets.join(GALLERY_TEMPLATE), &header)?;
    for picture in registry.pictures() {
        assembler.add(picture, reader)?;
    }
    let gallery = assembler.finish();
    report.photos = gallery.photos.len();
    descriptor::write(&dest_dir.join(GALLERY_FILE), &gallery)?;

    let index = dest_dir.join(INDEX_PAGE);
    staleness::copy_if_stale(&options.assets.join(INDEX_PAGE), &index).map_err(io_error(&index))?;

    // Parent album
    if let Some(back) = config.up() {
        let resolver = AlbumLinkResolver {
            base: options.base.clone(),
            assets: options.assets.clone(),
            insertion: if config.has(OptionCode::Reverse) {
                Insertion::Back
            } else {
                Insertion::Front
            },
        };
        let (outcome, path) = resolver.update(dir, back, config.title())?;
        report.album = Some(AlbumReport { outcome, path });
    }

    Ok(report)
}
