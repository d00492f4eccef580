//! # photoweb
//!
//! An incremental builder for web photo galleries. A small keyword file
//! (`.web`) next to the photos says which files to publish, in what order
//! and under which title; photoweb writes sized derivatives, an optional
//! download set and an XML descriptor that a browser-side viewer renders.
//!
//! # Pipeline
//!
//! ```text
//! .web ─► select ─► metadata ─► filter / caption / sort ─► reconcile
//!      ─► resize (full, preview, thumbnail, download) ─► gallery.xml
//!      ─► index.html ─► parent album.xml
//! ```
//!
//! Everything runs in one pass, driven by [`pipeline::build`]. The two
//! expensive phases (reading embedded metadata and resizing) fan out over a
//! bounded [`workers::WorkerPool`]; everything else is sequential.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `.web` keyword file parser and typed accessors |
//! | [`settings`] | Optional TOML build settings: sizes, qualities, parallelism |
//! | [`select`] | Include / exclude / after / before file selection with brace expansion |
//! | [`naming`] | Flattened output names and the `t/`, `p/`, `d/` layout |
//! | [`picture`] | Per-picture state, the metadata and resize phases |
//! | [`filter`] | Rating filter, caption overrides, sorting |
//! | [`reconcile`] | Removal of outputs whose source is no longer selected |
//! | [`descriptor`] | `gallery.xml` / `album.xml` types and XML IO |
//! | [`gallery`] | Gallery descriptor assembly |
//! | [`album`] | Linking a gallery into its parent album |
//! | [`metadata`] | Embedded metadata model and the reader trait |
//! | [`imaging`] | Image backend trait, `image`-crate backend, EXIF/IPTC readers |
//! | [`staleness`] | mtime-equality checks and stamped copies |
//! | [`workers`] | Bounded worker pool with a watchdog |
//! | [`output`] | End-of-run summary formatting |
//!
//! # Design Decisions
//!
//! ## mtime Equality as the Cache
//!
//! Every output is stamped with its source's modification time, and an
//! output is current exactly when the two match to the second. There is no
//! manifest or hash cache to get out of sync with the files on disk:
//! deleting an output, touching a source or restoring an old copy all
//! trigger a rebuild of just that picture. See [`staleness`].
//!
//! ## Fail Fast, Resume by Rerunning
//!
//! The first error of any kind stops the build. Work already finished stays
//! on disk and is stamped, so the next run only redoes what is missing.
//! Missing embedded metadata and unmatched excludes are the only tolerated
//! problems.
//!
//! ## The Filesystem is the Index
//!
//! The thumbnail directory lists what a previous run published. Reconciling
//! against it removes pictures dropped from the selection without any state
//! file. Likewise, each gallery's entry in its parent album is keyed by the
//! gallery directory, so renaming a gallery's title updates the entry in
//! place.

pub mod album;
pub mod config;
pub mod descriptor;
pub mod filter;
pub mod gallery;
pub mod imaging;
pub mod metadata;
pub mod naming;
pub mod output;
pub mod picture;
pub mod pipeline;
pub mod reconcile;
pub mod select;
pub mod settings;
pub mod staleness;
pub mod workers;

#[cfg(test)]
pub(crate) mod test_helpers;
