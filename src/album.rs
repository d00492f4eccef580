//! Linking a gallery into its parent album.
//!
//! A gallery configured with `up: ../index.html` lives below an album page.
//! The back-link may climb several levels (`../../index.html`), so the album
//! directory is found by resolving the back-link against the gallery's
//! output directory, and the forward link is built from as many trailing
//! components of the gallery's `dir` as the back-link climbs:
//!
//! ```text
//! dir  = 2024/trip/album      back = ../../index.html
//! album directory = <base>/2024
//! forward link    = trip/album/index.html
//! ```
//!
//! The album's `album.xml` gets one entry per gallery, keyed by the gallery
//! `dir`. A missing album is created from the album template and reported
//! with a warning so its title can be filled in by hand.

use crate::descriptor::{self, ALBUM_FILE, Album, AlbumPage, DescriptorError};
use crate::staleness;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlbumError {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// What happened to the album descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlbumUpdate {
    /// Entry already present with the same link and title.
    Unchanged,
    /// Entry present; link or title rewritten.
    Updated,
    /// Entry added to an existing album.
    Added,
    /// Album descriptor did not exist and was created with the entry.
    Created,
}

/// Where a new entry goes in the album list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Insertion {
    #[default]
    Front,
    Back,
}

/// Number of levels a back-link climbs.
fn levels(back: &str) -> usize {
    back.matches("../").count()
}

/// Path from the album directory to the gallery's index page.
pub fn forward_link(dir: &str, back: &str) -> String {
    let parts: Vec<&str> = dir
        .split('/')
        .filter(|p| !p.is_empty() && *p != ".")
        .collect();
    let keep = levels(back).min(parts.len());
    let mut link: Vec<&str> = parts[parts.len() - keep..].to_vec();
    link.push("index.html");
    link.join("/")
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Directory holding the album the back-link points at.
pub fn album_dir(base: &Path, dir: &str, back: &str) -> PathBuf {
    let target = normalize(&base.join(dir).join(back));
    target.parent().map(Path::to_path_buf).unwrap_or(target)
}

/// Keeps parent album descriptors pointing at their galleries.
#[derive(Debug, Clone)]
pub struct AlbumLinkResolver {
    pub base: PathBuf,
    /// Directory holding `album-template.xml` and `index.html`.
    pub assets: PathBuf,
    pub insertion: Insertion,
}

impl AlbumLinkResolver {
    /// Add or refresh the entry for gallery `dir` in the album above it.
    ///
    /// Returns the outcome and the album descriptor path.
    pub fn update(
        &self,
        dir: &str,
        back: &str,
        title: &str,
    ) -> Result<(AlbumUpdate, PathBuf), AlbumError> {
        let album_dir = album_dir(&self.base, dir, back);
        let album_file = album_dir.join(ALBUM_FILE);
        let link = forward_link(dir, back);

        let (mut page, created) = match descriptor::read::<AlbumPage>(&album_file) {
            Ok(page) => (page, false),
            Err(e) if e.is_not_found() => {
                staleness::make_dirs(&[&album_dir]).map_err(|source| AlbumError::Io {
                    path: album_dir.clone(),
                    source,
                })?;
                tracing::warn!(
                    album = %album_file.display(),
                    "New album, please set title etc."
                );
                let template = self.assets.join(descriptor::ALBUM_TEMPLATE);
                (descriptor::read_template::<AlbumPage>(&template)?, true)
            }
            Err(e) => return Err(e.into()),
        };

        // The album page itself is refreshed whatever happens to the entry
        let index = album_dir.join("index.html");
        staleness::copy_if_exists(&self.assets.join("index.html"), &index)
            .map_err(|source| AlbumError::Io { path: index, source })?;

        let outcome = match page
            .albums
            .iter_mut()
            .find(|a| a.id.as_deref() == Some(dir))
        {
            Some(entry) if entry.link == link && entry.title.as_deref() == Some(title) => {
                tracing::debug!(dir, album = %album_file.display(), "Gallery already in album");
                return Ok((AlbumUpdate::Unchanged, album_file));
            }
            Some(entry) => {
                entry.link = link;
                entry.title = Some(title.to_string());
                AlbumUpdate::Updated
            }
            None => {
                let entry = Album {
                    link,
                    title: Some(title.to_string()),
                    id: Some(dir.to_string()),
                };
                match self.insertion {
                    Insertion::Front => page.albums.insert(0, entry),
                    Insertion::Back => page.albums.push(entry),
                }
                if created {
                    AlbumUpdate::Created
                } else {
                    AlbumUpdate::Added
                }
            }
        };

        tracing::debug!(dir, album = %album_file.display(), ?outcome, "Album updated");
        descriptor::write(&album_file, &page)?;
        Ok((outcome, album_file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{at, write_file};
    use tempfile::TempDir;

    fn resolver(tmp: &TempDir, insertion: Insertion) -> AlbumLinkResolver {
        AlbumLinkResolver {
            base: tmp.path().join("base"),
            assets: tmp.path().join("assets"),
            insertion,
        }
    }

    fn read_page(path: &Path) -> AlbumPage {
        descriptor::read(path).unwrap()
    }

    // =========================================================================
    // Link computation
    // =========================================================================

    #[test]
    fn forward_link_one_level() {
        assert_eq!(forward_link("2024/trip", "../index.html"), "trip/index.html");
    }

    #[test]
    fn forward_link_two_levels() {
        assert_eq!(
            forward_link("2024/trip/album", "../../index.html"),
            "trip/album/index.html"
        );
    }

    #[test]
    fn forward_link_more_levels_than_dir() {
        assert_eq!(forward_link("trip", "../../index.html"), "trip/index.html");
    }

    #[test]
    fn forward_link_ignores_redundant_separators() {
        assert_eq!(forward_link("2024//trip/", "../index.html"), "trip/index.html");
    }

    #[test]
    fn album_dir_strips_climbed_levels() {
        let base = Path::new("/base");
        assert_eq!(
            album_dir(base, "2024/trip/album", "../../index.html"),
            PathBuf::from("/base/2024")
        );
        assert_eq!(
            album_dir(base, "2024/trip", "../index.html"),
            PathBuf::from("/base/2024")
        );
    }

    // =========================================================================
    // Album updates
    // =========================================================================

    #[test]
    fn creates_album_from_template() {
        let tmp = TempDir::new().unwrap();
        write_file(
            tmp.path(),
            "assets/album-template.xml",
            b"<albumpage><copyright>(c) me</copyright></albumpage>",
            at(1),
        );
        write_file(tmp.path(), "assets/index.html", b"<html/>", at(50));

        let (outcome, path) = resolver(&tmp, Insertion::Front)
            .update("2024/trip", "../index.html", "Trip")
            .unwrap();

        assert_eq!(outcome, AlbumUpdate::Created);
        assert_eq!(path, tmp.path().join("base/2024/album.xml"));
        let page = read_page(&path);
        assert_eq!(page.copyright.as_deref(), Some("(c) me"));
        assert_eq!(
            page.albums,
            vec![Album {
                link: "trip/index.html".into(),
                title: Some("Trip".into()),
                id: Some("2024/trip".into()),
            }]
        );
        let index = tmp.path().join("base/2024/index.html");
        assert_eq!(staleness::mtime(&index).unwrap(), at(50));
    }

    #[test]
    fn identical_entry_is_noop() {
        let tmp = TempDir::new().unwrap();
        let r = resolver(&tmp, Insertion::Front);
        let (_, path) = r.update("2024/trip", "../index.html", "Trip").unwrap();
        let before = std::fs::read(&path).unwrap();
        crate::staleness::stamp(&path, at(10)).unwrap();

        let (outcome, _) = r.update("2024/trip", "../index.html", "Trip").unwrap();

        assert_eq!(outcome, AlbumUpdate::Unchanged);
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(staleness::mtime(&path).unwrap(), at(10));
    }

    #[test]
    fn changed_title_updates_in_place() {
        let tmp = TempDir::new().unwrap();
        let r = resolver(&tmp, Insertion::Front);
        r.update("2024/a", "../index.html", "A").unwrap();
        r.update("2024/b", "../index.html", "B").unwrap();

        let (outcome, path) = r.update("2024/a", "../index.html", "A renamed").unwrap();

        assert_eq!(outcome, AlbumUpdate::Updated);
        let page = read_page(&path);
        let titles: Vec<_> = page.albums.iter().filter_map(|a| a.title.as_deref()).collect();
        assert_eq!(titles, vec!["B", "A renamed"]);
    }

    #[test]
    fn new_entries_go_to_front_by_default() {
        let tmp = TempDir::new().unwrap();
        let r = resolver(&tmp, Insertion::Front);
        r.update("2024/a", "../index.html", "A").unwrap();
        let (outcome, path) = r.update("2024/b", "../index.html", "B").unwrap();
        assert_eq!(outcome, AlbumUpdate::Added);
        let ids: Vec<_> = read_page(&path).albums.iter().filter_map(|a| a.id.clone()).collect();
        assert_eq!(ids, vec!["2024/b", "2024/a"]);
    }

    #[test]
    fn reverse_appends_new_entries() {
        let tmp = TempDir::new().unwrap();
        let r = resolver(&tmp, Insertion::Back);
        r.update("2024/a", "../index.html", "A").unwrap();
        let (_, path) = r.update("2024/b", "../index.html", "B").unwrap();
        let ids: Vec<_> = read_page(&path).albums.iter().filter_map(|a| a.id.clone()).collect();
        assert_eq!(ids, vec!["2024/a", "2024/b"]);
    }

    #[test]
    fn two_level_back_link_scenario() {
        let tmp = TempDir::new().unwrap();
        let r = resolver(&tmp, Insertion::Front);
        let (_, path) = r
            .update("2024/trip/album", "../../index.html", "Album")
            .unwrap();
        assert_eq!(path, tmp.path().join("base/2024/album.xml"));
        assert_eq!(read_page(&path).albums[0].link, "trip/album/index.html");
    }

    #[test]
    fn unreadable_album_is_error() {
        let tmp = TempDir::new().unwrap();
        write_file(tmp.path(), "base/2024/album.xml", b"<albumpage><album>", at(1));
        let result = resolver(&tmp, Insertion::Front).update("2024/trip", "../index.html", "T");
        assert!(matches!(result, Err(AlbumError::Descriptor(_))));
    }
}
