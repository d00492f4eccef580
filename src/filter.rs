//! Rating filter, caption overrides and ordering.
//!
//! These run between the metadata and resize phases and only reshape the
//! picture list; nothing here touches the output directory.
//!
//! ## Ratings
//!
//! `rating: r` keeps pictures rated `r` or higher. `select: a b ...` keeps
//! exactly the listed ratings. Using both is an error. Unrated pictures
//! never match, so `rating: 0` keeps every *rated* picture.

use crate::config::{Config, OptionCode, SortKey};
use crate::metadata::MetadataReader;
use crate::picture::{PictureError, PictureRegistry};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

const MAX_RATING: u8 = 5;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum FilterError {
    #[error("Cannot use both 'rating' and 'select'")]
    Conflict,
    #[error("Bad rating '{0}'")]
    BadRating(String),
}

/// Accepted rating values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingSet {
    accepted: BTreeSet<String>,
}

impl RatingSet {
    /// Ratings from `threshold` up to 5.
    pub fn scale(threshold: &str) -> Result<Self, FilterError> {
        let bad = || FilterError::BadRating(threshold.to_string());
        let min: u8 = threshold.trim().parse().map_err(|_| bad())?;
        if min > MAX_RATING {
            return Err(bad());
        }
        Ok(Self {
            accepted: (min..=MAX_RATING).map(|r| r.to_string()).collect(),
        })
    }

    /// Exactly the whitespace-separated ratings in `list`.
    pub fn enumeration(list: &str) -> Self {
        Self {
            accepted: list.split_whitespace().map(str::to_string).collect(),
        }
    }

    /// The rating set configured by `rating` or `select`, if any.
    pub fn from_config(config: &Config) -> Result<Option<Self>, FilterError> {
        match (
            config.first(OptionCode::Rating),
            config.first(OptionCode::Select),
        ) {
            (Some(_), Some(_)) => Err(FilterError::Conflict),
            (Some(threshold), None) => Self::scale(threshold).map(Some),
            (None, Some(list)) => Ok(Some(Self::enumeration(list))),
            (None, None) => Ok(None),
        }
    }

    pub fn accepts(&self, rating: Option<&str>) -> bool {
        rating.is_some_and(|r| self.accepted.contains(r))
    }
}

/// Drop pictures whose rating is not accepted. Returns how many were dropped.
pub fn filter_by_rating(
    registry: &mut PictureRegistry,
    ratings: &RatingSet,
    reader: &dyn MetadataReader,
) -> Result<usize, PictureError> {
    // Load first so the predicate below is infallible
    for picture in registry.pictures() {
        picture.metadata(reader)?;
    }
    Ok(registry.retain(|picture| {
        let rating = picture.loaded_metadata().and_then(|m| m.rating.as_deref());
        let keep = ratings.accepts(rating);
        if !keep {
            tracing::debug!(
                source = %picture.source,
                rating = rating.unwrap_or(""),
                "Skipping due to rating"
            );
        }
        keep
    }))
}

/// Override titles from `file caption` config entries, keyed by source path.
///
/// Returns how many pictures matched.
pub fn apply_captions(registry: &PictureRegistry, captions: &BTreeMap<String, String>) -> usize {
    let mut applied = 0;
    for picture in registry.pictures() {
        if let Some(caption) = captions.get(&picture.source) {
            tracing::debug!(source = %picture.source, title = %caption, "Setting title");
            picture.override_title(caption);
            applied += 1;
        }
    }
    applied
}

/// Stable sort by base file name or by timestamp.
pub fn sort_pictures(
    registry: &mut PictureRegistry,
    key: SortKey,
    reader: &dyn MetadataReader,
) -> Result<(), PictureError> {
    match key {
        SortKey::Name => registry.sort_by_key(|p| p.base_name().to_string()),
        SortKey::Date => {
            for picture in registry.pictures() {
                picture.metadata(reader)?;
            }
            registry.sort_by_key(|p| p.loaded_metadata().map(|m| m.timestamp));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::tests::MockMetadataReader;
    use crate::metadata::{Tags, tags};
    use crate::test_helpers::{at, write_sources};
    use std::path::Path;
    use tempfile::TempDir;

    fn registry(root: &Path, names: &[&str]) -> PictureRegistry {
        let files: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        PictureRegistry::new(&files, root, &root.join("out")).unwrap()
    }

    fn sources(registry: &PictureRegistry) -> Vec<&str> {
        registry.pictures().iter().map(|p| p.source.as_str()).collect()
    }

    fn parse(text: &str) -> Config {
        Config::parse(text, ".web").unwrap()
    }

    // =========================================================================
    // RatingSet
    // =========================================================================

    #[test]
    fn scale_includes_threshold_and_above() {
        let set = RatingSet::scale("3").unwrap();
        assert!(!set.accepts(Some("2")));
        assert!(set.accepts(Some("3")));
        assert!(set.accepts(Some("5")));
        assert!(!set.accepts(None));
    }

    #[test]
    fn scale_zero_accepts_all_rated() {
        let set = RatingSet::scale("0").unwrap();
        for r in ["0", "1", "2", "3", "4", "5"] {
            assert!(set.accepts(Some(r)));
        }
        assert!(!set.accepts(None));
    }

    #[test]
    fn scale_is_monotone() {
        for r in 0..5u8 {
            let wide = RatingSet::scale(&r.to_string()).unwrap();
            let narrow = RatingSet::scale(&(r + 1).to_string()).unwrap();
            assert!(narrow.accepted.is_subset(&wide.accepted));
        }
    }

    #[test]
    fn scale_rejects_bad_threshold() {
        assert_eq!(
            RatingSet::scale("6"),
            Err(FilterError::BadRating("6".into()))
        );
        assert!(RatingSet::scale("x").is_err());
    }

    #[test]
    fn enumeration_is_verbatim() {
        let set = RatingSet::enumeration("1 5");
        assert!(set.accepts(Some("1")));
        assert!(!set.accepts(Some("3")));
        assert!(set.accepts(Some("5")));
    }

    #[test]
    fn from_config_modes() {
        assert_eq!(RatingSet::from_config(&parse("")).unwrap(), None);
        assert_eq!(
            RatingSet::from_config(&parse("rating: 4\n")).unwrap(),
            Some(RatingSet::scale("4").unwrap())
        );
        assert_eq!(
            RatingSet::from_config(&parse("select: 2 3\n")).unwrap(),
            Some(RatingSet::enumeration("2 3"))
        );
        assert_eq!(
            RatingSet::from_config(&parse("rating: 1\nselect: 2\n")),
            Err(FilterError::Conflict)
        );
    }

    // =========================================================================
    // Filtering
    // =========================================================================

    #[test]
    fn rating_scenario() {
        let tmp = TempDir::new().unwrap();
        write_sources(tmp.path(), &["img1.jpg", "img2.jpg"], at(1_000));
        let reader = MockMetadataReader::new()
            .rated("img1.jpg", "3")
            .rated("img2.jpg", "5");

        let mut scale = registry(tmp.path(), &["img1.jpg", "img2.jpg"]);
        let dropped =
            filter_by_rating(&mut scale, &RatingSet::scale("3").unwrap(), &reader).unwrap();
        assert_eq!(dropped, 0);
        assert_eq!(sources(&scale), vec!["img1.jpg", "img2.jpg"]);

        let mut select = registry(tmp.path(), &["img1.jpg", "img2.jpg"]);
        let dropped =
            filter_by_rating(&mut select, &RatingSet::enumeration("5"), &reader).unwrap();
        assert_eq!(dropped, 1);
        assert_eq!(sources(&select), vec!["img2.jpg"]);
    }

    #[test]
    fn unrated_pictures_dropped() {
        let tmp = TempDir::new().unwrap();
        write_sources(tmp.path(), &["a.jpg", "b.jpg"], at(1_000));
        let reader = MockMetadataReader::new().rated("a.jpg", "1");
        let mut reg = registry(tmp.path(), &["a.jpg", "b.jpg"]);
        filter_by_rating(&mut reg, &RatingSet::scale("0").unwrap(), &reader).unwrap();
        assert_eq!(sources(&reg), vec!["a.jpg"]);
    }

    // =========================================================================
    // Captions
    // =========================================================================

    #[test]
    fn captions_override_by_source_path() {
        let tmp = TempDir::new().unwrap();
        write_sources(tmp.path(), &["a.jpg", "sub/b.jpg"], at(1_000));
        let reg = registry(tmp.path(), &["a.jpg", "sub/b.jpg"]);
        let captions = BTreeMap::from([
            ("sub/b.jpg".to_string(), "Harbour".to_string()),
            ("missing.jpg".to_string(), "Nothing".to_string()),
        ]);
        assert_eq!(apply_captions(&reg, &captions), 1);
        assert_eq!(reg.pictures()[1].title(), Some("Harbour"));
        assert_eq!(reg.pictures()[0].title(), None);
    }

    // =========================================================================
    // Sorting
    // =========================================================================

    #[test]
    fn name_sort_uses_base_name_bytewise() {
        let tmp = TempDir::new().unwrap();
        write_sources(tmp.path(), &["z/a.jpg", "B.jpg", "b.jpg"], at(1_000));
        let mut reg = registry(tmp.path(), &["b.jpg", "z/a.jpg", "B.jpg"]);
        sort_pictures(&mut reg, SortKey::Name, &MockMetadataReader::new()).unwrap();
        assert_eq!(sources(&reg), vec!["B.jpg", "z/a.jpg", "b.jpg"]);
    }

    #[test]
    fn date_sort_is_stable() {
        let tmp = TempDir::new().unwrap();
        write_sources(tmp.path(), &["a.jpg", "b.jpg", "c.jpg", "d.jpg"], at(1_000));
        let date = |d: &str| Tags::from([(tags::DATE_ORIGINAL, d)]);
        let reader = MockMetadataReader::new()
            .with("a.jpg", date("2024:05:02 10:00:00"))
            .with("b.jpg", date("2024:05:01 10:00:00"))
            .with("c.jpg", date("2024:05:02 10:00:00"))
            .with("d.jpg", date("2024:05:01 10:00:00"));
        let mut reg = registry(tmp.path(), &["a.jpg", "b.jpg", "c.jpg", "d.jpg"]);
        sort_pictures(&mut reg, SortKey::Date, &reader).unwrap();
        assert_eq!(sources(&reg), vec!["b.jpg", "d.jpg", "a.jpg", "c.jpg"]);
    }
}
