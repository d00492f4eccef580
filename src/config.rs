//! Gallery configuration file (`.web`).
//!
//! Each gallery directory carries a small line-oriented keyword file
//! describing what to publish and where:
//!
//! ```text
//! # Comment lines and blank lines are ignored
//! dir: 2024/iceland
//! title: Iceland, summer 2024
//! up: ../../index.html
//! include: *.jpg raw/{a,b}*.jpeg
//! exclude: test-*.jpg
//! after: dsc001.jpg extra/*.jpg
//! rating: 3
//! sort: date
//! caption: dsc004.jpg The harbour at dusk
//! download: static
//! thumb: 200
//! ```
//!
//! Every line is `keyword: arguments`. The argument text (left-trimmed) is
//! stored verbatim, in file order, under the keyword's [`OptionCode`].
//! Repeatable keywords accumulate one entry per line.
//!
//! ## Validation
//!
//! All problems are fatal and reported with the file name and line number:
//! a line without `:`, an unknown keyword, a repeated non-repeatable
//! keyword, too few or too many whitespace-separated arguments, or an
//! argument outside the keyword's allowed set. "Free text" keywords
//! (`title`, `caption`) have no upper limit on arguments.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".web";

/// Title used when the config has none.
pub const DEFAULT_TITLE: &str = "Photo album";

/// Include patterns used when the config has none.
pub const DEFAULT_INCLUDE: &str = "*.jpg *.jpeg";

const RATINGS: &[&str] = &["0", "1", "2", "3", "4", "5"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{file}: line {line}, {message}")]
    Syntax {
        file: String,
        line: usize,
        message: String,
    },
    #[error("{file}: missing '{keyword}' config")]
    Missing { file: String, keyword: &'static str },
    #[error("{file}: {message}")]
    Invalid { file: String, message: String },
}

/// Configuration keywords.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionCode {
    Up,
    Title,
    Dir,
    Include,
    Exclude,
    Style,
    After,
    Before,
    Rating,
    Select,
    Download,
    NoCaption,
    Sort,
    Reverse,
    Large,
    Caption,
    NoZip,
    Thumb,
}

/// Argument rules for one keyword.
struct Keyword {
    name: &'static str,
    code: OptionCode,
    min: usize,
    max: usize,
    /// May appear on several lines.
    repeatable: bool,
    /// Argument is free text; `max` is not enforced.
    free_text: bool,
    /// If non-empty, every argument must be one of these.
    allowed: &'static [&'static str],
}

const fn kw(name: &'static str, code: OptionCode, min: usize, max: usize) -> Keyword {
    Keyword {
        name,
        code,
        min,
        max,
        repeatable: false,
        free_text: false,
        allowed: &[],
    }
}

const fn repeatable(mut k: Keyword) -> Keyword {
    k.repeatable = true;
    k
}

const fn free_text(mut k: Keyword) -> Keyword {
    k.free_text = true;
    k
}

const fn allowed(mut k: Keyword, values: &'static [&'static str]) -> Keyword {
    k.allowed = values;
    k
}

const KEYWORDS: &[Keyword] = &[
    kw("up", OptionCode::Up, 1, 1),
    free_text(kw("title", OptionCode::Title, 1, 0)),
    kw("dir", OptionCode::Dir, 1, 1),
    repeatable(kw("include", OptionCode::Include, 1, 0)),
    repeatable(kw("exclude", OptionCode::Exclude, 1, 0)),
    kw("style", OptionCode::Style, 1, 1),
    repeatable(kw("after", OptionCode::After, 2, 0)),
    repeatable(kw("before", OptionCode::Before, 2, 0)),
    allowed(kw("rating", OptionCode::Rating, 1, 1), RATINGS),
    allowed(kw("select", OptionCode::Select, 1, 6), RATINGS),
    allowed(kw("download", OptionCode::Download, 0, 1), &["static", "symlink"]),
    allowed(kw("nocaption", OptionCode::NoCaption, 0, 1), &["date", "name"]),
    allowed(kw("sort", OptionCode::Sort, 1, 1), &["name", "date"]),
    kw("reverse", OptionCode::Reverse, 0, 0),
    kw("large", OptionCode::Large, 0, 0),
    repeatable(free_text(kw("caption", OptionCode::Caption, 2, 0))),
    kw("nozip", OptionCode::NoZip, 0, 0),
    kw("thumb", OptionCode::Thumb, 1, 1),
];

fn keyword(name: &str) -> Option<&'static Keyword> {
    KEYWORDS.iter().find(|k| k.name == name)
}

/// How original files are offered for download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadMode {
    #[default]
    None,
    /// Symlink in `d/` pointing at the source file.
    Symlink,
    /// Real copy in `d/`.
    Static,
}

/// Picture ordering applied after filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    /// Source base file name, byte-wise.
    Name,
    /// Metadata timestamp, oldest first.
    Date,
}

/// Parsed gallery config: option code → argument strings in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// Name used in error messages.
    pub file: String,
    options: BTreeMap<OptionCode, Vec<String>>,
}

impl Config {
    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse config text. `file` only labels error messages.
    pub fn parse(content: &str, file: &str) -> Result<Self, ConfigError> {
        let mut config = Config {
            file: file.to_string(),
            options: BTreeMap::new(),
        };
        let syntax = |line: usize, message: String| ConfigError::Syntax {
            file: file.to_string(),
            line,
            message,
        };

        for (index, raw) in content.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((name, rest)) = line.split_once(':') else {
                return Err(syntax(line_no, "illegal config (expected 'keyword: args')".into()));
            };
            let name = name.trim();
            let Some(kw) = keyword(name) else {
                return Err(syntax(line_no, format!("unknown keyword '{name}'")));
            };
            let arg = rest.trim_start();

            if !kw.repeatable && config.options.contains_key(&kw.code) {
                return Err(syntax(line_no, format!("duplicate keyword '{name}'")));
            }
            let fields: Vec<&str> = arg.split_whitespace().collect();
            if fields.len() < kw.min {
                return Err(syntax(
                    line_no,
                    format!("not enough arguments for '{name}'"),
                ));
            }
            if !kw.free_text && !kw.repeatable && fields.len() > kw.max {
                return Err(syntax(line_no, format!("too many arguments for '{name}'")));
            }
            if !kw.allowed.is_empty()
                && let Some(bad) = fields.iter().find(|f| !kw.allowed.contains(f))
            {
                return Err(syntax(
                    line_no,
                    format!("illegal argument '{bad}' for '{name}'"),
                ));
            }

            tracing::debug!(file, line = line_no, keyword = name, args = arg, "Config");
            config
                .options
                .entry(kw.code)
                .or_default()
                .push(arg.to_string());
        }

        Ok(config)
    }

    /// Whether the keyword appeared at all.
    pub fn has(&self, code: OptionCode) -> bool {
        self.options.contains_key(&code)
    }

    /// Arguments of the first occurrence.
    pub fn first(&self, code: OptionCode) -> Option<&str> {
        self.options
            .get(&code)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// Arguments of every occurrence, in file order.
    pub fn all(&self, code: OptionCode) -> &[String] {
        self.options.get(&code).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Destination directory, relative to the base output directory.
    pub fn dir(&self) -> Result<&str, ConfigError> {
        self.first(OptionCode::Dir).ok_or_else(|| ConfigError::Missing {
            file: self.file.clone(),
            keyword: "dir",
        })
    }

    pub fn title(&self) -> &str {
        self.first(OptionCode::Title).unwrap_or(DEFAULT_TITLE)
    }

    /// Back-reference to the parent album's index page.
    pub fn up(&self) -> Option<&str> {
        self.first(OptionCode::Up)
    }

    pub fn download_mode(&self) -> DownloadMode {
        match self.first(OptionCode::Download) {
            None => DownloadMode::None,
            Some("static") => DownloadMode::Static,
            Some(_) => DownloadMode::Symlink,
        }
    }

    pub fn sort_key(&self) -> Option<SortKey> {
        match self.first(OptionCode::Sort) {
            Some("name") => Some(SortKey::Name),
            Some("date") => Some(SortKey::Date),
            _ => None,
        }
    }

    /// Square thumbnail size from `thumb: N`.
    pub fn thumb_size(&self) -> Result<Option<u32>, ConfigError> {
        let Some(raw) = self.first(OptionCode::Thumb) else {
            return Ok(None);
        };
        match raw.trim().parse::<u32>() {
            Ok(n) if n > 0 => Ok(Some(n)),
            _ => Err(ConfigError::Invalid {
                file: self.file.clone(),
                message: format!("bad thumbnail size '{raw}'"),
            }),
        }
    }

    /// `file caption text` entries as (file, caption) pairs.
    ///
    /// Entries are split at the first space; later entries for the same
    /// file replace earlier ones.
    pub fn captions(&self) -> BTreeMap<String, String> {
        self.all(OptionCode::Caption)
            .iter()
            .filter_map(|entry| entry.split_once(' '))
            .map(|(file, caption)| (file.to_string(), caption.to_string()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(text: &str) -> Result<Config, ConfigError> {
        Config::parse(text, ".web")
    }

    fn syntax_message(text: &str) -> (usize, String) {
        match parse(text) {
            Err(ConfigError::Syntax { line, message, .. }) => (line, message),
            other => panic!("expected syntax error, got {other:?}"),
        }
    }

    // =========================================================================
    // Parsing
    // =========================================================================

    #[test]
    fn parses_basic_config() {
        let config = parse(
            "# gallery\n\ndir: 2024/iceland\ntitle:   Iceland in  July\nrating: 3\n",
        )
        .unwrap();
        assert_eq!(config.dir().unwrap(), "2024/iceland");
        assert_eq!(config.title(), "Iceland in  July");
        assert_eq!(config.first(OptionCode::Rating), Some("3"));
        assert!(!config.has(OptionCode::Select));
    }

    #[test]
    fn repeatable_keywords_accumulate_in_order() {
        let config = parse("include: *.jpg\ninclude: b/*.jpg c.jpg\nexclude: x.jpg\n").unwrap();
        assert_eq!(config.all(OptionCode::Include), &["*.jpg", "b/*.jpg c.jpg"]);
        assert_eq!(config.all(OptionCode::Exclude), &["x.jpg"]);
        assert!(config.all(OptionCode::After).is_empty());
    }

    #[test]
    fn crlf_and_keyword_whitespace_tolerated() {
        let config = parse("dir : photos\r\nlarge:\r\n").unwrap();
        assert_eq!(config.dir().unwrap(), "photos");
        assert!(config.has(OptionCode::Large));
    }

    #[test]
    fn flags_take_no_arguments() {
        let config = parse("reverse:\nnozip:\nlarge:\n").unwrap();
        assert!(config.has(OptionCode::Reverse));
        assert!(config.has(OptionCode::NoZip));
        let (_, msg) = syntax_message("reverse: yes\n");
        assert!(msg.contains("too many"));
    }

    // =========================================================================
    // Errors
    // =========================================================================

    #[test]
    fn missing_colon_rejected() {
        let (line, msg) = syntax_message("dir: a\njust words\n");
        assert_eq!(line, 2);
        assert!(msg.contains("illegal config"));
    }

    #[test]
    fn unknown_keyword_rejected() {
        let (line, msg) = syntax_message("colour: red\n");
        assert_eq!(line, 1);
        assert!(msg.contains("unknown keyword 'colour'"));
    }

    #[test]
    fn duplicate_keyword_rejected() {
        let (line, msg) = syntax_message("dir: a\ndir: b\n");
        assert_eq!(line, 2);
        assert!(msg.contains("duplicate"));
    }

    #[test]
    fn too_few_arguments_rejected() {
        let (_, msg) = syntax_message("after: anchor.jpg\n");
        assert!(msg.contains("not enough"));
        let (_, msg) = syntax_message("dir:\n");
        assert!(msg.contains("not enough"));
    }

    #[test]
    fn too_many_arguments_rejected() {
        let (_, msg) = syntax_message("dir: a b\n");
        assert!(msg.contains("too many"));
        let (_, msg) = syntax_message("select: 0 1 2 3 4 5 5\n");
        assert!(msg.contains("too many"));
    }

    #[test]
    fn free_text_has_no_maximum() {
        let config = parse("caption: a.jpg A long caption with many words\n").unwrap();
        assert_eq!(config.captions()["a.jpg"], "A long caption with many words");
    }

    #[test]
    fn disallowed_values_rejected() {
        let (_, msg) = syntax_message("rating: 6\n");
        assert!(msg.contains("illegal argument '6'"));
        let (_, msg) = syntax_message("download: zip\n");
        assert!(msg.contains("illegal argument"));
        let (_, msg) = syntax_message("sort: size\n");
        assert!(msg.contains("illegal argument"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let tmp = TempDir::new().unwrap();
        let result = Config::load(&tmp.path().join(".web"));
        assert!(matches!(result, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn load_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join(".web");
        fs::write(&path, "dir: x\n").unwrap();
        assert_eq!(Config::load(&path).unwrap().dir().unwrap(), "x");
    }

    // =========================================================================
    // Typed accessors
    // =========================================================================

    #[test]
    fn missing_dir_is_error() {
        let config = parse("title: t\n").unwrap();
        assert!(matches!(
            config.dir(),
            Err(ConfigError::Missing { keyword: "dir", .. })
        ));
    }

    #[test]
    fn title_defaults() {
        assert_eq!(parse("dir: a\n").unwrap().title(), DEFAULT_TITLE);
    }

    #[test]
    fn download_modes() {
        assert_eq!(parse("").unwrap().download_mode(), DownloadMode::None);
        assert_eq!(parse("download:\n").unwrap().download_mode(), DownloadMode::Symlink);
        assert_eq!(
            parse("download: symlink\n").unwrap().download_mode(),
            DownloadMode::Symlink
        );
        assert_eq!(
            parse("download: static\n").unwrap().download_mode(),
            DownloadMode::Static
        );
    }

    #[test]
    fn sort_keys() {
        assert_eq!(parse("sort: name\n").unwrap().sort_key(), Some(SortKey::Name));
        assert_eq!(parse("sort: date\n").unwrap().sort_key(), Some(SortKey::Date));
        assert_eq!(parse("").unwrap().sort_key(), None);
    }

    #[test]
    fn thumb_size_parsing() {
        assert_eq!(parse("thumb: 200\n").unwrap().thumb_size().unwrap(), Some(200));
        assert_eq!(parse("").unwrap().thumb_size().unwrap(), None);
        assert!(matches!(
            parse("thumb: big\n").unwrap().thumb_size(),
            Err(ConfigError::Invalid { .. })
        ));
        assert!(parse("thumb: 0\n").unwrap().thumb_size().is_err());
    }

    #[test]
    fn captions_split_at_first_space() {
        let config = parse("caption: a.jpg First\ncaption: b.jpg Second one\ncaption: a.jpg Replaced\n")
            .unwrap();
        let captions = config.captions();
        assert_eq!(captions.len(), 2);
        assert_eq!(captions["a.jpg"], "Replaced");
        assert_eq!(captions["b.jpg"], "Second one");
    }
}
