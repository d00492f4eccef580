//! Source file selection and ordering.
//!
//! A gallery's picture list is built from four rule sets, applied in order:
//!
//! 1. **include**: each entry is split on whitespace, every field is
//!    brace-expanded (`a{1,2}.jpg` → `a1.jpg a2.jpg`) and then globbed.
//!    Results are concatenated in pattern order. Duplicates are kept.
//! 2. **exclude**: expanded the same way; each match removes its first
//!    occurrence from the list. A match that is not in the list only
//!    warns.
//! 3. **after**: each entry is `anchor pattern...`. Patterns sharing an
//!    anchor are merged, expanded, and spliced in right after the anchor's
//!    first occurrence.
//! 4. **before**: as `after`, spliced in right before the anchor.
//!
//! Anchors that never appear in the list are fatal, and every missing
//! anchor is reported in one error.
//!
//! Glob results are sorted, so the final order depends only on the rules
//! and the set of files present, never on directory iteration order.
//! All patterns are relative to the source root and the returned names are
//! too.

use crate::config::{Config, DEFAULT_INCLUDE, OptionCode};
use glob::{MatchOptions, Pattern};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SelectError {
    #[error("Brace expansion error in '{0}'")]
    Braces(String),
    #[error("Bad pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not locate {}", .0.join(", "))]
    MissingAnchors(Vec<String>),
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Selection rules, as raw config entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectRules {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub after: Vec<String>,
    pub before: Vec<String>,
}

impl SelectRules {
    pub fn from_config(config: &Config) -> Self {
        let include = match config.all(OptionCode::Include) {
            [] => vec![DEFAULT_INCLUDE.to_string()],
            entries => entries.to_vec(),
        };
        Self {
            include,
            exclude: config.all(OptionCode::Exclude).to_vec(),
            after: config.all(OptionCode::After).to_vec(),
            before: config.all(OptionCode::Before).to_vec(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    After,
    Before,
}

/// Build the ordered file list under `root`.
pub fn select(root: &Path, rules: &SelectRules) -> Result<Vec<String>, SelectError> {
    let mut files = glob_files(root, &rules.include)?;

    for excluded in glob_files(root, &rules.exclude)? {
        match files.iter().position(|f| *f == excluded) {
            Some(index) => {
                files.remove(index);
            }
            None => tracing::warn!(file = %excluded, "Cannot find excluded file in list, ignored"),
        }
    }

    let mut missing = Vec::new();
    files = splice(root, files, &rules.after, Side::After, &mut missing)?;
    files = splice(root, files, &rules.before, Side::Before, &mut missing)?;
    if !missing.is_empty() {
        return Err(SelectError::MissingAnchors(missing));
    }

    tracing::debug!(count = files.len(), "Selected files");
    Ok(files)
}

/// Expand whitespace-separated pattern lists into matching file names.
pub fn glob_files(root: &Path, entries: &[String]) -> Result<Vec<String>, SelectError> {
    let mut files = Vec::new();
    for entry in entries {
        for field in entry.split_whitespace() {
            for pattern in expand_braces(field)? {
                files.extend(glob_in(root, &pattern)?);
            }
        }
    }
    Ok(files)
}

fn glob_in(root: &Path, pattern: &str) -> Result<Vec<String>, SelectError> {
    let rooted = if Path::new(pattern).is_absolute() || root.as_os_str().is_empty() {
        pattern.to_string()
    } else {
        format!("{}/{}", Pattern::escape(&root.to_string_lossy()), pattern)
    };
    let paths = glob::glob_with(&rooted, MATCH_OPTIONS).map_err(|source| SelectError::Pattern {
        pattern: pattern.to_string(),
        source,
    })?;

    let mut names = Vec::new();
    for entry in paths {
        let path = entry.map_err(|e| SelectError::Io(e.into_error()))?;
        let name = path.strip_prefix(root).unwrap_or(&path);
        names.push(name.to_string_lossy().to_string());
    }
    Ok(names)
}

/// Splice anchored pattern lists into `files`.
///
/// Anchors not found are appended to `missing`.
fn splice(
    root: &Path,
    files: Vec<String>,
    entries: &[String],
    side: Side,
    missing: &mut Vec<String>,
) -> Result<Vec<String>, SelectError> {
    if entries.is_empty() {
        return Ok(files);
    }

    // Anchor → merged patterns, in first-seen order
    let mut anchors: Vec<(String, Vec<String>)> = Vec::new();
    for entry in entries {
        let mut fields = entry.split_whitespace();
        let Some(anchor) = fields.next() else {
            continue;
        };
        let patterns = fields.map(str::to_string);
        match anchors.iter_mut().find(|(a, _)| a == anchor) {
            Some((_, existing)) => existing.extend(patterns),
            None => anchors.push((anchor.to_string(), patterns.collect())),
        }
    }

    let mut result = Vec::with_capacity(files.len());
    for file in files {
        let Some(index) = anchors.iter().position(|(a, _)| *a == file) else {
            result.push(file);
            continue;
        };
        let (_, patterns) = anchors.remove(index);
        let inserted = glob_files(root, &patterns)?;
        match side {
            Side::Before => {
                result.extend(inserted);
                result.push(file);
            }
            Side::After => {
                result.push(file);
                result.extend(inserted);
            }
        }
    }

    for (anchor, _) in anchors {
        tracing::error!(anchor = %anchor, "Could not locate anchor");
        missing.push(anchor);
    }
    Ok(result)
}

/// Expand `{a,b}` alternations, including nested and repeated groups.
///
/// A group without a top-level comma is kept literally. Unbalanced braces
/// are an error.
pub fn expand_braces(pattern: &str) -> Result<Vec<String>, SelectError> {
    let unbalanced = || SelectError::Braces(pattern.to_string());

    let Some(open) = pattern.find('{') else {
        if pattern.contains('}') {
            return Err(unbalanced());
        }
        return Ok(vec![pattern.to_string()]);
    };
    let prefix = &pattern[..open];
    if prefix.contains('}') {
        return Err(unbalanced());
    }

    let mut depth = 0usize;
    let mut close = None;
    let mut commas = Vec::new();
    for (i, c) in pattern[open..].char_indices() {
        let i = open + i;
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(i);
                    break;
                }
            }
            ',' if depth == 1 => commas.push(i),
            _ => {}
        }
    }
    let close = close.ok_or_else(unbalanced)?;
    let suffix = &pattern[close + 1..];

    let mut expanded = Vec::new();
    if commas.is_empty() {
        let inner = &pattern[open + 1..close];
        for middle in expand_braces(inner)? {
            for tail in expand_braces(suffix)? {
                expanded.push(format!("{prefix}{{{middle}}}{tail}"));
            }
        }
        return Ok(expanded);
    }

    let mut start = open + 1;
    for end in commas.into_iter().chain(std::iter::once(close)) {
        let alternative = &pattern[start..end];
        expanded.extend(expand_braces(&format!("{prefix}{alternative}{suffix}"))?);
        start = end + 1;
    }
    Ok(expanded)
}
