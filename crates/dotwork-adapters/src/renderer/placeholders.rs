//! Placeholder discovery.
//!
//! A placeholder is `{{`, optional whitespace, one identifier, optional
//! whitespace, `}}`. This is the check that decides whether a text file is
//! rendered at all; richer template expressions are left to the engine.

use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;
use walkdir::WalkDir;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*(\w+)\s*\}\}").unwrap_or_else(|e| unreachable!("invalid pattern: {e}"))
});

/// Whether `content` contains at least one placeholder.
pub fn has_placeholders(content: &str) -> bool {
    PLACEHOLDER.is_match(content)
}

/// Distinct identifiers referenced by placeholders in `content`.
pub fn find_placeholders(content: &str) -> BTreeSet<String> {
    PLACEHOLDER
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Placeholders in one file. Unreadable or non-UTF-8 files have none.
pub fn find_placeholders_in_file(path: &Path) -> BTreeSet<String> {
    fs::read_to_string(path)
        .map(|content| find_placeholders(&content))
        .unwrap_or_default()
}

/// Placeholders of every file below `dir`, keyed by path relative to `dir`.
/// Files without placeholders are omitted.
pub fn find_all_placeholders(dir: &Path) -> BTreeMap<PathBuf, BTreeSet<String>> {
    WalkDir::new(dir)
        .min_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let found = find_placeholders_in_file(entry.path());
            if found.is_empty() {
                return None;
            }
            let relative = entry.path().strip_prefix(dir).ok()?.to_path_buf();
            Some((relative, found))
        })
        .collect()
}

/// Every distinct placeholder below `dir`, sorted.
pub fn unique_placeholders(dir: &Path) -> Vec<String> {
    find_all_placeholders(dir)
        .into_values()
        .flatten()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
