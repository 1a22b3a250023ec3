//! Walking the decompiled APK directory
//!
//! Lists miscellaneous resource directories (`res/xml`, `res/raw`) and
//! pulls hard-coded URLs out of every readable text file.

use regex::Regex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Files bigger than this are not searched for URLs
const MAX_SCAN_BYTES: u64 = 8 * 1024 * 1024;

const URL_PATTERN: &str = r#"https?://[A-Za-z0-9\-._~:/?#\[\]@!$&*+,;=%]+"#;

/// File names found under a directory, recursively, sorted by path
pub fn list_files(dir: &Path) -> Vec<String> {
    let files: Vec<String> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping unreadable entry under {}: {}", dir.display(), e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .collect();

    debug!("Listed {} files in {}", files.len(), dir.display());
    files
}

/// A URL and the first file it was seen in
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedUrl {
    pub url: String,
    pub file: PathBuf,
}

/// Finds `http(s)://` URLs in text files
pub struct UrlExtractor {
    pattern: Regex,
}

impl UrlExtractor {
    pub fn new() -> Self {
        Self {
            pattern: Regex::new(URL_PATTERN).expect("URL pattern is valid"),
        }
    }

    /// URLs in a piece of text, in order of appearance
    pub fn find_in<'a>(&'a self, text: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.pattern
            .find_iter(text)
            .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '\'', ')']))
            .filter(|url| url.len() > "https://".len())
    }

    /// Distinct URLs under `root`, sorted, each with the first file (in path
    /// order) that contains it; paths are relative to `root`
    pub fn extract(&self, root: &Path) -> Vec<ExtractedUrl> {
        let mut seen: BTreeMap<String, PathBuf> = BTreeMap::new();

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));

        for entry in walker.flatten() {
            if !entry.file_type().is_file() {
                continue;
            }
            let too_big = entry
                .metadata()
                .map(|m| m.len() > MAX_SCAN_BYTES)
                .unwrap_or(true);
            if too_big {
                trace!("Skipping {}", entry.path().display());
                continue;
            }

            // Binary files fail UTF-8 decoding and are skipped
            let content = match fs::read_to_string(entry.path()) {
                Ok(c) => c,
                Err(_) => continue,
            };

            let relative = entry
                .path()
                .strip_prefix(root)
                .unwrap_or(entry.path())
                .to_path_buf();

            for url in self.find_in(&content) {
                seen.entry(url.to_string()).or_insert_with(|| relative.clone());
            }
        }

        debug!("Extracted {} distinct URLs from {}", seen.len(), root.display());

        seen.into_iter()
            .map(|(url, file)| ExtractedUrl { url, file })
            .collect()
    }
}

impl Default for UrlExtractor {
    fn default() -> Self {
        Self::new()
    }
}
