//! Secret candidates in `res/values/strings.xml`
//!
//! Candidates are picked purely by resource name. The value is never used to
//! decide the category, only to drop entries that are empty.

use crate::document::Document;
use serde::Serialize;
use tracing::debug;

/// Resource names that match the generic `*api*key*` heuristic but ship with
/// the support libraries and never hold a credential
pub const BENIGN_RESOURCE_NAMES: [&str; 3] = ["abc_capital_off", "abc_capital_on", "currentApiLevel"];

pub const FIREBASE_DATABASE_URL: &str = "firebase_database_url";
pub const GOOGLE_KEY_NAMES: [&str; 2] = ["google_api_key", "google_map_keys"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SecretCategory {
    FirebaseDbUrl,
    GoogleApiKey,
    GenericApiKey,
}

impl SecretCategory {
    /// Whether candidates of this category are verified over the network
    pub fn is_probed(&self) -> bool {
        matches!(self, SecretCategory::FirebaseDbUrl | SecretCategory::GoogleApiKey)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SecretCategory::FirebaseDbUrl => "firebase-db-url",
            SecretCategory::GoogleApiKey => "google-api-key",
            SecretCategory::GenericApiKey => "generic-api-key",
        }
    }
}

impl std::fmt::Display for SecretCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `<string name="...">value</string>` entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringResource {
    pub name: String,
    pub value: String,
}

impl StringResource {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecretCandidate {
    pub resource_name: String,
    pub raw_value: String,
    pub category: SecretCategory,
}

/// Scans string resources for values worth verifying
pub struct SecretExtractor;

impl SecretExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Category for a resource name, in precedence order
    pub fn categorize(&self, name: &str) -> Option<SecretCategory> {
        if name == FIREBASE_DATABASE_URL {
            return Some(SecretCategory::FirebaseDbUrl);
        }
        if GOOGLE_KEY_NAMES.contains(&name) {
            return Some(SecretCategory::GoogleApiKey);
        }

        let lower = name.to_lowercase();
        if lower.contains("api") && lower.contains("key") && !BENIGN_RESOURCE_NAMES.contains(&name) {
            return Some(SecretCategory::GenericApiKey);
        }

        None
    }

    /// All `<string>` entries of a `<resources>` document, in document order
    ///
    /// Returns `None` when the root is not `<resources>`.
    pub fn string_resources(&self, document: &Document) -> Option<Vec<StringResource>> {
        let root = document.select_root("resources")?;
        Some(
            root.select_elements("string")
                .map(|s| StringResource::new(s.attr_or("name", "none"), s.text().trim()))
                .collect(),
        )
    }

    /// Candidates in declaration order; empty values are never candidates
    pub fn extract(&self, resources: &[StringResource]) -> Vec<SecretCandidate> {
        let candidates: Vec<SecretCandidate> = resources
            .iter()
            .filter(|res| !res.value.is_empty())
            .filter_map(|res| {
                self.categorize(&res.name).map(|category| SecretCandidate {
                    resource_name: res.name.clone(),
                    raw_value: res.value.clone(),
                    category,
                })
            })
            .collect();

        debug!(
            "{} secret candidates out of {} string resources",
            candidates.len(),
            resources.len()
        );

        candidates
    }

    pub fn extract_document(&self, document: &Document) -> Option<Vec<SecretCandidate>> {
        self.string_resources(document)
            .map(|resources| self.extract(&resources))
    }
}

impl Default for SecretExtractor {
    fn default() -> Self {
        Self::new()
    }
}
