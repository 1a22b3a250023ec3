use crate::probe::ProbeSettings;
use miette::{IntoDiagnostic, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Configuration for a slicer run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Paths to inspect, relative to the decompiled APK directory
    pub paths: Vec<PathEntry>,

    /// Google API endpoint templates; the key is appended verbatim
    #[serde(alias = "URLs")]
    pub urls: Vec<String>,

    /// Probe pool configuration
    pub probe: ProbeConfig,
}

/// What a configured path holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathKind {
    /// `AndroidManifest.xml`
    Manifest,
    /// A `res/values/strings.xml` style resource file
    Strings,
    /// Directory whose files are listed under `XML-files`
    XmlFiles,
    /// Directory whose files are listed under `raw-files`
    RawFiles,
}

impl PathKind {
    /// Whether the path names a directory to list rather than a document
    pub fn is_listing(&self) -> bool {
        matches!(self, PathKind::XmlFiles | PathKind::RawFiles)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathEntry {
    pub path: PathBuf,
    pub kind: PathKind,

    /// Skip with a notice instead of aborting when the path is missing
    #[serde(default)]
    pub optional: bool,
}

impl PathEntry {
    pub fn new(path: impl Into<PathBuf>, kind: PathKind) -> Self {
        Self {
            path: path.into(),
            kind,
            optional: false,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Maximum probes in flight
    pub concurrency: usize,

    /// Per-probe timeout in seconds
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            paths: vec![
                PathEntry::new("resources/AndroidManifest.xml", PathKind::Manifest),
                PathEntry::new("resources/res/values/strings.xml", PathKind::Strings),
                PathEntry::new("resources/res/xml", PathKind::XmlFiles).optional(),
                PathEntry::new("resources/res/raw", PathKind::RawFiles).optional(),
            ],
            urls: vec![
                "https://maps.googleapis.com/maps/api/staticmap?center=45%2C10&zoom=7&size=400x400&key=".to_string(),
                "https://maps.googleapis.com/maps/api/streetview?size=400x400&location=40.720032,-73.988354&fov=90&heading=235&pitch=10&key=".to_string(),
                "https://maps.googleapis.com/maps/api/directions/json?origin=Disneyland&destination=Universal+Studios+Hollywood&key=".to_string(),
                "https://maps.googleapis.com/maps/api/geocode/json?latlng=40,30&key=".to_string(),
                "https://maps.googleapis.com/maps/api/place/findplacefromtext/json?input=Museum%20of%20Contemporary%20Art&inputtype=textquery&fields=name&key=".to_string(),
            ],
            probe: ProbeConfig::default(),
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load configuration from a file (YAML or TOML) and validate it
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let config: Self = match extension {
            "yml" | "yaml" => serde_yaml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse YAML config")?,
            "toml" => toml::from_str(&contents)
                .into_diagnostic()
                .wrap_err("Failed to parse TOML config")?,
            _ => {
                // Try YAML first, then TOML
                if let Ok(config) = serde_yaml::from_str(&contents) {
                    config
                } else {
                    toml::from_str(&contents)
                        .into_diagnostic()
                        .wrap_err("Failed to parse config file")?
                }
            }
        };

        debug!(
            "Loaded {} paths and {} endpoints from {}",
            config.paths.len(),
            config.urls.len(),
            path.display()
        );

        config.validate()?;
        Ok(config)
    }

    /// Look in the working directory, then `~/.slicer/`, then fall back to
    /// the built-in defaults
    pub fn from_default_locations(working_dir: &Path, home: Option<&Path>) -> Result<Self> {
        let local_names = [
            "config.yml",
            "config.yaml",
            "config.toml",
            ".slicer.yml",
            ".slicer.yaml",
            ".slicer.toml",
        ];

        let mut candidates: Vec<PathBuf> = local_names.iter().map(|n| working_dir.join(n)).collect();
        if let Some(home) = home {
            candidates.push(home.join(".slicer").join("config.yml"));
            candidates.push(home.join(".slicer").join("config.toml"));
        }

        for path in candidates {
            if path.is_file() {
                return Self::from_file(&path);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Reject configurations that cannot describe a sensible run
    pub fn validate(&self) -> Result<()> {
        if self.paths.is_empty() {
            return Err(miette::miette!("Config must list at least one path"));
        }

        for entry in &self.paths {
            if entry.path.as_os_str().is_empty() {
                return Err(miette::miette!("Config contains an empty path"));
            }
            if entry.path.is_absolute() || entry.path.has_root() {
                return Err(miette::miette!(
                    "Config path {} must be relative to the APK directory",
                    entry.path.display()
                ));
            }
            if entry.path.components().any(|c| c == Component::ParentDir) {
                return Err(miette::miette!(
                    "Config path {} must not leave the APK directory",
                    entry.path.display()
                ));
            }
        }

        for url in &self.urls {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(miette::miette!(
                    "Endpoint template {} must be an http(s) URL",
                    url
                ));
            }
        }

        if self.probe.concurrency == 0 {
            return Err(miette::miette!("probe.concurrency must be at least 1"));
        }
        if self.probe.timeout_secs == 0 {
            return Err(miette::miette!("probe.timeout_secs must be at least 1"));
        }

        Ok(())
    }

    pub fn probe_settings(&self) -> ProbeSettings {
        ProbeSettings {
            concurrency: self.probe.concurrency,
            timeout: Duration::from_secs(self.probe.timeout_secs),
        }
    }
}
