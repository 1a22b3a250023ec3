//! Runs every configured path through the analysis pipeline
//!
//! Manifests go through the exposure classifier, string resources through
//! the secret extractor and prober, and directories are listed. The result
//! is a [`ScanReport`] with one section per configured path, in config order.

use crate::config::{Config, PathEntry, PathKind};
use crate::discovery::{list_files, ExtractedUrl, UrlExtractor};
use crate::document::{Document, DocumentError};
use crate::manifest::{ApplicationManifest, ComponentKind, ExposedComponent, ExposureClassifier, MetaData};
use crate::probe::{ProbeError, ProbeResult, Prober};
use crate::secrets::{SecretCandidate, SecretExtractor};
use miette::Diagnostic;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{info, warn};

/// Fatal scan errors
#[derive(Error, Diagnostic, Debug)]
pub enum ScanError {
    #[error("{} is not a directory", .0.display())]
    #[diagnostic(code(slicer::input), help("pass the jadx output directory with -d"))]
    NotADirectory(PathBuf),

    #[error("{} does not exist", .path.display())]
    #[diagnostic(
        code(slicer::missing_path),
        help("fix the `paths` entry in the config, or mark it `optional: true`")
    )]
    MissingPath {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} should be a {expected}", .path.display())]
    #[diagnostic(code(slicer::path_kind))]
    WrongPathType { path: PathBuf, expected: &'static str },

    #[error("could not load {}", .path.display())]
    #[diagnostic(code(slicer::malformed), help("the file must be well-formed XML"))]
    Document {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },

    #[error("{} has root <{root}>, expected <manifest> or <resources>", .path.display())]
    #[diagnostic(code(slicer::unexpected_root))]
    UnexpectedRoot { path: PathBuf, root: String },

    #[error(transparent)]
    #[diagnostic(code(slicer::probe))]
    Probe(#[from] ProbeError),
}

/// Exposed components of one kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SurfaceGroup {
    pub kind: ComponentKind,
    pub components: Vec<ExposedComponent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestSection {
    pub package: Option<String>,
    pub allow_backup: String,
    pub debuggable: String,
    /// One group per component kind, in report order
    pub surface: Vec<SurfaceGroup>,
    /// `<meta-data>` entries that look like API keys
    pub api_keys: Vec<MetaData>,
}

/// A reportable string resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "source", rename_all = "kebab-case")]
pub enum SecretFinding {
    /// Verified over the network
    Probe(ProbeResult),
    /// Reported on name alone
    Unverified(SecretCandidate),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StringsSection {
    /// Findings in resource declaration order
    pub findings: Vec<SecretFinding>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Section {
    Manifest {
        path: PathBuf,
        manifest: ManifestSection,
    },
    Strings {
        path: PathBuf,
        strings: StringsSection,
    },
    Listing {
        path: PathBuf,
        kind: PathKind,
        files: Vec<String>,
    },
    /// An optional path that was not present
    Skipped { path: PathBuf },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub sections: Vec<Section>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<ExtractedUrl>>,
    /// Interrupted before every path was processed
    pub cancelled: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct ScanOptions {
    /// Verify Firebase URLs and Google keys over the network
    pub probe: bool,
    /// Collect hard-coded URLs from the whole directory
    pub extract_urls: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            probe: true,
            extract_urls: false,
        }
    }
}

pub struct Scanner {
    config: Config,
    options: ScanOptions,
    classifier: ExposureClassifier,
    extractor: SecretExtractor,
    prober: Prober,
}

impl Scanner {
    pub fn new(config: Config, options: ScanOptions) -> Result<Self, ScanError> {
        let prober = Prober::new(config.urls.clone(), config.probe_settings())?;
        Ok(Self {
            config,
            options,
            classifier: ExposureClassifier::new(),
            extractor: SecretExtractor::new(),
            prober,
        })
    }

    /// Called once per finished probe, e.g. to drive a progress bar
    pub fn with_observer(mut self, observer: impl Fn(&ProbeResult) + Send + Sync + 'static) -> Self {
        self.prober = self.prober.with_observer(observer);
        self
    }

    /// Scan `root` until done or until `cancel` flips to `true`
    pub async fn scan(&self, root: &Path, cancel: watch::Receiver<bool>) -> Result<ScanReport, ScanError> {
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let mut report = ScanReport::default();

        for entry in &self.config.paths {
            if *cancel.borrow() {
                report.cancelled = true;
                break;
            }

            let (section, cancelled) = self.scan_entry(root, entry, cancel.clone()).await?;
            report.sections.push(section);
            if cancelled {
                report.cancelled = true;
                break;
            }
        }

        if self.options.extract_urls && !report.cancelled {
            info!("Extracting URLs from {}", root.display());
            report.urls = Some(UrlExtractor::new().extract(root));
        }

        Ok(report)
    }

    async fn scan_entry(
        &self,
        root: &Path,
        entry: &PathEntry,
        cancel: watch::Receiver<bool>,
    ) -> Result<(Section, bool), ScanError> {
        let full_path = root.join(&entry.path);
        let relative = entry.path.clone();

        let metadata = match std::fs::metadata(&full_path) {
            Ok(metadata) => metadata,
            Err(_) if entry.optional => {
                warn!("Optional path {} not found, skipping", relative.display());
                return Ok((Section::Skipped { path: relative }, false));
            }
            Err(source) => return Err(ScanError::MissingPath { path: full_path, source }),
        };

        if entry.kind.is_listing() {
            if !metadata.is_dir() {
                return Err(ScanError::WrongPathType {
                    path: full_path,
                    expected: "directory",
                });
            }
            let files = list_files(&full_path);
            return Ok((
                Section::Listing {
                    path: relative,
                    kind: entry.kind,
                    files,
                },
                false,
            ));
        }

        if !metadata.is_file() {
            return Err(ScanError::WrongPathType {
                path: full_path,
                expected: "file",
            });
        }

        let document = Document::from_file(&full_path).map_err(|source| ScanError::Document {
            path: full_path.clone(),
            source,
        })?;

        let root_tag = document.root().tag();
        let declared = match entry.kind {
            PathKind::Manifest => "manifest",
            _ => "resources",
        };
        if root_tag != declared {
            warn!(
                "{} is configured as {:?} but its root is <{}>",
                relative.display(),
                entry.kind,
                root_tag
            );
        }

        if let Some(manifest) = ApplicationManifest::from_document(&document) {
            info!("Analyzing manifest {}", relative.display());
            let manifest = self.analyze_manifest(&manifest);
            return Ok((Section::Manifest { path: relative, manifest }, false));
        }

        if let Some(candidates) = self.extractor.extract_document(&document) {
            info!(
                "Checking {} secret candidates in {}",
                candidates.len(),
                relative.display()
            );
            let (strings, cancelled) = self.verify_secrets(&candidates, cancel).await;
            return Ok((Section::Strings { path: relative, strings }, cancelled));
        }

        Err(ScanError::UnexpectedRoot {
            path: full_path,
            root: root_tag.to_string(),
        })
    }

    /// Attack surface and flags of a manifest
    pub fn analyze_manifest(&self, manifest: &ApplicationManifest) -> ManifestSection {
        let surface = ComponentKind::ALL
            .into_iter()
            .map(|kind| SurfaceGroup {
                kind,
                components: self.classifier.classify_kind(manifest, kind),
            })
            .collect();

        ManifestSection {
            package: manifest.package.clone(),
            allow_backup: manifest.allow_backup.clone(),
            debuggable: manifest.debuggable.clone(),
            surface,
            api_keys: manifest.api_key_meta_data().cloned().collect(),
        }
    }

    /// Probe what can be probed and merge everything back into
    /// declaration order; the flag is set when probing was interrupted
    pub async fn verify_secrets(
        &self,
        candidates: &[SecretCandidate],
        mut cancel: watch::Receiver<bool>,
    ) -> (StringsSection, bool) {
        let batch = if self.options.probe {
            let cancelled = async move {
                // A dropped sender means nobody can cancel any more
                if cancel.wait_for(|c| *c).await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            self.prober.probe_all(candidates, cancelled).await
        } else {
            self.prober.skip_all(candidates)
        };

        let mut results = batch.results.into_iter().peekable();
        let mut findings = Vec::new();

        for (index, candidate) in candidates.iter().enumerate() {
            if candidate.category.is_probed() {
                while let Some(result) = results.next_if(|r| r.candidate_index == index) {
                    findings.push(SecretFinding::Probe(result));
                }
            } else {
                findings.push(SecretFinding::Unverified(candidate.clone()));
            }
        }

        (StringsSection { findings }, batch.cancelled)
    }
}

/// A cancellation channel that never fires
pub fn never_cancel() -> watch::Receiver<bool> {
    // With the sender gone the value stays `false` forever
    let (_, rx) = watch::channel(false);
    rx
}
