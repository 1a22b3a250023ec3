//! slicer - attack surface and secret exposure for decompiled Android APKs
//!
//! Point it at the output of a decompiler such as jadx and it reports:
//! 1. **Attack surface** - activities, receivers, services and providers
//!    that other applications can reach, with their intent filters
//! 2. **Application flags** - `allowBackup` and `debuggable`
//! 3. **Secrets** - API keys and Firebase URLs from `strings.xml`, verified
//!    with a live request where possible
//! 4. **Resource listings** - files under `res/xml` and `res/raw`
//!
//! # Architecture
//!
//! Each configured path is parsed once into a [`Document`]. Manifests flow
//! through the [`ExposureClassifier`]; string resources flow through the
//! [`SecretExtractor`] into the [`Prober`]. [`Scanner`] ties the steps
//! together and produces a [`ScanReport`] for the [`Reporter`].

pub mod config;
pub mod discovery;
pub mod document;
pub mod manifest;
pub mod probe;
pub mod report;
pub mod scan;
pub mod secrets;

pub use config::{Config, PathEntry, PathKind};
pub use discovery::{list_files, UrlExtractor};
pub use document::{Document, DocumentError, Element};
pub use manifest::{ApplicationManifest, Component, ComponentKind, Exported, ExposureClassifier, IntentFilterSummarizer};
pub use probe::{ProbeBatch, ProbeResult, ProbeSettings, Prober, Verdict};
pub use report::{ReportFormat, Reporter};
pub use scan::{ScanError, ScanOptions, ScanReport, Scanner};
pub use secrets::{SecretCandidate, SecretCategory, SecretExtractor};
