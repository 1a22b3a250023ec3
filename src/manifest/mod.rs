//! Typed view of `AndroidManifest.xml`
//!
//! The manifest is lifted out of the generic [`Document`] tree into
//! components, intent filters and application flags. Nothing here decides
//! what is exposed; that is [`ExposureClassifier`]'s job.

mod exposure;
mod intent;

pub use exposure::{ExposedComponent, ExposureClassifier};
pub use intent::{IntentFilterSummarizer, RenderedRule};

use crate::document::{Document, Element};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

pub const ANDROID_NAME: &str = "android:name";
pub const ANDROID_EXPORTED: &str = "android:exported";
pub const ANDROID_PERMISSION: &str = "android:permission";

/// Android component types that can be reached from other applications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Activity,
    Receiver,
    Service,
    Provider,
}

impl ComponentKind {
    /// Report order for the attack surface
    pub const ALL: [ComponentKind; 4] = [
        ComponentKind::Activity,
        ComponentKind::Receiver,
        ComponentKind::Service,
        ComponentKind::Provider,
    ];

    /// Manifest tag for this kind
    pub fn tag(&self) -> &'static str {
        match self {
            ComponentKind::Activity => "activity",
            ComponentKind::Receiver => "receiver",
            ComponentKind::Service => "service",
            ComponentKind::Provider => "provider",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Value of `android:exported`
///
/// The platform default depends on whether intent filters are declared, so
/// a missing attribute is kept distinct from an explicit `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Exported {
    ExplicitTrue,
    ExplicitFalse,
    Unset,
}

impl Exported {
    /// Anything other than a literal boolean (e.g. `@bool/flag`) is `Unset`
    pub fn from_attr(value: Option<&str>) -> Self {
        // Android resolves XML booleans case-insensitively, so `TRUE` exports too
        match value.map(|v| v.trim().to_ascii_lowercase()) {
            Some(v) if v == "true" => Exported::ExplicitTrue,
            Some(v) if v == "false" => Exported::ExplicitFalse,
            _ => Exported::Unset,
        }
    }
}

/// Kind of a single `<intent-filter>` child
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleKind {
    Action,
    Category,
    Data,
    Other(String),
}

impl RuleKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "action" => RuleKind::Action,
            "category" => RuleKind::Category,
            "data" => RuleKind::Data,
            other => RuleKind::Other(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            RuleKind::Action => "action",
            RuleKind::Category => "category",
            RuleKind::Data => "data",
            RuleKind::Other(tag) => tag,
        }
    }
}

/// One matching rule inside an intent filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rule {
    pub kind: RuleKind,
    /// Qualified attribute name -> value, e.g. `android:scheme` -> `https`
    pub attributes: BTreeMap<String, String>,
}

impl Rule {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    fn from_element(element: &Element) -> Self {
        Self {
            kind: RuleKind::from_tag(element.tag()),
            attributes: element
                .attributes()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntentFilter {
    pub rules: Vec<Rule>,
}

/// A declared activity, receiver, service or provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Component {
    pub kind: ComponentKind,
    pub name: Option<String>,
    pub exported: Exported,
    pub permission: Option<String>,
    pub intent_filters: Vec<IntentFilter>,
}

impl Component {
    pub fn new(kind: ComponentKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: Some(name.into()),
            exported: Exported::Unset,
            permission: None,
            intent_filters: Vec::new(),
        }
    }

    pub fn with_exported(mut self, exported: Exported) -> Self {
        self.exported = exported;
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permission = Some(permission.into());
        self
    }

    pub fn with_filter(mut self, filter: IntentFilter) -> Self {
        self.intent_filters.push(filter);
        self
    }

    fn from_element(kind: ComponentKind, element: &Element) -> Self {
        let intent_filters = element
            .select_elements("intent-filter")
            .map(|filter| IntentFilter {
                rules: filter.children().iter().map(Rule::from_element).collect(),
            })
            .collect();

        Self {
            kind,
            name: element.attr(ANDROID_NAME).map(str::to_string),
            exported: Exported::from_attr(element.attr(ANDROID_EXPORTED)),
            permission: element.attr(ANDROID_PERMISSION).map(str::to_string),
            intent_filters,
        }
    }
}

/// `<meta-data>` entry under `<application>`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetaData {
    pub name: String,
    pub value: Option<String>,
}

/// Parsed `AndroidManifest.xml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApplicationManifest {
    pub package: Option<String>,
    /// `android:allowBackup`, verbatim; `"true"` when undeclared
    pub allow_backup: String,
    /// `android:debuggable`, verbatim; `"false"` when undeclared
    pub debuggable: String,
    /// Components in document order
    pub components: Vec<Component>,
    pub meta_data: Vec<MetaData>,
}

impl Default for ApplicationManifest {
    fn default() -> Self {
        Self {
            package: None,
            allow_backup: "true".to_string(),
            debuggable: "false".to_string(),
            components: Vec::new(),
            meta_data: Vec::new(),
        }
    }
}

impl ApplicationManifest {
    /// Build from a document whose root is `<manifest>`
    ///
    /// Returns `None` for any other root element.
    pub fn from_document(document: &Document) -> Option<Self> {
        let root = document.select_root("manifest")?;
        let mut manifest = Self {
            package: root.attr("package").map(str::to_string),
            ..Self::default()
        };

        for (index, app) in root.select_elements("application").enumerate() {
            // Flags come from the first <application>; later ones only add components
            if index == 0 {
                manifest.allow_backup = app.attr_or("android:allowBackup", "true").to_string();
                manifest.debuggable = app.attr_or("android:debuggable", "false").to_string();
            }

            for child in app.children() {
                if let Some(kind) = ComponentKind::from_tag(child.tag()) {
                    manifest.components.push(Component::from_element(kind, child));
                } else if child.tag() == "meta-data" {
                    manifest.meta_data.push(MetaData {
                        name: child.attr_or(ANDROID_NAME, "").to_string(),
                        value: child.attr("android:value").map(str::to_string),
                    });
                }
            }
        }

        debug!(
            "Manifest {}: {} components, {} meta-data entries",
            manifest.package.as_deref().unwrap_or("<no package>"),
            manifest.components.len(),
            manifest.meta_data.len()
        );

        Some(manifest)
    }

    /// Components of one kind, in document order
    pub fn components_of(&self, kind: ComponentKind) -> impl Iterator<Item = &Component> {
        self.components.iter().filter(move |c| c.kind == kind)
    }

    /// Meta-data entries whose name mentions an API
    pub fn api_key_meta_data(&self) -> impl Iterator<Item = &MetaData> {
        self.meta_data
            .iter()
            .filter(|m| !m.name.is_empty() && m.name.to_lowercase().contains("api"))
    }
}
