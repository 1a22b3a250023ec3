use super::{ApplicationManifest, Component, ComponentKind, Exported, IntentFilterSummarizer, RenderedRule};
use serde::Serialize;

/// A component that other applications on the device can reach
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExposedComponent {
    pub kind: ComponentKind,
    pub name: String,
    pub permission: Option<String>,
    /// Rendered rules, one inner vector per intent filter
    pub intent_filters: Vec<Vec<RenderedRule>>,
}

impl ExposedComponent {
    pub const UNNAMED: &'static str = "name not defined";
    pub const NO_PERMISSION: &'static str = "null";

    /// Declared permission, or `null` when the component has none
    pub fn permission_display(&self) -> &str {
        self.permission.as_deref().unwrap_or(Self::NO_PERMISSION)
    }
}

/// Decides which components belong to the external attack surface
///
/// An unset `android:exported` follows the platform default: the component
/// is exported only when it declares at least one intent filter.
pub struct ExposureClassifier {
    summarizer: IntentFilterSummarizer,
}

impl ExposureClassifier {
    pub fn new() -> Self {
        Self {
            summarizer: IntentFilterSummarizer::new(),
        }
    }

    pub fn is_exposed(&self, component: &Component) -> bool {
        match component.exported {
            Exported::ExplicitTrue => true,
            Exported::ExplicitFalse => false,
            Exported::Unset => !component.intent_filters.is_empty(),
        }
    }

    /// Exposed components of one kind, in document order
    pub fn classify_kind(
        &self,
        manifest: &ApplicationManifest,
        kind: ComponentKind,
    ) -> Vec<ExposedComponent> {
        manifest
            .components_of(kind)
            .filter_map(|component| self.expose(component))
            .collect()
    }

    /// Every exposed component, in document order
    pub fn classify(&self, manifest: &ApplicationManifest) -> Vec<ExposedComponent> {
        manifest
            .components
            .iter()
            .filter_map(|component| self.expose(component))
            .collect()
    }

    /// Report entry for a component, `None` if it is not exposed
    pub fn expose(&self, component: &Component) -> Option<ExposedComponent> {
        if !self.is_exposed(component) {
            return None;
        }

        Some(ExposedComponent {
            kind: component.kind,
            name: component
                .name
                .clone()
                .unwrap_or_else(|| ExposedComponent::UNNAMED.to_string()),
            permission: component.permission.clone(),
            intent_filters: component
                .intent_filters
                .iter()
                .map(|filter| self.summarizer.summarize(filter))
                .collect(),
        })
    }
}

impl Default for ExposureClassifier {
    fn default() -> Self {
        Self::new()
    }
}
