use super::{IntentFilter, Rule, RuleKind, ANDROID_NAME};
use serde::Serialize;

/// One intent-filter rule as shown in the report, e.g. `action: VIEW`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedRule {
    pub tag: String,
    pub value: String,
}

impl std::fmt::Display for RenderedRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.tag, self.value)
    }
}

/// Renders the matching rules of intent filters
pub struct IntentFilterSummarizer;

impl IntentFilterSummarizer {
    pub fn new() -> Self {
        Self
    }

    /// Render every rule of a filter in document order
    pub fn summarize(&self, filter: &IntentFilter) -> Vec<RenderedRule> {
        filter.rules.iter().map(|rule| self.render(rule)).collect()
    }

    /// `data` rules become `scheme://host` with `*` for missing parts;
    /// everything else shows its `android:name`
    pub fn render(&self, rule: &Rule) -> RenderedRule {
        let value = match rule.kind {
            RuleKind::Data => format!(
                "{}://{}",
                rule.attr("android:scheme").unwrap_or("*"),
                rule.attr("android:host").unwrap_or("*")
            ),
            _ => rule.attr(ANDROID_NAME).unwrap_or("no name").to_string(),
        };

        RenderedRule {
            tag: rule.kind.tag().to_string(),
            value,
        }
    }
}

impl Default for IntentFilterSummarizer {
    fn default() -> Self {
        Self::new()
    }
}
