use crate::policy::{is_recognized_path, Category, Overrides, PolicyWarning};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Which checks a change set's labels switch off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bypass {
    pub full_bypass: bool,
    /// Categories (`quality`) or rule paths (`quality.coverage`) to skip.
    pub bypassed_paths: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<PolicyWarning>,
}

impl Bypass {
    /// Whether a violation filed under `rule` (a `category.rule` path) is suppressed.
    pub fn suppresses(&self, category: Category, rule: &str) -> bool {
        self.full_bypass
            || self.bypassed_paths.contains(category.as_str())
            || self.bypassed_paths.contains(rule)
    }

    pub fn skips_category(&self, category: Category) -> bool {
        self.full_bypass || self.bypassed_paths.contains(category.as_str())
    }
}

/// Resolve override labels into a bypass set.
///
/// A global bypass label short-circuits everything, including any partial entry
/// that shares its label. Otherwise every active partial entry contributes its
/// recognized paths; unrecognized ones become warnings rather than being dropped
/// silently.
pub fn resolve(labels: &BTreeSet<String>, overrides: &Overrides) -> Bypass {
    if let Some(label) = labels
        .iter()
        .find(|l| overrides.bypass_labels.contains(l.as_str()))
    {
        tracing::info!(label = %label, "global bypass label present");
        return Bypass {
            full_bypass: true,
            bypassed_paths: Category::all()
                .iter()
                .map(|c| c.as_str().to_string())
                .collect(),
            warnings: Vec::new(),
        };
    }

    let mut bypass = Bypass::default();
    for entry in &overrides.partial_bypass {
        if !labels.contains(&entry.label) {
            continue;
        }
        for path in &entry.paths {
            if is_recognized_path(path) {
                bypass.bypassed_paths.insert(path.clone());
            } else {
                bypass.warnings.push(PolicyWarning::new(
                    format!("overrides.partial_bypass.{}", entry.label),
                    format!("label '{}' names unrecognized bypass path '{path}'", entry.label),
                ));
            }
        }
    }
    if !bypass.bypassed_paths.is_empty() {
        tracing::debug!(paths = ?bypass.bypassed_paths, "partial bypass active");
    }
    bypass
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
