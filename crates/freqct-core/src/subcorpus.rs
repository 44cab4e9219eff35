//! Ad-hoc subcorpus detection.
//!
//! When the concordance behind a table was restricted by a text-type
//! selection that is not a saved subcorpus, the table reflects only that
//! selection. The detector is provided by the host; this module only turns its
//! answer into a warning.

use std::collections::BTreeMap;

/// Reports whether the current concordance uses an ad-hoc text-type selection.
pub trait AdHocSubcorpusDetector {
    fn uses_adhoc_subcorpus(&self) -> bool;

    /// Selected values per structural attribute. `lock` freezes the selection
    /// so later edits do not change what was exported.
    fn export_selections(&self, lock: bool) -> BTreeMap<String, Vec<String>>;
}

/// Detector for a concordance over the whole corpus.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSubcorpus;

impl AdHocSubcorpusDetector for NoSubcorpus {
    fn uses_adhoc_subcorpus(&self) -> bool {
        false
    }

    fn export_selections(&self, _lock: bool) -> BTreeMap<String, Vec<String>> {
        BTreeMap::new()
    }
}

/// Fixed selection, e.g. parsed from the concordance arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticSelection {
    selections: BTreeMap<String, Vec<String>>,
}

impl StaticSelection {
    pub fn new(selections: BTreeMap<String, Vec<String>>) -> Self {
        Self { selections }
    }

    /// Selection from `sca_<struct.attr>=value` concordance arguments.
    pub fn from_conc_args(conc_args: &[(String, String)]) -> Self {
        let mut selections: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (key, value) in conc_args {
            if let Some(attr) = key.strip_prefix("sca_") {
                selections
                    .entry(attr.to_string())
                    .or_default()
                    .push(value.clone());
            }
        }
        Self { selections }
    }
}

impl AdHocSubcorpusDetector for StaticSelection {
    fn uses_adhoc_subcorpus(&self) -> bool {
        self.selections.values().any(|v| !v.is_empty())
    }

    fn export_selections(&self, _lock: bool) -> BTreeMap<String, Vec<String>> {
        self.selections.clone()
    }
}

/// Banner text shown above a table computed on an ad-hoc subcorpus.
pub fn adhoc_subcorpus_warning(detector: &dyn AdHocSubcorpusDetector) -> Option<String> {
    if !detector.uses_adhoc_subcorpus() {
        return None;
    }
    let parts: Vec<String> = detector
        .export_selections(false)
        .into_iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(attr, values)| format!("{attr} = {}", values.join(", ")))
        .collect();
    Some(format!(
        "Frequencies are computed on an ad-hoc subcorpus ({}); ipm values refer to that selection.",
        parts.join("; ")
    ))
}
