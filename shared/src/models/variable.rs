//! The raw-variable catalogue exposed by the cloud.

use serde::Deserialize;
use std::collections::HashMap;

/// Detail for one variable as the catalogue endpoint returns it: an
/// optional unit and a map of localized display names.
#[derive(Debug, Clone, Deserialize)]
pub struct VariableDetail {
    /// Unit of the variable, e.g. "kW".
    #[serde(default)]
    pub unit: Option<String>,
    /// Localized display names keyed by language code.
    #[serde(default)]
    pub name: Option<HashMap<String, String>>,
}

/// One entry of the catalogue payload: a single-key map from variable
/// id to its detail.
pub type VariableEntry = HashMap<String, VariableDetail>;

/// A flattened catalogue variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    /// Variable identifier used in query bodies, e.g. "pvPower".
    pub variable: String,
    /// Unit, empty when the cloud reports none.
    pub unit: String,
    /// Display name in the requested language, falling back to the id.
    pub name: String,
}

impl Variable {
    /// Flattens the catalogue payload into a variable list, resolving
    /// names in the given language.
    #[must_use]
    pub fn from_entries(entries: &[VariableEntry], lang: &str) -> Vec<Self> {
        let mut variables = Vec::new();
        for entry in entries {
            for (id, detail) in entry {
                let unit = detail.unit.clone().unwrap_or_default();
                let name = detail
                    .name
                    .as_ref()
                    .and_then(|names| names.get(lang))
                    .cloned()
                    .unwrap_or_else(|| id.clone());
                variables.push(Self {
                    variable: id.clone(),
                    unit,
                    name,
                });
            }
        }
        variables
    }
}
