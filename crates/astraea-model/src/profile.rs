//! Source dataset profiles.
//!
//! A [`DatasetProfile`] summarises one raw input file: its shape, per-column
//! statistics, and whether the file already looks like an SDTM dataset.
//! Profiles are what the mapping prompt shows the model instead of raw data.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Per-column summary of a raw dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableProfile {
    /// Column name as it appears in the source file.
    pub name: String,

    /// Label from the source metadata, if any.
    #[serde(default)]
    pub label: Option<String>,

    /// Source data type as reported by the reader (e.g. "str", "f64").
    pub dtype: String,

    /// Count of distinct non-null values.
    pub n_unique: usize,

    /// Count of null or empty values.
    pub n_missing: usize,

    /// Up to five example values, in row order.
    pub sample_values: Vec<String>,

    /// True for vendor bookkeeping columns (EDC system identifiers).
    /// These are excluded from the mapping prompt.
    pub is_edc_system_column: bool,
}

/// Summary of one raw input dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetProfile {
    /// Source filename (stem used for heuristic classification).
    pub filename: String,

    /// Number of data rows.
    pub row_count: usize,

    /// Column profiles, in file order.
    pub variables: Vec<VariableProfile>,

    /// True when the file already carries SDTM structure (a DOMAIN column
    /// with a valid code, or a coherent Findings suffix family).
    pub is_sdtm_preformatted: bool,

    /// Free-form metadata from the reader (sheet name, export date, ...).
    #[serde(default)]
    pub domain_metadata: BTreeMap<String, String>,
}

impl DatasetProfile {
    /// Column profiles the model is allowed to see.
    pub fn clinical_variables(&self) -> impl Iterator<Item = &VariableProfile> {
        self.variables.iter().filter(|v| !v.is_edc_system_column)
    }

    /// True when a column with this name exists (case-insensitive).
    pub fn has_variable(&self, name: &str) -> bool {
        self.variables
            .iter()
            .any(|v| v.name.eq_ignore_ascii_case(name))
    }

    /// Filename stem without extension, uppercased.
    pub fn stem(&self) -> String {
        let stem = self
            .filename
            .rsplit_once('.')
            .map_or(self.filename.as_str(), |(stem, _)| stem);
        stem.to_uppercase()
    }
}
