//! Study-level metadata and eCRF structures handed in at the system boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Study configuration supplied by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyMetadata {
    /// Study identifier used for STUDYID and USUBJID composition.
    pub study_id: String,

    /// Source column carrying the site number, when sites are collected.
    #[serde(default)]
    pub site_col: Option<String>,

    /// Source column carrying the subject number.
    #[serde(default)]
    pub subject_col: Option<String>,

    #[serde(default)]
    pub sponsor: Option<String>,

    #[serde(default)]
    pub indication: Option<String>,

    /// Free-form notes shown to the model (site-numbering convention etc.).
    #[serde(default)]
    pub conventions: BTreeMap<String, String>,
}

impl StudyMetadata {
    pub fn new(study_id: impl Into<String>) -> Self {
        Self {
            study_id: study_id.into(),
            site_col: None,
            subject_col: None,
            sponsor: None,
            indication: None,
            conventions: BTreeMap::new(),
        }
    }
}

/// One field on an eCRF form, as extracted by the external PDF parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcrfField {
    pub name: String,
    pub data_type: String,
    pub label: String,
    /// Coded values: code -> decode.
    #[serde(default)]
    pub coded_values: BTreeMap<String, String>,
}

/// One form from the study's eCRF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EcrfForm {
    pub form_name: String,
    pub fields: Vec<EcrfField>,
}
