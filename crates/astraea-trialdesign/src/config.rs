//! Trial-design configuration.
//!
//! Everything here is supplied by the study team as JSON; no model call is
//! involved in any trial-design domain.

use serde::{Deserialize, Serialize};

/// One trial summary parameter value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TsParameter {
    /// TSPARMCD (e.g. "TITLE").
    pub parmcd: String,
    /// TSPARM long name (e.g. "Trial Title").
    pub parm: String,
    /// TSVAL.
    pub value: String,
}

/// Trial summary configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TsConfig {
    pub parameters: Vec<TsParameter>,
}

/// One planned arm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmConfig {
    pub armcd: String,
    pub arm: String,
    /// Element codes in planned order.
    pub elements: Vec<String>,
}

/// One planned element.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementConfig {
    pub etcd: String,
    pub element: String,
    pub epoch: String,
    pub start_rule: String,
    #[serde(default)]
    pub end_rule: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
}

/// One planned visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitConfig {
    pub visitnum: f64,
    pub visit: String,
    pub start_rule: String,
    #[serde(default)]
    pub end_rule: Option<String>,
}

/// One inclusion/exclusion criterion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CriterionConfig {
    pub ietestcd: String,
    pub ietest: String,
    /// "INCLUSION" or "EXCLUSION".
    pub category: String,
}

/// Full trial-design configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrialDesignConfig {
    #[serde(default)]
    pub arms: Vec<ArmConfig>,
    #[serde(default)]
    pub elements: Vec<ElementConfig>,
    #[serde(default)]
    pub visits: Vec<VisitConfig>,
    #[serde(default)]
    pub criteria: Vec<CriterionConfig>,
}
