//! Type-safe enumerations shared across the Astraea pipeline.
//!
//! These enums give compile-time shape to concepts the SDTM standards and
//! the mapping pipeline represent as strings. Dispatch over them is closed:
//! every `match` in the pattern handlers and the validation engine is
//! exhaustive by construction.
//!
//! # SDTMIG Reference
//!
//! - Dataset classes: SDTMIG v3.4 Chapter 2
//! - Core designation: SDTMIG v3.4 Section 4.1.5
//! - Origin values: Define-XML v2.0 Section 4.4

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dataset class per SDTMIG v3.4 Chapter 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DomainClass {
    /// Events: AE, CE, DS, DV, HO, MH
    Events,
    /// Interventions: CM, EC, EX, PR, SU
    Interventions,
    /// Findings: DA, EG, IE, LB, PC, QS, VS, ...
    Findings,
    /// Special-Purpose: CO, DM, SE, SV
    #[serde(rename = "Special-Purpose")]
    SpecialPurpose,
    /// Trial Design: TA, TE, TI, TS, TV
    #[serde(rename = "Trial-Design")]
    TrialDesign,
    /// Relationship: RELREC, SUPPQUAL
    Relationship,
}

impl DomainClass {
    /// Canonical class name as it appears in submission metadata.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Events => "Events",
            Self::Interventions => "Interventions",
            Self::Findings => "Findings",
            Self::SpecialPurpose => "Special-Purpose",
            Self::TrialDesign => "Trial-Design",
            Self::Relationship => "Relationship",
        }
    }

    /// True for the three general observation classes.
    pub fn is_general_observation(&self) -> bool {
        matches!(self, Self::Events | Self::Interventions | Self::Findings)
    }
}

impl fmt::Display for DomainClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DomainClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace(['-', '_'], " ");
        match normalized.as_str() {
            "EVENTS" => Ok(Self::Events),
            "INTERVENTIONS" => Ok(Self::Interventions),
            "FINDINGS" => Ok(Self::Findings),
            "SPECIAL PURPOSE" => Ok(Self::SpecialPurpose),
            "TRIAL DESIGN" => Ok(Self::TrialDesign),
            "RELATIONSHIP" => Ok(Self::Relationship),
            _ => Err(format!("Unknown domain class: {s}")),
        }
    }
}

/// Variable data type. SDTM supports exactly two: character and numeric
/// (8-byte IEEE float in the transport format).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableDataType {
    Char,
    Num,
}

impl VariableDataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Char => "Char",
            Self::Num => "Num",
        }
    }
}

impl fmt::Display for VariableDataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VariableDataType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CHAR" | "CHARACTER" | "TEXT" => Ok(Self::Char),
            "NUM" | "NUMERIC" | "FLOAT" | "INTEGER" => Ok(Self::Num),
            _ => Err(format!("Unknown variable data type: {s}")),
        }
    }
}

/// Core designation per SDTMIG v3.4 Section 4.1.5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoreDesignation {
    /// Required (Req): must be present and non-null.
    #[serde(rename = "Req")]
    Required,
    /// Expected (Exp): present when applicable, null allowed.
    #[serde(rename = "Exp")]
    Expected,
    /// Permissible (Perm): optional.
    #[serde(rename = "Perm")]
    Permissible,
}

impl CoreDesignation {
    /// Short code as it appears in the implementation guide tables.
    pub fn as_code(&self) -> &'static str {
        match self {
            Self::Required => "Req",
            Self::Expected => "Exp",
            Self::Permissible => "Perm",
        }
    }

    pub fn is_required(&self) -> bool {
        matches!(self, Self::Required)
    }
}

impl fmt::Display for CoreDesignation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_code())
    }
}

impl FromStr for CoreDesignation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "REQ" | "REQUIRED" => Ok(Self::Required),
            "EXP" | "EXPECTED" => Ok(Self::Expected),
            "PERM" | "PERMISSIBLE" => Ok(Self::Permissible),
            _ => Err(format!("Unknown core designation: {s}")),
        }
    }
}

/// The closed set of mapping patterns a proposal may use.
///
/// Each pattern has exactly one handler in the execution engine; TRANSPOSE
/// operates at dataset scope before per-variable dispatch.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingPattern {
    /// Constant value for every row.
    Assign,
    /// Copy the source column unchanged.
    Direct,
    /// Copy with a name change only (origin stays Collected).
    Rename,
    /// Value-level reformat through a named transform.
    Reformat,
    /// Extract part of a source value (substring, delimiter, regex group).
    Split,
    /// Concatenate columns and literals.
    Combine,
    /// Named derivation, possibly across domains.
    Derivation,
    /// Controlled-terminology recode through a codelist.
    LookupRecode,
    /// Wide-to-tall reshape for Findings sources.
    Transpose,
}

impl MappingPattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Assign => "ASSIGN",
            Self::Direct => "DIRECT",
            Self::Rename => "RENAME",
            Self::Reformat => "REFORMAT",
            Self::Split => "SPLIT",
            Self::Combine => "COMBINE",
            Self::Derivation => "DERIVATION",
            Self::LookupRecode => "LOOKUP_RECODE",
            Self::Transpose => "TRANSPOSE",
        }
    }

    /// All patterns, in the order they are documented to the model.
    pub fn all() -> [Self; 9] {
        [
            Self::Assign,
            Self::Direct,
            Self::Rename,
            Self::Reformat,
            Self::Split,
            Self::Combine,
            Self::Derivation,
            Self::LookupRecode,
            Self::Transpose,
        ]
    }
}

impl fmt::Display for MappingPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MappingPattern {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ASSIGN" => Ok(Self::Assign),
            "DIRECT" => Ok(Self::Direct),
            "RENAME" => Ok(Self::Rename),
            "REFORMAT" => Ok(Self::Reformat),
            "SPLIT" => Ok(Self::Split),
            "COMBINE" => Ok(Self::Combine),
            "DERIVATION" => Ok(Self::Derivation),
            "LOOKUP_RECODE" | "LOOKUP RECODE" => Ok(Self::LookupRecode),
            "TRANSPOSE" => Ok(Self::Transpose),
            _ => Err(format!("Unknown mapping pattern: {s}")),
        }
    }
}

/// Categorised mapping confidence.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    /// High ≥ 0.85, Medium ≥ 0.60, Low otherwise.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.85 {
            Self::High
        } else if confidence >= 0.60 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
        }
    }
}

impl fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Variable origin per Define-XML v2.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VariableOrigin {
    #[serde(rename = "CRF")]
    Crf,
    Derived,
    Assigned,
    Protocol,
    #[serde(rename = "eDT")]
    Edt,
    Predecessor,
}

impl VariableOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crf => "CRF",
            Self::Derived => "Derived",
            Self::Assigned => "Assigned",
            Self::Protocol => "Protocol",
            Self::Edt => "eDT",
            Self::Predecessor => "Predecessor",
        }
    }
}

impl fmt::Display for VariableOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a single variable review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStatus {
    Approved,
    Corrected,
    Skipped,
}

impl DecisionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approved => "approved",
            Self::Corrected => "corrected",
            Self::Skipped => "skipped",
        }
    }
}

/// The kind of correction a reviewer applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionType {
    SourceChange,
    LogicChange,
    PatternChange,
    CtChange,
    ConfidenceOverride,
    Reject,
    Add,
}

impl CorrectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SourceChange => "source_change",
            Self::LogicChange => "logic_change",
            Self::PatternChange => "pattern_change",
            Self::CtChange => "ct_change",
            Self::ConfidenceOverride => "confidence_override",
            Self::Reject => "reject",
            Self::Add => "add",
        }
    }
}

impl FromStr for CorrectionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "source_change" => Ok(Self::SourceChange),
            "logic_change" => Ok(Self::LogicChange),
            "pattern_change" => Ok(Self::PatternChange),
            "ct_change" => Ok(Self::CtChange),
            "confidence_override" => Ok(Self::ConfidenceOverride),
            "reject" => Ok(Self::Reject),
            "add" => Ok(Self::Add),
            _ => Err(format!("Unknown correction type: {s}")),
        }
    }
}

/// Status of a per-domain review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Pending,
    InProgress,
    Completed,
    Skipped,
}

impl ReviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        }
    }
}

impl FromStr for ReviewStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Unknown review status: {s}")),
        }
    }
}

/// Lifecycle status of a review session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Abandoned,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Abandoned => "abandoned",
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "abandoned" => Ok(Self::Abandoned),
            _ => Err(format!("Unknown session status: {s}")),
        }
    }
}

/// Validation finding severity, most severe first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleSeverity {
    Error,
    Warning,
    Notice,
    Informational,
}

impl RuleSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warning => "WARNING",
            Self::Notice => "NOTICE",
            Self::Informational => "INFORMATIONAL",
        }
    }
}

impl fmt::Display for RuleSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Validation rule category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleCategory {
    Terminology,
    Presence,
    Consistency,
    Limits,
    Format,
    FdaBusiness,
    FdaTrc,
    Suppqual,
    Ordering,
}

impl RuleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Terminology => "TERMINOLOGY",
            Self::Presence => "PRESENCE",
            Self::Consistency => "CONSISTENCY",
            Self::Limits => "LIMITS",
            Self::Format => "FORMAT",
            Self::FdaBusiness => "FDA_BUSINESS",
            Self::FdaTrc => "FDA_TRC",
            Self::Suppqual => "SUPPQUAL",
            Self::Ordering => "ORDERING",
        }
    }
}

/// Origin of a supplemental qualifier value (QORIG).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuppOrigin {
    Crf,
    Assigned,
    Derived,
    Protocol,
}

impl SuppOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crf => "CRF",
            Self::Assigned => "ASSIGNED",
            Self::Derived => "DERIVED",
            Self::Protocol => "PROTOCOL",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_level_thresholds() {
        assert_eq!(ConfidenceLevel::from_confidence(0.85), ConfidenceLevel::High);
        assert_eq!(
            ConfidenceLevel::from_confidence(0.8499),
            ConfidenceLevel::Medium
        );
        assert_eq!(ConfidenceLevel::from_confidence(0.60), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_confidence(0.5999), ConfidenceLevel::Low);
        assert_eq!(ConfidenceLevel::from_confidence(0.0), ConfidenceLevel::Low);
    }

    #[test]
    fn mapping_pattern_round_trip() {
        for pattern in MappingPattern::all() {
            assert_eq!(pattern.as_str().parse::<MappingPattern>().unwrap(), pattern);
        }
    }

    #[test]
    fn core_designation_from_str() {
        assert_eq!(
            "Req".parse::<CoreDesignation>().unwrap(),
            CoreDesignation::Required
        );
        assert_eq!(
            "EXPECTED".parse::<CoreDesignation>().unwrap(),
            CoreDesignation::Expected
        );
    }

    #[test]
    fn origin_serde_spelling() {
        let json = serde_json::to_string(&VariableOrigin::Edt).unwrap();
        assert_eq!(json, "\"eDT\"");
    }
}
