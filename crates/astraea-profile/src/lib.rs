//! Source profiling and heuristic classification.
//!
//! The profiler turns each raw input into a [`astraea_model::DatasetProfile`];
//! the classifier scores every profile against every bundled domain and
//! proposes per-domain merge groups. Both are deterministic; no model call
//! happens before the mapping engine.

pub mod classify;
pub mod profiler;

pub use crate::classify::{
    CLASSIFICATION_FLOOR, ClassificationPlan, DomainScore, classify_profiles, filename_score,
    variable_overlap_score,
};
pub use crate::profiler::{is_edc_system_column, profile_dataset};
