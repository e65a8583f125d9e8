//! Interactive mapping review.
//!
//! A persistent, resumable, two-tier review flow: high-confidence mappings
//! batch-approve in one prompt, everything else gets a detail panel. The
//! input callback is injected so the flow is testable without a terminal,
//! and every decision is persisted the moment it is made.

pub mod error;
pub mod gate;
pub mod render;
pub mod store;

pub use crate::error::ReviewError;
pub use crate::gate::{
    CorrectionRequest, DomainOutcome, InputFn, ReviewGate, ReviewInput, ReviewPrompt,
    apply_corrections,
};
pub use crate::render::{render_spec_table, render_variable_panel};
pub use crate::store::{ReviewStore, correction_id};
