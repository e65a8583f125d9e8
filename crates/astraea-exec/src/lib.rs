//! Deterministic execution of reviewed mapping specifications.
//!
//! The engine interprets a [`astraea_model::DomainMappingSpec`] against raw
//! polars frames: per-pattern handlers, the derivation mini-DSL,
//! cross-domain derivations through an immutable [`CrossDomainContext`],
//! SUPPQUAL generation, and transport-format finishing (column order,
//! widths, types, sequence numbers). DM must execute before any other
//! domain; SUPPQUAL generates only after its parent is finalised.

pub mod context;
pub mod dsl;
pub mod engine;
pub mod error;
pub mod frame;
pub mod handlers;
pub mod lc;
pub mod preprocess;
pub mod suppqual;
pub mod transpose;

pub use crate::context::CrossDomainContext;
pub use crate::engine::{ExecutedDomain, ExecutionEngine};
pub use crate::error::{ExecutionError, HandlerError};
pub use crate::frame::{CsvDatasetWriter, DatasetWriter, DomainFrame};
pub use crate::lc::build_lc_from_lb;
pub use crate::suppqual::{build_suppqual, check_suppqual_integrity, suppqual_domain_code};
pub use crate::transpose::{TransposeSpec, TransposeValue, parse_transpose_rule};
