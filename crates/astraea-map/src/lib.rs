//! Mapping: prompt assembly, LLM transport, proposal enrichment.
//!
//! One domain at a time: the context builder produces a bounded prompt, the
//! transport runs a schema-constrained call, and the engine turns the raw
//! proposal into an enriched [`astraea_model::DomainMappingSpec`] with
//! deterministic confidence adjustments and Required-coverage findings.

pub mod context;
pub mod engine;
pub mod error;
pub mod instructions;
pub mod transport;

pub use crate::context::{PromptInputs, build_prompt};
pub use crate::engine::{
    MapDomainRequest, MappingEngine, MappingOutcome, check_required_coverage,
};
pub use crate::error::{MappingEngineError, TransportError};
pub use crate::instructions::{MAPPING_INSTRUCTIONS, MAPPING_SYSTEM_PROMPT};
pub use crate::transport::{
    AnthropicTransport, ProposalRequest, ProposalTransport, ScriptedTransport, TransportConfig,
};
