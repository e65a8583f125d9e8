//! Proposal enrichment and the mapping engine.
//!
//! The engine owns the full §mapping flow: look up the domain spec, build
//! the prompt, call the transport, then validate and enrich every proposed
//! mapping against the reference store. Enrichment never fails a mapping;
//! gaps become notes and deterministic confidence adjustments, and missing
//! Required coverage becomes a finding the review gate surfaces.

use chrono::Utc;
use tracing::{info, warn};

use astraea_model::{
    ConfidenceLevel, CoreDesignation, DatasetProfile, DomainMappingSpec, EcrfForm, MappingPattern,
    MappingSummary, ReferenceDomain, RuleCategory, RuleResult, RuleSeverity, StudyMetadata,
    VariableDataType, VariableMapping, VariableMappingProposal, VariableOrigin,
};
use astraea_reference::ReferenceStore;

use crate::context::{PromptInputs, build_prompt};
use crate::error::MappingEngineError;
use crate::instructions::{MAPPING_INSTRUCTIONS, MAPPING_SYSTEM_PROMPT};
use crate::transport::{ProposalRequest, ProposalTransport};

/// Boost for LOOKUP_RECODE mappings whose codelist is bundled.
const BUNDLED_CODELIST_BOOST: f64 = 0.05;
/// Cap when a proposed value misses a non-extensible codelist.
const NON_EXTENSIBLE_MISS_CAP: f64 = 0.40;
/// Cap when the proposed source column exists in no profile.
const UNKNOWN_SOURCE_CAP: f64 = 0.30;
/// Required variables below this confidence are flagged for mandatory review.
const REQUIRED_REVIEW_FLOOR: f64 = 0.70;

/// Inputs for one domain mapping run.
pub struct MapDomainRequest<'a> {
    pub domain: &'a str,
    pub source_profiles: &'a [DatasetProfile],
    pub ecrf_forms: &'a [EcrfForm],
    pub study_metadata: &'a StudyMetadata,
    pub cross_domain_profiles: &'a [DatasetProfile],
    pub learned_examples: Option<&'a str>,
}

/// A mapping spec plus the Required-coverage findings registered against it.
#[derive(Debug, Clone)]
pub struct MappingOutcome {
    pub spec: DomainMappingSpec,
    pub coverage_findings: Vec<RuleResult>,
}

/// The mapping engine: one LLM call per domain, deterministic everything else.
pub struct MappingEngine<'a> {
    reference: &'a ReferenceStore,
    transport: &'a dyn ProposalTransport,
}

impl<'a> MappingEngine<'a> {
    pub fn new(reference: &'a ReferenceStore, transport: &'a dyn ProposalTransport) -> Self {
        Self {
            reference,
            transport,
        }
    }

    /// Map one domain end to end.
    pub fn map_domain(
        &self,
        request: &MapDomainRequest<'_>,
    ) -> Result<MappingOutcome, MappingEngineError> {
        let domain_spec = self.reference.get_domain_spec(request.domain)?;

        let codelists: Vec<_> = domain_spec
            .variables
            .iter()
            .filter_map(|v| v.codelist_code.as_deref())
            .filter_map(|code| self.reference.lookup_codelist(code))
            .collect();

        let context = build_prompt(&PromptInputs {
            domain: request.domain,
            domain_spec,
            source_profiles: request.source_profiles,
            ecrf_forms: request.ecrf_forms,
            codelists: &codelists,
            study_metadata: request.study_metadata,
            cross_domain_profiles: request.cross_domain_profiles,
            learned_examples: request.learned_examples,
        });
        let prompt = format!("{context}\n{MAPPING_INSTRUCTIONS}");

        let proposal = self
            .transport
            .propose(&ProposalRequest::new(MAPPING_SYSTEM_PROMPT, prompt))
            .map_err(|e| MappingEngineError::Transport(e.to_string()))?;

        let mut mappings = Vec::with_capacity(proposal.variable_mappings.len());
        for (idx, proposed) in proposal.variable_mappings.iter().enumerate() {
            mappings.push(self.enrich(domain_spec, proposed, idx, request));
        }
        mappings.sort_by_key(|m| m.order);

        let coverage_findings = check_required_coverage(domain_spec, &mappings);
        let summary = MappingSummary::from_mappings(&mappings);
        info!(
            domain = request.domain,
            total = summary.total,
            high = summary.high_count,
            uncovered_required = coverage_findings.len(),
            "domain mapped"
        );

        let spec = DomainMappingSpec {
            domain: domain_spec.code.clone(),
            domain_label: domain_spec.label.clone(),
            domain_class: domain_spec.class,
            structure: domain_spec.structure_note.clone(),
            study_id: request.study_metadata.study_id.clone(),
            source_datasets: request
                .source_profiles
                .iter()
                .map(|p| p.filename.clone())
                .collect(),
            cross_domain_sources: request
                .cross_domain_profiles
                .iter()
                .map(|p| p.filename.clone())
                .collect(),
            variable_mappings: mappings,
            unmapped_source_variables: proposal.unmapped_source_variables,
            suppqual_candidates: proposal.suppqual_candidates,
            summary,
            mapping_timestamp: Utc::now(),
            model_used: self.transport.model_name().to_string(),
        };

        Ok(MappingOutcome {
            spec,
            coverage_findings,
        })
    }

    /// Validate one proposal against the reference store and compute its
    /// final confidence. Never fails; gaps become notes and caps.
    fn enrich(
        &self,
        domain_spec: &ReferenceDomain,
        proposed: &VariableMappingProposal,
        index: usize,
        request: &MapDomainRequest<'_>,
    ) -> VariableMapping {
        let mut notes = Vec::new();
        let mut confidence = proposed.confidence.clamp(0.0, 1.0);

        let reference_variable = domain_spec.find_variable(&proposed.sdtm_variable);
        let (label, data_type, core, order) = match reference_variable {
            Some(var) => (var.label.clone(), var.data_type, var.core, var.order),
            None => {
                notes.push(format!(
                    "{} is not in the {} reference spec",
                    proposed.sdtm_variable, domain_spec.code
                ));
                (
                    proposed.sdtm_variable.clone(),
                    VariableDataType::Char,
                    CoreDesignation::Permissible,
                    900 + index as u32,
                )
            }
        };

        let codelist_code = proposed
            .codelist_code
            .clone()
            .or_else(|| reference_variable.and_then(|v| v.codelist_code.clone()));
        let codelist = codelist_code
            .as_deref()
            .and_then(|code| self.reference.lookup_codelist(code));
        let codelist_name = codelist.map(|cl| cl.name.clone());

        if let Some(cl) = codelist {
            // Proposed constant values are checked against the codelist.
            // ASSIGN skips the cap: the codelist backing a hardcoded
            // assignment may simply not be bundled.
            if proposed.mapping_pattern != MappingPattern::Assign {
                if let Some(value) = proposed.assigned_value.as_deref() {
                    if !cl.is_valid(value) {
                        if cl.extensible {
                            notes.push(format!(
                                "'{value}' is not a term of extensible codelist {}",
                                cl.code
                            ));
                        } else {
                            notes.push(format!(
                                "'{value}' is not a term of non-extensible codelist {}",
                                cl.code
                            ));
                            confidence = confidence.min(NON_EXTENSIBLE_MISS_CAP);
                        }
                    }
                }
            }
            if proposed.mapping_pattern == MappingPattern::LookupRecode {
                confidence = (confidence + BUNDLED_CODELIST_BOOST).min(1.0);
            }
        } else if let Some(code) = codelist_code.as_deref() {
            notes.push(format!("codelist {code} is not bundled"));
        }

        if let Some(source_variable) = proposed.source_variable.as_deref() {
            let known = request
                .source_profiles
                .iter()
                .chain(request.cross_domain_profiles)
                .any(|profile| profile.has_variable(source_variable));
            if !known {
                notes.push(format!(
                    "source variable {source_variable} not found in any profiled dataset"
                ));
                confidence = confidence.min(UNKNOWN_SOURCE_CAP);
            }
        }

        let needs_review = core.is_required() && confidence < REQUIRED_REVIEW_FLOOR;
        if needs_review {
            warn!(
                variable = proposed.sdtm_variable.as_str(),
                confidence, "required variable flagged for mandatory review"
            );
        }

        VariableMapping {
            sdtm_variable: proposed.sdtm_variable.clone(),
            sdtm_label: label,
            sdtm_data_type: data_type,
            core,
            source_dataset: proposed.source_dataset.clone(),
            source_variable: proposed.source_variable.clone(),
            mapping_pattern: proposed.mapping_pattern,
            mapping_logic: proposed.mapping_logic.clone(),
            derivation_rule: proposed.derivation_rule.clone(),
            assigned_value: proposed.assigned_value.clone(),
            codelist_code,
            codelist_name,
            origin: infer_origin(proposed),
            confidence,
            confidence_level: ConfidenceLevel::from_confidence(confidence),
            needs_review,
            rationale: proposed.rationale.clone(),
            order,
            notes,
        }
    }
}

/// Origin for define.xml, inferred from the pattern and target variable.
fn infer_origin(proposed: &VariableMappingProposal) -> VariableOrigin {
    let upper = proposed.sdtm_variable.to_uppercase();
    match proposed.mapping_pattern {
        MappingPattern::Assign => VariableOrigin::Assigned,
        MappingPattern::Derivation => VariableOrigin::Derived,
        MappingPattern::Combine if upper == "USUBJID" => VariableOrigin::Derived,
        _ if upper.ends_with("DY") || upper == "EPOCH" => VariableOrigin::Derived,
        _ => VariableOrigin::Crf,
    }
}

/// One finding per Required variable the proposal left uncovered.
pub fn check_required_coverage(
    domain_spec: &ReferenceDomain,
    mappings: &[VariableMapping],
) -> Vec<RuleResult> {
    domain_spec
        .required_variables()
        .filter(|var| {
            !mappings
                .iter()
                .any(|m| m.sdtm_variable.eq_ignore_ascii_case(&var.name))
        })
        .map(|var| RuleResult {
            rule_id: "COV001".to_string(),
            rule_description: "Required variable has no mapping".to_string(),
            category: RuleCategory::Presence,
            severity: RuleSeverity::Error,
            domain: domain_spec.code.clone(),
            variable: Some(var.name.clone()),
            message: format!(
                "{}.{} is Required but the proposal does not map it",
                domain_spec.code, var.name
            ),
            affected_count: 1,
            fix_suggestion: Some(format!(
                "add a mapping for {} or record why no source exists",
                var.name
            )),
            p21_equivalent: Some("SD0056".to_string()),
        })
        .collect()
}
