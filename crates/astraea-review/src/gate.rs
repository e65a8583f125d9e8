//! The two-tier interactive review flow.
//!
//! Per domain: render the spec, ask for a domain action, then either batch
//! everything, batch the high-confidence tier and walk the rest variable by
//! variable, or skip. Every single decision is persisted before the next
//! prompt, so a crash loses at most one decision. Quit raises
//! [`ReviewError::Interrupted`] with the session id; resume picks up where
//! the cursor stopped, skipping variables that already have decisions.
//!
//! The input callback is injected, so the whole flow runs in tests with a
//! scripted reviewer and no terminal.

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::info;

use astraea_model::{
    ConfidenceLevel, CorrectionType, DecisionStatus, DomainMappingSpec, DomainReview,
    HumanCorrection, MappingPattern, ReviewDecision, ReviewSession, ReviewStatus, SessionStatus,
    VariableMapping,
};

use crate::error::ReviewError;
use crate::render::{render_spec_table, render_variable_panel};
use crate::store::ReviewStore;

/// What the gate is asking the reviewer.
#[derive(Debug, Clone)]
pub enum ReviewPrompt {
    /// Choose an action for a whole domain; `table` is the rendered spec.
    DomainAction { domain: String, table: String },
    /// Accept the high-confidence tier in one go, or review it one by one.
    HighBatch { domain: String, count: usize },
    /// Decide one mapping; `panel` is the rendered detail view.
    VariablePanel {
        domain: String,
        variable: String,
        panel: String,
    },
}

/// Reviewer response to a prompt.
#[derive(Debug, Clone)]
pub enum ReviewInput {
    // Domain actions.
    ApproveAll,
    Review,
    SkipDomain,
    Quit,
    // High-confidence batch.
    AcceptBatch,
    ReviewIndividually,
    // Per-variable decisions.
    Approve,
    SkipVariable,
    Correct(CorrectionRequest),
}

/// A structured correction collected from the reviewer.
#[derive(Debug, Clone)]
pub struct CorrectionRequest {
    pub correction_type: CorrectionType,
    pub new_source_dataset: Option<String>,
    pub new_source_variable: Option<String>,
    pub new_logic: Option<String>,
    pub new_pattern: Option<MappingPattern>,
    pub new_codelist_code: Option<String>,
    pub new_confidence: Option<f64>,
    /// Full replacement mapping, for `Add`.
    pub added_mapping: Option<VariableMapping>,
    pub reason: String,
}

impl CorrectionRequest {
    pub fn reject(reason: impl Into<String>) -> Self {
        Self {
            correction_type: CorrectionType::Reject,
            new_source_dataset: None,
            new_source_variable: None,
            new_logic: None,
            new_pattern: None,
            new_codelist_code: None,
            new_confidence: None,
            added_mapping: None,
            reason: reason.into(),
        }
    }

    pub fn source_change(variable: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            correction_type: CorrectionType::SourceChange,
            new_source_dataset: None,
            new_source_variable: Some(variable.into()),
            new_logic: None,
            new_pattern: None,
            new_codelist_code: None,
            new_confidence: None,
            added_mapping: None,
            reason: reason.into(),
        }
    }
}

/// Callback the gate uses to collect reviewer input.
pub type InputFn<'a> = Box<dyn FnMut(&ReviewPrompt) -> ReviewInput + 'a>;

/// The review gate. Sole mutator of the review store.
pub struct ReviewGate<'a> {
    store: &'a ReviewStore,
    input: InputFn<'a>,
    reviewer: String,
}

/// Outcome of reviewing one domain.
#[derive(Debug)]
pub enum DomainOutcome {
    /// Review completed; the reviewed spec has corrections applied.
    Completed(DomainMappingSpec),
    /// Reviewer skipped the whole domain; original spec stands unreviewed.
    Skipped,
}

impl<'a> ReviewGate<'a> {
    pub fn new(store: &'a ReviewStore, reviewer: impl Into<String>, input: InputFn<'a>) -> Self {
        Self {
            store,
            input,
            reviewer: reviewer.into(),
        }
    }

    /// Start a fresh session over the given specs and run it to completion
    /// or interruption.
    pub fn review_study(
        &mut self,
        study_id: &str,
        specs: &[DomainMappingSpec],
    ) -> Result<Vec<DomainMappingSpec>, ReviewError> {
        let now = Utc::now();
        let session_id = new_session_id(study_id, &now.to_rfc3339());
        let session = ReviewSession {
            session_id: session_id.clone(),
            study_id: study_id.to_string(),
            created_at: now,
            updated_at: now,
            status: SessionStatus::InProgress,
            domains: specs.iter().map(|s| s.domain.clone()).collect(),
            current_domain_index: 0,
        };
        self.store.save_session(&session)?;
        // Seed a pending review per domain so resume never needs the specs.
        for spec in specs {
            if self
                .store
                .load_domain_review(&session_id, &spec.domain)?
                .is_none()
            {
                self.store
                    .save_domain_review(&DomainReview::new(session_id.clone(), spec.clone()))?;
            }
        }
        self.run_session(session)
    }

    /// Resume a session; with no id, the most recent in-progress session.
    pub fn resume(
        &mut self,
        session_id: Option<&str>,
    ) -> Result<Vec<DomainMappingSpec>, ReviewError> {
        let session = match session_id {
            Some(id) => self
                .store
                .load_session(id)?
                .ok_or_else(|| ReviewError::SessionNotFound(id.to_string()))?,
            None => self
                .store
                .latest_in_progress()?
                .ok_or_else(|| ReviewError::SessionNotFound("<latest>".to_string()))?,
        };
        info!(
            session = session.session_id.as_str(),
            domain_index = session.current_domain_index,
            "resuming review session"
        );
        self.run_session(session)
    }

    fn run_session(
        &mut self,
        mut session: ReviewSession,
    ) -> Result<Vec<DomainMappingSpec>, ReviewError> {
        let mut reviewed = Vec::new();

        // Collect results of domains already completed before this run.
        for domain in session.domains[..session.current_domain_index].iter() {
            if let Some(review) = self.store.load_domain_review(&session.session_id, domain)? {
                if review.status == ReviewStatus::Completed {
                    reviewed.push(apply_corrections(&review));
                }
            }
        }

        while session.current_domain_index < session.domains.len() {
            let domain = session.domains[session.current_domain_index].clone();
            let review = self
                .store
                .load_domain_review(&session.session_id, &domain)?
                .ok_or_else(|| ReviewError::SessionNotFound(format!("{} review missing", domain)))?;

            match self.run_domain(review)? {
                DomainOutcome::Completed(spec) => reviewed.push(spec),
                DomainOutcome::Skipped => {}
            }

            session.current_domain_index += 1;
            session.updated_at = Utc::now();
            self.store.save_session(&session)?;
        }

        session.status = SessionStatus::Completed;
        session.updated_at = Utc::now();
        self.store.save_session(&session)?;
        Ok(reviewed)
    }

    /// Run the two-tier flow for one domain.
    fn run_domain(&mut self, mut review: DomainReview) -> Result<DomainOutcome, ReviewError> {
        if review.status == ReviewStatus::Completed {
            return Ok(DomainOutcome::Completed(apply_corrections(&review)));
        }
        if review.status == ReviewStatus::Skipped {
            return Ok(DomainOutcome::Skipped);
        }

        review.status = ReviewStatus::InProgress;
        self.store.save_domain_review(&review)?;

        if !review.all_decided() {
            let prompt = ReviewPrompt::DomainAction {
                domain: review.domain.clone(),
                table: render_spec_table(&review.original_spec, &review),
            };
            match (self.input)(&prompt) {
                ReviewInput::ApproveAll => {
                    let undecided: Vec<String> = undecided_mappings(&review)
                        .into_iter()
                        .map(|m| m.sdtm_variable.clone())
                        .collect();
                    for variable in undecided {
                        self.record_decision(&mut review, ReviewDecision::approved(variable), None)?;
                    }
                }
                ReviewInput::Review => self.two_tier_review(&mut review)?,
                ReviewInput::SkipDomain => {
                    review.status = ReviewStatus::Skipped;
                    self.store.save_domain_review(&review)?;
                    return Ok(DomainOutcome::Skipped);
                }
                _ => {
                    return Err(ReviewError::Interrupted {
                        session_id: review.session_id.clone(),
                    });
                }
            }
        }

        review.status = ReviewStatus::Completed;
        review.corrections = self
            .store
            .load_corrections(&review.session_id)?
            .into_iter()
            .filter(|c| c.domain == review.domain)
            .collect();
        self.store.save_domain_review(&review)?;
        info!(domain = review.domain.as_str(), "domain review completed");
        Ok(DomainOutcome::Completed(apply_corrections(&review)))
    }

    /// Tier one: batch-approve HIGH. Tier two: walk MEDIUM and LOW.
    fn two_tier_review(&mut self, review: &mut DomainReview) -> Result<(), ReviewError> {
        let high: Vec<VariableMapping> = undecided_mappings(review)
            .into_iter()
            .filter(|m| m.confidence_level == ConfidenceLevel::High)
            .cloned()
            .collect();

        if !high.is_empty() {
            let prompt = ReviewPrompt::HighBatch {
                domain: review.domain.clone(),
                count: high.len(),
            };
            match (self.input)(&prompt) {
                ReviewInput::AcceptBatch => {
                    for mapping in &high {
                        self.record_decision(
                            review,
                            ReviewDecision::approved(mapping.sdtm_variable.clone()),
                            None,
                        )?;
                    }
                }
                ReviewInput::ReviewIndividually => {
                    for mapping in &high {
                        self.review_one(review, mapping)?;
                    }
                }
                _ => {
                    return Err(ReviewError::Interrupted {
                        session_id: review.session_id.clone(),
                    });
                }
            }
        }

        let lower: Vec<VariableMapping> = undecided_mappings(review)
            .into_iter()
            .filter(|m| m.confidence_level != ConfidenceLevel::High)
            .cloned()
            .collect();
        for mapping in &lower {
            self.review_one(review, mapping)?;
        }
        Ok(())
    }

    fn review_one(
        &mut self,
        review: &mut DomainReview,
        mapping: &VariableMapping,
    ) -> Result<(), ReviewError> {
        if review.is_decided(&mapping.sdtm_variable) {
            return Ok(());
        }
        let prompt = ReviewPrompt::VariablePanel {
            domain: review.domain.clone(),
            variable: mapping.sdtm_variable.clone(),
            panel: render_variable_panel(mapping),
        };
        match (self.input)(&prompt) {
            ReviewInput::Approve => self.record_decision(
                review,
                ReviewDecision::approved(mapping.sdtm_variable.clone()),
                None,
            ),
            ReviewInput::SkipVariable => self.record_decision(
                review,
                ReviewDecision::skipped(mapping.sdtm_variable.clone()),
                None,
            ),
            ReviewInput::Correct(request) => {
                let corrected = build_corrected_mapping(mapping, &request);
                let decision = ReviewDecision::corrected(
                    mapping.sdtm_variable.clone(),
                    request.correction_type,
                    corrected.clone(),
                );
                let correction = HumanCorrection {
                    session_id: review.session_id.clone(),
                    study_id: review.original_spec.study_id.clone(),
                    domain: review.domain.clone(),
                    sdtm_variable: mapping.sdtm_variable.clone(),
                    correction_type: request.correction_type,
                    original_mapping: mapping.clone(),
                    corrected_mapping: corrected,
                    reason: request.reason.clone(),
                    reviewer: self.reviewer.clone(),
                    timestamp: Utc::now(),
                    invalidated: false,
                };
                self.record_decision(review, decision, Some(correction))
            }
            _ => Err(ReviewError::Interrupted {
                session_id: review.session_id.clone(),
            }),
        }
    }

    /// Record one decision and persist immediately.
    fn record_decision(
        &mut self,
        review: &mut DomainReview,
        decision: ReviewDecision,
        correction: Option<HumanCorrection>,
    ) -> Result<(), ReviewError> {
        review
            .decisions
            .insert(decision.sdtm_variable.clone(), decision);
        if let Some(correction) = correction {
            self.store.save_correction(&correction)?;
        }
        self.store.save_domain_review(review)
    }
}

fn undecided_mappings(review: &DomainReview) -> Vec<&VariableMapping> {
    review
        .original_spec
        .variable_mappings
        .iter()
        .filter(|m| !review.is_decided(&m.sdtm_variable))
        .collect()
}

/// Build the replacement mapping for a correction request.
///
/// A source change resets confidence to 1.0: the reviewer looked at the
/// data. A rejection produces no replacement.
fn build_corrected_mapping(
    original: &VariableMapping,
    request: &CorrectionRequest,
) -> Option<VariableMapping> {
    match request.correction_type {
        CorrectionType::Reject => None,
        CorrectionType::Add => request.added_mapping.clone(),
        _ => {
            let mut corrected = original.clone();
            match request.correction_type {
                CorrectionType::SourceChange => {
                    if request.new_source_dataset.is_some() {
                        corrected.source_dataset = request.new_source_dataset.clone();
                    }
                    corrected.source_variable = request.new_source_variable.clone();
                    corrected.confidence = 1.0;
                    corrected.confidence_level = ConfidenceLevel::High;
                    corrected.needs_review = false;
                }
                CorrectionType::LogicChange => {
                    if let Some(logic) = &request.new_logic {
                        corrected.mapping_logic = logic.clone();
                    }
                }
                CorrectionType::PatternChange => {
                    if let Some(pattern) = request.new_pattern {
                        corrected.mapping_pattern = pattern;
                    }
                    if let Some(logic) = &request.new_logic {
                        corrected.mapping_logic = logic.clone();
                    }
                }
                CorrectionType::CtChange => {
                    corrected.codelist_code = request.new_codelist_code.clone();
                    corrected.codelist_name = None;
                }
                CorrectionType::ConfidenceOverride => {
                    if let Some(confidence) = request.new_confidence {
                        corrected.confidence = confidence.clamp(0.0, 1.0);
                        corrected.confidence_level =
                            ConfidenceLevel::from_confidence(corrected.confidence);
                    }
                }
                CorrectionType::Reject | CorrectionType::Add => unreachable!(),
            }
            Some(corrected)
        }
    }
}

/// Materialise the reviewed spec from a completed review.
///
/// Corrected mappings replace originals, rejections are removed, additions
/// are appended, approved and skipped mappings are retained as proposed.
pub fn apply_corrections(review: &DomainReview) -> DomainMappingSpec {
    let mut spec = review.original_spec.clone();
    let mut mappings = Vec::with_capacity(spec.variable_mappings.len());

    for mapping in &spec.variable_mappings {
        match review.decisions.get(&mapping.sdtm_variable) {
            Some(decision) if decision.status == DecisionStatus::Corrected => {
                match &decision.corrected_mapping {
                    Some(corrected) => mappings.push(corrected.clone()),
                    None => {} // rejected
                }
            }
            _ => mappings.push(mapping.clone()),
        }
    }

    // Additions: corrected decisions for variables not in the original spec.
    for decision in review.decisions.values() {
        if decision.status == DecisionStatus::Corrected
            && decision.correction_type == Some(CorrectionType::Add)
        {
            if let Some(added) = &decision.corrected_mapping {
                if !mappings
                    .iter()
                    .any(|m| m.sdtm_variable.eq_ignore_ascii_case(&added.sdtm_variable))
                {
                    mappings.push(added.clone());
                }
            }
        }
    }

    mappings.sort_by_key(|m| m.order);
    spec.variable_mappings = mappings;
    spec.refresh_summary();
    spec
}

fn new_session_id(study_id: &str, timestamp: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(study_id.as_bytes());
    hasher.update(b"|");
    hasher.update(timestamp.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    format!("rev-{}", &digest[..12])
}
