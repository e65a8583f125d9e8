//! End-to-end review flows with a scripted reviewer.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::Utc;

use astraea_model::{
    ConfidenceLevel, CoreDesignation, DecisionStatus, DomainClass, DomainMappingSpec,
    MappingPattern, MappingSummary, SessionStatus, VariableDataType, VariableMapping,
    VariableOrigin,
};
use astraea_review::{
    CorrectionRequest, ReviewGate, ReviewInput, ReviewPrompt, ReviewStore, apply_corrections,
};

fn mapping(name: &str, confidence: f64, order: u32) -> VariableMapping {
    VariableMapping {
        sdtm_variable: name.to_string(),
        sdtm_label: name.to_string(),
        sdtm_data_type: VariableDataType::Char,
        core: CoreDesignation::Required,
        source_dataset: Some("raw.csv".to_string()),
        source_variable: Some(format!("{name}_RAW")),
        mapping_pattern: MappingPattern::Direct,
        mapping_logic: "copy".to_string(),
        derivation_rule: None,
        assigned_value: None,
        codelist_code: None,
        codelist_name: None,
        origin: VariableOrigin::Crf,
        confidence,
        confidence_level: ConfidenceLevel::from_confidence(confidence),
        needs_review: false,
        rationale: "test".to_string(),
        order,
        notes: Vec::new(),
    }
}

fn spec(domain: &str, mappings: Vec<VariableMapping>) -> DomainMappingSpec {
    let summary = MappingSummary::from_mappings(&mappings);
    DomainMappingSpec {
        domain: domain.to_string(),
        domain_label: domain.to_string(),
        domain_class: DomainClass::Events,
        structure: "one record per thing".to_string(),
        study_id: "PHA001".to_string(),
        source_datasets: vec!["raw.csv".to_string()],
        cross_domain_sources: Vec::new(),
        variable_mappings: mappings,
        unmapped_source_variables: Vec::new(),
        suppqual_candidates: Vec::new(),
        summary,
        mapping_timestamp: Utc::now(),
        model_used: "scripted".to_string(),
    }
}

#[test]
fn approve_all_completes_the_domain() {
    let store = ReviewStore::in_memory().unwrap();
    let specs = vec![spec("DM", vec![mapping("SEX", 0.9, 1), mapping("RACE", 0.7, 2)])];

    let mut gate = ReviewGate::new(
        &store,
        "tester",
        Box::new(|prompt| match prompt {
            ReviewPrompt::DomainAction { .. } => ReviewInput::ApproveAll,
            _ => panic!("unexpected prompt"),
        }),
    );
    let reviewed = gate.review_study("PHA001", &specs).unwrap();
    assert_eq!(reviewed.len(), 1);
    assert_eq!(reviewed[0].variable_mappings.len(), 2);

    let sessions = store.list_sessions().unwrap();
    assert_eq!(sessions[0].status, SessionStatus::Completed);
}

#[test]
fn two_tier_batches_high_and_walks_low() {
    let store = ReviewStore::in_memory().unwrap();
    let specs = vec![spec(
        "AE",
        vec![
            mapping("AETERM", 0.95, 1),
            mapping("AESER", 0.90, 2),
            mapping("AESEV", 0.65, 3),
        ],
    )];

    let panels_seen = Rc::new(RefCell::new(Vec::new()));
    let panels = Rc::clone(&panels_seen);
    let mut gate = ReviewGate::new(
        &store,
        "tester",
        Box::new(move |prompt| match prompt {
            ReviewPrompt::DomainAction { .. } => ReviewInput::Review,
            ReviewPrompt::HighBatch { count, .. } => {
                assert_eq!(*count, 2);
                ReviewInput::AcceptBatch
            }
            ReviewPrompt::VariablePanel { variable, .. } => {
                panels.borrow_mut().push(variable.clone());
                ReviewInput::Approve
            }
        }),
    );
    let reviewed = gate.review_study("PHA001", &specs).unwrap();
    assert_eq!(reviewed.len(), 1);
    // Only the medium-confidence mapping reached the detail panel.
    assert_eq!(panels_seen.borrow().as_slice(), ["AESEV"]);
}

#[test]
fn interrupt_then_resume_preserves_decisions() {
    let store = ReviewStore::in_memory().unwrap();
    let dm_vars: Vec<VariableMapping> = (0..12)
        .map(|i| mapping(&format!("DMVAR{i:02}"), 0.95, i + 1))
        .collect();
    let ae_vars = vec![
        mapping("AETERM", 0.65, 1),
        mapping("AESER", 0.65, 2),
        mapping("AESEV", 0.65, 3),
        mapping("AEOUT", 0.65, 4),
    ];
    let specs = vec![spec("DM", dm_vars), spec("AE", ae_vars)];

    // First run: approve all of DM, correct two AE mappings, then quit.
    let corrections_made = Rc::new(RefCell::new(0usize));
    let counter = Rc::clone(&corrections_made);
    let session_id = {
        let mut gate = ReviewGate::new(
            &store,
            "tester",
            Box::new(move |prompt| match prompt {
                ReviewPrompt::DomainAction { domain, .. } if domain == "DM" => {
                    ReviewInput::ApproveAll
                }
                ReviewPrompt::DomainAction { .. } => ReviewInput::Review,
                ReviewPrompt::HighBatch { .. } => ReviewInput::AcceptBatch,
                ReviewPrompt::VariablePanel { .. } => {
                    let mut n = counter.borrow_mut();
                    if *n < 2 {
                        *n += 1;
                        ReviewInput::Correct(CorrectionRequest::source_change(
                            "BETTER_COL",
                            "wrong source column",
                        ))
                    } else {
                        ReviewInput::Quit
                    }
                }
            }),
        );
        match gate.review_study("PHA001", &specs) {
            Err(astraea_review::ReviewError::Interrupted { session_id }) => session_id,
            other => panic!("expected interruption, got {other:?}"),
        }
    };

    // The two corrections survived the crash.
    let ae_review = store.load_domain_review(&session_id, "AE").unwrap().unwrap();
    assert_eq!(ae_review.decisions.len(), 2);
    assert!(
        ae_review
            .decisions
            .values()
            .all(|d| d.status == DecisionStatus::Corrected)
    );

    // Resume: the cursor lands on AE with two variables already decided;
    // approving the remaining two completes the session.
    let panels_seen = Rc::new(RefCell::new(Vec::new()));
    let panels = Rc::clone(&panels_seen);
    let mut gate = ReviewGate::new(
        &store,
        "tester",
        Box::new(move |prompt| match prompt {
            ReviewPrompt::DomainAction { domain, .. } => {
                assert_eq!(domain, "AE");
                ReviewInput::Review
            }
            ReviewPrompt::HighBatch { .. } => ReviewInput::AcceptBatch,
            ReviewPrompt::VariablePanel { variable, .. } => {
                panels.borrow_mut().push(variable.clone());
                ReviewInput::Approve
            }
        }),
    );
    let reviewed = gate.resume(Some(&session_id)).unwrap();

    assert_eq!(panels_seen.borrow().as_slice(), ["AESEV", "AEOUT"]);
    assert_eq!(reviewed.len(), 2);
    let ae = reviewed.iter().find(|s| s.domain == "AE").unwrap();
    let corrected = ae
        .variable_mappings
        .iter()
        .filter(|m| m.source_variable.as_deref() == Some("BETTER_COL"))
        .count();
    assert_eq!(corrected, 2);
    // Source changes reset confidence to 1.0.
    assert!(
        ae.variable_mappings
            .iter()
            .filter(|m| m.source_variable.as_deref() == Some("BETTER_COL"))
            .all(|m| m.confidence == 1.0)
    );
}

#[test]
fn rejection_removes_the_mapping_from_the_reviewed_spec() {
    let store = ReviewStore::in_memory().unwrap();
    let specs = vec![spec("CM", vec![mapping("CMTRT", 0.5, 1), mapping("CMDOSE", 0.5, 2)])];

    let mut gate = ReviewGate::new(
        &store,
        "tester",
        Box::new(|prompt| match prompt {
            ReviewPrompt::DomainAction { .. } => ReviewInput::Review,
            ReviewPrompt::HighBatch { .. } => ReviewInput::AcceptBatch,
            ReviewPrompt::VariablePanel { variable, .. } if variable == "CMDOSE" => {
                ReviewInput::Correct(CorrectionRequest::reject("hallucinated column"))
            }
            ReviewPrompt::VariablePanel { .. } => ReviewInput::Approve,
        }),
    );
    let reviewed = gate.review_study("PHA001", &specs).unwrap();
    assert_eq!(reviewed[0].variable_mappings.len(), 1);
    assert_eq!(reviewed[0].variable_mappings[0].sdtm_variable, "CMTRT");
    assert_eq!(reviewed[0].summary.total, 1);
}

#[test]
fn uninterrupted_and_resumed_runs_agree() {
    // Crash-recovery property: same choices, same final decisions.
    let build_specs = || {
        vec![spec(
            "AE",
            vec![mapping("AETERM", 0.65, 1), mapping("AESER", 0.65, 2)],
        )]
    };

    // Run A: no interruption, approve both.
    let store_a = ReviewStore::in_memory().unwrap();
    let mut gate = ReviewGate::new(
        &store_a,
        "tester",
        Box::new(|prompt| match prompt {
            ReviewPrompt::DomainAction { .. } => ReviewInput::Review,
            ReviewPrompt::HighBatch { .. } => ReviewInput::AcceptBatch,
            ReviewPrompt::VariablePanel { .. } => ReviewInput::Approve,
        }),
    );
    let run_a = gate.review_study("PHA001", &build_specs()).unwrap();

    // Run B: approve the first, quit, resume, approve the second.
    let store_b = ReviewStore::in_memory().unwrap();
    let first = RefCell::new(true);
    let mut gate = ReviewGate::new(
        &store_b,
        "tester",
        Box::new(move |prompt| match prompt {
            ReviewPrompt::DomainAction { .. } => ReviewInput::Review,
            ReviewPrompt::HighBatch { .. } => ReviewInput::AcceptBatch,
            ReviewPrompt::VariablePanel { .. } => {
                if *first.borrow() {
                    *first.borrow_mut() = false;
                    ReviewInput::Approve
                } else {
                    ReviewInput::Quit
                }
            }
        }),
    );
    let session_id = match gate.review_study("PHA001", &build_specs()) {
        Err(astraea_review::ReviewError::Interrupted { session_id }) => session_id,
        other => panic!("expected interruption, got {other:?}"),
    };
    let mut gate = ReviewGate::new(
        &store_b,
        "tester",
        Box::new(|prompt| match prompt {
            ReviewPrompt::DomainAction { .. } => ReviewInput::Review,
            ReviewPrompt::HighBatch { .. } => ReviewInput::AcceptBatch,
            ReviewPrompt::VariablePanel { .. } => ReviewInput::Approve,
        }),
    );
    let run_b = gate.resume(Some(&session_id)).unwrap();

    let decisions = |specs: &[DomainMappingSpec]| {
        specs[0]
            .variable_mappings
            .iter()
            .map(|m| m.sdtm_variable.clone())
            .collect::<Vec<_>>()
    };
    assert_eq!(decisions(&run_a), decisions(&run_b));
}

#[test]
fn apply_corrections_is_pure_over_the_review() {
    let store = ReviewStore::in_memory().unwrap();
    let specs = vec![spec("DM", vec![mapping("SEX", 0.9, 1)])];
    let mut gate = ReviewGate::new(
        &store,
        "tester",
        Box::new(|_| ReviewInput::ApproveAll),
    );
    gate.review_study("PHA001", &specs).unwrap();

    let sessions = store.list_sessions().unwrap();
    let review = store
        .load_domain_review(&sessions[0].session_id, "DM")
        .unwrap()
        .unwrap();
    let once = apply_corrections(&review);
    let twice = apply_corrections(&review);
    assert_eq!(once, twice);
}
