//! Learning substrate behavior: cold start, ingestion, idempotence,
//! retrieval formatting.

use std::collections::BTreeMap;

use chrono::Utc;

use astraea_learn::{
    LearningRetriever, LearningStore, LearningSubstrate, SemanticIndex, improvement_report,
};
use astraea_model::{
    ConfidenceLevel, CoreDesignation, CorrectionType, DatasetProfile, DomainClass,
    DomainMappingSpec, DomainReview, HumanCorrection, MappingPattern, MappingSummary,
    ReviewDecision, ReviewStatus, StudyDomainMetrics, VariableDataType, VariableMapping,
    VariableOrigin, VariableProfile,
};

fn mapping(name: &str, pattern: MappingPattern, source: Option<&str>) -> VariableMapping {
    VariableMapping {
        sdtm_variable: name.to_string(),
        sdtm_label: name.to_string(),
        sdtm_data_type: VariableDataType::Char,
        core: CoreDesignation::Expected,
        source_dataset: Some("ae.csv".to_string()),
        source_variable: source.map(str::to_string),
        mapping_pattern: pattern,
        mapping_logic: format!("map {name} from the raw column"),
        derivation_rule: None,
        assigned_value: None,
        codelist_code: None,
        codelist_name: None,
        origin: VariableOrigin::Crf,
        confidence: 0.9,
        confidence_level: ConfidenceLevel::High,
        needs_review: false,
        rationale: "test".to_string(),
        order: 1,
        notes: Vec::new(),
    }
}

fn ae_spec() -> DomainMappingSpec {
    let mappings = vec![
        mapping("AETERM", MappingPattern::Direct, Some("AETERM_RAW")),
        mapping("AESEV", MappingPattern::LookupRecode, Some("AESEV_STD")),
    ];
    let summary = MappingSummary::from_mappings(&mappings);
    DomainMappingSpec {
        domain: "AE".to_string(),
        domain_label: "Adverse Events".to_string(),
        domain_class: DomainClass::Events,
        structure: String::new(),
        study_id: "PHA001".to_string(),
        source_datasets: vec!["ae.csv".to_string()],
        cross_domain_sources: Vec::new(),
        variable_mappings: mappings,
        unmapped_source_variables: Vec::new(),
        suppqual_candidates: Vec::new(),
        summary,
        mapping_timestamp: Utc::now(),
        model_used: "scripted".to_string(),
    }
}

fn completed_review() -> DomainReview {
    let spec = ae_spec();
    let mut review = DomainReview::new("sess-1", spec.clone());
    review.status = ReviewStatus::Completed;
    review
        .decisions
        .insert("AETERM".to_string(), ReviewDecision::approved("AETERM"));

    let mut corrected = spec.variable_mappings[1].clone();
    corrected.source_variable = Some("AESEV_CODED".to_string());
    review.decisions.insert(
        "AESEV".to_string(),
        ReviewDecision::corrected("AESEV", CorrectionType::SourceChange, Some(corrected.clone())),
    );
    review.corrections.push(HumanCorrection {
        session_id: "sess-1".to_string(),
        study_id: "PHA001".to_string(),
        domain: "AE".to_string(),
        sdtm_variable: "AESEV".to_string(),
        correction_type: CorrectionType::SourceChange,
        original_mapping: spec.variable_mappings[1].clone(),
        corrected_mapping: Some(corrected),
        reason: "severity lives in the coded column".to_string(),
        reviewer: "tester".to_string(),
        timestamp: Utc::now(),
        invalidated: false,
    });
    review
}

fn ae_profile() -> DatasetProfile {
    DatasetProfile {
        filename: "ae.csv".to_string(),
        row_count: 10,
        variables: vec![VariableProfile {
            name: "AESEV_STD".to_string(),
            label: Some("Severity (coded)".to_string()),
            dtype: "str".to_string(),
            n_unique: 3,
            n_missing: 0,
            sample_values: vec!["MILD".to_string()],
            is_edc_system_column: false,
        }],
        is_sdtm_preformatted: false,
        domain_metadata: BTreeMap::new(),
    }
}

#[test]
fn cold_start_returns_none() {
    let index = SemanticIndex::in_memory().unwrap();
    let retriever = LearningRetriever::new(&index);
    let section = retriever
        .examples_section("AE", &[ae_profile()], 5)
        .unwrap();
    assert!(section.is_none());
}

#[test]
fn ingestion_then_retrieval_formats_corrections_first() {
    let substrate =
        LearningSubstrate::new(LearningStore::in_memory().unwrap(), SemanticIndex::in_memory().unwrap());
    let stats = substrate.ingest_review(&completed_review()).unwrap();
    assert_eq!(stats.examples, 2);
    assert_eq!(stats.corrections, 1);
    assert!(!stats.skipped);

    let retriever = LearningRetriever::new(&substrate.index);
    let section = retriever
        .examples_section("AE", &[ae_profile()], 5)
        .unwrap()
        .expect("post-ingestion retrieval");
    assert!(section.starts_with("### Correction Example 1"));
    assert!(section.contains("WRONG:"));
    assert!(section.contains("CORRECT:"));
    assert!(section.contains("AESEV_CODED"));
    assert!(section.contains("### Approved Example 1"));
    // Caps: at most 3 corrections, at most 5 total.
    assert!(section.matches("### Correction Example").count() <= 3);
    assert!(
        section.matches("### Correction Example").count()
            + section.matches("### Approved Example").count()
            <= 5
    );
}

#[test]
fn ingestion_is_idempotent() {
    let substrate =
        LearningSubstrate::new(LearningStore::in_memory().unwrap(), SemanticIndex::in_memory().unwrap());
    let review = completed_review();
    substrate.ingest_review(&review).unwrap();
    let first_examples = substrate.store.examples_for_domain("AE").unwrap();
    let first_corrections = substrate.store.corrections_for_domain("AE").unwrap();

    substrate.ingest_review(&review).unwrap();
    let second_examples = substrate.store.examples_for_domain("AE").unwrap();
    let second_corrections = substrate.store.corrections_for_domain("AE").unwrap();

    assert_eq!(first_examples, second_examples);
    assert_eq!(first_corrections.len(), second_corrections.len());
    assert_eq!(
        substrate
            .index
            .collection_len(astraea_learn::COLLECTION_APPROVED)
            .unwrap(),
        2
    );
}

#[test]
fn non_completed_reviews_are_silently_skipped() {
    let substrate =
        LearningSubstrate::new(LearningStore::in_memory().unwrap(), SemanticIndex::in_memory().unwrap());
    let mut review = completed_review();
    review.status = ReviewStatus::InProgress;
    let stats = substrate.ingest_review(&review).unwrap();
    assert!(stats.skipped);
    assert!(substrate.store.examples_for_domain("AE").unwrap().is_empty());
}

#[test]
fn invalidated_corrections_disappear_from_retrieval() {
    let substrate =
        LearningSubstrate::new(LearningStore::in_memory().unwrap(), SemanticIndex::in_memory().unwrap());
    substrate.ingest_review(&completed_review()).unwrap();

    let corrections = substrate.store.corrections_for_domain("AE").unwrap();
    let correction_id = corrections[0].correction_id.clone();
    substrate.store.invalidate_correction(&correction_id).unwrap();
    substrate.index.mark_invalidated(&correction_id).unwrap();

    let retriever = LearningRetriever::new(&substrate.index);
    let section = retriever
        .examples_section("AE", &[ae_profile()], 5)
        .unwrap()
        .expect("approved examples remain");
    assert!(!section.contains("### Correction Example"));
}

#[test]
fn improvement_report_orders_by_completion_and_reports_delta() {
    let early = StudyDomainMetrics {
        study_id: "S1".to_string(),
        domain: "AE".to_string(),
        total: 10,
        approved_unchanged: 6,
        corrected: 4,
        rejected: 0,
        added: 0,
        completed_at: Utc::now() - chrono::Duration::days(30),
    };
    let late = StudyDomainMetrics {
        study_id: "S2".to_string(),
        domain: "AE".to_string(),
        total: 10,
        approved_unchanged: 9,
        corrected: 1,
        rejected: 0,
        added: 0,
        completed_at: Utc::now(),
    };
    let report = improvement_report(&[late.clone(), early.clone()]);
    assert_eq!(report.len(), 1);
    let ae = &report[0];
    assert!((ae.first_accuracy - 0.6).abs() < 1e-9);
    assert!((ae.latest_accuracy - 0.9).abs() < 1e-9);
    assert!((ae.delta - 0.3).abs() < 1e-9);
    assert_eq!(ae.studies, 2);
}
