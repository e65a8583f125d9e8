//! Serde round-trip of the persisted value objects.

use chrono::Utc;

use astraea_model::{
    ConfidenceLevel, CoreDesignation, DomainClass, DomainMappingSpec, MappingPattern,
    MappingSummary, SuppOrigin, SuppVariable, VariableDataType, VariableMapping, VariableOrigin,
};

fn spec() -> DomainMappingSpec {
    let mappings = vec![VariableMapping {
        sdtm_variable: "SEX".to_string(),
        sdtm_label: "Sex".to_string(),
        sdtm_data_type: VariableDataType::Char,
        core: CoreDesignation::Required,
        source_dataset: Some("dm.csv".to_string()),
        source_variable: Some("SEX_STD".to_string()),
        mapping_pattern: MappingPattern::LookupRecode,
        mapping_logic: "recode against C66731".to_string(),
        derivation_rule: None,
        assigned_value: None,
        codelist_code: Some("C66731".to_string()),
        codelist_name: Some("Sex".to_string()),
        origin: VariableOrigin::Crf,
        confidence: 0.95,
        confidence_level: ConfidenceLevel::High,
        needs_review: false,
        rationale: "label and samples match".to_string(),
        order: 17,
        notes: vec!["codelist bundled".to_string()],
    }];
    let summary = MappingSummary::from_mappings(&mappings);
    DomainMappingSpec {
        domain: "DM".to_string(),
        domain_label: "Demographics".to_string(),
        domain_class: DomainClass::SpecialPurpose,
        structure: "One record per subject".to_string(),
        study_id: "PHA001".to_string(),
        source_datasets: vec!["dm.csv".to_string()],
        cross_domain_sources: vec!["ex.csv".to_string()],
        variable_mappings: mappings,
        unmapped_source_variables: vec!["PROJECTID".to_string()],
        suppqual_candidates: vec![SuppVariable {
            qnam: "DMSOURCE".to_string(),
            qlabel: "Source of Demographic Data".to_string(),
            source_col: "SOURCE".to_string(),
            qorig: SuppOrigin::Crf,
            qeval: None,
        }],
        summary,
        mapping_timestamp: Utc::now(),
        model_used: "claude-sonnet-4-5".to_string(),
    }
}

#[test]
fn domain_mapping_spec_round_trips() {
    let original = spec();
    let json = serde_json::to_string(&original).unwrap();
    let restored: DomainMappingSpec = serde_json::from_str(&json).unwrap();
    assert_eq!(original, restored);
}

#[test]
fn mapping_pattern_spellings_are_stable() {
    // On-wire spellings are part of the contract with the transport schema.
    assert_eq!(
        serde_json::to_string(&MappingPattern::LookupRecode).unwrap(),
        "\"LOOKUP_RECODE\""
    );
    assert_eq!(
        serde_json::to_string(&MappingPattern::Transpose).unwrap(),
        "\"TRANSPOSE\""
    );
}
