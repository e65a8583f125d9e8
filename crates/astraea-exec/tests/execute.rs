//! End-to-end execution over literal raw inputs.

use std::collections::BTreeMap;

use chrono::Utc;
use polars::prelude::{Column, DataFrame};

use astraea_exec::context::string_at;
use astraea_exec::{CrossDomainContext, ExecutionEngine};
use astraea_model::{
    ConfidenceLevel, CoreDesignation, DomainClass, DomainMappingSpec, MappingPattern,
    MappingSummary, StudyMetadata, SuppOrigin, SuppVariable, VariableDataType, VariableMapping,
    VariableOrigin,
};
use astraea_reference::ReferenceStore;

struct MappingBuilder {
    mapping: VariableMapping,
}

impl MappingBuilder {
    fn new(variable: &str, pattern: MappingPattern) -> Self {
        Self {
            mapping: VariableMapping {
                sdtm_variable: variable.to_string(),
                sdtm_label: variable.to_string(),
                sdtm_data_type: VariableDataType::Char,
                core: CoreDesignation::Expected,
                source_dataset: None,
                source_variable: None,
                mapping_pattern: pattern,
                mapping_logic: String::new(),
                derivation_rule: None,
                assigned_value: None,
                codelist_code: None,
                codelist_name: None,
                origin: VariableOrigin::Crf,
                confidence: 0.9,
                confidence_level: ConfidenceLevel::High,
                needs_review: false,
                rationale: String::new(),
                order: 0,
                notes: Vec::new(),
            },
        }
    }

    fn source(mut self, variable: &str) -> Self {
        self.mapping.source_variable = Some(variable.to_string());
        self
    }

    fn rule(mut self, rule: &str) -> Self {
        self.mapping.derivation_rule = Some(rule.to_string());
        self
    }

    fn value(mut self, value: &str) -> Self {
        self.mapping.assigned_value = Some(value.to_string());
        self
    }

    fn codelist(mut self, code: &str) -> Self {
        self.mapping.codelist_code = Some(code.to_string());
        self
    }

    fn order(mut self, order: u32) -> Self {
        self.mapping.order = order;
        self
    }

    fn build(self) -> VariableMapping {
        self.mapping
    }
}

fn spec_for(
    domain: &str,
    sources: &[&str],
    mappings: Vec<VariableMapping>,
) -> DomainMappingSpec {
    let summary = MappingSummary::from_mappings(&mappings);
    DomainMappingSpec {
        domain: domain.to_string(),
        domain_label: domain.to_string(),
        domain_class: DomainClass::Events,
        structure: String::new(),
        study_id: "PHA".to_string(),
        source_datasets: sources.iter().map(|s| (*s).to_string()).collect(),
        cross_domain_sources: Vec::new(),
        variable_mappings: mappings,
        unmapped_source_variables: Vec::new(),
        suppqual_candidates: Vec::new(),
        summary,
        mapping_timestamp: Utc::now(),
        model_used: "scripted".to_string(),
    }
}

fn column_values(df: &DataFrame, name: &str) -> Vec<Option<String>> {
    let column = df.column(name).unwrap();
    (0..df.height()).map(|idx| string_at(column, idx)).collect()
}

#[test]
fn dm_happy_path() {
    let reference = ReferenceStore::load().unwrap();
    let engine = ExecutionEngine::new(&reference);
    let study = StudyMetadata::new("PHA");

    let dm = DataFrame::new(vec![
        Column::new("Subject".into(), ["01", "02", "05"]),
        Column::new("SiteNumber".into(), ["001", "001", "002"]),
        Column::new("SEX_STD".into(), ["F", "M", "F"]),
        Column::new(
            "ETHNIC_STD".into(),
            [
                "NOT HISPANIC OR LATINO",
                "NOT HISPANIC OR LATINO",
                "HISPANIC OR LATINO",
            ],
        ),
        Column::new("RACEWHI".into(), [1.0, 1.0, 1.0]),
        Column::new("BRTHYR_YYYY".into(), [1960.0, 1975.0, 1983.0]),
        Column::new("Country".into(), ["United States", "United States", "Canada"]),
    ])
    .unwrap();
    let ex = DataFrame::new(vec![
        Column::new("Subject".into(), ["01", "01"]),
        Column::new("EXDAT".into(), ["2020-06-30", "2020-01-15"]),
    ])
    .unwrap();
    let mut raw = BTreeMap::new();
    raw.insert("dm.csv".to_string(), dm);
    raw.insert("ex.csv".to_string(), ex);

    let mappings = vec![
        MappingBuilder::new("STUDYID", MappingPattern::Assign).value("PHA").order(1).build(),
        MappingBuilder::new("DOMAIN", MappingPattern::Assign).value("DM").order(2).build(),
        MappingBuilder::new("USUBJID", MappingPattern::Derivation)
            .rule("USUBJID(SiteNumber, Subject)")
            .order(3)
            .build(),
        MappingBuilder::new("SUBJID", MappingPattern::Rename).source("Subject").order(4).build(),
        MappingBuilder::new("RFSTDTC", MappingPattern::Derivation)
            .rule("MIN(ex.EXDAT JOIN ON Subject)")
            .order(5)
            .build(),
        MappingBuilder::new("SITEID", MappingPattern::Rename).source("SiteNumber").order(13).build(),
        MappingBuilder::new("BRTHDTC", MappingPattern::Derivation)
            .rule("PARTIAL_DATE(BRTHYR_YYYY)")
            .order(14)
            .build(),
        MappingBuilder::new("SEX", MappingPattern::LookupRecode)
            .source("SEX_STD")
            .codelist("C66731")
            .order(17)
            .build(),
        MappingBuilder::new("RACE", MappingPattern::Derivation)
            .rule("RACE_CHECKBOX(RACEWHI)")
            .order(18)
            .build(),
        MappingBuilder::new("ETHNIC", MappingPattern::LookupRecode)
            .source("ETHNIC_STD")
            .codelist("C66790")
            .order(19)
            .build(),
        MappingBuilder::new("COUNTRY", MappingPattern::Derivation)
            .rule("COUNTRY_ISO3166(Country)")
            .order(24)
            .build(),
    ];
    let spec = spec_for("DM", &["dm.csv"], mappings);

    let executed = engine.execute(&spec, &raw, None, &study).unwrap();
    let df = &executed.frame.data;
    assert_eq!(df.height(), 3);

    assert_eq!(
        column_values(df, "USUBJID"),
        vec![
            Some("PHA-001-01".to_string()),
            Some("PHA-001-02".to_string()),
            Some("PHA-002-05".to_string())
        ]
    );
    assert_eq!(
        column_values(df, "SEX"),
        vec![Some("F".to_string()), Some("M".to_string()), Some("F".to_string())]
    );
    assert_eq!(
        column_values(df, "RACE"),
        vec![Some("WHITE".to_string()); 3]
    );
    // Year-only birth date stays year-only, no imputation.
    assert_eq!(column_values(df, "BRTHDTC")[0].as_deref(), Some("1960"));
    // Earliest exposure date wins; subjects without exposure stay null.
    assert_eq!(column_values(df, "RFSTDTC")[0].as_deref(), Some("2020-01-15"));
    assert_eq!(column_values(df, "RFSTDTC")[1], None);
    assert_eq!(column_values(df, "COUNTRY")[2].as_deref(), Some("CAN"));

    // Columns come out in reference order.
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    assert_eq!(names[0], "STUDYID");
    assert_eq!(names[1], "DOMAIN");
    assert_eq!(names[2], "USUBJID");
    assert_eq!(names[3], "SUBJID");
}

#[test]
fn ae_checkbox_recode() {
    let reference = ReferenceStore::load().unwrap();
    let engine = ExecutionEngine::new(&reference);
    let study = StudyMetadata::new("PHA");

    let ae = DataFrame::new(vec![
        Column::new("Subject".into(), ["01", "01", "02"]),
        Column::new("AETERM_RAW".into(), ["Headache", "Nausea", "Rash"]),
        Column::new("AESDTH_RAW".into(), [0.0, 1.0, 0.0]),
    ])
    .unwrap();
    let mut raw = BTreeMap::new();
    raw.insert("ae.csv".to_string(), ae);

    let mappings = vec![
        MappingBuilder::new("USUBJID", MappingPattern::Derivation)
            .rule("USUBJID(Subject)")
            .order(3)
            .build(),
        MappingBuilder::new("AETERM", MappingPattern::Direct).source("AETERM_RAW").order(5).build(),
        MappingBuilder::new("AESDTH", MappingPattern::Reformat)
            .rule("NUMERIC_TO_YN(AESDTH_RAW)")
            .codelist("C66742")
            .order(15)
            .build(),
    ];
    let spec = spec_for("AE", &["ae.csv"], mappings);
    let executed = engine.execute(&spec, &raw, None, &study).unwrap();

    assert_eq!(
        column_values(&executed.frame.data, "AESDTH"),
        vec![Some("N".to_string()), Some("Y".to_string()), Some("N".to_string())]
    );
    let store = ReferenceStore::load().unwrap();
    for value in column_values(&executed.frame.data, "AESDTH").into_iter().flatten() {
        assert!(store.validate_term("C66742", &value));
    }
}

#[test]
fn ex_filter_and_multi_source_merge() {
    let reference = ReferenceStore::load().unwrap();
    let engine = ExecutionEngine::new(&reference);
    let study = StudyMetadata::new("PHA");

    let ex = DataFrame::new(vec![
        Column::new("Subject".into(), ["01", "01", "02", "02", "03"]),
        Column::new("EXYN_STD".into(), ["Y", "Y", "N", "Y", "Y"]),
        Column::new("EXSTDAT".into(), [
            "15 Jan 2020",
            "01 Feb 2020",
            "20 Jan 2020",
            "05 Feb 2020",
            "10 Mar 2020",
        ]),
    ])
    .unwrap();
    let ex_ole = DataFrame::new(vec![
        Column::new("Subject".into(), ["01", "03"]),
        Column::new("EXYN_STD".into(), ["Y", "Y"]),
        Column::new("EXSTDAT2".into(), ["01 Jul 2020", "15 Jul 2020"]),
    ])
    .unwrap();
    let mut raw = BTreeMap::new();
    raw.insert("ex.csv".to_string(), ex);
    raw.insert("ex_ole.csv".to_string(), ex_ole);

    let mappings = vec![
        MappingBuilder::new("USUBJID", MappingPattern::Derivation)
            .rule("USUBJID(Subject)")
            .order(3)
            .build(),
        MappingBuilder::new("EXTRT", MappingPattern::Assign).value("ASTRAEA-1").order(5).build(),
        MappingBuilder::new("EXSTDTC", MappingPattern::Reformat)
            .rule("ISO8601(EXSTDAT)")
            .order(13)
            .build(),
    ];
    let spec = spec_for("EX", &["ex.csv", "ex_ole.csv"], mappings);
    let executed = engine.execute(&spec, &raw, None, &study).unwrap();
    let df = &executed.frame.data;

    // One not-administered row removed; OLE rows aligned onto EXSTDAT.
    assert_eq!(df.height(), 6);
    let dates = column_values(df, "EXSTDTC");
    assert!(dates.iter().all(Option::is_some));
    assert!(dates.contains(&Some("2020-07-01".to_string())));

    // EXSEQ restarts at 1 per subject and increases monotonically.
    let seq: Vec<f64> = {
        let column = df.column("EXSEQ").unwrap();
        (0..df.height())
            .map(|i| match column.get(i).unwrap() {
                polars::prelude::AnyValue::Float64(v) => v,
                other => panic!("EXSEQ not numeric: {other:?}"),
            })
            .collect()
    };
    let subjects = column_values(df, "USUBJID");
    let mut last: Option<(String, f64)> = None;
    for (subject, seq_value) in subjects.into_iter().flatten().zip(seq) {
        match &last {
            Some((previous, previous_seq)) if *previous == subject => {
                assert_eq!(seq_value, previous_seq + 1.0);
            }
            _ => assert_eq!(seq_value, 1.0),
        }
        last = Some((subject, seq_value));
    }
}

#[test]
fn cm_partial_dates() {
    let reference = ReferenceStore::load().unwrap();
    let engine = ExecutionEngine::new(&reference);
    let study = StudyMetadata::new("PHA");

    let cm = DataFrame::new(vec![
        Column::new("Subject".into(), ["01", "02", "03"]),
        Column::new("CMTRT_RAW".into(), ["Aspirin", "Metformin", "Lisinopril"]),
        Column::new("CMSTDAT".into(), ["un UNK 2020", "un Jun 2019", "15 Jan 2022"]),
    ])
    .unwrap();
    let mut raw = BTreeMap::new();
    raw.insert("cm.csv".to_string(), cm);

    let mappings = vec![
        MappingBuilder::new("USUBJID", MappingPattern::Derivation)
            .rule("USUBJID(Subject)")
            .order(3)
            .build(),
        MappingBuilder::new("CMTRT", MappingPattern::Direct).source("CMTRT_RAW").order(5).build(),
        MappingBuilder::new("CMSTDTC", MappingPattern::Reformat)
            .rule("ISO8601(CMSTDAT)")
            .order(13)
            .build(),
    ];
    let spec = spec_for("CM", &["cm.csv"], mappings);
    let executed = engine.execute(&spec, &raw, None, &study).unwrap();

    assert_eq!(
        column_values(&executed.frame.data, "CMSTDTC"),
        vec![
            Some("2020".to_string()),
            Some("2019-06".to_string()),
            Some("2022-01-15".to_string())
        ]
    );
}

#[test]
fn ds_multi_source_alignment() {
    let reference = ReferenceStore::load().unwrap();
    let engine = ExecutionEngine::new(&reference);
    let study = StudyMetadata::new("PHA");

    let ds = DataFrame::new(vec![
        Column::new("Subject".into(), ["01", "02", "03"]),
        Column::new("DSDECOD".into(), ["COMPLETED", "COMPLETED", "DEATH"]),
        Column::new("DSENDAT_RAW".into(), ["2020-06-01", "2020-06-02", "2020-03-01"]),
    ])
    .unwrap();
    let ds2 = DataFrame::new(vec![
        Column::new("Subject".into(), ["01", "02", "03"]),
        Column::new("DSDECOD2".into(), ["RANDOMIZED", "RANDOMIZED", "RANDOMIZED"]),
        Column::new("DSENDAT2_RAW".into(), ["2020-01-10", "2020-01-11", "2020-01-12"]),
    ])
    .unwrap();
    let mut raw = BTreeMap::new();
    raw.insert("ds.csv".to_string(), ds);
    raw.insert("ds2.csv".to_string(), ds2);

    let mappings = vec![
        MappingBuilder::new("USUBJID", MappingPattern::Derivation)
            .rule("USUBJID(Subject)")
            .order(3)
            .build(),
        MappingBuilder::new("DSTERM", MappingPattern::Direct).source("DSDECOD").order(5).build(),
        MappingBuilder::new("DSDECOD", MappingPattern::Direct).source("DSDECOD").order(6).build(),
        MappingBuilder::new("DSCAT", MappingPattern::Direct).source("DSCAT").order(7).build(),
        MappingBuilder::new("DSSTDTC", MappingPattern::Reformat)
            .rule("ISO8601(DSENDAT_RAW)")
            .order(9)
            .build(),
    ];
    let spec = spec_for("DS", &["ds.csv", "ds2.csv"], mappings);
    let executed = engine.execute(&spec, &raw, None, &study).unwrap();
    let df = &executed.frame.data;

    assert_eq!(df.height(), 6);
    let decod = column_values(df, "DSDECOD");
    assert!(decod.iter().all(Option::is_some), "no null DSDECOD from misalignment");
    let categories: Vec<String> = column_values(df, "DSCAT").into_iter().flatten().collect();
    assert_eq!(
        categories.iter().filter(|c| *c == "DISPOSITION EVENT").count(),
        3
    );
    assert_eq!(
        categories.iter().filter(|c| *c == "PROTOCOL MILESTONE").count(),
        3
    );
}

#[test]
fn study_day_and_epoch_from_cross_domain_context() {
    let reference = ReferenceStore::load().unwrap();
    let engine = ExecutionEngine::new(&reference);
    let study = StudyMetadata::new("PHA");

    let dm = DataFrame::new(vec![
        Column::new("USUBJID".into(), ["PHA-01"]),
        Column::new("RFSTDTC".into(), ["2020-01-15"]),
    ])
    .unwrap();
    let se = DataFrame::new(vec![
        Column::new("USUBJID".into(), ["PHA-01", "PHA-01"]),
        Column::new("ETCD".into(), ["SCRN", "TRT"]),
        Column::new("EPOCH".into(), ["SCREENING", "TREATMENT"]),
        Column::new("SESTDTC".into(), ["2020-01-01", "2020-01-15"]),
        Column::new("SEENDTC".into(), ["2020-01-15", "2020-06-30"]),
    ])
    .unwrap();
    let cross = CrossDomainContext::from_dm(&dm).with_se(&se);

    let ae = DataFrame::new(vec![
        Column::new("Subject".into(), ["01", "01"]),
        Column::new("AETERM_RAW".into(), ["Headache", "Nausea"]),
        Column::new("AESTDAT".into(), ["2020-01-20", "2020-01-10"]),
    ])
    .unwrap();
    let mut raw = BTreeMap::new();
    raw.insert("ae.csv".to_string(), ae);

    let mappings = vec![
        MappingBuilder::new("USUBJID", MappingPattern::Derivation)
            .rule("USUBJID(Subject)")
            .order(3)
            .build(),
        MappingBuilder::new("AETERM", MappingPattern::Direct).source("AETERM_RAW").order(5).build(),
        MappingBuilder::new("AESTDTC", MappingPattern::Reformat)
            .rule("ISO8601(AESTDAT)")
            .order(19)
            .build(),
    ];
    let spec = spec_for("AE", &["ae.csv"], mappings);
    let executed = engine.execute(&spec, &raw, Some(&cross), &study).unwrap();
    let df = &executed.frame.data;

    // Rows come out sorted by subject and start date for AESEQ assignment.
    // Day 1 is the reference date; days before are negative, no day 0.
    let days = column_values(df, "AESTDY");
    assert_eq!(days, vec![Some("-5".to_string()), Some("6".to_string())]);
    let epochs = column_values(df, "EPOCH");
    assert_eq!(
        epochs,
        vec![Some("SCREENING".to_string()), Some("TREATMENT".to_string())]
    );
}

#[test]
fn suppqual_generates_after_parent_is_final() {
    let reference = ReferenceStore::load().unwrap();
    let engine = ExecutionEngine::new(&reference);
    let study = StudyMetadata::new("PHA");

    let ae = DataFrame::new(vec![
        Column::new("Subject".into(), ["01", "02"]),
        Column::new("AETERM_RAW".into(), ["Headache", "Nausea"]),
        Column::new("AESOURCE".into(), ["Diary", ""]),
    ])
    .unwrap();
    let mut raw = BTreeMap::new();
    raw.insert("ae.csv".to_string(), ae);

    let mappings = vec![
        MappingBuilder::new("USUBJID", MappingPattern::Derivation)
            .rule("USUBJID(Subject)")
            .order(3)
            .build(),
        MappingBuilder::new("AETERM", MappingPattern::Direct).source("AETERM_RAW").order(5).build(),
    ];
    let mut spec = spec_for("AE", &["ae.csv"], mappings);
    spec.suppqual_candidates = vec![SuppVariable {
        qnam: "AESOURCE".to_string(),
        qlabel: "Source of AE Report".to_string(),
        source_col: "AESOURCE".to_string(),
        qorig: SuppOrigin::Crf,
        qeval: None,
    }];

    let executed = engine.execute(&spec, &raw, None, &study).unwrap();
    let supp = executed.supp.expect("supp dataset");
    assert_eq!(supp.domain_code, "SUPPAE");
    assert_eq!(supp.data.height(), 1);
    assert_eq!(
        column_values(&supp.data, "IDVARVAL"),
        vec![Some("1".to_string())]
    );
    // Integrity: the record addresses a real parent row.
    assert!(executed.warnings.iter().all(|w| !w.contains("no parent row")));
}

#[test]
fn handler_failure_degrades_to_null_column() {
    let reference = ReferenceStore::load().unwrap();
    let engine = ExecutionEngine::new(&reference);
    let study = StudyMetadata::new("PHA");

    let ae = DataFrame::new(vec![
        Column::new("Subject".into(), ["01"]),
        Column::new("AETERM_RAW".into(), ["Headache"]),
    ])
    .unwrap();
    let mut raw = BTreeMap::new();
    raw.insert("ae.csv".to_string(), ae);

    let mappings = vec![
        MappingBuilder::new("USUBJID", MappingPattern::Derivation)
            .rule("USUBJID(Subject)")
            .order(3)
            .build(),
        // DIRECT from a column that does not exist.
        MappingBuilder::new("AETERM", MappingPattern::Direct).source("MISSING_COL").order(5).build(),
    ];
    let spec = spec_for("AE", &["ae.csv"], mappings);
    let executed = engine.execute(&spec, &raw, None, &study).unwrap();

    assert_eq!(column_values(&executed.frame.data, "AETERM"), vec![None]);
    assert!(executed.warnings.iter().any(|w| w.contains("AETERM")));
}
