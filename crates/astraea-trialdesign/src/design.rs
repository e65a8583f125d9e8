//! TA, TE, TV, and TI builders from trial-design configuration.

use polars::prelude::{Column, DataFrame};

use astraea_exec::frame::DomainFrame;

use crate::config::TrialDesignConfig;

/// TA: one row per planned element per arm, in planned order.
pub fn build_ta(config: &TrialDesignConfig, study_id: &str) -> DomainFrame {
    let mut armcd = Vec::new();
    let mut arm = Vec::new();
    let mut etord = Vec::new();
    let mut etcd = Vec::new();
    let mut element = Vec::new();
    let mut epoch = Vec::new();

    for arm_config in &config.arms {
        for (index, element_code) in arm_config.elements.iter().enumerate() {
            let definition = config
                .elements
                .iter()
                .find(|e| e.etcd.eq_ignore_ascii_case(element_code));
            armcd.push(arm_config.armcd.clone());
            arm.push(arm_config.arm.clone());
            etord.push((index + 1) as f64);
            etcd.push(element_code.clone());
            element.push(definition.map(|e| e.element.clone()).unwrap_or_default());
            epoch.push(definition.map(|e| e.epoch.clone()).unwrap_or_default());
        }
    }

    let height = armcd.len();
    let data = DataFrame::new(vec![
        Column::new("STUDYID".into(), vec![study_id; height]),
        Column::new("DOMAIN".into(), vec!["TA"; height]),
        Column::new("ARMCD".into(), armcd),
        Column::new("ARM".into(), arm),
        Column::new("TAETORD".into(), etord),
        Column::new("ETCD".into(), etcd),
        Column::new("ELEMENT".into(), element),
        Column::new("EPOCH".into(), epoch),
    ])
    .expect("ta columns share one length");
    DomainFrame::new("TA", "Trial Arms", data)
}

/// TE: one row per planned element.
pub fn build_te(config: &TrialDesignConfig, study_id: &str) -> DomainFrame {
    let height = config.elements.len();
    let data = DataFrame::new(vec![
        Column::new("STUDYID".into(), vec![study_id; height]),
        Column::new("DOMAIN".into(), vec!["TE"; height]),
        Column::new(
            "ETCD".into(),
            config.elements.iter().map(|e| e.etcd.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "ELEMENT".into(),
            config.elements.iter().map(|e| e.element.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "TESTRL".into(),
            config
                .elements
                .iter()
                .map(|e| e.start_rule.clone())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "TEENRL".into(),
            config
                .elements
                .iter()
                .map(|e| e.end_rule.clone().unwrap_or_default())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "TEDUR".into(),
            config
                .elements
                .iter()
                .map(|e| e.duration.clone().unwrap_or_default())
                .collect::<Vec<_>>(),
        ),
    ])
    .expect("te columns share one length");
    DomainFrame::new("TE", "Trial Elements", data)
}

/// TV: one row per planned visit.
pub fn build_tv(config: &TrialDesignConfig, study_id: &str) -> DomainFrame {
    let height = config.visits.len();
    let data = DataFrame::new(vec![
        Column::new("STUDYID".into(), vec![study_id; height]),
        Column::new("DOMAIN".into(), vec!["TV"; height]),
        Column::new(
            "VISITNUM".into(),
            config.visits.iter().map(|v| v.visitnum).collect::<Vec<_>>(),
        ),
        Column::new(
            "VISIT".into(),
            config.visits.iter().map(|v| v.visit.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "TVSTRL".into(),
            config
                .visits
                .iter()
                .map(|v| v.start_rule.clone())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "TVENRL".into(),
            config
                .visits
                .iter()
                .map(|v| v.end_rule.clone().unwrap_or_default())
                .collect::<Vec<_>>(),
        ),
    ])
    .expect("tv columns share one length");
    DomainFrame::new("TV", "Trial Visits", data)
}

/// TI: one row per inclusion/exclusion criterion.
pub fn build_ti(config: &TrialDesignConfig, study_id: &str) -> DomainFrame {
    let height = config.criteria.len();
    let data = DataFrame::new(vec![
        Column::new("STUDYID".into(), vec![study_id; height]),
        Column::new("DOMAIN".into(), vec!["TI"; height]),
        Column::new(
            "IETESTCD".into(),
            config
                .criteria
                .iter()
                .map(|c| c.ietestcd.clone())
                .collect::<Vec<_>>(),
        ),
        Column::new(
            "IETEST".into(),
            config.criteria.iter().map(|c| c.ietest.clone()).collect::<Vec<_>>(),
        ),
        Column::new(
            "IECAT".into(),
            config
                .criteria
                .iter()
                .map(|c| c.category.to_uppercase())
                .collect::<Vec<_>>(),
        ),
    ])
    .expect("ti columns share one length");
    DomainFrame::new("TI", "Trial Inclusion/Exclusion Criteria", data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ArmConfig, CriterionConfig, ElementConfig, VisitConfig};
    use astraea_exec::context::string_at;

    fn config() -> TrialDesignConfig {
        TrialDesignConfig {
            arms: vec![ArmConfig {
                armcd: "A".to_string(),
                arm: "Active".to_string(),
                elements: vec!["SCRN".to_string(), "TRT".to_string()],
            }],
            elements: vec![
                ElementConfig {
                    etcd: "SCRN".to_string(),
                    element: "Screening".to_string(),
                    epoch: "SCREENING".to_string(),
                    start_rule: "Informed consent".to_string(),
                    end_rule: Some("First dose".to_string()),
                    duration: None,
                },
                ElementConfig {
                    etcd: "TRT".to_string(),
                    element: "Treatment".to_string(),
                    epoch: "TREATMENT".to_string(),
                    start_rule: "First dose".to_string(),
                    end_rule: Some("Last dose".to_string()),
                    duration: Some("P24W".to_string()),
                },
            ],
            visits: vec![VisitConfig {
                visitnum: 1.0,
                visit: "SCREENING".to_string(),
                start_rule: "Day -28 to Day -1".to_string(),
                end_rule: None,
            }],
            criteria: vec![CriterionConfig {
                ietestcd: "INCL01".to_string(),
                ietest: "Age 18 or older".to_string(),
                category: "Inclusion".to_string(),
            }],
        }
    }

    #[test]
    fn ta_orders_elements_within_arm() {
        let ta = build_ta(&config(), "PHA001");
        assert_eq!(ta.data.height(), 2);
        let epoch = ta.data.column("EPOCH").unwrap();
        assert_eq!(string_at(epoch, 0).as_deref(), Some("SCREENING"));
        assert_eq!(string_at(epoch, 1).as_deref(), Some("TREATMENT"));
    }

    #[test]
    fn te_tv_ti_build_one_row_per_config_entry() {
        let cfg = config();
        assert_eq!(build_te(&cfg, "PHA001").data.height(), 2);
        assert_eq!(build_tv(&cfg, "PHA001").data.height(), 1);
        let ti = build_ti(&cfg, "PHA001");
        assert_eq!(ti.data.height(), 1);
        let category = ti.data.column("IECAT").unwrap();
        assert_eq!(string_at(category, 0).as_deref(), Some("INCLUSION"));
    }
}
