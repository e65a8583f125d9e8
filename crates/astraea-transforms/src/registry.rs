//! Named transform registry.
//!
//! The REFORMAT pattern handler dispatches on a keyword from the derivation
//! rule; the registry maps each keyword to a pure value function. Unknown
//! keywords are the caller's concern (pass-through with a warning).

use std::collections::BTreeMap;

use crate::datetime::parse_string_date_to_iso;
use crate::impute::{ImputeMethod, impute_partial_date};
use crate::recode::{country_alpha3, numeric_to_yn, recode_ethnic, recode_race, recode_sex};

/// A single-value transform: input string to optional output.
pub type ValueTransform = fn(&str) -> Option<String>;

/// Registry of named value transforms.
#[derive(Debug)]
pub struct TransformRegistry {
    transforms: BTreeMap<&'static str, ValueTransform>,
}

impl TransformRegistry {
    /// All built-in transforms under their derivation-rule keywords.
    pub fn standard() -> Self {
        let mut transforms: BTreeMap<&'static str, ValueTransform> = BTreeMap::new();
        transforms.insert("ISO8601", parse_string_date_to_iso);
        transforms.insert("NUMERIC_TO_YN", |v| numeric_to_yn(v).map(str::to_string));
        transforms.insert("SEX", |v| recode_sex(v).map(str::to_string));
        transforms.insert("RACE", |v| recode_race(v).map(str::to_string));
        transforms.insert("ETHNIC", |v| recode_ethnic(v).map(str::to_string));
        transforms.insert("COUNTRY_ISO3166", |v| country_alpha3(v).map(str::to_string));
        transforms.insert("PARTIAL_DATE_FIRST", |v| {
            impute_partial_date(v, ImputeMethod::First)
        });
        transforms.insert("PARTIAL_DATE_LAST", |v| {
            impute_partial_date(v, ImputeMethod::Last)
        });
        transforms.insert("PARTIAL_DATE_MID", |v| {
            impute_partial_date(v, ImputeMethod::Mid)
        });
        transforms.insert("UPPER", |v| Some(v.to_uppercase()));
        transforms.insert("TRIM", |v| Some(v.trim().to_string()));
        Self { transforms }
    }

    /// Look up a transform by keyword (case-insensitive).
    pub fn get(&self, name: &str) -> Option<ValueTransform> {
        self.transforms.get(name.to_uppercase().as_str()).copied()
    }

    /// Registered keyword list, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.transforms.keys().copied().collect()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_dispatches_by_keyword() {
        let registry = TransformRegistry::standard();
        let iso = registry.get("iso8601").expect("ISO8601 registered");
        assert_eq!(iso("15 Jan 2022").as_deref(), Some("2022-01-15"));

        let yn = registry.get("NUMERIC_TO_YN").expect("registered");
        assert_eq!(yn("1.0").as_deref(), Some("Y"));

        assert!(registry.get("NO_SUCH_TRANSFORM").is_none());
    }
}
