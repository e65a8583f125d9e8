//! Fixed-table recodes and identifier composition.
//!
//! These wrap the handful of controlled-terminology recodes that are stable
//! enough to hard-code: SEX (C66731), RACE (C74457), ETHNIC (C66790), and
//! numeric checkbox values against No Yes Response (C66742). Misses always
//! return `None`; the caller decides whether that is a finding.

/// Join study, site, and subject identifiers into USUBJID.
///
/// Null-safe: a missing subject yields `None`; a missing site collapses to
/// the two-part form. Components are trimmed, never re-formatted.
pub fn compose_usubjid(
    study_id: &str,
    site_id: Option<&str>,
    subject_id: Option<&str>,
) -> Option<String> {
    let study = study_id.trim();
    let subject = subject_id.map(str::trim).filter(|s| !s.is_empty())?;
    if study.is_empty() {
        return None;
    }
    match site_id.map(str::trim).filter(|s| !s.is_empty()) {
        Some(site) => Some(format!("{study}-{site}-{subject}")),
        None => Some(format!("{study}-{subject}")),
    }
}

/// Recode a collected sex value to C66731.
pub fn recode_sex(value: &str) -> Option<&'static str> {
    match value.trim().to_uppercase().as_str() {
        "F" | "FEMALE" | "2" => Some("F"),
        "M" | "MALE" | "1" => Some("M"),
        "U" | "UNKNOWN" => Some("U"),
        "UNDIFFERENTIATED" | "INTERSEX" => Some("UNDIFFERENTIATED"),
        _ => None,
    }
}

/// Recode a collected race value to C74457.
pub fn recode_race(value: &str) -> Option<&'static str> {
    match value.trim().to_uppercase().as_str() {
        "AMERICAN INDIAN OR ALASKA NATIVE" => Some("AMERICAN INDIAN OR ALASKA NATIVE"),
        "ASIAN" => Some("ASIAN"),
        "BLACK OR AFRICAN AMERICAN" | "BLACK" | "AFRICAN AMERICAN" => {
            Some("BLACK OR AFRICAN AMERICAN")
        }
        "NATIVE HAWAIIAN OR OTHER PACIFIC ISLANDER" => {
            Some("NATIVE HAWAIIAN OR OTHER PACIFIC ISLANDER")
        }
        "WHITE" | "CAUCASIAN" => Some("WHITE"),
        "MULTIPLE" => Some("MULTIPLE"),
        "NOT REPORTED" => Some("NOT REPORTED"),
        "UNKNOWN" => Some("UNKNOWN"),
        "OTHER" => Some("OTHER"),
        _ => None,
    }
}

/// Recode a collected ethnicity value to C66790.
pub fn recode_ethnic(value: &str) -> Option<&'static str> {
    match value.trim().to_uppercase().as_str() {
        "HISPANIC OR LATINO" | "HISPANIC" | "LATINO" => Some("HISPANIC OR LATINO"),
        "NOT HISPANIC OR LATINO" | "NON-HISPANIC" => Some("NOT HISPANIC OR LATINO"),
        "NOT REPORTED" => Some("NOT REPORTED"),
        "UNKNOWN" => Some("UNKNOWN"),
        _ => None,
    }
}

/// Recode a numeric checkbox (0/1) or textual yes/no to C66742.
pub fn numeric_to_yn(value: &str) -> Option<&'static str> {
    match value.trim().to_uppercase().as_str() {
        "0" | "0.0" | "N" | "NO" | "FALSE" => Some("N"),
        "1" | "1.0" | "Y" | "YES" | "TRUE" => Some("Y"),
        _ => None,
    }
}

/// Map a collected country name to its ISO 3166-1 alpha-3 code.
///
/// Covers the submission countries the pipeline routinely sees; alpha-3
/// input passes through uppercased.
pub fn country_alpha3(value: &str) -> Option<&'static str> {
    match value.trim().to_uppercase().as_str() {
        "USA" | "US" | "UNITED STATES" | "UNITED STATES OF AMERICA" => Some("USA"),
        "CAN" | "CANADA" => Some("CAN"),
        "GBR" | "UK" | "UNITED KINGDOM" | "GREAT BRITAIN" => Some("GBR"),
        "DEU" | "GERMANY" => Some("DEU"),
        "FRA" | "FRANCE" => Some("FRA"),
        "ESP" | "SPAIN" => Some("ESP"),
        "ITA" | "ITALY" => Some("ITA"),
        "NLD" | "NETHERLANDS" | "THE NETHERLANDS" => Some("NLD"),
        "BEL" | "BELGIUM" => Some("BEL"),
        "POL" | "POLAND" => Some("POL"),
        "JPN" | "JAPAN" => Some("JPN"),
        "CHN" | "CHINA" => Some("CHN"),
        "AUS" | "AUSTRALIA" => Some("AUS"),
        "BRA" | "BRAZIL" => Some("BRA"),
        "MEX" | "MEXICO" => Some("MEX"),
        "IND" | "INDIA" => Some("IND"),
        "KOR" | "SOUTH KOREA" | "REPUBLIC OF KOREA" | "KOREA" => Some("KOR"),
        "CHE" | "SWITZERLAND" => Some("CHE"),
        "SWE" | "SWEDEN" => Some("SWE"),
        "DNK" | "DENMARK" => Some("DNK"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usubjid_composition_is_null_safe() {
        assert_eq!(
            compose_usubjid("PHA", Some("001"), Some("01")).as_deref(),
            Some("PHA-001-01")
        );
        assert_eq!(compose_usubjid("PHA", None, Some("01")).as_deref(), Some("PHA-01"));
        assert_eq!(compose_usubjid("PHA", Some("001"), None), None);
        assert_eq!(compose_usubjid("", Some("001"), Some("01")), None);
        assert_eq!(compose_usubjid("PHA", Some("  "), Some("01")).as_deref(), Some("PHA-01"));
    }

    #[test]
    fn checkbox_recode() {
        assert_eq!(numeric_to_yn("0.0"), Some("N"));
        assert_eq!(numeric_to_yn("1.0"), Some("Y"));
        assert_eq!(numeric_to_yn("1"), Some("Y"));
        assert_eq!(numeric_to_yn("2"), None);
    }

    #[test]
    fn sex_recode_tolerates_case() {
        assert_eq!(recode_sex("female"), Some("F"));
        assert_eq!(recode_sex("M"), Some("M"));
        assert_eq!(recode_sex("other"), None);
    }

    #[test]
    fn country_names_map_to_alpha3() {
        assert_eq!(country_alpha3("United States"), Some("USA"));
        assert_eq!(country_alpha3("GBR"), Some("GBR"));
        assert_eq!(country_alpha3("Atlantis"), None);
    }
}
