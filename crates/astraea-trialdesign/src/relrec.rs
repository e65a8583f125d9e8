//! RELREC: deferred.
//!
//! Cross-domain record relationships are not generated in this version;
//! the builder returns an empty, correctly-shaped dataset and logs the
//! deferral so the submission packager can note it.

use polars::prelude::{Column, DataFrame};
use tracing::warn;

use astraea_exec::frame::DomainFrame;

/// Build an empty RELREC dataset with the standard columns.
pub fn build_relrec(study_id: &str) -> DomainFrame {
    warn!("RELREC generation is deferred; emitting an empty dataset");
    let _ = study_id;
    let empty: Vec<String> = Vec::new();
    let data = DataFrame::new(vec![
        Column::new("STUDYID".into(), empty.clone()),
        Column::new("RDOMAIN".into(), empty.clone()),
        Column::new("USUBJID".into(), empty.clone()),
        Column::new("IDVAR".into(), empty.clone()),
        Column::new("IDVARVAL".into(), empty.clone()),
        Column::new("RELTYPE".into(), empty.clone()),
        Column::new("RELID".into(), empty),
    ])
    .expect("empty relrec columns");
    DomainFrame::new("RELREC", "Related Records", data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relrec_is_empty_but_shaped() {
        let relrec = build_relrec("PHA001");
        assert_eq!(relrec.data.height(), 0);
        assert_eq!(relrec.data.width(), 7);
    }
}
