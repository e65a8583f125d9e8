//! LC: structural copy of LB in conventional units.
//!
//! Unit conversion between SI and conventional units is not performed;
//! the frame carries `lc_unit_conversion_performed = false` so the
//! validator emits the corresponding warning. Row count and sequence
//! numbers match LB exactly.

use polars::prelude::Column;
use tracing::warn;

use crate::error::ExecutionError;
use crate::frame::DomainFrame;

/// Build LC from an executed LB frame.
pub fn build_lc_from_lb(lb: &DomainFrame) -> Result<DomainFrame, ExecutionError> {
    let mut columns: Vec<Column> = Vec::with_capacity(lb.data.width());
    for column in lb.data.get_columns() {
        let name = column.name().to_string();
        let renamed = if let Some(rest) = name.strip_prefix("LB") {
            format!("LC{rest}")
        } else {
            name
        };
        let mut column = column.clone();
        if renamed == "DOMAIN" {
            column = Column::new("DOMAIN".into(), vec!["LC"; lb.data.height()]);
        }
        columns.push(column.with_name(renamed.as_str().into()));
    }
    let data = polars::prelude::DataFrame::new(columns)?;

    warn!("LC generated as structural LB copy; unit conversion not performed");
    let mut frame = DomainFrame::new("LC", "Laboratory Test Results (Conventional)", data);
    frame.lc_unit_conversion_performed = Some(false);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::string_at;
    use polars::prelude::DataFrame;

    #[test]
    fn lc_mirrors_lb_rows_and_sequence() {
        let lb_data = DataFrame::new(vec![
            Column::new("DOMAIN".into(), ["LB", "LB"]),
            Column::new("USUBJID".into(), ["S1", "S2"]),
            Column::new("LBSEQ".into(), ["1", "1"]),
            Column::new("LBTESTCD".into(), ["HGB", "WBC"]),
        ])
        .unwrap();
        let lb = DomainFrame::new("LB", "Laboratory Test Results", lb_data);
        let lc = build_lc_from_lb(&lb).unwrap();

        assert_eq!(lc.domain_code, "LC");
        assert_eq!(lc.data.height(), lb.data.height());
        assert!(lc.data.column("LCSEQ").is_ok());
        assert!(lc.data.column("LCTESTCD").is_ok());
        let domain = lc.data.column("DOMAIN").unwrap();
        assert_eq!(string_at(domain, 0).as_deref(), Some("LC"));
        assert_eq!(lc.lc_unit_conversion_performed, Some(false));
    }
}
