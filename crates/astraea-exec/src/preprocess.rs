//! Pre-dispatch source preparation.
//!
//! Everything here happens before per-variable dispatch: casting raw frames
//! to string columns (handlers reason over collected values, typing happens
//! at the end), domain row filters, and multi-source alignment with
//! category injection for domains collected across several files.

use std::collections::BTreeMap;

use polars::prelude::{Column, DataFrame, DataType, NewChunkedArray};
use tracing::{debug, warn};

use crate::context::string_at;
use crate::error::ExecutionError;

/// Cast every column of a raw frame to String.
pub fn to_string_frame(df: &DataFrame) -> Result<DataFrame, ExecutionError> {
    let mut columns = Vec::with_capacity(df.width());
    for column in df.get_columns() {
        let cast = column.cast(&DataType::String)?;
        columns.push(cast);
    }
    Ok(DataFrame::new(columns)?)
}

/// EX row filter: drop rows whose treatment-administered flag is "N".
///
/// The flag column is any column whose uppercase name starts with "EXYN"
/// (vendor exports carry `EXYN`, `EXYN_STD`, or both).
pub fn filter_ex_rows(df: &DataFrame) -> Result<DataFrame, ExecutionError> {
    let flag_column = df
        .get_columns()
        .iter()
        .find(|c| c.name().to_uppercase().starts_with("EXYN"))
        .cloned();
    let Some(flag) = flag_column else {
        return Ok(df.clone());
    };

    let keep: Vec<bool> = (0..df.height())
        .map(|idx| {
            string_at(&flag, idx)
                .map(|v| !v.eq_ignore_ascii_case("N"))
                .unwrap_or(true)
        })
        .collect();
    let dropped = keep.iter().filter(|k| !**k).count();
    if dropped > 0 {
        debug!(dropped, "EX rows removed by treatment-administered filter");
    }
    let mask = polars::prelude::BooleanChunked::from_slice("keep".into(), &keep);
    Ok(df.filter(&mask)?)
}

/// Align multi-source frames onto a shared schema and stack them.
///
/// Suffixed column variants in secondary frames (e.g. `DSDECOD2`,
/// `DSENDAT2_RAW`) are renamed to the primary frame's spelling. For DS, a
/// `DSCAT` column is injected distinguishing the disposition-event source
/// from protocol-milestone sources, so no row loses its provenance in the
/// concat.
pub fn align_and_concat(
    domain: &str,
    frames: &[(String, DataFrame)],
    reference_variables: &[String],
) -> Result<DataFrame, ExecutionError> {
    if frames.is_empty() {
        return Err(ExecutionError::MissingSources {
            domain: domain.to_string(),
            expected: Vec::new(),
        });
    }
    if frames.len() == 1 {
        return Ok(frames[0].1.clone());
    }

    let primary_columns: Vec<String> = frames[0]
        .1
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();

    let mut aligned: Vec<DataFrame> = Vec::with_capacity(frames.len());
    for (index, (name, frame)) in frames.iter().enumerate() {
        let mut frame = frame.clone();
        if index > 0 {
            for column_name in frame
                .get_column_names()
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
            {
                if let Some(base) = variant_base(&column_name, &primary_columns, reference_variables)
                {
                    debug!(
                        source = name.as_str(),
                        from = column_name.as_str(),
                        to = base.as_str(),
                        "aligned suffixed source column"
                    );
                    frame.rename(&column_name, base.as_str().into())?;
                }
            }
        }
        if domain.eq_ignore_ascii_case("DS") {
            let category = if index == 0 {
                "DISPOSITION EVENT"
            } else {
                "PROTOCOL MILESTONE"
            };
            if frame.column("DSCAT").is_err() {
                let column = Column::new("DSCAT".into(), vec![category; frame.height()]);
                frame.with_column(column)?;
            }
        }
        aligned.push(frame);
    }

    // Union schema in first-appearance order; missing columns become nulls.
    let mut union: Vec<String> = Vec::new();
    for frame in &aligned {
        for name in frame.get_column_names() {
            if !union.iter().any(|u| u == name.as_str()) {
                union.push(name.to_string());
            }
        }
    }

    let mut stacked: Option<DataFrame> = None;
    for frame in &aligned {
        let mut columns = Vec::with_capacity(union.len());
        for name in &union {
            match frame.column(name) {
                Ok(column) => columns.push(column.clone()),
                Err(_) => {
                    let nulls: Vec<Option<String>> = vec![None; frame.height()];
                    columns.push(Column::new(name.as_str().into(), nulls));
                }
            }
        }
        let normalized = DataFrame::new(columns)?;
        stacked = Some(match stacked {
            None => normalized,
            Some(acc) => acc.vstack(&normalized)?,
        });
    }

    let result = stacked.expect("at least one frame");
    if result.height() != frames.iter().map(|(_, f)| f.height()).sum::<usize>() {
        warn!(domain, "row count changed during multi-source concat");
    }
    Ok(result)
}

/// Strip one digit run from a column name and return the base spelling
/// when it matches the primary schema or the reference variable list.
fn variant_base(
    name: &str,
    primary_columns: &[String],
    reference_variables: &[String],
) -> Option<String> {
    let chars: Vec<char> = name.chars().collect();
    // Try removing each maximal digit run, last first.
    let mut runs: Vec<(usize, usize)> = Vec::new();
    let mut start = None;
    for (idx, ch) in chars.iter().enumerate() {
        if ch.is_ascii_digit() {
            if start.is_none() {
                start = Some(idx);
            }
        } else if let Some(s) = start.take() {
            runs.push((s, idx));
        }
    }
    if let Some(s) = start {
        runs.push((s, chars.len()));
    }

    for (run_start, run_end) in runs.into_iter().rev() {
        let candidate: String = chars[..run_start]
            .iter()
            .chain(&chars[run_end..])
            .collect();
        if candidate.is_empty() {
            continue;
        }
        let matches = primary_columns
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&candidate))
            || reference_variables
                .iter()
                .any(|v| v.eq_ignore_ascii_case(&candidate));
        if matches && !name.eq_ignore_ascii_case(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Resolve the frames a spec reads, keyed by dataset stem.
pub fn select_sources(
    domain: &str,
    wanted: &[String],
    raw: &BTreeMap<String, DataFrame>,
) -> Result<Vec<(String, DataFrame)>, ExecutionError> {
    let mut selected = Vec::new();
    for name in wanted {
        let stem = stem_of(name);
        let found = raw.iter().find(|(key, _)| {
            stem_of(key).eq_ignore_ascii_case(&stem)
        });
        match found {
            Some((key, frame)) => selected.push((key.clone(), frame.clone())),
            None => warn!(domain, source = name.as_str(), "source dataset not supplied"),
        }
    }
    if selected.is_empty() {
        return Err(ExecutionError::MissingSources {
            domain: domain.to_string(),
            expected: wanted.to_vec(),
        });
    }
    Ok(selected)
}

/// Filename stem without extension.
pub fn stem_of(name: &str) -> String {
    name.rsplit_once('.')
        .map_or(name, |(stem, _)| stem)
        .to_string()
}
