//! Domain frame wrapper and the serializer seam.
//!
//! [`DomainFrame`] carries a materialised SDTM dataset plus the identity
//! metadata the packager needs. [`DatasetWriter`] is the pluggable
//! serializer boundary: the transport-format limits (8-char names, 40-char
//! labels, 200-byte values, lowercase filenames) are enforced upstream by
//! the engine and the validator, so any conforming writer can be plugged
//! in. A CSV writer ships here; XPT is an external serializer.

use std::fs::File;
use std::path::Path;

use polars::prelude::{CsvWriter, DataFrame, SerWriter};

use crate::error::ExecutionError;

/// A materialised SDTM dataset.
#[derive(Debug, Clone)]
pub struct DomainFrame {
    /// Domain code (e.g. "AE", "SUPPAE", "LC").
    pub domain_code: String,
    /// Dataset label (40-char transport limit enforced by validation).
    pub label: String,
    pub data: DataFrame,
    /// Carried from LB when this frame is a structural LC copy.
    pub lc_unit_conversion_performed: Option<bool>,
}

impl DomainFrame {
    pub fn new(domain_code: impl Into<String>, label: impl Into<String>, data: DataFrame) -> Self {
        Self {
            domain_code: domain_code.into(),
            label: label.into(),
            data,
            lc_unit_conversion_performed: None,
        }
    }

    /// Lowercase transport filename for this dataset.
    pub fn transport_filename(&self) -> String {
        format!("{}.xpt", self.domain_code.to_lowercase())
    }
}

/// Pluggable dataset serializer.
pub trait DatasetWriter {
    /// File extension this writer produces (without dot).
    fn extension(&self) -> &'static str;

    /// Write one frame.
    fn write(&self, frame: &DomainFrame, path: &Path) -> Result<(), ExecutionError>;
}

/// CSV serializer, the bundled default.
#[derive(Debug, Default)]
pub struct CsvDatasetWriter;

impl DatasetWriter for CsvDatasetWriter {
    fn extension(&self) -> &'static str {
        "csv"
    }

    fn write(&self, frame: &DomainFrame, path: &Path) -> Result<(), ExecutionError> {
        let mut file = File::create(path).map_err(|e| ExecutionError::Write {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let mut data = frame.data.clone();
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut data)
            .map_err(|e| ExecutionError::Write {
                path: path.display().to_string(),
                message: e.to_string(),
            })
    }
}
