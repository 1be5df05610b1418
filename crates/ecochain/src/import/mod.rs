//! Load an exported supplier table into [`SupplierRecord`]s.
//!
//! Column headers follow the warehouse table. Pipeline progress is rebuilt from the columns a
//! row carries: no embedding means `Registered`, an embedding alone `Embedded`, a full score
//! group `Scored`, and a recommendation on top of that `Recommended`.

mod parser;

use std::io::Read;
use std::path::Path;

use tracing::info;

use crate::suppliers::{PipelineStage, SupplierRecord};

use parser::{parse_records, ParseFailure};

#[derive(Debug)]
pub enum SupplierImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    InvalidRow { line: u64, reason: String },
}

impl std::fmt::Display for SupplierImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SupplierImportError::Io(err) => write!(f, "failed to read supplier export: {}", err),
            SupplierImportError::Csv(err) => write!(f, "invalid supplier CSV data: {}", err),
            SupplierImportError::InvalidRow { line, reason } => {
                write!(f, "supplier row on line {}: {}", line, reason)
            }
        }
    }
}

impl std::error::Error for SupplierImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SupplierImportError::Io(err) => Some(err),
            SupplierImportError::Csv(err) => Some(err),
            SupplierImportError::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for SupplierImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for SupplierImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

impl From<ParseFailure> for SupplierImportError {
    fn from(failure: ParseFailure) -> Self {
        match failure {
            ParseFailure::Csv(err) => Self::Csv(err),
            ParseFailure::Row(rejection) => Self::InvalidRow {
                line: rejection.line,
                reason: rejection.reason,
            },
        }
    }
}

pub struct SupplierImporter;

impl SupplierImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<SupplierRecord>, SupplierImportError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let records = Self::from_reader(file)?;
        info!(
            path = %path.display(),
            suppliers = records.len(),
            pending = records
                .iter()
                .filter(|record| record.stage() == PipelineStage::Embedded)
                .count(),
            "imported supplier table"
        );
        Ok(records)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<SupplierRecord>, SupplierImportError> {
        Ok(parse_records(reader)?)
    }
}
