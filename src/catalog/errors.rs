//! Catalog errors
//!
//! Catalog errors are recoverable: a rejected row or index build leaves the
//! table unchanged. Layout defects are carried through unchanged.

use thiserror::Error;

use super::types::Type;
use crate::layout::LayoutError;

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

/// Catalog errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Type mismatch for attribute {attribute}: expected {expected}, found {found}")]
    TypeMismatch {
        attribute: usize,
        expected: Type,
        found: &'static str,
    },

    #[error("Row has {found} values but the table has {expected} attributes")]
    ArityMismatch { expected: usize, found: usize },

    #[error("Value out of range: {0}")]
    ValueOutOfRange(String),

    #[error("Unknown attribute: {0}")]
    UnknownAttribute(usize),

    #[error("Row {row} out of range ({num_rows} rows stored)")]
    RowOutOfRange { row: u64, num_rows: u64 },

    #[error("Buffer too short to hold {ty} at bit {bit_offset}")]
    Truncated { ty: Type, bit_offset: u64 },

    #[error("Corrupt value: {0}")]
    Corrupt(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

impl CatalogError {
    /// Only wrapped layout defects are fatal
    pub fn is_fatal(&self) -> bool {
        match self {
            CatalogError::Layout(e) => e.is_fatal(),
            _ => false,
        }
    }
}
