//! Layout error types
//!
//! Error codes:
//! - STRATA_LAYOUT_OVERLAP (FATAL)
//! - STRATA_LAYOUT_OUT_OF_BOUNDS (FATAL)
//! - STRATA_LAYOUT_DUPLICATE_ATTRIBUTE (FATAL)
//! - STRATA_LAYOUT_INVALID_NODE (FATAL)
//! - STRATA_LAYOUT_MISALIGNED (FATAL)
//! - STRATA_LAYOUT_COVERAGE (FATAL)
//! - STRATA_LAYOUT_CHECKSUM_MISMATCH (FATAL)
//! - STRATA_LAYOUT_UNKNOWN_ATTRIBUTE (ERROR)
//! - STRATA_LAYOUT_PERSIST_FAILED (ERROR)
//!
//! Layouts are built once ahead of use, so every construction defect is fatal:
//! there is no recovery value in tolerating a malformed layout.

use std::fmt;
use std::io;

/// Severity levels for layout errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation failed but the layout is intact
    Error,
    /// The layout is malformed; the operation must abort
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Layout error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutErrorCode {
    /// A child region overlaps a sibling's region
    StrataLayoutOverlap,
    /// A child region exceeds its parent's region
    StrataLayoutOutOfBounds,
    /// An attribute is bound to more than one leaf
    StrataLayoutDuplicateAttribute,
    /// Bad parent, zero capacity/size, second root, missing root
    StrataLayoutInvalidNode,
    /// A leaf is not aligned to its type in absolute terms
    StrataLayoutMisaligned,
    /// The layout does not bind a schema's attributes exactly once
    StrataLayoutCoverage,
    /// A persisted layout failed its checksum
    StrataLayoutChecksumMismatch,
    /// Lookup of an attribute the layout does not bind
    StrataLayoutUnknownAttribute,
    /// Reading or writing a persisted layout failed
    StrataLayoutPersistFailed,
}

impl LayoutErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            LayoutErrorCode::StrataLayoutOverlap => "STRATA_LAYOUT_OVERLAP",
            LayoutErrorCode::StrataLayoutOutOfBounds => "STRATA_LAYOUT_OUT_OF_BOUNDS",
            LayoutErrorCode::StrataLayoutDuplicateAttribute => "STRATA_LAYOUT_DUPLICATE_ATTRIBUTE",
            LayoutErrorCode::StrataLayoutInvalidNode => "STRATA_LAYOUT_INVALID_NODE",
            LayoutErrorCode::StrataLayoutMisaligned => "STRATA_LAYOUT_MISALIGNED",
            LayoutErrorCode::StrataLayoutCoverage => "STRATA_LAYOUT_COVERAGE",
            LayoutErrorCode::StrataLayoutChecksumMismatch => "STRATA_LAYOUT_CHECKSUM_MISMATCH",
            LayoutErrorCode::StrataLayoutUnknownAttribute => "STRATA_LAYOUT_UNKNOWN_ATTRIBUTE",
            LayoutErrorCode::StrataLayoutPersistFailed => "STRATA_LAYOUT_PERSIST_FAILED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            LayoutErrorCode::StrataLayoutUnknownAttribute
            | LayoutErrorCode::StrataLayoutPersistFailed => Severity::Error,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for LayoutErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Layout error with full context
#[derive(Debug)]
pub struct LayoutError {
    code: LayoutErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl LayoutError {
    fn new(code: LayoutErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            source: None,
        }
    }

    pub fn overlap(message: impl Into<String>) -> Self {
        Self::new(LayoutErrorCode::StrataLayoutOverlap, message)
    }

    pub fn out_of_bounds(message: impl Into<String>) -> Self {
        Self::new(LayoutErrorCode::StrataLayoutOutOfBounds, message)
    }

    pub fn duplicate_attribute(attribute: usize) -> Self {
        Self::new(
            LayoutErrorCode::StrataLayoutDuplicateAttribute,
            format!("attribute {} is already bound to a leaf", attribute),
        )
    }

    pub fn invalid_node(message: impl Into<String>) -> Self {
        Self::new(LayoutErrorCode::StrataLayoutInvalidNode, message)
    }

    pub fn misaligned(message: impl Into<String>) -> Self {
        Self::new(LayoutErrorCode::StrataLayoutMisaligned, message)
    }

    pub fn coverage(message: impl Into<String>) -> Self {
        Self::new(LayoutErrorCode::StrataLayoutCoverage, message)
    }

    pub fn checksum_mismatch(expected: &str, actual: &str) -> Self {
        Self::new(
            LayoutErrorCode::StrataLayoutChecksumMismatch,
            format!("layout checksum mismatch: recorded {}, computed {}", expected, actual),
        )
    }

    pub fn unknown_attribute(attribute: usize) -> Self {
        Self::new(
            LayoutErrorCode::StrataLayoutUnknownAttribute,
            format!("attribute {} is not bound by this layout", attribute),
        )
    }

    pub fn persist_failed(message: impl Into<String>) -> Self {
        Self::new(LayoutErrorCode::StrataLayoutPersistFailed, message)
    }

    pub fn persist_io(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: LayoutErrorCode::StrataLayoutPersistFailed,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> LayoutErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns whether this is a fatal error
    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for LayoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for LayoutError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for layout operations
pub type LayoutResult<T> = Result<T, LayoutError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_defects_are_fatal() {
        assert!(LayoutError::overlap("x").is_fatal());
        assert!(LayoutError::out_of_bounds("x").is_fatal());
        assert!(LayoutError::duplicate_attribute(3).is_fatal());
        assert!(LayoutError::misaligned("x").is_fatal());
    }

    #[test]
    fn test_lookup_and_io_are_not_fatal() {
        assert!(!LayoutError::unknown_attribute(9).is_fatal());
        assert!(!LayoutError::persist_failed("disk").is_fatal());
    }

    #[test]
    fn test_error_display() {
        let err = LayoutError::duplicate_attribute(4);
        let display = err.to_string();
        assert!(display.starts_with("[FATAL] STRATA_LAYOUT_DUPLICATE_ATTRIBUTE"));
        assert!(display.contains("attribute 4"));
    }
}
