//! Sandbox and registry error types
//!
//! Error codes:
//! - STRATA_SANDBOX_CAPACITY_EXCEEDED (FATAL)
//! - STRATA_SANDBOX_INVALID_CONFIG (FATAL)
//! - STRATA_SANDBOX_MEMORY_FAILED (FATAL)
//! - STRATA_SANDBOX_OUT_OF_BOUNDS (ERROR)
//! - STRATA_SANDBOX_GUARD_VIOLATION (ERROR)
//! - STRATA_REGISTRY_DUPLICATE_ID (FATAL)
//! - STRATA_REGISTRY_UNKNOWN_ID (FATAL)
//!
//! A context that runs out of reserved memory cannot be repaired; the plan
//! using it must abort. Bad reads from generated code are reported as ERROR.

use std::fmt;

/// Severity levels for sandbox errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// The access failed; the context is intact
    Error,
    /// The context or registry is unusable for this operation
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

/// Sandbox error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SandboxErrorCode {
    /// Mapping would exceed the reserved address space
    StrataSandboxCapacityExceeded,
    /// Configuration rejected before a context was built
    StrataSandboxInvalidConfig,
    /// The linear memory could not be created or grown
    StrataSandboxMemoryFailed,
    /// Access outside the mapped heap
    StrataSandboxOutOfBounds,
    /// Access touching a guard region
    StrataSandboxGuardViolation,
    /// A context with this id already exists
    StrataRegistryDuplicateId,
    /// No context with this id exists
    StrataRegistryUnknownId,
}

impl SandboxErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            SandboxErrorCode::StrataSandboxCapacityExceeded => "STRATA_SANDBOX_CAPACITY_EXCEEDED",
            SandboxErrorCode::StrataSandboxInvalidConfig => "STRATA_SANDBOX_INVALID_CONFIG",
            SandboxErrorCode::StrataSandboxMemoryFailed => "STRATA_SANDBOX_MEMORY_FAILED",
            SandboxErrorCode::StrataSandboxOutOfBounds => "STRATA_SANDBOX_OUT_OF_BOUNDS",
            SandboxErrorCode::StrataSandboxGuardViolation => "STRATA_SANDBOX_GUARD_VIOLATION",
            SandboxErrorCode::StrataRegistryDuplicateId => "STRATA_REGISTRY_DUPLICATE_ID",
            SandboxErrorCode::StrataRegistryUnknownId => "STRATA_REGISTRY_UNKNOWN_ID",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            SandboxErrorCode::StrataSandboxOutOfBounds
            | SandboxErrorCode::StrataSandboxGuardViolation => Severity::Error,
            _ => Severity::Fatal,
        }
    }
}

impl fmt::Display for SandboxErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Sandbox error with full context
#[derive(Debug, Clone)]
pub struct SandboxError {
    code: SandboxErrorCode,
    message: String,
}

impl SandboxError {
    fn new(code: SandboxErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn capacity_exceeded(context: u32, requested: u64, heap: u32, size: u64) -> Self {
        Self::new(
            SandboxErrorCode::StrataSandboxCapacityExceeded,
            format!(
                "context {}: cannot map {} bytes at heap {} within {} reserved bytes",
                context, requested, heap, size
            ),
        )
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::new(SandboxErrorCode::StrataSandboxInvalidConfig, message)
    }

    pub fn memory_failed(message: impl Into<String>) -> Self {
        Self::new(SandboxErrorCode::StrataSandboxMemoryFailed, message)
    }

    pub fn out_of_bounds(addr: u64, len: u64, heap: u32) -> Self {
        Self::new(
            SandboxErrorCode::StrataSandboxOutOfBounds,
            format!("access of {} bytes at {} beyond heap {}", len, addr, heap),
        )
    }

    pub fn guard_violation(addr: u64, len: u64, guard_start: u32) -> Self {
        Self::new(
            SandboxErrorCode::StrataSandboxGuardViolation,
            format!(
                "access [{}, {}) touches guard page at {}",
                addr,
                addr.saturating_add(len),
                guard_start
            ),
        )
    }

    pub fn duplicate_id(id: u32) -> Self {
        Self::new(
            SandboxErrorCode::StrataRegistryDuplicateId,
            format!("context {} already exists", id),
        )
    }

    pub fn unknown_id(id: u32) -> Self {
        Self::new(
            SandboxErrorCode::StrataRegistryUnknownId,
            format!("no context with id {}", id),
        )
    }

    /// Returns the error code
    pub fn code(&self) -> SandboxErrorCode {
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

impl fmt::Display for SandboxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity(), self.code, self.message)
    }
}

impl std::error::Error for SandboxError {}

/// Result type for sandbox operations
pub type SandboxResult<T> = Result<T, SandboxError>;
