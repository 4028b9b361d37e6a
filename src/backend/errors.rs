//! Backend errors

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::layout::LayoutError;
use crate::sandbox::SandboxError;

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Backend errors
///
/// Compile and execute failures belong to a single plan. Wrapped errors keep
/// their own severity.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Plan {plan}: compilation failed: {reason}")]
    Compile { plan: u32, reason: String },

    #[error("Plan {plan}: execution failed: {reason}")]
    Execute { plan: u32, reason: String },

    #[error(transparent)]
    Sandbox(#[from] SandboxError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Layout(#[from] LayoutError),
}

impl BackendError {
    pub fn compile(plan: u32, reason: impl Into<String>) -> Self {
        BackendError::Compile {
            plan,
            reason: reason.into(),
        }
    }

    pub fn execute(plan: u32, reason: impl Into<String>) -> Self {
        BackendError::Execute {
            plan,
            reason: reason.into(),
        }
    }

    pub fn is_fatal(&self) -> bool {
        match self {
            BackendError::Sandbox(e) => e.is_fatal(),
            BackendError::Catalog(e) => e.is_fatal(),
            BackendError::Layout(e) => e.is_fatal(),
            BackendError::Compile { .. } | BackendError::Execute { .. } => false,
        }
    }
}
