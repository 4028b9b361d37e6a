//! Sandbox configuration

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::errors::{SandboxError, SandboxResult};
use super::{DEFAULT_GUARD_PAGE_SIZE, WASM_ALIGNMENT, WASM_MAX_MEMORY, WASM_PAGE_SIZE};

bitflags! {
    /// Per-context behavior switches
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ContextFlags: u32 {
        /// Follow every mapped region with an inaccessible guard page
        const TRAP_GUARD_PAGES = 0b1;
    }
}

/// Configuration for sandboxed execution contexts
///
/// Missing JSON fields fall back to [`SandboxConfig::default`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Reserved linear memory per context, in bytes
    pub size_bytes: u64,
    /// Install a guard page after each mapped region
    pub trap_guard_pages: bool,
    /// Size of a guard page (power of two, at most one wasm page)
    pub guard_page_size: u32,
    /// Minimum alignment of every mapped region (power of two)
    pub min_alignment: u32,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            size_bytes: WASM_MAX_MEMORY,
            trap_guard_pages: false,
            guard_page_size: DEFAULT_GUARD_PAGE_SIZE,
            min_alignment: WASM_ALIGNMENT,
        }
    }
}

impl SandboxConfig {
    /// Default configuration with guard pages enabled
    pub fn with_guard_pages() -> Self {
        Self {
            trap_guard_pages: true,
            ..Self::default()
        }
    }

    /// Set the reserved size
    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = size_bytes;
        self
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> SandboxResult<Self> {
        let config: SandboxConfig = serde_json::from_str(json)
            .map_err(|e| SandboxError::invalid_config(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> SandboxResult<()> {
        if self.size_bytes == 0 || self.size_bytes > WASM_MAX_MEMORY {
            return Err(SandboxError::invalid_config(format!(
                "size_bytes {} must be in 1..={}",
                self.size_bytes, WASM_MAX_MEMORY
            )));
        }
        if !self.guard_page_size.is_power_of_two() || self.guard_page_size > WASM_PAGE_SIZE {
            return Err(SandboxError::invalid_config(format!(
                "guard_page_size {} must be a power of two no larger than {}",
                self.guard_page_size, WASM_PAGE_SIZE
            )));
        }
        if !self.min_alignment.is_power_of_two() {
            return Err(SandboxError::invalid_config(format!(
                "min_alignment {} must be a power of two",
                self.min_alignment
            )));
        }
        Ok(())
    }

    pub fn flags(&self) -> ContextFlags {
        let mut flags = ContextFlags::empty();
        if self.trap_guard_pages {
            flags |= ContextFlags::TRAP_GUARD_PAGES;
        }
        flags
    }
}
