//! Sandboxed execution contexts
//!
//! A context is the private linear memory a compiled plan runs against.
//! Tables and indexes are copied into it at ascending, aligned addresses by a
//! monotonically advancing heap cursor; optional guard pages separate the
//! regions. Contexts live in an explicitly owned [`ContextRegistry`].
//!
//! # Invariants
//!
//! - The heap cursor never decreases
//! - Every mapped region is aligned to at least `min_alignment`
//! - Mapped regions never overlap each other or a guard page
//! - A mapping that does not fit leaves the context unchanged

mod config;
mod context;
mod errors;
mod memory;
mod registry;

pub use config::{ContextFlags, SandboxConfig};
pub use context::{GuardRegion, MappedRegion, MappedTable, WasmContext};
pub use errors::{SandboxError, SandboxErrorCode, SandboxResult, Severity};
pub use memory::AddressSpace;
pub use registry::ContextRegistry;

/// Size of one wasm page
pub const WASM_PAGE_SIZE: u32 = 64 * 1024;

/// Largest linear memory a context may reserve: 4 GiB minus one wasm page
pub const WASM_MAX_MEMORY: u64 = (1u64 << 32) - (1u64 << 16);

/// Minimum alignment of mapped regions
pub const WASM_ALIGNMENT: u32 = 8;

/// Default guard page size, one OS page
pub const DEFAULT_GUARD_PAGE_SIZE: u32 = 4096;
