//! Plan execution on sandboxed contexts
//!
//! A [`PhysicalPlan`] names a table, its predicates and projection. The
//! [`WasmBackend`] gives each plan a fresh context from the registry, maps the
//! plan's data into it and hands the context to a [`WasmEngine`] to compile
//! and run. Engines only see the context read-only.

mod engine;
mod errors;
mod plan;
mod scan;
mod wasm_backend;

pub use engine::{CompiledPlan, ResultSet, WasmEngine};
pub use errors::{BackendError, BackendResult};
pub use plan::{CmpOp, PhysicalPlan, Predicate};
pub use scan::ScanEngine;
pub use wasm_backend::WasmBackend;
