//! strata - nested PAX data layouts and sandboxed execution contexts
//!
//! - `layout`: layout trees describing where every attribute of every tuple lives
//! - `catalog`: scalar types, tables stored in a layout, mappable indexes
//! - `sandbox`: per-plan linear memories and the registry that owns them
//! - `backend`: plans, engines and the façade that runs them
//! - `observability`: JSON-line logging and counters

pub mod backend;
pub mod catalog;
pub mod layout;
pub mod observability;
pub mod sandbox;
