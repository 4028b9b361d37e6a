//! Catalog collaborators
//!
//! The parts of a table catalog the layout and sandbox machinery depend on:
//! scalar types, tables with a layout-driven physical store, and indexes that
//! can be copied into linear memory.

mod codec;
mod errors;
mod index;
mod store;
mod table;
mod types;

pub use codec::{check_value, decode, encode};
pub use errors::{CatalogError, CatalogResult};
pub use index::{Index, SortedIndex};
pub use store::LayoutStore;
pub use table::{Attribute, Table};
pub use types::{Type, Value};
