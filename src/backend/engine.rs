//! Engine interface
//!
//! Engines receive a shared reference to a prepared context: every table and
//! index the plan needs is already mapped, and they cannot add mappings.

use std::fmt;

use super::errors::BackendResult;
use super::plan::{PhysicalPlan, Predicate};
use crate::catalog::{Attribute, CatalogResult, LayoutStore, Value};
use crate::layout::{AccessPath, DataLayout};
use crate::sandbox::WasmContext;

/// Compiles and runs plans inside an execution context
pub trait WasmEngine: fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn compile(&self, plan: &PhysicalPlan, context: &WasmContext) -> BackendResult<CompiledPlan>;

    fn execute(&self, compiled: &CompiledPlan, context: &WasmContext) -> BackendResult<ResultSet>;
}

/// A plan resolved against one context's address space
#[derive(Debug, Clone)]
pub struct CompiledPlan {
    pub(crate) plan_id: u32,
    pub(crate) table_addr: u32,
    pub(crate) num_rows: u64,
    pub(crate) outputs: Vec<AccessPath>,
    pub(crate) filters: Vec<(AccessPath, Predicate)>,
    pub(crate) schema: Vec<Attribute>,
}

impl CompiledPlan {
    pub fn plan_id(&self) -> u32 {
        self.plan_id
    }

    /// Base address of the scanned table
    pub fn table_addr(&self) -> u32 {
        self.table_addr
    }

    pub fn num_rows(&self) -> u64 {
        self.num_rows
    }

    /// Access paths of the output attributes, in output order
    pub fn outputs(&self) -> &[AccessPath] {
        &self.outputs
    }

    pub fn filters(&self) -> &[(AccessPath, Predicate)] {
        &self.filters
    }

    pub fn schema(&self) -> &[Attribute] {
        &self.schema
    }
}

/// Query output, stored in the layout chosen by the context's factory
#[derive(Debug, Clone)]
pub struct ResultSet {
    schema: Vec<Attribute>,
    store: LayoutStore,
}

impl ResultSet {
    pub fn new(schema: Vec<Attribute>, store: LayoutStore) -> Self {
        Self { schema, store }
    }

    pub fn schema(&self) -> &[Attribute] {
        &self.schema
    }

    pub fn layout(&self) -> &DataLayout {
        self.store.layout()
    }

    pub fn store(&self) -> &LayoutStore {
        &self.store
    }

    pub fn num_rows(&self) -> u64 {
        self.store.num_rows()
    }

    pub fn row(&self, row: u64) -> CatalogResult<Vec<Value>> {
        self.store.row(row)
    }

    /// Decode every row
    pub fn rows(&self) -> CatalogResult<Vec<Vec<Value>>> {
        (0..self.num_rows()).map(|row| self.store.row(row)).collect()
    }
}
