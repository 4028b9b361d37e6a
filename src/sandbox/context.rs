//! Execution context: one plan's private address space
//!
//! The heap cursor starts at 0 and only moves forward. Each mapping aligns
//! the cursor, copies the region in and advances past it; with
//! `TRAP_GUARD_PAGES` set a guard page follows every region. Capacity is
//! checked for the region and its guard together before anything is written,
//! so a failed mapping leaves the context exactly as it was.

use std::sync::Arc;

use wasmtime::Engine;

use super::config::{ContextFlags, SandboxConfig};
use super::errors::{SandboxError, SandboxResult};
use super::memory::AddressSpace;
use crate::backend::PhysicalPlan;
use crate::catalog::{Index, Table, Type};
use crate::layout::{align_up, DataLayout, DataLayoutFactory};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry};

/// A table or index copied into the address space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRegion {
    pub name: String,
    pub addr: u32,
    pub len: u64,
}

impl MappedRegion {
    pub fn end(&self) -> u64 {
        u64::from(self.addr) + self.len
    }
}

/// A table mapping together with the shape its bytes were copied in
#[derive(Debug, Clone, PartialEq)]
pub struct MappedTable {
    pub region: MappedRegion,
    pub layout: DataLayout,
    pub types: Vec<Type>,
    pub num_rows: u64,
}

impl MappedTable {
    pub fn name(&self) -> &str {
        &self.region.name
    }

    pub fn addr(&self) -> u32 {
        self.region.addr
    }

    pub fn end(&self) -> u64 {
        self.region.end()
    }
}

/// An inaccessible range following a mapped region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardRegion {
    pub start: u32,
    pub len: u32,
}

impl GuardRegion {
    pub fn end(&self) -> u64 {
        u64::from(self.start) + u64::from(self.len)
    }

    fn overlaps(&self, start: u64, end: u64) -> bool {
        start < self.end() && u64::from(self.start) < end
    }
}

#[derive(Debug)]
pub struct WasmContext {
    id: u32,
    plan: Arc<PhysicalPlan>,
    result_set_factory: Box<dyn DataLayoutFactory>,
    vm: AddressSpace,
    heap: u32,
    flags: ContextFlags,
    config: SandboxConfig,
    indexes: Vec<Arc<dyn Index>>,
    tables: Vec<MappedTable>,
    mapped_indexes: Vec<MappedRegion>,
    guards: Vec<GuardRegion>,
    metrics: Arc<MetricsRegistry>,
}

impl WasmContext {
    pub(crate) fn new(
        id: u32,
        plan: Arc<PhysicalPlan>,
        result_set_factory: Box<dyn DataLayoutFactory>,
        engine: &Engine,
        config: SandboxConfig,
        metrics: Arc<MetricsRegistry>,
    ) -> SandboxResult<Self> {
        config.validate()?;
        let vm = AddressSpace::new(engine, config.size_bytes)?;
        Ok(Self {
            id,
            plan,
            result_set_factory,
            vm,
            heap: 0,
            flags: config.flags(),
            config,
            indexes: Vec::new(),
            tables: Vec::new(),
            mapped_indexes: Vec::new(),
            guards: Vec::new(),
            metrics,
        })
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn plan(&self) -> &Arc<PhysicalPlan> {
        &self.plan
    }

    /// Factory used to lay out query results
    pub fn result_set_factory(&self) -> &dyn DataLayoutFactory {
        self.result_set_factory.as_ref()
    }

    /// Next free address
    pub fn heap(&self) -> u32 {
        self.heap
    }

    /// Whether `flag` is set for this context
    pub fn config(&self, flag: ContextFlags) -> bool {
        self.flags.contains(flag)
    }

    pub fn flags(&self) -> ContextFlags {
        self.flags
    }

    pub fn sandbox_config(&self) -> &SandboxConfig {
        &self.config
    }

    pub fn vm(&self) -> &AddressSpace {
        &self.vm
    }

    pub fn mapped_tables(&self) -> &[MappedTable] {
        &self.tables
    }

    pub fn mapped_indexes(&self) -> &[MappedRegion] {
        &self.mapped_indexes
    }

    pub fn guard_regions(&self) -> &[GuardRegion] {
        &self.guards
    }

    /// First mapping of table `name`
    pub fn mapped_table(&self, name: &str) -> Option<&MappedTable> {
        self.tables.iter().find(|t| t.name() == name)
    }

    /// Base address of the first mapping of table `name`
    pub fn table_address(&self, name: &str) -> Option<u32> {
        self.mapped_table(name).map(MappedTable::addr)
    }

    pub fn indexes(&self) -> &[Arc<dyn Index>] {
        &self.indexes
    }

    pub fn index(&self, id: usize) -> Option<&Arc<dyn Index>> {
        self.indexes.get(id)
    }

    /// Register an index for the plan and return its position.
    ///
    /// Registration does not map the index and does not deduplicate.
    pub fn add_index(&mut self, index: Arc<dyn Index>) -> usize {
        let id = self.indexes.len();
        log_event_with_fields(
            Event::IndexRegistered,
            &[
                ("context", &self.id.to_string()),
                ("index", index.name()),
                ("position", &id.to_string()),
            ],
        );
        self.indexes.push(index);
        id
    }

    /// Copy a table's physical bytes into the address space.
    ///
    /// The region is aligned to the wider of `min_alignment` and the table
    /// layout's alignment and spans `layout.footprint_bytes(num_rows)` bytes.
    pub fn map_table(&mut self, table: &Table) -> SandboxResult<u32> {
        let layout = table.layout();
        let align = u64::from(self.config.min_alignment).max(layout.alignment());
        let bytes = table.store().bytes();
        let len = layout.footprint_bytes(table.num_rows());
        debug_assert_eq!(bytes.len() as u64, len);

        let addr = self.reserve(len, align)?;
        let start = addr as usize;
        self.vm.bytes_mut()[start..start + bytes.len()].copy_from_slice(bytes);
        self.advance(u64::from(addr) + len);

        self.tables.push(MappedTable {
            region: MappedRegion {
                name: table.name().to_string(),
                addr,
                len,
            },
            layout: layout.clone(),
            types: table.types().to_vec(),
            num_rows: table.num_rows(),
        });
        self.metrics.record_table_mapped(len);
        log_event_with_fields(
            Event::TableMapped,
            &[
                ("addr", &addr.to_string()),
                ("context", &self.id.to_string()),
                ("len", &len.to_string()),
                ("table", table.name()),
            ],
        );

        self.guard_if_trapping()?;
        Ok(addr)
    }

    /// Serialize an index into the address space
    pub fn map_index(&mut self, index: &dyn Index) -> SandboxResult<u32> {
        let align = u64::from(self.config.min_alignment).max(index.alignment());
        let len = index.footprint();

        let addr = self.reserve(len, align)?;
        let start = addr as usize;
        index.write_into(&mut self.vm.bytes_mut()[start..start + len as usize]);
        self.advance(u64::from(addr) + len);

        self.mapped_indexes.push(MappedRegion {
            name: index.name().to_string(),
            addr,
            len,
        });
        self.metrics.record_index_mapped(len);
        log_event_with_fields(
            Event::IndexMapped,
            &[
                ("addr", &addr.to_string()),
                ("context", &self.id.to_string()),
                ("index", index.name()),
                ("len", &len.to_string()),
            ],
        );

        self.guard_if_trapping()?;
        Ok(addr)
    }

    /// Round the heap up to a page boundary and reserve one inaccessible page
    pub fn install_guard_page(&mut self) -> SandboxResult<u32> {
        let page = u64::from(self.config.guard_page_size);
        let start = align_up(u64::from(self.heap), page);
        let end = start + page;
        self.check_capacity(end, page)?;
        self.vm.ensure_committed(end)?;

        let start = start as u32;
        self.guards.push(GuardRegion {
            start,
            len: self.config.guard_page_size,
        });
        self.advance(end);

        self.metrics.increment_guard_pages();
        log_event_with_fields(
            Event::GuardPageInstalled,
            &[
                ("context", &self.id.to_string()),
                ("len", &page.to_string()),
                ("start", &start.to_string()),
            ],
        );
        Ok(start)
    }

    /// Read `len` mapped bytes at `addr`
    pub fn read(&self, addr: u32, len: u64) -> SandboxResult<&[u8]> {
        let (start, end) = self.check_access(addr, len)?;
        Ok(&self.vm.bytes()[start..end])
    }

    /// Overwrite mapped bytes at `addr`
    pub fn write(&mut self, addr: u32, bytes: &[u8]) -> SandboxResult<()> {
        let (start, end) = self.check_access(addr, bytes.len() as u64)?;
        self.vm.bytes_mut()[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn check_access(&self, addr: u32, len: u64) -> SandboxResult<(usize, usize)> {
        let start = u64::from(addr);
        let end = match start.checked_add(len) {
            Some(end) if end <= u64::from(self.heap) => end,
            _ => return Err(SandboxError::out_of_bounds(start, len, self.heap)),
        };
        if let Some(guard) = self.guards.iter().find(|g| g.overlaps(start, end)) {
            return Err(SandboxError::guard_violation(start, len, guard.start));
        }
        Ok((start as usize, end as usize))
    }

    /// Find an aligned address for `len` bytes and commit memory for it.
    ///
    /// With guard pages enabled the following guard must fit as well.
    fn reserve(&mut self, len: u64, align: u64) -> SandboxResult<u32> {
        let start = align_up(u64::from(self.heap), align);
        let end = start + len;
        let mut needed = end;
        if self.config(ContextFlags::TRAP_GUARD_PAGES) {
            let page = u64::from(self.config.guard_page_size);
            needed = align_up(end, page) + page;
        }
        self.check_capacity(needed, len)?;
        self.vm.ensure_committed(end)?;
        Ok(start as u32)
    }

    fn check_capacity(&self, end: u64, requested: u64) -> SandboxResult<()> {
        if end <= self.vm.size() {
            return Ok(());
        }
        let err = SandboxError::capacity_exceeded(self.id, requested, self.heap, self.vm.size());
        log_event_with_fields(
            Event::SandboxExhausted,
            &[("context", &self.id.to_string()), ("error", err.message())],
        );
        Err(err)
    }

    fn advance(&mut self, end: u64) {
        debug_assert!(end >= u64::from(self.heap));
        self.heap = end as u32;
    }

    fn guard_if_trapping(&mut self) -> SandboxResult<()> {
        if self.config(ContextFlags::TRAP_GUARD_PAGES) {
            self.install_guard_page()?;
        }
        Ok(())
    }
}
