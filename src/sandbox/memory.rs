//! Linear memory backing one context
//!
//! Each context owns a private wasmtime store holding a single 32-bit linear
//! memory. The memory starts empty and is committed in 64 KiB wasm pages as the
//! context's heap cursor advances; it can never grow past the reserved size.

use std::fmt;

use wasmtime::{Engine, Memory, MemoryType, Store};

use super::errors::{SandboxError, SandboxResult};
use super::{WASM_MAX_MEMORY, WASM_PAGE_SIZE};

pub struct AddressSpace {
    store: Store<()>,
    memory: Memory,
    size: u64,
}

impl AddressSpace {
    /// Reserve `size` bytes of address space; nothing is committed yet
    pub fn new(engine: &Engine, size: u64) -> SandboxResult<Self> {
        if size == 0 || size > WASM_MAX_MEMORY {
            return Err(SandboxError::invalid_config(format!(
                "address space of {} bytes is outside 1..={}",
                size, WASM_MAX_MEMORY
            )));
        }
        let max_pages = u32::try_from(size.div_ceil(u64::from(WASM_PAGE_SIZE)))
            .map_err(|_| SandboxError::invalid_config("address space page count overflows"))?;

        let mut store = Store::new(engine, ());
        let memory = Memory::new(&mut store, MemoryType::new(0, Some(max_pages)))
            .map_err(|e| SandboxError::memory_failed(format!("failed to reserve memory: {}", e)))?;

        Ok(Self {
            store,
            memory,
            size,
        })
    }

    /// Reserved size in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Bytes currently backed by committed pages
    pub fn committed(&self) -> u64 {
        self.memory.data_size(&self.store) as u64
    }

    /// Commit pages so that `[0, end)` is addressable
    pub fn ensure_committed(&mut self, end: u64) -> SandboxResult<()> {
        if end > self.size {
            return Err(SandboxError::memory_failed(format!(
                "cannot commit {} bytes of a {} byte reservation",
                end, self.size
            )));
        }
        let committed = self.committed();
        if end <= committed {
            return Ok(());
        }
        let pages = (end - committed).div_ceil(u64::from(WASM_PAGE_SIZE));
        self.memory
            .grow(&mut self.store, pages)
            .map_err(|e| SandboxError::memory_failed(format!("failed to grow memory: {}", e)))?;
        Ok(())
    }

    /// All committed bytes
    pub fn bytes(&self) -> &[u8] {
        self.memory.data(&self.store)
    }

    pub fn bytes_mut(&mut self) -> &mut [u8] {
        self.memory.data_mut(&mut self.store)
    }
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("size", &self.size)
            .field("committed", &self.committed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commits_whole_pages() {
        let engine = Engine::default();
        let mut vm = AddressSpace::new(&engine, 1 << 20).unwrap();
        assert_eq!(vm.committed(), 0);

        vm.ensure_committed(10).unwrap();
        assert_eq!(vm.committed(), 65536);
        vm.ensure_committed(65536).unwrap();
        assert_eq!(vm.committed(), 65536);
        vm.ensure_committed(65537).unwrap();
        assert_eq!(vm.committed(), 131072);
        assert_eq!(vm.bytes().len(), 131072);
    }

    #[test]
    fn test_cannot_commit_past_reservation() {
        let engine = Engine::default();
        let mut vm = AddressSpace::new(&engine, 2 * 65536).unwrap();
        let err = vm.ensure_committed(2 * 65536 + 1).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_writes_are_visible() {
        let engine = Engine::default();
        let mut vm = AddressSpace::new(&engine, 65536).unwrap();
        vm.ensure_committed(16).unwrap();
        vm.bytes_mut()[8..12].copy_from_slice(&[1, 2, 3, 4]);
        assert_eq!(&vm.bytes()[8..12], &[1, 2, 3, 4]);
    }

    #[test]
    fn test_rejects_oversized_reservation() {
        let engine = Engine::default();
        assert!(AddressSpace::new(&engine, WASM_MAX_MEMORY + 1).is_err());
        assert!(AddressSpace::new(&engine, 0).is_err());
    }
}
