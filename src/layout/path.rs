//! Attribute access paths
//!
//! An [`AccessPath`] is the offset computation generated code performs to find
//! the value of one attribute for tuple `t`:
//!
//! ```text
//! addr = (t / root.capacity) * root.stride      t %= root.capacity
//! for each nested block:
//! addr += offset + (t / capacity) * stride      t %= capacity
//! addr += leaf.offset + t * leaf.stride
//! ```
//!
//! The loop runs once per nesting level, so the same code serves flat PAX,
//! PAX-in-PAX and deeper groupings.

use serde::{Deserialize, Serialize};

use crate::catalog::Type;

/// One block level on the way from the root to a leaf
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Tuples per instance of the block
    pub capacity: u64,
    /// Offset of the block within its parent instance (0 for the root)
    pub offset_in_bits: u64,
    /// Distance between consecutive instances of the block
    pub stride_in_bits: u64,
}

/// Resolved location of one attribute
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessPath {
    attribute: usize,
    ty: Type,
    levels: Vec<Step>,
    leaf_offset_in_bits: u64,
    leaf_stride_in_bits: u64,
}

impl AccessPath {
    pub(crate) fn new(
        attribute: usize,
        ty: Type,
        levels: Vec<Step>,
        leaf_offset_in_bits: u64,
        leaf_stride_in_bits: u64,
    ) -> Self {
        Self {
            attribute,
            ty,
            levels,
            leaf_offset_in_bits,
            leaf_stride_in_bits,
        }
    }

    pub fn attribute(&self) -> usize {
        self.attribute
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    /// Block levels from the root down to the leaf's parent
    pub fn levels(&self) -> &[Step] {
        &self.levels
    }

    /// Number of block levels above the leaf
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    pub fn leaf_offset_in_bits(&self) -> u64 {
        self.leaf_offset_in_bits
    }

    pub fn stride_in_bits(&self) -> u64 {
        self.leaf_stride_in_bits
    }

    /// Bit address of the attribute's value for `tuple`, relative to the
    /// start of the table's storage. `None` if the address overflows.
    pub fn bit_offset(&self, tuple: u64) -> Option<u64> {
        let mut levels = self.levels.iter();
        let (mut addr, mut t) = match levels.next() {
            Some(root) => (
                (tuple / root.capacity)
                    .checked_mul(root.stride_in_bits)?
                    .checked_add(root.offset_in_bits)?,
                tuple % root.capacity,
            ),
            None => (0, tuple),
        };
        for step in levels {
            addr = addr
                .checked_add(step.offset_in_bits)?
                .checked_add((t / step.capacity).checked_mul(step.stride_in_bits)?)?;
            t %= step.capacity;
        }
        addr.checked_add(self.leaf_offset_in_bits)?
            .checked_add(t.checked_mul(self.leaf_stride_in_bits)?)
    }

    /// Byte address of the byte holding the value's first bit
    pub fn byte_offset(&self, tuple: u64) -> Option<u64> {
        self.bit_offset(tuple).map(|bit| bit / 8)
    }
}
