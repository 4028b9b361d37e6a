//! Layout factories
//!
//! A factory turns a schema (attribute types in declaration order) into a
//! [`DataLayout`]. Tables use one to get their default physical format and
//! execution contexts use one to lay out result sets.

use std::cmp::Reverse;
use std::fmt;

use super::align_up;
use super::errors::LayoutResult;
use super::tree::DataLayout;
use crate::catalog::Type;
use crate::observability::{log_event_with_fields, Event};

/// Default PAX block size (64 KiB)
pub const DEFAULT_PAX_BLOCK_SIZE: u64 = 64 * 1024;

/// Builds layouts for a schema
pub trait DataLayoutFactory: fmt::Debug + Send + Sync {
    /// Factory name for logging
    fn name(&self) -> &'static str;

    /// Build a layout for `types`, designed to hold `num_tuples` tuples
    fn make(&self, types: &[Type], num_tuples: u64) -> LayoutResult<DataLayout>;
}

fn log_built(factory: &str, types: &[Type], layout: &DataLayout) {
    let attributes = types.len().to_string();
    let block_bytes = layout.footprint_bytes(1).to_string();
    log_event_with_fields(
        Event::LayoutBuilt,
        &[
            ("factory", factory),
            ("attributes", &attributes),
            ("block_bytes", &block_bytes),
        ],
    );
}

/// Row-major layout: one tuple per block, attributes in declaration order.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowLayoutFactory;

impl DataLayoutFactory for RowLayoutFactory {
    fn name(&self) -> &'static str {
        "row"
    }

    fn make(&self, types: &[Type], num_tuples: u64) -> LayoutResult<DataLayout> {
        let mut offsets = Vec::with_capacity(types.len());
        let mut end = 0u64;
        let mut widest = 8u64;
        for ty in types {
            let align = ty.alignment_in_bits();
            end = align_up(end, align);
            offsets.push(end);
            end += ty.size_in_bits();
            widest = widest.max(align);
        }
        let row_bits = align_up(end.max(8), widest);

        let mut layout = DataLayout::new(num_tuples);
        let root = layout.add_root(1, row_bits)?;
        for (attribute, (ty, offset)) in types.iter().zip(offsets).enumerate() {
            layout.add_leaf(root, *ty, attribute, offset, ty.size_in_bits())?;
        }

        log_built(self.name(), types, &layout);
        Ok(layout)
    }
}

/// PAX layout: each block holds as many tuples as fit, and every attribute
/// gets one contiguous column inside the block.
///
/// Columns are ordered by decreasing alignment so no padding is needed
/// between them. A tuple wider than the block gets a block of its own size.
#[derive(Debug, Clone, Copy)]
pub struct PaxLayoutFactory {
    pub block_size_bytes: u64,
}

impl Default for PaxLayoutFactory {
    fn default() -> Self {
        Self {
            block_size_bytes: DEFAULT_PAX_BLOCK_SIZE,
        }
    }
}

impl PaxLayoutFactory {
    pub fn new(block_size_bytes: u64) -> Self {
        Self { block_size_bytes }
    }

    /// Column offsets (indexed by attribute) and the end of the last column
    fn columns(types: &[Type], order: &[usize], capacity: u64) -> (Vec<u64>, u64) {
        let mut offsets = vec![0; types.len()];
        let mut end = 0u64;
        for &attribute in order {
            let ty = types[attribute];
            end = align_up(end, ty.alignment_in_bits());
            offsets[attribute] = end;
            end += capacity * ty.size_in_bits();
        }
        (offsets, end)
    }
}

impl DataLayoutFactory for PaxLayoutFactory {
    fn name(&self) -> &'static str {
        "pax"
    }

    fn make(&self, types: &[Type], num_tuples: u64) -> LayoutResult<DataLayout> {
        let widest = types
            .iter()
            .map(Type::alignment_in_bits)
            .max()
            .unwrap_or(8)
            .max(8);
        let block_bits = align_up(self.block_size_bytes.max(1) * 8, widest);

        let mut order: Vec<usize> = (0..types.len()).collect();
        order.sort_by_key(|&attribute| Reverse(types[attribute].alignment_in_bits()));

        let row_bits = types.iter().map(Type::size_in_bits).sum::<u64>().max(1);
        let mut capacity = (block_bits / row_bits).max(1);
        let (capacity, offsets, block_bits) = loop {
            let (offsets, end) = Self::columns(types, &order, capacity);
            if end <= block_bits {
                break (capacity, offsets, block_bits);
            }
            if capacity == 1 {
                break (1, offsets, align_up(end, widest));
            }
            capacity -= 1;
        };

        let mut layout = DataLayout::new(num_tuples);
        let root = layout.add_root(capacity, block_bits)?;
        for (attribute, ty) in types.iter().enumerate() {
            layout.add_leaf(root, *ty, attribute, offsets[attribute], ty.size_in_bits())?;
        }

        log_built(self.name(), types, &layout);
        Ok(layout)
    }
}
