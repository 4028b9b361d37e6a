//! Physical data layouts
//!
//! A layout tree describes how the attributes of a table are packed into
//! repeating storage blocks. Inner nodes are blocks holding a number of tuples;
//! leaves bind one attribute to an offset and a per-tuple stride. Blocks nest
//! to any depth, so attributes that are accessed together can share a tight
//! sub-block while the table keeps one outer iteration order.
//!
//! # Design Principles
//!
//! - Arena ownership: the tree owns every node, children are referenced by id
//! - Checked construction: a tree that exists is well formed
//! - Exact arithmetic: all offsets and strides are in bits
//!
//! # Invariants
//!
//! - Child regions lie within their parent; siblings never overlap
//! - Each attribute maps to exactly one leaf
//! - Offsets are reproducible from the recorded (offset, stride, size) triples

mod errors;
mod factory;
mod node;
mod path;
pub mod persist;
mod tree;

pub use errors::{LayoutError, LayoutErrorCode, LayoutResult, Severity};
pub use factory::{DataLayoutFactory, PaxLayoutFactory, RowLayoutFactory, DEFAULT_PAX_BLOCK_SIZE};
pub use node::{InnerNode, LeafNode, Node, NodeId};
pub use path::{AccessPath, Step};
pub use tree::DataLayout;

/// Round `value` up to a multiple of `align` (`align >= 1`)
pub(crate) fn align_up(value: u64, align: u64) -> u64 {
    value.div_ceil(align) * align
}
