//! Layout tree nodes
//!
//! Nodes live in one arena owned by the [`DataLayout`](super::DataLayout) and
//! refer to each other by [`NodeId`]. Parents are always created before their
//! children, so a parent's id is smaller than any of its children's ids.

use serde::{Deserialize, Serialize};

use crate::catalog::Type;

/// Index of a node in its layout's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Position in the arena
    pub fn index(&self) -> usize {
        self.0
    }
}

/// A structural grouping: `capacity` tuples share one instance of this block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InnerNode {
    /// Tuples per instance of this block
    pub capacity: u64,
    /// Offset of the first instance within the parent's instance
    pub offset_in_bits: u64,
    /// Size of one instance; consecutive instances are this far apart
    pub size_in_bits: u64,
    pub children: Vec<NodeId>,
    /// `None` only for the root
    pub parent: Option<NodeId>,
}

/// Binds one attribute to a physical location inside its parent block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafNode {
    pub ty: Type,
    pub attribute: usize,
    pub offset_in_bits: u64,
    /// Distance between the values of consecutive tuples
    pub stride_in_bits: u64,
    pub parent: NodeId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Node {
    Inner(InnerNode),
    Leaf(LeafNode),
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Inner(inner) => inner.parent,
            Node::Leaf(leaf) => Some(leaf.parent),
        }
    }

    pub fn offset_in_bits(&self) -> u64 {
        match self {
            Node::Inner(inner) => inner.offset_in_bits,
            Node::Leaf(leaf) => leaf.offset_in_bits,
        }
    }

    pub fn as_inner(&self) -> Option<&InnerNode> {
        match self {
            Node::Inner(inner) => Some(inner),
            Node::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            Node::Inner(_) => None,
        }
    }
}
