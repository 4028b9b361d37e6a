//! The layout tree
//!
//! A [`DataLayout`] describes where every attribute of a table lives inside a
//! repeating storage block. The root block holds `capacity` tuples and repeats
//! every `size_in_bits`. Inside it, nested blocks group attributes that are
//! accessed together (PAX-in-PAX) and leaves bind single attributes.
//!
//! # Construction invariants
//!
//! - A child's region lies inside its parent's region
//! - Sibling regions never overlap
//! - Each attribute is bound to exactly one leaf
//! - A leaf's stride covers its type, and the leaf is aligned to its type's
//!   alignment through every ancestor
//!
//! Violations are rejected with fatal [`LayoutError`]s; a tree that exists is
//! always well formed.

use serde::{Deserialize, Serialize};

use super::errors::{LayoutError, LayoutResult};
use super::node::{InnerNode, LeafNode, Node, NodeId};
use super::path::{AccessPath, Step};
use crate::catalog::Type;

/// Recursive description of a table's physical format
///
/// Deserializing replays the nodes through the checked builder, so a
/// malformed tree is rejected rather than loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDataLayout")]
pub struct DataLayout {
    /// Capacity hint: the number of tuples the layout is designed for
    num_tuples: u64,
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

/// Unchecked wire form of a [`DataLayout`]; serializes identically
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RawDataLayout {
    num_tuples: u64,
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl TryFrom<RawDataLayout> for DataLayout {
    type Error = LayoutError;

    fn try_from(raw: RawDataLayout) -> LayoutResult<Self> {
        DataLayout {
            num_tuples: raw.num_tuples,
            nodes: raw.nodes,
            root: raw.root,
        }
        .rebuild()
    }
}

impl DataLayout {
    /// Create an empty layout designed to hold `num_tuples` tuples
    pub fn new(num_tuples: u64) -> Self {
        Self {
            num_tuples,
            nodes: Vec::new(),
            root: None,
        }
    }

    pub fn num_tuples(&self) -> u64 {
        self.num_tuples
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// All nodes in creation order
    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    /// Children of an inner node; empty for leaves and unknown ids
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match self.node(id) {
            Some(Node::Inner(inner)) => &inner.children,
            _ => &[],
        }
    }

    pub fn leaves(&self) -> impl Iterator<Item = &LeafNode> {
        self.nodes.iter().filter_map(Node::as_leaf)
    }

    /// Number of attributes bound by this layout
    pub fn num_attributes(&self) -> usize {
        self.leaves().count()
    }

    /// The leaf binding `attribute`, if any
    pub fn leaf_of(&self, attribute: usize) -> Option<&LeafNode> {
        self.leaves().find(|leaf| leaf.attribute == attribute)
    }

    // =========================================================================
    // Construction
    // =========================================================================

    /// Create the root block: `capacity` tuples per `size_in_bits` block.
    pub fn add_root(&mut self, capacity: u64, size_in_bits: u64) -> LayoutResult<NodeId> {
        if self.root.is_some() {
            return Err(LayoutError::invalid_node("layout already has a root block"));
        }
        if capacity == 0 || size_in_bits == 0 {
            return Err(LayoutError::invalid_node(
                "root block needs a non-zero capacity and size",
            ));
        }

        let id = self.push(Node::Inner(InnerNode {
            capacity,
            offset_in_bits: 0,
            size_in_bits,
            children: Vec::new(),
            parent: None,
        }));
        self.root = Some(id);
        Ok(id)
    }

    /// Nest a block of `capacity` tuples inside `parent`.
    ///
    /// The block repeats `ceil(parent.capacity / capacity)` times, each
    /// instance `size_in_bits` long, starting at `offset_in_bits`.
    pub fn add_inner(
        &mut self,
        parent: NodeId,
        capacity: u64,
        offset_in_bits: u64,
        size_in_bits: u64,
    ) -> LayoutResult<NodeId> {
        let parent_capacity = self.inner(parent)?.capacity;
        if capacity == 0 || capacity > parent_capacity {
            return Err(LayoutError::invalid_node(format!(
                "block capacity {} must be in 1..={}",
                capacity, parent_capacity
            )));
        }
        if size_in_bits == 0 {
            return Err(LayoutError::invalid_node("block size must be non-zero"));
        }

        let footprint = parent_capacity
            .div_ceil(capacity)
            .checked_mul(size_in_bits)
            .ok_or_else(|| LayoutError::out_of_bounds("block footprint overflows"))?;
        self.check_placement(parent, offset_in_bits, footprint)?;

        let id = self.push(Node::Inner(InnerNode {
            capacity,
            offset_in_bits,
            size_in_bits,
            children: Vec::new(),
            parent: Some(parent),
        }));
        self.inner_mut(parent)?.children.push(id);
        Ok(id)
    }

    /// Bind `attribute` of type `ty` inside `parent`, one value every
    /// `stride_in_bits` starting at `offset_in_bits`.
    pub fn add_leaf(
        &mut self,
        parent: NodeId,
        ty: Type,
        attribute: usize,
        offset_in_bits: u64,
        stride_in_bits: u64,
    ) -> LayoutResult<NodeId> {
        let parent_capacity = self.inner(parent)?.capacity;
        if !ty.is_valid() {
            return Err(LayoutError::invalid_node(format!("invalid type {}", ty)));
        }
        if self.leaf_of(attribute).is_some() {
            return Err(LayoutError::duplicate_attribute(attribute));
        }
        if stride_in_bits < ty.size_in_bits() {
            return Err(LayoutError::out_of_bounds(format!(
                "stride {} is narrower than {} ({} bits)",
                stride_in_bits,
                ty,
                ty.size_in_bits()
            )));
        }
        self.check_alignment(parent, ty, offset_in_bits, stride_in_bits)?;

        let footprint = parent_capacity
            .checked_mul(stride_in_bits)
            .ok_or_else(|| LayoutError::out_of_bounds("leaf footprint overflows"))?;
        self.check_placement(parent, offset_in_bits, footprint)?;

        let id = self.push(Node::Leaf(LeafNode {
            ty,
            attribute,
            offset_in_bits,
            stride_in_bits,
            parent,
        }));
        self.inner_mut(parent)?.children.push(id);
        Ok(id)
    }

    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn inner(&self, id: NodeId) -> LayoutResult<&InnerNode> {
        match self.node(id) {
            Some(Node::Inner(inner)) => Ok(inner),
            Some(Node::Leaf(_)) => Err(LayoutError::invalid_node(format!(
                "node {} is a leaf and cannot hold children",
                id.0
            ))),
            None => Err(LayoutError::invalid_node(format!("no node with id {}", id.0))),
        }
    }

    fn inner_mut(&mut self, id: NodeId) -> LayoutResult<&mut InnerNode> {
        match self.nodes.get_mut(id.0) {
            Some(Node::Inner(inner)) => Ok(inner),
            _ => Err(LayoutError::invalid_node(format!("node {} is not a block", id.0))),
        }
    }

    /// Reserved region `(offset, length)` of a node within one instance of its
    /// parent, in bits. The root reports one instance of itself.
    pub fn region(&self, id: NodeId) -> Option<(u64, u64)> {
        let node = self.node(id)?;
        let Some(parent) = node.parent() else {
            let root = node.as_inner()?;
            return Some((0, root.size_in_bits));
        };
        let parent_capacity = self.node(parent)?.as_inner()?.capacity;
        let footprint = match node {
            Node::Inner(inner) => parent_capacity.div_ceil(inner.capacity) * inner.size_in_bits,
            Node::Leaf(leaf) => parent_capacity * leaf.stride_in_bits,
        };
        Some((node.offset_in_bits(), footprint))
    }

    fn check_placement(&self, parent: NodeId, offset: u64, footprint: u64) -> LayoutResult<()> {
        let block = self.inner(parent)?;
        let end = offset
            .checked_add(footprint)
            .ok_or_else(|| LayoutError::out_of_bounds("region end overflows"))?;
        if end > block.size_in_bits {
            return Err(LayoutError::out_of_bounds(format!(
                "region [{}, {}) exceeds parent block of {} bits",
                offset, end, block.size_in_bits
            )));
        }

        for &sibling in &block.children {
            if let Some((s_offset, s_len)) = self.region(sibling) {
                if offset < s_offset + s_len && s_offset < end {
                    return Err(LayoutError::overlap(format!(
                        "region [{}, {}) overlaps sibling {} at [{}, {})",
                        offset,
                        end,
                        sibling.0,
                        s_offset,
                        s_offset + s_len
                    )));
                }
            }
        }
        Ok(())
    }

    // Tables are mapped at addresses aligned to the widest type, so a leaf is
    // aligned iff every offset and instance size on its path is.
    fn check_alignment(
        &self,
        parent: NodeId,
        ty: Type,
        offset_in_bits: u64,
        stride_in_bits: u64,
    ) -> LayoutResult<()> {
        let align = ty.alignment_in_bits();
        if offset_in_bits % align != 0 || stride_in_bits % align != 0 {
            return Err(LayoutError::misaligned(format!(
                "{} needs {}-bit alignment, got offset {} stride {}",
                ty, align, offset_in_bits, stride_in_bits
            )));
        }

        let mut current = Some(parent);
        while let Some(id) = current {
            let block = self.inner(id)?;
            if block.offset_in_bits % align != 0 || block.size_in_bits % align != 0 {
                return Err(LayoutError::misaligned(format!(
                    "{} needs {}-bit alignment but enclosing block {} sits at {} with size {}",
                    ty, align, id.0, block.offset_in_bits, block.size_in_bits
                )));
            }
            current = block.parent;
        }
        Ok(())
    }

    // =========================================================================
    // Traversal
    // =========================================================================

    /// Resolve the offset computation for `attribute`
    pub fn access_path(&self, attribute: usize) -> LayoutResult<AccessPath> {
        let leaf = self
            .leaf_of(attribute)
            .ok_or_else(|| LayoutError::unknown_attribute(attribute))?;

        let mut levels = Vec::new();
        let mut current = Some(leaf.parent);
        while let Some(id) = current {
            let block = self.inner(id)?;
            levels.push(Step {
                capacity: block.capacity,
                offset_in_bits: block.offset_in_bits,
                stride_in_bits: block.size_in_bits,
            });
            current = block.parent;
        }
        levels.reverse();

        Ok(AccessPath::new(
            attribute,
            leaf.ty,
            levels,
            leaf.offset_in_bits,
            leaf.stride_in_bits,
        ))
    }

    /// Bit address of `attribute` for `tuple`
    pub fn bit_offset(&self, attribute: usize, tuple: u64) -> LayoutResult<u64> {
        self.access_path(attribute)?.bit_offset(tuple).ok_or_else(|| {
            LayoutError::out_of_bounds(format!(
                "attribute {} of tuple {} is not addressable",
                attribute, tuple
            ))
        })
    }

    /// Byte address of `attribute` for `tuple`
    pub fn byte_offset(&self, attribute: usize, tuple: u64) -> LayoutResult<u64> {
        Ok(self.bit_offset(attribute, tuple)? / 8)
    }

    /// Bits needed to hold `num_tuples` tuples: whole root blocks only.
    /// Saturates at `u64::MAX`.
    pub fn footprint_bits(&self, num_tuples: u64) -> u64 {
        match self.root.and_then(|id| self.node(id)).and_then(Node::as_inner) {
            Some(root) => num_tuples
                .div_ceil(root.capacity)
                .saturating_mul(root.size_in_bits),
            None => 0,
        }
    }

    pub fn footprint_bytes(&self, num_tuples: u64) -> u64 {
        self.footprint_bits(num_tuples).div_ceil(8)
    }

    /// Widest alignment (bytes) of any type in the tree, at least 1
    pub fn alignment(&self) -> u64 {
        self.root.map_or(1, |root| self.region_alignment(root))
    }

    /// Widest alignment (bytes) of any type below `id`, at least 1
    pub fn region_alignment(&self, id: NodeId) -> u64 {
        match self.node(id) {
            Some(Node::Leaf(leaf)) => leaf.ty.alignment(),
            Some(Node::Inner(inner)) => inner
                .children
                .iter()
                .map(|&child| self.region_alignment(child))
                .max()
                .unwrap_or(1),
            None => 1,
        }
    }

    /// Check that the layout binds attributes `0..types.len()` exactly once
    /// each, with matching types.
    pub fn validate_covers(&self, types: &[Type]) -> LayoutResult<()> {
        if self.root.is_none() {
            return Err(LayoutError::coverage("layout has no root block"));
        }
        let bound = self.num_attributes();
        if bound != types.len() {
            return Err(LayoutError::coverage(format!(
                "layout binds {} attributes, schema has {}",
                bound,
                types.len()
            )));
        }
        for (attribute, ty) in types.iter().enumerate() {
            match self.leaf_of(attribute) {
                Some(leaf) if leaf.ty == *ty => {}
                Some(leaf) => {
                    return Err(LayoutError::coverage(format!(
                        "attribute {} is laid out as {} but declared {}",
                        attribute, leaf.ty, ty
                    )))
                }
                None => {
                    return Err(LayoutError::coverage(format!(
                        "attribute {} is not bound",
                        attribute
                    )))
                }
            }
        }
        Ok(())
    }

    /// Replay this layout through the checked construction operations.
    ///
    /// The result is guaranteed well formed or an error is returned.
    pub fn rebuild(&self) -> LayoutResult<DataLayout> {
        let mut rebuilt = DataLayout::new(self.num_tuples);
        for (index, node) in self.nodes.iter().enumerate() {
            if let Some(parent) = node.parent() {
                if parent.0 >= index {
                    return Err(LayoutError::invalid_node(format!(
                        "node {} refers to parent {} created after it",
                        index, parent.0
                    )));
                }
            }
            match node {
                Node::Inner(inner) => match inner.parent {
                    None => rebuilt.add_root(inner.capacity, inner.size_in_bits)?,
                    Some(parent) => rebuilt.add_inner(
                        parent,
                        inner.capacity,
                        inner.offset_in_bits,
                        inner.size_in_bits,
                    )?,
                },
                Node::Leaf(leaf) => rebuilt.add_leaf(
                    leaf.parent,
                    leaf.ty,
                    leaf.attribute,
                    leaf.offset_in_bits,
                    leaf.stride_in_bits,
                )?,
            };
        }

        if rebuilt != *self {
            return Err(LayoutError::invalid_node(
                "child lists or root disagree with parent links",
            ));
        }
        Ok(rebuilt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutErrorCode;

    const BLOCK: u64 = 64 * 1024 * 8;

    /// [ids] | [name, is_manager] | [age, salary], 256 tuples per 64 KiB block
    fn employees_layout() -> DataLayout {
        let mut layout = DataLayout::new(1000);
        let outer = layout.add_root(256, BLOCK).unwrap();

        let ids = layout.add_inner(outer, 256, 0, 256 * 32).unwrap();
        layout.add_leaf(ids, Type::Integer(4), 0, 0, 32).unwrap();

        let name_mgr = layout.add_inner(outer, 256, 256 * 32, 256 * 51 * 8).unwrap();
        layout.add_leaf(name_mgr, Type::Char(50), 1, 0, 400).unwrap();
        layout.add_leaf(name_mgr, Type::Boolean, 4, 256 * 400, 8).unwrap();

        let nums = layout.add_inner(outer, 256, 256 * 55 * 8, 256 * 12 * 8).unwrap();
        layout.add_leaf(nums, Type::Integer(4), 2, 0, 32).unwrap();
        layout.add_leaf(nums, Type::Double, 3, 256 * 32, 64).unwrap();

        layout
    }

    #[test]
    fn test_salary_offset_for_tuple_10() {
        let layout = employees_layout();
        // group offset 256*55*8 + column offset 256*32 + 10 * 64
        assert_eq!(layout.bit_offset(3, 10).unwrap(), 112_640 + 8_192 + 640);
        assert_eq!(layout.byte_offset(3, 10).unwrap(), 15_184);
    }

    #[test]
    fn test_second_block_offsets() {
        let layout = employees_layout();
        assert_eq!(layout.bit_offset(0, 256).unwrap(), BLOCK);
        assert_eq!(layout.bit_offset(0, 257).unwrap(), BLOCK + 32);
    }

    #[test]
    fn test_second_root_rejected() {
        let mut layout = employees_layout();
        let err = layout.add_root(1, 8).unwrap_err();
        assert_eq!(err.code(), LayoutErrorCode::StrataLayoutInvalidNode);
    }

    #[test]
    fn test_overlapping_sibling_rejected() {
        let mut layout = DataLayout::new(16);
        let root = layout.add_root(16, 1024).unwrap();
        layout.add_inner(root, 16, 0, 512).unwrap();
        let err = layout.add_inner(root, 16, 256, 512).unwrap_err();
        assert_eq!(err.code(), LayoutErrorCode::StrataLayoutOverlap);
        assert!(err.is_fatal());
    }

    #[test]
    fn test_region_beyond_parent_rejected() {
        let mut layout = DataLayout::new(16);
        let root = layout.add_root(16, 1024).unwrap();
        let err = layout.add_leaf(root, Type::Double, 0, 0, 128).unwrap_err();
        assert_eq!(err.code(), LayoutErrorCode::StrataLayoutOutOfBounds);
    }

    #[test]
    fn test_repeated_inner_footprint() {
        let mut layout = DataLayout::new(16);
        let root = layout.add_root(16, 1024).unwrap();
        // 4 instances of 4 tuples, 128 bits each
        let inner = layout.add_inner(root, 4, 0, 128).unwrap();
        assert_eq!(layout.region(inner), Some((0, 512)));
        assert!(layout.add_inner(root, 4, 511, 8).is_err());
        assert!(layout.add_inner(root, 4, 512, 128).is_ok());
    }

    #[test]
    fn test_inner_capacity_must_not_exceed_parent() {
        let mut layout = DataLayout::new(16);
        let root = layout.add_root(16, 1024).unwrap();
        assert!(layout.add_inner(root, 17, 0, 8).is_err());
        assert!(layout.add_inner(root, 0, 0, 8).is_err());
    }

    #[test]
    fn test_duplicate_attribute_rejected() {
        let mut layout = DataLayout::new(8);
        let root = layout.add_root(8, 1024).unwrap();
        let a = layout.add_inner(root, 8, 0, 256).unwrap();
        let b = layout.add_inner(root, 8, 256, 256).unwrap();
        layout.add_leaf(a, Type::Integer(4), 7, 0, 32).unwrap();
        let err = layout.add_leaf(b, Type::Integer(4), 7, 0, 32).unwrap_err();
        assert_eq!(err.code(), LayoutErrorCode::StrataLayoutDuplicateAttribute);
    }

    #[test]
    fn test_stride_narrower_than_type_rejected() {
        let mut layout = DataLayout::new(8);
        let root = layout.add_root(8, 1024).unwrap();
        assert!(layout.add_leaf(root, Type::Integer(8), 0, 0, 32).is_err());
    }

    #[test]
    fn test_leaf_under_leaf_rejected() {
        let mut layout = DataLayout::new(8);
        let root = layout.add_root(8, 1024).unwrap();
        let leaf = layout.add_leaf(root, Type::Boolean, 0, 0, 1).unwrap();
        let err = layout.add_leaf(leaf, Type::Boolean, 1, 0, 1).unwrap_err();
        assert_eq!(err.code(), LayoutErrorCode::StrataLayoutInvalidNode);
    }

    #[test]
    fn test_misaligned_leaf_rejected() {
        let mut layout = DataLayout::new(8);
        let root = layout.add_root(8, 4096).unwrap();
        // block sits at bit 32: fine for i32, not for f64
        let group = layout.add_inner(root, 8, 32, 1024).unwrap();
        layout.add_leaf(group, Type::Integer(4), 0, 0, 32).unwrap();
        let err = layout.add_leaf(group, Type::Double, 1, 512, 64).unwrap_err();
        assert_eq!(err.code(), LayoutErrorCode::StrataLayoutMisaligned);
    }

    #[test]
    fn test_alignment_is_widest_type() {
        let layout = employees_layout();
        assert_eq!(layout.alignment(), 8);
        let name_mgr = layout.children(layout.root().unwrap())[1];
        assert_eq!(layout.region_alignment(name_mgr), 1);
    }

    #[test]
    fn test_footprint_rounds_to_whole_blocks() {
        let layout = employees_layout();
        assert_eq!(layout.footprint_bytes(0), 0);
        assert_eq!(layout.footprint_bytes(1), 64 * 1024);
        assert_eq!(layout.footprint_bytes(256), 64 * 1024);
        assert_eq!(layout.footprint_bytes(257), 128 * 1024);
    }

    #[test]
    fn test_validate_covers() {
        let layout = employees_layout();
        let types = [
            Type::Integer(4),
            Type::Char(50),
            Type::Integer(4),
            Type::Double,
            Type::Boolean,
        ];
        layout.validate_covers(&types).unwrap();

        let mut wrong = types;
        wrong[3] = Type::Float;
        let err = layout.validate_covers(&wrong).unwrap_err();
        assert_eq!(err.code(), LayoutErrorCode::StrataLayoutCoverage);
        assert!(layout.validate_covers(&types[..4]).is_err());
    }

    #[test]
    fn test_unknown_attribute_is_not_fatal() {
        let layout = employees_layout();
        let err = layout.access_path(42).unwrap_err();
        assert_eq!(err.code(), LayoutErrorCode::StrataLayoutUnknownAttribute);
        assert!(!err.is_fatal());
    }

    #[test]
    fn test_rebuild_is_identity_for_valid_layout() {
        let layout = employees_layout();
        assert_eq!(layout.rebuild().unwrap(), layout);
    }

    #[test]
    fn test_rebuild_rejects_tampered_children() {
        let mut layout = employees_layout();
        if let Some(Node::Inner(root)) = layout.nodes.get_mut(0) {
            root.children.pop();
        }
        assert!(layout.rebuild().is_err());
    }

    #[test]
    fn test_deserialize_valid_layout() {
        let layout = employees_layout();
        let json = serde_json::to_string(&layout).unwrap();
        assert_eq!(serde_json::from_str::<DataLayout>(&json).unwrap(), layout);
    }

    #[test]
    fn test_deserialize_rejects_zero_capacity_root() {
        let mut layout = DataLayout::new(4);
        let root = layout.add_root(4, 256).unwrap();
        layout.add_leaf(root, Type::Integer(4), 0, 0, 32).unwrap();
        let json = serde_json::to_string(&layout).unwrap();
        let broken = json.replacen("\"capacity\":4", "\"capacity\":0", 1);
        assert_ne!(json, broken);

        let err = serde_json::from_str::<DataLayout>(&broken).unwrap_err();
        assert!(err.to_string().contains("STRATA_LAYOUT_INVALID_NODE"));
    }
}
