//! Interpolation tree
//!
//! One tree is built per module and frame. Nodes live in an index-based arena laid
//! out level by level: every node of level `k` owns a fixed block of
//! `max_children(k)` slots on level `k + 1`, so a node's position never depends on
//! which siblings the search actually selected.
//!
//! Build runs top-down, calling each level's search function on the nodes of that
//! level. Evaluate runs bottom-up over the interior slots in reverse order and
//! leaves the fully blended block on the root.

use crate::blend::{interpolate, Interpolate};
use crate::region::{RegionPayload, RegionTable};
use crate::search::{OperationTable, MAX_CHILDREN, MAX_RATIOS};
use crate::trigger::TriggerSnapshot;
use crate::{CoreError, Result};
use tracing::{debug, trace};

/// Maximum number of search levels per module
pub const MAX_TREE_LEVELS: usize = 8;

/// Index of a node in the tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Node counts derived from a module's operation table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeLayout {
    /// First slot of each node level, root level first; one extra entry marks the end
    offsets: Vec<usize>,
    /// Fan-out of each search level
    fan_out: Vec<usize>,
}

impl TreeLayout {
    /// Compute slot offsets for `operations`
    pub fn for_operations<P>(operations: &OperationTable<P>) -> Result<Self> {
        if operations.is_empty() {
            return Err(CoreError::MissingSearchTable);
        }
        if operations.len() > MAX_TREE_LEVELS {
            return Err(CoreError::TooManyLevels {
                count: operations.len(),
                max: MAX_TREE_LEVELS,
            });
        }

        let fan_out: Vec<usize> = operations.iter().map(|op| op.max_children).collect();
        let mut offsets = Vec::with_capacity(fan_out.len() + 2);
        let mut offset = 0;
        let mut width = 1;
        offsets.push(offset);
        for &children in &fan_out {
            offset += width;
            offsets.push(offset);
            width *= children;
        }
        offsets.push(offset + width);

        Ok(Self { offsets, fan_out })
    }

    /// Number of search levels
    pub fn levels(&self) -> usize {
        self.fan_out.len()
    }

    /// Total node slots, leaves included
    pub fn node_capacity(&self) -> usize {
        self.offsets[self.offsets.len() - 1]
    }

    /// Slots of nodes that can have children
    pub fn interior_capacity(&self) -> usize {
        self.offsets[self.levels()]
    }

    /// Slot range `(first, count)` of node level `level`
    pub fn level_span(&self, level: usize) -> (usize, usize) {
        let first = self.offsets[level];
        (first, self.offsets[level + 1] - first)
    }

    fn child_slot(&self, level: usize, local: usize, child: usize) -> usize {
        self.offsets[level + 1] + local * self.fan_out[level] + child
    }
}

enum NodeData<'a, P> {
    Table(&'a RegionTable<P>),
    Leaf(&'a P),
}

impl<P> Clone for NodeData<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for NodeData<'_, P> {}

enum Resolved<P> {
    /// Single child: the node's block is the child's block
    Forward(usize),
    /// Blend result owned by this node
    Scratch(P),
}

/// Transient node of an interpolation tree
pub struct TuningNode<'a, P> {
    data: NodeData<'a, P>,
    level: usize,
    children: [usize; MAX_CHILDREN],
    num_children: usize,
    ratios: [f32; MAX_RATIOS],
    resolved: Option<Resolved<P>>,
}

impl<'a, P> TuningNode<'a, P> {
    fn new(data: NodeData<'a, P>, level: usize) -> Self {
        Self {
            data,
            level,
            children: [0; MAX_CHILDREN],
            num_children: 0,
            ratios: [0.0; MAX_RATIOS],
            resolved: None,
        }
    }

    /// Tree level of this node (root is 0)
    pub fn level(&self) -> usize {
        self.level
    }

    /// Arena slots of the selected children
    pub fn children(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.children[..self.num_children].iter().map(|&i| NodeId(i))
    }

    /// Interpolation ratios between consecutive children
    pub fn ratios(&self) -> &[f32] {
        &self.ratios[..self.num_children.saturating_sub(1)]
    }

    /// Whether this node refers to a terminal parameter block
    pub fn is_leaf(&self) -> bool {
        matches!(self.data, NodeData::Leaf(_))
    }
}

/// Per-frame interpolation tree over a borrowed tuning table
pub struct InterpolationTree<'a, P> {
    layout: TreeLayout,
    nodes: Vec<Option<TuningNode<'a, P>>>,
}

impl<'a, P: Interpolate> InterpolationTree<'a, P> {
    /// Build the tree top-down for `trigger`.
    ///
    /// Fails when a searched table is empty or when the table nesting does not match
    /// the operation table.
    pub fn build(
        root: &'a RegionTable<P>,
        operations: &OperationTable<P>,
        trigger: &TriggerSnapshot,
    ) -> Result<Self> {
        let layout = TreeLayout::for_operations(operations)?;
        let mut nodes: Vec<Option<TuningNode<'a, P>>> =
            (0..layout.node_capacity()).map(|_| None).collect();
        nodes[0] = Some(TuningNode::new(NodeData::Table(root), 0));

        let leaf_level = layout.levels();
        for (level, op) in operations.iter().enumerate() {
            let (first, count) = layout.level_span(level);
            for local in 0..count {
                let slot = first + local;
                let table = match nodes[slot].as_ref().map(|n| n.data) {
                    None => continue,
                    Some(NodeData::Table(table)) => table,
                    Some(NodeData::Leaf(_)) => return Err(CoreError::TableDepthMismatch { level }),
                };

                let selection = (op.search)(op.kind, table, trigger)
                    .ok_or(CoreError::EmptyRegionTable { level })?;
                if selection.len() > op.max_children {
                    return Err(CoreError::TreeCapacityExceeded {
                        level,
                        selected: selection.len(),
                        allowed: op.max_children,
                    });
                }

                let mut children = [0; MAX_CHILDREN];
                for (child, &index) in selection.children().iter().enumerate() {
                    let entry = table
                        .get(index)
                        .ok_or(CoreError::RegionIndexOutOfRange { level, index })?;
                    let data = match (&entry.payload, level + 1 == leaf_level) {
                        (RegionPayload::Leaf(block), true) => NodeData::Leaf(block),
                        (RegionPayload::Table(inner), false) => NodeData::Table(inner),
                        _ => return Err(CoreError::TableDepthMismatch { level: level + 1 }),
                    };
                    let child_slot = layout.child_slot(level, local, child);
                    nodes[child_slot] = Some(TuningNode::new(data, level + 1));
                    children[child] = child_slot;
                }

                if let Some(node) = nodes[slot].as_mut() {
                    node.children = children;
                    node.num_children = selection.len();
                    node.ratios[..selection.ratios().len()].copy_from_slice(selection.ratios());
                }
                trace!(
                    level,
                    kind = %op.kind,
                    children = ?selection.children(),
                    ratios = ?selection.ratios(),
                    "Search selected regions"
                );
            }
        }

        debug!(
            levels = leaf_level,
            capacity = layout.node_capacity(),
            "Interpolation tree built"
        );
        Ok(Self { layout, nodes })
    }

    /// Evaluate the tree bottom-up with `blend` and return the root's block.
    ///
    /// One child forwards its block unchanged. Two children blend by the node's ratio.
    /// Three children blend left to right: children 0 and 1 by the first ratio, then
    /// that result with child 2 by the second ratio.
    pub fn evaluate<F>(&mut self, blend: F) -> Result<P>
    where
        F: Fn(&P, &P, f32) -> Result<P>,
    {
        for slot in (0..self.layout.interior_capacity()).rev() {
            let resolved = match self.nodes[slot].as_ref() {
                Some(node) if node.num_children > 0 => self.resolve(node, &blend)?,
                _ => continue,
            };
            if let Some(node) = self.nodes[slot].as_mut() {
                node.resolved = Some(resolved);
            }
        }

        self.block(0).cloned()
    }

    fn resolve<F>(&self, node: &TuningNode<'a, P>, blend: &F) -> Result<Resolved<P>>
    where
        F: Fn(&P, &P, f32) -> Result<P>,
    {
        let children = &node.children[..node.num_children];
        match *children {
            [only] => Ok(Resolved::Forward(only)),
            [a, b] => Ok(Resolved::Scratch(blend(
                self.block(a)?,
                self.block(b)?,
                node.ratios[0],
            )?)),
            [a, b, c] => {
                let first = blend(self.block(a)?, self.block(b)?, node.ratios[0])?;
                Ok(Resolved::Scratch(blend(
                    &first,
                    self.block(c)?,
                    node.ratios[1],
                )?))
            }
            _ => Err(CoreError::MalformedTree(node.level)),
        }
    }

    /// Parameter block currently held by `slot`
    fn block(&self, slot: usize) -> Result<&P> {
        let node = self
            .nodes
            .get(slot)
            .and_then(Option::as_ref)
            .ok_or(CoreError::MalformedTree(slot))?;
        match (&node.data, &node.resolved) {
            (NodeData::Leaf(block), _) => Ok(*block),
            (_, Some(Resolved::Scratch(block))) => Ok(block),
            (_, Some(Resolved::Forward(child))) => self.block(*child),
            (NodeData::Table(_), None) => Err(CoreError::MalformedTree(slot)),
        }
    }

    /// Node at `id`, if the build populated that slot
    pub fn node(&self, id: NodeId) -> Option<&TuningNode<'a, P>> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    /// Root node
    pub fn root(&self) -> Option<&TuningNode<'a, P>> {
        self.node(NodeId(0))
    }

    /// Slot layout of this tree
    pub fn layout(&self) -> &TreeLayout {
        &self.layout
    }

    /// Number of populated nodes
    pub fn populated(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_some()).count()
    }
}

/// Build and evaluate a tree in one call, blending with [`interpolate`]
pub fn run_interpolation<P: Interpolate>(
    trigger: &TriggerSnapshot,
    table: &RegionTable<P>,
    operations: &OperationTable<P>,
) -> Result<P> {
    let mut tree = InterpolationTree::build(table, operations, trigger)?;
    tree.evaluate(interpolate::<P>)
}
