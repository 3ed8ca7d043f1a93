//! Arena syntax tree carrying the node attributes the engine consumes.
//!
//! The engine never parses text. Hosts build a [`SyntaxTree`] mirroring their own parse
//! structure and keep node ranges aligned with the document; the harvester only reads the
//! per-node attributes defined here (whitespace, generated, recorded indentation, and the
//! two reformat marks).

use crate::range::TextRange;

/// Opaque identifier of a node in a [`SyntaxTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// Get the underlying index.
    pub fn get(self) -> u32 {
        self.0
    }
}

/// The kind of tree mutation a host reports to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeChangeKind {
    /// A node was inserted into the tree.
    Added,
    /// A node replaced another node.
    Replaced,
    /// A node's contents changed in place.
    ContentsChanged,
}

#[derive(Debug, Clone)]
struct NodeData {
    range: TextRange,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    whitespace: bool,
    generated: bool,
    old_indentation: Option<u32>,
    reformat: bool,
    reformat_before: bool,
}

impl NodeData {
    fn new(range: TextRange, parent: Option<NodeId>) -> Self {
        Self {
            range,
            parent,
            children: Vec::new(),
            whitespace: false,
            generated: false,
            old_indentation: None,
            reformat: false,
            reformat_before: false,
        }
    }
}

/// An arena-backed syntax tree.
///
/// Nodes are appended and never removed; hosts rebuild trees when their structure changes
/// shape beyond what attribute updates can express. All methods panic when handed a
/// [`NodeId`] that did not come from this tree.
#[derive(Debug, Clone)]
pub struct SyntaxTree {
    nodes: Vec<NodeData>,
}

impl SyntaxTree {
    /// Create a tree whose root covers `range`.
    pub fn new(range: TextRange) -> Self {
        Self {
            nodes: vec![NodeData::new(range, None)],
        }
    }

    /// The root node.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes, root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Append a child of `parent` covering `range`.
    ///
    /// Children stay in insertion order; hosts append them in document order.
    pub fn add_child(&mut self, parent: NodeId, range: TextRange) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData::new(range, Some(parent)));
        self.node_mut(parent).children.push(id);
        id
    }

    /// The range covered by `node`.
    pub fn range(&self, node: NodeId) -> TextRange {
        self.node(node).range
    }

    /// Update the range covered by `node`.
    pub fn set_range(&mut self, node: NodeId, range: TextRange) {
        self.node_mut(node).range = range;
    }

    /// Parent of `node`, `None` for the root.
    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.node(node).parent
    }

    /// Children of `node` in document order.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        &self.node(node).children
    }

    /// Whether `node` is a pure-whitespace token.
    pub fn is_whitespace(&self, node: NodeId) -> bool {
        self.node(node).whitespace
    }

    /// Mark or clear the whitespace-token attribute.
    pub fn set_whitespace(&mut self, node: NodeId, whitespace: bool) {
        self.node_mut(node).whitespace = whitespace;
    }

    /// Whether `node` was produced by an automated edit since the last pass.
    pub fn is_generated(&self, node: NodeId) -> bool {
        self.node(node).generated
    }

    /// Mark or clear the generated attribute of a single node.
    pub fn set_generated(&mut self, node: NodeId, generated: bool) {
        self.node_mut(node).generated = generated;
    }

    /// Mark or clear the generated attribute of `node` and everything below it.
    pub fn set_subtree_generated(&mut self, node: NodeId, generated: bool) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            self.node_mut(current).generated = generated;
            stack.extend_from_slice(&self.node(current).children);
        }
    }

    /// Record the indentation (in columns) `node` had before an automated edit moved it.
    pub fn record_old_indentation(&mut self, node: NodeId, columns: u32) {
        self.node_mut(node).old_indentation = Some(columns);
    }

    /// Consume the recorded pre-edit indentation of `node`.
    pub fn take_old_indentation(&mut self, node: NodeId) -> Option<u32> {
        self.node_mut(node).old_indentation.take()
    }

    /// Flag `node` so its whole range is reformatted at the next pass.
    pub fn mark_reformat(&mut self, node: NodeId) {
        self.node_mut(node).reformat = true;
    }

    /// Whether `node` carries the whole-range reformat mark.
    pub fn is_marked_reformat(&self, node: NodeId) -> bool {
        self.node(node).reformat
    }

    /// Consume the whole-range reformat mark of `node`.
    pub fn take_reformat(&mut self, node: NodeId) -> bool {
        std::mem::take(&mut self.node_mut(node).reformat)
    }

    /// Flag `node` so the whitespace leading into it is reformatted at the next pass.
    pub fn mark_reformat_before(&mut self, node: NodeId) {
        self.node_mut(node).reformat_before = true;
    }

    /// Whether `node` carries the reformat-before mark.
    pub fn is_marked_reformat_before(&self, node: NodeId) -> bool {
        self.node(node).reformat_before
    }

    /// Consume the reformat-before mark of `node`.
    pub fn take_reformat_before(&mut self, node: NodeId) -> bool {
        std::mem::take(&mut self.node_mut(node).reformat_before)
    }

    /// The topmost generated nodes at or below `node`, in document order.
    ///
    /// A generated node is collected without descending into it, so nested generated
    /// subtrees report only their outermost root.
    pub fn topmost_generated_descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            if self.is_generated(current) {
                found.push(current);
                continue;
            }
            for &child in self.node(current).children.iter().rev() {
                stack.push(child);
            }
        }
        found
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0 as usize]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0 as usize]
    }
}
