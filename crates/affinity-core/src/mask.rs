//! Hierarchical affinity mask encoding
//!
//! A mask string is a comma-separated list of dotted selector paths such as
//! `0.1,2`. Each path names a device relative to the forest roots. When every
//! leaf beneath a device is selected the device is named by its bare index
//! instead of enumerating its leaves.
//!
//! Encoding walks the forest depth-first while consuming one bit of the
//! selection bitmask per leaf. Each subtree reports a [`PresentMark`]: the
//! number of selected leaves plus one for every internal node. Since
//! [`total_node_count`](crate::topology::total_node_count) counts every internal node once plus every leaf once,
//! the mark equals the subtree's node count exactly when all of its leaves
//! are selected. A mark of one means an internal node with no selected leaf
//! and no internal descendants; deeper unselected subtrees yield no child
//! selectors and encode to nothing as well.

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::device::{DeviceForest, DeviceNode};

/// Selection over leaf devices, bit `i` selects leaf index `i`
pub type SelectionBitmask = u64;

/// Encoded affinity mask as handed to the driver
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaskString(pub String);

impl MaskString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty mask leaves every device visible
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for MaskString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for MaskString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Selected-leaf count plus one per internal node of a subtree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresentMark(pub usize);

impl PresentMark {
    /// Every leaf below the node is selected
    pub fn is_full(self, total_nodes: usize) -> bool {
        self.0 == total_nodes
    }

    /// Only the node's own contribution is present
    pub fn is_empty(self) -> bool {
        self.0 == 1
    }
}

/// Selector path stored leaf-side first, so ancestors append their index
type ReversedPath = Vec<usize>;

/// Internal node on the encoding stack with what its finished children contributed
struct Frame<'a> {
    node: &'a DeviceNode,
    local_index: usize,
    next_child: usize,
    pieces: Vec<ReversedPath>,
    mark: usize,
    total_nodes: usize,
}

impl<'a> Frame<'a> {
    fn new(node: &'a DeviceNode, local_index: usize) -> Self {
        Self {
            node,
            local_index,
            next_child: 0,
            pieces: Vec::new(),
            mark: 0,
            total_nodes: 1,
        }
    }

    fn absorb(&mut self, pieces: Vec<ReversedPath>, mark: PresentMark, total_nodes: usize) {
        self.mark += mark.0;
        self.total_nodes += total_nodes;
        self.pieces.extend(pieces);
    }

    fn finish(self) -> (Vec<ReversedPath>, PresentMark, usize) {
        let mark = PresentMark(self.mark + 1);
        let pieces = if mark.is_full(self.total_nodes) {
            vec![vec![self.local_index]]
        } else if mark.is_empty() {
            Vec::new()
        } else {
            let mut pieces = self.pieces;
            for piece in &mut pieces {
                piece.push(self.local_index);
            }
            pieces
        };

        trace!(
            device = %self.node.id,
            local_index = self.local_index,
            mark = mark.0,
            pieces = pieces.len(),
            "Encoded subtree"
        );
        (pieces, mark, self.total_nodes)
    }
}

fn encode_leaf(cursor: &mut SelectionBitmask, local_index: usize) -> (Vec<ReversedPath>, PresentMark) {
    let selected = *cursor & 1 == 1;
    *cursor >>= 1;
    if selected {
        (vec![vec![local_index]], PresentMark(1))
    } else {
        (Vec::new(), PresentMark(0))
    }
}

fn render(pieces: &[ReversedPath]) -> String {
    pieces
        .iter()
        .map(|piece| {
            piece
                .iter()
                .rev()
                .map(|i| i.to_string())
                .collect::<Vec<_>>()
                .join(".")
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Encode the subtree rooted at `node`, which sits at `local_index` among its siblings
///
/// Consumes one low bit of `cursor` per leaf visited. Returns the selector
/// for this subtree (empty when nothing is selected) and its present mark.
/// The walk keeps its own stack, so nesting depth is not limited by the
/// thread's stack size.
pub fn encode(
    node: &DeviceNode,
    cursor: &mut SelectionBitmask,
    local_index: usize,
) -> (String, PresentMark) {
    if node.is_leaf() {
        let (pieces, mark) = encode_leaf(cursor, local_index);
        return (render(&pieces), mark);
    }

    let mut encoded = (Vec::new(), PresentMark(0));
    let mut stack = vec![Frame::new(node, local_index)];
    while let Some(frame) = stack.last_mut() {
        let current = frame.node;
        if let Some(child) = current.children.get(frame.next_child) {
            let child_index = frame.next_child;
            frame.next_child += 1;
            if child.is_leaf() {
                let (pieces, mark) = encode_leaf(cursor, child_index);
                frame.absorb(pieces, mark, 1);
            } else {
                stack.push(Frame::new(child, child_index));
            }
            continue;
        }

        let Some(done) = stack.pop() else { break };
        let (pieces, mark, total_nodes) = done.finish();
        match stack.last_mut() {
            Some(parent) => parent.absorb(pieces, mark, total_nodes),
            None => encoded = (pieces, mark),
        }
    }

    (render(&encoded.0), encoded.1)
}

/// Encode a selection over the whole forest
///
/// The bitmask is consumed across root boundaries in canonical leaf order.
/// A zero mask selects nothing and encodes to the empty string, which the
/// driver reads as "all devices".
pub fn encode_forest(forest: &DeviceForest, mask: SelectionBitmask) -> MaskString {
    let mut cursor = mask;
    let selectors: Vec<String> = forest
        .roots
        .iter()
        .enumerate()
        .map(|(root_index, root)| encode(root, &mut cursor, root_index).0)
        .filter(|s| !s.is_empty())
        .collect();
    MaskString(selectors.join(","))
}

/// Number of devices the driver should expose for `mask` over `leaf_count` leaves
pub fn expected_count(mask: SelectionBitmask, leaf_count: usize) -> usize {
    match mask.count_ones() as usize {
        0 => leaf_count,
        n => n,
    }
}
