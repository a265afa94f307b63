//! Subtree counting and canonical leaf ordering over a device forest
//!
//! Leaves are numbered by visiting the roots in order and walking each
//! subtree depth-first, left to right. Bit `i` of a selection bitmask
//! refers to the leaf with index `i` in this order.

use crate::device::{DeviceForest, DeviceNode};

/// Number of nodes in the subtree rooted at `node`, internal nodes and leaves alike
pub fn total_node_count(node: &DeviceNode) -> usize {
    let mut count = 0;
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        count += 1;
        stack.extend(current.children.iter());
    }
    count
}

/// Number of leaves in the subtree rooted at `node`
pub fn leaf_count(node: &DeviceNode) -> usize {
    let mut count = 0;
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if current.is_leaf() {
            count += 1;
        } else {
            stack.extend(current.children.iter());
        }
    }
    count
}

/// A leaf together with its position in the forest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafRef<'a> {
    /// Canonical leaf index (bit position in a selection bitmask)
    pub index: usize,
    /// Sibling indices from the root down to this leaf
    pub path: Vec<usize>,
    pub node: &'a DeviceNode,
}

impl LeafRef<'_> {
    /// Dotted selector naming exactly this leaf, e.g. `0.1`
    pub fn selector(&self) -> String {
        self.path
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl DeviceForest {
    /// Total leaf count across all roots
    pub fn leaf_count(&self) -> usize {
        self.roots.iter().map(leaf_count).sum()
    }

    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Total node count across all roots
    pub fn total_node_count(&self) -> usize {
        self.roots.iter().map(total_node_count).sum()
    }

    /// All leaves in canonical order
    pub fn leaves(&self) -> Vec<LeafRef<'_>> {
        let mut leaves = Vec::new();
        // Children are pushed in reverse so they pop left to right
        let mut stack: Vec<(Vec<usize>, &DeviceNode)> = self
            .roots
            .iter()
            .enumerate()
            .rev()
            .map(|(i, root)| (vec![i], root))
            .collect();

        while let Some((path, node)) = stack.pop() {
            if node.is_leaf() {
                leaves.push(LeafRef {
                    index: leaves.len(),
                    path,
                    node,
                });
                continue;
            }
            for (i, child) in node.children.iter().enumerate().rev() {
                let mut child_path = path.clone();
                child_path.push(i);
                stack.push((child_path, child));
            }
        }
        leaves
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::device::{DeviceForest, DeviceNode};

    /// Two root devices without sub-devices
    pub fn two_flat_roots() -> DeviceForest {
        DeviceForest::new(vec![DeviceNode::leaf("gpu0"), DeviceNode::leaf("gpu1")])
    }

    /// One root device with two tiles
    pub fn one_root_two_tiles() -> DeviceForest {
        DeviceForest::new(vec![DeviceNode::with_children(
            "gpu0",
            vec![DeviceNode::leaf("gpu0.t0"), DeviceNode::leaf("gpu0.t1")],
        )])
    }

    /// Mixed forest: a root with three nesting levels, a flat root and a two-tile root
    ///
    /// ```text
    /// gpu0 ─┬─ t0 ─┬─ s0
    ///       │      └─ s1
    ///       └─ t1
    /// gpu1
    /// gpu2 ─┬─ t0
    ///       └─ t1
    /// ```
    pub fn mixed() -> DeviceForest {
        DeviceForest::new(vec![
            DeviceNode::with_children(
                "gpu0",
                vec![
                    DeviceNode::with_children(
                        "gpu0.t0",
                        vec![DeviceNode::leaf("gpu0.t0.s0"), DeviceNode::leaf("gpu0.t0.s1")],
                    ),
                    DeviceNode::leaf("gpu0.t1"),
                ],
            ),
            DeviceNode::leaf("gpu1"),
            DeviceNode::with_children(
                "gpu2",
                vec![DeviceNode::leaf("gpu2.t0"), DeviceNode::leaf("gpu2.t1")],
            ),
        ])
    }
}
