//! Interpretation of affinity mask strings against a device forest
//!
//! Mirrors how a driver applies a mask: every comma-separated piece is a
//! dotted path from a root, naming either a leaf or a whole subtree. Paths
//! that do not name an existing device are ignored. An empty mask leaves
//! every leaf visible.

use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

use crate::device::DeviceForest;
use crate::topology::LeafRef;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaskParseError {
    #[error("Empty selector in mask {0:?}")]
    EmptySelector(String),
    #[error("Invalid index {index:?} in selector {selector:?}")]
    InvalidIndex { selector: String, index: String },
}

/// Dotted selector path, one sibling index per level
pub type SelectorPath = Vec<usize>;

/// Split a mask string into selector paths
pub fn parse_mask(mask: &str) -> Result<Vec<SelectorPath>, MaskParseError> {
    let mask = mask.trim();
    if mask.is_empty() {
        return Ok(Vec::new());
    }

    mask.split(',')
        .map(|selector| {
            let selector = selector.trim();
            if selector.is_empty() {
                return Err(MaskParseError::EmptySelector(mask.to_string()));
            }
            selector
                .split('.')
                .map(|index| {
                    index.parse::<usize>().map_err(|_| MaskParseError::InvalidIndex {
                        selector: selector.to_string(),
                        index: index.to_string(),
                    })
                })
                .collect()
        })
        .collect()
}

/// Canonical indices of the leaves a mask leaves visible
pub fn visible_leaves(forest: &DeviceForest, mask: &str) -> Result<BTreeSet<usize>, MaskParseError> {
    let paths = parse_mask(mask)?;
    let leaves = forest.leaves();

    if paths.is_empty() {
        return Ok(leaves.iter().map(|l| l.index).collect());
    }

    let mut visible = BTreeSet::new();
    for path in &paths {
        if forest.node_at(path).is_none() {
            debug!(selector = ?path, "Selector names no device, ignoring");
            continue;
        }
        visible.extend(
            leaves
                .iter()
                .filter(|leaf| under(leaf, path))
                .map(|leaf| leaf.index),
        );
    }
    Ok(visible)
}

/// Number of leaf devices a mask leaves visible
pub fn visible_leaf_count(forest: &DeviceForest, mask: &str) -> Result<usize, MaskParseError> {
    Ok(visible_leaves(forest, mask)?.len())
}

fn under(leaf: &LeafRef<'_>, path: &[usize]) -> bool {
    leaf.path.starts_with(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::{encode_forest, expected_count};
    use crate::topology::fixtures::*;

    #[test]
    fn test_parse_mask() {
        assert_eq!(parse_mask("").unwrap(), Vec::<SelectorPath>::new());
        assert_eq!(parse_mask("0").unwrap(), vec![vec![0]]);
        assert_eq!(
            parse_mask("0.0.1,0.1, 2").unwrap(),
            vec![vec![0, 0, 1], vec![0, 1], vec![2]]
        );
    }

    #[test]
    fn test_parse_mask_errors() {
        assert!(matches!(
            parse_mask("0,,1"),
            Err(MaskParseError::EmptySelector(_))
        ));
        assert!(matches!(
            parse_mask("0.x"),
            Err(MaskParseError::InvalidIndex { .. })
        ));
        assert!(matches!(
            parse_mask("0..1"),
            Err(MaskParseError::InvalidIndex { .. })
        ));
    }

    #[test]
    fn test_visible_leaves() {
        let forest = mixed();
        assert_eq!(visible_leaf_count(&forest, "").unwrap(), 6);
        assert_eq!(visible_leaf_count(&forest, "0").unwrap(), 3);
        assert_eq!(visible_leaf_count(&forest, "0.0").unwrap(), 2);
        assert_eq!(visible_leaf_count(&forest, "0,0.1").unwrap(), 3);
        assert_eq!(
            visible_leaves(&forest, "0.0.1,2.0").unwrap(),
            BTreeSet::from([1, 4])
        );
    }

    #[test]
    fn test_unknown_selectors_ignored() {
        let forest = one_root_two_tiles();
        assert_eq!(visible_leaf_count(&forest, "0.5").unwrap(), 0);
        assert_eq!(visible_leaf_count(&forest, "3,0.1").unwrap(), 1);
    }

    #[test]
    fn test_decode_matches_encoded_selection() {
        for forest in [two_flat_roots(), one_root_two_tiles(), mixed()] {
            let leaf_count = forest.leaf_count();
            for mask in 0..(1u64 << leaf_count) {
                let encoded = encode_forest(&forest, mask);
                let visible = visible_leaves(&forest, encoded.as_str()).unwrap();

                let expected: BTreeSet<usize> = if mask == 0 {
                    (0..leaf_count).collect()
                } else {
                    (0..leaf_count).filter(|i| mask & (1 << i) != 0).collect()
                };
                assert_eq!(visible, expected, "mask {:#b} encoded as {:?}", mask, encoded);
                assert_eq!(visible.len(), expected_count(mask, leaf_count));
            }
        }
    }
}
