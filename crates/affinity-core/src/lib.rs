//! Affinity Core - device forest model and affinity mask codec
//!
//! This crate provides the pure parts of the affinity harness:
//! - Device forest types loaded from a topology description
//! - Subtree counting and canonical leaf ordering
//! - Encoding of leaf selections into hierarchical affinity mask strings
//! - Interpretation of mask strings against a forest
//! - Enumeration of all selections and hand-picked literal masks
//! - Device hierarchy modes and their expected device counts

pub mod decode;
pub mod device;
pub mod enumerate;
pub mod hierarchy;
pub mod mask;
pub mod topology;

pub use decode::{parse_mask, visible_leaf_count, visible_leaves, MaskParseError};
pub use device::{DeviceForest, DeviceId, DeviceNode, TopologyError};
pub use enumerate::{literal_cases, EnumerateError, LiteralMask, MaskCase, MaskEnumerator};
pub use hierarchy::{DeviceHierarchy, UnknownHierarchy, HIERARCHY_ENV};
pub use mask::{encode, encode_forest, expected_count, MaskString, PresentMark, SelectionBitmask};
pub use topology::{leaf_count, total_node_count, LeafRef};

/// Environment variable the driver reads the affinity mask from
pub const AFFINITY_MASK_ENV: &str = "ZE_AFFINITY_MASK";
