//! Device forest types as supplied by the topology source

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Failed to parse topology: {0}")]
    ParseError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Invalid topology structure: {0}")]
    ValidationError(String),
}

/// Opaque identity of a device node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn new(id: &str) -> Self {
        Self(id.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A device, either a leaf or a root/internal node with ordered sub-devices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceNode {
    /// Device identity
    pub id: DeviceId,
    /// Sub-devices in driver order (empty for leaves)
    #[serde(default, rename = "sub_device", skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DeviceNode>,
}

impl DeviceNode {
    /// Create a leaf device
    pub fn leaf(id: &str) -> Self {
        Self {
            id: DeviceId::new(id),
            children: Vec::new(),
        }
    }

    /// Create a device with the given sub-devices
    pub fn with_children(id: &str, children: Vec<DeviceNode>) -> Self {
        Self {
            id: DeviceId::new(id),
            children,
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Follow a path of sibling indices down from this node
    pub fn descend(&self, path: &[usize]) -> Option<&DeviceNode> {
        path.iter()
            .try_fold(self, |node, &idx| node.children.get(idx))
    }
}

/// Ordered list of root devices exposed by one driver
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceForest {
    /// Driver identity this topology belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    /// Root devices in enumeration order
    #[serde(default, rename = "device")]
    pub roots: Vec<DeviceNode>,
}

impl DeviceForest {
    pub fn new(roots: Vec<DeviceNode>) -> Self {
        Self { driver: None, roots }
    }

    /// Parse a topology from TOML text
    pub fn from_toml(content: &str) -> Result<Self, TopologyError> {
        let forest: Self =
            toml::from_str(content).map_err(|e| TopologyError::ParseError(e.to_string()))?;
        forest.validate()?;
        Ok(forest)
    }

    /// Load a topology file from disk
    pub fn from_file(path: &Path) -> Result<Self, TopologyError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Serialize to TOML text
    pub fn to_toml(&self) -> Result<String, TopologyError> {
        toml::to_string_pretty(self).map_err(|e| TopologyError::ParseError(e.to_string()))
    }

    /// Look up a node by its dotted path of sibling indices
    pub fn node_at(&self, path: &[usize]) -> Option<&DeviceNode> {
        let (first, rest) = path.split_first()?;
        self.roots.get(*first)?.descend(rest)
    }

    fn validate(&self) -> Result<(), TopologyError> {
        let mut stack: Vec<&DeviceNode> = self.roots.iter().collect();
        while let Some(node) = stack.pop() {
            if node.id.as_str().is_empty() {
                return Err(TopologyError::ValidationError(
                    "device with empty id".to_string(),
                ));
            }
            stack.extend(node.children.iter());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPOLOGY: &str = r#"
driver = "reference-driver"

[[device]]
id = "gpu0"

  [[device.sub_device]]
  id = "gpu0.tile0"

  [[device.sub_device]]
  id = "gpu0.tile1"

[[device]]
id = "gpu1"
"#;

    #[test]
    fn test_parse_topology() {
        let forest = DeviceForest::from_toml(TOPOLOGY).unwrap();
        assert_eq!(forest.driver.as_deref(), Some("reference-driver"));
        assert_eq!(forest.roots.len(), 2);
        assert_eq!(forest.roots[0].children.len(), 2);
        assert!(forest.roots[1].is_leaf());
    }

    #[test]
    fn test_node_at() {
        let forest = DeviceForest::from_toml(TOPOLOGY).unwrap();
        assert_eq!(forest.node_at(&[0, 1]).unwrap().id.as_str(), "gpu0.tile1");
        assert_eq!(forest.node_at(&[1]).unwrap().id.as_str(), "gpu1");
        assert!(forest.node_at(&[1, 0]).is_none());
        assert!(forest.node_at(&[2]).is_none());
        assert!(forest.node_at(&[]).is_none());
    }

    #[test]
    fn test_empty_id_rejected() {
        let result = DeviceForest::from_toml("[[device]]\nid = \"\"\n");
        assert!(matches!(result, Err(TopologyError::ValidationError(_))));
    }

    #[test]
    fn test_from_file() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("topology.toml");
        std::fs::write(&path, TOPOLOGY).unwrap();

        let forest = DeviceForest::from_file(&path).unwrap();
        assert_eq!(forest.roots[0].id.as_str(), "gpu0");

        let missing = DeviceForest::from_file(&temp_dir.path().join("missing.toml"));
        assert!(matches!(missing, Err(TopologyError::IoError(_))));
    }

    #[test]
    fn test_toml_roundtrip_keeps_structure() {
        let forest = DeviceForest::from_toml(TOPOLOGY).unwrap();
        let text = forest.to_toml().unwrap();
        assert_eq!(DeviceForest::from_toml(&text).unwrap(), forest);
    }
}
