//! Device hierarchy modes selectable through the driver environment

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;

use crate::device::DeviceForest;

/// Environment variable selecting the hierarchy mode
pub const HIERARCHY_ENV: &str = "ZE_FLAT_DEVICE_HIERARCHY";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown device hierarchy {0:?}, expected FLAT, COMBINED or COMPOSITE")]
pub struct UnknownHierarchy(pub String);

/// How the driver exposes root devices and their sub-devices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceHierarchy {
    /// Sub-devices are exposed as top-level devices
    Flat,
    /// Sub-devices are top-level, roots remain reachable from them
    Combined,
    /// Only root devices are top-level
    Composite,
}

impl DeviceHierarchy {
    pub const ALL: [DeviceHierarchy; 3] = [Self::Flat, Self::Combined, Self::Composite];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flat => "FLAT",
            Self::Combined => "COMBINED",
            Self::Composite => "COMPOSITE",
        }
    }

    /// Number of top-level devices the driver should report with no mask applied
    ///
    /// A root without sub-devices counts as one device in every mode.
    pub fn expected_count(&self, forest: &DeviceForest) -> usize {
        match self {
            Self::Flat | Self::Combined => forest.leaf_count(),
            Self::Composite => forest.root_count(),
        }
    }

    /// Number of top-level devices when only the leaves in `visible` are exposed
    ///
    /// In composite mode a root is reported when any of its leaves is visible.
    pub fn visible_count(&self, forest: &DeviceForest, visible: &BTreeSet<usize>) -> usize {
        match self {
            Self::Flat | Self::Combined => visible.len(),
            Self::Composite => forest
                .leaves()
                .iter()
                .filter(|leaf| visible.contains(&leaf.index))
                .map(|leaf| leaf.path[0])
                .collect::<BTreeSet<_>>()
                .len(),
        }
    }
}

impl std::fmt::Display for DeviceHierarchy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceHierarchy {
    type Err = UnknownHierarchy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "FLAT" => Ok(Self::Flat),
            "COMBINED" => Ok(Self::Combined),
            "COMPOSITE" => Ok(Self::Composite),
            _ => Err(UnknownHierarchy(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::fixtures::*;

    #[test]
    fn test_expected_counts() {
        let forest = mixed();
        assert_eq!(DeviceHierarchy::Flat.expected_count(&forest), 6);
        assert_eq!(DeviceHierarchy::Combined.expected_count(&forest), 6);
        assert_eq!(DeviceHierarchy::Composite.expected_count(&forest), 3);

        let forest = two_flat_roots();
        for mode in DeviceHierarchy::ALL {
            assert_eq!(mode.expected_count(&forest), 2);
        }
    }

    #[test]
    fn test_visible_count() {
        let forest = mixed();
        let all: BTreeSet<usize> = (0..forest.leaf_count()).collect();
        for mode in DeviceHierarchy::ALL {
            assert_eq!(mode.visible_count(&forest, &all), mode.expected_count(&forest));
        }

        // gpu0.t0.s1 and gpu0.t1 share a root, gpu2.t0 is on another
        let some = BTreeSet::from([1, 2, 4]);
        assert_eq!(DeviceHierarchy::Flat.visible_count(&forest, &some), 3);
        assert_eq!(DeviceHierarchy::Composite.visible_count(&forest, &some), 2);
        assert_eq!(DeviceHierarchy::Composite.visible_count(&forest, &BTreeSet::new()), 0);
    }

    #[test]
    fn test_parse() {
        assert_eq!("flat".parse::<DeviceHierarchy>().unwrap(), DeviceHierarchy::Flat);
        assert_eq!(
            "COMPOSITE".parse::<DeviceHierarchy>().unwrap(),
            DeviceHierarchy::Composite
        );
        assert!("TREE".parse::<DeviceHierarchy>().is_err());
        for mode in DeviceHierarchy::ALL {
            assert_eq!(mode.as_str().parse::<DeviceHierarchy>().unwrap(), mode);
        }
    }
}
