//! Enumeration of every leaf selection over a forest, plus hand-picked literal masks

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::decode::visible_leaf_count;
use crate::device::DeviceForest;
use crate::mask::{encode_forest, expected_count, MaskString, SelectionBitmask};

/// Upper bound imposed by the bitmask width
pub const MAX_ENUMERABLE_LEAVES: usize = 63;

/// Default bound on leaves to enumerate (2^16 scenarios)
pub const DEFAULT_MAX_LEAVES: usize = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnumerateError {
    #[error("Forest has {leaves} leaf devices, enumeration is limited to {limit}")]
    TooManyLeaves { leaves: usize, limit: usize },
    #[error("Forest has no leaf devices")]
    NoDevices,
}

/// One enumerated selection with its encoding and expected device count
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskCase {
    pub mask: SelectionBitmask,
    pub mask_string: MaskString,
    pub expected: usize,
}

/// Lazy iterator over all `2^L` selections of a forest's `L` leaves
///
/// Cloning yields an independent iterator at the same position; call
/// [`MaskEnumerator::new`] again to restart from mask zero.
#[derive(Debug, Clone)]
pub struct MaskEnumerator<'a> {
    forest: &'a DeviceForest,
    leaf_count: usize,
    next: SelectionBitmask,
    end: SelectionBitmask,
}

impl<'a> MaskEnumerator<'a> {
    /// Enumerate `forest`, refusing forests with more than `max_leaves` leaves
    pub fn new(forest: &'a DeviceForest, max_leaves: usize) -> Result<Self, EnumerateError> {
        let leaf_count = forest.leaf_count();
        let limit = max_leaves.min(MAX_ENUMERABLE_LEAVES);
        if leaf_count == 0 {
            return Err(EnumerateError::NoDevices);
        }
        if leaf_count > limit {
            return Err(EnumerateError::TooManyLeaves {
                leaves: leaf_count,
                limit,
            });
        }

        debug!(leaves = leaf_count, masks = 1u64 << leaf_count, "Enumerating masks");
        Ok(Self {
            forest,
            leaf_count,
            next: 0,
            end: 1 << leaf_count,
        })
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Encode a single selection without iterating
    pub fn case(&self, mask: SelectionBitmask) -> MaskCase {
        MaskCase {
            mask,
            mask_string: encode_forest(self.forest, mask),
            expected: expected_count(mask, self.leaf_count),
        }
    }
}

impl Iterator for MaskEnumerator<'_> {
    type Item = MaskCase;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.end {
            return None;
        }
        let case = self.case(self.next);
        self.next += 1;
        Some(case)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.end - self.next) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for MaskEnumerator<'_> {}

/// Topology a literal mask needs in order to be meaningful
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    /// At least this many root devices
    Roots(usize),
    /// Root 0 exposes at least this many sub-devices
    SubDevicesOfRoot0(usize),
}

impl Requirement {
    pub fn satisfied_by(&self, forest: &DeviceForest) -> bool {
        match *self {
            Requirement::Roots(n) => forest.root_count() >= n,
            Requirement::SubDevicesOfRoot0(n) => forest
                .roots
                .first()
                .map(|root| root.children.len() >= n)
                .unwrap_or(false),
        }
    }
}

/// Hand-written mask for targeted scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiteralMask {
    pub name: &'static str,
    pub mask: &'static str,
    pub requires: Requirement,
}

pub const LITERAL_MASKS: &[LiteralMask] = &[
    LiteralMask {
        name: "root-0",
        mask: "0",
        requires: Requirement::Roots(1),
    },
    LiteralMask {
        name: "sub-device-0.1",
        mask: "0.1",
        requires: Requirement::SubDevicesOfRoot0(2),
    },
    LiteralMask {
        name: "sub-devices-0.0-0.1",
        mask: "0.0,0.1",
        requires: Requirement::SubDevicesOfRoot0(2),
    },
];

/// Literal masks applicable to `forest`, with their expected device counts
///
/// Literals whose topology requirement is not met are skipped.
pub fn literal_cases(forest: &DeviceForest) -> Vec<(LiteralMask, usize)> {
    LITERAL_MASKS
        .iter()
        .filter_map(|literal| {
            if !literal.requires.satisfied_by(forest) {
                debug!(name = literal.name, "Skipping literal mask, topology too small");
                return None;
            }
            // Literal masks are well-formed by construction
            let expected = visible_leaf_count(forest, literal.mask).ok()?;
            Some((*literal, expected))
        })
        .collect()
}
