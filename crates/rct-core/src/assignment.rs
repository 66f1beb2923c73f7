//! Assignment representations and the arm membership resolver.

use serde::{Deserialize, Serialize};

use crate::errors::{ErrorInfo, RctError};

/// Members of one declared arm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArmMembers {
    /// Unit indices belonging to the arm.
    Indices(Vec<usize>),
    /// Boolean mask over all units.
    Mask(Vec<bool>),
}

/// Assignment of units to arms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Assignment {
    /// One arm label per unit, aligned to dataset order.
    Labels(Vec<usize>),
    /// One membership entry per declared arm. Units outside every declared
    /// arm form an implicit trailing arm.
    Members(Vec<ArmMembers>),
}

impl Assignment {
    /// Declared arms given as index lists.
    pub fn from_positions(positions: Vec<Vec<usize>>) -> Self {
        Assignment::Members(positions.into_iter().map(ArmMembers::Indices).collect())
    }

    /// Declared arms given as boolean masks.
    pub fn from_masks(masks: Vec<Vec<bool>>) -> Self {
        Assignment::Members(masks.into_iter().map(ArmMembers::Mask).collect())
    }

    /// Resolves the assignment against `units` units.
    pub fn resolve(&self, units: usize) -> Result<ResolvedArms, RctError> {
        resolve(units, self)
    }

    /// Declared membership masks, without the implicit arm.
    pub fn declared_masks(&self, units: usize) -> Result<Vec<Vec<bool>>, RctError> {
        match self {
            Assignment::Labels(labels) => {
                if labels.len() != units {
                    return Err(RctError::Assignment(
                        ErrorInfo::new("assignment-label-length", "label vector length differs from unit count")
                            .with_context("expected", units)
                            .with_context("actual", labels.len()),
                    ));
                }
                let arms = labels.iter().max().map_or(0, |max| max + 1);
                Ok((0..arms)
                    .map(|arm| labels.iter().map(|&label| label == arm).collect())
                    .collect())
            }
            Assignment::Members(members) => members
                .iter()
                .enumerate()
                .map(|(arm, entry)| entry_mask(units, arm, entry))
                .collect(),
        }
    }

    /// Label vector of the resolved arms (implicit arm included).
    pub fn to_labels(&self, units: usize) -> Result<Vec<usize>, RctError> {
        Ok(self.resolve(units)?.labels())
    }
}

fn entry_mask(units: usize, arm: usize, entry: &ArmMembers) -> Result<Vec<bool>, RctError> {
    match entry {
        ArmMembers::Mask(mask) => {
            if mask.len() != units {
                return Err(RctError::Assignment(
                    ErrorInfo::new("assignment-mask-length", "membership mask length differs from unit count")
                        .with_context("arm", arm)
                        .with_context("expected", units)
                        .with_context("actual", mask.len()),
                ));
            }
            Ok(mask.clone())
        }
        ArmMembers::Indices(indices) => {
            let mut mask = vec![false; units];
            for &index in indices {
                let slot = mask.get_mut(index).ok_or_else(|| {
                    RctError::Assignment(
                        ErrorInfo::new("assignment-index-out-of-range", "arm references an unknown unit")
                            .with_context("arm", arm)
                            .with_context("index", index)
                            .with_context("units", units),
                    )
                })?;
                *slot = true;
            }
            Ok(mask)
        }
    }
}

/// Per-arm membership masks forming a partition of the units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedArms {
    masks: Vec<Vec<bool>>,
    declared: usize,
    units: usize,
}

impl ResolvedArms {
    /// Membership masks, one per resolved arm.
    pub fn masks(&self) -> &[Vec<bool>] {
        &self.masks
    }

    /// Number of resolved arms (declared plus implicit).
    pub fn len(&self) -> usize {
        self.masks.len()
    }

    /// Returns `true` when no arm was resolved.
    pub fn is_empty(&self) -> bool {
        self.masks.is_empty()
    }

    /// Number of arms declared by the caller.
    pub fn declared(&self) -> usize {
        self.declared
    }

    /// Whether the leftover arm was appended.
    pub fn has_implicit(&self) -> bool {
        self.masks.len() > self.declared
    }

    /// Number of units covered.
    pub fn units(&self) -> usize {
        self.units
    }

    /// Unit count per arm.
    pub fn sizes(&self) -> Vec<usize> {
        self.masks
            .iter()
            .map(|mask| mask.iter().filter(|&&member| member).count())
            .collect()
    }

    /// Unit indices of one arm, in ascending order.
    pub fn members(&self, arm: usize) -> impl Iterator<Item = usize> + '_ {
        self.masks[arm]
            .iter()
            .enumerate()
            .filter(|(_, &member)| member)
            .map(|(index, _)| index)
    }

    /// Arm label of every unit.
    pub fn labels(&self) -> Vec<usize> {
        let mut labels = vec![0; self.units];
        for (arm, mask) in self.masks.iter().enumerate() {
            for (label, &member) in labels.iter_mut().zip(mask) {
                if member {
                    *label = arm;
                }
            }
        }
        labels
    }
}

/// Resolves an assignment into disjoint, exhaustive membership masks.
///
/// The union of the declared arms is the OR across all of them; units in no
/// declared arm are collected into one trailing implicit arm.
pub fn resolve(units: usize, assignment: &Assignment) -> Result<ResolvedArms, RctError> {
    let mut masks = assignment.declared_masks(units)?;
    let declared = masks.len();
    let mut covered = vec![false; units];
    for (arm, mask) in masks.iter().enumerate() {
        for (unit, (seen, &member)) in covered.iter_mut().zip(mask).enumerate() {
            if member && *seen {
                return Err(RctError::Assignment(
                    ErrorInfo::new("assignment-overlapping-arms", "unit belongs to more than one arm")
                        .with_context("arm", arm)
                        .with_context("unit", unit),
                ));
            }
            *seen |= member;
        }
    }
    if covered.iter().any(|&seen| !seen) {
        masks.push(covered.iter().map(|&seen| !seen).collect());
    }
    Ok(ResolvedArms {
        masks,
        declared,
        units,
    })
}

/// Per-arm unit positions of a label vector, for arms `0..=max(label)`.
pub fn labels_to_positions(labels: &[usize]) -> Vec<Vec<usize>> {
    let arms = labels.iter().max().map_or(0, |max| max + 1);
    let mut positions = vec![Vec::new(); arms];
    for (unit, &label) in labels.iter().enumerate() {
        positions[label].push(unit);
    }
    positions
}
