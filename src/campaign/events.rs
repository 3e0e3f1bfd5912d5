//! Decision points raised while columns march
//!
//! Each one tells the army layer that the column has arrived somewhere and
//! that a choice (keep marching, lay siege, turn back...) is now due.

use serde::{Deserialize, Serialize};

use super::location::EdgeKey;
use super::network::{NodeInfo, StrongholdType};
use crate::core::types::{NodeId, PolityId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DecisionPoint {
    /// A point reached a plain crossroads
    CrossroadsReached {
        node: NodeId,
        name: String,
        remaining_movement: f64,
    },
    /// A point reached the gates of a stronghold
    StrongholdReached {
        node: NodeId,
        name: String,
        stronghold_type: StrongholdType,
        held_by: Option<PolityId>,
        remaining_movement: f64,
    },
    /// A column finished massing outside a node it halted before
    ArmyGathered {
        node: NodeId,
        name: String,
        approach_road: EdgeKey,
        stronghold_type: Option<StrongholdType>,
        held_by: Option<PolityId>,
    },
    /// A column stands entirely on one node
    NodeOccupied {
        node: NodeId,
        name: String,
        stronghold_type: Option<StrongholdType>,
        held_by: Option<PolityId>,
    },
}

impl DecisionPoint {
    /// Arrival of a point at `info`, carrying the movement it did not use
    pub fn arrival(info: &NodeInfo, remaining_movement: f64) -> Self {
        match info.stronghold {
            Some(stronghold_type) => Self::StrongholdReached {
                node: info.id,
                name: info.name.clone(),
                stronghold_type,
                held_by: info.held_by,
                remaining_movement,
            },
            None => Self::CrossroadsReached {
                node: info.id,
                name: info.name.clone(),
                remaining_movement,
            },
        }
    }

    pub fn gathered(info: &NodeInfo, approach_road: EdgeKey) -> Self {
        Self::ArmyGathered {
            node: info.id,
            name: info.name.clone(),
            approach_road,
            stronghold_type: info.stronghold,
            held_by: info.held_by,
        }
    }

    pub fn occupied(info: &NodeInfo) -> Self {
        Self::NodeOccupied {
            node: info.id,
            name: info.name.clone(),
            stronghold_type: info.stronghold,
            held_by: info.held_by,
        }
    }

    /// The node the event happened at
    pub fn node(&self) -> NodeId {
        match self {
            Self::CrossroadsReached { node, .. }
            | Self::StrongholdReached { node, .. }
            | Self::ArmyGathered { node, .. }
            | Self::NodeOccupied { node, .. } => *node,
        }
    }

    /// Leftover movement, for arrival events
    pub fn remaining_movement(&self) -> Option<f64> {
        match self {
            Self::CrossroadsReached {
                remaining_movement, ..
            }
            | Self::StrongholdReached {
                remaining_movement, ..
            } => Some(*remaining_movement),
            Self::ArmyGathered { .. } | Self::NodeOccupied { .. } => None,
        }
    }

    pub fn is_arrival(&self) -> bool {
        self.remaining_movement().is_some()
    }
}

impl std::fmt::Display for DecisionPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CrossroadsReached { name, .. } => write!(f, "reached {}", name),
            Self::StrongholdReached {
                name,
                stronghold_type,
                held_by,
                ..
            } => match held_by {
                Some(holder) => write!(
                    f,
                    "reached {} of {}, held by polity {}",
                    stronghold_type, name, holder.0
                ),
                None => write!(f, "reached {} of {}, unheld", stronghold_type, name),
            },
            Self::ArmyGathered { name, .. } => write!(f, "gathered before {}", name),
            Self::NodeOccupied { name, .. } => write!(f, "occupying {}", name),
        }
    }
}
