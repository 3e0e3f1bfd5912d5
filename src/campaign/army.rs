//! Armies and their marching orders
//!
//! An army owns the column it marches in and follows a route of nodes across
//! the road network, stopping whenever a decision is due.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::column::ColumnPosition;
use super::events::DecisionPoint;
use super::formation::{column_length, Formation};
use super::network::RoadNetwork;
use crate::core::error::{MarchError, Result};
use crate::core::types::{NodeId, PolityId};

/// Unique identifier for an army
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArmyId(pub u32);

/// Orders that can be given to an army
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArmyOrder {
    /// March to a node and occupy it
    MarchTo(NodeId),
    /// March to a stronghold and mass outside its gates
    GatherAt(NodeId),
    Halt,
}

impl ArmyOrder {
    pub fn destination(&self) -> Option<NodeId> {
        match self {
            Self::MarchTo(node) | Self::GatherAt(node) => Some(*node),
            Self::Halt => None,
        }
    }
}

/// An army on the road network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Army {
    pub id: ArmyId,
    pub name: String,
    pub faction: PolityId,
    pub formations: Vec<Formation>,
    pub noncombatant_percent: u32,
    pub position: ColumnPosition,
    pub orders: Option<ArmyOrder>,
    /// Nodes still to pass, next first
    pub route: VecDeque<NodeId>,
}

impl Army {
    /// Raise an army folded up on `start`
    pub fn new(
        id: ArmyId,
        name: String,
        faction: PolityId,
        formations: Vec<Formation>,
        start: NodeId,
        net: &RoadNetwork,
    ) -> Result<Self> {
        let noncombatant_percent = 25;
        let length = column_length(&formations, noncombatant_percent);
        if length <= 0.0 {
            return Err(MarchError::InvalidAction(format!(
                "army '{}' has nobody to march",
                name
            )));
        }
        Ok(Self {
            id,
            name,
            faction,
            formations,
            noncombatant_percent,
            position: ColumnPosition::at_node(start, length, net)?,
            orders: None,
            route: VecDeque::new(),
        })
    }

    pub fn with_noncombatants(mut self, percent: u32, net: &RoadNetwork) -> Result<Self> {
        self.noncombatant_percent = percent;
        self.position
            .set_max_extent(column_length(&self.formations, percent), net)?;
        Ok(self)
    }

    /// Road the army takes up on the march
    pub fn column_length(&self) -> f64 {
        column_length(&self.formations, self.noncombatant_percent)
    }

    /// Total fighting men
    pub fn warriors(&self) -> u32 {
        self.formations.iter().map(|f| f.warriors).sum()
    }

    /// Node the head of the column stands on or is heading for
    pub fn head(&self) -> Option<NodeId> {
        let lead = self.position.lead();
        lead.node().or(lead.orientation())
    }

    /// Give marching orders toward `destination`
    ///
    /// The route avoids strongholds held by other polities unless their gates
    /// stand open. The destination itself is always allowed.
    pub fn order_march_to(&mut self, destination: NodeId, net: &RoadNetwork) -> Result<()> {
        self.plan_route(destination, net)?;
        self.orders = Some(ArmyOrder::MarchTo(destination));
        Ok(())
    }

    /// March toward a stronghold and halt outside its gates
    pub fn order_gather_at(&mut self, destination: NodeId, net: &RoadNetwork) -> Result<()> {
        if !net.node(destination)?.is_stronghold() {
            return Err(MarchError::InvalidAction(format!(
                "'{}' has no gates to gather before",
                net.name_of(destination)
            )));
        }
        self.plan_route(destination, net)?;
        self.orders = Some(ArmyOrder::GatherAt(destination));
        Ok(())
    }

    /// Halt the army
    pub fn order_halt(&mut self) {
        self.orders = Some(ArmyOrder::Halt);
        self.route.clear();
    }

    fn plan_route(&mut self, destination: NodeId, net: &RoadNetwork) -> Result<()> {
        let head = self.head().ok_or_else(|| {
            MarchError::InvalidPosition(format!("army '{}' has no head node", self.name))
        })?;
        let faction = self.faction;
        let path = net.shortest_path_excluding(head, destination, |_, to, _| {
            let hostile = to.held_by.is_some_and(|p| p != faction);
            to.id != destination && to.is_stronghold() && hostile && !to.gates_open
        })?;

        let mut route: VecDeque<NodeId> = path.into_iter().collect();
        if self.position.lead().node() == Some(head) {
            route.pop_front();
        }
        tracing::debug!(
            "{} ordered to {} by {} stages",
            self.name,
            net.name_of(destination),
            route.len()
        );
        self.route = route;
        Ok(())
    }

    /// Spend `distance` leagues of movement following the current orders
    ///
    /// Crossroads are passed without stopping; the march ends at the first
    /// stronghold, at the destination, or when movement runs out.
    pub fn march(&mut self, distance: f64, net: &RoadNetwork) -> Result<Vec<DecisionPoint>> {
        let Some(order) = self.orders else {
            return Ok(Vec::new());
        };
        let Some(destination) = order.destination() else {
            return Ok(Vec::new());
        };
        let tolerance = self.position.config().tolerance;

        let mut events = Vec::new();
        let mut left = distance;
        loop {
            if let Some(here) = self.position.lead().node() {
                if self.route.front() == Some(&here) {
                    self.route.pop_front();
                }
                if let Some(&next) = self.route.front() {
                    self.position.set_orientation(next, net)?;
                }
            }

            let final_leg = self.route.len() <= 1;
            let gather = final_leg && matches!(order, ArmyOrder::GatherAt(_));
            let Some(event) = self.position.advance(left, gather, net)? else {
                break;
            };
            tracing::info!("{}: {}", self.name, event);

            let done = match &event {
                DecisionPoint::NodeOccupied { node, .. }
                | DecisionPoint::ArmyGathered { node, .. } => *node == destination,
                _ => false,
            };
            let remaining = event.remaining_movement().unwrap_or(0.0);
            let carry_on = matches!(event, DecisionPoint::CrossroadsReached { .. })
                && event.node() != destination
                && remaining > tolerance;
            events.push(event);

            if done {
                self.orders = None;
                self.route.clear();
                break;
            }
            if !carry_on {
                break;
            }
            left = remaining;
        }
        Ok(events)
    }
}
