//! Point positions on the road network
//!
//! A point is either resting on a node or travelling along a road toward one
//! of its endpoints. The leading and trailing edges of a marching column are
//! both points.

use serde::{Deserialize, Serialize};

use super::events::DecisionPoint;
use super::location::{EdgeKey, Location};
use super::network::RoadNetwork;
use crate::core::config::config;
use crate::core::error::{MarchError, Result};
use crate::core::types::NodeId;

/// Outcome of advancing a point
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Step {
    /// Still on the road, all movement spent
    EnRoute,
    /// Entered `node`; `announced` is false when the point was already
    /// standing on the threshold and slipped in without using any movement
    Arrived {
        node: NodeId,
        remaining: f64,
        announced: bool,
    },
    /// Halted on the threshold of a stronghold without entering
    AtGates { node: NodeId, remaining: f64 },
}

/// The location of a single point, with its direction of travel
///
/// On a road, `orientation` names the endpoint the point is heading for and
/// `distance_to_destination` the leagues left to it. On a node,
/// `orientation` optionally names the neighbor the point is about to set out
/// for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointPosition {
    pub(crate) location: Location,
    pub(crate) orientation: Option<NodeId>,
    pub(crate) distance_to_destination: Option<f64>,
}

impl PointPosition {
    /// A point resting on a node
    pub fn at_node(node: NodeId) -> Self {
        Self {
            location: Location::Node(node),
            orientation: None,
            distance_to_destination: None,
        }
    }

    /// A point on a node, about to set out toward a neighbor
    pub fn departing(node: NodeId, toward: NodeId, net: &RoadNetwork) -> Result<Self> {
        let point = Self {
            location: Location::Node(node),
            orientation: Some(toward),
            distance_to_destination: None,
        };
        point.validate(net)?;
        Ok(point)
    }

    /// A point on the road between `from` and `toward`, heading for `toward`
    pub fn on_edge(
        from: NodeId,
        toward: NodeId,
        distance_to_destination: f64,
        net: &RoadNetwork,
    ) -> Result<Self> {
        let point = Self {
            location: Location::edge(from, toward),
            orientation: Some(toward),
            distance_to_destination: Some(distance_to_destination),
        };
        point.validate(net)?;
        Ok(point)
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn orientation(&self) -> Option<NodeId> {
        self.orientation
    }

    pub fn distance_to_destination(&self) -> Option<f64> {
        self.distance_to_destination
    }

    pub fn node(&self) -> Option<NodeId> {
        self.location.as_node()
    }

    pub fn edge(&self) -> Option<EdgeKey> {
        self.location.as_edge()
    }

    /// True when on a road with no distance left to the destination
    pub fn has_closed_distance(&self, tolerance: f64) -> bool {
        self.edge().is_some() && self.distance_to_destination.is_some_and(|d| d <= tolerance)
    }

    /// Check the structural invariants of this point
    pub fn validate(&self, net: &RoadNetwork) -> Result<()> {
        match self.location {
            Location::Edge(edge) => {
                let length = net.edge_length(edge.a(), edge.b()).map_err(|_| {
                    MarchError::InvalidPosition(format!(
                        "road {} - {} not found in network",
                        net.name_of(edge.a()),
                        net.name_of(edge.b())
                    ))
                })?;
                let Some(orientation) = self.orientation else {
                    return Err(MarchError::InvalidPosition(format!(
                        "point on road {} must have an orientation",
                        edge
                    )));
                };
                if !edge.contains(orientation) {
                    return Err(MarchError::InvalidPosition(format!(
                        "'{}' is not an endpoint of road {} - {}",
                        net.name_of(orientation),
                        net.name_of(edge.a()),
                        net.name_of(edge.b())
                    )));
                }
                let Some(remaining) = self.distance_to_destination else {
                    return Err(MarchError::InvalidPosition(format!(
                        "point on road {} must have a distance to destination",
                        edge
                    )));
                };
                if !(0.0..=length).contains(&remaining) {
                    return Err(MarchError::InvalidPosition(format!(
                        "distance to destination must lie within the {} leagues of road {} - {}, got {}",
                        length,
                        net.name_of(edge.a()),
                        net.name_of(edge.b()),
                        remaining
                    )));
                }
            }
            Location::Node(node) => {
                net.node(node).map_err(|_| {
                    MarchError::InvalidPosition(format!("node {} not found in network", node))
                })?;
                if let Some(orientation) = self.orientation {
                    if !net.is_adjacent(node, orientation) {
                        return Err(MarchError::InvalidPosition(format!(
                            "orientation '{}' is not a neighbor of '{}'",
                            net.name_of(orientation),
                            net.name_of(node)
                        )));
                    }
                }
                if let Some(remaining) = self.distance_to_destination {
                    return Err(MarchError::InvalidPosition(format!(
                        "point resting on '{}' cannot have a distance to destination, got {}",
                        net.name_of(node),
                        remaining
                    )));
                }
            }
        }
        Ok(())
    }

    /// Distance along the current road from `node` to this point
    ///
    /// For a point resting on a node this is zero at that node and the road
    /// length for a neighbor.
    pub fn offset_from(&self, node: NodeId, net: &RoadNetwork) -> Result<f64> {
        match self.location {
            Location::Node(here) if here == node => Ok(0.0),
            Location::Node(here) => net.edge_length(here, node).map_err(|_| {
                MarchError::InvalidPosition(format!(
                    "'{}' is not next to '{}'",
                    net.name_of(node),
                    net.name_of(here)
                ))
            }),
            Location::Edge(edge) => {
                if !edge.contains(node) {
                    return Err(MarchError::InvalidPosition(format!(
                        "'{}' is not an endpoint of road {} - {}",
                        net.name_of(node),
                        net.name_of(edge.a()),
                        net.name_of(edge.b())
                    )));
                }
                let length = net.edge_length(edge.a(), edge.b())?;
                let (toward, remaining) = self.heading()?;
                Ok(if toward == node {
                    remaining
                } else {
                    length - remaining
                })
            }
        }
    }

    /// Offset from the reference endpoint `a()` of the current road
    pub(crate) fn road_offset(&self, net: &RoadNetwork) -> Result<f64> {
        match self.location {
            Location::Edge(edge) => self.offset_from(edge.a(), net),
            Location::Node(node) => Err(MarchError::InvalidPosition(format!(
                "'{}' is a node, not a road",
                net.name_of(node)
            ))),
        }
    }

    fn heading(&self) -> Result<(NodeId, f64)> {
        match (self.orientation, self.distance_to_destination) {
            (Some(toward), Some(remaining)) => Ok((toward, remaining)),
            _ => Err(MarchError::InvalidPosition(format!(
                "point at {} has no heading",
                self.location
            ))),
        }
    }

    /// Shortest on-road distance to another point
    pub fn distance_to(&self, other: &PointPosition, net: &RoadNetwork) -> Result<f64> {
        match (self.location, other.location) {
            (Location::Node(from), Location::Node(to)) => net.distance(from, to),
            (Location::Node(_), Location::Edge(_)) => other.distance_to(self, net),
            (Location::Edge(mine), Location::Edge(theirs)) if mine == theirs => {
                Ok((self.road_offset(net)? - other.road_offset(net)?).abs())
            }
            (Location::Edge(edge), _) => {
                let mut best: Option<f64> = None;
                let mut last_error = None;
                for endpoint in [edge.a(), edge.b()] {
                    let partial = self.offset_from(endpoint, net)?;
                    match PointPosition::at_node(endpoint).distance_to(other, net) {
                        Ok(rest) => {
                            let total = partial + rest;
                            best = Some(best.map_or(total, |b| b.min(total)));
                        }
                        Err(e) => last_error = Some(e),
                    }
                }
                match (best, last_error) {
                    (Some(d), _) => Ok(d),
                    (None, Some(e)) => Err(e),
                    (None, None) => unreachable!("a road always has two endpoints"),
                }
            }
        }
    }

    /// Same node, or same road at the same offset, regardless of heading
    pub fn is_same_location(&self, other: &PointPosition, net: &RoadNetwork) -> Result<bool> {
        self.is_same_location_within(other, config().tolerance, net)
    }

    pub(crate) fn is_same_location_within(
        &self,
        other: &PointPosition,
        tolerance: f64,
        net: &RoadNetwork,
    ) -> Result<bool> {
        match (self.location, other.location) {
            (Location::Node(a), Location::Node(b)) => Ok(a == b),
            (Location::Edge(a), Location::Edge(b)) if a == b => {
                Ok((self.road_offset(net)? - other.road_offset(net)?).abs() <= tolerance)
            }
            _ => Ok(false),
        }
    }

    /// Point toward `target`, which must be a neighbor of the node or an
    /// endpoint of the road the point is on
    pub fn set_orientation(&mut self, target: NodeId, net: &RoadNetwork) -> Result<()> {
        self.validate(net)?;
        match self.location {
            Location::Node(node) => {
                if !net.is_adjacent(node, target) {
                    return Err(MarchError::InvalidAction(format!(
                        "'{}' is not a neighbor of '{}'",
                        net.name_of(target),
                        net.name_of(node)
                    )));
                }
                self.orientation = Some(target);
            }
            Location::Edge(edge) => {
                if !edge.contains(target) {
                    return Err(MarchError::InvalidAction(format!(
                        "'{}' is not an endpoint of road {} - {}",
                        net.name_of(target),
                        net.name_of(edge.a()),
                        net.name_of(edge.b())
                    )));
                }
                if self.orientation != Some(target) {
                    let length = net.edge_length(edge.a(), edge.b())?;
                    let (_, remaining) = self.heading()?;
                    self.distance_to_destination = Some(length - remaining);
                    self.orientation = Some(target);
                }
            }
        }
        Ok(())
    }

    /// Turn around on the current road
    pub fn reverse_course(&mut self, net: &RoadNetwork) -> Result<()> {
        let Location::Edge(edge) = self.location else {
            return Err(MarchError::InvalidAction(format!(
                "cannot reverse course while resting on '{}'",
                self.node().map(|n| net.name_of(n)).unwrap_or_default()
            )));
        };
        let toward = self.orientation.ok_or_else(|| {
            MarchError::InvalidAction(format!("point on road {} has no orientation", edge))
        })?;
        let back = edge.other(toward).ok_or_else(|| {
            MarchError::InvalidPosition(format!(
                "'{}' is not an endpoint of road {}",
                net.name_of(toward),
                edge
            ))
        })?;
        self.set_orientation(back, net)
    }

    /// Move `distance` leagues, first turning toward `toward` if given
    ///
    /// Reaching the destination enters it and reports the arrival together
    /// with the unused movement.
    pub fn advance(
        &mut self,
        distance: f64,
        toward: Option<NodeId>,
        net: &RoadNetwork,
    ) -> Result<Option<DecisionPoint>> {
        check_distance(distance)?;
        if let Some(target) = toward {
            if self.orientation != Some(target) {
                self.set_orientation(target, net)?;
            }
        }
        let step = self.step(distance, false, net)?;
        announce(step, net)
    }

    /// Move like [`advance`](Self::advance), but halt on the threshold of a
    /// stronghold instead of entering it
    pub fn advance_to_gates(
        &mut self,
        distance: f64,
        net: &RoadNetwork,
    ) -> Result<Option<DecisionPoint>> {
        check_distance(distance)?;
        let step = self.step(distance, true, net)?;
        announce(step, net)
    }

    pub(crate) fn step(&mut self, distance: f64, halt_at_gates: bool, net: &RoadNetwork) -> Result<Step> {
        check_distance(distance)?;
        self.validate(net)?;
        match self.location {
            Location::Node(node) => {
                let toward = self.orientation.ok_or_else(|| {
                    MarchError::InvalidAction(format!(
                        "cannot leave '{}' without an orientation",
                        net.name_of(node)
                    ))
                })?;
                let length = net.edge_length(node, toward)?;
                self.location = Location::edge(node, toward);
                self.distance_to_destination = Some(length);
                tracing::trace!(
                    "point left {} toward {}",
                    net.name_of(node),
                    net.name_of(toward)
                );
                self.step(distance, halt_at_gates, net)
            }
            Location::Edge(_) => {
                let (destination, remaining) = self.heading()?;
                let gated = halt_at_gates && net.node(destination)?.is_stronghold();

                if remaining <= 0.0 {
                    if gated {
                        return Ok(Step::EnRoute);
                    }
                    self.enter(destination);
                    return Ok(Step::Arrived {
                        node: destination,
                        remaining: distance,
                        announced: false,
                    });
                }

                if distance >= remaining {
                    let left = distance - remaining;
                    if gated {
                        self.distance_to_destination = Some(0.0);
                        return Ok(Step::AtGates {
                            node: destination,
                            remaining: left,
                        });
                    }
                    self.enter(destination);
                    return Ok(Step::Arrived {
                        node: destination,
                        remaining: left,
                        announced: true,
                    });
                }

                self.distance_to_destination = Some(remaining - distance);
                Ok(Step::EnRoute)
            }
        }
    }

    /// Stand on `node` with no heading
    pub(crate) fn enter(&mut self, node: NodeId) {
        self.location = Location::Node(node);
        self.orientation = None;
        self.distance_to_destination = None;
    }

    /// This point facing the other way; a point on a node loses its heading
    pub(crate) fn flipped(&self, net: &RoadNetwork) -> Result<Self> {
        let mut flipped = self.clone();
        match self.location {
            Location::Edge(_) => flipped.reverse_course(net)?,
            Location::Node(_) => flipped.orientation = None,
        }
        Ok(flipped)
    }
}

impl std::fmt::Display for PointPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.location, self.orientation, self.distance_to_destination) {
            (Location::Edge(edge), Some(toward), Some(remaining)) => {
                write!(f, "{} on {} toward {}", remaining, edge, toward)
            }
            (location, Some(toward), _) => write!(f, "{} bound for {}", location, toward),
            (location, None, _) => write!(f, "{}", location),
        }
    }
}

fn check_distance(distance: f64) -> Result<()> {
    if distance >= 0.0 && distance.is_finite() {
        Ok(())
    } else {
        Err(MarchError::InvalidAction(format!(
            "movement must be a finite non-negative distance, got {}",
            distance
        )))
    }
}

pub(crate) fn announce(step: Step, net: &RoadNetwork) -> Result<Option<DecisionPoint>> {
    match step {
        Step::Arrived {
            node,
            remaining,
            announced: true,
        }
        | Step::AtGates { node, remaining } => {
            Ok(Some(DecisionPoint::arrival(net.node(node)?, remaining)))
        }
        Step::Arrived { .. } | Step::EnRoute => Ok(None),
    }
}
