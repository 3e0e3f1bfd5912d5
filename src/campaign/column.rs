//! Column positions - the ground a marching body covers
//!
//! A column is tracked by its leading and trailing points plus the chain of
//! nodes it stretches across between them. Movement and reform live in
//! `march.rs`, overlap resolution in `deconflict.rs`.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use super::location::{EdgeKey, Location};
use super::network::RoadNetwork;
use super::point::PointPosition;
use crate::core::config::{config, MarchConfig};
use crate::core::error::{MarchError, Result};
use crate::core::types::NodeId;

/// Motion regime of a column, derived from its current state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Motion {
    /// Stationary on a single node
    Holding,
    /// The lead has turned back onto the chain; the column folds inward
    Regrouping,
    /// The lead has arrived on a node and the trail is catching up
    Entering,
    /// The lead waits outside the gates while the body masses behind it
    Gathering,
    /// Advancing normally
    Marching,
}

/// A stretch of road covered by a column
///
/// Offsets are measured from the reference endpoint `edge.a()`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub edge: EdgeKey,
    pub lead_side: f64,
    pub trail_side: f64,
}

impl Segment {
    pub fn length(&self) -> f64 {
        (self.lead_side - self.trail_side).abs()
    }

    pub fn low(&self) -> f64 {
        self.lead_side.min(self.trail_side)
    }

    pub fn high(&self) -> f64 {
        self.lead_side.max(self.trail_side)
    }

    /// Whether `offset` on the same road lies within this stretch
    pub fn covers(&self, offset: f64, tolerance: f64) -> bool {
        offset >= self.low() - tolerance && offset <= self.high() + tolerance
    }
}

/// The spatial extent of a marching body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPosition {
    pub(crate) lead: PointPosition,
    pub(crate) trail: PointPosition,
    /// Nodes spanned between lead and trail, nearest the lead first
    pub(crate) waypoints: VecDeque<NodeId>,
    pub(crate) max_extent: f64,
    #[serde(default)]
    pub(crate) config: MarchConfig,
}

impl ColumnPosition {
    /// Build a column from explicit parts, validating the result
    pub fn new(
        lead: PointPosition,
        trail: PointPosition,
        waypoints: impl IntoIterator<Item = NodeId>,
        max_extent: f64,
        net: &RoadNetwork,
    ) -> Result<Self> {
        let mut column = Self {
            lead,
            trail,
            waypoints: waypoints.into_iter().collect(),
            max_extent,
            config: *config(),
        };
        column.settle();
        column.validate(net)?;
        Ok(column)
    }

    /// A column folded onto a single node
    pub fn at_node(node: NodeId, max_extent: f64, net: &RoadNetwork) -> Result<Self> {
        Self::new(
            PointPosition::at_node(node),
            PointPosition::at_node(node),
            [],
            max_extent,
            net,
        )
    }

    /// Use explicit tunables instead of the process-wide defaults
    pub fn with_config(mut self, config: MarchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn lead(&self) -> &PointPosition {
        &self.lead
    }

    pub fn trail(&self) -> &PointPosition {
        &self.trail
    }

    pub fn waypoints(&self) -> &VecDeque<NodeId> {
        &self.waypoints
    }

    pub fn max_extent(&self) -> f64 {
        self.max_extent
    }

    pub fn config(&self) -> &MarchConfig {
        &self.config
    }

    /// Change the permitted extent, pulling the trail in if needed
    pub fn set_max_extent(&mut self, max_extent: f64, net: &RoadNetwork) -> Result<()> {
        if !(max_extent > 0.0 && max_extent.is_finite()) {
            return Err(MarchError::InvalidAction(format!(
                "column length must be positive, got {}",
                max_extent
            )));
        }
        self.max_extent = max_extent;
        self.reform(net)
    }

    /// Check every structural invariant of the column
    pub fn validate(&self, net: &RoadNetwork) -> Result<()> {
        if !(self.max_extent > 0.0 && self.max_extent.is_finite()) {
            return Err(MarchError::InvalidPosition(format!(
                "column length must be positive, got {}",
                self.max_extent
            )));
        }
        self.lead.validate(net)?;
        self.trail.validate(net)?;
        for &node in &self.waypoints {
            net.node(node).map_err(|_| {
                MarchError::InvalidPosition(format!("waypoint {} not found in network", node))
            })?;
        }

        let extent = self.current_extent(net)?;
        if extent > self.max_extent + self.config.tolerance {
            return Err(MarchError::InvalidPosition(format!(
                "column spans {} leagues but may span at most {}",
                extent, self.max_extent
            )));
        }
        Ok(())
    }

    /// Lead, waypoint nodes and trail, in order
    pub(crate) fn anchors(&self) -> Vec<PointPosition> {
        let mut anchors = Vec::with_capacity(self.waypoints.len() + 2);
        anchors.push(self.lead.clone());
        anchors.extend(self.waypoints.iter().map(|&n| PointPosition::at_node(n)));
        anchors.push(self.trail.clone());
        anchors
    }

    /// The stretches of road the column covers, lead first
    pub fn segments(&self, net: &RoadNetwork) -> Result<Vec<Segment>> {
        let anchors = self.anchors();
        let mut segments = Vec::with_capacity(anchors.len());
        for pair in anchors.windows(2) {
            if let Some(segment) = span(&pair[0], &pair[1], net)? {
                segments.push(segment);
            }
        }
        Ok(segments)
    }

    /// On-road distance from lead to trail through the waypoint chain
    pub fn current_extent(&self, net: &RoadNetwork) -> Result<f64> {
        Ok(self.segments(net)?.iter().map(Segment::length).sum())
    }

    /// Every node the column touches, lead first
    pub fn occupied_nodes(&self) -> Vec<NodeId> {
        let mut nodes = Vec::with_capacity(self.waypoints.len() + 2);
        nodes.extend(self.lead.node());
        for &w in &self.waypoints {
            if nodes.last() != Some(&w) {
                nodes.push(w);
            }
        }
        if let Some(n) = self.trail.node() {
            if nodes.last() != Some(&n) {
                nodes.push(n);
            }
        }
        nodes
    }

    /// Current motion regime
    pub fn motion(&self, gather_at_gates: bool, net: &RoadNetwork) -> Result<Motion> {
        let tolerance = self.config.tolerance;
        let extent = self.current_extent(net)?;

        if extent <= tolerance && self.lead.orientation.is_none() {
            return Ok(Motion::Holding);
        }
        if let Some(&first) = self.waypoints.front() {
            if self.lead.orientation == Some(first) {
                return Ok(Motion::Regrouping);
            }
        }
        if self.lead.orientation.is_none() {
            return Ok(Motion::Entering);
        }
        if gather_at_gates && self.lead.has_closed_distance(tolerance) {
            return Ok(Motion::Gathering);
        }
        Ok(Motion::Marching)
    }

    /// The node the trail should head for to close on the lead
    pub(crate) fn trail_inward(&self, net: &RoadNetwork) -> Result<Option<NodeId>> {
        let here = self.trail.node();
        if let Some(&w) = self.waypoints.iter().rev().find(|&&w| Some(w) != here) {
            return Ok(Some(w));
        }
        heading_toward(
            &self.trail,
            &self.lead,
            self.lead.orientation,
            self.config.tolerance,
            net,
        )
    }

    /// The node the lead should head for to fall back on its own column
    pub(crate) fn lead_inward(&self, net: &RoadNetwork) -> Result<Option<NodeId>> {
        let here = self.lead.node();
        if let Some(&w) = self.waypoints.iter().find(|&&w| Some(w) != here) {
            return Ok(Some(w));
        }
        let tie = match (self.lead.edge(), self.lead.orientation) {
            (Some(edge), Some(toward)) => edge.other(toward),
            _ => None,
        };
        heading_toward(&self.lead, &self.trail, tie, self.config.tolerance, net)
    }

    /// Restore the canonical form after a mutation
    ///
    /// Drops waypoints either end is standing on and clears the heading of a
    /// trail resting on a node; reform picks a fresh one before every step.
    pub(crate) fn settle(&mut self) {
        while let (Some(here), Some(&first)) = (self.lead.node(), self.waypoints.front()) {
            if here != first {
                break;
            }
            self.waypoints.pop_front();
        }
        while let (Some(here), Some(&last)) = (self.trail.node(), self.waypoints.back()) {
            if here != last {
                break;
            }
            self.waypoints.pop_back();
        }
        if self.trail.node().is_some() {
            self.trail.orientation = None;
        }
    }

    /// Fold the whole column onto `node`
    pub(crate) fn collapse_onto(&mut self, node: NodeId) {
        self.lead.enter(node);
        self.trail.enter(node);
        self.waypoints.clear();
    }

    /// Swap lead and trail and walk the chain the other way
    ///
    /// An end resting on a node comes out of the swap without a heading.
    /// Reversing twice therefore restores the column exactly, except that a
    /// lead waiting on a node with a departure order comes back without that
    /// order and has to be pointed out again with `set_orientation`.
    pub fn reverse_course(&mut self, net: &RoadNetwork) -> Result<()> {
        self.validate(net)?;
        let lead = self.trail.flipped(net)?;
        let trail = self.lead.flipped(net)?;
        self.lead = lead;
        self.trail = trail;
        self.waypoints.make_contiguous().reverse();
        self.settle();
        tracing::debug!("column reversed, lead now at {}", self.lead);
        self.validate(net)
    }

    /// Face the column toward `target` with the least disruption
    ///
    /// On failure the column is left as it was.
    pub fn set_orientation(&mut self, target: NodeId, net: &RoadNetwork) -> Result<()> {
        self.validate(net)?;
        let before = self.clone();
        if let Err(e) = self.orient(target, net) {
            *self = before;
            return Err(e);
        }
        self.settle();
        self.validate(net)
    }

    fn orient(&mut self, target: NodeId, net: &RoadNetwork) -> Result<()> {
        if self.lead.orientation == Some(target) || self.lead.node() == Some(target) {
            return Ok(());
        }

        if self.trail.node() == Some(target) {
            return self.reverse_course(net);
        }

        if self.waypoints.contains(&target) {
            if let Some(inward) = self.lead_inward(net)? {
                self.lead.set_orientation(inward, net)?;
            }
            return Ok(());
        }

        // Lead at the near end of the trail's road: the target lies behind
        if let (Some(_), Some(edge)) = (self.lead.node(), self.trail.edge()) {
            if edge.contains(target) {
                self.reverse_course(net)?;
                return self.face(target, net);
            }
        }

        if let Some(here) = self.lead.node() {
            if net.is_adjacent(here, target) {
                return self.lead.set_orientation(target, net);
            }
        }

        if let Some(here) = self.trail.node() {
            if net.is_adjacent(here, target) {
                self.reverse_course(net)?;
                return self.lead.set_orientation(target, net);
            }
        }

        if let Some(edge) = self.lead.edge() {
            if edge.contains(target) {
                if !self.waypoints.is_empty() {
                    return self.lead.set_orientation(target, net);
                }
                self.reverse_course(net)?;
                return self.face(target, net);
            }
        }

        if let Some(edge) = self.trail.edge() {
            if edge.contains(target) {
                self.reverse_course(net)?;
                return self.face(target, net);
            }
        }

        Err(MarchError::InvalidAction(format!(
            "column cannot turn toward '{}'",
            net.name_of(target)
        )))
    }

    fn face(&mut self, target: NodeId, net: &RoadNetwork) -> Result<()> {
        if self.lead.orientation == Some(target) || self.lead.node() == Some(target) {
            Ok(())
        } else {
            self.lead.set_orientation(target, net)
        }
    }

    /// Nodes the column may detour toward from outside its lead's target
    pub fn valid_bypasses(&self, net: &RoadNetwork) -> Result<Vec<NodeId>> {
        let (Some(edge), Some(target)) = (self.lead.edge(), self.lead.orientation) else {
            return Err(MarchError::InvalidAction(
                "a column can only bypass from a road".into(),
            ));
        };
        if !self.lead.has_closed_distance(self.config.tolerance) {
            return Err(MarchError::InvalidAction(format!(
                "lead has not closed on '{}'",
                net.name_of(target)
            )));
        }
        let approach = edge.other(target);
        Ok(net
            .neighbors(target)
            .iter()
            .copied()
            .filter(|&n| Some(n) != approach)
            .collect())
    }

    /// Skirt past the lead's target and set out toward `node`
    pub fn bypass_to(&mut self, node: NodeId, net: &RoadNetwork) -> Result<()> {
        self.validate(net)?;
        if !self.valid_bypasses(net)?.contains(&node) {
            return Err(MarchError::InvalidAction(format!(
                "'{}' is not a valid bypass",
                net.name_of(node)
            )));
        }
        let Some(target) = self.lead.orientation else {
            return Err(MarchError::InvalidAction("lead has no target to bypass".into()));
        };
        let length = net.edge_length(target, node)?;
        self.waypoints.push_front(target);
        self.lead = PointPosition::on_edge(target, node, length, net)?;
        tracing::debug!(
            "column bypassing {} toward {}",
            net.name_of(target),
            net.name_of(node)
        );
        self.reform(net)
    }
}

impl std::fmt::Display for ColumnPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[lead {}", self.lead)?;
        for w in &self.waypoints {
            write!(f, " > {}", w)?;
        }
        write!(f, " > trail {}]", self.trail)
    }
}

/// The road between two consecutive anchors, `None` when they share a node
pub(crate) fn span(
    lead_side: &PointPosition,
    trail_side: &PointPosition,
    net: &RoadNetwork,
) -> Result<Option<Segment>> {
    let disconnected = || {
        MarchError::InvalidPosition(format!(
            "column is broken between {} and {}",
            lead_side.location(),
            trail_side.location()
        ))
    };

    match (lead_side.location(), trail_side.location()) {
        (Location::Node(x), Location::Node(y)) if x == y => Ok(None),
        (Location::Node(x), Location::Node(y)) => {
            if !net.is_adjacent(x, y) {
                return Err(disconnected());
            }
            let edge = EdgeKey::new(x, y);
            let length = net.edge_length(x, y)?;
            Ok(Some(Segment {
                edge,
                lead_side: edge.endpoint_offset(x, length).ok_or_else(disconnected)?,
                trail_side: edge.endpoint_offset(y, length).ok_or_else(disconnected)?,
            }))
        }
        (Location::Node(x), Location::Edge(edge)) => {
            let length = net.edge_length(edge.a(), edge.b())?;
            Ok(Some(Segment {
                edge,
                lead_side: edge.endpoint_offset(x, length).ok_or_else(disconnected)?,
                trail_side: trail_side.road_offset(net)?,
            }))
        }
        (Location::Edge(edge), Location::Node(y)) => {
            let length = net.edge_length(edge.a(), edge.b())?;
            Ok(Some(Segment {
                edge,
                lead_side: lead_side.road_offset(net)?,
                trail_side: edge.endpoint_offset(y, length).ok_or_else(disconnected)?,
            }))
        }
        (Location::Edge(first), Location::Edge(second)) => {
            if first != second {
                return Err(disconnected());
            }
            Ok(Some(Segment {
                edge: first,
                lead_side: lead_side.road_offset(net)?,
                trail_side: trail_side.road_offset(net)?,
            }))
        }
    }
}

/// Which way `point` must face to close on `other` across at most one road
///
/// `tie` breaks the case of two points at the same offset of one road.
fn heading_toward(
    point: &PointPosition,
    other: &PointPosition,
    tie: Option<NodeId>,
    tolerance: f64,
    net: &RoadNetwork,
) -> Result<Option<NodeId>> {
    match (point.location(), other.location()) {
        (Location::Edge(mine), Location::Edge(theirs)) if mine == theirs => {
            let here = point.road_offset(net)?;
            let there = other.road_offset(net)?;
            if there > here + tolerance {
                Ok(Some(mine.b()))
            } else if there < here - tolerance {
                Ok(Some(mine.a()))
            } else {
                Ok(tie)
            }
        }
        (Location::Edge(edge), Location::Node(n)) if edge.contains(n) => Ok(Some(n)),
        (Location::Node(n), Location::Edge(edge)) if edge.contains(n) => Ok(edge.other(n)),
        (Location::Node(n), Location::Node(m)) if n == m => Ok(None),
        (Location::Node(n), Location::Node(m)) if net.is_adjacent(n, m) => Ok(Some(m)),
        (here, there) => Err(MarchError::InvalidPosition(format!(
            "column ends at {} and {} are not connected",
            here, there
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A - B - C - D in a line (4, 2, 2 leagues), E hanging off C (1),
    /// F hanging off C (3)
    fn road() -> (RoadNetwork, Vec<NodeId>) {
        let mut net = RoadNetwork::new();
        let ids: Vec<NodeId> = ["A", "B", "C", "D", "E", "F"]
            .iter()
            .map(|n| net.add_crossroads(n).unwrap())
            .collect();
        net.add_road(ids[0], ids[1], 4.0).unwrap();
        net.add_road(ids[1], ids[2], 2.0).unwrap();
        net.add_road(ids[2], ids[3], 2.0).unwrap();
        net.add_road(ids[2], ids[4], 1.0).unwrap();
        net.add_road(ids[2], ids[5], 3.0).unwrap();
        (net, ids)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    /// Lead 0.5 short of C, trail 1 league out of A, spanning B
    fn spanning(net: &RoadNetwork, ids: &[NodeId]) -> ColumnPosition {
        ColumnPosition::new(
            PointPosition::on_edge(ids[1], ids[2], 0.5, net).unwrap(),
            PointPosition::on_edge(ids[0], ids[1], 3.0, net).unwrap(),
            [ids[1]],
            5.0,
            net,
        )
        .unwrap()
    }

    #[test]
    fn test_extent_through_waypoint() {
        let (net, ids) = road();
        let column = spanning(&net, &ids);
        assert_eq!(column.current_extent(&net).unwrap(), 4.5);
        assert_eq!(column.segments(&net).unwrap().len(), 2);
    }

    #[test]
    fn test_extent_on_one_road() {
        let (net, ids) = road();
        let column = ColumnPosition::new(
            PointPosition::on_edge(ids[0], ids[1], 1.0, &net).unwrap(),
            PointPosition::on_edge(ids[0], ids[1], 2.5, &net).unwrap(),
            [],
            2.0,
            &net,
        )
        .unwrap();
        assert_eq!(column.current_extent(&net).unwrap(), 1.5);
    }

    #[test]
    fn test_validate_rejects_overlong_column() {
        let (net, ids) = road();
        let result = ColumnPosition::new(
            PointPosition::on_edge(ids[1], ids[2], 0.5, &net).unwrap(),
            PointPosition::on_edge(ids[0], ids[1], 3.0, &net).unwrap(),
            [ids[1]],
            4.0,
            &net,
        );
        assert!(result.unwrap_err().is_invalid_position());
    }

    #[test]
    fn test_validate_rejects_broken_chain() {
        let (net, ids) = road();
        let result = ColumnPosition::new(
            PointPosition::on_edge(ids[2], ids[3], 0.5, &net).unwrap(),
            PointPosition::on_edge(ids[0], ids[1], 3.0, &net).unwrap(),
            [],
            20.0,
            &net,
        );
        assert!(result.unwrap_err().is_invalid_position());
    }

    #[test]
    fn test_motion_regimes() {
        let (net, ids) = road();
        let holding = ColumnPosition::at_node(ids[0], 1.0, &net).unwrap();
        assert_eq!(holding.motion(false, &net).unwrap(), Motion::Holding);

        let marching = spanning(&net, &ids);
        assert_eq!(marching.motion(false, &net).unwrap(), Motion::Marching);

        let entering = ColumnPosition::new(
            PointPosition::at_node(ids[1]),
            PointPosition::on_edge(ids[0], ids[1], 1.0, &net).unwrap(),
            [],
            2.0,
            &net,
        )
        .unwrap();
        assert_eq!(entering.motion(false, &net).unwrap(), Motion::Entering);

        let gathering = ColumnPosition::new(
            PointPosition::on_edge(ids[1], ids[2], 0.0, &net).unwrap(),
            PointPosition::on_edge(ids[1], ids[2], 1.0, &net).unwrap(),
            [],
            2.0,
            &net,
        )
        .unwrap();
        assert_eq!(gathering.motion(true, &net).unwrap(), Motion::Gathering);
        assert_eq!(gathering.motion(false, &net).unwrap(), Motion::Marching);

        let mut regrouping = spanning(&net, &ids);
        regrouping.set_orientation(ids[1], &net).unwrap();
        assert_eq!(regrouping.motion(false, &net).unwrap(), Motion::Regrouping);
    }

    #[test]
    fn test_reverse_course_twice_restores() {
        let (net, ids) = road();
        let original = spanning(&net, &ids);
        let mut column = original.clone();
        column.reverse_course(&net).unwrap();
        assert_eq!(column.lead().orientation(), Some(ids[0]));
        assert_eq!(column.lead().distance_to_destination(), Some(1.0));
        assert_eq!(column.trail().orientation(), Some(ids[1]));
        assert_eq!(column.trail().distance_to_destination(), Some(1.5));
        assert_eq!(column.current_extent(&net).unwrap(), 4.5);
        column.reverse_course(&net).unwrap();
        assert_eq!(column, original);
    }

    #[test]
    fn test_reverse_course_with_resting_ends() {
        let (net, ids) = road();
        let original = ColumnPosition::new(
            PointPosition::at_node(ids[2]),
            PointPosition::at_node(ids[0]),
            [ids[1]],
            6.0,
            &net,
        )
        .unwrap();
        let mut column = original.clone();
        column.reverse_course(&net).unwrap();
        assert_eq!(column.lead().node(), Some(ids[0]));
        assert_eq!(column.trail().node(), Some(ids[2]));
        column.reverse_course(&net).unwrap();
        assert_eq!(column, original);
    }

    #[test]
    fn test_reverse_course_drops_waypoint_under_lead() {
        let (net, ids) = road();
        let original = ColumnPosition::new(
            PointPosition::at_node(ids[2]),
            PointPosition::on_edge(ids[0], ids[1], 1.0, &net).unwrap(),
            [ids[2], ids[1]],
            4.0,
            &net,
        )
        .unwrap();
        assert_eq!(original.waypoints().iter().copied().collect::<Vec<_>>(), vec![ids[1]]);

        let mut column = original.clone();
        column.reverse_course(&net).unwrap();
        column.reverse_course(&net).unwrap();
        assert_eq!(column, original);
    }

    #[test]
    fn test_reverse_course_drops_departure_of_resting_lead() {
        let (net, ids) = road();
        let original = ColumnPosition::new(
            PointPosition::departing(ids[1], ids[2], &net).unwrap(),
            PointPosition::on_edge(ids[0], ids[1], 1.0, &net).unwrap(),
            [],
            2.0,
            &net,
        )
        .unwrap();
        let mut column = original.clone();
        column.reverse_course(&net).unwrap();
        assert_eq!(column.trail().node(), Some(ids[1]));
        assert_eq!(column.trail().orientation(), None);
        column.reverse_course(&net).unwrap();

        assert_eq!(column.lead().node(), Some(ids[1]));
        assert_eq!(column.lead().orientation(), None);
        assert_eq!(column.trail(), original.trail());
        assert_eq!(column.waypoints(), original.waypoints());

        column.set_orientation(ids[2], &net).unwrap();
        assert_eq!(column, original);
    }

    #[test]
    fn test_set_orientation_toward_trail_node_reverses() {
        let (net, ids) = road();
        let mut column = ColumnPosition::new(
            PointPosition::on_edge(ids[1], ids[2], 1.0, &net).unwrap(),
            PointPosition::at_node(ids[1]),
            [],
            2.0,
            &net,
        )
        .unwrap();
        column.set_orientation(ids[1], &net).unwrap();
        assert_eq!(column.lead().node(), Some(ids[1]));
        assert_eq!(column.trail().orientation(), Some(ids[1]));
    }

    #[test]
    fn test_set_orientation_along_trail_road_reverses() {
        let (net, ids) = road();
        let mut column = ColumnPosition::new(
            PointPosition::at_node(ids[1]),
            PointPosition::on_edge(ids[0], ids[1], 1.0, &net).unwrap(),
            [],
            1.0,
            &net,
        )
        .unwrap();
        column.set_orientation(ids[0], &net).unwrap();
        assert_eq!(column.lead().edge(), Some(EdgeKey::new(ids[0], ids[1])));
        assert_eq!(column.lead().orientation(), Some(ids[0]));
        assert_eq!(column.lead().distance_to_destination(), Some(3.0));
        assert_eq!(column.trail().node(), Some(ids[1]));

        // Marching off must not fold the lead back over its own trail
        column.advance(0.5, false, &net).unwrap();
        assert!(column.waypoints().is_empty());
        assert!(close(column.lead().distance_to_destination().unwrap(), 2.5));
        assert!(close(column.trail().distance_to_destination().unwrap(), 3.5));
        assert!(close(column.current_extent(&net).unwrap(), 1.0));
        assert!(!column.lead().is_same_location(column.trail(), &net).unwrap());
    }

    #[test]
    fn test_set_orientation_from_resting_lead() {
        let (net, ids) = road();
        let mut column = ColumnPosition::at_node(ids[2], 1.0, &net).unwrap();
        column.set_orientation(ids[4], &net).unwrap();
        assert_eq!(column.lead().orientation(), Some(ids[4]));
        // Already facing that way
        column.set_orientation(ids[4], &net).unwrap();
        assert_eq!(column.lead().orientation(), Some(ids[4]));
    }

    #[test]
    fn test_set_orientation_other_end_of_lead_road_pulls_inward() {
        let (net, ids) = road();
        let mut column = spanning(&net, &ids);
        column.set_orientation(ids[1], &net).unwrap();
        assert_eq!(column.lead().orientation(), Some(ids[1]));
        assert_eq!(column.lead().distance_to_destination(), Some(1.5));
        assert_eq!(column.trail().orientation(), Some(ids[1]));
    }

    #[test]
    fn test_set_orientation_other_end_without_waypoints_reverses() {
        let (net, ids) = road();
        let mut column = ColumnPosition::new(
            PointPosition::on_edge(ids[0], ids[1], 1.0, &net).unwrap(),
            PointPosition::on_edge(ids[0], ids[1], 2.0, &net).unwrap(),
            [],
            2.0,
            &net,
        )
        .unwrap();
        column.set_orientation(ids[0], &net).unwrap();
        assert_eq!(column.lead().orientation(), Some(ids[0]));
        assert_eq!(column.lead().distance_to_destination(), Some(2.0));
        assert_eq!(column.trail().orientation(), Some(ids[0]));
        assert_eq!(column.trail().distance_to_destination(), Some(3.0));
    }

    #[test]
    fn test_set_orientation_unreachable_target() {
        let (net, ids) = road();
        let mut column = spanning(&net, &ids);
        let before = column.clone();
        let err = column.set_orientation(ids[5], &net).unwrap_err();
        assert!(err.is_invalid_action());
        assert_eq!(column, before);
    }

    #[test]
    fn test_bypass_requires_closed_distance() {
        let (net, ids) = road();
        let mut column = spanning(&net, &ids);
        assert!(column.valid_bypasses(&net).unwrap_err().is_invalid_action());
        assert!(column.bypass_to(ids[3], &net).unwrap_err().is_invalid_action());
    }

    #[test]
    fn test_bypass_around_node() {
        let (net, ids) = road();
        let mut column = ColumnPosition::new(
            PointPosition::on_edge(ids[1], ids[2], 0.0, &net).unwrap(),
            PointPosition::on_edge(ids[1], ids[2], 1.5, &net).unwrap(),
            [],
            2.0,
            &net,
        )
        .unwrap();
        assert_eq!(
            column.valid_bypasses(&net).unwrap(),
            vec![ids[3], ids[4], ids[5]]
        );
        assert!(column.bypass_to(ids[0], &net).unwrap_err().is_invalid_action());

        column.bypass_to(ids[4], &net).unwrap();
        assert_eq!(column.lead().edge(), Some(EdgeKey::new(ids[2], ids[4])));
        assert_eq!(column.lead().distance_to_destination(), Some(1.0));
        assert_eq!(column.waypoints().front(), Some(&ids[2]));
        assert_eq!(column.current_extent(&net).unwrap(), 1.5);
    }

    #[test]
    fn test_occupied_nodes() {
        let (net, ids) = road();
        let column = ColumnPosition::new(
            PointPosition::at_node(ids[2]),
            PointPosition::at_node(ids[0]),
            [ids[1]],
            6.0,
            &net,
        )
        .unwrap();
        assert_eq!(column.occupied_nodes(), vec![ids[2], ids[1], ids[0]]);
    }
}
