//! Deconfliction - keeping two columns off the same stretch of road
//!
//! The predicates here are pure. `deconflict_from` is the only operation that
//! moves anything, and each resolution pass moves one of the two columns.

use serde::{Deserialize, Serialize};

use super::column::{span, ColumnPosition, Segment};
use super::location::{EdgeKey, Location};
use super::network::RoadNetwork;
use super::point::{PointPosition, Step};
use crate::core::error::{MarchError, Result};
use crate::core::types::NodeId;

/// Resolution passes before two columns are declared stuck together
const RESOLUTION_ROUNDS: usize = 4;

/// How far apart two columns are
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Separation {
    /// Meeting at a single point without sharing any road
    Touching,
    /// Sharing ground
    Overlapping,
    /// Clear of each other by this many leagues
    Apart(f64),
}

impl Separation {
    /// Numeric form: 0 when touching, -1 when overlapping
    pub fn leagues(&self) -> f64 {
        match self {
            Self::Touching => 0.0,
            Self::Overlapping => -1.0,
            Self::Apart(d) => *d,
        }
    }
}

impl ColumnPosition {
    /// Whether `point` lies on the ground this column covers
    pub fn contains_point(&self, point: &PointPosition, net: &RoadNetwork) -> Result<bool> {
        match point.location() {
            Location::Node(node) => Ok(self.waypoints.contains(&node)
                || self.lead.node() == Some(node)
                || self.trail.node() == Some(node)),
            Location::Edge(edge) => {
                let offset = point.road_offset(net)?;
                let tolerance = self.config.tolerance;
                Ok(self
                    .segments(net)?
                    .iter()
                    .any(|s| s.edge == edge && s.covers(offset, tolerance)))
            }
        }
    }

    /// Whether the two columns share any ground
    pub fn intersects_column(&self, other: &ColumnPosition, net: &RoadNetwork) -> Result<bool> {
        for point in [&other.lead, &other.trail] {
            if self.contains_point(point, net)? {
                return Ok(true);
            }
        }
        for point in [&self.lead, &self.trail] {
            if other.contains_point(point, net)? {
                return Ok(true);
            }
        }
        Ok(!shared_nodes(self, other).is_empty())
    }

    /// Whether the two columns meet at a single point without overlapping
    pub fn touching_column(&self, other: &ColumnPosition, net: &RoadNetwork) -> Result<bool> {
        let tolerance = self.config.tolerance;
        let overlap = overlap_length(&self.segments(net)?, &other.segments(net)?);
        if overlap > tolerance {
            return Ok(false);
        }
        let shared = shared_nodes(self, other);

        // A lead waiting on the threshold of a node the other column holds
        for (waiting, holder) in [(self, other), (other, self)] {
            if let (true, Some(target)) = (
                waiting.lead.has_closed_distance(tolerance),
                waiting.lead.orientation,
            ) {
                if shared.is_empty() && holder.occupied_nodes().contains(&target) {
                    return Ok(true);
                }
            }
        }

        if shared.len() > 1 {
            return Ok(false);
        }
        for mine in [&self.lead, &self.trail] {
            for theirs in [&other.lead, &other.trail] {
                if !mine.is_same_location_within(theirs, tolerance, net)? {
                    continue;
                }
                match shared.first() {
                    None => return Ok(true),
                    Some(&node) if mine.node() == Some(node) => return Ok(true),
                    Some(_) => {}
                }
            }
        }
        Ok(false)
    }

    /// Distance between the columns, or how they are in contact
    pub fn separation(&self, other: &ColumnPosition, net: &RoadNetwork) -> Result<Separation> {
        if self.touching_column(other, net)? {
            return Ok(Separation::Touching);
        }
        if self.intersects_column(other, net)? {
            return Ok(Separation::Overlapping);
        }
        let mut best = f64::INFINITY;
        for mine in self.anchors() {
            for theirs in other.anchors() {
                best = best.min(mine.distance_to(&theirs, net)?);
            }
        }
        Ok(Separation::Apart(best))
    }

    /// Whether both ends of this column lie within `container`
    ///
    /// The chain between them may stray outside.
    fn contained_in(&self, container: &ColumnPosition, net: &RoadNetwork) -> Result<bool> {
        Ok(container.contains_point(&self.lead, net)?
            && container.contains_point(&self.trail, net)?)
    }

    /// Leagues left before the lead reaches the node it faces
    fn distance_to_target(&self, net: &RoadNetwork) -> Result<f64> {
        match self.lead.orientation {
            Some(target) => self.lead.distance_to(&PointPosition::at_node(target), net),
            None => Ok(0.0),
        }
    }

    /// Move this column or `other` until the two no longer share ground
    ///
    /// Fails with `InvalidAction`, changing neither, when they do not
    /// intersect, and with `InvalidPosition` if they still overlap after
    /// `RESOLUTION_ROUNDS` attempts.
    ///
    /// # Panics
    ///
    /// When both columns stand on exactly the same ground and neither has a
    /// heading to withdraw along.
    pub fn deconflict_from(&mut self, other: &mut ColumnPosition, net: &RoadNetwork) -> Result<()> {
        self.validate(net)?;
        other.validate(net)?;
        if !self.intersects_column(other, net)? {
            return Err(MarchError::InvalidAction(format!(
                "columns {} and {} do not overlap",
                self, other
            )));
        }

        for round in 1..=RESOLUTION_ROUNDS {
            self.resolve_overlap(other, net)?;
            self.validate(net)?;
            other.validate(net)?;
            if !self.intersects_column(other, net)? {
                return Ok(());
            }
            tracing::debug!("columns still overlap after round {}: {} and {}", round, self, other);
        }
        Err(MarchError::InvalidPosition(format!(
            "columns {} and {} still overlap after {} rounds",
            self, other, RESOLUTION_ROUNDS
        )))
    }

    /// One pass of overlap resolution, moving whichever column is at fault
    fn resolve_overlap(&mut self, other: &mut ColumnPosition, net: &RoadNetwork) -> Result<()> {
        let self_in_other = self.contained_in(other, net)?;
        let other_in_self = other.contained_in(self, net)?;

        if self_in_other && other_in_self {
            let self_yields = match (self.lead.orientation, other.lead.orientation) {
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (Some(_), Some(_)) => {
                    self.distance_to_target(net)? <= other.distance_to_target(net)?
                }
                (None, None) => panic!(
                    "co-located columns {} and {} have no heading to withdraw along",
                    self, other
                ),
            };
            tracing::debug!(
                "co-located columns, {} withdraws",
                if self_yields { "this" } else { "the other" }
            );
            if self_yields {
                self.evacuate(other, net)?;
            } else {
                other.evacuate(self, net)?;
            }
        } else if self_in_other {
            tracing::debug!("column {} evacuates {}", self, other);
            self.evacuate(other, net)?;
        } else if other_in_self {
            tracing::debug!("column {} evacuates {}", other, self);
            other.evacuate(self, net)?;
        } else if other.contains_point(&self.lead, net)? {
            let depth = covered_prefix(
                &self.lead_path(net)?,
                &other.segments(net)?,
                self.config.tolerance,
            );
            self.retract_lead(depth, net)?;
        } else if other.contains_point(&self.trail, net)? {
            let depth = covered_prefix(
                &self.trail_path(net)?,
                &other.segments(net)?,
                self.config.tolerance,
            );
            self.retract_trail(depth, net)?;
        } else if self.contains_point(&other.lead, net)? {
            let depth = covered_prefix(
                &other.lead_path(net)?,
                &self.segments(net)?,
                other.config.tolerance,
            );
            other.retract_lead(depth, net)?;
        } else if self.contains_point(&other.trail, net)? {
            let depth = covered_prefix(
                &other.trail_path(net)?,
                &self.segments(net)?,
                other.config.tolerance,
            );
            other.retract_trail(depth, net)?;
        } else {
            // Only crossing at shared nodes: pull our trail past the one
            // nearest our lead
            let extent = self.current_extent(net)?;
            let mut nearest = extent;
            for node in shared_nodes(self, other) {
                if let Some(reach) = self.reach_of(node, net)? {
                    nearest = nearest.min(reach);
                }
            }
            self.retract_trail(extent - nearest, net)?;
        }
        Ok(())
    }

    /// Segments walked from the lead toward the trail
    fn lead_path(&self, net: &RoadNetwork) -> Result<Vec<(EdgeKey, f64, f64)>> {
        Ok(self
            .segments(net)?
            .into_iter()
            .map(|s| (s.edge, s.lead_side, s.trail_side))
            .collect())
    }

    /// Segments walked from the trail toward the lead
    fn trail_path(&self, net: &RoadNetwork) -> Result<Vec<(EdgeKey, f64, f64)>> {
        Ok(self
            .segments(net)?
            .into_iter()
            .rev()
            .map(|s| (s.edge, s.trail_side, s.lead_side))
            .collect())
    }

    /// Distance from the lead back along the chain to `node`
    fn reach_of(&self, node: NodeId, net: &RoadNetwork) -> Result<Option<f64>> {
        let anchors = self.anchors();
        let mut total = 0.0;
        for (i, anchor) in anchors.iter().enumerate() {
            if anchor.node() == Some(node) {
                return Ok(Some(total));
            }
            if let Some(next) = anchors.get(i + 1) {
                if let Some(segment) = span(anchor, next, net)? {
                    total += segment.length();
                }
            }
        }
        Ok(None)
    }

    /// Pull the lead back into its own column by `depth` plus clearance
    fn retract_lead(&mut self, depth: f64, net: &RoadNetwork) -> Result<()> {
        let tolerance = self.config.tolerance;
        let extent = self.current_extent(net)?;
        let distance = (depth + self.config.minimum_clearance).min(extent);
        tracing::debug!("retracting lead {} leagues", distance);

        if distance >= extent - tolerance {
            self.lead = self.trail.clone();
            if self.lead.node().is_some() {
                self.lead.orientation = None;
            }
            self.waypoints.clear();
            self.settle();
            return Ok(());
        }

        let mut left = distance;
        while left > tolerance {
            let Some(inward) = self.lead_inward(net)? else {
                break;
            };
            self.lead.set_orientation(inward, net)?;
            match self.lead.step(left, false, net)? {
                Step::EnRoute => break,
                Step::Arrived { node, remaining, .. } => {
                    left = remaining;
                    if self.waypoints.front() == Some(&node) {
                        self.waypoints.pop_front();
                    } else if self.trail.node() == Some(node) {
                        break;
                    } else {
                        panic!(
                            "lead fell back onto {} outside the column {}",
                            net.name_of(node),
                            self
                        );
                    }
                }
                Step::AtGates { .. } => unreachable!("lead retreats without halting"),
            }
        }

        // Face outward again
        if self.lead.edge().is_some() {
            self.lead.reverse_course(net)?;
        }
        self.settle();
        Ok(())
    }

    /// Pull the trail up into the column by `depth` plus clearance
    fn retract_trail(&mut self, depth: f64, net: &RoadNetwork) -> Result<()> {
        let tolerance = self.config.tolerance;
        let extent = self.current_extent(net)?;
        let distance = (depth + self.config.minimum_clearance).min(extent);
        tracing::debug!("retracting trail {} leagues", distance);

        if distance >= extent - tolerance {
            self.trail = self.lead.clone();
            self.waypoints.clear();
            self.settle();
            return Ok(());
        }
        self.close_trail(distance, net)
    }

    /// Fold onto the lead, turn about and march clear of `container`
    fn evacuate(&mut self, container: &ColumnPosition, net: &RoadNetwork) -> Result<()> {
        let clearance = self.config.minimum_clearance;
        let tolerance = self.config.tolerance;
        let segments = container.segments(net)?;

        let mut start = self.lead.clone();
        let (point, walked) = match start.location() {
            Location::Edge(_) => {
                start.reverse_course(net)?;
                clear_of(start, &segments, clearance, tolerance, net)?
            }
            Location::Node(node) => {
                let headings: Vec<NodeId> = match start.orientation() {
                    Some(toward) => vec![toward],
                    None => {
                        let along: Vec<NodeId> = segments
                            .iter()
                            .filter_map(|s| s.edge.other(node))
                            .collect();
                        if along.is_empty() {
                            net.neighbors(node).to_vec()
                        } else {
                            along
                        }
                    }
                };
                let mut best: Option<(PointPosition, f64)> = None;
                for toward in headings {
                    let candidate = clear_of(
                        PointPosition::departing(node, toward, net)?,
                        &segments,
                        clearance,
                        tolerance,
                        net,
                    )?;
                    if best.as_ref().map_or(true, |(_, d)| candidate.1 < *d) {
                        best = Some(candidate);
                    }
                }
                best.ok_or_else(|| {
                    MarchError::InvalidAction(format!(
                        "no road leads away from '{}'",
                        net.name_of(node)
                    ))
                })?
            }
        };

        tracing::debug!("column withdraws {} leagues to {}", walked + clearance, point);
        self.lead = point.clone();
        self.trail = point;
        self.waypoints.clear();
        self.settle();
        Ok(())
    }
}

/// Nodes both columns stand on
fn shared_nodes(a: &ColumnPosition, b: &ColumnPosition) -> Vec<NodeId> {
    let theirs = b.occupied_nodes();
    a.occupied_nodes()
        .into_iter()
        .filter(|n| theirs.contains(n))
        .collect()
}

/// Total length of road covered by both segment sets
fn overlap_length(a: &[Segment], b: &[Segment]) -> f64 {
    let mut total = 0.0;
    for x in a {
        for y in b.iter().filter(|y| y.edge == x.edge) {
            total += (x.high().min(y.high()) - x.low().max(y.low())).max(0.0);
        }
    }
    total
}

/// How far `from` can walk toward `to` staying inside `intervals`
fn covered_run(intervals: &[(f64, f64)], from: f64, to: f64, tolerance: f64) -> f64 {
    let forward = to >= from;
    let mut at = from;
    loop {
        let next = intervals
            .iter()
            .filter(|(low, high)| at >= low - tolerance && at <= high + tolerance)
            .map(|&(low, high)| if forward { high } else { low })
            .fold(at, |acc, x| if forward { acc.max(x) } else { acc.min(x) });
        if (next - at).abs() <= tolerance {
            break;
        }
        at = next;
    }
    if forward {
        at.min(to)
    } else {
        at.max(to)
    }
}

/// Length of the leading stretch of `path` that lies under `cover`
fn covered_prefix(path: &[(EdgeKey, f64, f64)], cover: &[Segment], tolerance: f64) -> f64 {
    let mut total = 0.0;
    for &(edge, from, to) in path {
        let intervals: Vec<(f64, f64)> = cover
            .iter()
            .filter(|s| s.edge == edge)
            .map(|s| (s.low(), s.high()))
            .collect();
        let reach = covered_run(&intervals, from, to, tolerance);
        total += (reach - from).abs();
        if (reach - to).abs() > tolerance {
            break;
        }
    }
    total
}

/// Walk `point` along its heading, following `cover` through nodes, until it
/// leaves the covered ground, then `clearance` further
///
/// Returns the final point and the distance walked before the clearance.
fn clear_of(
    mut point: PointPosition,
    cover: &[Segment],
    clearance: f64,
    tolerance: f64,
    net: &RoadNetwork,
) -> Result<(PointPosition, f64)> {
    let mut walked = 0.0;
    for _ in 0..cover.len() + 3 {
        let (edge, toward, remaining) = match point.location() {
            Location::Node(node) => {
                let toward = point.orientation().ok_or_else(|| {
                    MarchError::InvalidAction(format!(
                        "cannot withdraw from '{}' without a heading",
                        net.name_of(node)
                    ))
                })?;
                point = PointPosition::on_edge(node, toward, net.edge_length(node, toward)?, net)?;
                continue;
            }
            Location::Edge(edge) => match (point.orientation(), point.distance_to_destination()) {
                (Some(toward), Some(remaining)) => (edge, toward, remaining),
                _ => {
                    return Err(MarchError::InvalidPosition(format!(
                        "withdrawing point has no heading: {}",
                        point
                    )))
                }
            },
        };

        let offset = point.road_offset(net)?;
        let intervals: Vec<(f64, f64)> = cover
            .iter()
            .filter(|s| s.edge == edge)
            .map(|s| (s.low(), s.high()))
            .collect();
        let length = net.edge_length(edge.a(), edge.b())?;
        let destination = if toward == edge.b() { length } else { 0.0 };
        let reach = covered_run(&intervals, offset, destination, tolerance);
        let inside = intervals
            .iter()
            .any(|&(low, high)| offset >= low - tolerance && offset <= high + tolerance);
        if !inside {
            break;
        }

        let to_end = (reach - offset).abs();
        walked += to_end;
        if remaining - to_end > tolerance {
            point.distance_to_destination = Some(remaining - to_end);
            break;
        }

        // Covered all the way to the node: follow the chain onward if it
        // continues, otherwise step out on the first free road
        let onward = cover
            .iter()
            .find(|s| s.edge != edge && s.edge.contains(toward))
            .and_then(|s| s.edge.other(toward))
            .or_else(|| {
                net.neighbors(toward).iter().copied().find(|&n| {
                    let road = EdgeKey::new(toward, n);
                    road != edge && !cover.iter().any(|s| s.edge == road)
                })
            });
        match onward {
            Some(next) => {
                point = PointPosition::on_edge(toward, next, net.edge_length(toward, next)?, net)?;
                let road = EdgeKey::new(toward, next);
                if !cover.iter().any(|s| s.edge == road) {
                    break;
                }
            }
            None => {
                point.enter(toward);
                return Ok((point, walked));
            }
        }
    }

    point.step(clearance, false, net)?;
    Ok((point, walked))
}
