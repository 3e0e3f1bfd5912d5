//! Column movement and reform
//!
//! The lead does the moving; the trail is dragged after it by reform until
//! the column fits inside its permitted extent again.

use super::column::{ColumnPosition, Motion};
use super::events::DecisionPoint;
use super::network::RoadNetwork;
use super::point::{announce, Step};
use crate::core::error::{MarchError, Result};
use crate::core::types::NodeId;

impl ColumnPosition {
    /// Move the column `distance` leagues according to its current regime
    ///
    /// With `gather_at_gates` the lead halts on the threshold of a stronghold
    /// and the body masses behind it instead of marching in.
    pub fn advance(
        &mut self,
        distance: f64,
        gather_at_gates: bool,
        net: &RoadNetwork,
    ) -> Result<Option<DecisionPoint>> {
        if !(distance >= 0.0 && distance.is_finite()) {
            return Err(MarchError::InvalidAction(format!(
                "movement must be a finite non-negative distance, got {}",
                distance
            )));
        }
        self.validate(net)?;

        let motion = self.motion(gather_at_gates, net)?;
        tracing::debug!("column {:?} for {} leagues: {}", motion, distance, self);

        let event = match motion {
            Motion::Holding => self.hold(net)?,
            Motion::Marching => self.march_on(distance, gather_at_gates, net)?,
            Motion::Entering => self.close_on_lead(distance, net)?,
            Motion::Gathering => self.gather(distance, net)?,
            Motion::Regrouping => self.regroup(distance, gather_at_gates, net)?,
        };

        self.settle();
        self.validate(net)?;
        Ok(event)
    }

    fn hold(&self, net: &RoadNetwork) -> Result<Option<DecisionPoint>> {
        let node = self.resting_node()?;
        Ok(Some(DecisionPoint::occupied(net.node(node)?)))
    }

    fn march_on(
        &mut self,
        distance: f64,
        gather_at_gates: bool,
        net: &RoadNetwork,
    ) -> Result<Option<DecisionPoint>> {
        // A trail sharing the lead's node follows on its own during reform
        if let Some(here) = self.lead.node() {
            let trail_here = self.waypoints.is_empty() && self.trail.node() == Some(here);
            if !trail_here && self.waypoints.front() != Some(&here) {
                self.waypoints.push_front(here);
            }
        }

        let step = self.lead.step(distance, gather_at_gates, net)?;
        let event = announce(step, net)?;
        self.reform(net)?;
        Ok(event)
    }

    fn close_on_lead(&mut self, distance: f64, net: &RoadNetwork) -> Result<Option<DecisionPoint>> {
        let node = self.resting_node()?;
        let extent = self.current_extent(net)?;
        if distance >= extent - self.config.tolerance {
            self.collapse_onto(node);
            tracing::debug!("column closed up on {}", net.name_of(node));
            return Ok(Some(DecisionPoint::occupied(net.node(node)?)));
        }
        self.close_trail(distance, net)?;
        Ok(None)
    }

    fn gather(&mut self, distance: f64, net: &RoadNetwork) -> Result<Option<DecisionPoint>> {
        let (Some(approach), Some(target)) = (self.lead.edge(), self.lead.orientation) else {
            return Err(MarchError::InvalidPosition(format!(
                "gathering column has no lead on a road: {}",
                self
            )));
        };
        let extent = self.current_extent(net)?;
        if distance >= extent - self.config.tolerance {
            self.collapse_onto(target);
            tracing::debug!("column gathered before {}", net.name_of(target));
            return Ok(Some(DecisionPoint::gathered(net.node(target)?, approach)));
        }
        self.close_trail(distance, net)?;
        Ok(None)
    }

    fn regroup(
        &mut self,
        distance: f64,
        gather_at_gates: bool,
        net: &RoadNetwork,
    ) -> Result<Option<DecisionPoint>> {
        let Some(&first) = self.waypoints.front() else {
            return Err(MarchError::InvalidPosition(format!(
                "regrouping column has no waypoints: {}",
                self
            )));
        };
        let extent = self.current_extent(net)?;
        if distance >= extent - self.config.tolerance {
            self.collapse_onto(first);
            tracing::debug!("column regrouped on {}", net.name_of(first));
            return Ok(Some(DecisionPoint::occupied(net.node(first)?)));
        }

        match self.lead.step(distance, false, net)? {
            Step::EnRoute => Ok(None),
            Step::Arrived {
                node,
                remaining,
                announced,
            } => {
                if self.waypoints.front() == Some(&node) {
                    self.waypoints.pop_front();
                }
                self.settle();
                let arrival = if announced {
                    Some(DecisionPoint::arrival(net.node(node)?, remaining))
                } else {
                    None
                };
                let onward = if remaining > self.config.tolerance {
                    self.advance(remaining, gather_at_gates, net)?
                } else {
                    None
                };
                Ok(onward.or(arrival))
            }
            Step::AtGates { .. } => unreachable!("lead only halts at gates when asked to"),
        }
    }

    fn resting_node(&self) -> Result<NodeId> {
        self.lead.node().ok_or_else(|| {
            MarchError::InvalidPosition(format!("column lead is not on a node: {}", self))
        })
    }

    /// Pull the trail toward the lead until the column fits its extent
    ///
    /// Each consumed waypoint pushes the trail `reform_offset` past it.
    ///
    /// # Panics
    ///
    /// When a step fails to shorten the column, when the trail turns up on a
    /// node outside the chain, or after `max_reform_steps` iterations. All
    /// three mean the column state is corrupt.
    pub fn reform(&mut self, net: &RoadNetwork) -> Result<()> {
        let tolerance = self.config.tolerance;
        self.settle();

        let mut nudge = 0.0;
        let mut steps = 0;
        loop {
            let extent = self.current_extent(net)?;
            let over = extent - self.max_extent;
            if (over <= tolerance && nudge <= 0.0) || extent <= tolerance {
                break;
            }
            steps += 1;
            assert!(
                steps <= self.config.max_reform_steps,
                "reform did not converge after {} steps: {}",
                self.config.max_reform_steps,
                self
            );

            let distance = (over.max(0.0) + nudge).min(extent);
            nudge = 0.0;
            let Some(toward) = self.trail_inward(net)? else {
                break;
            };
            self.trail.set_orientation(toward, net)?;

            let chain = self.waypoints.len();
            match self.trail.step(distance, false, net)? {
                Step::EnRoute => {}
                Step::Arrived { node, .. } => {
                    if self.waypoints.back() == Some(&node) {
                        self.waypoints.pop_back();
                        tracing::debug!(
                            "trail passed {}, {} waypoints left",
                            net.name_of(node),
                            self.waypoints.len()
                        );
                        // A lead folding back onto this node needs no offset
                        let converging =
                            self.waypoints.is_empty() && self.lead.orientation == Some(node);
                        if !converging {
                            nudge = self.config.reform_offset;
                        }
                    } else if self.lead.node() == Some(node) {
                        break;
                    } else if self.lead.orientation == Some(node)
                        && self.lead.has_closed_distance(tolerance)
                    {
                        self.trail = self.lead.clone();
                        break;
                    } else {
                        panic!(
                            "trail reached {} outside the column {}",
                            net.name_of(node),
                            self
                        );
                    }
                }
                Step::AtGates { .. } => unreachable!("trail never halts at gates"),
            }

            let after = self.current_extent(net)?;
            assert!(
                after < extent || self.waypoints.len() < chain,
                "reform step did not shorten the column ({} -> {}): {}",
                extent,
                after,
                self
            );
        }

        self.settle();
        self.validate(net)
    }

    /// Walk the trail up to `distance` leagues along the chain toward the lead
    pub(crate) fn close_trail(&mut self, distance: f64, net: &RoadNetwork) -> Result<()> {
        let tolerance = self.config.tolerance;
        let mut left = distance;
        while left > tolerance {
            let Some(toward) = self.trail_inward(net)? else {
                break;
            };
            self.trail.set_orientation(toward, net)?;
            match self.trail.step(left, false, net)? {
                Step::EnRoute => break,
                Step::Arrived { node, remaining, .. } => {
                    left = remaining;
                    if self.waypoints.back() == Some(&node) {
                        self.waypoints.pop_back();
                        tracing::debug!("trail closed up past {}", net.name_of(node));
                    } else if self.lead.node() == Some(node) {
                        break;
                    } else if self.lead.orientation == Some(node)
                        && self.lead.has_closed_distance(tolerance)
                    {
                        self.trail = self.lead.clone();
                        break;
                    } else {
                        panic!(
                            "trail reached {} outside the column {}",
                            net.name_of(node),
                            self
                        );
                    }
                }
                Step::AtGates { .. } => unreachable!("trail never halts at gates"),
            }
        }
        self.settle();
        Ok(())
    }
}
