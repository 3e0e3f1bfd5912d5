//! Road network - the strategic map columns march across
//!
//! An undirected weighted graph of named nodes joined by roads measured in
//! leagues. Some nodes are strongholds (cities, towns, fortresses) with gates
//! and a holder; the rest are plain crossroads.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::path::Path;

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::location::EdgeKey;
use crate::core::error::{MarchError, Result};
use crate::core::types::{NodeId, PolityId};

/// Kinds of settlement that can stand on a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrongholdType {
    City,
    Town,
    Fortress,
}

impl std::fmt::Display for StrongholdType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::City => write!(f, "city"),
            Self::Town => write!(f, "town"),
            Self::Fortress => write!(f, "fortress"),
        }
    }
}

/// Attributes of a node on the network
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub id: NodeId,
    pub name: String,
    pub stronghold: Option<StrongholdType>,
    pub held_by: Option<PolityId>,
    pub gates_open: bool,
}

impl NodeInfo {
    pub fn is_stronghold(&self) -> bool {
        self.stronghold.is_some()
    }
}

/// A road between two nodes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Road {
    pub edge: EdgeKey,
    pub length: f64,
}

/// Node entry of a JSON map file
#[derive(Debug, Clone, Deserialize)]
struct NodeRecord {
    name: String,
    #[serde(default)]
    stronghold: Option<StrongholdType>,
    #[serde(default)]
    held_by: Option<u32>,
    #[serde(default)]
    gates_open: bool,
}

/// Road entry of a JSON map file
#[derive(Debug, Clone, Deserialize)]
struct RoadRecord {
    from: String,
    to: String,
    /// Leagues
    distance: f64,
}

#[derive(Debug, Clone, Deserialize)]
struct MapFile {
    nodes: Vec<NodeRecord>,
    roads: Vec<RoadRecord>,
}

/// The road network containing all nodes and roads
#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    nodes: Vec<NodeInfo>,
    by_name: AHashMap<String, NodeId>,
    roads: AHashMap<EdgeKey, Road>,
    adjacency: Vec<Vec<NodeId>>,
}

impl RoadNetwork {
    /// Create a new empty network
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a network from a JSON map document
    pub fn from_json(json: &str) -> Result<Self> {
        let file: MapFile = serde_json::from_str(json)?;
        let mut network = Self::new();

        for record in file.nodes {
            let id = match record.stronghold {
                Some(kind) => {
                    network.add_stronghold(&record.name, kind, record.held_by.map(PolityId))?
                }
                None => network.add_crossroads(&record.name)?,
            };
            network.nodes[id.0 as usize].gates_open = record.gates_open;
        }

        for record in file.roads {
            let from = network.require_name(&record.from)?;
            let to = network.require_name(&record.to)?;
            network.add_road(from, to, record.distance)?;
        }

        Ok(network)
    }

    /// Load a network from a JSON map file on disk
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let network = Self::from_json(&content)?;
        tracing::info!(
            "Loaded road network from {}: {} nodes, {} roads",
            path.display(),
            network.node_count(),
            network.road_count()
        );
        Ok(network)
    }

    /// Add a plain crossroads
    pub fn add_crossroads(&mut self, name: &str) -> Result<NodeId> {
        self.insert_node(name, None, None)
    }

    /// Add a stronghold held by `held_by`
    pub fn add_stronghold(
        &mut self,
        name: &str,
        kind: StrongholdType,
        held_by: Option<PolityId>,
    ) -> Result<NodeId> {
        self.insert_node(name, Some(kind), held_by)
    }

    fn insert_node(
        &mut self,
        name: &str,
        stronghold: Option<StrongholdType>,
        held_by: Option<PolityId>,
    ) -> Result<NodeId> {
        if self.by_name.contains_key(name) {
            return Err(MarchError::DuplicateNode(name.to_string()));
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeInfo {
            id,
            name: name.to_string(),
            stronghold,
            held_by,
            gates_open: false,
        });
        self.by_name.insert(name.to_string(), id);
        self.adjacency.push(Vec::new());
        Ok(id)
    }

    /// Connect two nodes with a road of `length` leagues
    pub fn add_road(&mut self, from: NodeId, to: NodeId, length: f64) -> Result<EdgeKey> {
        self.node(from)?;
        self.node(to)?;
        if from == to {
            return Err(MarchError::InvalidAction(format!(
                "road from {} to itself",
                self.name_of(from)
            )));
        }
        if !(length > 0.0 && length.is_finite()) {
            return Err(MarchError::InvalidAction(format!(
                "road {} - {} must have a positive length, got {}",
                self.name_of(from),
                self.name_of(to),
                length
            )));
        }

        let edge = EdgeKey::new(from, to);
        if self.roads.insert(edge, Road { edge, length }).is_none() {
            for (node, neighbor) in [(from, to), (to, from)] {
                let list = &mut self.adjacency[node.0 as usize];
                let slot = list.binary_search(&neighbor).unwrap_or_else(|i| i);
                list.insert(slot, neighbor);
            }
        }
        Ok(edge)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn road_count(&self) -> usize {
        self.roads.len()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &NodeInfo> {
        self.nodes.iter()
    }

    /// Attributes of a node
    pub fn node(&self, id: NodeId) -> Result<&NodeInfo> {
        self.nodes
            .get(id.0 as usize)
            .ok_or_else(|| MarchError::UnknownNode(id.to_string()))
    }

    pub fn node_by_name(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    fn require_name(&self, name: &str) -> Result<NodeId> {
        self.node_by_name(name)
            .ok_or_else(|| MarchError::UnknownNode(name.to_string()))
    }

    /// Display name of a node, falling back to its id
    pub fn name_of(&self, id: NodeId) -> String {
        self.node(id)
            .map(|n| n.name.clone())
            .unwrap_or_else(|_| id.to_string())
    }

    /// Neighbors of a node, in ascending id order
    pub fn neighbors(&self, id: NodeId) -> &[NodeId] {
        self.adjacency
            .get(id.0 as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_adjacent(&self, x: NodeId, y: NodeId) -> bool {
        self.roads.contains_key(&EdgeKey::new(x, y))
    }

    pub fn road(&self, edge: EdgeKey) -> Option<&Road> {
        self.roads.get(&edge)
    }

    /// Length in leagues of the road between two adjacent nodes
    pub fn edge_length(&self, x: NodeId, y: NodeId) -> Result<f64> {
        self.roads
            .get(&EdgeKey::new(x, y))
            .map(|r| r.length)
            .ok_or_else(|| MarchError::UnknownRoad(self.name_of(x), self.name_of(y)))
    }

    /// Hand a stronghold to a new holder
    pub fn transfer_control(&mut self, id: NodeId, held_by: Option<PolityId>) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id.0 as usize)
            .ok_or_else(|| MarchError::UnknownNode(id.to_string()))?;
        if node.stronghold.is_none() {
            return Err(MarchError::InvalidAction(format!(
                "'{}' is not a stronghold",
                node.name
            )));
        }
        node.held_by = held_by;
        Ok(())
    }

    /// Shortest path between two nodes by road length
    pub fn shortest_path(&self, start: NodeId, goal: NodeId) -> Result<Vec<NodeId>> {
        self.shortest_path_excluding(start, goal, |_, _, _| false)
    }

    /// Shortest path that ignores every road for which `exclude` returns true
    ///
    /// `exclude` receives the attributes of both endpoints, in travel order,
    /// and the road length.
    pub fn shortest_path_excluding<F>(
        &self,
        start: NodeId,
        goal: NodeId,
        exclude: F,
    ) -> Result<Vec<NodeId>>
    where
        F: Fn(&NodeInfo, &NodeInfo, f64) -> bool,
    {
        self.node(start)?;
        self.node(goal)?;

        if start == goal {
            return Ok(vec![start]);
        }

        let mut best: AHashMap<NodeId, f64> = AHashMap::new();
        let mut came_from: AHashMap<NodeId, NodeId> = AHashMap::new();
        let mut open = BinaryHeap::new();

        best.insert(start, 0.0);
        open.push(Reverse((OrderedFloat(0.0), start)));

        while let Some(Reverse((OrderedFloat(cost), current))) = open.pop() {
            if current == goal {
                return Ok(reconstruct_path(&came_from, goal));
            }
            if cost > *best.get(&current).unwrap_or(&f64::INFINITY) {
                continue;
            }

            let here = &self.nodes[current.0 as usize];
            for &next in self.neighbors(current) {
                let Some(road) = self.roads.get(&EdgeKey::new(current, next)) else {
                    continue;
                };
                let length = road.length;
                if exclude(here, &self.nodes[next.0 as usize], length) {
                    continue;
                }
                let tentative = cost + length;
                if tentative < *best.get(&next).unwrap_or(&f64::INFINITY) {
                    best.insert(next, tentative);
                    came_from.insert(next, current);
                    open.push(Reverse((OrderedFloat(tentative), next)));
                }
            }
        }

        Err(MarchError::NoPath {
            from: self.name_of(start),
            to: self.name_of(goal),
        })
    }

    /// Total leagues along a path of adjacent nodes
    pub fn path_length(&self, path: &[NodeId]) -> Result<f64> {
        path.windows(2)
            .map(|pair| self.edge_length(pair[0], pair[1]))
            .sum()
    }

    /// Length of the shortest road route between two nodes
    pub fn distance(&self, start: NodeId, goal: NodeId) -> Result<f64> {
        let path = self.shortest_path(start, goal)?;
        self.path_length(&path)
    }
}

fn reconstruct_path(came_from: &AHashMap<NodeId, NodeId>, mut current: NodeId) -> Vec<NodeId> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}
