//! Location - where on the road network something stands
//!
//! A location is either a node of the network or one of its roads. Roads are
//! undirected, so an edge is stored with its endpoints in canonical order and
//! `(a, b)` compares equal to `(b, a)`.

use serde::{Deserialize, Serialize};

use crate::core::types::NodeId;

/// An undirected road between two adjacent nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EdgeKey {
    low: NodeId,
    high: NodeId,
}

impl EdgeKey {
    pub fn new(x: NodeId, y: NodeId) -> Self {
        if x <= y {
            Self { low: x, high: y }
        } else {
            Self { low: y, high: x }
        }
    }

    /// The endpoint offsets are measured from
    pub fn a(&self) -> NodeId {
        self.low
    }

    pub fn b(&self) -> NodeId {
        self.high
    }

    pub fn endpoints(&self) -> (NodeId, NodeId) {
        (self.low, self.high)
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.low == node || self.high == node
    }

    /// The endpoint across the road from `node`, if `node` is an endpoint
    pub fn other(&self, node: NodeId) -> Option<NodeId> {
        if node == self.low {
            Some(self.high)
        } else if node == self.high {
            Some(self.low)
        } else {
            None
        }
    }

    /// Offset of an endpoint measured from `a()`
    pub fn endpoint_offset(&self, node: NodeId, length: f64) -> Option<f64> {
        if node == self.low {
            Some(0.0)
        } else if node == self.high {
            Some(length)
        } else {
            None
        }
    }
}

impl std::fmt::Display for EdgeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.low, self.high)
    }
}

/// A place on the road network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Location {
    Node(NodeId),
    Edge(EdgeKey),
}

impl Location {
    pub fn edge(x: NodeId, y: NodeId) -> Self {
        Self::Edge(EdgeKey::new(x, y))
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(n) => Some(*n),
            Self::Edge(_) => None,
        }
    }

    pub fn as_edge(&self) -> Option<EdgeKey> {
        match self {
            Self::Node(_) => None,
            Self::Edge(e) => Some(*e),
        }
    }

    /// Whether `node` is this location or one of its endpoints
    pub fn touches(&self, node: NodeId) -> bool {
        match self {
            Self::Node(n) => *n == node,
            Self::Edge(e) => e.contains(node),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Node(n) => write!(f, "{}", n),
            Self::Edge(e) => write!(f, "{}", e),
        }
    }
}
