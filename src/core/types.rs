//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// Identifier of a location on the road network
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Unique identifier for polities (the holders of strongholds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PolityId(pub u32);

/// Distance along roads, measured in leagues
pub type Leagues = f64;
