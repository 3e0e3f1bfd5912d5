//! Campaign layer - armies marching across the road network

pub mod army;
pub mod column;
pub mod deconflict;
pub mod events;
pub mod formation;
pub mod location;
pub mod march;
pub mod network;
pub mod point;

pub use army::{Army, ArmyId, ArmyOrder};
pub use column::{ColumnPosition, Motion, Segment};
pub use deconflict::Separation;
pub use events::DecisionPoint;
pub use formation::Formation;
pub use location::{EdgeKey, Location};
pub use network::{NodeInfo, Road, RoadNetwork, StrongholdType};
pub use point::PointPosition;
