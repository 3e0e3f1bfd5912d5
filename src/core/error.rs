use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarchError {
    /// A structural invariant of a point or column does not hold
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    /// The requested operation is not legal in the current state
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("No path from {from} to {to}")]
    NoPath { from: String, to: String },

    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("No road between {0} and {1}")]
    UnknownRoad(String, String),

    #[error("Duplicate node name: {0}")]
    DuplicateNode(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl MarchError {
    pub fn is_invalid_action(&self) -> bool {
        matches!(self, Self::InvalidAction(_))
    }

    pub fn is_invalid_position(&self) -> bool {
        matches!(self, Self::InvalidPosition(_))
    }
}

pub type Result<T> = std::result::Result<T, MarchError>;
