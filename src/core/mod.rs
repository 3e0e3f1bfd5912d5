pub mod config;
pub mod error;
pub mod types;

pub use config::{config, set_config, MarchConfig};
pub use error::{MarchError, Result};
pub use types::{Leagues, NodeId, PolityId};
