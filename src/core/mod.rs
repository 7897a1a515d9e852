pub mod config;
pub mod error;
pub mod types;

pub use config::{MissionPreset, MissionScoring, SimulationConfig};
pub use types::{ArmyTag, Point, Round};
