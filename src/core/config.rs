//! Simulation configuration
//!
//! Every recognized option has a default so a partial TOML file (or none at
//! all) produces a runnable configuration.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::battle::constants::{DEFAULT_BOARD_HEIGHT, DEFAULT_BOARD_WIDTH};
use crate::battle::terrain::{TerrainFeature, TerrainLayout};
use crate::core::error::{Result, SimError};
use crate::core::types::ArmyTag;

/// Named mission scoring presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MissionPreset {
    #[default]
    #[serde(rename = "matched-play")]
    MatchedPlay,
    #[serde(rename = "hold-2")]
    HoldTwo,
    #[serde(rename = "high-stakes")]
    HighStakes,
}

/// Victory point parameters for a mission
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MissionScoring {
    pub vp_per_objective: u32,
    pub primary_objective_bonus: u32,
    /// Consecutive control updates required before an objective scores (0 = immediate)
    pub hold_timer_required: u32,
    /// Score at the end of each round; otherwise the active army scores in its command phase
    pub end_of_round_score: bool,
}

impl MissionPreset {
    pub fn scoring(&self) -> MissionScoring {
        match self {
            MissionPreset::MatchedPlay => MissionScoring {
                vp_per_objective: 5,
                primary_objective_bonus: 0,
                hold_timer_required: 0,
                end_of_round_score: true,
            },
            MissionPreset::HoldTwo => MissionScoring {
                vp_per_objective: 5,
                primary_objective_bonus: 5,
                hold_timer_required: 2,
                end_of_round_score: true,
            },
            MissionPreset::HighStakes => MissionScoring {
                vp_per_objective: 10,
                primary_objective_bonus: 10,
                hold_timer_required: 1,
                end_of_round_score: true,
            },
        }
    }
}

impl FromStr for MissionPreset {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "matched-play" | "matched" => Ok(MissionPreset::MatchedPlay),
            "hold-2" | "hold2" => Ok(MissionPreset::HoldTwo),
            "high-stakes" => Ok(MissionPreset::HighStakes),
            other => Err(SimError::UnknownMission(other.to_string())),
        }
    }
}

/// Options recognized by a simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Gap between the two deployment zones, in inches
    pub starting_distance: f32,
    pub include_one_time_weapons: bool,
    /// Side that deploys first and takes the first turn of each round
    pub initiative: ArmyTag,
    pub max_rounds: u32,
    pub allow_advance: bool,
    /// Roll 2D6 for charges instead of the fixed average of 7
    pub random_charge: bool,
    pub use_dice_rolls: bool,
    pub strategy_profile: String,
    pub use_beam_search: bool,
    pub beam_width: usize,
    pub use_adaptive_strategy: bool,
    pub mission_scoring: MissionPreset,
    /// Explicit terrain; takes precedence over `terrain_layout`
    pub terrain: Option<Vec<TerrainFeature>>,
    pub terrain_layout: Option<String>,
    pub seed: u64,
    pub board_width: f32,
    pub board_height: f32,
    /// Unit ids either army wants held in Strategic Reserves
    pub strategic_reserves: Vec<String>,
    /// Hold Deep Strike units off the table until round 2
    pub use_deep_strike: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            starting_distance: 24.0,
            include_one_time_weapons: true,
            initiative: ArmyTag::A,
            max_rounds: 5,
            allow_advance: true,
            random_charge: false,
            use_dice_rolls: false,
            strategy_profile: "balanced".to_string(),
            use_beam_search: false,
            beam_width: 3,
            use_adaptive_strategy: false,
            mission_scoring: MissionPreset::MatchedPlay,
            terrain: None,
            terrain_layout: None,
            seed: 42,
            board_width: DEFAULT_BOARD_WIDTH,
            board_height: DEFAULT_BOARD_HEIGHT,
            strategic_reserves: Vec::new(),
            use_deep_strike: true,
        }
    }
}

impl SimulationConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_rounds == 0 {
            return Err(SimError::InvalidConfig("max_rounds must be at least 1".into()));
        }
        if self.use_beam_search && self.beam_width == 0 {
            return Err(SimError::InvalidConfig("beam_width must be at least 1".into()));
        }
        if self.board_width <= 0.0 || self.board_height <= 0.0 {
            return Err(SimError::InvalidConfig("board dimensions must be positive".into()));
        }
        if self.starting_distance < 0.0 || self.starting_distance >= self.board_width {
            return Err(SimError::InvalidConfig(format!(
                "starting_distance {} does not fit a {}\" board",
                self.starting_distance, self.board_width
            )));
        }
        Ok(())
    }

    /// Depth of each deployment zone, derived from the starting distance
    pub fn deploy_depth(&self) -> f32 {
        let depth = (self.board_width - self.starting_distance) / 2.0;
        depth.clamp(3.0, (self.board_width / 2.0 - 1.0).max(3.0))
    }

    pub fn scoring(&self) -> MissionScoring {
        self.mission_scoring.scoring()
    }

    /// Terrain for this run: explicit features, a named layout, or an open table
    pub fn resolved_terrain(&self) -> Result<Vec<TerrainFeature>> {
        if let Some(features) = &self.terrain {
            return Ok(features.clone());
        }
        match &self.terrain_layout {
            Some(name) => {
                let layout = TerrainLayout::from_str(name)?;
                Ok(layout.features(self.board_width, self.board_height))
            }
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SimulationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!((config.board_width, config.board_height), (60.0, 44.0));
        assert_eq!(config.deploy_depth(), 18.0);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = SimulationConfig::from_toml_str(
            r#"
            max_rounds = 3
            mission_scoring = "hold-2"
            initiative = "B"
            "#,
        )
        .expect("valid toml");

        assert_eq!(config.max_rounds, 3);
        assert_eq!(config.mission_scoring, MissionPreset::HoldTwo);
        assert_eq!(config.initiative, ArmyTag::B);
        assert_eq!(config.strategy_profile, "balanced");
    }

    #[test]
    fn test_zero_rounds_rejected() {
        let result = SimulationConfig::from_toml_str("max_rounds = 0");
        assert!(matches!(result, Err(SimError::InvalidConfig(_))));
    }

    #[test]
    fn test_mission_presets() {
        let hold = MissionPreset::HoldTwo.scoring();
        assert_eq!(hold.hold_timer_required, 2);
        assert_eq!(hold.primary_objective_bonus, 5);

        let matched = MissionPreset::MatchedPlay.scoring();
        assert_eq!(matched.hold_timer_required, 0);

        assert_eq!("high-stakes".parse::<MissionPreset>().unwrap(), MissionPreset::HighStakes);
        assert!("nonsense".parse::<MissionPreset>().is_err());
    }

    #[test]
    fn test_deploy_depth_clamped() {
        let config = SimulationConfig {
            starting_distance: 58.0,
            ..Default::default()
        };
        assert_eq!(config.deploy_depth(), 3.0);
    }
}
