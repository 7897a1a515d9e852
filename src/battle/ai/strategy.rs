//! Strategy profiles: named weight vectors for the movement planner
//!
//! Four presets are built in. Custom profiles load from TOML files in
//! `data/strategy_profiles/{name}.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::error::{Result, SimError};

pub const BALANCED: &str = "balanced";
pub const AGGRESSIVE: &str = "aggressive";
pub const DEFENSIVE: &str = "defensive";
pub const OBJECTIVE_FOCUSED: &str = "objective-focused";

/// Planner weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyProfile {
    /// Name of this profile (set from filename when loaded)
    #[serde(default)]
    pub name: String,
    /// Weight on projected damage dealt from a destination
    pub damage_bias: f32,
    /// Weight on expected damage received at a destination
    pub threat_penalty: f32,
    /// Weight on objective control gained
    pub objective_value: f32,
    /// Weight on closing to the unit's preferred range
    pub aggression_bias: f32,
}

impl Default for StrategyProfile {
    fn default() -> Self {
        Self::balanced()
    }
}

impl StrategyProfile {
    pub fn balanced() -> Self {
        Self {
            name: BALANCED.to_string(),
            damage_bias: 1.0,
            threat_penalty: 0.6,
            objective_value: 1.0,
            aggression_bias: 0.5,
        }
    }

    pub fn aggressive() -> Self {
        Self {
            name: AGGRESSIVE.to_string(),
            damage_bias: 1.4,
            threat_penalty: 0.3,
            objective_value: 0.6,
            aggression_bias: 1.2,
        }
    }

    pub fn defensive() -> Self {
        Self {
            name: DEFENSIVE.to_string(),
            damage_bias: 0.8,
            threat_penalty: 1.2,
            objective_value: 0.8,
            aggression_bias: 0.1,
        }
    }

    pub fn objective_focused() -> Self {
        Self {
            name: OBJECTIVE_FOCUSED.to_string(),
            damage_bias: 0.7,
            threat_penalty: 0.6,
            objective_value: 2.0,
            aggression_bias: 0.4,
        }
    }

    /// Built-in profile by name
    pub fn preset(name: &str) -> Option<Self> {
        match name {
            BALANCED => Some(Self::balanced()),
            AGGRESSIVE => Some(Self::aggressive()),
            DEFENSIVE => Some(Self::defensive()),
            OBJECTIVE_FOCUSED | "objective" => Some(Self::objective_focused()),
            _ => None,
        }
    }

    pub fn from_toml_str(name: &str, contents: &str) -> Result<Self> {
        let mut profile: StrategyProfile = toml::from_str(contents)?;
        profile.name = name.to_string();
        Ok(profile)
    }
}

/// Get path to a profile file under `dir`
fn profile_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.toml", name))
}

/// Load a profile from `dir`, falling back to the built-in presets
pub fn load_strategy_profile_from(dir: &Path, name: &str) -> Result<StrategyProfile> {
    let path = profile_path(dir, name);
    if path.is_file() {
        let contents = fs::read_to_string(&path)?;
        return StrategyProfile::from_toml_str(name, &contents);
    }
    StrategyProfile::preset(name).ok_or_else(|| SimError::UnknownStrategy(name.to_string()))
}

/// Load a profile by name from `data/strategy_profiles`
pub fn load_strategy_profile(name: &str) -> Result<StrategyProfile> {
    load_strategy_profile_from(Path::new("data/strategy_profiles"), name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/strategy_profiles")
    }

    #[test]
    fn test_presets_resolve() {
        for name in [BALANCED, AGGRESSIVE, DEFENSIVE, OBJECTIVE_FOCUSED] {
            let profile = StrategyProfile::preset(name).expect("preset exists");
            assert_eq!(profile.name, name);
        }
        assert!(StrategyProfile::preset("reckless").is_none());
    }

    #[test]
    fn test_aggressive_leans_forward() {
        let aggressive = StrategyProfile::aggressive();
        let defensive = StrategyProfile::defensive();
        assert!(aggressive.aggression_bias > defensive.aggression_bias);
        assert!(aggressive.threat_penalty < defensive.threat_penalty);
    }

    #[test]
    fn test_load_profile_file() {
        let profile = load_strategy_profile_from(&data_dir(), AGGRESSIVE)
            .expect("Should load aggressive profile");
        assert_eq!(profile.name, AGGRESSIVE);
        assert!(profile.aggression_bias > 1.0);
    }

    #[test]
    fn test_unknown_profile_is_error() {
        let result = load_strategy_profile_from(&data_dir(), "no-such-profile");
        assert!(matches!(result, Err(SimError::UnknownStrategy(_))));
    }

    #[test]
    fn test_custom_profile_from_toml() {
        let profile = StrategyProfile::from_toml_str(
            "sniper",
            "damage_bias = 2.0\nthreat_penalty = 1.5\nobjective_value = 0.2\naggression_bias = 0.0\n",
        )
        .expect("valid profile");
        assert_eq!(profile.name, "sniper");
        assert_eq!(profile.damage_bias, 2.0);
    }
}
