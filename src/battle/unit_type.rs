//! Unit roles and base sizes
//!
//! Both are supplied to the engine through traits at deployment time and are
//! read-only afterwards. The heuristic implementations here classify from
//! the unit's own stats and weapons.

use serde::{Deserialize, Serialize};

use crate::battle::constants::{AVERAGE_CHARGE_ROLL, DEFAULT_BASE_RADIUS, ENGAGEMENT_RANGE};
use crate::battle::oracle::{AttackContext, CombatOracle, SituationalModifiers};
use crate::data::army_list::UnitTemplate;
use crate::data::weapons::Weapon;

/// Battlefield role of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitRole {
    Artillery,  // Long range, slow, stays back
    Gunline,    // Ranged, holds mid-depth
    Balanced,   // Mixed output
    Skirmisher, // Fast ranged harassment
    Anvil,      // Durable melee, holds ground
    Melee,      // Close combat
}

impl UnitRole {
    /// Fraction of the deployment depth, measured from the table edge
    pub fn deploy_depth_fraction(&self) -> f32 {
        match self {
            UnitRole::Artillery => 0.2,
            UnitRole::Gunline => 0.35,
            UnitRole::Balanced | UnitRole::Skirmisher => 0.6,
            UnitRole::Anvil => 0.8,
            UnitRole::Melee => 0.9,
        }
    }

    /// Does this role declare charges?
    pub fn is_melee_oriented(&self) -> bool {
        matches!(self, UnitRole::Melee | UnitRole::Anvil)
    }
}

/// Role assignment with the distances the planner cares about
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoleInfo {
    pub role: UnitRole,
    /// Preferred distance to the enemy, in inches
    pub optimal_range: f32,
    /// Distance this unit can reach and fight in one turn
    pub charge_threat: f32,
    pub ranged_output: f32,
    pub melee_output: f32,
}

impl Default for RoleInfo {
    fn default() -> Self {
        Self {
            role: UnitRole::Balanced,
            optimal_range: 12.0,
            charge_threat: 6.0,
            ranged_output: 0.0,
            melee_output: 0.0,
        }
    }
}

pub trait RoleClassifier: Send + Sync {
    fn classify(&self, template: &UnitTemplate, oracle: &dyn CombatOracle) -> RoleInfo;
}

pub trait BaseSizeLookup: Send + Sync {
    /// Radius of one model's base, in inches
    fn base_radius(&self, template: &UnitTemplate) -> f32;
}

/// Reference target used to compare weapon output
fn reference_target() -> AttackContext {
    AttackContext {
        target_toughness: 4,
        target_save: 3,
        target_model_count: 5,
        target_wounds_per_model: 2,
        modifiers: SituationalModifiers {
            target_distance: 12.0,
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Full-strength expected output of a weapon list against the reference target
pub fn weapon_output(weapons: &[&Weapon], oracle: &dyn CombatOracle) -> f32 {
    let mut ctx = reference_target();
    weapons
        .iter()
        .map(|w| {
            ctx.firing_models = w.count.max(1);
            // Linked profiles only fire in their own mode
            let standard = oracle.expected_damage(w, &ctx);
            ctx.use_overcharge = true;
            let overcharge = oracle.expected_damage(w, &ctx);
            ctx.use_overcharge = false;
            standard.max(overcharge)
        })
        .sum()
}

/// Classifies from ranged vs melee output, speed and durability
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicRoleClassifier;

impl RoleClassifier for HeuristicRoleClassifier {
    fn classify(&self, template: &UnitTemplate, oracle: &dyn CombatOracle) -> RoleInfo {
        let ranged: Vec<&Weapon> = template.weapons.iter().filter(|w| w.is_ranged()).collect();
        let melee: Vec<&Weapon> = template.weapons.iter().filter(|w| w.is_melee()).collect();
        let ranged_output = weapon_output(&ranged, oracle);
        let melee_output = weapon_output(&melee, oracle);
        let max_range = ranged.iter().map(|w| w.range).fold(0.0, f32::max);
        let movement = template.stats.movement;
        let durable = template.stats.toughness >= 8 || template.max_wounds() >= 12;

        let role = if ranged_output <= f32::EPSILON && melee_output > 0.0 {
            if durable {
                UnitRole::Anvil
            } else {
                UnitRole::Melee
            }
        } else if melee_output > ranged_output * 1.5 {
            if durable && movement < 8.0 {
                UnitRole::Anvil
            } else {
                UnitRole::Melee
            }
        } else if ranged_output > melee_output * 2.0 {
            if max_range >= 36.0 && movement <= 5.0 {
                UnitRole::Artillery
            } else if movement >= 10.0 {
                UnitRole::Skirmisher
            } else {
                UnitRole::Gunline
            }
        } else {
            UnitRole::Balanced
        };

        let optimal_range = match role {
            UnitRole::Melee | UnitRole::Anvil => ENGAGEMENT_RANGE,
            _ if max_range > 0.0 => {
                // Rapid fire and melta want half range
                let wants_half =
                    ranged.iter().any(|w| w.rapid_fire().is_some() || w.melta().is_some());
                if wants_half {
                    max_range / 2.0
                } else {
                    max_range * 0.75
                }
            }
            _ => 12.0,
        };

        let charge_threat = if role.is_melee_oriented() || melee_output > 0.0 {
            movement + AVERAGE_CHARGE_ROLL
        } else {
            movement
        };

        RoleInfo {
            role,
            optimal_range,
            charge_threat,
            ranged_output,
            melee_output,
        }
    }
}

/// Base radius from keywords and name, in inches
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardBaseSizes;

const MM_PER_INCH: f32 = 25.4;

fn radius_from_mm(diameter_mm: f32) -> f32 {
    diameter_mm / 2.0 / MM_PER_INCH
}

impl BaseSizeLookup for StandardBaseSizes {
    fn base_radius(&self, template: &UnitTemplate) -> f32 {
        let name = template.name.to_ascii_lowercase();
        if template.has_keyword("VEHICLE") || template.has_keyword("FORTIFICATION") {
            radius_from_mm(120.0)
        } else if template.has_keyword("MONSTER") {
            radius_from_mm(100.0)
        } else if template.has_keyword("MOUNTED") || template.has_keyword("BEAST") {
            radius_from_mm(60.0)
        } else if name.contains("terminator")
            || name.contains("gravis")
            || name.contains("aggressor")
        {
            radius_from_mm(40.0)
        } else if template.is_character() {
            radius_from_mm(40.0)
        } else {
            DEFAULT_BASE_RADIUS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::oracle::StandardOracle;
    use crate::data::army_list::UnitStats;
    use crate::data::weapons::{DiceExpr, WeaponAbility, WeaponKind};

    fn weapon(kind: WeaponKind, range: f32, attacks: u32, strength: u32) -> Weapon {
        Weapon {
            id: String::new(),
            name: "w".into(),
            kind,
            range,
            attacks: DiceExpr::fixed(attacks),
            skill: 3,
            strength,
            ap: 1,
            damage: DiceExpr::fixed(1),
            abilities: Vec::new(),
            count: 5,
            models_with_weapon: 5,
            linked: None,
        }
    }

    fn template(weapons: Vec<Weapon>, movement: f32, keywords: &[&str]) -> UnitTemplate {
        UnitTemplate {
            id: "u".into(),
            name: "Unit".into(),
            category: "Infantry".into(),
            stats: UnitStats {
                movement,
                ..Default::default()
            },
            points: 100,
            model_count: 5,
            weapons,
            rules: Vec::new(),
            abilities: Vec::new(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            invulnerable_save: None,
            feel_no_pain: None,
            deep_strike: false,
            infiltrators: false,
            stealth: false,
            ignores_obscuring: false,
            is_infantry: true,
            is_large: false,
        }
    }

    #[test]
    fn test_pure_melee_unit() {
        let t = template(vec![weapon(WeaponKind::Melee, 0.0, 3, 5)], 6.0, &["INFANTRY"]);
        let info = HeuristicRoleClassifier.classify(&t, &StandardOracle);
        assert_eq!(info.role, UnitRole::Melee);
        assert_eq!(info.optimal_range, ENGAGEMENT_RANGE);
        assert_eq!(info.charge_threat, 6.0 + AVERAGE_CHARGE_ROLL);
    }

    #[test]
    fn test_gunline_unit() {
        let mut gun = weapon(WeaponKind::Ranged, 24.0, 2, 4);
        gun.abilities.push(WeaponAbility::RapidFire(DiceExpr::fixed(1)));
        let t = template(vec![gun, weapon(WeaponKind::Melee, 0.0, 1, 4)], 6.0, &["INFANTRY"]);
        let info = HeuristicRoleClassifier.classify(&t, &StandardOracle);
        assert_eq!(info.role, UnitRole::Gunline);
        assert_eq!(info.optimal_range, 12.0);
    }

    #[test]
    fn test_artillery_unit() {
        let t = template(vec![weapon(WeaponKind::Ranged, 48.0, 3, 8)], 5.0, &["VEHICLE"]);
        let info = HeuristicRoleClassifier.classify(&t, &StandardOracle);
        assert_eq!(info.role, UnitRole::Artillery);
        assert!(!info.role.is_melee_oriented());
    }

    #[test]
    fn test_base_sizes() {
        let infantry = template(Vec::new(), 6.0, &["INFANTRY"]);
        assert_eq!(StandardBaseSizes.base_radius(&infantry), DEFAULT_BASE_RADIUS);

        let tank = template(Vec::new(), 10.0, &["VEHICLE"]);
        assert!(StandardBaseSizes.base_radius(&tank) > 2.0);
    }

    #[test]
    fn test_deploy_bands_ordered() {
        assert!(
            UnitRole::Artillery.deploy_depth_fraction() < UnitRole::Gunline.deploy_depth_fraction()
        );
        assert!(UnitRole::Anvil.deploy_depth_fraction() < UnitRole::Melee.deploy_depth_fraction());
    }
}
