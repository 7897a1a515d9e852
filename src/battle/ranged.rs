//! Shooting phase
//!
//! Every eligible unit fires each eligible weapon once, at whichever
//! visible enemy in range the oracle expects it to hurt most. Linked
//! standard/overcharge profiles fire in one mode only.

use rand::RngCore;

use crate::battle::battle_map::Battlefield;
use crate::battle::constants::ENGAGEMENT_RANGE;
use crate::battle::log::{ActionKind, ActionLog, PhaseLog};
use crate::battle::oracle::CombatOracle;
use crate::battle::resolution::{apply_damage, build_attack_context, resolve_weapon_damage};
use crate::battle::terrain::{check_line_of_sight, TerrainFeature};
use crate::battle::units::{ArmyState, UnitState};
use crate::data::weapons::Weapon;

/// Knobs the shooting and melee phases read from the run configuration
#[derive(Debug, Clone, Copy)]
pub struct CombatOptions {
    pub include_one_time_weapons: bool,
    pub use_dice_rolls: bool,
}

/// Can the unit shoot at all this phase?
pub fn can_shoot(unit: &UnitState) -> bool {
    unit.is_on_board() && !unit.battle_shocked
}

/// Can the unit fire this particular weapon right now?
pub fn can_fire(unit: &UnitState, weapon: &Weapon, include_one_time_weapons: bool) -> bool {
    if !weapon.is_ranged() {
        return false;
    }
    if unit.engaged && !weapon.is_pistol() {
        return false;
    }
    if unit.advanced && !weapon.is_assault() {
        return false;
    }
    if weapon.is_one_shot() && !include_one_time_weapons {
        return false;
    }
    true
}

/// Does any alive model of `shooter` see any alive model of `target`?
pub fn unit_visible(shooter: &UnitState, target: &UnitState, terrain: &[TerrainFeature]) -> bool {
    let ignore_a = shooter.template.ignores_obscuring;
    let ignore_b = target.template.ignores_obscuring;
    if let (Some(a), Some(b)) = (shooter.position, target.position) {
        if check_line_of_sight(a, b, terrain, ignore_a, ignore_b).has_los {
            return true;
        }
    }
    shooter
        .alive_points()
        .any(|a| {
            target
                .alive_points()
                .any(|b| check_line_of_sight(a, b, terrain, ignore_a, ignore_b).has_los)
        })
}

/// Is `target` a legal target for `weapon` fired by `shooter`?
pub fn valid_target(
    shooter: &UnitState,
    target: &UnitState,
    weapon: &Weapon,
    terrain: &[TerrainFeature],
) -> bool {
    if !target.is_on_board() {
        return false;
    }
    let gap = shooter.gap_to(target);
    if gap > weapon.range {
        return false;
    }
    // Engaged shooters may only fire pistols at what they are fighting
    if shooter.engaged && gap > ENGAGEMENT_RANGE {
        return false;
    }
    unit_visible(shooter, target, terrain)
}

/// Highest expected-damage target for one weapon
pub fn best_target(
    shooter: &UnitState,
    weapon: &Weapon,
    enemy: &ArmyState,
    terrain: &[TerrainFeature],
    oracle: &dyn CombatOracle,
    include_one_time_weapons: bool,
) -> Option<(usize, f32)> {
    let mut best: Option<(usize, f32)> = None;
    for (index, target) in enemy.units.iter().enumerate() {
        if !valid_target(shooter, target, weapon, terrain) {
            continue;
        }
        let ctx = build_attack_context(shooter, target, weapon, terrain, include_one_time_weapons);
        let expected = oracle.expected_damage(weapon, &ctx);
        if expected > 0.0 && best.map_or(true, |(_, d)| expected > d) {
            best = Some((index, expected));
        }
    }
    best
}

/// Weapons grouped so linked profiles compete for a single shot
pub fn firing_groups(unit: &UnitState) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut linked_keys: Vec<String> = Vec::new();
    for (index, weapon) in unit.template.weapons.iter().enumerate() {
        match &weapon.linked {
            Some(link) => match linked_keys.iter().position(|k| *k == link.base_name) {
                Some(group) => groups[group].push(index),
                None => {
                    linked_keys.push(link.base_name.clone());
                    groups.push(vec![index]);
                }
            },
            None => {
                linked_keys.push(String::new());
                groups.push(vec![index]);
            }
        }
    }
    groups
}

/// Resolve the shooting phase for `army` against `enemy`
pub fn resolve_shooting(
    army: &ArmyState,
    enemy: &mut ArmyState,
    field: &Battlefield,
    oracle: &dyn CombatOracle,
    options: CombatOptions,
    rng: &mut dyn RngCore,
    log: &mut PhaseLog,
) -> f32 {
    let mut total = 0.0;

    for shooter in army.units.iter().filter(|u| can_shoot(u)) {
        for group in firing_groups(shooter) {
            // Choose the profile and target with the best projection
            let mut choice: Option<(usize, usize, f32)> = None;
            for &weapon_index in &group {
                let weapon = &shooter.template.weapons[weapon_index];
                if !can_fire(shooter, weapon, options.include_one_time_weapons) {
                    continue;
                }
                let Some((target, expected)) =
                    best_target(
                        shooter,
                        weapon,
                        enemy,
                        &field.terrain,
                        oracle,
                        options.include_one_time_weapons,
                    )
                else {
                    continue;
                };
                if choice.map_or(true, |(_, _, d)| expected > d) {
                    choice = Some((weapon_index, target, expected));
                }
            }
            let Some((weapon_index, target_index, _)) = choice else {
                continue;
            };

            let weapon = &shooter.template.weapons[weapon_index];
            let target = &mut enemy.units[target_index];
            let ctx = build_attack_context(
                shooter,
                target,
                weapon,
                &field.terrain,
                options.include_one_time_weapons,
            );
            let damage = resolve_weapon_damage(oracle, weapon, &ctx, options.use_dice_rolls, rng);
            let target_id = target.id.clone();
            let target_name = target.name.clone();
            apply_damage(target, damage, log);
            total += damage;

            log.push_action(
                ActionLog::new(
                    shooter.id.clone(),
                    shooter.name.clone(),
                    ActionKind::Shoot,
                    format!(
                        "{} fires {} at {} for {:.2} damage",
                        shooter.name,
                        weapon.name,
                        target_name,
                        damage
                    ),
                )
                .with_target(target_id)
                .with_weapon(weapon.name.clone())
                .with_damage(damage),
            );

            if enemy.is_destroyed() {
                return total;
            }
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::log::Phase;
    use crate::battle::oracle::StandardOracle;
    use crate::battle::units::test_support::{placed, rifle, test_army};
    use crate::core::types::{ArmyTag, Point};
    use crate::data::weapons::{FiringMode, LinkedProfile, WeaponAbility};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const EV: CombatOptions = CombatOptions {
        include_one_time_weapons: true,
        use_dice_rolls: false,
    };

    fn field() -> Battlefield {
        Battlefield::new(60.0, 44.0, 12.0, Vec::new())
    }

    fn shoot(a: &ArmyState, b: &mut ArmyState) -> (f32, PhaseLog) {
        let mut log = PhaseLog::new(1, Some(ArmyTag::A), Phase::Shooting);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let total = resolve_shooting(a, b, &field(), &StandardOracle, EV, &mut rng, &mut log);
        (total, log)
    }

    #[test]
    fn test_shoots_target_in_range() {
        let a = test_army(ArmyTag::A, vec![placed("a1", ArmyTag::A, 5, Point::new(10.0, 22.0))]);
        let mut b = test_army(
            ArmyTag::B,
            vec![placed("b1", ArmyTag::B, 5, Point::new(30.0, 22.0))],
        );
        let (total, log) = shoot(&a, &mut b);
        assert!(total > 0.0);
        assert_eq!(log.actions.len(), 1);
        assert_eq!(log.actions[0].weapon.as_deref(), Some("Rifle"));
        assert!(b.units[0].damage_taken > 0.0);
    }

    #[test]
    fn test_out_of_range_holds_fire() {
        let a = test_army(ArmyTag::A, vec![placed("a1", ArmyTag::A, 5, Point::new(5.0, 22.0))]);
        let mut b = test_army(
            ArmyTag::B,
            vec![placed("b1", ArmyTag::B, 5, Point::new(55.0, 22.0))],
        );
        let (total, log) = shoot(&a, &mut b);
        assert_eq!(total, 0.0);
        assert!(log.actions.is_empty());
    }

    #[test]
    fn test_shocked_units_do_not_shoot() {
        let mut shooter = placed("a1", ArmyTag::A, 5, Point::new(10.0, 22.0));
        shooter.battle_shocked = true;
        let a = test_army(ArmyTag::A, vec![shooter]);
        let mut b = test_army(
            ArmyTag::B,
            vec![placed("b1", ArmyTag::B, 5, Point::new(30.0, 22.0))],
        );
        assert_eq!(shoot(&a, &mut b).0, 0.0);
    }

    #[test]
    fn test_weapon_eligibility() {
        let mut unit = placed("a1", ArmyTag::A, 5, Point::new(10.0, 22.0));
        let mut gun = rifle();
        assert!(can_fire(&unit, &gun, true));

        unit.advanced = true;
        assert!(!can_fire(&unit, &gun, true));
        gun.abilities.push(WeaponAbility::Assault);
        assert!(can_fire(&unit, &gun, true));

        unit.advanced = false;
        unit.engaged = true;
        assert!(!can_fire(&unit, &gun, true));
        gun.abilities.push(WeaponAbility::Pistol);
        assert!(can_fire(&unit, &gun, true));

        let mut missile = rifle();
        missile.abilities.push(WeaponAbility::OneShot);
        unit.engaged = false;
        assert!(!can_fire(&unit, &missile, false));
        assert!(can_fire(&unit, &missile, true));
    }

    #[test]
    fn test_linked_profiles_fire_once() {
        let mut standard = rifle();
        standard.name = "Plasma gun".into();
        standard.linked = Some(LinkedProfile {
            base_name: "Plasma gun".into(),
            mode: FiringMode::Standard,
        });
        let mut overcharge = standard.clone();
        overcharge.name = "Plasma gun (overcharge)".into();
        overcharge.strength = 8;
        overcharge.damage = crate::data::weapons::DiceExpr::fixed(2);
        overcharge.linked = Some(LinkedProfile {
            base_name: "Plasma gun".into(),
            mode: FiringMode::Overcharge,
        });

        let mut shooter = placed("a1", ArmyTag::A, 5, Point::new(10.0, 22.0));
        shooter.template.weapons = vec![standard, overcharge];
        let a = test_army(ArmyTag::A, vec![shooter]);
        let mut b = test_army(
            ArmyTag::B,
            vec![placed("b1", ArmyTag::B, 5, Point::new(30.0, 22.0))],
        );
        let (_, log) = shoot(&a, &mut b);

        assert_eq!(log.actions.len(), 1);
        assert_eq!(log.actions[0].weapon.as_deref(), Some("Plasma gun (overcharge)"));
    }
}
