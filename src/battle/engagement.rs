//! Engagement, charges and melee
//!
//! Units are engaged while their footprints sit within 1" of an enemy.
//! Charges close that gap along a terrain-aware path; melee is resolved
//! for the active army first and then for the defenders fighting back.

use rand::{Rng, RngCore};

use crate::battle::battle_map::Battlefield;
use crate::battle::constants::{
    AVERAGE_CHARGE_ROLL, CHARGE_STOP_GAP, ENGAGEMENT_RANGE, MAX_CHARGE_RANGE,
};
use crate::battle::log::{ActionKind, ActionLog, MovementDetail, PhaseLog};
use crate::battle::navmesh::NavMesh;
use crate::battle::oracle::CombatOracle;
use crate::battle::pathfinding::{find_path, get_max_travel_point, PathResult};
use crate::battle::ranged::{firing_groups, CombatOptions};
use crate::battle::resolution::{apply_damage, build_attack_context, resolve_weapon_damage};
use crate::battle::units::{ArmyState, UnitState};
use crate::data::weapons::Weapon;

/// An engaged pair of units
#[derive(Debug, Clone)]
pub struct Engagement {
    pub unit_id: String,
    pub enemy_id: String,
    pub gap: f32,
}

/// Are the two units within engagement range?
pub fn in_engagement(a: &UnitState, b: &UnitState) -> bool {
    a.is_on_board() && b.is_on_board() && a.gap_to(b) <= ENGAGEMENT_RANGE
}

/// Find all engaged pairs between two armies
pub fn find_all_engagements(army: &ArmyState, enemy: &ArmyState) -> Vec<Engagement> {
    let mut engagements = Vec::new();
    for unit in army.on_board_units() {
        for other in enemy.on_board_units() {
            if in_engagement(unit, other) {
                engagements.push(Engagement {
                    unit_id: unit.id.clone(),
                    enemy_id: other.id.clone(),
                    gap: unit.gap_to(other),
                });
            }
        }
    }
    engagements
}

/// Recompute every unit's `engaged` flag from positions
pub fn update_engagement(army_a: &mut ArmyState, army_b: &mut ArmyState) {
    let engagements = find_all_engagements(army_a, army_b);
    for unit in army_a.units.iter_mut() {
        unit.engaged = engagements.iter().any(|e| e.unit_id == unit.id);
    }
    for unit in army_b.units.iter_mut() {
        unit.engaged = engagements.iter().any(|e| e.enemy_id == unit.id);
    }
}

/// Charge distance: the fixed average or 2D6
pub fn charge_reach(random_charge: bool, rng: &mut dyn RngCore) -> f32 {
    if random_charge {
        (rng.gen_range(1..=6u32) + rng.gen_range(1..=6u32)) as f32
    } else {
        AVERAGE_CHARGE_ROLL
    }
}

/// Can this unit declare a charge?
pub fn can_charge(unit: &UnitState) -> bool {
    unit.is_on_board() && !unit.engaged && !unit.advanced && unit.role.role.is_melee_oriented()
}

/// Nearest reachable enemy and the path to it, measured edge to edge
struct ChargeTarget {
    index: usize,
    path: PathResult,
    distance: f32,
}

enum ChargeSearch {
    Found(ChargeTarget),
    /// Enemies in range but no path to any of them
    Blocked,
    NoneInRange,
}

fn find_charge_target(
    unit: &UnitState,
    enemy: &ArmyState,
    field: &Battlefield,
    nav_mesh: &NavMesh,
) -> ChargeSearch {
    let Some(from) = unit.position else {
        return ChargeSearch::NoneInRange;
    };

    let mut in_range = false;
    let mut best: Option<ChargeTarget> = None;
    for (index, target) in enemy.units.iter().enumerate() {
        let Some(to) = target.position.filter(|_| target.is_on_board()) else {
            continue;
        };
        if unit.gap_to(target) > MAX_CHARGE_RANGE + ENGAGEMENT_RANGE {
            continue;
        }
        in_range = true;

        let path = find_path(
            from,
            to,
            nav_mesh,
            &field.terrain,
            unit.is_infantry(),
            unit.is_large(),
            unit.base_radius,
        );
        if !path.found {
            continue;
        }
        let distance = path.total_cost() - unit.footprint_radius - target.footprint_radius;
        if best.as_ref().map_or(true, |b| distance < b.distance) {
            best = Some(ChargeTarget { index, path, distance });
        }
    }

    match best {
        Some(target) => ChargeSearch::Found(target),
        None if in_range => ChargeSearch::Blocked,
        None => ChargeSearch::NoneInRange,
    }
}

/// Resolve the charge phase for `army`
pub fn resolve_charges(
    army: &mut ArmyState,
    enemy: &mut ArmyState,
    field: &Battlefield,
    nav_mesh: &NavMesh,
    random_charge: bool,
    rng: &mut dyn RngCore,
    log: &mut PhaseLog,
) -> usize {
    let mut successful = 0;

    for index in 0..army.units.len() {
        if !can_charge(&army.units[index]) {
            continue;
        }
        let search = find_charge_target(&army.units[index], enemy, field, nav_mesh);
        let unit = &mut army.units[index];

        let target = match search {
            ChargeSearch::Found(target) => target,
            ChargeSearch::Blocked => {
                log.push_action(ActionLog::new(
                    unit.id.clone(),
                    unit.name.clone(),
                    ActionKind::ChargeBlocked,
                    format!("{} has no path to charge", unit.name),
                ));
                continue;
            }
            ChargeSearch::NoneInRange => continue,
        };

        let reach = charge_reach(random_charge, rng);
        let target_unit = &mut enemy.units[target.index];
        if reach < target.distance - ENGAGEMENT_RANGE {
            log.push_action(
                ActionLog::new(
                    unit.id.clone(),
                    unit.name.clone(),
                    ActionKind::ChargeFailed {
                        reach,
                        distance: target.distance,
                    },
                    format!(
                        "{} fails to charge {} ({:.1}\" of {:.1}\")",
                        unit.name,
                        target_unit.name,
                        reach,
                        target.distance
                    ),
                )
                .with_target(target_unit.id.clone()),
            );
            continue;
        }

        // Close to just inside engagement range, short of base contact
        let Some(from) = unit.position else {
            continue;
        };
        let travel = (target.distance - CHARGE_STOP_GAP).clamp(0.0, reach);
        let stop = get_max_travel_point(&target.path.path, travel, &field.terrain);
        unit.move_to(stop.point, field.width, field.height);
        unit.charged = true;
        unit.engaged = true;
        unit.remained_stationary = false;
        target_unit.engaged = true;
        successful += 1;

        log.push_movement(MovementDetail {
            unit_id: unit.id.clone(),
            from,
            to: stop.point,
            distance: stop.distance_traveled,
            advanced: false,
            path: (target.path.path.len() > 2).then(|| target.path.path.clone()),
            truncated: false,
        });
        log.push_action(
            ActionLog::new(
                unit.id.clone(),
                unit.name.clone(),
                ActionKind::Charge {
                    reach,
                    distance: target.distance,
                },
                format!("{} charges {}", unit.name, target_unit.name),
            )
            .with_target(target_unit.id.clone()),
        );
    }
    successful
}

fn melee_eligible(weapon: &Weapon, include_one_time_weapons: bool) -> bool {
    weapon.is_melee() && (include_one_time_weapons || !weapon.is_one_shot())
}

/// Summed expected melee damage of `attacker` against `target`
pub fn melee_output_against(
    attacker: &UnitState,
    target: &UnitState,
    field: &Battlefield,
    oracle: &dyn CombatOracle,
    include_one_time_weapons: bool,
) -> f32 {
    firing_groups(attacker)
        .iter()
        .map(|group| {
            group
                .iter()
                .map(|&i| &attacker.template.weapons[i])
                .filter(|w| melee_eligible(w, include_one_time_weapons))
                .map(|w| {
                    let ctx = build_attack_context(
                        attacker,
                        target,
                        w,
                        &field.terrain,
                        include_one_time_weapons,
                    );
                    oracle.expected_damage(w, &ctx)
                })
                .fold(0.0, f32::max)
        })
        .sum()
}

/// Every engaged unit of `attackers` fights its best engaged target
fn fight(
    attackers: &ArmyState,
    defenders: &mut ArmyState,
    field: &Battlefield,
    oracle: &dyn CombatOracle,
    options: CombatOptions,
    fight_back: bool,
    rng: &mut dyn RngCore,
    log: &mut PhaseLog,
) -> f32 {
    let mut total = 0.0;
    for attacker in attackers.units.iter().filter(|u| u.is_on_board() && u.engaged) {
        let mut best: Option<(usize, f32)> = None;
        for (index, target) in defenders.units.iter().enumerate() {
            if !in_engagement(attacker, target) {
                continue;
            }
            let expected = melee_output_against(
                attacker,
                target,
                field,
                oracle,
                options.include_one_time_weapons,
            );
            if best.map_or(true, |(_, d)| expected > d) {
                best = Some((index, expected));
            }
        }
        let Some((target_index, _)) = best else {
            continue;
        };

        for group in firing_groups(attacker) {
            let target = &defenders.units[target_index];
            if target.is_destroyed() {
                break;
            }
            // Linked melee profiles strike in their best mode only
            let Some(weapon) = group
                .iter()
                .map(|&i| &attacker.template.weapons[i])
                .filter(|w| melee_eligible(w, options.include_one_time_weapons))
                .map(|w| {
                    let ctx = build_attack_context(
                        attacker,
                        target,
                        w,
                        &field.terrain,
                        options.include_one_time_weapons,
                    );
                    (w, oracle.expected_damage(w, &ctx))
                })
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(w, _)| w)
            else {
                continue;
            };

            let ctx = build_attack_context(
                attacker,
                target,
                weapon,
                &field.terrain,
                options.include_one_time_weapons,
            );
            let damage = resolve_weapon_damage(oracle, weapon, &ctx, options.use_dice_rolls, rng);
            let target = &mut defenders.units[target_index];
            let target_id = target.id.clone();
            let target_name = target.name.clone();
            apply_damage(target, damage, log);
            total += damage;

            let kind = if fight_back { ActionKind::FightBack } else { ActionKind::Fight };
            log.push_action(
                ActionLog::new(
                    attacker.id.clone(),
                    attacker.name.clone(),
                    kind,
                    format!(
                        "{} strikes {} with {} for {:.2} damage",
                        attacker.name,
                        target_name,
                        weapon.name,
                        damage
                    ),
                )
                .with_target(target_id)
                .with_weapon(weapon.name.clone())
                .with_damage(damage),
            );
        }

        if defenders.is_destroyed() {
            break;
        }
    }
    total
}

/// Resolve the melee phase: the active army strikes, then engaged
/// survivors of the other army strike back
pub fn resolve_melee(
    active: &mut ArmyState,
    defender: &mut ArmyState,
    field: &Battlefield,
    oracle: &dyn CombatOracle,
    options: CombatOptions,
    rng: &mut dyn RngCore,
    log: &mut PhaseLog,
) -> f32 {
    let mut total = fight(active, defender, field, oracle, options, false, rng, log);
    if !defender.is_destroyed() {
        total += fight(defender, active, field, oracle, options, true, rng, log);
    }
    update_engagement(active, defender);
    total
}
