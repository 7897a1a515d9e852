//! Pre-battle deployment
//!
//! Reserves are split off first and capped. The remaining units are placed
//! alternately, the side with initiative first. Depth comes from the unit's
//! role band; lateral position from max-gap filling (attacker) or from
//! countering the strongest enemy units already placed (defender).

use crate::battle::battle_map::Battlefield;
use crate::battle::constants::{
    COUNTER_DEPLOY_THREATS, INFILTRATOR_ENEMY_ZONE_GAP, INFILTRATOR_FORWARD_DEPTH,
    MAX_RESERVE_FRACTION, MAX_STRATEGIC_RESERVE_POINTS_FRACTION, MODEL_SPACING,
};
use crate::battle::log::{ActionKind, ActionLog, PhaseLog};
use crate::battle::terrain::is_position_blocked_by_terrain;
use crate::battle::units::{ArmyState, ReserveType, UnitState};
use crate::core::config::SimulationConfig;
use crate::core::error::record_warning;
use crate::core::types::{ArmyTag, Point};

/// Offensive weight used to rank enemy units when counter-deploying
pub fn threat_level(unit: &UnitState) -> f32 {
    let strength = unit.remaining_models as f32 / unit.template.model_count.max(1) as f32;
    (unit.role.ranged_output + unit.role.melee_output) * strength
}

/// Lowest-points unit currently planned for reserves, optionally of one type
fn cheapest_reserve(
    army: &ArmyState,
    plan: &[Option<ReserveType>],
    only: Option<ReserveType>,
) -> Option<usize> {
    plan.iter()
        .enumerate()
        .filter(|(_, r)| match (r, only) {
            (Some(_), None) => true,
            (Some(kind), Some(wanted)) => *kind == wanted,
            _ => false,
        })
        .min_by_key(|(i, _)| army.units[*i].points())
        .map(|(i, _)| i)
}

/// Decide which units start in reserves, enforcing the caps
///
/// Strategic Reserves may hold at most a quarter of the army's points and
/// all reserves together at most half its units and half its points.
/// Violators are demoted to normal deployment, cheapest first.
pub fn assign_reserves(
    army: &mut ArmyState,
    config: &SimulationConfig,
    log: &mut PhaseLog,
    warnings: &mut Vec<String>,
) -> usize {
    let mut plan: Vec<Option<ReserveType>> = army
        .units
        .iter()
        .map(|unit| {
            if config.strategic_reserves.iter().any(|id| *id == unit.id) {
                Some(ReserveType::StrategicReserves)
            } else if config.use_deep_strike && unit.template.deep_strike {
                Some(ReserveType::DeepStrike)
            } else {
                None
            }
        })
        .collect();

    let total_points = army.total_points().max(1) as f32;
    let total_units = army.units.len() as f32;
    let points_of = |plan: &[Option<ReserveType>], only: Option<ReserveType>| -> f32 {
        plan.iter()
            .zip(army.units.iter())
            .filter(|(r, _)| r.is_some() && (only.is_none() || **r == only))
            .map(|(_, u)| u.points() as f32)
            .sum()
    };

    let strategic_cap = total_points * MAX_STRATEGIC_RESERVE_POINTS_FRACTION;
    while points_of(&plan, Some(ReserveType::StrategicReserves)) > strategic_cap {
        let Some(i) = cheapest_reserve(army, &plan, Some(ReserveType::StrategicReserves)) else {
            break;
        };
        plan[i] = None;
        record_warning(
            warnings,
            format!(
                "{}: Strategic Reserves exceed 25% of points, deploying normally",
                army.units[i].name
            ),
        );
    }

    loop {
        let count = plan.iter().filter(|r| r.is_some()).count() as f32;
        let points = points_of(&plan, None);
        if count <= total_units * MAX_RESERVE_FRACTION
            && points <= total_points * MAX_RESERVE_FRACTION
        {
            break;
        }
        let Some(i) = cheapest_reserve(army, &plan, None) else {
            break;
        };
        plan[i] = None;
        record_warning(
            warnings,
            format!("{}: reserves exceed half the army, deploying normally", army.units[i].name),
        );
    }

    let mut held = 0;
    for (unit, reserve) in army.units.iter_mut().zip(plan) {
        let Some(reserve_type) = reserve else {
            continue;
        };
        unit.send_to_reserves(reserve_type);
        held += 1;
        log.push_action(ActionLog::new(
            unit.id.clone(),
            unit.name.clone(),
            ActionKind::ReserveAssigned,
            format!("{} held in {:?}", unit.name, reserve_type),
        ));
    }
    held
}

/// Depth from the army's own table edge for this unit's centre
pub fn deployment_depth(unit: &UnitState, footprint: f32, field: &Battlefield) -> f32 {
    let zone = field.deploy_depth;
    let max_depth = (zone - footprint).max(footprint);
    let band = unit.role.role.deploy_depth_fraction() * zone;
    let regular = band.clamp(footprint.min(max_depth), max_depth);

    if unit.template.infiltrators {
        // No-man's-land, kept clear of the enemy zone
        let enemy_zone_edge = field.width - zone;
        let limit = enemy_zone_edge - INFILTRATOR_ENEMY_ZONE_GAP - footprint;
        let forward = (zone + INFILTRATOR_FORWARD_DEPTH).min(limit);
        return forward.max(regular);
    }
    regular
}

fn lateral_candidates(footprint: f32, height: f32) -> Vec<f32> {
    if footprint * 2.0 >= height {
        return vec![height / 2.0];
    }
    let mut ys = Vec::new();
    let mut y = footprint;
    while y <= height - footprint {
        ys.push(y);
        y += 1.0;
    }
    ys
}

/// Pick the lateral coordinate for a unit at depth `x`
fn choose_y(
    army: &ArmyState,
    index: usize,
    enemy: &ArmyState,
    attacker: bool,
    x: f32,
    footprint: f32,
    field: &Battlefield,
) -> f32 {
    let unit = &army.units[index];
    let friends: Vec<&UnitState> = army
        .units
        .iter()
        .enumerate()
        .filter(|(i, u)| *i != index && u.is_on_board())
        .map(|(_, u)| u)
        .collect();

    let overlaps = |p: Point| {
        friends.iter().any(|f| {
            f.position
                .is_some_and(|fp| fp.distance(p) < footprint + f.footprint_radius + MODEL_SPACING)
        })
    };
    let in_terrain = |p: Point| {
        is_position_blocked_by_terrain(
            p,
            footprint,
            &field.terrain,
            unit.is_infantry(),
            unit.is_large(),
        ).blocked
    };

    let mut threats: Vec<&UnitState> = enemy.on_board_units().collect();
    threats.sort_by(|a, b| threat_level(b).total_cmp(&threat_level(a)));
    threats.truncate(COUNTER_DEPLOY_THREATS);

    let counter_target = if attacker || threats.is_empty() {
        None
    } else {
        let weight: f32 = threats.iter().map(|t| threat_level(t) + 1e-3).sum();
        let y: f32 = threats
            .iter()
            .filter_map(|t| t.position.map(|p| p.y * (threat_level(t) + 1e-3)))
            .sum();
        Some(y / weight)
    };

    let score = |y: f32| -> f32 {
        match counter_target {
            Some(target) => -(y - target).abs(),
            None => {
                let p = Point::new(x, y);
                let nearest = friends
                    .iter()
                    .filter_map(|f| f.position.map(|fp| fp.distance(p)))
                    .fold(f32::INFINITY, f32::min);
                if nearest.is_finite() {
                    nearest
                } else {
                    -(y - field.height / 2.0).abs()
                }
            }
        }
    };

    let candidates = lateral_candidates(footprint, field.height);
    let pick = |allow_terrain: bool, allow_overlap: bool| -> Option<f32> {
        let mut best: Option<(f32, f32)> = None;
        for &y in &candidates {
            let p = Point::new(x, y);
            if (!allow_overlap && overlaps(p)) || (!allow_terrain && in_terrain(p)) {
                continue;
            }
            let s = score(y);
            if best.map_or(true, |(_, bs)| s > bs) {
                best = Some((y, s));
            }
        }
        best.map(|(y, _)| y)
    };

    pick(false, false)
        .or_else(|| pick(true, false))
        .or_else(|| pick(true, true))
        .unwrap_or(field.height / 2.0)
}

fn place_unit(
    army: &mut ArmyState,
    index: usize,
    enemy: &ArmyState,
    attacker: bool,
    field: &Battlefield,
    log: &mut PhaseLog,
) {
    let tag = army.tag;
    // Lay out once to learn the footprint
    let staging = Point::new(field.x_from_edge(tag, field.deploy_depth / 2.0), field.height / 2.0);
    army.units[index].place_at(staging, field.width, field.height);
    let footprint = army.units[index].footprint_radius;

    let depth = deployment_depth(&army.units[index], footprint, field);
    let x = field.x_from_edge(tag, depth);
    let y = choose_y(army, index, enemy, attacker, x, footprint, field);

    let unit = &mut army.units[index];
    unit.place_at(Point::new(x, y), field.width, field.height);
    unit.remained_stationary = true;
    log.push_action(ActionLog::new(
        unit.id.clone(),
        unit.name.clone(),
        ActionKind::Deploy,
        format!("{} deploys at ({:.1}, {:.1})", unit.name, x, y),
    ));
}

/// Placement order: heavy hitters first, infiltrators last
fn deployment_order(army: &ArmyState) -> Vec<usize> {
    let mut order: Vec<usize> =
        (0..army.units.len()).filter(|&i| !army.units[i].in_reserves).collect();
    order.sort_by_key(|&i| {
        let unit = &army.units[i];
        (unit.template.infiltrators, std::cmp::Reverse(unit.points()))
    });
    order
}

/// Run the whole deployment phase
pub fn deploy_armies(
    army_a: &mut ArmyState,
    army_b: &mut ArmyState,
    field: &Battlefield,
    config: &SimulationConfig,
    log: &mut PhaseLog,
    warnings: &mut Vec<String>,
) {
    let held_a = assign_reserves(army_a, config, log, warnings);
    let held_b = assign_reserves(army_b, config, log, warnings);

    let (attacker, defender) = match config.initiative {
        ArmyTag::A => (army_a, army_b),
        ArmyTag::B => (army_b, army_a),
    };
    let attacker_order = deployment_order(attacker);
    let defender_order = deployment_order(defender);

    for i in 0..attacker_order.len().max(defender_order.len()) {
        if let Some(&index) = attacker_order.get(i) {
            place_unit(attacker, index, defender, true, field, log);
        }
        if let Some(&index) = defender_order.get(i) {
            place_unit(defender, index, attacker, false, field, log);
        }
    }

    tracing::info!(
        placed = attacker_order.len() + defender_order.len(),
        reserves = held_a + held_b,
        "Deployment complete"
    );
}
