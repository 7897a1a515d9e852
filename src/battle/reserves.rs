//! Reserves arrival
//!
//! From round 2 on, each army brings its reserves in before its command
//! phase. Every arriving model must be more than 9" from every enemy model
//! on the table. Units that find no legal spot stay in reserves.

use crate::battle::battle_map::Battlefield;
use crate::battle::constants::{
    DEEP_STRIKE_MIN_DISTANCE, DEEP_STRIKE_Y_OFFSETS, RESERVES_FIRST_ROUND,
    STRATEGIC_RESERVE_EDGE_DISTANCE,
};
use crate::battle::deployment::threat_level;
use crate::battle::log::{ActionKind, ActionLog, PhaseLog};
use crate::battle::terrain::is_position_blocked_by_terrain;
use crate::battle::units::{ArmyState, ReserveType, UnitState};
use crate::core::types::{Point, Round};

/// Is `arrival`, already laid out, at a legal spot?
fn legal_arrival(
    arrival: &UnitState,
    friends: &[&UnitState],
    enemy: &ArmyState,
    field: &Battlefield,
) -> bool {
    let clear_of_enemy = enemy
        .on_board_units()
        .all(|e| arrival.closest_model_gap(e) > DEEP_STRIKE_MIN_DISTANCE);
    if !clear_of_enemy {
        return false;
    }
    let in_terrain = arrival.alive_points().any(|p| {
        is_position_blocked_by_terrain(
            p,
            arrival.base_radius,
            &field.terrain,
            arrival.is_infantry(),
            arrival.is_large(),
        )
            .blocked
    });
    if in_terrain {
        return false;
    }
    friends.iter().all(|f| arrival.gap_to(f) > 0.0)
}

/// Deep Strike candidates: beside each enemy threat, then fallback bands
/// closer to the army's own edge.
fn deep_strike_candidates(unit: &UnitState, enemy: &ArmyState, field: &Battlefield) -> Vec<Point> {
    let tag = unit.army;
    let own_edge_x = field.x_from_edge(tag, 0.0);
    let mut targets: Vec<&UnitState> = enemy.on_board_units().collect();
    targets.sort_by(|a, b| threat_level(b).total_cmp(&threat_level(a)));

    let mut candidates = Vec::new();
    for target in targets {
        let Some(at) = target.position else {
            continue;
        };
        let toward_home = (own_edge_x - at.x).signum();
        let standoff =
            DEEP_STRIKE_MIN_DISTANCE + target.footprint_radius + unit.footprint_radius + 0.5;
        let anchor = Point::new(at.x + toward_home * standoff, at.y);
        for offset in DEEP_STRIKE_Y_OFFSETS {
            candidates.push(anchor + Point::new(0.0, offset));
        }
    }

    for fraction in [0.5, 0.4, 0.3, 0.2] {
        let x = field.x_from_edge(tag, field.width * fraction);
        for offset in DEEP_STRIKE_Y_OFFSETS {
            candidates.push(Point::new(x, field.height / 2.0 + offset));
        }
    }
    candidates
}

/// Strategic Reserves candidates along the home edge and the home half of
/// both long edges, nearest the enemy first.
fn strategic_reserve_candidates(
    unit: &UnitState,
    enemy: &ArmyState,
    field: &Battlefield,
) -> Vec<Point> {
    let tag = unit.army;
    let inset = unit.footprint_radius;
    let mut candidates = Vec::new();

    let mut y = inset;
    while y <= field.height - inset {
        candidates.push(Point::new(field.x_from_edge(tag, inset), y));
        y += 2.0;
    }
    let mut depth = inset;
    while depth <= field.width / 2.0 {
        let x = field.x_from_edge(tag, depth);
        candidates.push(Point::new(x, inset));
        candidates.push(Point::new(x, field.height - inset));
        depth += 2.0;
    }

    let goal = |p: &Point| -> f32 {
        let nearest = enemy
            .on_board_units()
            .filter_map(|e| e.position.map(|ep| ep.distance(*p)))
            .fold(f32::INFINITY, f32::min);
        if nearest.is_finite() {
            nearest
        } else {
            p.distance(field.center())
        }
    };
    candidates.sort_by(|a, b| goal(a).total_cmp(&goal(b)));
    candidates
}

fn within_edge_band(arrival: &UnitState, field: &Battlefield) -> bool {
    arrival
        .alive_points()
        .all(|p| field.distance_to_edge(p) <= STRATEGIC_RESERVE_EDGE_DISTANCE)
}

/// Find an arrival point for one reserve unit
pub fn find_arrival(
    unit: &UnitState,
    friends: &[&UnitState],
    enemy: &ArmyState,
    field: &Battlefield,
) -> Option<Point> {
    let mut arrival = unit.clone();
    // Lay out once for the footprint
    arrival.place_at(field.center(), field.width, field.height);

    let strategic = unit.reserve_type == Some(ReserveType::StrategicReserves);
    let candidates = if strategic {
        strategic_reserve_candidates(&arrival, enemy, field)
    } else {
        deep_strike_candidates(&arrival, enemy, field)
    };

    for candidate in candidates {
        if !field.contains(candidate) {
            continue;
        }
        arrival.place_at(candidate, field.width, field.height);
        if strategic && !within_edge_band(&arrival, field) {
            continue;
        }
        if legal_arrival(&arrival, friends, enemy, field) {
            return arrival.position;
        }
    }
    None
}

/// Bring in whatever reserves can legally arrive this round
pub fn arrive_reserves(
    army: &mut ArmyState,
    enemy: &ArmyState,
    field: &Battlefield,
    round: Round,
    log: &mut PhaseLog,
) -> usize {
    if round < RESERVES_FIRST_ROUND {
        return 0;
    }

    let mut arrived = 0;
    for index in 0..army.units.len() {
        if !army.units[index].in_reserves || army.units[index].is_destroyed() {
            continue;
        }

        let spot = {
            let friends: Vec<&UnitState> = army.units.iter().filter(|u| u.is_on_board()).collect();
            find_arrival(&army.units[index], &friends, enemy, field)
        };

        let unit = &mut army.units[index];
        match spot {
            Some(point) => {
                unit.place_at(point, field.width, field.height);
                unit.arrived_round = Some(round);
                unit.reset_turn_flags();
                arrived += 1;
                log.push_action(ActionLog::new(
                    unit.id.clone(),
                    unit.name.clone(),
                    ActionKind::ReserveArrived,
                    format!(
                        "{} arrives from reserves at ({:.1}, {:.1})",
                        unit.name,
                        point.x,
                        point.y
                    ),
                ));
            }
            None => {
                log.push_action(ActionLog::new(
                    unit.id.clone(),
                    unit.name.clone(),
                    ActionKind::ReserveDelayed,
                    format!("{} finds no legal arrival point", unit.name),
                ));
            }
        }
    }
    arrived
}
