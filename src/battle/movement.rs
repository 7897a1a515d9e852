//! Movement phase execution
//!
//! Applies the planner's destinations, then reconciles the table: units
//! pushed apart where footprints overlap, and units ejected from terrain
//! they cannot occupy.

use crate::battle::ai::planner::{MovementPlan, PlannedMove};
use crate::battle::battle_map::Battlefield;
use crate::battle::constants::{
    ADVANCE_BONUS, COLLISION_EPSILON, COLLISION_ITERATIONS, PATH_EPSILON, TERRAIN_EJECT_BUFFER,
};
use crate::battle::geometry::perpendicular;
use crate::battle::log::{ActionKind, ActionLog, MovementDetail, PhaseLog};
use crate::battle::pathfinding::{get_max_travel_point, path_length};
use crate::battle::terrain::{is_movement_blocked, is_position_blocked_by_terrain};
use crate::battle::units::{ArmyState, UnitState};
use crate::core::types::Point;

/// Where a single move ended up
#[derive(Debug, Clone)]
pub struct MoveOutcome {
    pub destination: Point,
    pub distance: f32,
    pub truncated: bool,
    pub path: Option<Vec<Point>>,
}

/// Total movement allowance, advancing included
pub fn move_allowance(unit: &UnitState, advance: bool) -> f32 {
    unit.movement() + if advance { ADVANCE_BONUS } else { 0.0 }
}

/// Walk `waypoints` from the start, stopping before the first blocked segment
///
/// Each segment is swept with the unit's base radius.
fn walk_segments(unit: &UnitState, waypoints: &[Point], field: &Battlefield) -> (Vec<Point>, bool) {
    let mut walked = Vec::with_capacity(waypoints.len());
    let Some(&first) = waypoints.first() else {
        return (walked, false);
    };
    walked.push(first);
    for segment in waypoints.windows(2) {
        let check = is_movement_blocked(
            segment[0],
            segment[1],
            &field.terrain,
            unit.is_infantry(),
            unit.is_large(),
            unit.base_radius,
        );
        if check.blocked {
            tracing::debug!(
                unit = %unit.name,
                blocked_by = ?check.blocked_by,
                "Move stopped at terrain"
            );
            return (walked, true);
        }
        walked.push(segment[1]);
    }
    (walked, false)
}

/// Resolve where a planned move actually takes the unit
pub fn resolve_move(unit: &UnitState, planned: &PlannedMove, field: &Battlefield) -> MoveOutcome {
    let Some(from) = unit.position else {
        return MoveOutcome {
            destination: planned.to,
            distance: 0.0,
            truncated: true,
            path: None,
        };
    };
    let allowance = move_allowance(unit, planned.advance);

    let waypoints: Vec<Point> = match &planned.path {
        Some(path) if path.len() >= 2 => path.clone(),
        _ => vec![from, planned.to],
    };

    // Cut to the allowance first, then to the first blocked segment
    let reach = get_max_travel_point(&waypoints, allowance, &field.terrain);
    let mut within: Vec<Point> = waypoints[..=reach.path_index.min(waypoints.len() - 1)].to_vec();
    if within.last().map_or(true, |p| p.distance(reach.point) > PATH_EPSILON) {
        within.push(reach.point);
    }
    let (walked, blocked) = walk_segments(unit, &within, field);
    let destination = walked.last().copied().unwrap_or(from);
    let truncated = blocked || reach.point.distance(planned.to) > PATH_EPSILON;

    MoveOutcome {
        destination,
        distance: path_length(&walked),
        truncated,
        path: (walked.len() > 2).then_some(walked),
    }
}

/// Push two overlapping units apart; engaged units stay where they are
///
/// Returns true when the overlap was resolved.
fn separate_pair(a: &mut UnitState, b: &mut UnitState, field: &Battlefield) -> bool {
    let (Some(pa), Some(pb)) = (a.position, b.position) else {
        return true;
    };
    let required = a.footprint_radius + b.footprint_radius + COLLISION_EPSILON;
    let distance = pa.distance(pb);
    if distance >= required {
        return true;
    }

    let deficit = required - distance;
    let dir = (pb - pa).try_normalize().unwrap_or(Point::X);
    let blocked = |u: &UnitState, p: Point| {
        is_position_blocked_by_terrain(
            p,
            u.base_radius,
            &field.terrain,
            u.is_infantry(),
            u.is_large(),
        ).blocked
            || !field.contains(p)
    };

    let a_half = pa - dir * (deficit / 2.0);
    let b_half = pb + dir * (deficit / 2.0);
    let a_fixed = a.engaged;
    let b_fixed = b.engaged;

    if !a_fixed && !b_fixed && !blocked(&*a, a_half) && !blocked(&*b, b_half) {
        a.move_to(a_half, field.width, field.height);
        b.move_to(b_half, field.width, field.height);
        return true;
    }

    let a_full = pa - dir * deficit;
    let b_full = pb + dir * deficit;
    if !a_fixed && !blocked(&*a, a_full) {
        a.move_to(a_full, field.width, field.height);
        return true;
    }
    if !b_fixed && !blocked(&*b, b_full) {
        b.move_to(b_full, field.width, field.height);
        return true;
    }

    // Both directions blocked: try sliding sideways
    let side = perpendicular(dir) * deficit;
    for (unit, origin, fixed) in [(a, pa, a_fixed), (b, pb, b_fixed)] {
        if fixed {
            continue;
        }
        for nudge in [origin + side, origin - side] {
            if !blocked(&*unit, nudge) {
                unit.move_to(nudge, field.width, field.height);
                return true;
            }
        }
    }
    false
}

/// Bounded passes of pairwise separation for the moving army
///
/// Every overlapping pair, friendly or enemy, shares the correction.
pub fn resolve_collisions(
    army: &mut ArmyState,
    enemy: &mut ArmyState,
    field: &Battlefield,
) -> usize {
    let mut adjustments = 0;
    for _ in 0..COLLISION_ITERATIONS {
        let mut changed = false;
        let count = army.units.len();
        for i in 0..count {
            if !army.units[i].is_on_board() {
                continue;
            }
            for j in (i + 1)..count {
                if !army.units[j].is_on_board() || army.units[i].gap_to(&army.units[j]) >= 0.0 {
                    continue;
                }
                let (left, right) = army.units.split_at_mut(j);
                if separate_pair(&mut left[i], &mut right[0], field) {
                    adjustments += 1;
                    changed = true;
                }
            }
            for other in enemy.units.iter_mut().filter(|u| u.is_on_board()) {
                let unit = &mut army.units[i];
                if unit.gap_to(other) >= 0.0 {
                    continue;
                }
                if separate_pair(unit, other, field) {
                    adjustments += 1;
                    changed = true;
                }
            }
        }
        // Stop once a pass moves nothing; unresolved overlaps are left as they are
        if !changed {
            break;
        }
    }
    adjustments
}

/// Move units whose models ended inside terrain they cannot occupy
pub fn eject_from_terrain(army: &mut ArmyState, field: &Battlefield) -> usize {
    let mut ejected = 0;
    for unit in army.units.iter_mut().filter(|u| u.is_on_board()) {
        let Some(center) = unit.position else {
            continue;
        };
        let offending = field.terrain.iter().find(|feature| {
            feature.blocks_mover(unit.is_infantry(), unit.is_large())
                && unit.alive_points().any(|p| {
                    is_position_blocked_by_terrain(
                        p,
                        unit.base_radius,
                        std::slice::from_ref(*feature),
                        unit.is_infantry(),
                        unit.is_large(),
                    )
                        .blocked
                })
        });
        let Some(feature) = offending else {
            continue;
        };

        let away = (center - feature.center()).try_normalize().unwrap_or(Point::X);
        let target = feature.center()
            + away * (feature.radius() + unit.footprint_radius + TERRAIN_EJECT_BUFFER);
        tracing::debug!(unit = %unit.name, feature = %feature.name, "Ejecting unit from terrain");
        unit.move_to(target, field.width, field.height);
        ejected += 1;
    }
    ejected
}

/// Execute a whole movement plan for `army`
pub fn apply_movement_plan(
    army: &mut ArmyState,
    enemy: &mut ArmyState,
    plan: &MovementPlan,
    field: &Battlefield,
    log: &mut PhaseLog,
) {
    let mut pending = Vec::new();

    for unit in army.units.iter_mut() {
        if !unit.is_on_board() {
            continue;
        }
        let Some(from) = unit.position else {
            continue;
        };
        let planned = plan.movements.iter().find(|m| m.unit_id == unit.id);
        let outcome = match planned {
            Some(planned) if !unit.engaged => {
                Some((resolve_move(unit, planned, field), planned.advance))
            }
            _ => None,
        };

        let Some((outcome, advance)) = outcome.filter(|(o, _)| o.distance > PATH_EPSILON) else {
            unit.remained_stationary = true;
            log.push_action(ActionLog::new(
                unit.id.clone(),
                unit.name.clone(),
                ActionKind::Hold,
                format!("{} holds position", unit.name),
            ));
            continue;
        };

        unit.move_to(outcome.destination, field.width, field.height);
        unit.advanced = advance;
        unit.remained_stationary = false;
        let kind = if advance { ActionKind::Advance } else { ActionKind::Move };
        log.push_action(ActionLog::new(
            unit.id.clone(),
            unit.name.clone(),
            kind,
            format!("{} moves {:.1}\"", unit.name, outcome.distance),
        ));
        pending.push((unit.id.clone(), from, outcome, advance));
    }

    resolve_collisions(army, enemy, field);
    eject_from_terrain(army, field);

    for (unit_id, from, outcome, advanced) in pending {
        let to = army.unit(&unit_id).and_then(|u| u.position).unwrap_or(outcome.destination);
        log.push_movement(MovementDetail {
            unit_id,
            from,
            to,
            distance: outcome.distance,
            advanced,
            path: outcome.path,
            truncated: outcome.truncated,
        });
    }
}
