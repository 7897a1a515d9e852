//! Movement planner
//!
//! Each eligible unit gets a finite set of reachable candidate destinations.
//! Greedy planning takes the best candidate per unit in army order; beam
//! search keeps the `beam_width` best partial assignments by cumulative
//! score. Both rank with `score_destination` plus the interaction term
//! against destinations already chosen, so a beam of width 1 reproduces
//! the greedy plan exactly.

use std::cmp::Reverse;
use std::f32::consts::TAU;

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::battle::ai::scoring::{
    incoming_threat, interaction_score, nearest_enemy_gap, objective_value_at, score_destination,
    ChosenDestination, ScoreContext,
};
use crate::battle::ai::strategy::StrategyProfile;
use crate::battle::constants::{
    ADVANCE_BONUS, AVERAGE_CHARGE_ROLL, ENGAGEMENT_RANGE, PATH_EPSILON, PLANNER_DIRECTIONS,
};
use crate::battle::navmesh::NavMesh;
use crate::battle::objectives::ObjectiveMarker;
use crate::battle::oracle::{AttackContext, CombatOracle};
use crate::battle::pathfinding::{find_path, get_max_travel_point};
use crate::battle::resolution::build_attack_context;
use crate::battle::terrain::{is_position_blocked_by_terrain, TerrainFeature};
use crate::battle::units::{ArmyState, UnitState};
use crate::core::types::{clamp_to_board, Point};

/// Everything the planner reads for one movement phase
pub struct PlanRequest<'a> {
    pub active: &'a ArmyState,
    pub opponent: &'a ArmyState,
    pub objectives: &'a [ObjectiveMarker],
    pub allow_advance: bool,
    pub width: f32,
    pub height: f32,
    pub strategy: &'a StrategyProfile,
    pub use_beam_search: bool,
    pub beam_width: usize,
    pub terrain: &'a [TerrainFeature],
    pub nav_mesh: &'a NavMesh,
    pub oracle: &'a dyn CombatOracle,
}

/// One unit's chosen destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedMove {
    pub unit_id: String,
    pub to: Point,
    /// Waypoints when the route bends around terrain
    pub path: Option<Vec<Point>>,
    pub advance: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementPlan {
    pub movements: Vec<PlannedMove>,
}

impl MovementPlan {
    pub fn get(&self, unit_id: &str) -> Option<&PlannedMove> {
        self.movements.iter().find(|m| m.unit_id == unit_id)
    }
}

/// A reachable destination with its standalone score
#[derive(Debug, Clone)]
struct Candidate {
    planned: PlannedMove,
    score: f32,
}

/// Candidates for one unit, in generation order
struct UnitCandidates {
    radius: f32,
    candidates: Vec<Candidate>,
}

/// Can this unit be given a move this phase?
pub fn can_move(unit: &UnitState) -> bool {
    unit.is_on_board() && !unit.engaged
}

/// Raw destinations before reachability checks
fn raw_destinations(unit: &UnitState, from: Point, req: &PlanRequest) -> Vec<Point> {
    let movement = unit.movement();
    let mut distances = vec![movement / 2.0, movement];
    if req.allow_advance {
        distances.push(movement + ADVANCE_BONUS);
    }

    let mut points = vec![from];
    for k in 0..PLANNER_DIRECTIONS {
        let angle = TAU * k as f32 / PLANNER_DIRECTIONS as f32;
        let dir = Point::new(angle.cos(), angle.sin());
        points.extend(distances.iter().map(|d| from + dir * *d));
    }

    // Straight at the nearest enemy, stopping outside engagement range
    let nearest = req
        .opponent
        .on_board_units()
        .filter_map(|e| e.position.map(|p| (p, unit.gap_to(e))))
        .min_by_key(|(_, gap)| OrderedFloat(*gap));
    if let Some((at, gap)) = nearest {
        if let Some(dir) = (at - from).try_normalize() {
            let limit = (gap - ENGAGEMENT_RANGE - 0.1).max(0.0);
            for d in &distances {
                points.push(from + dir * d.min(limit));
            }
        }
    }

    for objective in req.objectives {
        points.push(objective.position);
        if let Some(dir) = (objective.position - from).try_normalize() {
            points.extend(
                distances.iter().map(|d| from + dir * d.min(objective.position.distance(from))),
            );
        }
    }
    points
}

fn too_close_to_enemy(unit: &UnitState, point: Point, opponent: &ArmyState) -> bool {
    opponent.on_board_units().any(|e| {
        e.position
            .is_some_and(|at| {
                at.distance(point) - unit.footprint_radius - e.footprint_radius <= ENGAGEMENT_RANGE
            })
    })
}

/// Path to `target`, cut to the move allowance
fn reach(unit: &UnitState, from: Point, target: Point, req: &PlanRequest) -> Option<PlannedMove> {
    let movement = unit.movement();
    let allowance = movement + if req.allow_advance { ADVANCE_BONUS } else { 0.0 };
    let path = find_path(
        from,
        target,
        req.nav_mesh,
        req.terrain,
        unit.is_infantry(),
        unit.is_large(),
        unit.base_radius,
    );
    if !path.found {
        return None;
    }

    let total_cost = path.total_cost();
    let (to, waypoints, cost) = if total_cost > allowance + PATH_EPSILON {
        let travel = get_max_travel_point(&path.path, allowance, req.terrain);
        let last = travel.path_index.min(path.path.len() - 1);
        let mut waypoints: Vec<Point> = path.path[..=last].to_vec();
        if waypoints.last().map_or(true, |p| p.distance(travel.point) > PATH_EPSILON) {
            waypoints.push(travel.point);
        }
        (travel.point, waypoints, travel.distance_traveled)
    } else {
        (target, path.path, total_cost)
    };

    Some(PlannedMove {
        unit_id: unit.id.clone(),
        to,
        path: (waypoints.len() > 2).then_some(waypoints),
        advance: cost > movement + PATH_EPSILON,
    })
}

/// Attack contexts against each enemy, reused across candidates
struct Projection<'a> {
    contexts: Vec<(&'a UnitState, Vec<AttackContext>)>,
}

impl<'a> Projection<'a> {
    fn new(unit: &UnitState, req: &PlanRequest<'a>) -> Self {
        let contexts = req
            .opponent
            .on_board_units()
            .map(|target| {
                let ctxs = unit
                    .template
                    .weapons
                    .iter()
                    .map(|w| build_attack_context(unit, target, w, req.terrain, true))
                    .collect();
                (target, ctxs)
            })
            .collect();
        Self { contexts }
    }

    /// Best expected damage available from `point` next phase
    fn damage_from(
        &self,
        unit: &UnitState,
        point: Point,
        advance: bool,
        oracle: &dyn CombatOracle,
    ) -> f32 {
        let melee_reach = AVERAGE_CHARGE_ROLL + ENGAGEMENT_RANGE;
        let mut ranged = vec![0.0f32; unit.template.weapons.len()];
        let mut melee = 0.0f32;

        for (target, ctxs) in &self.contexts {
            let Some(at) = target.position else {
                continue;
            };
            let gap =
                (at.distance(point) - unit.footprint_radius - target.footprint_radius).max(0.0);
            let mut melee_here = 0.0;
            for (index, (weapon, ctx)) in unit.template.weapons.iter().zip(ctxs).enumerate() {
                let mut ctx = ctx.clone();
                ctx.modifiers.target_distance = gap;
                if weapon.is_ranged() {
                    if gap > weapon.range || (advance && !weapon.is_assault()) {
                        continue;
                    }
                    ranged[index] = ranged[index].max(oracle.expected_damage(weapon, &ctx));
                } else if !advance && unit.role.role.is_melee_oriented() && gap <= melee_reach {
                    melee_here += oracle.expected_damage(weapon, &ctx);
                }
            }
            melee = melee.max(melee_here);
        }
        ranged.iter().sum::<f32>() + melee
    }
}

fn candidates_for(unit: &UnitState, req: &PlanRequest) -> UnitCandidates {
    let radius = unit.footprint_radius;
    let Some(from) = unit.position else {
        return UnitCandidates {
            radius,
            candidates: Vec::new(),
        };
    };
    let projection = Projection::new(unit, req);
    let legal = |p: Point| {
        !too_close_to_enemy(unit, p, req.opponent)
            && !is_position_blocked_by_terrain(
                p,
                unit.base_radius,
                req.terrain,
                unit.is_infantry(),
                unit.is_large(),
            )
                .blocked
    };

    let mut candidates: Vec<Candidate> = Vec::new();
    for raw in raw_destinations(unit, from, req) {
        let target = clamp_to_board(raw, radius, req.width, req.height);
        let planned = if target.distance(from) < PATH_EPSILON {
            PlannedMove {
                unit_id: unit.id.clone(),
                to: from,
                path: None,
                advance: false,
            }
        } else {
            if !legal(target) {
                continue;
            }
            let Some(planned) = reach(unit, from, target, req) else {
                continue;
            };
            if planned.to.distance(target) > PATH_EPSILON && !legal(planned.to) {
                continue;
            }
            planned
        };
        if candidates.iter().any(|c| c.planned.to.distance(planned.to) < PATH_EPSILON) {
            continue;
        }

        let path_cost = match &planned.path {
            Some(path) => path.windows(2).map(|w| w[0].distance(w[1])).sum(),
            None => from.distance(planned.to),
        };
        let ctx = ScoreContext {
            unit,
            strategy: req.strategy,
            destination: planned.to,
            path_cost,
            projected_damage: projection.damage_from(unit, planned.to, planned.advance, req.oracle),
            objective_value: objective_value_at(planned.to, unit, req.objectives),
            incoming_threat: incoming_threat(planned.to, radius, req.opponent),
            nearest_enemy_gap: nearest_enemy_gap(planned.to, radius, req.opponent),
        };
        candidates.push(Candidate {
            score: score_destination(&ctx),
            planned,
        });
    }
    UnitCandidates { radius, candidates }
}

fn greedy(per_unit: &[UnitCandidates], objectives: &[ObjectiveMarker]) -> Vec<PlannedMove> {
    let mut chosen: Vec<ChosenDestination> = Vec::new();
    let mut moves = Vec::new();
    for unit in per_unit {
        let mut best: Option<(&Candidate, f32)> = None;
        for candidate in &unit.candidates {
            let total = candidate.score
                + interaction_score(candidate.planned.to, unit.radius, &chosen, objectives);
            if best.map_or(true, |(_, s)| total > s) {
                best = Some((candidate, total));
            }
        }
        if let Some((candidate, _)) = best {
            chosen.push(ChosenDestination {
                point: candidate.planned.to,
                radius: unit.radius,
            });
            moves.push(candidate.planned.clone());
        }
    }
    moves
}

#[derive(Clone)]
struct BeamState {
    score: f32,
    picks: Vec<usize>,
    chosen: Vec<ChosenDestination>,
}

fn beam(
    per_unit: &[UnitCandidates],
    objectives: &[ObjectiveMarker],
    width: usize,
) -> Vec<PlannedMove> {
    let width = width.max(1);
    let mut beam = vec![BeamState {
        score: 0.0,
        picks: Vec::new(),
        chosen: Vec::new(),
    }];

    for unit in per_unit {
        if unit.candidates.is_empty() {
            continue;
        }
        let mut expansions: Vec<(f32, f32, BeamState)> = Vec::new();
        for state in &beam {
            for (index, candidate) in unit.candidates.iter().enumerate() {
                let interaction =
                    interaction_score(candidate.planned.to, unit.radius, &state.chosen, objectives);
                let step = candidate.score + interaction;
                let mut next = state.clone();
                next.score += step;
                next.picks.push(index);
                next.chosen.push(ChosenDestination {
                    point: candidate.planned.to,
                    radius: unit.radius,
                });
                expansions.push((next.score, step, next));
            }
        }
        // Stable: ties keep generation order
        expansions
            .sort_by_key(|(total, step, _)| Reverse((OrderedFloat(*total), OrderedFloat(*step))));
        expansions.truncate(width);
        beam = expansions.into_iter().map(|(_, _, state)| state).collect();
    }

    let Some(best) = beam.into_iter().next() else {
        return Vec::new();
    };
    per_unit
        .iter()
        .filter(|u| !u.candidates.is_empty())
        .zip(best.picks)
        .map(|(unit, pick)| unit.candidates[pick].planned.clone())
        .collect()
}

/// Plan the movement phase for `req.active`
pub fn plan_movement(req: &PlanRequest) -> MovementPlan {
    let per_unit: Vec<UnitCandidates> = req
        .active
        .units
        .iter()
        .filter(|u| can_move(u))
        .map(|u| candidates_for(u, req))
        .collect();

    let movements = if req.use_beam_search {
        beam(&per_unit, req.objectives, req.beam_width)
    } else {
        greedy(&per_unit, req.objectives)
    };
    tracing::debug!(
        army = %req.active.tag,
        profile = %req.strategy.name,
        beam = req.use_beam_search,
        moves = movements.len(),
        "Movement planned"
    );
    MovementPlan { movements }
}
