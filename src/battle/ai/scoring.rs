//! Destination scoring for the movement planner
//!
//! `score_destination` is a pure function of its context so greedy and beam
//! search rank candidates identically.

use serde::{Deserialize, Serialize};

use crate::battle::ai::strategy::StrategyProfile;
use crate::battle::constants::{
    CROWDING_PENALTY, ENGAGEMENT_RANGE, MODEL_SPACING, OBJECTIVE_CONTROL_RANGE,
    OBJECTIVE_OVERCOMMIT_PENALTY, THREAT_RANGE_BUFFER,
};
use crate::battle::objectives::{ControlState, ObjectiveMarker};
use crate::battle::units::{ArmyState, UnitState};
use crate::core::types::Point;

/// Everything known about one candidate destination
#[derive(Debug, Clone)]
pub struct ScoreContext<'a> {
    pub unit: &'a UnitState,
    pub strategy: &'a StrategyProfile,
    pub destination: Point,
    /// Movement spent reaching the destination
    pub path_cost: f32,
    /// Best expected damage the unit can deal from here next phase
    pub projected_damage: f32,
    /// Objective value gained by standing here
    pub objective_value: f32,
    /// Expected damage enemies can bring to bear on this spot
    pub incoming_threat: f32,
    /// Edge-to-edge gap to the nearest enemy
    pub nearest_enemy_gap: f32,
}

/// Weighted score of a destination for the active profile
pub fn score_destination(ctx: &ScoreContext) -> f32 {
    let strategy = ctx.strategy;
    let role = &ctx.unit.role;

    // Survivability scales threat: fragile units care more
    let durability = ctx.unit.remaining_wounds.max(1) as f32;
    let threat = ctx.incoming_threat / durability.sqrt();

    let aggression = if !ctx.nearest_enemy_gap.is_finite() {
        0.0
    } else if role.role.is_melee_oriented() {
        -ctx.nearest_enemy_gap / 6.0
    } else {
        -(ctx.nearest_enemy_gap - role.optimal_range).abs() / 6.0
    };

    strategy.damage_bias * ctx.projected_damage + strategy.objective_value * ctx.objective_value
        - strategy.threat_penalty * threat
        + strategy.aggression_bias * aggression
        - 0.01 * ctx.path_cost
}

/// Longest ranged weapon a unit carries
pub fn max_weapon_range(unit: &UnitState) -> f32 {
    unit.template
        .weapons
        .iter()
        .filter(|w| w.is_ranged())
        .map(|w| w.range)
        .fold(0.0, f32::max)
}

/// Share of the unit still alive
pub fn strength_fraction(unit: &UnitState) -> f32 {
    unit.remaining_models as f32 / unit.template.model_count.max(1) as f32
}

/// Expected damage the enemy can direct at a footprint of `radius` standing at `point`
pub fn incoming_threat(point: Point, radius: f32, enemy: &ArmyState) -> f32 {
    enemy
        .on_board_units()
        .filter_map(|e| {
            let at = e.position?;
            let gap = at.distance(point) - radius - e.footprint_radius;
            let mut threat = 0.0;
            if gap <= max_weapon_range(e) + THREAT_RANGE_BUFFER {
                threat += e.role.ranged_output;
            }
            if gap <= e.role.charge_threat + ENGAGEMENT_RANGE {
                threat += e.role.melee_output;
            }
            Some(threat * strength_fraction(e))
        })
        .sum()
}

/// Edge-to-edge gap from a footprint at `point` to the nearest enemy
pub fn nearest_enemy_gap(point: Point, radius: f32, enemy: &ArmyState) -> f32 {
    enemy
        .on_board_units()
        .filter_map(|e| e.position.map(|at| at.distance(point) - radius - e.footprint_radius))
        .fold(f32::INFINITY, f32::min)
}

/// Objective value of standing at `point`
///
/// Markers in control range count fully, weighted up where the side does
/// not already hold them; the nearest marker out of range adds a pull.
pub fn objective_value_at(point: Point, unit: &UnitState, objectives: &[ObjectiveMarker]) -> f32 {
    let oc = unit.objective_control() as f32;
    if oc <= 0.0 || objectives.is_empty() {
        return 0.0;
    }

    let mut value = 0.0;
    let mut nearest_out_of_range = f32::INFINITY;
    for objective in objectives {
        let reach = objective.position.distance(point) - unit.footprint_radius;
        let weight = if objective.is_primary() { 1.5 } else { 1.0 };
        let held = objective.controlled_by == ControlState::from(unit.army);
        if reach <= OBJECTIVE_CONTROL_RANGE {
            value += weight * if held { 1.5 } else { 3.0 };
        } else if !held {
            nearest_out_of_range = nearest_out_of_range.min(reach - OBJECTIVE_CONTROL_RANGE);
        }
    }
    if nearest_out_of_range.is_finite() {
        value += (1.0 - nearest_out_of_range / 24.0).max(0.0);
    }
    value
}

/// A destination already committed to by an earlier unit in the plan
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChosenDestination {
    pub point: Point,
    pub radius: f32,
}

/// Penalty for crowding and piling onto the same objective
pub fn interaction_score(
    point: Point,
    radius: f32,
    chosen: &[ChosenDestination],
    objectives: &[ObjectiveMarker],
) -> f32 {
    let mut penalty = 0.0;
    for other in chosen {
        let gap = point.distance(other.point) - radius - other.radius;
        if gap < MODEL_SPACING {
            penalty += CROWDING_PENALTY * (MODEL_SPACING - gap).min(MODEL_SPACING * 4.0);
        }
    }
    for objective in objectives {
        let mine = objective.position.distance(point) - radius <= OBJECTIVE_CONTROL_RANGE;
        if !mine {
            continue;
        }
        let already = chosen
            .iter()
            .filter(|c| objective.position.distance(c.point) - c.radius <= OBJECTIVE_CONTROL_RANGE)
            .count();
        penalty += OBJECTIVE_OVERCOMMIT_PENALTY * already as f32;
    }
    -penalty
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::objectives::ObjectivePriority;
    use crate::battle::unit_type::{RoleInfo, UnitRole};
    use crate::battle::units::test_support::{placed, test_army};
    use crate::core::types::ArmyTag;

    fn ctx<'a>(unit: &'a UnitState, strategy: &'a StrategyProfile) -> ScoreContext<'a> {
        ScoreContext {
            unit,
            strategy,
            destination: Point::new(20.0, 22.0),
            path_cost: 6.0,
            projected_damage: 2.0,
            objective_value: 1.0,
            incoming_threat: 4.0,
            nearest_enemy_gap: 12.0,
        }
    }

    #[test]
    fn test_score_is_pure() {
        let unit = placed("a", ArmyTag::A, 5, Point::new(10.0, 22.0));
        let strategy = StrategyProfile::balanced();
        let c = ctx(&unit, &strategy);
        assert_eq!(score_destination(&c), score_destination(&c));
    }

    #[test]
    fn test_threat_lowers_score_more_when_defensive() {
        let unit = placed("a", ArmyTag::A, 5, Point::new(10.0, 22.0));
        let defensive = StrategyProfile::defensive();
        let aggressive = StrategyProfile::aggressive();

        let mut safe = ctx(&unit, &defensive);
        safe.incoming_threat = 0.0;
        let risky = ctx(&unit, &defensive);
        let defensive_drop = score_destination(&safe) - score_destination(&risky);

        let mut safe = ctx(&unit, &aggressive);
        safe.incoming_threat = 0.0;
        let risky = ctx(&unit, &aggressive);
        let aggressive_drop = score_destination(&safe) - score_destination(&risky);

        assert!(defensive_drop > aggressive_drop);
    }

    #[test]
    fn test_melee_units_want_to_close() {
        let mut unit = placed("a", ArmyTag::A, 5, Point::new(10.0, 22.0));
        unit.role = RoleInfo {
            role: UnitRole::Melee,
            ..Default::default()
        };
        let strategy = StrategyProfile::aggressive();
        let mut near = ctx(&unit, &strategy);
        near.nearest_enemy_gap = 3.0;
        let far = ctx(&unit, &strategy);
        assert!(score_destination(&near) > score_destination(&far));
    }

    #[test]
    fn test_objective_value_in_range() {
        let unit = placed("a", ArmyTag::A, 5, Point::new(30.0, 22.0));
        let objectives = vec![ObjectiveMarker::new(
            "c",
            Point::new(30.0, 22.0),
            ObjectivePriority::Primary,
        )];
        let on = objective_value_at(Point::new(30.0, 22.0), &unit, &objectives);
        let off = objective_value_at(Point::new(10.0, 22.0), &unit, &objectives);
        assert!(on > off);
        assert!(off > 0.0);
    }

    #[test]
    fn test_crowding_penalized() {
        let chosen = vec![ChosenDestination {
            point: Point::new(20.0, 22.0),
            radius: 3.0,
        }];
        let close = interaction_score(Point::new(22.0, 22.0), 3.0, &chosen, &[]);
        let apart = interaction_score(Point::new(40.0, 22.0), 3.0, &chosen, &[]);
        assert!(close < 0.0);
        assert_eq!(apart, 0.0);
    }

    #[test]
    fn test_incoming_threat_counts_units_in_range() {
        let mut enemy_unit = placed("b", ArmyTag::B, 5, Point::new(40.0, 22.0));
        enemy_unit.role.ranged_output = 3.0;
        let enemy = test_army(ArmyTag::B, vec![enemy_unit]);
        assert!(incoming_threat(Point::new(30.0, 22.0), 3.0, &enemy) >= 3.0);
        // Rifles reach 24" + 6" buffer
        assert_eq!(incoming_threat(Point::new(2.0, 22.0), 0.5, &enemy), 0.0);
    }
}
