//! Objective control and victory points
//!
//! Control is recomputed from unit positions every command phase. The side
//! with strictly more objective control (OC) holds a marker; ties contest it.
//! Hold counters advance at most once per battle round.

use serde::{Deserialize, Serialize};

use crate::battle::constants::OBJECTIVE_CONTROL_RANGE;
use crate::battle::units::{ArmyState, UnitState};
use crate::core::config::MissionScoring;
use crate::core::types::{ArmyTag, Point, Round};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectivePriority {
    Primary,
    Secondary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ControlState {
    A,
    B,
    #[default]
    Contested,
}

impl ControlState {
    pub fn side(&self) -> Option<ArmyTag> {
        match self {
            ControlState::A => Some(ArmyTag::A),
            ControlState::B => Some(ArmyTag::B),
            ControlState::Contested => None,
        }
    }
}

impl From<ArmyTag> for ControlState {
    fn from(tag: ArmyTag) -> Self {
        match tag {
            ArmyTag::A => ControlState::A,
            ArmyTag::B => ControlState::B,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveMarker {
    pub id: String,
    pub position: Point,
    pub priority: ObjectivePriority,
    pub controlled_by: ControlState,
    pub level_of_control_a: u32,
    pub level_of_control_b: u32,
    /// Consecutive rounds held by each side after the round control was taken
    pub held_by_a: u32,
    pub held_by_b: u32,
    /// Last round the hold counters were advanced
    pub counted_round: Round,
    pub scoring_units_a: Vec<String>,
    pub scoring_units_b: Vec<String>,
}

impl ObjectiveMarker {
    pub fn new(id: impl Into<String>, position: Point, priority: ObjectivePriority) -> Self {
        Self {
            id: id.into(),
            position,
            priority,
            controlled_by: ControlState::Contested,
            level_of_control_a: 0,
            level_of_control_b: 0,
            held_by_a: 0,
            held_by_b: 0,
            counted_round: 0,
            scoring_units_a: Vec::new(),
            scoring_units_b: Vec::new(),
        }
    }

    pub fn held_by(&self, tag: ArmyTag) -> u32 {
        match tag {
            ArmyTag::A => self.held_by_a,
            ArmyTag::B => self.held_by_b,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.priority == ObjectivePriority::Primary
    }

    /// VP this marker is worth to `tag` right now under `scoring`
    pub fn value_for(&self, tag: ArmyTag, scoring: &MissionScoring) -> u32 {
        if self.controlled_by.side() != Some(tag)
            || self.held_by(tag) < scoring.hold_timer_required
        {
            return 0;
        }
        let bonus = if self.is_primary() { scoring.primary_objective_bonus } else { 0 };
        scoring.vp_per_objective + bonus
    }
}

/// Does any alive model of the unit stand within control range?
///
/// Positions are 2D on a flat table, so only the horizontal range applies;
/// every model is trivially inside the 5" vertical limit.
pub fn unit_in_range(unit: &UnitState, objective: Point) -> bool {
    unit.alive_points()
        .any(|p| p.distance(objective) - unit.base_radius <= OBJECTIVE_CONTROL_RANGE)
}

fn control_level(army: &ArmyState, objective: Point) -> (u32, Vec<String>) {
    let mut level = 0;
    let mut units = Vec::new();
    for unit in army.units.iter() {
        let oc = unit.objective_control();
        if oc == 0 || !unit_in_range(unit, objective) {
            continue;
        }
        level += oc;
        units.push(unit.id.clone());
    }
    (level, units)
}

/// Recompute control and hold counters for every objective
///
/// Control follows positions on every call. A counter resets to 0 whenever
/// the controller changes or the marker is contested, and rises by one on
/// the first call of each later round the same side still controls it.
pub fn update_objective_control(
    objectives: &mut [ObjectiveMarker],
    army_a: &ArmyState,
    army_b: &ArmyState,
    round: Round,
) {
    for objective in objectives.iter_mut() {
        let (level_a, units_a) = control_level(army_a, objective.position);
        let (level_b, units_b) = control_level(army_b, objective.position);

        let controller = match level_a.cmp(&level_b) {
            std::cmp::Ordering::Greater => ControlState::A,
            std::cmp::Ordering::Less => ControlState::B,
            std::cmp::Ordering::Equal => ControlState::Contested,
        };

        if controller == ControlState::Contested || controller != objective.controlled_by {
            objective.held_by_a = 0;
            objective.held_by_b = 0;
        } else if objective.counted_round != round {
            match controller {
                ControlState::A => objective.held_by_a += 1,
                ControlState::B => objective.held_by_b += 1,
                ControlState::Contested => {}
            }
        }
        objective.counted_round = round;

        if controller != objective.controlled_by {
            tracing::debug!(objective = %objective.id, ?controller, "Objective control changed");
        }

        objective.controlled_by = controller;
        objective.level_of_control_a = level_a;
        objective.level_of_control_b = level_b;
        objective.scoring_units_a = units_a;
        objective.scoring_units_b = units_b;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VictoryPoints {
    pub a: u32,
    pub b: u32,
}

impl VictoryPoints {
    pub fn get(&self, tag: ArmyTag) -> u32 {
        match tag {
            ArmyTag::A => self.a,
            ArmyTag::B => self.b,
        }
    }

    pub fn add(&mut self, tag: ArmyTag, points: u32) {
        match tag {
            ArmyTag::A => self.a += points,
            ArmyTag::B => self.b += points,
        }
    }

    /// VP lead of `tag` over its opponent
    pub fn differential(&self, tag: ArmyTag) -> i64 {
        self.get(tag) as i64 - self.get(tag.opponent()) as i64
    }
}

/// VP each side earns from the current control state
pub fn calculate_victory_points(
    objectives: &[ObjectiveMarker],
    scoring: &MissionScoring,
) -> VictoryPoints {
    VictoryPoints {
        a: score_for_army(objectives, scoring, ArmyTag::A),
        b: score_for_army(objectives, scoring, ArmyTag::B),
    }
}

pub fn score_for_army(
    objectives: &[ObjectiveMarker],
    scoring: &MissionScoring,
    tag: ArmyTag,
) -> u32 {
    objectives.iter().map(|o| o.value_for(tag, scoring)).sum()
}

/// Number of objectives `tag` currently controls
pub fn objectives_held(objectives: &[ObjectiveMarker], tag: ArmyTag) -> usize {
    objectives.iter().filter(|o| o.controlled_by.side() == Some(tag)).count()
}
