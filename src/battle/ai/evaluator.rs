//! Adaptive strategy selection
//!
//! Each command phase a snapshot of the battle picks the profile the
//! planner uses for that army's movement.

use serde::{Deserialize, Serialize};

use crate::battle::ai::scoring::incoming_threat;
use crate::battle::ai::strategy::{AGGRESSIVE, DEFENSIVE, OBJECTIVE_FOCUSED};
use crate::battle::objectives::{objectives_held, ObjectiveMarker, VictoryPoints};
use crate::battle::units::ArmyState;
use crate::core::types::Round;

/// Battle state as one army sees it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattleSnapshot {
    /// Own VP minus the opponent's
    pub vp_differential: i64,
    /// Own remaining wounds over the opponent's
    pub strength_ratio: f32,
    pub objectives_held: usize,
    pub total_objectives: usize,
    /// Units facing incoming threat of at least half their remaining wounds
    pub units_in_danger: usize,
    pub total_units: usize,
    pub round: Round,
}

impl BattleSnapshot {
    pub fn capture(
        army: &ArmyState,
        opponent: &ArmyState,
        objectives: &[ObjectiveMarker],
        vp: &VictoryPoints,
        round: Round,
    ) -> Self {
        let own = army.remaining_wounds() as f32;
        let theirs = opponent.remaining_wounds() as f32;
        let strength_ratio = if theirs > 0.0 { own / theirs } else { f32::INFINITY };

        let mut total_units = 0;
        let mut units_in_danger = 0;
        for unit in army.on_board_units() {
            total_units += 1;
            let Some(at) = unit.position else {
                continue;
            };
            let threat = incoming_threat(at, unit.footprint_radius, opponent);
            if threat >= unit.remaining_wounds as f32 / 2.0 {
                units_in_danger += 1;
            }
        }

        Self {
            vp_differential: vp.differential(army.tag),
            strength_ratio,
            objectives_held: objectives_held(objectives, army.tag),
            total_objectives: objectives.len(),
            units_in_danger,
            total_units,
            round,
        }
    }
}

/// Profile name for the snapshot; first matching row wins
pub fn select_profile(snapshot: &BattleSnapshot, configured: &str) -> String {
    let name = if snapshot.strength_ratio < 0.6 && snapshot.vp_differential > 0 {
        DEFENSIVE
    } else if snapshot.vp_differential < 0 {
        OBJECTIVE_FOCUSED
    } else if snapshot.strength_ratio > 1.5 {
        AGGRESSIVE
    } else if snapshot.units_in_danger * 2 > snapshot.total_units {
        DEFENSIVE
    } else if snapshot.objectives_held * 2 < snapshot.total_objectives {
        OBJECTIVE_FOCUSED
    } else {
        configured
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::ai::strategy::BALANCED;
    use crate::battle::objectives::{ControlState, ObjectivePriority};
    use crate::battle::units::test_support::{placed, test_army};
    use crate::core::types::{ArmyTag, Point};

    fn even() -> BattleSnapshot {
        BattleSnapshot {
            vp_differential: 0,
            strength_ratio: 1.0,
            objectives_held: 3,
            total_objectives: 5,
            units_in_danger: 0,
            total_units: 4,
            round: 2,
        }
    }

    #[test]
    fn test_even_battle_keeps_configured_profile() {
        assert_eq!(select_profile(&even(), BALANCED), BALANCED);
    }

    #[test]
    fn test_decision_table_rows() {
        let weak_but_leading = BattleSnapshot {
            strength_ratio: 0.5,
            vp_differential: 5,
            ..even()
        };
        assert_eq!(select_profile(&weak_but_leading, BALANCED), DEFENSIVE);

        let trailing = BattleSnapshot {
            vp_differential: -5,
            strength_ratio: 2.0,
            ..even()
        };
        assert_eq!(select_profile(&trailing, BALANCED), OBJECTIVE_FOCUSED);

        let strong = BattleSnapshot {
            strength_ratio: 1.6,
            ..even()
        };
        assert_eq!(select_profile(&strong, BALANCED), AGGRESSIVE);

        let exposed = BattleSnapshot {
            units_in_danger: 3,
            ..even()
        };
        assert_eq!(select_profile(&exposed, BALANCED), DEFENSIVE);

        let few_objectives = BattleSnapshot {
            objectives_held: 1,
            ..even()
        };
        assert_eq!(select_profile(&few_objectives, BALANCED), OBJECTIVE_FOCUSED);
    }

    #[test]
    fn test_capture_reads_battle_state() {
        let army = test_army(ArmyTag::A, vec![placed("a1", ArmyTag::A, 5, Point::new(10.0, 22.0))]);
        let mut far = placed("b1", ArmyTag::B, 5, Point::new(50.0, 22.0));
        far.remaining_wounds = 5;
        let opponent = test_army(ArmyTag::B, vec![far]);
        let mut objectives = vec![
            ObjectiveMarker::new("o1", Point::new(10.0, 22.0), ObjectivePriority::Secondary),
            ObjectiveMarker::new("o2", Point::new(30.0, 22.0), ObjectivePriority::Primary),
        ];
        objectives[0].controlled_by = ControlState::A;
        let vp = VictoryPoints { a: 10, b: 5 };

        let snapshot = BattleSnapshot::capture(&army, &opponent, &objectives, &vp, 3);
        assert_eq!(snapshot.vp_differential, 5);
        assert!((snapshot.strength_ratio - 2.0).abs() < 1e-6);
        assert_eq!(snapshot.objectives_held, 1);
        assert_eq!(snapshot.total_objectives, 2);
        assert_eq!(snapshot.total_units, 1);
        assert_eq!(snapshot.units_in_danger, 0);
        assert_eq!(snapshot.round, 3);
    }
}
