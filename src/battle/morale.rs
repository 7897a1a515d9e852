//! Battle shock
//!
//! Units below half strength test in their army's command phase. A failed
//! test zeroes objective control and stops the unit shooting until the start
//! of the next round.

use rand::{Rng, RngCore};

use crate::battle::constants::EXPECTED_LEADERSHIP_ROLL;
use crate::battle::log::{ActionKind, ActionLog, PhaseLog};
use crate::battle::units::{ArmyState, UnitState};
use crate::core::types::Round;

/// Result of a battle-shock test
#[derive(Debug, Clone, Copy, Default)]
pub struct BattleShockResult {
    pub tested: bool,
    pub roll: u32,
    pub passed: bool,
}

/// Roll (or take the expected 7) against the unit's leadership
pub fn check_battle_shock(
    unit: &UnitState,
    use_dice_rolls: bool,
    rng: &mut dyn RngCore,
) -> BattleShockResult {
    let mut result = BattleShockResult::default();

    // Only on-board units below half strength test
    if !unit.is_on_board() || unit.battle_shocked || !unit.below_half_strength() {
        return result;
    }

    result.tested = true;
    result.roll = if use_dice_rolls {
        rng.gen_range(1..=6u32) + rng.gen_range(1..=6u32)
    } else {
        EXPECTED_LEADERSHIP_ROLL
    };
    result.passed = result.roll >= unit.template.stats.leadership as u32;
    result
}

/// Test every eligible unit of `army`, logging each test
pub fn run_battle_shock_tests(
    army: &mut ArmyState,
    round: Round,
    use_dice_rolls: bool,
    rng: &mut dyn RngCore,
    log: &mut PhaseLog,
) -> usize {
    let mut failures = 0;
    for unit in army.units.iter_mut() {
        let result = check_battle_shock(unit, use_dice_rolls, rng);
        if !result.tested {
            continue;
        }

        let leadership = unit.template.stats.leadership;
        if !result.passed {
            unit.battle_shocked = true;
            unit.battle_shocked_until_round = Some(round + 1);
            failures += 1;
        }

        let outcome = if result.passed { "passes" } else { "fails" };
        log.push_action(ActionLog::new(
            unit.id.clone(),
            unit.name.clone(),
            ActionKind::BattleShockTest {
                roll: result.roll,
                leadership,
                passed: result.passed,
            },
            format!("{} {} battle shock ({} vs {}+)", unit.name, outcome, result.roll, leadership),
        ));
    }
    failures
}

/// Clear battle shock whose expiry round has arrived
pub fn clear_expired_battle_shock(army: &mut ArmyState, round: Round, log: &mut PhaseLog) {
    for unit in army.units.iter_mut() {
        let expired = matches!(unit.battle_shocked_until_round, Some(until) if until <= round);
        if !unit.battle_shocked || !expired {
            continue;
        }
        unit.battle_shocked = false;
        unit.battle_shocked_until_round = None;
        log.push_action(ActionLog::new(
            unit.id.clone(),
            unit.name.clone(),
            ActionKind::BattleShockRecovered,
            format!("{} recovers from battle shock", unit.name),
        ));
    }
}
