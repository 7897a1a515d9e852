//! Battle system integration tests

use std::path::PathBuf;

use wargame_sim::battle::*;
use wargame_sim::core::config::{MissionPreset, SimulationConfig};
use wargame_sim::core::types::{ArmyTag, Point};
use wargame_sim::data::army_list::ArmyList;

fn infantry_unit(id: &str, rules: &str) -> String {
    format!(
        r#"{{
            "id": "{id}",
            "name": "Squad {id}",
            "type": "Infantry",
            "stats": {{ "move": "6\"", "toughness": "4", "save": "3+", "wounds": "2", "leadership": "6+", "objectiveControl": "2" }},
            "points": 100,
            "count": 5,
            "weapons": [
                {{ "id": "rifle", "name": "Rifle", "type": "Ranged Weapons",
                   "characteristics": {{ "range": "24\"", "a": "2", "bs": "3+", "s": "4", "ap": "-1", "d": "1", "keywords": "" }},
                   "count": 5, "models_with_weapon": 5 }},
                {{ "id": "blade", "name": "Blade", "type": "Melee Weapons",
                   "characteristics": {{ "range": "Melee", "a": "3", "ws": "3+", "s": "4", "ap": "0", "d": "1", "keywords": "" }},
                   "count": 5, "models_with_weapon": 5 }}
            ],
            "rules": [{rules}],
            "abilities": []
        }}"#
    )
}

fn army_list(name: &str, units: &[String]) -> ArmyList {
    let json = format!(
        r#"{{
            "armyName": "{name}",
            "faction": "Test",
            "pointsTotal": {points},
            "rules": {{ "ds": {{ "id": "ds", "name": "Deep Strike", "description": "" }} }},
            "units": [{units}]
        }}"#,
        points = units.len() * 100,
        units = units.join(",")
    );
    ArmyList::from_json_str(&json).expect("test roster parses")
}

fn single_squads() -> (ArmyList, ArmyList) {
    (
        army_list("Red", &[infantry_unit("red-1", "")]),
        army_list("Blue", &[infantry_unit("blue-1", "")]),
    )
}

fn data_path(relative: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(relative)
}

#[test]
fn test_two_squads_fight_to_a_result() {
    let (red, blue) = single_squads();
    let result = run_simulation(SimulationConfig::default(), &red, &blue).expect("simulation runs");

    assert_eq!(result.logs[0].phase, Phase::Deployment);
    assert_eq!(result.armies.len(), 2);
    assert!(result.rounds_played >= 1 && result.rounds_played <= 5);

    // Both squads start inside their own deployment zones
    for position in &result.positions.start {
        let at = position.position.expect("deployed");
        let (x0, x1) = result.battlefield.deployment_zone(position.army);
        assert!(at.x >= x0 - 1e-3 && at.x <= x1 + 1e-3);
    }

    // Rifles at 24" with a 24" gap: somebody took damage
    assert!(result.summary.a.damage_taken + result.summary.b.damage_taken > 0.0);

    match result.end_reason {
        EndReason::ArmyDestroyed => assert!(result.armies.iter().any(|a| a.is_destroyed())),
        EndReason::MaxRounds => assert_eq!(result.rounds_played, 5),
    }
    let expected = {
        let a = result.summary.a.survivors;
        let b = result.summary.b.survivors;
        if a > b {
            Some(ArmyTag::A)
        } else if b > a {
            Some(ArmyTag::B)
        } else {
            None
        }
    };
    assert_eq!(result.winner, expected);
}

/// Smallest edge-to-edge gap between the two armies in a set of positions
fn closest_gap(units: &[UnitPosition], armies: &[ArmyState]) -> f32 {
    let footprint = |id: &str| {
        armies
            .iter()
            .flat_map(|a| a.units.iter())
            .find(|u| u.id == id)
            .map_or(0.0, |u| u.footprint_radius)
    };
    let mut best = f32::INFINITY;
    for a in units.iter().filter(|u| u.army == ArmyTag::A) {
        for b in units.iter().filter(|u| u.army == ArmyTag::B) {
            let (Some(pa), Some(pb)) = (a.position, b.position) else { continue };
            best = best.min(pa.distance(pb) - footprint(&a.unit_id) - footprint(&b.unit_id));
        }
    }
    best
}

#[test]
fn test_single_round_expected_value_battle() {
    let (red, blue) = single_squads();
    let config = SimulationConfig {
        max_rounds: 1,
        use_dice_rolls: false,
        ..Default::default()
    };
    let result = run_simulation(config, &red, &blue).expect("simulation runs");
    assert_eq!(result.rounds_played, 1);

    let before = closest_gap(&result.positions.start, &result.armies);
    let after_move = result
        .positions
        .timeline
        .iter()
        .find(|s| s.phase == Phase::Movement)
        .expect("movement snapshot");
    let after = closest_gap(&after_move.units, &result.armies);
    assert!(after < before, "gap {} -> {}", before, after);

    let damage: f32 = result
        .logs
        .iter()
        .filter(|log| matches!(log.phase, Phase::Shooting | Phase::Melee))
        .flat_map(|log| log.actions.iter())
        .map(|a| a.damage)
        .sum();
    assert!(damage > 0.0);
}

#[test]
fn test_units_stay_on_the_table() {
    let (red, blue) = single_squads();
    let config = SimulationConfig {
        terrain_layout: Some("standard".into()),
        ..Default::default()
    };
    let result = run_simulation(config, &red, &blue).expect("simulation runs");
    for snapshot in &result.positions.timeline {
        for unit in snapshot.units.iter().filter(|u| !u.in_reserves) {
            let Some(at) = unit.position else { continue };
            assert!(result.battlefield.contains(at), "{} left the table at {:?}", unit.unit_id, at);
        }
    }
}

#[test]
fn test_remaining_models_match_alive_markers() {
    let (red, blue) = single_squads();
    let config = SimulationConfig {
        use_dice_rolls: true,
        random_charge: true,
        seed: 11,
        ..Default::default()
    };
    let result = run_simulation(config, &red, &blue).expect("simulation runs");
    for army in &result.armies {
        for unit in army.units.iter().filter(|u| u.is_on_board()) {
            assert_eq!(unit.alive_model_count() as u32, unit.remaining_models);
        }
    }
}

#[test]
fn test_deep_strike_waits_for_round_two() {
    let red = army_list("Red", &[infantry_unit("red-1", ""), infantry_unit("red-ds", r#""ds""#)]);
    let blue = army_list("Blue", &[infantry_unit("blue-1", ""), infantry_unit("blue-2", "")]);
    let result = run_simulation(SimulationConfig::default(), &red, &blue).expect("simulation runs");

    let start = result
        .positions
        .start
        .iter()
        .find(|u| u.unit_id == "red-ds")
        .expect("deep striker tracked");
    assert!(start.in_reserves);
    assert!(start.position.is_none());

    for log in &result.logs {
        for action in &log.actions {
            if action.unit_id == "red-ds" && action.kind == ActionKind::ReserveArrived {
                assert!(log.round >= 2);
            }
        }
    }
    for snapshot in result.positions.timeline.iter().filter(|s| s.round < 2) {
        let unit = snapshot.units.iter().find(|u| u.unit_id == "red-ds").expect("tracked");
        assert!(unit.in_reserves);
    }
}

#[test]
fn test_beam_search_battle_runs() {
    let (red, blue) = single_squads();
    let config = SimulationConfig {
        use_beam_search: true,
        beam_width: 3,
        terrain_layout: Some("light".into()),
        ..Default::default()
    };
    let result = run_simulation(config, &red, &blue).expect("simulation runs");
    assert!(result.logs.iter().any(|log| log.phase == Phase::Movement));
}

#[test]
fn test_adaptive_strategy_is_logged() {
    let red = army_list("Red", &[infantry_unit("red-1", ""), infantry_unit("red-2", "")]);
    let blue = army_list("Blue", &[infantry_unit("blue-1", "")]);
    let config = SimulationConfig {
        use_adaptive_strategy: true,
        ..Default::default()
    };
    let result = run_simulation(config, &red, &blue).expect("simulation runs");
    // Red starts twice as strong and switches away from balanced
    let changed = result.logs.iter().flat_map(|log| log.actions.iter()).any(|a| {
        matches!(&a.kind, ActionKind::StrategyChanged { profile } if profile == "aggressive")
    });
    assert!(changed);
}

#[test]
fn test_victory_points_match_scoring_log() {
    let (red, blue) = single_squads();
    for preset in [MissionPreset::MatchedPlay, MissionPreset::HoldTwo, MissionPreset::HighStakes] {
        let config = SimulationConfig {
            mission_scoring: preset,
            ..Default::default()
        };
        let result = run_simulation(config, &red, &blue).expect("simulation runs");
        for tag in [ArmyTag::A, ArmyTag::B] {
            let logged: u32 = result
                .logs
                .iter()
                .flat_map(|log| log.actions.iter())
                .filter(|a| a.unit_id == tag.to_string())
                .filter_map(|a| match a.kind {
                    ActionKind::ScoreVictoryPoints { points } => Some(points),
                    _ => None,
                })
                .sum();
            assert_eq!(result.summary.get(tag).victory_points, logged);
        }
    }
}

#[test]
fn test_unknown_terrain_layout_is_an_error() {
    let (red, blue) = single_squads();
    let config = SimulationConfig {
        terrain_layout: Some("swamp".into()),
        ..Default::default()
    };
    assert!(run_simulation(config, &red, &blue).is_err());
}

#[test]
fn test_demo_armies_load_and_fight() {
    let iron = ArmyList::from_json_file(data_path("data/armies/iron_legion.json"))
        .expect("demo list loads");
    let orks = ArmyList::from_json_file(data_path("data/armies/ork_warband.json"))
        .expect("demo list loads");
    let config = SimulationConfig {
        terrain_layout: Some("standard".into()),
        ..Default::default()
    };
    let result = run_simulation(config, &iron, &orks).expect("simulation runs");

    assert_eq!(result.armies[0].units.len(), 4);
    assert_eq!(result.armies[1].units.len(), 4);
    assert!(result.logs.iter().any(|log| log.phase == Phase::Shooting && !log.actions.is_empty()));
}

#[test]
fn test_config_from_toml() {
    let config = SimulationConfig::from_toml_str(
        r#"
            max_rounds = 3
            strategy_profile = "aggressive"
            mission_scoring = "hold-2"
            terrain_layout = "dense"
            seed = 99
        "#,
    )
    .expect("config parses");
    let (red, blue) = single_squads();
    let result = run_simulation(config, &red, &blue).expect("simulation runs");
    assert!(result.rounds_played <= 3);
}

#[test]
fn test_objective_control_from_positions() {
    let red = army_list("Red", &[infantry_unit("red-1", "")]);
    let mut warnings = Vec::new();
    let mut army_a = ArmyState::from_army_list(
        &red,
        ArmyTag::A,
        &HeuristicRoleClassifier,
        &StandardBaseSizes,
        &StandardOracle,
        &mut warnings,
    );
    let mut army_b = ArmyState::from_army_list(
        &army_list("Blue", &[infantry_unit("blue-1", "")]),
        ArmyTag::B,
        &HeuristicRoleClassifier,
        &StandardBaseSizes,
        &StandardOracle,
        &mut warnings,
    );
    army_a.units[0].place_at(Point::new(28.0, 22.0), 60.0, 44.0);
    army_b.units[0].place_at(Point::new(50.0, 22.0), 60.0, 44.0);

    let mut objectives = vec![ObjectiveMarker::new(
        "center",
        Point::new(30.0, 22.0),
        ObjectivePriority::Primary,
    )];
    update_objective_control(&mut objectives, &army_a, &army_b, 1);
    assert_eq!(objectives[0].controlled_by, ControlState::A);
    assert_eq!(objectives[0].level_of_control_a, 10);

    army_b.units[0].place_at(Point::new(33.0, 22.0), 60.0, 44.0);
    update_objective_control(&mut objectives, &army_a, &army_b, 1);
    assert_eq!(objectives[0].controlled_by, ControlState::Contested);
    assert_eq!(objectives[0].held_by_a, 0);
}
