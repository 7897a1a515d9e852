//! Property-based tests for movement, pathing and objective control.

#![allow(clippy::unwrap_used)]

use proptest::prelude::*;

use wargame_sim::battle::ai::planner::{plan_movement, PlanRequest};
use wargame_sim::battle::ai::strategy::StrategyProfile;
use wargame_sim::battle::*;
use wargame_sim::core::types::{ArmyTag, Point};
use wargame_sim::data::army_list::ArmyList;

fn squad_list(name: &str, ids: &[&str]) -> ArmyList {
    let units: Vec<String> = ids
        .iter()
        .map(|id| {
            format!(
                r#"{{ "id": "{id}", "name": "{id}", "type": "Infantry",
                    "stats": {{ "move": "6\"", "toughness": "4", "save": "3+", "wounds": "2", "leadership": "6+", "objectiveControl": "2" }},
                    "points": 100, "count": 5,
                    "weapons": [{{ "name": "Rifle", "type": "Ranged Weapons",
                        "characteristics": {{ "range": "24\"", "a": "2", "bs": "3+", "s": "4", "ap": "-1", "d": "1" }},
                        "count": 5, "models_with_weapon": 5 }}] }}"#
            )
        })
        .collect();
    let json = format!(r#"{{ "armyName": "{name}", "units": [{}] }}"#, units.join(","));
    ArmyList::from_json_str(&json).unwrap()
}

fn army(tag: ArmyTag, ids: &[&str]) -> ArmyState {
    let mut warnings = Vec::new();
    ArmyState::from_army_list(
        &squad_list(&tag.to_string(), ids),
        tag,
        &HeuristicRoleClassifier,
        &StandardBaseSizes,
        &StandardOracle,
        &mut warnings,
    )
}

fn wall() -> TerrainFeature {
    TerrainFeature::rectangle(
        "wall",
        "Wall",
        Point::new(30.0, 22.0),
        2.0,
        16.0,
        0.0,
        Passability::Impassable,
        CoverType::Heavy,
        true,
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// A path never exceeds its allowance when cut short.
    #[test]
    fn prop_travel_point_within_allowance(
        xs in proptest::collection::vec(0.0f32..60.0, 2..6),
        ys in proptest::collection::vec(0.0f32..44.0, 2..6),
        allowance in 0.0f32..30.0
    ) {
        let path: Vec<Point> = xs.iter().zip(ys.iter()).map(|(x, y)| Point::new(*x, *y)).collect();
        let travel = get_max_travel_point(&path, allowance, &[]);
        prop_assert!(travel.distance_traveled <= allowance + 1e-3);
        prop_assert!(travel.point.distance(path[0]) <= allowance + 1e-3);
    }

    /// Detours around impassable terrain are never shorter than the straight line.
    #[test]
    fn prop_path_at_least_straight_line(y1 in 2.0f32..42.0, y2 in 2.0f32..42.0) {
        let terrain = vec![wall()];
        let mesh = generate_nav_mesh(&terrain, 60.0, 44.0, 1.0);
        let start = Point::new(20.0, y1);
        let end = Point::new(40.0, y2);
        let result = find_path(start, end, &mesh, &terrain, true, false, 0.5);
        if result.found {
            prop_assert!(result.distance + 1e-3 >= start.distance(end));
        }
    }

    /// The controller always brings strictly more objective control.
    #[test]
    fn prop_objective_controller_has_more_oc(
        ax in 20.0f32..40.0, ay in 12.0f32..32.0,
        bx in 20.0f32..40.0, by in 12.0f32..32.0,
        a_shocked in any::<bool>()
    ) {
        let mut a = army(ArmyTag::A, &["a1"]);
        let mut b = army(ArmyTag::B, &["b1"]);
        a.units[0].place_at(Point::new(ax, ay), 60.0, 44.0);
        b.units[0].place_at(Point::new(bx, by), 60.0, 44.0);
        a.units[0].battle_shocked = a_shocked;

        let mut objectives = vec![ObjectiveMarker::new(
            "c",
            Point::new(30.0, 22.0),
            ObjectivePriority::Primary,
        )];
        update_objective_control(&mut objectives, &a, &b, 1);
        let o = &objectives[0];
        match o.controlled_by {
            ControlState::A => prop_assert!(o.level_of_control_a > o.level_of_control_b),
            ControlState::B => prop_assert!(o.level_of_control_b > o.level_of_control_a),
            ControlState::Contested => {
                prop_assert_eq!(o.level_of_control_a, o.level_of_control_b);
                prop_assert_eq!(o.held_by_a, 0);
                prop_assert_eq!(o.held_by_b, 0);
            }
        }
        if a_shocked {
            prop_assert_eq!(o.level_of_control_a, 0);
        }
    }

    /// Beam search of width one picks exactly the greedy plan.
    #[test]
    fn prop_beam_width_one_is_greedy(
        a1 in (4.0f32..16.0, 6.0f32..38.0),
        a2 in (4.0f32..16.0, 6.0f32..38.0),
        b1 in (44.0f32..56.0, 6.0f32..38.0)
    ) {
        let mut active = army(ArmyTag::A, &["a1", "a2"]);
        let mut opponent = army(ArmyTag::B, &["b1"]);
        active.units[0].place_at(Point::new(a1.0, a1.1), 60.0, 44.0);
        active.units[1].place_at(Point::new(a2.0, a2.1), 60.0, 44.0);
        opponent.units[0].place_at(Point::new(b1.0, b1.1), 60.0, 44.0);

        let field = Battlefield::new(60.0, 44.0, 12.0, Vec::new());
        let objectives = field.default_objectives();
        let mesh = generate_nav_mesh(&field.terrain, 60.0, 44.0, 1.0);
        let strategy = StrategyProfile::balanced();
        let request = |beam: bool| PlanRequest {
            active: &active,
            opponent: &opponent,
            objectives: &objectives,
            allow_advance: true,
            width: 60.0,
            height: 44.0,
            strategy: &strategy,
            use_beam_search: beam,
            beam_width: 1,
            terrain: &field.terrain,
            nav_mesh: &mesh,
            oracle: &StandardOracle,
        };
        prop_assert_eq!(plan_movement(&request(false)), plan_movement(&request(true)));
    }
}
