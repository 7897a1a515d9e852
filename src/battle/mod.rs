//! Battle system - two armies fighting it out round by round
//!
//! Phases mutate the armies in place; every phase appends a `PhaseLog`.
//!
//! Layering, leaves first:
//! - geometry and terrain (blocking, line of sight, cover)
//! - navigation mesh and A* pathfinding
//! - the AI planner that proposes destinations
//! - phase executors that apply them and resolve combat through the oracle
//! - objective control and victory points

pub mod ai;
pub mod battle_map;
pub mod constants;
pub mod deployment;
pub mod engagement;
pub mod execution;
pub mod geometry;
pub mod log;
pub mod morale;
pub mod movement;
pub mod navmesh;
pub mod objectives;
pub mod oracle;
pub mod pathfinding;
pub mod ranged;
pub mod reserves;
pub mod resolution;
pub mod terrain;
pub mod unit_type;
pub mod units;

// Re-exports for convenient access
pub use battle_map::Battlefield;
pub use constants::*;
pub use deployment::{assign_reserves, deploy_armies};
pub use engagement::{
    find_all_engagements, resolve_charges, resolve_melee, update_engagement, Engagement,
};
pub use execution::{
    run_simulation, split_armies, ArmySummary, BattleEngine, BattleSummary, EndReason,
    PositionHistory, PositionSnapshot, SimulationResult, UnitPosition,
};
pub use log::{ActionKind, ActionLog, CasualtyLog, MovementDetail, Phase, PhaseLog};
pub use morale::{check_battle_shock, BattleShockResult};
pub use movement::{apply_movement_plan, resolve_collisions};
pub use navmesh::{generate_nav_mesh, NavMesh};
pub use objectives::{
    calculate_victory_points, update_objective_control, ControlState, ObjectiveMarker,
    ObjectivePriority, VictoryPoints,
};
pub use oracle::{AttackContext, CombatOracle, DamageBreakdown, StandardOracle};
pub use pathfinding::{find_path, get_max_travel_point, PathResult, TravelPoint};
pub use ranged::{resolve_shooting, CombatOptions};
pub use reserves::arrive_reserves;
pub use resolution::apply_damage;
pub use terrain::{
    check_line_of_sight, get_terrain_cover, is_movement_blocked, is_position_blocked_by_terrain,
    CoverType, Passability, TerrainFeature, TerrainLayout,
};
pub use unit_type::{
    BaseSizeLookup, HeuristicRoleClassifier, RoleClassifier, RoleInfo, StandardBaseSizes, UnitRole,
};
pub use units::{ArmyState, ReserveType, UnitState};
