//! Battle constants - all tunable values in one place
//!
//! Distances are in inches.

// Board
pub const DEFAULT_BOARD_WIDTH: f32 = 60.0;
pub const DEFAULT_BOARD_HEIGHT: f32 = 44.0;

// Engagement and charges
pub const ENGAGEMENT_RANGE: f32 = 1.0;
pub const AVERAGE_CHARGE_ROLL: f32 = 7.0;
pub const MAX_CHARGE_RANGE: f32 = 12.0;
/// Charging units stop this far short of base contact
pub const CHARGE_STOP_GAP: f32 = 0.5;
pub const ADVANCE_BONUS: f32 = 3.0;

// Objectives
pub const OBJECTIVE_CONTROL_RANGE: f32 = 3.0;

// Reserves
pub const RESERVES_FIRST_ROUND: u32 = 2;
pub const DEEP_STRIKE_MIN_DISTANCE: f32 = 9.0;
pub const STRATEGIC_RESERVE_EDGE_DISTANCE: f32 = 6.0;
pub const MAX_RESERVE_FRACTION: f32 = 0.5;
pub const MAX_STRATEGIC_RESERVE_POINTS_FRACTION: f32 = 0.25;
pub const DEEP_STRIKE_Y_OFFSETS: [f32; 7] = [0.0, 4.0, -4.0, 8.0, -8.0, 12.0, -12.0];

// Deployment
pub const INFILTRATOR_ENEMY_ZONE_GAP: f32 = 9.0;
pub const INFILTRATOR_FORWARD_DEPTH: f32 = 6.0;
pub const COUNTER_DEPLOY_THREATS: usize = 3;

// Battle shock
pub const EXPECTED_LEADERSHIP_ROLL: u32 = 7;

// Models and bases
pub const DEFAULT_BASE_RADIUS: f32 = 0.63;
pub const MODEL_SPACING: f32 = 1.0;

// Collision and terrain ejection
pub const COLLISION_ITERATIONS: usize = 4;
pub const COLLISION_EPSILON: f32 = 0.01;
pub const TERRAIN_EJECT_BUFFER: f32 = 0.5;

// Pathfinding
pub const NAV_CLEARANCE_BUFFER: f32 = 0.5;
pub const NAV_BOUNDARY_SPACING: f32 = 12.0;
pub const DIFFICULT_TERRAIN_PENALTY: f32 = 2.0;
pub const PATH_EPSILON: f32 = 1e-3;

// Planner
pub const PLANNER_DIRECTIONS: usize = 12;
pub const THREAT_RANGE_BUFFER: f32 = 6.0;
pub const CROWDING_PENALTY: f32 = 2.0;
pub const OBJECTIVE_OVERCOMMIT_PENALTY: f32 = 0.5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_caps_ordered() {
        assert!(MAX_STRATEGIC_RESERVE_POINTS_FRACTION < MAX_RESERVE_FRACTION);
    }

    #[test]
    fn test_charge_stops_inside_engagement() {
        assert!(CHARGE_STOP_GAP < ENGAGEMENT_RANGE);
        assert!(CHARGE_STOP_GAP > 0.0);
    }

    #[test]
    fn test_deep_strike_offsets_start_centered() {
        assert_eq!(DEEP_STRIKE_Y_OFFSETS[0], 0.0);
    }
}
