//! Battle AI: movement planning and strategy selection
//!
//! The planner is a pure function of the battle state and a strategy
//! profile. The evaluator swaps profiles between phases when adaptive
//! strategy is enabled.

pub mod evaluator;
pub mod planner;
pub mod scoring;
pub mod strategy;

pub use evaluator::{select_profile, BattleSnapshot};
pub use planner::{plan_movement, MovementPlan, PlanRequest, PlannedMove};
pub use scoring::{score_destination, ScoreContext};
pub use strategy::{load_strategy_profile, load_strategy_profile_from, StrategyProfile};
