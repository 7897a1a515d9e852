//! Append-only audit trail of a battle
//!
//! One `PhaseLog` per phase execution. Records are never edited once pushed.

use serde::{Deserialize, Serialize};

use crate::core::types::{ArmyTag, Point, Round};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Deployment,
    Reserves,
    Command,
    Movement,
    Shooting,
    Charge,
    Melee,
    EndOfRound,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Deployment => "deployment",
            Phase::Reserves => "reserves",
            Phase::Command => "command",
            Phase::Movement => "movement",
            Phase::Shooting => "shooting",
            Phase::Charge => "charge",
            Phase::Melee => "melee",
            Phase::EndOfRound => "end-of-round",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ActionKind {
    Deploy,
    ReserveAssigned,
    ReserveArrived,
    ReserveDelayed,
    ObjectiveControl,
    BattleShockTest { roll: u32, leadership: u8, passed: bool },
    BattleShockRecovered,
    StrategyChanged { profile: String },
    Move,
    Advance,
    Hold,
    Shoot,
    Charge { reach: f32, distance: f32 },
    ChargeFailed { reach: f32, distance: f32 },
    ChargeBlocked,
    Fight,
    FightBack,
    ScoreVictoryPoints { points: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLog {
    pub unit_id: String,
    pub unit_name: String,
    pub kind: ActionKind,
    pub target: Option<String>,
    pub weapon: Option<String>,
    pub damage: f32,
    pub description: String,
}

impl ActionLog {
    pub fn new(
        unit_id: impl Into<String>,
        unit_name: impl Into<String>,
        kind: ActionKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            unit_id: unit_id.into(),
            unit_name: unit_name.into(),
            kind,
            target: None,
            weapon: None,
            damage: 0.0,
            description: description.into(),
        }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_weapon(mut self, weapon: impl Into<String>) -> Self {
        self.weapon = Some(weapon.into());
        self
    }

    pub fn with_damage(mut self, damage: f32) -> Self {
        self.damage = damage;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovementDetail {
    pub unit_id: String,
    pub from: Point,
    pub to: Point,
    pub distance: f32,
    pub advanced: bool,
    /// Waypoints followed when the move went around terrain
    pub path: Option<Vec<Point>>,
    /// Stopped short because a path segment was blocked
    pub truncated: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CasualtyLog {
    pub unit_id: String,
    pub unit_name: String,
    pub army: ArmyTag,
    pub damage: f32,
    pub models_lost: u32,
    pub wounds_before: u32,
    pub wounds_after: u32,
    pub destroyed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseLog {
    pub round: Round,
    pub army: Option<ArmyTag>,
    pub phase: Phase,
    pub actions: Vec<ActionLog>,
    pub movements: Vec<MovementDetail>,
    pub casualties: Vec<CasualtyLog>,
    pub damage_dealt: f32,
}

impl PhaseLog {
    pub fn new(round: Round, army: Option<ArmyTag>, phase: Phase) -> Self {
        Self {
            round,
            army,
            phase,
            actions: Vec::new(),
            movements: Vec::new(),
            casualties: Vec::new(),
            damage_dealt: 0.0,
        }
    }

    pub fn push_action(&mut self, action: ActionLog) {
        tracing::debug!(phase = %self.phase, unit = %action.unit_name, "{}", action.description);
        self.damage_dealt += action.damage;
        self.actions.push(action);
    }

    pub fn push_movement(&mut self, movement: MovementDetail) {
        self.movements.push(movement);
    }

    pub fn push_casualty(&mut self, casualty: CasualtyLog) {
        self.casualties.push(casualty);
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty() && self.movements.is_empty() && self.casualties.is_empty()
    }
}
