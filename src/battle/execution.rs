//! Battle execution loop
//!
//! Deployment, then each round: per army in initiative order
//! reserves -> command -> movement -> shooting -> charge -> melee,
//! then end-of-round scoring. The battle ends when an army is wiped out
//! (checked after every damaging phase) or after `max_rounds`.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::battle::ai::evaluator::{select_profile, BattleSnapshot};
use crate::battle::ai::planner::{plan_movement, PlanRequest};
use crate::battle::ai::strategy::{load_strategy_profile, StrategyProfile};
use crate::battle::battle_map::Battlefield;
use crate::battle::constants::{DEFAULT_BASE_RADIUS, NAV_CLEARANCE_BUFFER, RESERVES_FIRST_ROUND};
use crate::battle::deployment::deploy_armies;
use crate::battle::engagement::{resolve_charges, resolve_melee, update_engagement};
use crate::battle::log::{ActionKind, ActionLog, Phase, PhaseLog};
use crate::battle::morale::{clear_expired_battle_shock, run_battle_shock_tests};
use crate::battle::movement::apply_movement_plan;
use crate::battle::navmesh::{generate_nav_mesh, NavMesh};
use crate::battle::objectives::{
    score_for_army, update_objective_control, ObjectiveMarker, VictoryPoints,
};
use crate::battle::oracle::{CombatOracle, StandardOracle};
use crate::battle::ranged::{resolve_shooting, CombatOptions};
use crate::battle::reserves::arrive_reserves;
use crate::battle::unit_type::{HeuristicRoleClassifier, StandardBaseSizes};
use crate::battle::units::ArmyState;
use crate::core::config::SimulationConfig;
use crate::core::error::{record_warning, Result};
use crate::core::types::{ArmyTag, Point, Round};
use crate::data::army_list::ArmyList;

/// Why the battle stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndReason {
    ArmyDestroyed,
    MaxRounds,
}

/// Where one unit stood at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitPosition {
    pub unit_id: String,
    pub army: ArmyTag,
    pub position: Option<Point>,
    pub remaining_models: u32,
    pub in_reserves: bool,
}

/// Copy of every unit's position after a phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSnapshot {
    pub round: Round,
    pub army: Option<ArmyTag>,
    pub phase: Phase,
    pub units: Vec<UnitPosition>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PositionHistory {
    /// After deployment
    pub start: Vec<UnitPosition>,
    /// When the battle ended
    pub end: Vec<UnitPosition>,
    /// After each army's turn
    pub per_turn: Vec<PositionSnapshot>,
    /// After every phase that can move a unit
    pub timeline: Vec<PositionSnapshot>,
}

/// Per-army totals for the result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArmySummary {
    pub damage_dealt: f32,
    pub damage_taken: f32,
    pub survivors: usize,
    pub total_units: usize,
    pub victory_points: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BattleSummary {
    pub a: ArmySummary,
    pub b: ArmySummary,
}

impl BattleSummary {
    pub fn get(&self, tag: ArmyTag) -> &ArmySummary {
        match tag {
            ArmyTag::A => &self.a,
            ArmyTag::B => &self.b,
        }
    }
}

/// Everything a finished run produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub starting_distance: f32,
    pub initiative: ArmyTag,
    pub logs: Vec<PhaseLog>,
    pub armies: Vec<ArmyState>,
    pub battlefield: Battlefield,
    pub objectives: Vec<ObjectiveMarker>,
    pub positions: PositionHistory,
    pub end_reason: EndReason,
    pub rounds_played: Round,
    pub winner: Option<ArmyTag>,
    pub summary: BattleSummary,
    /// Data problems recovered from during loading and play
    pub warnings: Vec<String>,
}

/// Lend both armies out mutably, the active one first
pub fn split_armies(
    armies: &mut [ArmyState; 2],
    active: ArmyTag,
) -> (&mut ArmyState, &mut ArmyState) {
    let (a, b) = armies.split_at_mut(1);
    match active {
        ArmyTag::A => (&mut a[0], &mut b[0]),
        ArmyTag::B => (&mut b[0], &mut a[0]),
    }
}

/// Side with survivors, or strictly more survivors; otherwise a draw
pub fn decide_winner(army_a: &ArmyState, army_b: &ArmyState) -> Option<ArmyTag> {
    let a = army_a.survivors();
    let b = army_b.survivors();
    if a > b {
        Some(ArmyTag::A)
    } else if b > a {
        Some(ArmyTag::B)
    } else {
        None
    }
}

/// Runs one battle from deployment to its end
pub struct BattleEngine {
    config: SimulationConfig,
    field: Battlefield,
    nav_mesh: NavMesh,
    armies: [ArmyState; 2],
    objectives: Vec<ObjectiveMarker>,
    oracle: Box<dyn CombatOracle>,
    rng: Box<dyn RngCore>,
    strategies: [StrategyProfile; 2],
    vp: VictoryPoints,
    round: Round,
    logs: Vec<PhaseLog>,
    positions: PositionHistory,
    warnings: Vec<String>,
}

impl BattleEngine {
    /// Engine over two prepared armies
    ///
    /// Fails only on configuration problems: invalid values, an unknown
    /// strategy profile or terrain layout.
    pub fn new(config: SimulationConfig, army_a: ArmyState, army_b: ArmyState) -> Result<Self> {
        config.validate()?;
        let strategy = load_strategy_profile(&config.strategy_profile)?;
        let terrain = config.resolved_terrain()?;
        let field = Battlefield::new(
            config.board_width,
            config.board_height,
            config.deploy_depth(),
            terrain,
        );
        let nav_mesh = generate_nav_mesh(
            &field.terrain,
            field.width,
            field.height,
            DEFAULT_BASE_RADIUS + NAV_CLEARANCE_BUFFER,
        );
        let objectives = field.default_objectives();
        let rng = Box::new(ChaCha8Rng::seed_from_u64(config.seed));

        // Army tags follow the slot, whatever the caller built them with
        let mut army_a = army_a;
        let mut army_b = army_b;
        for (army, tag) in [(&mut army_a, ArmyTag::A), (&mut army_b, ArmyTag::B)] {
            army.tag = tag;
            for unit in &mut army.units {
                unit.army = tag;
            }
        }

        tracing::info!(
            army_a = %army_a.army_name,
            army_b = %army_b.army_name,
            terrain = field.terrain.len(),
            waypoints = nav_mesh.len(),
            seed = config.seed,
            "Battle engine ready"
        );

        Ok(Self {
            config,
            field,
            nav_mesh,
            armies: [army_a, army_b],
            objectives,
            oracle: Box::new(StandardOracle),
            rng,
            strategies: [strategy.clone(), strategy],
            vp: VictoryPoints::default(),
            round: 0,
            logs: Vec::new(),
            positions: PositionHistory::default(),
            warnings: Vec::new(),
        })
    }

    /// Engine over two rosters, classified with the standard heuristics
    pub fn from_army_lists(
        config: SimulationConfig,
        list_a: &ArmyList,
        list_b: &ArmyList,
    ) -> Result<Self> {
        let mut warnings = Vec::new();
        let oracle = StandardOracle;
        let classifier = HeuristicRoleClassifier;
        let bases = StandardBaseSizes;
        let army_a = ArmyState::from_army_list(
            list_a,
            ArmyTag::A,
            &classifier,
            &bases,
            &oracle,
            &mut warnings,
        );
        let army_b = ArmyState::from_army_list(
            list_b,
            ArmyTag::B,
            &classifier,
            &bases,
            &oracle,
            &mut warnings,
        );
        let mut engine = Self::new(config, army_a, army_b)?;
        engine.warnings = warnings;
        Ok(engine)
    }

    /// Replace the dice generator
    pub fn with_rng<R: RngCore + 'static>(mut self, rng: R) -> Self {
        self.rng = Box::new(rng);
        self
    }

    /// Replace the damage oracle
    pub fn with_oracle<O: CombatOracle + 'static>(mut self, oracle: O) -> Self {
        self.oracle = Box::new(oracle);
        self
    }

    /// Replace the objective layout
    pub fn with_objectives(mut self, objectives: Vec<ObjectiveMarker>) -> Self {
        self.objectives = objectives;
        self
    }

    pub fn battlefield(&self) -> &Battlefield {
        &self.field
    }

    pub fn army(&self, tag: ArmyTag) -> &ArmyState {
        &self.armies[tag.index()]
    }

    fn combat_options(&self) -> CombatOptions {
        CombatOptions {
            include_one_time_weapons: self.config.include_one_time_weapons,
            use_dice_rolls: self.config.use_dice_rolls,
        }
    }

    fn either_destroyed(&self) -> bool {
        self.armies.iter().any(|a| a.is_destroyed())
    }

    fn unit_positions(&self) -> Vec<UnitPosition> {
        self.armies
            .iter()
            .flat_map(|army| army.units.iter())
            .map(|unit| UnitPosition {
                unit_id: unit.id.clone(),
                army: unit.army,
                position: unit.position,
                remaining_models: unit.remaining_models,
                in_reserves: unit.in_reserves,
            })
            .collect()
    }

    fn snapshot(&self, army: Option<ArmyTag>, phase: Phase) -> PositionSnapshot {
        PositionSnapshot {
            round: self.round,
            army,
            phase,
            units: self.unit_positions(),
        }
    }

    fn push_log(&mut self, log: PhaseLog) {
        tracing::debug!(
            round = log.round,
            phase = %log.phase,
            actions = log.actions.len(),
            damage = log.damage_dealt,
            "Phase complete"
        );
        self.logs.push(log);
    }

    fn deployment(&mut self) {
        let mut log = PhaseLog::new(0, None, Phase::Deployment);
        let (army_a, army_b) = split_armies(&mut self.armies, ArmyTag::A);
        deploy_armies(army_a, army_b, &self.field, &self.config, &mut log, &mut self.warnings);
        for army in &mut self.armies {
            army.check_consistency(&mut self.warnings);
        }
        update_engagement_pair(&mut self.armies);
        self.push_log(log);
        self.positions.start = self.unit_positions();
        let snapshot = self.snapshot(None, Phase::Deployment);
        self.positions.timeline.push(snapshot);
    }

    fn reserves_phase(&mut self, tag: ArmyTag) {
        let mut log = PhaseLog::new(self.round, Some(tag), Phase::Reserves);
        let (active, enemy) = split_armies(&mut self.armies, tag);
        let arrived = arrive_reserves(active, enemy, &self.field, self.round, &mut log);
        if !log.is_empty() {
            self.push_log(log);
        }
        if arrived > 0 {
            let snapshot = self.snapshot(Some(tag), Phase::Reserves);
            self.positions.timeline.push(snapshot);
        }
    }

    fn command_phase(&mut self, tag: ArmyTag) {
        let mut log = PhaseLog::new(self.round, Some(tag), Phase::Command);

        update_objective_control(
            &mut self.objectives,
            &self.armies[0],
            &self.armies[1],
            self.round,
        );
        let held: Vec<&str> = self
            .objectives
            .iter()
            .filter(|o| o.controlled_by.side() == Some(tag))
            .map(|o| o.id.as_str())
            .collect();
        if !held.is_empty() {
            log.push_action(ActionLog::new(
                tag.to_string(),
                self.armies[tag.index()].army_name.clone(),
                ActionKind::ObjectiveControl,
                format!("Army {} controls {}", tag, held.join(", ")),
            ));
        }

        let scoring = self.config.scoring();
        if !scoring.end_of_round_score {
            let points = score_for_army(&self.objectives, &scoring, tag);
            if points > 0 {
                self.vp.add(tag, points);
                log.push_action(ActionLog::new(
                    tag.to_string(),
                    self.armies[tag.index()].army_name.clone(),
                    ActionKind::ScoreVictoryPoints { points },
                    format!("Army {} scores {} VP", tag, points),
                ));
            }
        }

        run_battle_shock_tests(
            &mut self.armies[tag.index()],
            self.round,
            self.config.use_dice_rolls,
            self.rng.as_mut(),
            &mut log,
        );

        if self.config.use_adaptive_strategy {
            self.adapt_strategy(tag, &mut log);
        }
        self.push_log(log);
    }

    fn adapt_strategy(&mut self, tag: ArmyTag, log: &mut PhaseLog) {
        let army = &self.armies[tag.index()];
        let opponent = &self.armies[tag.opponent().index()];
        let snapshot = BattleSnapshot::capture(
            army,
            opponent,
            &self.objectives,
            &self.vp,
            self.round,
        );
        let name = select_profile(&snapshot, &self.config.strategy_profile);
        if name == self.strategies[tag.index()].name {
            return;
        }
        match load_strategy_profile(&name) {
            Ok(profile) => {
                tracing::info!(
                    army = %tag,
                    round = self.round,
                    profile = %name,
                    "Strategy changed"
                );
                log.push_action(ActionLog::new(
                    tag.to_string(),
                    army.army_name.clone(),
                    ActionKind::StrategyChanged { profile: name.clone() },
                    format!("Army {} switches to the {} profile", tag, name),
                ));
                self.strategies[tag.index()] = profile;
            }
            Err(err) => record_warning(
                &mut self.warnings,
                format!("Keeping current strategy: {}", err),
            ),
        }
    }

    fn movement_phase(&mut self, tag: ArmyTag) {
        let mut log = PhaseLog::new(self.round, Some(tag), Phase::Movement);
        let plan = {
            let request = PlanRequest {
                active: &self.armies[tag.index()],
                opponent: &self.armies[tag.opponent().index()],
                objectives: &self.objectives,
                allow_advance: self.config.allow_advance,
                width: self.field.width,
                height: self.field.height,
                strategy: &self.strategies[tag.index()],
                use_beam_search: self.config.use_beam_search,
                beam_width: self.config.beam_width,
                terrain: &self.field.terrain,
                nav_mesh: &self.nav_mesh,
                oracle: self.oracle.as_ref(),
            };
            plan_movement(&request)
        };

        let (active, enemy) = split_armies(&mut self.armies, tag);
        apply_movement_plan(active, enemy, &plan, &self.field, &mut log);
        update_engagement(active, enemy);
        self.push_log(log);
        let snapshot = self.snapshot(Some(tag), Phase::Movement);
        self.positions.timeline.push(snapshot);
    }

    fn shooting_phase(&mut self, tag: ArmyTag) {
        let mut log = PhaseLog::new(self.round, Some(tag), Phase::Shooting);
        let options = self.combat_options();
        let (active, enemy) = split_armies(&mut self.armies, tag);
        resolve_shooting(
            active,
            enemy,
            &self.field,
            self.oracle.as_ref(),
            options,
            self.rng.as_mut(),
            &mut log,
        );
        self.push_log(log);
    }

    fn charge_phase(&mut self, tag: ArmyTag) {
        let mut log = PhaseLog::new(self.round, Some(tag), Phase::Charge);
        let (active, enemy) = split_armies(&mut self.armies, tag);
        let charged = resolve_charges(
            active,
            enemy,
            &self.field,
            &self.nav_mesh,
            self.config.random_charge,
            self.rng.as_mut(),
            &mut log,
        );
        self.push_log(log);
        if charged > 0 {
            let snapshot = self.snapshot(Some(tag), Phase::Charge);
            self.positions.timeline.push(snapshot);
        }
    }

    fn melee_phase(&mut self, tag: ArmyTag) {
        let mut log = PhaseLog::new(self.round, Some(tag), Phase::Melee);
        let options = self.combat_options();
        let (active, enemy) = split_armies(&mut self.armies, tag);
        resolve_melee(
            active,
            enemy,
            &self.field,
            self.oracle.as_ref(),
            options,
            self.rng.as_mut(),
            &mut log,
        );
        self.push_log(log);
    }

    /// One army's turn; true when the battle is over
    fn army_turn(&mut self, tag: ArmyTag) -> bool {
        for unit in &mut self.armies[tag.index()].units {
            unit.reset_turn_flags();
        }
        if self.round >= RESERVES_FIRST_ROUND {
            self.reserves_phase(tag);
        }
        self.command_phase(tag);
        self.movement_phase(tag);

        self.shooting_phase(tag);
        if self.either_destroyed() {
            return true;
        }

        self.charge_phase(tag);
        self.melee_phase(tag);
        if self.either_destroyed() {
            return true;
        }

        let snapshot = self.snapshot(Some(tag), Phase::Melee);
        self.positions.per_turn.push(snapshot);
        false
    }

    fn end_of_round(&mut self) {
        let mut log = PhaseLog::new(self.round, None, Phase::EndOfRound);
        update_objective_control(
            &mut self.objectives,
            &self.armies[0],
            &self.armies[1],
            self.round,
        );
        let scoring = self.config.scoring();
        if scoring.end_of_round_score {
            for tag in [ArmyTag::A, ArmyTag::B] {
                let points = score_for_army(&self.objectives, &scoring, tag);
                if points == 0 {
                    continue;
                }
                self.vp.add(tag, points);
                log.push_action(ActionLog::new(
                    tag.to_string(),
                    self.armies[tag.index()].army_name.clone(),
                    ActionKind::ScoreVictoryPoints { points },
                    format!("Army {} scores {} VP", tag, points),
                ));
            }
        }
        tracing::info!(round = self.round, vp_a = self.vp.a, vp_b = self.vp.b, "Round complete");
        self.push_log(log);
    }

    /// Play the battle to the end
    pub fn run(mut self) -> SimulationResult {
        self.deployment();

        let initiative = self.config.initiative;
        let mut end_reason = EndReason::MaxRounds;
        'rounds: for round in 1..=self.config.max_rounds {
            self.round = round;
            for army in &mut self.armies {
                let mut log = PhaseLog::new(round, Some(army.tag), Phase::Command);
                clear_expired_battle_shock(army, round, &mut log);
                if !log.is_empty() {
                    self.logs.push(log);
                }
            }

            for tag in [initiative, initiative.opponent()] {
                if self.army_turn(tag) {
                    end_reason = EndReason::ArmyDestroyed;
                    break 'rounds;
                }
            }
            self.end_of_round();
        }

        self.finish(end_reason)
    }

    fn finish(mut self, end_reason: EndReason) -> SimulationResult {
        self.positions.end = self.unit_positions();
        let winner = decide_winner(&self.armies[0], &self.armies[1]);

        let mut summary = BattleSummary::default();
        for tag in [ArmyTag::A, ArmyTag::B] {
            let army = &self.armies[tag.index()];
            let taken: f32 = self
                .logs
                .iter()
                .flat_map(|log| log.casualties.iter())
                .filter(|c| c.army == tag)
                .map(|c| c.damage)
                .sum();
            let entry = match tag {
                ArmyTag::A => &mut summary.a,
                ArmyTag::B => &mut summary.b,
            };
            entry.damage_taken = taken;
            entry.survivors = army.survivors();
            entry.total_units = army.units.len();
            entry.victory_points = self.vp.get(tag);
        }
        summary.a.damage_dealt = summary.b.damage_taken;
        summary.b.damage_dealt = summary.a.damage_taken;

        tracing::info!(
            rounds = self.round,
            reason = ?end_reason,
            winner = ?winner,
            survivors_a = summary.a.survivors,
            survivors_b = summary.b.survivors,
            "Battle finished"
        );

        let [army_a, army_b] = self.armies;
        SimulationResult {
            starting_distance: self.config.starting_distance,
            initiative: self.config.initiative,
            logs: self.logs,
            armies: vec![army_a, army_b],
            battlefield: self.field,
            objectives: self.objectives,
            positions: self.positions,
            end_reason,
            rounds_played: self.round,
            winner,
            summary,
            warnings: self.warnings,
        }
    }
}

fn update_engagement_pair(armies: &mut [ArmyState; 2]) {
    let (a, b) = split_armies(armies, ArmyTag::A);
    update_engagement(a, b);
}

/// Build an engine from two rosters and run it
pub fn run_simulation(
    config: SimulationConfig,
    list_a: &ArmyList,
    list_b: &ArmyList,
) -> Result<SimulationResult> {
    Ok(BattleEngine::from_army_lists(config, list_a, list_b)?.run())
}
