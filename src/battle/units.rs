//! Unit and army state during a battle
//!
//! `UnitState` is the mutable projection of a read-only `UnitTemplate`.
//! Destroyed units stay in their army with zero models and are filtered
//! out of targeting.

use serde::{Deserialize, Serialize};

use crate::battle::constants::MODEL_SPACING;
use crate::battle::oracle::CombatOracle;
use crate::battle::unit_type::{BaseSizeLookup, RoleClassifier, RoleInfo};
use crate::core::error::record_warning;
use crate::core::types::{clamp_to_board, ArmyTag, Point, Round};
use crate::data::army_list::{ArmyList, UnitTemplate};

/// How a unit is held off the table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReserveType {
    DeepStrike,
    StrategicReserves,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPosition {
    pub point: Point,
    pub alive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitState {
    pub id: String,
    pub name: String,
    pub army: ArmyTag,
    pub template: UnitTemplate,
    pub remaining_models: u32,
    pub remaining_wounds: u32,
    /// Total damage suffered, fractional in expected-value mode
    pub damage_taken: f32,
    /// Unit centre; `None` while in reserves
    pub position: Option<Point>,
    pub model_positions: Vec<ModelPosition>,
    pub engaged: bool,
    pub advanced: bool,
    pub charged: bool,
    pub remained_stationary: bool,
    pub in_reserves: bool,
    pub reserve_type: Option<ReserveType>,
    pub arrived_round: Option<Round>,
    pub battle_shocked: bool,
    pub battle_shocked_until_round: Option<Round>,
    pub role: RoleInfo,
    pub base_radius: f32,
    /// Radius of the circle enclosing every alive model's base
    pub footprint_radius: f32,
}

impl UnitState {
    pub fn new(template: UnitTemplate, army: ArmyTag, role: RoleInfo, base_radius: f32) -> Self {
        let remaining_models = template.model_count;
        let remaining_wounds = template.max_wounds();
        Self {
            id: template.id.clone(),
            name: template.name.clone(),
            army,
            remaining_models,
            remaining_wounds,
            damage_taken: 0.0,
            position: None,
            model_positions: Vec::new(),
            engaged: false,
            advanced: false,
            charged: false,
            remained_stationary: false,
            in_reserves: false,
            reserve_type: None,
            arrived_round: None,
            battle_shocked: false,
            battle_shocked_until_round: None,
            role,
            base_radius,
            footprint_radius: base_radius,
            template,
        }
    }

    pub fn is_destroyed(&self) -> bool {
        self.remaining_models == 0
    }

    /// Alive and deployed on the table
    pub fn is_on_board(&self) -> bool {
        !self.is_destroyed() && !self.in_reserves && self.position.is_some()
    }

    pub fn wounds_per_model(&self) -> u32 {
        self.template.stats.wounds.max(1)
    }

    pub fn max_wounds(&self) -> u32 {
        self.template.max_wounds()
    }

    pub fn movement(&self) -> f32 {
        self.template.stats.movement
    }

    pub fn is_infantry(&self) -> bool {
        self.template.is_infantry
    }

    pub fn is_large(&self) -> bool {
        self.template.is_large
    }

    pub fn points(&self) -> u32 {
        self.template.points
    }

    /// Below half strength for battle-shock purposes
    pub fn below_half_strength(&self) -> bool {
        if self.template.model_count > 1 {
            (self.remaining_models as f32) < self.template.model_count as f32 / 2.0
        } else {
            (self.remaining_wounds as f32) < self.max_wounds() as f32 / 2.0
        }
    }

    /// Objective control this unit exerts right now
    pub fn objective_control(&self) -> u32 {
        if self.battle_shocked || !self.is_on_board() {
            0
        } else {
            self.template.stats.objective_control * self.remaining_models
        }
    }

    pub fn alive_points(&self) -> impl Iterator<Item = Point> + '_ {
        self.model_positions.iter().filter(|m| m.alive).map(|m| m.point)
    }

    pub fn alive_model_count(&self) -> usize {
        self.model_positions.iter().filter(|m| m.alive).count()
    }

    /// Edge-to-edge gap between two units' footprints (negative when overlapping)
    pub fn gap_to(&self, other: &UnitState) -> f32 {
        match (self.position, other.position) {
            (Some(a), Some(b)) => a.distance(b) - self.footprint_radius - other.footprint_radius,
            _ => f32::INFINITY,
        }
    }

    /// Closest edge-to-edge distance between any two alive models
    pub fn closest_model_gap(&self, other: &UnitState) -> f32 {
        let mut best = f32::INFINITY;
        for a in self.alive_points() {
            for b in other.alive_points() {
                best = best.min(a.distance(b) - self.base_radius - other.base_radius);
            }
        }
        best
    }

    /// Lay the unit out in a grid around `center`
    pub fn place_at(&mut self, center: Point, width: f32, height: f32) {
        let count = self.remaining_models as usize;
        let spacing = 2.0 * self.base_radius + MODEL_SPACING;
        // Columns run along y so the unit presents a broad front
        let cols = (count as f32).sqrt().ceil().max(1.0) as usize;
        let rows = count.div_ceil(cols).max(1);
        let origin = Point::new(
            -(rows as f32 - 1.0) * spacing / 2.0,
            -(cols as f32 - 1.0) * spacing / 2.0,
        );

        let center = clamp_to_board(center, self.base_radius, width, height);
        self.model_positions = (0..count)
            .map(|i| {
                let offset = origin + Point::new(
                    (i / cols) as f32 * spacing,
                    (i % cols) as f32 * spacing,
                );
                ModelPosition {
                    point: clamp_to_board(center + offset, self.base_radius, width, height),
                    alive: true,
                }
            })
            .collect();
        self.position = Some(center);
        self.in_reserves = false;
        self.refresh_footprint();
    }

    /// Shift every model by the same offset as the unit centre
    pub fn move_to(&mut self, destination: Point, width: f32, height: f32) {
        let Some(current) = self.position else {
            return;
        };
        let destination = clamp_to_board(destination, self.base_radius, width, height);
        let delta = destination - current;
        for model in &mut self.model_positions {
            model.point = clamp_to_board(model.point + delta, self.base_radius, width, height);
        }
        self.position = Some(destination);
        self.refresh_footprint();
    }

    /// Recompute the enclosing radius from alive models
    pub fn refresh_footprint(&mut self) {
        let alive: Vec<Point> = self.alive_points().collect();
        if alive.is_empty() {
            self.footprint_radius = self.base_radius;
            return;
        }
        let Some(center) = self.position else {
            return;
        };
        let spread = alive.iter().map(|p| p.distance(center)).fold(0.0, f32::max);
        self.footprint_radius = spread + self.base_radius;
    }

    /// Take the unit off the table into reserves
    pub fn send_to_reserves(&mut self, reserve_type: ReserveType) {
        self.in_reserves = true;
        self.reserve_type = Some(reserve_type);
        self.position = None;
        self.model_positions.clear();
    }

    /// Mark models dead from the back of the formation until the alive count matches
    pub fn sync_model_positions(&mut self) {
        let mut alive = self.alive_model_count() as u32;
        for model in self.model_positions.iter_mut().rev() {
            if alive <= self.remaining_models {
                break;
            }
            if model.alive {
                model.alive = false;
                alive -= 1;
            }
        }
        self.refresh_footprint();
    }

    /// Reset per-turn flags at the start of the unit's activation
    pub fn reset_turn_flags(&mut self) {
        self.advanced = false;
        self.charged = false;
        self.remained_stationary = false;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmyState {
    pub tag: ArmyTag,
    pub army_name: String,
    pub faction: String,
    pub units: Vec<UnitState>,
}

impl ArmyState {
    pub fn new(
        tag: ArmyTag,
        army_name: impl Into<String>,
        faction: impl Into<String>,
        units: Vec<UnitState>,
    ) -> Self {
        Self {
            tag,
            army_name: army_name.into(),
            faction: faction.into(),
            units,
        }
    }

    /// Build unit states from a roster, classifying roles and base sizes
    pub fn from_army_list(
        list: &ArmyList,
        tag: ArmyTag,
        classifier: &dyn RoleClassifier,
        bases: &dyn BaseSizeLookup,
        oracle: &dyn CombatOracle,
        warnings: &mut Vec<String>,
    ) -> Self {
        let mut units: Vec<UnitState> = list
            .templates(warnings)
            .into_iter()
            .map(|template| {
                let role = classifier.classify(&template, oracle);
                let base = bases.base_radius(&template);
                UnitState::new(template, tag, role, base)
            })
            .collect();

        // Unit ids must be unique within an army for lookups
        for i in 0..units.len() {
            let duplicate = units[..i].iter().any(|u| u.id == units[i].id);
            if units[i].id.is_empty() || duplicate {
                let fresh = format!("{}-{}", tag, i);
                record_warning(
                    warnings,
                    format!(
                        "{}: missing or duplicate unit id '{}', using '{}'",
                        units[i].name,
                        units[i].id,
                        fresh
                    ),
                );
                units[i].id = fresh;
            }
        }

        Self::new(tag, list.army_name.clone(), list.faction.clone(), units)
    }

    pub fn unit(&self, id: &str) -> Option<&UnitState> {
        self.units.iter().find(|u| u.id == id)
    }

    pub fn unit_index(&self, id: &str) -> Option<usize> {
        self.units.iter().position(|u| u.id == id)
    }

    pub fn on_board_units(&self) -> impl Iterator<Item = &UnitState> {
        self.units.iter().filter(|u| u.is_on_board())
    }

    pub fn total_points(&self) -> u32 {
        self.units.iter().map(|u| u.points()).sum()
    }

    /// Units with at least one model left
    pub fn survivors(&self) -> usize {
        self.units.iter().filter(|u| !u.is_destroyed()).count()
    }

    pub fn is_destroyed(&self) -> bool {
        self.units.iter().all(|u| u.is_destroyed())
    }

    /// Sum of remaining wounds over every unit
    pub fn remaining_wounds(&self) -> u32 {
        self.units.iter().map(|u| u.remaining_wounds).sum()
    }

    pub fn max_wounds(&self) -> u32 {
        self.units.iter().map(|u| u.max_wounds()).sum()
    }

    /// Warn and repair where alive model markers disagree with the model count
    pub fn check_consistency(&mut self, warnings: &mut Vec<String>) {
        for unit in &mut self.units {
            if unit.in_reserves || unit.position.is_none() {
                continue;
            }
            let alive = unit.alive_model_count() as u32;
            if alive != unit.remaining_models {
                record_warning(
                    warnings,
                    format!(
                        "{}: {} alive model markers but {} models remaining",
                        unit.name, alive, unit.remaining_models
                    ),
                );
                if alive > unit.remaining_models {
                    unit.sync_model_positions();
                } else {
                    let mut revive = unit.remaining_models - alive;
                    for model in unit.model_positions.iter_mut().filter(|m| !m.alive) {
                        if revive == 0 {
                            break;
                        }
                        model.alive = true;
                        revive -= 1;
                    }
                    if revive > 0 {
                        unit.remaining_models -= revive;
                    }
                    unit.refresh_footprint();
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::data::army_list::UnitStats;
    use crate::data::weapons::{DiceExpr, Weapon, WeaponKind};

    pub fn rifle() -> Weapon {
        Weapon {
            id: "rifle".into(),
            name: "Rifle".into(),
            kind: WeaponKind::Ranged,
            range: 24.0,
            attacks: DiceExpr::fixed(2),
            skill: 3,
            strength: 4,
            ap: 1,
            damage: DiceExpr::fixed(1),
            abilities: Vec::new(),
            count: 5,
            models_with_weapon: 5,
            linked: None,
        }
    }

    pub fn blade() -> Weapon {
        Weapon {
            id: "blade".into(),
            name: "Blade".into(),
            kind: WeaponKind::Melee,
            range: 0.0,
            attacks: DiceExpr::fixed(3),
            skill: 3,
            strength: 5,
            ap: 2,
            damage: DiceExpr::fixed(1),
            abilities: Vec::new(),
            count: 5,
            models_with_weapon: 5,
            linked: None,
        }
    }

    pub fn template(id: &str, models: u32, weapons: Vec<Weapon>) -> UnitTemplate {
        UnitTemplate {
            id: id.into(),
            name: format!("Unit {}", id),
            category: "Infantry".into(),
            stats: UnitStats {
                movement: 6.0,
                toughness: 4,
                save: 3,
                wounds: 2,
                leadership: 6,
                objective_control: 2,
            },
            points: 100,
            model_count: models,
            weapons,
            rules: Vec::new(),
            abilities: Vec::new(),
            keywords: vec!["INFANTRY".into()],
            invulnerable_save: None,
            feel_no_pain: None,
            deep_strike: false,
            infiltrators: false,
            stealth: false,
            ignores_obscuring: false,
            is_infantry: true,
            is_large: false,
        }
    }

    pub fn unit(id: &str, army: ArmyTag, models: u32) -> UnitState {
        UnitState::new(
            template(id, models, vec![rifle(), blade()]),
            army,
            RoleInfo::default(),
            0.63,
        )
    }

    pub fn test_army(tag: ArmyTag, units: Vec<UnitState>) -> ArmyState {
        ArmyState::new(tag, tag.to_string(), "Test", units)
    }

    pub fn placed(id: &str, army: ArmyTag, models: u32, at: Point) -> UnitState {
        let mut u = unit(id, army, models);
        u.place_at(at, 60.0, 44.0);
        u
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn test_new_unit_full_strength() {
        let u = unit("u1", ArmyTag::A, 5);
        assert_eq!(u.remaining_models, 5);
        assert_eq!(u.remaining_wounds, 10);
        assert!(!u.is_on_board());
        assert!(!u.below_half_strength());
    }

    #[test]
    fn test_place_at_lays_out_every_model() {
        let u = placed("u1", ArmyTag::A, 5, Point::new(10.0, 20.0));
        assert_eq!(u.model_positions.len(), 5);
        assert_eq!(u.alive_model_count(), 5);
        assert!(u.is_on_board());
        assert!(u.footprint_radius > u.base_radius);
        // No two models overlap
        for (i, a) in u.model_positions.iter().enumerate() {
            for b in &u.model_positions[i + 1..] {
                assert!(a.point.distance(b.point) >= 2.0 * u.base_radius);
            }
        }
    }

    #[test]
    fn test_move_to_translates_models() {
        let mut u = placed("u1", ArmyTag::A, 5, Point::new(10.0, 20.0));
        let before = u.model_positions[0].point;
        u.move_to(Point::new(15.0, 20.0), 60.0, 44.0);
        assert_eq!(u.position, Some(Point::new(15.0, 20.0)));
        assert!((u.model_positions[0].point - before - Point::new(5.0, 0.0)).length() < 1e-4);
    }

    #[test]
    fn test_below_half_strength() {
        let mut u = placed("u1", ArmyTag::A, 5, Point::new(10.0, 20.0));
        u.remaining_models = 3;
        assert!(!u.below_half_strength());
        u.remaining_models = 2;
        assert!(u.below_half_strength());

        let mut single = placed("hero", ArmyTag::A, 1, Point::new(10.0, 10.0));
        single.template.stats.wounds = 6;
        single.remaining_wounds = 3;
        assert!(!single.below_half_strength());
        single.remaining_wounds = 2;
        assert!(single.below_half_strength());
    }

    #[test]
    fn test_reserves_have_no_positions() {
        let mut u = placed("u1", ArmyTag::A, 5, Point::new(10.0, 20.0));
        u.send_to_reserves(ReserveType::DeepStrike);
        assert!(u.in_reserves);
        assert!(u.position.is_none());
        assert!(u.model_positions.is_empty());
        assert_eq!(u.objective_control(), 0);
    }

    #[test]
    fn test_shocked_unit_has_no_objective_control() {
        let mut u = placed("u1", ArmyTag::A, 5, Point::new(10.0, 20.0));
        assert_eq!(u.objective_control(), 10);
        u.battle_shocked = true;
        assert_eq!(u.objective_control(), 0);
    }

    #[test]
    fn test_consistency_check_repairs_markers() {
        let mut army = test_army(
            ArmyTag::A,
            vec![placed("u1", ArmyTag::A, 5, Point::new(10.0, 20.0))],
        );
        army.units[0].remaining_models = 3;
        let mut warnings = Vec::new();
        army.check_consistency(&mut warnings);
        assert_eq!(warnings.len(), 1);
        assert_eq!(army.units[0].alive_model_count(), 3);
    }

    #[test]
    fn test_gap_between_units() {
        let a = placed("a", ArmyTag::A, 1, Point::new(10.0, 20.0));
        let b = placed("b", ArmyTag::B, 1, Point::new(20.0, 20.0));
        assert!((a.gap_to(&b) - (10.0 - 2.0 * 0.63)).abs() < 1e-4);
        assert!((a.closest_model_gap(&b) - (10.0 - 2.0 * 0.63)).abs() < 1e-4);
    }
}
