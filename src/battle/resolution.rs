//! Damage resolution
//!
//! Builds the oracle's attack context from unit state and applies the
//! returned damage through a single entry point.

use rand::RngCore;

use crate::battle::log::{CasualtyLog, PhaseLog};
use crate::battle::oracle::{AttackContext, CombatOracle, SituationalModifiers};
use crate::battle::terrain::{check_line_of_sight, get_terrain_cover, TerrainFeature};
use crate::battle::units::UnitState;
use crate::data::weapons::{FiringMode, Weapon};

/// Copies of a weapon still carried by the unit's surviving models
pub fn firing_copies(unit: &UnitState, weapon: &Weapon) -> u32 {
    let full = unit.template.model_count.max(1) as f32;
    let alive = unit.remaining_models as f32;
    ((weapon.count as f32) * alive / full).ceil() as u32
}

/// Attack context for `attacker` using `weapon` against `target`
pub fn build_attack_context(
    attacker: &UnitState,
    target: &UnitState,
    weapon: &Weapon,
    terrain: &[TerrainFeature],
    include_one_time_weapons: bool,
) -> AttackContext {
    let (Some(from), Some(to)) = (attacker.position, target.position) else {
        return AttackContext {
            firing_models: 0,
            ..Default::default()
        };
    };

    let distance = attacker.gap_to(target).max(0.0);
    let mut hit_modifier = 0;
    let mut target_in_cover = false;
    if weapon.is_ranged() {
        let cover = get_terrain_cover(to, from, terrain);
        target_in_cover = cover.has_cover;
        let los = check_line_of_sight(
            from,
            to,
            terrain,
            attacker.template.ignores_obscuring,
            target.template.ignores_obscuring,
        );
        if los.through_dense || cover.dense_cover {
            hit_modifier -= 1;
        }
        if target.template.stealth {
            hit_modifier -= 1;
        }
    }

    AttackContext {
        target_toughness: target.template.stats.toughness,
        target_save: target.template.stats.save,
        target_invulnerable: target.template.invulnerable_save,
        target_feel_no_pain: target.template.feel_no_pain,
        target_keywords: target.template.keywords.clone(),
        target_model_count: target.remaining_models,
        target_wounds_per_model: target.wounds_per_model(),
        use_overcharge: matches!(
            weapon.linked.as_ref().map(|l| l.mode),
            Some(FiringMode::Overcharge)
        ),
        include_one_time_weapons,
        is_charging: attacker.charged,
        rerolls: Default::default(),
        modifiers: SituationalModifiers {
            hit_modifier,
            wound_modifier: 0,
            target_in_cover,
            target_distance: distance,
            remained_stationary: attacker.remained_stationary,
        },
        firing_models: firing_copies(attacker, weapon),
    }
}

/// Expected or dice-rolled damage of one weapon
pub fn resolve_weapon_damage(
    oracle: &dyn CombatOracle,
    weapon: &Weapon,
    ctx: &AttackContext,
    use_dice_rolls: bool,
    rng: &mut dyn RngCore,
) -> f32 {
    if use_dice_rolls {
        oracle.roll_damage(weapon, ctx, rng).total_damage
    } else {
        oracle.expected_damage(weapon, ctx)
    }
}

/// Apply damage to a unit atomically
///
/// Wounds are pooled: the unit loses `floor(total damage taken)` wounds and
/// keeps `ceil(wounds / wounds per model)` models. Dead models are removed
/// from the back of the formation.
pub fn apply_damage(unit: &mut UnitState, damage: f32, log: &mut PhaseLog) -> CasualtyLog {
    let wounds_before = unit.remaining_wounds;
    let models_before = unit.remaining_models;

    if damage > 0.0 && !unit.is_destroyed() {
        unit.damage_taken += damage;
        let lost = (unit.damage_taken + 1e-4).floor() as u32;
        unit.remaining_wounds = unit.max_wounds().saturating_sub(lost);
        let per_model = unit.wounds_per_model();
        unit.remaining_models =
            unit.remaining_wounds.div_ceil(per_model).min(unit.remaining_models);
        unit.sync_model_positions();
        if unit.is_destroyed() {
            unit.engaged = false;
            tracing::info!(unit = %unit.name, army = %unit.army, "Unit destroyed");
        }
    }

    let casualty = CasualtyLog {
        unit_id: unit.id.clone(),
        unit_name: unit.name.clone(),
        army: unit.army,
        damage,
        models_lost: models_before - unit.remaining_models,
        wounds_before,
        wounds_after: unit.remaining_wounds,
        destroyed: unit.is_destroyed(),
    };
    log.push_casualty(casualty.clone());
    casualty
}
