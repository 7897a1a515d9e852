//! Combat oracle: weapon damage against a target
//!
//! The engine treats damage as a black box behind `CombatOracle`. The
//! standard oracle resolves the hit / wound / save / damage sequence either
//! as an expected value (pure, reproducible) or with dice from an injected
//! generator.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};

use crate::data::weapons::{FiringMode, Weapon, WeaponAbility};

/// Which failed rolls may be rerolled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Reroll {
    #[default]
    None,
    Ones,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RerollConfig {
    pub hits: Reroll,
    pub wounds: Reroll,
}

/// Battlefield circumstances of one attack
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SituationalModifiers {
    /// Added to the hit roll, capped at +/-1
    pub hit_modifier: i32,
    /// Added to the wound roll, capped at +/-1
    pub wound_modifier: i32,
    /// Target benefits from cover (+1 save)
    pub target_in_cover: bool,
    /// Distance from attacker to target, for half-range rules
    pub target_distance: f32,
    pub remained_stationary: bool,
}

/// Everything the oracle needs about the attack besides the weapon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackContext {
    pub target_toughness: u32,
    pub target_save: u8,
    pub target_invulnerable: Option<u8>,
    pub target_feel_no_pain: Option<u8>,
    pub target_keywords: Vec<String>,
    pub target_model_count: u32,
    pub target_wounds_per_model: u32,
    pub use_overcharge: bool,
    pub include_one_time_weapons: bool,
    pub is_charging: bool,
    pub rerolls: RerollConfig,
    pub modifiers: SituationalModifiers,
    /// Copies of the weapon attacking
    pub firing_models: u32,
}

impl Default for AttackContext {
    fn default() -> Self {
        Self {
            target_toughness: 4,
            target_save: 4,
            target_invulnerable: None,
            target_feel_no_pain: None,
            target_keywords: Vec::new(),
            target_model_count: 1,
            target_wounds_per_model: 1,
            use_overcharge: false,
            include_one_time_weapons: true,
            is_charging: false,
            rerolls: RerollConfig::default(),
            modifiers: SituationalModifiers::default(),
            firing_models: 1,
        }
    }
}

/// Dice-mode outcome of one weapon's attacks
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DamageBreakdown {
    pub total_damage: f32,
    pub attacks: u32,
    pub hits: u32,
    pub wounds: u32,
    pub failed_saves: u32,
    pub mortal_wounds: u32,
    pub lethal_hits: u32,
    pub sustained_hits: u32,
    pub devastating_wounds: u32,
}

/// Boundary into the damage formulas
pub trait CombatOracle: Send + Sync {
    /// Mean damage; must be a pure function of its inputs
    fn expected_damage(&self, weapon: &Weapon, ctx: &AttackContext) -> f32;

    /// One dice-rolled resolution
    fn roll_damage(
        &self,
        weapon: &Weapon,
        ctx: &AttackContext,
        rng: &mut dyn RngCore,
    ) -> DamageBreakdown;
}

/// Reference implementation of the core hit / wound / save sequence
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardOracle;

/// Roll needed to wound for a strength vs toughness matchup
pub fn wound_roll_needed(strength: u32, toughness: u32) -> u8 {
    if strength >= toughness * 2 {
        2
    } else if strength > toughness {
        3
    } else if strength == toughness {
        4
    } else if strength * 2 <= toughness {
        6
    } else {
        5
    }
}

/// Probability a D6 meets `target` (2+ .. 6+)
fn p_success(target: u8) -> f32 {
    (7.0 - target.clamp(2, 7) as f32).max(0.0) / 6.0
}

fn apply_reroll(p: f32, reroll: Reroll) -> f32 {
    match reroll {
        Reroll::None => p,
        Reroll::Ones => p + p / 6.0,
        Reroll::Failed => p + (1.0 - p) * p,
    }
}

fn d6(rng: &mut dyn RngCore) -> u8 {
    rng.gen_range(1..=6)
}

/// Thresholds derived once per attack
struct Profile {
    usable: bool,
    attacks_per_weapon: f32,
    auto_hit: bool,
    hit_target: u8,
    wound_target: u8,
    crit_wound_target: u8,
    save_target: u8,
    damage_per_wound: f32,
    fnp_factor: f32,
    hit_reroll: Reroll,
    wound_reroll: Reroll,
}

impl StandardOracle {
    fn profile(&self, weapon: &Weapon, ctx: &AttackContext) -> Profile {
        let mut usable = true;
        if weapon.is_one_shot() && !ctx.include_one_time_weapons {
            usable = false;
        }
        if let Some(linked) = &weapon.linked {
            let wants = if ctx.use_overcharge {
                FiringMode::Overcharge
            } else {
                FiringMode::Standard
            };
            if linked.mode != wants {
                usable = false;
            }
        }

        let within_half = weapon.is_ranged() && ctx.modifiers.target_distance <= weapon.range / 2.0;
        let mut attacks_per_weapon = weapon.attacks.expected();
        if let (Some(extra), true) = (weapon.rapid_fire(), within_half) {
            attacks_per_weapon += extra.expected();
        }
        if weapon.has(&WeaponAbility::Blast) {
            attacks_per_weapon += (ctx.target_model_count / 5) as f32;
        }

        let mut hit_mod = ctx.modifiers.hit_modifier;
        if weapon.has(&WeaponAbility::Heavy) && ctx.modifiers.remained_stationary {
            hit_mod += 1;
        }
        let hit_mod = hit_mod.clamp(-1, 1);
        let hit_target = (weapon.skill as i32 - hit_mod).clamp(2, 6) as u8;

        let mut wound_mod = ctx.modifiers.wound_modifier;
        if weapon.has(&WeaponAbility::Lance) && ctx.is_charging {
            wound_mod += 1;
        }
        let wound_mod = wound_mod.clamp(-1, 1);
        let base_wound = wound_roll_needed(weapon.strength, ctx.target_toughness.max(1));
        let crit_wound_target = weapon.anti_threshold(&ctx.target_keywords).unwrap_or(6).min(6);
        let wound_target =
            ((base_wound as i32 - wound_mod).clamp(2, 6) as u8).min(crit_wound_target);

        let cover_bonus = if ctx.modifiers.target_in_cover
            && !weapon.has(&WeaponAbility::IgnoresCover)
        {
            1
        } else {
            0
        };
        let armour = (ctx.target_save as i32 + weapon.ap as i32 - cover_bonus).max(2);
        let save_target = match ctx.target_invulnerable {
            Some(invuln) => armour.min(invuln as i32),
            None => armour,
        }
        .clamp(2, 7) as u8;

        let mut damage_per_wound = weapon.damage.expected();
        if let (Some(bonus), true) = (weapon.melta(), within_half) {
            damage_per_wound += bonus.expected();
        }
        // Excess damage is lost on a model that dies
        damage_per_wound = damage_per_wound.min(ctx.target_wounds_per_model.max(1) as f32);

        let fnp_factor = match ctx.target_feel_no_pain {
            Some(fnp) => 1.0 - p_success(fnp),
            None => 1.0,
        };

        let wound_reroll = if weapon.has(&WeaponAbility::TwinLinked) {
            Reroll::Failed
        } else {
            ctx.rerolls.wounds
        };

        Profile {
            usable,
            attacks_per_weapon,
            auto_hit: weapon.skill == 0 || weapon.has(&WeaponAbility::Torrent),
            hit_target,
            wound_target,
            crit_wound_target,
            save_target,
            damage_per_wound,
            fnp_factor,
            hit_reroll: ctx.rerolls.hits,
            wound_reroll,
        }
    }
}

impl CombatOracle for StandardOracle {
    fn expected_damage(&self, weapon: &Weapon, ctx: &AttackContext) -> f32 {
        let profile = self.profile(weapon, ctx);
        if !profile.usable || ctx.firing_models == 0 {
            return 0.0;
        }

        let attacks = profile.attacks_per_weapon * ctx.firing_models as f32;

        let (normal_hits, auto_wounds) = if profile.auto_hit {
            (attacks, 0.0)
        } else {
            let p_hit = apply_reroll(p_success(profile.hit_target), profile.hit_reroll);
            let p_crit = apply_reroll(1.0 / 6.0, profile.hit_reroll).min(p_hit);
            let crits = attacks * p_crit;
            let mut hits = attacks * p_hit;
            if let Some(extra) = weapon.sustained_hits() {
                hits += crits * extra.expected();
            }
            if weapon.has(&WeaponAbility::LethalHits) {
                (hits - crits, crits)
            } else {
                (hits, 0.0)
            }
        };

        let p_wound = apply_reroll(p_success(profile.wound_target), profile.wound_reroll);
        let p_crit_wound =
            apply_reroll(p_success(profile.crit_wound_target), profile.wound_reroll).min(p_wound);
        let wounds = normal_hits * p_wound + auto_wounds;

        let (saveable, mortal) = if weapon.has(&WeaponAbility::DevastatingWounds) {
            let devastating = normal_hits * p_crit_wound;
            (wounds - devastating, devastating)
        } else {
            (wounds, 0.0)
        };

        let p_fail_save = 1.0 - p_success(profile.save_target);
        let unsaved = saveable * p_fail_save + mortal;

        (unsaved * profile.damage_per_wound * profile.fnp_factor).max(0.0)
    }

    fn roll_damage(
        &self,
        weapon: &Weapon,
        ctx: &AttackContext,
        rng: &mut dyn RngCore,
    ) -> DamageBreakdown {
        let profile = self.profile(weapon, ctx);
        let mut breakdown = DamageBreakdown::default();
        if !profile.usable || ctx.firing_models == 0 {
            return breakdown;
        }

        let within_half = weapon.is_ranged() && ctx.modifiers.target_distance <= weapon.range / 2.0;
        for _ in 0..ctx.firing_models {
            breakdown.attacks += weapon.attacks.roll(rng);
            if let (Some(extra), true) = (weapon.rapid_fire(), within_half) {
                breakdown.attacks += extra.roll(rng);
            }
            if weapon.has(&WeaponAbility::Blast) {
                breakdown.attacks += ctx.target_model_count / 5;
            }
        }

        let mut normal_hits = 0u32;
        let mut auto_wounds = 0u32;
        for _ in 0..breakdown.attacks {
            if profile.auto_hit {
                normal_hits += 1;
                continue;
            }
            let mut roll = d6(rng);
            let failed = roll < profile.hit_target && roll != 6;
            if failed
                && (profile.hit_reroll == Reroll::Failed
                    || (profile.hit_reroll == Reroll::Ones && roll == 1))
            {
                roll = d6(rng);
            }
            let crit = roll == 6;
            if roll >= profile.hit_target || crit {
                if crit && weapon.has(&WeaponAbility::LethalHits) {
                    auto_wounds += 1;
                    breakdown.lethal_hits += 1;
                } else {
                    normal_hits += 1;
                }
                if crit {
                    if let Some(extra) = weapon.sustained_hits() {
                        let bonus = extra.roll(rng);
                        normal_hits += bonus;
                        breakdown.sustained_hits += bonus;
                    }
                }
            }
        }
        breakdown.hits = normal_hits + auto_wounds;

        let mut saveable = 0u32;
        let mut mortal = 0u32;
        for _ in 0..normal_hits {
            let mut roll = d6(rng);
            let failed = roll < profile.wound_target;
            if failed
                && (profile.wound_reroll == Reroll::Failed
                    || (profile.wound_reroll == Reroll::Ones && roll == 1))
            {
                roll = d6(rng);
            }
            if roll >= profile.wound_target {
                if roll >= profile.crit_wound_target
                    && weapon.has(&WeaponAbility::DevastatingWounds)
                {
                    mortal += 1;
                    breakdown.devastating_wounds += 1;
                } else {
                    saveable += 1;
                }
            }
        }
        saveable += auto_wounds;
        breakdown.wounds = saveable + mortal;
        breakdown.mortal_wounds = mortal;

        for _ in 0..saveable {
            let roll = d6(rng);
            if profile.save_target >= 7 || roll < profile.save_target || roll == 1 {
                breakdown.failed_saves += 1;
            }
        }

        let cap = ctx.target_wounds_per_model.max(1);
        let melta_bonus = match (weapon.melta(), within_half) {
            (Some(bonus), true) => Some(bonus),
            _ => None,
        };
        let mut total = 0u32;
        for _ in 0..(breakdown.failed_saves + mortal) {
            let mut damage = weapon.damage.roll(rng);
            if let Some(bonus) = melta_bonus {
                damage += bonus.roll(rng);
            }
            let mut damage = damage.min(cap);
            if let Some(fnp) = ctx.target_feel_no_pain {
                let ignored = (0..damage).filter(|_| d6(rng) >= fnp).count() as u32;
                damage -= ignored;
            }
            total += damage;
        }
        breakdown.total_damage = total as f32;
        breakdown
    }
}
