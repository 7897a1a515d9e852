//! Weapon profiles parsed from army-list characteristics
//!
//! Keyword text ("Rapid Fire 1, Anti-Infantry 4+") is parsed once into
//! `WeaponAbility` values so resolution never re-scans strings.

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::core::error::record_warning;

/// Fallbacks for unparseable weapon characteristics
pub const DEFAULT_ATTACKS: u32 = 1;
pub const DEFAULT_SKILL: u8 = 4;
pub const DEFAULT_STRENGTH: u32 = 4;
pub const DEFAULT_DAMAGE: u32 = 1;

/// A dice expression such as `D6`, `2D6`, `D3+1` or a flat `3`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpr {
    pub count: u32,
    pub sides: u32,
    pub bonus: u32,
}

impl DiceExpr {
    pub fn fixed(value: u32) -> Self {
        Self {
            count: 0,
            sides: 0,
            bonus: value,
        }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let cleaned: String = text
            .trim()
            .to_ascii_uppercase()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if cleaned.is_empty() {
            return None;
        }

        let (dice_part, bonus) = match cleaned.split_once('+') {
            Some((dice, bonus)) => (dice, bonus.parse::<u32>().ok()?),
            None => (cleaned.as_str(), 0),
        };

        match dice_part.split_once('D') {
            Some((count, sides)) => {
                let count = if count.is_empty() { 1 } else { count.parse().ok()? };
                let sides = sides.parse().ok()?;
                Some(Self { count, sides, bonus })
            }
            None => {
                let flat: u32 = dice_part.parse().ok()?;
                Some(Self::fixed(flat + bonus))
            }
        }
    }

    /// Mean value of the expression
    pub fn expected(&self) -> f32 {
        self.count as f32 * (self.sides as f32 + 1.0) / 2.0 + self.bonus as f32
    }

    pub fn roll(&self, rng: &mut dyn RngCore) -> u32 {
        let mut total = self.bonus;
        for _ in 0..self.count {
            if self.sides > 0 {
                total += rng.gen_range(1..=self.sides);
            }
        }
        total
    }
}

impl std::fmt::Display for DiceExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.count, self.bonus) {
            (0, bonus) => write!(f, "{}", bonus),
            (1, 0) => write!(f, "D{}", self.sides),
            (1, bonus) => write!(f, "D{}+{}", self.sides, bonus),
            (count, 0) => write!(f, "{}D{}", count, self.sides),
            (count, bonus) => write!(f, "{}D{}+{}", count, self.sides, bonus),
        }
    }
}

/// Special rules carried by a weapon profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WeaponAbility {
    Assault,
    Heavy,
    Pistol,
    RapidFire(DiceExpr),
    Torrent,
    LethalHits,
    SustainedHits(DiceExpr),
    DevastatingWounds,
    TwinLinked,
    Anti { keyword: String, threshold: u8 },
    Blast,
    Melta(DiceExpr),
    Lance,
    Hazardous,
    IgnoresCover,
    IndirectFire,
    OneShot,
    Precision,
    ExtraAttacks,
    Psychic,
    Other(String),
}

impl WeaponAbility {
    fn parse(token: &str) -> Option<Self> {
        let trimmed = token.trim();
        let lower = trimmed.to_ascii_lowercase();
        if lower.is_empty() || lower == "-" {
            return None;
        }

        let ability = match lower.as_str() {
            "assault" => WeaponAbility::Assault,
            "heavy" => WeaponAbility::Heavy,
            "pistol" => WeaponAbility::Pistol,
            "torrent" => WeaponAbility::Torrent,
            "lethal hits" => WeaponAbility::LethalHits,
            "devastating wounds" => WeaponAbility::DevastatingWounds,
            "twin-linked" | "twin linked" => WeaponAbility::TwinLinked,
            "blast" => WeaponAbility::Blast,
            "lance" => WeaponAbility::Lance,
            "hazardous" => WeaponAbility::Hazardous,
            "ignores cover" => WeaponAbility::IgnoresCover,
            "indirect fire" => WeaponAbility::IndirectFire,
            "one shot" => WeaponAbility::OneShot,
            "precision" => WeaponAbility::Precision,
            "extra attacks" => WeaponAbility::ExtraAttacks,
            "psychic" => WeaponAbility::Psychic,
            _ => {
                if let Some(rest) = lower.strip_prefix("rapid fire") {
                    WeaponAbility::RapidFire(DiceExpr::parse(rest).unwrap_or(DiceExpr::fixed(1)))
                } else if let Some(rest) = lower.strip_prefix("sustained hits") {
                    WeaponAbility::SustainedHits(
                        DiceExpr::parse(rest).unwrap_or(DiceExpr::fixed(1)),
                    )
                } else if let Some(rest) = lower.strip_prefix("melta") {
                    WeaponAbility::Melta(DiceExpr::parse(rest).unwrap_or(DiceExpr::fixed(2)))
                } else if let Some(rest) = lower.strip_prefix("anti-") {
                    parse_anti(rest).unwrap_or_else(|| WeaponAbility::Other(trimmed.to_string()))
                } else {
                    WeaponAbility::Other(trimmed.to_string())
                }
            }
        };
        Some(ability)
    }
}

/// `infantry 4+` -> Anti { INFANTRY, 4 }
fn parse_anti(rest: &str) -> Option<WeaponAbility> {
    let (keyword, threshold) = rest.trim().rsplit_once(' ')?;
    let threshold = threshold.trim_end_matches('+').parse::<u8>().ok()?;
    Some(WeaponAbility::Anti {
        keyword: keyword.trim().to_ascii_uppercase(),
        threshold,
    })
}

/// Parse a comma-separated keyword list
pub fn parse_abilities(keywords: &str) -> Vec<WeaponAbility> {
    keywords.split(',').filter_map(WeaponAbility::parse).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeaponKind {
    Ranged,
    Melee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FiringMode {
    Standard,
    Overcharge,
}

/// Membership in a group of alternative profiles (e.g. a plasma gun's two modes)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedProfile {
    pub base_name: String,
    pub mode: FiringMode,
}

/// Raw weapon entry as written by the roster optimizer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponRecord {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub weapon_type: String,
    #[serde(default)]
    pub characteristics: HashMap<String, String>,
    #[serde(default = "default_one")]
    pub count: u32,
    #[serde(default = "default_one")]
    pub models_with_weapon: u32,
    #[serde(default)]
    pub base_name: Option<String>,
    #[serde(default)]
    pub overcharge_mode: Option<String>,
}

fn default_one() -> u32 {
    1
}

/// A parsed weapon profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    pub id: String,
    pub name: String,
    pub kind: WeaponKind,
    /// Range in inches; 0 for melee
    pub range: f32,
    pub attacks: DiceExpr,
    /// BS/WS target number; 0 means the weapon never rolls to hit
    pub skill: u8,
    pub strength: u32,
    /// Armour penetration as a positive modifier to the target's save
    pub ap: u32,
    pub damage: DiceExpr,
    pub abilities: Vec<WeaponAbility>,
    /// Number of copies of this weapon across the full-strength unit
    pub count: u32,
    pub models_with_weapon: u32,
    pub linked: Option<LinkedProfile>,
}

impl Weapon {
    pub fn from_record(record: &WeaponRecord, unit_name: &str, warnings: &mut Vec<String>) -> Self {
        let characteristic = |key: &str| {
            record
                .characteristics
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(key))
                .map(|(_, v)| v.trim().to_string())
                .unwrap_or_default()
        };

        let range_text = characteristic("range");
        let is_melee = record.weapon_type.to_ascii_lowercase().contains("melee")
            || range_text.eq_ignore_ascii_case("melee");
        let kind = if is_melee { WeaponKind::Melee } else { WeaponKind::Ranged };

        let range = if is_melee {
            0.0
        } else {
            match parse_leading_number(&range_text) {
                Some(r) => r,
                None => {
                    record_warning(
                        warnings,
                        format!(
                            "{}: weapon '{}' has unreadable range '{}', treating as 12\"",
                            unit_name,
                            record.name,
                            range_text
                        ),
                    );
                    12.0
                }
            }
        };

        let attacks_text = characteristic("a");
        let attacks = DiceExpr::parse(&attacks_text).unwrap_or_else(|| {
            record_warning(
                warnings,
                format!(
                    "{}: weapon '{}' has unreadable attacks '{}'",
                    unit_name,
                    record.name,
                    attacks_text
                ),
            );
            DiceExpr::fixed(DEFAULT_ATTACKS)
        });

        let skill_text = if is_melee { characteristic("ws") } else { characteristic("bs") };
        let skill_text = if skill_text.is_empty() {
            characteristic(if is_melee { "bs" } else { "ws" })
        } else {
            skill_text
        };
        let abilities = parse_abilities(&characteristic("keywords"));
        let skill = if abilities.contains(&WeaponAbility::Torrent)
            || skill_text.eq_ignore_ascii_case("n/a")
        {
            0
        } else {
            match parse_leading_number(&skill_text) {
                Some(s) => s as u8,
                None => {
                    record_warning(
                        warnings,
                        format!(
                            "{}: weapon '{}' has unreadable skill '{}'",
                            unit_name,
                            record.name,
                            skill_text
                        ),
                    );
                    DEFAULT_SKILL
                }
            }
        };

        let strength_text = characteristic("s");
        let strength = parse_leading_number(&strength_text)
            .map(|s| s as u32)
            .unwrap_or_else(|| {
                record_warning(
                    warnings,
                    format!(
                        "{}: weapon '{}' has unreadable strength '{}'",
                        unit_name,
                        record.name,
                        strength_text
                    ),
                );
                DEFAULT_STRENGTH
            });

        let ap = parse_leading_number(&characteristic("ap"))
            .map(|ap| ap.abs() as u32)
            .unwrap_or(0);

        let damage_text = characteristic("d");
        let damage = DiceExpr::parse(&damage_text).unwrap_or_else(|| {
            record_warning(
                warnings,
                format!(
                    "{}: weapon '{}' has unreadable damage '{}'",
                    unit_name,
                    record.name,
                    damage_text
                ),
            );
            DiceExpr::fixed(DEFAULT_DAMAGE)
        });

        let linked = record.base_name.as_ref().map(|base| LinkedProfile {
            base_name: base.clone(),
            mode: match record.overcharge_mode.as_deref() {
                Some("overcharge") => FiringMode::Overcharge,
                _ => FiringMode::Standard,
            },
        });

        Self {
            id: record.id.clone(),
            name: record.name.trim_start_matches('➤').trim().to_string(),
            kind,
            range,
            attacks,
            skill,
            strength,
            ap,
            damage,
            abilities,
            count: record.count.max(1),
            models_with_weapon: record.models_with_weapon.max(1),
            linked,
        }
    }

    pub fn is_melee(&self) -> bool {
        self.kind == WeaponKind::Melee
    }

    pub fn is_ranged(&self) -> bool {
        self.kind == WeaponKind::Ranged
    }

    pub fn has(&self, ability: &WeaponAbility) -> bool {
        self.abilities.contains(ability)
    }

    pub fn is_pistol(&self) -> bool {
        self.has(&WeaponAbility::Pistol)
    }

    pub fn is_assault(&self) -> bool {
        self.has(&WeaponAbility::Assault)
    }

    pub fn is_one_shot(&self) -> bool {
        self.has(&WeaponAbility::OneShot)
    }

    pub fn sustained_hits(&self) -> Option<DiceExpr> {
        self.abilities.iter().find_map(|a| match a {
            WeaponAbility::SustainedHits(n) => Some(*n),
            _ => None,
        })
    }

    pub fn rapid_fire(&self) -> Option<DiceExpr> {
        self.abilities.iter().find_map(|a| match a {
            WeaponAbility::RapidFire(n) => Some(*n),
            _ => None,
        })
    }

    pub fn melta(&self) -> Option<DiceExpr> {
        self.abilities.iter().find_map(|a| match a {
            WeaponAbility::Melta(n) => Some(*n),
            _ => None,
        })
    }

    /// Lowest critical-wound threshold granted by Anti-X against these keywords
    pub fn anti_threshold(&self, target_keywords: &[String]) -> Option<u8> {
        self.abilities
            .iter()
            .filter_map(|a| match a {
                WeaponAbility::Anti { keyword, threshold } => target_keywords
                    .iter()
                    .any(|k| k.eq_ignore_ascii_case(keyword))
                    .then_some(*threshold),
                _ => None,
            })
            .min()
    }
}

/// Leading numeric value of a stat string: `6"` -> 6, `3+` -> 3, `-1` -> -1
pub fn parse_leading_number(text: &str) -> Option<f32> {
    let trimmed = text.trim();
    let mut end = 0;
    for (i, c) in trimmed.char_indices() {
        if c.is_ascii_digit() || c == '.' || (i == 0 && c == '-') {
            end = i + c.len_utf8();
        } else {
            break;
        }
    }
    trimmed[..end].parse::<f32>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn record(kind: &str, chars: &[(&str, &str)]) -> WeaponRecord {
        WeaponRecord {
            id: "w1".into(),
            name: "Test weapon".into(),
            weapon_type: kind.into(),
            characteristics: chars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            count: 5,
            models_with_weapon: 5,
            base_name: None,
            overcharge_mode: None,
        }
    }

    #[test]
    fn test_dice_expr_parse() {
        assert_eq!(DiceExpr::parse("3"), Some(DiceExpr::fixed(3)));
        assert_eq!(DiceExpr::parse("D6"), Some(DiceExpr { count: 1, sides: 6, bonus: 0 }));
        assert_eq!(DiceExpr::parse("2d6"), Some(DiceExpr { count: 2, sides: 6, bonus: 0 }));
        assert_eq!(DiceExpr::parse("D3+1"), Some(DiceExpr { count: 1, sides: 3, bonus: 1 }));
        assert_eq!(DiceExpr::parse("nonsense"), None);
        assert_eq!(DiceExpr::parse(""), None);
    }

    #[test]
    fn test_dice_expr_expected() {
        assert_eq!(DiceExpr::parse("D6").unwrap().expected(), 3.5);
        assert_eq!(DiceExpr::parse("2D6").unwrap().expected(), 7.0);
        assert_eq!(DiceExpr::parse("D3+1").unwrap().expected(), 3.0);
    }

    #[test]
    fn test_dice_roll_in_bounds() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let expr = DiceExpr::parse("2D6").unwrap();
        for _ in 0..100 {
            let roll = expr.roll(&mut rng);
            assert!((2..=12).contains(&roll));
        }
    }

    #[test]
    fn test_parse_abilities() {
        let abilities = parse_abilities(
            "Assault, Rapid Fire 1, Anti-Infantry 4+, Sustained Hits D3, Mystery",
        );
        assert!(abilities.contains(&WeaponAbility::Assault));
        assert!(abilities.contains(&WeaponAbility::RapidFire(DiceExpr::fixed(1))));
        assert!(abilities.contains(&WeaponAbility::Anti {
            keyword: "INFANTRY".into(),
            threshold: 4
        }));
        assert!(
            abilities.contains(
                &WeaponAbility::SustainedHits(DiceExpr { count: 1, sides: 3, bonus: 0 }),
            )
        );
        assert!(abilities.contains(&WeaponAbility::Other("Mystery".into())));
    }

    #[test]
    fn test_parse_abilities_dash_is_empty() {
        assert!(parse_abilities("-").is_empty());
        assert!(parse_abilities("").is_empty());
    }

    #[test]
    fn test_ranged_weapon_from_record() {
        let mut warnings = Vec::new();
        let weapon = Weapon::from_record(
            &record(
                "Ranged Weapons",
                &[
                    ("range", "24\""),
                    ("a", "2"),
                    ("bs", "3+"),
                    ("s", "4"),
                    ("ap", "-1"),
                    ("d", "1"),
                    ("keywords", "Rapid Fire 2"),
                ],
            ),
            "Intercessors",
            &mut warnings,
        );

        assert!(warnings.is_empty());
        assert_eq!(weapon.kind, WeaponKind::Ranged);
        assert_eq!(weapon.range, 24.0);
        assert_eq!(weapon.skill, 3);
        assert_eq!(weapon.ap, 1);
        assert_eq!(weapon.rapid_fire(), Some(DiceExpr::fixed(2)));
    }

    #[test]
    fn test_melee_weapon_from_record() {
        let mut warnings = Vec::new();
        let weapon = Weapon::from_record(
            &record(
                "Melee Weapons",
                &[
                    ("range", "Melee"),
                    ("a", "3"),
                    ("ws", "3+"),
                    ("s", "5"),
                    ("ap", "-2"),
                    ("d", "2"),
                    ("keywords", "Lethal Hits"),
                ],
            ),
            "Assault Squad",
            &mut warnings,
        );

        assert!(weapon.is_melee());
        assert_eq!(weapon.range, 0.0);
        assert_eq!(weapon.skill, 3);
        assert!(weapon.has(&WeaponAbility::LethalHits));
    }

    #[test]
    fn test_unreadable_characteristics_fall_back() {
        let mut warnings = Vec::new();
        let weapon = Weapon::from_record(
            &record(
                "Ranged Weapons",
                &[("range", "far"), ("a", "?"), ("bs", "x"), ("s", "User"), ("d", "")],
            ),
            "Oddballs",
            &mut warnings,
        );

        assert_eq!(weapon.range, 12.0);
        assert_eq!(weapon.attacks, DiceExpr::fixed(DEFAULT_ATTACKS));
        assert_eq!(weapon.skill, DEFAULT_SKILL);
        assert_eq!(weapon.strength, DEFAULT_STRENGTH);
        assert_eq!(weapon.damage, DiceExpr::fixed(DEFAULT_DAMAGE));
        assert_eq!(warnings.len(), 5);
    }

    #[test]
    fn test_torrent_never_rolls_to_hit() {
        let mut warnings = Vec::new();
        let weapon = Weapon::from_record(
            &record(
                "Ranged Weapons",
                &[
                    ("range", "12\""),
                    ("a", "D6"),
                    ("bs", "N/A"),
                    ("s", "5"),
                    ("ap", "-1"),
                    ("d", "1"),
                    ("keywords", "Ignores Cover, Torrent"),
                ],
            ),
            "Flamers",
            &mut warnings,
        );
        assert_eq!(weapon.skill, 0);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_parse_leading_number() {
        assert_eq!(parse_leading_number("6\""), Some(6.0));
        assert_eq!(parse_leading_number("3+"), Some(3.0));
        assert_eq!(parse_leading_number("-2"), Some(-2.0));
        assert_eq!(parse_leading_number("Melee"), None);
    }

    #[test]
    fn test_anti_threshold_matches_keyword() {
        let mut warnings = Vec::new();
        let weapon = Weapon::from_record(
            &record(
                "Ranged Weapons",
                &[
                    ("range", "18\""),
                    ("a", "1"),
                    ("bs", "3+"),
                    ("s", "9"),
                    ("ap", "-3"),
                    ("d", "D6"),
                    ("keywords", "Anti-Vehicle 3+"),
                ],
            ),
            "Hunters",
            &mut warnings,
        );
        assert_eq!(weapon.anti_threshold(&["VEHICLE".to_string()]), Some(3));
        assert_eq!(weapon.anti_threshold(&["INFANTRY".to_string()]), None);
    }
}
