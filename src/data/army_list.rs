//! Army list loading
//!
//! Reads the optimized roster JSON and turns each unit record into a
//! read-only `UnitTemplate` with typed stats and special rules.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::{record_warning, Result};
use crate::data::weapons::{parse_leading_number, Weapon, WeaponRecord};

/// Stat fallbacks for unparseable unit characteristics
pub const DEFAULT_MOVE: f32 = 6.0;
pub const DEFAULT_TOUGHNESS: u32 = 4;
pub const DEFAULT_SAVE: u8 = 4;
pub const DEFAULT_WOUNDS: u32 = 1;
pub const DEFAULT_LEADERSHIP: u8 = 7;
pub const DEFAULT_OBJECTIVE_CONTROL: u32 = 1;

/// Categories that are not infantry for terrain purposes
const NON_INFANTRY_CATEGORIES: [&str; 6] =
    ["VEHICLE", "MONSTER", "MOUNTED", "BEAST", "FORTIFICATION", "AIRCRAFT"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleEntry {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub hidden: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsRecord {
    #[serde(default)]
    pub move_: Option<String>,
    #[serde(default)]
    pub toughness: Option<String>,
    #[serde(default)]
    pub save: Option<String>,
    #[serde(default)]
    pub wounds: Option<String>,
    #[serde(default)]
    pub leadership: Option<String>,
    #[serde(default)]
    pub objective_control: Option<String>,
}

/// One unit (or nested model group) in the roster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitRecord {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub category: String,
    #[serde(default, deserialize_with = "deserialize_stats")]
    pub stats: StatsRecord,
    #[serde(default)]
    pub points: u32,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default)]
    pub weapons: Vec<WeaponRecord>,
    #[serde(default)]
    pub rules: Vec<String>,
    #[serde(default)]
    pub abilities: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub models: Vec<UnitRecord>,
}

fn default_count() -> u32 {
    1
}

/// `move` is a Rust keyword, so the stats block is read through a raw map
fn deserialize_stats<'de, D>(deserializer: D) -> std::result::Result<StatsRecord, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: HashMap<String, serde_json::Value> = HashMap::deserialize(deserializer)?;
    let field = |key: &str| {
        raw.get(key).map(|v| match v {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    };
    Ok(StatsRecord {
        move_: field("move"),
        toughness: field("toughness"),
        save: field("save"),
        wounds: field("wounds"),
        leadership: field("leadership"),
        objective_control: field("objectiveControl"),
    })
}

/// Top-level roster document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArmyList {
    pub army_name: String,
    #[serde(default)]
    pub faction: String,
    #[serde(default)]
    pub points_total: u32,
    #[serde(default)]
    pub rules: HashMap<String, RuleEntry>,
    #[serde(default)]
    pub abilities: HashMap<String, RuleEntry>,
    #[serde(default)]
    pub units: Vec<UnitRecord>,
}

impl ArmyList {
    pub fn from_json_str(contents: &str) -> Result<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Build templates for every unit, collecting parse diagnostics
    pub fn templates(&self, warnings: &mut Vec<String>) -> Vec<UnitTemplate> {
        self.units
            .iter()
            .map(|record| UnitTemplate::from_record(record, self, warnings))
            .collect()
    }

    fn rule_entry(&self, id: &str) -> Option<&RuleEntry> {
        self.rules.get(id).or_else(|| self.abilities.get(id))
    }
}

/// Parsed unit characteristics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnitStats {
    pub movement: f32,
    pub toughness: u32,
    pub save: u8,
    pub wounds: u32,
    pub leadership: u8,
    pub objective_control: u32,
}

impl Default for UnitStats {
    fn default() -> Self {
        Self {
            movement: DEFAULT_MOVE,
            toughness: DEFAULT_TOUGHNESS,
            save: DEFAULT_SAVE,
            wounds: DEFAULT_WOUNDS,
            leadership: DEFAULT_LEADERSHIP,
            objective_control: DEFAULT_OBJECTIVE_CONTROL,
        }
    }
}

/// Static army-list data for one unit; read-only during a battle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitTemplate {
    pub id: String,
    pub name: String,
    pub category: String,
    pub stats: UnitStats,
    pub points: u32,
    pub model_count: u32,
    pub weapons: Vec<Weapon>,
    pub rules: Vec<String>,
    pub abilities: Vec<String>,
    pub keywords: Vec<String>,
    pub invulnerable_save: Option<u8>,
    pub feel_no_pain: Option<u8>,
    pub deep_strike: bool,
    pub infiltrators: bool,
    pub stealth: bool,
    pub ignores_obscuring: bool,
    pub is_infantry: bool,
    pub is_large: bool,
}

impl UnitTemplate {
    pub fn from_record(record: &UnitRecord, army: &ArmyList, warnings: &mut Vec<String>) -> Self {
        let stats_source = if record.stats.move_.is_none() {
            record
                .models
                .iter()
                .map(|m| &m.stats)
                .find(|s| s.move_.is_some())
                .unwrap_or(&record.stats)
        } else {
            &record.stats
        };
        let stats = parse_stats(stats_source, &record.name, warnings);

        let model_count = if record.models.is_empty() {
            record.count.max(1)
        } else {
            record.models.iter().map(|m| m.count.max(1)).sum()
        };

        let mut weapon_records: Vec<&WeaponRecord> = record.weapons.iter().collect();
        for model in &record.models {
            weapon_records.extend(model.weapons.iter());
        }
        let weapons = weapon_records
            .into_iter()
            .map(|w| Weapon::from_record(w, &record.name, warnings))
            .collect();

        let resolve = |ids: &[String]| -> Vec<(String, String)> {
            ids.iter()
                .map(|id| match army.rule_entry(id) {
                    Some(entry) => (entry.name.clone(), entry.description.clone()),
                    None => (id.clone(), String::new()),
                })
                .collect()
        };
        let rules = resolve(&record.rules);
        let abilities = resolve(&record.abilities);

        let mut keywords: Vec<String> =
            record.keywords.iter().map(|k| k.to_ascii_uppercase()).collect();
        if !record.category.is_empty() {
            keywords.push(record.category.to_ascii_uppercase());
        }
        keywords.sort();
        keywords.dedup();

        let all_text: Vec<&(String, String)> = rules.iter().chain(abilities.iter()).collect();
        let has_named = |needle: &str| {
            all_text
                .iter()
                .any(|(name, _)| name.to_ascii_lowercase().contains(needle))
        };
        let invulnerable_save = all_text.iter().find_map(|(name, desc)| {
            parse_threshold_near(name, "invulnerable")
                .or_else(|| parse_threshold_near(desc, "invulnerable save"))
        });
        let feel_no_pain = all_text
            .iter()
            .find_map(|(name, desc)| {
                parse_threshold_near(name, "feel no pain")
                    .or_else(|| parse_threshold_near(desc, "feel no pain"))
            });
        let ignores_obscuring = keywords.iter().any(|k| k == "TOWERING" || k == "AIRCRAFT");
        let is_infantry = !keywords
            .iter()
            .any(|k| NON_INFANTRY_CATEGORIES.iter().any(|c| k.contains(c)));
        let is_large = !is_infantry || keywords.iter().any(|k| k == "MONSTER" || k == "TOWERING");
        let deep_strike = has_named("deep strike");
        let infiltrators = has_named("infiltrators");
        let stealth = has_named("stealth");

        Self {
            id: record.id.clone(),
            name: record.name.clone(),
            category: record.category.clone(),
            stats,
            points: record.points,
            model_count,
            weapons,
            rules: rules.into_iter().map(|(name, _)| name).collect(),
            abilities: abilities.into_iter().map(|(name, _)| name).collect(),
            keywords,
            invulnerable_save,
            feel_no_pain,
            deep_strike,
            infiltrators,
            stealth,
            ignores_obscuring,
            is_infantry,
            is_large,
        }
    }

    pub fn has_keyword(&self, keyword: &str) -> bool {
        self.keywords.iter().any(|k| k.eq_ignore_ascii_case(keyword))
    }

    pub fn is_character(&self) -> bool {
        self.has_keyword("CHARACTER") || self.has_keyword("EPIC HERO")
    }

    /// Wounds of the full-strength unit
    pub fn max_wounds(&self) -> u32 {
        self.stats.wounds * self.model_count
    }
}

fn parse_stats(stats: &StatsRecord, unit_name: &str, warnings: &mut Vec<String>) -> UnitStats {
    let mut read = |label: &str, value: &Option<String>, default: f32| -> f32 {
        match value.as_deref().and_then(parse_leading_number) {
            Some(v) => v,
            None => {
                record_warning(
                    warnings,
                    format!(
                        "{}: unreadable {} '{}', using default {}",
                        unit_name,
                        label,
                        value.as_deref().unwrap_or(""),
                        default
                    ),
                );
                default
            }
        }
    };

    let oc = read("objective control", &stats.objective_control, DEFAULT_OBJECTIVE_CONTROL as f32);
    UnitStats {
        movement: read("move", &stats.move_, DEFAULT_MOVE).max(0.0),
        toughness: read("toughness", &stats.toughness, DEFAULT_TOUGHNESS as f32).max(1.0) as u32,
        save: read("save", &stats.save, DEFAULT_SAVE as f32).clamp(2.0, 7.0) as u8,
        wounds: read("wounds", &stats.wounds, DEFAULT_WOUNDS as f32).max(1.0) as u32,
        leadership: read("leadership", &stats.leadership, DEFAULT_LEADERSHIP as f32)
            .clamp(2.0, 12.0) as u8,
        objective_control: oc.max(0.0) as u32,
    }
}

/// Find an `N+` value in text that mentions `phrase`
fn parse_threshold_near(text: &str, phrase: &str) -> Option<u8> {
    let lower = text.to_ascii_lowercase();
    if !lower.contains(phrase) {
        return None;
    }
    let bytes = lower.as_bytes();
    for i in 1..bytes.len() {
        if bytes[i] == b'+' && bytes[i - 1].is_ascii_digit() {
            let value = bytes[i - 1] - b'0';
            if (2..=6).contains(&value) {
                return Some(value);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROSTER: &str = r#"{
        "armyName": "Test Strike Force",
        "faction": "Space Marines",
        "pointsTotal": 300,
        "rules": {
            "r1": {"id": "r1", "name": "Deep Strike", "description": "Arrives from reserves", "hidden": false}
        },
        "abilities": {
            "a1": {"id": "a1", "name": "Invulnerable Save", "description": "This model has a 4+ invulnerable save."},
            "a2": {"id": "a2", "name": "Feel No Pain 5+", "description": ""}
        },
        "units": [
            {
                "id": "u1",
                "name": "Terminator Squad",
                "type": "Infantry",
                "stats": {"move": "5\"", "toughness": "5", "save": "2+", "wounds": "3", "leadership": "6+", "objectiveControl": "1"},
                "points": 170,
                "count": 1,
                "weapons": [
                    {"id": "w1", "name": "Storm bolter", "type": "Ranged Weapons",
                     "characteristics": {"range": "24\"", "a": "2", "bs": "3+", "s": "4", "ap": "0", "d": "1", "keywords": "Rapid Fire 2"},
                     "count": 5, "models_with_weapon": 5}
                ],
                "rules": ["r1"],
                "abilities": ["a1", "a2"],
                "models": [
                    {"id": "m1", "name": "Terminator Sergeant", "count": 1},
                    {"id": "m2", "name": "Terminator", "count": 4}
                ]
            },
            {
                "id": "u2",
                "name": "Predator",
                "type": "Vehicle",
                "stats": {"move": "10\"", "toughness": "10", "save": "3+", "wounds": "N/A", "leadership": "6+", "objectiveControl": "3"},
                "points": 130,
                "count": 1
            }
        ]
    }"#;

    #[test]
    fn test_roster_parses() {
        let army = ArmyList::from_json_str(ROSTER).expect("valid roster");
        assert_eq!(army.army_name, "Test Strike Force");
        assert_eq!(army.units.len(), 2);
    }

    #[test]
    fn test_template_from_nested_models() {
        let army = ArmyList::from_json_str(ROSTER).unwrap();
        let mut warnings = Vec::new();
        let templates = army.templates(&mut warnings);
        let terminators = &templates[0];

        assert_eq!(terminators.model_count, 5);
        assert_eq!(terminators.stats.movement, 5.0);
        assert_eq!(terminators.stats.save, 2);
        assert_eq!(terminators.stats.wounds, 3);
        assert_eq!(terminators.stats.leadership, 6);
        assert_eq!(terminators.max_wounds(), 15);
        assert!(terminators.deep_strike);
        assert_eq!(terminators.invulnerable_save, Some(4));
        assert_eq!(terminators.feel_no_pain, Some(5));
        assert!(terminators.is_infantry);
        assert!(!terminators.is_large);
        assert_eq!(terminators.weapons.len(), 1);
    }

    #[test]
    fn test_unreadable_stat_falls_back_with_warning() {
        let army = ArmyList::from_json_str(ROSTER).unwrap();
        let mut warnings = Vec::new();
        let templates = army.templates(&mut warnings);
        let predator = &templates[1];

        assert_eq!(predator.stats.wounds, DEFAULT_WOUNDS);
        assert_eq!(predator.stats.objective_control, 3);
        assert!(!predator.is_infantry);
        assert!(predator.is_large);
        assert!(warnings.iter().any(|w| w.contains("Predator") && w.contains("wounds")));
    }

    #[test]
    fn test_parse_threshold_near() {
        assert_eq!(
            parse_threshold_near("has a 4+ invulnerable save", "invulnerable save"),
            Some(4)
        );
        assert_eq!(parse_threshold_near("Feel No Pain 6+", "feel no pain"), Some(6));
        assert_eq!(parse_threshold_near("nothing here 4+", "invulnerable"), None);
    }

    #[test]
    fn test_missing_stats_use_defaults() {
        let json = r#"{"armyName": "Bare", "units": [{"name": "Mystery unit"}]}"#;
        let army = ArmyList::from_json_str(json).unwrap();
        let mut warnings = Vec::new();
        let templates = army.templates(&mut warnings);
        assert_eq!(templates[0].stats, UnitStats::default());
        assert_eq!(warnings.len(), 6);
    }
}
