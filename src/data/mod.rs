//! Army list data: roster records, unit templates and weapon profiles

pub mod army_list;
pub mod weapons;

pub use army_list::{ArmyList, UnitStats, UnitTemplate};
pub use weapons::{DiceExpr, FiringMode, Weapon, WeaponAbility, WeaponKind};
