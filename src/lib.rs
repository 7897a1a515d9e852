//! Wargame Sim - tabletop miniatures battle simulation

pub mod battle;
pub mod core;
pub mod data;
