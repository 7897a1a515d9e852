//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

/// A point on the battlefield, in inches
pub type Point = glam::Vec2;

/// Battle round counter (1-based once the battle starts)
pub type Round = u32;

/// Which side of the table an army plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArmyTag {
    A,
    B,
}

impl ArmyTag {
    /// The opposing side
    pub fn opponent(&self) -> Self {
        match self {
            ArmyTag::A => ArmyTag::B,
            ArmyTag::B => ArmyTag::A,
        }
    }

    /// Index into `[A, B]` arrays
    pub fn index(&self) -> usize {
        match self {
            ArmyTag::A => 0,
            ArmyTag::B => 1,
        }
    }
}

impl std::fmt::Display for ArmyTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArmyTag::A => write!(f, "A"),
            ArmyTag::B => write!(f, "B"),
        }
    }
}

/// Clamp a point so a circle of `radius` stays inside a `width` x `height` board
pub fn clamp_to_board(point: Point, radius: f32, width: f32, height: f32) -> Point {
    let rx = radius.min(width / 2.0);
    let ry = radius.min(height / 2.0);
    Point::new(point.x.clamp(rx, width - rx), point.y.clamp(ry, height - ry))
}
