//! Battlefield terrain, line of sight and cover
//!
//! Terrain is a set of polygons with a passability class. None of the
//! queries here fail: they return verdicts that callers use to alter plans.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::battle::geometry::{
    point_in_polygon, point_polygon_distance, polygon_centroid, polygon_radius, rectangle,
    segment_crosses_polygon, segment_polygon_distance,
};
use crate::core::error::SimError;
use crate::core::types::Point;

/// Who may move through a feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Passability {
    /// Nobody crosses
    Impassable,
    /// Small infantry may cross (ruin walls)
    Breachable,
    /// Any infantry may cross
    InfantryOnly,
    /// Anyone may cross, at a movement penalty
    Difficult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum CoverType {
    #[default]
    None,
    Light,
    Heavy,
    Dense,
}

/// A terrain piece; immutable for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TerrainFeature {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub polygon: Vec<Point>,
    pub passability: Passability,
    #[serde(default)]
    pub cover: CoverType,
    #[serde(default)]
    pub obscuring: bool,
    /// Extra inches spent crossing the feature
    #[serde(default)]
    pub movement_penalty: Option<f32>,
}

impl TerrainFeature {
    /// Rectangular feature rotated about its centre
    #[allow(clippy::too_many_arguments)]
    pub fn rectangle(
        id: impl Into<String>,
        name: impl Into<String>,
        center: Point,
        width: f32,
        height: f32,
        rotation_deg: f32,
        passability: Passability,
        cover: CoverType,
        obscuring: bool,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            polygon: rectangle(center, width, height, rotation_deg),
            passability,
            cover,
            obscuring,
            movement_penalty: None,
        }
    }

    pub fn with_movement_penalty(mut self, penalty: f32) -> Self {
        self.movement_penalty = Some(penalty);
        self
    }

    /// Does this feature stop a mover of the given category?
    pub fn blocks_mover(&self, is_infantry: bool, is_large: bool) -> bool {
        match self.passability {
            Passability::Impassable => true,
            Passability::Breachable => !(is_infantry && !is_large),
            Passability::InfantryOnly => !is_infantry,
            Passability::Difficult => false,
        }
    }

    /// Does this feature stop every mover class?
    pub fn blocks_all(&self) -> bool {
        self.blocks_mover(false, true)
    }

    pub fn contains(&self, point: Point) -> bool {
        point_in_polygon(point, &self.polygon)
    }

    pub fn center(&self) -> Point {
        polygon_centroid(&self.polygon)
    }

    pub fn radius(&self) -> f32 {
        polygon_radius(&self.polygon)
    }

    /// Penalty charged when a path crosses this feature
    pub fn crossing_penalty(&self) -> f32 {
        match (self.passability, self.movement_penalty) {
            (_, Some(penalty)) => penalty,
            (Passability::Difficult, None) => crate::battle::constants::DIFFICULT_TERRAIN_PENALTY,
            _ => 0.0,
        }
    }
}

/// Verdict of a movement or placement check
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MovementCheck {
    pub blocked: bool,
    pub blocked_by: Option<String>,
}

impl MovementCheck {
    fn blocked_by(feature: &TerrainFeature) -> Self {
        Self {
            blocked: true,
            blocked_by: Some(feature.id.clone()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineOfSight {
    pub has_los: bool,
    pub through_dense: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CoverResult {
    pub has_cover: bool,
    pub cover_type: CoverType,
    pub dense_cover: bool,
}

/// Sweep a circle of `radius` from `a` to `b` against blocking terrain
pub fn is_movement_blocked(
    a: Point,
    b: Point,
    terrain: &[TerrainFeature],
    is_infantry: bool,
    is_large: bool,
    radius: f32,
) -> MovementCheck {
    for feature in terrain {
        if !feature.blocks_mover(is_infantry, is_large) {
            continue;
        }
        if segment_polygon_distance(a, b, &feature.polygon) < radius.max(0.0) + f32::EPSILON
            || segment_crosses_polygon(a, b, &feature.polygon)
        {
            return MovementCheck::blocked_by(feature);
        }
    }
    MovementCheck::default()
}

/// Would a circle of `radius` at `point` overlap blocking terrain?
pub fn is_position_blocked_by_terrain(
    point: Point,
    radius: f32,
    terrain: &[TerrainFeature],
    is_infantry: bool,
    is_large: bool,
) -> MovementCheck {
    for feature in terrain {
        if !feature.blocks_mover(is_infantry, is_large) {
            continue;
        }
        if feature.contains(point) || point_polygon_distance(point, &feature.polygon) < radius {
            return MovementCheck::blocked_by(feature);
        }
    }
    MovementCheck::default()
}

/// Sightline test between two points
///
/// Obscuring features block the line unless either endpoint stands inside
/// the feature or either side ignores obscuring terrain. Dense features the
/// line crosses are reported but do not block.
pub fn check_line_of_sight(
    a: Point,
    b: Point,
    terrain: &[TerrainFeature],
    ignores_obscuring_a: bool,
    ignores_obscuring_b: bool,
) -> LineOfSight {
    let mut through_dense = false;
    for feature in terrain {
        if !segment_crosses_polygon(a, b, &feature.polygon) {
            continue;
        }
        let endpoint_inside = feature.contains(a) || feature.contains(b);
        if feature.obscuring && !endpoint_inside && !ignores_obscuring_a && !ignores_obscuring_b {
            return LineOfSight {
                has_los: false,
                through_dense: false,
            };
        }
        if feature.cover == CoverType::Dense && !endpoint_inside {
            through_dense = true;
        }
    }
    LineOfSight {
        has_los: true,
        through_dense,
    }
}

/// Cover the target gets against this shooter
///
/// A target inside (or touching) a cover feature benefits from it; a
/// sightline crossing heavy or dense terrain the shooter is not standing in
/// grants that cover as well.
pub fn get_terrain_cover(target: Point, shooter: Point, terrain: &[TerrainFeature]) -> CoverResult {
    let mut best = CoverType::None;
    let mut dense_cover = false;

    for feature in terrain {
        if feature.cover == CoverType::None {
            continue;
        }
        let target_in = point_polygon_distance(target, &feature.polygon) <= 1.0;
        let intervenes = !feature.contains(shooter)
            && matches!(feature.cover, CoverType::Heavy | CoverType::Dense)
            && segment_crosses_polygon(shooter, target, &feature.polygon);

        if target_in || intervenes {
            best = best.max(feature.cover);
            if feature.cover == CoverType::Dense {
                dense_cover = true;
            }
        }
    }

    CoverResult {
        has_cover: best != CoverType::None,
        cover_type: best,
        dense_cover,
    }
}

/// Total crossing penalty of difficult features a segment passes through
pub fn movement_penalty_along(a: Point, b: Point, terrain: &[TerrainFeature]) -> f32 {
    terrain
        .iter()
        .filter(|f| f.crossing_penalty() > 0.0 && segment_crosses_polygon(a, b, &f.polygon))
        .map(TerrainFeature::crossing_penalty)
        .sum()
}

/// Penalty for one segment of a longer path
///
/// `paid` tracks, per feature index, whether an earlier segment of the same
/// path already crossed it; such features are not charged again.
pub fn segment_penalty_once(
    a: Point,
    b: Point,
    terrain: &[TerrainFeature],
    paid: &mut [bool],
) -> f32 {
    let mut penalty = 0.0;
    for (feature, slot) in terrain.iter().zip(paid.iter_mut()) {
        if *slot
            || feature.crossing_penalty() <= 0.0
            || !segment_crosses_polygon(a, b, &feature.polygon)
        {
            continue;
        }
        *slot = true;
        penalty += feature.crossing_penalty();
    }
    penalty
}

/// Crossing penalty of a whole path, each feature charged at most once
pub fn path_movement_penalty(path: &[Point], terrain: &[TerrainFeature]) -> f32 {
    let mut paid = vec![false; terrain.len()];
    path.windows(2)
        .map(|w| segment_penalty_once(w[0], w[1], terrain, &mut paid))
        .sum()
}

/// Named table layouts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerrainLayout {
    None,
    Light,
    Standard,
    Dense,
}

impl FromStr for TerrainLayout {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "open" => Ok(TerrainLayout::None),
            "light" => Ok(TerrainLayout::Light),
            "standard" => Ok(TerrainLayout::Standard),
            "dense" => Ok(TerrainLayout::Dense),
            other => Err(SimError::UnknownTerrainLayout(other.to_string())),
        }
    }
}

/// Relative placement of one piece; mirrored through the board centre
struct LayoutPiece {
    name: &'static str,
    /// Fraction of board width/height
    at: (f32, f32),
    size: (f32, f32),
    rotation: f32,
    passability: Passability,
    cover: CoverType,
    obscuring: bool,
}

const RUIN: (Passability, CoverType, bool) = (Passability::Breachable, CoverType::Heavy, true);
const CRATER: (Passability, CoverType, bool) = (Passability::Difficult, CoverType::Light, false);
const WOODS: (Passability, CoverType, bool) = (Passability::Difficult, CoverType::Dense, false);
const CONTAINER: (Passability, CoverType, bool) = (Passability::Impassable, CoverType::Heavy, true);

fn piece(
    name: &'static str,
    at: (f32, f32),
    size: (f32, f32),
    rotation: f32,
    kind: (Passability, CoverType, bool),
) -> LayoutPiece {
    LayoutPiece {
        name,
        at,
        size,
        rotation,
        passability: kind.0,
        cover: kind.1,
        obscuring: kind.2,
    }
}

impl TerrainLayout {
    fn pieces(&self) -> Vec<LayoutPiece> {
        match self {
            TerrainLayout::None => Vec::new(),
            TerrainLayout::Light => vec![
                piece("ruin", (0.35, 0.3), (6.0, 4.0), 0.0, RUIN),
                piece("crater", (0.42, 0.75), (4.0, 4.0), 0.0, CRATER),
            ],
            TerrainLayout::Standard => vec![
                piece("ruin", (0.33, 0.25), (8.0, 5.0), 0.0, RUIN),
                piece("ruin", (0.4, 0.7), (6.0, 4.0), 30.0, RUIN),
                piece("woods", (0.22, 0.55), (5.0, 5.0), 0.0, WOODS),
                piece("container", (0.47, 0.45), (2.0, 5.0), 0.0, CONTAINER),
            ],
            TerrainLayout::Dense => vec![
                piece("ruin", (0.3, 0.2), (8.0, 5.0), 0.0, RUIN),
                piece("ruin", (0.38, 0.5), (6.0, 6.0), 15.0, RUIN),
                piece("ruin", (0.3, 0.8), (7.0, 4.0), 0.0, RUIN),
                piece("woods", (0.18, 0.45), (5.0, 6.0), 0.0, WOODS),
                piece("crater", (0.45, 0.25), (3.0, 3.0), 0.0, CRATER),
                piece("container", (0.46, 0.72), (2.0, 5.0), 45.0, CONTAINER),
            ],
        }
    }

    /// Point-symmetric features for a board of the given size
    pub fn features(&self, width: f32, height: f32) -> Vec<TerrainFeature> {
        let mut features = Vec::new();
        for (index, piece) in self.pieces().into_iter().enumerate() {
            let center = Point::new(piece.at.0 * width, piece.at.1 * height);
            let mirrored = Point::new(width - center.x, height - center.y);
            for (side, at) in [("a", center), ("b", mirrored)] {
                let mut feature = TerrainFeature::rectangle(
                    format!("{}-{}{}", piece.name, index, side),
                    piece.name,
                    at,
                    piece.size.0,
                    piece.size.1,
                    piece.rotation,
                    piece.passability,
                    piece.cover,
                    piece.obscuring,
                );
                if piece.passability == Passability::Difficult {
                    feature = feature.with_movement_penalty(
                        crate::battle::constants::DIFFICULT_TERRAIN_PENALTY,
                    );
                }
                features.push(feature);
            }
        }
        features
    }
}
