//! Battlefield bounds, deployment zones and objective layout

use serde::{Deserialize, Serialize};

use crate::battle::objectives::{ObjectiveMarker, ObjectivePriority};
use crate::battle::terrain::TerrainFeature;
use crate::core::types::{ArmyTag, Point};

/// The table: a bounded rectangle with one deployment zone per short edge
///
/// Army A deploys along `x = 0`, army B along `x = width`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battlefield {
    pub width: f32,
    pub height: f32,
    pub deploy_depth: f32,
    pub terrain: Vec<TerrainFeature>,
}

impl Battlefield {
    pub fn new(width: f32, height: f32, deploy_depth: f32, terrain: Vec<TerrainFeature>) -> Self {
        Self {
            width,
            height,
            deploy_depth,
            terrain,
        }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }

    /// X extent of an army's deployment zone
    pub fn deployment_zone(&self, tag: ArmyTag) -> (f32, f32) {
        match tag {
            ArmyTag::A => (0.0, self.deploy_depth),
            ArmyTag::B => (self.width - self.deploy_depth, self.width),
        }
    }

    /// Convert a depth measured from `tag`'s own table edge into an x coordinate
    pub fn x_from_edge(&self, tag: ArmyTag, depth: f32) -> f32 {
        match tag {
            ArmyTag::A => depth,
            ArmyTag::B => self.width - depth,
        }
    }

    /// Distance from `x` to `tag`'s own table edge
    pub fn depth_from_edge(&self, tag: ArmyTag, x: f32) -> f32 {
        match tag {
            ArmyTag::A => x,
            ArmyTag::B => self.width - x,
        }
    }

    /// Shortest distance from a point to any table edge
    pub fn distance_to_edge(&self, point: Point) -> f32 {
        point
            .x
            .min(self.width - point.x)
            .min(point.y)
            .min(self.height - point.y)
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= 0.0 && point.y >= 0.0 && point.x <= self.width && point.y <= self.height
    }

    /// Five markers: one in each deployment zone, a primary in the centre
    /// and two secondaries on the centre line.
    pub fn default_objectives(&self) -> Vec<ObjectiveMarker> {
        let mid_y = self.height / 2.0;
        let mid_x = self.width / 2.0;
        let home = self.deploy_depth / 2.0;
        let layout = [
            (
                "home-a",
                Point::new(self.x_from_edge(ArmyTag::A, home), mid_y),
                ObjectivePriority::Secondary,
            ),
            ("north", Point::new(mid_x, self.height * 0.25), ObjectivePriority::Secondary),
            ("center", Point::new(mid_x, mid_y), ObjectivePriority::Primary),
            ("south", Point::new(mid_x, self.height * 0.75), ObjectivePriority::Secondary),
            (
                "home-b",
                Point::new(self.x_from_edge(ArmyTag::B, home), mid_y),
                ObjectivePriority::Secondary,
            ),
        ];

        layout
            .into_iter()
            .map(|(id, point, priority)| {
                ObjectiveMarker::new(id, self.clear_of_terrain(point), priority)
            })
            .collect()
    }

    /// Slide a marker along y until it is outside every terrain footprint
    fn clear_of_terrain(&self, point: Point) -> Point {
        let inside = |p: Point| self.terrain.iter().any(|f| f.contains(p));
        if !inside(point) {
            return point;
        }
        for step in 1..=12 {
            let offset = step as f32 * 2.0;
            for candidate in [point + Point::new(0.0, offset), point - Point::new(0.0, offset)] {
                if self.contains(candidate) && !inside(candidate) {
                    return candidate;
                }
            }
        }
        point
    }
}
