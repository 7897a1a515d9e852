//! Waypoint graph around blocking terrain
//!
//! Built once per run. Corner waypoints sit just outside every blocking
//! feature; boundary samples give paths room to swing wide. Edges are the
//! pairs visible to the strictest mover class.

use serde::{Deserialize, Serialize};

use crate::battle::constants::NAV_BOUNDARY_SPACING;
use crate::battle::geometry::perpendicular;
use crate::battle::terrain::{is_movement_blocked, is_position_blocked_by_terrain, TerrainFeature};
use crate::core::types::Point;

/// Extra offset so edges between neighbouring corners clear the wall they run along
const CORNER_SLACK: f32 = 0.05;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: usize,
    pub point: Point,
    pub is_corner: bool,
    pub terrain_id: Option<String>,
    pub connections: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NavBounds {
    pub width: f32,
    pub height: f32,
}

impl NavBounds {
    pub fn contains(&self, point: Point, margin: f32) -> bool {
        point.x >= margin
            && point.x <= self.width - margin
            && point.y >= margin
            && point.y <= self.height - margin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavMesh {
    pub waypoints: Vec<Waypoint>,
    pub bounds: NavBounds,
    pub clearance: f32,
}

impl NavMesh {
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn corner_count(&self) -> usize {
        self.waypoints.iter().filter(|w| w.is_corner).count()
    }
}

/// Unit normal of edge `a-b` pointing away from `center`
fn outward_normal(a: Point, b: Point, center: Point) -> Point {
    let normal = perpendicular(b - a).normalize_or_zero();
    if normal.dot((a + b) / 2.0 - center) < 0.0 {
        -normal
    } else {
        normal
    }
}

/// Build the waypoint graph for a table
pub fn generate_nav_mesh(
    terrain: &[TerrainFeature],
    width: f32,
    height: f32,
    clearance: f32,
) -> NavMesh {
    let bounds = NavBounds { width, height };
    let mut waypoints: Vec<Waypoint> = Vec::new();

    let push = |point: Point,
                is_corner: bool,
                terrain_id: Option<String>,
                waypoints: &mut Vec<Waypoint>| {
        if !bounds.contains(point, clearance.min(width / 2.0).min(height / 2.0)) {
            return;
        }
        // Corners of one feature can land inside a neighbour
        if is_position_blocked_by_terrain(point, 0.0, terrain, false, true).blocked {
            return;
        }
        let id = waypoints.len();
        waypoints.push(Waypoint {
            id,
            point,
            is_corner,
            terrain_id,
            connections: Vec::new(),
        });
    };

    for feature in terrain.iter().filter(|f| f.blocks_mover(false, true)) {
        let center = feature.center();
        let polygon = &feature.polygon;
        let n = polygon.len();
        for i in 0..n {
            let prev = polygon[(i + n - 1) % n];
            let vertex = polygon[i];
            let next = polygon[(i + 1) % n];
            let offset =
                outward_normal(prev, vertex, center) + outward_normal(vertex, next, center);
            let point = vertex + offset * (clearance + CORNER_SLACK);
            push(point, true, Some(feature.id.clone()), &mut waypoints);
        }
    }

    let inset = clearance.min(width / 2.0).min(height / 2.0);
    let steps_x = (width / NAV_BOUNDARY_SPACING).ceil().max(1.0) as usize;
    let steps_y = (height / NAV_BOUNDARY_SPACING).ceil().max(1.0) as usize;
    for i in 0..=steps_x {
        let x = inset + (width - 2.0 * inset) * i as f32 / steps_x as f32;
        push(Point::new(x, inset), false, None, &mut waypoints);
        push(Point::new(x, height - inset), false, None, &mut waypoints);
    }
    for j in 1..steps_y {
        let y = inset + (height - 2.0 * inset) * j as f32 / steps_y as f32;
        push(Point::new(inset, y), false, None, &mut waypoints);
        push(Point::new(width - inset, y), false, None, &mut waypoints);
    }

    let n = waypoints.len();
    for i in 0..n {
        for j in (i + 1)..n {
            let (a, b) = (waypoints[i].point, waypoints[j].point);
            if !is_movement_blocked(a, b, terrain, false, true, 0.0).blocked {
                waypoints[i].connections.push(j);
                waypoints[j].connections.push(i);
            }
        }
    }

    tracing::debug!(waypoints = n, clearance, "Generated nav mesh");

    NavMesh {
        waypoints,
        bounds,
        clearance,
    }
}
