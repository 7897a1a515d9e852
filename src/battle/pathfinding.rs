//! A* pathfinding over the nav mesh
//!
//! Respects terrain passability per mover category and charges a penalty
//! for crossing difficult ground.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ahash::AHashMap;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::battle::constants::PATH_EPSILON;
use crate::battle::navmesh::NavMesh;
use crate::battle::terrain::{
    is_movement_blocked, is_position_blocked_by_terrain, movement_penalty_along,
    path_movement_penalty, segment_penalty_once, TerrainFeature,
};
use crate::core::types::Point;

/// Outcome of a path query; `found: false` is a blocked outcome, not an error
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathResult {
    pub found: bool,
    pub path: Vec<Point>,
    /// Geometric length of the polyline
    pub distance: f32,
    /// Extra inches charged for difficult ground
    pub movement_penalty: f32,
}

impl PathResult {
    fn not_found() -> Self {
        Self::default()
    }

    /// Movement needed to walk the whole path
    pub fn total_cost(&self) -> f32 {
        self.distance + self.movement_penalty
    }
}

/// Furthest reachable point along a path
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TravelPoint {
    pub point: Point,
    /// Movement spent reaching `point`, penalties included
    pub distance_traveled: f32,
    /// Index of the last path vertex fully reached
    pub path_index: usize,
}

/// Node in the A* open set
#[derive(Debug, Clone)]
struct PathNode {
    index: usize,
    f_cost: OrderedFloat<f32>,
}

impl PartialEq for PathNode {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.f_cost == other.f_cost
    }
}

impl Eq for PathNode {}

impl Ord for PathNode {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse order for min-heap
        other.f_cost.cmp(&self.f_cost).then_with(|| other.index.cmp(&self.index))
    }
}

impl PartialOrd for PathNode {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Per-query edge validation for one mover class
struct EdgeCache<'a> {
    terrain: &'a [TerrainFeature],
    is_infantry: bool,
    is_large: bool,
    radius: f32,
    memo: AHashMap<(usize, usize), Option<(f32, f32)>>,
}

impl<'a> EdgeCache<'a> {
    /// (length, penalty) when the edge is traversable
    fn edge(&mut self, i: usize, j: usize, a: Point, b: Point) -> Option<(f32, f32)> {
        let key = if i < j { (i, j) } else { (j, i) };
        if let Some(cached) = self.memo.get(&key) {
            return *cached;
        }
        let result = if is_movement_blocked(
            a,
            b,
            self.terrain,
            self.is_infantry,
            self.is_large,
            self.radius,
        ).blocked {
            None
        } else {
            Some((a.distance(b), movement_penalty_along(a, b, self.terrain)))
        };
        self.memo.insert(key, result);
        result
    }
}

/// Find a path for a mover of the given category and radius
///
/// Identical endpoints give a zero-length path. An unobstructed straight
/// segment is returned directly; otherwise A* runs over the mesh waypoints
/// plus the query endpoints.
pub fn find_path(
    start: Point,
    end: Point,
    nav_mesh: &NavMesh,
    terrain: &[TerrainFeature],
    is_infantry: bool,
    is_large: bool,
    radius: f32,
) -> PathResult {
    if start.distance(end) < PATH_EPSILON {
        return PathResult {
            found: true,
            path: vec![start],
            distance: 0.0,
            movement_penalty: 0.0,
        };
    }

    if !is_movement_blocked(start, end, terrain, is_infantry, is_large, radius).blocked {
        return PathResult {
            found: true,
            path: vec![start, end],
            distance: start.distance(end),
            movement_penalty: movement_penalty_along(start, end, terrain),
        };
    }

    if is_position_blocked_by_terrain(end, radius, terrain, is_infantry, is_large).blocked {
        return PathResult::not_found();
    }

    // Waypoints are offset for the mesh clearance; a wider mover is checked at that clearance
    let edge_radius = radius.min(nav_mesh.clearance);
    let strict_class = !is_infantry;
    let waypoint_count = nav_mesh.waypoints.len();
    let start_index = waypoint_count;
    let end_index = waypoint_count + 1;
    let point_of = |index: usize| -> Point {
        if index == start_index {
            start
        } else if index == end_index {
            end
        } else {
            nav_mesh.waypoints[index].point
        }
    };

    let mut edges = EdgeCache {
        terrain,
        is_infantry,
        is_large,
        radius: edge_radius,
        memo: AHashMap::new(),
    };

    let mut open_set = BinaryHeap::new();
    let mut came_from: AHashMap<usize, usize> = AHashMap::new();
    let mut g_scores: AHashMap<usize, f32> = AHashMap::new();

    g_scores.insert(start_index, 0.0);
    open_set.push(PathNode {
        index: start_index,
        f_cost: OrderedFloat(start.distance(end)),
    });

    while let Some(current) = open_set.pop() {
        if current.index == end_index {
            return build_result(&came_from, end_index, &point_of, terrain);
        }

        let current_g = *g_scores.get(&current.index).unwrap_or(&f32::INFINITY);
        if current.f_cost.0 > current_g + point_of(current.index).distance(end) + PATH_EPSILON {
            // Stale entry
            continue;
        }
        let current_point = point_of(current.index);

        let neighbors: Vec<usize> = if current.index == start_index || !strict_class {
            (0..waypoint_count).chain(std::iter::once(end_index)).collect()
        } else {
            nav_mesh.waypoints[current.index]
                .connections
                .iter()
                .copied()
                .chain(std::iter::once(end_index))
                .collect()
        };

        for neighbor in neighbors {
            if neighbor == current.index
                || (current.index == start_index && neighbor == end_index)
            {
                continue;
            }
            let neighbor_point = point_of(neighbor);
            let Some((length, penalty)) = edges.edge(
                current.index,
                neighbor,
                current_point,
                neighbor_point,
            ) else {
                continue;
            };

            let tentative_g = current_g + length + penalty;
            let neighbor_g = *g_scores.get(&neighbor).unwrap_or(&f32::INFINITY);

            if tentative_g < neighbor_g {
                came_from.insert(neighbor, current.index);
                g_scores.insert(neighbor, tentative_g);
                open_set.push(PathNode {
                    index: neighbor,
                    f_cost: OrderedFloat(tentative_g + neighbor_point.distance(end)),
                });
            }
        }
    }

    PathResult::not_found()
}

fn build_result(
    came_from: &AHashMap<usize, usize>,
    end_index: usize,
    point_of: &dyn Fn(usize) -> Point,
    terrain: &[TerrainFeature],
) -> PathResult {
    let mut indices = vec![end_index];
    let mut current = end_index;
    while let Some(&prev) = came_from.get(&current) {
        indices.push(prev);
        current = prev;
    }
    indices.reverse();

    let path: Vec<Point> = indices.into_iter().map(point_of).collect();
    let distance = path_length(&path);
    let movement_penalty = path_movement_penalty(&path, terrain);

    PathResult {
        found: true,
        path,
        distance,
        movement_penalty,
    }
}

/// Walk `path` spending at most `allowance` inches of movement
pub fn get_max_travel_point(
    path: &[Point],
    allowance: f32,
    terrain: &[TerrainFeature],
) -> TravelPoint {
    let Some(&first) = path.first() else {
        return TravelPoint {
            point: Point::ZERO,
            distance_traveled: 0.0,
            path_index: 0,
        };
    };

    let mut remaining = allowance.max(0.0);
    let mut spent = 0.0;
    let mut position = first;
    let mut paid = vec![false; terrain.len()];

    for (index, segment) in path.windows(2).enumerate() {
        let (a, b) = (segment[0], segment[1]);
        let length = a.distance(b);
        let cost = length + segment_penalty_once(a, b, terrain, &mut paid);
        if cost <= remaining {
            remaining -= cost;
            spent += cost;
            position = b;
            continue;
        }
        if cost > 0.0 && remaining > 0.0 {
            let fraction = remaining / cost;
            position = a + (b - a) * fraction;
            spent += remaining;
        }
        return TravelPoint {
            point: position,
            distance_traveled: spent,
            path_index: index,
        };
    }

    TravelPoint {
        point: position,
        distance_traveled: spent,
        path_index: path.len() - 1,
    }
}

/// Geometric length of a polyline
pub fn path_length(path: &[Point]) -> f32 {
    path.windows(2).map(|w| w[0].distance(w[1])).sum()
}
