//! Planar geometry helpers for terrain polygons and unit footprints

use glam::Vec2;

use crate::core::types::Point;

/// Ray-casting containment test
pub fn point_in_polygon(point: Point, polygon: &[Point]) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    let mut inside = false;
    let n = polygon.len();

    let mut j = n - 1;
    for i in 0..n {
        let pi = polygon[i];
        let pj = polygon[j];

        if ((pi.y > point.y) != (pj.y > point.y))
            && (point.x < (pj.x - pi.x) * (point.y - pi.y) / (pj.y - pi.y) + pi.x)
        {
            inside = !inside;
        }

        j = i;
    }

    inside
}

fn cross(a: Vec2, b: Vec2) -> f32 {
    a.x * b.y - a.y * b.x
}

/// Do segments `a1-a2` and `b1-b2` intersect (including touching)?
pub fn segments_intersect(a1: Point, a2: Point, b1: Point, b2: Point) -> bool {
    let d1 = cross(b2 - b1, a1 - b1);
    let d2 = cross(b2 - b1, a2 - b1);
    let d3 = cross(a2 - a1, b1 - a1);
    let d4 = cross(a2 - a1, b2 - a1);

    if ((d1 > 0.0 && d2 < 0.0) || (d1 < 0.0 && d2 > 0.0))
        && ((d3 > 0.0 && d4 < 0.0) || (d3 < 0.0 && d4 > 0.0))
    {
        return true;
    }

    (d1 == 0.0 && on_segment(b1, b2, a1))
        || (d2 == 0.0 && on_segment(b1, b2, a2))
        || (d3 == 0.0 && on_segment(a1, a2, b1))
        || (d4 == 0.0 && on_segment(a1, a2, b2))
}

fn on_segment(p: Point, q: Point, r: Point) -> bool {
    r.x >= p.x.min(q.x) && r.x <= p.x.max(q.x) && r.y >= p.y.min(q.y) && r.y <= p.y.max(q.y)
}

/// Shortest distance from a point to a segment
pub fn point_segment_distance(point: Point, a: Point, b: Point) -> f32 {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f32::EPSILON {
        return point.distance(a);
    }
    let t = ((point - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    point.distance(a + ab * t)
}

pub fn segment_segment_distance(a1: Point, a2: Point, b1: Point, b2: Point) -> f32 {
    if segments_intersect(a1, a2, b1, b2) {
        return 0.0;
    }
    point_segment_distance(a1, b1, b2)
        .min(point_segment_distance(a2, b1, b2))
        .min(point_segment_distance(b1, a1, a2))
        .min(point_segment_distance(b2, a1, a2))
}

/// Iterate polygon edges as (start, end) pairs, closing the loop
pub fn polygon_edges(polygon: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    let n = polygon.len();
    (0..n).map(move |i| (polygon[i], polygon[(i + 1) % n]))
}

/// Distance from a segment to a polygon (0 when touching or inside)
pub fn segment_polygon_distance(a: Point, b: Point, polygon: &[Point]) -> f32 {
    if point_in_polygon(a, polygon) || point_in_polygon(b, polygon) {
        return 0.0;
    }
    polygon_edges(polygon)
        .map(|(p, q)| segment_segment_distance(a, b, p, q))
        .fold(f32::INFINITY, f32::min)
}

/// Does the segment pass through the polygon interior or cross its boundary?
pub fn segment_crosses_polygon(a: Point, b: Point, polygon: &[Point]) -> bool {
    segment_polygon_distance(a, b, polygon) <= 0.0
}

/// Distance from a point to a polygon (0 when inside)
pub fn point_polygon_distance(point: Point, polygon: &[Point]) -> f32 {
    if point_in_polygon(point, polygon) {
        return 0.0;
    }
    polygon_edges(polygon)
        .map(|(p, q)| point_segment_distance(point, p, q))
        .fold(f32::INFINITY, f32::min)
}

/// Vertex average; adequate for the convex shapes terrain uses
pub fn polygon_centroid(polygon: &[Point]) -> Point {
    if polygon.is_empty() {
        return Point::ZERO;
    }
    polygon.iter().copied().sum::<Vec2>() / polygon.len() as f32
}

/// Distance from the centroid to the furthest vertex
pub fn polygon_radius(polygon: &[Point]) -> f32 {
    let centroid = polygon_centroid(polygon);
    polygon.iter().map(|p| p.distance(centroid)).fold(0.0, f32::max)
}

/// Corners of a rectangle rotated `rotation_deg` about its centre
pub fn rectangle(center: Point, width: f32, height: f32, rotation_deg: f32) -> Vec<Point> {
    let half = Vec2::new(width / 2.0, height / 2.0);
    let rotation = Vec2::from_angle(rotation_deg.to_radians());
    [
        Vec2::new(-half.x, -half.y),
        Vec2::new(half.x, -half.y),
        Vec2::new(half.x, half.y),
        Vec2::new(-half.x, half.y),
    ]
    .into_iter()
    .map(|corner| center + rotation.rotate(corner))
    .collect()
}

/// Unit vector perpendicular to `v` (counter-clockwise)
pub fn perpendicular(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}
