// src/geometry.rs
//
// Point-in-polygon containment for spot footprints. Boundary points
// count as contained: a car parked on the line still occupies the spot.

use crate::types::Point;

// Tolerance for the edge test, in pixels. Spot polygons live in frame
// pixel coordinates, so sub-pixel slack is enough.
const EDGE_EPSILON: f32 = 1e-3;

/// Ray-casting containment test, inclusive of the polygon boundary.
/// Polygons with fewer than 3 vertices never contain anything.
pub fn point_in_polygon(polygon: &[Point], point: Point) -> bool {
    if polygon.len() < 3 {
        return false;
    }

    if on_boundary(polygon, point) {
        return true;
    }

    let (px, py) = point;
    let mut inside = false;
    let mut j = polygon.len() - 1;

    for i in 0..polygon.len() {
        let (xi, yi) = polygon[i];
        let (xj, yj) = polygon[j];

        if (yi > py) != (yj > py) {
            let x_cross = xi + (py - yi) / (yj - yi) * (xj - xi);
            if px < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }

    inside
}

fn on_boundary(polygon: &[Point], point: Point) -> bool {
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        if point_on_segment(polygon[j], polygon[i], point) {
            return true;
        }
        j = i;
    }
    false
}

fn point_on_segment(a: Point, b: Point, p: Point) -> bool {
    let (ax, ay) = a;
    let (bx, by) = b;
    let (px, py) = p;

    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;

    // Zero-length edge: compare against the single vertex.
    if len_sq == 0.0 {
        let ddx = px - ax;
        let ddy = py - ay;
        return ddx * ddx + ddy * ddy <= EDGE_EPSILON * EDGE_EPSILON;
    }

    // Perpendicular distance from the edge line.
    let cross = dx * (py - ay) - dy * (px - ax);
    if cross * cross > EDGE_EPSILON * EDGE_EPSILON * len_sq {
        return false;
    }

    // Projection must land within the segment.
    let dot = (px - ax) * dx + (py - ay) * dy;
    dot >= 0.0 && dot <= len_sq
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Vec<Point> {
        vec![(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]
    }

    #[test]
    fn test_strictly_inside_convex() {
        let square = unit_square();
        assert!(point_in_polygon(&square, (5.0, 5.0)));
        assert!(point_in_polygon(&square, (0.5, 9.5)));
        assert!(point_in_polygon(&square, (9.9, 0.1)));
    }

    #[test]
    fn test_strictly_outside_convex() {
        let square = unit_square();
        assert!(!point_in_polygon(&square, (-1.0, 5.0)));
        assert!(!point_in_polygon(&square, (5.0, 11.0)));
        assert!(!point_in_polygon(&square, (15.0, 15.0)));
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let square = unit_square();
        // Edge midpoints
        assert!(point_in_polygon(&square, (5.0, 0.0)));
        assert!(point_in_polygon(&square, (10.0, 5.0)));
        // Vertices
        assert!(point_in_polygon(&square, (0.0, 0.0)));
        assert!(point_in_polygon(&square, (10.0, 10.0)));
    }

    #[test]
    fn test_degenerate_polygon_never_contains() {
        assert!(!point_in_polygon(&[], (0.0, 0.0)));
        assert!(!point_in_polygon(&[(1.0, 1.0)], (1.0, 1.0)));
        assert!(!point_in_polygon(&[(0.0, 0.0), (10.0, 10.0)], (5.0, 5.0)));
    }

    #[test]
    fn test_concave_polygon() {
        // L-shape: the notch at the upper right is outside.
        let l_shape = vec![
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 5.0),
            (5.0, 5.0),
            (5.0, 10.0),
            (0.0, 10.0),
        ];
        assert!(point_in_polygon(&l_shape, (2.0, 8.0)));
        assert!(point_in_polygon(&l_shape, (8.0, 2.0)));
        assert!(!point_in_polygon(&l_shape, (8.0, 8.0)));
    }

    #[test]
    fn test_skewed_quadrilateral() {
        // Typical perspective-distorted spot footprint.
        let quad = vec![(100.0, 200.0), (180.0, 190.0), (200.0, 260.0), (110.0, 270.0)];
        assert!(point_in_polygon(&quad, (150.0, 230.0)));
        assert!(!point_in_polygon(&quad, (90.0, 230.0)));
        assert!(!point_in_polygon(&quad, (150.0, 150.0)));
    }
}
