//! # Geometry Utilities
//!
//! Small numeric helpers over plane points. Floating point comparisons are
//! bounded by [`GEOMETRY_EPSILON`] instead of exact equality.

/// Relative tolerance for length and area comparisons
pub const GEOMETRY_EPSILON: f64 = 1e-9;

/// A point in the plane
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Point at fraction `t` of the way from `self` to `other`
    pub fn lerp(self, other: Point, t: f64) -> Point {
        Point::new(
            self.x + t * (other.x - self.x),
            self.y + t * (other.y - self.y),
        )
    }

    fn approx_eq(self, other: Point) -> bool {
        approx_eq(self.x, other.x) && approx_eq(self.y, other.y)
    }
}

/// Compare two values with a tolerance scaled to their magnitude.
pub fn approx_eq(a: f64, b: f64) -> bool {
    let scale = 1.0_f64.max(a.abs()).max(b.abs());
    (a - b).abs() <= GEOMETRY_EPSILON * scale
}

pub fn euclidean_distance(a: Point, b: Point) -> f64 {
    (b.x - a.x).hypot(b.y - a.y)
}

/// Unsigned area of the triangle `a b c`
pub fn triangle_area(a: Point, b: Point, c: Point) -> f64 {
    (0.5 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y))).abs()
}

/// Whether the three points lie on one line.
///
/// The area is compared against the squared length of the longest side so
/// the test does not depend on the coordinate scale.
pub fn is_collinear(a: Point, b: Point, c: Point) -> bool {
    let longest = euclidean_distance(a, b)
        .max(euclidean_distance(b, c))
        .max(euclidean_distance(c, a));
    triangle_area(a, b, c) <= GEOMETRY_EPSILON * longest.powi(2).max(1.0)
}

/// Whether the triangle `a b c` is non-degenerate with at least two equal sides
pub fn is_isosceles(a: Point, b: Point, c: Point) -> bool {
    if is_collinear(a, b, c) {
        return false;
    }
    let ab = euclidean_distance(a, b);
    let bc = euclidean_distance(b, c);
    let ca = euclidean_distance(c, a);
    approx_eq(ab, bc) || approx_eq(bc, ca) || approx_eq(ab, ca)
}

/// Points dividing every side of `triangle` into `parts` equal pieces.
///
/// Sides are walked `0→1`, `1→2`, `2→0`; each contributes `parts - 1`
/// interior points. Returns nothing for `parts < 2`.
pub fn subdivide_sides(triangle: &[Point; 3], parts: u32) -> Vec<Point> {
    if parts < 2 {
        return Vec::new();
    }
    let mut points = Vec::with_capacity(3 * (parts as usize - 1));
    for side in 0..3 {
        let start = triangle[side];
        let end = triangle[(side + 1) % 3];
        for step in 1..parts {
            points.push(start.lerp(end, f64::from(step) / f64::from(parts)));
        }
    }
    points
}

/// Isosceles triangles with one corner at a vertex of `triangle` and the
/// other two among its vertices and side subdivision points.
///
/// Each triangle is reported once, corners in the order they were found.
pub fn find_isosceles_triangles(triangle: &[Point; 3], parts: u32) -> Vec<[Point; 3]> {
    let mut candidates: Vec<Point> = triangle.to_vec();
    candidates.extend(subdivide_sides(triangle, parts));

    let mut found: Vec<[Point; 3]> = Vec::new();
    for apex in triangle {
        for (j, &second) in candidates.iter().enumerate() {
            for &third in &candidates[j + 1..] {
                if second.approx_eq(*apex) || third.approx_eq(*apex) {
                    continue;
                }
                if !is_isosceles(*apex, second, third) {
                    continue;
                }
                let corners = [*apex, second, third];
                if !found.iter().any(|existing| same_triangle(existing, &corners)) {
                    found.push(corners);
                }
            }
        }
    }
    found
}

fn same_triangle(a: &[Point; 3], b: &[Point; 3]) -> bool {
    a.iter().all(|p| b.iter().any(|q| p.approx_eq(*q)))
}
