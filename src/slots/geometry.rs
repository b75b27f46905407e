//! Point-in-polygon containment
//!
//! Integer arithmetic throughout, widened to i64 so cross products of
//! frame-sized coordinates cannot overflow.

use super::Point;

/// Whether `point` lies inside `polygon` or on one of its edges
///
/// The polygon is treated as a closed ring over the given vertex order.
/// Boundary points are checked first; interior points use even-odd ray
/// casting towards +x.
pub fn polygon_contains(polygon: &[Point], point: Point) -> bool {
    if polygon.is_empty() {
        return false;
    }

    let n = polygon.len();
    let px = point.x as i64;
    let py = point.y as i64;
    let mut inside = false;

    for i in 0..n {
        let a = polygon[i];
        let b = polygon[(i + 1) % n];

        if on_segment(a, b, point) {
            return true;
        }

        let (ax, ay) = (a.x as i64, a.y as i64);
        let (bx, by) = (b.x as i64, b.y as i64);

        if (ay > py) != (by > py) {
            // Sign of the cross product tells which side of the edge the point is on
            let cross = (bx - ax) * (py - ay) - (px - ax) * (by - ay);
            let crosses = if by > ay { cross > 0 } else { cross < 0 };
            if crosses {
                inside = !inside;
            }
        }
    }

    inside
}

/// Whether `p` lies on the closed segment from `a` to `b`
pub fn on_segment(a: Point, b: Point, p: Point) -> bool {
    let (ax, ay) = (a.x as i64, a.y as i64);
    let (bx, by) = (b.x as i64, b.y as i64);
    let (px, py) = (p.x as i64, p.y as i64);

    let cross = (bx - ax) * (py - ay) - (by - ay) * (px - ax);
    if cross != 0 {
        return false;
    }

    px >= ax.min(bx) && px <= ax.max(bx) && py >= ay.min(by) && py <= ay.max(by)
}
