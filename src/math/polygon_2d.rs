use super::{frame, Point2, Point3, Vector2, Vector3, TOLERANCE};
use crate::error::{GeometryError, Result};

/// Computes the signed area of a polygon (shoelace formula).
///
/// Positive for counter-clockwise, negative for clockwise.
#[must_use]
pub fn signed_area(points: &[Point2]) -> f64 {
    let n = points.len();
    if n < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for i in 0..n {
        let j = (i + 1) % n;
        sum += points[i].x * points[j].y - points[j].x * points[i].y;
    }
    sum * 0.5
}

/// Newell normal of a 3D polygon, not normalized. Its length is twice the area.
#[must_use]
pub fn newell_normal(points: &[Point3]) -> Vector3 {
    let mut n = Vector3::zeros();
    for (i, a) in points.iter().enumerate() {
        let b = &points[(i + 1) % points.len()];
        n.x += (a.y - b.y) * (a.z + b.z);
        n.y += (a.z - b.z) * (a.x + b.x);
        n.z += (a.x - b.x) * (a.y + b.y);
    }
    n
}

/// Projects a 3D polygon onto the plane with normal `normal`, preserving
/// winding (counter-clockwise when viewed against the normal).
#[must_use]
pub fn project_to_plane(points: &[Point3], normal: &Vector3) -> Vec<Point2> {
    let n = normal.normalize();
    let u = frame::any_perpendicular(&n);
    let v = n.cross(&u);
    points
        .iter()
        .map(|p| Point2::new(p.coords.dot(&u), p.coords.dot(&v)))
        .collect()
}

/// Convex hull of a point set (Andrew's monotone chain), counter-clockwise,
/// without collinear points.
#[must_use]
pub fn convex_hull(points: &[Point2]) -> Vec<Point2> {
    let mut pts = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup_by(|a, b| (*a - *b).norm() < TOLERANCE);
    if pts.len() < 3 {
        return pts;
    }
    let cross = |o: &Point2, a: &Point2, b: &Point2| (a - o).perp(&(b - o));
    let mut hull: Vec<Point2> = Vec::with_capacity(pts.len() * 2);
    for p in &pts {
        while hull.len() >= 2 && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(*p);
    }
    let lower_len = hull.len() + 1;
    for p in pts.iter().rev().skip(1) {
        while hull.len() >= lower_len
            && cross(&hull[hull.len() - 2], &hull[hull.len() - 1], p) <= 0.0
        {
            hull.pop();
        }
        hull.push(*p);
    }
    hull.pop();
    hull
}

/// Offsets a simple closed polygon by `distance` along its outward normals
/// (negative shrinks). Mitre length is capped at four times the distance.
///
/// # Errors
///
/// Returns `GeometryError::Degenerate` for fewer than three points or a
/// zero-area polygon.
pub fn offset_polygon(points: &[Point2], distance: f64) -> Result<Vec<Point2>> {
    let n = points.len();
    let area = signed_area(points);
    if n < 3 || area.abs() < TOLERANCE {
        return Err(GeometryError::Degenerate("cannot offset a degenerate polygon".into()).into());
    }
    // Outward normal of a CCW edge is its right-hand perpendicular.
    let orientation = area.signum();
    let edge_normal = |a: &Point2, b: &Point2| -> Vector2 {
        let d = b - a;
        let len = d.norm();
        if len < TOLERANCE {
            return Vector2::zeros();
        }
        Vector2::new(d.y, -d.x) * (orientation / len)
    };

    let mut out = Vec::with_capacity(n);
    for i in 0..n {
        let prev = &points[(i + n - 1) % n];
        let cur = &points[i];
        let next = &points[(i + 1) % n];
        let n0 = edge_normal(prev, cur);
        let n1 = edge_normal(cur, next);
        let sum = n0 + n1;
        let len = sum.norm();
        if len < TOLERANCE {
            out.push(cur + n1 * distance);
            continue;
        }
        let bisector = sum / len;
        let cos_half = bisector.dot(&n1).max(0.25);
        out.push(cur + bisector * (distance / cos_half));
    }
    Ok(out)
}

/// Triangulates a simple polygon by ear clipping.
///
/// Works for either winding; returned triangles follow the input winding.
/// Collinear vertices are tolerated. Returns an empty list for fewer than
/// three points.
#[must_use]
pub fn triangulate(points: &[Point2]) -> Vec<[usize; 3]> {
    let n = points.len();
    if n < 3 {
        return Vec::new();
    }
    if n == 3 {
        return vec![[0, 1, 2]];
    }
    let orientation = if signed_area(points) < 0.0 { -1.0 } else { 1.0 };
    let mut remaining: Vec<usize> = (0..n).collect();
    let mut triangles = Vec::with_capacity(n - 2);

    let cross = |a: usize, b: usize, c: usize| {
        (points[b] - points[a]).perp(&(points[c] - points[a])) * orientation
    };

    let mut guard = 0;
    while remaining.len() > 3 && guard < n * n {
        guard += 1;
        let m = remaining.len();
        let mut clipped = false;
        for i in 0..m {
            let a = remaining[(i + m - 1) % m];
            let b = remaining[i];
            let c = remaining[(i + 1) % m];
            if cross(a, b, c) <= TOLERANCE {
                continue;
            }
            let blocked = remaining.iter().any(|&p| {
                p != a && p != b && p != c && point_in_triangle(&points[p], &points[a], &points[b], &points[c])
            });
            if blocked {
                continue;
            }
            triangles.push([a, b, c]);
            remaining.remove(i);
            clipped = true;
            break;
        }
        if !clipped {
            // Only degenerate ears remain; drop a collinear vertex or fan out.
            if let Some(i) = (0..m).find(|&i| {
                let a = remaining[(i + m - 1) % m];
                let c = remaining[(i + 1) % m];
                cross(a, remaining[i], c).abs() <= TOLERANCE
            }) {
                remaining.remove(i);
            } else {
                break;
            }
        }
    }
    if remaining.len() == 3 {
        triangles.push([remaining[0], remaining[1], remaining[2]]);
    } else if remaining.len() > 3 {
        for i in 1..remaining.len() - 1 {
            triangles.push([remaining[0], remaining[i], remaining[i + 1]]);
        }
    }
    triangles
}

/// Returns `true` if `p` lies inside or on the triangle `abc`.
#[must_use]
pub fn point_in_triangle(p: &Point2, a: &Point2, b: &Point2, c: &Point2) -> bool {
    let d1 = (b - a).perp(&(p - a));
    let d2 = (c - b).perp(&(p - b));
    let d3 = (a - c).perp(&(p - c));
    let has_neg = d1 < -TOLERANCE || d2 < -TOLERANCE || d3 < -TOLERANCE;
    let has_pos = d1 > TOLERANCE || d2 > TOLERANCE || d3 > TOLERANCE;
    !(has_neg && has_pos)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn p(x: f64, y: f64) -> Point2 {
        Point2::new(x, y)
    }

    #[test]
    fn signed_area_ccw_square() {
        let sq = [p(0.0, 0.0), p(2.0, 0.0), p(2.0, 2.0), p(0.0, 2.0)];
        assert_relative_eq!(signed_area(&sq), 4.0);
        let rev: Vec<_> = sq.iter().rev().copied().collect();
        assert_relative_eq!(signed_area(&rev), -4.0);
    }

    #[test]
    fn newell_normal_of_unit_square_is_z() {
        let sq = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        assert_relative_eq!(newell_normal(&sq), Vector3::new(0.0, 0.0, 2.0));
    }

    #[test]
    fn hull_drops_interior_points() {
        let pts = [p(0.0, 0.0), p(1.0, 0.0), p(1.0, 1.0), p(0.0, 1.0), p(0.5, 0.5), p(0.5, 0.0)];
        let hull = convex_hull(&pts);
        assert_eq!(hull.len(), 4);
        assert!(signed_area(&hull) > 0.0);
    }

    #[test]
    fn offset_square_inward() {
        let sq = [p(0.0, 0.0), p(4.0, 0.0), p(4.0, 4.0), p(0.0, 4.0)];
        let inner = offset_polygon(&sq, -1.0).unwrap();
        assert_relative_eq!(inner[0], p(1.0, 1.0), epsilon = 1e-12);
        assert_relative_eq!(inner[2], p(3.0, 3.0), epsilon = 1e-12);
        assert_relative_eq!(signed_area(&inner), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn offset_clockwise_square_outward() {
        let sq = [p(0.0, 0.0), p(0.0, 4.0), p(4.0, 4.0), p(4.0, 0.0)];
        let outer = offset_polygon(&sq, 1.0).unwrap();
        assert_relative_eq!(signed_area(&outer).abs(), 36.0, epsilon = 1e-9);
    }

    #[test]
    fn triangulate_concave_l_shape() {
        let l = [
            p(0.0, 0.0),
            p(2.0, 0.0),
            p(2.0, 1.0),
            p(1.0, 1.0),
            p(1.0, 2.0),
            p(0.0, 2.0),
        ];
        let tris = triangulate(&l);
        assert_eq!(tris.len(), 4);
        let area: f64 = tris
            .iter()
            .map(|t| signed_area(&[l[t[0]], l[t[1]], l[t[2]]]))
            .sum();
        assert_relative_eq!(area, 3.0, epsilon = 1e-12);
    }

    #[test]
    fn triangulate_keeps_clockwise_winding() {
        let sq = [p(0.0, 0.0), p(0.0, 1.0), p(1.0, 1.0), p(1.0, 0.0)];
        for t in triangulate(&sq) {
            assert!(signed_area(&[sq[t[0]], sq[t[1]], sq[t[2]]]) < 0.0);
        }
    }

    #[test]
    fn triangulate_with_collinear_vertex() {
        let pts = [p(0.0, 0.0), p(1.0, 0.0), p(2.0, 0.0), p(2.0, 2.0), p(0.0, 2.0)];
        let tris = triangulate(&pts);
        let area: f64 = tris
            .iter()
            .map(|t| signed_area(&[pts[t[0]], pts[t[1]], pts[t[2]]]))
            .sum();
        assert_relative_eq!(area, 4.0, epsilon = 1e-12);
    }
}
