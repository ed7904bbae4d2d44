//! Triangle soup with a bounding-volume hierarchy, shared by the ray and
//! closest-point queries and by shrink-wrap projection.

use crate::error::Result;
use crate::math::polygon_2d::{newell_normal, project_to_plane, triangulate};
use crate::math::{Aabb, Point3, Vector3, TOLERANCE};
use crate::mesh::{FaceId, Mesh};

const LEAF_SIZE: usize = 4;

#[derive(Debug, Clone, Copy)]
struct Triangle {
    a: Point3,
    b: Point3,
    c: Point3,
    face: FaceId,
    normal: Vector3,
}

#[derive(Debug, Clone)]
struct Node {
    bounds: Aabb,
    /// Children for inner nodes; triangle range for leaves.
    kind: NodeKind,
}

#[derive(Debug, Clone, Copy)]
enum NodeKind {
    Inner(usize, usize),
    Leaf(usize, usize),
}

/// A point on a surface with the face it lies on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    pub point: Point3,
    pub normal: Vector3,
    pub face: FaceId,
    pub distance: f64,
}

/// Triangulated copy of a mesh, indexed for nearest-point and ray queries.
#[derive(Debug, Clone)]
pub struct SurfaceIndex {
    triangles: Vec<Triangle>,
    nodes: Vec<Node>,
}

impl SurfaceIndex {
    /// Triangulates every face of `mesh` and builds the hierarchy.
    ///
    /// # Errors
    ///
    /// Returns an error if a face references a missing vertex.
    pub fn build(mesh: &Mesh) -> Result<Self> {
        let mut triangles = Vec::with_capacity(mesh.triangle_count());
        for (fid, _) in mesh.faces() {
            let pts = mesh.face_points(fid)?;
            let n = newell_normal(&pts);
            let len = n.norm();
            if len < TOLERANCE {
                continue;
            }
            let normal = n / len;
            let tris: Vec<[usize; 3]> = if pts.len() == 3 {
                vec![[0, 1, 2]]
            } else {
                triangulate(&project_to_plane(&pts, &normal))
            };
            for [i, j, k] in tris {
                triangles.push(Triangle {
                    a: pts[i],
                    b: pts[j],
                    c: pts[k],
                    face: fid,
                    normal,
                });
            }
        }
        let mut index = Self {
            triangles,
            nodes: Vec::new(),
        };
        if !index.triangles.is_empty() {
            index.split(0, index.triangles.len());
        }
        Ok(index)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    fn split(&mut self, start: usize, end: usize) -> usize {
        let bounds = self.range_bounds(start, end);
        let id = self.nodes.len();
        self.nodes.push(Node {
            bounds,
            kind: NodeKind::Leaf(start, end),
        });
        if end - start <= LEAF_SIZE {
            return id;
        }
        let size = bounds.size();
        let axis = if size.x >= size.y && size.x >= size.z {
            0
        } else if size.y >= size.z {
            1
        } else {
            2
        };
        self.triangles[start..end].sort_by(|p, q| {
            let cp = (p.a.coords + p.b.coords + p.c.coords)[axis];
            let cq = (q.a.coords + q.b.coords + q.c.coords)[axis];
            cp.total_cmp(&cq)
        });
        let mid = start + (end - start) / 2;
        let left = self.split(start, mid);
        let right = self.split(mid, end);
        self.nodes[id].kind = NodeKind::Inner(left, right);
        id
    }

    fn range_bounds(&self, start: usize, end: usize) -> Aabb {
        let t = &self.triangles[start];
        let mut bb = Aabb::new(t.a, t.a);
        for t in &self.triangles[start..end] {
            bb.include(&t.a);
            bb.include(&t.b);
            bb.include(&t.c);
        }
        bb
    }

    /// Closest point on the surface to `p`.
    #[must_use]
    pub fn closest(&self, p: &Point3) -> Option<SurfacePoint> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best: Option<SurfacePoint> = None;
        let mut stack = vec![0usize];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            let limit = best.map_or(f64::INFINITY, |b| b.distance);
            if box_distance(&node.bounds, p) > limit {
                continue;
            }
            match node.kind {
                NodeKind::Leaf(s, e) => {
                    for t in &self.triangles[s..e] {
                        let q = closest_on_triangle(p, &t.a, &t.b, &t.c);
                        let d = (q - p).norm();
                        if best.is_none_or(|b| d < b.distance) {
                            best = Some(SurfacePoint {
                                point: q,
                                normal: t.normal,
                                face: t.face,
                                distance: d,
                            });
                        }
                    }
                }
                NodeKind::Inner(l, r) => {
                    let dl = box_distance(&self.nodes[l].bounds, p);
                    let dr = box_distance(&self.nodes[r].bounds, p);
                    if dl <= dr {
                        stack.push(r);
                        stack.push(l);
                    } else {
                        stack.push(l);
                        stack.push(r);
                    }
                }
            }
        }
        best
    }

    /// First hit of the ray `origin + t·direction` with `t > 0`.
    #[must_use]
    pub fn ray(&self, origin: &Point3, direction: &Vector3) -> Option<SurfacePoint> {
        if self.nodes.is_empty() {
            return None;
        }
        let mut best: Option<SurfacePoint> = None;
        let mut stack = vec![0usize];
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            let limit = best.map_or(f64::INFINITY, |b| b.distance);
            if !ray_hits_box(&node.bounds, origin, direction, limit) {
                continue;
            }
            match node.kind {
                NodeKind::Leaf(s, e) => {
                    for t in &self.triangles[s..e] {
                        if let Some(d) = ray_triangle(origin, direction, &t.a, &t.b, &t.c) {
                            if best.is_none_or(|b| d < b.distance) {
                                best = Some(SurfacePoint {
                                    point: origin + direction * d,
                                    normal: t.normal,
                                    face: t.face,
                                    distance: d,
                                });
                            }
                        }
                    }
                }
                NodeKind::Inner(l, r) => {
                    stack.push(l);
                    stack.push(r);
                }
            }
        }
        best
    }
}

fn box_distance(bb: &Aabb, p: &Point3) -> f64 {
    let dx = (bb.min.x - p.x).max(0.0).max(p.x - bb.max.x);
    let dy = (bb.min.y - p.y).max(0.0).max(p.y - bb.max.y);
    let dz = (bb.min.z - p.z).max(0.0).max(p.z - bb.max.z);
    (dx * dx + dy * dy + dz * dz).sqrt()
}

fn ray_hits_box(bb: &Aabb, origin: &Point3, dir: &Vector3, limit: f64) -> bool {
    let mut t_min: f64 = 0.0;
    let mut t_max = limit;
    for axis in 0..3 {
        let o = origin[axis];
        let d = dir[axis];
        let (lo, hi) = (bb.min[axis], bb.max[axis]);
        if d.abs() < TOLERANCE {
            if o < lo || o > hi {
                return false;
            }
            continue;
        }
        let mut t0 = (lo - o) / d;
        let mut t1 = (hi - o) / d;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        t_min = t_min.max(t0);
        t_max = t_max.min(t1);
        if t_min > t_max + 1e-9 {
            return false;
        }
    }
    true
}

/// Möller–Trumbore intersection; returns the ray parameter of the hit.
fn ray_triangle(origin: &Point3, dir: &Vector3, a: &Point3, b: &Point3, c: &Point3) -> Option<f64> {
    let e1 = b - a;
    let e2 = c - a;
    let h = dir.cross(&e2);
    let det = e1.dot(&h);
    if det.abs() < 1e-14 {
        return None;
    }
    let inv = 1.0 / det;
    let s = origin - a;
    let u = inv * s.dot(&h);
    if !(-1e-12..=1.0 + 1e-12).contains(&u) {
        return None;
    }
    let q = s.cross(&e1);
    let v = inv * dir.dot(&q);
    if v < -1e-12 || u + v > 1.0 + 1e-12 {
        return None;
    }
    let t = inv * e2.dot(&q);
    (t > 1e-9).then_some(t)
}

/// Closest point on triangle `abc` to `p` (Voronoi-region walk).
pub(crate) fn closest_on_triangle(p: &Point3, a: &Point3, b: &Point3, c: &Point3) -> Point3 {
    let ab = b - a;
    let ac = c - a;
    let ap = p - a;
    let d1 = ab.dot(&ap);
    let d2 = ac.dot(&ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return *a;
    }
    let bp = p - b;
    let d3 = ab.dot(&bp);
    let d4 = ac.dot(&bp);
    if d3 >= 0.0 && d4 <= d3 {
        return *b;
    }
    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return a + ab * (d1 / (d1 - d3));
    }
    let cp = p - c;
    let d5 = ab.dot(&cp);
    let d6 = ac.dot(&cp);
    if d6 >= 0.0 && d5 <= d6 {
        return *c;
    }
    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return a + ac * (d2 / (d2 - d6));
    }
    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        return b + (c - b) * ((d4 - d3) / ((d4 - d3) + (d5 - d6)));
    }
    let denom = 1.0 / (va + vb + vc);
    a + ab * (vb * denom) + ac * (vc * denom)
}
