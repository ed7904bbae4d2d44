use std::collections::BTreeSet;

use crate::error::Result;
use crate::math::polygon_2d::{newell_normal, project_to_plane, triangulate};
use crate::math::Point3;
use crate::mesh::{EdgeKey, EdgeMap, FaceId, Mesh, VertexId};

/// Splits faces with more than three vertices into triangles.
///
/// Quads are cut along their shorter diagonal; larger faces are ear-clipped
/// in their best-fit plane.
#[derive(Debug, Default)]
pub struct Triangulate {
    faces: Option<BTreeSet<FaceId>>,
}

impl Triangulate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Only touches `faces`.
    #[must_use]
    pub fn only(mut self, faces: BTreeSet<FaceId>) -> Self {
        self.faces = Some(faces);
        self
    }

    /// Executes the operation, returning the number of faces split.
    ///
    /// # Errors
    ///
    /// Returns an error if a face cannot be rebuilt.
    pub fn execute(&self, mesh: &mut Mesh) -> Result<usize> {
        let targets: Vec<FaceId> = match &self.faces {
            Some(set) => set.iter().copied().filter(|f| mesh.contains_face(*f)).collect(),
            None => mesh.face_ids(),
        };
        let mut split = 0;
        for fid in targets {
            let verts = mesh.face_vertices(fid)?.to_vec();
            if verts.len() <= 3 {
                continue;
            }
            let pts = mesh.face_points(fid)?;
            let tris: Vec<[usize; 3]> = if verts.len() == 4 {
                if (pts[2] - pts[0]).norm() <= (pts[3] - pts[1]).norm() {
                    vec![[0, 1, 2], [0, 2, 3]]
                } else {
                    vec![[1, 2, 3], [1, 3, 0]]
                }
            } else {
                triangulate(&project_to_plane(&pts, &newell_normal(&pts)))
            };
            if tris.is_empty() {
                continue;
            }
            mesh.remove_face(fid);
            for [i, j, k] in tris {
                mesh.add_face(&[verts[i], verts[j], verts[k]])?;
            }
            split += 1;
        }
        Ok(split)
    }
}

/// Joins pairs of adjacent triangles into quads.
///
/// A pair qualifies when the angle between the triangle normals and the
/// deviation of every quad corner from a right angle both stay within
/// `max_angle` (radians), the quad is convex, and the shared edge is not
/// locked. Best-scoring pairs are joined first.
pub struct TrisToQuads {
    max_angle: f64,
    locked: BTreeSet<EdgeKey>,
}

impl TrisToQuads {
    #[must_use]
    pub fn new(max_angle: f64) -> Self {
        Self {
            max_angle,
            locked: BTreeSet::new(),
        }
    }

    /// Never dissolves any of `edges`.
    #[must_use]
    pub fn locked(mut self, edges: BTreeSet<EdgeKey>) -> Self {
        self.locked = edges;
        self
    }

    /// Executes the operation, returning the number of quads formed.
    ///
    /// # Errors
    ///
    /// Returns an error if a face cannot be rebuilt.
    pub fn execute(&self, mesh: &mut Mesh) -> Result<usize> {
        let edges = EdgeMap::build(mesh);
        let mut candidates: Vec<(f64, FaceId, FaceId, [VertexId; 4])> = Vec::new();
        for (key, uses) in edges.iter() {
            if self.locked.contains(key) {
                continue;
            }
            let [u0, u1] = uses else {
                continue;
            };
            if u0.from == u1.from {
                continue;
            }
            let t0 = mesh.face_vertices(u0.face)?;
            let t1 = mesh.face_vertices(u1.face)?;
            if t0.len() != 3 || t1.len() != 3 {
                continue;
            }
            // t0 runs a -> b; t1 runs b -> a.
            let (a, b) = (u0.from, u0.to);
            let c = opposite(t0, a, b);
            let d = opposite(t1, a, b);
            let (Some(c), Some(d)) = (c, d) else {
                continue;
            };
            if c == d {
                continue;
            }
            let quad = [a, d, b, c];
            let normal_angle = mesh.face_normal(u0.face)?.angle(&mesh.face_normal(u1.face)?);
            if normal_angle > self.max_angle {
                continue;
            }
            let pts: Vec<Point3> = quad.iter().map(|v| mesh.point(*v)).collect::<Result<_>>()?;
            let Some(shape) = corner_deviation(&pts) else {
                continue;
            };
            if shape > self.max_angle {
                continue;
            }
            candidates.push((normal_angle + shape, u0.face, u1.face, quad));
        }
        candidates.sort_by(|x, y| x.0.total_cmp(&y.0));

        let mut used: BTreeSet<FaceId> = BTreeSet::new();
        let mut joined = 0;
        for (_, f0, f1, quad) in candidates {
            if used.contains(&f0) || used.contains(&f1) {
                continue;
            }
            used.insert(f0);
            used.insert(f1);
            mesh.remove_face(f1);
            mesh.replace_face(f0, quad.to_vec())?;
            joined += 1;
        }
        Ok(joined)
    }
}

fn opposite(tri: &[VertexId], a: VertexId, b: VertexId) -> Option<VertexId> {
    tri.iter().copied().find(|v| *v != a && *v != b)
}

/// Largest deviation of a quad's corner angles from 90°, or `None` if the
/// quad is not convex.
fn corner_deviation(pts: &[Point3]) -> Option<f64> {
    let normal = newell_normal(pts);
    let mut worst: f64 = 0.0;
    for i in 0..4 {
        let prev = pts[(i + 3) % 4];
        let cur = pts[i];
        let next = pts[(i + 1) % 4];
        let into = cur - prev;
        let out = next - cur;
        if into.cross(&out).dot(&normal) <= 0.0 {
            return None;
        }
        let angle = (prev - cur).angle(&out);
        worst = worst.max((angle - std::f64::consts::FRAC_PI_2).abs());
    }
    Some(worst)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operations::creation::MakeGrid;

    #[test]
    fn triangulate_then_rejoin_grid() {
        let mut mesh = MakeGrid::new(3, 3, 1.0, 1.0).execute().unwrap().mesh;
        assert_eq!(Triangulate::new().execute(&mut mesh).unwrap(), 9);
        assert_eq!(mesh.face_count(), 18);
        let joined = TrisToQuads::new(40_f64.to_radians()).execute(&mut mesh).unwrap();
        assert_eq!(joined, 9);
        assert!(mesh.faces().all(|(_, v)| v.len() == 4));
        assert!(EdgeMap::build(&mesh).inconsistent_edges().is_empty());
    }

    #[test]
    fn locked_edges_survive() {
        let mut mesh = MakeGrid::new(1, 1, 1.0, 1.0).execute().unwrap().mesh;
        Triangulate::new().execute(&mut mesh).unwrap();
        let edges = EdgeMap::build(&mesh);
        let diagonal: BTreeSet<EdgeKey> = edges
            .iter()
            .filter(|(_, u)| u.len() == 2)
            .map(|(k, _)| *k)
            .collect();
        let joined = TrisToQuads::new(1.0).locked(diagonal).execute(&mut mesh).unwrap();
        assert_eq!(joined, 0);
        assert_eq!(mesh.face_count(), 2);
    }

    #[test]
    fn pentagon_is_ear_clipped() {
        let mut mesh = Mesh::new();
        let v: Vec<_> = (0..5)
            .map(|i| {
                let t = std::f64::consts::TAU * f64::from(i) / 5.0;
                mesh.add_vertex(Point3::new(t.cos(), t.sin(), 0.0))
            })
            .collect();
        mesh.add_face(&v).unwrap();
        Triangulate::new().execute(&mut mesh).unwrap();
        assert_eq!(mesh.face_count(), 3);
        assert!(mesh.face_ids().iter().all(|f| mesh.face_normal(*f).unwrap().z > 0.99));
    }
}
