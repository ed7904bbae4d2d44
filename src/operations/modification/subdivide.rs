use std::collections::{BTreeMap, BTreeSet, HashMap};

use tracing::debug;

use crate::error::Result;
use crate::math::{Point3, Vector3};
use crate::mesh::{EdgeKey, EdgeMap, Mesh, VertexId};

/// Result of a subdivision: the refined mesh and, for each of its
/// vertices, the original vertices it was derived from.
#[derive(Debug, Clone)]
pub struct Subdivided {
    pub mesh: Mesh,
    pub provenance: BTreeMap<VertexId, Vec<VertexId>>,
}

/// Catmull–Clark subdivision.
///
/// Boundary and non-manifold edges are treated as creases: their edge
/// points are midpoints and vertices on exactly two such edges follow the
/// cubic B-spline rule along them. Vertices on more than two creases stay
/// put. Every face becomes quads, one per corner.
pub struct CatmullClark {
    levels: usize,
}

impl CatmullClark {
    #[must_use]
    pub fn new(levels: usize) -> Self {
        Self { levels }
    }

    /// Executes the subdivision.
    ///
    /// # Errors
    ///
    /// Returns an error if a face references a missing vertex.
    pub fn execute(&self, mesh: &Mesh) -> Result<Subdivided> {
        let mut current = mesh.clone();
        let mut provenance: BTreeMap<VertexId, Vec<VertexId>> =
            mesh.vertex_ids().into_iter().map(|v| (v, vec![v])).collect();
        for level in 0..self.levels {
            let (next, parents) = subdivide_once(&current)?;
            provenance = parents
                .into_iter()
                .map(|(v, ps)| {
                    let origins: BTreeSet<VertexId> = ps
                        .iter()
                        .filter_map(|p| provenance.get(p))
                        .flatten()
                        .copied()
                        .collect();
                    (v, origins.into_iter().collect())
                })
                .collect();
            current = next;
            debug!(
                level = level + 1,
                faces = current.face_count(),
                "subdivided"
            );
        }
        Ok(Subdivided {
            mesh: current,
            provenance,
        })
    }
}

#[allow(clippy::cast_precision_loss)]
fn subdivide_once(mesh: &Mesh) -> Result<(Mesh, BTreeMap<VertexId, Vec<VertexId>>)> {
    let edges = EdgeMap::build(mesh);
    let mut out = Mesh::new();
    let mut parents: BTreeMap<VertexId, Vec<VertexId>> = BTreeMap::new();

    let mut face_points = BTreeMap::new();
    for (fid, verts) in mesh.faces() {
        let c = mesh.face_centroid(fid)?;
        let id = out.add_vertex(c);
        parents.insert(id, verts.to_vec());
        face_points.insert(fid, (id, c));
    }

    let mut edge_points: HashMap<EdgeKey, VertexId> = HashMap::new();
    let mut crease_neighbors: BTreeMap<VertexId, Vec<VertexId>> = BTreeMap::new();
    let mut mid_sum: HashMap<VertexId, (Vector3, usize)> = HashMap::new();
    for (key, uses) in edges.iter() {
        let a = mesh.point(key.0)?;
        let b = mesh.point(key.1)?;
        let mid = nalgebra::center(&a, &b);
        for v in [key.0, key.1] {
            let e = mid_sum.entry(v).or_insert((Vector3::zeros(), 0));
            e.0 += mid.coords;
            e.1 += 1;
        }
        let p = if uses.len() == 2 {
            let f0 = face_points[&uses[0].face].1;
            let f1 = face_points[&uses[1].face].1;
            Point3::from((a.coords + b.coords + f0.coords + f1.coords) / 4.0)
        } else {
            crease_neighbors.entry(key.0).or_default().push(key.1);
            crease_neighbors.entry(key.1).or_default().push(key.0);
            mid
        };
        let id = out.add_vertex(p);
        parents.insert(id, vec![key.0, key.1]);
        edge_points.insert(*key, id);
    }

    let mut face_sum: HashMap<VertexId, (Vector3, usize)> = HashMap::new();
    for (fid, verts) in mesh.faces() {
        let c = face_points[&fid].1;
        for v in verts {
            let e = face_sum.entry(*v).or_insert((Vector3::zeros(), 0));
            e.0 += c.coords;
            e.1 += 1;
        }
    }

    let mut vertex_points: HashMap<VertexId, VertexId> = HashMap::new();
    for (v, p) in mesh.vertices() {
        let moved = match crease_neighbors.get(&v).map(Vec::as_slice) {
            Some([a, b]) => {
                let pa = mesh.point(*a)?;
                let pb = mesh.point(*b)?;
                Point3::from((pa.coords + p.coords * 6.0 + pb.coords) / 8.0)
            }
            Some(_) => *p,
            None => match (face_sum.get(&v), mid_sum.get(&v)) {
                (Some((fs, nf)), Some((rs, nr))) if *nf >= 3 => {
                    let n = *nf as f64;
                    let f = fs / n;
                    let r = rs / *nr as f64;
                    Point3::from((f + r * 2.0 + p.coords * (n - 3.0)) / n)
                }
                _ => *p,
            },
        };
        let id = out.add_vertex(moved);
        parents.insert(id, vec![v]);
        vertex_points.insert(v, id);
    }

    for (fid, verts) in mesh.faces() {
        let n = verts.len();
        let center = face_points[&fid].0;
        for i in 0..n {
            let prev = verts[(i + n - 1) % n];
            let cur = verts[i];
            let next = verts[(i + 1) % n];
            out.add_face(&[
                vertex_points[&cur],
                edge_points[&EdgeKey::new(cur, next)],
                center,
                edge_points[&EdgeKey::new(prev, cur)],
            ])?;
        }
    }
    out.remove_unused_vertices();
    parents.retain(|v, _| out.contains_vertex(*v));
    Ok((out, parents))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mesh::loops::boundary_loops;
    use crate::operations::creation::{MakeBox, MakeGrid};
    use approx::assert_relative_eq;

    #[test]
    fn cube_subdivides_to_closed_quads() {
        let cube = MakeBox::new(Point3::origin(), Point3::new(2.0, 2.0, 2.0))
            .execute()
            .unwrap();
        let sub = CatmullClark::new(2).execute(&cube).unwrap();
        assert_eq!(sub.mesh.face_count(), 6 * 16);
        assert!(EdgeMap::build(&sub.mesh).is_closed_manifold());
        // Smoothing shrinks the cube but keeps it centred.
        let bb = sub.mesh.bounding_box().unwrap();
        assert_relative_eq!(bb.center(), Point3::new(1.0, 1.0, 1.0), epsilon = 1e-9);
        assert!(bb.size().x < 2.0);
    }

    #[test]
    fn flat_boundary_stays_in_plane() {
        let grid = MakeGrid::new(3, 3, 1.0, 1.0).execute().unwrap().mesh;
        let sub = CatmullClark::new(1).execute(&grid).unwrap();
        assert_eq!(sub.mesh.face_count(), 36);
        assert_eq!(boundary_loops(&sub.mesh).len(), 1);
        assert!(sub.mesh.vertices().all(|(_, p)| p.z.abs() < 1e-12));
        // Grid corners follow the boundary spline and move inward.
        let corner_moved = sub
            .mesh
            .vertices()
            .all(|(_, p)| p.x.abs() > 1e-12 || p.y.abs() > 1e-12);
        assert!(corner_moved);
    }

    #[test]
    fn provenance_points_at_original_vertices() {
        let grid = MakeGrid::new(1, 1, 1.0, 1.0).execute().unwrap().mesh;
        let sub = CatmullClark::new(2).execute(&grid).unwrap();
        for parents in sub.provenance.values() {
            assert!(parents.iter().all(|p| grid.contains_vertex(*p)));
            assert!(!parents.is_empty());
        }
        assert_eq!(sub.provenance.len(), sub.mesh.vertex_count());
    }
}
