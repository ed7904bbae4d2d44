use tracing::debug;

use crate::error::Result;
use crate::math::{Point3, TOLERANCE};
use crate::mesh::loops::boundary_vertices;
use crate::mesh::{EdgeKey, EdgeMap, Mesh, Selection, VertexId};

use super::orient::OrientFaces;
use super::weld::Weld;

const MAX_PASSES: usize = 8;

/// Closes cracks where a vertex of one face lies on an edge of another.
///
/// Every boundary vertex within `tolerance` of the interior of a boundary
/// edge is spliced into the face owning that edge. Passes repeat until no
/// splice happens.
pub struct RepairTJunctions {
    tolerance: f64,
}

impl RepairTJunctions {
    #[must_use]
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Executes the repair, returning the number of splices made.
    ///
    /// # Errors
    ///
    /// Returns an error if a face cannot be rewritten.
    pub fn execute(&self, mesh: &mut Mesh) -> Result<usize> {
        let mut total = 0;
        for _ in 0..MAX_PASSES {
            let spliced = self.pass(mesh)?;
            total += spliced;
            if spliced == 0 {
                break;
            }
        }
        if total > 0 {
            debug!(spliced = total, "repaired t-junctions");
        }
        Ok(total)
    }

    fn pass(&self, mesh: &mut Mesh) -> Result<usize> {
        let edges = EdgeMap::build(mesh);
        let boundary = edges.boundary_edges();
        if boundary.is_empty() {
            return Ok(0);
        }
        let candidates: Vec<(VertexId, Point3)> = boundary_vertices(mesh)
            .into_iter()
            .filter_map(|v| mesh.point(v).ok().map(|p| (v, p)))
            .collect();

        let mut spliced = 0;
        for (a, b) in boundary {
            let pa = mesh.point(a)?;
            let pb = mesh.point(b)?;
            let ab = pb - pa;
            let len2 = ab.norm_squared();
            if len2 < TOLERANCE {
                continue;
            }
            let mut on_edge: Vec<(f64, VertexId)> = candidates
                .iter()
                .filter(|(v, _)| *v != a && *v != b)
                .filter_map(|(v, p)| {
                    let t = (p - pa).dot(&ab) / len2;
                    if t <= 0.0 || t >= 1.0 {
                        return None;
                    }
                    let foot = pa + ab * t;
                    ((p - foot).norm() <= self.tolerance).then_some((t, *v))
                })
                .collect();
            if on_edge.is_empty() {
                continue;
            }
            on_edge.sort_by(|x, y| x.0.total_cmp(&y.0));

            let face = edges.uses(&EdgeKey::new(a, b))[0].face;
            let mut verts = mesh.face_vertices(face)?.to_vec();
            let n = verts.len();
            let Some(i) = (0..n).find(|&i| verts[i] == a && verts[(i + 1) % n] == b) else {
                continue;
            };
            let insert: Vec<VertexId> = on_edge
                .into_iter()
                .map(|(_, v)| v)
                .filter(|v| !verts.contains(v))
                .collect();
            if insert.is_empty() {
                continue;
            }
            spliced += insert.len();
            verts.splice(i + 1..i + 1, insert);
            mesh.replace_face(face, verts)?;
        }
        Ok(spliced)
    }
}

/// Removes sliver faces whose vertices all lie within `tolerance` of a
/// line, and faces that repeat a vertex.
///
/// Removing a sliver opens a crack along its long edge; follow up with
/// [`RepairTJunctions`] to close it.
pub struct RemoveDegenerate {
    tolerance: f64,
}

impl RemoveDegenerate {
    #[must_use]
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Executes the cleanup, returning the number of faces removed.
    ///
    /// # Errors
    ///
    /// Returns an error if a face references a missing vertex.
    pub fn execute(&self, mesh: &mut Mesh) -> Result<usize> {
        let mut doomed = Vec::new();
        for (fid, verts) in mesh.faces() {
            let repeats = (0..verts.len()).any(|i| verts[i + 1..].contains(&verts[i]));
            if repeats {
                doomed.push(fid);
                continue;
            }
            let pts: Vec<Point3> = verts.iter().map(|v| mesh.point(*v)).collect::<Result<_>>()?;
            let longest = (0..pts.len())
                .map(|i| (pts[(i + 1) % pts.len()] - pts[i]).norm())
                .fold(0.0_f64, f64::max);
            if longest < self.tolerance {
                doomed.push(fid);
                continue;
            }
            let height = 2.0 * mesh.face_area(fid)? / longest;
            if height < self.tolerance {
                doomed.push(fid);
            }
        }
        for f in &doomed {
            mesh.remove_face(*f);
        }
        mesh.remove_unused_vertices();
        if !doomed.is_empty() {
            debug!(removed = doomed.len(), "removed degenerate faces");
        }
        Ok(doomed.len())
    }
}

/// Best-effort cleanup of a mesh that should be closed.
///
/// Drops slivers, splices T-junctions, welds the two sides of cracks
/// narrower than `tolerance` and makes the winding consistent. Returns the
/// number of edits; what it cannot fix is left for the caller to report.
pub struct HealMesh {
    tolerance: f64,
}

impl HealMesh {
    #[must_use]
    pub fn new(tolerance: f64) -> Self {
        Self { tolerance }
    }

    /// Executes the repair.
    ///
    /// # Errors
    ///
    /// Returns an error if a face cannot be rewritten.
    pub fn execute(&self, mesh: &mut Mesh) -> Result<usize> {
        let mut edits = RemoveDegenerate::new(self.tolerance).execute(mesh)?;
        edits += RepairTJunctions::new(self.tolerance).execute(mesh)?;
        let open: Selection = boundary_vertices(mesh).into_iter().collect();
        if !open.is_empty() {
            edits += Weld::new(self.tolerance).restricted_to(open).execute(mesh)?.len();
            edits += RepairTJunctions::new(self.tolerance).execute(mesh)?;
        }
        edits += OrientFaces::new().execute(mesh)?;
        if edits > 0 {
            debug!(edits, tolerance = self.tolerance, "healed mesh");
        }
        Ok(edits)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operations::creation::MakeBox;

    #[test]
    fn splices_vertex_into_neighbouring_face() {
        // Two unit squares on the left share an edge with one tall square
        // on the right; the shared middle vertex is a t-junction.
        let mut mesh = Mesh::new();
        let p = |x: f64, y: f64| Point3::new(x, y, 0.0);
        let a = mesh.add_vertex(p(0.0, 0.0));
        let b = mesh.add_vertex(p(1.0, 0.0));
        let c = mesh.add_vertex(p(1.0, 1.0));
        let d = mesh.add_vertex(p(0.0, 1.0));
        let e = mesh.add_vertex(p(1.0, 2.0));
        let f = mesh.add_vertex(p(0.0, 2.0));
        let g = mesh.add_vertex(p(2.0, 0.0));
        let h = mesh.add_vertex(p(2.0, 2.0));
        mesh.add_face(&[a, b, c, d]).unwrap();
        mesh.add_face(&[d, c, e, f]).unwrap();
        let right = mesh.add_face(&[b, g, h, e]).unwrap();

        let spliced = RepairTJunctions::new(1e-6).execute(&mut mesh).unwrap();
        assert_eq!(spliced, 1);
        assert_eq!(mesh.face_vertices(right).unwrap(), &[b, g, h, e, c]);
        let edges = EdgeMap::build(&mesh);
        assert_eq!(edges.uses(&EdgeKey::new(b, c)).len(), 2);
    }

    #[test]
    fn closed_box_needs_no_repair() {
        let mut mesh = MakeBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
            .execute()
            .unwrap();
        assert_eq!(RepairTJunctions::new(1e-6).execute(&mut mesh).unwrap(), 0);
    }

    #[test]
    fn removes_sliver_triangle() {
        let mut mesh = Mesh::new();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(Point3::new(10.0, 0.0, 0.0));
        let c = mesh.add_vertex(Point3::new(5.0, 1e-9, 0.0));
        let d = mesh.add_vertex(Point3::new(5.0, 4.0, 0.0));
        mesh.add_face(&[a, c, b]).unwrap();
        mesh.add_face(&[a, b, d]).unwrap();
        let removed = RemoveDegenerate::new(1e-6).execute(&mut mesh).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(mesh.face_count(), 1);
        assert!(!mesh.contains_vertex(c));
    }

    #[test]
    fn heal_closes_a_hairline_crack() {
        // One face of the box is rebuilt over copies of its corners moved
        // by less than the tolerance.
        let mut mesh = MakeBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
            .execute()
            .unwrap();
        let top = mesh
            .face_ids()
            .into_iter()
            .find(|f| mesh.face_normal(*f).unwrap().z > 0.5)
            .unwrap();
        let corners = mesh.face_vertices(top).unwrap().to_vec();
        let copies: Vec<VertexId> = corners
            .iter()
            .map(|v| {
                let p = mesh.point(*v).unwrap();
                mesh.add_vertex(p + crate::math::Vector3::new(2e-4, 0.0, 0.0))
            })
            .collect();
        mesh.replace_face(top, copies).unwrap();
        mesh.flip_face(top).unwrap();
        assert!(!EdgeMap::build(&mesh).is_closed_manifold());

        let edits = HealMesh::new(1e-3).execute(&mut mesh).unwrap();
        assert!(edits > 0);
        assert!(EdgeMap::build(&mesh).is_closed_manifold());
        assert_eq!(mesh.vertex_count(), 8);
        assert!(mesh.signed_volume() > 0.99);
    }
}
