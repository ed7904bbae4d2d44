use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use spade::handles::FixedFaceHandle;
use spade::{
    ConstrainedDelaunayTriangulation, InsertionError, Point2 as SpadePoint2, Triangulation,
};
use tracing::debug;

use crate::error::{Result, TessellationError};
use crate::math::frame::any_perpendicular;
use crate::math::polygon_2d::newell_normal;
use crate::math::{Point3, TOLERANCE};
use crate::mesh::{FaceId, Mesh, VertexId};

type Cdt = ConstrainedDelaunayTriangulation<SpadePoint2<f64>>;

/// Closes a boundary loop with a constrained Delaunay triangulation.
///
/// The loop must run in the direction its existing faces traverse it; the
/// cap traverses it the other way, so the result stays consistently wound.
/// Only loop vertices are used, no points are added.
pub struct CapLoop {
    vertices: Vec<VertexId>,
}

impl CapLoop {
    /// Creates a new `CapLoop` operation.
    #[must_use]
    pub fn new(vertices: Vec<VertexId>) -> Self {
        Self { vertices }
    }

    /// Executes the cap, returning the new triangles.
    ///
    /// # Errors
    ///
    /// Returns `TessellationError::Failed` if the loop has fewer than three
    /// vertices, is degenerate, or crosses itself.
    pub fn execute(&self, mesh: &mut Mesh) -> Result<Vec<FaceId>> {
        let points: Vec<Point3> = self
            .vertices
            .iter()
            .rev()
            .map(|v| mesh.point(*v))
            .collect::<Result<_>>()?;
        let normal = newell_normal(&points);
        if normal.norm() < TOLERANCE {
            return Err(TessellationError::Failed("cap loop is degenerate".into()).into());
        }
        let n = normal.normalize();
        let u_dir = any_perpendicular(&n);
        let v_dir = n.cross(&u_dir);
        let origin = points[0];
        let planar: Vec<SpadePoint2<f64>> = points
            .iter()
            .map(|p| {
                let d = p - origin;
                SpadePoint2::new(d.dot(&u_dir), d.dot(&v_dir))
            })
            .collect();

        let mut cdt = Cdt::new();
        let handles = insert_constraint_loop(&mut cdt, &planar)?;
        let mut owner: HashMap<usize, VertexId> = HashMap::new();
        for (h, v) in handles.iter().zip(self.vertices.iter().rev()) {
            owner.entry(*h).or_insert(*v);
        }

        let interior = classify_interior_faces(&cdt);
        // Sorted by vertex ids so the cap is identical run to run.
        let mut triangles: BTreeSet<[VertexId; 3]> = BTreeSet::new();
        for face in cdt.inner_faces() {
            if !interior.contains(&face.fix().index()) {
                continue;
            }
            let [a, b, c] = face.vertices().map(|vh| vh.fix().index());
            let (Some(a), Some(b), Some(c)) = (owner.get(&a), owner.get(&b), owner.get(&c)) else {
                return Err(TessellationError::Failed("cap introduced a vertex".into()).into());
            };
            triangles.insert(rotate_min([*a, *b, *c]));
        }
        let mut faces = Vec::with_capacity(triangles.len());
        for tri in &triangles {
            faces.push(mesh.add_face(tri)?);
        }
        debug!(loop_len = self.vertices.len(), triangles = faces.len(), "capped loop");
        Ok(faces)
    }
}

/// Rotates a triangle so its smallest id comes first, keeping the winding.
fn rotate_min(t: [VertexId; 3]) -> [VertexId; 3] {
    if t[1] < t[0] && t[1] < t[2] {
        [t[1], t[2], t[0]]
    } else if t[2] < t[0] && t[2] < t[1] {
        [t[2], t[0], t[1]]
    } else {
        t
    }
}

/// Inserts a closed polygon as constraint edges, returning the CDT vertex
/// index of each input point.
fn insert_constraint_loop(cdt: &mut Cdt, points: &[SpadePoint2<f64>]) -> Result<Vec<usize>> {
    if points.len() < 3 {
        return Err(
            TessellationError::Failed("constraint loop needs at least 3 points".into()).into(),
        );
    }

    let mut handles = Vec::with_capacity(points.len());
    for &pt in points {
        let h = cdt
            .insert(pt)
            .map_err(|e: InsertionError| TessellationError::Failed(format!("CDT insert: {e}")))?;
        handles.push(h);
    }

    for i in 0..handles.len() {
        let from = handles[i];
        let to = handles[(i + 1) % handles.len()];
        if from == to {
            continue;
        }
        if !cdt.can_add_constraint(from, to) {
            return Err(TessellationError::Failed("cap loop crosses itself".into()).into());
        }
        cdt.add_constraint(from, to);
    }

    Ok(handles.iter().map(|h| h.index()).collect())
}

/// Classifies which inner faces of the CDT are inside the polygon using flood-fill.
///
/// Starts from faces adjacent to the outer (infinite) face at depth 0. Each time
/// a constraint edge is crossed, depth increments. Odd depth = interior.
fn classify_interior_faces(cdt: &Cdt) -> HashSet<usize> {
    let mut interior = HashSet::new();
    let mut depth_map: HashMap<usize, u32> = HashMap::new();
    let mut queue: VecDeque<(FixedFaceHandle<spade::handles::InnerTag>, u32)> = VecDeque::new();

    let outer_fix = cdt.outer_face().fix();

    for edge in cdt.directed_edges() {
        if edge.face().fix() == outer_fix {
            if let Some(inner) = edge.rev().face().as_inner() {
                let idx = inner.fix().index();
                if depth_map.contains_key(&idx) {
                    continue;
                }
                let depth = u32::from(cdt.is_constraint_edge(edge.as_undirected().fix()));
                depth_map.insert(idx, depth);
                if depth % 2 == 1 {
                    interior.insert(idx);
                }
                queue.push_back((inner.fix(), depth));
            }
        }
    }

    while let Some((face_fix, depth)) = queue.pop_front() {
        let face = cdt.face(face_fix);
        for edge in face.adjacent_edges() {
            let Some(neighbor) = edge.rev().face().as_inner() else {
                continue;
            };
            let n_idx = neighbor.fix().index();
            if depth_map.contains_key(&n_idx) {
                continue;
            }
            let new_depth = if cdt.is_constraint_edge(edge.as_undirected().fix()) {
                depth + 1
            } else {
                depth
            };
            depth_map.insert(n_idx, new_depth);
            if new_depth % 2 == 1 {
                interior.insert(n_idx);
            }
            queue.push_back((neighbor.fix(), new_depth));
        }
    }

    interior
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mesh::loops::boundary_loops;
    use crate::mesh::EdgeMap;
    use crate::operations::creation::MakeGrid;
    use crate::operations::modification::ExtrudeLoop;
    use approx::assert_relative_eq;

    #[test]
    fn caps_an_l_shaped_opening() {
        let mut mesh = Mesh::new();
        let pts = [
            (0.0, 0.0),
            (4.0, 0.0),
            (4.0, 1.0),
            (1.0, 1.0),
            (1.0, 3.0),
            (0.0, 3.0),
        ];
        let ring: Vec<VertexId> = pts
            .iter()
            .map(|(x, y)| mesh.add_vertex(Point3::new(*x, *y, 0.0)))
            .collect();
        // Caps run against the loop, so a counter-clockwise loop gives a
        // downward cap.
        let faces = CapLoop::new(ring).execute(&mut mesh).unwrap();
        assert_eq!(faces.len(), 4);
        let area: f64 = faces.iter().map(|f| mesh.face_area(*f).unwrap()).sum();
        assert_relative_eq!(area, 6.0, epsilon = 1e-12);
        for f in &faces {
            assert!(mesh.face_normal(*f).unwrap().z < 0.0);
        }
    }

    #[test]
    fn capping_a_tray_closes_it() {
        let mut mesh = MakeGrid::new(3, 2, 1.0, 1.0).execute().unwrap().mesh;
        let lp = boundary_loops(&mesh).remove(0);
        let floor = ExtrudeLoop::new(-2.0).execute(&mut mesh, &lp).unwrap();
        CapLoop::new(floor).execute(&mut mesh).unwrap();
        assert!(EdgeMap::build(&mesh).is_closed_manifold());
        assert_relative_eq!(mesh.signed_volume(), 12.0, epsilon = 1e-9);
    }

    #[test]
    fn rejects_short_loops() {
        let mut mesh = Mesh::new();
        let a = mesh.add_vertex(Point3::origin());
        let b = mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        assert!(CapLoop::new(vec![a, b]).execute(&mut mesh).is_err());
    }
}
