use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{OperationError, Result};
use crate::math::polygon_2d::{project_to_plane, signed_area, triangulate};
use crate::math::spatial::PointGrid;
use crate::math::{Aabb, Point3, Vector3, MERGE_DISTANCE};
use crate::mesh::loops::connected_components;
use crate::mesh::{FaceId, Mesh, VertexId};
use crate::operations::modification::{HealMesh, RepairTJunctions};

use super::bsp::BspTree;
use super::polygon::{Plane, Polygon, PLANE_EPSILON};
use super::{BooleanOp, Solver};

/// Target polygons whose bounds come this close to an operand are cut by it.
const NEAR_MARGIN: f64 = 0.01;
/// Distance of the samples taken on either side of a piece lying on the
/// other solid's surface.
const SIDE_OFFSET: f64 = 1e-4;

/// Executes a boolean operation on two closed meshes.
///
/// Union and difference apply each connected component of `b` in turn.
/// Each solve cuts the two surfaces where they meet and keeps or drops
/// every piece by testing a point of it against the other closed surface;
/// polygons of `a` away from the operand are carried through unchanged.
pub fn boolean_execute(a: &Mesh, b: &Mesh, op: BooleanOp, solver: Solver) -> Result<Mesh> {
    if b.face_count() == 0 {
        return match op {
            BooleanOp::Intersect => Err(OperationError::EmptyResult("intersection".into()).into()),
            BooleanOp::Union | BooleanOp::Difference => Ok(a.clone()),
        };
    }

    let mut polys = mesh_to_polygons(a)?;
    match op {
        BooleanOp::Union | BooleanOp::Difference => {
            for part in split_components(b)? {
                let operand = mesh_to_polygons(&part)?;
                polys = solve_local(polys, &operand, op);
            }
        }
        BooleanOp::Intersect => {
            polys = solve_local(polys, &mesh_to_polygons(b)?, op);
        }
    }
    if polys.is_empty() {
        return Err(OperationError::EmptyResult(format!("{op:?}")).into());
    }

    let mut mesh = polygons_to_mesh(&polys)?;
    RepairTJunctions::new(MERGE_DISTANCE).execute(&mut mesh)?;
    if solver == Solver::Exact {
        HealMesh::new(MERGE_DISTANCE).execute(&mut mesh)?;
    }
    if mesh.face_count() == 0 {
        return Err(OperationError::EmptyResult(format!("{op:?}")).into());
    }
    debug!(
        ?op,
        ?solver,
        faces = mesh.face_count(),
        vertices = mesh.vertex_count(),
        "boolean solved"
    );
    Ok(mesh)
}

/// Solves one operand, cutting only the target polygons near it.
fn solve_local(a: Vec<Polygon>, b: &[Polygon], op: BooleanOp) -> Vec<Polygon> {
    let Some(bb_b) = bounds(b) else {
        return match op {
            BooleanOp::Union | BooleanOp::Difference => a,
            BooleanOp::Intersect => Vec::new(),
        };
    };
    let region = grow(&bb_b, NEAR_MARGIN);
    let (a_near, a_far): (Vec<_>, Vec<_>) =
        a.into_iter().partition(|p| p.bounds().intersects(&region));

    // Rays go up from points inside the operand's bounds, so only target
    // polygons over that footprint can be crossed.
    let footprint = grow(&bb_b, NEAR_MARGIN + SIDE_OFFSET);
    let column: Vec<&Polygon> = a_near
        .iter()
        .chain(&a_far)
        .filter(|p| overlaps_xy(&p.bounds(), &footprint))
        .collect();

    let mut result = Vec::with_capacity(a_far.len() + a_near.len() + b.len());
    let cut_b = BspTree::new(a_near.clone()).split_polygons(b.to_vec());
    for (piece, on_plane) in cut_b {
        let q = centroid(&piece);
        let n = piece.plane.normal;
        let (behind, front) = if on_plane {
            (
                inside(column.iter().copied(), &(q - n * SIDE_OFFSET)),
                inside(column.iter().copied(), &(q + n * SIDE_OFFSET)),
            )
        } else {
            let s = inside(column.iter().copied(), &q);
            (s, s)
        };
        // Where the surfaces coincide the target's pieces decide.
        if behind != front {
            continue;
        }
        keep(&mut result, piece, op.apply(behind, true), op.apply(front, false));
    }

    let cut_a = BspTree::new(b.to_vec()).split_polygons(a_near);
    for (piece, on_plane) in cut_a {
        let q = centroid(&piece);
        let n = piece.plane.normal;
        let (behind, front) = if on_plane {
            (inside(b, &(q - n * SIDE_OFFSET)), inside(b, &(q + n * SIDE_OFFSET)))
        } else {
            let s = inside(b, &q);
            (s, s)
        };
        keep(&mut result, piece, op.apply(true, behind), op.apply(false, front));
    }

    if op != BooleanOp::Intersect {
        result.extend(a_far);
    }
    result
}

/// Keeps `piece` when the result is solid behind it and empty in front,
/// and keeps it turned around in the opposite case.
fn keep(result: &mut Vec<Polygon>, mut piece: Polygon, solid_behind: bool, solid_front: bool) {
    match (solid_behind, solid_front) {
        (true, false) => result.push(piece),
        (false, true) => {
            piece.flip();
            result.push(piece);
        }
        _ => {}
    }
}

/// Whether `q` lies inside the closed surface made of `polys`, by the
/// parity of the polygons crossed by a ray going up from `q`.
fn inside<'a>(polys: impl IntoIterator<Item = &'a Polygon>, q: &Point3) -> bool {
    let mut crossings = 0usize;
    for p in polys {
        let n = p.plane.normal;
        if n.z.abs() < 1e-12 {
            continue;
        }
        let z = (p.plane.w - n.x * q.x - n.y * q.y) / n.z;
        if z > q.z && contains_xy(&p.vertices, q.x, q.y) {
            crossings += 1;
        }
    }
    crossings % 2 == 1
}

/// Crossing-number test of `(x, y)` against the polygon's XY shadow.
fn contains_xy(vertices: &[Point3], x: f64, y: f64) -> bool {
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for i in 0..vertices.len() {
        let (a, b) = (vertices[i], vertices[j]);
        if (a.y > y) != (b.y > y) && x < (b.x - a.x) * (y - a.y) / (b.y - a.y) + a.x {
            inside = !inside;
        }
        j = i;
    }
    inside
}

fn centroid(poly: &Polygon) -> Point3 {
    #[allow(clippy::cast_precision_loss)]
    let n = poly.vertices.len() as f64;
    Point3::from(poly.vertices.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / n)
}

fn overlaps_xy(a: &Aabb, b: &Aabb) -> bool {
    a.min.x <= b.max.x && a.max.x >= b.min.x && a.min.y <= b.max.y && a.max.y >= b.min.y
}

fn bounds(polys: &[Polygon]) -> Option<Aabb> {
    let mut iter = polys.iter();
    let mut aabb = iter.next()?.bounds();
    for p in iter {
        for v in &p.vertices {
            aabb.include(v);
        }
    }
    Some(aabb)
}

fn grow(aabb: &Aabb, margin: f64) -> Aabb {
    let m = Vector3::repeat(margin);
    Aabb::new(aabb.min - m, aabb.max + m)
}

fn split_components(mesh: &Mesh) -> Result<Vec<Mesh>> {
    let parts = connected_components(mesh);
    if parts.len() == 1 {
        return Ok(vec![mesh.clone()]);
    }
    parts.iter().map(|faces| extract_faces(mesh, faces)).collect()
}

/// Copies a subset of faces into a new mesh.
fn extract_faces(mesh: &Mesh, faces: &BTreeSet<FaceId>) -> Result<Mesh> {
    let mut out = Mesh::new();
    let mut map: std::collections::HashMap<VertexId, VertexId> = std::collections::HashMap::new();
    for f in faces {
        let mut loop_ = Vec::new();
        for v in mesh.face_vertices(*f)? {
            let nv = match map.get(v) {
                Some(nv) => *nv,
                None => {
                    let nv = out.add_vertex(mesh.point(*v)?);
                    map.insert(*v, nv);
                    nv
                }
            };
            loop_.push(nv);
        }
        out.add_face(&loop_)?;
    }
    Ok(out)
}

/// Converts mesh faces to convex planar polygons.
///
/// Planar convex faces are kept whole; anything else is ear-clipped.
/// Zero-area faces are skipped.
pub(crate) fn mesh_to_polygons(mesh: &Mesh) -> Result<Vec<Polygon>> {
    let mut out = Vec::with_capacity(mesh.face_count());
    for (fid, _) in mesh.faces() {
        let pts = mesh.face_points(fid)?;
        let Some(poly) = Polygon::new(pts.clone()) else {
            continue;
        };
        if pts.len() == 3 || (is_planar(&poly) && is_convex(&pts, &poly.plane)) {
            out.push(poly);
            continue;
        }
        let flat = project_to_plane(&pts, &poly.plane.normal);
        for [i, j, k] in triangulate(&flat) {
            if signed_area(&[flat[i], flat[j], flat[k]]).abs() < 1e-14 {
                continue;
            }
            if let Some(tri) = Polygon::new(vec![pts[i], pts[j], pts[k]]) {
                out.push(tri);
            }
        }
    }
    Ok(out)
}

fn is_planar(poly: &Polygon) -> bool {
    poly.vertices
        .iter()
        .all(|p| poly.plane.distance(p).abs() <= PLANE_EPSILON * 0.5)
}

fn is_convex(pts: &[Point3], plane: &Plane) -> bool {
    let n = pts.len();
    (0..n).all(|i| {
        let a = pts[i];
        let b = pts[(i + 1) % n];
        let c = pts[(i + 2) % n];
        (b - a).cross(&(c - b)).dot(&plane.normal) >= -1e-12
    })
}

/// Rebuilds a mesh from polygons, welding vertices closer than
/// [`MERGE_DISTANCE`].
pub(crate) fn polygons_to_mesh(polys: &[Polygon]) -> Result<Mesh> {
    let mut mesh = Mesh::new();
    let mut grid: PointGrid<VertexId> = PointGrid::new(MERGE_DISTANCE * 4.0);
    for poly in polys {
        let mut loop_: Vec<VertexId> = Vec::with_capacity(poly.vertices.len());
        for p in &poly.vertices {
            let id = match grid.within(p, MERGE_DISTANCE).first() {
                Some((_, id)) => *id,
                None => {
                    let id = mesh.add_vertex(*p);
                    grid.insert(*p, id);
                    id
                }
            };
            if loop_.last() != Some(&id) {
                loop_.push(id);
            }
        }
        while loop_.len() > 1 && loop_.first() == loop_.last() {
            loop_.pop();
        }
        dedup_loop(&mut loop_);
        if loop_.len() >= 3 {
            mesh.add_face(&loop_)?;
        }
    }
    mesh.remove_unused_vertices();
    Ok(mesh)
}

/// Removes repeated vertices from a face loop by cutting out the spur
/// between two visits of the same vertex.
fn dedup_loop(loop_: &mut Vec<VertexId>) {
    let mut i = 0;
    while i < loop_.len() {
        if let Some(offset) = loop_[i + 1..].iter().position(|v| *v == loop_[i]) {
            let j = i + 1 + offset;
            // Keep the longer side of the pinch.
            if j - i > loop_.len() / 2 {
                loop_.truncate(j);
                loop_.drain(..i);
            } else {
                loop_.drain(i..j);
            }
            i = 0;
            continue;
        }
        i += 1;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operations::creation::MakeBox;

    #[test]
    fn box_round_trips_through_polygons() {
        let mesh = MakeBox::new(Point3::origin(), Point3::new(1.0, 1.0, 1.0))
            .execute()
            .unwrap();
        let polys = mesh_to_polygons(&mesh).unwrap();
        assert_eq!(polys.len(), 6);
        let back = polygons_to_mesh(&polys).unwrap();
        assert_eq!(back.vertex_count(), 8);
        assert_eq!(back.face_count(), 6);
    }

    #[test]
    fn non_planar_quad_is_triangulated() {
        let mut mesh = Mesh::new();
        let v: Vec<_> = [
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.3),
            Point3::new(0.0, 1.0, 0.0),
        ]
        .into_iter()
        .map(|p| mesh.add_vertex(p))
        .collect();
        mesh.add_face(&v).unwrap();
        assert_eq!(mesh_to_polygons(&mesh).unwrap().len(), 2);
    }
}
