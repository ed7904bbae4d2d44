//! Solid Assembler.
//!
//! Thickens the open wall shell into outer and inner sheets, refines both,
//! and closes them along the floor into one watertight case.

use tracing::{debug, info, instrument};

use crate::error::{Result, TopologyError};
use crate::math::polygon_2d::signed_area;
use crate::math::Point2;
use crate::mesh::loops::{boundary_loops, boundary_vertices};
use crate::mesh::{Mesh, RegionTracker, Selection, VertexId};
use crate::operations::modification::{
    align_loop, BridgeLoops, CatmullClark, Part, SplitByConnectivity, Thicken, Triangulate,
};
use crate::operations::projection::{Shrinkwrap, WrapMode, WrapTarget};
use crate::operations::query::ManifoldReport;

use super::params::CaseParams;
use super::tags::Tag;
use super::walls::Walls;

/// Cell size used to re-derive tags after the organic projection.
const ORGANIC_TAG_CELL: f64 = 2.0;

/// The closed case before carving.
#[derive(Debug, Clone)]
pub struct Solid {
    pub mesh: Mesh,
    pub tags: RegionTracker<Tag>,
    /// Copy of the inner sheet; its normals face the cavity.
    pub inner_reference: Mesh,
    /// Inner floor loop, counter-clockwise seen from above.
    pub floor_outline: Vec<Point2>,
}

/// One refined sheet with its tags.
struct Sheet {
    mesh: Mesh,
    tags: RegionTracker<Tag>,
}

pub struct AssembleSolid<'a> {
    params: &'a CaseParams,
}

impl<'a> AssembleSolid<'a> {
    #[must_use]
    pub fn new(params: &'a CaseParams) -> Self {
        Self { params }
    }

    /// Executes the assembly.
    ///
    /// # Errors
    ///
    /// Returns `TopologyError` if thickening does not yield exactly two
    /// sheets, if the sheets do not each end in one floor loop, or if the
    /// joined case is not closed.
    #[instrument(skip_all)]
    pub fn execute(&self, walls: Walls) -> Result<Solid> {
        let Walls { mut mesh, mut tags, .. } = walls;
        let twin = Thicken::new(self.params.body.thickness)
            .rim(false)
            .keep_boundary_z(true)
            .execute(&mut mesh)?;
        tags.mirror(&twin);
        tags.set(Tag::Outer, twin.keys().copied().collect());
        tags.set(Tag::Inner, twin.values().copied().collect());
        let lifted = clamp_to_floor(&mut mesh, twin.values().copied(), self.params.floor_z())?;
        debug!(lifted, "clamped inner sheet to the floor");

        let parts = SplitByConnectivity::new().execute(&mesh)?;
        let [first, second] = parts.as_slice() else {
            return Err(TopologyError::InvalidTopology(format!(
                "thickened shell split into {} parts, expected 2",
                parts.len()
            ))
            .into());
        };
        let first = self.refine(first, &tags)?;
        let second = self.refine(second, &tags)?;
        let (mut outer, inner) = if first.tags.select(Tag::Outer).is_empty() {
            (second, first)
        } else {
            (first, second)
        };
        if outer.tags.select(Tag::Outer).is_empty() || !inner.tags.select(Tag::Outer).is_empty() {
            return Err(TopologyError::InvalidTopology("sheets do not match their tags".into()).into());
        }

        let map = outer.mesh.merge(&inner.mesh)?;
        let mut carried = inner.tags;
        carried.carry_forward(&map);
        for tag in carried.tags() {
            outer.tags.assign(tag, &carried.select(tag));
        }
        let Sheet { mut mesh, mut tags } = outer;

        let (rim, inner_loop) = close_floor(&mut mesh, &tags)?;
        tags.set(Tag::Bottom, rim.iter().chain(&inner_loop).copied().collect());

        let report = ManifoldReport::of(&mesh);
        if !report.is_closed() {
            return Err(TopologyError::NonManifold {
                context: "assembled case".into(),
                count: report.open_edges() + report.inconsistent_edges,
            }
            .into());
        }

        let inner_reference = sheet_copy(&mesh, &tags.select(Tag::Inner))?;
        let mut floor_outline: Vec<Point2> = inner_loop
            .iter()
            .map(|v| mesh.point(*v).map(|p| Point2::new(p.x, p.y)))
            .collect::<Result<_>>()?;
        if signed_area(&floor_outline) < 0.0 {
            floor_outline.reverse();
        }
        info!(
            faces = mesh.face_count(),
            vertices = mesh.vertex_count(),
            floor_vertices = floor_outline.len(),
            organic = self.params.body.organic,
            "assembled solid"
        );
        Ok(Solid {
            mesh,
            tags,
            inner_reference,
            floor_outline,
        })
    }

    fn refine(&self, part: &Part, tags: &RegionTracker<Tag>) -> Result<Sheet> {
        let mut part_tags = tags.clone();
        part_tags.carry_forward(&part.map);
        if self.params.body.organic {
            return self.sculpt(part, &part_tags);
        }
        let sub = CatmullClark::new(self.params.body.subdivisions).execute(&part.mesh)?;
        part_tags.carry_provenance(&sub.provenance);
        debug!(
            levels = self.params.body.subdivisions,
            faces = sub.mesh.face_count(),
            "refined sheet"
        );
        Ok(Sheet {
            mesh: sub.mesh,
            tags: part_tags,
        })
    }

    /// Triangulates, smooth-subdivides and projects the sheet back onto
    /// itself; tags follow the nearest original vertex.
    fn sculpt(&self, part: &Part, tags: &RegionTracker<Tag>) -> Result<Sheet> {
        let snapshot = tags.snapshot(&part.mesh);
        let mut coarse = part.mesh.clone();
        Triangulate::new().execute(&mut coarse)?;
        let mut mesh = CatmullClark::new(1).execute(&coarse)?.mesh;
        Shrinkwrap::new(WrapTarget::Mesh(&part.mesh), WrapMode::Nearest).execute(&mut mesh)?;

        let floor_z = self.params.floor_z();
        for v in boundary_vertices(&mesh) {
            let mut p = mesh.point(v)?;
            p.z = floor_z;
            mesh.set_point(v, p)?;
        }
        let mut sculpted = tags.clone();
        sculpted.reassert_nearest(&mesh, &snapshot, ORGANIC_TAG_CELL);
        debug!(faces = mesh.face_count(), "sculpted sheet");
        Ok(Sheet {
            mesh,
            tags: sculpted,
        })
    }
}

/// Raises every vertex of `sheet` lying under `floor_z` onto it. The inner
/// offset of a wall leaning outwards at its foot otherwise dips below the
/// floor plane.
fn clamp_to_floor(
    mesh: &mut Mesh,
    sheet: impl IntoIterator<Item = VertexId>,
    floor_z: f64,
) -> Result<usize> {
    let mut lifted = 0;
    for v in sheet {
        let mut p = mesh.point(v)?;
        if p.z < floor_z {
            p.z = floor_z;
            mesh.set_point(v, p)?;
            lifted += 1;
        }
    }
    Ok(lifted)
}

/// Bridges the outer and inner floor loops, returning both as bridged.
fn close_floor(mesh: &mut Mesh, tags: &RegionTracker<Tag>) -> Result<(Vec<VertexId>, Vec<VertexId>)> {
    let loops = boundary_loops(mesh);
    if loops.len() != 2 {
        return Err(TopologyError::BoundaryLoops {
            context: "sheets before closing".into(),
            expected: 2,
            found: loops.len(),
        }
        .into());
    }
    let outer_tag = tags.select(Tag::Outer);
    let is_outer = |lp: &[VertexId]| lp.iter().any(|v| outer_tag.contains(*v));
    let (a, mut b) = match (is_outer(&loops[0]), is_outer(&loops[1])) {
        (true, false) => (loops[0].clone(), loops[1].clone()),
        (false, true) => (loops[1].clone(), loops[0].clone()),
        _ => {
            return Err(
                TopologyError::InvalidTopology("floor loops do not separate the sheets".into()).into(),
            )
        }
    };
    // The inner sheet traverses its loop the other way round.
    b.reverse();
    align_loop(mesh, &a, &mut b)?;
    let faces = BridgeLoops::new().execute(mesh, &a, &b)?;
    debug!(outer = a.len(), inner = b.len(), faces = faces.len(), "closed floor rim");
    Ok((a, b))
}

/// Copies the faces lying entirely within `region`.
pub(crate) fn sheet_copy(mesh: &Mesh, region: &Selection) -> Result<Mesh> {
    let mut out = mesh.clone();
    for f in mesh.face_ids() {
        if !mesh.face_vertices(f)?.iter().all(|v| region.contains(*v)) {
            out.remove_face(f);
        }
    }
    out.remove_unused_vertices();
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::case::placement::{KeyId, PlaceKeys};
    use crate::case::plate::BuildBody;
    use crate::case::walls::BuildWalls;
    use crate::mesh::EdgeMap;
    use approx::assert_relative_eq;

    fn solid(params: &CaseParams) -> Solid {
        let layout = PlaceKeys::new(params).execute().unwrap();
        let body = BuildBody::new(params, &layout).execute().unwrap();
        let walls = BuildWalls::new(params).execute(body).unwrap();
        AssembleSolid::new(params).execute(walls).unwrap()
    }

    fn coarse() -> CaseParams {
        let mut params = CaseParams::default();
        params.body.subdivisions = 0;
        params
    }

    #[test]
    fn case_is_closed_and_encloses_volume() {
        let s = solid(&coarse());
        assert!(ManifoldReport::of(&s.mesh).is_closed());
        assert!(s.mesh.signed_volume() > 0.0);
        assert!(!s.tags.select(Tag::Bottom).is_empty());
    }

    #[test]
    fn sheets_partition_the_vertices() {
        let s = solid(&coarse());
        let outer = s.tags.select(Tag::Outer);
        let inner = s.tags.select(Tag::Inner);
        assert!(outer.intersection(&inner).is_empty());
        assert_eq!(outer.len() + inner.len(), s.mesh.vertex_count());
        assert_eq!(outer.len(), inner.len());
    }

    #[test]
    fn key_tags_survive_on_both_sheets() {
        let s = solid(&coarse());
        let key = s.tags.select(Tag::Key(KeyId::Finger { column: 2, row: 2 }));
        assert_eq!(key.intersection(&s.tags.select(Tag::Outer)).len(), 4);
        assert_eq!(key.intersection(&s.tags.select(Tag::Inner)).len(), 4);
    }

    #[test]
    fn floor_outline_lies_inside_the_case() {
        let params = coarse();
        let s = solid(&params);
        assert!(s.floor_outline.len() >= 3);
        assert!(signed_area(&s.floor_outline) > 0.0);
        let bb = s.mesh.bounding_box().unwrap();
        assert_relative_eq!(bb.min.z, params.floor_z(), epsilon = 1e-9);
        assert!(EdgeMap::build(&s.inner_reference).non_manifold_edges().is_empty());
        assert!(s.inner_reference.face_count() > 0);
    }

    #[test]
    fn no_vertex_sinks_below_the_floor() {
        for params in [coarse(), CaseParams::default()] {
            let s = solid(&params);
            let floor_z = params.floor_z();
            for v in s.mesh.vertex_ids() {
                assert!(s.mesh.point(v).unwrap().z >= floor_z - 1e-9);
            }
            let inner = s.tags.select(Tag::Inner);
            assert!(inner.iter().any(|v| {
                let z = s.mesh.point(v).unwrap().z;
                (z - floor_z).abs() < 1e-9
            }));
        }
    }

    #[test]
    fn clamping_lifts_only_what_lies_below() {
        let mut mesh = Mesh::new();
        let low = mesh.add_vertex(crate::math::Point3::new(0.0, 0.0, -3.7));
        let high = mesh.add_vertex(crate::math::Point3::new(1.0, 0.0, 2.0));
        let lifted = clamp_to_floor(&mut mesh, [low, high], -3.0).unwrap();
        assert_eq!(lifted, 1);
        assert_relative_eq!(mesh.point(low).unwrap().z, -3.0);
        assert_relative_eq!(mesh.point(high).unwrap().z, 2.0);
    }

    #[test]
    fn subdivision_keeps_the_case_closed() {
        let s = solid(&CaseParams::default());
        assert!(ManifoldReport::of(&s.mesh).is_closed());
        assert!(!s.tags.select(Tag::Key(KeyId::Thumb(0))).is_empty());
    }
}
