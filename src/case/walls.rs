//! Wall Ring Generator.
//!
//! Offsets the plate boundary outward and down in successive rings, bridges
//! the rings into quad strips and drops the last ring onto the floor plane.

use std::collections::BTreeSet;

use tracing::{debug, info, instrument};

use crate::error::{OperationError, Result, TopologyError};
use crate::math::{Point3, Vector3};
use crate::mesh::loops::boundary_loops;
use crate::mesh::{EdgeKey, EdgeMap, Mesh, RegionTracker, Selection, VertexId};
use crate::operations::modification::{
    BridgeLoops, ExtrudeLoop, LoopFrame, OffsetLoop, Relax, Smooth, TrisToQuads,
};

use super::params::CaseParams;
use super::plate::PlateMesh;
use super::tags::{Corner, Plate, Seam, Side, Tag};

/// Longest stretch applied to a mitred ring vertex.
const MAX_MITRE: f64 = 2.0;

/// Largest angle deviation when re-pairing triangles into quads.
const QUAD_ANGLE: f64 = 0.7;

/// How a boundary corner is carried through the rings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CornerStitch {
    /// Offset along the full mitre and held in place while the skirt is
    /// relaxed.
    Mitre,
    /// Offset without stretching, then pulled halfway toward its ring
    /// neighbours so the walls on either side of the seam meet cleanly.
    Seam,
}

#[derive(Debug, Clone, Copy)]
struct CornerRule {
    tag: Tag,
    stitch: CornerStitch,
}

const CORNER_RULES: [CornerRule; 7] = [
    CornerRule {
        tag: Tag::Corner(Plate::Finger, Corner::TopLeft),
        stitch: CornerStitch::Mitre,
    },
    CornerRule {
        tag: Tag::Corner(Plate::Finger, Corner::TopRight),
        stitch: CornerStitch::Mitre,
    },
    CornerRule {
        tag: Tag::Corner(Plate::Finger, Corner::BottomRight),
        stitch: CornerStitch::Mitre,
    },
    CornerRule {
        tag: Tag::Corner(Plate::Thumb, Corner::BottomLeft),
        stitch: CornerStitch::Mitre,
    },
    CornerRule {
        tag: Tag::Corner(Plate::Thumb, Corner::BottomRight),
        stitch: CornerStitch::Mitre,
    },
    CornerRule {
        tag: Tag::SeamEnd(Seam::Right),
        stitch: CornerStitch::Seam,
    },
    CornerRule {
        tag: Tag::SeamEnd(Seam::Left),
        stitch: CornerStitch::Seam,
    },
];

/// The open wall shell: plate, rings and skirt down to the floor.
#[derive(Debug, Clone)]
pub struct Walls {
    pub mesh: Mesh,
    pub tags: RegionTracker<Tag>,
    /// Ring 0 is the plate boundary; every ring is aligned with it.
    pub rings: Vec<Vec<VertexId>>,
    /// The floor loop, aligned with the last ring.
    pub floor: Vec<VertexId>,
}

/// Grows the wall rings from a joined plate body.
pub struct BuildWalls<'a> {
    params: &'a CaseParams,
}

impl<'a> BuildWalls<'a> {
    #[must_use]
    pub fn new(params: &'a CaseParams) -> Self {
        Self { params }
    }

    /// Executes the build.
    ///
    /// # Errors
    ///
    /// Returns `TopologyError::BoundaryLoops` if the plate does not have
    /// exactly one boundary loop or the finished shell is not open along
    /// the floor alone, and `TopologyError::NonManifold` if an edge ends up
    /// shared by more than two faces.
    #[instrument(skip_all)]
    pub fn execute(&self, plate: PlateMesh) -> Result<Walls> {
        let PlateMesh { mut mesh, mut tags, .. } = plate;
        let mut loops = boundary_loops(&mesh);
        if loops.len() != 1 {
            return Err(TopologyError::BoundaryLoops {
                context: "plate before walls".into(),
                expected: 1,
                found: loops.len(),
            }
            .into());
        }
        let ring0 = loops.remove(0);
        tags.assign(Tag::Ring(0), &ring0.iter().copied().collect());

        let frames = OffsetLoop::new(ring0.clone()).execute(&mesh)?;
        let profiles = self.vertex_profiles(&ring0, &tags)?;
        let floor_z = self.params.floor_z();
        let min_z = floor_z + self.params.walls.floor_clearance;

        let mut rings = vec![ring0.clone()];
        let mut pinned = Selection::new();
        for k in 0..self.params.ring_count() {
            let ring_no = k + 1;
            let mut points: Vec<Point3> = frames
                .iter()
                .zip(&profiles)
                .map(|(frame, profile)| ring_point(frame, profile[k], frame.scale.min(MAX_MITRE)))
                .collect();

            // Corner rules are resolved against the unadjusted ring.
            let plain = points.clone();
            let n = ring0.len();
            for (idx, v) in ring0.iter().enumerate() {
                let Some(rule) = corner_rule(&tags, *v) else {
                    continue;
                };
                match rule.stitch {
                    CornerStitch::Mitre => {
                        points[idx] = ring_point(&frames[idx], profiles[idx][k], frames[idx].scale);
                    }
                    CornerStitch::Seam => {
                        let own = ring_point(&frames[idx], profiles[idx][k], 1.0);
                        let mid = nalgebra::center(&plain[(idx + n - 1) % n], &plain[(idx + 1) % n]);
                        points[idx] = nalgebra::center(&own, &mid);
                    }
                }
            }

            let mut ring = Vec::with_capacity(n);
            for (idx, mut p) in points.into_iter().enumerate() {
                p.z = p.z.max(min_z);
                let v = mesh.add_vertex(p);
                if corner_rule(&tags, ring0[idx]).is_some_and(|r| r.stitch == CornerStitch::Mitre) {
                    pinned.insert(v);
                }
                for tag in tags.tags_of(ring0[idx]) {
                    if matches!(tag, Tag::Corner(..) | Tag::SeamEnd(_)) {
                        tags.assign_vertex(tag, v);
                    }
                }
                ring.push(v);
            }
            let ring_tag = u8::try_from(ring_no)
                .map(Tag::Ring)
                .map_err(|_| OperationError::InvalidInput(format!("{ring_no} wall rings")))?;
            tags.assign(ring_tag, &ring.iter().copied().collect());

            let faces = BridgeLoops::new().execute(&mut mesh, &rings[k], &ring)?;
            debug!(ring = ring_no, vertices = ring.len(), faces = faces.len(), "added wall ring");
            rings.push(ring);
        }

        let locked: BTreeSet<EdgeKey> = rings
            .iter()
            .flat_map(|ring| {
                (0..ring.len()).map(move |i| EdgeKey::new(ring[i], ring[(i + 1) % ring.len()]))
            })
            .collect();
        let merged = TrisToQuads::new(QUAD_ANGLE).locked(locked).execute(&mut mesh)?;

        let last = rings.last().cloned().unwrap_or_default();
        let floor = ExtrudeLoop::new(floor_z).execute(&mut mesh, &last)?;
        tags.assign(Tag::Floor, &floor.iter().copied().collect());

        if self.params.walls.relaxed {
            self.relax_skirt(&mut mesh, &tags, &pinned, min_z)?;
        }

        check_open_shell(&mesh)?;
        info!(
            rings = rings.len() - 1,
            ring_vertices = ring0.len(),
            quads_merged = merged,
            faces = mesh.face_count(),
            "built walls"
        );
        Ok(Walls {
            mesh,
            tags,
            rings,
            floor,
        })
    }

    /// Picks the `(width, depth)` profile of every ring-0 vertex from the
    /// sides it lies on.
    fn vertex_profiles(&self, ring0: &[VertexId], tags: &RegionTracker<Tag>) -> Result<Vec<Vec<[f64; 2]>>> {
        let walls = &self.params.walls;
        let by_side = |side: Side| match side {
            Side::Left => &walls.left_profile,
            Side::Right => &walls.right_profile,
            Side::Top | Side::Bottom => &walls.profile,
        };
        let own: Vec<Option<Vec<[f64; 2]>>> = ring0
            .iter()
            .map(|v| {
                let sides: Vec<&Vec<[f64; 2]>> = tags
                    .tags_of(*v)
                    .into_iter()
                    .filter_map(|t| match t {
                        Tag::Side(_, side) => Some(by_side(side)),
                        _ => None,
                    })
                    .collect();
                mean_profile(&sides)
            })
            .collect();
        if own.iter().all(Option::is_none) {
            return Err(TopologyError::InvalidTopology("plate boundary has no side tags".into()).into());
        }

        // Untagged vertices borrow from the nearest tagged ones on each side.
        let n = ring0.len();
        let mut out = Vec::with_capacity(n);
        for i in 0..n {
            if let Some(p) = &own[i] {
                out.push(p.clone());
                continue;
            }
            let before = (1..n).map(|d| &own[(i + n - d) % n]).find_map(Option::as_ref);
            let after = (1..n).map(|d| &own[(i + d) % n]).find_map(Option::as_ref);
            let found: Vec<&Vec<[f64; 2]>> = before.into_iter().chain(after).collect();
            out.push(mean_profile(&found).unwrap_or_else(|| walls.profile.clone()));
        }
        Ok(out)
    }

    /// Smooths the skirt below the key wells.
    fn relax_skirt(
        &self,
        mesh: &mut Mesh,
        tags: &RegionTracker<Tag>,
        pinned: &Selection,
        min_z: f64,
    ) -> Result<()> {
        let mut mask = Selection::new();
        for k in 2..=self.params.ring_count() {
            if let Ok(ring_no) = u8::try_from(k) {
                mask = mask.union(&tags.select(Tag::Ring(ring_no)));
            }
        }
        for tag in Tag::ALL_KEYS {
            mask = mask.difference(&tags.select(tag));
        }
        mask = mask
            .difference(&tags.select(Tag::Corner(Plate::Thumb, Corner::MiddleLeft)))
            .difference(pinned);
        let iterations = self.params.walls.relax_iterations;
        Smooth::new(mask.clone(), 1.0, iterations).execute(mesh)?;
        Relax::new(mask.clone(), iterations).execute(mesh)?;
        for v in mask.iter() {
            let mut p = mesh.point(v)?;
            if p.z < min_z {
                p.z = min_z;
                mesh.set_point(v, p)?;
            }
        }
        debug!(vertices = mask.len(), iterations, "relaxed skirt");
        Ok(())
    }
}

fn ring_point(frame: &LoopFrame, [width, depth]: [f64; 2], scale: f64) -> Point3 {
    frame.origin + frame.direction * (width * scale) + Vector3::z() * depth
}

fn corner_rule(tags: &RegionTracker<Tag>, v: VertexId) -> Option<CornerRule> {
    CORNER_RULES.iter().find(|rule| tags.has(rule.tag, v)).copied()
}

#[allow(clippy::cast_precision_loss)]
fn mean_profile(profiles: &[&Vec<[f64; 2]>]) -> Option<Vec<[f64; 2]>> {
    let first = profiles.first()?;
    let count = profiles.len() as f64;
    Some(
        (0..first.len())
            .map(|k| {
                let (w, d) = profiles
                    .iter()
                    .fold((0.0, 0.0), |(w, d), p| (w + p[k][0], d + p[k][1]));
                [w / count, d / count]
            })
            .collect(),
    )
}

/// The wall shell must be open along the floor loop only.
fn check_open_shell(mesh: &Mesh) -> Result<()> {
    let edges = EdgeMap::build(mesh);
    let non_manifold = edges.non_manifold_edges().len();
    if non_manifold > 0 {
        return Err(TopologyError::NonManifold {
            context: "wall shell".into(),
            count: non_manifold,
        }
        .into());
    }
    let loops = boundary_loops(mesh).len();
    if loops != 1 {
        return Err(TopologyError::BoundaryLoops {
            context: "wall shell".into(),
            expected: 1,
            found: loops,
        }
        .into());
    }
    Ok(())
}
