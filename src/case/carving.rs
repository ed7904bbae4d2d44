//! Carving Orchestrator.
//!
//! Runs the carving steps in a fixed order, each inside a scene
//! transaction, so a failing step leaves the scene as the previous step
//! committed it.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{debug, info, instrument};

use crate::error::{Result, TopologyError};
use crate::math::{Point3, Vector3, MERGE_DISTANCE};
use crate::mesh::{EdgeMap, FaceId, Mesh, RegionTracker, Selection};
use crate::operations::boolean::{Boolean, BooleanOp, Solver};
use crate::operations::modification::{HealMesh, SplitByPlane, Weld};
use crate::operations::projection::{Shrinkwrap, WrapMode, WrapTarget};
use crate::operations::query::{ManifoldReport, RayCast};

use super::bottom::{BuildBottomPlate, SLAB_TOP};
use super::params::CaseParams;
use super::placement::{KeyId, Layout};
use super::plate::select_any;
use super::scene::{ObjectKey, QueuedBoolean, Scene, SceneObject};
use super::solid::sheet_copy;
use super::tags::Tag;
use super::tools::{
    key_well, magnet_tools, port_tools, support_ribs, switch_hole, ConformBox, MagnetTools,
    WellKind,
};

/// Margin around a conform box inside which faces are cut.
const CUT_MARGIN: f64 = 1.0;
/// Distance inside the box at which a vertex counts as inside.
const INSIDE_TOLERANCE: f64 = 1e-6;
/// Least wall left between a levelled outer well and the cavity.
const CAVITY_CLEARANCE: f64 = 0.5;
/// Height of the magnet anchor rays.
const MAGNET_RAY_Z: f64 = 2.0;
/// How far behind the wall surface a magnet anchor sits.
const MAGNET_INSET: f64 = 1.0;
/// Least gap between an inner switch pocket and the bottom plate.
const POCKET_CLEARANCE: f64 = 0.6;
/// Widest crack the post-boolean repair pass closes.
const REPAIR_TOLERANCE: f64 = 1e-3;

/// The carving steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CarvingStep {
    KeyWells,
    SwitchHoles,
    Supports,
    ConnectorPort,
    Magnets,
    BottomPlate,
}

impl CarvingStep {
    pub const ALL: [CarvingStep; 6] = [
        CarvingStep::KeyWells,
        CarvingStep::SwitchHoles,
        CarvingStep::Supports,
        CarvingStep::ConnectorPort,
        CarvingStep::Magnets,
        CarvingStep::BottomPlate,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            CarvingStep::KeyWells => "key wells",
            CarvingStep::SwitchHoles => "switch holes",
            CarvingStep::Supports => "supports",
            CarvingStep::ConnectorPort => "connector port",
            CarvingStep::Magnets => "magnets",
            CarvingStep::BottomPlate => "bottom plate",
        }
    }

    /// Solver for the booleans of this step: exact where many operands
    /// meet the curved key wells, fast elsewhere.
    #[must_use]
    pub fn solver(self) -> Solver {
        match self {
            CarvingStep::SwitchHoles | CarvingStep::Supports => Solver::Exact,
            CarvingStep::KeyWells
            | CarvingStep::ConnectorPort
            | CarvingStep::Magnets
            | CarvingStep::BottomPlate => Solver::Fast,
        }
    }
}

impl fmt::Display for CarvingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a carving run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarveSummary {
    /// Steps that ran and committed, in order.
    pub completed: Vec<CarvingStep>,
    /// Steps skipped because their feature is disabled.
    pub skipped: Vec<CarvingStep>,
    /// Vertices moved while levelling the key wells.
    pub levelled: usize,
    pub magnets: usize,
}

/// Carves a scene holding an assembled case.
pub struct CarveCase<'a> {
    params: &'a CaseParams,
    layout: &'a Layout,
    until: CarvingStep,
}

impl<'a> CarveCase<'a> {
    #[must_use]
    pub fn new(params: &'a CaseParams, layout: &'a Layout) -> Self {
        Self {
            params,
            layout,
            until: CarvingStep::BottomPlate,
        }
    }

    /// Stops after `step`.
    #[must_use]
    pub fn until(mut self, step: CarvingStep) -> Self {
        self.until = step;
        self
    }

    /// Executes the carving steps up to the configured last one.
    ///
    /// # Errors
    ///
    /// Returns `CaseError::Stage` naming the step that failed; the scene is
    /// left as the previous step committed it.
    #[instrument(skip_all, fields(until = %self.until))]
    pub fn execute(&self, scene: &mut Scene) -> Result<CarveSummary> {
        let mut summary = CarveSummary::default();
        for step in CarvingStep::ALL {
            if step > self.until {
                break;
            }
            if !self.enabled(step) {
                info!(step = %step, "feature disabled, skipping");
                summary.skipped.push(step);
                continue;
            }
            scene.transaction(step.name(), |scene| match step {
                CarvingStep::KeyWells => {
                    summary.levelled = self.key_wells(scene)?;
                    Ok(())
                }
                CarvingStep::SwitchHoles => self.switch_holes(scene),
                CarvingStep::Supports => self.supports(scene),
                CarvingStep::ConnectorPort => self.connector_port(scene),
                CarvingStep::Magnets => {
                    summary.magnets = self.magnets(scene)?;
                    Ok(())
                }
                CarvingStep::BottomPlate => self.bottom_plate(scene),
            })?;
            summary.completed.push(step);
        }
        info!(
            completed = summary.completed.len(),
            skipped = summary.skipped.len(),
            "carving finished"
        );
        Ok(summary)
    }

    fn enabled(&self, step: CarvingStep) -> bool {
        let features = &self.params.features;
        match step {
            CarvingStep::Supports => features.switch_supports,
            CarvingStep::ConnectorPort => features.connector_port,
            CarvingStep::Magnets => features.magnets,
            CarvingStep::KeyWells | CarvingStep::SwitchHoles | CarvingStep::BottomPlate => true,
        }
    }

    /// Levels every key well, then keeps the outer wells off the cavity.
    fn key_wells(&self, scene: &mut Scene) -> Result<usize> {
        let weld = self.params.carving.weld_distance;
        let case = scene.require_mut(ObjectKey::Case)?;
        let mut outer_moved = Selection::new();
        let mut levelled = 0;
        for key in self.layout.iter() {
            case.tags.require(Tag::Key(key.id))?;
            for kind in WellKind::ALL {
                let bx = key_well(kind, key, self.params);
                let moved = conform_region(&mut case.mesh, &mut case.tags, kind.shell(), &bx, weld)?;
                levelled += moved.len();
                if kind.shell() == Tag::Outer {
                    outer_moved = outer_moved.union(&moved);
                }
            }
            debug!(key = %key.id, "levelled key well");
        }

        let non_manifold = EdgeMap::build(&case.mesh).non_manifold_edges().len();
        if non_manifold > 0 {
            return Err(TopologyError::NonManifold {
                context: "key wells".into(),
                count: non_manifold,
            }
            .into());
        }

        outer_moved.retain_existing(&case.mesh);
        let cavity = sheet_copy(&case.mesh, &case.tags.select(Tag::Inner))?;
        let clamped = Shrinkwrap::new(WrapTarget::Mesh(&cavity), WrapMode::TargetInside)
            .offset(-CAVITY_CLEARANCE)
            .restricted_to(outer_moved)
            .execute(&mut case.mesh)?;
        info!(keys = self.layout.len(), levelled, clamped, "levelled key wells");
        Ok(levelled)
    }

    fn switch_holes(&self, scene: &mut Scene) -> Result<()> {
        let mut holes = Mesh::new();
        for key in self.layout.iter() {
            holes.merge(&switch_hole(key, self.params)?)?;
        }
        let case = scene.require_mut(ObjectKey::Case)?;
        let solver = CarvingStep::SwitchHoles.solver();
        apply_boolean(case, BooleanOp::Difference, &holes, solver, self.params, "switch holes")
    }

    fn supports(&self, scene: &mut Scene) -> Result<()> {
        let mut ribs = Mesh::new();
        for key in self.layout.iter() {
            ribs.merge(&support_ribs(key, self.params)?)?;
        }
        let case = scene.require_mut(ObjectKey::Case)?;
        let solver = CarvingStep::Supports.solver();
        apply_boolean(case, BooleanOp::Union, &ribs, solver, self.params, "switch supports")
    }

    fn connector_port(&self, scene: &mut Scene) -> Result<()> {
        let weld = self.params.carving.weld_distance;
        let corner = self.layout.require(KeyId::Finger { column: 0, row: 0 })?;
        let case = scene.require_mut(ObjectKey::Case)?;
        let Some(bounds) = case.mesh.bounding_box() else {
            return Err(TopologyError::EntityNotFound("case mesh is empty".into()).into());
        };
        let x = corner
            .to_world(&Point3::new(0.0, self.params.switch.mount_width / 2.0, 0.0))
            .x;
        let origin = Point3::new(x, bounds.max.y + 10.0, 0.0);
        let hit = RayCast::new(origin, -Vector3::y()).execute(&case.mesh)?;
        let port = port_tools(&hit.point, self.params)?;
        debug!(anchor = ?hit.point, "found port anchor");

        conform_region(&mut case.mesh, &mut case.tags, Tag::Outer, &port.outer, weld)?;
        conform_region(&mut case.mesh, &mut case.tags, Tag::Inner, &port.inner, weld)?;
        let solver = CarvingStep::ConnectorPort.solver();
        apply_boolean(case, BooleanOp::Difference, &port.through_hole, solver, self.params, "port hole")?;
        apply_boolean(case, BooleanOp::Difference, &port.relief, solver, self.params, "port relief")?;
        scene.bottom_queue.extend(port.bottom_reliefs.into_iter().map(|mesh| QueuedBoolean {
            op: BooleanOp::Union,
            mesh,
        }));
        Ok(())
    }

    fn magnets(&self, scene: &mut Scene) -> Result<usize> {
        let case = scene.require_mut(ObjectKey::Case)?;
        let wells = self.magnet_wells(&case.mesh)?;
        let count = wells.len();
        let mut bosses = Mesh::new();
        let mut pockets = Mesh::new();
        let mut queued = Vec::new();
        for tools in wells {
            bosses.merge(&tools.boss)?;
            pockets.merge(&tools.pocket)?;
            queued.push(tools.clearance);
            queued.push(tools.pocket);
        }
        let solver = CarvingStep::Magnets.solver();
        apply_boolean(case, BooleanOp::Union, &bosses, solver, self.params, "magnet bosses")?;
        apply_boolean(case, BooleanOp::Difference, &pockets, solver, self.params, "magnet pockets")?;
        scene.bottom_queue.extend(queued.into_iter().map(|mesh| QueuedBoolean {
            op: BooleanOp::Difference,
            mesh,
        }));
        Ok(count)
    }

    /// Places one magnet well behind each of the six wall anchors of `case`.
    fn magnet_wells(&self, case: &Mesh) -> Result<Vec<MagnetTools>> {
        let lp = &self.params.layout;
        let finger = |column: usize, row: usize| -> Result<Point3> {
            Ok(self.layout.require(KeyId::Finger { column, row })?.origin())
        };
        let last = lp.ncols - 1;
        let lower = lp.nrows - 2 - (lp.nrows - 1) % 2;
        let anchors: [(Point3, Vector3); 6] = [
            (finger(0, 0)?, -Vector3::x()),
            (finger(lp.ncols - 2, 0)?, Vector3::y()),
            (finger(lp.ncols - 2, lp.nrows - 2)?, -Vector3::y()),
            (self.layout.require(KeyId::Thumb(5))?.origin(), -Vector3::y()),
            (finger(0, lp.nrows - 2)?, -Vector3::x()),
            (
                nalgebra::center(&finger(last, 0)?, &finger(last, lower)?),
                Vector3::x(),
            ),
        ];

        let mut wells = Vec::with_capacity(anchors.len());
        for (i, (from, direction)) in anchors.iter().enumerate() {
            let origin = Point3::new(from.x, from.y, MAGNET_RAY_Z);
            let hit = RayCast::new(origin, *direction).execute(case)?;
            let normal = -direction;
            let anchor = hit.point - normal * MAGNET_INSET;
            debug!(magnet = i, anchor = ?anchor, "placed magnet well");
            wells.push(magnet_tools(&anchor, &normal, self.params)?);
        }
        Ok(wells)
    }

    fn bottom_plate(&self, scene: &mut Scene) -> Result<()> {
        let reference = &scene.require(ObjectKey::InnerReference)?.mesh;
        let plate = BuildBottomPlate::new(self.params).execute(&scene.floor_outline, reference)?;
        let mut object = SceneObject::new(plate);
        let solver = CarvingStep::BottomPlate.solver();
        for queued in std::mem::take(&mut scene.bottom_queue) {
            apply_boolean(&mut object, queued.op, &queued.mesh, solver, self.params, "bottom plate feature")?;
        }
        scene.insert(ObjectKey::BottomPlate, object);

        // Inner switch pockets must clear the slab.
        let min_z = SLAB_TOP + POCKET_CLEARANCE;
        let case = scene.require_mut(ObjectKey::Case)?;
        let mut pockets =
            select_any(&case.tags, &Tag::ALL_KEYS).intersection(&case.tags.select(Tag::Inner));
        pockets.retain_existing(&case.mesh);
        let mut lifted = 0;
        for v in pockets.iter() {
            let mut p = case.mesh.point(v)?;
            if p.z < min_z {
                p.z = min_z;
                case.mesh.set_point(v, p)?;
                lifted += 1;
            }
        }
        debug!(lifted, "cleared switch pockets above the slab");
        Ok(())
    }
}

/// Cuts the sheet along the faces of `bx`, flattens the part inside onto
/// its plane and collapses the edges that became shorter than `weld`.
/// Returns the flattened vertices.
fn conform_region(
    mesh: &mut Mesh,
    tags: &mut RegionTracker<Tag>,
    shell: Tag,
    bx: &ConformBox,
    weld: f64,
) -> Result<Selection> {
    for (origin, normal) in bx.cut_planes() {
        let sheet = tags.select(shell);
        let scope: BTreeSet<FaceId> = mesh
            .faces()
            .filter(|(_, verts)| {
                verts.iter().all(|v| sheet.contains(*v))
                    && verts
                        .iter()
                        .any(|v| mesh.point(*v).is_ok_and(|p| bx.contains(&p, CUT_MARGIN)))
            })
            .map(|(f, _)| f)
            .collect();
        if scope.is_empty() {
            return Ok(Selection::new());
        }
        let cut = SplitByPlane::new(origin, normal).only(scope).execute(mesh)?;
        tags.assign(shell, &cut);
    }

    let inside: Selection = tags
        .select(shell)
        .iter()
        .filter(|v| mesh.point(*v).is_ok_and(|p| bx.contains(&p, INSIDE_TOLERANCE)))
        .collect();
    if inside.is_empty() {
        return Ok(inside);
    }
    let (origin, normal) = bx.plane();
    Shrinkwrap::new(WrapTarget::Plane { origin, normal }, WrapMode::Nearest)
        .restricted_to(inside.clone())
        .execute(mesh)?;
    // Only short edges collapse, so flattening a steep patch cannot pinch
    // the sheet into edges with three faces.
    let merged = Weld::new(weld)
        .restricted_to(inside.clone())
        .along_edges()
        .execute(mesh)?;
    tags.mirror(&merged);
    tags.prune(mesh);

    let mut moved = inside;
    moved.retain_existing(mesh);
    Ok(moved)
}

/// Applies a boolean to a scene object, re-deriving its tags by position.
///
/// An open result goes through one repair pass, skipped in strict mode;
/// whatever is still open afterwards is fatal.
fn apply_boolean(
    object: &mut SceneObject,
    op: BooleanOp,
    tool: &Mesh,
    solver: Solver,
    params: &CaseParams,
    context: &str,
) -> Result<()> {
    let snapshot = object.tags.snapshot(&object.mesh);
    let mut result = Boolean::new(op).solver(solver).execute(&object.mesh, tool)?;

    let mut report = ManifoldReport::of(&result);
    if !report.is_closed() && !params.carving.strict_manifold {
        let edits = HealMesh::new(REPAIR_TOLERANCE).execute(&mut result)?;
        debug!(context, edits, "repaired boolean result");
        report = ManifoldReport::of(&result);
    }
    if !report.is_closed() {
        return Err(TopologyError::OpenResult {
            context: context.to_string(),
            boundary: report.boundary_edges,
            non_manifold: report.non_manifold_edges,
            inconsistent: report.inconsistent_edges,
        }
        .into());
    }

    object.tags.reassert_by_position(&result, &snapshot, MERGE_DISTANCE);
    object.mesh = result;
    info!(
        context,
        op = ?op,
        ?solver,
        tool_faces = tool.face_count(),
        faces = object.mesh.face_count(),
        "applied boolean"
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::case::placement::PlaceKeys;
    use crate::case::plate::BuildBody;
    use crate::case::solid::AssembleSolid;
    use crate::case::walls::BuildWalls;
    use crate::error::CaseError;
    use crate::operations::creation::{MakeBox, MakeGrid};
    use crate::operations::query::SurfaceIndex;
    use approx::assert_relative_eq;

    /// Parity of the upward crossings from `p`.
    fn solid_at(index: &SurfaceIndex, p: Point3) -> bool {
        let mut crossings = 0;
        let mut from = p;
        while let Some(hit) = index.ray(&from, &Vector3::z()) {
            crossings += 1;
            from = hit.point + Vector3::z() * 1e-6;
        }
        crossings % 2 == 1
    }

    #[test]
    fn steps_run_in_declared_order() {
        let mut sorted = CarvingStep::ALL.to_vec();
        sorted.sort();
        assert_eq!(sorted, CarvingStep::ALL.to_vec());
        assert_eq!(CarvingStep::ConnectorPort.to_string(), "connector port");
    }

    #[test]
    fn conform_region_flattens_the_inside_only() {
        let mut mesh = MakeGrid::new(10, 10, 1.0, 1.0).execute().unwrap().mesh;
        for v in mesh.vertex_ids() {
            let p = mesh.point(v).unwrap();
            mesh.set_point(v, Point3::new(p.x, p.y, 0.2 * p.x)).unwrap();
        }
        let mut tags = RegionTracker::new();
        tags.set(Tag::Outer, Selection::all(&mesh));
        let bx = ConformBox {
            frame: crate::math::frame::translation(Vector3::new(5.0, -5.0, 0.0)),
            half_x: 2.5,
            half_y: 2.5,
            z_min: -10.0,
            z_max: 10.0,
            plane_z: 0.5,
        };
        let moved = conform_region(&mut mesh, &mut tags, Tag::Outer, &bx, 0.01).unwrap();
        assert!(!moved.is_empty());
        for v in moved.iter() {
            assert!((mesh.point(v).unwrap().z - 0.5).abs() < 1e-9);
        }
        let far = mesh
            .vertices()
            .find(|(_, p)| p.x < 1e-9 && p.y > -1e-9)
            .map(|(v, _)| v)
            .unwrap();
        assert!(mesh.point(far).unwrap().z.abs() < 1e-9);
        assert!(EdgeMap::build(&mesh).non_manifold_edges().is_empty());
    }

    #[test]
    fn conform_region_keeps_a_folded_sheet_manifold() {
        // Rows 4..6 fold back underneath rows 2..0, so flattening stacks
        // vertices that share no edge.
        let grid = MakeGrid::new(4, 6, 1.0, 1.0).execute().unwrap();
        let mut mesh = grid.mesh.clone();
        for v in mesh.vertex_ids() {
            let (i, j) = grid.position_of(v).unwrap();
            let (y, z) = match j {
                0..=2 => (-(j as f64), 0.0),
                3 => (-3.0, -0.15),
                _ => (-((6 - j) as f64), -0.3),
            };
            mesh.set_point(v, Point3::new(i as f64, y, z)).unwrap();
        }
        let vertices = mesh.vertex_count();
        let mut tags = RegionTracker::new();
        tags.set(Tag::Inner, Selection::all(&mesh));
        let bx = ConformBox {
            frame: crate::math::frame::translation(Vector3::new(2.0, -1.5, 0.0)),
            half_x: 5.0,
            half_y: 5.0,
            z_min: -1.0,
            z_max: 1.0,
            plane_z: 0.5,
        };
        let moved = conform_region(&mut mesh, &mut tags, Tag::Inner, &bx, 0.05).unwrap();
        assert_eq!(moved.len(), vertices);
        assert_eq!(mesh.vertex_count(), vertices);
        assert!(EdgeMap::build(&mesh).non_manifold_edges().is_empty());
    }

    #[test]
    fn conform_region_ignores_other_sheets() {
        let mut mesh = MakeGrid::new(4, 4, 1.0, 1.0).execute().unwrap().mesh;
        let mut tags = RegionTracker::new();
        tags.set(Tag::Inner, Selection::all(&mesh));
        tags.create(Tag::Outer);
        let bx = ConformBox {
            frame: crate::math::frame::translation(Vector3::new(2.0, -2.0, 0.0)),
            half_x: 1.5,
            half_y: 1.5,
            z_min: -1.0,
            z_max: 1.0,
            plane_z: 0.5,
        };
        let moved = conform_region(&mut mesh, &mut tags, Tag::Outer, &bx, 0.01).unwrap();
        assert!(moved.is_empty());
        assert!(mesh.vertices().all(|(_, p)| p.z.abs() < 1e-12));
    }

    #[test]
    fn open_results_are_fatal_with_or_without_repair() {
        let cube = |x: f64| {
            MakeBox::new(Point3::new(x, 0.0, 0.0), Point3::new(x + 2.0, 2.0, 2.0))
                .execute()
                .unwrap()
        };
        for strict in [false, true] {
            let mut params = CaseParams::default();
            params.carving.strict_manifold = strict;
            let mut object = SceneObject::new(cube(0.0));
            apply_boolean(&mut object, BooleanOp::Union, &cube(1.0), Solver::Fast, &params, "test")
                .unwrap();
            assert!(ManifoldReport::of(&object.mesh).is_closed());
            assert_relative_eq!(object.mesh.signed_volume(), 12.0, epsilon = 1e-9);

            let sheet = MakeGrid::new(2, 2, 1.0, 1.0).execute().unwrap().mesh;
            let mut open = SceneObject::new(sheet.clone());
            let err = apply_boolean(&mut open, BooleanOp::Union, &cube(5.0), Solver::Exact, &params, "sheet")
                .unwrap_err();
            assert!(matches!(
                err,
                CaseError::Topology(TopologyError::OpenResult { boundary, .. }) if boundary > 0
            ));
            assert_eq!(open.mesh.face_count(), sheet.face_count());
        }
    }

    #[test]
    fn holes_and_supports_use_the_exact_solver() {
        let exact: Vec<CarvingStep> = CarvingStep::ALL
            .into_iter()
            .filter(|s| s.solver() == Solver::Exact)
            .collect();
        assert_eq!(exact, vec![CarvingStep::SwitchHoles, CarvingStep::Supports]);
        assert_eq!(CarvingStep::Magnets.solver(), Solver::Fast);
        assert_eq!(CarvingStep::ConnectorPort.solver(), Solver::Fast);
    }

    #[test]
    fn magnet_step_leaves_six_cavities_and_six_ribs() {
        let mut params = CaseParams::default();
        params.body.subdivisions = 0;
        let layout = PlaceKeys::new(&params).execute().unwrap();
        let body = BuildBody::new(&params, &layout).execute().unwrap();
        let walls = BuildWalls::new(&params).execute(body).unwrap();
        let mut scene = Scene::from_solid(AssembleSolid::new(&params).execute(walls).unwrap());
        CarveCase::new(&params, &layout)
            .until(CarvingStep::ConnectorPort)
            .execute(&mut scene)
            .unwrap();
        let carve = CarveCase::new(&params, &layout);
        let queued = scene.bottom_queue.len();

        let wells = carve
            .magnet_wells(&scene.require(ObjectKey::Case).unwrap().mesh)
            .unwrap();
        assert_eq!(carve.magnets(&mut scene).unwrap(), 6);
        assert_eq!(wells.len(), 6);
        assert_eq!(scene.bottom_queue.len(), queued + 12);

        let case = &scene.require(ObjectKey::Case).unwrap().mesh;
        assert!(ManifoldReport::of(case).is_closed());
        let index = SurfaceIndex::build(case).unwrap();
        let r = params.magnet.diameter / 2.0;
        let h = params.magnet.height;
        for tools in &wells {
            let n = tools.normal;
            let t = n.cross(&Vector3::z());
            // Off any triangulation diagonal through the bore axis.
            let at = |radial: f64, z: f64| {
                let p = tools.center + n * radial + t * 0.0123;
                Point3::new(p.x + 0.0071, p.y, z)
            };
            assert!(!solid_at(&index, at(0.0, h / 2.0)), "bore at {:?}", tools.center);
            assert!(solid_at(&index, at(0.0, h + 0.9)), "cap at {:?}", tools.center);
            assert!(solid_at(&index, at(-(r + 0.9), h / 2.0)), "boss at {:?}", tools.center);
            assert!(solid_at(&index, at(r + 0.2, h / 2.0)), "rib at {:?}", tools.center);
        }

        // The outer column wells face each other across the case.
        let left = wells.iter().filter(|w| w.normal.x > 0.99).count();
        let right = wells.iter().filter(|w| w.normal.x < -0.99).count();
        assert_eq!((left, right), (2, 1));
        // Every pocket keeps all five ribs whatever its heading.
        let volumes: Vec<f64> = wells.iter().map(|w| w.pocket.signed_volume()).collect();
        for v in &volumes {
            assert_relative_eq!(*v, volumes[0], epsilon = 1.0);
        }
    }

    #[test]
    fn disabled_features_are_skipped() {
        let mut params = CaseParams::default();
        params.features.switch_supports = false;
        params.features.connector_port = false;
        params.features.magnets = false;
        let layout = PlaceKeys::new(&params).execute().unwrap();
        let carve = CarveCase::new(&params, &layout);
        assert!(!carve.enabled(CarvingStep::Magnets));
        assert!(carve.enabled(CarvingStep::SwitchHoles));
        let mut scene = Scene::new();
        let summary = CarveCase::new(&params, &layout)
            .until(CarvingStep::Magnets)
            .execute(&mut Scene::new());
        // The first enabled step needs a case.
        assert!(summary.is_err());
        let err = CarveCase::new(&params, &layout).execute(&mut scene).unwrap_err();
        assert!(err.to_string().contains("key wells"));
    }
}
