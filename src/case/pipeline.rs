//! End-to-end generation: keys to carved case and bottom plate.

use tracing::{info, instrument};

use crate::error::{Result, SelectionError};
use crate::mesh::Mesh;

use super::carving::{CarveCase, CarveSummary, CarvingStep};
use super::params::CaseParams;
use super::placement::{Layout, PlaceKeys};
use super::plate::BuildBody;
use super::scene::{ObjectKey, Scene};
use super::solid::AssembleSolid;
use super::walls::BuildWalls;

/// The output of one generation run.
#[derive(Debug, Clone)]
pub struct Generated {
    pub case: Mesh,
    /// Present once the bottom plate step has run.
    pub bottom_plate: Option<Mesh>,
    pub layout: Layout,
    pub summary: CarveSummary,
}

/// Runs every stage of case generation.
pub struct Generate<'a> {
    params: &'a CaseParams,
    until: CarvingStep,
}

impl<'a> Generate<'a> {
    #[must_use]
    pub fn new(params: &'a CaseParams) -> Self {
        Self {
            params,
            until: CarvingStep::BottomPlate,
        }
    }

    /// Stops carving after `step`.
    #[must_use]
    pub fn until(mut self, step: CarvingStep) -> Self {
        self.until = step;
        self
    }

    /// Executes the pipeline.
    ///
    /// # Errors
    ///
    /// Returns the first error of any stage; carving errors carry the name
    /// of the step that failed.
    #[instrument(skip_all, fields(until = %self.until))]
    pub fn execute(&self) -> Result<Generated> {
        let layout = PlaceKeys::new(self.params).execute()?;
        let body = BuildBody::new(self.params, &layout).execute()?;
        let walls = BuildWalls::new(self.params).execute(body)?;
        let solid = AssembleSolid::new(self.params).execute(walls)?;

        let mut scene = Scene::from_solid(solid);
        let summary = CarveCase::new(self.params, &layout)
            .until(self.until)
            .execute(&mut scene)?;

        let case = scene
            .take(ObjectKey::Case)
            .map(|object| object.mesh)
            .ok_or_else(|| SelectionError::MissingObject(ObjectKey::Case.to_string()))?;
        let bottom_plate = scene.take(ObjectKey::BottomPlate).map(|object| object.mesh);
        info!(
            keys = layout.len(),
            case_faces = case.face_count(),
            bottom_plate = bottom_plate.is_some(),
            "generated case"
        );
        Ok(Generated {
            case,
            bottom_plate,
            layout,
            summary,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::case::params::THUMB_KEYS;
    use crate::mesh::loops::boundary_loops;
    use crate::mesh::EdgeMap;
    use crate::operations::query::ManifoldReport;

    fn coarse() -> CaseParams {
        let mut params = CaseParams::default();
        params.body.subdivisions = 0;
        params
    }

    #[test]
    fn full_run_yields_closed_parts() {
        let params = coarse();
        let generated = Generate::new(&params).execute().unwrap();
        assert_eq!(
            generated.layout.len(),
            params.layout.finger_key_count() + THUMB_KEYS
        );
        assert_eq!(generated.summary.completed, CarvingStep::ALL.to_vec());
        assert_eq!(generated.summary.magnets, 6);
        assert!(generated.case.face_count() > 0);
        let case = ManifoldReport::of(&generated.case);
        assert!(case.is_closed(), "case left open: {case:?}");
        assert!(generated.case.signed_volume() > 0.0);
        let plate = generated.bottom_plate.unwrap();
        assert!(ManifoldReport::of(&plate).is_closed());
        assert!(plate.signed_volume() > 0.0);
        assert_eq!(floor_loops(&plate, params.floor_z()), 1);
    }

    /// Boundary loops of the faces lying flat on the floor plane.
    fn floor_loops(mesh: &Mesh, floor_z: f64) -> usize {
        let mut floor = mesh.clone();
        for f in mesh.face_ids() {
            let on_floor = mesh
                .face_vertices(f)
                .unwrap()
                .iter()
                .all(|v| (mesh.point(*v).unwrap().z - floor_z).abs() < 1e-9);
            if !on_floor {
                floor.remove_face(f);
            }
        }
        floor.remove_unused_vertices();
        boundary_loops(&floor).len()
    }

    #[test]
    fn default_parameters_run_every_step() {
        let params = CaseParams::default();
        let generated = Generate::new(&params).execute().unwrap();
        assert_eq!(generated.summary.completed, CarvingStep::ALL.to_vec());
        assert!(ManifoldReport::of(&generated.case).is_closed());
        let plate = generated.bottom_plate.unwrap();
        assert!(ManifoldReport::of(&plate).is_closed());
        assert_eq!(floor_loops(&plate, params.floor_z()), 1);
    }

    #[test]
    fn stopping_early_leaves_no_bottom_plate() {
        let generated = Generate::new(&coarse())
            .until(CarvingStep::KeyWells)
            .execute()
            .unwrap();
        assert!(generated.bottom_plate.is_none());
        assert_eq!(generated.summary.completed, vec![CarvingStep::KeyWells]);
        assert!(EdgeMap::build(&generated.case).non_manifold_edges().is_empty());
    }

    #[test]
    fn generation_is_deterministic() {
        let params = coarse();
        let a = Generate::new(&params).until(CarvingStep::KeyWells).execute().unwrap();
        let b = Generate::new(&params).until(CarvingStep::KeyWells).execute().unwrap();
        let pa: Vec<_> = a.case.vertices().map(|(_, p)| *p).collect();
        let pb: Vec<_> = b.case.vertices().map(|(_, p)| *p).collect();
        assert_eq!(pa, pb);
        assert_eq!(a.case.face_count(), b.case.face_count());
    }

    #[test]
    fn disabled_supports_are_skipped() {
        let mut params = coarse();
        params.features.switch_supports = false;
        let without = Generate::new(&params)
            .until(CarvingStep::Supports)
            .execute()
            .unwrap();
        assert_eq!(without.summary.skipped, vec![CarvingStep::Supports]);

        let holes_only = Generate::new(&coarse())
            .until(CarvingStep::SwitchHoles)
            .execute()
            .unwrap();
        assert_eq!(without.case.face_count(), holes_only.case.face_count());
        assert_eq!(without.case.vertex_count(), holes_only.case.vertex_count());
    }

    #[test]
    fn invalid_parameters_fail_before_geometry() {
        let mut params = coarse();
        params.layout.nrows = 1;
        let err = Generate::new(&params).execute().unwrap_err();
        assert!(err.to_string().contains("layout.nrows"));
    }
}
