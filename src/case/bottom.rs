//! Bottom plate generation.

use tracing::{info, instrument};

use crate::error::{Result, TopologyError};
use crate::math::polygon_2d::{offset_polygon, signed_area};
use crate::math::{Point2, Point3};
use crate::mesh::{Mesh, Selection, VertexId};
use crate::operations::modification::ExtrudeLoop;
use crate::operations::projection::{Shrinkwrap, WrapMode, WrapTarget};
use crate::operations::query::ManifoldReport;
use crate::tessellation::CapLoop;

use super::params::CaseParams;

/// Height of the slab top below the case floor top.
pub const SLAB_TOP: f64 = -0.5;

/// Gap kept between the slab rim and the inner wall.
const RIM_GAP: f64 = 0.2;

/// Builds the slab that closes the case from below.
pub struct BuildBottomPlate<'a> {
    params: &'a CaseParams,
}

impl<'a> BuildBottomPlate<'a> {
    #[must_use]
    pub fn new(params: &'a CaseParams) -> Self {
        Self { params }
    }

    /// Executes the build from the inner floor outline of the case.
    ///
    /// The outline is inset by the bottom clearance, capped, and extruded
    /// down to the floor plane; the top rim is then pulled inside
    /// `inner_reference` wherever the wall leans in.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::Degenerate` for a degenerate outline, a
    /// tessellation error if a cap fails, or `TopologyError` if the slab is
    /// not closed.
    #[instrument(skip_all)]
    pub fn execute(&self, outline: &[Point2], inner_reference: &Mesh) -> Result<Mesh> {
        let mut inset = offset_polygon(outline, -self.params.bottom.clearance)?;
        if signed_area(&inset) < 0.0 {
            inset.reverse();
        }

        let mut mesh = Mesh::new();
        let top: Vec<VertexId> = inset
            .iter()
            .map(|p| mesh.add_vertex(Point3::new(p.x, p.y, SLAB_TOP)))
            .collect();
        let mut reversed = top.clone();
        reversed.reverse();
        CapLoop::new(reversed).execute(&mut mesh)?;
        let bottom = ExtrudeLoop::new(self.params.floor_z()).execute(&mut mesh, &top)?;
        CapLoop::new(bottom).execute(&mut mesh)?;

        if inner_reference.face_count() > 0 {
            let mut wall = inner_reference.clone();
            wall.flip_all();
            let rim: Selection = top.iter().copied().collect();
            Shrinkwrap::new(WrapTarget::Mesh(&wall), WrapMode::TargetInside)
                .offset(-RIM_GAP)
                .restricted_to(rim)
                .execute(&mut mesh)?;
            for v in &top {
                let mut p = mesh.point(*v)?;
                p.z = SLAB_TOP;
                mesh.set_point(*v, p)?;
            }
        }

        let report = ManifoldReport::of(&mesh);
        if !report.is_closed() {
            return Err(TopologyError::NonManifold {
                context: "bottom plate".into(),
                count: report.open_edges() + report.inconsistent_edges,
            }
            .into());
        }
        info!(
            outline = inset.len(),
            faces = mesh.face_count(),
            "built bottom plate"
        );
        Ok(mesh)
    }
}
