use tracing::debug;

use crate::error::{GeometryError, Result};
use crate::math::{Point3, Vector3, TOLERANCE};
use crate::mesh::{Mesh, Selection};
use crate::operations::query::{SurfaceIndex, SurfacePoint};

/// How a vertex finds its place on the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WrapMode {
    /// Moves each vertex to the nearest point of the target.
    Nearest,
    /// Moves each vertex along `direction` until it meets the target. With
    /// `both`, the opposite direction is tried as well and the closer hit
    /// wins. Vertices whose ray misses stay where they are.
    Project { direction: Vector3, both: bool },
    /// Moves only the vertices lying outside the target onto its surface.
    TargetInside,
}

/// The surface vertices are wrapped onto.
#[derive(Debug, Clone, Copy)]
pub enum WrapTarget<'a> {
    Mesh(&'a Mesh),
    /// An infinite plane; "outside" is the side `normal` points to.
    Plane { origin: Point3, normal: Vector3 },
}

/// Conforming projection of mesh vertices onto a target surface.
///
/// Only vertex positions change, so ids and tags stay valid.
pub struct Shrinkwrap<'a> {
    target: WrapTarget<'a>,
    mode: WrapMode,
    offset: f64,
    selection: Option<Selection>,
}

enum Resolved {
    Index(SurfaceIndex),
    Plane { origin: Point3, normal: Vector3 },
}

impl<'a> Shrinkwrap<'a> {
    /// Creates a new `Shrinkwrap` with zero offset over the whole mesh.
    #[must_use]
    pub fn new(target: WrapTarget<'a>, mode: WrapMode) -> Self {
        Self {
            target,
            mode,
            offset: 0.0,
            selection: None,
        }
    }

    /// Keeps vertices this far off the target, along its normal.
    #[must_use]
    pub fn offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    /// Limits the projection to the given vertices.
    #[must_use]
    pub fn restricted_to(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Executes the projection, returning how many vertices moved.
    ///
    /// # Errors
    ///
    /// Returns `GeometryError::ZeroVector` for a zero plane normal or
    /// projection direction, or an error if a vertex is missing.
    pub fn execute(&self, mesh: &mut Mesh) -> Result<usize> {
        let target = match self.target {
            WrapTarget::Mesh(m) => Resolved::Index(SurfaceIndex::build(m)?),
            WrapTarget::Plane { origin, normal } => {
                let len = normal.norm();
                if len < TOLERANCE {
                    return Err(GeometryError::ZeroVector.into());
                }
                Resolved::Plane {
                    origin,
                    normal: normal / len,
                }
            }
        };
        let mode = match self.mode {
            WrapMode::Project { direction, both } => {
                let len = direction.norm();
                if len < TOLERANCE {
                    return Err(GeometryError::ZeroVector.into());
                }
                WrapMode::Project {
                    direction: direction / len,
                    both,
                }
            }
            other => other,
        };

        let ids = match &self.selection {
            Some(sel) => sel.iter().filter(|v| mesh.contains_vertex(*v)).collect(),
            None => mesh.vertex_ids(),
        };
        let mut moved = 0;
        for v in ids {
            let p = mesh.point(v)?;
            if let Some(q) = self.place(&target, mode, &p) {
                if (q - p).norm() > TOLERANCE {
                    mesh.set_point(v, q)?;
                    moved += 1;
                }
            }
        }
        debug!(moved, mode = ?self.mode, offset = self.offset, "shrinkwrap");
        Ok(moved)
    }

    fn place(&self, target: &Resolved, mode: WrapMode, p: &Point3) -> Option<Point3> {
        let hit = match (target, mode) {
            (Resolved::Plane { origin, normal }, WrapMode::Nearest) => {
                Some((p - normal * normal.dot(&(p - origin)), *normal))
            }
            (Resolved::Plane { origin, normal }, WrapMode::TargetInside) => {
                let d = normal.dot(&(p - origin));
                if d <= self.offset {
                    return None;
                }
                Some((p - normal * d, *normal))
            }
            (Resolved::Plane { origin, normal }, WrapMode::Project { direction, both }) => {
                let denom = normal.dot(&direction);
                if denom.abs() < TOLERANCE {
                    return None;
                }
                let t = normal.dot(&(origin - p)) / denom;
                if t < 0.0 && !both {
                    return None;
                }
                Some((p + direction * t, *normal))
            }
            (Resolved::Index(index), WrapMode::Nearest) => {
                index.closest(p).map(|s| (s.point, s.normal))
            }
            (Resolved::Index(index), WrapMode::TargetInside) => {
                let s = index.closest(p)?;
                if (p - s.point).dot(&s.normal) <= self.offset {
                    return None;
                }
                Some((s.point, s.normal))
            }
            (Resolved::Index(index), WrapMode::Project { direction, both }) => {
                let forward = index.ray(p, &direction);
                let backward = if both { index.ray(p, &-direction) } else { None };
                nearer(forward, backward).map(|s| (s.point, s.normal))
            }
        }?;
        Some(hit.0 + hit.1 * self.offset)
    }
}

fn nearer(a: Option<SurfacePoint>, b: Option<SurfacePoint>) -> Option<SurfacePoint> {
    match (a, b) {
        (Some(x), Some(y)) => Some(if y.distance < x.distance { y } else { x }),
        (x, None) => x,
        (None, y) => y,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::operations::creation::{MakeBox, MakeGrid};
    use approx::assert_relative_eq;

    fn lifted_grid() -> Mesh {
        let mut mesh = MakeGrid::new(2, 2, 1.0, 1.0).execute().unwrap().mesh;
        for v in mesh.vertex_ids() {
            let p = mesh.point(v).unwrap();
            mesh.set_point(v, Point3::new(p.x, p.y, 3.0 + p.x)).unwrap();
        }
        mesh
    }

    #[test]
    fn flattens_onto_plane_with_offset() {
        let mut mesh = lifted_grid();
        let moved = Shrinkwrap::new(
            WrapTarget::Plane {
                origin: Point3::origin(),
                normal: Vector3::z() * 2.0,
            },
            WrapMode::Nearest,
        )
        .offset(0.5)
        .execute(&mut mesh)
        .unwrap();
        assert_eq!(moved, mesh.vertex_count());
        for (_, p) in mesh.vertices() {
            assert_relative_eq!(p.z, 0.5, epsilon = 1e-12);
        }
    }

    #[test]
    fn target_inside_leaves_inner_vertices() {
        let mut mesh = lifted_grid();
        let plane = WrapTarget::Plane {
            origin: Point3::new(0.0, 0.0, 3.5),
            normal: Vector3::z(),
        };
        Shrinkwrap::new(plane, WrapMode::TargetInside)
            .execute(&mut mesh)
            .unwrap();
        for (_, p) in mesh.vertices() {
            assert!(p.z <= 3.5 + 1e-12);
            assert!(p.z >= 3.0 - 1e-12);
        }
    }

    #[test]
    fn directional_projection_onto_box() {
        let target = MakeBox::new(Point3::new(-5.0, -5.0, -2.0), Point3::new(5.0, 5.0, 0.0))
            .execute()
            .unwrap();
        let mut mesh = lifted_grid();
        let first = mesh.vertex_ids()[0];
        let keep = mesh.vertex_ids()[1];
        let before = mesh.point(keep).unwrap();
        Shrinkwrap::new(
            WrapTarget::Mesh(&target),
            WrapMode::Project {
                direction: -Vector3::z(),
                both: false,
            },
        )
        .restricted_to(std::iter::once(first).collect())
        .execute(&mut mesh)
        .unwrap();
        assert_relative_eq!(mesh.point(first).unwrap().z, 0.0, epsilon = 1e-9);
        assert_relative_eq!(mesh.point(keep).unwrap(), before, epsilon = 1e-12);
    }

    #[test]
    fn zero_normal_is_rejected() {
        let mut mesh = lifted_grid();
        let plane = WrapTarget::Plane {
            origin: Point3::origin(),
            normal: Vector3::zeros(),
        };
        assert!(Shrinkwrap::new(plane, WrapMode::Nearest).execute(&mut mesh).is_err());
    }
}
