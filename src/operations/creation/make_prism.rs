use crate::error::{OperationError, Result};
use crate::math::polygon_2d::signed_area;
use crate::math::{Point2, Point3, TOLERANCE};
use crate::mesh::Mesh;

/// Extrudes a closed 2D profile (in the XY plane) between two heights.
///
/// The caps are single n-gons; the profile may be given in either winding.
pub struct MakePrism {
    profile: Vec<Point2>,
    z_min: f64,
    z_max: f64,
}

impl MakePrism {
    /// Creates a new `MakePrism` operation.
    #[must_use]
    pub fn new(profile: Vec<Point2>, z_min: f64, z_max: f64) -> Self {
        Self {
            profile,
            z_min: z_min.min(z_max),
            z_max: z_min.max(z_max),
        }
    }

    /// Executes the operation, returning a closed outward-facing prism.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile is degenerate or the height is zero.
    pub fn execute(&self) -> Result<Mesh> {
        if self.profile.len() < 3 || signed_area(&self.profile).abs() < TOLERANCE {
            return Err(OperationError::InvalidInput("prism profile is degenerate".into()).into());
        }
        if self.z_max - self.z_min < TOLERANCE {
            return Err(OperationError::InvalidInput("prism height must be positive".into()).into());
        }

        let mut profile = self.profile.clone();
        if signed_area(&profile) < 0.0 {
            profile.reverse();
        }

        let mut mesh = Mesh::new();
        let bottom: Vec<_> = profile
            .iter()
            .map(|p| mesh.add_vertex(Point3::new(p.x, p.y, self.z_min)))
            .collect();
        let top: Vec<_> = profile
            .iter()
            .map(|p| mesh.add_vertex(Point3::new(p.x, p.y, self.z_max)))
            .collect();

        let reversed: Vec<_> = bottom.iter().rev().copied().collect();
        mesh.add_face(&reversed)?;
        mesh.add_face(&top)?;
        let n = profile.len();
        for i in 0..n {
            let j = (i + 1) % n;
            mesh.add_face(&[bottom[i], bottom[j], top[j], top[i]])?;
        }
        Ok(mesh)
    }
}

/// Regular polygon approximating a circle, counter-clockwise, first vertex on +X.
#[must_use]
pub fn circle_profile(center: Point2, radius: f64, segments: usize) -> Vec<Point2> {
    #[allow(clippy::cast_precision_loss)]
    let step = std::f64::consts::TAU / segments as f64;
    (0..segments)
        .map(|i| {
            #[allow(clippy::cast_precision_loss)]
            let a = step * i as f64;
            Point2::new(center.x + radius * a.cos(), center.y + radius * a.sin())
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mesh::EdgeMap;
    use approx::assert_relative_eq;

    #[test]
    fn triangle_prism_volume() {
        let profile = vec![
            Point2::new(0.0, 0.0),
            Point2::new(0.0, 2.0),
            Point2::new(2.0, 0.0),
        ];
        let mesh = MakePrism::new(profile, 1.0, -1.0).execute().unwrap();
        assert_eq!(mesh.face_count(), 5);
        assert_relative_eq!(mesh.signed_volume(), 4.0, epsilon = 1e-12);
        assert!(EdgeMap::build(&mesh).is_closed_manifold());
    }

    #[test]
    fn circle_profile_is_ccw() {
        let c = circle_profile(Point2::origin(), 1.0, 16);
        assert_eq!(c.len(), 16);
        assert!(signed_area(&c) > 0.0);
        assert_relative_eq!(c[0], Point2::new(1.0, 0.0));
    }
}
