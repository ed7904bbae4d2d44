mod bsp;
mod engine;
mod polygon;

use tracing::instrument;

use crate::error::Result;
use crate::mesh::Mesh;

/// The type of boolean operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BooleanOp {
    Union,
    Difference,
    Intersect,
}

impl BooleanOp {
    /// Whether a point is inside the result, given whether it is inside
    /// each operand.
    #[must_use]
    pub fn apply(self, in_a: bool, in_b: bool) -> bool {
        match self {
            BooleanOp::Union => in_a || in_b,
            BooleanOp::Difference => in_a && !in_b,
            BooleanOp::Intersect => in_a && in_b,
        }
    }
}

/// Solver mode for boolean operations.
///
/// Both modes weld coincident vertices and splice T-junctions. `Exact`
/// additionally removes sliver faces, closes cracks narrower than the weld
/// distance and re-orients the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Solver {
    #[default]
    Fast,
    Exact,
}

/// Computes a boolean operation between two closed meshes.
pub struct Boolean {
    op: BooleanOp,
    solver: Solver,
}

impl Boolean {
    /// Creates a new `Boolean` operation using the fast solver.
    #[must_use]
    pub fn new(op: BooleanOp) -> Self {
        Self {
            op,
            solver: Solver::Fast,
        }
    }

    #[must_use]
    pub fn solver(mut self, solver: Solver) -> Self {
        self.solver = solver;
        self
    }

    /// Executes the operation, returning the resulting mesh.
    ///
    /// # Errors
    ///
    /// Returns `OperationError::EmptyResult` if nothing is left, or an error
    /// if a face cannot be rebuilt.
    #[instrument(skip_all, fields(op = ?self.op, solver = ?self.solver))]
    pub fn execute(&self, a: &Mesh, b: &Mesh) -> Result<Mesh> {
        engine::boolean_execute(a, b, self.op, self.solver)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::math::{Isometry3, Point3, Vector3};
    use crate::mesh::loops::connected_components;
    use crate::mesh::EdgeMap;
    use crate::operations::creation::{MakeBox, MakeCylinder, MakeGrid};
    use crate::operations::modification::{OrientFaces, Thicken};
    use approx::assert_relative_eq;

    fn cube(min: [f64; 3], max: [f64; 3]) -> Mesh {
        MakeBox::new(Point3::from(min), Point3::from(max))
            .execute()
            .unwrap()
    }

    #[test]
    fn difference_of_overlapping_cubes() {
        let a = cube([0.0, 0.0, 0.0], [2.0, 2.0, 2.0]);
        let b = cube([1.0, 1.0, 1.0], [3.0, 3.0, 3.0]);
        let r = Boolean::new(BooleanOp::Difference)
            .solver(Solver::Exact)
            .execute(&a, &b)
            .unwrap();
        assert_relative_eq!(r.signed_volume(), 7.0, epsilon = 1e-9);
        assert!(EdgeMap::build(&r).is_closed_manifold());
    }

    #[test]
    fn union_of_overlapping_cubes() {
        let a = cube([0.0, 0.0, 0.0], [2.0, 2.0, 2.0]);
        let b = cube([1.0, 1.0, 1.0], [3.0, 3.0, 3.0]);
        let r = Boolean::new(BooleanOp::Union)
            .solver(Solver::Exact)
            .execute(&a, &b)
            .unwrap();
        assert_relative_eq!(r.signed_volume(), 15.0, epsilon = 1e-9);
        assert!(EdgeMap::build(&r).is_closed_manifold());
    }

    #[test]
    fn intersection_of_overlapping_cubes() {
        let a = cube([0.0, 0.0, 0.0], [2.0, 2.0, 2.0]);
        let b = cube([1.0, 1.0, 1.0], [3.0, 3.0, 3.0]);
        let r = Boolean::new(BooleanOp::Intersect).execute(&a, &b).unwrap();
        assert_relative_eq!(r.signed_volume(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn through_hole_keeps_one_shell() {
        let slab = cube([-5.0, -5.0, 0.0], [5.0, 5.0, 2.0]);
        let hole = MakeCylinder::new(Point3::new(0.0, 0.0, -1.0), 1.5, Vector3::z(), 4.0, 24)
            .execute()
            .unwrap();
        let r = Boolean::new(BooleanOp::Difference)
            .solver(Solver::Exact)
            .execute(&slab, &hole)
            .unwrap();
        assert!(r.signed_volume() < 200.0);
        assert!(r.signed_volume() > 180.0);
        assert_eq!(connected_components(&r).len(), 1);
    }

    #[test]
    fn multi_component_operand_is_applied_piecewise() {
        let slab = cube([0.0, 0.0, 0.0], [10.0, 2.0, 2.0]);
        let mut tools = cube([1.0, -1.0, 1.0], [2.0, 3.0, 3.0]);
        tools.merge(&cube([7.0, -1.0, 1.0], [8.0, 3.0, 3.0])).unwrap();
        let r = Boolean::new(BooleanOp::Difference)
            .solver(Solver::Exact)
            .execute(&slab, &tools)
            .unwrap();
        assert_relative_eq!(r.signed_volume(), 40.0 - 4.0, epsilon = 1e-9);
    }

    #[test]
    fn disjoint_difference_is_identity() {
        let a = cube([0.0, 0.0, 0.0], [1.0, 1.0, 1.0]);
        let b = cube([5.0, 5.0, 5.0], [6.0, 6.0, 6.0]);
        let r = Boolean::new(BooleanOp::Difference).execute(&a, &b).unwrap();
        assert_relative_eq!(r.signed_volume(), 1.0, epsilon = 1e-12);
        assert!(Boolean::new(BooleanOp::Intersect).execute(&a, &b).is_err());
    }

    #[test]
    fn union_over_shared_faces_keeps_one_wall() {
        let a = cube([0.0, 0.0, 0.0], [2.0, 2.0, 2.0]);
        let b = cube([1.0, 0.0, 0.0], [3.0, 2.0, 2.0]);
        let r = Boolean::new(BooleanOp::Union)
            .solver(Solver::Exact)
            .execute(&a, &b)
            .unwrap();
        assert_relative_eq!(r.signed_volume(), 12.0, epsilon = 1e-9);
        assert!(EdgeMap::build(&r).is_closed_manifold());
    }

    #[test]
    fn flush_pocket_opens_the_top() {
        let block = cube([0.0, 0.0, 0.0], [4.0, 4.0, 2.0]);
        let pocket = cube([1.0, 1.0, 1.0], [3.0, 3.0, 2.0]);
        let r = Boolean::new(BooleanOp::Difference)
            .solver(Solver::Exact)
            .execute(&block, &pocket)
            .unwrap();
        assert_relative_eq!(r.signed_volume(), 32.0 - 4.0, epsilon = 1e-9);
        assert!(EdgeMap::build(&r).is_closed_manifold());
    }

    #[test]
    fn hole_through_a_thin_shell_stays_closed() {
        // A cup open at the bottom, like the case over its cavity.
        let outer = cube([0.0, 0.0, 0.0], [10.0, 10.0, 3.0]);
        let cavity = cube([1.0, 1.0, -1.0], [9.0, 9.0, 2.0]);
        let cup = Boolean::new(BooleanOp::Difference)
            .solver(Solver::Exact)
            .execute(&outer, &cavity)
            .unwrap();
        assert!(EdgeMap::build(&cup).is_closed_manifold());
        assert_relative_eq!(cup.signed_volume(), 300.0 - 128.0, epsilon = 1e-9);

        let mut holes = cube([4.0, 4.0, 1.0], [6.0, 6.0, 4.0]);
        holes.merge(&cube([0.5, 4.0, 0.5], [1.5, 6.0, 1.5])).unwrap();
        let r = Boolean::new(BooleanOp::Difference)
            .solver(Solver::Fast)
            .execute(&cup, &holes)
            .unwrap();
        assert!(EdgeMap::build(&r).is_closed_manifold());
        assert_relative_eq!(r.signed_volume(), 172.0 - 4.0 - 1.0, epsilon = 1e-9);
        assert_eq!(connected_components(&r).len(), 1);
    }

    #[test]
    fn tilted_hole_through_a_curved_sheet_stays_closed() {
        // A dome-shaped slab cut by a rotated box, the shape of a switch hole
        // in a key well.
        let mut slab = MakeGrid::new(12, 12, 1.0, 1.0)
            .execute()
            .unwrap()
            .mesh;
        for v in slab.vertex_ids() {
            let p = slab.point(v).unwrap();
            let z = 0.02 * ((p.x - 6.0).powi(2) + (p.y + 6.0).powi(2));
            slab.set_point(v, Point3::new(p.x, p.y, z)).unwrap();
        }
        let mut solid = slab;
        Thicken::new(1.5).execute(&mut solid).unwrap();
        OrientFaces::new().execute(&mut solid).unwrap();
        assert!(EdgeMap::build(&solid).is_closed_manifold());
        let volume = solid.signed_volume();

        let mut hole = cube([-1.0, -1.0, -3.0], [1.0, 1.0, 3.0]);
        hole.transform(&Isometry3::new(
            Vector3::new(5.3, -6.7, 0.0),
            Vector3::new(0.2, -0.1, 0.3),
        ));
        let r = Boolean::new(BooleanOp::Difference)
            .solver(Solver::Exact)
            .execute(&solid, &hole)
            .unwrap();
        let edges = EdgeMap::build(&r);
        assert!(edges.is_closed_manifold());
        assert!(r.signed_volume() < volume - 4.0);
    }
}

