use crate::math::polygon_2d::newell_normal;
use crate::math::{Point3, Vector3};

/// Classification tolerance for points against a splitting plane.
pub(crate) const PLANE_EPSILON: f64 = 1e-6;

/// An oriented plane `normal · p = w`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Plane {
    pub normal: Vector3,
    pub w: f64,
}

/// Where a polygon lies relative to a plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Classification {
    CoplanarFront,
    CoplanarBack,
    Front,
    Back,
    Spanning,
}

const COPLANAR: u8 = 0;
const FRONT: u8 = 1;
const BACK: u8 = 2;
const SPANNING: u8 = 3;

impl Plane {
    pub fn from_points(points: &[Point3]) -> Option<Self> {
        let n = newell_normal(points);
        let len = n.norm();
        if len < 1e-12 {
            return None;
        }
        let normal = n / len;
        #[allow(clippy::cast_precision_loss)]
        let centroid = points.iter().fold(Vector3::zeros(), |acc, p| acc + p.coords) / points.len() as f64;
        Some(Self {
            normal,
            w: normal.dot(&centroid),
        })
    }

    pub fn flip(&mut self) {
        self.normal = -self.normal;
        self.w = -self.w;
    }

    pub fn distance(&self, p: &Point3) -> f64 {
        self.normal.dot(&p.coords) - self.w
    }

    fn side_of(&self, p: &Point3) -> u8 {
        let t = self.distance(p);
        if t < -PLANE_EPSILON {
            BACK
        } else if t > PLANE_EPSILON {
            FRONT
        } else {
            COPLANAR
        }
    }

    pub fn classify(&self, polygon: &Polygon) -> Classification {
        let kind = polygon
            .vertices
            .iter()
            .fold(COPLANAR, |acc, p| acc | self.side_of(p));
        match kind {
            COPLANAR if self.normal.dot(&polygon.plane.normal) > 0.0 => Classification::CoplanarFront,
            COPLANAR => Classification::CoplanarBack,
            FRONT => Classification::Front,
            BACK => Classification::Back,
            _ => Classification::Spanning,
        }
    }

    /// Splits `polygon` by this plane, pushing each piece to the matching list.
    /// Pieces keep the plane of the polygon they came from.
    pub fn split_polygon(
        &self,
        polygon: Polygon,
        coplanar_front: &mut Vec<Polygon>,
        coplanar_back: &mut Vec<Polygon>,
        front: &mut Vec<Polygon>,
        back: &mut Vec<Polygon>,
    ) {
        match self.classify(&polygon) {
            Classification::CoplanarFront => coplanar_front.push(polygon),
            Classification::CoplanarBack => coplanar_back.push(polygon),
            Classification::Front => front.push(polygon),
            Classification::Back => back.push(polygon),
            Classification::Spanning => {
                let n = polygon.vertices.len();
                let mut f = Vec::with_capacity(n + 1);
                let mut b = Vec::with_capacity(n + 1);
                for i in 0..n {
                    let vi = polygon.vertices[i];
                    let vj = polygon.vertices[(i + 1) % n];
                    let ti = self.side_of(&vi);
                    let tj = self.side_of(&vj);
                    if ti != BACK {
                        f.push(vi);
                    }
                    if ti != FRONT {
                        b.push(vi);
                    }
                    if ti | tj == SPANNING {
                        let t = (self.w - self.normal.dot(&vi.coords)) / self.normal.dot(&(vj - vi));
                        let v = vi + (vj - vi) * t;
                        f.push(v);
                        b.push(v);
                    }
                }
                if f.len() >= 3 {
                    front.push(Polygon {
                        vertices: f,
                        plane: polygon.plane,
                    });
                }
                if b.len() >= 3 {
                    back.push(Polygon {
                        vertices: b,
                        plane: polygon.plane,
                    });
                }
            }
        }
    }
}

/// A convex planar polygon used by the BSP engine.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Polygon {
    pub vertices: Vec<Point3>,
    pub plane: Plane,
}

impl Polygon {
    /// Builds a polygon, or `None` when the loop has no area.
    pub fn new(vertices: Vec<Point3>) -> Option<Self> {
        if vertices.len() < 3 {
            return None;
        }
        let plane = Plane::from_points(&vertices)?;
        Some(Self { vertices, plane })
    }

    pub fn flip(&mut self) {
        self.vertices.reverse();
        self.plane.flip();
    }

    pub fn bounds(&self) -> crate::math::Aabb {
        let mut aabb = crate::math::Aabb::new(self.vertices[0], self.vertices[0]);
        for p in &self.vertices[1..] {
            aabb.include(p);
        }
        aabb
    }
}
