mod closest_point;
mod manifold;
mod ray_cast;
mod surface;

pub use closest_point::ClosestPoint;
pub use manifold::ManifoldReport;
pub use ray_cast::RayCast;
pub use surface::{SurfaceIndex, SurfacePoint};
