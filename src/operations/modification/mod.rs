mod bridge;
mod extrude;
mod knife;
mod offset;
mod orient;
mod repair;
mod smooth;
mod split;
mod subdivide;
mod thicken;
mod triangulate;
mod weld;

pub use bridge::{align_loop, BridgeLoops};
pub use extrude::ExtrudeLoop;
pub use knife::SplitByPlane;
pub use offset::{LoopFrame, OffsetLoop};
pub use orient::OrientFaces;
pub use repair::{HealMesh, RemoveDegenerate, RepairTJunctions};
pub use smooth::{Relax, Smooth};
pub use split::{Part, SplitByConnectivity};
pub use subdivide::{CatmullClark, Subdivided};
pub use thicken::{inner_vertices, Thicken};
pub use triangulate::{Triangulate, TrisToQuads};
pub use weld::Weld;
