//! The keyboard case: key placement, body, walls, solid and carving.

pub mod bottom;
pub mod carving;
pub mod params;
pub mod pipeline;
pub mod placement;
pub mod plate;
pub mod scene;
pub mod solid;
pub mod tags;
pub mod tools;
pub mod walls;

pub use carving::{CarveCase, CarveSummary, CarvingStep};
pub use params::CaseParams;
pub use pipeline::{Generate, Generated};
pub use placement::{KeyId, KeyPlacement, Layout, PlaceKeys};
pub use scene::{ObjectKey, Scene};
pub use tags::Tag;
