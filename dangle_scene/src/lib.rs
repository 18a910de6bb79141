mod arena;
mod attr;
mod error;
mod graph;
mod memory;
mod node;
mod transform;

pub use arena::NodeArena;
pub use attr::*;
pub use error::{SceneError, SceneResult};
pub use graph::{SceneGraph, SplineHandleResult};
pub use memory::MemoryScene;
pub use node::*;
pub use transform::Transform3D;

pub use dangle_ids::NodeID;
