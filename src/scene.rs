//! Scene description: meshes uploaded as geometry records, their placements and the acceleration index over them.

pub use acceleration::{Instance, InstanceId, SceneAccelerationIndex, SceneSnapshot, SceneState};
pub use geometry::{GeometryRecord, Mesh, ObjectDescription, VertexInput};
pub use material::Material;
pub use transform::Transform;

pub mod acceleration;
pub mod geometry;
pub mod material;
pub mod transform;
