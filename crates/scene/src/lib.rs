//! Scene data consumed by the vkframe renderer.
//!
//! This crate is deliberately plain data:
//! - Game objects keyed by id, each with a transform and optional mesh,
//!   material and light
//! - A perspective camera and fly-through controller
//! - Materials and procedurally built meshes

pub mod camera;
pub mod light;
pub mod material;
pub mod mesh;
pub mod scene;
pub mod transform;

pub use camera::{Camera, CameraController};
pub use light::{LightComponent, LightType, PointLight, SpotLight};
pub use material::{Material, MaterialId};
pub use mesh::{MeshData, MeshId};
pub use scene::{GameObject, ObjectId, Scene};
pub use transform::Transform;
