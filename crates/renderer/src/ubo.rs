//! Uniform buffer and push constant layouts shared with the shaders.
//!
//! All structures are `#[repr(C)]`, `Pod`, and padded by hand so that their
//! Rust layout matches std140 exactly; the size tests below pin that down.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

/// Capacity of each light array in [`LightUbo`].
pub const MAX_LIGHTS: usize = 10;

/// Capacity of the material texture array binding.
pub const MAX_TEXTURES: u32 = 16;

/// Camera and shadow matrices, set 0 binding 0.
///
/// # Memory Layout
///
/// - Offset 0: projection (64 bytes)
/// - Offset 64: view (64 bytes)
/// - Offset 128: inverse view (64 bytes)
/// - Offset 192: light view-projection for the shadow pass (64 bytes)
/// - Offset 256: ambient light, rgb color and w intensity (16 bytes)
/// - Total size: 272 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GlobalUbo {
    pub projection: Mat4,
    pub view: Mat4,
    /// Camera-to-world; billboards read the camera axes from it.
    pub inverse_view: Mat4,
    pub light_view_projection: Mat4,
    pub ambient: Vec4,
}

impl Default for GlobalUbo {
    fn default() -> Self {
        Self {
            projection: Mat4::IDENTITY,
            view: Mat4::IDENTITY,
            inverse_view: Mat4::IDENTITY,
            light_view_projection: Mat4::IDENTITY,
            ambient: Vec4::new(1.0, 1.0, 1.0, 0.02),
        }
    }
}

impl GlobalUbo {
    pub const SIZE: usize = std::mem::size_of::<Self>();

    pub fn new(projection: Mat4, view: Mat4, light_view_projection: Mat4) -> Self {
        Self {
            projection,
            view,
            inverse_view: view.inverse(),
            light_view_projection,
            ..Default::default()
        }
    }
}

/// One point light.
///
/// `position.w` holds the light type, `color.w` the intensity.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PointLightData {
    pub position: Vec4,
    pub color: Vec4,
    pub radius: f32,
    pub _pad: [f32; 3],
}

/// One spot light.
///
/// `direction.w` holds the cosine of the inner cutoff.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct SpotLightData {
    pub position: Vec4,
    pub color: Vec4,
    pub direction: Vec4,
    pub outer_cutoff: f32,
    pub _pad: [f32; 3],
}

/// Light arrays and their active counts, set 0 binding 1.
///
/// Counts are written by the light update pass; entries past the count are
/// stale and never read by the shaders.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct LightUbo {
    pub point_lights: [PointLightData; MAX_LIGHTS],
    pub spot_lights: [SpotLightData; MAX_LIGHTS],
    pub num_lights: u32,
    pub num_spot_lights: u32,
    pub _pad: [u32; 2],
}

impl Default for LightUbo {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl LightUbo {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

/// Per-material shading parameters, set 1 binding 0 (dynamic offset).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct MaterialUbo {
    pub albedo: Vec4,
    pub roughness: f32,
    pub ambient_occlusion: f32,
    pub metallic: f32,
    /// Element of the texture array binding; meaningful only when
    /// `toggle_texture` is 1.
    pub texture_index: u32,
    pub toggle_texture: u32,
    pub _pad: [u32; 3],
}

impl Default for MaterialUbo {
    fn default() -> Self {
        Self {
            albedo: Vec4::ONE,
            roughness: 1.0,
            ambient_occlusion: 1.0,
            metallic: 0.0,
            texture_index: 0,
            toggle_texture: 0,
            _pad: [0; 3],
        }
    }
}

impl MaterialUbo {
    pub const SIZE: usize = std::mem::size_of::<Self>();
}

impl From<&vkframe_scene::Material> for MaterialUbo {
    fn from(material: &vkframe_scene::Material) -> Self {
        Self {
            albedo: material.albedo,
            roughness: material.roughness,
            ambient_occlusion: material.ambient_occlusion,
            metallic: material.metallic,
            texture_index: material.texture_slot.unwrap_or(0),
            toggle_texture: u32::from(material.texture_slot.is_some()),
            _pad: [0; 3],
        }
    }
}

/// Per-draw transform, pushed to vertex and fragment stages.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct PushConstants {
    pub model: Mat4,
    pub normal_matrix: Mat4,
}

impl PushConstants {
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;

    pub fn from_transform(transform: &vkframe_scene::Transform) -> Self {
        Self {
            model: transform.matrix(),
            normal_matrix: transform.normal_matrix(),
        }
    }
}

/// Clip distances for the world grid fragment shader.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct GridPushConstants {
    pub near: f32,
    pub far: f32,
}

impl GridPushConstants {
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;
}

/// View-projection used by the shadow pre-pass.
///
/// Looks down the first spot light when there is one, otherwise falls back
/// to the camera so that the depth pre-pass still matches what is drawn.
pub fn light_view_projection(scene: &vkframe_scene::Scene, camera_view_projection: Mat4) -> Mat4 {
    let Some((transform, spot)) = scene.spot_lights().next() else {
        return camera_view_projection;
    };

    let direction = transform.forward();
    let up = if direction.abs().dot(Vec3::Y) > 0.99 {
        Vec3::Z
    } else {
        Vec3::Y
    };
    let view = Mat4::look_to_rh(transform.translation, direction, up);
    let fov = (spot.outer_cutoff_degrees * 2.0).to_radians().clamp(0.1, 3.0);
    let mut projection = Mat4::perspective_rh(fov, 1.0, 0.1, 100.0);
    projection.y_axis.y *= -1.0;
    projection * view
}

#[cfg(test)]
mod tests {
    use super::*;
    use vkframe_scene::{GameObject, Material, Scene, SpotLight, Transform};

    #[test]
    fn test_std140_sizes() {
        assert_eq!(GlobalUbo::SIZE, 272);
        assert_eq!(std::mem::size_of::<PointLightData>(), 48);
        assert_eq!(std::mem::size_of::<SpotLightData>(), 64);
        assert_eq!(LightUbo::SIZE, 48 * MAX_LIGHTS + 64 * MAX_LIGHTS + 16);
        assert_eq!(MaterialUbo::SIZE, 48);
        assert_eq!(PushConstants::SIZE, 128);
        assert_eq!(GridPushConstants::SIZE, 8);
    }

    #[test]
    fn test_light_counts_offset() {
        assert_eq!(std::mem::offset_of!(LightUbo, num_lights), 1120);
        assert_eq!(std::mem::offset_of!(LightUbo, num_spot_lights), 1124);
        assert_eq!(std::mem::offset_of!(SpotLightData, outer_cutoff), 48);
    }

    #[test]
    fn test_global_inverse_view() {
        let view = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let ubo = GlobalUbo::new(Mat4::IDENTITY, view, Mat4::IDENTITY);
        let product = ubo.view * ubo.inverse_view;
        assert!(product.abs_diff_eq(Mat4::IDENTITY, 1e-5));
    }

    #[test]
    fn test_material_from_scene() {
        let untextured = MaterialUbo::from(&Material::new("plain").with_roughness(0.25));
        assert_eq!(untextured.roughness, 0.25);
        assert_eq!(untextured.toggle_texture, 0);

        let textured = MaterialUbo::from(&Material::new("checker").with_texture_slot(4));
        assert_eq!(textured.texture_index, 4);
        assert_eq!(textured.toggle_texture, 1);
    }

    #[test]
    fn test_light_view_projection_falls_back_to_camera() {
        let scene = Scene::default();
        let camera = Mat4::from_scale(Vec3::splat(2.0));
        assert_eq!(light_view_projection(&scene, camera), camera);
    }

    #[test]
    fn test_light_view_projection_follows_spot_light() {
        let mut scene = Scene::default();
        scene.spawn(GameObject::spot_light(
            "spot",
            Transform::new()
                .with_translation(Vec3::new(0.0, 5.0, 0.0))
                .with_euler_degrees(-90.0, 0.0, 0.0),
            SpotLight::default(),
        ));
        let matrix = light_view_projection(&scene, Mat4::IDENTITY);
        // A point straight below the light lands in the middle of its view.
        let clip = matrix * Vec4::new(0.0, 0.0, 0.0, 1.0);
        let ndc = clip.truncate() / clip.w;
        assert!(ndc.x.abs() < 1e-3 && ndc.y.abs() < 1e-3, "got {ndc:?}");
        assert!((0.0..=1.0).contains(&ndc.z));
    }
}
