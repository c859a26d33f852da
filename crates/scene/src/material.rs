//! Surface materials referenced by scene objects.

use glam::Vec4;

/// Index into [`crate::Scene::materials`].
///
/// Also the material's record index in the renderer's per-frame material
/// buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(pub u32);

/// Shading parameters of a surface.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub albedo: Vec4,
    pub roughness: f32,
    pub ambient_occlusion: f32,
    pub metallic: f32,
    /// Slot in the renderer's texture array, handed out once at load time.
    pub texture_slot: Option<u32>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: "default".to_string(),
            albedo: Vec4::ONE,
            roughness: 1.0,
            ambient_occlusion: 1.0,
            metallic: 0.0,
            texture_slot: None,
        }
    }
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_albedo(mut self, albedo: Vec4) -> Self {
        self.albedo = albedo;
        self
    }

    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness;
        self
    }

    pub fn with_metallic(mut self, metallic: f32) -> Self {
        self.metallic = metallic;
        self
    }

    pub fn with_texture_slot(mut self, slot: u32) -> Self {
        self.texture_slot = Some(slot);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_material_builder() {
        let material = Material::new("brick")
            .with_albedo(Vec4::new(0.8, 0.3, 0.2, 1.0))
            .with_roughness(0.7)
            .with_metallic(0.1)
            .with_texture_slot(3);
        assert_eq!(material.name, "brick");
        assert_eq!(material.roughness, 0.7);
        assert_eq!(material.metallic, 0.1);
        assert_eq!(material.ambient_occlusion, 1.0);
        assert_eq!(material.texture_slot, Some(3));
    }

    #[test]
    fn test_default_is_untextured() {
        assert_eq!(Material::default().texture_slot, None);
    }
}
