//! Light components attached to scene objects.
//!
//! Position and orientation come from the owning object's transform; the
//! components only carry photometric parameters. GPU layouts live in the
//! renderer.

use glam::Vec3;

/// Discriminant written into the `w` channel of a light's position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum LightType {
    Point = 0,
    Spot = 1,
}

impl LightType {
    #[inline]
    pub fn as_f32(self) -> f32 {
        self as u32 as f32
    }
}

/// An omnidirectional light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub color: Vec3,
    pub intensity: f32,
    /// Attenuation radius; also the billboard size.
    pub radius: f32,
}

impl Default for PointLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            radius: 0.1,
        }
    }
}

/// A cone light shining along the owning transform's forward axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpotLight {
    pub color: Vec3,
    pub intensity: f32,
    /// Inner cone half-angle in degrees.
    pub cutoff_degrees: f32,
    /// Outer cone half-angle in degrees; intensity fades to zero between the two.
    pub outer_cutoff_degrees: f32,
}

impl Default for SpotLight {
    fn default() -> Self {
        Self {
            color: Vec3::ONE,
            intensity: 1.0,
            cutoff_degrees: 12.5,
            outer_cutoff_degrees: 17.5,
        }
    }
}

impl SpotLight {
    /// Cosine of the inner cutoff, as compared against in the shader.
    pub fn cos_cutoff(&self) -> f32 {
        self.cutoff_degrees.to_radians().cos()
    }

    pub fn cos_outer_cutoff(&self) -> f32 {
        self.outer_cutoff_degrees.to_radians().cos()
    }
}

/// Light attached to a game object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightComponent {
    Point(PointLight),
    Spot(SpotLight),
}

impl LightComponent {
    pub fn light_type(&self) -> LightType {
        match self {
            LightComponent::Point(_) => LightType::Point,
            LightComponent::Spot(_) => LightType::Spot,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_type_codes() {
        assert_eq!(LightType::Point.as_f32(), 0.0);
        assert_eq!(LightType::Spot.as_f32(), 1.0);
    }

    #[test]
    fn test_spot_cutoff_cosines() {
        let spot = SpotLight {
            cutoff_degrees: 60.0,
            outer_cutoff_degrees: 90.0,
            ..Default::default()
        };
        assert!((spot.cos_cutoff() - 0.5).abs() < 1e-6);
        assert!(spot.cos_outer_cutoff().abs() < 1e-6);
        // Outer cone is wider, so its cosine is smaller.
        let default = SpotLight::default();
        assert!(default.cos_outer_cutoff() < default.cos_cutoff());
    }

    #[test]
    fn test_component_type() {
        assert_eq!(
            LightComponent::Point(PointLight::default()).light_type(),
            LightType::Point
        );
        assert_eq!(
            LightComponent::Spot(SpotLight::default()).light_type(),
            LightType::Spot
        );
    }
}
