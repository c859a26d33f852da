//! Spot light update pass and billboards.

use tracing::warn;

use vkframe_rhi::RhiResult;
use vkframe_rhi::pipeline::{Pipeline, PipelineLayout};
use vkframe_scene::{LightType, Scene};

use super::{SystemContext, billboard_pipeline, draw_billboards, overflow};
use crate::frame_info::FrameInfo;
use crate::ubo::{LightUbo, MAX_LIGHTS, SpotLightData};

pub struct SpotLightSystem {
    pipeline: Pipeline,
    layout: PipelineLayout,
}

impl SpotLightSystem {
    pub fn new(ctx: &SystemContext<'_>) -> RhiResult<Self> {
        let (pipeline, layout) = billboard_pipeline(ctx, "spot_light", "spot light")?;
        Ok(Self { pipeline, layout })
    }

    /// Writes the scene's spot lights into `ubo` and sets `num_spot_lights`.
    ///
    /// Direction is the light's forward axis with the cosine of the inner
    /// cutoff in `w`. Lights past [`MAX_LIGHTS`] are dropped.
    pub fn update(scene: &Scene, ubo: &mut LightUbo) -> u32 {
        let mut count = 0;
        let mut total = 0;
        for (transform, light) in scene.spot_lights() {
            total += 1;
            let Some(slot) = ubo.spot_lights.get_mut(count) else {
                continue;
            };
            *slot = SpotLightData {
                position: transform.translation.extend(LightType::Spot.as_f32()),
                color: light.color.extend(light.intensity),
                direction: transform.forward().extend(light.cos_cutoff()),
                outer_cutoff: light.cos_outer_cutoff(),
                _pad: [0.0; 3],
            };
            count += 1;
        }
        if let Some(extra) = overflow(total, MAX_LIGHTS) {
            warn!("{extra} spot light(s) over the limit of {MAX_LIGHTS} ignored");
        }
        ubo.num_spot_lights = count as u32;
        ubo.num_spot_lights
    }

    pub fn render(&self, frame: &FrameInfo<'_>) {
        draw_billboards(frame, &self.pipeline, &self.layout, frame.lights.num_spot_lights);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};
    use vkframe_scene::{GameObject, SpotLight, Transform};

    #[test]
    fn test_spot_light_packing() {
        let mut scene = Scene::default();
        let light = SpotLight::default();
        scene.spawn(GameObject::spot_light(
            "down",
            Transform::new()
                .with_translation(Vec3::new(0.0, 4.0, 0.0))
                .with_euler_degrees(-90.0, 0.0, 0.0),
            light,
        ));

        let mut ubo = LightUbo::default();
        assert_eq!(SpotLightSystem::update(&scene, &mut ubo), 1);
        let data = ubo.spot_lights[0];
        assert_eq!(data.position, Vec4::new(0.0, 4.0, 0.0, 1.0));
        assert!(data.direction.truncate().abs_diff_eq(Vec3::NEG_Y, 1e-5));
        assert!((data.direction.w - light.cos_cutoff()).abs() < 1e-6);
        assert!((data.outer_cutoff - light.cos_outer_cutoff()).abs() < 1e-6);
        assert!(data.direction.w > data.outer_cutoff);
    }

    #[test]
    fn test_point_lights_do_not_count_as_spots() {
        let mut scene = Scene::default();
        scene.spawn(GameObject::point_light("p", Vec3::ZERO, Default::default()));
        let mut ubo = LightUbo::default();
        assert_eq!(SpotLightSystem::update(&scene, &mut ubo), 0);
    }
}
