//! Point light update pass and billboards.

use tracing::warn;

use vkframe_rhi::RhiResult;
use vkframe_rhi::pipeline::{Pipeline, PipelineLayout};
use vkframe_scene::{LightType, Scene};

use super::{SystemContext, billboard_pipeline, draw_billboards, overflow};
use crate::frame_info::FrameInfo;
use crate::ubo::{LightUbo, MAX_LIGHTS, PointLightData};

pub struct PointLightSystem {
    pipeline: Pipeline,
    layout: PipelineLayout,
}

impl PointLightSystem {
    pub fn new(ctx: &SystemContext<'_>) -> RhiResult<Self> {
        let (pipeline, layout) = billboard_pipeline(ctx, "point_light", "point light")?;
        Ok(Self { pipeline, layout })
    }

    /// Writes the scene's point lights into `ubo` and sets `num_lights`.
    ///
    /// Lights past [`MAX_LIGHTS`] are dropped. Returns the written count.
    pub fn update(scene: &Scene, ubo: &mut LightUbo) -> u32 {
        let mut count = 0;
        let mut total = 0;
        for (transform, light) in scene.point_lights() {
            total += 1;
            let Some(slot) = ubo.point_lights.get_mut(count) else {
                continue;
            };
            *slot = PointLightData {
                position: transform.translation.extend(LightType::Point.as_f32()),
                color: light.color.extend(light.intensity),
                radius: light.radius,
                _pad: [0.0; 3],
            };
            count += 1;
        }
        if let Some(extra) = overflow(total, MAX_LIGHTS) {
            warn!("{extra} point light(s) over the limit of {MAX_LIGHTS} ignored");
        }
        ubo.num_lights = count as u32;
        ubo.num_lights
    }

    /// One billboard per active point light.
    pub fn render(&self, frame: &FrameInfo<'_>) {
        draw_billboards(frame, &self.pipeline, &self.layout, frame.lights.num_lights);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Vec3, Vec4};
    use vkframe_scene::{GameObject, PointLight};

    #[test]
    fn test_no_lights_gives_zero_count() {
        let mut ubo = LightUbo::default();
        ubo.num_lights = 7;
        assert_eq!(PointLightSystem::update(&Scene::default(), &mut ubo), 0);
        assert_eq!(ubo.num_lights, 0);
    }

    #[test]
    fn test_point_light_packing() {
        let mut scene = Scene::default();
        scene.spawn(GameObject::point_light(
            "red",
            Vec3::new(1.0, 2.0, 3.0),
            PointLight {
                color: Vec3::new(1.0, 0.0, 0.0),
                intensity: 4.0,
                radius: 0.25,
            },
        ));

        let mut ubo = LightUbo::default();
        assert_eq!(PointLightSystem::update(&scene, &mut ubo), 1);
        let data = ubo.point_lights[0];
        assert_eq!(data.position, Vec4::new(1.0, 2.0, 3.0, 0.0));
        assert_eq!(data.color, Vec4::new(1.0, 0.0, 0.0, 4.0));
        assert_eq!(data.radius, 0.25);
    }

    #[test]
    fn test_excess_point_lights_are_capped() {
        let mut scene = Scene::default();
        for i in 0..MAX_LIGHTS + 3 {
            scene.spawn(GameObject::point_light(
                format!("light {i}"),
                Vec3::splat(i as f32),
                PointLight::default(),
            ));
        }
        let mut ubo = LightUbo::default();
        assert_eq!(PointLightSystem::update(&scene, &mut ubo), MAX_LIGHTS as u32);
        assert_eq!(
            ubo.point_lights[MAX_LIGHTS - 1].position.truncate(),
            Vec3::splat((MAX_LIGHTS - 1) as f32)
        );
    }
}
