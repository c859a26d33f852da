//! Demo scene: a few cubes on a floor, lit by orbiting lights.

use glam::{Quat, Vec3, Vec4};

use vkframe_core::RendererConfig;
use vkframe_scene::{
    Camera, GameObject, LightComponent, Material, MeshData, PointLight, Scene, SpotLight, Transform,
};

/// Radians per second the lights travel around the Y axis.
const ORBIT_SPEED: f32 = 0.5;

/// Side length of the generated checker texture.
pub const CHECKER_SIZE: u32 = 64;

/// Builds the scene; `checker_slot` is the texture slot for the floor.
pub fn build(config: &RendererConfig, checker_slot: Option<u32>) -> Scene {
    let mut camera = Camera::new(config.camera.fov, config.camera.near, config.camera.far);
    camera.position = Vec3::new(0.0, 2.5, 8.0);
    camera.look_at(Vec3::ZERO);
    let mut scene = Scene::new(camera);

    let cube = scene.add_mesh(MeshData::cube(Vec3::new(0.8, 0.8, 0.8)));
    let floor = scene.add_mesh(MeshData::plane(10.0, Vec3::splat(0.5)));

    let red = scene.add_material(
        Material::new("red plastic")
            .with_albedo(Vec4::new(0.9, 0.2, 0.2, 1.0))
            .with_roughness(0.4),
    );
    let steel = scene.add_material(
        Material::new("steel")
            .with_albedo(Vec4::new(0.7, 0.7, 0.75, 1.0))
            .with_metallic(1.0)
            .with_roughness(0.25),
    );
    let mut floor_material = Material::new("floor").with_roughness(0.9);
    if let Some(slot) = checker_slot {
        floor_material = floor_material.with_texture_slot(slot);
    }
    let floor_material = scene.add_material(floor_material);

    scene.spawn(GameObject::new("floor").with_mesh(floor, Some(floor_material)));
    for (i, x) in [-2.5_f32, 0.0, 2.5].into_iter().enumerate() {
        let material = if i % 2 == 0 { red } else { steel };
        scene.spawn(
            GameObject::new(format!("cube {i}"))
                .with_mesh(cube, Some(material))
                .with_transform(
                    Transform::new()
                        .with_translation(Vec3::new(x, 0.5, 0.0))
                        .with_euler_degrees(0.0, 20.0 * i as f32, 0.0),
                ),
        );
    }
    // No material: drawn with the default record.
    scene.spawn(
        GameObject::new("plain cube").with_mesh(cube, None).with_transform(
            Transform::new()
                .with_translation(Vec3::new(0.0, 0.25, 2.5))
                .with_scale(Vec3::splat(0.5)),
        ),
    );

    let colors = [
        Vec3::new(1.0, 0.4, 0.4),
        Vec3::new(0.4, 1.0, 0.4),
        Vec3::new(0.4, 0.4, 1.0),
        Vec3::new(1.0, 1.0, 0.6),
    ];
    for (i, color) in colors.into_iter().enumerate() {
        let angle = i as f32 * std::f32::consts::TAU / colors.len() as f32;
        let position = Vec3::new(angle.cos() * 4.0, 1.5, angle.sin() * 4.0);
        scene.spawn(GameObject::point_light(
            format!("point light {i}"),
            position,
            PointLight {
                color,
                intensity: 1.5,
                radius: 0.1,
            },
        ));
    }

    scene.spawn(GameObject::spot_light(
        "spot light",
        Transform::new()
            .with_translation(Vec3::new(0.0, 5.0, 0.0))
            .with_euler_degrees(-90.0, 0.0, 0.0),
        SpotLight {
            intensity: 3.0,
            ..SpotLight::default()
        },
    ));

    scene
}

/// Rotates every point light around the Y axis.
pub fn orbit_lights(scene: &mut Scene, delta_time: f32) {
    let rotation = Quat::from_rotation_y(ORBIT_SPEED * delta_time);
    for (_, object) in scene.objects_mut() {
        if let Some(LightComponent::Point(_)) = object.light {
            object.transform.translation = rotation * object.transform.translation;
        }
    }
}

/// RGBA8 checkerboard, 8 cells per side.
pub fn checker_pixels(size: u32) -> Vec<u8> {
    let cell = (size / 8).max(1);
    (0..size * size)
        .flat_map(|i| {
            let (x, y) = (i % size, i / size);
            let value = if (x / cell + y / cell) % 2 == 0 { 220 } else { 40 };
            [value, value, value, 255]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_scene_contents() {
        let scene = build(&RendererConfig::default(), Some(0));
        assert_eq!(scene.meshes().len(), 2);
        assert_eq!(scene.materials().len(), 3);
        assert_eq!(scene.point_lights().count(), 4);
        assert_eq!(scene.spot_lights().count(), 1);
        assert_eq!(scene.drawables().count(), 5);
    }

    #[test]
    fn test_orbit_keeps_radius_and_height() {
        let mut scene = build(&RendererConfig::default(), None);
        let before: Vec<Vec3> = scene.point_lights().map(|(t, _)| t.translation).collect();
        orbit_lights(&mut scene, 1.0);
        let after: Vec<Vec3> = scene.point_lights().map(|(t, _)| t.translation).collect();

        for (a, b) in before.iter().zip(&after) {
            assert!((a.length() - b.length()).abs() < 1e-4);
            assert!((a.y - b.y).abs() < 1e-6);
            assert!(a.distance(*b) > 0.1);
        }
    }

    #[test]
    fn test_spot_light_does_not_orbit() {
        let mut scene = build(&RendererConfig::default(), None);
        let before: Vec<Vec3> = scene.spot_lights().map(|(t, _)| t.translation).collect();
        orbit_lights(&mut scene, 2.0);
        let after: Vec<Vec3> = scene.spot_lights().map(|(t, _)| t.translation).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_checker_pixels() {
        let pixels = checker_pixels(CHECKER_SIZE);
        assert_eq!(pixels.len(), (CHECKER_SIZE * CHECKER_SIZE * 4) as usize);
        assert_eq!(&pixels[..4], &[220, 220, 220, 255]);
        // First texel of the second cell.
        let second = (CHECKER_SIZE / 8 * 4) as usize;
        assert_eq!(&pixels[second..second + 4], &[40, 40, 40, 255]);
    }
}
