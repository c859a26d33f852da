//! Material record layout and light packing, without a device.

use glam::{Vec3, Vec4};

use vkframe_renderer::frame_resources::{
    aligned_stride, material_offset, pack_materials, unpack_material,
};
use vkframe_renderer::systems::update_lights;
use vkframe_renderer::ubo::{LightUbo, MAX_LIGHTS, MaterialUbo};
use vkframe_scene::{GameObject, Material, PointLight, Scene};

fn scene_materials() -> Vec<Material> {
    vec![
        Material::new("red")
            .with_albedo(Vec4::new(1.0, 0.0, 0.0, 1.0))
            .with_roughness(0.3),
        Material::new("checker").with_texture_slot(2),
        Material::new("metal").with_metallic(1.0),
    ]
}

#[test]
fn test_records_follow_default_record() {
    let stride = aligned_stride(MaterialUbo::SIZE as u64, 256);
    let records: Vec<MaterialUbo> = std::iter::once(MaterialUbo::default())
        .chain(scene_materials().iter().map(MaterialUbo::from))
        .collect();
    let bytes = pack_materials(&records, stride);

    assert_eq!(bytes.len() as u64, stride * 4);
    for (k, expected) in records.iter().enumerate() {
        assert_eq!(unpack_material(&bytes, material_offset(k, stride)), *expected);
    }

    let record = |k| unpack_material(&bytes, material_offset(k, stride));
    assert_eq!(record(0), MaterialUbo::default());

    let red = record(1);
    assert_eq!(red.albedo, Vec4::new(1.0, 0.0, 0.0, 1.0));
    assert_eq!(red.roughness, 0.3);
    assert_eq!(red.toggle_texture, 0);

    let checker = record(2);
    assert_eq!(checker.texture_index, 2);
    assert_eq!(checker.toggle_texture, 1);

    assert_eq!(record(3).metallic, 1.0);
}

#[test]
fn test_light_count_is_capped() {
    let mut scene = Scene::default();
    for i in 0..(MAX_LIGHTS + 4) {
        scene.spawn(GameObject::point_light(
            format!("light {i}"),
            Vec3::new(i as f32, 1.0, 0.0),
            PointLight::default(),
        ));
    }

    let mut ubo = LightUbo::default();
    let (points, spots) = update_lights(&scene, &mut ubo);
    assert_eq!(points as usize, MAX_LIGHTS);
    assert_eq!(spots, 0);
    assert_eq!(ubo.num_lights as usize, MAX_LIGHTS);
}

#[test]
fn test_empty_scene_has_no_lights() {
    let mut ubo = LightUbo::default();
    assert_eq!(update_lights(&Scene::default(), &mut ubo), (0, 0));
    assert_eq!(ubo.num_lights, 0);
    assert_eq!(ubo.num_spot_lights, 0);
}
