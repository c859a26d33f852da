//! Game objects and the scene that owns them.

use std::collections::BTreeMap;

use glam::Vec3;
use tracing::debug;

use crate::camera::Camera;
use crate::light::{LightComponent, PointLight, SpotLight};
use crate::material::{Material, MaterialId};
use crate::mesh::{MeshData, MeshId};
use crate::transform::Transform;

/// Stable identifier of a game object within its scene.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

/// A transform plus optional mesh, material and light.
#[derive(Clone, Debug, PartialEq)]
pub struct GameObject {
    pub name: String,
    pub transform: Transform,
    pub mesh: Option<MeshId>,
    pub material: Option<MaterialId>,
    pub light: Option<LightComponent>,
}

impl GameObject {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            mesh: None,
            material: None,
            light: None,
        }
    }

    /// A renderable object.
    pub fn with_mesh(mut self, mesh: MeshId, material: Option<MaterialId>) -> Self {
        self.mesh = Some(mesh);
        self.material = material;
        self
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    /// A point light at `position`.
    pub fn point_light(name: impl Into<String>, position: Vec3, light: PointLight) -> Self {
        Self {
            transform: Transform::new().with_translation(position),
            light: Some(LightComponent::Point(light)),
            ..Self::new(name)
        }
    }

    /// A spot light at `position` shining along `transform.forward()`.
    pub fn spot_light(name: impl Into<String>, transform: Transform, light: SpotLight) -> Self {
        Self {
            transform,
            light: Some(LightComponent::Spot(light)),
            ..Self::new(name)
        }
    }

    pub fn point(&self) -> Option<&PointLight> {
        match &self.light {
            Some(LightComponent::Point(light)) => Some(light),
            _ => None,
        }
    }

    pub fn spot(&self) -> Option<&SpotLight> {
        match &self.light {
            Some(LightComponent::Spot(light)) => Some(light),
            _ => None,
        }
    }
}

/// Everything the renderer reads each frame.
///
/// Meshes and materials are registered up front and referenced by index;
/// objects are keyed by [`ObjectId`] and iterated in id order.
#[derive(Debug, Default)]
pub struct Scene {
    pub camera: Camera,
    objects: BTreeMap<ObjectId, GameObject>,
    meshes: Vec<MeshData>,
    materials: Vec<Material>,
    next_id: u32,
}

impl Scene {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            ..Default::default()
        }
    }

    pub fn add_mesh(&mut self, mesh: MeshData) -> MeshId {
        let id = MeshId(self.meshes.len() as u32);
        debug!("Registered mesh '{}' as {:?}", mesh.name, id);
        self.meshes.push(mesh);
        id
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        let id = MaterialId(self.materials.len() as u32);
        debug!("Registered material '{}' as {:?}", material.name, id);
        self.materials.push(material);
        id
    }

    pub fn spawn(&mut self, object: GameObject) -> ObjectId {
        let id = ObjectId(self.next_id);
        self.next_id += 1;
        self.objects.insert(id, object);
        id
    }

    pub fn despawn(&mut self, id: ObjectId) -> Option<GameObject> {
        self.objects.remove(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&GameObject> {
        self.objects.get(&id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut GameObject> {
        self.objects.get_mut(&id)
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &GameObject)> {
        self.objects.iter().map(|(id, object)| (*id, object))
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = (ObjectId, &mut GameObject)> {
        self.objects.iter_mut().map(|(id, object)| (*id, object))
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn meshes(&self) -> &[MeshData] {
        &self.meshes
    }

    pub fn mesh(&self, id: MeshId) -> Option<&MeshData> {
        self.meshes.get(id.0 as usize)
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0 as usize)
    }

    /// Objects carrying a point light, in id order.
    pub fn point_lights(&self) -> impl Iterator<Item = (&Transform, &PointLight)> {
        self.objects
            .values()
            .filter_map(|object| object.point().map(|light| (&object.transform, light)))
    }

    /// Objects carrying a spot light, in id order.
    pub fn spot_lights(&self) -> impl Iterator<Item = (&Transform, &SpotLight)> {
        self.objects
            .values()
            .filter_map(|object| object.spot().map(|light| (&object.transform, light)))
    }

    /// Objects with a mesh, in id order.
    pub fn drawables(&self) -> impl Iterator<Item = (ObjectId, &GameObject)> {
        self.objects().filter(|(_, object)| object.mesh.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique_and_stable() {
        let mut scene = Scene::default();
        let a = scene.spawn(GameObject::new("a"));
        let b = scene.spawn(GameObject::new("b"));
        assert_ne!(a, b);
        scene.despawn(a);
        let c = scene.spawn(GameObject::new("c"));
        assert_ne!(c, a);
        assert_eq!(scene.get(b).map(|o| o.name.as_str()), Some("b"));
        assert_eq!(scene.object_count(), 2);
    }

    #[test]
    fn test_light_queries() {
        let mut scene = Scene::default();
        scene.spawn(GameObject::point_light("p0", Vec3::X, PointLight::default()));
        scene.spawn(GameObject::spot_light(
            "s0",
            Transform::default(),
            SpotLight::default(),
        ));
        scene.spawn(GameObject::point_light("p1", Vec3::Y, PointLight::default()));
        assert_eq!(scene.point_lights().count(), 2);
        assert_eq!(scene.spot_lights().count(), 1);
        assert_eq!(scene.drawables().count(), 0);
    }

    #[test]
    fn test_drawables_reference_registered_assets() {
        let mut scene = Scene::default();
        let mesh = scene.add_mesh(MeshData::cube(Vec3::ONE));
        let material = scene.add_material(Material::new("red"));
        let id = scene.spawn(GameObject::new("cube").with_mesh(mesh, Some(material)));
        let (drawn, object) = scene.drawables().next().unwrap();
        assert_eq!(drawn, id);
        assert_eq!(scene.mesh(object.mesh.unwrap()).unwrap().index_count(), 36);
        assert_eq!(scene.materials().len(), 1);
    }
}
