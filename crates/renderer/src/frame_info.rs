//! Read-only view of one frame handed to the render subsystems.

use ash::vk;

use vkframe_rhi::command::CommandBuffer;
use vkframe_scene::{GameObject, Scene};

use crate::frame_resources::FrameResources;
use crate::mesh::GpuMesh;
use crate::ubo::{GridPushConstants, LightUbo};

/// Everything a subsystem may read while recording.
///
/// Borrowed for the duration of one recording; subsystems never keep the
/// command buffer or any of these references past their `render` call.
pub struct FrameInfo<'a> {
    pub cmd: CommandBuffer<'a>,
    /// Frame-in-flight slot being recorded.
    pub frame_index: usize,
    pub scene: &'a Scene,
    pub meshes: &'a [GpuMesh],
    pub resources: &'a FrameResources,
    /// Light data already written to this slot, counts included.
    pub lights: &'a LightUbo,
    pub grid: GridPushConstants,
}

impl FrameInfo<'_> {
    pub fn global_set(&self) -> vk::DescriptorSet {
        self.resources.global_set(self.frame_index)
    }

    pub fn material_set(&self) -> vk::DescriptorSet {
        self.resources.material_set(self.frame_index)
    }

    /// Uploaded mesh for `object`, if it has one.
    pub fn mesh_for(&self, object: &GameObject) -> Option<&GpuMesh> {
        object.mesh.and_then(|id| self.meshes.get(id.0 as usize))
    }

    /// Material record for `object`: its scene material shifted past the
    /// default record, or the default record.
    pub fn material_record(&self, object: &GameObject) -> usize {
        object
            .material
            .map(|id| id.0 as usize)
            .filter(|&index| index < self.scene.materials().len())
            .map_or(0, |index| index + 1)
    }
}
