//! Device-local mesh buffers.

use std::sync::Arc;

use tracing::debug;

use vkframe_rhi::buffer::{Buffer, BufferUsage};
use vkframe_rhi::command::CommandBuffer;
use vkframe_rhi::device::Device;
use vkframe_rhi::{RhiError, RhiResult};
use vkframe_scene::MeshData;

/// Vertex and index buffers for one scene mesh.
pub struct GpuMesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
}

impl GpuMesh {
    /// Uploads `mesh` through a staging copy; blocks until the copy is done.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] for an empty mesh, or any upload
    /// error.
    pub fn upload(device: Arc<Device>, mesh: &MeshData) -> RhiResult<Self> {
        if mesh.vertices.is_empty() || mesh.indices.is_empty() {
            return Err(RhiError::InvalidHandle(format!(
                "mesh '{}' has no geometry",
                mesh.name
            )));
        }

        let vertex_buffer = Buffer::new_device_local(
            device.clone(),
            BufferUsage::Vertex,
            bytemuck::cast_slice(&mesh.vertices),
        )?;
        let index_buffer =
            Buffer::new_device_local(device, BufferUsage::Index, bytemuck::cast_slice(&mesh.indices))?;

        debug!(
            "Uploaded mesh '{}': {} vertices, {} indices",
            mesh.name,
            mesh.vertices.len(),
            mesh.indices.len()
        );

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: mesh.index_count(),
        })
    }

    /// Binds both buffers and issues one indexed draw.
    pub fn draw(&self, cmd: &CommandBuffer<'_>) {
        cmd.bind_vertex_buffers(0, &[self.vertex_buffer.handle()], &[0]);
        cmd.bind_index_buffer(self.index_buffer.handle(), 0);
        cmd.draw_indexed(self.index_count, 1, 0, 0, 0);
    }

    pub fn index_count(&self) -> u32 {
        self.index_count
    }
}
