//! Depth-only auxiliary pass sampled by the lit shaders.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use vkframe_rhi::RhiResult;
use vkframe_rhi::device::Device;
use vkframe_rhi::image::{Image, Sampler};
use vkframe_rhi::render_pass::{Framebuffer, RenderPass, depth_clear_value};

/// Shadow map target sized to the drawable extent.
///
/// Rebuilt whenever the presentation chain is; the sampler and image view
/// change with it, so descriptors that reference the map must be rewritten.
pub struct ShadowPass {
    framebuffer: Framebuffer,
    depth: Image,
    sampler: Sampler,
    render_pass: RenderPass,
}

impl ShadowPass {
    /// Creates the pass, depth map and framebuffer.
    ///
    /// # Errors
    ///
    /// Returns an error if any GPU object cannot be created.
    pub fn new(device: Arc<Device>, depth_format: vk::Format, extent: vk::Extent2D) -> RhiResult<Self> {
        let render_pass = RenderPass::depth_only(device.clone(), depth_format)?;
        let depth = Image::depth_attachment(device.clone(), "shadow map", extent, depth_format, true)?;
        let sampler = Sampler::depth(device.clone())?;
        let framebuffer = Framebuffer::new(device, &render_pass, &[depth.image_view()], extent)?;

        debug!("Shadow pass ready at {}x{}", extent.width, extent.height);

        Ok(Self {
            framebuffer,
            depth,
            sampler,
            render_pass,
        })
    }

    #[inline]
    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }

    #[inline]
    pub fn framebuffer(&self) -> vk::Framebuffer {
        self.framebuffer.handle()
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.depth.extent()
    }

    /// View and sampler for binding the map as a combined image sampler.
    pub fn sampled_view(&self) -> (vk::ImageView, vk::Sampler) {
        (self.depth.image_view(), self.sampler.handle())
    }

    /// Layout the map is in once the pass has ended.
    pub const SAMPLED_LAYOUT: vk::ImageLayout = vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL;

    pub fn clear_values() -> [vk::ClearValue; 1] {
        [depth_clear_value()]
    }
}
