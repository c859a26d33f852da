//! Vulkan implementation of [`FrameBackend`].

use std::sync::Arc;

use ash::vk;

use vkframe_rhi::command::{CommandBuffer, CommandBuffers};
use vkframe_rhi::device::Device;
use vkframe_rhi::instance::Instance;
use vkframe_rhi::swapchain::PresentStatus;
use vkframe_rhi::sync::MAX_FRAMES_IN_FLIGHT;
use vkframe_rhi::{RhiError, RhiResult};

use crate::orchestrator::FrameBackend;
use crate::presentation::{AttachmentFormats, PresentationChain};
use crate::shadow_pass::ShadowPass;

/// Presentation chain, per-slot command buffers and the shadow pass.
///
/// Command buffers are allocated once and survive chain recreation; only
/// extent-dependent targets are rebuilt.
pub struct GpuFrameBackend {
    shadow: Option<ShadowPass>,
    chain: Option<PresentationChain>,
    command_buffers: CommandBuffers,
    surface: vk::SurfaceKHR,
    device: Arc<Device>,
    instance: Arc<Instance>,
}

impl GpuFrameBackend {
    /// Builds the first chain at `extent` along with its auxiliary targets.
    ///
    /// # Errors
    ///
    /// Returns an error if the chain, command buffers or shadow pass cannot be
    /// created.
    pub fn new(
        instance: Arc<Instance>,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let chain = PresentationChain::create(&instance, device.clone(), surface, extent, None)?;
        let command_buffers = CommandBuffers::new(device.clone(), MAX_FRAMES_IN_FLIGHT as u32)?;
        let (_, depth_format) = chain.formats();
        let shadow = ShadowPass::new(device.clone(), depth_format, chain.extent())?;

        Ok(Self {
            shadow: Some(shadow),
            chain: Some(chain),
            command_buffers,
            surface,
            device,
            instance,
        })
    }

    /// The current chain; absent only after a failed recreation.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if the last recreation failed.
    pub fn chain(&self) -> RhiResult<&PresentationChain> {
        self.chain
            .as_ref()
            .ok_or_else(|| RhiError::InvalidHandle("presentation chain was not recreated".to_string()))
    }

    fn chain_mut(&mut self) -> RhiResult<&mut PresentationChain> {
        self.chain
            .as_mut()
            .ok_or_else(|| RhiError::InvalidHandle("presentation chain was not recreated".to_string()))
    }

    /// The shadow pass; absent only while a recreation is under way.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if called mid-recreation.
    pub fn shadow(&self) -> RhiResult<&ShadowPass> {
        self.shadow
            .as_ref()
            .ok_or_else(|| RhiError::InvalidHandle("shadow pass is being rebuilt".to_string()))
    }

    #[inline]
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    fn current_command_buffer(&self) -> RhiResult<CommandBuffer<'_>> {
        let frame = self.chain()?.current_frame();
        Ok(CommandBuffer::new(&self.device, self.command_buffers.get(frame)))
    }
}

impl FrameBackend for GpuFrameBackend {
    fn current_frame(&self) -> RhiResult<usize> {
        Ok(self.chain()?.current_frame())
    }

    fn acquire_next_image(&mut self) -> RhiResult<(u32, PresentStatus)> {
        self.chain()?.acquire_next_image()
    }

    fn begin_commands(&mut self) -> RhiResult<vk::CommandBuffer> {
        let cmd = self.current_command_buffer()?;
        cmd.reset()?;
        cmd.begin()?;
        Ok(cmd.handle())
    }

    fn end_commands(&mut self) -> RhiResult<()> {
        self.current_command_buffer()?.end()
    }

    fn submit(&mut self, image_index: u32) -> RhiResult<PresentStatus> {
        let cmd = self.command_buffers.get(self.chain()?.current_frame());
        self.chain_mut()?.submit(cmd, image_index)
    }

    fn attachment_formats(&self) -> RhiResult<AttachmentFormats> {
        Ok(self.chain()?.formats())
    }

    fn recreate_chain(&mut self, extent: vk::Extent2D) -> RhiResult<()> {
        self.device.wait_idle()?;
        self.shadow = None;

        // The retired chain is consumed by create; on failure no chain is left.
        let chain = PresentationChain::create(
            &self.instance,
            self.device.clone(),
            self.surface,
            extent,
            self.chain.take(),
        )?;
        self.chain = Some(chain);
        Ok(())
    }

    fn rebuild_auxiliary(&mut self) -> RhiResult<()> {
        let chain = self.chain()?;
        let (_, depth_format) = chain.formats();
        let shadow = ShadowPass::new(self.device.clone(), depth_format, chain.extent())?;
        self.shadow = Some(shadow);
        Ok(())
    }
}
