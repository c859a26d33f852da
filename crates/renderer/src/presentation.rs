//! Presentation chain: swapchain, main render pass and per-slot sync.
//!
//! A [`PresentationChain`] owns everything tied to one swapchain generation:
//!
//! - the swapchain and its color views
//! - the main depth attachment and render pass
//! - one framebuffer per presentable image
//! - the per-slot fences and semaphores
//! - the image-in-flight map
//!
//! # Synchronization Flow
//!
//! ```text
//! acquire:  wait slot fence -> acquire image (signals image_available)
//! submit:   claim image -> wait its previous owner -> reset slot fence
//!           -> queue submit (waits image_available at color output,
//!              signals render_finished and the slot fence)
//!           -> present (waits render_finished) -> advance slot
//! ```
//!
//! Resizing builds a whole new chain with the old one moved in as
//! `previous`; the old one is released inside [`PresentationChain::create`]
//! and the device must be idle at that point.

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use vkframe_rhi::RhiResult;
use vkframe_rhi::device::Device;
use vkframe_rhi::image::{Image, find_depth_format};
use vkframe_rhi::instance::Instance;
use vkframe_rhi::render_pass::{Framebuffer, RenderPass};
use vkframe_rhi::swapchain::{PresentStatus, Swapchain};
use vkframe_rhi::sync::{FrameSync, reset_fence, wait_for_fence};

use crate::in_flight::{InFlightTracker, SubmitQueue, Submission};

/// Color and depth formats of a chain's attachments.
pub type AttachmentFormats = (vk::Format, vk::Format);

/// One generation of presentable images and the state to render into them.
///
/// Fields are declared in release order: framebuffers, then the views and
/// images, then the sync primitives, then the render pass.
pub struct PresentationChain {
    framebuffers: Vec<Framebuffer>,
    swapchain: Swapchain,
    depth: Image,
    sync: Vec<FrameSync>,
    render_pass: RenderPass,
    tracker: InFlightTracker<vk::Fence>,
    device: Arc<Device>,
}

impl PresentationChain {
    /// Builds a chain for `surface` at (at most) `requested_extent`.
    ///
    /// When `previous` is given its swapchain is handed to the platform as
    /// the old swapchain, and `previous` is dropped as soon as the new
    /// swapchain exists. The device must be idle.
    ///
    /// # Errors
    ///
    /// Returns [`vkframe_rhi::RhiError::ChainCreation`] if the platform
    /// rejects the configuration, or any error from attachment creation.
    pub fn create(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        requested_extent: vk::Extent2D,
        previous: Option<PresentationChain>,
    ) -> RhiResult<Self> {
        let swapchain = Swapchain::new(
            instance,
            device.clone(),
            surface,
            requested_extent,
            previous.as_ref().map(|chain| &chain.swapchain),
        )?;
        if previous.is_some() {
            drop(previous);
            debug!("Retired previous presentation chain");
        }
        let extent = swapchain.extent();

        let depth_format = find_depth_format(instance, &device)?;
        let depth = Image::depth_attachment(device.clone(), "main depth", extent, depth_format, false)?;

        let render_pass = RenderPass::presentation(device.clone(), swapchain.format(), depth_format)?;

        let framebuffers = swapchain
            .image_views()
            .iter()
            .map(|&view| {
                Framebuffer::new(
                    device.clone(),
                    &render_pass,
                    &[view, depth.image_view()],
                    extent,
                )
            })
            .collect::<RhiResult<Vec<_>>>()?;

        let sync = FrameSync::create_slots(&device)?;
        let tracker = InFlightTracker::new(swapchain.image_count());

        info!(
            "Presentation chain ready: {}x{}, color {:?}, depth {:?}, {} image(s)",
            extent.width,
            extent.height,
            swapchain.format(),
            depth_format,
            swapchain.image_count()
        );

        Ok(Self {
            framebuffers,
            swapchain,
            depth,
            sync,
            render_pass,
            tracker,
            device,
        })
    }

    /// Waits for the current slot's previous submission, then acquires the
    /// next presentable image.
    ///
    /// Both waits are unbounded. An [`PresentStatus::OutOfDate`] status means
    /// no image was acquired and the chain must be rebuilt.
    ///
    /// # Errors
    ///
    /// Returns an error for device failures other than out-of-date.
    pub fn acquire_next_image(&self) -> RhiResult<(u32, PresentStatus)> {
        let sync = &self.sync[self.tracker.current_frame()];
        sync.in_flight_fence().wait()?;
        let (image_index, status) = self
            .swapchain
            .acquire_next_image(sync.image_available_handle())?;
        if status == PresentStatus::OutOfDate {
            debug!("Swapchain out of date during acquire");
        }
        Ok((image_index, status))
    }

    /// Submits `command_buffer` for `image_index` and presents it.
    ///
    /// The frame slot advances whatever the present result.
    ///
    /// # Errors
    ///
    /// Returns an error if a fence wait, the submission, or the present fails
    /// for a reason other than out-of-date/suboptimal.
    pub fn submit(
        &mut self,
        command_buffer: vk::CommandBuffer,
        image_index: u32,
    ) -> RhiResult<PresentStatus> {
        let mut queue = ChainQueue {
            device: &self.device,
            swapchain: &self.swapchain,
            sync: &self.sync,
            command_buffer,
        };
        self.tracker.submit_frame(&mut queue, image_index)
    }

    #[inline]
    pub fn current_frame(&self) -> usize {
        self.tracker.current_frame()
    }

    #[inline]
    pub fn render_pass(&self) -> &RenderPass {
        &self.render_pass
    }

    /// Framebuffer targeting presentable image `image_index`.
    ///
    /// # Panics
    ///
    /// Panics if `image_index` was not produced by this chain.
    pub fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize].handle()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    pub fn formats(&self) -> AttachmentFormats {
        (self.swapchain.format(), self.depth.format())
    }
}

/// Graphics and present queues as seen by one chain's submit sequence.
struct ChainQueue<'a> {
    device: &'a Device,
    swapchain: &'a Swapchain,
    sync: &'a [FrameSync],
    command_buffer: vk::CommandBuffer,
}

impl SubmitQueue for ChainQueue<'_> {
    type Fence = vk::Fence;

    fn slot_fence(&self, slot: usize) -> vk::Fence {
        self.sync[slot].in_flight_fence_handle()
    }

    fn wait_fence(&mut self, fence: vk::Fence) -> RhiResult<()> {
        wait_for_fence(self.device, fence)
    }

    fn reset_fence(&mut self, fence: vk::Fence) -> RhiResult<()> {
        reset_fence(self.device, fence)
    }

    fn submit(&mut self, submission: Submission<vk::Fence>) -> RhiResult<()> {
        let sync = &self.sync[submission.slot];
        let wait_semaphores = [sync.image_available_handle()];
        let wait_stages = [submission.wait_stage];
        let signal_semaphores = [sync.render_finished_handle()];
        let command_buffers = [self.command_buffer];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        // SAFETY: the buffer was recorded for this slot, the fence was just
        // reset, and image_available was signaled by this slot's acquire.
        unsafe {
            self.device
                .submit_graphics(&[submit_info], submission.signal_fence)
        }
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentStatus> {
        self.swapchain.present(
            self.device.present_queue(),
            image_index,
            self.sync[slot].render_finished_handle(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_takes_previous_chain_by_value() {
        // Recreation hands the retired chain over; nothing else can keep it.
        let _create: fn(
            &Instance,
            Arc<Device>,
            vk::SurfaceKHR,
            vk::Extent2D,
            Option<PresentationChain>,
        ) -> RhiResult<PresentationChain> = PresentationChain::create;
    }

    #[test]
    fn test_presentation_chain_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<PresentationChain>();
    }
}
