//! Headless frame backend and surface shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;

use ash::vk;

use vkframe_platform::SurfaceSource;
use vkframe_renderer::{
    AttachmentFormats, FrameBackend, InFlightTracker, MAX_FRAMES_IN_FLIGHT, SubmitQueue, Submission,
};
use vkframe_rhi::RhiResult;
use vkframe_rhi::swapchain::PresentStatus;

pub const COLOR: vk::Format = vk::Format::B8G8R8A8_SRGB;
pub const DEPTH: vk::Format = vk::Format::D32_SFLOAT;

/// GPU stand-in whose fences are slot indices: work submitted in a slot
/// stays in flight until that slot's fence is waited on.
#[derive(Default)]
pub struct SimulatedGpu {
    in_flight: [Option<u32>; MAX_FRAMES_IN_FLIGHT],
    pub present_script: VecDeque<PresentStatus>,
    pub fence_waits: u64,
    pub submits: u64,
    pub max_outstanding: usize,
}

impl SimulatedGpu {
    /// Device idle: everything in flight completes.
    pub fn drain(&mut self) {
        self.in_flight = [None; MAX_FRAMES_IN_FLIGHT];
    }

    pub fn is_busy(&self, slot: usize) -> bool {
        self.in_flight[slot].is_some()
    }

    fn outstanding(&self) -> usize {
        self.in_flight.iter().filter(|image| image.is_some()).count()
    }
}

impl SubmitQueue for SimulatedGpu {
    type Fence = usize;

    fn slot_fence(&self, slot: usize) -> usize {
        slot
    }

    fn wait_fence(&mut self, fence: usize) -> RhiResult<()> {
        self.fence_waits += 1;
        self.in_flight[fence] = None;
        Ok(())
    }

    fn reset_fence(&mut self, fence: usize) -> RhiResult<()> {
        assert!(!self.is_busy(fence), "fence {fence} reset while its work is in flight");
        Ok(())
    }

    fn submit(&mut self, submission: Submission<usize>) -> RhiResult<()> {
        assert_eq!(submission.wait_stage, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(submission.signal_fence, submission.slot);
        for (slot, image) in self.in_flight.iter().enumerate() {
            assert_ne!(
                *image,
                Some(submission.image_index),
                "image {} written while slot {slot} still renders into it",
                submission.image_index
            );
        }
        self.in_flight[submission.slot] = Some(submission.image_index);
        self.submits += 1;
        self.max_outstanding = self.max_outstanding.max(self.outstanding());
        Ok(())
    }

    fn present(&mut self, _slot: usize, _image_index: u32) -> RhiResult<PresentStatus> {
        Ok(self.present_script.pop_front().unwrap_or(PresentStatus::Optimal))
    }
}

/// Records the order of backend calls and runs submissions through the
/// shared submit sequence against a [`SimulatedGpu`].
pub struct HeadlessBackend {
    tracker: InFlightTracker<usize>,
    pub gpu: SimulatedGpu,
    image_count: u32,
    next_image: u32,
    /// Images handed out by acquire, in order; round-robin once exhausted.
    pub image_script: VecDeque<u32>,
    pub acquire_script: VecDeque<PresentStatus>,
    pub acquire_waits: u64,
    pub extents: Vec<vk::Extent2D>,
    pub log: Vec<&'static str>,
}

impl HeadlessBackend {
    pub fn new(image_count: u32) -> Self {
        Self {
            tracker: InFlightTracker::new(image_count as usize),
            gpu: SimulatedGpu::default(),
            image_count,
            next_image: 0,
            image_script: VecDeque::new(),
            acquire_script: VecDeque::new(),
            acquire_waits: 0,
            extents: Vec::new(),
            log: Vec::new(),
        }
    }

    /// Schedules `status` for the acquire of frame `frame` (0-based).
    pub fn acquire_at(&mut self, frame: usize, status: PresentStatus) {
        while self.acquire_script.len() < frame {
            self.acquire_script.push_back(PresentStatus::Optimal);
        }
        self.acquire_script.push_back(status);
    }
}

impl FrameBackend for HeadlessBackend {
    fn current_frame(&self) -> RhiResult<usize> {
        Ok(self.tracker.current_frame())
    }

    fn acquire_next_image(&mut self) -> RhiResult<(u32, PresentStatus)> {
        self.log.push("acquire");
        let fence = self.gpu.slot_fence(self.tracker.current_frame());
        self.gpu.wait_fence(fence)?;
        self.acquire_waits += 1;
        let image = match self.image_script.pop_front() {
            Some(image) => image,
            None => {
                let image = self.next_image;
                self.next_image = (self.next_image + 1) % self.image_count;
                image
            }
        };
        let status = self.acquire_script.pop_front().unwrap_or(PresentStatus::Optimal);
        Ok((image, status))
    }

    fn begin_commands(&mut self) -> RhiResult<vk::CommandBuffer> {
        self.log.push("begin");
        assert!(
            !self.gpu.is_busy(self.tracker.current_frame()),
            "command buffer reset while its work is pending"
        );
        Ok(vk::CommandBuffer::null())
    }

    fn end_commands(&mut self) -> RhiResult<()> {
        self.log.push("end");
        Ok(())
    }

    fn submit(&mut self, image_index: u32) -> RhiResult<PresentStatus> {
        self.log.push("submit");
        self.tracker.submit_frame(&mut self.gpu, image_index)
    }

    fn attachment_formats(&self) -> RhiResult<AttachmentFormats> {
        Ok((COLOR, DEPTH))
    }

    fn recreate_chain(&mut self, extent: vk::Extent2D) -> RhiResult<()> {
        self.log.push("recreate");
        self.gpu.drain();
        self.tracker = InFlightTracker::new(self.image_count as usize);
        self.next_image = 0;
        self.extents.push(extent);
        Ok(())
    }

    fn rebuild_auxiliary(&mut self) -> RhiResult<()> {
        self.log.push("auxiliary");
        Ok(())
    }
}

/// Window stand-in with a scripted drawable size.
pub struct ScriptedSurface {
    pub extent: vk::Extent2D,
    pub resize_requested: bool,
    pub event_waits: u32,
}

impl ScriptedSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            extent: vk::Extent2D { width, height },
            resize_requested: false,
            event_waits: 0,
        }
    }

    /// Changes the drawable size and raises the resize flag, as a window
    /// event would.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.extent = vk::Extent2D { width, height };
        self.resize_requested = true;
    }
}

impl SurfaceSource for ScriptedSurface {
    fn drawable_extent(&self) -> vk::Extent2D {
        self.extent
    }

    fn wait_for_events(&mut self) {
        self.event_waits += 1;
        assert!(self.event_waits < 1000, "drawable never became visible");
    }

    fn take_resize_request(&mut self) -> bool {
        std::mem::take(&mut self.resize_requested)
    }
}
