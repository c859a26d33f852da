//! Frame orchestration: acquire, record, submit, present, recover.
//!
//! [`FrameOrchestrator`] is the state machine around one frame:
//!
//! ```text
//!            begin_frame                 end_frame
//!   Idle ─────────────────▶ InProgress ─────────────▶ Idle
//!     │ zero extent / out of date
//!     └──▶ (no frame, stays Idle)
//! ```
//!
//! It is generic over a [`FrameBackend`] so the sequencing and recovery rules
//! can be exercised without a GPU. [`crate::backend::GpuFrameBackend`] is the
//! Vulkan implementation.

use ash::vk;
use tracing::{info, trace};

use vkframe_platform::SurfaceSource;
use vkframe_rhi::swapchain::PresentStatus;
use vkframe_rhi::{RhiError, RhiResult};

use crate::presentation::AttachmentFormats;

/// Operations the orchestrator needs from the presentation side.
pub trait FrameBackend {
    /// Frame-in-flight slot the next frame uses.
    fn current_frame(&self) -> RhiResult<usize>;

    /// Waits for the current slot's fence and acquires a presentable image.
    fn acquire_next_image(&mut self) -> RhiResult<(u32, PresentStatus)>;

    /// Resets and begins the current slot's command buffer.
    fn begin_commands(&mut self) -> RhiResult<vk::CommandBuffer>;

    /// Ends the current slot's command buffer.
    fn end_commands(&mut self) -> RhiResult<()>;

    /// Submits the current slot's command buffer for `image_index` and
    /// presents. Advances the frame slot whatever the outcome.
    fn submit(&mut self, image_index: u32) -> RhiResult<PresentStatus>;

    /// Color and depth formats of the current chain.
    fn attachment_formats(&self) -> RhiResult<AttachmentFormats>;

    /// Waits for the device to go idle, releases extent-sized auxiliary
    /// targets, and replaces the chain with one built at `extent`.
    fn recreate_chain(&mut self, extent: vk::Extent2D) -> RhiResult<()>;

    /// Rebuilds the auxiliary targets for the current chain's extent.
    fn rebuild_auxiliary(&mut self) -> RhiResult<()>;
}

/// Counters kept across the orchestrator's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Frames submitted and handed to the presentation engine.
    pub presented: u64,
    /// `begin_frame` calls that produced no frame.
    pub skipped: u64,
    /// Completed chain recreations.
    pub recreations: u64,
}

/// A frame that is being recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveFrame {
    /// Command buffer to record into; valid until `end_frame`.
    pub command_buffer: vk::CommandBuffer,
    /// Presentable image this frame renders into.
    pub image_index: u32,
    /// Frame-in-flight slot whose per-frame resources this frame may write.
    pub frame_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Idle,
    InProgress { image_index: u32 },
}

/// Drives the per-frame loop over a [`FrameBackend`].
pub struct FrameOrchestrator<B> {
    backend: B,
    state: FrameState,
    stats: FrameStats,
}

impl<B: FrameBackend> FrameOrchestrator<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            state: FrameState::Idle,
            stats: FrameStats::default(),
        }
    }

    /// Starts a frame.
    ///
    /// Returns `Ok(None)` when there is nothing to draw into: the drawable is
    /// zero-sized, or the chain was out of date and has just been rebuilt.
    /// The caller skips this iteration.
    ///
    /// # Panics
    ///
    /// Panics if a frame is already in progress.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting, acquiring, recreation or command buffer
    /// setup fails.
    pub fn begin_frame(&mut self, surface: &mut impl SurfaceSource) -> RhiResult<Option<ActiveFrame>> {
        assert_eq!(
            self.state,
            FrameState::Idle,
            "begin_frame called while a frame is in progress"
        );

        let extent = surface.drawable_extent();
        if extent.width == 0 || extent.height == 0 {
            self.stats.skipped += 1;
            trace!("Skipping frame: drawable is {}x{}", extent.width, extent.height);
            return Ok(None);
        }

        let (image_index, status) = self.backend.acquire_next_image()?;
        if status == PresentStatus::OutOfDate {
            self.recreate(surface, "out of date on acquire")?;
            self.stats.skipped += 1;
            trace!("Skipping frame after acquire reported out of date");
            return Ok(None);
        }

        let command_buffer = self.backend.begin_commands()?;
        let frame_index = self.backend.current_frame()?;
        self.state = FrameState::InProgress { image_index };

        Ok(Some(ActiveFrame {
            command_buffer,
            image_index,
            frame_index,
        }))
    }

    /// Finishes the frame started by [`begin_frame`](Self::begin_frame),
    /// submits and presents it.
    ///
    /// Out-of-date and suboptimal presents, and pending resize requests,
    /// rebuild the chain here; the returned status is informational.
    ///
    /// # Panics
    ///
    /// Panics if no frame is in progress.
    ///
    /// # Errors
    ///
    /// Returns an error if submission, presentation or recreation fails.
    pub fn end_frame(&mut self, surface: &mut impl SurfaceSource) -> RhiResult<PresentStatus> {
        let FrameState::InProgress { image_index } = self.state else {
            panic!("end_frame called without a frame in progress");
        };
        self.state = FrameState::Idle;

        self.backend.end_commands()?;
        let status = self.backend.submit(image_index)?;
        if status != PresentStatus::OutOfDate {
            self.stats.presented += 1;
        }

        let resized = surface.take_resize_request();
        if status.needs_recreation() || resized {
            let reason = match status {
                PresentStatus::OutOfDate => "out of date on present",
                PresentStatus::Suboptimal => "suboptimal present",
                PresentStatus::Optimal => "window resized",
            };
            self.recreate(surface, reason)?;
        }

        Ok(status)
    }

    /// Rebuilds the chain once the drawable has a non-zero size.
    fn recreate(&mut self, surface: &mut impl SurfaceSource, reason: &str) -> RhiResult<()> {
        let mut extent = surface.drawable_extent();
        while extent.width == 0 || extent.height == 0 {
            surface.wait_for_events();
            extent = surface.drawable_extent();
        }
        // This recreation covers any resize reported so far.
        surface.take_resize_request();

        let expected = self.backend.attachment_formats()?;
        self.backend.recreate_chain(extent)?;
        let found = self.backend.attachment_formats()?;
        if found != expected {
            return Err(RhiError::FormatMismatch { expected, found });
        }
        self.backend.rebuild_auxiliary()?;

        self.stats.recreations += 1;
        info!(
            "Recreated presentation chain ({reason}): {}x{}, recreation #{}",
            extent.width, extent.height, self.stats.recreations
        );
        Ok(())
    }

    /// True between `begin_frame` returning a frame and `end_frame`.
    pub fn is_frame_in_progress(&self) -> bool {
        matches!(self.state, FrameState::InProgress { .. })
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_flight::InFlightTracker;
    use crate::in_flight::tests::SimulatedQueue;
    use std::collections::VecDeque;
    use vkframe_rhi::sync::MAX_FRAMES_IN_FLIGHT;

    const COLOR: vk::Format = vk::Format::B8G8R8A8_SRGB;
    const DEPTH: vk::Format = vk::Format::D32_SFLOAT;

    /// Backend whose "GPU" finishes work only when a fence is waited on.
    struct MockBackend {
        tracker: InFlightTracker<usize>,
        queue: SimulatedQueue,
        next_image: u32,
        acquire_script: VecDeque<PresentStatus>,
        formats: AttachmentFormats,
        formats_after_recreate: Option<AttachmentFormats>,
        recording: bool,
        acquire_waits: u64,
        chain_rebuilds: u64,
        auxiliary_rebuilds: u64,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                tracker: InFlightTracker::new(3),
                queue: SimulatedQueue::default(),
                next_image: 0,
                acquire_script: VecDeque::new(),
                formats: (COLOR, DEPTH),
                formats_after_recreate: None,
                recording: false,
                acquire_waits: 0,
                chain_rebuilds: 0,
                auxiliary_rebuilds: 0,
            }
        }
    }

    impl FrameBackend for MockBackend {
        fn current_frame(&self) -> RhiResult<usize> {
            Ok(self.tracker.current_frame())
        }

        fn acquire_next_image(&mut self) -> RhiResult<(u32, PresentStatus)> {
            self.queue.wait_slot(self.tracker.current_frame());
            self.acquire_waits += 1;
            let status = self.acquire_script.pop_front().unwrap_or(PresentStatus::Optimal);
            let image = self.next_image;
            self.next_image = (self.next_image + 1) % self.tracker.image_count() as u32;
            Ok((image, status))
        }

        fn begin_commands(&mut self) -> RhiResult<vk::CommandBuffer> {
            assert!(
                self.queue.in_flight[self.tracker.current_frame()].is_none(),
                "recording over pending work"
            );
            self.recording = true;
            Ok(vk::CommandBuffer::null())
        }

        fn end_commands(&mut self) -> RhiResult<()> {
            assert!(self.recording);
            self.recording = false;
            Ok(())
        }

        fn submit(&mut self, image_index: u32) -> RhiResult<PresentStatus> {
            self.tracker.submit_frame(&mut self.queue, image_index)
        }

        fn attachment_formats(&self) -> RhiResult<AttachmentFormats> {
            Ok(self.formats)
        }

        fn recreate_chain(&mut self, _extent: vk::Extent2D) -> RhiResult<()> {
            self.queue.drain();
            self.tracker = InFlightTracker::new(3);
            if let Some(formats) = self.formats_after_recreate {
                self.formats = formats;
            }
            self.chain_rebuilds += 1;
            Ok(())
        }

        fn rebuild_auxiliary(&mut self) -> RhiResult<()> {
            self.auxiliary_rebuilds += 1;
            Ok(())
        }
    }

    struct TestSurface {
        extent: vk::Extent2D,
        resize_requested: bool,
        restore_after_waits: Option<(u32, vk::Extent2D)>,
        waits: u32,
    }

    impl TestSurface {
        fn new(width: u32, height: u32) -> Self {
            Self {
                extent: vk::Extent2D { width, height },
                resize_requested: false,
                restore_after_waits: None,
                waits: 0,
            }
        }
    }

    impl SurfaceSource for TestSurface {
        fn drawable_extent(&self) -> vk::Extent2D {
            self.extent
        }

        fn wait_for_events(&mut self) {
            self.waits += 1;
            if let Some((after, extent)) = self.restore_after_waits {
                if self.waits >= after {
                    self.extent = extent;
                    self.resize_requested = true;
                }
            }
        }

        fn take_resize_request(&mut self) -> bool {
            std::mem::take(&mut self.resize_requested)
        }
    }

    fn run_frame(
        orchestrator: &mut FrameOrchestrator<MockBackend>,
        surface: &mut TestSurface,
    ) -> Option<PresentStatus> {
        let frame = orchestrator.begin_frame(surface).unwrap()?;
        assert!(frame.frame_index < MAX_FRAMES_IN_FLIGHT);
        Some(orchestrator.end_frame(surface).unwrap())
    }

    #[test]
    fn test_waits_match_submissions() {
        let mut orchestrator = FrameOrchestrator::new(MockBackend::new());
        let mut surface = TestSurface::new(800, 600);
        for _ in 0..50 {
            run_frame(&mut orchestrator, &mut surface);
        }
        let backend = orchestrator.backend();
        assert_eq!(backend.queue.submits(), 50);
        assert_eq!(backend.acquire_waits, backend.queue.submits());
        assert!(backend.queue.max_outstanding <= MAX_FRAMES_IN_FLIGHT);
        assert_eq!(orchestrator.stats().presented, 50);
    }

    #[test]
    fn test_zero_extent_skips_without_acquiring() {
        let mut orchestrator = FrameOrchestrator::new(MockBackend::new());
        let mut surface = TestSurface::new(0, 0);
        assert!(orchestrator.begin_frame(&mut surface).unwrap().is_none());
        assert!(orchestrator.begin_frame(&mut surface).unwrap().is_none());
        assert_eq!(orchestrator.backend().acquire_waits, 0);
        assert_eq!(orchestrator.stats().skipped, 2);
        assert!(!orchestrator.is_frame_in_progress());
    }

    #[test]
    fn test_minimize_then_restore_recreates_once() {
        let mut orchestrator = FrameOrchestrator::new(MockBackend::new());
        let mut surface = TestSurface::new(800, 600);
        run_frame(&mut orchestrator, &mut surface);

        surface.extent = vk::Extent2D { width: 0, height: 0 };
        surface.resize_requested = true;
        for _ in 0..5 {
            assert!(run_frame(&mut orchestrator, &mut surface).is_none());
        }

        surface.extent = vk::Extent2D { width: 1024, height: 768 };
        surface.resize_requested = true;
        for _ in 0..5 {
            run_frame(&mut orchestrator, &mut surface);
        }

        let stats = orchestrator.stats();
        assert_eq!(stats.recreations, 1);
        assert_eq!(stats.skipped, 5);
        assert_eq!(stats.presented, 6);
        assert_eq!(orchestrator.backend().auxiliary_rebuilds, 1);
    }

    #[test]
    fn test_out_of_date_acquire_skips_one_frame() {
        let mut backend = MockBackend::new();
        backend.acquire_script = [PresentStatus::Optimal, PresentStatus::OutOfDate].into();
        let mut orchestrator = FrameOrchestrator::new(backend);
        let mut surface = TestSurface::new(640, 480);

        assert!(run_frame(&mut orchestrator, &mut surface).is_some());
        assert!(run_frame(&mut orchestrator, &mut surface).is_none());
        assert!(run_frame(&mut orchestrator, &mut surface).is_some());

        let stats = orchestrator.stats();
        assert_eq!(stats.recreations, 1);
        assert_eq!(stats.presented, 2);
        assert_eq!(stats.skipped, 1);
    }

    #[test]
    fn test_suboptimal_present_recreates() {
        let mut backend = MockBackend::new();
        backend.queue.present_script = [PresentStatus::Suboptimal].into();
        let mut orchestrator = FrameOrchestrator::new(backend);
        let mut surface = TestSurface::new(640, 480);

        assert_eq!(
            run_frame(&mut orchestrator, &mut surface),
            Some(PresentStatus::Suboptimal)
        );
        assert_eq!(orchestrator.stats().recreations, 1);
        assert_eq!(orchestrator.stats().presented, 1);
    }

    #[test]
    fn test_recreation_waits_for_nonzero_extent() {
        let mut backend = MockBackend::new();
        backend.queue.present_script = [PresentStatus::OutOfDate].into();
        let mut orchestrator = FrameOrchestrator::new(backend);
        let mut surface = TestSurface::new(640, 480);

        let frame = orchestrator.begin_frame(&mut surface).unwrap();
        assert!(frame.is_some());
        surface.extent = vk::Extent2D { width: 0, height: 0 };
        surface.restore_after_waits = Some((3, vk::Extent2D { width: 320, height: 240 }));

        assert_eq!(
            orchestrator.end_frame(&mut surface).unwrap(),
            PresentStatus::OutOfDate
        );
        assert_eq!(surface.waits, 3);
        assert!(!surface.resize_requested);
        assert_eq!(orchestrator.stats().recreations, 1);
        assert_eq!(orchestrator.stats().presented, 0);
    }

    #[test]
    fn test_format_change_is_fatal() {
        let mut backend = MockBackend::new();
        backend.acquire_script = [PresentStatus::OutOfDate].into();
        backend.formats_after_recreate = Some((vk::Format::R8G8B8A8_UNORM, DEPTH));
        let mut orchestrator = FrameOrchestrator::new(backend);
        let mut surface = TestSurface::new(640, 480);

        match orchestrator.begin_frame(&mut surface) {
            Err(RhiError::FormatMismatch { expected, found }) => {
                assert_eq!(expected, (COLOR, DEPTH));
                assert_eq!(found, (vk::Format::R8G8B8A8_UNORM, DEPTH));
            }
            other => panic!("expected a format mismatch, got {other:?}"),
        }
        assert_eq!(orchestrator.backend().auxiliary_rebuilds, 0);
    }

    #[test]
    #[should_panic(expected = "frame is in progress")]
    fn test_double_begin_panics() {
        let mut orchestrator = FrameOrchestrator::new(MockBackend::new());
        let mut surface = TestSurface::new(640, 480);
        let _ = orchestrator.begin_frame(&mut surface);
        let _ = orchestrator.begin_frame(&mut surface);
    }

    #[test]
    #[should_panic(expected = "without a frame in progress")]
    fn test_end_without_begin_panics() {
        let mut orchestrator = FrameOrchestrator::new(MockBackend::new());
        let mut surface = TestSurface::new(640, 480);
        let _ = orchestrator.end_frame(&mut surface);
    }
}
