//! Image-in-flight bookkeeping.
//!
//! The presentation engine may hand out images in any order and the number
//! of images need not match the number of frame slots. Before new work is
//! submitted against an image, whatever fence last claimed that image has to
//! be waited on; [`InFlightTracker`] records those claims.
//!
//! [`InFlightTracker::submit_frame`] runs the whole submit sequence against a
//! [`SubmitQueue`]:
//!
//! ```text
//! claim image -> wait previous owner -> reset slot fence
//!   -> submit (waits image_available at color output, signals
//!      render_finished and the slot fence)
//!   -> present (waits render_finished) -> advance slot
//! ```

use ash::vk;

use vkframe_rhi::RhiResult;
use vkframe_rhi::swapchain::PresentStatus;
use vkframe_rhi::sync::MAX_FRAMES_IN_FLIGHT;

/// One queue submission issued by [`InFlightTracker::submit_frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission<F> {
    /// Frame slot whose command buffer and semaphores are used.
    pub slot: usize,
    /// Presentable image the command buffer renders into.
    pub image_index: u32,
    /// Stage at which the slot's image-available semaphore is waited.
    pub wait_stage: vk::PipelineStageFlags,
    /// Fence the GPU signals when the submission completes.
    pub signal_fence: F,
}

/// Fence and queue operations the submit sequence is built from.
///
/// The Vulkan implementation lives in [`crate::presentation`]; tests use a
/// simulated GPU.
pub trait SubmitQueue {
    type Fence: Copy + PartialEq;

    /// Fence owned by frame slot `slot`.
    fn slot_fence(&self, slot: usize) -> Self::Fence;

    /// Blocks until `fence` is signaled.
    fn wait_fence(&mut self, fence: Self::Fence) -> RhiResult<()>;

    /// Returns `fence` to the unsignaled state.
    fn reset_fence(&mut self, fence: Self::Fence) -> RhiResult<()>;

    /// Submits the slot's command buffer, waiting on its image-available
    /// semaphore and signaling its render-finished semaphore and
    /// `submission.signal_fence`.
    fn submit(&mut self, submission: Submission<Self::Fence>) -> RhiResult<()>;

    /// Presents `image_index`, waiting on `slot`'s render-finished semaphore.
    fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentStatus>;
}

/// Frame-slot index plus image-to-fence ownership map.
///
/// Generic over the fence type so the bookkeeping can run without a GPU.
#[derive(Debug, Clone)]
pub struct InFlightTracker<F> {
    images_in_flight: Vec<Option<F>>,
    current_frame: usize,
}

impl<F: Copy + PartialEq> InFlightTracker<F> {
    /// Starts at frame slot 0 with no image claimed.
    pub fn new(image_count: usize) -> Self {
        Self {
            images_in_flight: vec![None; image_count],
            current_frame: 0,
        }
    }

    /// Frame slot whose resources the next frame uses.
    #[inline]
    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn image_count(&self) -> usize {
        self.images_in_flight.len()
    }

    /// Fence that last claimed `image_index`, if any.
    pub fn owner_of(&self, image_index: u32) -> Option<F> {
        self.images_in_flight
            .get(image_index as usize)
            .copied()
            .flatten()
    }

    /// Records `fence` as the owner of `image_index`.
    ///
    /// Returns the previous owner, which the caller must wait on before
    /// submitting. `None` if the image was never claimed.
    ///
    /// # Panics
    ///
    /// Panics if `image_index` is out of range.
    pub fn claim_image(&mut self, image_index: u32, fence: F) -> Option<F> {
        let count = self.images_in_flight.len();
        let slot = self
            .images_in_flight
            .get_mut(image_index as usize)
            .unwrap_or_else(|| panic!("image index {image_index} out of range ({count} images)"));
        slot.replace(fence)
    }

    /// Moves to the next frame slot.
    pub fn advance(&mut self) {
        self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
    }

    /// Submits the current slot's work for `image_index` and presents it.
    ///
    /// Waits on the image's previous owner before the slot fence is reset,
    /// so the image is never written while earlier work still reads it. The
    /// slot advances whether or not any step fails.
    ///
    /// # Errors
    ///
    /// Returns the first error from a fence operation, the submission or the
    /// present.
    ///
    /// # Panics
    ///
    /// Panics if `image_index` is out of range.
    pub fn submit_frame<Q>(&mut self, queue: &mut Q, image_index: u32) -> RhiResult<PresentStatus>
    where
        Q: SubmitQueue<Fence = F>,
    {
        let slot = self.current_frame;
        let fence = queue.slot_fence(slot);
        let previous_owner = self.claim_image(image_index, fence);

        let result = (|| -> RhiResult<PresentStatus> {
            if let Some(owner) = previous_owner {
                queue.wait_fence(owner)?;
            }
            queue.reset_fence(fence)?;
            queue.submit(Submission {
                slot,
                image_index,
                wait_stage: vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT,
                signal_fence: fence,
            })?;
            queue.present(slot, image_index)
        })();

        self.advance();
        result
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use vkframe_rhi::RhiError;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum QueueOp {
        Wait(usize),
        Reset(usize),
        Submit(usize),
        Present(usize, u32),
    }

    /// GPU stand-in whose fences are slot indices. Work submitted in a slot
    /// stays in flight until that slot's fence is waited on.
    #[derive(Debug, Default)]
    pub(crate) struct SimulatedQueue {
        /// Image each slot's unfinished submission renders into.
        pub in_flight: [Option<u32>; MAX_FRAMES_IN_FLIGHT],
        pub log: Vec<QueueOp>,
        pub submissions: Vec<Submission<usize>>,
        pub fence_waits: u64,
        pub max_outstanding: usize,
        pub present_script: VecDeque<PresentStatus>,
        pub fail_present: bool,
    }

    impl SimulatedQueue {
        /// The CPU-side wait acquire performs on the slot fence.
        pub fn wait_slot(&mut self, slot: usize) {
            let fence = self.slot_fence(slot);
            self.wait_fence(fence).unwrap();
        }

        /// Device idle: everything in flight completes.
        pub fn drain(&mut self) {
            self.in_flight = [None; MAX_FRAMES_IN_FLIGHT];
        }

        pub fn submits(&self) -> u64 {
            self.submissions.len() as u64
        }

        fn outstanding(&self) -> usize {
            self.in_flight.iter().filter(|image| image.is_some()).count()
        }
    }

    impl SubmitQueue for SimulatedQueue {
        type Fence = usize;

        fn slot_fence(&self, slot: usize) -> usize {
            slot
        }

        fn wait_fence(&mut self, fence: usize) -> RhiResult<()> {
            self.log.push(QueueOp::Wait(fence));
            self.fence_waits += 1;
            self.in_flight[fence] = None;
            Ok(())
        }

        fn reset_fence(&mut self, fence: usize) -> RhiResult<()> {
            self.log.push(QueueOp::Reset(fence));
            assert!(
                self.in_flight[fence].is_none(),
                "fence {fence} reset while its work is in flight"
            );
            Ok(())
        }

        fn submit(&mut self, submission: Submission<usize>) -> RhiResult<()> {
            self.log.push(QueueOp::Submit(submission.slot));
            for (slot, image) in self.in_flight.iter().enumerate() {
                assert_ne!(
                    *image,
                    Some(submission.image_index),
                    "image {} written while slot {slot} still renders into it",
                    submission.image_index
                );
            }
            self.in_flight[submission.slot] = Some(submission.image_index);
            self.submissions.push(submission);
            self.max_outstanding = self.max_outstanding.max(self.outstanding());
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> RhiResult<PresentStatus> {
            self.log.push(QueueOp::Present(slot, image_index));
            if self.fail_present {
                return Err(RhiError::SurfaceError("surface lost".to_string()));
            }
            Ok(self.present_script.pop_front().unwrap_or(PresentStatus::Optimal))
        }
    }

    /// Acquire's slot wait followed by the submit sequence.
    fn run_frame(
        tracker: &mut InFlightTracker<usize>,
        queue: &mut SimulatedQueue,
        image_index: u32,
    ) -> RhiResult<PresentStatus> {
        queue.wait_slot(tracker.current_frame());
        tracker.submit_frame(queue, image_index)
    }

    #[test]
    fn test_advance_wraps() {
        let mut tracker = InFlightTracker::<u32>::new(3);
        let visited: Vec<_> = (0..5)
            .map(|_| {
                let frame = tracker.current_frame();
                tracker.advance();
                frame
            })
            .collect();
        assert_eq!(visited, [0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_claim_returns_previous_owner() {
        let mut tracker = InFlightTracker::new(3);
        assert_eq!(tracker.claim_image(2, 10u32), None);
        assert_eq!(tracker.owner_of(2), Some(10));
        assert_eq!(tracker.claim_image(2, 11), Some(10));
        assert_eq!(tracker.owner_of(2), Some(11));
        assert_eq!(tracker.owner_of(0), None);
    }

    #[test]
    fn test_more_images_than_slots() {
        // Three images, two slots: image 0 is reclaimed by a different slot's
        // fence than the one that first rendered into it.
        let mut tracker = InFlightTracker::new(3);
        let fences = ['a', 'b'];
        let mut previous = Vec::new();
        for image in [0u32, 1, 2, 0] {
            let fence = fences[tracker.current_frame()];
            previous.push(tracker.claim_image(image, fence));
            tracker.advance();
        }
        assert_eq!(previous, [None, None, None, Some('a')]);
        assert_eq!(tracker.owner_of(0), Some('b'));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_claim_out_of_range_panics() {
        let mut tracker = InFlightTracker::new(2);
        tracker.claim_image(2, 0u8);
    }

    #[test]
    fn test_submit_waits_previous_owner_before_reset() {
        let mut tracker = InFlightTracker::new(3);
        let mut queue = SimulatedQueue::default();

        // The same image twice in a row: slot 1 must wait for slot 0's work.
        run_frame(&mut tracker, &mut queue, 0).unwrap();
        queue.log.clear();
        run_frame(&mut tracker, &mut queue, 0).unwrap();

        assert_eq!(
            queue.log,
            [
                QueueOp::Wait(1),
                QueueOp::Wait(0),
                QueueOp::Reset(1),
                QueueOp::Submit(1),
                QueueOp::Present(1, 0),
            ]
        );
        assert_eq!(tracker.owner_of(0), Some(1));
        assert_eq!(tracker.current_frame(), 0);
    }

    #[test]
    fn test_unclaimed_image_skips_owner_wait() {
        let mut tracker = InFlightTracker::new(3);
        let mut queue = SimulatedQueue::default();
        tracker.submit_frame(&mut queue, 2).unwrap();
        assert_eq!(
            queue.log,
            [QueueOp::Reset(0), QueueOp::Submit(0), QueueOp::Present(0, 2)]
        );
    }

    #[test]
    fn test_submission_waits_at_color_output() {
        let mut tracker = InFlightTracker::new(2);
        let mut queue = SimulatedQueue::default();
        run_frame(&mut tracker, &mut queue, 1).unwrap();
        run_frame(&mut tracker, &mut queue, 0).unwrap();

        for (slot, submission) in queue.submissions.iter().enumerate() {
            assert_eq!(submission.slot, slot);
            assert_eq!(submission.signal_fence, slot);
            assert_eq!(
                submission.wait_stage,
                vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
            );
        }
        assert_eq!(queue.submissions[0].image_index, 1);
        assert_eq!(queue.submissions[1].image_index, 0);
    }

    #[test]
    fn test_failed_present_still_advances() {
        let mut tracker = InFlightTracker::new(2);
        let mut queue = SimulatedQueue {
            fail_present: true,
            ..Default::default()
        };
        assert!(run_frame(&mut tracker, &mut queue, 0).is_err());
        assert_eq!(tracker.current_frame(), 1);
        assert!(run_frame(&mut tracker, &mut queue, 1).is_err());
        assert_eq!(tracker.current_frame(), 0);
    }

    #[test]
    fn test_present_status_is_returned() {
        let mut tracker = InFlightTracker::new(2);
        let mut queue = SimulatedQueue {
            present_script: [PresentStatus::Suboptimal, PresentStatus::OutOfDate].into(),
            ..Default::default()
        };
        assert_eq!(run_frame(&mut tracker, &mut queue, 0).unwrap(), PresentStatus::Suboptimal);
        assert_eq!(run_frame(&mut tracker, &mut queue, 1).unwrap(), PresentStatus::OutOfDate);
        assert_eq!(tracker.current_frame(), 0);
    }

    #[test]
    fn test_outstanding_work_bounded_by_slots() {
        let mut tracker = InFlightTracker::new(3);
        let mut queue = SimulatedQueue::default();
        // An irregular image order, including immediate repeats.
        let images = [0u32, 0, 1, 2, 2, 1, 0, 1, 1, 2];
        for image in images.iter().cycle().take(100) {
            run_frame(&mut tracker, &mut queue, *image).unwrap();
        }
        assert_eq!(queue.submits(), 100);
        assert!(queue.max_outstanding <= MAX_FRAMES_IN_FLIGHT);
        assert!(queue.fence_waits >= queue.submits());
    }
}
