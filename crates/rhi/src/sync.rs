//! Synchronization primitives for frames in flight.
//!
//! - [`Semaphore`]: GPU-to-GPU ordering (acquire → render → present)
//! - [`Fence`]: GPU-to-CPU completion signal, waited before a slot is reused
//! - [`FrameSync`]: the three primitives owned by one frame-in-flight slot
//!
//! All CPU-side waits are unbounded. A hung driver stalls the calling thread;
//! there is no timeout path.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkframe_rhi::device::Device;
//! use vkframe_rhi::sync::{FrameSync, MAX_FRAMES_IN_FLIGHT};
//!
//! # fn example(device: Arc<Device>) -> Result<(), vkframe_rhi::RhiError> {
//! let slots = FrameSync::create_slots(&device)?;
//! assert_eq!(slots.len(), MAX_FRAMES_IN_FLIGHT);
//!
//! // Before reusing slot 0
//! slots[0].in_flight_fence().wait()?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Number of frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Vulkan semaphore wrapper, destroyed on drop.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Creates a new binary semaphore.
    ///
    /// # Errors
    ///
    /// Returns an error if semaphore creation fails.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let create_info = vk::SemaphoreCreateInfo::default();

        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };

        Ok(Self { device, semaphore })
    }

    /// Returns the Vulkan semaphore handle.
    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Vulkan fence wrapper, destroyed on drop.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Creates a new fence, optionally already signaled.
    ///
    /// Slot fences start signaled so the first wait on a fresh slot returns
    /// immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if fence creation fails.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let flags = if signaled {
            vk::FenceCreateFlags::SIGNALED
        } else {
            vk::FenceCreateFlags::empty()
        };

        let create_info = vk::FenceCreateInfo::default().flags(flags);

        let fence = unsafe { device.handle().create_fence(&create_info, None)? };

        Ok(Self { device, fence })
    }

    /// Returns the Vulkan fence handle.
    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Blocks until the fence is signaled, without a timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the wait fails (e.g. device lost).
    pub fn wait(&self) -> RhiResult<()> {
        wait_for_fence(&self.device, self.fence)
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}

/// Blocks on a raw fence handle without a timeout.
///
/// Used for fences recorded by handle, such as the owner of a presentable
/// image that belongs to another frame slot.
///
/// # Errors
///
/// Returns an error if the wait fails.
pub fn wait_for_fence(device: &Device, fence: vk::Fence) -> RhiResult<()> {
    let fences = [fence];
    unsafe { device.handle().wait_for_fences(&fences, true, u64::MAX)? };
    Ok(())
}

/// Returns a raw fence handle to the unsignaled state.
///
/// # Errors
///
/// Returns an error if the reset fails.
pub fn reset_fence(device: &Device, fence: vk::Fence) -> RhiResult<()> {
    let fences = [fence];
    unsafe { device.handle().reset_fences(&fences)? };
    Ok(())
}

/// Synchronization primitives owned by one frame-in-flight slot.
///
/// - `image_available`: signaled by acquire, waited by the submission
/// - `render_finished`: signaled by the submission, waited by present
/// - `in_flight`: signaled when the slot's submission completes on the GPU
pub struct FrameSync {
    image_available_semaphore: Semaphore,
    render_finished_semaphore: Semaphore,
    in_flight_fence: Fence,
}

impl FrameSync {
    /// Creates the primitives for a single slot.
    ///
    /// # Errors
    ///
    /// Returns an error if any primitive cannot be created.
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let image_available_semaphore = Semaphore::new(device.clone())?;
        let render_finished_semaphore = Semaphore::new(device.clone())?;
        let in_flight_fence = Fence::new(device, true)?;

        Ok(Self {
            image_available_semaphore,
            render_finished_semaphore,
            in_flight_fence,
        })
    }

    /// Creates one [`FrameSync`] per frame-in-flight slot.
    ///
    /// # Errors
    ///
    /// Returns an error if any primitive cannot be created.
    pub fn create_slots(device: &Arc<Device>) -> RhiResult<Vec<Self>> {
        let slots = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| Self::new(device.clone()))
            .collect::<RhiResult<Vec<_>>>()?;
        debug!("Created synchronization for {} frame slot(s)", slots.len());
        Ok(slots)
    }

    /// Returns the fence guarding reuse of this slot.
    #[inline]
    pub fn in_flight_fence(&self) -> &Fence {
        &self.in_flight_fence
    }

    /// Returns the image-available semaphore handle.
    #[inline]
    pub fn image_available_handle(&self) -> vk::Semaphore {
        self.image_available_semaphore.handle()
    }

    /// Returns the render-finished semaphore handle.
    #[inline]
    pub fn render_finished_handle(&self) -> vk::Semaphore {
        self.render_finished_semaphore.handle()
    }

    /// Returns the in-flight fence handle.
    #[inline]
    pub fn in_flight_fence_handle(&self) -> vk::Fence {
        self.in_flight_fence.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_frames_in_flight_constant() {
        assert_eq!(MAX_FRAMES_IN_FLIGHT, 2);
    }

    #[test]
    fn test_sync_primitives_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Semaphore>();
        assert_send_sync::<Fence>();
        assert_send_sync::<FrameSync>();
    }
}
