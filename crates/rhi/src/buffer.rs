//! GPU buffer management.
//!
//! Vertex and index buffers live in device-local memory and are filled once
//! through a staging buffer and a one-shot submission. Uniform buffers are
//! host-visible, persistently mapped for their whole life and flushed after
//! each write when the backing memory is not host-coherent.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vkframe_rhi::buffer::{Buffer, BufferUsage};
//! use vkframe_rhi::device::Device;
//!
//! # fn example(device: Arc<Device>) -> Result<(), vkframe_rhi::RhiError> {
//! let uniforms = Buffer::new(device.clone(), BufferUsage::Uniform, 256)?;
//! uniforms.write_data(0, &[0u8; 64])?;
//! uniforms.flush(0, 64)?;
//!
//! let vertices = Buffer::new_device_local(device, BufferUsage::Vertex, &[0u8; 48])?;
//! assert_eq!(vertices.size(), 48);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use gpu_allocator::MemoryLocation;
use gpu_allocator::vulkan::{Allocation, AllocationCreateDesc, AllocationScheme};
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Buffer usage type.
///
/// Defines the intended use of the buffer, which affects
/// Vulkan usage flags and memory allocation strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    /// Vertex buffer - stores vertex data
    Vertex,
    /// Index buffer - stores index data
    Index,
    /// Uniform buffer - rewritten by the CPU every frame
    Uniform,
    /// Staging buffer - CPU-writable source for uploads
    Staging,
}

impl BufferUsage {
    /// Converts to Vulkan buffer usage flags.
    pub fn to_vk_usage(self) -> vk::BufferUsageFlags {
        match self {
            BufferUsage::Vertex => {
                vk::BufferUsageFlags::VERTEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Index => {
                vk::BufferUsageFlags::INDEX_BUFFER | vk::BufferUsageFlags::TRANSFER_DST
            }
            BufferUsage::Uniform => vk::BufferUsageFlags::UNIFORM_BUFFER,
            BufferUsage::Staging => vk::BufferUsageFlags::TRANSFER_SRC,
        }
    }

    /// Returns the preferred memory location for this buffer type.
    pub fn memory_location(self) -> MemoryLocation {
        match self {
            // Written once through staging
            BufferUsage::Vertex | BufferUsage::Index => MemoryLocation::GpuOnly,
            // Persistently mapped
            BufferUsage::Uniform | BufferUsage::Staging => MemoryLocation::CpuToGpu,
        }
    }

    /// Returns a human-readable name for the buffer type.
    pub fn name(self) -> &'static str {
        match self {
            BufferUsage::Vertex => "vertex",
            BufferUsage::Index => "index",
            BufferUsage::Uniform => "uniform",
            BufferUsage::Staging => "staging",
        }
    }
}

/// GPU buffer wrapper with managed memory.
///
/// Owns the Vulkan buffer and its gpu-allocator allocation; both are released
/// on drop. Host-visible allocations stay mapped until then.
pub struct Buffer {
    device: Arc<Device>,
    buffer: vk::Buffer,
    allocation: Option<Allocation>,
    size: vk::DeviceSize,
    usage: BufferUsage,
}

impl Buffer {
    /// Creates a new buffer with the specified size.
    ///
    /// # Errors
    ///
    /// Returns an error if `size` is zero or buffer/memory allocation fails.
    pub fn new(device: Arc<Device>, usage: BufferUsage, size: vk::DeviceSize) -> RhiResult<Self> {
        if size == 0 {
            return Err(RhiError::InvalidHandle(
                "Buffer size must be greater than 0".to_string(),
            ));
        }

        let buffer_info = vk::BufferCreateInfo::default()
            .size(size)
            .usage(usage.to_vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.handle().create_buffer(&buffer_info, None)? };

        let requirements = unsafe { device.handle().get_buffer_memory_requirements(buffer) };

        let allocation = {
            let mut allocator = device.allocator()?;
            allocator.allocate(&AllocationCreateDesc {
                name: usage.name(),
                requirements,
                location: usage.memory_location(),
                linear: true,
                allocation_scheme: AllocationScheme::GpuAllocatorManaged,
            })
        };
        let allocation = match allocation {
            Ok(allocation) => allocation,
            Err(e) => {
                unsafe { device.handle().destroy_buffer(buffer, None) };
                return Err(e.into());
            }
        };

        let bound = unsafe {
            device
                .handle()
                .bind_buffer_memory(buffer, allocation.memory(), allocation.offset())
        };

        let buffer = Self {
            device,
            buffer,
            allocation: Some(allocation),
            size,
            usage,
        };
        bound?;

        debug!("Created {} buffer: {} bytes", usage.name(), size);

        Ok(buffer)
    }

    /// Creates a device-local buffer filled with `data` through a staging copy.
    ///
    /// Blocks until the copy has completed on the graphics queue.
    ///
    /// # Errors
    ///
    /// Returns an error if either buffer cannot be created or the one-shot
    /// submission fails.
    pub fn new_device_local(
        device: Arc<Device>,
        usage: BufferUsage,
        data: &[u8],
    ) -> RhiResult<Self> {
        let size = data.len() as vk::DeviceSize;
        let staging = Self::new(device.clone(), BufferUsage::Staging, size)?;
        staging.write_data(0, data)?;
        staging.flush(0, size)?;

        let buffer = Self::new(device.clone(), usage, size)?;

        let region = vk::BufferCopy::default().size(size);
        device.submit_one_shot(|cmd| unsafe {
            device
                .handle()
                .cmd_copy_buffer(cmd, staging.handle(), buffer.handle(), &[region]);
        })?;

        Ok(buffer)
    }

    /// Writes data to the buffer at the specified offset.
    ///
    /// The buffer must use host-visible memory. Pair with [`Buffer::flush`]
    /// before the GPU reads the range.
    ///
    /// # Errors
    ///
    /// Returns an error if the memory is not mapped or the write would
    /// exceed the buffer size.
    pub fn write_data(&self, offset: vk::DeviceSize, data: &[u8]) -> RhiResult<()> {
        if data.is_empty() {
            return Ok(());
        }

        self.check_range(offset, data.len() as vk::DeviceSize)?;
        let mapped = self.mapped_slice_mut()?;
        let start = offset as usize;
        mapped[start..start + data.len()].copy_from_slice(data);

        Ok(())
    }

    /// Makes a host write visible to the device.
    ///
    /// No-op for host-coherent memory. Otherwise the range is widened to the
    /// device's non-coherent atom size before flushing.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    pub fn flush(&self, offset: vk::DeviceSize, size: vk::DeviceSize) -> RhiResult<()> {
        let allocation = self.allocation()?;
        if allocation
            .memory_properties()
            .contains(vk::MemoryPropertyFlags::HOST_COHERENT)
        {
            return Ok(());
        }

        let (flush_offset, flush_size) = flush_range(
            allocation.offset(),
            offset,
            size,
            allocation.size(),
            self.device.limits().non_coherent_atom_size,
        );
        let range = vk::MappedMemoryRange::default()
            .memory(unsafe { allocation.memory() })
            .offset(flush_offset)
            .size(flush_size);

        unsafe { self.device.handle().flush_mapped_memory_ranges(&[range])? };
        Ok(())
    }

    /// Returns the Vulkan buffer handle.
    #[inline]
    pub fn handle(&self) -> vk::Buffer {
        self.buffer
    }

    /// Returns the buffer size in bytes.
    #[inline]
    pub fn size(&self) -> vk::DeviceSize {
        self.size
    }

    /// Returns the buffer usage type.
    #[inline]
    pub fn usage(&self) -> BufferUsage {
        self.usage
    }

    fn allocation(&self) -> RhiResult<&Allocation> {
        self.allocation.as_ref().ok_or_else(|| {
            RhiError::InvalidHandle("Buffer allocation is not available".to_string())
        })
    }

    fn check_range(&self, offset: vk::DeviceSize, len: vk::DeviceSize) -> RhiResult<()> {
        if offset + len > self.size {
            return Err(RhiError::InvalidHandle(format!(
                "Access exceeds buffer size: offset {} + len {} > buffer {}",
                offset, len, self.size
            )));
        }
        Ok(())
    }

    #[allow(clippy::mut_from_ref)]
    fn mapped_slice_mut(&self) -> RhiResult<&mut [u8]> {
        let mapped_ptr = self
            .allocation()?
            .mapped_ptr()
            .ok_or_else(|| RhiError::InvalidHandle("Buffer memory is not mapped".to_string()))?;

        // The mapping covers at least `size` bytes and is only touched from the
        // thread recording the frame.
        Ok(unsafe {
            std::slice::from_raw_parts_mut(mapped_ptr.as_ptr() as *mut u8, self.size as usize)
        })
    }
}

/// Computes an atom-aligned flush range inside an allocation.
///
/// Returns `(memory_offset, size)` for a `VkMappedMemoryRange`, where
/// `memory_offset` is relative to the start of the device memory block.
pub fn flush_range(
    allocation_offset: vk::DeviceSize,
    offset: vk::DeviceSize,
    size: vk::DeviceSize,
    allocation_size: vk::DeviceSize,
    atom: vk::DeviceSize,
) -> (vk::DeviceSize, vk::DeviceSize) {
    let atom = atom.max(1);
    let start = allocation_offset + offset;
    let aligned_start = start - start % atom;
    let end = (start + size).min(allocation_offset + allocation_size);
    let aligned_end = end.div_ceil(atom) * atom;
    (aligned_start, aligned_end - aligned_start)
}

impl Drop for Buffer {
    fn drop(&mut self) {
        // Free allocation first, then destroy buffer
        if let Some(allocation) = self.allocation.take() {
            match self.device.allocator() {
                Ok(mut allocator) => {
                    if let Err(e) = allocator.free(allocation) {
                        tracing::error!("Failed to free buffer allocation: {:?}", e);
                    }
                }
                Err(e) => tracing::error!("Failed to free buffer allocation: {}", e),
            }
        }

        unsafe {
            self.device.handle().destroy_buffer(self.buffer, None);
        }

        debug!("Destroyed {} buffer", self.usage.name());
    }
}
