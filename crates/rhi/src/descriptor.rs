//! Descriptor set layouts, pools and writes.
//!
//! - [`DescriptorSetLayoutBuilder`] collects bindings (optionally partially
//!   bound, for fixed-capacity texture arrays) into a [`DescriptorSetLayout`]
//! - [`DescriptorPoolBuilder`] sizes a [`DescriptorPool`]
//! - [`DescriptorWriter`] batches buffer and image writes into one update
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use ash::vk;
//! use vkframe_rhi::device::Device;
//! use vkframe_rhi::descriptor::{DescriptorPool, DescriptorSetLayout, DescriptorWriter};
//!
//! # fn example(device: Arc<Device>, ubo: vk::Buffer) -> Result<(), vkframe_rhi::RhiError> {
//! let layout = DescriptorSetLayout::builder(device.clone())
//!     .add_binding(0, vk::DescriptorType::UNIFORM_BUFFER, vk::ShaderStageFlags::ALL_GRAPHICS, 1)
//!     .build()?;
//!
//! let pool = DescriptorPool::builder(device.clone())
//!     .max_sets(2)
//!     .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, 2)
//!     .build()?;
//!
//! let set = pool.allocate(&[layout.handle()])?[0];
//! DescriptorWriter::new()
//!     .write_buffer(0, vk::DescriptorType::UNIFORM_BUFFER, ubo, 0, vk::WHOLE_SIZE)
//!     .update(&device, set);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::RhiResult;

/// Descriptor set layout wrapper.
pub struct DescriptorSetLayout {
    device: Arc<Device>,
    layout: vk::DescriptorSetLayout,
    binding_count: usize,
}

impl DescriptorSetLayout {
    /// Starts a layout description.
    pub fn builder(device: Arc<Device>) -> DescriptorSetLayoutBuilder {
        DescriptorSetLayoutBuilder {
            device,
            bindings: Vec::new(),
            binding_flags: Vec::new(),
        }
    }

    /// Returns the Vulkan descriptor set layout handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    /// Returns the number of declared bindings.
    #[inline]
    pub fn binding_count(&self) -> usize {
        self.binding_count
    }
}

impl Drop for DescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_set_layout(self.layout, None);
        }
        debug!("Destroyed descriptor set layout");
    }
}

/// Collects bindings for a [`DescriptorSetLayout`].
pub struct DescriptorSetLayoutBuilder {
    device: Arc<Device>,
    bindings: Vec<vk::DescriptorSetLayoutBinding<'static>>,
    binding_flags: Vec<vk::DescriptorBindingFlags>,
}

impl DescriptorSetLayoutBuilder {
    /// Declares a binding.
    ///
    /// # Panics
    ///
    /// Panics if `binding` was already declared.
    pub fn add_binding(
        self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stages: vk::ShaderStageFlags,
        count: u32,
    ) -> Self {
        self.push(binding, descriptor_type, stages, count, vk::DescriptorBindingFlags::empty())
    }

    /// Declares an array binding whose elements may stay unwritten.
    ///
    /// # Panics
    ///
    /// Panics if `binding` was already declared.
    pub fn add_partially_bound_binding(
        self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stages: vk::ShaderStageFlags,
        count: u32,
    ) -> Self {
        self.push(
            binding,
            descriptor_type,
            stages,
            count,
            vk::DescriptorBindingFlags::PARTIALLY_BOUND,
        )
    }

    fn push(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stages: vk::ShaderStageFlags,
        count: u32,
        flags: vk::DescriptorBindingFlags,
    ) -> Self {
        assert!(
            self.bindings.iter().all(|b| b.binding != binding),
            "binding {binding} declared twice"
        );
        self.bindings.push(
            vk::DescriptorSetLayoutBinding::default()
                .binding(binding)
                .descriptor_type(descriptor_type)
                .descriptor_count(count)
                .stage_flags(stages),
        );
        self.binding_flags.push(flags);
        self
    }

    /// Creates the layout.
    ///
    /// # Errors
    ///
    /// Returns an error if layout creation fails.
    pub fn build(self) -> RhiResult<DescriptorSetLayout> {
        let mut flags_info =
            vk::DescriptorSetLayoutBindingFlagsCreateInfo::default().binding_flags(&self.binding_flags);

        let mut create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(&self.bindings);
        if self.binding_flags.iter().any(|f| !f.is_empty()) {
            create_info = create_info.push_next(&mut flags_info);
        }

        let layout = unsafe {
            self.device
                .handle()
                .create_descriptor_set_layout(&create_info, None)?
        };

        debug!(
            "Created descriptor set layout with {} binding(s)",
            self.bindings.len()
        );

        Ok(DescriptorSetLayout {
            device: self.device,
            layout,
            binding_count: self.bindings.len(),
        })
    }
}

/// Descriptor pool for allocating descriptor sets.
///
/// Sets are never freed individually; they live as long as the pool.
pub struct DescriptorPool {
    device: Arc<Device>,
    pool: vk::DescriptorPool,
    max_sets: u32,
}

impl DescriptorPool {
    /// Starts a pool description.
    pub fn builder(device: Arc<Device>) -> DescriptorPoolBuilder {
        DescriptorPoolBuilder {
            device,
            max_sets: 1000,
            pool_sizes: Vec::new(),
        }
    }

    /// Allocates one set per entry of `layouts`.
    ///
    /// # Errors
    ///
    /// Returns an error if allocation fails (e.g., pool exhausted).
    pub fn allocate(
        &self,
        layouts: &[vk::DescriptorSetLayout],
    ) -> RhiResult<Vec<vk::DescriptorSet>> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.pool)
            .set_layouts(layouts);

        let sets = unsafe { self.device.handle().allocate_descriptor_sets(&alloc_info)? };

        debug!("Allocated {} descriptor set(s)", sets.len());

        Ok(sets)
    }

    /// Returns the Vulkan descriptor pool handle.
    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.pool
    }

    /// Returns the maximum number of sets the pool can hand out.
    #[inline]
    pub fn max_sets(&self) -> u32 {
        self.max_sets
    }
}

impl Drop for DescriptorPool {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_descriptor_pool(self.pool, None);
        }
        debug!("Destroyed descriptor pool");
    }
}

/// Sizes a [`DescriptorPool`].
pub struct DescriptorPoolBuilder {
    device: Arc<Device>,
    max_sets: u32,
    pool_sizes: Vec<vk::DescriptorPoolSize>,
}

impl DescriptorPoolBuilder {
    /// Reserves `count` descriptors of `descriptor_type`.
    pub fn add_pool_size(mut self, descriptor_type: vk::DescriptorType, count: u32) -> Self {
        self.pool_sizes.push(
            vk::DescriptorPoolSize::default()
                .ty(descriptor_type)
                .descriptor_count(count),
        );
        self
    }

    /// Sets the maximum number of sets.
    pub fn max_sets(mut self, max_sets: u32) -> Self {
        self.max_sets = max_sets;
        self
    }

    /// Creates the pool.
    ///
    /// # Errors
    ///
    /// Returns an error if pool creation fails.
    pub fn build(self) -> RhiResult<DescriptorPool> {
        let create_info = vk::DescriptorPoolCreateInfo::default()
            .max_sets(self.max_sets)
            .pool_sizes(&self.pool_sizes);

        let pool = unsafe {
            self.device
                .handle()
                .create_descriptor_pool(&create_info, None)?
        };

        debug!(
            "Created descriptor pool: max_sets={}, pool_sizes={}",
            self.max_sets,
            self.pool_sizes.len()
        );

        Ok(DescriptorPool {
            device: self.device,
            pool,
            max_sets: self.max_sets,
        })
    }
}

enum PendingWrite {
    Buffer {
        binding: u32,
        descriptor_type: vk::DescriptorType,
        info: vk::DescriptorBufferInfo,
    },
    Image {
        binding: u32,
        array_element: u32,
        descriptor_type: vk::DescriptorType,
        info: vk::DescriptorImageInfo,
    },
}

/// Batches descriptor writes for a single set.
#[derive(Default)]
pub struct DescriptorWriter {
    writes: Vec<PendingWrite>,
}

impl DescriptorWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Points `binding` at `range` bytes of `buffer` starting at `offset`.
    ///
    /// For dynamic uniform buffers `range` is the size of one record.
    pub fn write_buffer(
        mut self,
        binding: u32,
        descriptor_type: vk::DescriptorType,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        range: vk::DeviceSize,
    ) -> Self {
        self.writes.push(PendingWrite::Buffer {
            binding,
            descriptor_type,
            info: vk::DescriptorBufferInfo {
                buffer,
                offset,
                range,
            },
        });
        self
    }

    /// Writes a combined image sampler into element 0 of `binding`.
    pub fn write_image(
        self,
        binding: u32,
        image_view: vk::ImageView,
        sampler: vk::Sampler,
        layout: vk::ImageLayout,
    ) -> Self {
        self.write_image_at(binding, 0, image_view, sampler, layout)
    }

    /// Writes a combined image sampler into `array_element` of `binding`.
    pub fn write_image_at(
        mut self,
        binding: u32,
        array_element: u32,
        image_view: vk::ImageView,
        sampler: vk::Sampler,
        layout: vk::ImageLayout,
    ) -> Self {
        self.writes.push(PendingWrite::Image {
            binding,
            array_element,
            descriptor_type: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            info: vk::DescriptorImageInfo {
                sampler,
                image_view,
                image_layout: layout,
            },
        });
        self
    }

    /// Returns the number of pending writes.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    /// Returns true if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    /// Applies every pending write to `set`.
    ///
    /// The set must not be in use by pending GPU work.
    pub fn update(self, device: &Device, set: vk::DescriptorSet) {
        if self.writes.is_empty() {
            return;
        }

        let writes: Vec<vk::WriteDescriptorSet<'_>> = self
            .writes
            .iter()
            .map(|pending| match pending {
                PendingWrite::Buffer {
                    binding,
                    descriptor_type,
                    info,
                } => vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .descriptor_type(*descriptor_type)
                    .buffer_info(std::slice::from_ref(info)),
                PendingWrite::Image {
                    binding,
                    array_element,
                    descriptor_type,
                    info,
                } => vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(*binding)
                    .dst_array_element(*array_element)
                    .descriptor_type(*descriptor_type)
                    .image_info(std::slice::from_ref(info)),
            })
            .collect();

        unsafe {
            device.handle().update_descriptor_sets(&writes, &[]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_collects_writes() {
        let writer = DescriptorWriter::new()
            .write_buffer(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::Buffer::null(),
                0,
                vk::WHOLE_SIZE,
            )
            .write_image_at(
                1,
                3,
                vk::ImageView::null(),
                vk::Sampler::null(),
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            );
        assert_eq!(writer.len(), 2);
        assert!(!writer.is_empty());
        assert!(DescriptorWriter::new().is_empty());
    }

    #[test]
    fn test_write_image_targets_element_zero() {
        let writer = DescriptorWriter::new().write_image(
            2,
            vk::ImageView::null(),
            vk::Sampler::null(),
            vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL,
        );
        match &writer.writes[0] {
            PendingWrite::Image {
                binding,
                array_element,
                descriptor_type,
                info,
            } => {
                assert_eq!(*binding, 2);
                assert_eq!(*array_element, 0);
                assert_eq!(*descriptor_type, vk::DescriptorType::COMBINED_IMAGE_SAMPLER);
                assert_eq!(
                    info.image_layout,
                    vk::ImageLayout::DEPTH_STENCIL_READ_ONLY_OPTIMAL
                );
            }
            PendingWrite::Buffer { .. } => panic!("expected an image write"),
        }
    }

    #[test]
    fn test_descriptor_wrappers_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DescriptorSetLayout>();
        assert_send_sync::<DescriptorPool>();
    }
}
