//! Per-frame uniform buffers and descriptor sets.
//!
//! Every frame-in-flight slot owns a full, independent copy of the data the
//! render subsystems bind, so the CPU can write slot `k` while the GPU still
//! reads the other slot.
//!
//! # Descriptor Layout
//!
//! ```text
//! set 0 (global, per slot)
//!   binding 0  GlobalUbo                 uniform buffer          vertex | fragment
//!   binding 1  LightUbo                  uniform buffer          vertex | fragment
//!   binding 2  shadow map                combined image sampler  fragment
//! set 1 (material, per slot)
//!   binding 0  MaterialUbo records       dynamic uniform buffer  fragment
//!   binding 1  material textures         sampler array           fragment, partially bound
//! ```
//!
//! Material records are packed at [`aligned_stride`] and selected per draw
//! with a dynamic offset. Record 0 is the default material; scene material
//! `k` lives in record `k + 1`.

use std::sync::Arc;

use ash::vk;
use bytemuck::Zeroable;
use tracing::{debug, info};

use vkframe_rhi::RhiResult;
use vkframe_rhi::buffer::{Buffer, BufferUsage};
use vkframe_rhi::descriptor::{DescriptorPool, DescriptorSetLayout, DescriptorWriter};
use vkframe_rhi::device::Device;
use vkframe_rhi::sync::MAX_FRAMES_IN_FLIGHT;

use crate::ubo::{GlobalUbo, LightUbo, MAX_TEXTURES, MaterialUbo};

/// Rounds `size` up to the next multiple of `alignment`.
///
/// An alignment of 0 means the device imposes none.
pub fn aligned_stride(size: u64, alignment: u64) -> u64 {
    if alignment == 0 {
        size
    } else {
        size.div_ceil(alignment) * alignment
    }
}

/// Packs `materials` into one buffer image, one record every `stride` bytes.
///
/// Padding between records is zeroed.
///
/// # Panics
///
/// Panics if `stride` is smaller than a record.
pub fn pack_materials(materials: &[MaterialUbo], stride: u64) -> Vec<u8> {
    let stride = stride as usize;
    assert!(
        stride >= MaterialUbo::SIZE,
        "material stride {stride} smaller than a record ({})",
        MaterialUbo::SIZE
    );
    let mut bytes = vec![0u8; materials.len() * stride];
    for (record, material) in bytes.chunks_exact_mut(stride).zip(materials) {
        record[..MaterialUbo::SIZE].copy_from_slice(bytemuck::bytes_of(material));
    }
    bytes
}

/// Dynamic offset of record `index` in a buffer packed at `stride`.
pub fn material_offset(index: usize, stride: u64) -> u32 {
    (index as u64 * stride) as u32
}

/// Reads the record at byte `offset` out of a buffer image built by
/// [`pack_materials`].
///
/// # Panics
///
/// Panics if the record lies outside `bytes`.
pub fn unpack_material(bytes: &[u8], offset: u32) -> MaterialUbo {
    let start = offset as usize;
    bytemuck::pod_read_unaligned(&bytes[start..start + MaterialUbo::SIZE])
}

/// Hands out elements of the material texture array.
///
/// Slots are assigned once at load time and never returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureSlotAllocator {
    capacity: u32,
    next: u32,
}

impl TextureSlotAllocator {
    pub fn new(capacity: u32) -> Self {
        Self { capacity, next: 0 }
    }

    /// Next free slot, or `None` when the array is full.
    pub fn allocate(&mut self) -> Option<u32> {
        if self.next >= self.capacity {
            return None;
        }
        let slot = self.next;
        self.next += 1;
        Some(slot)
    }

    pub fn allocated(&self) -> u32 {
        self.next
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

struct FrameSlot {
    global: Buffer,
    lights: Buffer,
    materials: Buffer,
    global_set: vk::DescriptorSet,
    material_set: vk::DescriptorSet,
}

/// Uniform buffers and descriptor sets for every frame-in-flight slot.
pub struct FrameResources {
    slots: Vec<FrameSlot>,
    _pool: DescriptorPool,
    global_layout: DescriptorSetLayout,
    material_layout: DescriptorSetLayout,
    material_stride: u64,
    material_capacity: usize,
    texture_slots: TextureSlotAllocator,
    device: Arc<Device>,
}

impl FrameResources {
    /// Allocates the buffers and sets for all slots.
    ///
    /// `max_materials` scene materials fit; one extra record holds the
    /// default material. `max_textures` is capped at [`MAX_TEXTURES`].
    ///
    /// # Errors
    ///
    /// Returns an error if any buffer, layout, pool or set cannot be created.
    pub fn new(device: Arc<Device>, max_materials: u32, max_textures: u32) -> RhiResult<Self> {
        let global_layout = DescriptorSetLayout::builder(device.clone())
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                1,
            )
            .add_binding(
                1,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                1,
            )
            .add_binding(
                2,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                1,
            )
            .build()?;

        let material_layout = DescriptorSetLayout::builder(device.clone())
            .add_binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                vk::ShaderStageFlags::FRAGMENT,
                1,
            )
            .add_partially_bound_binding(
                1,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
                MAX_TEXTURES,
            )
            .build()?;

        let slot_count = MAX_FRAMES_IN_FLIGHT as u32;
        let pool = DescriptorPool::builder(device.clone())
            .max_sets(slot_count * 2)
            .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER, slot_count * 2)
            .add_pool_size(vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC, slot_count)
            .add_pool_size(
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                slot_count * (1 + MAX_TEXTURES),
            )
            .build()?;

        let material_stride = aligned_stride(
            MaterialUbo::SIZE as u64,
            device.min_uniform_buffer_offset_alignment(),
        );
        let material_capacity = max_materials as usize + 1;

        let slots = (0..MAX_FRAMES_IN_FLIGHT)
            .map(|_| {
                let global = Buffer::new(device.clone(), BufferUsage::Uniform, GlobalUbo::SIZE as u64)?;
                let lights = Buffer::new(device.clone(), BufferUsage::Uniform, LightUbo::SIZE as u64)?;
                let materials = Buffer::new(
                    device.clone(),
                    BufferUsage::Uniform,
                    material_stride * material_capacity as u64,
                )?;
                let sets = pool.allocate(&[global_layout.handle(), material_layout.handle()])?;
                let (global_set, material_set) = (sets[0], sets[1]);

                DescriptorWriter::new()
                    .write_buffer(
                        0,
                        vk::DescriptorType::UNIFORM_BUFFER,
                        global.handle(),
                        0,
                        GlobalUbo::SIZE as u64,
                    )
                    .write_buffer(
                        1,
                        vk::DescriptorType::UNIFORM_BUFFER,
                        lights.handle(),
                        0,
                        LightUbo::SIZE as u64,
                    )
                    .update(&device, global_set);
                DescriptorWriter::new()
                    .write_buffer(
                        0,
                        vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                        materials.handle(),
                        0,
                        MaterialUbo::SIZE as u64,
                    )
                    .update(&device, material_set);

                Ok(FrameSlot {
                    global,
                    lights,
                    materials,
                    global_set,
                    material_set,
                })
            })
            .collect::<RhiResult<Vec<_>>>()?;

        let texture_capacity = max_textures.min(MAX_TEXTURES);
        info!(
            "Frame resources: {} slot(s), {} material record(s) at stride {}, {} texture slot(s)",
            slots.len(),
            material_capacity,
            material_stride,
            texture_capacity
        );

        let resources = Self {
            slots,
            _pool: pool,
            global_layout,
            material_layout,
            material_stride,
            material_capacity,
            texture_slots: TextureSlotAllocator::new(texture_capacity),
            device,
        };
        for slot in 0..MAX_FRAMES_IN_FLIGHT {
            resources.update_global(slot, &GlobalUbo::default())?;
            resources.update_lights(slot, &LightUbo::zeroed())?;
            resources.update_materials(slot, &[MaterialUbo::default()])?;
        }
        Ok(resources)
    }

    fn slot(&self, slot: usize) -> &FrameSlot {
        assert!(
            slot < MAX_FRAMES_IN_FLIGHT,
            "frame slot {slot} out of range (max {MAX_FRAMES_IN_FLIGHT})"
        );
        &self.slots[slot]
    }

    /// Writes the camera and shadow matrices for `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= MAX_FRAMES_IN_FLIGHT`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or flush fails.
    pub fn update_global(&self, slot: usize, data: &GlobalUbo) -> RhiResult<()> {
        let buffer = &self.slot(slot).global;
        buffer.write_data(0, bytemuck::bytes_of(data))?;
        buffer.flush(0, GlobalUbo::SIZE as u64)
    }

    /// Writes the light arrays and counts for `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= MAX_FRAMES_IN_FLIGHT`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or flush fails.
    pub fn update_lights(&self, slot: usize, data: &LightUbo) -> RhiResult<()> {
        let buffer = &self.slot(slot).lights;
        buffer.write_data(0, bytemuck::bytes_of(data))?;
        buffer.flush(0, LightUbo::SIZE as u64)
    }

    /// Writes material records `0..materials.len()` for `slot`.
    ///
    /// # Panics
    ///
    /// Panics if `slot >= MAX_FRAMES_IN_FLIGHT` or there are more records
    /// than the capacity fixed at creation.
    ///
    /// # Errors
    ///
    /// Returns an error if the write or flush fails.
    pub fn update_materials(&self, slot: usize, materials: &[MaterialUbo]) -> RhiResult<()> {
        assert!(
            materials.len() <= self.material_capacity,
            "{} material records exceed capacity {}",
            materials.len(),
            self.material_capacity
        );
        let buffer = &self.slot(slot).materials;
        let bytes = pack_materials(materials, self.material_stride);
        buffer.write_data(0, &bytes)?;
        buffer.flush(0, bytes.len() as u64)
    }

    /// Dynamic offset of material record `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is not below the capacity.
    pub fn material_offset(&self, index: usize) -> u32 {
        assert!(
            index < self.material_capacity,
            "material record {index} out of range (capacity {})",
            self.material_capacity
        );
        material_offset(index, self.material_stride)
    }

    /// Points binding 2 of every global set at the shadow map.
    ///
    /// Only call while no submitted frame references the sets.
    pub fn write_shadow_map(&self, view: vk::ImageView, sampler: vk::Sampler, layout: vk::ImageLayout) {
        for slot in &self.slots {
            DescriptorWriter::new()
                .write_image(2, view, sampler, layout)
                .update(&self.device, slot.global_set);
        }
        debug!("Shadow map bound for {} slot(s)", self.slots.len());
    }

    /// Claims a texture array element and binds `view` into it for every slot.
    ///
    /// Returns `None` when the array is full. Only call while no submitted
    /// frame references the sets.
    pub fn bind_texture(&mut self, view: vk::ImageView, sampler: vk::Sampler) -> Option<u32> {
        let element = self.texture_slots.allocate()?;
        for slot in &self.slots {
            DescriptorWriter::new()
                .write_image_at(
                    1,
                    element,
                    view,
                    sampler,
                    vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
                )
                .update(&self.device, slot.material_set);
        }
        Some(element)
    }

    pub fn global_layout(&self) -> &DescriptorSetLayout {
        &self.global_layout
    }

    pub fn material_layout(&self) -> &DescriptorSetLayout {
        &self.material_layout
    }

    pub fn global_set(&self, slot: usize) -> vk::DescriptorSet {
        self.slot(slot).global_set
    }

    pub fn material_set(&self, slot: usize) -> vk::DescriptorSet {
        self.slot(slot).material_set
    }

    /// Number of material records, the default record included.
    pub fn material_capacity(&self) -> usize {
        self.material_capacity
    }

    pub fn material_stride(&self) -> u64 {
        self.material_stride
    }

    pub fn texture_slots(&self) -> &TextureSlotAllocator {
        &self.texture_slots
    }
}
