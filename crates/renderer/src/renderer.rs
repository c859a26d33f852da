//! Top-level renderer.
//!
//! [`Renderer`] owns the graphics stack for one window and exposes a single
//! per-iteration entry point, [`Renderer::draw_frame`].
//!
//! # Resource Destruction Order
//!
//! `Drop` waits for the device to go idle; fields then drop in declaration
//! order:
//!
//! 1. Frame orchestrator (presentation chain, command buffers, shadow pass)
//! 2. Render subsystems (pipelines and layouts)
//! 3. Per-frame resources (uniform buffers, descriptor pool and layouts)
//! 4. Meshes, textures, sampler
//! 5. Logical device (last `Arc`)
//! 6. Surface
//! 7. Instance

use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, trace, warn};

use vkframe_core::{RenderMode, RendererConfig};
use vkframe_platform::{Surface, SurfaceSource, Window};
use vkframe_rhi::command::CommandBuffer;
use vkframe_rhi::device::Device;
use vkframe_rhi::image::{Image, Sampler};
use vkframe_rhi::instance::Instance;
use vkframe_rhi::physical_device::select_physical_device;
use vkframe_rhi::render_pass::presentation_clear_values;
use vkframe_rhi::{RhiError, RhiResult};
use vkframe_scene::Scene;

use crate::backend::GpuFrameBackend;
use crate::frame_info::FrameInfo;
use crate::frame_resources::FrameResources;
use crate::mesh::GpuMesh;
use crate::orchestrator::{FrameOrchestrator, FrameStats};
use crate::shadow_pass::ShadowPass;
use crate::systems::{self, RenderSystems, SystemContext};
use crate::ubo::{GlobalUbo, GridPushConstants, LightUbo, MaterialUbo, light_view_projection};

/// Renders a [`Scene`] into one window.
pub struct Renderer {
    orchestrator: FrameOrchestrator<GpuFrameBackend>,
    systems: RenderSystems,
    frame_resources: FrameResources,
    meshes: Vec<GpuMesh>,
    textures: Vec<Image>,
    texture_sampler: Sampler,
    config: RendererConfig,
    render_mode: RenderMode,
    /// Recreation count the shadow map descriptors were last written for.
    shadow_generation: u64,
    device: Arc<Device>,
    _surface: Surface,
    instance: Arc<Instance>,
}

impl Renderer {
    /// Creates the full graphics stack for `window`.
    ///
    /// # Errors
    ///
    /// Returns an error if any GPU object cannot be created or a shader is
    /// missing from the configured shader directory.
    pub fn new(window: &Window, config: &RendererConfig) -> RhiResult<Self> {
        let surface_extensions = window
            .required_extensions()
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;
        let instance = Arc::new(Instance::new(
            &config.window.title,
            config.renderer.validation,
            &surface_extensions,
        )?);

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SurfaceError(e.to_string()))?;

        let physical_device_info =
            select_physical_device(instance.handle(), surface.handle(), surface.loader())?;
        let device = Device::new(&instance, &physical_device_info)?;

        let extent = window.drawable_extent();
        let backend = GpuFrameBackend::new(instance.clone(), device.clone(), surface.handle(), extent)?;

        let frame_resources = FrameResources::new(
            device.clone(),
            config.renderer.max_materials,
            config.renderer.max_textures,
        )?;

        let systems = RenderSystems::new(&SystemContext {
            device: &device,
            shader_dir: &config.renderer.shader_dir,
            render_pass: backend.chain()?.render_pass().handle(),
            shadow_render_pass: backend.shadow()?.render_pass().handle(),
            global_layout: frame_resources.global_layout().handle(),
            material_layout: frame_resources.material_layout().handle(),
        })?;

        let (view, sampler) = backend.shadow()?.sampled_view();
        frame_resources.write_shadow_map(view, sampler, ShadowPass::SAMPLED_LAYOUT);

        let texture_sampler = Sampler::linear(device.clone())?;

        info!(
            "Renderer initialized: {} presentable image(s), mode {}",
            backend.chain()?.image_count(),
            config.renderer.render_mode.label()
        );

        Ok(Self {
            orchestrator: FrameOrchestrator::new(backend),
            systems,
            frame_resources,
            meshes: Vec::new(),
            textures: Vec::new(),
            texture_sampler,
            config: config.clone(),
            render_mode: config.renderer.render_mode,
            shadow_generation: 0,
            device,
            _surface: surface,
            instance,
        })
    }

    /// Uploads every mesh of `scene`, replacing previously uploaded meshes.
    ///
    /// Mesh `k` of the scene becomes GPU mesh `k`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] if the scene has more materials
    /// than the configured capacity, or any upload error.
    pub fn upload_scene(&mut self, scene: &Scene) -> RhiResult<()> {
        let capacity = self.config.renderer.max_materials as usize;
        if scene.materials().len() > capacity {
            return Err(RhiError::InvalidHandle(format!(
                "scene has {} materials, capacity is {capacity}",
                scene.materials().len()
            )));
        }

        self.device.wait_idle()?;
        self.meshes = scene
            .meshes()
            .iter()
            .map(|mesh| GpuMesh::upload(self.device.clone(), mesh))
            .collect::<RhiResult<Vec<_>>>()?;

        info!(
            "Uploaded {} mesh(es), {} material(s)",
            self.meshes.len(),
            scene.materials().len()
        );
        Ok(())
    }

    /// Uploads an RGBA8 texture and assigns it a slot in the material
    /// texture array.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::InvalidHandle`] when every slot is taken or the
    /// pixel data does not match `extent`, or any upload error.
    pub fn register_texture(
        &mut self,
        name: &'static str,
        extent: vk::Extent2D,
        pixels: &[u8],
    ) -> RhiResult<u32> {
        let texture_slots = self.frame_resources.texture_slots();
        if texture_slots.allocated() >= texture_slots.capacity() {
            return Err(RhiError::InvalidHandle(format!(
                "{name}: all {} texture slots are taken",
                texture_slots.capacity()
            )));
        }

        self.device.wait_idle()?;
        let image = Image::texture_rgba8(self.device.clone(), name, extent, pixels)?;
        let slot = self
            .frame_resources
            .bind_texture(image.image_view(), self.texture_sampler.handle())
            .ok_or_else(|| RhiError::InvalidHandle(format!("{name}: no texture slot left")))?;
        self.textures.push(image);

        debug!("Texture '{}' bound to slot {}", name, slot);
        Ok(slot)
    }

    /// Renders and presents one frame of `scene`.
    ///
    /// Does nothing when no frame can be produced (minimized window, or the
    /// presentation chain was just rebuilt).
    ///
    /// # Panics
    ///
    /// Panics if the scene has more materials than the configured capacity.
    ///
    /// # Errors
    ///
    /// Returns an error for any unrecoverable GPU failure; the caller should
    /// stop the loop and drop the renderer.
    pub fn draw_frame(
        &mut self,
        surface: &mut impl SurfaceSource,
        scene: &Scene,
        delta_time: f32,
    ) -> RhiResult<()> {
        self.refresh_shadow_binding()?;

        let Some(frame) = self.orchestrator.begin_frame(surface)? else {
            return Ok(());
        };
        trace!(
            "Frame slot {} image {} ({:.2} ms)",
            frame.frame_index,
            frame.image_index,
            delta_time * 1000.0
        );

        let backend = self.orchestrator.backend();
        let chain = backend.chain()?;
        let extent = chain.extent();

        let mut camera = scene.camera.clone();
        camera.set_viewport(extent.width, extent.height);
        let view_projection = camera.view_projection_matrix();
        let global = GlobalUbo::new(
            camera.projection_matrix(),
            camera.view_matrix(),
            light_view_projection(scene, view_projection),
        );
        self.frame_resources.update_global(frame.frame_index, &global)?;

        let mut lights = LightUbo::default();
        systems::update_lights(scene, &mut lights);
        self.frame_resources.update_lights(frame.frame_index, &lights)?;

        let materials: Vec<MaterialUbo> = std::iter::once(MaterialUbo::default())
            .chain(scene.materials().iter().map(MaterialUbo::from))
            .collect();
        self.frame_resources.update_materials(frame.frame_index, &materials)?;

        let info = FrameInfo {
            cmd: CommandBuffer::new(&self.device, frame.command_buffer),
            frame_index: frame.frame_index,
            scene,
            meshes: &self.meshes,
            resources: &self.frame_resources,
            lights: &lights,
            grid: GridPushConstants {
                near: self.config.renderer.grid_near,
                far: self.config.renderer.grid_far,
            },
        };
        let cmd = &info.cmd;

        if systems::uses_shadow_pass(self.render_mode) {
            let shadow = backend.shadow()?;
            cmd.begin_render_pass(
                shadow.render_pass().handle(),
                shadow.framebuffer(),
                shadow.extent(),
                &ShadowPass::clear_values(),
            );
            cmd.set_viewport_and_scissor(shadow.extent());
            if self.config.renderer.shadows {
                self.systems.record_shadow(&info);
            }
            cmd.end_render_pass();
        }

        cmd.begin_render_pass(
            chain.render_pass().handle(),
            chain.framebuffer(frame.image_index),
            extent,
            &presentation_clear_values(self.config.renderer.clear_color),
        );
        cmd.set_viewport_and_scissor(extent);
        self.systems.record_main(self.render_mode, &info);
        cmd.end_render_pass();

        self.orchestrator.end_frame(surface)?;
        Ok(())
    }

    /// Rebinds the shadow map after the chain (and with it the map) was
    /// rebuilt. The device is idle at this point: recreation waits for it and
    /// nothing has been submitted since.
    fn refresh_shadow_binding(&mut self) -> RhiResult<()> {
        let generation = self.orchestrator.stats().recreations;
        if generation == self.shadow_generation {
            return Ok(());
        }
        let (view, sampler) = self.orchestrator.backend().shadow()?.sampled_view();
        self.frame_resources
            .write_shadow_map(view, sampler, ShadowPass::SAMPLED_LAYOUT);
        self.shadow_generation = generation;
        Ok(())
    }

    /// Selects which subsystems record from the next frame on.
    pub fn set_render_mode(&mut self, mode: RenderMode) {
        if mode != self.render_mode {
            info!("Render mode: {} -> {}", self.render_mode.label(), mode.label());
            self.render_mode = mode;
        }
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    pub fn stats(&self) -> FrameStats {
        self.orchestrator.stats()
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Whether validation layers ended up enabled.
    pub fn has_validation(&self) -> bool {
        self.instance.has_validation()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            warn!("Failed to wait for device idle during shutdown: {}", e);
        }
        let stats = self.orchestrator.stats();
        info!(
            "Renderer shutting down: {} presented, {} skipped, {} recreation(s)",
            stats.presented, stats.skipped, stats.recreations
        );
    }
}
