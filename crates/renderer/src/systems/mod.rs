//! Render subsystems.
//!
//! Each subsystem owns one pipeline and its layout and records draws for a
//! [`FrameInfo`]. The set is closed, so it is a tagged union dispatched by
//! [`SystemKind`] rather than a trait object. All subsystems are built once;
//! switching [`RenderMode`] only changes which ones record.
//!
//! | Mode      | Shadow pre-pass | Main pass                              |
//! |-----------|-----------------|----------------------------------------|
//! | Lit       | shadow          | lit, point light, spot light, grid     |
//! | Wireframe | -               | wireframe, point light, spot light     |
//! | Unlit     | -               | unlit, grid                            |

mod grid;
mod lit;
mod point_light;
mod shadow;
mod spot_light;
mod unlit;
mod wireframe;

use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::info;

use vkframe_core::RenderMode;
use vkframe_rhi::RhiResult;
use vkframe_rhi::device::Device;
use vkframe_rhi::pipeline::{ColorBlend, CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use vkframe_rhi::shader::{Shader, ShaderStage};
use vkframe_scene::Scene;

use crate::frame_info::FrameInfo;
use crate::ubo::PushConstants;

pub use grid::GridSystem;
pub use lit::LitSystem;
pub use point_light::PointLightSystem;
pub use shadow::ShadowSystem;
pub use spot_light::SpotLightSystem;
pub use unlit::UnlitSystem;
pub use wireframe::WireframeSystem;

/// Identifies a subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemKind {
    Shadow,
    Lit,
    Unlit,
    Wireframe,
    PointLight,
    SpotLight,
    Grid,
}

/// Subsystems recorded inside the main render pass for `mode`, in order.
pub fn systems_for(mode: RenderMode) -> &'static [SystemKind] {
    match mode {
        RenderMode::Lit => &[
            SystemKind::Lit,
            SystemKind::PointLight,
            SystemKind::SpotLight,
            SystemKind::Grid,
        ],
        RenderMode::Wireframe => &[
            SystemKind::Wireframe,
            SystemKind::PointLight,
            SystemKind::SpotLight,
        ],
        RenderMode::Unlit => &[SystemKind::Unlit, SystemKind::Grid],
    }
}

/// Whether `mode` records the depth-only shadow pre-pass.
pub fn uses_shadow_pass(mode: RenderMode) -> bool {
    mode == RenderMode::Lit
}

/// What subsystems need at creation.
pub struct SystemContext<'a> {
    pub device: &'a Arc<Device>,
    pub shader_dir: &'a Path,
    /// Main pass the color subsystems draw in.
    pub render_pass: vk::RenderPass,
    /// Depth-only pass the shadow subsystem draws in.
    pub shadow_render_pass: vk::RenderPass,
    pub global_layout: vk::DescriptorSetLayout,
    pub material_layout: vk::DescriptorSetLayout,
}

/// One subsystem.
pub enum RenderSystem {
    Shadow(ShadowSystem),
    Lit(LitSystem),
    Unlit(UnlitSystem),
    Wireframe(WireframeSystem),
    PointLight(PointLightSystem),
    SpotLight(SpotLightSystem),
    Grid(GridSystem),
}

impl RenderSystem {
    pub fn kind(&self) -> SystemKind {
        match self {
            RenderSystem::Shadow(_) => SystemKind::Shadow,
            RenderSystem::Lit(_) => SystemKind::Lit,
            RenderSystem::Unlit(_) => SystemKind::Unlit,
            RenderSystem::Wireframe(_) => SystemKind::Wireframe,
            RenderSystem::PointLight(_) => SystemKind::PointLight,
            RenderSystem::SpotLight(_) => SystemKind::SpotLight,
            RenderSystem::Grid(_) => SystemKind::Grid,
        }
    }

    /// Records this subsystem's draws into `frame.cmd`.
    pub fn render(&self, frame: &FrameInfo<'_>) {
        match self {
            RenderSystem::Shadow(system) => system.render(frame),
            RenderSystem::Lit(system) => system.render(frame),
            RenderSystem::Unlit(system) => system.render(frame),
            RenderSystem::Wireframe(system) => system.render(frame),
            RenderSystem::PointLight(system) => system.render(frame),
            RenderSystem::SpotLight(system) => system.render(frame),
            RenderSystem::Grid(system) => system.render(frame),
        }
    }
}

/// Every subsystem, created up front.
pub struct RenderSystems {
    systems: Vec<RenderSystem>,
}

impl RenderSystems {
    /// Compiles all pipelines.
    ///
    /// # Errors
    ///
    /// Returns an error if a shader cannot be loaded or a pipeline fails to
    /// build.
    pub fn new(ctx: &SystemContext<'_>) -> RhiResult<Self> {
        let systems = vec![
            RenderSystem::Shadow(ShadowSystem::new(ctx)?),
            RenderSystem::Lit(LitSystem::new(ctx)?),
            RenderSystem::Unlit(UnlitSystem::new(ctx)?),
            RenderSystem::Wireframe(WireframeSystem::new(ctx)?),
            RenderSystem::PointLight(PointLightSystem::new(ctx)?),
            RenderSystem::SpotLight(SpotLightSystem::new(ctx)?),
            RenderSystem::Grid(GridSystem::new(ctx)?),
        ];
        info!("Created {} render subsystem(s)", systems.len());
        Ok(Self { systems })
    }

    pub fn get(&self, kind: SystemKind) -> Option<&RenderSystem> {
        self.systems.iter().find(|system| system.kind() == kind)
    }

    /// Records the shadow subsystem; call inside the depth-only pass.
    pub fn record_shadow(&self, frame: &FrameInfo<'_>) {
        if let Some(system) = self.get(SystemKind::Shadow) {
            system.render(frame);
        }
    }

    /// Records the main-pass subsystems for `mode`; call inside the main pass.
    pub fn record_main(&self, mode: RenderMode, frame: &FrameInfo<'_>) {
        for kind in systems_for(mode) {
            if let Some(system) = self.get(*kind) {
                system.render(frame);
            }
        }
    }
}

/// Push range shared by every mesh-drawing pipeline.
fn mesh_push_constant_range() -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags: vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
        offset: 0,
        size: PushConstants::SIZE,
    }
}

/// Layout with the global set and the mesh push range.
fn mesh_pipeline_layout(ctx: &SystemContext<'_>) -> RhiResult<PipelineLayout> {
    PipelineLayout::new(
        ctx.device.clone(),
        &[ctx.global_layout],
        &[mesh_push_constant_range()],
    )
}

/// Alpha-blended light billboards: no vertex input, no depth writes.
fn billboard_pipeline(
    ctx: &SystemContext<'_>,
    shader: &str,
    name: &'static str,
) -> RhiResult<(Pipeline, PipelineLayout)> {
    let layout = PipelineLayout::new(ctx.device.clone(), &[ctx.global_layout], &[])?;
    let vert = Shader::load(ctx.device.clone(), ctx.shader_dir, shader, ShaderStage::Vertex)?;
    let frag = Shader::load(ctx.device.clone(), ctx.shader_dir, shader, ShaderStage::Fragment)?;
    let pipeline = GraphicsPipelineBuilder::new()
        .vertex_shader(&vert)
        .fragment_shader(&frag)
        .cull_mode(CullMode::None)
        .depth_write_enable(false)
        .color_blend(ColorBlend::Alpha)
        .render_pass(ctx.render_pass, 0)
        .build(ctx.device.clone(), &layout, name)?;
    Ok((pipeline, layout))
}

/// Draws `count` billboards of 6 vertices each.
fn draw_billboards(frame: &FrameInfo<'_>, pipeline: &Pipeline, layout: &PipelineLayout, count: u32) {
    let cmd = &frame.cmd;
    cmd.bind_pipeline(pipeline.handle());
    cmd.bind_descriptor_sets(layout.handle(), 0, &[frame.global_set()], &[]);
    cmd.draw(6 * count, 1, 0, 0);
}

/// Draws every mesh object with only the global set bound.
fn draw_meshes(frame: &FrameInfo<'_>, layout: vk::PipelineLayout) {
    let cmd = &frame.cmd;
    cmd.bind_descriptor_sets(layout, 0, &[frame.global_set()], &[]);
    for (_, object) in frame.scene.drawables() {
        let Some(mesh) = frame.mesh_for(object) else {
            continue;
        };
        cmd.push_constants(
            layout,
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
            &PushConstants::from_transform(&object.transform),
        );
        mesh.draw(cmd);
    }
}

/// Number of lights the scene offers beyond the UBO capacity, for logging.
fn overflow(count: usize, capacity: usize) -> Option<usize> {
    count.checked_sub(capacity).filter(|extra| *extra > 0)
}

/// Fills the point and spot light arrays of `ubo` from `scene`.
///
/// Returns `(point_count, spot_count)`.
pub fn update_lights(scene: &Scene, ubo: &mut crate::ubo::LightUbo) -> (u32, u32) {
    let points = PointLightSystem::update(scene, ubo);
    let spots = SpotLightSystem::update(scene, ubo);
    (points, spots)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_tables() {
        assert_eq!(
            systems_for(RenderMode::Lit),
            [
                SystemKind::Lit,
                SystemKind::PointLight,
                SystemKind::SpotLight,
                SystemKind::Grid
            ]
        );
        assert_eq!(
            systems_for(RenderMode::Wireframe),
            [
                SystemKind::Wireframe,
                SystemKind::PointLight,
                SystemKind::SpotLight
            ]
        );
        assert_eq!(
            systems_for(RenderMode::Unlit),
            [SystemKind::Unlit, SystemKind::Grid]
        );
    }

    #[test]
    fn test_only_lit_uses_shadow_pass() {
        assert!(uses_shadow_pass(RenderMode::Lit));
        assert!(!uses_shadow_pass(RenderMode::Wireframe));
        assert!(!uses_shadow_pass(RenderMode::Unlit));
    }

    #[test]
    fn test_shadow_never_in_main_pass() {
        for mode in RenderMode::ALL {
            assert!(!systems_for(mode).contains(&SystemKind::Shadow));
        }
    }

    #[test]
    fn test_every_subsystem_reachable() {
        let mut reachable: Vec<SystemKind> = RenderMode::ALL
            .iter()
            .flat_map(|mode| systems_for(*mode).iter().copied())
            .collect();
        reachable.push(SystemKind::Shadow);
        for kind in [
            SystemKind::Shadow,
            SystemKind::Lit,
            SystemKind::Unlit,
            SystemKind::Wireframe,
            SystemKind::PointLight,
            SystemKind::SpotLight,
            SystemKind::Grid,
        ] {
            assert!(reachable.contains(&kind), "{kind:?} is never recorded");
        }
    }

    #[test]
    fn test_overflow() {
        assert_eq!(overflow(3, 10), None);
        assert_eq!(overflow(10, 10), None);
        assert_eq!(overflow(12, 10), Some(2));
    }

    #[test]
    fn test_update_lights_counts_both_kinds() {
        use glam::Vec3;
        use vkframe_scene::{GameObject, PointLight, SpotLight, Transform};

        let mut scene = Scene::default();
        scene.spawn(GameObject::point_light("a", Vec3::X, PointLight::default()));
        scene.spawn(GameObject::point_light("b", Vec3::Y, PointLight::default()));
        scene.spawn(GameObject::spot_light("c", Transform::new(), SpotLight::default()));

        let mut ubo = crate::ubo::LightUbo::default();
        assert_eq!(update_lights(&scene, &mut ubo), (2, 1));
        assert_eq!(ubo.num_lights, 2);
        assert_eq!(ubo.num_spot_lights, 1);
    }
}
