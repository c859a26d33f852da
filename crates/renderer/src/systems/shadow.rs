//! Depth-only pre-pass from the light's point of view.

use vkframe_rhi::RhiResult;
use vkframe_rhi::pipeline::{CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use vkframe_rhi::shader::{Shader, ShaderStage};
use vkframe_rhi::vertex::Vertex;

use super::{SystemContext, draw_meshes, mesh_pipeline_layout};
use crate::frame_info::FrameInfo;

/// Constant and slope depth bias against shadow acne.
const DEPTH_BIAS: (f32, f32) = (1.25, 1.75);

pub struct ShadowSystem {
    pipeline: Pipeline,
    layout: PipelineLayout,
}

impl ShadowSystem {
    pub fn new(ctx: &SystemContext<'_>) -> RhiResult<Self> {
        let layout = mesh_pipeline_layout(ctx)?;
        let vert = Shader::load(ctx.device.clone(), ctx.shader_dir, "shadow", ShaderStage::Vertex)?;
        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vert)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::position_attribute_description())
            .cull_mode(CullMode::None)
            .depth_bias(DEPTH_BIAS.0, DEPTH_BIAS.1)
            .color_attachment(false)
            .render_pass(ctx.shadow_render_pass, 0)
            .build(ctx.device.clone(), &layout, "shadow")?;

        Ok(Self { pipeline, layout })
    }

    pub fn render(&self, frame: &FrameInfo<'_>) {
        frame.cmd.bind_pipeline(self.pipeline.handle());
        draw_meshes(frame, self.layout.handle());
    }
}
