//! Flat vertex-color meshes.

use vkframe_rhi::RhiResult;
use vkframe_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use vkframe_rhi::shader::{Shader, ShaderStage};
use vkframe_rhi::vertex::Vertex;

use super::{SystemContext, draw_meshes, mesh_pipeline_layout};
use crate::frame_info::FrameInfo;

pub struct UnlitSystem {
    pipeline: Pipeline,
    layout: PipelineLayout,
}

impl UnlitSystem {
    pub fn new(ctx: &SystemContext<'_>) -> RhiResult<Self> {
        let layout = mesh_pipeline_layout(ctx)?;
        let vert = Shader::load(ctx.device.clone(), ctx.shader_dir, "unlit", ShaderStage::Vertex)?;
        let frag = Shader::load(ctx.device.clone(), ctx.shader_dir, "unlit", ShaderStage::Fragment)?;
        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vert)
            .fragment_shader(&frag)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::attribute_descriptions())
            .render_pass(ctx.render_pass, 0)
            .build(ctx.device.clone(), &layout, "unlit")?;

        Ok(Self { pipeline, layout })
    }

    pub fn render(&self, frame: &FrameInfo<'_>) {
        frame.cmd.bind_pipeline(self.pipeline.handle());
        draw_meshes(frame, self.layout.handle());
    }
}
