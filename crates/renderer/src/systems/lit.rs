//! Lit meshes: global set plus per-draw material record.

use ash::vk;

use vkframe_rhi::RhiResult;
use vkframe_rhi::pipeline::{GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use vkframe_rhi::shader::{Shader, ShaderStage};
use vkframe_rhi::vertex::Vertex;

use super::{SystemContext, mesh_push_constant_range};
use crate::frame_info::FrameInfo;
use crate::ubo::PushConstants;

pub struct LitSystem {
    pipeline: Pipeline,
    layout: PipelineLayout,
}

impl LitSystem {
    pub fn new(ctx: &SystemContext<'_>) -> RhiResult<Self> {
        let layout = PipelineLayout::new(
            ctx.device.clone(),
            &[ctx.global_layout, ctx.material_layout],
            &[mesh_push_constant_range()],
        )?;

        let vert = Shader::load(ctx.device.clone(), ctx.shader_dir, "lit", ShaderStage::Vertex)?;
        let frag = Shader::load(ctx.device.clone(), ctx.shader_dir, "lit", ShaderStage::Fragment)?;
        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vert)
            .fragment_shader(&frag)
            .vertex_binding(Vertex::binding_description())
            .vertex_attributes(&Vertex::attribute_descriptions())
            .render_pass(ctx.render_pass, 0)
            .build(ctx.device.clone(), &layout, "lit")?;

        Ok(Self { pipeline, layout })
    }

    pub fn render(&self, frame: &FrameInfo<'_>) {
        let cmd = &frame.cmd;
        let layout = self.layout.handle();
        cmd.bind_pipeline(self.pipeline.handle());
        cmd.bind_descriptor_sets(layout, 0, &[frame.global_set()], &[]);

        for (_, object) in frame.scene.drawables() {
            let Some(mesh) = frame.mesh_for(object) else {
                continue;
            };
            let offset = frame.resources.material_offset(frame.material_record(object));
            cmd.bind_descriptor_sets(layout, 1, &[frame.material_set()], &[offset]);
            cmd.push_constants(
                layout,
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                &PushConstants::from_transform(&object.transform),
            );
            mesh.draw(cmd);
        }
    }
}
