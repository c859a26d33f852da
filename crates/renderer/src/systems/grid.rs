//! Infinite world grid on the XZ plane.
//!
//! The vertex shader emits a full-screen quad (6 vertices, no vertex input)
//! and the fragment shader unprojects it onto the ground plane, fading out
//! between the near and far distances pushed per frame.

use ash::vk;

use vkframe_rhi::RhiResult;
use vkframe_rhi::pipeline::{ColorBlend, CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use vkframe_rhi::shader::{Shader, ShaderStage};

use super::SystemContext;
use crate::frame_info::FrameInfo;
use crate::ubo::GridPushConstants;

pub struct GridSystem {
    pipeline: Pipeline,
    layout: PipelineLayout,
}

impl GridSystem {
    pub fn new(ctx: &SystemContext<'_>) -> RhiResult<Self> {
        let push_range = vk::PushConstantRange {
            stage_flags: vk::ShaderStageFlags::FRAGMENT,
            offset: 0,
            size: GridPushConstants::SIZE,
        };
        let layout = PipelineLayout::new(ctx.device.clone(), &[ctx.global_layout], &[push_range])?;

        let vert = Shader::load(ctx.device.clone(), ctx.shader_dir, "grid", ShaderStage::Vertex)?;
        let frag = Shader::load(ctx.device.clone(), ctx.shader_dir, "grid", ShaderStage::Fragment)?;
        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vert)
            .fragment_shader(&frag)
            .cull_mode(CullMode::None)
            .depth_write_enable(false)
            .color_blend(ColorBlend::Alpha)
            .render_pass(ctx.render_pass, 0)
            .build(ctx.device.clone(), &layout, "grid")?;

        Ok(Self { pipeline, layout })
    }

    pub fn render(&self, frame: &FrameInfo<'_>) {
        let cmd = &frame.cmd;
        let layout = self.layout.handle();
        cmd.bind_pipeline(self.pipeline.handle());
        cmd.bind_descriptor_sets(layout, 0, &[frame.global_set()], &[]);
        cmd.push_constants(layout, vk::ShaderStageFlags::FRAGMENT, &frame.grid);
        cmd.draw(6, 1, 0, 0);
    }
}
