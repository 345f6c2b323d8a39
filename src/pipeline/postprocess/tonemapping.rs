//! Tonemapping post-processing

use super::fullscreen_pass;
use crate::backend::{FilterMode, ProgramKey, TextureFormat};
use crate::error::RendererResult;
use crate::pipeline::{carried_inputs, view_texture};
use crate::render_graph::*;
use crate::scene::RenderSettings;

/// HDR to display range, applying exposure, gamma, contrast, brightness and
/// the ambient occlusion term when one was produced upstream
#[derive(Debug, Default)]
pub struct TonemappingPass;

impl NodeType for TonemappingPass {
    const ID: &'static str = "Tonemapping";
    const INPUTS: &'static [&'static str] = &[super::BloomPass::ID];

    fn enabled(settings: &RenderSettings) -> bool {
        settings.tonemapping.enabled
    }
}

impl CompositorNode for TonemappingPass {
    fn render(&mut self, ctx: &mut NodeContext<'_, '_>) -> RendererResult<NodeOutcome> {
        let Some(program) = ctx.program(ProgramKey::Tonemapping) else {
            return Ok(NodeOutcome::PassThrough);
        };
        let hdr = ctx.input_resource(SCENE_COLOR)?;
        let desc = view_texture(ctx, "Tonemapped", TextureFormat::Rgba8Unorm);
        let ldr = ctx.acquire_texture(&desc)?;

        if let Some(occlusion) = ctx.try_input_resource(SSAO) {
            ctx.device.bind_texture("SsaoTex", occlusion, FilterMode::Linear);
        }
        fullscreen_pass(ctx, program, hdr, ldr);

        let mut output = carried_inputs(ctx);
        output.set(LIT_COLOR, hdr);
        output.set(SCENE_COLOR, ldr);
        Ok(NodeOutcome::Executed(output))
    }
}
