use super::fullscreen_pass;
use crate::backend::{FilterMode, ProgramKey, TextureFormat};
use crate::error::RendererResult;
use crate::pipeline::{carried_inputs, view_texture};
use crate::render_graph::*;
use crate::scene::RenderSettings;

/// Screen-space ambient occlusion from the scene depth
#[derive(Debug, Default)]
pub struct SsaoPass;

impl NodeType for SsaoPass {
    const ID: &'static str = "Ssao";
    const INPUTS: &'static [&'static str] = &[crate::pipeline::ForwardTransparentPass::ID];

    fn enabled(settings: &RenderSettings) -> bool {
        settings.ambient_occlusion.enabled
    }
}

impl CompositorNode for SsaoPass {
    fn render(&mut self, ctx: &mut NodeContext<'_, '_>) -> RendererResult<NodeOutcome> {
        let Some(program) = ctx.program(ProgramKey::Ssao) else {
            return Ok(NodeOutcome::PassThrough);
        };
        let depth = ctx.input_resource(SCENE_DEPTH)?;
        let desc = view_texture(ctx, "Ssao", TextureFormat::R32Float);
        let occlusion = ctx.acquire_texture(&desc)?;

        ctx.device.bind_texture("DepthTex", depth, FilterMode::Nearest);
        fullscreen_pass(ctx, program, depth, occlusion);

        let mut output = carried_inputs(ctx);
        output.set(SSAO, occlusion);
        Ok(NodeOutcome::Executed(output))
    }
}
