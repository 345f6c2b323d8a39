//! Gaussian depth of field

use super::fullscreen_pass;
use crate::backend::{FilterMode, ProgramKey, TextureDescriptor, TextureFormat};
use crate::error::RendererResult;
use crate::pipeline::{carried_inputs, view_extent, view_texture};
use crate::render_graph::*;
use crate::scene::RenderSettings;

/// Splits out the out-of-focus layers at half resolution, blurs them and
/// combines them with the focused image by depth.
///
/// Needs all three programs; with any of them missing the scene color passes
/// through untouched.
#[derive(Debug, Default)]
pub struct GaussianDofPass;

impl NodeType for GaussianDofPass {
    const ID: &'static str = "GaussianDof";
    const INPUTS: &'static [&'static str] = &[super::MotionBlurPass::ID];

    fn enabled(settings: &RenderSettings) -> bool {
        settings.depth_of_field.enabled
    }
}

impl CompositorNode for GaussianDofPass {
    fn render(&mut self, ctx: &mut NodeContext<'_, '_>) -> RendererResult<NodeOutcome> {
        let (Some(separate), Some(blur), Some(combine)) = (
            ctx.program(ProgramKey::GaussianDofSeparate),
            ctx.program(ProgramKey::GaussianDofBlur),
            ctx.program(ProgramKey::GaussianDofCombine),
        ) else {
            return Ok(NodeOutcome::PassThrough);
        };

        let color = ctx.input_resource(SCENE_COLOR)?;
        let depth = ctx.input_resource(SCENE_DEPTH)?;
        let (width, height) = view_extent(ctx);
        let half = TextureDescriptor::attachment("DofLayers", width / 2, height / 2, TextureFormat::Rgba16Float);
        let layers = ctx.acquire_texture(&half)?;
        let scratch = ctx.acquire_texture(&half)?;

        ctx.device.bind_texture("DepthTex", depth, FilterMode::Nearest);
        fullscreen_pass(ctx, separate, color, layers);
        fullscreen_pass(ctx, blur, layers, scratch);
        fullscreen_pass(ctx, blur, scratch, layers);

        let desc = view_texture(ctx, "DepthOfField", TextureFormat::Rgba8Unorm);
        let focused = ctx.acquire_texture(&desc)?;
        ctx.device.bind_texture("DepthTex", depth, FilterMode::Nearest);
        ctx.device.bind_texture("DofTex", layers, FilterMode::Linear);
        fullscreen_pass(ctx, combine, color, focused);

        let mut output = carried_inputs(ctx);
        output.set(SCENE_COLOR, focused);
        Ok(NodeOutcome::Executed(output))
    }
}
