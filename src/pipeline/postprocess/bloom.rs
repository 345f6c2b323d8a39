//! Bloom post-processing effect

use super::fullscreen_pass;
use crate::backend::{FilterMode, ProgramKey, TextureDescriptor, TextureFormat};
use crate::error::RendererResult;
use crate::pipeline::{carried_inputs, view_extent, view_texture};
use crate::render_graph::*;
use crate::scene::RenderSettings;

/// Bright-pass, blur and composite at half resolution.
///
/// Needs all three bloom programs; with any of them missing the scene color
/// passes through untouched.
#[derive(Debug, Default)]
pub struct BloomPass;

impl NodeType for BloomPass {
    const ID: &'static str = "Bloom";
    const INPUTS: &'static [&'static str] = &[super::SsaoPass::ID];

    fn enabled(settings: &RenderSettings) -> bool {
        settings.bloom.enabled
    }
}

impl CompositorNode for BloomPass {
    fn render(&mut self, ctx: &mut NodeContext<'_, '_>) -> RendererResult<NodeOutcome> {
        let (Some(prefilter), Some(blur), Some(composite)) = (
            ctx.program(ProgramKey::BloomPrefilter),
            ctx.program(ProgramKey::BloomBlur),
            ctx.program(ProgramKey::BloomComposite),
        ) else {
            return Ok(NodeOutcome::PassThrough);
        };

        let scene_color = ctx.input_resource(SCENE_COLOR)?;
        let (width, height) = view_extent(ctx);
        let half = TextureDescriptor::attachment("Bloom", width / 2, height / 2, TextureFormat::Rgba16Float);
        let bloom = ctx.acquire_texture(&half)?;
        let scratch = ctx.acquire_texture(&half)?;

        fullscreen_pass(ctx, prefilter, scene_color, bloom);
        for _ in 0..ctx.view.settings.bloom.quality.blur_passes() {
            // Horizontal then vertical
            fullscreen_pass(ctx, blur, bloom, scratch);
            fullscreen_pass(ctx, blur, scratch, bloom);
        }

        let color_desc = view_texture(ctx, "BloomComposite", TextureFormat::Rgba16Float);
        let color = ctx.acquire_texture(&color_desc)?;
        ctx.device.bind_texture("BloomTex", bloom, FilterMode::Linear);
        fullscreen_pass(ctx, composite, scene_color, color);

        let mut output = carried_inputs(ctx);
        output.set(SCENE_COLOR, color);
        output.set(BLOOM, bloom);
        Ok(NodeOutcome::Executed(output))
    }
}
