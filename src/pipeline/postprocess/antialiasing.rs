//! FXAA and temporal anti-aliasing

use super::fullscreen_pass;
use crate::backend::{FilterMode, ProgramKey, TextureFormat};
use crate::error::RendererResult;
use crate::pipeline::{carried_inputs, view_texture};
use crate::render_graph::*;
use crate::scene::{AntiAliasing, RenderSettings};

#[derive(Debug, Default)]
pub struct FxaaPass;

impl NodeType for FxaaPass {
    const ID: &'static str = "Fxaa";
    const INPUTS: &'static [&'static str] = &[super::GaussianDofPass::ID];

    fn enabled(settings: &RenderSettings) -> bool {
        settings.anti_aliasing == AntiAliasing::Fxaa
    }
}

impl CompositorNode for FxaaPass {
    fn render(&mut self, ctx: &mut NodeContext<'_, '_>) -> RendererResult<NodeOutcome> {
        let Some(program) = ctx.program(ProgramKey::Fxaa) else {
            return Ok(NodeOutcome::PassThrough);
        };
        let color = ctx.input_resource(SCENE_COLOR)?;
        let desc = view_texture(ctx, "Fxaa", TextureFormat::Rgba8Unorm);
        let resolved = ctx.acquire_texture(&desc)?;
        fullscreen_pass(ctx, program, color, resolved);

        let mut output = carried_inputs(ctx);
        output.set(SCENE_COLOR, resolved);
        Ok(NodeOutcome::Executed(output))
    }
}

/// Reprojects against the previous frame's depth using the velocity buffer.
///
/// The first frame of a view has no history and passes through.
#[derive(Debug, Default)]
pub struct TemporalAaPass;

impl NodeType for TemporalAaPass {
    const ID: &'static str = "TemporalAa";
    const INPUTS: &'static [&'static str] = &[FxaaPass::ID];

    fn enabled(settings: &RenderSettings) -> bool {
        settings.anti_aliasing == AntiAliasing::Taa
    }
}

impl CompositorNode for TemporalAaPass {
    fn render(&mut self, ctx: &mut NodeContext<'_, '_>) -> RendererResult<NodeOutcome> {
        let Some(history) = ctx.previous_depth() else {
            log::trace!("{}: no history yet", ctx.node());
            return Ok(NodeOutcome::PassThrough);
        };
        let Some(program) = ctx.program(ProgramKey::TemporalAa) else {
            return Ok(NodeOutcome::PassThrough);
        };
        let color = ctx.input_resource(SCENE_COLOR)?;
        let velocity = ctx.input_resource(SCENE_VELOCITY)?;
        let depth = ctx.input_resource(SCENE_DEPTH)?;
        let desc = view_texture(ctx, "TemporalAa", TextureFormat::Rgba8Unorm);
        let resolved = ctx.acquire_texture(&desc)?;

        ctx.device.bind_texture("VelocityTex", velocity, FilterMode::Nearest);
        ctx.device.bind_texture("DepthTex", depth, FilterMode::Nearest);
        ctx.device.bind_texture("PrevDepthTex", history, FilterMode::Nearest);
        fullscreen_pass(ctx, program, color, resolved);

        let mut output = carried_inputs(ctx);
        output.set(SCENE_COLOR, resolved);
        Ok(NodeOutcome::Executed(output))
    }
}
