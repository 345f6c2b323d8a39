//! Motion blur

use super::fullscreen_pass;
use crate::backend::{FilterMode, ProgramKey, TextureFormat};
use crate::error::RendererResult;
use crate::pipeline::{carried_inputs, view_texture};
use crate::render_graph::*;
use crate::scene::RenderSettings;

/// Blurs the scene color along screen-space motion.
///
/// Camera-only blur reconstructs motion from depth and the previous
/// view-projection in the per-camera buffer. The object domains also sample
/// the velocity buffer.
#[derive(Debug, Default)]
pub struct MotionBlurPass;

impl NodeType for MotionBlurPass {
    const ID: &'static str = "MotionBlur";
    const INPUTS: &'static [&'static str] = &[super::TonemappingPass::ID];

    fn enabled(settings: &RenderSettings) -> bool {
        settings.motion_blur.enabled
    }
}

impl CompositorNode for MotionBlurPass {
    fn render(&mut self, ctx: &mut NodeContext<'_, '_>) -> RendererResult<NodeOutcome> {
        let Some(program) = ctx.program(ProgramKey::MotionBlur) else {
            return Ok(NodeOutcome::PassThrough);
        };
        let color = ctx.input_resource(SCENE_COLOR)?;
        let depth = ctx.input_resource(SCENE_DEPTH)?;
        let velocity = if ctx.view.settings.motion_blur.domain.needs_velocity() {
            Some(ctx.input_resource(SCENE_VELOCITY)?)
        } else {
            None
        };
        let desc = view_texture(ctx, "MotionBlur", TextureFormat::Rgba8Unorm);
        let blurred = ctx.acquire_texture(&desc)?;

        ctx.device.bind_texture("DepthTex", depth, FilterMode::Nearest);
        if let Some(velocity) = velocity {
            ctx.device.bind_texture("VelocityTex", velocity, FilterMode::Nearest);
        }
        fullscreen_pass(ctx, program, color, blurred);

        let mut output = carried_inputs(ctx);
        output.set(SCENE_COLOR, blurred);
        Ok(NodeOutcome::Executed(output))
    }
}
