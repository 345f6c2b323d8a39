//! Presentation of the composed image into the camera's render target

use super::{draw_queue, postprocess::TemporalAaPass};
use crate::backend::{DrawCall, FilterMode, ProgramKey};
use crate::error::RendererResult;
use crate::render_graph::*;
use crate::renderer::QueuePriority;
use crate::scene::OutputType;

/// Root of the built-in graph.
///
/// Copies the final color, or the intermediate picked by
/// [`OutputType`], into the camera's viewport of its render target, then
/// draws the overlay queue on top.
#[derive(Debug, Default)]
pub struct FinalResolvePass;

impl FinalResolvePass {
    fn source_name(output_type: OutputType) -> &'static str {
        match output_type {
            OutputType::Final => SCENE_COLOR,
            OutputType::Color => LIT_COLOR,
            OutputType::Velocity => SCENE_VELOCITY,
            OutputType::Depth => SCENE_DEPTH,
            OutputType::Ssao => SSAO,
        }
    }
}

impl NodeType for FinalResolvePass {
    const ID: &'static str = "FinalResolve";
    const INPUTS: &'static [&'static str] = &[TemporalAaPass::ID];
}

impl CompositorNode for FinalResolvePass {
    fn render(&mut self, ctx: &mut NodeContext<'_, '_>) -> RendererResult<NodeOutcome> {
        let output_type = ctx.view.settings.output_type;
        let requested = Self::source_name(output_type);
        let source = match ctx.try_input_resource(requested) {
            Some(texture) => texture,
            None => {
                if output_type != OutputType::Final {
                    log::warn!("{:?} output not produced for this view, showing final color", output_type);
                }
                ctx.input_resource(SCENE_COLOR)?
            }
        };

        let properties = ctx.view.properties;
        ctx.device.set_render_target(properties.target_binding());
        ctx.device.set_viewport(properties.viewport);

        match ctx.program(ProgramKey::FinalResolve) {
            Some(program) => {
                ctx.device.bind_program(program);
                ctx.device.bind_texture("SourceTex", source, FilterMode::Nearest);
                ctx.device.draw(&DrawCall::FULLSCREEN);
            }
            None => log::warn!("{}: nothing presented for camera {:?}", ctx.node(), properties.camera),
        }

        if let Some(overlay) = ctx.program(ProgramKey::Overlay) {
            if ctx.view.render_queue.with_priority(QueuePriority::Overlay).next().is_some() {
                ctx.device.bind_program(overlay);
                draw_queue(&mut *ctx.device, ctx.view, QueuePriority::Overlay, overlay);
            }
        }

        Ok(NodeOutcome::Executed(NodeOutput::new()))
    }
}
