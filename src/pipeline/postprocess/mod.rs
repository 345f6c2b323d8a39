//! Post-processing nodes

mod antialiasing;
mod bloom;
mod depth_of_field;
mod motion_blur;
mod ssao;
mod tonemapping;

pub use antialiasing::{FxaaPass, TemporalAaPass};
pub use bloom::BloomPass;
pub use depth_of_field::GaussianDofPass;
pub use motion_blur::MotionBlurPass;
pub use ssao::SsaoPass;
pub use tonemapping::TonemappingPass;

use crate::backend::{DrawCall, FilterMode, ProgramHandle, RenderTargetBinding, TextureHandle};
use crate::render_graph::NodeContext;

/// Draw a fullscreen triangle sampling `source` into `target`
pub(crate) fn fullscreen_pass(
    ctx: &mut NodeContext<'_, '_>,
    program: ProgramHandle,
    source: TextureHandle,
    target: TextureHandle,
) {
    let viewport = super::full_viewport(ctx);
    let device = &mut *ctx.device;
    device.set_render_target(RenderTargetBinding::Offscreen {
        color: target,
        depth: None,
    });
    device.set_viewport(viewport);
    device.bind_program(program);
    device.bind_buffer("PerCamera", ctx.view.per_view_buffer);
    device.bind_texture("SourceTex", source, FilterMode::Linear);
    device.draw(&DrawCall::FULLSCREEN);
}
