//! Geometry nodes: target setup, opaque, skybox and transparent passes

use glam::Vec4;

use super::{carried_inputs, draw_queue, full_viewport, view_texture};
use crate::backend::{ClearFlags, ProgramKey, RenderTargetBinding, TextureFormat};
use crate::error::RendererResult;
use crate::render_graph::*;
use crate::renderer::QueuePriority;
use crate::scene::{AntiAliasing, RenderSettings};

/// Bind the scene color and depth of the node's inputs as the render target
fn bind_scene_target(ctx: &mut NodeContext<'_, '_>) -> RendererResult<NodeOutput> {
    let color = ctx.input_resource(SCENE_COLOR)?;
    let depth = ctx.input_resource(SCENE_DEPTH)?;
    let viewport = full_viewport(ctx);
    ctx.device.set_render_target(RenderTargetBinding::Offscreen {
        color,
        depth: Some(depth),
    });
    ctx.device.set_viewport(viewport);
    Ok(carried_inputs(ctx))
}

/// Draw one queue priority with `key`, passing through when the queue has
/// nothing of that priority or the program is missing
fn draw_priority(
    ctx: &mut NodeContext<'_, '_>,
    key: ProgramKey,
    priority: QueuePriority,
) -> RendererResult<NodeOutcome> {
    if ctx.view.render_queue.with_priority(priority).next().is_none() {
        return Ok(NodeOutcome::PassThrough);
    }
    let Some(program) = ctx.program(key) else {
        return Ok(NodeOutcome::PassThrough);
    };
    let output = bind_scene_target(ctx)?;
    ctx.device.bind_program(program);
    let draws = draw_queue(&mut *ctx.device, ctx.view, priority, program);
    log::trace!("{}: {} draws", ctx.node(), draws);
    Ok(NodeOutcome::Executed(output))
}

/// Allocates the view's scene color, depth and velocity targets and clears
/// them the way the camera asks
#[derive(Debug, Default)]
pub struct GpuInitializationPass;

impl NodeType for GpuInitializationPass {
    const ID: &'static str = "GpuInitialization";
    const INPUTS: &'static [&'static str] = &[];
}

impl CompositorNode for GpuInitializationPass {
    fn render(&mut self, ctx: &mut NodeContext<'_, '_>) -> RendererResult<NodeOutcome> {
        let settings = ctx.view.settings;
        let color_format = if settings.enable_hdr {
            TextureFormat::Rgba16Float
        } else {
            TextureFormat::Rgba8Unorm
        };

        let color_desc = view_texture(ctx, "SceneColor", color_format);
        let depth_desc = view_texture(ctx, "SceneDepth", TextureFormat::Depth32Float);
        let color = ctx.acquire_texture(&color_desc)?;
        let depth = ctx.acquire_texture(&depth_desc)?;
        let mut output = NodeOutput::new().with(SCENE_COLOR, color).with(SCENE_DEPTH, depth);

        let properties = ctx.view.properties;
        let viewport = full_viewport(ctx);
        ctx.device.set_render_target(RenderTargetBinding::Offscreen {
            color,
            depth: Some(depth),
        });
        ctx.device.set_viewport(viewport);
        // Depth is always cleared; the previous frame's depth lives in its own texture.
        let flags = properties.clear_flags | ClearFlags::DEPTH;
        ctx.device.clear_viewport(
            flags,
            properties.clear_color,
            properties.clear_depth,
            properties.clear_stencil,
        );

        let object_motion_blur = settings.motion_blur.enabled && settings.motion_blur.domain.needs_velocity();
        if settings.anti_aliasing == AntiAliasing::Taa || object_motion_blur {
            let velocity_desc = view_texture(ctx, "SceneVelocity", TextureFormat::Rg16Float);
            let velocity = ctx.acquire_texture(&velocity_desc)?;
            ctx.device.set_render_target(RenderTargetBinding::Offscreen {
                color: velocity,
                depth: None,
            });
            ctx.device.clear_viewport(ClearFlags::COLOR, Vec4::ZERO, 1.0, 0);
            output.set(SCENE_VELOCITY, velocity);
        }

        ctx.persist(PersistentResource::PreviousDepth, depth);
        Ok(NodeOutcome::Executed(output))
    }
}

/// Opaque geometry, individually and instanced
#[derive(Debug, Default)]
pub struct ForwardPass;

impl NodeType for ForwardPass {
    const ID: &'static str = "Forward";
    const INPUTS: &'static [&'static str] = &[GpuInitializationPass::ID];
}

impl CompositorNode for ForwardPass {
    fn render(&mut self, ctx: &mut NodeContext<'_, '_>) -> RendererResult<NodeOutcome> {
        draw_priority(ctx, ProgramKey::Forward, QueuePriority::Opaque)
    }
}

#[derive(Debug, Default)]
pub struct SkyboxPass;

impl NodeType for SkyboxPass {
    const ID: &'static str = "Skybox";
    const INPUTS: &'static [&'static str] = &[ForwardPass::ID];

    fn enabled(settings: &RenderSettings) -> bool {
        settings.enable_skybox
    }
}

impl CompositorNode for SkyboxPass {
    fn render(&mut self, ctx: &mut NodeContext<'_, '_>) -> RendererResult<NodeOutcome> {
        draw_priority(ctx, ProgramKey::Skybox, QueuePriority::Skybox)
    }
}

/// Transparent geometry, back to front with the default queue config
#[derive(Debug, Default)]
pub struct ForwardTransparentPass;

impl NodeType for ForwardTransparentPass {
    const ID: &'static str = "ForwardTransparent";
    const INPUTS: &'static [&'static str] = &[SkyboxPass::ID];
}

impl CompositorNode for ForwardTransparentPass {
    fn render(&mut self, ctx: &mut NodeContext<'_, '_>) -> RendererResult<NodeOutcome> {
        draw_priority(ctx, ProgramKey::ForwardTransparent, QueuePriority::Transparent)
    }
}
