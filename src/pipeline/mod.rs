//! Built-in compositor nodes
//!
//! The default chain, inputs first:
//!
//! ```text
//! GpuInitialization -> Forward -> Skybox -> ForwardTransparent -> Ssao
//!     -> Bloom -> Tonemapping -> MotionBlur -> GaussianDof -> Fxaa
//!     -> TemporalAa -> FinalResolve
//! ```
//!
//! Every node publishes the textures it received plus whatever it replaced
//! or added, so a node further down can still find the scene depth after
//! several post-process stages.

mod draw;
mod final_resolve;
mod forward_pass;
pub mod postprocess;

pub use final_resolve::FinalResolvePass;
pub use forward_pass::{ForwardPass, ForwardTransparentPass, GpuInitializationPass, SkyboxPass};
pub use postprocess::{
    BloomPass, FxaaPass, GaussianDofPass, MotionBlurPass, SsaoPass, TemporalAaPass, TonemappingPass,
};

pub(crate) use draw::draw_queue;

use crate::backend::{TextureDescriptor, TextureFormat, ViewportRect};
use crate::error::RendererResult;
use crate::render_graph::{NodeContext, NodeDescriptor, NodeOutput, NodeRegistry, NodeType};

/// Registry holding every built-in node, rooted at [`FinalResolvePass`]
pub fn builtin_registry() -> RendererResult<NodeRegistry> {
    let mut registry = NodeRegistry::new(FinalResolvePass::ID);
    register_builtin_nodes(&mut registry)?;
    registry.validate()?;
    Ok(registry)
}

/// Add the built-in nodes to an existing registry
pub fn register_builtin_nodes(registry: &mut NodeRegistry) -> RendererResult<()> {
    let nodes = [
        NodeDescriptor::of::<GpuInitializationPass>(),
        NodeDescriptor::of::<ForwardPass>(),
        NodeDescriptor::of::<SkyboxPass>(),
        NodeDescriptor::of::<ForwardTransparentPass>(),
        NodeDescriptor::of::<SsaoPass>(),
        NodeDescriptor::of::<BloomPass>(),
        NodeDescriptor::of::<TonemappingPass>(),
        NodeDescriptor::of::<MotionBlurPass>(),
        NodeDescriptor::of::<GaussianDofPass>(),
        NodeDescriptor::of::<FxaaPass>(),
        NodeDescriptor::of::<TemporalAaPass>(),
        NodeDescriptor::of::<FinalResolvePass>(),
    ];
    for node in nodes {
        registry.register(node)?;
    }
    Ok(())
}

/// Everything the node's inputs published, first input winning on name
/// clashes
pub(crate) fn carried_inputs(ctx: &NodeContext<'_, '_>) -> NodeOutput {
    let mut output = NodeOutput::new();
    for input in ctx.inputs().iter().rev() {
        for (name, texture) in input.iter() {
            output.set(name, texture);
        }
    }
    output
}

/// Pixel size of the compositor's intermediates for this view
pub(crate) fn view_extent(ctx: &NodeContext<'_, '_>) -> (u32, u32) {
    let viewport = ctx.view.properties.viewport;
    (
        viewport.width.round().max(1.0) as u32,
        viewport.height.round().max(1.0) as u32,
    )
}

pub(crate) fn view_texture(ctx: &NodeContext<'_, '_>, label: &str, format: TextureFormat) -> TextureDescriptor {
    let (width, height) = view_extent(ctx);
    TextureDescriptor::attachment(label, width, height, format)
}

pub(crate) fn full_viewport(ctx: &NodeContext<'_, '_>) -> ViewportRect {
    let (width, height) = view_extent(ctx);
    ViewportRect::full(width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDevice;
    use crate::render_graph::RenderCompositor;
    use crate::scene::{AntiAliasing, RenderSettings};

    fn resolve(settings: &RenderSettings) -> Vec<&'static str> {
        let mut device = HeadlessDevice::new();
        let mut compositor = RenderCompositor::new();
        compositor
            .resolve(&builtin_registry().unwrap(), settings, TextureFormat::Rgba8Unorm, &mut device)
            .unwrap();
        compositor.node_ids()
    }

    #[test]
    fn test_builtin_registry_is_valid() {
        let registry = builtin_registry().unwrap();
        assert_eq!(registry.len(), 12);
        assert_eq!(registry.root(), FinalResolvePass::ID);
    }

    #[test]
    fn test_default_settings_chain() {
        assert_eq!(
            resolve(&RenderSettings::default()),
            vec![
                "GpuInitialization",
                "Forward",
                "Skybox",
                "ForwardTransparent",
                "Tonemapping",
                "MotionBlur",
                "Fxaa",
                "FinalResolve"
            ]
        );
    }

    #[test]
    fn test_everything_enabled_chain() {
        let mut settings = RenderSettings::default();
        settings.bloom.enabled = true;
        settings.ambient_occlusion.enabled = true;
        settings.depth_of_field.enabled = true;
        settings.anti_aliasing = AntiAliasing::Taa;

        assert_eq!(
            resolve(&settings),
            vec![
                "GpuInitialization",
                "Forward",
                "Skybox",
                "ForwardTransparent",
                "Ssao",
                "Bloom",
                "Tonemapping",
                "MotionBlur",
                "GaussianDof",
                "TemporalAa",
                "FinalResolve"
            ]
        );
    }

    #[test]
    fn test_minimal_chain() {
        let mut settings = RenderSettings::default();
        settings.enable_skybox = false;
        settings.tonemapping.enabled = false;
        settings.motion_blur.enabled = false;
        settings.anti_aliasing = AntiAliasing::None;

        assert_eq!(resolve(&settings), vec!["GpuInitialization", "Forward", "ForwardTransparent", "FinalResolve"]);
    }

    #[test]
    fn test_depth_of_field_without_motion_blur() {
        let mut settings = RenderSettings::default();
        settings.motion_blur.enabled = false;
        settings.depth_of_field.enabled = true;

        let mut device = HeadlessDevice::new();
        let mut compositor = RenderCompositor::new();
        compositor
            .resolve(&builtin_registry().unwrap(), &settings, TextureFormat::Rgba8Unorm, &mut device)
            .unwrap();
        assert_eq!(
            compositor.node_ids(),
            vec![
                "GpuInitialization",
                "Forward",
                "Skybox",
                "ForwardTransparent",
                "Tonemapping",
                "GaussianDof",
                "Fxaa",
                "FinalResolve"
            ]
        );
        assert_eq!(compositor.node_inputs(GaussianDofPass::ID), Some(vec![TonemappingPass::ID]));
        assert_eq!(compositor.node_inputs(FxaaPass::ID), Some(vec![GaussianDofPass::ID]));
    }
}
