//! Compositor resolution and execution through a full frame.

mod common;

use std::sync::Arc;

use glam::Vec3;
use rstest::rstest;

use common::{camera_on, cube_at, initialized, init_logging, window};
use renderman::backend::{DeviceCommand, HeadlessDevice, ProgramKey, TextureDescriptor, TextureFormat};
use renderman::pipeline::{BloomPass, FinalResolvePass, GaussianDofPass, MotionBlurPass, TonemappingPass};
use renderman::render_graph::*;
use renderman::scene::{AntiAliasing, MotionBlurDomain};
use renderman::{
    shared, Camera, FrameData, RenderMan, RenderManOptions, RenderSettings, RenderTarget,
    RendererError, SceneObjectId,
};

const FRAME: FrameData = FrameData { time: 0.0, delta: 1.0 / 60.0 };

fn camera_with(target: &Arc<RenderTarget>, settings: RenderSettings) -> renderman::Shared<Camera> {
    shared(
        Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO)
            .with_target(target.clone())
            .with_settings(settings),
    )
}

fn compositor_nodes(render_man: &RenderMan<HeadlessDevice>, camera: SceneObjectId) -> Vec<&'static str> {
    render_man
        .scene()
        .info()
        .view_for_camera(camera)
        .expect("view")
        .compositor()
        .node_ids()
}

#[derive(Default)]
struct SceneColorNode;

impl NodeType for SceneColorNode {
    const ID: &'static str = "Forward";
    const INPUTS: &'static [&'static str] = &[];
}

impl CompositorNode for SceneColorNode {
    fn render(&mut self, ctx: &mut NodeContext<'_, '_>) -> renderman::RendererResult<NodeOutcome> {
        let color = ctx.acquire_texture(&TextureDescriptor::attachment("color", 8, 8, TextureFormat::Rgba16Float))?;
        Ok(NodeOutcome::Executed(NodeOutput::new().with(SCENE_COLOR, color)))
    }
}

#[derive(Default)]
struct BloomNode;

impl NodeType for BloomNode {
    const ID: &'static str = "Bloom";
    const INPUTS: &'static [&'static str] = &[SceneColorNode::ID];

    fn enabled(settings: &RenderSettings) -> bool {
        settings.bloom.enabled
    }
}

impl CompositorNode for BloomNode {
    fn render(&mut self, _ctx: &mut NodeContext<'_, '_>) -> renderman::RendererResult<NodeOutcome> {
        Ok(NodeOutcome::PassThrough)
    }
}

#[derive(Default)]
struct TonemapNode;

impl NodeType for TonemapNode {
    const ID: &'static str = "Tonemap";
    const INPUTS: &'static [&'static str] = &[BloomNode::ID];
}

impl CompositorNode for TonemapNode {
    fn render(&mut self, ctx: &mut NodeContext<'_, '_>) -> renderman::RendererResult<NodeOutcome> {
        ctx.input_resource(SCENE_COLOR)?;
        Ok(NodeOutcome::PassThrough)
    }
}

#[derive(Default)]
struct ResolveNode;

impl NodeType for ResolveNode {
    const ID: &'static str = "FinalResolve";
    const INPUTS: &'static [&'static str] = &[TonemapNode::ID];
}

impl CompositorNode for ResolveNode {
    fn render(&mut self, ctx: &mut NodeContext<'_, '_>) -> renderman::RendererResult<NodeOutcome> {
        ctx.input_resource(SCENE_COLOR)?;
        Ok(NodeOutcome::Executed(NodeOutput::new()))
    }
}

fn custom_registry() -> NodeRegistry {
    let mut registry = NodeRegistry::new(ResolveNode::ID);
    registry.register_type::<SceneColorNode>().unwrap();
    registry.register_type::<BloomNode>().unwrap();
    registry.register_type::<TonemapNode>().unwrap();
    registry.register_type::<ResolveNode>().unwrap();
    registry
}

#[rstest]
#[case::bloom_disabled(false, vec!["Forward", "Tonemap", "FinalResolve"])]
#[case::bloom_enabled(true, vec!["Forward", "Bloom", "Tonemap", "FinalResolve"])]
fn test_custom_registry_resolution(#[case] bloom: bool, #[case] expected: Vec<&'static str>) {
    init_logging();
    let mut render_man = RenderMan::new(HeadlessDevice::new(), RenderManOptions::default());
    render_man.initialize_with(custom_registry()).unwrap();

    let mut settings = RenderSettings::default();
    settings.bloom.enabled = bloom;
    let target = window("main");
    let camera = camera_with(&target, settings);
    render_man.notify_camera_added(&camera);
    render_man.render_all(&FRAME).unwrap();

    let camera_id = camera.read().id();
    assert_eq!(compositor_nodes(&render_man, camera_id), expected);
    let view = render_man.scene().info().view_for_camera(camera_id).expect("view");
    assert_eq!(view.compositor().node_inputs("Tonemap"), Some(vec![expected[expected.len() - 3]]));
    assert_eq!(view.compositor().node_state("FinalResolve"), NodeState::Executed);
    assert_eq!(render_man.scene().pool().in_use_count(), 0);
}

#[test]
fn test_invalid_registry_fails_initialization() {
    init_logging();
    let mut registry = NodeRegistry::new(ResolveNode::ID);
    registry.register_type::<TonemapNode>().unwrap();
    registry.register_type::<ResolveNode>().unwrap();

    let mut render_man = RenderMan::new(HeadlessDevice::new(), RenderManOptions::default());
    assert!(matches!(
        render_man.initialize_with(registry),
        Err(RendererError::UnregisteredNodeType("Bloom"))
    ));
}

#[test]
fn test_missing_program_passes_through() {
    let device = HeadlessDevice::new().without_program(ProgramKey::Tonemapping);
    let mut render_man = initialized(device, RenderManOptions::default());
    let target = window("main");
    let camera = camera_on(&target);
    render_man.notify_camera_added(&camera);
    render_man.notify_renderable_added(&cube_at(Vec3::ZERO));
    render_man.render_all(&FRAME).unwrap();

    let camera_id = camera.read().id();
    let view = render_man.scene().info().view_for_camera(camera_id).expect("view");
    let compositor = view.compositor();
    assert_eq!(compositor.node_state(TonemappingPass::ID), NodeState::Executed);
    assert_eq!(
        compositor.node_output(TonemappingPass::ID),
        compositor.node_output("ForwardTransparent")
    );
    assert!(compositor
        .node_output(TonemappingPass::ID)
        .map_or(false, |output| output.get(LIT_COLOR).is_none()));

    let programs: Vec<ProgramKey> = render_man.device().bound_programs().collect();
    assert!(!programs.contains(&ProgramKey::Tonemapping));
    assert!(programs.contains(&ProgramKey::Forward));
    assert!(programs.contains(&ProgramKey::FinalResolve));
}

#[test]
fn test_missing_bloom_program_keeps_frame_going() {
    let device = HeadlessDevice::new().without_program(ProgramKey::BloomBlur);
    let mut render_man = initialized(device, RenderManOptions::default());
    let mut settings = RenderSettings::default();
    settings.bloom.enabled = true;
    let target = window("main");
    let camera = camera_with(&target, settings);
    render_man.notify_camera_added(&camera);
    render_man.render_all(&FRAME).unwrap();

    let camera_id = camera.read().id();
    let view = render_man.scene().info().view_for_camera(camera_id).expect("view");
    let bloom = view.compositor().node_output(BloomPass::ID).expect("bloom ran");
    assert!(bloom.get(BLOOM).is_none());
    assert_eq!(view.compositor().node_state(FinalResolvePass::ID), NodeState::Executed);
}

#[rstest]
#[case::motion_blur(ProgramKey::MotionBlur, MotionBlurPass::ID, TonemappingPass::ID)]
#[case::depth_of_field(ProgramKey::GaussianDofBlur, GaussianDofPass::ID, MotionBlurPass::ID)]
fn test_missing_effect_program_passes_through(
    #[case] missing: ProgramKey,
    #[case] node: &'static str,
    #[case] upstream: &'static str,
) {
    let device = HeadlessDevice::new().without_program(missing);
    let mut render_man = initialized(device, RenderManOptions::default());
    let mut settings = RenderSettings::default();
    settings.depth_of_field.enabled = true;
    let target = window("main");
    let camera = camera_with(&target, settings);
    render_man.notify_camera_added(&camera);
    render_man.render_all(&FRAME).unwrap();

    let camera_id = camera.read().id();
    let view = render_man.scene().info().view_for_camera(camera_id).expect("view");
    let compositor = view.compositor();
    assert_eq!(compositor.node_state(node), NodeState::Executed);
    assert_eq!(compositor.node_output(node), compositor.node_output(upstream));
    assert_eq!(compositor.node_state(FinalResolvePass::ID), NodeState::Executed);
    assert!(!render_man.device().bound_programs().any(|key| key == missing));
}

#[test]
fn test_object_motion_blur_samples_velocity() {
    let mut settings = RenderSettings::default();
    settings.motion_blur.domain = MotionBlurDomain::ObjectOnly;
    let mut render_man = initialized(HeadlessDevice::new(), RenderManOptions::default());
    let target = window("main");
    let camera = camera_with(&target, settings);
    render_man.notify_camera_added(&camera);
    render_man.notify_renderable_added(&cube_at(Vec3::ZERO));
    render_man.render_all(&FRAME).unwrap();

    let camera_id = camera.read().id();
    let view = render_man.scene().info().view_for_camera(camera_id).expect("view");
    let velocity = view
        .compositor()
        .node_output("GpuInitialization")
        .and_then(|output| output.get(SCENE_VELOCITY))
        .expect("velocity allocated");
    assert!(render_man.device().commands().iter().any(|command| matches!(
        command,
        DeviceCommand::BindTexture { slot, texture } if slot == "VelocityTex" && *texture == velocity
    )));
    assert!(render_man.device().bound_programs().any(|key| key == ProgramKey::MotionBlur));
    assert_eq!(render_man.scene().pool().in_use_count(), 1);
}

#[test]
fn test_unsupported_target_format_is_fatal() {
    let device = HeadlessDevice::new().without_render_format(TextureFormat::Bgra8UnormSrgb);
    let mut render_man = initialized(device, RenderManOptions::default());
    let target = window("main");
    let camera = camera_on(&target);
    render_man.notify_camera_added(&camera);

    assert!(matches!(
        render_man.render_all(&FRAME),
        Err(RendererError::UnsupportedTargetFormat(TextureFormat::Bgra8UnormSrgb))
    ));
}

#[test]
fn test_previous_depth_carried_between_frames() {
    let mut settings = RenderSettings::default();
    settings.anti_aliasing = AntiAliasing::Taa;
    let mut render_man = initialized(HeadlessDevice::new(), RenderManOptions::default());
    let target = window("main");
    let camera = camera_with(&target, settings);
    let camera_id = camera.read().id();
    render_man.notify_camera_added(&camera);

    render_man.render_all(&FRAME).unwrap();
    let first_depth = {
        let view = render_man.scene().info().view_for_camera(camera_id).expect("view");
        // No history on the first frame
        assert!(!render_man.device().bound_programs().any(|key| key == ProgramKey::TemporalAa));
        view.last_depth_buffer().expect("depth persisted")
    };

    render_man.device_mut().clear_commands();
    render_man.render_all(&FRAME).unwrap();
    let view = render_man.scene().info().view_for_camera(camera_id).expect("view");
    let second_depth = view.last_depth_buffer().expect("depth persisted");
    assert_ne!(first_depth, second_depth);
    assert!(render_man.device().bound_programs().any(|key| key == ProgramKey::TemporalAa));
    // Only the persisted depth is still held between frames
    assert_eq!(render_man.scene().pool().in_use_count(), 1);
}

#[test]
fn test_settings_change_re_resolves() {
    let mut render_man = initialized(HeadlessDevice::new(), RenderManOptions::default());
    let target = window("main");
    let camera = camera_on(&target);
    let camera_id = camera.read().id();
    render_man.notify_camera_added(&camera);
    render_man.render_all(&FRAME).unwrap();
    assert!(!compositor_nodes(&render_man, camera_id).contains(&"Ssao"));

    let mut settings = RenderSettings::default();
    settings.ambient_occlusion.enabled = true;
    camera.write().settings = Arc::new(settings);
    render_man.render_all(&FRAME).unwrap();
    assert!(compositor_nodes(&render_man, camera_id).contains(&"Ssao"));
}

#[test]
fn test_overlay_only_view_skips_compositor() {
    let mut settings = RenderSettings::default();
    settings.overlay_only = true;
    let mut render_man = initialized(HeadlessDevice::new(), RenderManOptions::default());
    let target = window("hud");
    let camera = camera_with(&target, settings);
    render_man.notify_camera_added(&camera);
    render_man.notify_renderable_added(&cube_at(Vec3::ZERO));
    render_man.render_all(&FRAME).unwrap();

    let camera_id = camera.read().id();
    let view = render_man.scene().info().view_for_camera(camera_id).expect("view");
    assert!(!view.compositor().is_resolved());
    assert!(view.render_queue().is_empty());
    assert_eq!(render_man.device().draw_calls().count(), 0);
    assert_eq!(render_man.device().swap_count(target.id()), 1);
}
