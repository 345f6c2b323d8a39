//! Frame pipeline integration tests, run against the headless device.

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Vec3, Vec4};
use rstest::rstest;

use common::{camera_on, cube_at, cube_with, degenerate_mesh, initialized, window};
use renderman::backend::{BufferHandle, DeviceCommand, DeviceError, HeadlessDevice, RenderTargetId};
use renderman::renderer::{QueuePriority, RenderQueueItem};
use renderman::resources::{Material, MaterialKind, Mesh};
use renderman::{
    shared, Camera, CullingFlags, FrameData, InstancingMode, Light, RenderMan, RenderManOptions,
    RenderSettings, Renderable, RendererError, SceneObjectId, UpdateFlags,
};

const FRAME: FrameData = FrameData { time: 0.0, delta: 1.0 / 60.0 };

fn per_object_binds(render_man: &RenderMan<HeadlessDevice>, buffer: BufferHandle) -> usize {
    render_man
        .device()
        .commands()
        .iter()
        .filter(|cmd| matches!(cmd, DeviceCommand::BindBuffer { slot, buffer: b } if slot == "PerObject" && *b == buffer))
        .count()
}

fn per_object_buffer(render_man: &RenderMan<HeadlessDevice>, id: SceneObjectId) -> BufferHandle {
    let info = render_man.scene().info();
    let index = info.renderable_index(id).expect("renderable registered");
    info.renderables[index].per_object_buffer()
}

fn visible(render_man: &RenderMan<HeadlessDevice>, id: SceneObjectId) -> bool {
    let index = render_man.scene().info().renderable_index(id).expect("renderable registered");
    render_man.main_view_group().visibility().renderables[index].visible
}

#[test]
fn test_frustum_visibility() {
    let mut render_man = initialized(HeadlessDevice::new(), RenderManOptions::default());
    let target = window("main");
    let camera = camera_on(&target);

    let a = cube_at(Vec3::ZERO);
    // Behind the camera
    let b = cube_at(Vec3::new(0.0, 0.0, 50.0));
    let c = shared(Renderable::new(degenerate_mesh(), Arc::new(Material::new("point"))));

    render_man.notify_camera_added(&camera);
    for renderable in [&a, &b, &c] {
        render_man.notify_renderable_added(renderable);
    }
    render_man.render_all(&FRAME).unwrap();

    let ids: Vec<SceneObjectId> = [&a, &b, &c].iter().map(|r| r.read().id()).collect();
    let visibility: Vec<bool> = ids.iter().map(|&id| visible(&render_man, id)).collect();
    assert_eq!(visibility, vec![true, false, true]);
    assert_eq!(
        render_man.main_view_group().visibility().renderables.len(),
        render_man.scene().info().renderables.len()
    );
}

#[test]
fn test_culled_renderable_is_never_drawn() {
    let mut render_man = initialized(HeadlessDevice::new(), RenderManOptions::default());
    let target = window("main");
    let camera = camera_on(&target);
    let front = cube_at(Vec3::ZERO);
    let behind = cube_at(Vec3::new(0.0, 0.0, 50.0));

    render_man.notify_camera_added(&camera);
    render_man.notify_renderable_added(&front);
    render_man.notify_renderable_added(&behind);
    render_man.render_all(&FRAME).unwrap();

    let front_id = front.read().id();
    let behind_id = behind.read().id();
    let front_buffer = per_object_buffer(&render_man, front_id);
    let behind_buffer = per_object_buffer(&render_man, behind_id);

    assert_eq!(per_object_binds(&render_man, front_buffer), 1);
    assert_eq!(per_object_binds(&render_man, behind_buffer), 0);
    assert_eq!(render_man.device().buffer_write_count(behind_buffer), 0);
}

#[test]
fn test_culling_disabled_marks_everything_visible() {
    let options = RenderManOptions {
        culling: CullingFlags::empty(),
        ..Default::default()
    };
    let mut render_man = initialized(HeadlessDevice::new(), options);
    let target = window("main");
    let camera = camera_on(&target);
    let behind = cube_at(Vec3::new(0.0, 0.0, 50.0));

    render_man.notify_camera_added(&camera);
    render_man.notify_renderable_added(&behind);
    render_man.render_all(&FRAME).unwrap();

    let id = behind.read().id();
    assert!(visible(&render_man, id));
}

#[test]
fn test_shared_renderable_uploaded_once_per_frame() {
    let mut render_man = initialized(HeadlessDevice::new(), RenderManOptions::default());
    let target = window("main");
    let left = camera_on(&target);
    let right = camera_on(&target);
    right.write().priority = 1;
    let x = cube_at(Vec3::ZERO);

    render_man.notify_camera_added(&left);
    render_man.notify_camera_added(&right);
    render_man.notify_renderable_added(&x);
    render_man.render_all(&FRAME).unwrap();

    let id = x.read().id();
    let buffer = per_object_buffer(&render_man, id);
    assert_eq!(per_object_binds(&render_man, buffer), 2);
    assert_eq!(render_man.device().buffer_write_count(buffer), 1);

    render_man.render_all(&FRAME).unwrap();
    assert_eq!(render_man.device().buffer_write_count(buffer), 2);
}

#[test]
fn test_opaque_queue_front_to_back() {
    let mut render_man = initialized(HeadlessDevice::new(), RenderManOptions::default());
    let target = window("main");
    let camera = camera_on(&target);
    let far = cube_at(Vec3::new(0.0, 0.0, -20.0));
    let near = cube_at(Vec3::ZERO);
    let middle = cube_at(Vec3::new(0.0, 0.0, -10.0));

    render_man.notify_camera_added(&camera);
    for renderable in [&far, &near, &middle] {
        render_man.notify_renderable_added(renderable);
    }
    render_man.render_all(&FRAME).unwrap();

    let info = render_man.scene().info();
    let camera_id = camera.read().id();
    let view = info.view_for_camera(camera_id).expect("view");
    let order: Vec<SceneObjectId> = view
        .render_queue()
        .with_priority(QueuePriority::Opaque)
        .filter_map(|entry| match entry.item {
            RenderQueueItem::Renderable { renderable, .. } => Some(info.renderables[renderable].id()),
            _ => None,
        })
        .collect();

    let expected: Vec<SceneObjectId> = [&near, &middle, &far].iter().map(|r| r.read().id()).collect();
    assert_eq!(order, expected);
}

#[test]
fn test_transparent_drawn_after_opaque() {
    let mut render_man = initialized(HeadlessDevice::new(), RenderManOptions::default());
    let target = window("main");
    let camera = camera_on(&target);
    let glass = Arc::new(Material::new("glass").with_kind(MaterialKind::Transparent));
    let mesh = Arc::new(Mesh::cube());
    let transparent = cube_with(&mesh, &glass, Vec3::ZERO);
    let opaque = cube_at(Vec3::new(0.0, 0.0, -5.0));

    render_man.notify_camera_added(&camera);
    render_man.notify_renderable_added(&transparent);
    render_man.notify_renderable_added(&opaque);
    render_man.render_all(&FRAME).unwrap();

    let transparent_buffer = per_object_buffer(&render_man, transparent.read().id());
    let opaque_buffer = per_object_buffer(&render_man, opaque.read().id());
    let position = |buffer: BufferHandle| {
        render_man
            .device()
            .commands()
            .iter()
            .position(|cmd| matches!(cmd, DeviceCommand::BindBuffer { buffer: b, .. } if *b == buffer))
    };
    let (Some(opaque_at), Some(transparent_at)) = (position(opaque_buffer), position(transparent_buffer)) else {
        panic!("both renderables should be drawn");
    };
    assert!(opaque_at < transparent_at);
}

#[test]
fn test_register_unregister_round_trip() {
    let mut render_man = initialized(HeadlessDevice::new(), RenderManOptions::default());
    let target = window("main");
    let camera = camera_on(&target);
    render_man.notify_camera_added(&camera);
    render_man.render_all(&FRAME).unwrap();
    let baseline = render_man.device().live_buffer_count();

    let first = cube_at(Vec3::ZERO);
    let second = cube_at(Vec3::X);
    render_man.notify_renderable_added(&first);
    render_man.notify_renderable_added(&second);
    render_man.render_all(&FRAME).unwrap();
    assert_eq!(render_man.scene().info().renderables.len(), 2);

    let first_id = first.read().id();
    let second_id = second.read().id();
    render_man.notify_renderable_removed(first_id);
    render_man.render_all(&FRAME).unwrap();

    let info = render_man.scene().info();
    assert_eq!(info.renderables.len(), 1);
    assert_eq!(info.renderable_index(first_id), None);
    assert_eq!(info.renderable_index(second_id), Some(0));
    assert_eq!(info.renderables[0].id(), second_id);

    render_man.notify_renderable_removed(second_id);
    render_man.render_all(&FRAME).unwrap();
    assert!(render_man.scene().info().renderables.is_empty());
    assert!(render_man.scene().info().renderable_to_index.is_empty());
    assert_eq!(render_man.device().live_buffer_count(), baseline);
}

fn index_snapshot(
    render_man: &RenderMan<HeadlessDevice>,
) -> (
    HashMap<SceneObjectId, usize>,
    HashMap<SceneObjectId, usize>,
    Vec<(RenderTargetId, Vec<SceneObjectId>)>,
) {
    let info = render_man.scene().info();
    let targets = info
        .render_targets
        .iter()
        .map(|group| (group.target.id(), group.cameras.clone()))
        .collect();
    (info.renderable_to_index.clone(), info.camera_to_view.clone(), targets)
}

#[test]
fn test_same_frame_register_unregister_leaves_indices_untouched() {
    let mut render_man = initialized(HeadlessDevice::new(), RenderManOptions::default());
    let target = window("main");
    let camera = camera_on(&target);
    let resident = cube_at(Vec3::ZERO);
    render_man.notify_camera_added(&camera);
    render_man.notify_renderable_added(&resident);
    render_man.render_all(&FRAME).unwrap();
    let before = index_snapshot(&render_man);
    let buffers_before = render_man.device().live_buffer_count();

    let transient = cube_at(Vec3::X);
    let other_target = window("other");
    let transient_camera = camera_on(&other_target);
    let notifier = render_man.notifier();
    notifier.renderable_added(&transient);
    notifier.camera_added(&transient_camera);
    notifier.renderable_removed(transient.read().id());
    notifier.camera_removed(transient_camera.read().id());
    render_man.render_all(&FRAME).unwrap();

    assert_eq!(index_snapshot(&render_man), before);
    assert_eq!(render_man.device().live_buffer_count(), buffers_before);
    assert_eq!(render_man.device().swap_count(other_target.id()), 0);
}

#[test]
fn test_empty_viewport_is_not_presented() {
    let mut render_man = initialized(HeadlessDevice::new(), RenderManOptions::default());
    let target = window("main");
    let camera = camera_on(&target);
    camera.write().viewport.area = Vec4::ZERO;
    render_man.notify_camera_added(&camera);
    render_man.notify_renderable_added(&cube_at(Vec3::ZERO));
    render_man.render_all(&FRAME).unwrap();

    assert!(render_man.scene().info().view_for_camera(camera.read().id()).is_some());
    assert_eq!(render_man.device().draw_calls().count(), 0);
    assert_eq!(render_man.device().swap_count(target.id()), 0);

    // A second, drawing camera on the same window gets it presented again
    let full = camera_on(&target);
    render_man.notify_camera_added(&full);
    render_man.render_all(&FRAME).unwrap();
    assert_eq!(render_man.device().swap_count(target.id()), 1);
}

#[test]
fn test_frame_buffer_written_once_across_views() {
    let mut render_man = initialized(HeadlessDevice::new(), RenderManOptions::default());
    let target = window("main");
    let warm = camera_on(&target);
    let cold = camera_on(&target);
    {
        let mut settings = RenderSettings::default();
        settings.scene_light_color = Vec4::new(1.0, 0.8, 0.6, 1.0);
        warm.write().settings = Arc::new(settings);
        let mut settings = RenderSettings::default();
        settings.scene_light_color = Vec4::new(0.6, 0.8, 1.0, 1.0);
        settings.enable_skybox = false;
        let mut camera = cold.write();
        camera.settings = Arc::new(settings);
        camera.priority = 1;
    }
    render_man.notify_camera_added(&warm);
    render_man.notify_camera_added(&cold);
    render_man.render_all(&FRAME).unwrap();
    render_man.render_all(&FRAME).unwrap();

    let per_frame = render_man.scene().per_frame_buffer().expect("initialized");
    assert_eq!(render_man.device().buffer_write_count(per_frame), 2);
    for camera in [&warm, &cold] {
        let view = render_man
            .scene()
            .info()
            .view_for_camera(camera.read().id())
            .expect("view");
        assert_eq!(render_man.device().buffer_write_count(view.per_view_buffer()), 2);
    }
}

#[test]
fn test_camera_target_changes() {
    let mut render_man = initialized(HeadlessDevice::new(), RenderManOptions::default());
    let camera = shared(Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO));
    let camera_id = camera.read().id();

    render_man.notify_camera_added(&camera);
    render_man.render_all(&FRAME).unwrap();
    assert!(render_man.scene().info().view_for_camera(camera_id).is_none());
    assert!(render_man.scene().info().render_targets.is_empty());

    let first = window("first");
    camera.write().viewport.target = Some(first.clone());
    render_man.notify_camera_updated(camera_id, UpdateFlags::PROPERTIES);
    render_man.render_all(&FRAME).unwrap();
    {
        let info = render_man.scene().info();
        assert!(info.view_for_camera(camera_id).is_some());
        assert_eq!(info.render_targets.len(), 1);
        assert_eq!(info.render_targets[0].target.id(), first.id());
        assert_eq!(info.render_targets[0].cameras, vec![camera_id]);
    }
    assert_eq!(render_man.device().swap_count(first.id()), 1);

    // Target changes are picked up without a notification
    let second = window("second");
    camera.write().viewport.target = Some(second.clone());
    render_man.render_all(&FRAME).unwrap();
    {
        let info = render_man.scene().info();
        assert_eq!(info.render_targets.len(), 1);
        assert_eq!(info.render_targets[0].target.id(), second.id());
    }

    render_man.notify_camera_removed(camera_id);
    render_man.render_all(&FRAME).unwrap();
    let info = render_man.scene().info();
    assert!(info.views.is_empty());
    assert!(info.render_targets.is_empty());
    assert!(info.camera_to_view.is_empty());
}

#[test]
fn test_texture_targets_render_before_windows() {
    let mut render_man = initialized(HeadlessDevice::new(), RenderManOptions::default());
    let screen = window("screen");
    let offscreen = Arc::new(renderman::RenderTarget::texture(
        "mirror",
        128,
        128,
        renderman::backend::TextureFormat::Rgba8Unorm,
    ));
    let main_camera = camera_on(&screen);
    let mirror_camera = camera_on(&offscreen);
    render_man.notify_camera_added(&main_camera);
    render_man.notify_camera_added(&mirror_camera);
    render_man.render_all(&FRAME).unwrap();

    let targets: Vec<_> = render_man
        .scene()
        .info()
        .render_targets
        .iter()
        .map(|group| group.target.id())
        .collect();
    assert_eq!(targets, vec![offscreen.id(), screen.id()]);
    assert_eq!(render_man.device().swap_count(offscreen.id()), 0);
    assert_eq!(render_man.device().swap_count(screen.id()), 1);
}

#[rstest]
#[case::manual(InstancingMode::Manual, true, 1)]
#[case::manual_not_opted_in(InstancingMode::Manual, false, 0)]
#[case::automatic(InstancingMode::Automatic, false, 1)]
#[case::disabled(InstancingMode::None, true, 0)]
fn test_instancing_modes(#[case] mode: InstancingMode, #[case] opt_in: bool, #[case] blocks: usize) {
    let options = RenderManOptions {
        instancing: mode,
        ..Default::default()
    };
    let mut render_man = initialized(HeadlessDevice::new(), options);
    let target = window("main");
    let camera = camera_on(&target);
    let mesh = Arc::new(Mesh::cube());
    let material = Arc::new(Material::new("shared"));

    render_man.notify_camera_added(&camera);
    for x in -2..=2 {
        let renderable = cube_with(&mesh, &material, Vec3::new(x as f32, 0.0, 0.0));
        renderable.write().instancing = opt_in;
        render_man.notify_renderable_added(&renderable);
    }
    render_man.render_all(&FRAME).unwrap();

    let visibility = render_man.main_view_group().visibility();
    assert_eq!(visibility.instanced_blocks.len(), blocks);
    let instanced = visibility.renderables.iter().filter(|info| info.instanced).count();
    assert_eq!(instanced, blocks * 5);

    let instanced_draws = render_man
        .device()
        .draw_calls()
        .filter(|call| call.instance_count == 5)
        .count();
    assert_eq!(instanced_draws, blocks);
}

#[test]
fn test_lights_reach_the_view() {
    let mut render_man = initialized(HeadlessDevice::new(), RenderManOptions::default());
    let target = window("main");
    let camera = camera_on(&target);
    let sun = shared(Light::directional(Vec3::new(0.0, -1.0, 0.0)));
    let lamp = shared(Light::radial(Vec3::new(0.0, 1.0, 0.0), 5.0));
    let hidden = shared(Light::radial(Vec3::new(0.0, 0.0, 100.0), 5.0));

    render_man.notify_camera_added(&camera);
    for light in [&sun, &lamp, &hidden] {
        render_man.notify_light_added(light);
    }
    render_man.render_all(&FRAME).unwrap();

    let info = render_man.scene().info();
    assert_eq!(info.directional_lights.len(), 1);
    assert_eq!(info.radial_lights.len(), 2);
    let visibility = render_man.main_view_group().visibility();
    assert_eq!(visibility.radial_lights, vec![true, false]);
}

#[test]
fn test_out_of_memory_is_fatal() {
    // Frame buffers and one view fit, the renderable's buffers don't
    let device = HeadlessDevice::new().with_buffer_limit(19);
    let mut render_man = initialized(device, RenderManOptions::default());
    let target = window("main");
    let camera = camera_on(&target);
    render_man.notify_camera_added(&camera);
    render_man.render_all(&FRAME).unwrap();

    render_man.notify_renderable_added(&cube_at(Vec3::ZERO));
    let result = render_man.render_all(&FRAME);
    assert!(matches!(result, Err(RendererError::Device(DeviceError::OutOfMemory))));
    assert!(render_man.scene().info().renderables.is_empty());
}

#[test]
fn test_lifecycle_errors() {
    common::init_logging();
    let mut render_man = RenderMan::new(HeadlessDevice::new(), RenderManOptions::default());
    assert!(matches!(render_man.render_all(&FRAME), Err(RendererError::NotInitialized)));

    render_man.initialize().unwrap();
    assert!(matches!(render_man.initialize(), Err(RendererError::AlreadyInitialized)));
    render_man.render_all(&FRAME).unwrap();

    render_man.destroy();
    assert!(matches!(render_man.render_all(&FRAME), Err(RendererError::Destroyed)));
    assert!(matches!(render_man.initialize(), Err(RendererError::Destroyed)));
    assert_eq!(render_man.device().live_buffer_count(), 0);
}

#[test]
fn test_destroy_releases_everything() {
    let mut render_man = initialized(HeadlessDevice::new(), RenderManOptions::default());
    let target = window("main");
    let camera = camera_on(&target);
    render_man.notify_camera_added(&camera);
    render_man.notify_renderable_added(&cube_at(Vec3::ZERO));
    render_man.render_all(&FRAME).unwrap();
    assert!(render_man.device().live_texture_count() > 0);

    render_man.destroy();
    assert_eq!(render_man.device().live_buffer_count(), 0);
    assert_eq!(render_man.device().live_texture_count(), 0);
}
