//! Top-level renderer

use std::sync::Arc;

use parking_lot::Mutex;

use super::render_queue::RenderQueueItem;
use super::scene::RendererScene;
use super::view_group::RendererViewGroup;
use crate::backend::GpuDevice;
use crate::error::{RendererError, RendererResult};
use crate::options::RenderManOptions;
use crate::pipeline;
use crate::render_graph::{NodeRegistry, NodeType};
use crate::scene::{Camera, Light, Renderable, SceneObjectId, Shared, Skybox, UpdateFlags};

/// Per-frame values handed to [`RenderMan::render_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameData {
    /// Seconds since start
    pub time: f32,
    /// Seconds since the previous frame
    pub delta: f32,
}

/// A scene mutation queued for the next frame boundary
#[derive(Debug, Clone)]
pub enum SceneCommand {
    CameraAdded(Shared<Camera>),
    CameraUpdated(SceneObjectId, UpdateFlags),
    CameraRemoved(SceneObjectId),
    RenderableAdded(Shared<Renderable>),
    RenderableUpdated(SceneObjectId, UpdateFlags),
    RenderableRemoved(SceneObjectId),
    LightAdded(Shared<Light>),
    LightUpdated(SceneObjectId, UpdateFlags),
    LightRemoved(SceneObjectId),
    SkyboxAdded(Shared<Skybox>),
    SkyboxRemoved(SceneObjectId),
}

/// Cloneable handle the simulation uses to notify the renderer of scene
/// changes from any thread. Commands are applied in order at the start of the
/// next [`RenderMan::render_all`].
#[derive(Debug, Clone, Default)]
pub struct SceneNotifier {
    queue: Arc<Mutex<Vec<SceneCommand>>>,
}

impl SceneNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, command: SceneCommand) {
        self.queue.lock().push(command);
    }

    pub fn camera_added(&self, camera: &Shared<Camera>) {
        self.push(SceneCommand::CameraAdded(camera.clone()));
    }

    pub fn camera_updated(&self, camera: SceneObjectId, flags: UpdateFlags) {
        self.push(SceneCommand::CameraUpdated(camera, flags));
    }

    pub fn camera_removed(&self, camera: SceneObjectId) {
        self.push(SceneCommand::CameraRemoved(camera));
    }

    pub fn renderable_added(&self, renderable: &Shared<Renderable>) {
        self.push(SceneCommand::RenderableAdded(renderable.clone()));
    }

    pub fn renderable_updated(&self, renderable: SceneObjectId, flags: UpdateFlags) {
        self.push(SceneCommand::RenderableUpdated(renderable, flags));
    }

    pub fn renderable_removed(&self, renderable: SceneObjectId) {
        self.push(SceneCommand::RenderableRemoved(renderable));
    }

    pub fn light_added(&self, light: &Shared<Light>) {
        self.push(SceneCommand::LightAdded(light.clone()));
    }

    pub fn light_updated(&self, light: SceneObjectId, flags: UpdateFlags) {
        self.push(SceneCommand::LightUpdated(light, flags));
    }

    pub fn light_removed(&self, light: SceneObjectId) {
        self.push(SceneCommand::LightRemoved(light));
    }

    pub fn skybox_added(&self, skybox: &Shared<Skybox>) {
        self.push(SceneCommand::SkyboxAdded(skybox.clone()));
    }

    pub fn skybox_removed(&self, skybox: SceneObjectId) {
        self.push(SceneCommand::SkyboxRemoved(skybox));
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    fn drain(&self) -> Vec<SceneCommand> {
        std::mem::take(&mut *self.queue.lock())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderManState {
    Uninitialized,
    Initialized,
    Destroyed,
}

/// Renderer orchestrator.
///
/// Owns the device, the render-side scene and the main view group, and runs
/// the frame pipeline in [`render_all`](Self::render_all).
pub struct RenderMan<D: GpuDevice> {
    device: D,
    options: RenderManOptions,
    state: RenderManState,
    registry: NodeRegistry,
    scene: RendererScene,
    main_view_group: RendererViewGroup,
    notifier: SceneNotifier,
    frame_index: u64,
}

impl<D: GpuDevice> RenderMan<D> {
    pub fn new(device: D, options: RenderManOptions) -> Self {
        Self {
            device,
            options,
            state: RenderManState::Uninitialized,
            registry: NodeRegistry::new(pipeline::FinalResolvePass::ID),
            scene: RendererScene::new(),
            main_view_group: RendererViewGroup::new(),
            notifier: SceneNotifier::new(),
            frame_index: 0,
        }
    }

    /// Initialize with the built-in compositor nodes
    pub fn initialize(&mut self) -> RendererResult<()> {
        let registry = pipeline::builtin_registry()?;
        self.initialize_with(registry)
    }

    /// Initialize with a custom node registry. The registry is validated here;
    /// a missing node type or a dependency cycle fails initialization.
    pub fn initialize_with(&mut self, registry: NodeRegistry) -> RendererResult<()> {
        match self.state {
            RenderManState::Initialized => return Err(RendererError::AlreadyInitialized),
            RenderManState::Destroyed => return Err(RendererError::Destroyed),
            RenderManState::Uninitialized => {}
        }

        registry.validate()?;
        self.scene.initialize(&mut self.device)?;
        self.registry = registry;
        self.state = RenderManState::Initialized;

        log::info!(
            "Renderer initialized on {} with {} compositor nodes",
            self.device.name(),
            self.registry.len()
        );
        Ok(())
    }

    pub fn state(&self) -> RenderManState {
        self.state
    }

    fn ensure_initialized(&self) -> RendererResult<()> {
        match self.state {
            RenderManState::Initialized => Ok(()),
            RenderManState::Uninitialized => Err(RendererError::NotInitialized),
            RenderManState::Destroyed => Err(RendererError::Destroyed),
        }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    pub fn scene(&self) -> &RendererScene {
        &self.scene
    }

    pub fn main_view_group(&self) -> &RendererViewGroup {
        &self.main_view_group
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn options(&self) -> &RenderManOptions {
        &self.options
    }

    pub fn set_options(&mut self, options: RenderManOptions) {
        log::debug!("Renderer options changed: {:?}", options);
        self.options = options;
        self.scene.invalidate_compositors();
    }

    /// A handle other threads can use to queue scene changes
    pub fn notifier(&self) -> SceneNotifier {
        self.notifier.clone()
    }

    pub fn notify_camera_added(&self, camera: &Shared<Camera>) {
        self.notifier.camera_added(camera);
    }

    pub fn notify_camera_updated(&self, camera: SceneObjectId, flags: UpdateFlags) {
        self.notifier.camera_updated(camera, flags);
    }

    pub fn notify_camera_removed(&self, camera: SceneObjectId) {
        self.notifier.camera_removed(camera);
    }

    pub fn notify_renderable_added(&self, renderable: &Shared<Renderable>) {
        self.notifier.renderable_added(renderable);
    }

    pub fn notify_renderable_updated(&self, renderable: SceneObjectId, flags: UpdateFlags) {
        self.notifier.renderable_updated(renderable, flags);
    }

    pub fn notify_renderable_removed(&self, renderable: SceneObjectId) {
        self.notifier.renderable_removed(renderable);
    }

    pub fn notify_light_added(&self, light: &Shared<Light>) {
        self.notifier.light_added(light);
    }

    pub fn notify_light_updated(&self, light: SceneObjectId, flags: UpdateFlags) {
        self.notifier.light_updated(light, flags);
    }

    pub fn notify_light_removed(&self, light: SceneObjectId) {
        self.notifier.light_removed(light);
    }

    pub fn notify_skybox_added(&self, skybox: &Shared<Skybox>) {
        self.notifier.skybox_added(skybox);
    }

    pub fn notify_skybox_removed(&self, skybox: SceneObjectId) {
        self.notifier.skybox_removed(skybox);
    }

    /// Apply queued scene changes in submission order
    fn frame_sync(&mut self) -> RendererResult<()> {
        let commands = self.notifier.drain();
        if !commands.is_empty() {
            log::trace!("Applying {} scene commands", commands.len());
        }
        for command in commands {
            let device = &mut self.device;
            match command {
                SceneCommand::CameraAdded(camera) => self.scene.register_camera(device, &camera)?,
                SceneCommand::CameraUpdated(id, flags) => self.scene.update_camera(device, id, flags)?,
                SceneCommand::CameraRemoved(id) => self.scene.unregister_camera(device, id),
                SceneCommand::RenderableAdded(renderable) => self.scene.register_renderable(device, &renderable)?,
                SceneCommand::RenderableUpdated(id, flags) => self.scene.update_renderable(device, id, flags)?,
                SceneCommand::RenderableRemoved(id) => self.scene.unregister_renderable(device, id),
                SceneCommand::LightAdded(light) => self.scene.register_light(&light),
                SceneCommand::LightUpdated(id, flags) => self.scene.update_light(id, flags),
                SceneCommand::LightRemoved(id) => self.scene.unregister_light(id),
                SceneCommand::SkyboxAdded(skybox) => self.scene.register_skybox(&skybox),
                SceneCommand::SkyboxRemoved(id) => self.scene.unregister_skybox(id),
            }
        }
        Ok(())
    }

    /// Render one frame.
    ///
    /// Queued scene changes are applied first, then every renderable is
    /// prepared, then each render target's views are culled, queued and
    /// rendered. Window targets that were drawn to are swapped last.
    pub fn render_all(&mut self, frame: &FrameData) -> RendererResult<()> {
        self.ensure_initialized()?;

        self.frame_sync()?;

        self.scene.begin_frame(&mut self.device, frame, self.frame_index)?;
        for index in 0..self.scene.info().renderables.len() {
            self.scene.prepare_renderable(index);
        }
        self.scene.prepare_lights();

        let targets: Vec<_> = {
            let info = self.scene.info();
            info.render_targets
                .iter()
                .map(|group| {
                    let views: Vec<usize> = group
                        .cameras
                        .iter()
                        .filter_map(|camera| info.camera_to_view.get(camera).copied())
                        .filter(|&view| info.views[view].is_active())
                        .collect();
                    (group.target.clone(), views)
                })
                .collect()
        };

        let mut presented = Vec::new();
        for (target, views) in targets {
            if views.is_empty() {
                continue;
            }
            log::trace!("Rendering {} views to `{}`", views.len(), target.name);

            let group = &mut self.main_view_group;
            group.set_views(&views);
            if self.options.culling.is_empty() {
                group.set_all_objects_as_visible(self.scene.info());
            } else {
                group.determine_visibility(self.scene.info(), self.options.culling);
            }
            group.generate_instanced(self.scene.info(), self.options.instancing);

            let uploads: Vec<usize> = group.visibility().needs_upload().collect();
            for index in uploads {
                self.scene.prepare_visible_renderable(&mut self.device, index);
            }
            self.scene
                .upload_instance_blocks(&mut self.device, self.main_view_group.visibility());

            let mut anything_drawn = false;
            for (slot, &view) in views.iter().enumerate() {
                let queue = self
                    .main_view_group
                    .generate_render_queue(self.scene.info(), slot, &self.options.queue);
                debug_assert!(queue.entries().iter().all(|entry| match entry.item {
                    RenderQueueItem::Renderable { renderable, .. } => {
                        let info = self.main_view_group.visibility().renderables[renderable];
                        info.visible && !info.instanced
                    }
                    _ => true,
                }));
                anything_drawn |= self.scene.render_view(
                    &mut self.device,
                    &self.registry,
                    view,
                    queue,
                    self.main_view_group.visibility(),
                )?;
            }

            if target.is_window() && anything_drawn {
                presented.push(target.id());
            }
        }

        for target in presented {
            self.device.swap_buffers(target);
        }

        self.scene
            .end_frame(&mut self.device, self.options.resource_retention_frames);
        self.frame_index += 1;
        Ok(())
    }

    /// Merge static renderables sharing a material
    pub fn batch_renderables(&mut self) -> RendererResult<usize> {
        self.ensure_initialized()?;
        self.frame_sync()?;
        self.scene.batch_renderables(&mut self.device)
    }

    /// Free every GPU object owned by the renderer. Further calls to
    /// [`render_all`](Self::render_all) fail with [`RendererError::Destroyed`].
    pub fn destroy(&mut self) {
        if self.state == RenderManState::Initialized {
            self.notifier.drain();
            self.scene.destroy(&mut self.device);
            log::info!("Renderer destroyed");
        }
        self.state = RenderManState::Destroyed;
    }
}
