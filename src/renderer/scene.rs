//! Render-thread mirror of the simulation scene
//!
//! [`RendererScene`] is the only place renderables, lights, cameras and the
//! skybox are added to or removed from the renderer. Vectors in [`SceneInfo`]
//! are addressed positionally during a frame; removal swaps the last element
//! into the freed slot and patches the single id-to-index map that refers to
//! it, so no other index needs rewriting.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use bytemuck::{Pod, Zeroable};
use glam::UVec4;
use parking_lot::RwLock;

use super::light::{GpuLightData, RendererLight};
use super::render_queue::RenderQueue;
use super::renderable::{RendererRenderable, PerInstanceData, MAX_INSTANCED_BLOCKS, MAX_INSTANCES_PER_BLOCK};
use super::view::{RendererView, SceneSnapshot, ViewProperties, MAX_LIGHTS_PER_VIEW};
use super::view_group::VisibilityInfo;
use super::FrameData;
use crate::backend::{BufferDescriptor, BufferHandle, GpuDevice, TextureHandle};
use crate::error::{RendererError, RendererResult};
use crate::render_graph::{GpuResourcePool, NodeRegistry};
use crate::resources::{MaterialId, Mesh, SubMesh};
use crate::scene::{
    Camera, Light, LightKind, RenderSettings, RenderTarget, Renderable, SceneObjectId, Shared, Skybox, UpdateFlags,
};

/// Frame-global uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerFrameUniform {
    pub time: f32,
    pub delta: f32,
    pub frame: u32,
    pub use_skybox: u32,
    pub skybox_brightness: f32,
    pub _padding: [u32; 3],
}

/// Render-side mirror of the [`Skybox`]
#[derive(Debug)]
pub struct RendererSkybox {
    id: SceneObjectId,
    source: Weak<RwLock<Skybox>>,
    pub texture: Option<TextureHandle>,
    pub brightness: f32,
    pub active: bool,
}

impl RendererSkybox {
    fn new(source: &Shared<Skybox>) -> Self {
        let skybox = source.read();
        Self {
            id: skybox.id(),
            source: Arc::downgrade(source),
            texture: skybox.texture,
            brightness: skybox.brightness,
            active: skybox.active,
        }
    }

    pub fn id(&self) -> SceneObjectId {
        self.id
    }

    fn refresh(&mut self) {
        match self.source.upgrade() {
            Some(source) => {
                let skybox = source.read();
                self.texture = skybox.texture;
                self.brightness = skybox.brightness;
                self.active = skybox.active && skybox.texture.is_some();
            }
            None => self.active = false,
        }
    }
}

/// A render target and the cameras drawing into it, in priority order
#[derive(Debug, Clone)]
pub struct RendererRenderTarget {
    pub target: Arc<RenderTarget>,
    pub cameras: Vec<SceneObjectId>,
}

/// Snapshot of every object the renderer knows about
#[derive(Debug, Default)]
pub struct SceneInfo {
    pub views: Vec<RendererView>,
    pub camera_to_view: HashMap<SceneObjectId, usize>,
    /// Offscreen targets first, then windows, each by lowest camera priority
    pub render_targets: Vec<RendererRenderTarget>,
    pub renderables: Vec<RendererRenderable>,
    pub renderable_to_index: HashMap<SceneObjectId, usize>,
    pub directional_lights: Vec<RendererLight>,
    pub radial_lights: Vec<RendererLight>,
    pub spot_lights: Vec<RendererLight>,
    pub skybox: Option<RendererSkybox>,
}

impl SceneInfo {
    pub fn view_for_camera(&self, camera: SceneObjectId) -> Option<&RendererView> {
        self.camera_to_view.get(&camera).map(|&index| &self.views[index])
    }

    pub fn renderable_index(&self, renderable: SceneObjectId) -> Option<usize> {
        self.renderable_to_index.get(&renderable).copied()
    }

    pub fn light_count(&self) -> usize {
        self.directional_lights.len() + self.radial_lights.len() + self.spot_lights.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadyState {
    Stale,
    /// Per-frame transform update done
    Prepared,
    /// GPU buffers written this frame
    Uploaded,
}

/// Owner of all render-side scene state
#[derive(Debug, Default)]
pub struct RendererScene {
    info: SceneInfo,
    /// Every registered camera, with or without a target
    cameras: HashMap<SceneObjectId, Weak<RwLock<Camera>>>,
    light_index: HashMap<SceneObjectId, (LightKind, usize)>,
    ready: Vec<ReadyState>,
    per_frame_buffer: Option<BufferHandle>,
    frame_params: PerFrameUniform,
    instance_buffers: Vec<BufferHandle>,
    pool: GpuResourcePool,
}

impl Default for PerFrameUniform {
    fn default() -> Self {
        Self {
            time: 0.0,
            delta: 0.0,
            frame: 0,
            use_skybox: 0,
            skybox_brightness: 1.0,
            _padding: [0; 3],
        }
    }
}

impl RendererScene {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the frame-global buffers
    pub fn initialize(&mut self, device: &mut dyn GpuDevice) -> RendererResult<()> {
        let per_frame = device.create_buffer(&BufferDescriptor::uniform::<PerFrameUniform>("PerFrameBuffer"))?;
        self.per_frame_buffer = Some(per_frame);

        for _ in 0..MAX_INSTANCED_BLOCKS {
            let desc = BufferDescriptor::storage::<PerInstanceData>("InstanceBuffer", MAX_INSTANCES_PER_BLOCK);
            match device.create_buffer(&desc) {
                Ok(buffer) => self.instance_buffers.push(buffer),
                Err(err) => {
                    log::error!("Failed to allocate instance buffers: {}", err);
                    self.release_frame_buffers(device);
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    pub fn info(&self) -> &SceneInfo {
        &self.info
    }

    pub fn per_frame_buffer(&self) -> Option<BufferHandle> {
        self.per_frame_buffer
    }

    pub fn frame_params(&self) -> &PerFrameUniform {
        &self.frame_params
    }

    pub fn pool(&self) -> &GpuResourcePool {
        &self.pool
    }

    // Cameras

    pub fn register_camera(&mut self, device: &mut dyn GpuDevice, camera: &Shared<Camera>) -> RendererResult<()> {
        let id = camera.read().id();
        if self.cameras.contains_key(&id) {
            log::warn!("Camera {:?} registered twice", id);
            return Ok(());
        }
        self.cameras.insert(id, Arc::downgrade(camera));
        self.sync_camera(device, id)
    }

    /// Re-read a camera's projection, target and settings
    pub fn update_camera(
        &mut self,
        device: &mut dyn GpuDevice,
        id: SceneObjectId,
        flags: UpdateFlags,
    ) -> RendererResult<()> {
        log::trace!("Updating camera {:?} ({:?})", id, flags);
        self.sync_camera(device, id)
    }

    pub fn unregister_camera(&mut self, device: &mut dyn GpuDevice, id: SceneObjectId) {
        if self.cameras.remove(&id).is_none() {
            log::warn!("Unregistering unknown camera {:?}", id);
        }
        self.remove_view(device, id);
    }

    fn sync_camera(&mut self, device: &mut dyn GpuDevice, id: SceneObjectId) -> RendererResult<()> {
        let Some(source) = self.cameras.get(&id).and_then(Weak::upgrade) else {
            log::warn!("Camera {:?} dropped without being unregistered", id);
            self.cameras.remove(&id);
            self.remove_view(device, id);
            return Ok(());
        };
        let (properties, settings) = {
            let camera = source.read();
            (ViewProperties::from_camera(&camera), camera.settings.clone())
        };

        let current_target = self
            .info
            .render_targets
            .iter()
            .find(|group| group.cameras.contains(&id))
            .map(|group| group.target.id());

        match (current_target, properties) {
            (None, None) => {
                log::trace!("Camera {:?} has no render target, no view", id);
            }
            (Some(_), None) => self.remove_view(device, id),
            (None, Some(properties)) => self.add_view(device, properties, settings)?,
            (Some(target), Some(properties)) if target != properties.target.id() => {
                log::debug!("Camera {:?} moved to target `{}`", id, properties.target.name);
                self.remove_view(device, id);
                self.add_view(device, properties, settings)?;
            }
            (Some(_), Some(properties)) => {
                if let Some(&index) = self.info.camera_to_view.get(&id) {
                    let view = &mut self.info.views[index];
                    view.set_properties(properties);
                    view.set_settings(settings);
                }
                self.sort_render_targets();
            }
        }
        Ok(())
    }

    fn add_view(
        &mut self,
        device: &mut dyn GpuDevice,
        properties: ViewProperties,
        settings: Arc<RenderSettings>,
    ) -> RendererResult<()> {
        let camera = properties.camera;
        let target = properties.target.clone();
        let view = RendererView::new(device, properties, settings)?;

        self.info.camera_to_view.insert(camera, self.info.views.len());
        self.info.views.push(view);

        match self
            .info
            .render_targets
            .iter_mut()
            .find(|group| group.target.id() == target.id())
        {
            Some(group) => group.cameras.push(camera),
            None => self.info.render_targets.push(RendererRenderTarget {
                target,
                cameras: vec![camera],
            }),
        }
        self.sort_render_targets();
        Ok(())
    }

    fn remove_view(&mut self, device: &mut dyn GpuDevice, camera: SceneObjectId) {
        let Some(index) = self.info.camera_to_view.remove(&camera) else {
            return;
        };
        let mut view = self.info.views.swap_remove(index);
        view.destroy(device, &mut self.pool);
        if let Some(moved) = self.info.views.get(index) {
            self.info.camera_to_view.insert(moved.camera_id(), index);
        }

        for group in &mut self.info.render_targets {
            group.cameras.retain(|&c| c != camera);
        }
        self.info.render_targets.retain(|group| !group.cameras.is_empty());
    }

    fn sort_render_targets(&mut self) {
        let SceneInfo {
            views,
            camera_to_view,
            render_targets,
            ..
        } = &mut self.info;
        let priority = |camera: &SceneObjectId| {
            camera_to_view
                .get(camera)
                .map_or(i32::MAX, |&index| views[index].properties().priority)
        };

        for group in render_targets.iter_mut() {
            group.cameras.sort_by_key(|camera| priority(camera));
        }
        render_targets.sort_by_key(|group| {
            let lowest = group.cameras.first().map_or(i32::MAX, |camera| priority(camera));
            (group.target.is_window(), lowest)
        });
    }

    // Renderables

    /// Create the render-side mirror. Buffer allocation failure is returned
    /// and leaves the scene unchanged.
    pub fn register_renderable(
        &mut self,
        device: &mut dyn GpuDevice,
        renderable: &Shared<Renderable>,
    ) -> RendererResult<()> {
        let id = renderable.read().id();
        if self.info.renderable_to_index.contains_key(&id) {
            log::warn!("Renderable {:?} registered twice", id);
            return Ok(());
        }
        let mirror = RendererRenderable::new(device, renderable)?;
        self.push_renderable(mirror);
        log::trace!("Registered renderable {:?}", id);
        Ok(())
    }

    pub fn update_renderable(
        &mut self,
        device: &mut dyn GpuDevice,
        id: SceneObjectId,
        flags: UpdateFlags,
    ) -> RendererResult<()> {
        let Some(index) = self.info.renderable_index(id) else {
            log::warn!("Updating unknown renderable {:?}", id);
            return Ok(());
        };
        if let Some(batch) = self.info.renderables[index].batched_into {
            if flags.intersects(UpdateFlags::TRANSFORM | UpdateFlags::MESH | UpdateFlags::PROPERTIES) {
                log::debug!("Renderable {:?} changed, dissolving its batch", id);
                self.dissolve_batch(device, batch);
            }
        }
        match self.info.renderable_index(id) {
            Some(index) => self.info.renderables[index].update(device, flags),
            None => Ok(()),
        }
    }

    /// Swap a renderable's mesh without re-registering it
    pub fn update_mesh_data(&mut self, device: &mut dyn GpuDevice, id: SceneObjectId) -> RendererResult<()> {
        self.update_renderable(device, id, UpdateFlags::MESH)
    }

    pub fn unregister_renderable(&mut self, device: &mut dyn GpuDevice, id: SceneObjectId) {
        let Some(index) = self.info.renderable_index(id) else {
            log::warn!("Unregistering unknown renderable {:?}", id);
            return;
        };
        if let Some(batch) = self.info.renderables[index].batched_into {
            self.dissolve_batch(device, batch);
        }
        if let Some(index) = self.info.renderable_index(id) {
            self.remove_renderable_at(device, index);
            log::trace!("Unregistered renderable {:?}", id);
        }
    }

    fn push_renderable(&mut self, mirror: RendererRenderable) {
        self.info
            .renderable_to_index
            .insert(mirror.id(), self.info.renderables.len());
        self.info.renderables.push(mirror);
        self.ready.push(ReadyState::Stale);
    }

    fn remove_renderable_at(&mut self, device: &mut dyn GpuDevice, index: usize) {
        let mirror = self.info.renderables.swap_remove(index);
        if index < self.ready.len() {
            self.ready.swap_remove(index);
        }
        self.info.renderable_to_index.remove(&mirror.id());
        if let Some(moved) = self.info.renderables.get(index) {
            self.info.renderable_to_index.insert(moved.id(), index);
        }
        mirror.destroy(device);
    }

    fn dissolve_batch(&mut self, device: &mut dyn GpuDevice, batch: SceneObjectId) {
        let Some(index) = self.info.renderable_index(batch) else {
            return;
        };
        let members = self.info.renderables[index].batch_members.clone();
        for member in members {
            if let Some(member_index) = self.info.renderable_index(member) {
                self.info.renderables[member_index].batched_into = None;
            }
        }
        self.remove_renderable_at(device, index);
    }

    /// Merge mergeable renderables that share a material and layer into
    /// static batches. Existing batches are dissolved first, so this can be
    /// called again whenever the mergeable set changes. Returns the number of
    /// batches created.
    pub fn batch_renderables(&mut self, device: &mut dyn GpuDevice) -> RendererResult<usize> {
        let existing: Vec<SceneObjectId> = self
            .info
            .renderables
            .iter()
            .filter(|r| r.is_merged_batch())
            .map(|r| r.id())
            .collect();
        for batch in existing {
            self.dissolve_batch(device, batch);
        }

        let mut groups: Vec<(u64, Vec<usize>)> = Vec::new();
        let mut group_index: HashMap<(MaterialId, u64), usize> = HashMap::new();
        for (index, renderable) in self.info.renderables.iter().enumerate() {
            if !renderable.mergeable || !renderable.is_drawable() {
                continue;
            }
            let [element] = renderable.elements() else {
                continue;
            };
            let key = (element.material.id(), renderable.layer);
            let group = *group_index.entry(key).or_insert_with(|| {
                groups.push((renderable.layer, Vec::new()));
                groups.len() - 1
            });
            groups[group].1.push(index);
        }

        let mut batches: Vec<(Vec<usize>, RendererRenderable)> = Vec::new();
        for (layer, members) in groups.into_iter().filter(|(_, members)| members.len() >= 2) {
            let renderables = &self.info.renderables;
            let parts: Vec<(&Mesh, SubMesh, glam::Mat4)> = members
                .iter()
                .map(|&i| {
                    let element = &renderables[i].elements()[0];
                    (&*element.mesh, element.sub_mesh, renderables[i].world)
                })
                .collect();
            let material = renderables[members[0]].elements()[0].material.clone();
            let name = format!("Batch({})", material.name);
            let Some(mesh) = Mesh::merged(&name, &parts) else {
                continue;
            };
            let member_ids = members.iter().map(|&i| renderables[i].id()).collect();

            match RendererRenderable::merged(device, Arc::new(mesh), material, layer, member_ids) {
                Ok(batch) => batches.push((members, batch)),
                Err(err) => {
                    for (_, batch) in batches {
                        batch.destroy(device);
                    }
                    return Err(err);
                }
            }
        }

        let count = batches.len();
        for (members, batch) in batches {
            for &member in &members {
                self.info.renderables[member].batched_into = Some(batch.id());
            }
            log::debug!("Merged {} renderables into batch {:?}", members.len(), batch.id());
            self.push_renderable(batch);
        }
        Ok(count)
    }

    // Lights

    pub fn register_light(&mut self, light: &Shared<Light>) {
        let mirror = RendererLight::new(light);
        if self.light_index.contains_key(&mirror.id()) {
            log::warn!("Light {:?} registered twice", mirror.id());
            return;
        }
        self.push_light(mirror);
    }

    pub fn update_light(&mut self, id: SceneObjectId, flags: UpdateFlags) {
        let Some(&(kind, index)) = self.light_index.get(&id) else {
            log::warn!("Updating unknown light {:?}", id);
            return;
        };
        log::trace!("Updating light {:?} ({:?})", id, flags);
        let light = &mut self.lights_mut(kind)[index];
        light.refresh();
        if light.kind() != kind {
            self.relocate_light(id);
        }
    }

    pub fn unregister_light(&mut self, id: SceneObjectId) {
        if self.take_light(id).is_none() {
            log::warn!("Unregistering unknown light {:?}", id);
        }
    }

    /// Refresh every light and its bounding sphere before visibility runs
    pub fn prepare_lights(&mut self) {
        let mut relocated = Vec::new();
        for kind in [LightKind::Directional, LightKind::Radial, LightKind::Spot] {
            for light in self.lights_mut(kind).iter_mut() {
                light.refresh();
                if light.kind() != kind {
                    relocated.push(light.id());
                }
                if light.active && !light.is_valid() {
                    log::debug!("Light {:?} has an invalid range and is skipped", light.id());
                }
            }
        }
        for id in relocated {
            self.relocate_light(id);
        }
    }

    fn lights_mut(&mut self, kind: LightKind) -> &mut Vec<RendererLight> {
        match kind {
            LightKind::Directional => &mut self.info.directional_lights,
            LightKind::Radial => &mut self.info.radial_lights,
            LightKind::Spot => &mut self.info.spot_lights,
        }
    }

    fn push_light(&mut self, light: RendererLight) {
        let kind = light.kind();
        let id = light.id();
        let lights = self.lights_mut(kind);
        lights.push(light);
        let index = lights.len() - 1;
        self.light_index.insert(id, (kind, index));
    }

    fn take_light(&mut self, id: SceneObjectId) -> Option<RendererLight> {
        let (kind, index) = self.light_index.remove(&id)?;
        let lights = self.lights_mut(kind);
        let light = lights.swap_remove(index);
        let moved = lights.get(index).map(|l| l.id());
        if let Some(moved) = moved {
            self.light_index.insert(moved, (kind, index));
        }
        Some(light)
    }

    fn relocate_light(&mut self, id: SceneObjectId) {
        if let Some(light) = self.take_light(id) {
            self.push_light(light);
        }
    }

    // Skybox

    pub fn register_skybox(&mut self, skybox: &Shared<Skybox>) {
        let mirror = RendererSkybox::new(skybox);
        if let Some(previous) = &self.info.skybox {
            log::warn!("Skybox {:?} replaces {:?}", mirror.id(), previous.id());
        }
        self.info.skybox = Some(mirror);
    }

    pub fn unregister_skybox(&mut self, id: SceneObjectId) {
        match &self.info.skybox {
            Some(skybox) if skybox.id() == id => self.info.skybox = None,
            _ => log::warn!("Unregistering unknown skybox {:?}", id),
        }
    }

    // Frame parameters

    pub fn set_param_frame_params(&mut self, frame: &FrameData, frame_index: u64) {
        self.frame_params.time = frame.time;
        self.frame_params.delta = frame.delta;
        self.frame_params.frame = frame_index as u32;
    }

    /// Write one view's camera matrices, scene light color and the lights
    /// visible to its view group into that view's own buffers
    pub fn set_param_camera_params(&self, device: &mut dyn GpuDevice, view_index: usize, visibility: &VisibilityInfo) {
        let Some(view) = self.info.views.get(view_index) else {
            return;
        };
        let mut lights: Vec<GpuLightData> = Vec::new();
        let mut counts = UVec4::ZERO;
        for light in self.info.directional_lights.iter().filter(|l| l.active) {
            lights.push(light.gpu_data());
            counts.x += 1;
        }
        for (index, light) in self.info.radial_lights.iter().enumerate() {
            if visibility.radial_lights.get(index).copied().unwrap_or(false) {
                lights.push(light.gpu_data());
                counts.y += 1;
            }
        }
        for (index, light) in self.info.spot_lights.iter().enumerate() {
            if visibility.spot_lights.get(index).copied().unwrap_or(false) {
                lights.push(light.gpu_data());
                counts.z += 1;
            }
        }
        if lights.len() > MAX_LIGHTS_PER_VIEW {
            log::debug!("{} lights visible, only {} uploaded", lights.len(), MAX_LIGHTS_PER_VIEW);
        }
        let skybox_active = self.info.skybox.as_ref().map_or(false, |skybox| skybox.active);
        view.upload_params(device, &lights, counts, skybox_active);
    }

    pub fn set_param_skybox_params(&mut self) {
        let skybox = self.info.skybox.as_ref().filter(|skybox| skybox.active);
        self.frame_params.use_skybox = skybox.is_some() as u32;
        self.frame_params.skybox_brightness = skybox.map_or(1.0, |skybox| skybox.brightness);
    }

    // Per-frame preparation

    /// Poll cameras and the skybox and reset the per-renderable ready flags
    pub fn begin_frame(
        &mut self,
        device: &mut dyn GpuDevice,
        frame: &FrameData,
        frame_index: u64,
    ) -> RendererResult<()> {
        let mut cameras: Vec<SceneObjectId> = self.cameras.keys().copied().collect();
        cameras.sort();
        for camera in cameras {
            self.sync_camera(device, camera)?;
        }

        if let Some(skybox) = &mut self.info.skybox {
            skybox.refresh();
        }

        self.ready.clear();
        self.ready.resize(self.info.renderables.len(), ReadyState::Stale);

        let buffer = self.per_frame_buffer.ok_or(RendererError::NotInitialized)?;
        self.set_param_frame_params(frame, frame_index);
        self.set_param_skybox_params();
        device.write_buffer(buffer, 0, bytemuck::bytes_of(&self.frame_params));
        Ok(())
    }

    /// Per-frame transform update of one renderable. Runs at most once per
    /// frame; further calls are no-ops.
    pub fn prepare_renderable(&mut self, index: usize) {
        match self.ready.get(index) {
            Some(ReadyState::Stale) => {
                self.info.renderables[index].prepare();
                self.ready[index] = ReadyState::Prepared;
            }
            Some(_) => {}
            None => log::debug!("prepare_renderable: no renderable at {}", index),
        }
    }

    /// Upload the GPU data of a visible renderable. Runs at most once per
    /// frame however many views see it.
    pub fn prepare_visible_renderable(&mut self, device: &mut dyn GpuDevice, index: usize) {
        self.prepare_renderable(index);
        if self.ready.get(index) == Some(&ReadyState::Prepared) {
            self.info.renderables[index].upload(device);
            self.ready[index] = ReadyState::Uploaded;
        }
    }

    /// Fill the instance buffers from the view group's instance blocks
    pub fn upload_instance_blocks(&self, device: &mut dyn GpuDevice, visibility: &VisibilityInfo) {
        for (block, buffer) in visibility.instanced_blocks.iter().zip(&self.instance_buffers) {
            let data: Vec<PerInstanceData> = block
                .members
                .iter()
                .map(|&member| self.info.renderables[member].instance_data())
                .collect();
            device.write_buffer(*buffer, 0, bytemuck::cast_slice(&data));
        }
    }

    /// Render one view with the given queue, bracketed by its
    /// `begin_frame`/`end_frame`. Returns whether anything was drawn.
    pub(crate) fn render_view(
        &mut self,
        device: &mut dyn GpuDevice,
        registry: &NodeRegistry,
        view_index: usize,
        queue: RenderQueue,
        visibility: &VisibilityInfo,
    ) -> RendererResult<bool> {
        let per_frame_buffer = self.per_frame_buffer.ok_or(RendererError::NotInitialized)?;
        let Some(view) = self.info.views.get_mut(view_index) else {
            return Ok(false);
        };
        view.set_render_queue(queue);
        view.begin_frame();
        self.set_param_camera_params(device, view_index, visibility);

        let SceneInfo {
            views,
            renderables,
            skybox,
            ..
        } = &mut self.info;
        let view = &mut views[view_index];
        let scene = SceneSnapshot {
            renderables: renderables.as_slice(),
            skybox: skybox.as_ref(),
            per_frame_buffer,
            instance_buffers: &self.instance_buffers,
        };
        let result = view.render(device, &mut self.pool, registry, scene);
        view.end_frame();
        result
    }

    /// Mark every view's compositor for re-resolution
    pub fn invalidate_compositors(&mut self) {
        for view in &mut self.info.views {
            view.invalidate_compositor();
        }
    }

    /// Evict idle pooled textures
    pub fn end_frame(&mut self, device: &mut dyn GpuDevice, retention_frames: u64) {
        self.pool.update(device, retention_frames);
    }

    fn release_frame_buffers(&mut self, device: &mut dyn GpuDevice) {
        if let Some(buffer) = self.per_frame_buffer.take() {
            device.destroy_buffer(buffer);
        }
        for buffer in self.instance_buffers.drain(..) {
            device.destroy_buffer(buffer);
        }
    }

    /// Free every GPU object the scene owns
    pub fn destroy(&mut self, device: &mut dyn GpuDevice) {
        for mut view in self.info.views.drain(..) {
            view.destroy(device, &mut self.pool);
        }
        for renderable in self.info.renderables.drain(..) {
            renderable.destroy(device);
        }
        self.release_frame_buffers(device);
        self.pool.clear(device);

        self.info = SceneInfo::default();
        self.cameras.clear();
        self.light_index.clear();
        self.ready.clear();
        log::info!("Renderer scene destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDevice;
    use crate::resources::Material;
    use crate::scene::{shared, Transform};
    use glam::Vec3;

    fn renderable_at(position: Vec3) -> Shared<Renderable> {
        shared(
            Renderable::new(Arc::new(Mesh::cube()), Arc::new(Material::new("grey")))
                .with_transform(Transform::from_position(position)),
        )
    }

    #[test]
    fn test_unregister_remaps_moved_renderable() {
        let mut device = HeadlessDevice::new();
        let mut scene = RendererScene::new();
        let a = renderable_at(Vec3::ZERO);
        let b = renderable_at(Vec3::X);
        let c = renderable_at(Vec3::Y);
        for r in [&a, &b, &c] {
            scene.register_renderable(&mut device, r).unwrap();
        }

        let removed = a.read().id();
        scene.unregister_renderable(&mut device, removed);

        let info = scene.info();
        assert_eq!(info.renderables.len(), 2);
        for (index, renderable) in info.renderables.iter().enumerate() {
            assert_eq!(info.renderable_index(renderable.id()), Some(index));
        }
        assert_eq!(info.renderable_index(removed), None);
    }

    #[test]
    fn test_light_kind_change_moves_collection() {
        let mut scene = RendererScene::new();
        let light = shared(Light::radial(Vec3::ZERO, 5.0));
        scene.register_light(&light);
        assert_eq!(scene.info().radial_lights.len(), 1);

        let id = light.read().id();
        light.write().kind = LightKind::Spot;
        scene.update_light(id, UpdateFlags::PROPERTIES);

        assert!(scene.info().radial_lights.is_empty());
        assert_eq!(scene.info().spot_lights.len(), 1);
        scene.unregister_light(id);
        assert_eq!(scene.info().light_count(), 0);
    }

    #[test]
    fn test_batch_renderables_merges_shared_material() {
        let mut device = HeadlessDevice::new();
        let mut scene = RendererScene::new();
        let material = Arc::new(Material::new("stone"));
        let mesh = Arc::new(Mesh::cube());

        let mut sources = Vec::new();
        for x in 0..3 {
            let mut renderable = Renderable::new(mesh.clone(), material.clone())
                .with_transform(Transform::from_position(Vec3::new(x as f32 * 2.0, 0.0, 0.0)));
            renderable.mergeable = true;
            let renderable = shared(renderable);
            scene.register_renderable(&mut device, &renderable).unwrap();
            sources.push(renderable);
        }

        assert_eq!(scene.batch_renderables(&mut device).unwrap(), 1);
        let info = scene.info();
        assert_eq!(info.renderables.len(), 4);
        let batch = info.renderables.iter().find(|r| r.is_merged_batch()).unwrap();
        assert_eq!(batch.batch_members().len(), 3);
        assert_eq!(batch.elements()[0].mesh.index_count(), 36 * 3);
        assert!((batch.world_bounds.aabb.max.x - 4.5).abs() < 1e-5);
        assert_eq!(info.renderables.iter().filter(|r| r.is_drawable()).count(), 1);

        // Re-batching replaces the batch instead of stacking a second one
        assert_eq!(scene.batch_renderables(&mut device).unwrap(), 1);
        assert_eq!(scene.info().renderables.len(), 4);

        // Unregistering a member dissolves its batch
        let member = sources[0].read().id();
        scene.unregister_renderable(&mut device, member);
        let info = scene.info();
        assert_eq!(info.renderables.len(), 2);
        assert!(info.renderables.iter().all(|r| r.is_drawable()));
    }

    #[test]
    fn test_mesh_swap_dissolves_batch() {
        let mut device = HeadlessDevice::new();
        let mut scene = RendererScene::new();
        let material = Arc::new(Material::new("stone"));
        let mesh = Arc::new(Mesh::cube());

        let mut sources = Vec::new();
        for x in 0..2 {
            let mut renderable = Renderable::new(mesh.clone(), material.clone())
                .with_transform(Transform::from_position(Vec3::new(x as f32, 0.0, 0.0)));
            renderable.mergeable = true;
            let renderable = shared(renderable);
            scene.register_renderable(&mut device, &renderable).unwrap();
            sources.push(renderable);
        }
        assert_eq!(scene.batch_renderables(&mut device).unwrap(), 1);

        let id = sources[1].read().id();
        sources[1].write().mesh = None;
        scene.update_mesh_data(&mut device, id).unwrap();

        let info = scene.info();
        assert_eq!(info.renderables.len(), 2);
        assert!(info.renderables.iter().all(|r| !r.is_merged_batch()));
        let index = info.renderable_index(id).unwrap();
        assert!(info.renderables[index].elements().is_empty());
    }
}
