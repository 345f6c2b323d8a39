//! Per-camera render state

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, UVec4, Vec3, Vec4};

use super::light::GpuLightData;
use super::render_queue::{QueuePriority, RenderQueue};
use super::renderable::RendererRenderable;
use super::scene::RendererSkybox;
use crate::backend::{
    BufferDescriptor, BufferHandle, ClearFlags, GpuDevice, ProgramKey, RenderTargetBinding, TextureHandle,
    ViewportRect,
};
use crate::error::{RendererError, RendererResult};
use crate::geometry::Frustum;
use crate::render_graph::{GpuResourcePool, NodeRegistry, RenderCompositor};
use crate::scene::{Camera, RenderSettings, RenderTarget, SceneObjectId};

/// Lights uploaded per view, at most
pub const MAX_LIGHTS_PER_VIEW: usize = 64;

/// Per-camera uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerCameraUniform {
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub inv_view_projection: Mat4,
    pub prev_view_projection: Mat4,
    /// xyz = position, w = near
    pub position: Vec4,
    /// xyz = forward, w = far
    pub forward: Vec4,
    /// Pixel x, y, width, height
    pub viewport: Vec4,
    /// x = exposure, y = gamma, z = contrast, w = brightness
    pub exposure: Vec4,
    pub scene_light_color: Vec4,
    /// x = samples, y = samples velocity
    pub motion_blur: Vec4,
    /// x = focal distance, y = near range, z = far range
    pub depth_of_field: Vec4,
    /// x = directional, y = radial, z = spot, w = skybox drawn
    pub light_counts: UVec4,
}

/// Camera-derived values cached for one frame
#[derive(Debug, Clone)]
pub struct ViewProperties {
    pub camera: SceneObjectId,
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
    pub prev_view_projection: Mat4,
    pub frustum: Frustum,
    pub position: Vec3,
    pub forward: Vec3,
    pub near: f32,
    pub far: f32,
    pub target: Arc<RenderTarget>,
    pub viewport: ViewportRect,
    pub clear_flags: ClearFlags,
    pub clear_color: Vec4,
    pub clear_depth: f32,
    pub clear_stencil: u8,
    pub layers: u64,
    pub priority: i32,
    pub active: bool,
}

impl ViewProperties {
    /// `None` when the camera has no render target
    pub fn from_camera(camera: &Camera) -> Option<Self> {
        let target = camera.viewport.target.clone()?;
        let viewport = camera.viewport.pixel_rect()?;
        let view = camera.view_matrix();
        let projection = camera.projection_matrix();
        let view_projection = projection * view;

        Some(Self {
            camera: camera.id(),
            view,
            projection,
            view_projection,
            prev_view_projection: view_projection,
            frustum: Frustum::from_view_projection(&view_projection),
            position: camera.position,
            forward: camera.forward(),
            near: camera.projection.near(),
            far: camera.projection.far(),
            target,
            viewport,
            clear_flags: camera.viewport.clear_flags,
            clear_color: camera.viewport.clear_color,
            clear_depth: camera.viewport.clear_depth,
            clear_stencil: camera.viewport.clear_stencil,
            layers: camera.layers,
            priority: camera.priority,
            active: camera.active,
        })
    }

    pub fn target_binding(&self) -> RenderTargetBinding {
        RenderTargetBinding::Surface(self.target.id())
    }
}

/// Scene data a view reads while rendering
#[derive(Debug, Clone, Copy)]
pub struct SceneSnapshot<'a> {
    pub renderables: &'a [RendererRenderable],
    pub skybox: Option<&'a RendererSkybox>,
    pub per_frame_buffer: BufferHandle,
    pub instance_buffers: &'a [BufferHandle],
}

/// Everything a compositor node may read about the view it renders
#[derive(Debug)]
pub struct ViewInputs<'a> {
    pub properties: &'a ViewProperties,
    pub settings: &'a RenderSettings,
    pub render_queue: &'a RenderQueue,
    pub per_view_buffer: BufferHandle,
    pub light_buffer: BufferHandle,
    pub scene: SceneSnapshot<'a>,
    /// Depth of this view's previous frame
    pub previous_depth: Option<TextureHandle>,
}

/// Render state of one camera
#[derive(Debug)]
pub struct RendererView {
    properties: ViewProperties,
    settings: Arc<RenderSettings>,
    per_view_buffer: BufferHandle,
    light_buffer: BufferHandle,
    compositor: RenderCompositor,
    render_queue: RenderQueue,
    previous_depth: Option<TextureHandle>,
    in_frame: bool,
    frame_count: u64,
}

impl RendererView {
    pub(crate) fn new(
        device: &mut dyn GpuDevice,
        properties: ViewProperties,
        settings: Arc<RenderSettings>,
    ) -> RendererResult<Self> {
        let per_view_buffer = device.create_buffer(&BufferDescriptor::uniform::<PerCameraUniform>("PerCameraBuffer"))?;
        let light_buffer =
            match device.create_buffer(&BufferDescriptor::storage::<GpuLightData>("LightBuffer", MAX_LIGHTS_PER_VIEW)) {
                Ok(buffer) => buffer,
                Err(err) => {
                    device.destroy_buffer(per_view_buffer);
                    return Err(err.into());
                }
            };
        log::debug!(
            "Created view for camera {:?} on target `{}`",
            properties.camera,
            properties.target.name
        );

        Ok(Self {
            properties,
            settings,
            per_view_buffer,
            light_buffer,
            compositor: RenderCompositor::new(),
            render_queue: RenderQueue::new(),
            previous_depth: None,
            in_frame: false,
            frame_count: 0,
        })
    }

    pub fn camera_id(&self) -> SceneObjectId {
        self.properties.camera
    }

    pub fn properties(&self) -> &ViewProperties {
        &self.properties
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn compositor(&self) -> &RenderCompositor {
        &self.compositor
    }

    pub fn render_queue(&self) -> &RenderQueue {
        &self.render_queue
    }

    pub fn per_view_buffer(&self) -> BufferHandle {
        self.per_view_buffer
    }

    /// Depth buffer kept from the previous frame for temporal effects
    pub fn last_depth_buffer(&self) -> Option<TextureHandle> {
        self.previous_depth
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn is_active(&self) -> bool {
        self.properties.active
    }

    /// Whether anything is drawn at all
    pub fn should_draw(&self) -> bool {
        self.properties.active && self.properties.viewport.width > 0.0 && self.properties.viewport.height > 0.0
    }

    /// Whether the 3D part of the pipeline runs
    pub fn should_draw_3d(&self) -> bool {
        self.should_draw() && !self.settings.overlay_only
    }

    pub(crate) fn set_properties(&mut self, properties: ViewProperties) {
        let prev_view_projection = self.properties.prev_view_projection;
        let format_changed = properties.target.format != self.properties.target.format;
        self.properties = properties;
        self.properties.prev_view_projection = prev_view_projection;
        if format_changed {
            self.compositor.invalidate();
        }
    }

    pub(crate) fn set_settings(&mut self, settings: Arc<RenderSettings>) {
        if *settings != *self.settings {
            self.compositor.invalidate();
        }
        self.settings = settings;
    }

    pub(crate) fn invalidate_compositor(&mut self) {
        self.compositor.invalidate();
    }

    pub(crate) fn set_render_queue(&mut self, queue: RenderQueue) {
        self.render_queue = queue;
    }

    pub fn begin_frame(&mut self) {
        debug_assert!(!self.in_frame, "begin_frame called twice on view {:?}", self.camera_id());
        self.in_frame = true;
    }

    pub fn end_frame(&mut self) {
        debug_assert!(self.in_frame, "end_frame without begin_frame on view {:?}", self.camera_id());
        self.in_frame = false;
        self.frame_count += 1;
        self.properties.prev_view_projection = self.properties.view_projection;
    }

    /// Write the per-camera and light buffers
    pub(crate) fn upload_params(
        &self,
        device: &mut dyn GpuDevice,
        lights: &[GpuLightData],
        mut light_counts: UVec4,
        skybox_active: bool,
    ) {
        let p = &self.properties;
        let s = &self.settings;
        light_counts.w = (s.enable_skybox && skybox_active) as u32;
        let motion_blur = &s.motion_blur;
        let dof = &s.depth_of_field;
        let uniform = PerCameraUniform {
            view: p.view,
            projection: p.projection,
            view_projection: p.view_projection,
            inv_view_projection: p.view_projection.inverse(),
            prev_view_projection: p.prev_view_projection,
            position: p.position.extend(p.near),
            forward: p.forward.extend(p.far),
            viewport: Vec4::new(p.viewport.x, p.viewport.y, p.viewport.width, p.viewport.height),
            exposure: Vec4::new(s.exposure_scale, s.gamma, s.contrast, s.brightness),
            scene_light_color: s.scene_light_color,
            motion_blur: Vec4::new(
                motion_blur.quality.sample_count() as f32,
                motion_blur.domain.needs_velocity() as u32 as f32,
                0.0,
                0.0,
            ),
            depth_of_field: Vec4::new(dof.focal_distance, dof.near_transition_range, dof.far_transition_range, 0.0),
            light_counts,
        };
        device.write_buffer(self.per_view_buffer, 0, bytemuck::bytes_of(&uniform));
        if !lights.is_empty() {
            let count = lights.len().min(MAX_LIGHTS_PER_VIEW);
            device.write_buffer(self.light_buffer, 0, bytemuck::cast_slice(&lights[..count]));
        }
    }

    /// Run the compositor, or the overlay path for overlay-only views.
    /// Must be called between [`begin_frame`](Self::begin_frame) and
    /// [`end_frame`](Self::end_frame). Returns whether anything was drawn
    /// to the target.
    pub fn render(
        &mut self,
        device: &mut dyn GpuDevice,
        pool: &mut GpuResourcePool,
        registry: &NodeRegistry,
        scene: SceneSnapshot<'_>,
    ) -> RendererResult<bool> {
        if !self.in_frame {
            return Err(RendererError::ViewNotInFrame(self.camera_id()));
        }
        if !self.should_draw() {
            log::trace!("View {:?} has nothing to draw", self.camera_id());
            return Ok(false);
        }
        if !self.should_draw_3d() {
            self.render_overlay(device, scene);
            return Ok(true);
        }

        if !self.compositor.is_resolved() {
            self.compositor
                .resolve(registry, &self.settings, self.properties.target.format, device)?;
        }

        let inputs = ViewInputs {
            properties: &self.properties,
            settings: &self.settings,
            render_queue: &self.render_queue,
            per_view_buffer: self.per_view_buffer,
            light_buffer: self.light_buffer,
            scene,
            previous_depth: self.previous_depth,
        };
        let persisted = self.compositor.execute(device, pool, &inputs)?;

        if let Some(old) = self.previous_depth.take() {
            if Some(old) != persisted {
                pool.release(old);
            }
        }
        self.previous_depth = persisted;
        Ok(true)
    }

    /// Clear per the camera and draw the overlay queue straight to the target
    pub fn render_overlay(&mut self, device: &mut dyn GpuDevice, scene: SceneSnapshot<'_>) {
        let p = &self.properties;
        device.set_render_target(p.target_binding());
        device.set_viewport(p.viewport);
        if !p.clear_flags.is_empty() {
            device.clear_viewport(p.clear_flags, p.clear_color, p.clear_depth, p.clear_stencil);
        }

        let Some(program) = device.program(ProgramKey::Overlay) else {
            log::debug!("Overlay program unavailable, skipping overlay for {:?}", p.camera);
            return;
        };
        device.bind_program(program);

        let inputs = ViewInputs {
            properties: &self.properties,
            settings: &self.settings,
            render_queue: &self.render_queue,
            per_view_buffer: self.per_view_buffer,
            light_buffer: self.light_buffer,
            scene,
            previous_depth: self.previous_depth,
        };
        crate::pipeline::draw_queue(device, &inputs, QueuePriority::Overlay, program);
    }

    pub(crate) fn destroy(&mut self, device: &mut dyn GpuDevice, pool: &mut GpuResourcePool) {
        self.compositor.destroy(device);
        if let Some(depth) = self.previous_depth.take() {
            pool.release(depth);
        }
        device.destroy_buffer(self.per_view_buffer);
        device.destroy_buffer(self.light_buffer);
    }
}
