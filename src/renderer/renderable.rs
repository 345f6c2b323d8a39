//! Render-side mirror of a [`Renderable`]

use std::sync::{Arc, Weak};

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use parking_lot::RwLock;

use crate::backend::{BufferDescriptor, BufferHandle, GpuDevice};
use crate::error::RendererResult;
use crate::geometry::Bounds;
use crate::resources::{Material, Mesh, PerMaterialUniform, SubMesh};
use crate::scene::{Renderable, SceneObjectId, Shared, UpdateFlags};

/// Renderables drawn by one instanced draw call, at most
pub const MAX_INSTANCES_PER_BLOCK: usize = 128;
/// Instance blocks available per view group
pub const MAX_INSTANCED_BLOCKS: usize = 16;

/// Per-object uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerObjectUniform {
    pub world: Mat4,
    pub inv_world: Mat4,
    pub world_no_scale: Mat4,
    pub inv_world_no_scale: Mat4,
    pub prev_world: Mat4,
    /// Index of the highest bit set in the layer mask
    pub layer: u32,
    pub has_animation: u32,
    pub write_velocity: u32,
    pub cast_light: u32,
}

/// One entry of an instance block
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerInstanceData {
    pub world: Mat4,
    pub prev_world: Mat4,
    pub layer: u32,
    pub _padding: [u32; 3],
}

fn layer_msb(layer: u64) -> u32 {
    if layer == 0 {
        0
    } else {
        63 - layer.leading_zeros()
    }
}

/// A sub-mesh paired with its material and the material's GPU buffer
#[derive(Debug)]
pub struct RendererElement {
    pub mesh: Arc<Mesh>,
    pub sub_mesh: SubMesh,
    pub material: Arc<Material>,
    pub(crate) material_buffer: BufferHandle,
}

impl RendererElement {
    pub fn material_buffer(&self) -> BufferHandle {
        self.material_buffer
    }
}

/// Values the view group needs to cull a renderable
#[derive(Debug, Clone, Copy)]
pub struct CullInput {
    pub bounds: Bounds,
    pub layer: u64,
    pub cull_distance_factor: f32,
}

/// Render-thread mirror of a renderable.
///
/// Holds a weak reference to the simulation object and never outlives it in a
/// meaningful way: once the source is dropped the mirror is inactive until it
/// is unregistered. Merged batches have no source at all.
#[derive(Debug)]
pub struct RendererRenderable {
    id: SceneObjectId,
    source: Option<Weak<RwLock<Renderable>>>,
    elements: Vec<RendererElement>,
    per_object_buffer: BufferHandle,
    /// Model-space bounds of the mesh, `None` without a mesh
    local_bounds: Option<Bounds>,

    pub world: Mat4,
    pub inv_world: Mat4,
    pub world_no_scale: Mat4,
    pub inv_world_no_scale: Mat4,
    pub prev_world: Mat4,
    pub world_bounds: Bounds,
    pub layer: u64,
    pub cull_distance_factor: f32,
    pub animated: bool,
    pub mergeable: bool,
    pub instancing: bool,
    pub write_velocity: bool,
    pub cast_light: bool,
    pub active: bool,

    /// Set on members folded into a merged batch; they are no longer drawn
    pub(crate) batched_into: Option<SceneObjectId>,
    /// Non-empty on a merged batch
    pub(crate) batch_members: Vec<SceneObjectId>,
}

impl RendererRenderable {
    /// Create the mirror and its GPU buffers. Nothing is written to them
    /// until the renderable is first visible.
    pub fn new(device: &mut dyn GpuDevice, source: &Shared<Renderable>) -> RendererResult<Self> {
        let renderable = source.read();
        let per_object_buffer = device.create_buffer(&BufferDescriptor::uniform::<PerObjectUniform>("PerObjectBuffer"))?;

        let mut mirror = Self {
            id: renderable.id(),
            source: Some(Arc::downgrade(source)),
            elements: Vec::new(),
            per_object_buffer,
            local_bounds: None,
            world: Mat4::IDENTITY,
            inv_world: Mat4::IDENTITY,
            world_no_scale: Mat4::IDENTITY,
            inv_world_no_scale: Mat4::IDENTITY,
            prev_world: Mat4::IDENTITY,
            world_bounds: Bounds::default(),
            layer: renderable.layer,
            cull_distance_factor: renderable.cull_distance_factor,
            animated: renderable.animated,
            mergeable: renderable.mergeable,
            instancing: renderable.instancing,
            write_velocity: renderable.write_velocity,
            cast_light: renderable.cast_light,
            active: renderable.active,
            batched_into: None,
            batch_members: Vec::new(),
        };

        if let Err(err) = mirror.rebuild_elements(device, &renderable) {
            device.destroy_buffer(per_object_buffer);
            mirror.destroy_elements(device);
            return Err(err);
        }
        mirror.sync_transform(&renderable);
        mirror.prev_world = mirror.world;
        Ok(mirror)
    }

    /// Create a static batch from a mesh already baked into world space
    pub(crate) fn merged(
        device: &mut dyn GpuDevice,
        mesh: Arc<Mesh>,
        material: Arc<Material>,
        layer: u64,
        members: Vec<SceneObjectId>,
    ) -> RendererResult<Self> {
        let per_object_buffer = device.create_buffer(&BufferDescriptor::uniform::<PerObjectUniform>("MergedObjectBuffer"))?;
        let material_buffer =
            match device.create_buffer(&BufferDescriptor::uniform::<PerMaterialUniform>("PerMaterialBuffer")) {
                Ok(buffer) => buffer,
                Err(err) => {
                    device.destroy_buffer(per_object_buffer);
                    return Err(err.into());
                }
            };

        let bounds = *mesh.bounds();
        let elements = mesh
            .sub_meshes()
            .iter()
            .take(1)
            .map(|&sub_mesh| RendererElement {
                mesh: mesh.clone(),
                sub_mesh,
                material: material.clone(),
                material_buffer,
            })
            .collect();

        Ok(Self {
            id: SceneObjectId::next(),
            source: None,
            elements,
            per_object_buffer,
            local_bounds: Some(bounds),
            world: Mat4::IDENTITY,
            inv_world: Mat4::IDENTITY,
            world_no_scale: Mat4::IDENTITY,
            inv_world_no_scale: Mat4::IDENTITY,
            prev_world: Mat4::IDENTITY,
            world_bounds: bounds,
            layer,
            cull_distance_factor: 1.0,
            animated: false,
            mergeable: false,
            instancing: false,
            write_velocity: false,
            cast_light: true,
            active: true,
            batched_into: None,
            batch_members: members,
        })
    }

    pub fn id(&self) -> SceneObjectId {
        self.id
    }

    pub fn elements(&self) -> &[RendererElement] {
        &self.elements
    }

    pub fn per_object_buffer(&self) -> BufferHandle {
        self.per_object_buffer
    }

    pub fn is_merged_batch(&self) -> bool {
        !self.batch_members.is_empty()
    }

    pub fn batch_members(&self) -> &[SceneObjectId] {
        &self.batch_members
    }

    pub fn batched_into(&self) -> Option<SceneObjectId> {
        self.batched_into
    }

    /// Whether this mirror contributes draws of its own
    pub fn is_drawable(&self) -> bool {
        self.active && !self.elements.is_empty() && self.batched_into.is_none()
    }

    pub fn cull_input(&self) -> CullInput {
        CullInput {
            bounds: self.world_bounds,
            layer: self.layer,
            cull_distance_factor: self.cull_distance_factor,
        }
    }

    fn source(&self) -> Option<Shared<Renderable>> {
        self.source.as_ref().and_then(Weak::upgrade)
    }

    /// Refresh cached data after the simulation changed the renderable
    pub fn update(&mut self, device: &mut dyn GpuDevice, flags: UpdateFlags) -> RendererResult<()> {
        let Some(source) = self.source() else {
            self.active = false;
            return Ok(());
        };
        let renderable = source.read();

        if flags.contains(UpdateFlags::MESH) {
            self.rebuild_elements(device, &renderable)?;
        }
        if flags.intersects(UpdateFlags::TRANSFORM | UpdateFlags::MESH) {
            self.sync_transform(&renderable);
        }
        if flags.contains(UpdateFlags::PROPERTIES) {
            self.sync_properties(&renderable);
        }
        Ok(())
    }

    /// Per-frame update, run for every renderable whether visible or not
    pub fn prepare(&mut self) {
        self.prev_world = self.world;
        if self.source.is_none() {
            return;
        }
        match self.source() {
            Some(source) => {
                let renderable = source.read();
                self.sync_transform(&renderable);
                self.animated = renderable.animated;
                self.active = renderable.active;
            }
            None => {
                if self.active {
                    log::warn!("Renderable {:?} dropped without being unregistered", self.id);
                }
                self.active = false;
            }
        }
    }

    pub fn uniform_data(&self) -> PerObjectUniform {
        PerObjectUniform {
            world: self.world,
            inv_world: self.inv_world,
            world_no_scale: self.world_no_scale,
            inv_world_no_scale: self.inv_world_no_scale,
            prev_world: self.prev_world,
            layer: layer_msb(self.layer),
            has_animation: self.animated as u32,
            write_velocity: self.write_velocity as u32,
            cast_light: self.cast_light as u32,
        }
    }

    pub fn instance_data(&self) -> PerInstanceData {
        PerInstanceData {
            world: self.world,
            prev_world: self.prev_world,
            layer: layer_msb(self.layer),
            _padding: [0; 3],
        }
    }

    /// Write the per-object and per-material buffers
    pub fn upload(&self, device: &mut dyn GpuDevice) {
        device.write_buffer(self.per_object_buffer, 0, bytemuck::bytes_of(&self.uniform_data()));
        for element in &self.elements {
            device.write_buffer(
                element.material_buffer,
                0,
                bytemuck::bytes_of(&element.material.uniform_data()),
            );
        }
    }

    pub fn destroy(mut self, device: &mut dyn GpuDevice) {
        device.destroy_buffer(self.per_object_buffer);
        self.destroy_elements(device);
    }

    fn destroy_elements(&mut self, device: &mut dyn GpuDevice) {
        let mut destroyed: Vec<BufferHandle> = Vec::new();
        for element in self.elements.drain(..) {
            if !destroyed.contains(&element.material_buffer) {
                device.destroy_buffer(element.material_buffer);
                destroyed.push(element.material_buffer);
            }
        }
    }

    fn rebuild_elements(&mut self, device: &mut dyn GpuDevice, renderable: &Renderable) -> RendererResult<()> {
        self.destroy_elements(device);

        let Some(mesh) = renderable.mesh.clone() else {
            log::debug!("Renderable {:?} has no mesh and will not be drawn", self.id);
            self.local_bounds = None;
            return Ok(());
        };
        self.local_bounds = Some(*mesh.bounds());

        for (index, &sub_mesh) in mesh.sub_meshes().iter().enumerate() {
            let Some(material) = renderable.material_for(index) else {
                log::debug!("Renderable {:?} has no material for sub-mesh {}", self.id, index);
                continue;
            };
            let material_buffer =
                device.create_buffer(&BufferDescriptor::uniform::<PerMaterialUniform>("PerMaterialBuffer"))?;
            self.elements.push(RendererElement {
                mesh: mesh.clone(),
                sub_mesh,
                material: material.clone(),
                material_buffer,
            });
        }
        Ok(())
    }

    fn sync_transform(&mut self, renderable: &Renderable) {
        self.world = renderable.transform.matrix();
        self.inv_world = self.world.inverse();
        self.world_no_scale = renderable.transform.matrix_no_scale();
        self.inv_world_no_scale = self.world_no_scale.inverse();
        self.world_bounds = match &self.local_bounds {
            Some(bounds) => bounds.transformed(&self.world),
            None => Bounds::point(renderable.transform.position),
        };
    }

    fn sync_properties(&mut self, renderable: &Renderable) {
        self.layer = renderable.layer;
        self.cull_distance_factor = renderable.cull_distance_factor;
        self.animated = renderable.animated;
        self.mergeable = renderable.mergeable;
        self.instancing = renderable.instancing;
        self.write_velocity = renderable.write_velocity;
        self.cast_light = renderable.cast_light;
        self.active = renderable.active;
    }

    /// World-space position used for queue sorting
    pub fn sort_origin(&self) -> Vec3 {
        self.world_bounds.sphere.center
    }
}
