//! Renderable and skybox scene objects

use std::sync::Arc;

use super::{SceneObjectId, Transform};
use crate::backend::TextureHandle;
use crate::resources::{Material, Mesh};

/// A drawable simulation object
#[derive(Debug, Clone)]
pub struct Renderable {
    id: SceneObjectId,
    pub mesh: Option<Arc<Mesh>>,
    /// One material per sub-mesh; the last one is reused for extra sub-meshes
    pub materials: Vec<Arc<Material>>,
    pub transform: Transform,
    /// Bit mask tested against camera layers
    pub layer: u64,
    pub animated: bool,
    /// Scales the camera cull distance for this object
    pub cull_distance_factor: f32,
    /// May be merged with other static renderables sharing its material
    pub mergeable: bool,
    /// May be drawn through instancing when the renderer is in manual mode
    pub instancing: bool,
    pub write_velocity: bool,
    pub cast_light: bool,
    pub active: bool,
}

impl Renderable {
    pub fn new(mesh: Arc<Mesh>, material: Arc<Material>) -> Self {
        Self {
            id: SceneObjectId::next(),
            mesh: Some(mesh),
            materials: vec![material],
            transform: Transform::default(),
            layer: 1,
            animated: false,
            cull_distance_factor: 1.0,
            mergeable: false,
            instancing: false,
            write_velocity: true,
            cast_light: true,
            active: true,
        }
    }

    pub fn id(&self) -> SceneObjectId {
        self.id
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_layer(mut self, layer: u64) -> Self {
        self.layer = layer;
        self
    }

    /// Material used by sub-mesh `index`
    pub fn material_for(&self, index: usize) -> Option<&Arc<Material>> {
        self.materials.get(index).or_else(|| self.materials.last())
    }
}

/// Environment cube drawn behind the scene
#[derive(Debug, Clone)]
pub struct Skybox {
    id: SceneObjectId,
    pub texture: Option<TextureHandle>,
    pub brightness: f32,
    pub active: bool,
}

impl Skybox {
    pub fn new(texture: Option<TextureHandle>) -> Self {
        Self {
            id: SceneObjectId::next(),
            texture,
            brightness: 1.0,
            active: true,
        }
    }

    pub fn id(&self) -> SceneObjectId {
        self.id
    }
}
