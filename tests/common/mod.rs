//! Shared fixtures for the renderer integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use bytemuck::Zeroable;
use glam::Vec3;

use renderman::backend::{HeadlessDevice, Vertex};
use renderman::resources::{Material, Mesh};
use renderman::{
    shared, Camera, RenderMan, RenderManOptions, RenderTarget, Renderable, Shared, Transform,
};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn initialized(device: HeadlessDevice, options: RenderManOptions) -> RenderMan<HeadlessDevice> {
    init_logging();
    let mut render_man = RenderMan::new(device, options);
    render_man.initialize().expect("initialize");
    render_man
}

pub fn window(name: &str) -> Arc<RenderTarget> {
    Arc::new(RenderTarget::window(name, 320, 180))
}

/// Camera at (0, 0, 5) looking at the origin
pub fn camera_on(target: &Arc<RenderTarget>) -> Shared<Camera> {
    shared(Camera::new(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO).with_target(target.clone()))
}

pub fn cube_at(position: Vec3) -> Shared<Renderable> {
    shared(
        Renderable::new(Arc::new(Mesh::cube()), Arc::new(Material::new("cube")))
            .with_transform(Transform::from_position(position)),
    )
}

pub fn cube_with(mesh: &Arc<Mesh>, material: &Arc<Material>, position: Vec3) -> Shared<Renderable> {
    shared(Renderable::new(mesh.clone(), material.clone()).with_transform(Transform::from_position(position)))
}

/// Mesh whose vertices all sit at the origin, giving zero-size bounds
pub fn degenerate_mesh() -> Arc<Mesh> {
    Arc::new(Mesh::new("degenerate", vec![Vertex::zeroed(); 3], vec![0, 1, 2], Vec::new()))
}
