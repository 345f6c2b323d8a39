//! Render-side mirror of a [`Light`]

use std::sync::{Arc, Weak};

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use parking_lot::RwLock;

use crate::geometry::Sphere;
use crate::scene::{Light, LightKind, SceneObjectId, Shared};

/// Light entry in a view's light buffer
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GpuLightData {
    /// xyz = position, w = range
    pub position_range: Vec4,
    /// xyz = direction, w = kind
    pub direction_kind: Vec4,
    /// rgb = color, a = intensity
    pub color_intensity: Vec4,
    /// x = outer angle, y = inner angle, z = casts shadows
    pub spot: Vec4,
}

#[derive(Debug)]
pub struct RendererLight {
    id: SceneObjectId,
    source: Weak<RwLock<Light>>,
    kind: LightKind,
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
    pub spot_angle: f32,
    pub spot_falloff_angle: f32,
    pub cast_shadows: bool,
    pub active: bool,
    bounds: Option<Sphere>,
}

impl RendererLight {
    pub fn new(source: &Shared<Light>) -> Self {
        let light = source.read();
        let mut mirror = Self {
            id: light.id(),
            source: Arc::downgrade(source),
            kind: light.kind,
            position: Vec3::ZERO,
            direction: Vec3::NEG_Z,
            color: Vec3::ONE,
            intensity: 1.0,
            range: 0.0,
            spot_angle: 0.0,
            spot_falloff_angle: 0.0,
            cast_shadows: false,
            active: true,
            bounds: None,
        };
        mirror.sync(&light);
        mirror
    }

    pub fn id(&self) -> SceneObjectId {
        self.id
    }

    pub fn kind(&self) -> LightKind {
        self.kind
    }

    /// World-space bounding sphere; directional lights have none
    pub fn bounds(&self) -> Option<Sphere> {
        self.bounds
    }

    /// Radial and spot lights need a positive finite range
    pub fn is_valid(&self) -> bool {
        match self.kind {
            LightKind::Directional => true,
            LightKind::Radial | LightKind::Spot => self.range.is_finite() && self.range > 0.0,
        }
    }

    /// Re-read the simulation light. Returns `false` once it has been dropped.
    pub fn refresh(&mut self) -> bool {
        match self.source.upgrade() {
            Some(source) => {
                let light = source.read();
                self.sync(&light);
                true
            }
            None => {
                self.active = false;
                false
            }
        }
    }

    fn sync(&mut self, light: &Light) {
        self.kind = light.kind;
        self.position = light.transform.position;
        self.direction = light.direction();
        self.color = light.color;
        self.intensity = light.intensity;
        self.range = light.range;
        self.spot_angle = light.spot_angle;
        self.spot_falloff_angle = light.spot_falloff_angle;
        self.cast_shadows = light.cast_shadows;
        self.active = light.active;
        self.bounds = self.compute_bounds();
    }

    fn compute_bounds(&self) -> Option<Sphere> {
        if !self.is_valid() {
            return None;
        }
        match self.kind {
            LightKind::Directional => None,
            LightKind::Radial => Some(Sphere::new(self.position, self.range)),
            LightKind::Spot => Some(Sphere::from_cone(
                self.position,
                self.direction,
                self.spot_angle,
                self.range,
            )),
        }
    }

    pub fn gpu_data(&self) -> GpuLightData {
        GpuLightData {
            position_range: self.position.extend(self.range),
            direction_kind: self.direction.extend(self.kind as u32 as f32),
            color_intensity: self.color.extend(self.intensity),
            spot: Vec4::new(
                self.spot_angle,
                self.spot_falloff_angle,
                self.cast_shadows as u32 as f32,
                0.0,
            ),
        }
    }
}
