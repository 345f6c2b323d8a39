//! Light scene object

use glam::Vec3;

use super::{SceneObjectId, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    /// Infinitely far away, like the sun
    Directional,
    /// Omnidirectional with a finite range
    Radial,
    Spot,
}

/// Light source in the scene
///
/// Position and direction come from the transform; direction is the
/// transform's forward axis.
#[derive(Debug, Clone)]
pub struct Light {
    id: SceneObjectId,
    pub kind: LightKind,
    pub transform: Transform,
    pub color: Vec3,
    pub intensity: f32,
    /// Attenuation range, ignored for directional lights
    pub range: f32,
    /// Spot outer half-angle in radians
    pub spot_angle: f32,
    /// Spot inner half-angle in radians, where falloff starts
    pub spot_falloff_angle: f32,
    pub cast_shadows: bool,
    pub active: bool,
}

impl Light {
    fn with_kind(kind: LightKind) -> Self {
        Self {
            id: SceneObjectId::next(),
            kind,
            transform: Transform::default(),
            color: Vec3::ONE,
            intensity: 1.0,
            range: 10.0,
            spot_angle: 0.5,
            spot_falloff_angle: 0.3,
            cast_shadows: false,
            active: true,
        }
    }

    pub fn directional(direction: Vec3) -> Self {
        let mut light = Self::with_kind(LightKind::Directional);
        light.transform.rotation = glam::Quat::from_rotation_arc(-Vec3::Z, direction.normalize());
        light
    }

    pub fn radial(position: Vec3, range: f32) -> Self {
        let mut light = Self::with_kind(LightKind::Radial);
        light.transform.position = position;
        light.range = range;
        light
    }

    pub fn spot(position: Vec3, direction: Vec3, range: f32, angle: f32) -> Self {
        let mut light = Self::with_kind(LightKind::Spot);
        light.transform.position = position;
        light.transform.rotation = glam::Quat::from_rotation_arc(-Vec3::Z, direction.normalize());
        light.range = range;
        light.spot_angle = angle;
        light.spot_falloff_angle = angle * 0.6;
        light
    }

    pub fn id(&self) -> SceneObjectId {
        self.id
    }

    pub fn with_color(mut self, color: Vec3, intensity: f32) -> Self {
        self.color = color;
        self.intensity = intensity;
        self
    }

    pub fn direction(&self) -> Vec3 {
        self.transform.forward()
    }
}
