//! Material definitions for forward rendering

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec4};

use crate::backend::TextureHandle;

static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique material identity, used for batching and instancing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MaterialId(u64);

/// Which render queue a material's draws land in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MaterialKind {
    #[default]
    Opaque,
    Transparent,
    Overlay,
}

bitflags! {
    /// Texture maps a material samples
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaterialFeatures: u32 {
        const DIFFUSE_MAP = 1 << 0;
        const EMISSIVE_MAP = 1 << 1;
        const NORMAL_MAP = 1 << 2;
        const SPECULAR_MAP = 1 << 3;
        const BUMP_MAP = 1 << 4;
        const PARALLAX_MAP = 1 << 5;
        const TRANSPARENCY_MAP = 1 << 6;
        const REFLECTION_MAP = 1 << 7;
        const OCCLUSION_MAP = 1 << 8;
        const ENVIRONMENT_MAP = 1 << 9;
    }
}

/// Scalar and color parameters uploaded per material
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialProperties {
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub emissive: Vec4,
    pub specular: Vec4,
    pub texture_repeat: Vec2,
    pub texture_offset: Vec2,
    pub specular_power: f32,
    pub specular_strength: f32,
    pub transparency: f32,
    pub index_of_refraction: f32,
    pub refraction: f32,
    pub reflection: f32,
    pub bump_scale: f32,
    pub parallax_scale: f32,
    pub alpha_threshold: f32,
}

impl Default for MaterialProperties {
    fn default() -> Self {
        Self {
            ambient: Vec4::new(0.25, 0.25, 0.25, 1.0),
            diffuse: Vec4::new(0.6, 0.6, 0.6, 1.0),
            emissive: Vec4::ZERO,
            specular: Vec4::new(0.25, 0.25, 0.25, 1.0),
            texture_repeat: Vec2::ONE,
            texture_offset: Vec2::ZERO,
            specular_power: 64.0,
            specular_strength: 1.0,
            transparency: 1.0,
            index_of_refraction: 0.0,
            refraction: 0.0,
            reflection: 0.0,
            bump_scale: 1.0,
            parallax_scale: 0.0,
            alpha_threshold: 0.0,
        }
    }
}

/// Material shared between renderables
#[derive(Debug, Clone)]
pub struct Material {
    id: MaterialId,
    pub name: String,
    pub kind: MaterialKind,
    pub properties: MaterialProperties,
    pub features: MaterialFeatures,
    /// Textures keyed by shader slot name
    pub textures: BTreeMap<String, TextureHandle>,
}

impl Default for Material {
    fn default() -> Self {
        Self::new("default")
    }
}

impl Material {
    pub fn new(name: &str) -> Self {
        Self {
            id: MaterialId(NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.to_string(),
            kind: MaterialKind::Opaque,
            properties: MaterialProperties::default(),
            features: MaterialFeatures::empty(),
            textures: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> MaterialId {
        self.id
    }

    pub fn with_kind(mut self, kind: MaterialKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_diffuse(mut self, color: Vec4) -> Self {
        self.properties.diffuse = color;
        self
    }

    pub fn with_emissive(mut self, color: Vec4) -> Self {
        self.properties.emissive = color;
        self
    }

    /// Attach a texture to a shader slot and enable the matching feature
    pub fn with_texture(mut self, slot: &str, texture: TextureHandle, feature: MaterialFeatures) -> Self {
        self.textures.insert(slot.to_string(), texture);
        self.features |= feature;
        self
    }

    pub fn is_transparent(&self) -> bool {
        self.kind == MaterialKind::Transparent
    }

    /// Create a uniform data struct for GPU
    pub fn uniform_data(&self) -> PerMaterialUniform {
        let p = &self.properties;
        PerMaterialUniform {
            ambient: p.ambient,
            diffuse: p.diffuse,
            emissive: p.emissive,
            specular: p.specular,
            texture_repeat_offset: Vec4::new(
                p.texture_repeat.x,
                p.texture_repeat.y,
                p.texture_offset.x,
                p.texture_offset.y,
            ),
            specular_params: Vec4::new(p.specular_power, p.specular_strength, p.transparency, p.alpha_threshold),
            optics: Vec4::new(p.index_of_refraction, p.refraction, p.reflection, 0.0),
            relief: Vec4::new(p.bump_scale, p.parallax_scale, 0.0, 0.0),
            features: [self.features.bits(), self.kind as u32, 0, 0],
        }
    }
}

/// Material uniform data for GPU
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PerMaterialUniform {
    pub ambient: Vec4,
    pub diffuse: Vec4,
    pub emissive: Vec4,
    pub specular: Vec4,
    /// xy = repeat, zw = offset
    pub texture_repeat_offset: Vec4,
    /// x = power, y = strength, z = transparency, w = alpha threshold
    pub specular_params: Vec4,
    /// x = index of refraction, y = refraction, z = reflection
    pub optics: Vec4,
    /// x = bump scale, y = parallax scale
    pub relief: Vec4,
    /// x = feature bits, y = material kind
    pub features: [u32; 4],
}
