//! Descriptor and command types shared across the device boundary

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3, Vec4};

/// Texture format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgba8Unorm,
    Rgba8UnormSrgb,
    Bgra8Unorm,
    Bgra8UnormSrgb,
    Rgba16Float,
    Rgba32Float,
    Rg16Float,
    R32Float,
    Depth32Float,
    Depth24PlusStencil8,
}

bitflags! {
    /// Texture usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TextureUsage: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const TEXTURE_BINDING = 1 << 2;
        const STORAGE_BINDING = 1 << 3;
        const RENDER_ATTACHMENT = 1 << 4;
    }
}

bitflags! {
    /// Buffer usage flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BufferUsage: u32 {
        const COPY_SRC = 1 << 0;
        const COPY_DST = 1 << 1;
        const INDEX = 1 << 2;
        const VERTEX = 1 << 3;
        const UNIFORM = 1 << 4;
        const STORAGE = 1 << 5;
    }
}

bitflags! {
    /// Which planes of a viewport are cleared
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        const COLOR = 1 << 0;
        const DEPTH = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

impl Default for ClearFlags {
    fn default() -> Self {
        ClearFlags::COLOR | ClearFlags::DEPTH | ClearFlags::STENCIL
    }
}

/// Texture descriptor
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDescriptor {
    pub label: Option<String>,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub usage: TextureUsage,
}

impl TextureDescriptor {
    /// Color or depth attachment that later passes can sample
    pub fn attachment(label: &str, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: Some(label.to_string()),
            width: width.max(1),
            height: height.max(1),
            format,
            usage: TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
        }
    }
}

impl Default for TextureDescriptor {
    fn default() -> Self {
        Self {
            label: None,
            width: 1,
            height: 1,
            format: TextureFormat::Rgba8Unorm,
            usage: TextureUsage::TEXTURE_BINDING | TextureUsage::COPY_DST,
        }
    }
}

/// Buffer descriptor
#[derive(Debug, Clone)]
pub struct BufferDescriptor {
    pub label: Option<String>,
    pub size: u64,
    pub usage: BufferUsage,
}

impl BufferDescriptor {
    /// Uniform buffer sized for one `T`
    pub fn uniform<T: Pod>(label: &str) -> Self {
        Self {
            label: Some(label.to_string()),
            size: std::mem::size_of::<T>() as u64,
            usage: BufferUsage::UNIFORM | BufferUsage::COPY_DST,
        }
    }

    /// Storage buffer holding `count` elements of `T`
    pub fn storage<T: Pod>(label: &str, count: usize) -> Self {
        Self {
            label: Some(label.to_string()),
            size: (std::mem::size_of::<T>() * count.max(1)) as u64,
            usage: BufferUsage::STORAGE | BufferUsage::COPY_DST,
        }
    }
}

/// Filter mode used when a texture is bound for sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

/// Viewport rectangle in pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewportRect {
    pub fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: width as f32,
            height: height as f32,
        }
    }
}

/// Shader programs the pipeline asks the device for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProgramKey {
    Forward,
    ForwardInstanced,
    Skybox,
    ForwardTransparent,
    Ssao,
    BloomPrefilter,
    BloomBlur,
    BloomComposite,
    Tonemapping,
    MotionBlur,
    GaussianDofSeparate,
    GaussianDofBlur,
    GaussianDofCombine,
    Fxaa,
    TemporalAa,
    FinalResolve,
    Overlay,
}

/// A single draw submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawCall {
    pub first_index: u32,
    pub index_count: u32,
    pub vertex_count: u32,
    pub instance_count: u32,
}

impl DrawCall {
    /// Fullscreen triangle used by post-process nodes
    pub const FULLSCREEN: DrawCall = DrawCall {
        first_index: 0,
        index_count: 0,
        vertex_count: 3,
        instance_count: 1,
    };

    pub fn indexed(first_index: u32, index_count: u32, instance_count: u32) -> Self {
        Self {
            first_index,
            index_count,
            vertex_count: 0,
            instance_count,
        }
    }
}

/// Standard vertex with position, normal, UV, and tangent
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Vec2,
    pub tangent: Vec4,
}
