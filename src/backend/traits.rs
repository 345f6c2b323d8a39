//! The GPU device capability consumed by the renderer
//!
//! The renderer never talks to a graphics API directly. Everything it needs
//! from the GPU goes through [`GpuDevice`], which is object safe so compositor
//! nodes can work with `&mut dyn GpuDevice`.

use crate::backend::types::*;
use glam::Vec4;
use thiserror::Error;

/// Device error type
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    #[error("Failed to create buffer: {0}")]
    BufferCreationFailed(String),
    #[error("Failed to create texture: {0}")]
    TextureCreationFailed(String),
    #[error("Unsupported format: {0:?}")]
    UnsupportedFormat(TextureFormat),
    #[error("Out of memory")]
    OutOfMemory,
    #[error("Device lost")]
    DeviceLost,
}

pub type DeviceResult<T> = Result<T, DeviceError>;

macro_rules! device_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u64);

        impl $name {
            /// Wrap a raw id handed out by a device implementation
            pub fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            pub fn raw(self) -> u64 {
                self.0
            }
        }
    };
}

device_handle!(
    /// Handle to a GPU buffer
    BufferHandle
);
device_handle!(
    /// Handle to a GPU texture
    TextureHandle
);
device_handle!(
    /// Handle to a compiled shader program
    ProgramHandle
);
device_handle!(
    /// Identifier of a presentable or offscreen render target
    RenderTargetId
);

/// What subsequent draws render into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTargetBinding {
    /// A render target owned by the platform layer (window or texture)
    Surface(RenderTargetId),
    /// Attachments allocated by the compositor
    Offscreen {
        color: TextureHandle,
        depth: Option<TextureHandle>,
    },
}

/// Opaque GPU capability
pub trait GpuDevice {
    /// Device name for logging
    fn name(&self) -> &str;

    // Resources

    /// Create a buffer
    fn create_buffer(&mut self, desc: &BufferDescriptor) -> DeviceResult<BufferHandle>;

    /// Write data to a buffer
    fn write_buffer(&mut self, buffer: BufferHandle, offset: u64, data: &[u8]);

    /// Destroy a buffer
    fn destroy_buffer(&mut self, buffer: BufferHandle);

    /// Create a texture
    fn create_texture(&mut self, desc: &TextureDescriptor) -> DeviceResult<TextureHandle>;

    /// Destroy a texture
    fn destroy_texture(&mut self, texture: TextureHandle);

    /// Whether a render target of this format can be drawn to
    fn supports_render_format(&self, format: TextureFormat) -> bool;

    /// Look up a shader program; `None` when the variant is unavailable
    fn program(&mut self, key: ProgramKey) -> Option<ProgramHandle>;

    // Commands

    fn bind_program(&mut self, program: ProgramHandle);

    /// Bind a buffer to a named shader slot
    fn bind_buffer(&mut self, slot: &str, buffer: BufferHandle);

    /// Bind a texture and its sampler to a named shader slot
    fn bind_texture(&mut self, slot: &str, texture: TextureHandle, filter: FilterMode);

    fn set_render_target(&mut self, target: RenderTargetBinding);

    fn set_viewport(&mut self, viewport: ViewportRect);

    fn clear_viewport(&mut self, flags: ClearFlags, color: Vec4, depth: f32, stencil: u8);

    fn draw(&mut self, call: &DrawCall);

    /// Present a window-backed render target
    fn swap_buffers(&mut self, target: RenderTargetId);
}
