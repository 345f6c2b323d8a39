//! Render targets cameras draw into

use std::sync::atomic::{AtomicU64, Ordering};

use crate::backend::{RenderTargetId, TextureFormat};

static NEXT_TARGET_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderTargetKind {
    /// Presentable window surface, swapped at the end of the frame
    Window,
    /// Offscreen texture other cameras may sample
    Texture,
}

/// A surface owned by the platform layer
#[derive(Debug, Clone, PartialEq)]
pub struct RenderTarget {
    id: RenderTargetId,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    kind: RenderTargetKind,
}

impl RenderTarget {
    pub fn new(name: &str, kind: RenderTargetKind, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            id: RenderTargetId::from_raw(NEXT_TARGET_ID.fetch_add(1, Ordering::Relaxed)),
            name: name.to_string(),
            width,
            height,
            format,
            kind,
        }
    }

    pub fn window(name: &str, width: u32, height: u32) -> Self {
        Self::new(name, RenderTargetKind::Window, width, height, TextureFormat::Bgra8UnormSrgb)
    }

    pub fn texture(name: &str, width: u32, height: u32, format: TextureFormat) -> Self {
        Self::new(name, RenderTargetKind::Texture, width, height, format)
    }

    pub fn id(&self) -> RenderTargetId {
        self.id
    }

    pub fn kind(&self) -> RenderTargetKind {
        self.kind
    }

    pub fn is_window(&self) -> bool {
        self.kind == RenderTargetKind::Window
    }
}
