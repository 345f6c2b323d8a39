//! Renderer options

use bitflags::bitflags;

use crate::renderer::QueuePriority;

bitflags! {
    /// Which culling stages run before draw-queue generation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct CullingFlags: u32 {
        const FRUSTUM = 1 << 0;
        const OCCLUSION = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InstancingMode {
    /// Every renderable is drawn individually
    None,
    /// Only renderables that opted in are instanced
    #[default]
    Manual,
    /// Any compatible opaque renderable may be instanced
    Automatic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueSortMode {
    /// Keep insertion order
    None,
    FrontToBack,
    BackToFront,
}

/// Sort mode per queue priority
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderQueueConfig {
    pub opaque: QueueSortMode,
    pub transparent: QueueSortMode,
    pub skybox: QueueSortMode,
    pub overlay: QueueSortMode,
}

impl Default for RenderQueueConfig {
    fn default() -> Self {
        Self {
            opaque: QueueSortMode::FrontToBack,
            transparent: QueueSortMode::BackToFront,
            skybox: QueueSortMode::None,
            overlay: QueueSortMode::None,
        }
    }
}

impl RenderQueueConfig {
    pub fn sort_mode(&self, priority: QueuePriority) -> QueueSortMode {
        match priority {
            QueuePriority::Opaque => self.opaque,
            QueuePriority::Transparent => self.transparent,
            QueuePriority::Skybox => self.skybox,
            QueuePriority::Overlay => self.overlay,
        }
    }
}

/// Configuration read by [`RenderMan::set_options`](crate::RenderMan::set_options)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderManOptions {
    pub culling: CullingFlags,
    pub instancing: InstancingMode,
    pub queue: RenderQueueConfig,
    /// Frames an unused pooled texture survives before it is destroyed
    pub resource_retention_frames: u64,
}

impl Default for RenderManOptions {
    fn default() -> Self {
        Self {
            culling: CullingFlags::FRUSTUM,
            instancing: InstancingMode::Manual,
            queue: RenderQueueConfig::default(),
            resource_retention_frames: 3,
        }
    }
}
