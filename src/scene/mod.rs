//! Simulation-side scene objects
//!
//! These objects are owned by the simulation. The renderer only keeps weak
//! references to them and polls their state; it never mutates them.

mod camera;
mod light;
mod renderable;
mod settings;
mod target;
mod transform;

pub use camera::*;
pub use light::*;
pub use renderable::*;
pub use settings::*;
pub use target::*;
pub use transform::*;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::RwLock;

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

/// Stable identity of a scene object, used to key render-side mirrors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneObjectId(u64);

impl SceneObjectId {
    pub(crate) fn next() -> Self {
        Self(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

/// Scene object shared between the simulation and the renderer
pub type Shared<T> = Arc<RwLock<T>>;

pub fn shared<T>(value: T) -> Shared<T> {
    Arc::new(RwLock::new(value))
}

bitflags! {
    /// What changed on an object passed to an update notification
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct UpdateFlags: u32 {
        const TRANSFORM = 1 << 0;
        /// Mesh or materials were swapped
        const MESH = 1 << 1;
        /// Flags, layers, ranges, settings or render target
        const PROPERTIES = 1 << 2;
        const ALL = Self::TRANSFORM.bits() | Self::MESH.bits() | Self::PROPERTIES.bits();
    }
}
