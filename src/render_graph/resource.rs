//! Compositor resources
//!
//! Textures used by compositor nodes come from a [`GpuResourcePool`] that
//! outlives frames. Within one view's execution, [`FrameResources`] tracks who
//! acquired what so scratch textures go back to the pool as soon as the node
//! that acquired them finishes, and node outputs go back once the view is done.
//! Exactly one kind of texture may survive across frames, see
//! [`PersistentResource`].

use std::collections::{BTreeMap, HashMap};

use crate::backend::{DeviceResult, GpuDevice, TextureDescriptor, TextureFormat, TextureHandle, TextureUsage};

/// HDR scene color
pub const SCENE_COLOR: &str = "SceneColorTex";
/// Scene depth
pub const SCENE_DEPTH: &str = "SceneDepthTex";
/// HDR color as it was before tonemapping
pub const LIT_COLOR: &str = "LitColorTex";
/// Per-pixel motion vectors
pub const SCENE_VELOCITY: &str = "SceneVelocityTex";
/// Ambient occlusion term
pub const SSAO: &str = "SSAOTex";
/// Bloom contribution before compositing
pub const BLOOM: &str = "BloomTex";

/// The only resource allowed to outlive the frame that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PersistentResource {
    /// Depth of the previous frame, used for temporal reprojection
    PreviousDepth,
}

/// Named textures published by an executed node
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeOutput {
    textures: BTreeMap<&'static str, TextureHandle>,
}

impl NodeOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<TextureHandle> {
        self.textures.get(name).copied()
    }

    pub fn set(&mut self, name: &'static str, texture: TextureHandle) {
        self.textures.insert(name, texture);
    }

    pub fn with(mut self, name: &'static str, texture: TextureHandle) -> Self {
        self.set(name, texture);
        self
    }

    pub fn contains_texture(&self, texture: TextureHandle) -> bool {
        self.textures.values().any(|&t| t == texture)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, TextureHandle)> + '_ {
        self.textures.iter().map(|(&name, &texture)| (name, texture))
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct TextureKey {
    width: u32,
    height: u32,
    format: TextureFormat,
    usage: TextureUsage,
}

impl From<&TextureDescriptor> for TextureKey {
    fn from(desc: &TextureDescriptor) -> Self {
        Self {
            width: desc.width,
            height: desc.height,
            format: desc.format,
            usage: desc.usage,
        }
    }
}

#[derive(Debug)]
struct PooledTexture {
    handle: TextureHandle,
    released_at: u64,
}

/// Cache of GPU textures keyed by descriptor
#[derive(Debug, Default)]
pub struct GpuResourcePool {
    free: HashMap<TextureKey, Vec<PooledTexture>>,
    in_use: HashMap<TextureHandle, TextureKey>,
    frame: u64,
}

impl GpuResourcePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse a free texture matching `desc`, or create one
    pub fn acquire(&mut self, device: &mut dyn GpuDevice, desc: &TextureDescriptor) -> DeviceResult<TextureHandle> {
        let key = TextureKey::from(desc);
        let handle = match self.free.get_mut(&key).and_then(|list| list.pop()) {
            Some(pooled) => pooled.handle,
            None => device.create_texture(desc)?,
        };
        self.in_use.insert(handle, key);
        Ok(handle)
    }

    /// Return a texture to the pool. Unknown handles are ignored.
    pub fn release(&mut self, texture: TextureHandle) {
        match self.in_use.remove(&texture) {
            Some(key) => self.free.entry(key).or_default().push(PooledTexture {
                handle: texture,
                released_at: self.frame,
            }),
            None => log::warn!("GpuResourcePool: release of unknown texture {:?}", texture),
        }
    }

    /// Advance one frame and destroy textures idle for more than
    /// `retention_frames` frames
    pub fn update(&mut self, device: &mut dyn GpuDevice, retention_frames: u64) {
        self.frame += 1;
        let frame = self.frame;
        let mut destroyed = 0;
        for list in self.free.values_mut() {
            list.retain(|pooled| {
                let keep = frame - pooled.released_at <= retention_frames;
                if !keep {
                    device.destroy_texture(pooled.handle);
                    destroyed += 1;
                }
                keep
            });
        }
        self.free.retain(|_, list| !list.is_empty());
        if destroyed > 0 {
            log::trace!("GpuResourcePool: evicted {} idle textures", destroyed);
        }
    }

    /// Destroy every texture, free or not
    pub fn clear(&mut self, device: &mut dyn GpuDevice) {
        for (_, list) in self.free.drain() {
            for pooled in list {
                device.destroy_texture(pooled.handle);
            }
        }
        for (handle, _) in self.in_use.drain() {
            device.destroy_texture(handle);
        }
    }

    pub fn in_use_count(&self) -> usize {
        self.in_use.len()
    }

    pub fn free_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }
}

/// Textures acquired during one view's compositor execution
#[derive(Debug, Default)]
pub(crate) struct FrameResources {
    node_acquired: Vec<TextureHandle>,
    view_owned: Vec<TextureHandle>,
    persistent: Option<(PersistentResource, TextureHandle)>,
}

impl FrameResources {
    pub(crate) fn acquire(
        &mut self,
        pool: &mut GpuResourcePool,
        device: &mut dyn GpuDevice,
        desc: &TextureDescriptor,
    ) -> DeviceResult<TextureHandle> {
        let handle = pool.acquire(device, desc)?;
        self.node_acquired.push(handle);
        Ok(handle)
    }

    pub(crate) fn persist(&mut self, kind: PersistentResource, texture: TextureHandle) {
        if let Some((_, previous)) = self.persistent {
            debug_assert_eq!(previous, texture, "{:?} persisted twice in one frame", kind);
        }
        self.persistent = Some((kind, texture));
    }

    fn is_persistent(&self, texture: TextureHandle) -> bool {
        matches!(self.persistent, Some((_, t)) if t == texture)
    }

    /// Release what the finished node acquired but did not publish
    pub(crate) fn end_node(&mut self, node: &'static str, output: &NodeOutput, pool: &mut GpuResourcePool) {
        for texture in std::mem::take(&mut self.node_acquired) {
            if output.contains_texture(texture) || self.is_persistent(texture) {
                self.view_owned.push(texture);
            } else {
                log::trace!("{}: releasing scratch texture {:?}", node, texture);
                pool.release(texture);
            }
        }
    }

    /// Release everything except the persistent texture, which is returned
    pub(crate) fn finish(&mut self, pool: &mut GpuResourcePool) -> Option<(PersistentResource, TextureHandle)> {
        let persistent = self.persistent.take();
        for texture in self.view_owned.drain(..).chain(self.node_acquired.drain(..)) {
            if !matches!(persistent, Some((_, t)) if t == texture) {
                pool.release(texture);
            }
        }
        persistent
    }

    /// Release everything, used when execution fails part way
    pub(crate) fn abort(&mut self, pool: &mut GpuResourcePool) {
        self.persistent = None;
        for texture in self.view_owned.drain(..).chain(self.node_acquired.drain(..)) {
            pool.release(texture);
        }
    }
}
