//! RenderMan - a renderer scene graph with a compositor-driven frame pipeline
//!
//! The renderer mirrors simulation-side objects (renderables, lights, cameras,
//! skybox) into render-side state and drives one frame at a time:
//! - Frame-boundary synchronisation of scene mutations
//! - Per-object preparation of transforms and GPU parameter buffers
//! - Shared visibility, instancing and render-queue generation per view group
//! - A per-view compositor graph of render nodes (forward, skybox, transparency,
//!   SSAO, bloom, tonemapping, FXAA/TAA, final resolve)
//!
//! The GPU itself is consumed through the [`backend::GpuDevice`] capability;
//! [`backend::HeadlessDevice`] implements it without a GPU.

pub mod backend;
pub mod error;
pub mod geometry;
pub mod options;
pub mod pipeline;
pub mod render_graph;
pub mod renderer;
pub mod resources;
pub mod scene;

pub use backend::{GpuDevice, HeadlessDevice};
pub use error::{RendererError, RendererResult};
pub use options::{CullingFlags, InstancingMode, QueueSortMode, RenderManOptions, RenderQueueConfig};
pub use render_graph::{NodeDescriptor, NodeRegistry, RenderCompositor};
pub use renderer::{
    FrameData, RenderMan, RendererScene, RendererView, RendererViewGroup, SceneCommand,
    SceneNotifier,
};
pub use scene::{
    shared, Camera, Light, LightKind, Renderable, RenderSettings, RenderTarget, SceneObjectId,
    Shared, Skybox, Transform, UpdateFlags,
};
