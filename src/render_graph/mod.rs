//! Render compositor
//!
//! Each view owns a [`RenderCompositor`], a directed acyclic graph of
//! [`CompositorNode`]s resolved from the renderer's [`NodeRegistry`]. Nodes
//! declare their inputs by type id, publish named textures in a
//! [`NodeOutput`] and draw through the view's [`GpuDevice`](crate::GpuDevice).

pub mod executor;
pub mod graph;
pub mod pass;
pub mod registry;
pub mod resource;

pub use graph::*;
pub use pass::*;
pub use registry::*;
pub use resource::*;
