//! Asset-side data the renderer draws
//!
//! Meshes and materials are produced by the asset pipeline and shared with
//! renderables through `Arc`.

mod material;
mod mesh;

pub use material::*;
pub use mesh::*;
