//! Render-thread scene mirror and frame pipeline

mod light;
mod render_man;
mod render_queue;
mod renderable;
mod scene;
mod view;
mod view_group;

pub use light::*;
pub use render_man::*;
pub use render_queue::*;
pub use renderable::*;
pub use scene::*;
pub use view::*;
pub use view_group::*;
