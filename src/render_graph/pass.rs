//! Compositor node definitions

use crate::backend::{GpuDevice, ProgramHandle, ProgramKey, TextureDescriptor, TextureHandle};
use crate::error::{RendererError, RendererResult};
use crate::render_graph::resource::*;
use crate::renderer::ViewInputs;
use crate::scene::RenderSettings;

/// Result of running a node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOutcome {
    /// The node ran and published these textures
    Executed(NodeOutput),
    /// The node could not produce its effect; its primary input is forwarded
    /// unchanged to dependents
    PassThrough,
}

/// Context handed to a node while it renders
pub struct NodeContext<'a, 'v> {
    pub device: &'a mut dyn GpuDevice,
    pub view: &'a ViewInputs<'v>,
    pub(crate) node: &'static str,
    pub(crate) inputs: &'a [NodeOutput],
    pub(crate) resources: &'a mut FrameResources,
    pub(crate) pool: &'a mut GpuResourcePool,
}

impl<'a, 'v> NodeContext<'a, 'v> {
    /// Type id of the running node
    pub fn node(&self) -> &'static str {
        self.node
    }

    /// Outputs of the resolved inputs, in declaration order
    pub fn inputs(&self) -> &[NodeOutput] {
        self.inputs
    }

    /// Output of the first input, the usual starting point for a node's own
    /// output
    pub fn primary_input(&self) -> NodeOutput {
        self.inputs.first().cloned().unwrap_or_default()
    }

    /// Look up a named texture produced upstream.
    ///
    /// A missing resource means the dependency declaration is wrong and is a
    /// fatal configuration error.
    pub fn input_resource(&self, name: &'static str) -> RendererResult<TextureHandle> {
        self.try_input_resource(name).ok_or_else(|| {
            log::error!("{}: no input produced `{}`", self.node, name);
            RendererError::MissingResource {
                node: self.node,
                resource: name,
            }
        })
    }

    pub fn try_input_resource(&self, name: &str) -> Option<TextureHandle> {
        self.inputs.iter().find_map(|output| output.get(name))
    }

    /// Acquire a texture from the pool; anything not published in the node's
    /// output is released when the node returns
    pub fn acquire_texture(&mut self, desc: &TextureDescriptor) -> RendererResult<TextureHandle> {
        Ok(self.resources.acquire(&mut *self.pool, &mut *self.device, desc)?)
    }

    /// Keep a texture alive into the next frame
    pub fn persist(&mut self, kind: PersistentResource, texture: TextureHandle) {
        self.resources.persist(kind, texture);
    }

    pub fn previous_depth(&self) -> Option<TextureHandle> {
        self.view.previous_depth
    }

    /// Program lookup that logs unavailable variants
    pub fn program(&mut self, key: ProgramKey) -> Option<ProgramHandle> {
        let program = self.device.program(key);
        if program.is_none() {
            log::debug!("{}: program {:?} unavailable", self.node, key);
        }
        program
    }
}

/// A stage of the compositor graph
pub trait CompositorNode: Send {
    /// Record this node's work for the current view
    fn render(&mut self, ctx: &mut NodeContext<'_, '_>) -> RendererResult<NodeOutcome>;

    /// Free any device objects the node created for itself
    fn destroy(&mut self, _device: &mut dyn GpuDevice) {}
}

/// Static description of a node type
pub trait NodeType: CompositorNode + Default + 'static {
    const ID: &'static str;
    const INPUTS: &'static [&'static str];

    /// Whether the node takes part in a view with these settings; disabled
    /// nodes are skipped at resolve time and their dependents read from the
    /// disabled node's inputs instead
    fn enabled(_settings: &RenderSettings) -> bool {
        true
    }
}

/// Registry entry for one node type
#[derive(Clone, Copy)]
pub struct NodeDescriptor {
    pub id: &'static str,
    pub inputs: &'static [&'static str],
    pub enabled: fn(&RenderSettings) -> bool,
    pub create: fn() -> Box<dyn CompositorNode>,
}

fn create_node<N: NodeType>() -> Box<dyn CompositorNode> {
    Box::new(N::default())
}

impl NodeDescriptor {
    pub fn of<N: NodeType>() -> Self {
        Self {
            id: N::ID,
            inputs: N::INPUTS,
            enabled: N::enabled,
            create: create_node::<N>,
        }
    }
}

impl std::fmt::Debug for NodeDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeDescriptor")
            .field("id", &self.id)
            .field("inputs", &self.inputs)
            .finish()
    }
}
