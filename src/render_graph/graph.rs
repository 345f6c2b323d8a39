//! Per-view compositor graph
//!
//! A [`RenderCompositor`] is resolved from a [`NodeRegistry`] by walking the
//! declared inputs backwards from the registry root. Nodes whose `enabled`
//! predicate rejects the view settings are not instantiated; anything that
//! depended on them reads from their inputs instead.

use std::collections::{HashMap, HashSet};

use super::pass::CompositorNode;
use super::registry::NodeRegistry;
use super::resource::NodeOutput;
use crate::backend::{GpuDevice, TextureFormat};
use crate::error::{RendererError, RendererResult};
use crate::scene::RenderSettings;

/// Execution state of one node within the current view pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Unresolved,
    Resolved,
    Executed,
}

pub(crate) struct ResolvedNode {
    pub(crate) id: &'static str,
    /// Indices into the compositor's node list, all smaller than this node's
    pub(crate) inputs: Vec<usize>,
    pub(crate) node: Box<dyn CompositorNode>,
    pub(crate) state: NodeState,
    pub(crate) output: NodeOutput,
}

/// Node graph that turns a view's draw queue into pixels
#[derive(Default)]
pub struct RenderCompositor {
    /// Topologically ordered, root last
    pub(crate) nodes: Vec<ResolvedNode>,
    resolved: bool,
}

impl std::fmt::Debug for RenderCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderCompositor")
            .field("nodes", &self.node_ids())
            .field("resolved", &self.resolved)
            .finish()
    }
}

impl RenderCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Force a re-resolve before the next execution
    pub fn invalidate(&mut self) {
        self.resolved = false;
    }

    /// Instantiated node ids in execution order
    pub fn node_ids(&self) -> Vec<&'static str> {
        self.nodes.iter().map(|n| n.id).collect()
    }

    /// Ids of the nodes `id` actually reads from after disabled nodes were
    /// skipped
    pub fn node_inputs(&self, id: &str) -> Option<Vec<&'static str>> {
        let node = self.nodes.iter().find(|n| n.id == id)?;
        Some(node.inputs.iter().map(|&i| self.nodes[i].id).collect())
    }

    pub fn node_state(&self, id: &str) -> NodeState {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .map_or(NodeState::Unresolved, |n| n.state)
    }

    /// Output published by `id` during the last execution
    pub fn node_output(&self, id: &str) -> Option<&NodeOutput> {
        self.nodes
            .iter()
            .find(|n| n.id == id && n.state == NodeState::Executed)
            .map(|n| &n.output)
    }

    /// Instantiate the node graph for a view
    pub fn resolve(
        &mut self,
        registry: &NodeRegistry,
        settings: &RenderSettings,
        target_format: TextureFormat,
        device: &mut dyn GpuDevice,
    ) -> RendererResult<()> {
        if !device.supports_render_format(target_format) {
            log::error!(
                "Render target format {:?} is not supported by {}",
                target_format,
                device.name()
            );
            return Err(RendererError::UnsupportedTargetFormat(target_format));
        }

        self.destroy(device);

        let mut resolver = Resolver {
            registry,
            settings,
            nodes: Vec::new(),
            memo: HashMap::new(),
            visiting: HashSet::new(),
        };
        resolver.visit(registry.root(), true)?;
        self.nodes = resolver.nodes;
        self.resolved = true;

        log::debug!("Resolved compositor: {:?}", self.node_ids());
        Ok(())
    }

    /// Destroy all node instances
    pub fn destroy(&mut self, device: &mut dyn GpuDevice) {
        for mut node in self.nodes.drain(..) {
            node.node.destroy(device);
        }
        self.resolved = false;
    }
}

struct Resolver<'r> {
    registry: &'r NodeRegistry,
    settings: &'r RenderSettings,
    nodes: Vec<ResolvedNode>,
    /// Node indices each visited type id resolves to
    memo: HashMap<&'static str, Vec<usize>>,
    visiting: HashSet<&'static str>,
}

impl Resolver<'_> {
    fn visit(&mut self, id: &'static str, is_root: bool) -> RendererResult<Vec<usize>> {
        if let Some(done) = self.memo.get(id) {
            return Ok(done.clone());
        }
        if !self.visiting.insert(id) {
            log::error!("Compositor node dependency cycle through `{}`", id);
            return Err(RendererError::CyclicNodeDependency(id));
        }
        let descriptor = *self
            .registry
            .get(id)
            .ok_or(RendererError::UnregisteredNodeType(id))?;

        let mut inputs = Vec::new();
        for &input in descriptor.inputs {
            for index in self.visit(input, false)? {
                if !inputs.contains(&index) {
                    inputs.push(index);
                }
            }
        }

        let resolved = if is_root || (descriptor.enabled)(self.settings) {
            self.nodes.push(ResolvedNode {
                id,
                inputs,
                node: (descriptor.create)(),
                state: NodeState::Resolved,
                output: NodeOutput::new(),
            });
            vec![self.nodes.len() - 1]
        } else {
            log::trace!("Skipping disabled compositor node `{}`", id);
            inputs
        };

        self.visiting.remove(id);
        self.memo.insert(id, resolved.clone());
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::HeadlessDevice;
    use crate::render_graph::pass::{NodeContext, NodeDescriptor, NodeOutcome};

    struct Noop;

    impl CompositorNode for Noop {
        fn render(&mut self, _ctx: &mut NodeContext<'_, '_>) -> RendererResult<NodeOutcome> {
            Ok(NodeOutcome::PassThrough)
        }
    }

    fn node(id: &'static str, inputs: &'static [&'static str], enabled: fn(&RenderSettings) -> bool) -> NodeDescriptor {
        NodeDescriptor {
            id,
            inputs,
            enabled,
            create: || Box::new(Noop),
        }
    }

    fn registry() -> NodeRegistry {
        let mut registry = NodeRegistry::new("Resolve");
        registry.register(node("Forward", &[], |_| true)).unwrap();
        registry.register(node("Bloom", &["Forward"], |s| s.bloom.enabled)).unwrap();
        registry.register(node("Tonemap", &["Bloom"], |_| true)).unwrap();
        registry.register(node("Resolve", &["Tonemap"], |_| true)).unwrap();
        registry
    }

    #[test]
    fn test_resolve_orders_inputs_first() {
        let mut device = HeadlessDevice::new();
        let mut settings = RenderSettings::default();
        settings.bloom.enabled = true;

        let mut compositor = RenderCompositor::new();
        compositor
            .resolve(&registry(), &settings, TextureFormat::Rgba8Unorm, &mut device)
            .unwrap();

        assert_eq!(compositor.node_ids(), vec!["Forward", "Bloom", "Tonemap", "Resolve"]);
        assert_eq!(compositor.node_state("Bloom"), NodeState::Resolved);
    }

    #[test]
    fn test_disabled_node_is_bypassed() {
        let mut device = HeadlessDevice::new();
        let settings = RenderSettings::default();

        let mut compositor = RenderCompositor::new();
        compositor
            .resolve(&registry(), &settings, TextureFormat::Rgba8Unorm, &mut device)
            .unwrap();

        assert_eq!(compositor.node_ids(), vec!["Forward", "Tonemap", "Resolve"]);
        assert_eq!(compositor.node_inputs("Tonemap"), Some(vec!["Forward"]));
        assert_eq!(compositor.node_state("Bloom"), NodeState::Unresolved);
    }

    #[test]
    fn test_shared_input_instantiated_once() {
        let mut device = HeadlessDevice::new();
        let mut registry = NodeRegistry::new("Resolve");
        registry.register(node("Forward", &[], |_| true)).unwrap();
        registry.register(node("Ssao", &["Forward"], |_| true)).unwrap();
        registry.register(node("Resolve", &["Ssao", "Forward"], |_| true)).unwrap();

        let mut compositor = RenderCompositor::new();
        compositor
            .resolve(&registry, &RenderSettings::default(), TextureFormat::Rgba8Unorm, &mut device)
            .unwrap();

        assert_eq!(compositor.node_ids(), vec!["Forward", "Ssao", "Resolve"]);
        assert_eq!(compositor.node_inputs("Resolve"), Some(vec!["Ssao", "Forward"]));
    }

    #[test]
    fn test_unsupported_target_format() {
        let mut device = HeadlessDevice::new().without_render_format(TextureFormat::Rgba32Float);
        let mut compositor = RenderCompositor::new();
        let result = compositor.resolve(
            &registry(),
            &RenderSettings::default(),
            TextureFormat::Rgba32Float,
            &mut device,
        );
        assert!(matches!(
            result,
            Err(RendererError::UnsupportedTargetFormat(TextureFormat::Rgba32Float))
        ));
        assert!(!compositor.is_resolved());
    }

    #[test]
    fn test_cycle_detected_at_resolve() {
        let mut device = HeadlessDevice::new();
        let mut registry = NodeRegistry::new("Resolve");
        registry.register(node("A", &["B"], |_| true)).unwrap();
        registry.register(node("B", &["A"], |_| true)).unwrap();
        registry.register(node("Resolve", &["A"], |_| true)).unwrap();

        let mut compositor = RenderCompositor::new();
        let result = compositor.resolve(
            &registry,
            &RenderSettings::default(),
            TextureFormat::Rgba8Unorm,
            &mut device,
        );
        assert!(matches!(result, Err(RendererError::CyclicNodeDependency(_))));
    }
}
