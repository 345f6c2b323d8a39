//! Registry of compositor node types
//!
//! The registry is owned by the renderer and filled during initialization.
//! Validation runs once, before any view resolves a compositor, so a missing
//! node type or a dependency cycle aborts startup instead of a frame.

use std::collections::HashMap;

use super::pass::{NodeDescriptor, NodeType};
use crate::error::{RendererError, RendererResult};

/// Node types known to a renderer instance, keyed by type id
#[derive(Debug, Clone)]
pub struct NodeRegistry {
    descriptors: Vec<NodeDescriptor>,
    index: HashMap<&'static str, usize>,
    root: &'static str,
}

impl NodeRegistry {
    /// Create an empty registry whose compositors resolve from `root`
    pub fn new(root: &'static str) -> Self {
        Self {
            descriptors: Vec::new(),
            index: HashMap::new(),
            root,
        }
    }

    pub fn root(&self) -> &'static str {
        self.root
    }

    pub fn register(&mut self, descriptor: NodeDescriptor) -> RendererResult<()> {
        if self.index.contains_key(descriptor.id) {
            log::error!("Compositor node `{}` registered twice", descriptor.id);
            return Err(RendererError::DuplicateNodeType(descriptor.id));
        }
        log::trace!("Registering compositor node `{}`", descriptor.id);
        self.index.insert(descriptor.id, self.descriptors.len());
        self.descriptors.push(descriptor);
        Ok(())
    }

    pub fn register_type<N: NodeType>(&mut self) -> RendererResult<()> {
        self.register(NodeDescriptor::of::<N>())
    }

    pub fn get(&self, id: &str) -> Option<&NodeDescriptor> {
        self.index.get(id).map(|&i| &self.descriptors[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Check that the root and every declared input are registered and that
    /// the dependency graph is acyclic
    pub fn validate(&self) -> RendererResult<()> {
        if !self.contains(self.root) {
            log::error!("Compositor root `{}` is not registered", self.root);
            return Err(RendererError::UnregisteredNodeType(self.root));
        }

        for desc in &self.descriptors {
            if let Some(missing) = desc.inputs.iter().find(|input| !self.contains(input)) {
                log::error!(
                    "Compositor node `{}` depends on unregistered `{}`",
                    desc.id,
                    missing
                );
                return Err(RendererError::UnregisteredNodeType(missing));
            }
        }

        // Kahn's algorithm over declared inputs
        let mut in_degree: Vec<usize> = self.descriptors.iter().map(|d| d.inputs.len()).collect();
        let mut queue: Vec<usize> = (0..self.descriptors.len())
            .filter(|&i| in_degree[i] == 0)
            .collect();
        let mut visited = 0;

        while let Some(done) = queue.pop() {
            visited += 1;
            let done_id = self.descriptors[done].id;
            for (i, desc) in self.descriptors.iter().enumerate() {
                let edges = desc.inputs.iter().filter(|&&input| input == done_id).count();
                if edges > 0 {
                    in_degree[i] -= edges;
                    if in_degree[i] == 0 {
                        queue.push(i);
                    }
                }
            }
        }

        if visited < self.descriptors.len() {
            let culprit = (0..self.descriptors.len())
                .find(|&i| in_degree[i] > 0)
                .map(|i| self.descriptors[i].id)
                .unwrap_or(self.root);
            log::error!("Compositor node dependency cycle through `{}`", culprit);
            return Err(RendererError::CyclicNodeDependency(culprit));
        }

        Ok(())
    }
}
