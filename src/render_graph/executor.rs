//! Compositor execution

use super::graph::{NodeState, RenderCompositor};
use super::pass::{NodeContext, NodeOutcome};
use super::resource::{FrameResources, GpuResourcePool, NodeOutput};
use crate::backend::{GpuDevice, TextureHandle};
use crate::error::{RendererError, RendererResult};
use crate::renderer::ViewInputs;

impl RenderCompositor {
    /// Run every node once, in dependency order, for one view.
    ///
    /// Returns the texture persisted for the next frame, if a node persisted
    /// one. Every other texture acquired during execution is back in `pool`
    /// when this returns, including on error.
    pub fn execute(
        &mut self,
        device: &mut dyn GpuDevice,
        pool: &mut GpuResourcePool,
        view: &ViewInputs<'_>,
    ) -> RendererResult<Option<TextureHandle>> {
        if !self.is_resolved() {
            return Err(RendererError::CompositorNotResolved);
        }

        for node in &mut self.nodes {
            node.state = NodeState::Resolved;
            node.output = NodeOutput::new();
        }

        let mut resources = FrameResources::default();

        for index in 0..self.nodes.len() {
            let (done, rest) = self.nodes.split_at_mut(index);
            let current = &mut rest[0];

            let inputs: Vec<NodeOutput> = current
                .inputs
                .iter()
                .map(|&i| {
                    debug_assert_eq!(
                        done[i].state,
                        NodeState::Executed,
                        "{} ran before its input {}",
                        current.id,
                        done[i].id
                    );
                    done[i].output.clone()
                })
                .collect();

            let outcome = {
                let mut ctx = NodeContext {
                    device: &mut *device,
                    view,
                    node: current.id,
                    inputs: &inputs,
                    resources: &mut resources,
                    pool: &mut *pool,
                };
                current.node.render(&mut ctx)
            };

            let output = match outcome {
                Ok(NodeOutcome::Executed(output)) => output,
                Ok(NodeOutcome::PassThrough) => {
                    log::debug!("{}: passing input through", current.id);
                    inputs.into_iter().next().unwrap_or_default()
                }
                Err(err) => {
                    log::error!("{}: {}", current.id, err);
                    resources.abort(pool);
                    return Err(err);
                }
            };

            resources.end_node(current.id, &output, pool);
            current.output = output;
            current.state = NodeState::Executed;
        }

        Ok(resources.finish(pool).map(|(_, texture)| texture))
    }
}
