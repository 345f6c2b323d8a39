//! Queue submission shared by the geometry nodes

use crate::backend::{DrawCall, FilterMode, GpuDevice, ProgramHandle, ProgramKey};
use crate::renderer::{QueuePriority, RenderQueueItem, RendererElement, ViewInputs};

fn bind_element(device: &mut dyn GpuDevice, element: &RendererElement) {
    device.bind_buffer("PerMaterial", element.material_buffer());
    for (slot, texture) in &element.material.textures {
        device.bind_texture(slot, *texture, FilterMode::Linear);
    }
}

/// Draw the entries of one priority of the view's queue, in queue order.
///
/// `program` must already be bound; instanced entries switch to the
/// instanced variant and back. Returns the number of draw calls issued.
pub(crate) fn draw_queue(
    device: &mut dyn GpuDevice,
    view: &ViewInputs<'_>,
    priority: QueuePriority,
    program: ProgramHandle,
) -> usize {
    device.bind_buffer("PerFrame", view.scene.per_frame_buffer);
    device.bind_buffer("PerCamera", view.per_view_buffer);
    device.bind_buffer("Lights", view.light_buffer);

    let mut draws = 0;
    for entry in view.render_queue.with_priority(priority) {
        match entry.item {
            RenderQueueItem::Renderable { renderable, element } => {
                let Some(renderable) = view.scene.renderables.get(renderable) else {
                    log::warn!("Render queue references missing renderable {}", renderable);
                    continue;
                };
                let Some(element) = renderable.elements().get(element) else {
                    continue;
                };
                device.bind_buffer("PerObject", renderable.per_object_buffer());
                bind_element(device, element);
                device.draw(&DrawCall::indexed(
                    element.sub_mesh.first_index,
                    element.sub_mesh.index_count,
                    1,
                ));
                draws += 1;
            }
            RenderQueueItem::Instanced {
                block,
                renderable,
                count,
            } => {
                let Some(&instances) = view.scene.instance_buffers.get(block) else {
                    log::warn!("No instance buffer for block {}", block);
                    continue;
                };
                let Some(element) = view
                    .scene
                    .renderables
                    .get(renderable)
                    .and_then(|r| r.elements().first())
                else {
                    continue;
                };
                let Some(instanced) = device.program(ProgramKey::ForwardInstanced) else {
                    log::debug!("Instanced program unavailable, skipping block {}", block);
                    continue;
                };
                device.bind_program(instanced);
                device.bind_buffer("Instances", instances);
                bind_element(device, element);
                device.draw(&DrawCall::indexed(
                    element.sub_mesh.first_index,
                    element.sub_mesh.index_count,
                    count,
                ));
                device.bind_program(program);
                draws += 1;
            }
            RenderQueueItem::Skybox => {
                let Some(texture) = view.scene.skybox.and_then(|skybox| skybox.texture) else {
                    continue;
                };
                device.bind_texture("SkyboxTex", texture, FilterMode::Linear);
                device.draw(&DrawCall::FULLSCREEN);
                draws += 1;
            }
        }
    }
    draws
}
