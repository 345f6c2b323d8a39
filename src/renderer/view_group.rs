//! Visibility, instancing and queue generation shared by a set of views

use std::collections::HashMap;

use fixedbitset::FixedBitSet;
use glam::Vec3;

use super::render_queue::{QueuePriority, RenderQueue, RenderQueueItem};
use super::renderable::{RendererRenderable, MAX_INSTANCED_BLOCKS, MAX_INSTANCES_PER_BLOCK};
use super::scene::SceneInfo;
use crate::geometry::{Frustum, Sphere};
use crate::options::{CullingFlags, InstancingMode, RenderQueueConfig};
use crate::resources::{MaterialId, MaterialKind, MeshId};

/// Visibility and instancing result of one renderable for a view group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CullInfo {
    /// Visible in at least one view of the group
    pub visible: bool,
    /// Drawn through an instance block rather than individually
    pub instanced: bool,
}

/// Renderables drawn by one instanced call
#[derive(Debug, Clone, PartialEq)]
pub struct InstancedBlock {
    /// Indices into the scene's renderables
    pub members: Vec<usize>,
    pub layer: u64,
}

/// Frame-scoped culling output of a view group
#[derive(Debug, Clone, Default)]
pub struct VisibilityInfo {
    /// One entry per scene renderable
    pub renderables: Vec<CullInfo>,
    pub radial_lights: Vec<bool>,
    pub spot_lights: Vec<bool>,
    pub instanced_blocks: Vec<InstancedBlock>,
    /// Per view of the group, which renderables that view sees
    per_view: Vec<FixedBitSet>,
}

impl VisibilityInfo {
    pub fn visible_in_view(&self, view_slot: usize, renderable: usize) -> bool {
        self.per_view
            .get(view_slot)
            .map_or(false, |set| set.contains(renderable))
    }

    /// Renderables that need their GPU data this frame
    pub fn needs_upload(&self) -> impl Iterator<Item = usize> + '_ {
        self.renderables
            .iter()
            .enumerate()
            .filter(|(_, info)| info.visible || info.instanced)
            .map(|(index, _)| index)
    }
}

/// Views rendered to the same target in one pass
#[derive(Debug, Default)]
pub struct RendererViewGroup {
    /// Indices into the scene's views
    views: Vec<usize>,
    visibility: VisibilityInfo,
}

struct ViewCuller<'a> {
    frustum: &'a Frustum,
    position: Vec3,
    layers: u64,
    cull_distance: f32,
}

impl ViewCuller<'_> {
    fn sees(&self, renderable: &RendererRenderable, frustum_test: bool) -> bool {
        let cull = renderable.cull_input();
        if cull.layer & self.layers == 0 {
            return false;
        }
        let max_distance = self.cull_distance * cull.cull_distance_factor;
        let distance = (cull.bounds.sphere.center - self.position).length() - cull.bounds.sphere.radius;
        if distance > max_distance {
            return false;
        }
        !frustum_test || self.frustum.intersects_bounds(&cull.bounds)
    }
}

impl RendererViewGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the views of this group, discarding previous results
    pub fn set_views(&mut self, views: &[usize]) {
        self.views.clear();
        self.views.extend_from_slice(views);
        self.visibility = VisibilityInfo::default();
    }

    pub fn views(&self) -> &[usize] {
        &self.views
    }

    pub fn visibility(&self) -> &VisibilityInfo {
        &self.visibility
    }

    fn reset(&mut self, scene: &SceneInfo) {
        let count = scene.renderables.len();
        self.visibility = VisibilityInfo {
            renderables: vec![CullInfo::default(); count],
            radial_lights: vec![false; scene.radial_lights.len()],
            spot_lights: vec![false; scene.spot_lights.len()],
            instanced_blocks: Vec::new(),
            per_view: vec![FixedBitSet::with_capacity(count); self.views.len()],
        };
    }

    fn cullers<'s>(&self, scene: &'s SceneInfo) -> Vec<ViewCuller<'s>> {
        self.views
            .iter()
            .map(|&index| {
                let view = &scene.views[index];
                let properties = view.properties();
                ViewCuller {
                    frustum: &properties.frustum,
                    position: properties.position,
                    layers: properties.layers,
                    cull_distance: view.settings().cull_distance,
                }
            })
            .collect()
    }

    /// Test every renderable and light against the views of the group.
    ///
    /// Layer masks and cull distance always apply; the frustum test only runs
    /// with [`CullingFlags::FRUSTUM`]. Zero-size bounds are tested as points.
    pub fn determine_visibility(&mut self, scene: &SceneInfo, culling: CullingFlags) {
        self.reset(scene);
        let frustum_test = culling.contains(CullingFlags::FRUSTUM);
        let cullers = self.cullers(scene);

        for (index, renderable) in scene.renderables.iter().enumerate() {
            if !renderable.is_drawable() {
                continue;
            }
            for (slot, culler) in cullers.iter().enumerate() {
                if culler.sees(renderable, frustum_test) {
                    self.visibility.per_view[slot].insert(index);
                    self.visibility.renderables[index].visible = true;
                }
            }
        }

        let light_visible = |bounds: Option<Sphere>| {
            bounds.map_or(false, |sphere| {
                cullers
                    .iter()
                    .any(|culler| !frustum_test || culler.frustum.contains_sphere(&sphere))
            })
        };
        for (index, light) in scene.radial_lights.iter().enumerate() {
            self.visibility.radial_lights[index] = light.active && light_visible(light.bounds());
        }
        for (index, light) in scene.spot_lights.iter().enumerate() {
            self.visibility.spot_lights[index] = light.active && light_visible(light.bounds());
        }

        log::trace!(
            "View group of {} views: {} of {} renderables visible",
            self.views.len(),
            self.visibility.renderables.iter().filter(|i| i.visible).count(),
            scene.renderables.len()
        );
    }

    /// Mark every drawable renderable and valid light visible in every view,
    /// with the same output shape as [`determine_visibility`](Self::determine_visibility)
    pub fn set_all_objects_as_visible(&mut self, scene: &SceneInfo) {
        self.reset(scene);
        for (index, renderable) in scene.renderables.iter().enumerate() {
            if !renderable.is_drawable() {
                continue;
            }
            self.visibility.renderables[index].visible = true;
            for set in &mut self.visibility.per_view {
                set.insert(index);
            }
        }
        for (index, light) in scene.radial_lights.iter().enumerate() {
            self.visibility.radial_lights[index] = light.active && light.is_valid();
        }
        for (index, light) in scene.spot_lights.iter().enumerate() {
            self.visibility.spot_lights[index] = light.active && light.is_valid();
        }
    }

    /// Group visible renderables sharing mesh, material and layer into
    /// instance blocks
    pub fn generate_instanced(&mut self, scene: &SceneInfo, mode: InstancingMode) {
        for info in &mut self.visibility.renderables {
            info.instanced = false;
        }
        self.visibility.instanced_blocks.clear();
        if mode == InstancingMode::None {
            return;
        }

        let mut groups: Vec<(u64, Vec<usize>)> = Vec::new();
        let mut group_index: HashMap<(MeshId, u32, MaterialId, u64), usize> = HashMap::new();

        for (index, renderable) in scene.renderables.iter().enumerate() {
            if !self.visibility.renderables[index].visible || renderable.is_merged_batch() {
                continue;
            }
            if mode == InstancingMode::Manual && !renderable.instancing {
                continue;
            }
            let [element] = renderable.elements() else {
                continue;
            };
            if element.material.kind != MaterialKind::Opaque {
                continue;
            }
            let key = (
                element.mesh.id(),
                element.sub_mesh.first_index,
                element.material.id(),
                renderable.layer,
            );
            let group = *group_index.entry(key).or_insert_with(|| {
                groups.push((renderable.layer, Vec::new()));
                groups.len() - 1
            });
            groups[group].1.push(index);
        }

        'groups: for (layer, members) in groups {
            for chunk in members.chunks(MAX_INSTANCES_PER_BLOCK) {
                if chunk.len() < 2 {
                    continue;
                }
                if self.visibility.instanced_blocks.len() >= MAX_INSTANCED_BLOCKS {
                    log::debug!("Out of instance blocks, remaining renderables drawn individually");
                    break 'groups;
                }
                for &member in chunk {
                    self.visibility.renderables[member].instanced = true;
                }
                self.visibility.instanced_blocks.push(InstancedBlock {
                    members: chunk.to_vec(),
                    layer,
                });
            }
        }
    }

    /// Build the sorted draw list of the `view_slot`-th view of the group
    pub fn generate_render_queue(&self, scene: &SceneInfo, view_slot: usize, config: &RenderQueueConfig) -> RenderQueue {
        let mut queue = RenderQueue::new();
        let Some(&view_index) = self.views.get(view_slot) else {
            return queue;
        };
        let view = &scene.views[view_index];
        let position = view.properties().position;
        let overlay_only = view.settings().overlay_only;

        for (index, renderable) in scene.renderables.iter().enumerate() {
            let info = self.visibility.renderables[index];
            if !info.visible || info.instanced || !self.visibility.visible_in_view(view_slot, index) {
                continue;
            }
            let distance = renderable.sort_origin().distance_squared(position);
            for (element_index, element) in renderable.elements().iter().enumerate() {
                let priority = QueuePriority::from(element.material.kind);
                if overlay_only && priority != QueuePriority::Overlay {
                    continue;
                }
                queue.push(
                    priority,
                    distance,
                    RenderQueueItem::Renderable {
                        renderable: index,
                        element: element_index,
                    },
                );
            }
        }

        if !overlay_only {
            for (block_index, block) in self.visibility.instanced_blocks.iter().enumerate() {
                let nearest = block
                    .members
                    .iter()
                    .filter(|&&member| self.visibility.visible_in_view(view_slot, member))
                    .map(|&member| scene.renderables[member].sort_origin().distance_squared(position))
                    .reduce(f32::min);
                if let Some(distance) = nearest {
                    queue.push(
                        QueuePriority::Opaque,
                        distance,
                        RenderQueueItem::Instanced {
                            block: block_index,
                            renderable: block.members[0],
                            count: block.members.len() as u32,
                        },
                    );
                }
            }

            let skybox_visible = scene.skybox.as_ref().map_or(false, |skybox| skybox.active);
            if skybox_visible && view.settings().enable_skybox {
                queue.push(QueuePriority::Skybox, 0.0, RenderQueueItem::Skybox);
            }
        }

        queue.sort(config);
        queue
    }
}
