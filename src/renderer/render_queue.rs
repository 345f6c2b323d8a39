//! Sorted per-view draw lists

use crate::options::{QueueSortMode, RenderQueueConfig};
use crate::resources::MaterialKind;

/// Queue a draw lands in; lower values render first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueuePriority {
    Opaque = 0,
    Transparent = 1,
    Skybox = 2,
    Overlay = 3,
}

impl From<MaterialKind> for QueuePriority {
    fn from(kind: MaterialKind) -> Self {
        match kind {
            MaterialKind::Opaque => QueuePriority::Opaque,
            MaterialKind::Transparent => QueuePriority::Transparent,
            MaterialKind::Overlay => QueuePriority::Overlay,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderQueueItem {
    /// One element of an individually drawn renderable
    Renderable { renderable: usize, element: usize },
    /// One instance block; `renderable` is the member whose mesh and
    /// material are drawn
    Instanced {
        block: usize,
        renderable: usize,
        count: u32,
    },
    Skybox,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderQueueEntry {
    pub priority: QueuePriority,
    /// Squared distance to the view
    pub distance: f32,
    pub item: RenderQueueItem,
}

/// Draw list of one view, ordered by priority then per-priority sort mode
#[derive(Debug, Clone, Default)]
pub struct RenderQueue {
    entries: Vec<RenderQueueEntry>,
}

impl RenderQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, priority: QueuePriority, distance: f32, item: RenderQueueItem) {
        self.entries.push(RenderQueueEntry {
            priority,
            distance,
            item,
        });
    }

    /// Stable sort: entries with equal priority and key keep their push order
    pub fn sort(&mut self, config: &RenderQueueConfig) {
        let key = |entry: &RenderQueueEntry| match config.sort_mode(entry.priority) {
            QueueSortMode::None => 0.0,
            QueueSortMode::FrontToBack => entry.distance,
            QueueSortMode::BackToFront => -entry.distance,
        };
        self.entries
            .sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| key(a).total_cmp(&key(b))));
    }

    pub fn entries(&self) -> &[RenderQueueEntry] {
        &self.entries
    }

    pub fn with_priority(&self, priority: QueuePriority) -> impl Iterator<Item = &RenderQueueEntry> + '_ {
        self.entries.iter().filter(move |entry| entry.priority == priority)
    }

    /// Whether a renderable has any entry, individual or instanced
    pub fn references(&self, renderable: usize) -> bool {
        self.entries.iter().any(|entry| match entry.item {
            RenderQueueItem::Renderable { renderable: r, .. } => r == renderable,
            RenderQueueItem::Instanced { renderable: r, .. } => r == renderable,
            RenderQueueItem::Skybox => false,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(renderable: usize) -> RenderQueueItem {
        RenderQueueItem::Renderable {
            renderable,
            element: 0,
        }
    }

    #[test]
    fn test_priority_order() {
        let mut queue = RenderQueue::new();
        queue.push(QueuePriority::Overlay, 0.0, item(0));
        queue.push(QueuePriority::Skybox, 0.0, RenderQueueItem::Skybox);
        queue.push(QueuePriority::Transparent, 1.0, item(1));
        queue.push(QueuePriority::Opaque, 5.0, item(2));
        queue.sort(&RenderQueueConfig::default());

        let priorities: Vec<_> = queue.entries().iter().map(|e| e.priority).collect();
        assert_eq!(
            priorities,
            vec![
                QueuePriority::Opaque,
                QueuePriority::Transparent,
                QueuePriority::Skybox,
                QueuePriority::Overlay
            ]
        );
    }

    #[test]
    fn test_sort_modes() {
        let mut queue = RenderQueue::new();
        queue.push(QueuePriority::Opaque, 9.0, item(0));
        queue.push(QueuePriority::Opaque, 1.0, item(1));
        queue.push(QueuePriority::Transparent, 1.0, item(2));
        queue.push(QueuePriority::Transparent, 9.0, item(3));
        queue.sort(&RenderQueueConfig::default());

        let order: Vec<_> = queue.entries().iter().map(|e| e.item.clone()).collect();
        assert_eq!(order, vec![item(1), item(0), item(3), item(2)]);
    }

    #[test]
    fn test_stable_for_equal_keys() {
        let mut queue = RenderQueue::new();
        for r in 0..5 {
            queue.push(QueuePriority::Overlay, 0.0, item(r));
        }
        queue.sort(&RenderQueueConfig::default());

        let order: Vec<_> = queue.entries().iter().map(|e| e.item.clone()).collect();
        assert_eq!(order, (0..5).map(item).collect::<Vec<_>>());
    }
}
