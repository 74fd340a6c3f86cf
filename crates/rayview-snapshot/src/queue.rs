//! Per-tier snapshot queues holding at most one task per surface.

use std::collections::VecDeque;

use rayview_core::{CameraSettings, Projection};

use crate::surface::SurfaceId;

/// Parameters of one pending snapshot.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SnapshotTask {
    pub surface: SurfaceId,
    pub camera: CameraSettings,
    pub projection: Option<Projection>,
    /// Disabled tasks stay in line but are skipped when dequeued.
    pub enabled: bool,
}

#[derive(Debug, Default)]
pub(crate) struct TaskQueue {
    tasks: VecDeque<SnapshotTask>,
}

impl TaskQueue {
    /// Replace the parameters of the surface's task and re-enable it, or
    /// append a new task if the surface has none. Keeps its position in line.
    pub fn upsert(
        &mut self,
        surface: SurfaceId,
        camera: CameraSettings,
        projection: Option<Projection>,
    ) {
        if let Some(task) = self.tasks.iter_mut().find(|task| task.surface == surface) {
            task.camera = camera;
            task.projection = projection;
            task.enabled = true;
            return;
        }
        self.tasks.push_back(SnapshotTask {
            surface,
            camera,
            projection,
            enabled: true,
        });
    }

    pub fn disable(&mut self, surface: SurfaceId) {
        for task in self.tasks.iter_mut().filter(|task| task.surface == surface) {
            task.enabled = false;
        }
    }

    pub fn pop_front(&mut self) -> Option<SnapshotTask> {
        self.tasks.pop_front()
    }

    pub fn count_enabled(&self) -> usize {
        self.tasks.iter().filter(|task| task.enabled).count()
    }

    pub fn has_enabled(&self, surface: SurfaceId) -> bool {
        self.tasks
            .iter()
            .any(|task| task.enabled && task.surface == surface)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}
