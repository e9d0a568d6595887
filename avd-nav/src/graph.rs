//! Viewpoint graph accessor.
//!
//! Wraps a [`Dataset`] and serves frames of one scene with the boxes of one
//! tracked instance. Frames are cached while the configuration stays the same,
//! so repeated lookups of an id within an episode return identical data.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::dataset::{
    AdjacencyTable, BoundingBox, Dataset, Image, InstanceId, SceneAnnotations, ViewpointId,
};
use crate::env::EnvError;

/// One viewpoint as seen while tracking an instance.
#[derive(Clone, Debug)]
pub struct Frame {
    pub id: ViewpointId,
    pub name: String,
    pub image: Image,
    /// Boxes of the tracked instance only, within the difficulty limit.
    pub boxes: Vec<BoundingBox>,
    pub adjacency: AdjacencyTable,
}

impl Frame {
    /// Largest box area of the tracked instance in this frame, 0 when absent.
    pub fn tracked_area(&self) -> u64 {
        self.boxes.iter().map(BoundingBox::area).max().unwrap_or(0)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct ActiveScene {
    instance: InstanceId,
    annotations: Arc<SceneAnnotations>,
    frames: HashMap<ViewpointId, Arc<Frame>>,
}

pub struct ViewpointGraph<D: ?Sized> {
    dataset: Arc<D>,
    max_difficulty: u8,
    active: Option<ActiveScene>,
}

impl<D: Dataset + ?Sized> ViewpointGraph<D> {
    pub fn new(dataset: Arc<D>, max_difficulty: u8) -> Self {
        Self {
            dataset,
            max_difficulty,
            active: None,
        }
    }

    /// Selects the scene and the instance whose boxes are reported.
    ///
    /// Annotations are reloaded only when the scene changes; the frame cache is
    /// dropped on any change.
    pub fn configure(&mut self, scene: &str, instance: InstanceId) -> Result<(), EnvError> {
        let annotations = match &self.active {
            Some(active) if active.annotations.scene() == scene => {
                if active.instance == instance {
                    return Ok(());
                }
                Arc::clone(&active.annotations)
            }
            _ => Arc::new(self.dataset.annotations(scene)?),
        };
        debug!(scene, instance, viewpoints = annotations.len(), "configured viewpoint graph");
        self.active = Some(ActiveScene {
            instance,
            annotations,
            frames: HashMap::new(),
        });
        Ok(())
    }

    pub fn scene(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.annotations.scene())
    }

    pub fn annotations(&self) -> Option<&SceneAnnotations> {
        self.active.as_ref().map(|a| a.annotations.as_ref())
    }

    pub fn lookup(&mut self, scene: &str, id: ViewpointId) -> Result<Arc<Frame>, EnvError> {
        let max_difficulty = self.max_difficulty;
        let dataset = &self.dataset;
        let active = Self::active_for(&mut self.active, scene)?;
        if let Some(frame) = active.frames.get(&id) {
            return Ok(Arc::clone(frame));
        }

        let vp = active
            .annotations
            .get(id)
            .ok_or_else(|| EnvError::not_found("viewpoint", format!("{scene} {id}")))?;
        let image = dataset.load_image(scene, &vp.name)?;
        let boxes = vp
            .boxes
            .iter()
            .filter(|b| b.instance_id == active.instance && b.difficulty <= max_difficulty)
            .copied()
            .collect();
        let frame = Arc::new(Frame {
            id,
            name: vp.name.clone(),
            image,
            boxes,
            adjacency: vp.adjacency,
        });
        active.frames.insert(id, Arc::clone(&frame));
        Ok(frame)
    }

    /// Resolves a frame name to its id in `scene`.
    pub fn index_of(&self, scene: &str, name: &str) -> Result<ViewpointId, EnvError> {
        let found = match &self.active {
            Some(active) if active.annotations.scene() == scene => active.annotations.id_of(name),
            _ => self.dataset.annotations(scene)?.id_of(name),
        };
        found.ok_or_else(|| EnvError::not_found("viewpoint", format!("{scene}/{name}")))
    }

    /// Drops the configuration and all cached frames.
    pub fn clear(&mut self) {
        self.active = None;
    }

    pub(crate) fn snapshot(&self) -> Option<ActiveScene> {
        self.active.clone()
    }

    pub(crate) fn restore(&mut self, active: Option<ActiveScene>) {
        self.active = active;
    }

    fn active_for<'a>(
        active: &'a mut Option<ActiveScene>,
        scene: &str,
    ) -> Result<&'a mut ActiveScene, EnvError> {
        match active.as_mut() {
            None => Err(EnvError::config("viewpoint graph used before configure")),
            Some(active) if active.annotations.scene() != scene => Err(EnvError::config(format!(
                "viewpoint graph is configured for {}, not {scene}",
                active.annotations.scene()
            ))),
            Some(active) => Ok(active),
        }
    }
}
