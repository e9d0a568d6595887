use std::collections::HashMap;

use super::errors::DatasetError;
use super::types::{
    BoundingBox, Image, InstanceId, InstanceNames, SceneAnnotations, TargetRef, ViewpointRecord,
};
use super::{Dataset, PositionTable};
use crate::env::Action;

/// A scene held entirely in memory.
#[derive(Clone, Debug)]
pub struct MemoryScene {
    present: Vec<InstanceId>,
    records: Vec<ViewpointRecord>,
    images: HashMap<String, Image>,
    image_shape: (usize, usize, usize),
    initial_positions: PositionTable,
    destinations: Option<PositionTable>,
}

impl Default for MemoryScene {
    fn default() -> Self {
        Self {
            present: Vec::new(),
            records: Vec::new(),
            images: HashMap::new(),
            image_shape: (8, 8, 3),
            initial_positions: PositionTable::new(),
            destinations: None,
        }
    }
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn present(mut self, instances: &[InstanceId]) -> Self {
        self.present = instances.to_vec();
        self
    }

    /// Adds a viewpoint with its boxes and outgoing edges.
    pub fn viewpoint(
        mut self,
        name: &str,
        boxes: &[BoundingBox],
        edges: &[(Action, &str)],
    ) -> Self {
        let mut record = ViewpointRecord::new(name);
        record.boxes = boxes.to_vec();
        record.neighbours = edges.iter().map(|(a, t)| (*a, t.to_string())).collect();
        self.records.push(record);
        self
    }

    /// Overrides the zero image generated for `name`.
    pub fn image(mut self, name: &str, image: Image) -> Self {
        self.images.insert(name.to_string(), image);
        self
    }

    /// Shape of the zero images generated for viewpoints without an explicit image.
    pub fn image_shape(mut self, height: usize, width: usize, channels: usize) -> Self {
        self.image_shape = (height, width, channels);
        self
    }

    pub fn start_positions(mut self, instance: InstanceId, names: &[&str]) -> Self {
        self.initial_positions
            .insert(instance, names.iter().map(|n| n.to_string()).collect());
        self
    }

    pub fn destinations(mut self, instance: InstanceId, names: &[&str]) -> Self {
        self.destinations
            .get_or_insert_with(PositionTable::new)
            .insert(instance, names.iter().map(|n| n.to_string()).collect());
        self
    }
}

/// In-memory [`Dataset`]; scenes keep insertion order.
#[derive(Clone, Debug, Default)]
pub struct MemoryDataset {
    instances: Vec<(InstanceId, String)>,
    scenes: Vec<(String, MemoryScene)>,
    targets: HashMap<InstanceId, Vec<Vec<Image>>>,
}

impl MemoryDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instance(mut self, id: InstanceId, name: &str) -> Self {
        self.instances.push((id, name.to_string()));
        self
    }

    pub fn scene(mut self, name: &str, scene: MemoryScene) -> Self {
        self.scenes.push((name.to_string(), scene));
        self
    }

    /// Registers target views for `instance`, one inner list of candidates per view type.
    pub fn targets(mut self, instance: InstanceId, views: Vec<Vec<Image>>) -> Self {
        self.targets.insert(instance, views);
        self
    }

    fn scene_ref(&self, scene: &str) -> Result<&MemoryScene, DatasetError> {
        self.scenes
            .iter()
            .find(|(name, _)| name == scene)
            .map(|(_, s)| s)
            .ok_or_else(|| DatasetError::not_found("scene", scene))
    }

    fn target_key(instance: InstanceId, view: usize, candidate: usize) -> TargetRef {
        TargetRef::new(format!("memory/{instance}/{view}/{candidate}"))
    }
}

impl Dataset for MemoryDataset {
    fn scenes(&self) -> Result<Vec<String>, DatasetError> {
        Ok(self.scenes.iter().map(|(name, _)| name.clone()).collect())
    }

    fn instance_names(&self) -> Result<InstanceNames, DatasetError> {
        InstanceNames::from_pairs(self.instances.iter().map(|(id, n)| (*id, n.clone())))
    }

    fn present_instances(&self, scene: &str) -> Result<Vec<InstanceId>, DatasetError> {
        Ok(self.scene_ref(scene)?.present.clone())
    }

    fn annotations(&self, scene: &str) -> Result<SceneAnnotations, DatasetError> {
        SceneAnnotations::from_records(scene, self.scene_ref(scene)?.records.clone())
    }

    fn initial_positions(&self, scene: &str) -> Result<PositionTable, DatasetError> {
        Ok(self.scene_ref(scene)?.initial_positions.clone())
    }

    fn destinations(&self, scene: &str) -> Result<Option<PositionTable>, DatasetError> {
        Ok(self.scene_ref(scene)?.destinations.clone())
    }

    fn load_image(&self, scene: &str, viewpoint: &str) -> Result<Image, DatasetError> {
        let s = self.scene_ref(scene)?;
        if let Some(image) = s.images.get(viewpoint) {
            return Ok(image.clone());
        }
        if !s.records.iter().any(|r| r.name == viewpoint) {
            return Err(DatasetError::not_found("viewpoint", viewpoint));
        }
        Ok(Image::zeros(s.image_shape))
    }

    fn target_candidates(&self, instance: InstanceId) -> Result<Vec<Vec<TargetRef>>, DatasetError> {
        let Some(views) = self.targets.get(&instance) else {
            return Ok(Vec::new());
        };
        Ok(views
            .iter()
            .enumerate()
            .map(|(v, candidates)| {
                (0..candidates.len())
                    .map(|c| Self::target_key(instance, v, c))
                    .collect()
            })
            .collect())
    }

    fn load_target(&self, target: &TargetRef) -> Result<Image, DatasetError> {
        let missing = || DatasetError::not_found("target", target.to_string());
        let key = target.path().to_str().ok_or_else(missing)?;
        let mut parts = key.strip_prefix("memory/").ok_or_else(missing)?.split('/');
        let mut next = || -> Option<usize> { parts.next()?.parse().ok() };
        let (Some(instance), Some(view), Some(candidate)) = (next(), next(), next()) else {
            return Err(missing());
        };
        InstanceId::try_from(instance)
            .ok()
            .and_then(|i| self.targets.get(&i))
            .and_then(|views| views.get(view))
            .and_then(|candidates| candidates.get(candidate))
            .cloned()
            .ok_or_else(missing)
    }
}
