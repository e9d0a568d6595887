use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};

use ndarray::Array3;
use serde::{Deserialize, Serialize};

use super::errors::DatasetError;
use crate::env::Action;

/// Stable numeric id of a tracked object instance.
pub type InstanceId = u32;

/// Row-major `(height, width, channels)` pixel array.
pub type Image = Array3<u8>;

/// Scene-scoped viewpoint id: the position of a frame in sorted frame-name order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewpointId(pub usize);

impl ViewpointId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ViewpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Axis-aligned box in pixel coordinates of the original scene image.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: i64,
    pub ymin: i64,
    pub xmax: i64,
    pub ymax: i64,
    pub instance_id: InstanceId,
    pub difficulty: u8,
}

impl BoundingBox {
    pub fn new(xmin: i64, ymin: i64, xmax: i64, ymax: i64, instance_id: InstanceId) -> Self {
        Self {
            xmin,
            ymin,
            xmax,
            ymax,
            instance_id,
            difficulty: 0,
        }
    }

    pub fn with_difficulty(mut self, difficulty: u8) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn area(&self) -> u64 {
        let w = (self.xmax - self.xmin).max(0) as u64;
        let h = (self.ymax - self.ymin).max(0) as u64;
        w * h
    }

    /// Parses `[xmin, ymin, xmax, ymax, instance_id, difficulty?]`.
    pub(crate) fn from_raw(raw: &[i64]) -> Result<Self, DatasetError> {
        let [xmin, ymin, xmax, ymax, id, rest @ ..] = raw else {
            return Err(DatasetError::Malformed(format!(
                "bounding box needs at least 5 values, got {}",
                raw.len()
            )));
        };
        if xmax < xmin || ymax < ymin {
            return Err(DatasetError::Malformed(format!(
                "inverted bounding box {raw:?}"
            )));
        }
        let instance_id = InstanceId::try_from(*id)
            .map_err(|_| DatasetError::Malformed(format!("bad instance id {id}")))?;
        let difficulty = match rest.first() {
            Some(d) => u8::try_from(*d)
                .map_err(|_| DatasetError::Malformed(format!("bad difficulty {d}")))?,
            None => 0,
        };
        Ok(Self {
            xmin: *xmin,
            ymin: *ymin,
            xmax: *xmax,
            ymax: *ymax,
            instance_id,
            difficulty,
        })
    }
}

/// Next viewpoint for each action; `None` means the action leaves the agent in place.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjacencyTable {
    next: [Option<ViewpointId>; 4],
}

impl AdjacencyTable {
    pub fn get(&self, action: Action) -> Option<ViewpointId> {
        self.next[action.index()]
    }

    pub fn set(&mut self, action: Action, target: Option<ViewpointId>) {
        self.next[action.index()] = target;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Action, Option<ViewpointId>)> + '_ {
        Action::ALL.iter().map(|a| (*a, self.get(*a)))
    }
}

/// One annotated frame as delivered by a dataset, before ids are assigned.
#[derive(Clone, Debug, Default)]
pub struct ViewpointRecord {
    pub name: String,
    pub boxes: Vec<BoundingBox>,
    pub neighbours: Vec<(Action, String)>,
}

impl ViewpointRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_box(mut self, bbox: BoundingBox) -> Self {
        self.boxes.push(bbox);
        self
    }

    pub fn with_edge(mut self, action: Action, target: impl Into<String>) -> Self {
        self.neighbours.push((action, target.into()));
        self
    }
}

#[derive(Clone, Debug)]
pub struct Viewpoint {
    pub id: ViewpointId,
    pub name: String,
    pub boxes: Vec<BoundingBox>,
    pub adjacency: AdjacencyTable,
}

/// All viewpoints of a scene with resolved adjacency.
#[derive(Clone, Debug)]
pub struct SceneAnnotations {
    scene: String,
    viewpoints: Vec<Viewpoint>,
    index: HashMap<String, ViewpointId>,
}

impl SceneAnnotations {
    /// Sorts records by frame name, assigns ids and resolves every edge.
    pub fn from_records(
        scene: impl Into<String>,
        mut records: Vec<ViewpointRecord>,
    ) -> Result<Self, DatasetError> {
        let scene = scene.into();
        records.sort_by(|a, b| a.name.cmp(&b.name));

        let mut index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if index.insert(record.name.clone(), ViewpointId(i)).is_some() {
                return Err(DatasetError::Malformed(format!(
                    "duplicate viewpoint {} in scene {scene}",
                    record.name
                )));
            }
        }

        let mut viewpoints = Vec::with_capacity(records.len());
        for (i, record) in records.into_iter().enumerate() {
            let mut adjacency = AdjacencyTable::default();
            for (action, target) in &record.neighbours {
                let id = index.get(target).copied().ok_or_else(|| {
                    DatasetError::Malformed(format!(
                        "{} -> {target} ({action}) points outside scene {scene}",
                        record.name
                    ))
                })?;
                adjacency.set(*action, Some(id));
            }
            viewpoints.push(Viewpoint {
                id: ViewpointId(i),
                name: record.name,
                boxes: record.boxes,
                adjacency,
            });
        }

        Ok(Self {
            scene,
            viewpoints,
            index,
        })
    }

    pub fn scene(&self) -> &str {
        &self.scene
    }

    pub fn len(&self) -> usize {
        self.viewpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.viewpoints.is_empty()
    }

    pub fn get(&self, id: ViewpointId) -> Option<&Viewpoint> {
        self.viewpoints.get(id.index())
    }

    pub fn id_of(&self, name: &str) -> Option<ViewpointId> {
        self.index.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Viewpoint> {
        self.viewpoints.iter()
    }

    /// Every annotated occurrence of `instance`, paired with its viewpoint.
    pub fn occurrences(
        &self,
        instance: InstanceId,
    ) -> impl Iterator<Item = (&Viewpoint, &BoundingBox)> {
        self.viewpoints.iter().flat_map(move |vp| {
            vp.boxes
                .iter()
                .filter(move |b| b.instance_id == instance)
                .map(move |b| (vp, b))
        })
    }

    pub fn max_instance_area(&self, instance: InstanceId) -> u64 {
        self.occurrences(instance)
            .map(|(_, b)| b.area())
            .max()
            .unwrap_or(0)
    }
}

/// Bidirectional instance id <-> name table.
#[derive(Clone, Debug, Default)]
pub struct InstanceNames {
    by_id: BTreeMap<InstanceId, String>,
    by_name: HashMap<String, InstanceId>,
}

impl InstanceNames {
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, DatasetError>
    where
        I: IntoIterator<Item = (InstanceId, S)>,
        S: Into<String>,
    {
        let mut names = Self::default();
        for (id, name) in pairs {
            let name = name.into();
            if names.by_name.contains_key(&name) || names.by_id.contains_key(&id) {
                return Err(DatasetError::Malformed(format!(
                    "duplicate instance entry {name} ({id})"
                )));
            }
            names.by_name.insert(name.clone(), id);
            names.by_id.insert(id, name);
        }
        Ok(names)
    }

    pub fn name(&self, id: InstanceId) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn id(&self, name: &str) -> Option<InstanceId> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn ids(&self) -> impl Iterator<Item = InstanceId> + '_ {
        self.by_id.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Opaque handle to one target reference image.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TargetRef(PathBuf);

impl TargetRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
