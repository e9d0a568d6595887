//! Access to recorded scenes: the collaborator the navigation engine reads from.
//!
//! The engine only ever talks to the [`Dataset`] trait. [`MemoryDataset`] keeps
//! everything in memory and is what tests and synthetic setups use;
//! [`FsDataset`] reads the on-disk Active Vision Dataset layout.

mod errors;
mod fs;
mod memory;
mod targets;
mod types;

use std::collections::HashMap;

pub use errors::DatasetError;
pub use fs::FsDataset;
pub use memory::{MemoryDataset, MemoryScene};
pub use targets::{TargetEntry, parse_target_entry, parse_target_instance_name};
pub use types::{
    AdjacencyTable, BoundingBox, Image, InstanceId, InstanceNames, SceneAnnotations, TargetRef,
    Viewpoint, ViewpointId, ViewpointRecord,
};

/// Start or destination frame names per instance, in recorded order.
pub type PositionTable = HashMap<InstanceId, Vec<String>>;

pub trait Dataset: Send + Sync {
    /// Scene names, in a stable order.
    fn scenes(&self) -> Result<Vec<String>, DatasetError>;

    fn instance_names(&self) -> Result<InstanceNames, DatasetError>;

    /// Instances physically present in `scene`, in listing order.
    fn present_instances(&self, scene: &str) -> Result<Vec<InstanceId>, DatasetError>;

    fn annotations(&self, scene: &str) -> Result<SceneAnnotations, DatasetError>;

    fn initial_positions(&self, scene: &str) -> Result<PositionTable, DatasetError>;

    /// Precomputed goal frames. `None` when the scene ships no such table.
    fn destinations(&self, scene: &str) -> Result<Option<PositionTable>, DatasetError>;

    fn load_image(&self, scene: &str, viewpoint: &str) -> Result<Image, DatasetError>;

    /// Target reference images of `instance`: outer index is the view type,
    /// inner list the interchangeable candidates for that view.
    fn target_candidates(&self, instance: InstanceId) -> Result<Vec<Vec<TargetRef>>, DatasetError>;

    fn load_target(&self, target: &TargetRef) -> Result<Image, DatasetError>;
}
