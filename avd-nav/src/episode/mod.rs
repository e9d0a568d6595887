//! Episode selection: which scene, instance and start viewpoint comes next.

mod goals;
mod random;
mod sequential;

use std::collections::BTreeSet;
use std::sync::Arc;

use ndarray::Array4;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use goals::goal_set;
pub use random::RandomSelector;
pub use sequential::SequentialSelector;

use crate::config::{ResolvedSelection, SelectionMode};
use crate::dataset::{Dataset, InstanceId, TargetRef, ViewpointId};
use crate::env::EnvError;

/// Scene, instance and start frame of one episode.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EpisodeChoice {
    pub scene: String,
    pub instance_id: InstanceId,
    pub start: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    Advanced(EpisodeChoice),
    Exhausted,
}

/// Where a sequential sweep stands: the combination it will issue next, or the end.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorPosition {
    At(EpisodeChoice),
    Exhausted,
}

pub trait EpisodeSelector: Send {
    fn select(&mut self) -> Result<Selection, EnvError>;

    /// Picks one candidate per view type.
    fn pick_targets(&mut self, candidates: &[Vec<TargetRef>]) -> Vec<TargetRef>;

    /// Only selectors that enumerate have a cursor.
    fn cursor_position(&self) -> Option<CursorPosition> {
        None
    }
}

/// A fully prepared episode; immutable until the next reset.
#[derive(Clone, Debug)]
pub struct Episode {
    pub id: Uuid,
    pub choice: EpisodeChoice,
    pub start_id: ViewpointId,
    pub goals: BTreeSet<String>,
    pub target: Arc<Array4<u8>>,
    /// Largest box of the target anywhere in the scene, for shaped rewards.
    pub max_area: u64,
}

pub fn build_selector<D: Dataset + ?Sized>(
    mode: SelectionMode,
    resolved: &ResolvedSelection,
    dataset: &D,
    rng: StdRng,
) -> Result<Box<dyn EpisodeSelector>, EnvError> {
    Ok(match mode {
        SelectionMode::Random => Box::new(RandomSelector::new(resolved, dataset, rng)?),
        SelectionMode::Sequential => Box::new(SequentialSelector::new(resolved, dataset)?),
    })
}
