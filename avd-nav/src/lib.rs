pub mod compositor;
pub mod config;
pub mod dataset;
pub mod env;
pub mod episode;
pub mod graph;
pub mod observation;
pub mod rollout;

pub use config::{EnvConfig, GoalStrategy, InstanceSelection, SceneSelection, SelectionMode};
pub use dataset::{Dataset, DatasetError, FsDataset, MemoryDataset, MemoryScene};
pub use env::{Action, AvdEnv, Env, EnvError, EpisodeStatus, Reset, StepInfo, Termination, VecEnv};
pub use observation::{Observation, ObservationSpec};
pub use rollout::{EpisodeRecord, Policy, Transition};
