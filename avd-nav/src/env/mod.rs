//! The navigation environment and the gym-style surface around it.

mod errors;
mod navigation;
mod reward;
mod traits;
mod types;
mod vec_env;

pub use errors::EnvError;
pub use navigation::{AvdEnv, EpisodeStatus, NavigationState};
pub use reward::RewardStrategy;
pub use traits::{Env, RenderFrame};
pub use types::{Action, AutoReset, Reset, StepInfo, Termination};
pub use vec_env::VecEnv;
