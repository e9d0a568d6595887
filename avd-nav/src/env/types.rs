use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::EnvError;
use crate::dataset::InstanceId;

/// The four discrete moves, with action ids `0..4` in declaration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Forward,
    Backward,
    RotateCw,
    RotateCcw,
}

impl Action {
    pub const ALL: [Action; 4] = [
        Action::Forward,
        Action::Backward,
        Action::RotateCw,
        Action::RotateCcw,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Forward => "forward",
            Action::Backward => "backward",
            Action::RotateCw => "rotate_cw",
            Action::RotateCcw => "rotate_ccw",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<usize> for Action {
    type Error = EnvError;

    fn try_from(id: usize) -> Result<Self, Self::Error> {
        Action::ALL
            .get(id)
            .copied()
            .ok_or_else(|| EnvError::Configuration(format!("action id {id} is not in 0..4")))
    }
}

/// Result of a reset: a fresh episode, or the end of a sequential sweep.
#[derive(Clone, Debug, PartialEq)]
pub enum Reset<O> {
    Ready(O),
    Exhausted,
}

impl<O> Reset<O> {
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Reset::Exhausted)
    }

    pub fn ready(self) -> Option<O> {
        match self {
            Reset::Ready(obs) => Some(obs),
            Reset::Exhausted => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// The agent reached a goal viewpoint.
    GoalReached,
    /// The step budget ran out first.
    Truncated,
}

/// What happened after a terminal step when the environment resets itself.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoReset {
    /// A new episode started; the returned observation belongs to it.
    Started { episode_id: Uuid },
    /// No episodes left; the returned observation is the terminal one.
    Exhausted,
    /// The next episode could not be prepared. The returned observation is
    /// the terminal one and the environment needs an explicit reset.
    Failed { error: String },
}

/// Per-step diagnostics returned next to the observation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    pub episode_id: Uuid,
    pub scene: String,
    pub instance_id: InstanceId,
    pub step: u32,
    pub viewpoint: String,
    pub moved: bool,
    pub termination: Option<Termination>,
    pub auto_reset: Option<AutoReset>,
}

impl StepInfo {
    pub fn goal_reached(&self) -> bool {
        self.termination == Some(Termination::GoalReached)
    }

    pub fn truncated(&self) -> bool {
        self.termination == Some(Termination::Truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_ids_follow_declaration_order() {
        for (id, action) in Action::ALL.iter().enumerate() {
            assert_eq!(Action::try_from(id).unwrap(), *action);
            assert_eq!(action.index(), id);
        }
        assert!(Action::try_from(4).is_err());
    }

    #[test]
    fn info_serializes_termination() {
        let info = StepInfo {
            episode_id: Uuid::nil(),
            scene: "S".into(),
            instance_id: 1,
            step: 3,
            viewpoint: "C".into(),
            moved: true,
            termination: Some(Termination::GoalReached),
            auto_reset: None,
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["termination"], "goal_reached");
        assert!(info.goal_reached());
        assert!(!info.truncated());
    }
}
