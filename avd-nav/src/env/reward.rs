use serde::{Deserialize, Serialize};

use super::errors::EnvError;

/// How a step is scored.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardStrategy {
    /// Flat time penalty per step, fixed bonus on reaching a goal viewpoint.
    GoalReached { step_cost: f32, goal_reward: f32 },
    /// Time penalty that shrinks as the target's box grows:
    /// `-(1 - area / max_area) * scale`, where `max_area` is the largest box of
    /// the target anywhere in the scene. Goals still pay `goal_reward`.
    BoxAreaShaped { scale: f32, goal_reward: f32 },
}

impl Default for RewardStrategy {
    fn default() -> Self {
        RewardStrategy::GoalReached {
            step_cost: -0.1,
            goal_reward: 1.0,
        }
    }
}

impl RewardStrategy {
    /// `area` is the target's box area at the current viewpoint (0 if not visible).
    pub fn reward(&self, goal_reached: bool, area: u64, max_area: u64) -> f32 {
        match *self {
            RewardStrategy::GoalReached {
                step_cost,
                goal_reward,
            } => {
                if goal_reached {
                    goal_reward
                } else {
                    step_cost
                }
            }
            RewardStrategy::BoxAreaShaped { scale, goal_reward } => {
                if goal_reached {
                    return goal_reward;
                }
                let ratio = if max_area == 0 {
                    0.0
                } else {
                    (area as f64 / max_area as f64).min(1.0)
                };
                (-(1.0 - ratio) * scale as f64) as f32
            }
        }
    }

    pub fn validate(&self) -> Result<(), EnvError> {
        let values = match *self {
            RewardStrategy::GoalReached {
                step_cost,
                goal_reward,
            } => [step_cost, goal_reward],
            RewardStrategy::BoxAreaShaped { scale, goal_reward } => [scale, goal_reward],
        };
        if values.iter().any(|v| !v.is_finite()) {
            return Err(EnvError::config(format!(
                "reward parameters must be finite: {self:?}"
            )));
        }
        Ok(())
    }
}
