//! Driving an environment with a policy and recording what happened.

use std::io::Write;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::dataset::{Dataset, InstanceId};
use crate::env::{Action, AvdEnv, Env, EnvError, Reset, StepInfo, Termination};
use crate::observation::Observation;

pub trait Policy {
    fn act(&mut self, obs: &Observation) -> Action;
}

impl<F> Policy for F
where
    F: FnMut(&Observation) -> Action,
{
    fn act(&mut self, obs: &Observation) -> Action {
        self(obs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub action: Action,
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

/// One finished episode, without the observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub id: Uuid,
    pub scene: String,
    pub instance_id: InstanceId,
    pub start: String,
    pub transitions: Vec<Transition>,
    pub total_reward: f32,
    pub termination: Option<Termination>,
}

impl EpisodeRecord {
    pub fn len(&self) -> usize {
        self.transitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transitions.is_empty()
    }

    pub fn goal_reached(&self) -> bool {
        self.termination == Some(Termination::GoalReached)
    }
}

/// Plays one episode to its end. `None` when the environment has no episodes left.
pub fn run_episode<D, P>(
    env: &mut AvdEnv<D>,
    policy: &mut P,
) -> Result<Option<EpisodeRecord>, EnvError>
where
    D: Dataset + ?Sized,
    P: Policy + ?Sized,
{
    if env.config().reset_on_done {
        return Err(EnvError::config(
            "rollouts need reset_on_done = false to see episode boundaries",
        ));
    }
    let mut obs = match env.reset()? {
        Reset::Ready(obs) => obs,
        Reset::Exhausted => return Ok(None),
    };
    let choice = match env.episode() {
        Some(episode) => (episode.id, episode.choice.clone()),
        None => return Err(EnvError::config("reset returned without an episode")),
    };

    let mut transitions = Vec::new();
    let mut total_reward = 0.0;
    let termination = loop {
        let action = policy.act(&obs);
        let (next_obs, reward, done, info) = env.step(action)?;
        total_reward += reward;
        let termination = info.termination;
        transitions.push(Transition {
            action,
            reward,
            done,
            info,
        });
        if done {
            break termination;
        }
        obs = next_obs;
    };

    let (id, choice) = choice;
    Ok(Some(EpisodeRecord {
        id,
        scene: choice.scene,
        instance_id: choice.instance_id,
        start: choice.start,
        transitions,
        total_reward,
        termination,
    }))
}

/// Plays up to `limit` episodes, stopping early when the environment is exhausted.
pub fn evaluate<D, P>(
    env: &mut AvdEnv<D>,
    policy: &mut P,
    limit: usize,
) -> Result<Vec<EpisodeRecord>, EnvError>
where
    D: Dataset + ?Sized,
    P: Policy + ?Sized,
{
    let mut records = Vec::new();
    while records.len() < limit {
        match run_episode(env, policy)? {
            Some(record) => records.push(record),
            None => break,
        }
    }
    let successes = records.iter().filter(|r| r.goal_reached()).count();
    info!(episodes = records.len(), successes, "evaluation finished");
    Ok(records)
}

/// Writes one JSON object per record and line.
pub fn write_jsonl<W: Write>(records: &[EpisodeRecord], mut out: W) -> std::io::Result<()> {
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()
}
