use tracing::{info, warn};

use super::{CursorPosition, EpisodeChoice, EpisodeSelector, Selection};
use crate::config::ResolvedSelection;
use crate::dataset::{Dataset, InstanceId, TargetRef};
use crate::env::EnvError;

#[derive(Clone, Debug)]
struct ScenePlan {
    scene: String,
    /// Selected instances present in the scene, in listing order, with their start frames.
    instances: Vec<(InstanceId, Vec<String>)>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cursor {
    At {
        scene: usize,
        instance: usize,
        start: usize,
    },
    Exhausted,
}

/// Exhaustive sweep over scenes x instances x start frames.
///
/// Scenes come in configured order, instances in the scene's listing order and
/// start frames in recorded order. Each `select` issues one combination; once
/// everything was issued the selector stays exhausted.
#[derive(Debug)]
pub struct SequentialSelector {
    plan: Vec<ScenePlan>,
    cursor: Cursor,
}

impl SequentialSelector {
    pub fn new<D: Dataset + ?Sized>(
        resolved: &ResolvedSelection,
        dataset: &D,
    ) -> Result<Self, EnvError> {
        let mut plan = Vec::with_capacity(resolved.scenes.len());
        for scene in &resolved.scenes {
            let mut starts = dataset.initial_positions(scene)?;
            let instances = dataset
                .present_instances(scene)?
                .into_iter()
                .filter(|id| resolved.instances.contains(id))
                .map(|id| {
                    let s = starts.remove(&id).unwrap_or_default();
                    if s.is_empty() {
                        warn!(scene = %scene, instance = id, "no start positions recorded");
                    }
                    (id, s)
                })
                .collect();
            plan.push(ScenePlan {
                scene: scene.clone(),
                instances,
            });
        }

        let selector = Self {
            cursor: settle(
                &plan,
                Cursor::At {
                    scene: 0,
                    instance: 0,
                    start: 0,
                },
            ),
            plan,
        };
        if selector.cursor == Cursor::Exhausted {
            return Err(EnvError::config(
                "sequential selection has no scene/instance/start combination",
            ));
        }
        info!(episodes = selector.total(), "sequential sweep planned");
        Ok(selector)
    }

    /// Number of combinations the sweep issues in total.
    pub fn total(&self) -> usize {
        self.plan
            .iter()
            .flat_map(|p| p.instances.iter())
            .map(|(_, starts)| starts.len())
            .sum()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor == Cursor::Exhausted
    }

    fn choice_at(&self, scene: usize, instance: usize, start: usize) -> EpisodeChoice {
        let plan = &self.plan[scene];
        let (instance_id, starts) = &plan.instances[instance];
        EpisodeChoice {
            scene: plan.scene.clone(),
            instance_id: *instance_id,
            start: starts[start].clone(),
        }
    }
}

/// Moves `cursor` forward to the first valid combination at or after it.
fn settle(plan: &[ScenePlan], cursor: Cursor) -> Cursor {
    let Cursor::At {
        mut scene,
        mut instance,
        mut start,
    } = cursor
    else {
        return Cursor::Exhausted;
    };
    loop {
        let Some(scene_plan) = plan.get(scene) else {
            return Cursor::Exhausted;
        };
        let Some((_, starts)) = scene_plan.instances.get(instance) else {
            scene += 1;
            instance = 0;
            start = 0;
            continue;
        };
        if start >= starts.len() {
            instance += 1;
            start = 0;
            continue;
        }
        return Cursor::At {
            scene,
            instance,
            start,
        };
    }
}

impl EpisodeSelector for SequentialSelector {
    fn select(&mut self) -> Result<Selection, EnvError> {
        let Cursor::At {
            scene,
            instance,
            start,
        } = self.cursor
        else {
            return Ok(Selection::Exhausted);
        };
        let choice = self.choice_at(scene, instance, start);
        self.cursor = settle(
            &self.plan,
            Cursor::At {
                scene,
                instance,
                start: start + 1,
            },
        );
        if self.cursor == Cursor::Exhausted {
            info!("sequential sweep issued its last episode");
        }
        Ok(Selection::Advanced(choice))
    }

    /// First candidate of every view, so sweeps are reproducible.
    fn pick_targets(&mut self, candidates: &[Vec<TargetRef>]) -> Vec<TargetRef> {
        candidates
            .iter()
            .filter_map(|view| view.first().cloned())
            .collect()
    }

    fn cursor_position(&self) -> Option<CursorPosition> {
        Some(match self.cursor {
            Cursor::At {
                scene,
                instance,
                start,
            } => CursorPosition::At(self.choice_at(scene, instance, start)),
            Cursor::Exhausted => CursorPosition::Exhausted,
        })
    }
}
