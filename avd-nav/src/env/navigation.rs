use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::traits::{Env, RenderFrame};
use super::types::{Action, AutoReset, Reset, StepInfo, Termination};
use super::EnvError;
use crate::compositor::TargetCompositor;
use crate::config::{EnvConfig, ResolvedSelection};
use crate::dataset::{Dataset, InstanceId, ViewpointId};
use crate::episode::{self, CursorPosition, Episode, EpisodeChoice, EpisodeSelector, Selection};
use crate::graph::ViewpointGraph;
use crate::observation::{Observation, ObservationAssembler, ObservationSpec};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NavigationState {
    pub current: ViewpointId,
    pub step_count: u32,
}

/// Introspection of the episode in progress.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpisodeStatus {
    Active {
        episode_id: Uuid,
        scene: String,
        instance_id: InstanceId,
        start: String,
    },
    Exhausted,
}

/// Navigation through recorded viewpoints toward a target instance.
pub struct AvdEnv<D: Dataset + ?Sized> {
    dataset: Arc<D>,
    config: EnvConfig,
    selection: ResolvedSelection,
    graph: ViewpointGraph<D>,
    selector: Box<dyn EpisodeSelector>,
    compositor: TargetCompositor,
    assembler: ObservationAssembler,
    episode: Option<Episode>,
    state: Option<NavigationState>,
    exhausted: bool,
}

impl<D: Dataset + ?Sized> AvdEnv<D> {
    /// Validates `config`, resolves the scene and instance selection and
    /// prepares the episode selector. No episode is started until `reset`.
    pub fn new(dataset: Arc<D>, config: EnvConfig) -> Result<Self, EnvError> {
        config.validate()?;
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let selection = ResolvedSelection::resolve(&config, dataset.as_ref(), &mut rng)?;
        let selector = episode::build_selector(
            config.selection,
            &selection,
            dataset.as_ref(),
            StdRng::seed_from_u64(rng.next_u64()),
        )?;
        info!(
            scenes = selection.scenes.len(),
            instances = selection.instances.len(),
            mode = ?config.selection,
            "navigation environment ready"
        );

        Ok(Self {
            graph: ViewpointGraph::new(Arc::clone(&dataset), config.max_difficulty),
            compositor: TargetCompositor::new(config.target_shape, config.fallback_target_count),
            assembler: ObservationAssembler::new(),
            dataset,
            config,
            selection,
            selector,
            episode: None,
            state: None,
            exhausted: false,
        })
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn selection(&self) -> &ResolvedSelection {
        &self.selection
    }

    pub fn episode(&self) -> Option<&Episode> {
        self.episode.as_ref()
    }

    pub fn state(&self) -> Option<NavigationState> {
        self.state
    }

    /// Shapes of the observations of the current episode.
    pub fn observation_spec(&self) -> Option<&ObservationSpec> {
        self.assembler.spec()
    }

    pub fn num_actions(&self) -> usize {
        Action::ALL.len()
    }

    /// Frame name of the current viewpoint.
    pub fn current_viewpoint(&self) -> Option<&str> {
        let state = self.state?;
        self.graph
            .annotations()?
            .get(state.current)
            .map(|vp| vp.name.as_str())
    }

    pub fn current_episode_info(&self) -> Result<EpisodeStatus, EnvError> {
        if self.exhausted {
            return Ok(EpisodeStatus::Exhausted);
        }
        let episode = self
            .episode
            .as_ref()
            .ok_or_else(|| EnvError::config("no episode yet: call reset first"))?;
        Ok(EpisodeStatus::Active {
            episode_id: episode.id,
            scene: episode.choice.scene.clone(),
            instance_id: episode.choice.instance_id,
            start: episode.choice.start.clone(),
        })
    }

    /// The combination a sequential sweep issues next; `None` in random mode.
    pub fn cursor_position(&self) -> Option<CursorPosition> {
        self.selector.cursor_position()
    }

    fn reset_episode(&mut self) -> Result<Reset<Observation>, EnvError> {
        let choice = match self.selector.select()? {
            Selection::Exhausted => {
                info!("no episodes left");
                self.episode = None;
                self.state = None;
                self.exhausted = true;
                self.assembler.clear();
                return Ok(Reset::Exhausted);
            }
            Selection::Advanced(choice) => choice,
        };

        let previous_graph = self.graph.snapshot();
        let previous_spec = self.assembler.spec().copied();
        match self.prepare(choice) {
            Ok((episode, obs)) => {
                info!(
                    episode_id = %episode.id,
                    scene = %episode.choice.scene,
                    instance = episode.choice.instance_id,
                    start = %episode.choice.start,
                    goals = episode.goals.len(),
                    "episode started"
                );
                self.state = Some(NavigationState {
                    current: episode.start_id,
                    step_count: 0,
                });
                self.episode = Some(episode);
                self.exhausted = false;
                Ok(Reset::Ready(obs))
            }
            Err(e) => {
                warn!(error = %e, "reset failed, keeping the previous episode");
                self.graph.restore(previous_graph);
                match previous_spec {
                    Some(spec) => self.assembler.declare(spec),
                    None => self.assembler.clear(),
                }
                Err(e)
            }
        }
    }

    /// Builds everything an episode needs; nothing is committed on failure
    /// except the graph configuration, which the caller restores.
    fn prepare(&mut self, choice: EpisodeChoice) -> Result<(Episode, Observation), EnvError> {
        let scene = choice.scene.as_str();
        let instance = choice.instance_id;

        self.graph.configure(scene, instance)?;
        let start_id = self.graph.index_of(scene, &choice.start)?;
        let annotations = self
            .graph
            .annotations()
            .ok_or_else(|| EnvError::config("viewpoint graph lost its configuration"))?;
        let goals = episode::goal_set(self.config.goal, self.dataset.as_ref(), annotations, instance)?;
        if goals.is_empty() {
            warn!(scene, instance, "episode has no goal viewpoints");
        }
        let max_difficulty = self.config.max_difficulty;
        let max_area = annotations
            .occurrences(instance)
            .filter(|(_, b)| b.difficulty <= max_difficulty)
            .map(|(_, b)| b.area())
            .max()
            .unwrap_or(0);

        let target = Arc::new(self.build_target(instance)?);
        let start = self.graph.lookup(scene, start_id)?;

        let (h, w, c) = start.image.dim();
        let (n, th, tw, tc) = target.dim();
        self.assembler.declare(ObservationSpec {
            scene_shape: [h, w, c],
            target_shape: [n, th, tw, tc],
        });
        let obs = self
            .assembler
            .assemble(start.image.clone(), Arc::clone(&target))?;

        let episode = Episode {
            id: Uuid::new_v4(),
            choice,
            start_id,
            goals,
            target,
            max_area,
        };
        Ok((episode, obs))
    }

    fn build_target(&mut self, instance: InstanceId) -> Result<ndarray::Array4<u8>, EnvError> {
        let candidates = self.dataset.target_candidates(instance)?;
        let picks = self.selector.pick_targets(&candidates);
        let images = picks
            .iter()
            .map(|t| self.dataset.load_target(t))
            .collect::<Result<Vec<_>, _>>()?;
        if images.is_empty() {
            warn!(instance, "no target images, using zero views");
        }
        self.compositor.compose_or_fallback(&images)
    }

    fn step_episode(
        &mut self,
        action: Action,
    ) -> Result<(Observation, f32, bool, StepInfo), EnvError> {
        let (Some(episode), Some(state)) = (self.episode.as_ref(), self.state) else {
            return Err(if self.exhausted {
                EnvError::config("step after the last episode: no episodes left")
            } else {
                EnvError::config("step called before reset")
            });
        };
        let scene = episode.choice.scene.as_str();

        let here = self.graph.lookup(scene, state.current)?;
        let (frame, moved) = match here.adjacency.get(action) {
            Some(next) => (self.graph.lookup(scene, next)?, true),
            None => (here, false),
        };
        let obs = self
            .assembler
            .assemble(frame.image.clone(), Arc::clone(&episode.target))?;

        let step_count = state.step_count + 1;
        let goal_reached = episode.goals.contains(&frame.name);
        let reward = self
            .config
            .reward
            .reward(goal_reached, frame.tracked_area(), episode.max_area);
        let termination = if goal_reached {
            Some(Termination::GoalReached)
        } else if step_count >= self.config.max_steps {
            Some(Termination::Truncated)
        } else {
            None
        };
        let done = termination.is_some();

        debug!(
            step = step_count,
            %action,
            viewpoint = %frame.name,
            moved,
            reward,
            done,
            "step"
        );

        let info = StepInfo {
            episode_id: episode.id,
            scene: episode.choice.scene.clone(),
            instance_id: episode.choice.instance_id,
            step: step_count,
            viewpoint: frame.name.clone(),
            moved,
            termination,
            auto_reset: None,
        };
        self.state = Some(NavigationState {
            current: frame.id,
            step_count,
        });
        Ok((obs, reward, done, info))
    }
}

impl<D: Dataset + ?Sized> Env for AvdEnv<D> {
    type Obs = Observation;
    type Act = Action;
    type Info = StepInfo;

    fn reset(&mut self) -> Result<Reset<Self::Obs>, EnvError> {
        self.reset_episode()
    }

    /// Moves along the edge for `act` if there is one, otherwise stays put.
    fn step(&mut self, act: Self::Act) -> Result<(Self::Obs, f32, bool, Self::Info), EnvError> {
        let (obs, reward, done, mut info) = self.step_episode(act)?;
        if !(done && self.config.reset_on_done) {
            return Ok((obs, reward, done, info));
        }
        match self.reset_episode() {
            Ok(Reset::Ready(next)) => {
                let episode_id = self
                    .episode
                    .as_ref()
                    .map(|e| e.id)
                    .unwrap_or_else(Uuid::nil);
                info.auto_reset = Some(AutoReset::Started { episode_id });
                Ok((next, reward, done, info))
            }
            Ok(Reset::Exhausted) => {
                info.auto_reset = Some(AutoReset::Exhausted);
                Ok((obs, reward, done, info))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    episode_id = %info.episode_id,
                    "auto-reset failed after a finished episode"
                );
                self.episode = None;
                self.state = None;
                info.auto_reset = Some(AutoReset::Failed {
                    error: e.to_string(),
                });
                Ok((obs, reward, done, info))
            }
        }
    }

    fn render(&self) -> Result<Option<RenderFrame>, EnvError> {
        let (Some(episode), Some(state)) = (self.episode.as_ref(), self.state) else {
            return Ok(None);
        };
        let Some(vp) = self.graph.annotations().and_then(|a| a.get(state.current)) else {
            return Ok(None);
        };
        Ok(Some(self.dataset.load_image(&episode.choice.scene, &vp.name)?))
    }

    fn close(&mut self) -> Result<(), EnvError> {
        debug!("closing navigation environment");
        self.episode = None;
        self.state = None;
        self.graph.clear();
        self.assembler.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GoalStrategy, InstanceSelection, SceneSelection, SelectionMode};
    use crate::dataset::{Image, MemoryDataset, MemoryScene};

    fn dataset() -> MemoryDataset {
        let scene = MemoryScene::new()
            .present(&[1, 2])
            .viewpoint("A", &[], &[(Action::Forward, "B")])
            .viewpoint("B", &[], &[(Action::Backward, "A")])
            .start_positions(1, &["A"])
            .start_positions(2, &["missing"])
            .destinations(1, &["B"])
            .destinations(2, &["B"]);
        MemoryDataset::new()
            .instance(1, "mug")
            .instance(2, "bowl")
            .scene("S", scene)
            .targets(1, vec![vec![Image::zeros((2, 2, 3))]])
    }

    fn sequential() -> AvdEnv<MemoryDataset> {
        let config = EnvConfig {
            scenes: SceneSelection::Single("S".into()),
            instances: InstanceSelection::All,
            selection: SelectionMode::Sequential,
            goal: GoalStrategy::PrecomputedDestinations,
            target_shape: [2, 2, 3],
            ..EnvConfig::default()
        };
        AvdEnv::new(Arc::new(dataset()), config).unwrap()
    }

    #[test]
    fn failed_reset_keeps_the_running_episode() {
        let mut env = sequential();
        env.reset().unwrap();
        let running = env.episode().unwrap().id;
        let spec = *env.observation_spec().unwrap();

        let err = env.reset().err().unwrap();
        assert!(matches!(err, EnvError::NotFound { what: "viewpoint", .. }));
        assert_eq!(env.episode().unwrap().id, running);
        assert_eq!(env.observation_spec(), Some(&spec));

        let (_, reward, done, info) = env.step(Action::Forward).unwrap();
        assert_eq!((reward, done), (1.0, true));
        assert_eq!(info.episode_id, running);

        // the failed combination was consumed
        assert!(env.reset().unwrap().is_exhausted());
    }

    #[test]
    fn failed_auto_reset_still_reports_the_finished_step() {
        let mut env = sequential();
        env.config.reset_on_done = true;
        env.reset().unwrap();
        let finished = env.episode().unwrap().id;

        let (obs, reward, done, info) = env.step(Action::Forward).unwrap();
        assert_eq!((reward, done), (1.0, true));
        assert!(info.goal_reached());
        assert_eq!(info.episode_id, finished);
        assert_eq!(info.viewpoint, "B");
        assert!(matches!(
            &info.auto_reset,
            Some(AutoReset::Failed { error }) if error.contains("missing")
        ));
        assert_eq!(obs.scene.dim(), (8, 8, 3));

        // the finished episode is not resumed
        assert!(env.episode().is_none());
        assert!(env.state().is_none());
        assert!(matches!(
            env.step(Action::Backward),
            Err(EnvError::Configuration(_))
        ));
        assert!(env.reset().unwrap().is_exhausted());
    }

    #[test]
    fn num_actions_matches_action_ids() {
        let env = sequential();
        assert_eq!(env.num_actions(), 4);
        assert!(Action::try_from(env.num_actions()).is_err());
    }
}
