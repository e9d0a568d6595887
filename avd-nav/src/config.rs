//! Environment configuration.
//!
//! Selections are tagged enums rather than loosely typed arguments, and they are
//! resolved to concrete scene and instance lists once, when the environment is
//! built.
//!
//! ```toml
//! selection = "sequential"
//! max_steps = 200
//! scenes = { list = ["Home_001_1", "Home_002_1"] }
//! instances = "all"
//!
//! [goal.top_k_largest_boxes]
//! k = 5
//! ```

use std::path::Path;

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::{Dataset, InstanceId, InstanceNames};
use crate::env::{EnvError, RewardStrategy};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SceneSelection {
    Single(String),
    List(Vec<String>),
    /// `n` distinct scenes drawn at random from the dataset.
    RandomCount(usize),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceSelection {
    /// Every instance present in at least one selected scene.
    All,
    Single(InstanceId),
    /// `n` distinct instances drawn from those present in the selected scenes.
    RandomCount(usize),
    List(Vec<InstanceId>),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Uniformly sampled episodes, never exhausts.
    Random,
    /// Every scene x instance x start position exactly once, then exhausted.
    Sequential,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoalStrategy {
    /// Goal frames read from the scene's destination table.
    PrecomputedDestinations,
    /// The frames holding the `k` largest boxes of the target.
    TopKLargestBoxes { k: usize },
}

impl Default for GoalStrategy {
    fn default() -> Self {
        GoalStrategy::TopKLargestBoxes { k: 5 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvConfig {
    pub scenes: SceneSelection,
    pub instances: InstanceSelection,
    pub selection: SelectionMode,
    pub goal: GoalStrategy,
    pub reward: RewardStrategy,
    pub max_steps: u32,
    /// Start the next episode inside `step` as soon as one ends.
    pub reset_on_done: bool,
    /// `(height, width, channels)` of each composited target view.
    pub target_shape: [usize; 3],
    /// Number of zero views used when an instance has no target images.
    pub fallback_target_count: usize,
    /// Boxes above this difficulty level are ignored.
    pub max_difficulty: u8,
    pub seed: Option<u64>,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            scenes: SceneSelection::RandomCount(1),
            instances: InstanceSelection::All,
            selection: SelectionMode::Random,
            goal: GoalStrategy::default(),
            reward: RewardStrategy::default(),
            max_steps: 500,
            reset_on_done: false,
            target_shape: [200, 200, 3],
            fallback_target_count: 2,
            max_difficulty: 4,
            seed: None,
        }
    }
}

impl EnvConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, EnvError> {
        let config: EnvConfig =
            toml::from_str(text).map_err(|e| EnvError::config(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EnvError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            EnvError::config(format!("cannot read config {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<(), EnvError> {
        if self.max_steps == 0 {
            return Err(EnvError::config("max_steps must be at least 1"));
        }
        if self.target_shape.contains(&0) {
            return Err(EnvError::config(format!(
                "target_shape has a zero dimension: {:?}",
                self.target_shape
            )));
        }
        if self.fallback_target_count == 0 {
            return Err(EnvError::config("fallback_target_count must be at least 1"));
        }
        if let GoalStrategy::TopKLargestBoxes { k: 0 } = self.goal {
            return Err(EnvError::config("top_k_largest_boxes needs k >= 1"));
        }
        self.reward.validate()
    }
}

/// Concrete scenes and instances a run draws episodes from.
#[derive(Clone, Debug)]
pub struct ResolvedSelection {
    pub scenes: Vec<String>,
    pub instances: Vec<InstanceId>,
    pub names: InstanceNames,
}

impl ResolvedSelection {
    pub fn resolve<D, R>(config: &EnvConfig, dataset: &D, rng: &mut R) -> Result<Self, EnvError>
    where
        D: Dataset + ?Sized,
        R: Rng + ?Sized,
    {
        let available = dataset.scenes()?;
        let scenes = config.scenes.resolve(&available, rng)?;

        let names = dataset.instance_names()?;
        let mut present = Vec::new();
        for scene in &scenes {
            for id in dataset.present_instances(scene)? {
                if !present.contains(&id) {
                    present.push(id);
                }
            }
        }
        let instances = config.instances.resolve(&present, &names, rng)?;

        debug!(?scenes, ?instances, "resolved selection");
        Ok(Self {
            scenes,
            instances,
            names,
        })
    }
}

impl SceneSelection {
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        available: &[String],
        rng: &mut R,
    ) -> Result<Vec<String>, EnvError> {
        let known = |name: &String| -> Result<String, EnvError> {
            if available.contains(name) {
                Ok(name.clone())
            } else {
                Err(EnvError::not_found("scene", name.as_str()))
            }
        };
        match self {
            SceneSelection::Single(name) => Ok(vec![known(name)?]),
            SceneSelection::List(names) => {
                if names.is_empty() {
                    return Err(EnvError::config("scene list is empty"));
                }
                let mut out: Vec<String> = Vec::with_capacity(names.len());
                for name in names {
                    if out.contains(name) {
                        return Err(EnvError::config(format!("scene {name} listed twice")));
                    }
                    out.push(known(name)?);
                }
                Ok(out)
            }
            SceneSelection::RandomCount(n) => sample(available, *n, "scenes", rng),
        }
    }
}

impl InstanceSelection {
    /// `present` is the ordered union of instances present in the selected scenes.
    pub fn resolve<R: Rng + ?Sized>(
        &self,
        present: &[InstanceId],
        names: &InstanceNames,
        rng: &mut R,
    ) -> Result<Vec<InstanceId>, EnvError> {
        let known = |id: InstanceId| -> Result<InstanceId, EnvError> {
            if names.contains(id) {
                Ok(id)
            } else {
                Err(EnvError::not_found("instance", id.to_string()))
            }
        };
        match self {
            InstanceSelection::All => {
                if present.is_empty() {
                    return Err(EnvError::config("selected scenes contain no instances"));
                }
                Ok(present.to_vec())
            }
            InstanceSelection::Single(id) => Ok(vec![known(*id)?]),
            InstanceSelection::RandomCount(n) => sample(present, *n, "instances", rng),
            InstanceSelection::List(ids) => {
                if ids.is_empty() {
                    return Err(EnvError::config("instance list is empty"));
                }
                let mut out = Vec::with_capacity(ids.len());
                for id in ids {
                    if !out.contains(id) {
                        out.push(known(*id)?);
                    }
                }
                Ok(out)
            }
        }
    }
}

fn sample<T: Clone, R: Rng + ?Sized>(
    pool: &[T],
    n: usize,
    what: &str,
    rng: &mut R,
) -> Result<Vec<T>, EnvError> {
    if n == 0 {
        return Err(EnvError::config(format!("random count of {what} must be at least 1")));
    }
    if n > pool.len() {
        return Err(EnvError::config(format!(
            "asked for {n} random {what}, only {} available",
            pool.len()
        )));
    }
    Ok(pool.choose_multiple(rng, n).cloned().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn scenes() -> Vec<String> {
        ["A", "B", "C"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_tagged_selections_from_toml() {
        let config = EnvConfig::from_toml_str(
            r#"
            selection = "sequential"
            max_steps = 20
            reset_on_done = true
            scenes = { list = ["Home_001_1", "Home_002_1"] }
            instances = { random_count = 3 }

            [goal.top_k_largest_boxes]
            k = 3

            [reward.box_area_shaped]
            scale = 0.1
            goal_reward = 1.0
            "#,
        )
        .unwrap();

        assert_eq!(config.selection, SelectionMode::Sequential);
        assert_eq!(
            config.scenes,
            SceneSelection::List(vec!["Home_001_1".into(), "Home_002_1".into()])
        );
        assert_eq!(config.instances, InstanceSelection::RandomCount(3));
        assert_eq!(config.goal, GoalStrategy::TopKLargestBoxes { k: 3 });
        assert!(matches!(config.reward, RewardStrategy::BoxAreaShaped { .. }));
        assert_eq!(config.target_shape, [200, 200, 3]);
    }

    #[test]
    fn unit_variants_parse_from_strings() {
        let config = EnvConfig::from_toml_str(
            r#"
            instances = "all"
            goal = "precomputed_destinations"
            "#,
        )
        .unwrap();
        assert_eq!(config.instances, InstanceSelection::All);
        assert_eq!(config.goal, GoalStrategy::PrecomputedDestinations);
    }

    #[test]
    fn validation_rejects_degenerate_values() {
        assert!(EnvConfig::from_toml_str("max_steps = 0").is_err());
        assert!(EnvConfig::from_toml_str("target_shape = [0, 10, 3]").is_err());
        assert!(EnvConfig::from_toml_str("[goal.top_k_largest_boxes]\nk = 0").is_err());
        assert!(EnvConfig::from_toml_str("max_steps = \"many\"").is_err());
    }

    #[test]
    fn scene_selection_resolution() {
        let mut rng = StdRng::seed_from_u64(7);
        let available = scenes();

        assert_eq!(
            SceneSelection::Single("B".into())
                .resolve(&available, &mut rng)
                .unwrap(),
            vec!["B"]
        );
        assert!(matches!(
            SceneSelection::Single("Z".into()).resolve(&available, &mut rng),
            Err(EnvError::NotFound { what: "scene", .. })
        ));
        assert!(SceneSelection::List(vec![]).resolve(&available, &mut rng).is_err());
        assert!(
            SceneSelection::List(vec!["A".into(), "A".into()])
                .resolve(&available, &mut rng)
                .is_err()
        );

        let picked = SceneSelection::RandomCount(2)
            .resolve(&available, &mut rng)
            .unwrap();
        assert_eq!(picked.len(), 2);
        assert_ne!(picked[0], picked[1]);
        assert!(picked.iter().all(|s| available.contains(s)));

        assert!(SceneSelection::RandomCount(0).resolve(&available, &mut rng).is_err());
        assert!(SceneSelection::RandomCount(4).resolve(&available, &mut rng).is_err());
    }

    #[test]
    fn instance_selection_resolution() {
        let mut rng = StdRng::seed_from_u64(3);
        let names = InstanceNames::from_pairs([(1, "a"), (2, "b"), (3, "c"), (9, "z")]).unwrap();
        let present = [3, 1, 2];

        assert_eq!(
            InstanceSelection::All
                .resolve(&present, &names, &mut rng)
                .unwrap(),
            vec![3, 1, 2]
        );
        assert_eq!(
            InstanceSelection::Single(9)
                .resolve(&present, &names, &mut rng)
                .unwrap(),
            vec![9]
        );
        assert!(
            InstanceSelection::Single(4)
                .resolve(&present, &names, &mut rng)
                .is_err()
        );
        assert_eq!(
            InstanceSelection::List(vec![2, 2, 1])
                .resolve(&present, &names, &mut rng)
                .unwrap(),
            vec![2, 1]
        );
        let random = InstanceSelection::RandomCount(2)
            .resolve(&present, &names, &mut rng)
            .unwrap();
        assert_eq!(random.len(), 2);
        assert!(random.iter().all(|id| present.contains(id)));
        assert!(InstanceSelection::All.resolve(&[], &names, &mut rng).is_err());
    }
}
