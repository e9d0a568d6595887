use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, warn};

use super::{EpisodeChoice, EpisodeSelector, Selection};
use crate::config::ResolvedSelection;
use crate::dataset::{Dataset, InstanceId, TargetRef};
use crate::env::EnvError;

#[derive(Clone, Debug)]
struct SceneOptions {
    scene: String,
    /// Eligible instances with their recorded start frames (never empty).
    instances: Vec<(InstanceId, Vec<String>)>,
}

/// Uniform sampling of scene, then instance, then start frame.
///
/// An instance is eligible in a scene when it is present there, selected, has
/// at least one target image and at least one recorded start frame.
#[derive(Debug)]
pub struct RandomSelector {
    scenes: Vec<SceneOptions>,
    rng: StdRng,
}

impl RandomSelector {
    pub fn new<D: Dataset + ?Sized>(
        resolved: &ResolvedSelection,
        dataset: &D,
        rng: StdRng,
    ) -> Result<Self, EnvError> {
        let mut has_targets: HashMap<InstanceId, bool> = HashMap::new();
        let mut scenes = Vec::with_capacity(resolved.scenes.len());

        for scene in &resolved.scenes {
            let starts = dataset.initial_positions(scene)?;
            let mut instances = Vec::new();
            for id in dataset.present_instances(scene)? {
                if !resolved.instances.contains(&id) {
                    continue;
                }
                let targets = match has_targets.get(&id) {
                    Some(t) => *t,
                    None => {
                        let t = dataset
                            .target_candidates(id)?
                            .iter()
                            .any(|view| !view.is_empty());
                        has_targets.insert(id, t);
                        t
                    }
                };
                if !targets {
                    warn!(scene = %scene, instance = id, "instance has no target images, skipped");
                    continue;
                }
                match starts.get(&id) {
                    Some(s) if !s.is_empty() => instances.push((id, s.clone())),
                    _ => warn!(scene = %scene, instance = id, "instance has no start positions, skipped"),
                }
            }
            if instances.is_empty() {
                return Err(EnvError::config(format!(
                    "scene {scene} has no selected instance with target images and start positions"
                )));
            }
            debug!(scene = %scene, eligible = instances.len(), "random selector scene");
            scenes.push(SceneOptions {
                scene: scene.clone(),
                instances,
            });
        }

        if scenes.is_empty() {
            return Err(EnvError::config("no scenes selected"));
        }
        Ok(Self { scenes, rng })
    }

    /// Instances that can be drawn in `scene`.
    pub fn eligible(&self, scene: &str) -> Vec<InstanceId> {
        self.scenes
            .iter()
            .find(|s| s.scene == scene)
            .map(|s| s.instances.iter().map(|(id, _)| *id).collect())
            .unwrap_or_default()
    }
}

impl EpisodeSelector for RandomSelector {
    fn select(&mut self) -> Result<Selection, EnvError> {
        let empty = || EnvError::config("random selector has nothing to sample");
        let options = self.scenes.choose(&mut self.rng).ok_or_else(empty)?;
        let (instance_id, starts) = options.instances.choose(&mut self.rng).ok_or_else(empty)?;
        let start = starts.choose(&mut self.rng).ok_or_else(empty)?;
        Ok(Selection::Advanced(EpisodeChoice {
            scene: options.scene.clone(),
            instance_id: *instance_id,
            start: start.clone(),
        }))
    }

    fn pick_targets(&mut self, candidates: &[Vec<TargetRef>]) -> Vec<TargetRef> {
        candidates
            .iter()
            .filter_map(|view| view.choose(&mut self.rng).cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{Image, InstanceNames, MemoryDataset, MemoryScene};
    use rand::SeedableRng;

    fn resolved(scenes: &[&str], instances: &[InstanceId]) -> ResolvedSelection {
        ResolvedSelection {
            scenes: scenes.iter().map(|s| s.to_string()).collect(),
            instances: instances.to_vec(),
            names: InstanceNames::default(),
        }
    }

    fn dataset() -> MemoryDataset {
        let view = || vec![vec![Image::zeros((2, 2, 3))]];
        MemoryDataset::new()
            .scene(
                "S1",
                MemoryScene::new()
                    .present(&[1, 2, 3, 4])
                    .viewpoint("a", &[], &[])
                    .viewpoint("b", &[], &[])
                    .start_positions(1, &["a", "b"])
                    .start_positions(2, &["b"])
                    .start_positions(3, &["a"])
                    .start_positions(4, &["a"]),
            )
            .scene(
                "S2",
                MemoryScene::new()
                    .present(&[2, 5])
                    .viewpoint("x", &[], &[])
                    .start_positions(2, &["x"])
                    .start_positions(5, &["x"]),
            )
            .targets(1, view())
            .targets(2, view())
            .targets(4, view())
            .targets(5, view())
    }

    #[test]
    fn samples_only_from_the_triple_intersection() {
        let ds = dataset();
        // 3 lacks targets, 5 is not selected, 4 is not selected
        let mut sel = RandomSelector::new(
            &resolved(&["S1", "S2"], &[1, 2, 3]),
            &ds,
            StdRng::seed_from_u64(11),
        )
        .unwrap();
        assert_eq!(sel.eligible("S1"), vec![1, 2]);
        assert_eq!(sel.eligible("S2"), vec![2]);

        let mut seen_scenes = std::collections::HashSet::new();
        for _ in 0..500 {
            let Selection::Advanced(choice) = sel.select().unwrap() else {
                panic!("random selector never exhausts");
            };
            seen_scenes.insert(choice.scene.clone());
            let allowed = sel.eligible(&choice.scene);
            assert!(allowed.contains(&choice.instance_id), "{choice:?}");
            let starts = ds.initial_positions(&choice.scene).unwrap();
            assert!(starts[&choice.instance_id].contains(&choice.start));
        }
        assert_eq!(seen_scenes.len(), 2);
    }

    #[test]
    fn same_seed_same_sequence() {
        let ds = dataset();
        let sel = || {
            RandomSelector::new(&resolved(&["S1", "S2"], &[1, 2]), &ds, StdRng::seed_from_u64(5))
                .unwrap()
        };
        let (mut a, mut b) = (sel(), sel());
        for _ in 0..20 {
            assert_eq!(a.select().unwrap(), b.select().unwrap());
        }
    }

    #[test]
    fn scene_without_eligible_instance_is_rejected_eagerly() {
        let ds = dataset();
        let err = RandomSelector::new(&resolved(&["S1", "S2"], &[1]), &ds, StdRng::seed_from_u64(1))
            .unwrap_err();
        assert!(matches!(err, EnvError::Configuration(msg) if msg.contains("S2")));
    }

    #[test]
    fn view_types_without_candidates_do_not_count_as_targets() {
        let ds = dataset().targets(3, vec![vec![], vec![]]);
        let sel = RandomSelector::new(&resolved(&["S1"], &[1, 3]), &ds, StdRng::seed_from_u64(4))
            .unwrap();
        assert_eq!(sel.eligible("S1"), vec![1]);
    }

    #[test]
    fn picks_one_candidate_per_view() {
        let ds = dataset();
        let mut sel =
            RandomSelector::new(&resolved(&["S1"], &[1]), &ds, StdRng::seed_from_u64(2)).unwrap();
        let candidates = vec![
            vec![TargetRef::new("v0/a"), TargetRef::new("v0/b")],
            vec![],
            vec![TargetRef::new("v2/a")],
        ];
        let picked = sel.pick_targets(&candidates);
        assert_eq!(picked.len(), 2);
        assert!(candidates[0].contains(&picked[0]));
        assert_eq!(picked[1], TargetRef::new("v2/a"));
    }
}
