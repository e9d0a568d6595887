use std::collections::BTreeSet;

use crate::config::GoalStrategy;
use crate::dataset::{Dataset, InstanceId, SceneAnnotations};
use crate::env::EnvError;

/// Frame names that end an episode for `instance` in the annotated scene.
pub fn goal_set<D: Dataset + ?Sized>(
    strategy: GoalStrategy,
    dataset: &D,
    annotations: &SceneAnnotations,
    instance: InstanceId,
) -> Result<BTreeSet<String>, EnvError> {
    let scene = annotations.scene();
    match strategy {
        GoalStrategy::PrecomputedDestinations => {
            let table = dataset.destinations(scene)?.ok_or_else(|| {
                EnvError::config(format!("scene {scene} has no destination table"))
            })?;
            let names = table.get(&instance).ok_or_else(|| {
                EnvError::not_found("destinations", format!("{scene}/{instance}"))
            })?;
            Ok(names.iter().cloned().collect())
        }
        GoalStrategy::TopKLargestBoxes { k } => Ok(top_k_largest(annotations, instance, k)),
    }
}

/// Frames of the `k` largest boxes of `instance`, ties broken by frame name.
fn top_k_largest(annotations: &SceneAnnotations, instance: InstanceId, k: usize) -> BTreeSet<String> {
    let mut ranked: Vec<(u64, &str)> = annotations
        .occurrences(instance)
        .map(|(vp, b)| (b.area(), vp.name.as_str()))
        .collect();
    ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    ranked
        .into_iter()
        .take(k)
        .map(|(_, name)| name.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{BoundingBox, MemoryDataset, MemoryScene};

    fn boxed(side: i64) -> BoundingBox {
        BoundingBox::new(0, 0, side, side, 1)
    }

    fn dataset() -> MemoryDataset {
        let mut scene = MemoryScene::new();
        for (name, side) in [("a", 1), ("b", 6), ("c", 3), ("d", 5), ("e", 2), ("f", 4), ("g", 7)] {
            scene = scene.viewpoint(name, &[boxed(side)], &[]);
        }
        scene = scene
            .viewpoint("h", &[BoundingBox::new(0, 0, 50, 50, 2)], &[])
            .destinations(1, &["a", "b"]);
        MemoryDataset::new().scene("S", scene).scene("T", MemoryScene::new())
    }

    #[test]
    fn top_k_takes_largest_boxes() {
        let ds = dataset();
        let ann = ds.annotations("S").unwrap();
        let goals = goal_set(GoalStrategy::TopKLargestBoxes { k: 5 }, &ds, &ann, 1).unwrap();
        let expected: BTreeSet<String> = ["g", "b", "d", "f", "c"].iter().map(|s| s.to_string()).collect();
        assert_eq!(goals, expected);
    }

    #[test]
    fn top_k_with_fewer_occurrences_takes_all() {
        let ds = dataset();
        let ann = ds.annotations("S").unwrap();
        let goals = goal_set(GoalStrategy::TopKLargestBoxes { k: 5 }, &ds, &ann, 2).unwrap();
        assert_eq!(goals.len(), 1);
        assert!(goals.contains("h"));
        assert!(goal_set(GoalStrategy::TopKLargestBoxes { k: 5 }, &ds, &ann, 3).unwrap().is_empty());
    }

    #[test]
    fn precomputed_destinations() {
        let ds = dataset();
        let ann = ds.annotations("S").unwrap();
        let goals = goal_set(GoalStrategy::PrecomputedDestinations, &ds, &ann, 1).unwrap();
        assert_eq!(goals.len(), 2);
        assert!(matches!(
            goal_set(GoalStrategy::PrecomputedDestinations, &ds, &ann, 2),
            Err(EnvError::NotFound { .. })
        ));

        let empty = ds.annotations("T").unwrap();
        assert!(matches!(
            goal_set(GoalStrategy::PrecomputedDestinations, &ds, &empty, 1),
            Err(EnvError::Configuration(_))
        ));
    }
}
