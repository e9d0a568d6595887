#![allow(dead_code)]

use std::sync::Arc;

use avd_nav::dataset::{BoundingBox, Image, MemoryDataset, MemoryScene};
use avd_nav::{Action, AvdEnv, EnvConfig, GoalStrategy, InstanceSelection, SceneSelection};

pub const MUG: u32 = 1;
pub const BOWL: u32 = 2;

/// Frame `A` is painted 50 so tests can tell it apart from the black frames.
pub const A_PIXEL: u8 = 50;

/// A -> B -> C along `forward`, back along `backward`; D is unreachable.
///
/// The mug is visible at B (area 4) and C (area 16), plus a too-hard box at A.
/// It has one target view; the bowl has none.
pub fn corridor() -> MemoryDataset {
    corridor_with(&["A"], &["C"])
}

/// [`corridor`] with the mug's start frames and goal frames replaced.
pub fn corridor_with(mug_starts: &[&str], mug_goals: &[&str]) -> MemoryDataset {
    let scene = MemoryScene::new()
        .present(&[MUG, BOWL])
        .viewpoint(
            "A",
            &[BoundingBox::new(0, 0, 10, 10, MUG).with_difficulty(5)],
            &[(Action::Forward, "B")],
        )
        .viewpoint(
            "B",
            &[BoundingBox::new(0, 0, 2, 2, MUG)],
            &[(Action::Forward, "C"), (Action::Backward, "A")],
        )
        .viewpoint(
            "C",
            &[BoundingBox::new(0, 0, 4, 4, MUG), BoundingBox::new(4, 4, 6, 6, BOWL)],
            &[(Action::Backward, "B")],
        )
        .viewpoint("D", &[], &[])
        .image("A", Image::from_elem((8, 8, 3), A_PIXEL))
        .start_positions(MUG, mug_starts)
        .start_positions(BOWL, &["C"])
        .destinations(MUG, mug_goals)
        .destinations(BOWL, &["A"]);

    MemoryDataset::new()
        .instance(MUG, "mug")
        .instance(BOWL, "bowl")
        .scene("S1", scene)
        .targets(MUG, vec![vec![Image::from_elem((4, 4, 3), 255)]])
}

pub fn config() -> EnvConfig {
    EnvConfig {
        scenes: SceneSelection::Single("S1".into()),
        instances: InstanceSelection::Single(MUG),
        goal: GoalStrategy::PrecomputedDestinations,
        target_shape: [4, 4, 3],
        seed: Some(7),
        ..EnvConfig::default()
    }
}

pub fn sequential_config() -> EnvConfig {
    EnvConfig {
        instances: InstanceSelection::All,
        selection: avd_nav::SelectionMode::Sequential,
        ..config()
    }
}

pub fn env(config: EnvConfig) -> AvdEnv<MemoryDataset> {
    AvdEnv::new(Arc::new(corridor()), config).unwrap()
}
