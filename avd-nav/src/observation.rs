use std::sync::Arc;

use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::dataset::Image;
use crate::env::EnvError;

/// What the agent sees each step: the current scene image and the episode's target views.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub scene: Image,
    pub target: Arc<Array4<u8>>,
}

impl Observation {
    pub fn spec(&self) -> ObservationSpec {
        let (h, w, c) = self.scene.dim();
        let (n, th, tw, tc) = self.target.dim();
        ObservationSpec {
            scene_shape: [h, w, c],
            target_shape: [n, th, tw, tc],
        }
    }
}

/// Observation shapes declared for the current episode.
///
/// The target view count depends on the chosen instance, so a new spec is
/// declared at every reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationSpec {
    pub scene_shape: [usize; 3],
    pub target_shape: [usize; 4],
}

/// Packages observations and checks them against the declared spec.
#[derive(Clone, Debug, Default)]
pub struct ObservationAssembler {
    spec: Option<ObservationSpec>,
}

impl ObservationAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, spec: ObservationSpec) {
        self.spec = Some(spec);
    }

    pub fn spec(&self) -> Option<&ObservationSpec> {
        self.spec.as_ref()
    }

    pub fn clear(&mut self) {
        self.spec = None;
    }

    pub fn assemble(
        &self,
        scene: Image,
        target: Arc<Array4<u8>>,
    ) -> Result<Observation, EnvError> {
        let spec = self
            .spec
            .ok_or_else(|| EnvError::config("no observation spec declared before assemble"))?;
        let obs = Observation { scene, target };
        let actual = obs.spec();
        if actual.scene_shape != spec.scene_shape {
            return Err(EnvError::ShapeMismatch {
                field: "scene",
                expected: spec.scene_shape.to_vec(),
                actual: actual.scene_shape.to_vec(),
            });
        }
        if actual.target_shape != spec.target_shape {
            return Err(EnvError::ShapeMismatch {
                field: "target",
                expected: spec.target_shape.to_vec(),
                actual: actual.target_shape.to_vec(),
            });
        }
        Ok(obs)
    }
}
