use super::{Env, EnvError, Reset};

/// A batch of fully independent environments stepped in lockstep.
///
/// Each member owns its own navigation state, cursor and episode; nothing is
/// shared between them but the immutable dataset they read from.
pub struct VecEnv<E> {
    envs: Vec<E>,
}

impl<E: Env> VecEnv<E> {
    pub fn new<F>(make_env: F, num_envs: usize) -> Result<Self, EnvError>
    where
        F: Fn(usize) -> Result<E, EnvError>,
    {
        let envs = (0..num_envs).map(make_env).collect::<Result<_, _>>()?;
        Ok(Self { envs })
    }

    pub fn from_envs(envs: Vec<E>) -> Self {
        Self { envs }
    }

    pub fn len(&self) -> usize {
        self.envs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envs.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&E> {
        self.envs.get(index)
    }

    pub fn reset(&mut self) -> Result<Vec<Reset<E::Obs>>, EnvError> {
        self.envs.iter_mut().map(|env| env.reset()).collect()
    }

    pub fn step(
        &mut self,
        actions: Vec<E::Act>,
    ) -> Result<Vec<(E::Obs, f32, bool, E::Info)>, EnvError> {
        if actions.len() != self.envs.len() {
            return Err(EnvError::Configuration(format!(
                "got {} actions for {} environments",
                actions.len(),
                self.envs.len()
            )));
        }

        self.envs
            .iter_mut()
            .zip(actions)
            .map(|(env, action)| env.step(action))
            .collect()
    }

    pub fn close(&mut self) -> Result<(), EnvError> {
        for env in &mut self.envs {
            env.close()?;
        }
        Ok(())
    }
}
