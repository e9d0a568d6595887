use crate::env::errors::EnvError;
use crate::env::types::Reset;

/// Frame handed back by [`Env::render`].
pub type RenderFrame = ndarray::Array3<u8>;

pub trait Env: Send {
    type Obs: Send + Clone + 'static;
    type Act: Send + Clone + 'static;
    type Info: Send + Clone + 'static;

    /// Starts the next episode, or reports that there are none left.
    fn reset(&mut self) -> Result<Reset<Self::Obs>, EnvError>;

    fn step(&mut self, act: Self::Act) -> Result<(Self::Obs, f32, bool, Self::Info), EnvError>;

    fn render(&self) -> Result<Option<RenderFrame>, EnvError> {
        Ok(None)
    }

    fn close(&mut self) -> Result<(), EnvError>;
}
