use std::path::PathBuf;
use std::sync::Arc;

use avd_nav::env::RenderFrame;
use avd_nav::{Action, AvdEnv, EnvConfig, Env, FsDataset, Observation, Reset};
use ndarray::{ArrayBase, Data, Dimension};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyBytes, PyDict};
use tracing_subscriber::EnvFilter;

fn to_py_err(err: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// `(shape, bytes)` in row-major order; numpy.frombuffer(...).reshape(shape) restores it.
fn array_to_py<'py, S, Dm>(
    py: Python<'py>,
    array: &ArrayBase<S, Dm>,
) -> (Vec<usize>, Bound<'py, PyBytes>)
where
    S: Data<Elem = u8>,
    Dm: Dimension,
{
    let bytes: Vec<u8> = array.iter().copied().collect();
    (array.shape().to_vec(), PyBytes::new(py, &bytes))
}

fn observation_to_py<'py>(py: Python<'py>, obs: &Observation) -> PyResult<Bound<'py, PyDict>> {
    let dict = PyDict::new(py);
    dict.set_item("scene", array_to_py(py, &obs.scene))?;
    dict.set_item("target", array_to_py(py, obs.target.as_ref()))?;
    Ok(dict)
}

/// The navigation environment over an on-disk dataset.
#[pyclass(name = "AvdEnv", unsendable)]
struct PyAvdEnv {
    inner: AvdEnv<FsDataset>,
}

#[pymethods]
impl PyAvdEnv {
    /// `config` is TOML text; missing keys take their defaults.
    #[new]
    #[pyo3(signature = (root, target_root, config = None))]
    fn new(root: PathBuf, target_root: PathBuf, config: Option<&str>) -> PyResult<Self> {
        let config = match config {
            Some(text) => EnvConfig::from_toml_str(text).map_err(to_py_err)?,
            None => EnvConfig::default(),
        };
        let dataset = FsDataset::open(root, target_root).map_err(to_py_err)?;
        let inner = AvdEnv::new(Arc::new(dataset), config).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    #[getter]
    fn num_actions(&self) -> usize {
        self.inner.num_actions()
    }

    /// Observation dict of the new episode, or `None` once a sequential sweep is done.
    fn reset<'py>(&mut self, py: Python<'py>) -> PyResult<Option<Bound<'py, PyDict>>> {
        match self.inner.reset().map_err(to_py_err)? {
            Reset::Ready(obs) => Ok(Some(observation_to_py(py, &obs)?)),
            Reset::Exhausted => Ok(None),
        }
    }

    /// Returns `(obs, reward, done, info)`; `info` is a JSON string.
    fn step<'py>(
        &mut self,
        py: Python<'py>,
        action: usize,
    ) -> PyResult<(Bound<'py, PyDict>, f32, bool, String)> {
        let action = Action::try_from(action).map_err(to_py_err)?;
        let (obs, reward, done, info) = self.inner.step(action).map_err(to_py_err)?;
        let info = serde_json::to_string(&info).map_err(to_py_err)?;
        Ok((observation_to_py(py, &obs)?, reward, done, info))
    }

    fn render<'py>(&self, py: Python<'py>) -> PyResult<Option<(Vec<usize>, Bound<'py, PyBytes>)>> {
        let frame: Option<RenderFrame> = self.inner.render().map_err(to_py_err)?;
        Ok(frame.map(|f| array_to_py(py, &f)))
    }

    fn close(&mut self) -> PyResult<()> {
        self.inner.close().map_err(to_py_err)
    }

    /// JSON description of the running episode, or of exhaustion.
    fn current_episode_info(&self) -> PyResult<String> {
        let status = self.inner.current_episode_info().map_err(to_py_err)?;
        serde_json::to_string(&status).map_err(to_py_err)
    }
}

/// Installs a stderr tracing subscriber, e.g. `init_logging("avd_nav=debug")`.
#[pyfunction]
#[pyo3(signature = (filter = "info"))]
fn init_logging(filter: &str) -> PyResult<()> {
    let filter = EnvFilter::try_new(filter).map_err(to_py_err)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

/// The name of this function must match the lib.name in Cargo.toml
#[pymodule]
fn avd_gym(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyAvdEnv>()?;
    m.add_function(wrap_pyfunction!(init_logging, m)?)?;
    m.add("NUM_ACTIONS", Action::ALL.len())?;
    Ok(())
}
