//! Python bindings.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::sync::Arc;

use crate::decision::{ClassLabels, DecisionError, FourthDownCall, FourthDownDecider, FourthDownFeatures};
use crate::error::SimError;
use crate::service::{SimulationRequest, SimulationService, TeamRegistry};
use crate::strategy::StrategyKind;

fn to_py_err(err: SimError) -> PyErr {
    if err.is_client_error() {
        PyValueError::new_err(err.to_string())
    } else {
        PyRuntimeError::new_err(err.to_string())
    }
}

/// Python callable used as the fourth-down decision function.
///
/// Called with `(game_seconds_remaining, half_seconds_remaining, distance,
/// yardline, score_differential)`; may return a call name such as `"punt"` or
/// an integer class looked up in `labels`.
struct PyDecider {
    callable: Py<PyAny>,
    labels: ClassLabels,
}

impl FourthDownDecider for PyDecider {
    fn decide(&self, features: &FourthDownFeatures) -> Result<FourthDownCall, DecisionError> {
        Python::with_gil(|py| {
            let result = self
                .callable
                .call1(
                    py,
                    (
                        features.game_seconds_remaining,
                        features.half_seconds_remaining,
                        features.distance,
                        features.yardline,
                        features.score_differential,
                    ),
                )
                .map_err(|e| DecisionError::Failed(e.to_string()))?;
            let result = result.bind(py);

            if let Ok(name) = result.extract::<String>() {
                return name.parse();
            }
            match result.extract::<usize>() {
                Ok(class) => self.labels.label(class),
                Err(e) => Err(DecisionError::Failed(e.to_string())),
            }
        })
    }
}

/// Simulation service over a fixed set of teams.
#[pyclass(name = "SimulationService")]
pub struct PySimulationService {
    inner: SimulationService,
}

#[pymethods]
impl PySimulationService {
    #[new]
    #[pyo3(signature = (teams_json, decider = None, labels = "four_way"))]
    fn new(teams_json: &str, decider: Option<Py<PyAny>>, labels: &str) -> PyResult<Self> {
        let registry = TeamRegistry::from_json(teams_json).map_err(to_py_err)?;
        let mut inner = SimulationService::new(registry);
        if let Some(callable) = decider {
            let labels = match labels {
                "four_way" => ClassLabels::four_way(),
                "go_for_it" => ClassLabels::go_for_it(),
                other => {
                    return Err(PyValueError::new_err(format!(
                        "unknown label layout {other:?}, expected \"four_way\" or \"go_for_it\""
                    )))
                }
            };
            inner = inner.with_decider(Arc::new(PyDecider { callable, labels }));
        }
        Ok(PySimulationService { inner })
    }

    /// Run a batch and return the aggregate report as JSON.
    #[pyo3(signature = (home, away, num_simulations, strategy = "proto", seed = None, workers = None))]
    #[allow(clippy::too_many_arguments)]
    fn run(
        &self,
        py: Python<'_>,
        home: &str,
        away: &str,
        num_simulations: usize,
        strategy: &str,
        seed: Option<u64>,
        workers: Option<usize>,
    ) -> PyResult<String> {
        let request = SimulationRequest {
            home_team: home.to_string(),
            away_team: away.to_string(),
            num_simulations,
            strategy: strategy.to_string(),
            seed,
            workers,
        };
        let service = &self.inner;
        let report = py
            .allow_threads(|| service.handle(&request))
            .map_err(to_py_err)?;
        serde_json::to_string(&report).map_err(|e| PyRuntimeError::new_err(e.to_string()))
    }

    fn teams(&self) -> Vec<String> {
        self.inner.registry().codes().map(str::to_string).collect()
    }

    fn __repr__(&self) -> String {
        format!("SimulationService({} teams)", self.inner.registry().len())
    }
}

#[pymodule]
fn gridiron_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PySimulationService>()?;

    let codes: Vec<&str> = StrategyKind::all().iter().map(|k| k.code()).collect();
    m.add("STRATEGIES", codes)?;

    Ok(())
}
