//! Calibration problem definition and implementation

use std::cell::RefCell;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use argmin::core::{CostFunction, Error, Gradient};
use epistep_core::{ParameterSet, SimulationEngine, Trajectory};
use finitediff::FiniteDiff;
use ndarray::Array1;
use tracing::debug;

use crate::adapter::SimulationAdapter;
use crate::alignment::{AlignOptions, AlignedSeries, Resample, align};
use crate::error::{CalibrationError, Result, TrajectoryRole};
use crate::metric::{ErrorScore, MetricKind, score};
use crate::types::{BestPoint, CalibrationParameter};

/// Metric minimised by every solver. The caller's metric is only used for
/// reporting the final score.
pub const OBJECTIVE_METRIC: MetricKind = MetricKind::Mse;

/// Closest a logistic-reparameterised start may sit to a bound, as a
/// fraction of the box width
const EDGE_MARGIN: f64 = 1e-6;

/// Evaluation and wall-clock limits for one solver run
#[derive(Debug, Clone, Copy, Default)]
struct Budget {
    max_evaluations: Option<u64>,
    deadline: Option<Instant>,
    /// Evaluation count when the run started
    baseline: u64,
}

/// Fit free parameters of a coarse-step simulation to a fixed reference.
///
/// The objective for a trial vector merges it onto the adapter's base
/// parameters, simulates at `time_step`, aligns the result against the
/// reference with normalisation on, and returns the MSE of the proportions.
/// Evaluations do not influence each other; the best-point record and the
/// evaluation counter are write-only bookkeeping.
///
/// # Example
///
/// ```rust,ignore
/// use epistep_calibration::{CalibrationParameter, CalibrationProblem, SimulationAdapter};
///
/// let adapter = SimulationAdapter::new(&engine, &model, &initial, &base);
/// let problem = CalibrationProblem::new(
///     adapter,
///     &reference,
///     &["S", "I", "R"],
///     vec![CalibrationParameter::new("beta", 0.05, 1.0)],
///     1.0,
///     120.0,
/// )?;
/// ```
pub struct CalibrationProblem<'a, E: SimulationEngine> {
    adapter: SimulationAdapter<'a, E>,

    /// Reference trajectory, never modified
    reference: &'a Trajectory,

    compartments: Vec<String>,

    /// Parameters to calibrate with their bounds
    parameters: Vec<CalibrationParameter>,

    /// Starting values in natural space
    initial: Vec<f64>,

    time_step: f64,
    duration: f64,
    resample: Resample,

    best: Mutex<Option<BestPoint>>,
    evaluations: AtomicU64,
    budget: Mutex<Budget>,
}

impl<'a, E: SimulationEngine> CalibrationProblem<'a, E> {
    /// Create a new calibration problem.
    ///
    /// Everything that can be checked without simulating is checked here,
    /// so a malformed problem never reaches the engine.
    ///
    /// # Errors
    ///
    /// - `EmptyInput` if no parameters or compartments are given
    /// - `UnknownParameter` if a free parameter is not in the base set
    /// - `Bounds` for non-finite or inverted bounds, a start outside its
    ///   bounds, or a parameter listed twice
    /// - `InvalidStep` for a non-positive step size or duration
    /// - `Schema` if the reference lacks a requested compartment
    pub fn new<S: AsRef<str>>(
        adapter: SimulationAdapter<'a, E>,
        reference: &'a Trajectory,
        compartments: &[S],
        parameters: Vec<CalibrationParameter>,
        time_step: f64,
        duration: f64,
    ) -> Result<Self> {
        if parameters.is_empty() {
            return Err(CalibrationError::EmptyInput("no calibration parameters"));
        }
        if compartments.is_empty() {
            return Err(CalibrationError::EmptyInput("no compartments to compare"));
        }

        let base = adapter.base_parameters();
        let mut initial = Vec::with_capacity(parameters.len());
        for (i, param) in parameters.iter().enumerate() {
            if !base.contains(&param.id) {
                return Err(CalibrationError::UnknownParameter {
                    id: param.id.clone(),
                    available: base.names().collect::<Vec<_>>().join(", "),
                });
            }
            if parameters[..i].iter().any(|p| p.id == param.id) {
                return Err(CalibrationError::Bounds {
                    parameter: param.id.clone(),
                    reason: "declared more than once".to_string(),
                });
            }
            let start = param.initial_value(base)?;
            param.validate(start)?;
            initial.push(start);
        }

        for (what, value) in [("time step", time_step), ("duration", duration)] {
            if !(value.is_finite() && value > 0.0) {
                return Err(CalibrationError::InvalidStep { what, value });
            }
        }

        let compartments: Vec<String> = compartments
            .iter()
            .map(|c| c.as_ref().to_string())
            .collect();
        if let Some(missing) = compartments
            .iter()
            .find(|c| reference.compartment_index(c).is_none())
        {
            return Err(CalibrationError::Schema {
                compartment: missing.clone(),
                role: TrajectoryRole::Reference,
            });
        }

        Ok(Self {
            adapter,
            reference,
            compartments,
            parameters,
            initial,
            time_step,
            duration,
            resample: Resample::None,
            best: Mutex::new(None),
            evaluations: AtomicU64::new(0),
            budget: Mutex::new(Budget::default()),
        })
    }

    /// Interpolate candidates onto the reference grid instead of inner-joining
    pub fn with_resample(mut self, resample: Resample) -> Self {
        self.resample = resample;
        self
    }

    /// Get the number of parameters being calibrated
    pub fn num_parameters(&self) -> usize {
        self.parameters.len()
    }

    /// Get parameter names in order
    pub fn parameter_names(&self) -> Vec<String> {
        self.parameters.iter().map(|p| p.id.clone()).collect()
    }

    /// Get initial parameter values
    pub fn initial_parameters(&self) -> Vec<f64> {
        self.initial.clone()
    }

    /// Get parameter bounds as (min, max) tuples
    pub fn parameter_bounds(&self) -> Vec<(f64, f64)> {
        self.parameters
            .iter()
            .map(|p| (p.min_bound, p.max_bound))
            .collect()
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    /// Best point evaluated so far, if any evaluation succeeded
    pub fn best_point(&self) -> Option<BestPoint> {
        self.best
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Number of objective evaluations performed so far
    pub fn evaluations(&self) -> u64 {
        self.evaluations.load(Ordering::Relaxed)
    }

    /// Limit the evaluations and wall-clock time available from now on.
    ///
    /// Once either is spent, [`objective`](Self::objective) fails with
    /// [`CalibrationError::BudgetExhausted`] without simulating.
    pub fn set_budget(&self, max_evaluations: Option<u64>, timeout: Option<Duration>) {
        let budget = Budget {
            max_evaluations,
            deadline: timeout.map(|t| Instant::now() + t),
            baseline: self.evaluations(),
        };
        *self
            .budget
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = budget;
    }

    /// Objective (MSE on proportions) at natural-space `values`
    pub fn objective(&self, values: &[f64]) -> Result<f64> {
        let clamped = self.prepare(values)?;
        self.charge()?;
        let objective = score(&self.aligned(&clamped)?, OBJECTIVE_METRIC);

        if !objective.is_finite() {
            return Err(CalibrationError::NonFiniteObjective {
                value: objective,
                parameters: clamped,
            });
        }

        debug!(parameters = ?clamped, objective, "objective evaluated");
        self.record(&clamped, objective);
        Ok(objective)
    }

    /// Objective and reporting score at natural-space `values`, from one run
    pub fn report(&self, values: &[f64], metric: MetricKind) -> Result<(f64, ErrorScore)> {
        let clamped = self.prepare(values)?;
        let aligned = self.aligned(&clamped)?;
        Ok((score(&aligned, OBJECTIVE_METRIC), score(&aligned, metric)))
    }

    /// Map natural-space values into the unbounded space seen by L-BFGS
    pub fn to_unbounded(&self, values: &[f64]) -> Vec<f64> {
        values
            .iter()
            .zip(&self.parameters)
            .map(|(&x, param)| {
                let span = param.span();
                if span <= 0.0 {
                    return 0.0;
                }
                let frac = ((x - param.min_bound) / span).clamp(EDGE_MARGIN, 1.0 - EDGE_MARGIN);
                (frac / (1.0 - frac)).ln()
            })
            .collect()
    }

    /// Map unbounded values back into the parameter box
    pub fn from_unbounded(&self, z: &[f64]) -> Vec<f64> {
        z.iter()
            .zip(&self.parameters)
            .map(|(&z, param)| param.min_bound + param.span() / (1.0 + (-z).exp()))
            .collect()
    }

    /// Validate parameter vector length and clamp into bounds.
    ///
    /// Some optimization algorithms (like Nelder-Mead) explore outside the
    /// bounds; the simulation only ever sees clamped values.
    fn prepare(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.len() != self.parameters.len() {
            return Err(CalibrationError::Optimizer(format!(
                "Expected {} parameters, got {}",
                self.parameters.len(),
                values.len()
            )));
        }
        Ok(values
            .iter()
            .zip(&self.parameters)
            .map(|(value, param)| param.clamp(*value))
            .collect())
    }

    /// Count one evaluation against the budget
    fn charge(&self) -> Result<()> {
        let budget = *self
            .budget
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let used = self.evaluations() - budget.baseline;

        if budget.max_evaluations.is_some_and(|max| used >= max) {
            return Err(CalibrationError::BudgetExhausted {
                what: "evaluation",
                evaluations: used,
            });
        }
        if budget.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(CalibrationError::BudgetExhausted {
                what: "time",
                evaluations: used,
            });
        }
        self.evaluations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    fn aligned(&self, clamped: &[f64]) -> Result<AlignedSeries> {
        let overrides: ParameterSet = self
            .parameters
            .iter()
            .map(|p| p.id.clone())
            .zip(clamped.iter().copied())
            .collect();

        let candidate = self.adapter.run(&overrides, self.time_step, self.duration)?;
        let options = AlignOptions::default().with_resample(self.resample);
        let aligned = align(self.reference, &candidate, &self.compartments, &options)?;
        if aligned.is_empty() {
            return Err(CalibrationError::NoOverlap);
        }
        Ok(aligned)
    }

    fn record(&self, values: &[f64], objective: f64) {
        let mut best = self
            .best
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if best.as_ref().is_none_or(|b| objective < b.objective) {
            *best = Some(BestPoint {
                parameter_names: self.parameter_names(),
                values: values.to_vec(),
                objective,
            });
        }
    }
}

/// Natural-space cost for gradient-free solvers (Nelder-Mead, particle swarm)
impl<E: SimulationEngine> CostFunction for &CalibrationProblem<'_, E> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param_values: &Self::Param) -> std::result::Result<Self::Output, Error> {
        Ok(self.objective(param_values)?)
    }
}

/// Unbounded view of a [`CalibrationProblem`] for L-BFGS.
///
/// Each coordinate is mapped into its box with a logistic transform, so the
/// solver can move freely while the simulation only sees in-bounds values.
/// Gradients are finite differences of the cost.
pub struct BoundedProblem<'p, 'a, E: SimulationEngine> {
    inner: &'p CalibrationProblem<'a, E>,
}

impl<'p, 'a, E: SimulationEngine> BoundedProblem<'p, 'a, E> {
    pub fn new(inner: &'p CalibrationProblem<'a, E>) -> Self {
        Self { inner }
    }

    /// Unbounded starting point
    pub fn initial_param(&self) -> Array1<f64> {
        Array1::from(self.inner.to_unbounded(&self.inner.initial_parameters()))
    }

    /// Natural-space values of an unbounded point
    pub fn natural(&self, z: &Array1<f64>) -> Vec<f64> {
        self.inner.from_unbounded(&z.to_vec())
    }
}

impl<E: SimulationEngine> CostFunction for BoundedProblem<'_, '_, E> {
    type Param = Array1<f64>;
    type Output = f64;

    fn cost(&self, z: &Self::Param) -> std::result::Result<Self::Output, Error> {
        Ok(self.inner.objective(&self.natural(z))?)
    }
}

impl<E: SimulationEngine> Gradient for BoundedProblem<'_, '_, E> {
    type Param = Array1<f64>;
    type Gradient = Array1<f64>;

    /// Central differences, falling back to forward differences only when
    /// every evaluation succeeded but the result is not finite. The first failed
    /// evaluation ends the computation and its error is returned.
    fn gradient(&self, z: &Self::Param) -> std::result::Result<Self::Gradient, Error> {
        let closure_err: RefCell<Option<Error>> = RefCell::new(None);
        let cost_func = |z: &Array1<f64>| -> f64 {
            if closure_err.borrow().is_some() {
                return f64::NAN;
            }
            match self.cost(z) {
                Ok(value) => value,
                Err(e) => {
                    *closure_err.borrow_mut() = Some(e);
                    f64::NAN
                }
            }
        };

        let grad = z.central_diff(&cost_func);
        if let Some(err) = closure_err.take() {
            return Err(err);
        }
        if grad.iter().all(|g| g.is_finite()) {
            return Ok(grad);
        }

        let grad = z.forward_diff(&cost_func);
        if let Some(err) = closure_err.take() {
            return Err(err);
        }
        if !grad.iter().all(|g| g.is_finite()) {
            return Err(CalibrationError::NonFiniteObjective {
                value: f64::NAN,
                parameters: self.natural(z),
            }
            .into());
        }
        Ok(grad)
    }
}
