//! Type definitions for calibration

use std::collections::BTreeMap;

use epistep_core::ParameterSet;
use serde::{Deserialize, Serialize};

use crate::error::{CalibrationError, Result};
use crate::metric::MetricKind;

/// Free parameter to be calibrated with its bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationParameter {
    /// Parameter identifier, must exist in the base parameter set
    pub id: String,

    /// Minimum allowed value
    pub min_bound: f64,

    /// Maximum allowed value
    pub max_bound: f64,

    /// Optional starting value (if None, the base parameter value is used)
    pub initial_guess: Option<f64>,
}

impl CalibrationParameter {
    /// Create a new calibration parameter seeded at its base value
    pub fn new(id: impl Into<String>, min_bound: f64, max_bound: f64) -> Self {
        Self {
            id: id.into(),
            min_bound,
            max_bound,
            initial_guess: None,
        }
    }

    /// Create a new calibration parameter with an explicit starting value
    pub fn with_initial_guess(
        id: impl Into<String>,
        min_bound: f64,
        max_bound: f64,
        initial_guess: f64,
    ) -> Self {
        Self {
            id: id.into(),
            min_bound,
            max_bound,
            initial_guess: Some(initial_guess),
        }
    }

    /// Starting value: the explicit guess, else the base value
    pub fn initial_value(&self, base: &ParameterSet) -> Result<f64> {
        match self.initial_guess {
            Some(guess) => Ok(guess),
            None => base
                .get(&self.id)
                .ok_or_else(|| CalibrationError::UnknownParameter {
                    id: self.id.clone(),
                    available: base.names().collect::<Vec<_>>().join(", "),
                }),
        }
    }

    /// Check if a value is within the parameter bounds
    pub fn is_within_bounds(&self, value: f64) -> bool {
        value >= self.min_bound && value <= self.max_bound
    }

    /// Clamp a value into the parameter bounds
    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min_bound, self.max_bound)
    }

    /// Width of the box
    pub fn span(&self) -> f64 {
        self.max_bound - self.min_bound
    }

    /// Check the bounds are finite and ordered and that `initial` lies inside them
    pub fn validate(&self, initial: f64) -> Result<()> {
        let bounds_error = |reason: String| CalibrationError::Bounds {
            parameter: self.id.clone(),
            reason,
        };

        if !self.min_bound.is_finite() || !self.max_bound.is_finite() {
            return Err(bounds_error(format!(
                "bounds [{}, {}] must be finite",
                self.min_bound, self.max_bound
            )));
        }
        if self.min_bound > self.max_bound {
            return Err(bounds_error(format!(
                "lower bound {} exceeds upper bound {}",
                self.min_bound, self.max_bound
            )));
        }
        if !self.is_within_bounds(initial) {
            return Err(bounds_error(format!(
                "initial value {} outside [{}, {}]",
                initial, self.min_bound, self.max_bound
            )));
        }
        Ok(())
    }
}

/// Best point evaluated during a run, kept even if the run later fails
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestPoint {
    /// Parameter names (in same order as `values`)
    pub parameter_names: Vec<String>,

    /// Parameter values in natural (bounded) space
    pub values: Vec<f64>,

    /// Objective (MSE on proportions) at `values`
    pub objective: f64,
}

/// Result from a calibration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationResult {
    /// Best parameter values found
    pub best_parameters: Vec<f64>,

    /// Parameter names (in same order as best_parameters)
    pub parameter_names: Vec<String>,

    /// Optimised objective at the best parameters (MSE on proportions)
    pub objective_value: f64,

    /// Metric used for `final_score`
    pub reporting_metric: MetricKind,

    /// Score under the reporting metric at the best parameters
    pub final_score: f64,

    /// Number of iterations performed
    pub iterations: u64,

    /// Number of objective evaluations (including finite-difference steps)
    pub evaluations: u64,

    /// Whether the solver met its own convergence criterion
    pub converged: bool,

    /// Termination reason
    pub termination_reason: String,
}

impl CalibrationResult {
    /// Get parameters as a map for easy lookup
    pub fn parameters_map(&self) -> BTreeMap<String, f64> {
        self.parameter_names
            .iter()
            .zip(self.best_parameters.iter())
            .map(|(name, value)| (name.clone(), *value))
            .collect()
    }

    /// Fitted values as an override set for the engine
    pub fn fitted_parameters(&self) -> ParameterSet {
        self.parameter_names
            .iter()
            .cloned()
            .zip(self.best_parameters.iter().copied())
            .collect()
    }
}
