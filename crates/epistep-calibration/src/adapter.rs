//! Single point of contact with the simulation engine

use epistep_core::{
    InitialValues, MergePolicy, ParameterSet, SimulationEngine, SimulationRequest, Trajectory,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cancel::CancellationToken;
use crate::error::{CalibrationError, Result};

/// Configuration for [`SimulationAdapter`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterOptions {
    /// Engine runs per evaluation; results are averaged entrywise.
    /// Only useful for stochastic engines.
    pub replicates: u32,

    /// Treatment of override keys missing from the base parameter set
    pub merge_policy: MergePolicy,

    /// Refuse runs needing more than this many steps
    pub max_steps: Option<u64>,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            replicates: 1,
            merge_policy: MergePolicy::Strict,
            max_steps: None,
        }
    }
}

impl AdapterOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replicates(mut self, replicates: u32) -> Self {
        self.replicates = replicates;
        self
    }

    pub fn with_merge_policy(mut self, policy: MergePolicy) -> Self {
        self.merge_policy = policy;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = Some(max_steps);
        self
    }
}

/// Wraps an engine together with the model, initial populations and base
/// parameters that stay fixed for a calibration or sweep.
///
/// Every [`run`](Self::run) merges a partial override set onto the base
/// parameters and calls the engine; nothing is cached between runs and the
/// inputs are only ever borrowed, so one adapter can serve concurrent
/// evaluations.
pub struct SimulationAdapter<'a, E: SimulationEngine> {
    engine: &'a E,
    model: &'a E::Model,
    initial_values: &'a InitialValues,
    base_parameters: &'a ParameterSet,
    options: AdapterOptions,
    cancel: Option<CancellationToken>,
}

impl<'a, E: SimulationEngine> SimulationAdapter<'a, E> {
    pub fn new(
        engine: &'a E,
        model: &'a E::Model,
        initial_values: &'a InitialValues,
        base_parameters: &'a ParameterSet,
    ) -> Self {
        Self {
            engine,
            model,
            initial_values,
            base_parameters,
            options: AdapterOptions::default(),
            cancel: None,
        }
    }

    pub fn with_options(mut self, options: AdapterOptions) -> Self {
        self.options = options;
        self
    }

    /// Check `token` before every engine invocation
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn base_parameters(&self) -> &ParameterSet {
        self.base_parameters
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    /// Base parameters with `overrides` applied under the configured policy
    pub fn resolve(&self, overrides: &ParameterSet) -> Result<ParameterSet> {
        Ok(self
            .base_parameters
            .merged(overrides, self.options.merge_policy)?)
    }

    /// Simulate with `overrides` merged onto the base parameters.
    ///
    /// # Errors
    ///
    /// - `InvalidStep` if `time_step` or `duration` is not strictly positive
    /// - `ResourceExhausted` if the run exceeds `max_steps`, or the engine
    ///   reports its own ceiling
    /// - `UnknownParameter` for unknown override keys under the strict policy
    /// - `Cancelled` if the token fired before an engine call
    pub fn run(
        &self,
        overrides: &ParameterSet,
        time_step: f64,
        duration: f64,
    ) -> Result<Trajectory> {
        if self.options.replicates == 0 {
            return Err(CalibrationError::EmptyInput("replicate count is zero"));
        }

        let parameters = self.resolve(overrides)?;
        let mut request = SimulationRequest {
            model: self.model,
            initial_values: self.initial_values,
            parameters: &parameters,
            time_step,
            duration,
            replicate: 0,
        };
        request.validate()?;

        if let Some(limit) = self.options.max_steps {
            let requested = request.step_count();
            if requested > limit {
                return Err(CalibrationError::ResourceExhausted { requested, limit });
            }
        }

        let mut runs = Vec::with_capacity(self.options.replicates as usize);
        for replicate in 0..self.options.replicates {
            if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
                return Err(CalibrationError::Cancelled);
            }
            request.replicate = replicate;
            runs.push(self.engine.run(&request)?);
        }
        debug!(
            time_step,
            duration,
            replicates = self.options.replicates,
            "simulation finished"
        );

        if runs.len() == 1 {
            Ok(runs.remove(0))
        } else {
            Ok(Trajectory::mean(&runs)?)
        }
    }
}
