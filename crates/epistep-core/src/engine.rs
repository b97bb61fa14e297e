//! Boundary to the external discrete-time simulation engine.
//!
//! The calibration code never steps a model itself. It only hands an opaque
//! model handle, initial populations, a full parameter set, a step size and
//! a horizon to something implementing [`SimulationEngine`], and gets a
//! [`Trajectory`] back.

use crate::error::EngineError;
use crate::types::{InitialValues, ParameterSet, Trajectory};

/// Everything an engine needs for one run
#[derive(Debug)]
pub struct SimulationRequest<'a, M: ?Sized> {
    /// Opaque model definition, passed through untouched
    pub model: &'a M,
    pub initial_values: &'a InitialValues,
    /// Full parameter set (base values with any overrides already merged)
    pub parameters: &'a ParameterSet,
    pub time_step: f64,
    pub duration: f64,
    /// Replicate index, so stochastic engines can derive distinct seeds
    pub replicate: u32,
}

impl<M: ?Sized> Clone for SimulationRequest<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M: ?Sized> Copy for SimulationRequest<'_, M> {}

impl<M: ?Sized> SimulationRequest<'_, M> {
    /// Reject non-positive or non-finite step size and duration
    pub fn validate(&self) -> Result<(), EngineError> {
        if !(self.time_step.is_finite() && self.time_step > 0.0) {
            return Err(EngineError::InvalidStep(self.time_step));
        }
        if !(self.duration.is_finite() && self.duration > 0.0) {
            return Err(EngineError::InvalidDuration(self.duration));
        }
        Ok(())
    }

    /// Number of steps needed to cover the horizon
    pub fn step_count(&self) -> u64 {
        (self.duration / self.time_step).ceil() as u64
    }
}

/// A discrete-time compartment simulator.
///
/// Implementations must be deterministic for a given request if they are
/// deterministic at all, and must not rely on state carried between calls:
/// the calibration and sweep code evaluate runs out of order and in parallel.
pub trait SimulationEngine: Send + Sync {
    /// Model definition handle, never inspected by callers
    type Model: ?Sized + Sync;

    /// Advance the model from `initial_values` over `duration` in steps of
    /// `time_step`, reporting one column per compartment in `initial_values`.
    fn run(&self, request: &SimulationRequest<'_, Self::Model>) -> Result<Trajectory, EngineError>;
}
