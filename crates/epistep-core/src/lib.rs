//! Shared types for calibrating discrete-time compartment simulations.
//!
//! This crate defines what flows across the engine boundary: the
//! [`Trajectory`] an engine produces, the [`ParameterSet`] and
//! [`InitialValues`] it consumes, and the [`SimulationEngine`] trait itself.

pub mod engine;
pub mod error;
pub mod types;

pub use engine::{SimulationEngine, SimulationRequest};
pub use error::{EngineError, ParameterError, TrajectoryError};
pub use types::{
    CompartmentFraction, InitialValues, MergePolicy, Parameter, ParameterSet, TIME_RESOLUTION,
    TimeKey, Trajectory,
};
