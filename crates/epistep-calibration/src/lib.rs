//! Calibration and step-size error analysis for discrete-time compartment
//! simulations.
//!
//! A fine-step reference [`Trajectory`](epistep_core::Trajectory) is held
//! fixed and compared against coarse-step candidates produced through a
//! [`SimulationAdapter`]. [`align`] joins the two on (time, compartment),
//! [`score`] reduces the join to a scalar, [`optimize`] fits free
//! parameters so a coarse step reproduces the reference, and
//! [`SensitivitySweep`] records how the error grows with step size.

pub mod adapter;
pub mod alignment;
pub mod calibration_problem;
pub mod cancel;
pub mod error;
pub mod metric;
pub mod optimization;
pub mod sweep;
pub mod types;

pub use adapter::{AdapterOptions, SimulationAdapter};
pub use alignment::{AlignOptions, AlignedRow, AlignedSeries, Resample, align};
pub use calibration_problem::{BoundedProblem, CalibrationProblem, OBJECTIVE_METRIC};
pub use cancel::CancellationToken;
pub use error::{CalibrationError, Result, TrajectoryRole};
pub use metric::{ErrorScore, MetricKind, score, score_by_compartment, score_named};
pub use optimization::{
    CalibrationOptions, LbfgsConfig, LineSearch, NelderMeadConfig, OptimizationAlgorithm,
    OptimizationConfig, ParticleSwarmConfig, calibrate, optimize,
};
pub use sweep::{SensitivitySweep, SweepError, SweepIter, SweepOutcome, SweepPoint, step_grid};
pub use types::{BestPoint, CalibrationParameter, CalibrationResult};
