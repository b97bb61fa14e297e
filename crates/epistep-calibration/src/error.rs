//! Calibration errors

use epistep_core::{EngineError, ParameterError, TrajectoryError};

use crate::types::BestPoint;

/// Which side of an alignment a trajectory was on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrajectoryRole {
    Reference,
    Candidate,
}

impl std::fmt::Display for TrajectoryRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrajectoryRole::Reference => write!(f, "reference"),
            TrajectoryRole::Candidate => write!(f, "candidate"),
        }
    }
}

pub type Result<T> = std::result::Result<T, CalibrationError>;

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    /// A requested compartment is missing from one of the trajectories
    #[error("Compartment '{compartment}' not found in {role} trajectory")]
    Schema {
        compartment: String,
        role: TrajectoryRole,
    },

    #[error("Invalid metric kind '{0}' (expected 'mae' or 'mse')")]
    InvalidMetricKind(String),

    /// Non-positive or non-finite step size or duration
    #[error("Invalid {what} {value}: must be finite and strictly positive")]
    InvalidStep { what: &'static str, value: f64 },

    #[error("Unknown parameter '{id}' (available: {available})")]
    UnknownParameter { id: String, available: String },

    #[error("Invalid bounds for parameter '{parameter}': {reason}")]
    Bounds { parameter: String, reason: String },

    #[error("Step budget exhausted: run needs {requested} steps, limit is {limit}")]
    ResourceExhausted { requested: u64, limit: u64 },

    #[error("Simulation engine failed: {0}")]
    Engine(String),

    #[error(transparent)]
    Trajectory(#[from] TrajectoryError),

    /// Reference and candidate share no (time, compartment) pair
    #[error("Reference and candidate trajectories have no time points in common")]
    NoOverlap,

    #[error("Objective is not finite ({value}) at {parameters:?}")]
    NonFiniteObjective { value: f64, parameters: Vec<f64> },

    #[error("Calibration input is empty: {0}")]
    EmptyInput(&'static str),

    #[error("Run cancelled")]
    Cancelled,

    /// The run's evaluation count or wall-clock limit was reached
    #[error("{what} budget exhausted after {evaluations} evaluations")]
    BudgetExhausted {
        what: &'static str,
        evaluations: u64,
    },

    #[error("Optimizer failed: {0}")]
    Optimizer(String),

    /// An evaluation failed mid-run; `best` is the best point evaluated before it
    #[error("Calibration aborted: {source}")]
    Aborted {
        #[source]
        source: Box<CalibrationError>,
        best: Option<BestPoint>,
    },
}

impl From<EngineError> for CalibrationError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidStep(value) => CalibrationError::InvalidStep {
                what: "time step",
                value,
            },
            EngineError::InvalidDuration(value) => CalibrationError::InvalidStep {
                what: "duration",
                value,
            },
            EngineError::ResourceExhausted { requested, limit } => {
                CalibrationError::ResourceExhausted { requested, limit }
            }
            EngineError::Failed(msg) => CalibrationError::Engine(msg),
        }
    }
}

impl From<ParameterError> for CalibrationError {
    fn from(err: ParameterError) -> Self {
        match err {
            ParameterError::Unknown { id, available } => {
                CalibrationError::UnknownParameter { id, available }
            }
        }
    }
}

impl From<argmin::core::Error> for CalibrationError {
    fn from(err: argmin::core::Error) -> Self {
        match err.downcast::<CalibrationError>() {
            Ok(inner) => inner,
            Err(other) => CalibrationError::Optimizer(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_keep_their_category() {
        assert!(matches!(
            CalibrationError::from(EngineError::InvalidStep(-1.0)),
            CalibrationError::InvalidStep {
                what: "time step",
                ..
            }
        ));
        assert!(matches!(
            CalibrationError::from(EngineError::ResourceExhausted {
                requested: 10,
                limit: 5
            }),
            CalibrationError::ResourceExhausted {
                requested: 10,
                limit: 5
            }
        ));
        assert!(matches!(
            CalibrationError::from(EngineError::Failed("boom".to_string())),
            CalibrationError::Engine(msg) if msg == "boom"
        ));
    }

    #[test]
    fn test_argmin_error_round_trip_recovers_calibration_error() {
        let boxed: argmin::core::Error = CalibrationError::Cancelled.into();
        assert!(matches!(
            CalibrationError::from(boxed),
            CalibrationError::Cancelled
        ));

        let foreign = argmin::core::Error::msg("line search failed");
        assert!(matches!(
            CalibrationError::from(foreign),
            CalibrationError::Optimizer(msg) if msg.contains("line search")
        ));
    }
}
