//! Errors raised by core types and by simulation engines

/// Errors an engine reports for a single run
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid time step {0}: must be finite and strictly positive")]
    InvalidStep(f64),
    #[error("Invalid duration {0}: must be finite and strictly positive")]
    InvalidDuration(f64),
    #[error("Step budget exhausted: run needs {requested} steps, limit is {limit}")]
    ResourceExhausted { requested: u64, limit: u64 },
    #[error("Simulation failed: {0}")]
    Failed(String),
}

/// Errors raised while building or combining trajectories
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrajectoryError {
    #[error("Compartment '{0}' appears more than once")]
    DuplicateCompartment(String),
    #[error("Got {times} time points but {rows} rows")]
    RowCountMismatch { times: usize, rows: usize },
    #[error("Row {index} has {found} values, expected {expected}")]
    RowWidth {
        index: usize,
        expected: usize,
        found: usize,
    },
    #[error("Time at row {index} is not finite")]
    NonFiniteTime { index: usize },
    #[error("Time at row {index} ({current}) does not exceed previous time ({previous})")]
    NonIncreasingTime {
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("Replicate {index} does not share the first replicate's time grid and compartments")]
    ReplicateMismatch { index: usize },
    #[error("No replicates to average")]
    NoReplicates,
}

/// Errors raised by parameter-set operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParameterError {
    #[error("Unknown parameter '{id}' (available: {available})")]
    Unknown { id: String, available: String },
}
