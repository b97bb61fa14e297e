#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};

use epistep_core::{
    EngineError, InitialValues, ParameterSet, SimulationEngine, SimulationRequest, Trajectory,
};

pub const DURATION: f64 = 60.0;
pub const TRUE_BETA: f64 = 0.3;
pub const TRUE_GAMMA: f64 = 0.1;

/// Forward-Euler SIR model with frequency-dependent transmission
pub struct Sir {
    /// Largest number of steps a single run may take
    pub max_steps: Option<u64>,
    /// Calls after which every run fails
    pub fail_after: Option<u64>,
    /// Single call that fails, later calls succeed again
    pub fail_on: Option<u64>,
    calls: AtomicU64,
}

impl Sir {
    pub fn new() -> Self {
        Self {
            max_steps: None,
            fail_after: None,
            fail_on: None,
            calls: AtomicU64::new(0),
        }
    }

    pub fn with_max_steps(mut self, limit: u64) -> Self {
        self.max_steps = Some(limit);
        self
    }

    pub fn failing_after(mut self, calls: u64) -> Self {
        self.fail_after = Some(calls);
        self
    }

    pub fn failing_once_on(mut self, call: u64) -> Self {
        self.fail_on = Some(call);
        self
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SimulationEngine for Sir {
    type Model = ();

    fn run(&self, request: &SimulationRequest<'_, ()>) -> Result<Trajectory, EngineError> {
        request.validate()?;
        let steps = request.step_count();
        if let Some(limit) = self.max_steps {
            if steps > limit {
                return Err(EngineError::ResourceExhausted {
                    requested: steps,
                    limit,
                });
            }
        }

        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_after.is_some_and(|limit| call > limit) {
            return Err(EngineError::Failed(format!("solver diverged on call {call}")));
        }
        if self.fail_on == Some(call) {
            return Err(EngineError::Failed(format!("transient failure on call {call}")));
        }

        let param = |id: &str| {
            request
                .parameters
                .get(id)
                .ok_or_else(|| EngineError::Failed(format!("missing parameter {id}")))
        };
        let beta = param("beta")?;
        let gamma = param("gamma")?;
        let population = |c: &str| request.initial_values.get(c).unwrap_or(0.0);
        let (mut s, mut i, mut r) = (population("S"), population("I"), population("R"));
        let n = s + i + r;
        let dt = request.time_step;

        let mut rows = Vec::with_capacity(steps as usize + 1);
        for k in 0..=steps {
            rows.push((k as f64 * dt, vec![s, i, r]));
            let infections = (beta * s * i / n * dt).min(s);
            let recoveries = (gamma * i * dt).min(i);
            s -= infections;
            i += infections - recoveries;
            r += recoveries;
        }

        Trajectory::from_rows(vec!["S".into(), "I".into(), "R".into()], rows)
            .map_err(|e| EngineError::Failed(e.to_string()))
    }
}

pub fn initial_values() -> InitialValues {
    [("S", 990.0), ("I", 10.0), ("R", 0.0)].into_iter().collect()
}

pub fn true_parameters() -> ParameterSet {
    [("beta", TRUE_BETA), ("gamma", TRUE_GAMMA)].into_iter().collect()
}

/// Reference trajectory at the true parameters
pub fn reference(time_step: f64) -> Trajectory {
    let initial = initial_values();
    let parameters = true_parameters();
    let request = SimulationRequest {
        model: &(),
        initial_values: &initial,
        parameters: &parameters,
        time_step,
        duration: DURATION,
        replicate: 0,
    };
    Sir::new().run(&request).unwrap()
}
