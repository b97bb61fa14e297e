//! Optimization solver setup and execution

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use argmin::core::observers::{Observe, ObserverMode};
use argmin::core::{
    CostFunction, Executor, IterState, KV, OptimizationResult, Solver, State, TerminationReason,
    TerminationStatus,
};
use argmin::solver::linesearch::{HagerZhangLineSearch, MoreThuenteLineSearch};
use argmin::solver::neldermead::NelderMead;
use argmin::solver::particleswarm::ParticleSwarm;
use argmin::solver::quasinewton::LBFGS;
use argmin_observer_slog::SlogLogger;
use epistep_core::{SimulationEngine, Trajectory};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::adapter::SimulationAdapter;
use crate::calibration_problem::{BoundedProblem, CalibrationProblem};
use crate::error::{CalibrationError, Result};
use crate::metric::MetricKind;
use crate::types::{CalibrationParameter, CalibrationResult};

type Theta = Array1<f64>;
type HagerZhangLS = HagerZhangLineSearch<Theta, Theta, f64>;
type MoreThuenteLS = MoreThuenteLineSearch<Theta, Theta, f64>;

/// Default L-BFGS history size
pub const DEFAULT_LBFGS_MEM: usize = 7;

/// Default cap on objective evaluations for L-BFGS and Nelder-Mead
pub const DEFAULT_MAX_EVALUATIONS: u64 = 5_000;

/// Line search used inside L-BFGS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSearch {
    #[default]
    MoreThuente,
    HagerZhang,
}

/// Configuration for bounded L-BFGS (the default solver)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LbfgsConfig {
    /// Maximum number of iterations
    pub max_iterations: u64,

    /// Maximum number of objective evaluations, finite-difference steps included.
    /// Line searches can spend many evaluations inside one iteration.
    pub max_evaluations: Option<u64>,

    /// Gradient-norm tolerance (convergence criterion)
    pub tol_grad: f64,

    /// Cost-change tolerance (convergence criterion)
    pub tol_cost: f64,

    /// History size
    pub memory: usize,

    pub line_search: LineSearch,

    /// Attach a terminal iteration logger
    pub verbose: bool,
}

impl Default for LbfgsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            max_evaluations: Some(DEFAULT_MAX_EVALUATIONS),
            tol_grad: 1e-10,
            tol_cost: 1e-14,
            memory: DEFAULT_LBFGS_MEM,
            line_search: LineSearch::MoreThuente,
            verbose: false,
        }
    }
}

impl LbfgsConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_evaluations(mut self, max_evaluations: u64) -> Self {
        self.max_evaluations = Some(max_evaluations);
        self
    }

    pub fn with_tol_grad(mut self, tol_grad: f64) -> Self {
        self.tol_grad = tol_grad;
        self
    }

    pub fn with_tol_cost(mut self, tol_cost: f64) -> Self {
        self.tol_cost = tol_cost;
        self
    }

    pub fn with_memory(mut self, memory: usize) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_line_search(mut self, line_search: LineSearch) -> Self {
        self.line_search = line_search;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Configuration for Nelder-Mead optimization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NelderMeadConfig {
    /// Maximum number of iterations
    pub max_iterations: u64,

    /// Maximum number of objective evaluations
    pub max_evaluations: Option<u64>,

    /// Sample standard deviation tolerance (convergence criterion)
    pub sd_tolerance: f64,

    /// Initial simplex edge, as a fraction of each parameter's box width
    pub simplex_scale: f64,

    /// Enable verbose output
    pub verbose: bool,
}

impl Default for NelderMeadConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            max_evaluations: Some(DEFAULT_MAX_EVALUATIONS),
            sd_tolerance: 1e-12,
            simplex_scale: 0.05,
            verbose: false,
        }
    }
}

impl NelderMeadConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_evaluations(mut self, max_evaluations: u64) -> Self {
        self.max_evaluations = Some(max_evaluations);
        self
    }

    pub fn with_sd_tolerance(mut self, tolerance: f64) -> Self {
        self.sd_tolerance = tolerance;
        self
    }

    pub fn with_simplex_scale(mut self, scale: f64) -> Self {
        self.simplex_scale = scale;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Configuration for Particle Swarm Optimization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticleSwarmConfig {
    /// Number of particles in the swarm
    pub num_particles: usize,

    /// Maximum number of iterations
    pub max_iterations: u64,

    /// Maximum number of objective evaluations. Without one, a run costs
    /// at most `num_particles * (max_iterations + 1)` evaluations.
    pub max_evaluations: Option<u64>,

    /// Optimization stops when cost reaches this value
    pub target_cost: Option<f64>,

    /// Inertia weight applied to particle velocity.
    /// Defaults to 1/(2*ln(2)) ≈ 0.721
    pub inertia_factor: Option<f64>,

    /// Attraction to the particle's own best.
    /// Defaults to 0.5 + ln(2) ≈ 1.193
    pub cognitive_factor: Option<f64>,

    /// Attraction to the swarm's best.
    /// Defaults to 0.5 + ln(2) ≈ 1.193
    pub social_factor: Option<f64>,

    /// Enable verbose output
    pub verbose: bool,
}

impl Default for ParticleSwarmConfig {
    fn default() -> Self {
        Self {
            num_particles: 20,
            max_iterations: 100,
            max_evaluations: None,
            target_cost: None,
            inertia_factor: None,
            cognitive_factor: None,
            social_factor: None,
            verbose: false,
        }
    }
}

impl ParticleSwarmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_particles(mut self, num_particles: usize) -> Self {
        self.num_particles = num_particles;
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: u64) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_max_evaluations(mut self, max_evaluations: u64) -> Self {
        self.max_evaluations = Some(max_evaluations);
        self
    }

    pub fn with_target_cost(mut self, target_cost: f64) -> Self {
        self.target_cost = Some(target_cost);
        self
    }

    pub fn with_inertia_factor(mut self, factor: f64) -> Self {
        self.inertia_factor = Some(factor);
        self
    }

    pub fn with_cognitive_factor(mut self, factor: f64) -> Self {
        self.cognitive_factor = Some(factor);
        self
    }

    pub fn with_social_factor(mut self, factor: f64) -> Self {
        self.social_factor = Some(factor);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Algorithm-specific optimization configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum OptimizationConfig {
    /// L-BFGS on a logistic reparameterisation of the box, with
    /// finite-difference gradients. Local, bounded quasi-Newton search.
    Lbfgs(LbfgsConfig),

    /// Nelder-Mead simplex method (gradient-free), box enforced by clamping
    NelderMead(NelderMeadConfig),

    /// Particle Swarm Optimization (gradient-free, global search within the box)
    ParticleSwarm(ParticleSwarmConfig),
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        OptimizationConfig::Lbfgs(LbfgsConfig::default())
    }
}

impl OptimizationConfig {
    fn algorithm(&self) -> OptimizationAlgorithm {
        match self {
            OptimizationConfig::Lbfgs(_) => OptimizationAlgorithm::Lbfgs,
            OptimizationConfig::NelderMead(_) => OptimizationAlgorithm::NelderMead,
            OptimizationConfig::ParticleSwarm(_) => OptimizationAlgorithm::ParticleSwarm,
        }
    }

    fn max_evaluations(&self) -> Option<u64> {
        match self {
            OptimizationConfig::Lbfgs(config) => config.max_evaluations,
            OptimizationConfig::NelderMead(config) => config.max_evaluations,
            OptimizationConfig::ParticleSwarm(config) => config.max_evaluations,
        }
    }
}

/// Available optimization algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizationAlgorithm {
    Lbfgs,
    NelderMead,
    ParticleSwarm,
}

impl std::fmt::Display for OptimizationAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptimizationAlgorithm::Lbfgs => write!(f, "L-BFGS"),
            OptimizationAlgorithm::NelderMead => write!(f, "Nelder-Mead"),
            OptimizationAlgorithm::ParticleSwarm => write!(f, "Particle Swarm"),
        }
    }
}

/// Everything about a calibration run that is not the problem itself
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationOptions {
    pub solver: OptimizationConfig,

    /// Metric used for `CalibrationResult::final_score`. The objective is
    /// always MSE on proportions regardless of this choice.
    pub reporting_metric: MetricKind,

    /// Wall-clock cap for the solver, checked before every evaluation
    pub timeout: Option<Duration>,
}

impl CalibrationOptions {
    pub fn new(solver: OptimizationConfig) -> Self {
        Self {
            solver,
            ..Self::default()
        }
    }

    pub fn with_reporting_metric(mut self, metric: MetricKind) -> Self {
        self.reporting_metric = metric;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// What a solver run produced before final scoring
struct SolverOutcome {
    best: Vec<f64>,
    iterations: u64,
    converged: bool,
    termination_reason: String,
}

/// Build the problem and run the configured solver.
///
/// Shorthand for [`CalibrationProblem::new`] followed by [`optimize`].
pub fn calibrate<E: SimulationEngine, S: AsRef<str>>(
    adapter: SimulationAdapter<'_, E>,
    reference: &Trajectory,
    compartments: &[S],
    parameters: Vec<CalibrationParameter>,
    time_step: f64,
    duration: f64,
    options: &CalibrationOptions,
) -> Result<CalibrationResult> {
    let problem = CalibrationProblem::new(
        adapter,
        reference,
        compartments,
        parameters,
        time_step,
        duration,
    )?;
    optimize(&problem, options)
}

/// Run optimization on a calibration problem
///
/// Reaching the iteration, evaluation or time budget is not an error: the
/// best point found is returned with `converged = false`. The same holds when the
/// solver itself gives up (for example a line search that cannot find a
/// descent step). An engine or alignment failure aborts the run with
/// [`CalibrationError::Aborted`], which carries the best point evaluated
/// before the failure.
///
/// # Example
///
/// ```rust,ignore
/// use epistep_calibration::{optimize, CalibrationOptions, LbfgsConfig, OptimizationConfig};
///
/// let options = CalibrationOptions::new(OptimizationConfig::Lbfgs(
///     LbfgsConfig::new().with_max_iterations(100),
/// ));
///
/// let result = optimize(&problem, &options)?;
/// println!("Best parameters: {:?}", result.parameters_map());
/// println!("Final score: {}", result.final_score);
/// ```
pub fn optimize<E: SimulationEngine>(
    problem: &CalibrationProblem<'_, E>,
    options: &CalibrationOptions,
) -> Result<CalibrationResult> {
    let parameter_names = problem.parameter_names();
    info!(
        algorithm = %options.solver.algorithm(),
        parameters = ?parameter_names,
        initial = ?problem.initial_parameters(),
        bounds = ?problem.parameter_bounds(),
        time_step = problem.time_step(),
        "starting calibration"
    );

    problem.set_budget(options.solver.max_evaluations(), options.timeout);
    let progress = IterationTracker::default();

    let run = match &options.solver {
        OptimizationConfig::Lbfgs(config) => {
            optimize_lbfgs(problem, config, options.timeout, &progress)
        }
        OptimizationConfig::NelderMead(config) => {
            optimize_nelder_mead(problem, config, options.timeout, &progress)
        }
        OptimizationConfig::ParticleSwarm(config) => {
            optimize_particle_swarm(problem, config, options.timeout, &progress)
        }
    };
    problem.set_budget(None, None);

    let outcome = match run {
        Ok(outcome) => outcome,
        Err(err) => recover(problem, err, progress.iterations())?,
    };

    let (objective_value, final_score) = problem
        .report(&outcome.best, options.reporting_metric)
        .map_err(|err| abort(problem, err))?;

    if outcome.converged {
        info!(
            iterations = outcome.iterations,
            objective = objective_value,
            final_score,
            "calibration converged"
        );
    } else {
        warn!(
            iterations = outcome.iterations,
            objective = objective_value,
            reason = %outcome.termination_reason,
            "calibration stopped without converging"
        );
    }

    Ok(CalibrationResult {
        best_parameters: outcome.best,
        parameter_names,
        objective_value,
        reporting_metric: options.reporting_metric,
        final_score,
        iterations: outcome.iterations,
        evaluations: problem.evaluations(),
        converged: outcome.converged,
        termination_reason: outcome.termination_reason,
    })
}

/// Solver-internal failures and spent budgets fall back to the best point
/// seen; anything else raised by an evaluation aborts the run.
fn recover<E: SimulationEngine>(
    problem: &CalibrationProblem<'_, E>,
    err: CalibrationError,
    iterations: u64,
) -> Result<SolverOutcome> {
    let reason = match &err {
        CalibrationError::Optimizer(reason) => reason.clone(),
        CalibrationError::BudgetExhausted { .. } => err.to_string(),
        _ => return Err(abort(problem, err)),
    };
    match problem.best_point() {
        Some(best) => Ok(SolverOutcome {
            best: best.values,
            iterations,
            converged: false,
            termination_reason: reason,
        }),
        None => Err(abort(problem, err)),
    }
}

fn abort<E: SimulationEngine>(
    problem: &CalibrationProblem<'_, E>,
    err: CalibrationError,
) -> CalibrationError {
    CalibrationError::Aborted {
        source: Box::new(err),
        best: problem.best_point(),
    }
}

fn solver_converged(status: &TerminationStatus) -> bool {
    matches!(
        status,
        TerminationStatus::Terminated(
            TerminationReason::SolverConverged | TerminationReason::TargetCostReached
        )
    )
}

/// Observer recording how many iterations have completed, so a run that
/// ends in an error can still report its progress
#[derive(Debug, Clone, Default)]
struct IterationTracker(Arc<AtomicU64>);

impl IterationTracker {
    fn iterations(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

impl<I: State> Observe<I> for IterationTracker {
    fn observe_iter(
        &mut self,
        state: &I,
        _kv: &KV,
    ) -> std::result::Result<(), argmin::core::Error> {
        self.0.store(state.get_iter() + 1, Ordering::Relaxed);
        Ok(())
    }
}

/// Run executor with progress tracking, optionally with a wall-clock cap and
/// a logging observer
fn execute<O, S, I>(
    mut executor: Executor<O, S, I>,
    timeout: Option<Duration>,
    verbose: bool,
    progress: &IterationTracker,
) -> Result<OptimizationResult<O, S, I>>
where
    O: CostFunction,
    S: Solver<O, I>,
    I: State,
{
    executor = executor.add_observer(progress.clone(), ObserverMode::Always);
    if let Some(timeout) = timeout {
        executor = executor.timeout(timeout);
    }
    if verbose {
        executor = executor.add_observer(SlogLogger::term(), ObserverMode::Always);
    }
    Ok(executor.run()?)
}

/// Optimize using L-BFGS on the unbounded reparameterisation
fn optimize_lbfgs<E: SimulationEngine>(
    problem: &CalibrationProblem<'_, E>,
    config: &LbfgsConfig,
    timeout: Option<Duration>,
    progress: &IterationTracker,
) -> Result<SolverOutcome> {
    match config.line_search {
        LineSearch::MoreThuente => {
            let solver = LBFGS::new(MoreThuenteLS::new(), config.memory);
            let solver = configure_lbfgs(solver, config)?;
            run_lbfgs(problem, solver, config, timeout, progress)
        }
        LineSearch::HagerZhang => {
            let solver = LBFGS::new(HagerZhangLS::new(), config.memory);
            let solver = configure_lbfgs(solver, config)?;
            run_lbfgs(problem, solver, config, timeout, progress)
        }
    }
}

fn configure_lbfgs<L>(
    solver: LBFGS<L, Theta, Theta, f64>,
    config: &LbfgsConfig,
) -> Result<LBFGS<L, Theta, Theta, f64>> {
    Ok(solver
        .with_tolerance_grad(config.tol_grad)?
        .with_tolerance_cost(config.tol_cost)?)
}

fn run_lbfgs<'p, 'a, E, S>(
    problem: &'p CalibrationProblem<'a, E>,
    solver: S,
    config: &LbfgsConfig,
    timeout: Option<Duration>,
    progress: &IterationTracker,
) -> Result<SolverOutcome>
where
    E: SimulationEngine,
    S: Solver<BoundedProblem<'p, 'a, E>, IterState<Theta, Theta, (), (), (), f64>>,
{
    let bounded = BoundedProblem::new(problem);
    let theta0 = bounded.initial_param();
    let executor = Executor::new(bounded, solver)
        .configure(|state| state.param(theta0).max_iters(config.max_iterations));

    let result = execute(executor, timeout, config.verbose, progress)?;
    let state = result.state();

    let best = match state.get_best_param() {
        Some(z) => problem.from_unbounded(&z.to_vec()),
        None => problem.initial_parameters(),
    };

    Ok(SolverOutcome {
        best,
        iterations: state.get_iter(),
        converged: solver_converged(state.get_termination_status()),
        termination_reason: format!("{:?}", state.get_termination_status()),
    })
}

/// Build Nelder-Mead solver from configuration
fn build_nelder_mead_solver<E: SimulationEngine>(
    problem: &CalibrationProblem<'_, E>,
    config: &NelderMeadConfig,
) -> Result<NelderMead<Vec<f64>, f64>> {
    let initial_params = problem.initial_parameters();

    // n+1 vertices: the start plus one step along each axis, kept inside the box
    let mut vertices = vec![initial_params.clone()];
    for (i, (lower, upper)) in problem.parameter_bounds().into_iter().enumerate() {
        let mut vertex = initial_params.clone();
        let step = config.simplex_scale * (upper - lower);
        vertex[i] = if vertex[i] + step <= upper {
            vertex[i] + step
        } else {
            vertex[i] - step
        };
        vertices.push(vertex);
    }

    Ok(NelderMead::new(vertices).with_sd_tolerance(config.sd_tolerance)?)
}

/// Optimize using Nelder-Mead algorithm
fn optimize_nelder_mead<E: SimulationEngine>(
    problem: &CalibrationProblem<'_, E>,
    config: &NelderMeadConfig,
    timeout: Option<Duration>,
    progress: &IterationTracker,
) -> Result<SolverOutcome> {
    let solver = build_nelder_mead_solver(problem, config)?;
    let executor =
        Executor::new(problem, solver).configure(|state| state.max_iters(config.max_iterations));

    let result = execute(executor, timeout, config.verbose, progress)?;
    let state = result.state();

    let best = state
        .get_best_param()
        .map(|values| {
            values
                .iter()
                .zip(problem.parameter_bounds())
                .map(|(v, (lower, upper))| v.clamp(lower, upper))
                .collect()
        })
        .unwrap_or_else(|| problem.initial_parameters());

    Ok(SolverOutcome {
        best,
        iterations: state.get_iter(),
        converged: solver_converged(state.get_termination_status()),
        termination_reason: format!("{:?}", state.get_termination_status()),
    })
}

/// Optimize using Particle Swarm algorithm
fn optimize_particle_swarm<E: SimulationEngine>(
    problem: &CalibrationProblem<'_, E>,
    config: &ParticleSwarmConfig,
    timeout: Option<Duration>,
    progress: &IterationTracker,
) -> Result<SolverOutcome> {
    let bounds = problem.parameter_bounds();
    let lower_bound: Vec<f64> = bounds.iter().map(|(min, _)| *min).collect();
    let upper_bound: Vec<f64> = bounds.iter().map(|(_, max)| *max).collect();

    let mut solver = ParticleSwarm::new((lower_bound, upper_bound), config.num_particles);
    if let Some(inertia) = config.inertia_factor {
        solver = solver.with_inertia_factor(inertia)?;
    }
    if let Some(cognitive) = config.cognitive_factor {
        solver = solver.with_cognitive_factor(cognitive)?;
    }
    if let Some(social) = config.social_factor {
        solver = solver.with_social_factor(social)?;
    }

    let executor = Executor::new(problem, solver).configure(|state| {
        let mut state = state.max_iters(config.max_iterations);
        if let Some(target) = config.target_cost {
            state = state.target_cost(target);
        }
        state
    });

    let result = execute(executor, timeout, config.verbose, progress)?;
    let state = result.state();

    // best_individual holds the best particle found
    let best = match &state.best_individual {
        Some(particle) => particle.position.clone(),
        None => problem.initial_parameters(),
    };

    Ok(SolverOutcome {
        best,
        iterations: state.get_iter(),
        converged: solver_converged(state.get_termination_status()),
        termination_reason: format!("{:?}", state.get_termination_status()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_solver_is_lbfgs() {
        let options = CalibrationOptions::default();
        assert!(matches!(options.solver, OptimizationConfig::Lbfgs(_)));
        assert_eq!(options.reporting_metric, MetricKind::Mse);
        assert_eq!(options.timeout, None);
        assert_eq!(crate::OBJECTIVE_METRIC, MetricKind::Mse);
    }

    #[test]
    fn test_config_loads_from_json() {
        let json = r#"{
            "solver": { "algorithm": "nelder_mead", "max_iterations": 50 },
            "reporting_metric": "mae",
            "timeout": { "secs": 30, "nanos": 0 }
        }"#;
        let options: CalibrationOptions = serde_json::from_str(json).unwrap();

        match &options.solver {
            OptimizationConfig::NelderMead(config) => {
                assert_eq!(config.max_iterations, 50);
                assert_eq!(config.simplex_scale, 0.05);
            }
            other => panic!("unexpected solver {other:?}"),
        }
        assert_eq!(options.reporting_metric, MetricKind::Mae);
        assert_eq!(options.timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_builders() {
        let config = LbfgsConfig::new()
            .with_max_iterations(10)
            .with_line_search(LineSearch::HagerZhang)
            .with_memory(3);
        assert_eq!(config.max_iterations, 10);
        assert_eq!(config.line_search, LineSearch::HagerZhang);
        assert_eq!(config.memory, 3);

        let swarm = ParticleSwarmConfig::new()
            .with_num_particles(8)
            .with_target_cost(1e-9);
        assert_eq!(swarm.num_particles, 8);
        assert_eq!(swarm.target_cost, Some(1e-9));
    }

    #[test]
    fn test_evaluation_budget_defaults() {
        let options = CalibrationOptions::default();
        assert_eq!(options.solver.max_evaluations(), Some(DEFAULT_MAX_EVALUATIONS));
        assert_eq!(
            NelderMeadConfig::new().max_evaluations,
            Some(DEFAULT_MAX_EVALUATIONS)
        );
        assert_eq!(ParticleSwarmConfig::new().max_evaluations, None);

        let json = r#"{ "algorithm": "particle_swarm", "max_evaluations": 200 }"#;
        let config: OptimizationConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_evaluations(), Some(200));
    }

    #[test]
    fn test_iteration_tracker_shares_progress_between_clones() {
        let tracker = IterationTracker::default();
        let mut observer = tracker.clone();
        let state: IterState<Vec<f64>, (), (), (), (), f64> = IterState::new();
        observer.observe_iter(&state, &KV::new()).unwrap();
        assert_eq!(tracker.iterations(), 1);
    }

    #[test]
    fn test_converged_only_on_solver_criteria() {
        assert!(solver_converged(&TerminationStatus::Terminated(
            TerminationReason::SolverConverged
        )));
        assert!(!solver_converged(&TerminationStatus::Terminated(
            TerminationReason::MaxItersReached
        )));
        assert!(!solver_converged(&TerminationStatus::NotTerminated));
    }
}
