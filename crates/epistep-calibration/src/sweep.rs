//! Error as a function of step size at fixed parameters

use epistep_core::{ParameterSet, SimulationEngine, Trajectory};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::adapter::SimulationAdapter;
use crate::alignment::{AlignOptions, align};
use crate::error::CalibrationError;
use crate::metric::{ErrorScore, MetricKind, score};

/// Score of one step size against the reference
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SweepPoint {
    pub step_size: f64,
    pub score: ErrorScore,
}

/// A step size that could not be evaluated
#[derive(Debug, Error)]
#[error("sweep failed at step size {step_size}: {source}")]
pub struct SweepError {
    pub step_size: f64,
    #[source]
    pub source: CalibrationError,
}

/// Points evaluated before the sweep stopped, and the failure that stopped it
#[derive(Debug, Serialize)]
pub struct SweepOutcome {
    pub points: Vec<SweepPoint>,
    #[serde(serialize_with = "serialize_failure")]
    pub failure: Option<SweepError>,
}

impl SweepOutcome {
    pub fn is_complete(&self) -> bool {
        self.failure.is_none()
    }

    /// Points, or the failure if one occurred
    pub fn into_result(self) -> Result<Vec<SweepPoint>, SweepError> {
        match self.failure {
            Some(err) => Err(err),
            None => Ok(self.points),
        }
    }
}

fn serialize_failure<S: serde::Serializer>(
    failure: &Option<SweepError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match failure {
        Some(err) => serializer.serialize_some(&err.to_string()),
        None => serializer.serialize_none(),
    }
}

/// Evaluates the adapter at a sequence of step sizes with the parameters
/// held fixed, scoring every run against the same reference.
///
/// Nothing is cached: every call to [`iter`](Self::iter),
/// [`run`](Self::run) or [`run_parallel`](Self::run_parallel) simulates
/// afresh. An aligned series with no overlap scores `NaN` rather than
/// failing, so coarse grids that miss every reference instant stay visible
/// in the output.
pub struct SensitivitySweep<'a, E: SimulationEngine> {
    adapter: SimulationAdapter<'a, E>,
    reference: &'a Trajectory,
    compartments: Vec<String>,
    overrides: ParameterSet,
    duration: f64,
    metric: MetricKind,
    align_options: AlignOptions,
    step_sizes: Vec<f64>,
}

impl<'a, E: SimulationEngine> SensitivitySweep<'a, E> {
    pub fn new<S: AsRef<str>>(
        adapter: SimulationAdapter<'a, E>,
        reference: &'a Trajectory,
        compartments: &[S],
        duration: f64,
        metric: MetricKind,
        step_sizes: impl IntoIterator<Item = f64>,
    ) -> Self {
        Self {
            adapter,
            reference,
            compartments: compartments.iter().map(|c| c.as_ref().to_string()).collect(),
            overrides: ParameterSet::new(),
            duration,
            metric,
            align_options: AlignOptions::default(),
            step_sizes: step_sizes.into_iter().collect(),
        }
    }

    /// Parameters applied on top of the adapter's base set for every run
    pub fn with_overrides(mut self, overrides: ParameterSet) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn with_align_options(mut self, options: AlignOptions) -> Self {
        self.align_options = options;
        self
    }

    pub fn step_sizes(&self) -> &[f64] {
        &self.step_sizes
    }

    /// Lazy pass over the step sizes.
    ///
    /// Yields one `Ok` per step size in order. The first failure is yielded
    /// as `Err` and ends the sequence. Each call starts a new pass.
    pub fn iter(&self) -> SweepIter<'_, 'a, E> {
        SweepIter {
            sweep: self,
            next: 0,
            failed: false,
        }
    }

    /// Evaluate every step size in order, stopping at the first failure
    pub fn run(&self) -> SweepOutcome {
        info!(
            steps = self.step_sizes.len(),
            metric = %self.metric,
            duration = self.duration,
            "starting sensitivity sweep"
        );

        let mut points = Vec::with_capacity(self.step_sizes.len());
        for item in self.iter() {
            match item {
                Ok(point) => points.push(point),
                Err(err) => {
                    warn!(
                        step_size = err.step_size,
                        completed = points.len(),
                        error = %err.source,
                        "sweep aborted"
                    );
                    return SweepOutcome {
                        points,
                        failure: Some(err),
                    };
                }
            }
        }

        info!(points = points.len(), "sweep finished");
        SweepOutcome {
            points,
            failure: None,
        }
    }

    /// Evaluate all step sizes concurrently.
    ///
    /// The outcome matches [`run`](Self::run): points in input order up to
    /// the first failing step size, with that failure attached. Step sizes
    /// after the failure may still have been simulated.
    pub fn run_parallel(&self) -> SweepOutcome {
        info!(
            steps = self.step_sizes.len(),
            metric = %self.metric,
            "starting parallel sensitivity sweep"
        );

        let results: Vec<Result<SweepPoint, SweepError>> = self
            .step_sizes
            .par_iter()
            .map(|&step_size| self.evaluate(step_size))
            .collect();

        let mut points = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(point) => points.push(point),
                Err(err) => {
                    warn!(
                        step_size = err.step_size,
                        completed = points.len(),
                        error = %err.source,
                        "sweep aborted"
                    );
                    return SweepOutcome {
                        points,
                        failure: Some(err),
                    };
                }
            }
        }

        info!(points = points.len(), "sweep finished");
        SweepOutcome {
            points,
            failure: None,
        }
    }

    fn evaluate(&self, step_size: f64) -> Result<SweepPoint, SweepError> {
        let fail = |source| SweepError { step_size, source };

        let candidate = self
            .adapter
            .run(&self.overrides, step_size, self.duration)
            .map_err(fail)?;
        let aligned = align(
            self.reference,
            &candidate,
            &self.compartments,
            &self.align_options,
        )
        .map_err(fail)?;

        let point = SweepPoint {
            step_size,
            score: score(&aligned, self.metric),
        };
        debug!(step_size, score = point.score, rows = aligned.len(), "sweep point");
        Ok(point)
    }
}

/// Iterator returned by [`SensitivitySweep::iter`]
pub struct SweepIter<'s, 'a, E: SimulationEngine> {
    sweep: &'s SensitivitySweep<'a, E>,
    next: usize,
    failed: bool,
}

impl<E: SimulationEngine> Iterator for SweepIter<'_, '_, E> {
    type Item = Result<SweepPoint, SweepError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let &step_size = self.sweep.step_sizes.get(self.next)?;
        self.next += 1;

        let item = self.sweep.evaluate(step_size);
        self.failed = item.is_err();
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, Some(self.sweep.step_sizes.len() - self.next))
        }
    }
}

impl<E: SimulationEngine> std::iter::FusedIterator for SweepIter<'_, '_, E> {}

/// `count` evenly spaced step sizes from `start` to `end` inclusive
pub fn step_grid(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let width = (end - start) / (count - 1) as f64;
            (0..count)
                .map(|i| if i == count - 1 { end } else { start + width * i as f64 })
                .collect()
        }
    }
}
