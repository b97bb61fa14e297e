//! Joining a reference and a candidate trajectory on (time, compartment)

use epistep_core::{TimeKey, Trajectory};
use serde::{Deserialize, Serialize};

use crate::error::{CalibrationError, Result, TrajectoryRole};

/// How candidate values are matched to reference instants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resample {
    /// Inner join: keep only instants present in both trajectories
    #[default]
    None,
    /// Linearly interpolate the candidate at every reference instant inside
    /// the candidate's time span; instants outside it are dropped
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignOptions {
    /// Convert each time slice to proportions before comparing
    pub normalize: bool,
    pub resample: Resample,
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            normalize: true,
            resample: Resample::None,
        }
    }
}

impl AlignOptions {
    /// Absolute populations, inner join
    pub fn raw() -> Self {
        Self {
            normalize: false,
            resample: Resample::None,
        }
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_resample(mut self, resample: Resample) -> Self {
        self.resample = resample;
        self
    }
}

/// One (time, compartment) pair present on both sides
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedRow {
    pub time: f64,
    pub compartment: String,
    pub reference: f64,
    pub candidate: f64,
}

/// Reference and candidate values side by side, ordered by time then by
/// the requested compartment order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlignedSeries {
    compartments: Vec<String>,
    normalized: bool,
    rows: Vec<AlignedRow>,
}

impl AlignedSeries {
    pub fn rows(&self) -> &[AlignedRow] {
        &self.rows
    }

    pub fn compartments(&self) -> &[String] {
        &self.compartments
    }

    pub fn is_normalized(&self) -> bool {
        self.normalized
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Join keys of every row
    pub fn keys(&self) -> Vec<(TimeKey, &str)> {
        self.rows
            .iter()
            .map(|row| (TimeKey::from_time(row.time), row.compartment.as_str()))
            .collect()
    }

    /// Distinct aligned instants, ascending
    pub fn times(&self) -> Vec<f64> {
        let mut times: Vec<f64> = Vec::new();
        for row in &self.rows {
            if times.last() != Some(&row.time) {
                times.push(row.time);
            }
        }
        times
    }
}

/// Align `candidate` against `reference` over `compartments`.
///
/// Both trajectories are first restricted to `compartments` (duplicates are
/// ignored); a compartment missing from either side is a
/// [`CalibrationError::Schema`] error. Without resampling, only instants
/// present in both trajectories survive, so grids that do not coincide
/// compare fewer points. With `normalize`, each side is divided by its own
/// sum over the selected compartments at each instant; a zero sum yields
/// `NaN` for that instant.
pub fn align<S: AsRef<str>>(
    reference: &Trajectory,
    candidate: &Trajectory,
    compartments: &[S],
    options: &AlignOptions,
) -> Result<AlignedSeries> {
    let mut selected: Vec<String> = Vec::with_capacity(compartments.len());
    for name in compartments {
        let name = name.as_ref();
        if !selected.iter().any(|s| s == name) {
            selected.push(name.to_string());
        }
    }

    let reference_idx = column_indices(reference, &selected, TrajectoryRole::Reference)?;
    let candidate_idx = column_indices(candidate, &selected, TrajectoryRole::Candidate)?;

    let mut rows = Vec::new();
    for (row, &time) in reference.rows().iter().zip(reference.times()) {
        let Some(candidate_values) = candidate_at(candidate, &candidate_idx, time, options.resample)
        else {
            continue;
        };
        let mut reference_values: Vec<f64> = reference_idx.iter().map(|&j| row[j]).collect();
        let mut candidate_values = candidate_values;

        if options.normalize {
            to_proportions(&mut reference_values);
            to_proportions(&mut candidate_values);
        }

        for ((name, r), c) in selected.iter().zip(reference_values).zip(candidate_values) {
            rows.push(AlignedRow {
                time,
                compartment: name.clone(),
                reference: r,
                candidate: c,
            });
        }
    }

    Ok(AlignedSeries {
        compartments: selected,
        normalized: options.normalize,
        rows,
    })
}

fn column_indices(
    trajectory: &Trajectory,
    selected: &[String],
    role: TrajectoryRole,
) -> Result<Vec<usize>> {
    selected
        .iter()
        .map(|name| {
            trajectory
                .compartment_index(name)
                .ok_or_else(|| CalibrationError::Schema {
                    compartment: name.clone(),
                    role,
                })
        })
        .collect()
}

/// Candidate values of the selected columns at `time`, if available
fn candidate_at(
    candidate: &Trajectory,
    columns: &[usize],
    time: f64,
    resample: Resample,
) -> Option<Vec<f64>> {
    let pick = |i: usize| -> Vec<f64> { columns.iter().map(|&j| candidate.rows()[i][j]).collect() };

    if let Some(i) = candidate.row_at(time) {
        return Some(pick(i));
    }

    match resample {
        Resample::None => None,
        Resample::Linear => {
            let times = candidate.times();
            let upper = times.partition_point(|&t| t < time);
            if upper == 0 || upper == times.len() {
                return None;
            }
            let lower = upper - 1;
            let weight = (time - times[lower]) / (times[upper] - times[lower]);
            let (a, b) = (pick(lower), pick(upper));
            Some(
                a.iter()
                    .zip(&b)
                    .map(|(lo, hi)| lo + (hi - lo) * weight)
                    .collect(),
            )
        }
    }
}

fn to_proportions(values: &mut [f64]) {
    let total: f64 = values.iter().sum();
    if total == 0.0 {
        values.iter_mut().for_each(|v| *v = f64::NAN);
    } else {
        values.iter_mut().for_each(|v| *v /= total);
    }
}
