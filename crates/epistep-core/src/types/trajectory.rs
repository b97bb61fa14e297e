//! Time-indexed compartment populations produced by one simulation run

use serde::{Deserialize, Serialize};

use crate::error::TrajectoryError;

/// Resolution used to turn floating-point times into join keys.
///
/// Grids built as `k * dt` drift by a few ulps (`3 * 0.1 != 0.3`), so two
/// instants closer than this are treated as the same instant.
pub const TIME_RESOLUTION: f64 = 1e-9;

/// Quantised time used as a join key between trajectories
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeKey(i64);

impl TimeKey {
    /// Quantise a time onto the [`TIME_RESOLUTION`] grid
    pub fn from_time(time: f64) -> Self {
        Self((time / TIME_RESOLUTION).round() as i64)
    }
}

/// An ordered sequence of time points, each carrying one value per compartment.
///
/// Values are stored row-major: `values[i][j]` is the population (or
/// proportion) of `compartments[j]` at `times[i]`. Construction checks that
/// times are finite and strictly increasing on the [`TimeKey`] grid, that
/// compartment names are unique, and that every row has one value per
/// compartment. Deserialization goes through the same checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrajectory")]
pub struct Trajectory {
    compartments: Vec<String>,
    times: Vec<f64>,
    values: Vec<Vec<f64>>,
}

/// Unvalidated wire form of a [`Trajectory`]
#[derive(Deserialize)]
struct RawTrajectory {
    compartments: Vec<String>,
    times: Vec<f64>,
    values: Vec<Vec<f64>>,
}

impl TryFrom<RawTrajectory> for Trajectory {
    type Error = TrajectoryError;

    fn try_from(raw: RawTrajectory) -> Result<Self, Self::Error> {
        Trajectory::new(raw.compartments, raw.times, raw.values)
    }
}

impl Trajectory {
    /// Create a trajectory from its columns and rows
    pub fn new(
        compartments: Vec<String>,
        times: Vec<f64>,
        values: Vec<Vec<f64>>,
    ) -> Result<Self, TrajectoryError> {
        for (i, name) in compartments.iter().enumerate() {
            if compartments[..i].contains(name) {
                return Err(TrajectoryError::DuplicateCompartment(name.clone()));
            }
        }

        if times.len() != values.len() {
            return Err(TrajectoryError::RowCountMismatch {
                times: times.len(),
                rows: values.len(),
            });
        }

        for (index, row) in values.iter().enumerate() {
            if row.len() != compartments.len() {
                return Err(TrajectoryError::RowWidth {
                    index,
                    expected: compartments.len(),
                    found: row.len(),
                });
            }
        }

        for (index, &time) in times.iter().enumerate() {
            if !time.is_finite() {
                return Err(TrajectoryError::NonFiniteTime { index });
            }
            if index > 0 && TimeKey::from_time(time) <= TimeKey::from_time(times[index - 1]) {
                return Err(TrajectoryError::NonIncreasingTime {
                    index,
                    previous: times[index - 1],
                    current: time,
                });
            }
        }

        Ok(Self {
            compartments,
            times,
            values,
        })
    }

    /// Build a trajectory from `(time, row)` pairs
    pub fn from_rows<I>(compartments: Vec<String>, rows: I) -> Result<Self, TrajectoryError>
    where
        I: IntoIterator<Item = (f64, Vec<f64>)>,
    {
        let (times, values) = rows.into_iter().unzip();
        Self::new(compartments, times, values)
    }

    /// Entrywise mean of replicate trajectories sharing one grid and one compartment set
    pub fn mean(replicates: &[Trajectory]) -> Result<Self, TrajectoryError> {
        let (first, rest) = replicates
            .split_first()
            .ok_or(TrajectoryError::NoReplicates)?;

        for (index, other) in rest.iter().enumerate() {
            let same_grid = other.compartments == first.compartments
                && other.times.len() == first.times.len()
                && other
                    .times
                    .iter()
                    .zip(&first.times)
                    .all(|(a, b)| TimeKey::from_time(*a) == TimeKey::from_time(*b));
            if !same_grid {
                return Err(TrajectoryError::ReplicateMismatch { index: index + 1 });
            }
        }

        let count = replicates.len() as f64;
        let mut values = first.values.clone();
        for other in rest {
            for (row, other_row) in values.iter_mut().zip(&other.values) {
                for (value, other_value) in row.iter_mut().zip(other_row) {
                    *value += other_value;
                }
            }
        }
        for row in &mut values {
            for value in row.iter_mut() {
                *value /= count;
            }
        }

        Ok(Self {
            compartments: first.compartments.clone(),
            times: first.times.clone(),
            values,
        })
    }

    pub fn compartments(&self) -> &[String] {
        &self.compartments
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.values
    }

    /// Number of time points
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Column index of a compartment
    pub fn compartment_index(&self, name: &str) -> Option<usize> {
        self.compartments.iter().position(|c| c == name)
    }

    /// All values of one compartment, in time order
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        let idx = self.compartment_index(name)?;
        Some(self.values.iter().map(|row| row[idx]).collect())
    }

    /// Value of a compartment at a time point (by row index)
    pub fn value(&self, row: usize, name: &str) -> Option<f64> {
        let idx = self.compartment_index(name)?;
        self.values.get(row).map(|r| r[idx])
    }

    /// Row index of the time point matching `time` on the quantised grid
    pub fn row_at(&self, time: f64) -> Option<usize> {
        let key = TimeKey::from_time(time);
        self.times
            .binary_search_by(|t| TimeKey::from_time(*t).cmp(&key))
            .ok()
    }

    /// Sum over all compartments at every time point
    pub fn totals(&self) -> Vec<f64> {
        self.values.iter().map(|row| row.iter().sum()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn si(rows: Vec<(f64, Vec<f64>)>) -> Trajectory {
        Trajectory::from_rows(vec!["S".to_string(), "I".to_string()], rows).unwrap()
    }

    #[test]
    fn test_new_rejects_non_increasing_times() {
        let result = Trajectory::from_rows(
            vec!["S".to_string()],
            vec![(0.0, vec![1.0]), (1.0, vec![1.0]), (1.0, vec![1.0])],
        );
        assert!(matches!(
            result,
            Err(TrajectoryError::NonIncreasingTime { index: 2, .. })
        ));
    }

    #[test]
    fn test_new_rejects_ragged_rows() {
        let result = Trajectory::from_rows(
            vec!["S".to_string(), "I".to_string()],
            vec![(0.0, vec![1.0, 0.0]), (1.0, vec![1.0])],
        );
        assert!(matches!(
            result,
            Err(TrajectoryError::RowWidth {
                index: 1,
                expected: 2,
                found: 1
            })
        ));
    }

    #[test]
    fn test_new_rejects_duplicate_compartments() {
        let result = Trajectory::new(
            vec!["S".to_string(), "S".to_string()],
            vec![0.0],
            vec![vec![1.0, 2.0]],
        );
        assert!(matches!(result, Err(TrajectoryError::DuplicateCompartment(name)) if name == "S"));
    }

    #[test]
    fn test_new_rejects_times_on_the_same_key() {
        let result = Trajectory::from_rows(
            vec!["S".to_string()],
            vec![(0.0, vec![1.0]), (1.0, vec![1.0]), (1.0 + 1e-12, vec![1.0])],
        );
        assert!(matches!(
            result,
            Err(TrajectoryError::NonIncreasingTime { index: 2, .. })
        ));

        let spaced = Trajectory::from_rows(
            vec!["S".to_string()],
            vec![(0.0, vec![1.0]), (1e-8, vec![1.0])],
        );
        assert!(spaced.is_ok());
    }

    #[test]
    fn test_row_at_tolerates_float_drift() {
        let times: Vec<f64> = (0..5).map(|k| k as f64 * 0.1).collect();
        let rows = times.iter().map(|&t| (t, vec![1.0, 0.0])).collect();
        let trajectory = si(rows);

        assert_eq!(trajectory.row_at(0.3), Some(3));
        assert_eq!(trajectory.row_at(0.35), None);
    }

    #[test]
    fn test_column_and_value_lookup() {
        let trajectory = si(vec![(0.0, vec![100.0, 0.0]), (1.0, vec![90.0, 10.0])]);

        assert_eq!(trajectory.column("I"), Some(vec![0.0, 10.0]));
        assert_eq!(trajectory.value(1, "S"), Some(90.0));
        assert_eq!(trajectory.column("R"), None);
        assert_eq!(trajectory.totals(), vec![100.0, 100.0]);
    }

    #[test]
    fn test_mean_of_replicates() {
        let a = si(vec![(0.0, vec![100.0, 0.0]), (1.0, vec![90.0, 10.0])]);
        let b = si(vec![(0.0, vec![100.0, 0.0]), (1.0, vec![80.0, 20.0])]);

        let mean = Trajectory::mean(&[a, b]).unwrap();
        assert_relative_eq!(mean.value(1, "S").unwrap(), 85.0);
        assert_relative_eq!(mean.value(1, "I").unwrap(), 15.0);
    }

    #[test]
    fn test_mean_rejects_mismatched_grids() {
        let a = si(vec![(0.0, vec![100.0, 0.0]), (1.0, vec![90.0, 10.0])]);
        let b = si(vec![(0.0, vec![100.0, 0.0]), (2.0, vec![80.0, 20.0])]);

        assert!(matches!(
            Trajectory::mean(&[a, b]),
            Err(TrajectoryError::ReplicateMismatch { index: 1 })
        ));
        assert!(matches!(
            Trajectory::mean(&[]),
            Err(TrajectoryError::NoReplicates)
        ));
    }

    #[test]
    fn test_serde_round_trip_keeps_validation_shape() {
        let trajectory = si(vec![(0.0, vec![100.0, 0.0]), (1.0, vec![90.0, 10.0])]);
        let json = serde_json::to_string(&trajectory).unwrap();
        let back: Trajectory = serde_json::from_str(&json).unwrap();
        assert_eq!(back, trajectory);
    }

    #[test]
    fn test_deserialize_validates_input() {
        let duplicate = r#"{"compartments":["S","S"],"times":[0.0],"values":[[1.0,2.0]]}"#;
        let err = serde_json::from_str::<Trajectory>(duplicate).unwrap_err();
        assert!(err.to_string().contains("more than once"));

        let backwards = r#"{"compartments":["S"],"times":[1.0,0.0],"values":[[1.0],[2.0]]}"#;
        assert!(serde_json::from_str::<Trajectory>(backwards).is_err());

        let ragged = r#"{"compartments":["S","I"],"times":[0.0,1.0],"values":[[1.0,0.0],[1.0]]}"#;
        let err = serde_json::from_str::<Trajectory>(ragged).unwrap_err();
        assert!(err.to_string().contains("Row 1 has 1 values"));
    }
}
