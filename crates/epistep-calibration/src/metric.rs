//! Scalar error metrics over an aligned series

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::alignment::AlignedSeries;
use crate::error::CalibrationError;

/// Non-negative divergence between reference and candidate; lower is better.
///
/// Only comparable between evaluations sharing metric, normalisation,
/// compartment set and reference. `NaN` means there was nothing to compare.
pub type ErrorScore = f64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Mean absolute error: sum(|ref - cand|) / n
    Mae,
    /// Mean squared error: sum((ref - cand)^2) / n
    #[default]
    Mse,
}

impl MetricKind {
    fn row_error(self, difference: f64) -> f64 {
        match self {
            MetricKind::Mae => difference.abs(),
            MetricKind::Mse => difference * difference,
        }
    }
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Mae => write!(f, "Mean Absolute Error"),
            MetricKind::Mse => write!(f, "Mean Squared Error"),
        }
    }
}

impl FromStr for MetricKind {
    type Err = CalibrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mae" | "mean_absolute_error" => Ok(MetricKind::Mae),
            "mse" | "mean_squared_error" => Ok(MetricKind::Mse),
            _ => Err(CalibrationError::InvalidMetricKind(s.to_string())),
        }
    }
}

/// Reduce an aligned series to the mean of its per-row errors.
///
/// Rows whose difference is `NaN` (zero-sum time points after normalisation)
/// are left out of both the sum and the count. A series with no usable rows
/// scores `NaN`.
pub fn score(series: &AlignedSeries, kind: MetricKind) -> ErrorScore {
    mean_error(
        series
            .rows()
            .iter()
            .map(|row| row.reference - row.candidate),
        kind,
    )
}

/// Parse `kind` and score; the string form used by configs and reports
pub fn score_named(series: &AlignedSeries, kind: &str) -> Result<ErrorScore, CalibrationError> {
    Ok(score(series, kind.parse()?))
}

/// Score each compartment separately
pub fn score_by_compartment(
    series: &AlignedSeries,
    kind: MetricKind,
) -> BTreeMap<String, ErrorScore> {
    series
        .compartments()
        .iter()
        .map(|compartment| {
            let differences = series
                .rows()
                .iter()
                .filter(|row| &row.compartment == compartment)
                .map(|row| row.reference - row.candidate);
            (compartment.clone(), mean_error(differences, kind))
        })
        .collect()
}

fn mean_error(differences: impl Iterator<Item = f64>, kind: MetricKind) -> ErrorScore {
    let (total, count) = differences
        .filter(|d| !d.is_nan())
        .map(|d| kind.row_error(d))
        .fold((0.0, 0usize), |(sum, count), error| (sum + error, count + 1));

    if count > 0 {
        total / count as f64
    } else {
        f64::NAN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::{AlignOptions, align};
    use approx::assert_relative_eq;
    use epistep_core::Trajectory;

    fn si(rows: Vec<(f64, Vec<f64>)>) -> Trajectory {
        Trajectory::from_rows(vec!["S".to_string(), "I".to_string()], rows).unwrap()
    }

    fn series(reference: &[f64], candidate: &[f64]) -> AlignedSeries {
        let names = vec!["X".to_string()];
        let r = Trajectory::from_rows(
            names.clone(),
            reference.iter().enumerate().map(|(i, v)| (i as f64, vec![*v])),
        )
        .unwrap();
        let c = Trajectory::from_rows(
            names.clone(),
            candidate.iter().enumerate().map(|(i, v)| (i as f64, vec![*v])),
        )
        .unwrap();
        align(&r, &c, &names, &AlignOptions::raw()).unwrap()
    }

    #[test]
    fn test_mae_two_compartment_scenario() {
        let reference = si(vec![(0.0, vec![100.0, 0.0]), (1.0, vec![90.0, 10.0])]);
        let candidate = si(vec![(0.0, vec![100.0, 0.0]), (1.0, vec![95.0, 5.0])]);
        let compartments = ["S", "I"];

        let at_t1 = Trajectory::from_rows(
            vec!["S".to_string(), "I".to_string()],
            vec![(1.0, vec![90.0, 10.0])],
        )
        .unwrap();
        let aligned = align(&at_t1, &candidate, &compartments, &AlignOptions::raw()).unwrap();
        assert_relative_eq!(score(&aligned, MetricKind::Mae), 5.0);

        let both = align(&reference, &candidate, &compartments, &AlignOptions::raw()).unwrap();
        assert_relative_eq!(score(&both, MetricKind::Mae), 2.5);
        assert_relative_eq!(score(&both, MetricKind::Mse), 12.5);
    }

    #[test]
    fn test_identical_series_score_zero() {
        let s = series(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]);
        assert_eq!(score(&s, MetricKind::Mae), 0.0);
        assert_eq!(score(&s, MetricKind::Mse), 0.0);
    }

    #[test]
    fn test_scores_are_non_negative() {
        let s = series(&[1.0, -2.0, 3.0], &[4.0, 2.0, -3.0]);
        assert!(score(&s, MetricKind::Mae) >= 0.0);
        assert!(score(&s, MetricKind::Mse) >= 0.0);
    }

    #[test]
    fn test_mse_more_sensitive_to_outliers() {
        let small = vec![0.1; 20];
        let mut previous_ratio = 0.0;
        for outlier in [1.0, 5.0, 25.0] {
            let mut candidate = small.clone();
            candidate[7] = outlier;
            let s = series(&vec![0.0; 20], &candidate);
            let ratio = score(&s, MetricKind::Mse) / score(&s, MetricKind::Mae);
            assert!(ratio > previous_ratio);
            previous_ratio = ratio;
        }
    }

    #[test]
    fn test_nan_rows_are_excluded_not_zeroed() {
        let reference = si(vec![(0.0, vec![0.0, 0.0]), (1.0, vec![50.0, 50.0])]);
        let candidate = si(vec![(0.0, vec![10.0, 0.0]), (1.0, vec![75.0, 25.0])]);
        let aligned = align(&reference, &candidate, &["S", "I"], &AlignOptions::default()).unwrap();

        // t=0 has a zero reference sum, so only the two t=1 rows count
        assert_relative_eq!(score(&aligned, MetricKind::Mae), 0.25);
    }

    #[test]
    fn test_empty_series_scores_nan() {
        let reference = si(vec![(0.0, vec![100.0, 0.0])]);
        let candidate = si(vec![(0.5, vec![100.0, 0.0])]);
        let aligned = align(&reference, &candidate, &["S"], &AlignOptions::raw()).unwrap();

        assert!(aligned.is_empty());
        assert!(score(&aligned, MetricKind::Mse).is_nan());
        assert!(score(&aligned, MetricKind::Mae).is_nan());
    }

    #[test]
    fn test_parse_metric_kind() {
        assert_eq!("MAE".parse::<MetricKind>().unwrap(), MetricKind::Mae);
        assert_eq!(" mse ".parse::<MetricKind>().unwrap(), MetricKind::Mse);
        assert!(matches!(
            "rmse".parse::<MetricKind>(),
            Err(CalibrationError::InvalidMetricKind(kind)) if kind == "rmse"
        ));

        let s = series(&[1.0], &[3.0]);
        assert_relative_eq!(score_named(&s, "mse").unwrap(), 4.0);
        assert!(score_named(&s, "huber").is_err());
    }

    #[test]
    fn test_score_by_compartment() {
        let reference = si(vec![(0.0, vec![100.0, 0.0]), (1.0, vec![90.0, 10.0])]);
        let candidate = si(vec![(0.0, vec![100.0, 0.0]), (1.0, vec![94.0, 5.0])]);
        let aligned = align(&reference, &candidate, &["S", "I"], &AlignOptions::raw()).unwrap();

        let by_compartment = score_by_compartment(&aligned, MetricKind::Mae);
        assert_relative_eq!(by_compartment["S"], 2.0);
        assert_relative_eq!(by_compartment["I"], 2.5);
    }
}
