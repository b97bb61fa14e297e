use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Specifies the fraction of population in a particular compartment
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompartmentFraction {
    pub compartment: String,
    pub fraction: f64,
}

/// Initial population of each compartment handed to the engine.
///
/// Keys name the compartments the engine reports on; the resulting
/// trajectory has one column per key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InitialValues(BTreeMap<String, f64>);

impl InitialValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Split `population_size` across compartments by fraction.
    /// Compartments that are not listed start empty.
    pub fn from_fractions(population_size: u64, fractions: &[CompartmentFraction]) -> Self {
        fractions
            .iter()
            .map(|f| (f.compartment.clone(), population_size as f64 * f.fraction))
            .collect()
    }

    pub fn insert(&mut self, compartment: impl Into<String>, value: f64) -> Option<f64> {
        self.0.insert(compartment.into(), value)
    }

    pub fn get(&self, compartment: &str) -> Option<f64> {
        self.0.get(compartment).copied()
    }

    pub fn compartments(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Total population across compartments
    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, f64)> for InitialValues {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, f64)> for InitialValues {
    fn from_iter<T: IntoIterator<Item = (&'a str, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}
