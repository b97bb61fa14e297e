use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// A parameter definition with its value and optional description
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Parameter {
    pub id: String,
    pub value: f64,
    pub description: Option<String>,
}

impl Parameter {
    pub fn new(id: impl Into<String>, value: f64) -> Self {
        Self {
            id: id.into(),
            value,
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// How unknown keys in an override map are treated when merged onto a base set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Reject override keys absent from the base set
    #[default]
    Strict,
    /// Silently ignore override keys absent from the base set
    Permissive,
}

/// Full set of named parameter values consumed by a simulation engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, f64>);

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the values of a list of parameter definitions
    pub fn from_parameters(parameters: &[Parameter]) -> Self {
        parameters
            .iter()
            .map(|p| (p.id.clone(), p.value))
            .collect()
    }

    pub fn insert(&mut self, id: impl Into<String>, value: f64) -> Option<f64> {
        self.0.insert(id.into(), value)
    }

    pub fn get(&self, id: &str) -> Option<f64> {
        self.0.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Return a copy of `self` with `overrides` applied on top.
    ///
    /// Keys missing from `overrides` keep their base value. Under
    /// [`MergePolicy::Strict`] an override key that `self` does not define is
    /// an error; under [`MergePolicy::Permissive`] it is dropped.
    pub fn merged(
        &self,
        overrides: &ParameterSet,
        policy: MergePolicy,
    ) -> Result<ParameterSet, ParameterError> {
        let mut merged = self.clone();
        for (id, value) in overrides.iter() {
            match merged.0.get_mut(id) {
                Some(slot) => *slot = value,
                None => match policy {
                    MergePolicy::Strict => {
                        return Err(ParameterError::Unknown {
                            id: id.to_string(),
                            available: self.names().collect::<Vec<_>>().join(", "),
                        });
                    }
                    MergePolicy::Permissive => {}
                },
            }
        }
        Ok(merged)
    }
}

impl FromIterator<(String, f64)> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<(&'a str, f64)> for ParameterSet {
    fn from_iter<T: IntoIterator<Item = (&'a str, f64)>>(iter: T) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }
}
