use std::collections::BTreeMap;
use rand::Rng;
use crate::distributions::{Declaration, ParameterValue};
use crate::error::{MetaModelError, Result};

/// Declared ranges keyed by parameter name.
pub type Space = BTreeMap<String, Declaration>;

/// One sampled point of a [`Space`].
pub type Assignment = BTreeMap<String, ParameterValue>;

/// Draws one value per declared parameter, uniformly within its range.
pub fn sample_space<R: Rng + ?Sized>(space: &Space, rng: &mut R) -> Result<Assignment> {
    let mut assignment = Assignment::new();
    for (key, declaration) in space {
        let value = declaration.sample(rng).ok_or_else(|| MetaModelError::InvalidParameter {
            layer: "space".to_string(),
            parameter: key.clone(),
            reason: "choice declaration without options".to_string(),
        })?;
        assignment.insert(key.clone(), value);
    }
    Ok(assignment)
}

/// The parameters of a single meta-layer with its namespace stripped.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalParameters {
    layer: String,
    values: BTreeMap<String, ParameterValue>
}

impl LocalParameters {
    pub fn new(layer: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            values: BTreeMap::new()
        }
    }

    pub fn layer(&self) -> &str {
        &self.layer
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<ParameterValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Copy of these parameters with `name` overridden.
    pub fn with(&self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        let mut out = self.clone();
        out.insert(name, value);
        out
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Result<&ParameterValue> {
        self.values.get(name).ok_or_else(|| MetaModelError::MissingParameter {
            layer: self.layer.clone(),
            parameter: name.to_string(),
        })
    }

    fn invalid(&self, name: &str, reason: impl Into<String>) -> MetaModelError {
        MetaModelError::InvalidParameter {
            layer: self.layer.clone(),
            parameter: name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn real(&self, name: &str) -> Result<f64> {
        let value = self.get(name)?;
        value.as_f64().ok_or_else(|| self.invalid(name, format!("expected a number, got {value}")))
    }

    /// A non-negative count; sampled reals are rounded to the nearest integer.
    pub fn count(&self, name: &str) -> Result<usize> {
        let value = self.real(name)?.round();
        if !value.is_finite() || value < 0.0 {
            return Err(self.invalid(name, format!("expected a non-negative count, got {value}")));
        }
        Ok(value as usize)
    }

    pub fn flag(&self, name: &str) -> Result<bool> {
        let value = self.get(name)?;
        value.as_bool().ok_or_else(|| self.invalid(name, format!("expected a boolean, got {value}")))
    }

    pub fn text(&self, name: &str) -> Result<&str> {
        let value = self.get(name)?;
        value.as_str().ok_or_else(|| self.invalid(name, format!("expected a string, got {value}")))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.values.iter()
    }
}
