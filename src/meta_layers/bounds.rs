use serde::{Deserialize, Serialize};
use crate::distributions::Declaration;
use crate::error::{MetaModelError, Result};

/// Inclusive bounds of an integer parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntRange {
    pub min: usize,
    pub max: usize
}

impl IntRange {
    pub const fn new(min: usize, max: usize) -> Self {
        Self { min, max }
    }

    pub const fn fixed(value: usize) -> Self {
        Self { min: value, max: value }
    }

    pub fn is_fixed(&self) -> bool {
        self.min == self.max
    }

    pub fn declaration(&self) -> Declaration {
        Declaration::integer(self.min, self.max)
    }

    pub fn validate(&self, layer: &str, name: &str) -> Result<()> {
        if self.min > self.max {
            return Err(MetaModelError::InvalidConfiguration {
                layer: layer.to_string(),
                reason: format!("min_{name} ({}) is larger than max_{name} ({})", self.min, self.max),
            });
        }
        Ok(())
    }
}

/// Inclusive bounds of a real parameter.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RealRange {
    pub min: f64,
    pub max: f64
}

impl RealRange {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub const fn fixed(value: f64) -> Self {
        Self { min: value, max: value }
    }

    pub fn declaration(&self) -> Declaration {
        Declaration::real(self.min, self.max)
    }

    pub fn validate(&self, layer: &str, name: &str) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min < 0.0 || self.min > self.max {
            return Err(MetaModelError::InvalidConfiguration {
                layer: layer.to_string(),
                reason: format!("{name} range [{}, {}] is not a non-negative interval", self.min, self.max),
            });
        }
        Ok(())
    }

    /// Like [`RealRange::validate`], with the upper end kept below one.
    pub fn validate_rate(&self, layer: &str, name: &str) -> Result<()> {
        self.validate(layer, name)?;
        if self.max >= 1.0 {
            return Err(MetaModelError::InvalidConfiguration {
                layer: layer.to_string(),
                reason: format!("{name} must stay below 1, got max {}", self.max),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(IntRange::new(0, 16).validate("DenseMetaLayer", "units").is_ok());
        assert!(IntRange::new(17, 16).validate("DenseMetaLayer", "units").is_err());
        assert!(RealRange::new(0.0, 0.5).validate_rate("DropoutMetaLayer", "dropout_rate").is_ok());
        assert!(RealRange::new(0.0, 1.0).validate_rate("DropoutMetaLayer", "dropout_rate").is_err());
        assert!(RealRange::new(-0.1, 0.01).validate("DenseMetaLayer", "l1").is_err());
    }
}
