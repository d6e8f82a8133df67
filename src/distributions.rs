//! Declarations of tunable parameters and the values sampled from them.
use std::fmt;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Relative tolerance used when deciding whether two bounds coincide.
pub const RELATIVE_TOLERANCE: f64 = 1e-5;
/// Absolute tolerance used when deciding whether two bounds coincide.
pub const ABSOLUTE_TOLERANCE: f64 = 1e-8;

/// Asymmetric closeness test, `|a - b| <= atol + rtol * |b|`.
pub fn is_close(a: f64, b: f64) -> bool {
    if a == b {
        return true;
    }
    if !a.is_finite() || !b.is_finite() {
        return false;
    }
    (a - b).abs() <= ABSOLUTE_TOLERANCE + RELATIVE_TOLERANCE * b.abs()
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    Real,
    Integer,
    Choice,
}

/// A concrete value for one parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl ParameterValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Integer(x) => Some(*x as f64),
            ParameterValue::Real(x) => Some(*x),
            ParameterValue::Bool(_) | ParameterValue::Text(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::Text(x) => Some(x),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Bool(x) => write!(f, "{x}"),
            ParameterValue::Integer(x) => write!(f, "{x}"),
            ParameterValue::Real(x) => write!(f, "{x}"),
            ParameterValue::Text(x) => write!(f, "{x}"),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Integer(value)
    }
}

impl From<usize> for ParameterValue {
    fn from(value: usize) -> Self {
        ParameterValue::Integer(value as i64)
    }
}

impl From<f64> for ParameterValue {
    fn from(value: f64) -> Self {
        ParameterValue::Real(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::Text(value.to_string())
    }
}

/// The declared range of a tunable parameter, as handed to a search back-end.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "distribution", rename_all = "lowercase")]
pub enum Declaration {
    Real {
        low: f64,
        high: f64
    },
    Integer {
        low: i64,
        high: i64
    },
    Choice {
        options: Vec<ParameterValue>
    },
}

impl Declaration {
    pub fn real(low: f64, high: f64) -> Self {
        Declaration::Real { low, high }
    }

    pub fn integer(low: usize, high: usize) -> Self {
        Declaration::Integer { low: low as i64, high: high as i64 }
    }

    pub fn choice(options: impl IntoIterator<Item = impl Into<ParameterValue>>) -> Self {
        Declaration::Choice { options: options.into_iter().map(Into::into).collect() }
    }

    pub fn distribution(&self) -> Distribution {
        match self {
            Declaration::Real { .. } => Distribution::Real,
            Declaration::Integer { .. } => Distribution::Integer,
            Declaration::Choice { .. } => Distribution::Choice,
        }
    }

    /// The value a degenerate range collapses to, if its bounds coincide.
    ///
    /// Only ranges collapse; a range whose low end merely touches zero stays
    /// tunable.
    pub fn fixed_value(&self) -> Option<ParameterValue> {
        match self {
            Declaration::Real { low, high } if is_close(*low, *high) => Some(ParameterValue::Real(*low)),
            Declaration::Integer { low, high } if low == high => Some(ParameterValue::Integer(*low)),
            _ => None,
        }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<ParameterValue> {
        match self {
            Declaration::Real { low, high } => {
                if high <= low {
                    return Some(ParameterValue::Real(*low));
                }
                Some(ParameterValue::Real(rng.gen_range(*low..=*high)))
            }
            Declaration::Integer { low, high } => {
                if high <= low {
                    return Some(ParameterValue::Integer(*low));
                }
                Some(ParameterValue::Integer(rng.gen_range(*low..=*high)))
            }
            Declaration::Choice { options } => {
                if options.is_empty() {
                    return None;
                }
                Some(options[rng.gen_range(0..options.len())].clone())
            }
        }
    }

    pub fn contains(&self, value: &ParameterValue) -> bool {
        match self {
            Declaration::Real { low, high } => value.as_f64().is_some_and(|x| x >= *low && x <= *high),
            Declaration::Integer { low, high } => value
                .as_f64()
                .is_some_and(|x| x >= *low as f64 && x <= *high as f64),
            Declaration::Choice { options } => options.contains(value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_is_close() {
        assert!(is_close(0.0, 0.0));
        assert!(is_close(0.0, 1e-9));
        assert!(is_close(0.01, 0.01 + 1e-9));
        assert!(!is_close(0.0, 0.01));
        assert!(!is_close(0.0, f64::NAN));
    }

    #[test]
    fn test_fixed_value_only_for_coinciding_bounds() {
        assert_eq!(Declaration::integer(1, 1).fixed_value(), Some(ParameterValue::Integer(1)));
        assert_eq!(Declaration::real(0.0, 0.0).fixed_value(), Some(ParameterValue::Real(0.0)));
        assert_eq!(Declaration::real(0.0, 5.0).fixed_value(), None);
        assert_eq!(Declaration::integer(0, 16).fixed_value(), None);
        assert_eq!(Declaration::choice(["relu"]).fixed_value(), None);
    }

    #[test]
    fn test_sample_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let declarations = [
            Declaration::integer(0, 16),
            Declaration::real(0.0, 0.5),
            Declaration::choice(["relu", "tanh"]),
        ];
        for _ in 0..100 {
            for declaration in &declarations {
                let value = declaration.sample(&mut rng).unwrap();
                assert!(declaration.contains(&value), "{value} outside {declaration:?}");
            }
        }
    }

    #[test]
    fn test_declaration_json_shape() {
        let json = serde_json::to_string(&Declaration::integer(0, 512)).unwrap();
        assert_eq!(json, r#"{"distribution":"integer","low":0,"high":512}"#);
        let value: ParameterValue = serde_json::from_str("3").unwrap();
        assert_eq!(value, ParameterValue::Integer(3));
        let value: ParameterValue = serde_json::from_str("0.25").unwrap();
        assert_eq!(value, ParameterValue::Real(0.25));
    }
}
