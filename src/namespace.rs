use std::collections::HashMap;
use std::fmt;
use serde::{Deserialize, Serialize};
use crate::error::{MetaModelError, Result};

pub const DEFAULT_SEPARATOR: &str = "_";

/// The unique prefix of one meta-layer instance, e.g. `DenseMetaLayer_3`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    type_name: String,
    id: usize,
    separator: String
}

impl Namespace {
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn prefix(&self) -> String {
        format!("{}{}{}", self.type_name, self.separator, self.id)
    }

    /// Fully qualified name of a local parameter.
    pub fn key(&self, local: &str) -> String {
        format!("{}{}{}{}{}", self.type_name, self.separator, self.id, self.separator, local)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// Hands out sequential instance ids per type name.
///
/// Every graph owns one of these, so two graphs never share counters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Namespacer {
    separator: String,
    counters: HashMap<String, usize>
}

impl Default for Namespacer {
    fn default() -> Self {
        Self::new(DEFAULT_SEPARATOR)
    }
}

impl Namespacer {
    pub fn new(separator: impl Into<String>) -> Self {
        Self {
            separator: separator.into(),
            counters: HashMap::new()
        }
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    pub fn allocate(&mut self, type_name: &str) -> Result<Namespace> {
        if type_name.is_empty() || self.separator.is_empty() || type_name.contains(self.separator.as_str()) {
            return Err(MetaModelError::InvalidConfiguration {
                layer: type_name.to_string(),
                reason: format!("type name must be non-empty and must not contain separator {:?}", self.separator),
            });
        }
        let counter = self.counters.entry(type_name.to_string()).or_insert(0);
        let id = *counter;
        *counter += 1;
        log::trace!("Allocated namespace {type_name}{}{id}", self.separator);
        Ok(Namespace {
            type_name: type_name.to_string(),
            id,
            separator: self.separator.clone(),
        })
    }

    /// Zeroes every counter.
    pub fn reset(&mut self) {
        self.counters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_sequential_per_type() {
        let mut namespacer = Namespacer::default();
        let a = namespacer.allocate("DenseMetaLayer").unwrap();
        let b = namespacer.allocate("DenseMetaLayer").unwrap();
        let c = namespacer.allocate("Conv1DMetaLayer").unwrap();
        assert_eq!(a.prefix(), "DenseMetaLayer_0");
        assert_eq!(b.prefix(), "DenseMetaLayer_1");
        assert_eq!(c.prefix(), "Conv1DMetaLayer_0");
        assert_eq!(b.key("units"), "DenseMetaLayer_1_units");
    }

    #[test]
    fn test_reset_restarts_ids() {
        let mut namespacer = Namespacer::default();
        namespacer.allocate("DenseMetaLayer").unwrap();
        namespacer.reset();
        assert_eq!(namespacer.allocate("DenseMetaLayer").unwrap().id(), 0);
    }

    #[test]
    fn test_separator_in_type_name_is_rejected() {
        let mut namespacer = Namespacer::default();
        assert!(matches!(
            namespacer.allocate("Dense_Layer"),
            Err(MetaModelError::InvalidConfiguration { .. })
        ));
        let mut namespacer = Namespacer::new("::");
        assert_eq!(namespacer.allocate("Dense_Layer").unwrap().key("units"), "Dense_Layer::0::units");
    }
}
