//! Nodes without tunable parameters.
use serde::{Deserialize, Serialize};
use layer_graph::{operators, Shape, TensorRef};
use crate::error::{MetaModelError, Result};
use crate::meta_layers::{Inputs, MetaLayer};
use crate::space::{LocalParameters, Space};

/// Graph entry point with a fixed shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InputMetaLayer {
    pub shape: Shape,
    pub name: Option<String>
}

impl InputMetaLayer {
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl MetaLayer for InputMetaLayer {
    fn type_name(&self) -> &str {
        "InputMetaLayer"
    }

    fn validate(&self) -> Result<()> {
        if self.shape.rank() == 0 || self.shape.dims.contains(&0) {
            return Err(MetaModelError::InvalidConfiguration {
                layer: self.type_name().to_string(),
                reason: format!("input shape {} must be non-empty", self.shape),
            });
        }
        Ok(())
    }

    fn space(&self) -> Space {
        Space::new()
    }

    fn construct(&self, inputs: Inputs, params: &LocalParameters) -> Result<TensorRef> {
        inputs.none(params.layer())?;
        Ok(operators::input(self.shape.clone(), self.name.clone())?)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FlattenMetaLayer;

impl MetaLayer for FlattenMetaLayer {
    fn type_name(&self) -> &str {
        "FlattenMetaLayer"
    }

    fn space(&self) -> Space {
        Space::new()
    }

    fn construct(&self, inputs: Inputs, params: &LocalParameters) -> Result<TensorRef> {
        let input = inputs.single(params.layer())?;
        Ok(operators::flatten(&input)?)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReshapeMetaLayer {
    pub target_shape: Shape
}

impl ReshapeMetaLayer {
    pub fn new(target_shape: impl Into<Shape>) -> Self {
        Self { target_shape: target_shape.into() }
    }
}

impl MetaLayer for ReshapeMetaLayer {
    fn type_name(&self) -> &str {
        "ReshapeMetaLayer"
    }

    fn validate(&self) -> Result<()> {
        if self.target_shape.rank() == 0 {
            return Err(MetaModelError::InvalidConfiguration {
                layer: self.type_name().to_string(),
                reason: "target shape must not be empty".to_string(),
            });
        }
        Ok(())
    }

    fn space(&self) -> Space {
        Space::new()
    }

    fn construct(&self, inputs: Inputs, params: &LocalParameters) -> Result<TensorRef> {
        let input = inputs.single(params.layer())?;
        Ok(operators::reshape(&input, self.target_shape.clone())?)
    }
}

/// Joins its predecessors along `axis`, the feature axis by default.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConcatenateMetaLayer {
    pub axis: isize
}

impl Default for ConcatenateMetaLayer {
    fn default() -> Self {
        Self { axis: -1 }
    }
}

impl MetaLayer for ConcatenateMetaLayer {
    fn type_name(&self) -> &str {
        "ConcatenateMetaLayer"
    }

    fn space(&self) -> Space {
        Space::new()
    }

    fn construct(&self, inputs: Inputs, params: &LocalParameters) -> Result<TensorRef> {
        if inputs.is_empty() {
            return Err(MetaModelError::InvalidInputs {
                layer: params.layer().to_string(),
                expected: "at least 1".to_string(),
                received: 0,
            });
        }
        Ok(operators::concatenate(inputs.into_vec(), self.axis)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_rejects_predecessors() {
        let layer = InputMetaLayer::new(vec![4]);
        let x = operators::input(vec![4], None).unwrap();
        let params = LocalParameters::new("InputMetaLayer_0");
        assert!(matches!(
            layer.construct(Inputs::Single(x), &params),
            Err(MetaModelError::InvalidInputs { received: 1, .. })
        ));
        assert!(InputMetaLayer::new(vec![4, 0]).validate().is_err());
    }

    #[test]
    fn test_concatenate_and_reshape() {
        let a = operators::input(vec![10], None).unwrap();
        let b = operators::input(vec![6], None).unwrap();
        let params = LocalParameters::new("ConcatenateMetaLayer_0");
        let joined = ConcatenateMetaLayer::default().construct(Inputs::Many(vec![a, b]), &params).unwrap();
        assert_eq!(joined.shape().dims, vec![16]);
        let reshaped = ReshapeMetaLayer::new(vec![4, 4]).construct(Inputs::Single(joined), &params).unwrap();
        assert_eq!(reshaped.shape().dims, vec![4, 4]);
        assert!(ConcatenateMetaLayer::default().construct(Inputs::None, &params).is_err());
    }
}
