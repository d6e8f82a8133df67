//! Meta-layers: graph nodes that declare a local hyper-parameter space and
//! construct one architectural operation from a sampled point of it.
mod bounds;
mod conv;
mod decorators;
mod dense;
mod pooling;
mod rectangular;
mod structural;

use serde::{Deserialize, Serialize};
use layer_graph::TensorRef;
use crate::error::{MetaModelError, Result};
use crate::space::{LocalParameters, Space};

pub use bounds::{IntRange, RealRange};
pub use conv::{ConvConfig, ConvMetaLayer, ConvRectangularConfig, ConvRectangularMetaLayer};
pub use decorators::{DropoutConfig, DropoutMetaLayer, PoolingConfig, RegularizationConfig};
pub use dense::{DenseConfig, DenseMetaLayer, DenseRectangularMetaLayer, HeadMetaLayer};
pub use pooling::MaxPoolMetaLayer;
pub use structural::{ConcatenateMetaLayer, FlattenMetaLayer, InputMetaLayer, ReshapeMetaLayer};

/// Built predecessors handed to [`MetaLayer::construct`].
#[derive(Clone, Debug)]
pub enum Inputs {
    None,
    Single(TensorRef),
    Many(Vec<TensorRef>),
}

impl From<Vec<TensorRef>> for Inputs {
    fn from(mut value: Vec<TensorRef>) -> Self {
        match value.len() {
            0 => Inputs::None,
            1 => match value.pop() {
                Some(x) => Inputs::Single(x),
                None => Inputs::None,
            },
            _ => Inputs::Many(value),
        }
    }
}

impl Inputs {
    pub fn len(&self) -> usize {
        match self {
            Inputs::None => 0,
            Inputs::Single(_) => 1,
            Inputs::Many(x) => x.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn single(self, layer: &str) -> Result<TensorRef> {
        match self {
            Inputs::Single(x) => Ok(x),
            other => Err(MetaModelError::InvalidInputs {
                layer: layer.to_string(),
                expected: "exactly 1".to_string(),
                received: other.len(),
            }),
        }
    }

    pub fn none(self, layer: &str) -> Result<()> {
        match self {
            Inputs::None => Ok(()),
            other => Err(MetaModelError::InvalidInputs {
                layer: layer.to_string(),
                expected: "no".to_string(),
                received: other.len(),
            }),
        }
    }

    pub fn into_vec(self) -> Vec<TensorRef> {
        match self {
            Inputs::None => vec![],
            Inputs::Single(x) => vec![x],
            Inputs::Many(x) => x,
        }
    }
}

/// A node of a [`crate::meta_graph::MetaGraph`].
pub trait MetaLayer {
    /// Namespace type; must not contain the graph separator.
    fn type_name(&self) -> &str;

    /// Checks construction-time bounds.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Local declarations, keyed by parameter name without namespace.
    fn space(&self) -> Space;

    fn construct(&self, inputs: Inputs, params: &LocalParameters) -> Result<TensorRef>;
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum AnyMetaLayer {
    Input(InputMetaLayer),
    Dense(DenseMetaLayer),
    DenseRectangular(DenseRectangularMetaLayer),
    Head(HeadMetaLayer),
    Conv(ConvMetaLayer),
    ConvRectangular(ConvRectangularMetaLayer),
    MaxPool(MaxPoolMetaLayer),
    Dropout(DropoutMetaLayer),
    Flatten(FlattenMetaLayer),
    Reshape(ReshapeMetaLayer),
    Concatenate(ConcatenateMetaLayer),
}

macro_rules! any_meta_layer {
    ($($variant:ident($layer:ty)),* $(,)?) => {
        $(
            impl From<$layer> for AnyMetaLayer {
                fn from(value: $layer) -> Self {
                    AnyMetaLayer::$variant(value)
                }
            }
        )*

        impl AnyMetaLayer {
            fn as_dyn(&self) -> &dyn MetaLayer {
                match self {
                    $(AnyMetaLayer::$variant(layer) => layer,)*
                }
            }
        }
    };
}

any_meta_layer!(
    Input(InputMetaLayer),
    Dense(DenseMetaLayer),
    DenseRectangular(DenseRectangularMetaLayer),
    Head(HeadMetaLayer),
    Conv(ConvMetaLayer),
    ConvRectangular(ConvRectangularMetaLayer),
    MaxPool(MaxPoolMetaLayer),
    Dropout(DropoutMetaLayer),
    Flatten(FlattenMetaLayer),
    Reshape(ReshapeMetaLayer),
    Concatenate(ConcatenateMetaLayer),
);

impl MetaLayer for AnyMetaLayer {
    fn type_name(&self) -> &str {
        self.as_dyn().type_name()
    }

    fn validate(&self) -> Result<()> {
        self.as_dyn().validate()
    }

    fn space(&self) -> Space {
        self.as_dyn().space()
    }

    fn construct(&self, inputs: Inputs, params: &LocalParameters) -> Result<TensorRef> {
        self.as_dyn().construct(inputs, params)
    }
}

/// Key prefixes of the spatial axes of a rank 1, 2 or 3 operation.
pub(crate) fn axis_prefixes(rank: usize) -> &'static [&'static str] {
    match rank {
        1 => &[""],
        2 => &["x_", "y_"],
        _ => &["x_", "y_", "z_"],
    }
}

pub(crate) fn validate_rank(layer: &str, rank: usize) -> Result<()> {
    if !(1..=3).contains(&rank) {
        return Err(MetaModelError::InvalidConfiguration {
            layer: layer.to_string(),
            reason: format!("spatial rank must be 1, 2 or 3, got {rank}"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use layer_graph::operators;

    #[test]
    fn test_inputs_shape_rule() {
        let x = operators::input(vec![4], None).unwrap();
        assert!(matches!(Inputs::from(vec![]), Inputs::None));
        assert!(matches!(Inputs::from(vec![x.clone()]), Inputs::Single(_)));
        assert!(matches!(Inputs::from(vec![x.clone(), x.clone()]), Inputs::Many(_)));
        assert!(matches!(
            Inputs::from(vec![x.clone(), x]).single("DenseMetaLayer_0"),
            Err(MetaModelError::InvalidInputs { received: 2, .. })
        ));
    }

    #[test]
    fn test_type_names_have_no_separator() {
        let layers: Vec<AnyMetaLayer> = vec![
            InputMetaLayer::new(vec![8]).into(),
            DenseMetaLayer::default().into(),
            DenseRectangularMetaLayer::default().into(),
            HeadMetaLayer::default().into(),
            ConvMetaLayer::new(ConvConfig::for_rank(2)).into(),
            ConvRectangularMetaLayer::new(ConvRectangularConfig::for_rank(3)).into(),
            MaxPoolMetaLayer::new(PoolingConfig::for_rank(1)).into(),
            DropoutMetaLayer::default().into(),
            FlattenMetaLayer.into(),
            ReshapeMetaLayer::new(vec![2, 4]).into(),
            ConcatenateMetaLayer::default().into(),
        ];
        for layer in layers {
            assert!(!layer.type_name().contains('_'), "{}", layer.type_name());
            assert!(layer.validate().is_ok(), "{}", layer.type_name());
        }
    }
}
