use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use serde::{Deserialize, Serialize};
use crate::LayerGraphError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Shape {
    pub dims: Vec<usize>
}

impl Shape {
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    /// Resolves a possibly negative axis against the rank.
    pub fn axis(&self, index: isize) -> Result<usize, LayerGraphError> {
        let rank = self.rank() as isize;
        let axis = if index < 0 { rank + index } else { index };
        if axis < 0 || axis >= rank {
            return Err(LayerGraphError::InvalidAxis { axis: index, rank: self.rank() });
        }
        Ok(axis as usize)
    }

    pub fn dim(&self, index: isize) -> Result<usize, LayerGraphError> {
        Ok(self.dims[self.axis(index)?])
    }

    pub fn num_elements(&self) -> usize {
        self.dims.iter().product()
    }

    pub(crate) fn with_last(&self, value: usize) -> Self {
        let mut dims = self.dims.clone();
        if let Some(last) = dims.last_mut() {
            *last = value;
        }
        Self { dims }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.dims.iter().map(|x| x.to_string()).collect::<Vec<_>>().join("x"))
    }
}

impl From<Vec<usize>> for Shape {
    fn from(value: Vec<usize>) -> Self {
        Self { dims: value }
    }
}

impl From<&[usize]> for Shape {
    fn from(value: &[usize]) -> Self {
        Self { dims: value.to_vec() }
    }
}

impl From<usize> for Shape {
    fn from(value: usize) -> Self {
        Self { dims: vec![value] }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display, strum_macros::EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    Linear,
    Relu,
    Elu,
    Selu,
    Gelu,
    Sigmoid,
    Softmax,
    Softplus,
    Swish,
    Tanh,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Regularizer {
    pub l1: Option<f64>,
    pub l2: Option<f64>
}

impl Regularizer {
    pub fn is_empty(&self) -> bool {
        self.l1.is_none() && self.l2.is_none()
    }
}

impl fmt::Display for Regularizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.l1, self.l2) {
            (Some(l1), Some(l2)) => write!(f, "l1={l1},l2={l2}"),
            (Some(l1), None) => write!(f, "l1={l1}"),
            (None, Some(l2)) => write!(f, "l2={l2}"),
            (None, None) => write!(f, "none"),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Regularizers {
    pub kernel: Option<Regularizer>,
    pub bias: Option<Regularizer>,
    pub activity: Option<Regularizer>
}

impl Regularizers {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.kernel.is_none() && self.bias.is_none() && self.activity.is_none()
    }
}

/// The operation that produced a tensor, holding references to its inputs.
#[derive(Clone, Debug)]
pub enum Layer {
    Input,
    Dense {
        input: TensorRef,
        units: usize,
        regularizers: Regularizers
    },
    BatchNormalization {
        input: TensorRef
    },
    Activation {
        input: TensorRef,
        activation: Activation
    },
    Conv {
        input: TensorRef,
        filters: usize,
        kernel_size: Vec<usize>,
        strides: Vec<usize>,
        regularizers: Regularizers
    },
    MaxPool {
        input: TensorRef,
        pool_size: Vec<usize>
    },
    Dropout {
        input: TensorRef,
        rate: f64
    },
    Add {
        inputs: Vec<TensorRef>
    },
    Concatenate {
        inputs: Vec<TensorRef>,
        axis: usize
    },
    Flatten {
        input: TensorRef
    },
    Reshape {
        input: TensorRef,
        target_shape: Shape
    },
}

impl Layer {
    pub fn get_input_tensors(&self) -> Vec<&TensorRef> {
        match self {
            Layer::Input => vec![],
            Layer::Dense { input, .. }
            | Layer::BatchNormalization { input }
            | Layer::Activation { input, .. }
            | Layer::Conv { input, .. }
            | Layer::MaxPool { input, .. }
            | Layer::Dropout { input, .. }
            | Layer::Flatten { input }
            | Layer::Reshape { input, .. } => vec![input],
            Layer::Add { inputs } | Layer::Concatenate { inputs, .. } => inputs.iter().collect(),
        }
    }

    pub fn get_type(&self) -> &str {
        match self {
            Layer::Input => "Input",
            Layer::Dense { .. } => "Dense",
            Layer::BatchNormalization { .. } => "BatchNormalization",
            Layer::Activation { .. } => "Activation",
            Layer::Conv { kernel_size, .. } => match kernel_size.len() {
                1 => "Conv1D",
                2 => "Conv2D",
                _ => "Conv3D",
            },
            Layer::MaxPool { pool_size, .. } => match pool_size.len() {
                1 => "MaxPool1D",
                2 => "MaxPool2D",
                _ => "MaxPool3D",
            },
            Layer::Dropout { .. } => "Dropout",
            Layer::Add { .. } => "Add",
            Layer::Concatenate { .. } => "Concatenate",
            Layer::Flatten { .. } => "Flatten",
            Layer::Reshape { .. } => "Reshape",
        }
    }
}

pub type TensorRef = Arc<Tensor>;

/// Output handle of a layer: its inferred shape plus the producing layer.
#[derive(Debug)]
pub struct Tensor {
    name: Option<String>,
    shape: Shape,
    layer: Layer
}

impl Tensor {
    pub(crate) fn new(name: Option<String>, shape: Shape, layer: Layer) -> TensorRef {
        Arc::new(Self { name, shape, layer })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn is_input(&self) -> bool {
        matches!(self.layer, Layer::Input)
    }

    /// Number of trainable weights owned by the producing layer.
    pub fn parameter_count(&self) -> usize {
        match &self.layer {
            Layer::Dense { input, units, .. } => {
                let features = input.shape.dims.last().copied().unwrap_or(1);
                features * units + units
            }
            Layer::Conv { input, filters, kernel_size, .. } => {
                let channels = input.shape.dims.last().copied().unwrap_or(1);
                kernel_size.iter().product::<usize>() * channels * filters + filters
            }
            Layer::BatchNormalization { input } => {
                4 * input.shape.dims.last().copied().unwrap_or(1)
            }
            _ => 0,
        }
    }

    /// Collects this tensor and everything upstream of it, each exactly once.
    pub fn get_sub_tensors<'a>(&'a self, table: &mut HashSet<TensorKey<'a>>, order: &mut Vec<&'a Tensor>) {
        if table.contains(&TensorKey(self)) {
            return;
        }
        for input in self.layer.get_input_tensors() {
            input.get_sub_tensors(table, order);
        }
        table.insert(TensorKey(self));
        order.push(self);
    }
}

/// Hashes and compares a tensor by address, so shared producers are visited once.
#[derive(Clone, Copy, Debug)]
pub struct TensorKey<'a>(pub &'a Tensor);

impl PartialEq for TensorKey<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.0, other.0)
    }
}

impl Eq for TensorKey<'_> {}

impl Hash for TensorKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let address: *const Tensor = self.0;
        state.write_usize(address.addr());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_shape_display() {
        assert_eq!(Shape::new(vec![200, 4, 1]).to_string(), "200x4x1");
        assert_eq!(Shape::from(8).to_string(), "8");
    }

    #[test]
    fn test_negative_axis() {
        let shape = Shape::new(vec![10, 5, 2]);
        assert_eq!(shape.axis(-1).unwrap(), 2);
        assert_eq!(shape.dim(-2).unwrap(), 5);
        assert!(shape.axis(3).is_err());
        assert!(shape.axis(-4).is_err());
    }

    #[test]
    fn test_activation_names() {
        assert_eq!(Activation::from_str("sigmoid").unwrap(), Activation::Sigmoid);
        assert_eq!(Activation::Relu.to_string(), "relu");
        assert!(Activation::from_str("not-an-activation").is_err());
    }
}
