//! Symbolic, shape-inferring layer graphs.
//!
//! Layers are created through the free functions in [`operators`], each of
//! which validates its inputs, infers an output [`Shape`] and returns a
//! shared [`TensorRef`]. A [`Model`] is assembled from input and output
//! handles and can be inspected through [`Model::summary`].
pub mod operators;
pub mod tensor;

use std::collections::HashSet;
use std::fmt::Write;
pub use tensor::*;

#[derive(Debug, thiserror::Error)]
pub enum LayerGraphError {
    #[error("{op} expected an input of rank {expected}, got rank {actual}")]
    RankMismatch {
        op: String,
        expected: usize,
        actual: usize
    },
    #[error("{op} cannot combine shape {expected} with shape {actual}")]
    ShapeMismatch {
        op: String,
        expected: Shape,
        actual: Shape
    },
    #[error("{0} needs at least one input")]
    EmptyInputs(String),
    #[error("Axis {axis} is out of range for rank {rank}")]
    InvalidAxis {
        axis: isize,
        rank: usize
    },
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Model input {0} is not produced by an input layer")]
    NotAnInput(usize),
    #[error("Model needs at least one input and one output")]
    EmptyModel,
}

/// A trainable object assembled from ordered input and output handles.
#[derive(Clone, Debug)]
pub struct Model {
    inputs: Vec<TensorRef>,
    outputs: Vec<TensorRef>
}

impl Model {
    pub fn new(inputs: Vec<TensorRef>, outputs: Vec<TensorRef>) -> Result<Self, LayerGraphError> {
        if inputs.is_empty() || outputs.is_empty() {
            return Err(LayerGraphError::EmptyModel);
        }
        for (i, input) in inputs.iter().enumerate() {
            if !input.is_input() {
                return Err(LayerGraphError::NotAnInput(i));
            }
        }
        Ok(Self { inputs, outputs })
    }

    pub fn inputs(&self) -> &[TensorRef] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TensorRef] {
        &self.outputs
    }

    /// Every tensor reachable from the outputs, producers before consumers.
    pub fn layers(&self) -> Vec<&Tensor> {
        let mut table = HashSet::new();
        let mut order = vec![];
        for input in &self.inputs {
            input.get_sub_tensors(&mut table, &mut order);
        }
        for output in &self.outputs {
            output.get_sub_tensors(&mut table, &mut order);
        }
        order
    }

    pub fn layer_count(&self) -> usize {
        self.layers().len()
    }

    pub fn count_layers_of_type(&self, layer_type: &str) -> usize {
        self.layers().iter().filter(|x| x.layer().get_type() == layer_type).count()
    }

    pub fn parameter_count(&self) -> usize {
        self.layers().iter().map(|x| x.parameter_count()).sum()
    }

    pub fn summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "{:<4} {:<20} {:<16} {:>10}", "#", "Layer", "Output shape", "Params");
        for (i, tensor) in self.layers().iter().enumerate() {
            let label = match tensor.name() {
                Some(name) => format!("{} ({})", tensor.layer().get_type(), name),
                None => tensor.layer().get_type().to_string(),
            };
            let _ = writeln!(
                out,
                "{:<4} {:<20} {:<16} {:>10}",
                i,
                label,
                tensor.shape().to_string(),
                tensor.parameter_count()
            );
        }
        let _ = writeln!(out, "Total params: {}", self.parameter_count());
        out
    }
}
