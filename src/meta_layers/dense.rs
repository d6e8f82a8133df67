use std::sync::Arc;
use serde::{Deserialize, Serialize};
use layer_graph::{operators, Activation, TensorRef};
use crate::error::Result;
use crate::meta_layers::bounds::IntRange;
use crate::meta_layers::decorators::{DropoutConfig, RegularizationConfig};
use crate::meta_layers::rectangular::rectangular_chain;
use crate::meta_layers::{Inputs, MetaLayer};
use crate::space::{LocalParameters, Space};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DenseConfig {
    pub units: IntRange,
    pub activation: Activation,
    pub batch_normalization: bool,
    pub regularization: RegularizationConfig,
    pub dropout: DropoutConfig
}

impl Default for DenseConfig {
    fn default() -> Self {
        Self {
            units: IntRange::new(0, 512),
            activation: Activation::Relu,
            batch_normalization: false,
            regularization: RegularizationConfig::default(),
            dropout: DropoutConfig::default(),
        }
    }
}

impl DenseConfig {
    pub fn with_units(mut self, min: usize, max: usize) -> Self {
        self.units = IntRange::new(min, max);
        self
    }

    pub fn pin_units(mut self, units: usize) -> Self {
        self.units = IntRange::fixed(units);
        self
    }

    pub fn with_activation(mut self, activation: Activation) -> Self {
        self.activation = activation;
        self
    }

    pub fn with_batch_normalization(mut self) -> Self {
        self.batch_normalization = true;
        self
    }

    pub fn with_regularization(mut self, regularization: RegularizationConfig) -> Self {
        self.regularization = regularization;
        self
    }

    pub fn with_dropout(mut self, dropout: DropoutConfig) -> Self {
        self.dropout = dropout;
        self
    }

    fn validate(&self, layer: &str) -> Result<()> {
        self.units.validate(layer, "units")?;
        self.regularization.validate(layer)?;
        self.dropout.validate(layer)
    }

    fn declare(&self, space: &mut Space) {
        space.insert("units".to_string(), self.units.declaration());
        self.regularization.declare(space);
        self.dropout.declare(space);
    }

    /// Dense, optional batch normalisation, activation. Zero units is identity.
    fn dense_block(&self, input: &TensorRef, params: &LocalParameters) -> Result<TensorRef> {
        let units = params.count("units")?;
        if units == 0 {
            return Ok(input.clone());
        }
        let mut output = operators::dense(input, units, self.regularization.resolve(params)?)?;
        if self.batch_normalization {
            output = operators::batch_normalization(&output)?;
        }
        Ok(operators::activation(&output, self.activation)?)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DenseMetaLayer {
    pub config: DenseConfig
}

impl DenseMetaLayer {
    pub fn new(config: DenseConfig) -> Self {
        Self { config }
    }
}

impl MetaLayer for DenseMetaLayer {
    fn type_name(&self) -> &str {
        "DenseMetaLayer"
    }

    fn validate(&self) -> Result<()> {
        self.config.validate(self.type_name())
    }

    fn space(&self) -> Space {
        let mut space = Space::new();
        self.config.declare(&mut space);
        space
    }

    fn construct(&self, inputs: Inputs, params: &LocalParameters) -> Result<TensorRef> {
        let input = inputs.single(params.layer())?;
        let output = self.config.dense_block(&input, params)?;
        if Arc::ptr_eq(&input, &output) {
            return Ok(output);
        }
        self.config.dropout.apply(output, params)
    }
}

/// A stack of equally wide dense layers, optionally with a residual sum.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DenseRectangularMetaLayer {
    pub dense: DenseConfig,
    pub layers: IntRange,
    pub residual: bool
}

impl Default for DenseRectangularMetaLayer {
    fn default() -> Self {
        Self::new(DenseConfig::default())
    }
}

impl DenseRectangularMetaLayer {
    pub fn new(dense: DenseConfig) -> Self {
        Self {
            dense,
            layers: IntRange::new(0, 5),
            residual: false,
        }
    }

    pub fn with_layers(mut self, min: usize, max: usize) -> Self {
        self.layers = IntRange::new(min, max);
        self
    }

    pub fn pin_layers(mut self, layers: usize) -> Self {
        self.layers = IntRange::fixed(layers);
        self
    }

    pub fn with_residual(mut self, residual: bool) -> Self {
        self.residual = residual;
        self
    }
}

impl MetaLayer for DenseRectangularMetaLayer {
    fn type_name(&self) -> &str {
        "DenseRectangularMetaLayer"
    }

    fn validate(&self) -> Result<()> {
        self.dense.validate(self.type_name())?;
        self.layers.validate(self.type_name(), "layers")
    }

    fn space(&self) -> Space {
        let mut space = Space::new();
        self.dense.declare(&mut space);
        space.insert("layers".to_string(), self.layers.declaration());
        space
    }

    fn construct(&self, inputs: Inputs, params: &LocalParameters) -> Result<TensorRef> {
        let input = inputs.single(params.layer())?;
        let layers = params.count("layers")?;
        let output = rectangular_chain(input.clone(), layers, self.residual, |x, _| {
            self.dense.dense_block(x, params)
        })?;
        if Arc::ptr_eq(&input, &output) {
            return Ok(output);
        }
        self.dense.dropout.apply(output, params)
    }
}

/// Output layer with a fixed number of units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HeadMetaLayer {
    pub dense: DenseConfig
}

impl Default for HeadMetaLayer {
    fn default() -> Self {
        Self::new(1, Activation::Sigmoid)
    }
}

impl HeadMetaLayer {
    pub fn new(units: usize, activation: Activation) -> Self {
        Self {
            dense: DenseConfig::default().pin_units(units).with_activation(activation),
        }
    }
}

impl MetaLayer for HeadMetaLayer {
    fn type_name(&self) -> &str {
        "HeadMetaLayer"
    }

    fn validate(&self) -> Result<()> {
        self.dense.validate(self.type_name())
    }

    fn space(&self) -> Space {
        let mut space = Space::new();
        self.dense.declare(&mut space);
        space
    }

    fn construct(&self, inputs: Inputs, params: &LocalParameters) -> Result<TensorRef> {
        let input = inputs.single(params.layer())?;
        let output = self.dense.dense_block(&input, params)?;
        if Arc::ptr_eq(&input, &output) {
            return Ok(output);
        }
        self.dense.dropout.apply(output, params)
    }
}
