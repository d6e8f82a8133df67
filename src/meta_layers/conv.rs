use std::sync::Arc;
use serde::{Deserialize, Serialize};
use layer_graph::{operators, Activation, TensorRef};
use crate::error::{MetaModelError, Result};
use crate::meta_layers::bounds::IntRange;
use crate::meta_layers::decorators::{DropoutConfig, PoolingConfig, RegularizationConfig};
use crate::meta_layers::rectangular::rectangular_chain;
use crate::meta_layers::{axis_prefixes, validate_rank, Inputs, MetaLayer};
use crate::space::{LocalParameters, Space};

fn check_axes(layer: &str, name: &str, rank: usize, ranges: &[IntRange]) -> Result<()> {
    if ranges.len() != rank {
        return Err(MetaModelError::InvalidConfiguration {
            layer: layer.to_string(),
            reason: format!("expected {rank} {name} range(s), got {}", ranges.len()),
        });
    }
    for (prefix, range) in axis_prefixes(rank).iter().zip(ranges) {
        range.validate(layer, &format!("{prefix}{name}"))?;
        if range.min == 0 {
            return Err(MetaModelError::InvalidConfiguration {
                layer: layer.to_string(),
                reason: format!("{prefix}{name} must be at least 1"),
            });
        }
    }
    Ok(())
}

fn declare_axes(space: &mut Space, name: &str, rank: usize, ranges: &[IntRange]) {
    for (prefix, range) in axis_prefixes(rank).iter().zip(ranges) {
        space.insert(format!("{prefix}{name}"), range.declaration());
    }
}

fn read_axes(params: &LocalParameters, name: &str, rank: usize) -> Result<Vec<usize>> {
    axis_prefixes(rank)
        .iter()
        .map(|prefix| params.count(&format!("{prefix}{name}")))
        .collect()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvConfig {
    pub rank: usize,
    pub filters: IntRange,
    pub kernel_size: Vec<IntRange>,
    pub activation: Activation,
    pub batch_normalization: bool,
    pub regularization: RegularizationConfig
}

impl ConvConfig {
    pub fn for_rank(rank: usize) -> Self {
        let kernel_size = match rank {
            1 => vec![IntRange::new(1, 12)],
            2 => vec![IntRange::new(1, 12), IntRange::new(1, 4)],
            _ => vec![IntRange::new(1, 5); rank],
        };
        Self {
            rank,
            filters: IntRange::new(0, 256),
            kernel_size,
            activation: Activation::Relu,
            batch_normalization: false,
            regularization: RegularizationConfig::default(),
        }
    }

    pub fn with_filters(mut self, min: usize, max: usize) -> Self {
        self.filters = IntRange::new(min, max);
        self
    }

    pub fn pin_filters(mut self, filters: usize) -> Self {
        self.filters = IntRange::fixed(filters);
        self
    }

    pub fn with_kernel_size(mut self, axis: usize, min: usize, max: usize) -> Self {
        if let Some(range) = self.kernel_size.get_mut(axis) {
            *range = IntRange::new(min, max);
        }
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

    fn validate(&self, layer: &str) -> Result<()> {
        validate_rank(layer, self.rank)?;
        self.filters.validate(layer, "filters")?;
        check_axes(layer, "kernel_size", self.rank, &self.kernel_size)?;
        self.regularization.validate(layer)
    }

    fn declare(&self, space: &mut Space) {
        space.insert("filters".to_string(), self.filters.declaration());
        declare_axes(space, "kernel_size", self.rank, &self.kernel_size);
        self.regularization.declare(space);
    }

    /// Convolution, optional batch normalisation, activation. Zero filters is identity.
    fn conv_block(&self, input: &TensorRef, params: &LocalParameters, strides: Vec<usize>) -> Result<TensorRef> {
        let filters = params.count("filters")?;
        if filters == 0 {
            return Ok(input.clone());
        }
        let kernel_size = read_axes(params, "kernel_size", self.rank)?;
        let regularizers = self.regularization.resolve(params)?;
        let mut output = operators::conv(input, filters, kernel_size, strides, regularizers)?;
        if self.batch_normalization {
            output = operators::batch_normalization(&output)?;
        }
        Ok(operators::activation(&output, self.activation)?)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvMetaLayer {
    pub config: ConvConfig
}

impl ConvMetaLayer {
    pub fn new(config: ConvConfig) -> Self {
        Self { config }
    }
}

impl MetaLayer for ConvMetaLayer {
    fn type_name(&self) -> &str {
        match self.config.rank {
            1 => "Conv1DMetaLayer",
            2 => "Conv2DMetaLayer",
            _ => "Conv3DMetaLayer",
        }
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
        self.config.conv_block(&input, params, vec![1; self.config.rank])
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvRectangularConfig {
    pub conv: ConvConfig,
    pub layers: IntRange,
    pub strides_enabled: bool,
    pub strides: Vec<IntRange>,
    pub pooling: PoolingConfig,
    pub dropout: DropoutConfig,
    pub residual: bool
}

impl ConvRectangularConfig {
    pub fn for_rank(rank: usize) -> Self {
        Self {
            conv: ConvConfig::for_rank(rank),
            layers: IntRange::new(0, 3),
            strides_enabled: false,
            strides: vec![IntRange::new(1, 4); rank],
            pooling: PoolingConfig::for_rank(rank),
            dropout: DropoutConfig::default(),
            residual: false,
        }
    }

    pub fn with_conv(mut self, conv: ConvConfig) -> Self {
        self.conv = conv;
        self
    }

    pub fn with_layers(mut self, min: usize, max: usize) -> Self {
        self.layers = IntRange::new(min, max);
        self
    }

    pub fn pin_layers(mut self, layers: usize) -> Self {
        self.layers = IntRange::fixed(layers);
        self
    }

    /// Lets the final convolution of the chain sample its strides.
    ///
    /// Strides are off by default: every stride is pinned to 1 and collapses
    /// into a default, so the block adds no stride dimension to the space.
    /// Enabling them exposes the 1..4 range.
    pub fn with_strides(mut self) -> Self {
        self.strides_enabled = true;
        self
    }

    pub fn with_pooling(mut self, pooling: PoolingConfig) -> Self {
        self.pooling = pooling;
        self
    }

    pub fn with_dropout(mut self, dropout: DropoutConfig) -> Self {
        self.dropout = dropout;
        self
    }

    pub fn with_residual(mut self, residual: bool) -> Self {
        self.residual = residual;
        self
    }

    fn stride_ranges(&self) -> Vec<IntRange> {
        if self.strides_enabled {
            self.strides.clone()
        } else {
            vec![IntRange::fixed(1); self.conv.rank]
        }
    }
}

/// A chain of convolutions followed by pooling and dropout.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConvRectangularMetaLayer {
    pub config: ConvRectangularConfig
}

impl ConvRectangularMetaLayer {
    pub fn new(config: ConvRectangularConfig) -> Self {
        Self { config }
    }
}

impl MetaLayer for ConvRectangularMetaLayer {
    fn type_name(&self) -> &str {
        match self.config.conv.rank {
            1 => "Conv1DRectangularMetaLayer",
            2 => "Conv2DRectangularMetaLayer",
            _ => "Conv3DRectangularMetaLayer",
        }
    }

    fn validate(&self) -> Result<()> {
        let layer = self.type_name();
        let config = &self.config;
        config.conv.validate(layer)?;
        config.layers.validate(layer, "layers")?;
        check_axes(layer, "strides", config.conv.rank, &config.strides)?;
        if config.pooling.rank != config.conv.rank {
            return Err(MetaModelError::InvalidConfiguration {
                layer: layer.to_string(),
                reason: format!("pooling rank {} differs from convolution rank {}", config.pooling.rank, config.conv.rank),
            });
        }
        config.pooling.validate(layer)?;
        config.dropout.validate(layer)
    }

    fn space(&self) -> Space {
        let config = &self.config;
        let mut space = Space::new();
        config.conv.declare(&mut space);
        space.insert("layers".to_string(), config.layers.declaration());
        declare_axes(&mut space, "strides", config.conv.rank, &config.stride_ranges());
        config.pooling.declare(&mut space);
        config.dropout.declare(&mut space);
        space
    }

    fn construct(&self, inputs: Inputs, params: &LocalParameters) -> Result<TensorRef> {
        let config = &self.config;
        let rank = config.conv.rank;
        let input = inputs.single(params.layer())?;
        let layers = params.count("layers")?;
        let strides = read_axes(params, "strides", rank)?;
        if strides.contains(&0) {
            return Err(MetaModelError::InvalidParameter {
                layer: params.layer().to_string(),
                parameter: "strides".to_string(),
                reason: format!("strides must be positive, got {strides:?}"),
            });
        }
        let output = rectangular_chain(input.clone(), layers, config.residual, |x, last| {
            let strides = if last { strides.clone() } else { vec![1; rank] };
            config.conv.conv_block(x, params, strides)
        })?;
        if Arc::ptr_eq(&input, &output) {
            return Ok(output);
        }
        let output = config.pooling.apply(output, params)?;
        config.dropout.apply(output, params)
    }
}
