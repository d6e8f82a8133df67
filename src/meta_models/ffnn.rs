use serde::{Deserialize, Serialize};
use layer_graph::{Activation, Shape};
use crate::error::{MetaModelError, Result};
use crate::meta_graph::{LayerId, MetaGraph};
use crate::meta_layers::{DenseConfig, DenseRectangularMetaLayer, HeadMetaLayer, MetaLayer};
use crate::meta_models::{input_layer, MetaModel, Structure};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FfnnConfig {
    pub input_shape: Option<Shape>,
    pub input_name: Option<String>,
    pub blocks: usize,
    pub block: DenseRectangularMetaLayer,
    pub headless: bool,
    pub head: HeadMetaLayer
}

impl Default for FfnnConfig {
    fn default() -> Self {
        Self {
            input_shape: None,
            input_name: None,
            blocks: 4,
            block: DenseRectangularMetaLayer::default(),
            headless: false,
            head: HeadMetaLayer::default(),
        }
    }
}

impl FfnnConfig {
    pub fn with_input_shape(mut self, shape: impl Into<Shape>) -> Self {
        self.input_shape = Some(shape.into());
        self
    }

    pub fn with_input_name(mut self, name: impl Into<String>) -> Self {
        self.input_name = Some(name.into());
        self
    }

    pub fn with_blocks(mut self, blocks: usize) -> Self {
        self.blocks = blocks;
        self
    }

    pub fn with_dense(mut self, dense: DenseConfig) -> Self {
        self.block.dense = dense;
        self
    }

    pub fn with_units(mut self, min: usize, max: usize) -> Self {
        self.block.dense = self.block.dense.with_units(min, max);
        self
    }

    pub fn with_layers(mut self, min: usize, max: usize) -> Self {
        self.block = self.block.with_layers(min, max);
        self
    }

    pub fn pin_layers(mut self, layers: usize) -> Self {
        self.block = self.block.pin_layers(layers);
        self
    }

    pub fn with_residual(mut self, residual: bool) -> Self {
        self.block = self.block.with_residual(residual);
        self
    }

    pub fn with_output(mut self, units: usize, activation: Activation) -> Self {
        self.head = HeadMetaLayer::new(units, activation);
        self
    }

    /// Leaves out the head, for use as a sub-model.
    pub fn headless(mut self) -> Self {
        self.headless = true;
        self
    }
}

/// Feed-forward network: dense blocks followed by a head.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FfnnMetaModel {
    pub config: FfnnConfig
}

impl FfnnMetaModel {
    pub fn new(config: FfnnConfig) -> Self {
        Self { config }
    }

    /// Same network with a residual sum inside every block.
    pub fn residual(config: FfnnConfig) -> Self {
        Self::new(config.with_residual(true))
    }
}

impl MetaModel for FfnnMetaModel {
    fn name(&self) -> &str {
        "FfnnMetaModel"
    }

    fn validate(&self) -> Result<()> {
        if let Some(shape) = &self.config.input_shape {
            if shape.rank() == 0 || shape.dims.contains(&0) {
                return Err(MetaModelError::InvalidConfiguration {
                    layer: self.name().to_string(),
                    reason: format!("input shape {shape} must be non-empty"),
                });
            }
        }
        self.config.block.validate()?;
        self.config.head.validate()
    }

    fn structure(&self, graph: &mut MetaGraph, input: Option<LayerId>) -> Result<Structure> {
        let config = &self.config;
        let input = input_layer(
            graph,
            input,
            config.input_shape.as_ref(),
            config.input_name.as_ref(),
            self.name(),
        )?;
        let mut hidden = input;
        for _ in 0..config.blocks {
            hidden = graph.push(config.block.clone(), &[hidden])?;
        }
        if !config.headless {
            hidden = graph.push(config.head.clone(), &[hidden])?;
        }
        Ok(Structure {
            inputs: vec![input],
            outputs: vec![hidden],
        })
    }
}
