use serde::{Deserialize, Serialize};
use layer_graph::Shape;
use crate::error::{MetaModelError, Result};
use crate::meta_graph::{LayerId, MetaGraph};
use crate::meta_layers::{ConvRectangularConfig, ConvRectangularMetaLayer, FlattenMetaLayer, MetaLayer};
use crate::meta_models::{input_layer, FfnnConfig, FfnnMetaModel, MetaModel, Structure};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CnnConfig {
    pub input_shape: Option<Shape>,
    pub input_name: Option<String>,
    pub blocks: usize,
    pub block: ConvRectangularConfig,
    pub top: FfnnConfig
}

impl CnnConfig {
    /// Defaults for a network over inputs with `rank` spatial axes.
    pub fn for_rank(rank: usize) -> Self {
        Self {
            input_shape: None,
            input_name: None,
            blocks: 4,
            block: ConvRectangularConfig::for_rank(rank),
            top: FfnnConfig::default(),
        }
    }

    pub fn rank(&self) -> usize {
        self.block.conv.rank
    }

    /// Spatial axes followed by the channel axis.
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

    pub fn with_block(mut self, block: ConvRectangularConfig) -> Self {
        self.block = block;
        self
    }

    pub fn with_top(mut self, top: FfnnConfig) -> Self {
        self.top = top;
        self
    }
}

/// Convolutional blocks, a flatten and a feed-forward top.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CnnMetaModel {
    pub config: CnnConfig
}

impl CnnMetaModel {
    pub fn new(config: CnnConfig) -> Self {
        Self { config }
    }

    fn top(&self) -> FfnnMetaModel {
        let mut top = self.config.top.clone();
        top.input_shape = None;
        FfnnMetaModel::new(top)
    }
}

impl MetaModel for CnnMetaModel {
    fn name(&self) -> &str {
        match self.config.rank() {
            1 => "Cnn1DMetaModel",
            2 => "Cnn2DMetaModel",
            _ => "Cnn3DMetaModel",
        }
    }

    fn validate(&self) -> Result<()> {
        let rank = self.config.rank();
        if let Some(shape) = &self.config.input_shape {
            if shape.rank() != rank + 1 || shape.dims.contains(&0) {
                return Err(MetaModelError::InvalidConfiguration {
                    layer: self.name().to_string(),
                    reason: format!("input shape {shape} needs {rank} spatial axes and a channel axis"),
                });
            }
        }
        ConvRectangularMetaLayer::new(self.config.block.clone()).validate()?;
        self.top().validate()
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
            hidden = graph.push(ConvRectangularMetaLayer::new(config.block.clone()), &[hidden])?;
        }
        let flat = graph.push(FlattenMetaLayer, &[hidden])?;
        let top = self.top().structure(graph, Some(flat))?;
        Ok(Structure {
            inputs: vec![input],
            outputs: top.outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta_models::MetaModelGraph;

    #[test]
    fn test_input_rank_is_checked() {
        let model = CnnMetaModel::new(CnnConfig::for_rank(2).with_input_shape(vec![32, 32]));
        assert!(matches!(
            MetaModelGraph::new(model),
            Err(MetaModelError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn test_structure_has_flatten_before_top() {
        let model = CnnMetaModel::new(
            CnnConfig::for_rank(1)
                .with_input_shape(vec![200, 4])
                .with_blocks(2)
                .with_top(FfnnConfig::default().with_blocks(1)),
        );
        let graph = MetaModelGraph::new(model).unwrap();
        // input, two conv blocks, flatten, one dense block, head
        assert_eq!(graph.graph().len(), 6);
        let namespaces: Vec<String> = graph.graph().ids().map(|id| graph.graph().namespace(id).unwrap().prefix()).collect();
        assert_eq!(namespaces, vec![
            "InputMetaLayer_0",
            "Conv1DRectangularMetaLayer_0",
            "Conv1DRectangularMetaLayer_1",
            "FlattenMetaLayer_0",
            "DenseRectangularMetaLayer_0",
            "HeadMetaLayer_0",
        ]);
    }
}
