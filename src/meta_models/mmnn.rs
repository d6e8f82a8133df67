use serde::{Deserialize, Serialize};
use crate::error::{MetaModelError, Result};
use crate::meta_graph::{LayerId, MetaGraph};
use crate::meta_layers::ConcatenateMetaLayer;
use crate::meta_models::{AnyMetaModel, MetaModel, Structure};
use crate::space::Space;

/// Multi-modal network: one sub-model per input modality, joined by a
/// concatenation that feeds the output model.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MmnnMetaModel {
    pub inputs: Vec<AnyMetaModel>,
    pub output: Box<AnyMetaModel>
}

impl MmnnMetaModel {
    pub fn new(inputs: Vec<AnyMetaModel>, output: impl Into<AnyMetaModel>) -> Self {
        Self {
            inputs,
            output: Box::new(output.into()),
        }
    }
}

impl MetaModel for MmnnMetaModel {
    fn name(&self) -> &str {
        "MmnnMetaModel"
    }

    fn validate(&self) -> Result<()> {
        if self.inputs.is_empty() {
            return Err(MetaModelError::InvalidConfiguration {
                layer: self.name().to_string(),
                reason: "needs at least one input model".to_string(),
            });
        }
        for model in &self.inputs {
            model.validate()?;
        }
        self.output.validate()
    }

    fn structure(&self, graph: &mut MetaGraph, input: Option<LayerId>) -> Result<Structure> {
        if input.is_some() {
            return Err(MetaModelError::InvalidConfiguration {
                layer: self.name().to_string(),
                reason: "builds its own inputs and cannot be spliced onto another layer".to_string(),
            });
        }
        let mut inputs = vec![];
        let mut hidden = vec![];
        for model in &self.inputs {
            let structure = model.structure(graph, None)?;
            inputs.extend(structure.inputs);
            hidden.extend(structure.outputs);
        }
        let concatenation = graph.push(ConcatenateMetaLayer::default(), &hidden)?;
        let output = self.output.structure(graph, Some(concatenation))?;
        Ok(Structure {
            inputs,
            outputs: output.outputs,
        })
    }

    fn space(&self) -> Space {
        let mut space = Space::new();
        for model in &self.inputs {
            space.extend(model.space());
        }
        space.extend(self.output.space());
        space
    }
}
