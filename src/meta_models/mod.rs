//! Meta-models wire fresh meta-layers into a [`MetaGraph`] and turn sampled
//! assignments into concrete [`Model`]s.
mod cnn;
mod ffnn;
mod mmnn;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use layer_graph::{Model, Shape};
use crate::error::{MetaModelError, Result};
use crate::meta_graph::{LayerId, MetaGraph};
use crate::meta_layers::InputMetaLayer;
use crate::space::{Assignment, Space};

pub use cnn::{CnnConfig, CnnMetaModel};
pub use ffnn::{FfnnConfig, FfnnMetaModel};
pub use mmnn::MmnnMetaModel;

/// Boundary of the sub-graph a meta-model wired.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Structure {
    pub inputs: Vec<LayerId>,
    pub outputs: Vec<LayerId>
}

pub trait MetaModel {
    fn name(&self) -> &str;

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Adds fresh meta-layers to `graph`, on top of `input` when given.
    fn structure(&self, graph: &mut MetaGraph, input: Option<LayerId>) -> Result<Structure>;

    /// Declarations owned by the model rather than by one of its layers.
    fn space(&self) -> Space {
        Space::new()
    }
}

/// The spliced input if there is one, otherwise a new input layer.
pub(crate) fn input_layer(
    graph: &mut MetaGraph,
    input: Option<LayerId>,
    shape: Option<&Shape>,
    name: Option<&String>,
    model: &str,
) -> Result<LayerId> {
    if let Some(input) = input {
        graph.node(input)?;
        return Ok(input);
    }
    let shape = shape.ok_or_else(|| MetaModelError::MissingInput { model: model.to_string() })?;
    let mut layer = InputMetaLayer::new(shape.clone());
    if let Some(name) = name {
        layer = layer.with_name(name.clone());
    }
    graph.push(layer, &[])
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnyMetaModel {
    Ffnn(FfnnMetaModel),
    Cnn(CnnMetaModel),
    Mmnn(MmnnMetaModel),
}

impl From<FfnnMetaModel> for AnyMetaModel {
    fn from(value: FfnnMetaModel) -> Self {
        AnyMetaModel::Ffnn(value)
    }
}

impl From<CnnMetaModel> for AnyMetaModel {
    fn from(value: CnnMetaModel) -> Self {
        AnyMetaModel::Cnn(value)
    }
}

impl From<MmnnMetaModel> for AnyMetaModel {
    fn from(value: MmnnMetaModel) -> Self {
        AnyMetaModel::Mmnn(value)
    }
}

impl MetaModel for AnyMetaModel {
    fn name(&self) -> &str {
        match self {
            AnyMetaModel::Ffnn(model) => model.name(),
            AnyMetaModel::Cnn(model) => model.name(),
            AnyMetaModel::Mmnn(model) => model.name(),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            AnyMetaModel::Ffnn(model) => model.validate(),
            AnyMetaModel::Cnn(model) => model.validate(),
            AnyMetaModel::Mmnn(model) => model.validate(),
        }
    }

    fn structure(&self, graph: &mut MetaGraph, input: Option<LayerId>) -> Result<Structure> {
        match self {
            AnyMetaModel::Ffnn(model) => model.structure(graph, input),
            AnyMetaModel::Cnn(model) => model.structure(graph, input),
            AnyMetaModel::Mmnn(model) => model.structure(graph, input),
        }
    }

    fn space(&self) -> Space {
        match self {
            AnyMetaModel::Ffnn(model) => model.space(),
            AnyMetaModel::Cnn(model) => model.space(),
            AnyMetaModel::Mmnn(model) => model.space(),
        }
    }
}

/// A meta-model together with the graph its structure produced.
///
/// The structure is wired once, in a graph of its own, so namespace keys are
/// the same every time the same meta-model is assembled.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetaModelGraph<M = AnyMetaModel> {
    model: M,
    graph: MetaGraph,
    structure: Structure
}

impl<M: MetaModel> MetaModelGraph<M> {
    pub fn new(model: M) -> Result<Self> {
        model.validate()?;
        let mut graph = MetaGraph::new();
        let structure = model.structure(&mut graph, None)?;
        log::debug!(
            "Assembled {} with {} meta-layer(s), {} input(s) and {} output(s)",
            model.name(),
            graph.len(),
            structure.inputs.len(),
            structure.outputs.len()
        );
        Ok(Self { model, graph, structure })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn graph(&self) -> &MetaGraph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut MetaGraph {
        &mut self.graph
    }

    pub fn inputs(&self) -> &[LayerId] {
        &self.structure.inputs
    }

    pub fn outputs(&self) -> &[LayerId] {
        &self.structure.outputs
    }

    /// The searchable space of the whole model.
    pub fn space(&mut self) -> Result<Space> {
        let mut space = Space::new();
        for output in &self.structure.outputs {
            space.extend(self.graph.space(*output)?.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        space.extend(self.model.space());
        Ok(space)
    }

    /// Resets the output sub-graphs, then builds a model for `assignment`.
    pub fn build(&mut self, assignment: &Assignment) -> Result<Model> {
        for output in &self.structure.outputs {
            self.graph.reset(*output)?;
        }
        let inputs = self
            .structure
            .inputs
            .iter()
            .map(|id| self.graph.build(*id, assignment))
            .collect::<Result<Vec<_>>>()?;
        let outputs = self
            .structure
            .outputs
            .iter()
            .map(|id| self.graph.build(*id, assignment))
            .collect::<Result<Vec<_>>>()?;
        Ok(Model::new(inputs, outputs)?)
    }
}

impl<M: Serialize> MetaModelGraph<M> {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }
}

impl<M: MetaModel + DeserializeOwned> MetaModelGraph<M> {
    pub fn from_json(json: &str) -> Result<Self> {
        let meta_model: Self = serde_json::from_str(json)?;
        meta_model.validate()?;
        Ok(meta_model)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let meta_model: Self = serde_json::from_reader(reader)?;
        meta_model.validate()?;
        Ok(meta_model)
    }

    fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.graph.validate()
    }
}

impl AnyMetaModel {
    /// Reads a meta-model description, e.g. `{"type": "ffnn", ...}`.
    pub fn from_json(json: &str) -> Result<Self> {
        let model: Self = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let model: Self = serde_json::from_reader(reader)?;
        model.validate()?;
        Ok(model)
    }
}
