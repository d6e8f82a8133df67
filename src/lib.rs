//! Composable meta-layers and meta-models whose tunable dimensions form one
//! flat, namespaced hyper-parameter space.
//!
//! Meta-layers are added to a [`MetaGraph`] and connected into a DAG. The
//! graph aggregates the declared space of any node and its ancestors, and
//! builds a node for a sampled [`Assignment`] into a `layer_graph` tensor,
//! constructing every shared ancestor once. Meta-models wire such graphs and
//! assemble the built tensors into a [`layer_graph::Model`].
pub mod distributions;
pub mod error;
pub mod meta_graph;
pub mod meta_layers;
pub mod meta_models;
pub mod namespace;
pub mod space;
pub mod tuner;

pub use distributions::{is_close, Declaration, Distribution, ParameterValue};
pub use error::{MetaModelError, Result};
pub use meta_graph::{LayerId, MetaGraph, RenderedSpace};
pub use meta_layers::{AnyMetaLayer, Inputs, MetaLayer};
pub use meta_models::{AnyMetaModel, MetaModel, MetaModelGraph, Structure};
pub use namespace::{Namespace, Namespacer};
pub use space::{sample_space, Assignment, LocalParameters, Space};
pub use tuner::{OptimizeDirection, RandomSearchTuner, Study, Trial, TunerConfig};
