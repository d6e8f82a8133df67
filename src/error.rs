use crate::meta_graph::LayerId;
use layer_graph::LayerGraphError;

#[derive(Debug, thiserror::Error)]
pub enum MetaModelError {
    #[error("Invalid configuration for {layer}: {reason}")]
    InvalidConfiguration {
        layer: String,
        reason: String
    },
    #[error("Missing parameter {parameter} for {layer}")]
    MissingParameter {
        layer: String,
        parameter: String
    },
    #[error("Invalid value for parameter {parameter} of {layer}: {reason}")]
    InvalidParameter {
        layer: String,
        parameter: String,
        reason: String
    },
    #[error("{layer} expected {expected} input(s), received {received}")]
    InvalidInputs {
        layer: String,
        expected: String,
        received: usize
    },
    #[error("No meta-layer with id {0:?} in this graph")]
    UnknownLayer(LayerId),
    #[error("Meta-layer {0:?} already has its predecessors")]
    AlreadyConnected(LayerId),
    #[error("Meta-layer {0:?} rendered its space before it was connected")]
    AlreadyRendered(LayerId),
    #[error("Connecting {0:?} would create a cycle")]
    CycleDetected(LayerId),
    #[error("Namespace {0} is already in use in this graph")]
    NamespaceCollision(String),
    #[error("{model} needs either an input shape or an input meta-layer")]
    MissingInput {
        model: String
    },
    #[error("Invalid tuner configuration: {0}")]
    InvalidTunerConfiguration(String),
    #[error(transparent)]
    LayerGraph(#[from] LayerGraphError),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MetaModelError>;
