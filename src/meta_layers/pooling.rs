use serde::{Deserialize, Serialize};
use layer_graph::TensorRef;
use crate::error::Result;
use crate::meta_layers::decorators::PoolingConfig;
use crate::meta_layers::{Inputs, MetaLayer};
use crate::space::{LocalParameters, Space};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaxPoolMetaLayer {
    pub config: PoolingConfig
}

impl MaxPoolMetaLayer {
    pub fn new(config: PoolingConfig) -> Self {
        Self { config }
    }
}

impl MetaLayer for MaxPoolMetaLayer {
    fn type_name(&self) -> &str {
        match self.config.rank {
            1 => "MaxPool1DMetaLayer",
            2 => "MaxPool2DMetaLayer",
            _ => "MaxPool3DMetaLayer",
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
        self.config.apply(input, params)
    }
}
