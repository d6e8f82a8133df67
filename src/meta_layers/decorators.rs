//! Optional components a meta-layer opts into: regularisation of its kernel,
//! bias or activity, trailing dropout and trailing max pooling.
use serde::{Deserialize, Serialize};
use layer_graph::{operators, Regularizer, Regularizers, TensorRef};
use crate::distributions::is_close;
use crate::error::{MetaModelError, Result};
use crate::meta_layers::bounds::{IntRange, RealRange};
use crate::meta_layers::{axis_prefixes, validate_rank, Inputs, MetaLayer};
use crate::space::{LocalParameters, Space};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegularizationConfig {
    pub kernel: bool,
    pub bias: bool,
    pub activity: bool,
    pub l1: RealRange,
    pub l2: RealRange
}

impl Default for RegularizationConfig {
    fn default() -> Self {
        Self {
            kernel: false,
            bias: false,
            activity: false,
            l1: RealRange::new(0.0, 0.01),
            l2: RealRange::new(0.0, 0.01),
        }
    }
}

impl RegularizationConfig {
    pub fn with_kernel(mut self) -> Self {
        self.kernel = true;
        self
    }

    pub fn with_bias(mut self) -> Self {
        self.bias = true;
        self
    }

    pub fn with_activity(mut self) -> Self {
        self.activity = true;
        self
    }

    pub fn with_l1(mut self, min: f64, max: f64) -> Self {
        self.l1 = RealRange::new(min, max);
        self
    }

    pub fn with_l2(mut self, min: f64, max: f64) -> Self {
        self.l2 = RealRange::new(min, max);
        self
    }

    /// Fixes the l1 weight; it then never shows up in the space.
    pub fn pin_l1(mut self, value: f64) -> Self {
        self.l1 = RealRange::fixed(value);
        self
    }

    pub fn pin_l2(mut self, value: f64) -> Self {
        self.l2 = RealRange::fixed(value);
        self
    }

    fn kinds(&self) -> impl Iterator<Item = &'static str> {
        [("kernel", self.kernel), ("bias", self.bias), ("activity", self.activity)]
            .into_iter()
            .filter_map(|(kind, enabled)| enabled.then_some(kind))
    }

    pub fn validate(&self, layer: &str) -> Result<()> {
        self.l1.validate(layer, "l1_regularization")?;
        self.l2.validate(layer, "l2_regularization")
    }

    pub fn declare(&self, space: &mut Space) {
        for kind in self.kinds() {
            space.insert(format!("{kind}_regularizer_l1"), self.l1.declaration());
            space.insert(format!("{kind}_regularizer_l2"), self.l2.declaration());
        }
    }

    /// Weights close to zero are left out of the resulting regularizers.
    pub fn resolve(&self, params: &LocalParameters) -> Result<Regularizers> {
        let mut regularizers = Regularizers::none();
        for kind in self.kinds() {
            let weight = |norm: &str| -> Result<Option<f64>> {
                let value = params.real(&format!("{kind}_regularizer_{norm}"))?;
                Ok((!is_close(value, 0.0)).then_some(value))
            };
            let regularizer = Regularizer {
                l1: weight("l1")?,
                l2: weight("l2")?,
            };
            if regularizer.is_empty() {
                continue;
            }
            match kind {
                "kernel" => regularizers.kernel = Some(regularizer),
                "bias" => regularizers.bias = Some(regularizer),
                _ => regularizers.activity = Some(regularizer),
            }
        }
        Ok(regularizers)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DropoutConfig {
    pub enabled: bool,
    pub rate: RealRange
}

impl Default for DropoutConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            rate: RealRange::new(0.0, 0.5),
        }
    }
}

impl DropoutConfig {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            ..Self::default()
        }
    }

    pub fn with_rate(mut self, min: f64, max: f64) -> Self {
        self.enabled = true;
        self.rate = RealRange::new(min, max);
        self
    }

    pub fn pin_rate(self, rate: f64) -> Self {
        self.with_rate(rate, rate)
    }

    fn range(&self) -> RealRange {
        if self.enabled { self.rate } else { RealRange::fixed(0.0) }
    }

    pub fn validate(&self, layer: &str) -> Result<()> {
        self.range().validate_rate(layer, "dropout_rate")
    }

    pub fn declare(&self, space: &mut Space) {
        space.insert("dropout_rate".to_string(), self.range().declaration());
    }

    pub fn apply(&self, input: TensorRef, params: &LocalParameters) -> Result<TensorRef> {
        let rate = params.real("dropout_rate")?;
        if is_close(rate, 0.0) {
            return Ok(input);
        }
        Ok(operators::dropout(&input, rate)?)
    }
}

/// Stand-alone dropout node.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DropoutMetaLayer {
    pub config: DropoutConfig
}

impl Default for DropoutMetaLayer {
    fn default() -> Self {
        Self::new(DropoutConfig::enabled())
    }
}

impl DropoutMetaLayer {
    pub fn new(config: DropoutConfig) -> Self {
        Self { config }
    }
}

impl MetaLayer for DropoutMetaLayer {
    fn type_name(&self) -> &str {
        "DropoutMetaLayer"
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

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoolingConfig {
    pub rank: usize,
    pub enabled: bool,
    pub pool_size: Vec<IntRange>
}

impl PoolingConfig {
    pub fn for_rank(rank: usize) -> Self {
        let pool_size = [IntRange::new(1, 8), IntRange::new(1, 4), IntRange::new(1, 4)];
        Self {
            rank,
            enabled: true,
            pool_size: pool_size.into_iter().take(rank).collect(),
        }
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn with_pool_size(mut self, axis: usize, min: usize, max: usize) -> Self {
        if let Some(range) = self.pool_size.get_mut(axis) {
            *range = IntRange::new(min, max);
        }
        self
    }

    fn keys(&self) -> impl Iterator<Item = String> + '_ {
        axis_prefixes(self.rank).iter().map(|prefix| format!("{prefix}pool_size"))
    }

    pub fn validate(&self, layer: &str) -> Result<()> {
        validate_rank(layer, self.rank)?;
        if self.pool_size.len() != self.rank {
            return Err(MetaModelError::InvalidConfiguration {
                layer: layer.to_string(),
                reason: format!("expected {} pool size range(s), got {}", self.rank, self.pool_size.len()),
            });
        }
        for (key, range) in self.keys().zip(&self.pool_size) {
            range.validate(layer, &key)?;
        }
        Ok(())
    }

    pub fn declare(&self, space: &mut Space) {
        for (key, range) in self.keys().zip(&self.pool_size) {
            let range = if self.enabled { *range } else { IntRange::fixed(0) };
            space.insert(key, range.declaration());
        }
    }

    /// Identity when any pool size is zero.
    pub fn apply(&self, input: TensorRef, params: &LocalParameters) -> Result<TensorRef> {
        let pool_size = self.keys().map(|key| params.count(&key)).collect::<Result<Vec<_>>>()?;
        if pool_size.contains(&0) {
            return Ok(input);
        }
        Ok(operators::max_pool(&input, pool_size)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributions::Declaration;

    #[test]
    fn test_regularization_keys() {
        let config = RegularizationConfig::default().with_kernel().with_activity();
        let mut space = Space::new();
        config.declare(&mut space);
        let keys: Vec<&str> = space.keys().map(|x| x.as_str()).collect();
        assert_eq!(keys, vec![
            "activity_regularizer_l1",
            "activity_regularizer_l2",
            "kernel_regularizer_l1",
            "kernel_regularizer_l2",
        ]);
    }

    #[test]
    fn test_regularization_drops_zero_weights() {
        let config = RegularizationConfig::default().with_kernel().with_bias();
        let mut params = LocalParameters::new("DenseMetaLayer_0");
        params.insert("kernel_regularizer_l1", 0.005);
        params.insert("kernel_regularizer_l2", 0.0);
        params.insert("bias_regularizer_l1", 1e-12);
        params.insert("bias_regularizer_l2", 0.0);
        let regularizers = config.resolve(&params).unwrap();
        assert_eq!(regularizers.kernel, Some(Regularizer { l1: Some(0.005), l2: None }));
        assert_eq!(regularizers.bias, None);
        assert_eq!(regularizers.activity, None);
    }

    #[test]
    fn test_disabled_dropout_is_pinned() {
        let mut space = Space::new();
        DropoutConfig::default().declare(&mut space);
        assert_eq!(space["dropout_rate"], Declaration::real(0.0, 0.0));
        assert!(DropoutConfig::enabled().with_rate(0.0, 1.5).validate("DropoutMetaLayer").is_err());
    }

    #[test]
    fn test_pooling_keys_per_rank() {
        let mut space = Space::new();
        PoolingConfig::for_rank(3).declare(&mut space);
        assert_eq!(space.len(), 3);
        assert_eq!(space["x_pool_size"], Declaration::integer(1, 8));
        assert_eq!(space["z_pool_size"], Declaration::integer(1, 4));
        let mut space = Space::new();
        PoolingConfig::for_rank(1).disabled().declare(&mut space);
        assert_eq!(space["pool_size"], Declaration::integer(0, 0));
    }
}
