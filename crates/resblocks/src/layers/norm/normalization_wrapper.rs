//! # Normalization Wrapper
//!
//! Channel normalization over ``[batch, channels, height, width]`` tensors:
//! * [`Normalization::Batch`] - [`BatchNorm`]
//! * [`Normalization::Group`] - [`GroupNorm`]
//! * [`Normalization::Instance`] - [`InstanceNorm`]
//!
//! Configs carry a placeholder feature size, which is replaced
//! by the producing layer's channel count (see [`NormalizationConfig::with_num_features`]).

use burn::nn::{
    BatchNorm, BatchNormConfig, GroupNorm, GroupNormConfig, InstanceNorm, InstanceNormConfig,
};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`Normalization`] Configuration.
#[derive(Config, Debug)]
#[non_exhaustive]
pub enum NormalizationConfig {
    /// [`BatchNorm`] Configuration.
    Batch(BatchNormConfig),

    /// [`GroupNorm`] Configuration.
    Group(GroupNormConfig),

    /// [`InstanceNorm`] Configuration.
    Instance(InstanceNormConfig),
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self::Batch(BatchNormConfig::new(0))
    }
}

impl From<BatchNormConfig> for NormalizationConfig {
    fn from(config: BatchNormConfig) -> Self {
        Self::Batch(config)
    }
}

impl From<GroupNormConfig> for NormalizationConfig {
    fn from(config: GroupNormConfig) -> Self {
        Self::Group(config)
    }
}

impl From<InstanceNormConfig> for NormalizationConfig {
    fn from(config: InstanceNormConfig) -> Self {
        Self::Instance(config)
    }
}

impl NormalizationConfig {
    /// Initialize a [`Normalization`] layer.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Normalization<B> {
        match self {
            NormalizationConfig::Batch(config) => Normalization::Batch(config.init(device)),
            NormalizationConfig::Group(config) => Normalization::Group(config.init(device)),
            NormalizationConfig::Instance(config) => Normalization::Instance(config.init(device)),
        }
    }

    /// Adjust a norm config to the feature size.
    pub fn with_num_features(
        self,
        num_features: usize,
    ) -> Self {
        match self {
            NormalizationConfig::Batch(config) => BatchNormConfig {
                num_features,
                ..config
            }
            .into(),
            NormalizationConfig::Group(config) => GroupNormConfig {
                num_channels: num_features,
                ..config
            }
            .into(),
            NormalizationConfig::Instance(config) => InstanceNormConfig {
                num_channels: num_features,
                ..config
            }
            .into(),
        }
    }

    /// Get the number of features.
    pub fn num_features(&self) -> usize {
        match self {
            NormalizationConfig::Batch(config) => config.num_features,
            NormalizationConfig::Group(config) => config.num_channels,
            NormalizationConfig::Instance(config) => config.num_channels,
        }
    }
}

/// Normalization Layer Wrapper.
#[derive(Module, Debug)]
#[non_exhaustive]
pub enum Normalization<B: Backend> {
    /// [`BatchNorm`] layer; restricted to `BatchNorm<2>`.
    Batch(BatchNorm<B, 2>),

    /// [`GroupNorm`] layer.
    Group(GroupNorm<B>),

    /// [`InstanceNorm`] layer.
    Instance(InstanceNorm<B>),
}

impl<B: Backend> Normalization<B> {
    /// Applies normalization to a ``[batch, channels, height, width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Normalization::Batch(norm) => norm.forward(input),
            Normalization::Group(norm) => norm.forward(input),
            Normalization::Instance(norm) => norm.forward(input),
        }
    }

    /// Get the number of features.
    pub fn num_features(&self) -> usize {
        match self {
            Normalization::Batch(norm) => norm.gamma.shape().dims[0],
            Normalization::Group(norm) => norm.num_channels,
            Normalization::Instance(norm) => norm.num_channels,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    #[test]
    fn test_with_num_features() {
        let config = NormalizationConfig::default();
        assert_eq!(config.num_features(), 0);
        assert_eq!(config.with_num_features(12).num_features(), 12);

        let config: NormalizationConfig = GroupNormConfig::new(4, 0).into();
        let config = config.with_num_features(16);
        assert_eq!(config.num_features(), 16);
        match config {
            NormalizationConfig::Group(inner) => assert_eq!(inner.num_groups, 4),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_batch_norm() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let num_features = 12;
        let input: Tensor<B, 4> = Tensor::ones([2, num_features, 3, 4], &device);

        let config: NormalizationConfig = BatchNormConfig::new(num_features).into();
        let layer: Normalization<B> = config.init(&device);
        assert_eq!(layer.num_features(), num_features);

        let expected = match &layer {
            Normalization::Batch(inner) => inner.forward(input.clone()),
            _ => panic!("Unexpected layer type"),
        };

        let output = layer.forward(input);
        output.to_data().assert_eq(&expected.to_data(), true);
    }

    #[test]
    fn test_group_norm() {
        type B = NdArray<f32>;
        let device = Default::default();

        let num_features = 12;
        let input: Tensor<B, 4> = Tensor::ones([2, num_features, 3, 4], &device);

        let config: NormalizationConfig = GroupNormConfig::new(3, num_features).into();
        let layer: Normalization<B> = config.init(&device);
        assert_eq!(layer.num_features(), num_features);

        let expected = match &layer {
            Normalization::Group(inner) => inner.forward(input.clone()),
            _ => panic!("Unexpected layer type"),
        };

        let output = layer.forward(input);
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
