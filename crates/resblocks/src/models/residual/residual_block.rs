//! # Residual Block Wrapper
//!
//! [`ResidualBlockConfig`] and [`ResidualBlock`] are closed sums over
//! every block variant, so stages can hold heterogeneous blocks.

use crate::layers::mode::ForwardMode;
use crate::models::residual::basic_block::{BasicBlock, BasicBlockConfig};
use crate::models::residual::bottleneck::{Bottleneck, BottleneckConfig};
use crate::models::residual::csp_dark_block::{CspDarkBlock, CspDarkBlockConfig};
use crate::models::residual::dark_block::{DarkBlock, DarkBlockConfig};
use crate::models::residual::inverted_residual::{InvertedResidual, InvertedResidualConfig};
use crate::models::residual::meta::ResidualBlockMeta;
use crate::models::residual::simple_bottleneck::{SimpleBottleneck, SimpleBottleneckConfig};
use crate::models::residual::simple_preact_bottleneck::{
    SimplePreActBottleneck, SimplePreActBottleneckConfig,
};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

macro_rules! dispatch {
    ($value:expr, $name:ident => $body:expr) => {
        match $value {
            Self::Basic($name) => $body,
            Self::Bottleneck($name) => $body,
            Self::InvertedResidual($name) => $body,
            Self::Dark($name) => $body,
            Self::CspDark($name) => $body,
            Self::SimpleBottleneck($name) => $body,
            Self::SimplePreActBottleneck($name) => $body,
        }
    };
}

/// [`ResidualBlock`] Config.
#[derive(Config, Debug)]
pub enum ResidualBlockConfig {
    /// A [`BasicBlock`].
    Basic(BasicBlockConfig),

    /// A [`Bottleneck`].
    Bottleneck(BottleneckConfig),

    /// An [`InvertedResidual`].
    InvertedResidual(InvertedResidualConfig),

    /// A [`DarkBlock`].
    Dark(DarkBlockConfig),

    /// A [`CspDarkBlock`].
    CspDark(CspDarkBlockConfig),

    /// A [`SimpleBottleneck`].
    SimpleBottleneck(SimpleBottleneckConfig),

    /// A [`SimplePreActBottleneck`].
    SimplePreActBottleneck(SimplePreActBottleneckConfig),
}

impl ResidualBlockMeta for ResidualBlockConfig {
    fn in_channels(&self) -> usize {
        dispatch!(self, config => config.in_channels())
    }

    fn out_channels(&self) -> usize {
        dispatch!(self, config => config.out_channels())
    }

    fn stride(&self) -> usize {
        dispatch!(self, config => config.stride())
    }

    fn has_residual(&self) -> bool {
        dispatch!(self, config => config.has_residual())
    }
}

impl From<BasicBlockConfig> for ResidualBlockConfig {
    fn from(config: BasicBlockConfig) -> Self {
        Self::Basic(config)
    }
}

impl From<BottleneckConfig> for ResidualBlockConfig {
    fn from(config: BottleneckConfig) -> Self {
        Self::Bottleneck(config)
    }
}

impl From<InvertedResidualConfig> for ResidualBlockConfig {
    fn from(config: InvertedResidualConfig) -> Self {
        Self::InvertedResidual(config)
    }
}

impl From<DarkBlockConfig> for ResidualBlockConfig {
    fn from(config: DarkBlockConfig) -> Self {
        Self::Dark(config)
    }
}

impl From<CspDarkBlockConfig> for ResidualBlockConfig {
    fn from(config: CspDarkBlockConfig) -> Self {
        Self::CspDark(config)
    }
}

impl From<SimpleBottleneckConfig> for ResidualBlockConfig {
    fn from(config: SimpleBottleneckConfig) -> Self {
        Self::SimpleBottleneck(config)
    }
}

impl From<SimplePreActBottleneckConfig> for ResidualBlockConfig {
    fn from(config: SimplePreActBottleneckConfig) -> Self {
        Self::SimplePreActBottleneck(config)
    }
}

impl ResidualBlockConfig {
    /// Build a `ResNet` block config.
    ///
    /// Bottleneck blocks expand by 4, so `out_planes` must be a multiple of 4.
    pub fn resnet(
        in_planes: usize,
        out_planes: usize,
        stride: usize,
        bottleneck: bool,
    ) -> Self {
        if bottleneck {
            BottleneckConfig::from_channels(in_planes, out_planes)
                .with_stride(stride)
                .into()
        } else {
            BasicBlockConfig::new(in_planes, out_planes)
                .with_stride(stride)
                .into()
        }
    }

    /// Initialize a [`ResidualBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> ResidualBlock<B> {
        match self {
            Self::Basic(config) => config.clone().init(device).into(),
            Self::Bottleneck(config) => config.clone().init(device).into(),
            Self::InvertedResidual(config) => config.init(device).into(),
            Self::Dark(config) => config.init(device).into(),
            Self::CspDark(config) => config.init(device).into(),
            Self::SimpleBottleneck(config) => config.init(device).into(),
            Self::SimplePreActBottleneck(config) => config.init(device).into(),
        }
    }
}

/// Residual block wrapper.
#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum ResidualBlock<B: Backend> {
    /// A [`BasicBlock`].
    Basic(BasicBlock<B>),

    /// A [`Bottleneck`].
    Bottleneck(Bottleneck<B>),

    /// An [`InvertedResidual`].
    InvertedResidual(InvertedResidual<B>),

    /// A [`DarkBlock`].
    Dark(DarkBlock<B>),

    /// A [`CspDarkBlock`].
    CspDark(CspDarkBlock<B>),

    /// A [`SimpleBottleneck`].
    SimpleBottleneck(SimpleBottleneck<B>),

    /// A [`SimplePreActBottleneck`].
    SimplePreActBottleneck(SimplePreActBottleneck<B>),
}

impl<B: Backend> From<BasicBlock<B>> for ResidualBlock<B> {
    fn from(block: BasicBlock<B>) -> Self {
        Self::Basic(block)
    }
}

impl<B: Backend> From<Bottleneck<B>> for ResidualBlock<B> {
    fn from(block: Bottleneck<B>) -> Self {
        Self::Bottleneck(block)
    }
}

impl<B: Backend> From<InvertedResidual<B>> for ResidualBlock<B> {
    fn from(block: InvertedResidual<B>) -> Self {
        Self::InvertedResidual(block)
    }
}

impl<B: Backend> From<DarkBlock<B>> for ResidualBlock<B> {
    fn from(block: DarkBlock<B>) -> Self {
        Self::Dark(block)
    }
}

impl<B: Backend> From<CspDarkBlock<B>> for ResidualBlock<B> {
    fn from(block: CspDarkBlock<B>) -> Self {
        Self::CspDark(block)
    }
}

impl<B: Backend> From<SimpleBottleneck<B>> for ResidualBlock<B> {
    fn from(block: SimpleBottleneck<B>) -> Self {
        Self::SimpleBottleneck(block)
    }
}

impl<B: Backend> From<SimplePreActBottleneck<B>> for ResidualBlock<B> {
    fn from(block: SimplePreActBottleneck<B>) -> Self {
        Self::SimplePreActBottleneck(block)
    }
}

impl<B: Backend> ResidualBlockMeta for ResidualBlock<B> {
    fn in_channels(&self) -> usize {
        dispatch!(self, block => block.in_channels())
    }

    fn out_channels(&self) -> usize {
        dispatch!(self, block => block.out_channels())
    }

    fn stride(&self) -> usize {
        dispatch!(self, block => block.stride())
    }

    fn has_residual(&self) -> bool {
        dispatch!(self, block => block.has_residual())
    }
}

impl<B: Backend> ResidualBlock<B> {
    /// Apply the wrapped block to the input.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    /// - `mode`: the forward mode; ignored by blocks without drop connect.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_channels, out_height, out_width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
        mode: ForwardMode,
    ) -> Tensor<B, 4> {
        match self {
            Self::Basic(block) => block.forward(input, mode),
            Self::Bottleneck(block) => block.forward(input, mode),
            Self::InvertedResidual(block) => block.forward(input, mode),
            Self::Dark(block) => block.forward(input, mode),
            Self::CspDark(block) => block.forward(input, mode),
            Self::SimpleBottleneck(block) => block.forward(input),
            Self::SimplePreActBottleneck(block) => block.forward(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    /// Every variant that can be built for the given channels and stride.
    fn variants(
        in_channels: usize,
        out_channels: usize,
        stride: usize,
    ) -> Vec<ResidualBlockConfig> {
        let mut configs: Vec<ResidualBlockConfig> = vec![
            BasicBlockConfig::new(in_channels, out_channels)
                .with_stride(stride)
                .into(),
            BottleneckConfig::from_channels(in_channels, out_channels)
                .with_stride(stride)
                .into(),
            InvertedResidualConfig::new(in_channels, out_channels)
                .with_stride(stride)
                .with_expand_ratio(2.0)
                .into(),
            SimpleBottleneckConfig::new(in_channels, 8, out_channels)
                .with_stride(stride)
                .into(),
            SimplePreActBottleneckConfig::new(in_channels, 8, out_channels)
                .with_stride(stride)
                .into(),
        ];
        if stride == 1 {
            configs.push(
                DarkBlockConfig::new(in_channels, out_channels)
                    .with_groups(1)
                    .into(),
            );
            configs.push(CspDarkBlockConfig::new(in_channels, out_channels).into());
        }
        configs
    }

    #[test]
    fn test_residual_enablement_rule() {
        let device = Default::default();

        for in_channels in [8, 16] {
            for out_channels in [8, 16, 32] {
                for stride in [1, 2] {
                    let expected = in_channels == out_channels && stride == 1;
                    for config in variants(in_channels, out_channels, stride) {
                        assert_eq!(config.has_residual(), expected, "{config:?}");

                        let block: ResidualBlock<B> = config.init(&device);
                        assert_eq!(block.has_residual(), expected, "{config:?}");
                        assert_eq!(block.in_channels(), in_channels);
                        assert_eq!(block.out_channels(), out_channels);
                        assert_eq!(block.stride(), stride);

                        let output = block.forward(
                            Tensor::ones([1, in_channels, 4, 4], &device),
                            ForwardMode::Eval,
                        );
                        let [out_height, out_width] = block.output_resolution([4, 4]);
                        assert_eq!(output.dims(), [1, out_channels, out_height, out_width]);
                    }
                }
            }
        }
    }

    #[test]
    fn test_resnet_builder() {
        let config = ResidualBlockConfig::resnet(64, 64, 1, false);
        assert!(matches!(config, ResidualBlockConfig::Basic(_)));
        assert!(config.has_residual());

        let config = ResidualBlockConfig::resnet(64, 256, 2, true);
        match &config {
            ResidualBlockConfig::Bottleneck(inner) => assert_eq!(inner.planes, 64),
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(config.out_channels(), 256);
        assert!(!config.has_residual());
    }
}
