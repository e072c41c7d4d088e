//! # Spatial and Channel Squeeze-and-Excitation
//!
//! Combines [`SpatialSqueezeExcite`] with [`EfficientChannelAttention`]
//! (in place of the paper's channel SE), and projects the concatenated
//! result back to the input channel count.
//!
//! Ref: Recalibrating Fully Convolutional Networks with Spatial and Channel
//! 'Squeeze & Excitation' Blocks, <https://arxiv.org/abs/1808.08127>

use crate::layers::attention::eca::{EfficientChannelAttention, EfficientChannelAttentionConfig};
use crate::layers::attention::sse::{SpatialSqueezeExcite, SpatialSqueezeExciteConfig};
use crate::layers::conv::conv1x1;
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::Conv2d;
use burn::prelude::{Backend, Tensor};

/// [`SpatialChannelSqueezeExcite`] Config.
#[derive(Config, Debug)]
pub struct SpatialChannelSqueezeExciteConfig {
    /// Input (and output) channels.
    pub channels: usize,
}

impl SpatialChannelSqueezeExciteConfig {
    /// Initialize a [`SpatialChannelSqueezeExcite`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> SpatialChannelSqueezeExcite<B> {
        SpatialChannelSqueezeExcite {
            sse: SpatialSqueezeExciteConfig::new(self.channels).init(device),
            cse: EfficientChannelAttentionConfig::new().init(device),
            // no norm follows, so the projection has a bias.
            reduction_conv: conv1x1(2 * self.channels, self.channels)
                .with_bias(true)
                .init(device),
        }
    }
}

/// Spatial + channel attention.
///
/// ```text
/// out = conv1x1(cat([sse(x), eca(x)], dim=1))
/// ```
#[derive(Module, Debug)]
pub struct SpatialChannelSqueezeExcite<B: Backend> {
    /// Spatial branch.
    pub sse: SpatialSqueezeExcite<B>,

    /// Channel branch.
    pub cse: EfficientChannelAttention<B>,

    /// ``2 * channels -> channels`` projection.
    pub reduction_conv: Conv2d<B>,
}

impl<B: Backend> SpatialChannelSqueezeExcite<B> {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, channels, height, width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let spatial = self.sse.forward(input.clone());
        let channel = self.cse.forward(input);
        self.reduction_conv
            .forward(Tensor::cat(vec![spatial, channel], 1))
    }
}
