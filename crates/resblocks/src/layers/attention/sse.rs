//! # Spatial Squeeze-and-Excitation
//!
//! Excites locations in the spatial domain rather than channels.
//!
//! Ref: Recalibrating Fully Convolutional Networks with Spatial and Channel
//! 'Squeeze & Excitation' Blocks, <https://arxiv.org/abs/1808.08127>

use crate::layers::conv::conv1x1;
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::Conv2d;
use burn::prelude::{Backend, Tensor};
use burn::tensor::activation::sigmoid;

/// [`SpatialSqueezeExcite`] Config.
#[derive(Config, Debug)]
pub struct SpatialSqueezeExciteConfig {
    /// Input (and output) channels.
    pub channels: usize,
}

impl SpatialSqueezeExciteConfig {
    /// Initialize a [`SpatialSqueezeExcite`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> SpatialSqueezeExcite<B> {
        SpatialSqueezeExcite {
            conv: conv1x1(self.channels, 1).with_bias(true).init(device),
        }
    }
}

/// Spatial attention.
///
/// ```text
/// out = x * sigmoid(conv1x1(x) as [batch, 1, height, width])
/// ```
#[derive(Module, Debug)]
pub struct SpatialSqueezeExcite<B: Backend> {
    /// ``channels -> 1`` projection.
    pub conv: Conv2d<B>,
}

impl<B: Backend> SpatialSqueezeExcite<B> {
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
        let gate = self.conv.forward(input.clone());
        input * sigmoid(gate)
    }
}
