//! # Squeeze-and-Excitation
//!
//! Ref: Squeeze-and-Excitation Networks, <https://arxiv.org/abs/1709.01507>

use crate::layers::activation::activation_wrapper::{Activation, ActivationConfig};
use crate::layers::conv::conv1x1;
use crate::layers::pool::global_avg_pool2d;
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::Conv2d;
use burn::prelude::{Backend, Tensor};
use burn::tensor::activation::sigmoid;

/// [`SqueezeExcite`] Config.
#[derive(Config, Debug)]
pub struct SqueezeExciteConfig {
    /// Input (and output) channels.
    pub channels: usize,

    /// Channels of the squeezed representation.
    pub reduction_channels: usize,

    /// Activation between the two projections.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,
}

impl SqueezeExciteConfig {
    /// Initialize a [`SqueezeExcite`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> SqueezeExcite<B> {
        SqueezeExcite {
            // both projections carry a bias.
            fc1: conv1x1(self.channels, self.reduction_channels)
                .with_bias(true)
                .init(device),
            act: self.act.init(device),
            fc2: conv1x1(self.reduction_channels, self.channels)
                .with_bias(true)
                .init(device),
        }
    }
}

/// Channel attention: each channel is rescaled by a gate derived
/// from the global average of all channels.
///
/// ```text
/// gate = sigmoid(fc2(act(fc1(avg_pool(x)))))
/// out = x * gate
/// ```
#[derive(Module, Debug)]
pub struct SqueezeExcite<B: Backend> {
    /// Reduction projection.
    pub fc1: Conv2d<B>,

    /// Reduction activation.
    pub act: Activation<B>,

    /// Expansion projection.
    pub fc2: Conv2d<B>,
}

impl<B: Backend> SqueezeExcite<B> {
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
        let gate = global_avg_pool2d(input.clone());
        let gate = self.fc1.forward(gate);
        let gate = self.act.forward(gate);
        let gate = self.fc2.forward(gate);
        input * sigmoid(gate)
    }
}
