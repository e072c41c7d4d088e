//! # Efficient Channel Attention
//!
//! The channel convolution has a fixed kernel width (3 by default),
//! instead of the paper's channel-count-derived width.
//!
//! Ref: ECA-Net, <https://arxiv.org/abs/1910.03151>

use crate::layers::pool::global_avg_pool2d;
use burn::config::Config;
use burn::module::Module;
use burn::nn::PaddingConfig1d;
use burn::nn::conv::{Conv1d, Conv1dConfig};
use burn::prelude::{Backend, Tensor};
use burn::tensor::activation::sigmoid;

/// Default width of the channel-axis convolution.
pub const ECA_KERNEL_SIZE: usize = 3;

/// [`EfficientChannelAttention`] Config.
///
/// The channel count is not needed.
#[derive(Config, Debug)]
pub struct EfficientChannelAttentionConfig {
    /// Odd width of the channel-axis convolution.
    #[config(default = "ECA_KERNEL_SIZE")]
    pub kernel_size: usize,
}

impl EfficientChannelAttentionConfig {
    /// Initialize an [`EfficientChannelAttention`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> EfficientChannelAttention<B> {
        assert_eq!(self.kernel_size % 2, 1, "kernel_size must be odd");
        EfficientChannelAttention {
            conv: Conv1dConfig::new(1, 1, self.kernel_size)
                .with_padding(PaddingConfig1d::Explicit(self.kernel_size / 2))
                .with_bias(false)
                .init(device),
        }
    }
}

/// Channel attention with a 1d convolution across the pooled channels.
///
/// ```text
/// gate = sigmoid(conv1d(avg_pool(x) as [batch, 1, channels]))
/// out = x * gate
/// ```
#[derive(Module, Debug)]
pub struct EfficientChannelAttention<B: Backend> {
    /// ``1 -> 1`` channel-axis convolution.
    pub conv: Conv1d<B>,
}

impl<B: Backend> EfficientChannelAttention<B> {
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
        let [batch, channels, _height, _width] = input.dims();

        let gate = global_avg_pool2d(input.clone()).reshape([batch, 1, channels]);
        let gate = self.conv.forward(gate).reshape([batch, channels, 1, 1]);

        input * sigmoid(gate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::assert_close;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    #[test]
    fn test_eca() {
        type B = NdArray<f32>;
        let device = Default::default();

        let layer: EfficientChannelAttention<B> =
            EfficientChannelAttentionConfig::new().init(&device);
        assert_eq!(layer.conv.weight.dims(), [1, 1, ECA_KERNEL_SIZE]);
        assert!(layer.conv.bias.is_none());

        let input: Tensor<B, 4> = Tensor::random([2, 7, 4, 3], Distribution::Default, &device);
        let output = layer.forward(input.clone());
        assert_eq!(output.dims(), [2, 7, 4, 3]);

        let expected = {
            let pooled = input.clone().mean_dim(3).mean_dim(2).reshape([2, 1, 7]);
            let gate = layer.conv.forward(pooled).reshape([2, 7, 1, 1]);
            input * sigmoid(gate)
        };
        assert_close(output, expected, 1e-6);
    }

    #[test]
    fn test_eca_kernel_size() {
        type B = NdArray<f32>;
        let device = Default::default();

        let layer: EfficientChannelAttention<B> = EfficientChannelAttentionConfig::new()
            .with_kernel_size(5)
            .init(&device);
        assert_eq!(layer.conv.weight.dims(), [1, 1, 5]);

        let input: Tensor<B, 4> = Tensor::ones([1, 9, 2, 2], &device);
        assert_eq!(layer.forward(input).dims(), [1, 9, 2, 2]);
    }
}
