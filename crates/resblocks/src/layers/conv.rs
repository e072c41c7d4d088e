//! # Primitive Convolution Constructors
//!
//! [`conv3x3`] and [`conv1x1`] build the two convolution shapes that every
//! block is made of. Padding is derived from the dilation so that, at
//! stride 1, spatial size is preserved.

use burn::config::Config;
use burn::nn::PaddingConfig2d;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::prelude::Backend;

/// A 3x3 convolution.
#[derive(Config, Debug)]
pub struct Conv3x3Config {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels.
    pub out_channels: usize,

    /// Spatial stride.
    #[config(default = 1)]
    pub stride: usize,

    /// Channel groups.
    #[config(default = 1)]
    pub groups: usize,

    /// Kernel dilation; also the padding.
    #[config(default = 1)]
    pub dilation: usize,

    /// Learn a bias term.
    #[config(default = "false")]
    pub bias: bool,
}

impl Conv3x3Config {
    /// Lower to a [`Conv2dConfig`].
    pub fn to_conv2d_config(&self) -> Conv2dConfig {
        Conv2dConfig::new([self.in_channels, self.out_channels], [3, 3])
            .with_stride([self.stride, self.stride])
            .with_groups(self.groups)
            .with_dilation([self.dilation, self.dilation])
            .with_padding(PaddingConfig2d::Explicit(self.dilation, self.dilation))
            .with_bias(self.bias)
    }

    /// Initialize a [`Conv2d`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Conv2d<B> {
        self.to_conv2d_config().init(device)
    }
}

/// A 1x1 (pointwise) convolution.
#[derive(Config, Debug)]
pub struct Conv1x1Config {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels.
    pub out_channels: usize,

    /// Spatial stride.
    #[config(default = 1)]
    pub stride: usize,

    /// Learn a bias term.
    #[config(default = "false")]
    pub bias: bool,
}

impl Conv1x1Config {
    /// Lower to a [`Conv2dConfig`].
    pub fn to_conv2d_config(&self) -> Conv2dConfig {
        Conv2dConfig::new([self.in_channels, self.out_channels], [1, 1])
            .with_stride([self.stride, self.stride])
            .with_padding(PaddingConfig2d::Explicit(0, 0))
            .with_bias(self.bias)
    }

    /// Initialize a [`Conv2d`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Conv2d<B> {
        self.to_conv2d_config().init(device)
    }
}

/// A 3x3 convolution, ``stride=1, groups=1, dilation=1, bias=false``.
pub fn conv3x3(
    in_channels: usize,
    out_channels: usize,
) -> Conv3x3Config {
    Conv3x3Config::new(in_channels, out_channels)
}

/// A 1x1 convolution, ``stride=1, bias=false``.
pub fn conv1x1(
    in_channels: usize,
    out_channels: usize,
) -> Conv1x1Config {
    Conv1x1Config::new(in_channels, out_channels)
}

/// A ``kernel x kernel`` depthwise convolution (``groups = channels``).
///
/// Padding is ``dilation * (kernel - 1) / 2``.
pub fn conv_kxk_depthwise(
    channels: usize,
    kernel_size: usize,
    stride: usize,
    dilation: usize,
) -> Conv2dConfig {
    let padding = dilation * (kernel_size - 1) / 2;
    Conv2dConfig::new([channels, channels], [kernel_size, kernel_size])
        .with_stride([stride, stride])
        .with_groups(channels)
        .with_dilation([dilation, dilation])
        .with_padding(PaddingConfig2d::Explicit(padding, padding))
        .with_bias(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::prelude::Tensor;

    type B = NdArray<f32>;

    #[test]
    fn test_conv3x3_config() {
        let config = conv3x3(4, 8).with_stride(2).with_dilation(2).with_groups(2);
        let inner = config.to_conv2d_config();
        assert_eq!(inner.channels, [4, 8]);
        assert_eq!(inner.kernel_size, [3, 3]);
        assert_eq!(inner.stride, [2, 2]);
        assert_eq!(inner.dilation, [2, 2]);
        assert_eq!(inner.groups, 2);
        assert!(!inner.bias);
        assert!(matches!(inner.padding, PaddingConfig2d::Explicit(2, 2)));
    }

    #[test]
    fn test_conv3x3_preserves_resolution() {
        let device = Default::default();
        for dilation in [1, 2, 3] {
            let conv: Conv2d<B> = conv3x3(4, 6).with_dilation(dilation).init(&device);
            let output = conv.forward(Tensor::ones([2, 4, 12, 12], &device));
            assert_eq!(output.dims(), [2, 6, 12, 12]);
        }

        let conv: Conv2d<B> = conv3x3(4, 6).with_stride(2).init(&device);
        let output = conv.forward(Tensor::ones([2, 4, 12, 12], &device));
        assert_eq!(output.dims(), [2, 6, 6, 6]);
    }

    #[test]
    fn test_conv1x1() {
        let device = Default::default();
        let config = conv1x1(4, 6).with_bias(true);
        assert!(config.to_conv2d_config().bias);

        let conv: Conv2d<B> = config.with_stride(2).init(&device);
        let output = conv.forward(Tensor::ones([2, 4, 8, 8], &device));
        assert_eq!(output.dims(), [2, 6, 4, 4]);
    }

    #[test]
    fn test_conv_kxk_depthwise() {
        let device = Default::default();
        let conv: Conv2d<B> = conv_kxk_depthwise(6, 5, 2, 1).init(&device);
        assert_eq!(conv.groups, 6);
        let output = conv.forward(Tensor::ones([2, 6, 8, 8], &device));
        assert_eq!(output.dims(), [2, 6, 4, 4]);
    }
}
