//! # `BlurPool2d`
//!
//! Low-pass filter, then subsample: the anti-aliased replacement for a
//! strided convolution.
//!
//! A block with anti-aliasing runs its convolution at stride 1 and
//! downsamples afterwards with a [`BlurPool2d`].
//!
//! The filter is the fixed 3x3 binomial kernel, applied per channel:
//!
//! ```text
//! [1 2 1]
//! [2 4 2] / 16
//! [1 2 1]
//! ```

use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};
use burn::tensor::TensorData;
use burn::tensor::module::conv2d;
use burn::tensor::ops::ConvOptions;

const BINOMIAL_3: [f32; 3] = [1.0, 2.0, 1.0];

/// [`BlurPool2d`] Config.
#[derive(Config, Debug)]
pub struct BlurPool2dConfig {
    /// Number of channels filtered.
    pub channels: usize,

    /// Subsampling stride.
    #[config(default = 2)]
    pub stride: usize,
}

impl BlurPool2dConfig {
    /// Initialize a [`BlurPool2d`].
    pub fn init(&self) -> BlurPool2d {
        assert!(self.channels > 0, "channels must be > 0");
        assert!(self.stride > 0, "stride must be > 0");
        BlurPool2d {
            channels: self.channels,
            stride: self.stride,
        }
    }
}

/// Anti-aliased downsampling layer.
///
/// Maps ``[batch, channels, height, width]`` to
/// ``[batch, channels, ceil(height/stride), ceil(width/stride)]``.
#[derive(Module, Clone, Debug)]
pub struct BlurPool2d {
    /// Number of channels filtered.
    pub channels: usize,

    /// Subsampling stride.
    pub stride: usize,
}

impl BlurPool2d {
    /// The normalized depthwise filter, ``[channels, 1, 3, 3]``.
    pub fn filter<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Tensor<B, 4> {
        let mut values = Vec::with_capacity(self.channels * 9);
        for _ in 0..self.channels {
            for a in BINOMIAL_3 {
                for b in BINOMIAL_3 {
                    values.push(a * b / 16.0);
                }
            }
        }
        Tensor::from_data(TensorData::new(values, [self.channels, 1, 3, 3]), device)
    }

    /// Forward pass.
    pub fn forward<B: Backend>(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let weight = self.filter(&input.device());
        conv2d(
            input,
            weight,
            None,
            ConvOptions::new([self.stride, self.stride], [1, 1], [1, 1], self.channels),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{assert_close, mean_scalar};
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_filter_is_normalized() {
        let device = Default::default();
        let pool = BlurPool2dConfig::new(3).init();
        let filter: Tensor<B, 4> = pool.filter(&device);
        assert_eq!(filter.dims(), [3, 1, 3, 3]);

        let per_channel = filter.sum_dim(3).sum_dim(2).reshape([3]);
        assert_close(per_channel, Tensor::ones([3], &device), 1e-6);
    }

    #[test]
    fn test_blur_pool_shape() {
        let device = Default::default();
        let pool = BlurPool2dConfig::new(4).init();

        let input: Tensor<B, 4> = Tensor::ones([2, 4, 8, 8], &device);
        assert_eq!(pool.forward(input).dims(), [2, 4, 4, 4]);

        let input: Tensor<B, 4> = Tensor::ones([2, 4, 7, 7], &device);
        assert_eq!(pool.forward(input).dims(), [2, 4, 4, 4]);
    }

    #[test]
    fn test_blur_pool_constant_interior() {
        let device = Default::default();
        let pool = BlurPool2dConfig::new(2).with_stride(1).init();

        let input: Tensor<B, 4> = Tensor::ones([1, 2, 6, 6], &device) * 3.0;
        let output = pool.forward(input);
        assert_eq!(output.dims(), [1, 2, 6, 6]);

        // away from the zero-padded border, a constant stays constant.
        let interior = output.slice([0..1, 0..2, 1..5, 1..5]);
        assert!((mean_scalar(interior) - 3.0).abs() < 1e-5);
    }
}
