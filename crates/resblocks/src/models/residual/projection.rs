//! # Projection Shortcut
//!
//! When a `ResNet` block changes channels or strides, the shortcut
//! is projected with a strided 1x1 convolution and a linear norm.
//! With anti-aliasing, the stride is moved into a [`BlurPool2d`] ahead
//! of an unstrided convolution.

use crate::layers::conv::conv1x1;
use crate::layers::norm::norm_act::{NormAct, NormActConfig};
use crate::layers::pool::{BlurPool2d, BlurPool2dConfig};
use crate::models::residual::util::stride_div_output_resolution;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::Conv2d;
use burn::prelude::{Backend, Tensor};

/// [`Projection`] Config.
#[derive(Config, Debug)]
pub struct ProjectionConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels.
    pub out_channels: usize,

    /// Spatial stride.
    #[config(default = 1)]
    pub stride: usize,

    /// Blur before subsampling; only applies at stride 2.
    #[config(default = "false")]
    pub antialias: bool,

    /// The norm policy; the activation is replaced with identity.
    #[config(default = "NormActConfig::new()")]
    pub norm_act: NormActConfig,
}

impl ProjectionConfig {
    /// Initialize a [`Projection`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Projection<B> {
        let antialias = self.antialias && self.stride == 2;
        let conv_stride = if antialias { 1 } else { self.stride };

        Projection {
            stride: self.stride,
            blur: if antialias {
                Some(BlurPool2dConfig::new(self.in_channels).init())
            } else {
                None
            },
            conv: conv1x1(self.in_channels, self.out_channels)
                .with_stride(conv_stride)
                .init(device),
            norm: self.norm_act.linear().init_sized(self.out_channels, device),
        }
    }
}

/// Projection shortcut.
///
/// Maps ``[batch, in_channels, in_height, in_width]`` to
/// ``[batch, out_channels, out_height, out_width]``.
#[derive(Module, Debug)]
pub struct Projection<B: Backend> {
    /// Effective stride.
    pub stride: usize,

    /// Optional anti-aliasing downsample.
    pub blur: Option<BlurPool2d>,

    /// 1x1 projection.
    pub conv: Conv2d<B>,

    /// Linear norm.
    pub norm: NormAct<B>,
}

impl<B: Backend> Projection<B> {
    /// Input channels.
    pub fn in_channels(&self) -> usize {
        self.conv.weight.dims()[1]
    }

    /// Output channels.
    pub fn out_channels(&self) -> usize {
        self.conv.weight.dims()[0]
    }

    /// Forward pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_channels", self.in_channels())],
        );
        let [out_height, out_width] =
            stride_div_output_resolution([in_height, in_width], self.stride);

        let x = match &self.blur {
            Some(blur) => blur.forward(input),
            None => input,
        };
        let x = self.conv.forward(x);
        let x = self.norm.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        x
    }
}
