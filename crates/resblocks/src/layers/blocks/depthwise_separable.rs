//! # Depthwise Separable Convolution
//!
//! A depthwise 3x3 convolution followed by a pointwise 1x1 convolution,
//! with an optional [`NormAct`] after the pointwise projection.

use crate::layers::conv::{conv1x1, conv3x3};
use crate::layers::norm::norm_act::{NormAct, NormActConfig};
use crate::models::residual::util::stride_div_output_resolution;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::Conv2d;
use burn::prelude::{Backend, Tensor};

/// [`DepthwiseSeparableConv`] Config.
#[derive(Config, Debug)]
pub struct DepthwiseSeparableConvConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels.
    pub out_channels: usize,

    /// Stride of the depthwise convolution.
    #[config(default = 1)]
    pub stride: usize,

    /// Dilation of the depthwise convolution.
    #[config(default = 1)]
    pub dilation: usize,

    /// Apply a norm/act after the pointwise convolution.
    #[config(default = "true")]
    pub use_norm: bool,

    /// The norm/act policy.
    #[config(default = "NormActConfig::new()")]
    pub norm_act: NormActConfig,
}

impl DepthwiseSeparableConvConfig {
    /// Initialize a [`DepthwiseSeparableConv`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> DepthwiseSeparableConv<B> {
        DepthwiseSeparableConv {
            conv_dw: conv3x3(self.in_channels, self.in_channels)
                .with_stride(self.stride)
                .with_groups(self.in_channels)
                .with_dilation(self.dilation)
                .init(device),
            // the pointwise projection may be used without a norm, so it has a bias.
            conv_pw: conv1x1(self.in_channels, self.out_channels)
                .with_bias(true)
                .init(device),
            norm: if self.use_norm {
                Some(self.norm_act.init_sized(self.out_channels, device))
            } else {
                None
            },
        }
    }
}

/// Depthwise separable convolution block.
#[derive(Module, Debug)]
pub struct DepthwiseSeparableConv<B: Backend> {
    /// Depthwise 3x3 convolution.
    pub conv_dw: Conv2d<B>,

    /// Pointwise 1x1 convolution.
    pub conv_pw: Conv2d<B>,

    /// Optional norm/act.
    pub norm: Option<NormAct<B>>,
}

impl<B: Backend> DepthwiseSeparableConv<B> {
    /// Input channels.
    pub fn in_channels(&self) -> usize {
        self.conv_dw.weight.dims()[0]
    }

    /// Output channels.
    pub fn out_channels(&self) -> usize {
        self.conv_pw.weight.dims()[0]
    }

    /// Depthwise stride.
    pub fn stride(&self) -> usize {
        self.conv_dw.stride[0]
    }

    /// Output resolution for a given input resolution.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        stride_div_output_resolution(input_resolution, self.stride())
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
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
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let x = self.conv_dw.forward(input);
        let x = self.conv_pw.forward(x);
        let x = match &self.norm {
            Some(norm) => norm.forward(x),
            None => x,
        };

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
