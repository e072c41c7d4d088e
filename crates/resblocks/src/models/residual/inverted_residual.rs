//! # Inverted Residual Block
//!
//! The mobile-style block: expand with a pointwise convolution, filter
//! with a depthwise convolution, then project back down linearly.
//!
//! ```text
//! mid = make_divisible(in_channels * expand_ratio, 8), or in_channels when expand_ratio == 1
//!
//! out = [conv1x1 -> norm_act] -> dw_conv(kxk, stride) -> norm_act -> attention
//!       -> conv1x1 -> norm -> (drop_connect + input, if residual)
//! ```
//!
//! There is no activation after the residual addition.

use crate::layers::attention::{Attention, AttentionConfig, AttentionKind};
use crate::layers::conv::{conv_kxk_depthwise, conv1x1};
use crate::layers::drop::drop_connect::{DropConnect, DropConnectConfig};
use crate::layers::mode::ForwardMode;
use crate::layers::norm::norm_act::{NormAct, NormActConfig};
use crate::models::residual::meta::ResidualBlockMeta;
use crate::models::residual::util::{identity_shortcut_compatible, se_reduction_channels};
use crate::utility::divisible::make_divisible;
use crate::utility::probability::expect_keep_probability;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::Conv2d;
use burn::prelude::{Backend, Config, Module, Tensor};

/// Expanded channel counts are rounded to a multiple of this.
pub const INVERTED_RESIDUAL_CHANNEL_DIVISOR: usize = 8;

/// [`InvertedResidual`] Config.
#[derive(Config, Debug)]
pub struct InvertedResidualConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels.
    pub out_channels: usize,

    /// Kernel size of the depthwise convolution.
    #[config(default = 3)]
    pub dw_kernel_size: usize,

    /// Stride of the depthwise convolution.
    #[config(default = 1)]
    pub stride: usize,

    /// Dilation of the depthwise convolution.
    #[config(default = 1)]
    pub dilation: usize,

    /// Optional attention over the expanded channels.
    #[config(default = "None")]
    pub attention: Option<AttentionKind>,

    /// Channel expansion ratio; `1.0` skips the expansion convolution.
    #[config(default = "1.0")]
    pub expand_ratio: f64,

    /// Drop connect keep probability.
    #[config(default = "1.0")]
    pub keep_prob: f64,

    /// Disable the residual even when shapes allow it.
    #[config(default = "false")]
    pub noskip: bool,

    /// Norm / activation policy.
    #[config(default = "NormActConfig::new()")]
    pub norm_act: NormActConfig,
}

impl ResidualBlockMeta for InvertedResidualConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn has_residual(&self) -> bool {
        identity_shortcut_compatible(self.in_channels, self.out_channels, self.stride)
            && !self.noskip
    }
}

impl InvertedResidualConfig {
    /// The expanded (depthwise) channel count.
    ///
    /// Without an expansion stage the depthwise convolution reads the
    /// input directly, so this is `in_channels`.
    pub fn mid_channels(&self) -> usize {
        if !self.has_expansion() {
            return self.in_channels;
        }
        make_divisible(
            self.in_channels as f64 * self.expand_ratio,
            INVERTED_RESIDUAL_CHANNEL_DIVISOR,
        )
    }

    /// Is there a pointwise expansion stage?
    pub fn has_expansion(&self) -> bool {
        self.expand_ratio != 1.0
    }

    /// Initialize an [`InvertedResidual`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> InvertedResidual<B> {
        expect_keep_probability(self.keep_prob);

        let mid_channels = self.mid_channels();
        let has_residual = self.has_residual();

        let expansion = if self.has_expansion() {
            Some((
                conv1x1(self.in_channels, mid_channels).init(device),
                self.norm_act.init_sized(mid_channels, device),
            ))
        } else {
            None
        };

        tracing::debug!(
            in_channels = self.in_channels,
            mid_channels,
            out_channels = self.out_channels,
            stride = self.stride,
            has_residual,
            attention = ?self.attention,
            "init InvertedResidual"
        );

        let (conv_pw, norm1) = match expansion {
            Some((conv, norm)) => (Some(conv), Some(norm)),
            None => (None, None),
        };

        InvertedResidual {
            in_channels: self.in_channels,
            stride: self.stride,
            has_residual,
            conv_pw,
            norm1,
            conv_dw: conv_kxk_depthwise(
                mid_channels,
                self.dw_kernel_size,
                self.stride,
                self.dilation,
            )
            .init(device),
            norm2: self.norm_act.init_sized(mid_channels, device),
            attention: AttentionConfig::new(mid_channels, se_reduction_channels(self.in_channels))
                .with_kind(self.attention)
                .with_act(self.norm_act.act.clone())
                .init(device),
            conv_pwl: conv1x1(mid_channels, self.out_channels).init(device),
            norm3: self.norm_act.linear().init_sized(self.out_channels, device),
            drop_connect: DropConnectConfig::new()
                .with_keep_prob(self.keep_prob)
                .init_if_active(),
        }
    }
}

/// Inverted residual block.
#[derive(Module, Debug)]
pub struct InvertedResidual<B: Backend> {
    /// Input channels.
    pub in_channels: usize,

    /// Block stride.
    pub stride: usize,

    /// Identity shortcut enabled.
    pub has_residual: bool,

    /// Optional pointwise expansion.
    pub conv_pw: Option<Conv2d<B>>,
    /// Expansion norm/act.
    pub norm1: Option<NormAct<B>>,

    /// Depthwise convolution.
    pub conv_dw: Conv2d<B>,
    /// Depthwise norm/act.
    pub norm2: NormAct<B>,

    /// Attention over the expanded channels.
    pub attention: Attention<B>,

    /// Pointwise linear projection.
    pub conv_pwl: Conv2d<B>,
    /// Projection (linear) norm.
    pub norm3: NormAct<B>,

    /// Optional drop connect; only applied with the residual.
    pub drop_connect: Option<DropConnect>,
}

impl<B: Backend> ResidualBlockMeta for InvertedResidual<B> {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.conv_pwl.weight.dims()[0]
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn has_residual(&self) -> bool {
        self.has_residual
    }
}

impl<B: Backend> InvertedResidual<B> {
    /// The expanded (depthwise) channel count.
    pub fn mid_channels(&self) -> usize {
        self.conv_dw.weight.dims()[0]
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    /// - `mode`: the forward mode.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_channels, out_height, out_width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
        mode: ForwardMode,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_channels", self.in_channels)],
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let residual = if self.has_residual {
            Some(input.clone())
        } else {
            None
        };

        let x = match (&self.conv_pw, &self.norm1) {
            (Some(conv), Some(norm)) => norm.forward(conv.forward(input)),
            _ => input,
        };
        let x = self.conv_dw.forward(x);
        let x = self.norm2.forward(x);
        let x = self.attention.forward(x);
        let x = self.conv_pwl.forward(x);
        let x = self.norm3.forward(x);

        let x = match residual {
            Some(residual) => {
                let x = match &self.drop_connect {
                    Some(drop_connect) => drop_connect.forward(x, mode),
                    None => x,
                };
                x + residual
            }
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::activation::activation_wrapper::{Activation, ActivationConfig};
    use crate::layers::attention::ATTENTION_TABLE;
    use crate::testing::assert_close;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type B = NdArray<f32>;

    #[test]
    fn test_inverted_residual_config() {
        let config = InvertedResidualConfig::new(16, 16);
        assert_eq!(config.mid_channels(), 16);
        assert!(!config.has_expansion());
        assert!(config.has_residual());
        assert!(!config.clone().with_noskip(true).has_residual());
        assert!(!config.clone().with_stride(2).has_residual());

        let config = config.with_expand_ratio(6.0);
        assert!(config.has_expansion());
        assert_eq!(config.mid_channels(), 96);

        // 20 * 0.5 = 10 rounds to 8, which is below 90% of 10.
        let config = InvertedResidualConfig::new(20, 20).with_expand_ratio(0.5);
        assert_eq!(config.mid_channels(), 16);
    }

    #[test]
    fn test_inverted_residual_unaligned_channels() {
        let device = Default::default();

        let config = InvertedResidualConfig::new(12, 12);
        assert!(!config.has_expansion());
        assert_eq!(config.mid_channels(), 12);

        let block: InvertedResidual<B> = config.init(&device);
        assert_eq!(block.mid_channels(), 12);

        let output = block.forward(Tensor::ones([1, 12, 4, 4], &device), ForwardMode::Eval);
        assert_eq!(output.dims(), [1, 12, 4, 4]);
    }

    #[test]
    fn test_inverted_residual_without_expansion() {
        let device = Default::default();

        let block: InvertedResidual<B> = InvertedResidualConfig::new(8, 8).init(&device);
        assert!(block.conv_pw.is_none());
        assert!(block.norm1.is_none());
        assert_eq!(block.mid_channels(), 8);

        let input: Tensor<B, 4> = Tensor::random([2, 8, 6, 6], Distribution::Default, &device);
        let output = block.forward(input.clone(), ForwardMode::Eval);

        let expected = {
            let x = block.norm2.forward(block.conv_dw.forward(input.clone()));
            let x = block.norm3.forward(block.conv_pwl.forward(x));
            x + input
        };
        assert_close(output, expected, 1e-5);
    }

    #[test]
    fn test_inverted_residual_noskip() {
        let device = Default::default();

        let block: InvertedResidual<B> = InvertedResidualConfig::new(8, 8)
            .with_noskip(true)
            .with_expand_ratio(2.0)
            .init(&device);
        assert!(!block.has_residual());

        let input: Tensor<B, 4> = Tensor::random([2, 8, 6, 6], Distribution::Default, &device);
        let output = block.forward(input.clone(), ForwardMode::Eval);

        let expected = {
            let conv = block.conv_pw.as_ref().unwrap();
            let norm = block.norm1.as_ref().unwrap();
            let x = norm.forward(conv.forward(input));
            let x = block.norm2.forward(block.conv_dw.forward(x));
            block.norm3.forward(block.conv_pwl.forward(x))
        };
        assert_close(output, expected, 1e-5);
    }

    #[test]
    fn test_inverted_residual_shapes() {
        let device = Default::default();

        for (_, kind) in ATTENTION_TABLE {
            for dw_kernel_size in [3, 5] {
                let block: InvertedResidual<B> = InvertedResidualConfig::new(16, 24)
                    .with_stride(2)
                    .with_dw_kernel_size(dw_kernel_size)
                    .with_expand_ratio(4.0)
                    .with_attention(Some(kind))
                    .with_keep_prob(0.8)
                    .init(&device);
                assert_eq!(block.mid_channels(), 64);
                assert_eq!(block.output_resolution([8, 8]), [4, 4]);

                let output =
                    block.forward(Tensor::ones([2, 16, 8, 8], &device), ForwardMode::Train);
                assert_eq!(output.dims(), [2, 24, 4, 4]);
            }
        }
    }

    #[test]
    fn test_inverted_residual_attention_act() {
        let device = Default::default();

        let block: InvertedResidual<B> = InvertedResidualConfig::new(16, 16)
            .with_expand_ratio(2.0)
            .with_attention(Some(AttentionKind::Se))
            .with_norm_act(NormActConfig::new().with_act(ActivationConfig::Swish))
            .init(&device);
        match &block.attention {
            Attention::Se(se) => {
                assert_eq!(se.fc1.weight.dims(), [4, 32, 1, 1]);
                assert!(matches!(se.act, Activation::Swish(_)));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
