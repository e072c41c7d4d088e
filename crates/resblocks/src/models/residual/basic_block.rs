//! # Basic Block
//!
//! [`BasicBlock`] is the two-3x3-convolution `ResNet` unit.
//!
//! [`BasicBlockConfig`] implements [`Config`], and provides
//! [`BasicBlockConfig::init`] to initialize a [`BasicBlock`].
//!
//! Both implement [`ResidualBlockMeta`].
//!
//! ```text
//! out = conv3x3(stride) -> norm_act -> [blur] -> conv3x3 -> norm
//!       -> attention -> drop_connect -> (+ shortcut) -> final_act
//! ```

use crate::layers::activation::activation_wrapper::{Activation, ActivationConfig};
use crate::layers::attention::{Attention, AttentionConfig, AttentionKind};
use crate::layers::conv::conv3x3;
use crate::layers::drop::drop_connect::{DropConnect, DropConnectConfig};
use crate::layers::mode::ForwardMode;
use crate::layers::norm::norm_act::{NormAct, NormActConfig};
use crate::layers::pool::{BlurPool2d, BlurPool2dConfig};
use crate::models::residual::meta::ResidualBlockMeta;
use crate::models::residual::projection::{Projection, ProjectionConfig};
use crate::models::residual::util::{identity_shortcut_compatible, se_reduction_channels};
use crate::utility::probability::expect_keep_probability;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::Conv2d;
use burn::prelude::{Backend, Config, Module, Tensor};

/// Leaky-relu slope of the first norm in TResNet blocks.
pub const TRESNET_LEAKY_SLOPE: f64 = 1e-3;

/// TResNet SE blocks never squeeze below this many channels.
pub const TRESNET_MIN_SE_CHANNELS: usize = 64;

/// [`BasicBlock`] Config.
#[derive(Config, Debug)]
pub struct BasicBlockConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// Width of both convolutions; also `out_planes`.
    pub planes: usize,

    /// The stride of the first convolution.
    #[config(default = 1)]
    pub stride: usize,

    /// Groups of the first convolution; must be 1.
    #[config(default = 1)]
    pub groups: usize,

    /// Dilation of the first convolution.
    #[config(default = 1)]
    pub dilation: usize,

    /// Optional attention after the second norm.
    #[config(default = "None")]
    pub attention: Option<AttentionKind>,

    /// Norm / activation policy.
    #[config(default = "NormActConfig::new()")]
    pub norm_act: NormActConfig,

    /// Move the stride into a [`BlurPool2d`]; only applies at stride 2.
    #[config(default = "false")]
    pub antialias: bool,

    /// Drop connect keep probability.
    #[config(default = "1.0")]
    pub keep_prob: f64,

    /// Project the shortcut when shapes change; otherwise skip the residual.
    #[config(default = "true")]
    pub downsample: bool,

    /// TResNet flavour.
    #[config(default = "false")]
    pub tresnet: bool,
}

impl ResidualBlockMeta for BasicBlockConfig {
    fn in_channels(&self) -> usize {
        self.in_planes
    }

    fn out_channels(&self) -> usize {
        self.planes
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn has_residual(&self) -> bool {
        identity_shortcut_compatible(self.in_channels(), self.out_channels(), self.stride)
    }
}

impl BasicBlockConfig {
    /// Is the anti-aliasing path active?
    pub fn effective_antialias(&self) -> bool {
        self.antialias && self.stride == 2
    }

    /// Initialize a [`BasicBlock`].
    ///
    /// # Panics
    ///
    /// If `groups != 1`, or `keep_prob` is not in ``(0, 1]``.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> BasicBlock<B> {
        assert_eq!(self.groups, 1, "BasicBlock only supports groups of 1");
        expect_keep_probability(self.keep_prob);

        let in_planes = self.in_channels();
        let planes = self.planes;
        let out_planes = self.out_channels();

        let antialias = self.effective_antialias();
        let conv1_stride = if antialias { 1 } else { self.stride };

        let has_residual = self.has_residual();
        let downsample = if !has_residual && self.downsample {
            Some(
                ProjectionConfig::new(in_planes, out_planes)
                    .with_stride(self.stride)
                    .with_antialias(self.antialias)
                    .with_norm_act(self.norm_act.clone())
                    .init(device),
            )
        } else {
            None
        };

        let norm1 = if self.tresnet {
            self.norm_act
                .clone()
                .with_act(self.norm_act.act.clone().with_leaky_slope(TRESNET_LEAKY_SLOPE))
        } else {
            self.norm_act.clone()
        };

        let reduction_channels = match (self.tresnet, self.attention) {
            (true, Some(AttentionKind::Se)) => (planes / 4).max(TRESNET_MIN_SE_CHANNELS),
            _ => se_reduction_channels(planes),
        };

        let final_act = if self.tresnet {
            ActivationConfig::Relu
        } else {
            self.norm_act.act.clone()
        };

        tracing::debug!(
            in_planes,
            out_planes,
            stride = self.stride,
            antialias,
            has_residual,
            projection = downsample.is_some(),
            attention = ?self.attention,
            "init BasicBlock"
        );

        BasicBlock {
            stride: self.stride,
            has_residual,
            downsample,
            conv1: conv3x3(in_planes, planes)
                .with_stride(conv1_stride)
                .with_dilation(self.dilation)
                .init(device),
            norm1: norm1.init_sized(planes, device),
            blur: if antialias {
                Some(BlurPool2dConfig::new(planes).init())
            } else {
                None
            },
            conv2: conv3x3(planes, out_planes).init(device),
            norm2: self.norm_act.linear().init_sized(out_planes, device),
            attention: AttentionConfig::new(out_planes, reduction_channels)
                .with_kind(self.attention)
                .init(device),
            drop_connect: DropConnectConfig::new()
                .with_keep_prob(self.keep_prob)
                .init_if_active(),
            final_act: final_act.init(device),
        }
    }
}

/// Basic residual block.
///
/// Implements [`ResidualBlockMeta`].
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    /// Block stride.
    pub stride: usize,

    /// Identity shortcut enabled.
    pub has_residual: bool,

    /// Optional projection shortcut.
    pub downsample: Option<Projection<B>>,

    /// First 3x3 convolution.
    pub conv1: Conv2d<B>,
    /// First norm/act.
    pub norm1: NormAct<B>,

    /// Optional anti-aliasing downsample.
    pub blur: Option<BlurPool2d>,

    /// Second 3x3 convolution.
    pub conv2: Conv2d<B>,
    /// Second (linear) norm.
    pub norm2: NormAct<B>,

    /// Attention.
    pub attention: Attention<B>,

    /// Optional drop connect.
    pub drop_connect: Option<DropConnect>,

    /// Activation after the residual addition.
    pub final_act: Activation<B>,
}

impl<B: Backend> ResidualBlockMeta for BasicBlock<B> {
    fn in_channels(&self) -> usize {
        self.conv1.weight.dims()[1]
    }

    fn out_channels(&self) -> usize {
        self.conv2.weight.dims()[0]
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn has_residual(&self) -> bool {
        self.has_residual
    }
}

impl<B: Backend> BasicBlock<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height, in_width]``.
    /// - `mode`: the forward mode; drop connect only samples in training.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_planes, out_height, out_width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
        mode: ForwardMode,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_planes", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_planes", self.in_channels())],
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let shortcut = match &self.downsample {
            Some(downsample) => Some(downsample.forward(input.clone())),
            None if self.has_residual => Some(input.clone()),
            None => None,
        };

        let x = self.conv1.forward(input);
        let x = self.norm1.forward(x);
        // conv(s=2) -> norm_act  =>  conv(s=1) -> norm_act -> blur(s=2)
        let x = match &self.blur {
            Some(blur) => blur.forward(x),
            None => x,
        };
        let x = self.conv2.forward(x);
        let x = self.norm2.forward(x);
        let x = self.attention.forward(x);
        let x = match &self.drop_connect {
            Some(drop_connect) => drop_connect.forward(x, mode),
            None => x,
        };
        let x = match shortcut {
            Some(shortcut) => x + shortcut,
            None => x,
        };
        let x = self.final_act.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_channels()),
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
    use crate::layers::attention::ATTENTION_TABLE;
    use crate::testing::assert_close;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;

    #[test]
    fn test_basic_block_config() {
        let config = BasicBlockConfig::new(16, 32);
        assert_eq!(config.in_channels(), 16);
        assert_eq!(config.out_channels(), 32);
        assert_eq!(config.stride(), 1);
        assert!(!config.has_residual());
        assert_eq!(config.output_resolution([16, 16]), [16, 16]);

        let config = config.with_stride(2).with_antialias(true);
        assert!(config.effective_antialias());
        assert_eq!(config.output_resolution([16, 16]), [8, 8]);

        assert!(BasicBlockConfig::new(16, 16).has_residual());
        assert!(!BasicBlockConfig::new(16, 16).with_antialias(true).effective_antialias());
    }

    #[test]
    #[should_panic(expected = "BasicBlock only supports groups of 1")]
    fn test_basic_block_groups_panic() {
        type B = NdArray<f32>;
        let device = Default::default();
        let _block: BasicBlock<B> = BasicBlockConfig::new(8, 8).with_groups(2).init(&device);
    }

    #[test]
    fn test_basic_block_identity_shortcut() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: BasicBlock<B> = BasicBlockConfig::new(8, 8).init(&device);
        assert!(block.has_residual());
        assert!(block.downsample.is_none());
        assert!(block.blur.is_none());
        assert!(block.drop_connect.is_none());

        let input: Tensor<B, 4> = Tensor::random([2, 8, 6, 6], Distribution::Default, &device);
        let output = block.forward(input.clone(), ForwardMode::Eval);

        let expected = {
            let x = block.conv1.forward(input.clone());
            let x = block.norm1.forward(x);
            let x = block.conv2.forward(x);
            let x = block.norm2.forward(x);
            let x = block.attention.forward(x);
            block.final_act.forward(x + input)
        };
        assert_close(output, expected, 1e-5);
    }

    #[test]
    fn test_basic_block_projection_shortcut() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let block: BasicBlock<B> = BasicBlockConfig::new(4, 8)
            .with_stride(2)
            .with_keep_prob(0.8)
            .init(&device);
        assert!(!block.has_residual());
        assert!(block.downsample.is_some());
        assert!(block.drop_connect.is_some());
        assert_eq!(block.output_resolution([8, 8]), [4, 4]);

        let output = block.forward(
            Tensor::ones([2, 4, 8, 8], &device),
            ForwardMode::from_backend::<B>(),
        );
        assert_shape_contract!(
            ["batch", "out_channels", "out_height", "out_width"],
            &output,
            &[
                ("batch", 2),
                ("out_channels", 8),
                ("out_height", 4),
                ("out_width", 4)
            ],
        );
    }

    #[test]
    fn test_basic_block_antialias() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: BasicBlock<B> = BasicBlockConfig::new(4, 8)
            .with_stride(2)
            .with_antialias(true)
            .init(&device);
        assert_eq!(block.conv1.stride, [1, 1]);
        assert_eq!(block.blur.as_ref().map(|b| b.channels), Some(8));
        assert_eq!(block.stride(), 2);

        let output = block.forward(Tensor::ones([1, 4, 8, 8], &device), ForwardMode::Eval);
        assert_eq!(output.dims(), [1, 8, 4, 4]);
    }

    #[test]
    fn test_basic_block_odd_resolution() {
        type B = NdArray<f32>;
        let device = Default::default();

        for antialias in [false, true] {
            let block: BasicBlock<B> = BasicBlockConfig::new(4, 8)
                .with_stride(2)
                .with_antialias(antialias)
                .init(&device);

            let output = block.forward(Tensor::ones([1, 4, 7, 9], &device), ForwardMode::Eval);
            assert_eq!(output.dims(), [1, 8, 4, 5]);
        }
    }

    #[test]
    fn test_basic_block_no_downsample() {
        type B = NdArray<f32>;
        let device = Default::default();

        let block: BasicBlock<B> = BasicBlockConfig::new(4, 8)
            .with_downsample(false)
            .init(&device);
        assert!(!block.has_residual());
        assert!(block.downsample.is_none());

        let output = block.forward(Tensor::ones([1, 4, 6, 6], &device), ForwardMode::Eval);
        assert_eq!(output.dims(), [1, 8, 6, 6]);
    }

    #[test]
    fn test_basic_block_every_attention() {
        type B = NdArray<f32>;
        let device = Default::default();

        for (_, kind) in ATTENTION_TABLE {
            let block: BasicBlock<B> = BasicBlockConfig::new(8, 16)
                .with_stride(2)
                .with_attention(Some(kind))
                .init(&device);
            assert_eq!(block.attention.kind(), Some(kind));

            let output = block.forward(Tensor::ones([2, 8, 8, 8], &device), ForwardMode::Eval);
            assert_eq!(output.dims(), [2, 16, 4, 4]);
        }
    }

    #[test]
    fn test_basic_block_tresnet() {
        type B = NdArray<f32>;
        let device = Default::default();

        let norm_act =
            NormActConfig::new().with_act(ActivationConfig::from_name("leaky_relu").unwrap());
        let block: BasicBlock<B> = BasicBlockConfig::new(16, 16)
            .with_norm_act(norm_act)
            .with_attention(Some(AttentionKind::Se))
            .with_tresnet(true)
            .init(&device);

        match &block.norm1.act {
            Activation::LeakyRelu(act) => assert_eq!(act.negative_slope, TRESNET_LEAKY_SLOPE),
            other => panic!("unexpected: {other:?}"),
        }
        assert!(matches!(block.final_act, Activation::Relu(_)));
        match &block.attention {
            Attention::Se(se) => assert_eq!(se.fc1.weight.dims()[0], TRESNET_MIN_SE_CHANNELS),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
