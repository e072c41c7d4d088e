//! # Bottleneck Block
//!
//! [`Bottleneck`] reduces channels with a 1x1 convolution, runs the
//! spatial 3x3 convolution at the reduced width, and expands back.
//!
//! ```text
//! width = floor(planes * base_width / 64) * groups
//! out_planes = planes * expansion_factor
//!
//! out = conv1x1 -> norm_act -> conv3x3(stride, groups) -> norm_act -> [blur]
//!       -> conv1x1 -> norm -> attention -> drop_connect -> (+ shortcut) -> final_act
//! ```
//!
//! The TResNet flavour applies attention before the final 1x1 convolution.

use crate::layers::activation::activation_wrapper::{Activation, ActivationConfig};
use crate::layers::attention::{Attention, AttentionConfig, AttentionKind};
use crate::layers::conv::{conv1x1, conv3x3};
use crate::layers::drop::drop_connect::{DropConnect, DropConnectConfig};
use crate::layers::mode::ForwardMode;
use crate::layers::norm::norm_act::{NormAct, NormActConfig};
use crate::layers::pool::{BlurPool2d, BlurPool2dConfig};
use crate::models::residual::basic_block::{TRESNET_LEAKY_SLOPE, TRESNET_MIN_SE_CHANNELS};
use crate::models::residual::meta::ResidualBlockMeta;
use crate::models::residual::projection::{Projection, ProjectionConfig};
use crate::models::residual::util::{identity_shortcut_compatible, se_reduction_channels};
use crate::utility::probability::expect_keep_probability;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::Conv2d;
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`Bottleneck`] Config.
#[derive(Config, Debug)]
pub struct BottleneckConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// Configures `width` and `out_planes`.
    pub planes: usize,

    /// Control factor for `out_planes()`.
    #[config(default = 4)]
    pub expansion_factor: usize,

    /// The stride of the 3x3 convolution.
    #[config(default = 1)]
    pub stride: usize,

    /// Groups of the 3x3 convolution.
    #[config(default = 1)]
    pub groups: usize,

    /// Per-group base width.
    #[config(default = 64)]
    pub base_width: usize,

    /// Dilation of the 3x3 convolution.
    #[config(default = 1)]
    pub dilation: usize,

    /// Optional attention.
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

impl ResidualBlockMeta for BottleneckConfig {
    fn in_channels(&self) -> usize {
        self.in_planes
    }

    fn out_channels(&self) -> usize {
        self.planes * self.expansion_factor
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn has_residual(&self) -> bool {
        identity_shortcut_compatible(self.in_channels(), self.out_channels(), self.stride)
    }
}

impl BottleneckConfig {
    /// Build a config from in/out channel counts.
    ///
    /// # Panics
    ///
    /// If `out_channels` is not a multiple of the default expansion factor.
    pub fn from_channels(
        in_channels: usize,
        out_channels: usize,
    ) -> Self {
        let config = Self::new(in_channels, 0);
        assert_eq!(
            out_channels % config.expansion_factor,
            0,
            "out_channels ({out_channels}) must be a multiple of {}",
            config.expansion_factor
        );
        Self {
            planes: out_channels / config.expansion_factor,
            ..config
        }
    }

    /// The width of the inner 3x3 convolution.
    pub fn width(&self) -> usize {
        (self.planes * self.base_width / 64) * self.groups
    }

    /// Is the anti-aliasing path active?
    pub fn effective_antialias(&self) -> bool {
        self.antialias && self.stride == 2
    }

    /// Initialize a [`Bottleneck`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Bottleneck<B> {
        expect_keep_probability(self.keep_prob);

        let in_planes = self.in_channels();
        let width = self.width();
        let out_planes = self.out_channels();

        let antialias = self.effective_antialias();
        let conv2_stride = if antialias { 1 } else { self.stride };

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

        let inner_norm = if self.tresnet {
            self.norm_act
                .clone()
                .with_act(self.norm_act.act.clone().with_leaky_slope(TRESNET_LEAKY_SLOPE))
        } else {
            self.norm_act.clone()
        };

        let attention = if self.tresnet {
            let reduction_channels = match self.attention {
                Some(AttentionKind::Se) => (out_planes / 8).max(TRESNET_MIN_SE_CHANNELS),
                _ => se_reduction_channels(self.planes),
            };
            AttentionConfig::new(width, reduction_channels)
        } else {
            AttentionConfig::new(out_planes, se_reduction_channels(self.planes))
        }
        .with_kind(self.attention);

        let final_act = if self.tresnet {
            ActivationConfig::Relu
        } else {
            self.norm_act.act.clone()
        };

        tracing::debug!(
            in_planes,
            width,
            out_planes,
            stride = self.stride,
            antialias,
            has_residual,
            projection = downsample.is_some(),
            attention = ?self.attention,
            tresnet = self.tresnet,
            "init Bottleneck"
        );

        Bottleneck {
            stride: self.stride,
            has_residual,
            attention_before_expand: self.tresnet,
            downsample,
            conv1: conv1x1(in_planes, width).init(device),
            norm1: inner_norm.init_sized(width, device),
            conv2: conv3x3(width, width)
                .with_stride(conv2_stride)
                .with_groups(self.groups)
                .with_dilation(self.dilation)
                .init(device),
            norm2: inner_norm.init_sized(width, device),
            blur: if antialias {
                Some(BlurPool2dConfig::new(width).init())
            } else {
                None
            },
            conv3: conv1x1(width, out_planes).init(device),
            norm3: self.norm_act.linear().init_sized(out_planes, device),
            attention: attention.init(device),
            drop_connect: DropConnectConfig::new()
                .with_keep_prob(self.keep_prob)
                .init_if_active(),
            final_act: final_act.init(device),
        }
    }
}

/// Bottleneck residual block.
///
/// Implements [`ResidualBlockMeta`].
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    /// Block stride.
    pub stride: usize,

    /// Identity shortcut enabled.
    pub has_residual: bool,

    /// Apply attention between the blur and `conv3` (TResNet).
    pub attention_before_expand: bool,

    /// Optional projection shortcut.
    pub downsample: Option<Projection<B>>,

    /// 1x1 reduction.
    pub conv1: Conv2d<B>,
    /// Reduction norm/act.
    pub norm1: NormAct<B>,

    /// 3x3 spatial convolution.
    pub conv2: Conv2d<B>,
    /// Spatial norm/act.
    pub norm2: NormAct<B>,

    /// Optional anti-aliasing downsample.
    pub blur: Option<BlurPool2d>,

    /// 1x1 expansion.
    pub conv3: Conv2d<B>,
    /// Expansion (linear) norm.
    pub norm3: NormAct<B>,

    /// Attention.
    pub attention: Attention<B>,

    /// Optional drop connect.
    pub drop_connect: Option<DropConnect>,

    /// Activation after the residual addition.
    pub final_act: Activation<B>,
}

impl<B: Backend> ResidualBlockMeta for Bottleneck<B> {
    fn in_channels(&self) -> usize {
        self.conv1.weight.dims()[1]
    }

    fn out_channels(&self) -> usize {
        self.conv3.weight.dims()[0]
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn has_residual(&self) -> bool {
        self.has_residual
    }
}

impl<B: Backend> Bottleneck<B> {
    /// The width of the inner 3x3 convolution.
    pub fn width(&self) -> usize {
        self.conv2.weight.dims()[0]
    }

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
        let x = self.conv2.forward(x);
        let x = self.norm2.forward(x);
        let x = match &self.blur {
            Some(blur) => blur.forward(x),
            None => x,
        };

        let x = if self.attention_before_expand {
            let x = self.attention.forward(x);
            let x = self.conv3.forward(x);
            self.norm3.forward(x)
        } else {
            let x = self.conv3.forward(x);
            let x = self.norm3.forward(x);
            self.attention.forward(x)
        };

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
