//! # `DarkNet` Blocks
//!
//! [`DarkBlock`] is the basic `DarkNet` residual unit. Its `norm1` is a
//! pre-activation norm which is constructed (and carries parameters), but
//! the first convolution reads the raw input, so `norm1` never affects the
//! output. Weights trained against this layout depend on that ordering.
//!
//! ```text
//! mid = floor(in_channels * bottle_ratio)
//!
//! out = conv1x1(input) -> norm_act -> conv3x3(groups) -> attention
//!       -> drop_connect -> (+ input, if residual)
//! ```
//!
//! There is no activation after the residual addition.

use crate::layers::activation::activation_wrapper::{ActivationConfig, DEFAULT_LEAKY_RELU_SLOPE};
use crate::layers::attention::{Attention, AttentionConfig, AttentionKind};
use crate::layers::conv::{conv1x1, conv3x3};
use crate::layers::drop::drop_connect::{DropConnect, DropConnectConfig};
use crate::layers::mode::ForwardMode;
use crate::layers::norm::norm_act::{NormAct, NormActConfig};
use crate::models::residual::meta::ResidualBlockMeta;
use crate::models::residual::util::{identity_shortcut_compatible, se_reduction_channels};
use crate::utility::probability::expect_keep_probability;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::LeakyReluConfig;
use burn::nn::conv::Conv2d;
use burn::prelude::{Backend, Config, Module, Tensor};

/// The `DarkNet` norm/act policy: batch norm with a leaky relu.
pub fn leaky_norm_act() -> NormActConfig {
    NormActConfig::new().with_act(ActivationConfig::LeakyRelu(
        LeakyReluConfig::new().with_negative_slope(DEFAULT_LEAKY_RELU_SLOPE),
    ))
}

/// Channels after the bottleneck reduction.
pub fn bottle_channels(
    in_channels: usize,
    bottle_ratio: f64,
) -> usize {
    (in_channels as f64 * bottle_ratio).floor() as usize
}

/// [`DarkBlock`] Config.
#[derive(Config, Debug)]
pub struct DarkBlockConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels.
    pub out_channels: usize,

    /// Reduction ratio for the middle channels.
    #[config(default = "0.5")]
    pub bottle_ratio: f64,

    /// Groups of the 3x3 convolution.
    #[config(default = 32)]
    pub groups: usize,

    /// Optional attention.
    #[config(default = "None")]
    pub attention: Option<AttentionKind>,

    /// Norm / activation policy.
    #[config(default = "leaky_norm_act()")]
    pub norm_act: NormActConfig,

    /// Drop connect keep probability.
    #[config(default = "1.0")]
    pub keep_prob: f64,
}

impl ResidualBlockMeta for DarkBlockConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn stride(&self) -> usize {
        1
    }

    fn has_residual(&self) -> bool {
        identity_shortcut_compatible(self.in_channels, self.out_channels, 1)
    }
}

impl DarkBlockConfig {
    /// The middle channel count.
    pub fn mid_channels(&self) -> usize {
        bottle_channels(self.in_channels, self.bottle_ratio)
    }

    /// Initialize a [`DarkBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> DarkBlock<B> {
        expect_keep_probability(self.keep_prob);

        let mid_channels = self.mid_channels();
        let has_residual = self.has_residual();

        tracing::debug!(
            in_channels = self.in_channels,
            mid_channels,
            out_channels = self.out_channels,
            has_residual,
            attention = ?self.attention,
            "init DarkBlock"
        );

        DarkBlock {
            has_residual,
            norm1: self.norm_act.init_sized(mid_channels, device),
            conv1: conv1x1(self.in_channels, mid_channels).init(device),
            norm2: self.norm_act.init_sized(mid_channels, device),
            conv2: conv3x3(mid_channels, self.out_channels)
                .with_groups(self.groups)
                .init(device),
            attention: AttentionConfig::new(
                self.out_channels,
                se_reduction_channels(self.out_channels),
            )
            .with_kind(self.attention)
            .init(device),
            drop_connect: DropConnectConfig::new()
                .with_keep_prob(self.keep_prob)
                .init_if_active(),
        }
    }
}

/// `DarkNet` residual block.
#[derive(Module, Debug)]
pub struct DarkBlock<B: Backend> {
    /// Identity shortcut enabled.
    pub has_residual: bool,

    /// Pre-activation norm; not applied by [`DarkBlock::forward`].
    pub norm1: NormAct<B>,

    /// 1x1 reduction.
    pub conv1: Conv2d<B>,
    /// Reduction norm/act.
    pub norm2: NormAct<B>,

    /// Grouped 3x3 convolution.
    pub conv2: Conv2d<B>,

    /// Attention.
    pub attention: Attention<B>,

    /// Optional drop connect; only applied with the residual.
    pub drop_connect: Option<DropConnect>,
}

impl<B: Backend> ResidualBlockMeta for DarkBlock<B> {
    fn in_channels(&self) -> usize {
        self.conv1.weight.dims()[1]
    }

    fn out_channels(&self) -> usize {
        self.conv2.weight.dims()[0]
    }

    fn stride(&self) -> usize {
        1
    }

    fn has_residual(&self) -> bool {
        self.has_residual
    }
}

impl<B: Backend> DarkBlock<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    /// - `mode`: the forward mode.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_channels, height, width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
        mode: ForwardMode,
    ) -> Tensor<B, 4> {
        let [batch, height, width] = unpack_shape_contract!(
            ["batch", "in_channels", "height", "width"],
            &input,
            &["batch", "height", "width"],
            &[("in_channels", self.in_channels())],
        );

        let x = self.conv1.forward(input.clone());
        let x = self.norm2.forward(x);
        let x = self.conv2.forward(x);
        let x = self.attention.forward(x);

        let x = if self.has_residual {
            let x = match &self.drop_connect {
                Some(drop_connect) => drop_connect.forward(x, mode),
                None => x,
            };
            x + input
        } else {
            x
        };

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "height", "width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("height", height),
                ("width", width)
            ]
        );

        x
    }
}
