//! # Cross Stage Partial `DarkNet` Block
//!
//! ```text
//! mid = floor(in_channels * bottle_ratio)
//!
//! out = conv1x1 -> norm_act -> conv3x3 -> norm -> attention
//!       -> drop_connect -> (+ input, if residual)
//! ```

use crate::layers::attention::{Attention, AttentionConfig, AttentionKind};
use crate::layers::conv::{conv1x1, conv3x3};
use crate::layers::drop::drop_connect::{DropConnect, DropConnectConfig};
use crate::layers::mode::ForwardMode;
use crate::layers::norm::norm_act::{NormAct, NormActConfig};
use crate::models::residual::dark_block::{bottle_channels, leaky_norm_act};
use crate::models::residual::meta::ResidualBlockMeta;
use crate::models::residual::util::{identity_shortcut_compatible, se_reduction_channels};
use crate::utility::probability::expect_keep_probability;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::Conv2d;
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`CspDarkBlock`] Config.
#[derive(Config, Debug)]
pub struct CspDarkBlockConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels.
    pub out_channels: usize,

    /// Reduction ratio for the middle channels.
    #[config(default = "0.5")]
    pub bottle_ratio: f64,

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

impl ResidualBlockMeta for CspDarkBlockConfig {
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

impl CspDarkBlockConfig {
    /// The middle channel count.
    pub fn mid_channels(&self) -> usize {
        bottle_channels(self.in_channels, self.bottle_ratio)
    }

    /// Initialize a [`CspDarkBlock`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> CspDarkBlock<B> {
        expect_keep_probability(self.keep_prob);

        let mid_channels = self.mid_channels();
        let has_residual = self.has_residual();

        tracing::debug!(
            in_channels = self.in_channels,
            mid_channels,
            out_channels = self.out_channels,
            has_residual,
            attention = ?self.attention,
            "init CspDarkBlock"
        );

        CspDarkBlock {
            has_residual,
            conv1: conv1x1(self.in_channels, mid_channels).init(device),
            norm1: self.norm_act.init_sized(mid_channels, device),
            conv2: conv3x3(mid_channels, self.out_channels).init(device),
            norm2: self.norm_act.linear().init_sized(self.out_channels, device),
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

/// Cross stage partial `DarkNet` block.
#[derive(Module, Debug)]
pub struct CspDarkBlock<B: Backend> {
    /// Identity shortcut enabled.
    pub has_residual: bool,

    /// 1x1 reduction.
    pub conv1: Conv2d<B>,
    /// Reduction norm/act.
    pub norm1: NormAct<B>,

    /// 3x3 convolution.
    pub conv2: Conv2d<B>,
    /// Linear norm.
    pub norm2: NormAct<B>,

    /// Attention.
    pub attention: Attention<B>,

    /// Optional drop connect; only applied with the residual.
    pub drop_connect: Option<DropConnect>,
}

impl<B: Backend> ResidualBlockMeta for CspDarkBlock<B> {
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

impl<B: Backend> CspDarkBlock<B> {
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
        let x = self.norm1.forward(x);
        let x = self.conv2.forward(x);
        let x = self.norm2.forward(x);
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
