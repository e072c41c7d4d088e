//! # Simple Pre-Activation Bottleneck
//!
//! Every norm precedes its convolution; the last convolution is not
//! normalized before the residual addition.
//!
//! ```text
//! out = norm_act -> conv1x1 -> norm_act -> conv3x3(stride, groups) -> norm_act
//!       -> conv1x1 -> (+ input, if residual)
//! ```

use crate::layers::conv::{conv1x1, conv3x3};
use crate::layers::norm::norm_act::{NormAct, NormActConfig};
use crate::models::residual::meta::ResidualBlockMeta;
use crate::models::residual::simple_bottleneck::resolve_groups;
use crate::models::residual::util::identity_shortcut_compatible;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::Conv2d;
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`SimplePreActBottleneck`] Config.
#[derive(Config, Debug)]
pub struct SimplePreActBottleneckConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Middle channels.
    pub mid_channels: usize,

    /// Output channels.
    pub out_channels: usize,

    /// Stride of the 3x3 convolution.
    #[config(default = 1)]
    pub stride: usize,

    /// Groups of the 3x3 convolution.
    #[config(default = 1)]
    pub groups: usize,

    /// Channels per group; overrides `groups` when set.
    #[config(default = "None")]
    pub groups_width: Option<usize>,

    /// Norm / activation policy.
    #[config(default = "NormActConfig::new()")]
    pub norm_act: NormActConfig,
}

impl ResidualBlockMeta for SimplePreActBottleneckConfig {
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
    }
}

impl SimplePreActBottleneckConfig {
    /// The effective group count of the 3x3 convolution.
    pub fn effective_groups(&self) -> usize {
        resolve_groups(self.mid_channels, self.groups, self.groups_width)
    }

    /// Initialize a [`SimplePreActBottleneck`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> SimplePreActBottleneck<B> {
        let groups = self.effective_groups();
        let has_residual = self.has_residual();

        tracing::debug!(
            in_channels = self.in_channels,
            mid_channels = self.mid_channels,
            out_channels = self.out_channels,
            stride = self.stride,
            groups,
            has_residual,
            "init SimplePreActBottleneck"
        );

        SimplePreActBottleneck {
            stride: self.stride,
            has_residual,
            norm1: self.norm_act.init_sized(self.in_channels, device),
            conv1: conv1x1(self.in_channels, self.mid_channels).init(device),
            norm2: self.norm_act.init_sized(self.mid_channels, device),
            conv2: conv3x3(self.mid_channels, self.mid_channels)
                .with_stride(self.stride)
                .with_groups(groups)
                .init(device),
            norm3: self.norm_act.init_sized(self.mid_channels, device),
            conv3: conv1x1(self.mid_channels, self.out_channels).init(device),
        }
    }
}

/// Simple pre-activation bottleneck block.
#[derive(Module, Debug)]
pub struct SimplePreActBottleneck<B: Backend> {
    /// Block stride.
    pub stride: usize,

    /// Identity shortcut enabled.
    pub has_residual: bool,

    /// Input norm/act.
    pub norm1: NormAct<B>,
    /// 1x1 reduction.
    pub conv1: Conv2d<B>,

    /// Reduction norm/act.
    pub norm2: NormAct<B>,
    /// 3x3 convolution.
    pub conv2: Conv2d<B>,

    /// Spatial norm/act.
    pub norm3: NormAct<B>,
    /// 1x1 expansion.
    pub conv3: Conv2d<B>,
}

impl<B: Backend> ResidualBlockMeta for SimplePreActBottleneck<B> {
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

impl<B: Backend> SimplePreActBottleneck<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, out_channels, out_height, out_width]`` tensor.
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

        let residual = if self.has_residual {
            Some(input.clone())
        } else {
            None
        };

        let x = self.norm1.forward(input);
        let x = self.conv1.forward(x);
        let x = self.norm2.forward(x);
        let x = self.conv2.forward(x);
        let x = self.norm3.forward(x);
        let x = self.conv3.forward(x);
        let x = match residual {
            Some(residual) => x + residual,
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
