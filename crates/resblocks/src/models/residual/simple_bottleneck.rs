//! # Simple Bottleneck
//!
//! A bottleneck with explicit middle channels, no attention, no drop
//! connect and no projection shortcut. Used inside stages.
//!
//! ```text
//! out = conv1x1 -> norm_act -> conv3x3(stride, groups) -> norm_act
//!       -> conv1x1 -> norm -> (+ input, if residual)
//! ```

use crate::layers::conv::{conv1x1, conv3x3};
use crate::layers::norm::norm_act::{NormAct, NormActConfig};
use crate::models::residual::meta::ResidualBlockMeta;
use crate::models::residual::util::identity_shortcut_compatible;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::Conv2d;
use burn::prelude::{Backend, Config, Module, Tensor};

/// Resolve the group count of a grouped convolution.
///
/// With `groups_width`, the group count is ``channels / groups_width``;
/// otherwise `groups`.
///
/// # Panics
///
/// If `groups_width` does not divide `channels`.
pub fn resolve_groups(
    channels: usize,
    groups: usize,
    groups_width: Option<usize>,
) -> usize {
    match groups_width {
        Some(groups_width) => {
            assert!(
                groups_width > 0 && channels % groups_width == 0,
                "groups_width ({groups_width}) must divide channels ({channels})"
            );
            channels / groups_width
        }
        None => groups,
    }
}

/// [`SimpleBottleneck`] Config.
#[derive(Config, Debug)]
pub struct SimpleBottleneckConfig {
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

impl ResidualBlockMeta for SimpleBottleneckConfig {
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

impl SimpleBottleneckConfig {
    /// The effective group count of the 3x3 convolution.
    pub fn effective_groups(&self) -> usize {
        resolve_groups(self.mid_channels, self.groups, self.groups_width)
    }

    /// Initialize a [`SimpleBottleneck`].
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> SimpleBottleneck<B> {
        let groups = self.effective_groups();
        let has_residual = self.has_residual();

        tracing::debug!(
            in_channels = self.in_channels,
            mid_channels = self.mid_channels,
            out_channels = self.out_channels,
            stride = self.stride,
            groups,
            has_residual,
            "init SimpleBottleneck"
        );

        SimpleBottleneck {
            stride: self.stride,
            has_residual,
            conv1: conv1x1(self.in_channels, self.mid_channels).init(device),
            norm1: self.norm_act.init_sized(self.mid_channels, device),
            conv2: conv3x3(self.mid_channels, self.mid_channels)
                .with_stride(self.stride)
                .with_groups(groups)
                .init(device),
            norm2: self.norm_act.init_sized(self.mid_channels, device),
            conv3: conv1x1(self.mid_channels, self.out_channels).init(device),
            norm3: self.norm_act.linear().init_sized(self.out_channels, device),
        }
    }
}

/// Simple bottleneck block.
#[derive(Module, Debug)]
pub struct SimpleBottleneck<B: Backend> {
    /// Block stride.
    pub stride: usize,

    /// Identity shortcut enabled.
    pub has_residual: bool,

    /// 1x1 reduction.
    pub conv1: Conv2d<B>,
    /// Reduction norm/act.
    pub norm1: NormAct<B>,

    /// 3x3 convolution.
    pub conv2: Conv2d<B>,
    /// Spatial norm/act.
    pub norm2: NormAct<B>,

    /// 1x1 expansion.
    pub conv3: Conv2d<B>,
    /// Linear norm.
    pub norm3: NormAct<B>,
}

impl<B: Backend> ResidualBlockMeta for SimpleBottleneck<B> {
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

impl<B: Backend> SimpleBottleneck<B> {
    /// The middle channel count.
    pub fn mid_channels(&self) -> usize {
        self.conv1.weight.dims()[0]
    }

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

        let x = self.conv1.forward(input);
        let x = self.norm1.forward(x);
        let x = self.conv2.forward(x);
        let x = self.norm2.forward(x);
        let x = self.conv3.forward(x);
        let x = self.norm3.forward(x);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::assert_close;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type B = NdArray<f32>;

    #[test]
    fn test_resolve_groups() {
        assert_eq!(resolve_groups(64, 1, None), 1);
        assert_eq!(resolve_groups(64, 4, None), 4);
        assert_eq!(resolve_groups(64, 4, Some(16)), 4);
        assert_eq!(resolve_groups(64, 1, Some(8)), 8);
    }

    #[test]
    #[should_panic(expected = "groups_width (24) must divide channels (64)")]
    fn test_resolve_groups_panic() {
        resolve_groups(64, 1, Some(24));
    }

    #[test]
    fn test_simple_bottleneck_residual() {
        let device = Default::default();

        let block: SimpleBottleneck<B> = SimpleBottleneckConfig::new(8, 4, 8).init(&device);
        assert!(block.has_residual());
        assert_eq!(block.mid_channels(), 4);

        let input: Tensor<B, 4> = Tensor::random([2, 8, 4, 4], Distribution::Default, &device);
        let output = block.forward(input.clone());

        let expected = {
            let x = block.norm1.forward(block.conv1.forward(input.clone()));
            let x = block.norm2.forward(block.conv2.forward(x));
            let x = block.norm3.forward(block.conv3.forward(x));
            x + input
        };
        assert_close(output, expected, 1e-5);
    }

    #[test]
    fn test_simple_bottleneck_grouped_stride() {
        let device = Default::default();

        let config = SimpleBottleneckConfig::new(8, 16, 32)
            .with_stride(2)
            .with_groups_width(Some(4));
        assert_eq!(config.effective_groups(), 4);
        assert!(!config.has_residual());

        let block: SimpleBottleneck<B> = config.init(&device);
        assert_eq!(block.conv2.weight.dims(), [16, 4, 3, 3]);

        let output = block.forward(Tensor::ones([2, 8, 8, 8], &device));
        assert_eq!(output.dims(), [2, 32, 4, 4]);
    }
}
