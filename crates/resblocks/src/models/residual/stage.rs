//! # Stage Block Family
//!
//! [`StageBlockKind`] and [`StageBlockOptions`] describe the block used
//! inside a stage; stages supply the channel and stride bookkeeping.
//!
//! [`StageMeta`] is the common meta API of the stage assemblers.

use crate::layers::norm::norm_act::NormActConfig;
use crate::models::residual::residual_block::ResidualBlockConfig;
use crate::models::residual::simple_bottleneck::SimpleBottleneckConfig;
use crate::models::residual::simple_preact_bottleneck::SimplePreActBottleneckConfig;
use crate::models::residual::util::stride_div_output_resolution;
use burn::config::Config;
use serde::{Deserialize, Serialize};

/// Stage Meta API.
pub trait StageMeta {
    /// The number of blocks.
    fn len(&self) -> usize;

    /// Check if the stage is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of input channels.
    fn in_channels(&self) -> usize;

    /// The number of output channels.
    fn out_channels(&self) -> usize;

    /// Get the effective stride of the stage.
    fn stride(&self) -> usize;

    /// Get the output resolution for a given input resolution.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[ceil(in_height/stride), ceil(in_width/stride)]``
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        stride_div_output_resolution(input_resolution, self.stride())
    }
}

/// The block family used inside a stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StageBlockKind {
    /// [`SimpleBottleneckConfig`].
    #[default]
    SimpleBottleneck,

    /// [`SimplePreActBottleneckConfig`].
    SimplePreActBottleneck,
}

/// Per-block options shared by every block of a stage.
#[derive(Config, Debug)]
pub struct StageBlockOptions {
    /// Norm / activation policy.
    #[config(default = "NormActConfig::new()")]
    pub norm_act: NormActConfig,

    /// Groups of the 3x3 convolution.
    #[config(default = 1)]
    pub groups: usize,

    /// Channels per group; overrides `groups` when set.
    #[config(default = "None")]
    pub groups_width: Option<usize>,
}

impl StageBlockKind {
    /// Build one block config.
    pub fn build(
        self,
        options: &StageBlockOptions,
        in_channels: usize,
        mid_channels: usize,
        out_channels: usize,
        stride: usize,
    ) -> ResidualBlockConfig {
        match self {
            Self::SimpleBottleneck => {
                SimpleBottleneckConfig::new(in_channels, mid_channels, out_channels)
                    .with_stride(stride)
                    .with_groups(options.groups)
                    .with_groups_width(options.groups_width)
                    .with_norm_act(options.norm_act.clone())
                    .into()
            }
            Self::SimplePreActBottleneck => {
                SimplePreActBottleneckConfig::new(in_channels, mid_channels, out_channels)
                    .with_stride(stride)
                    .with_groups(options.groups)
                    .with_groups_width(options.groups_width)
                    .with_norm_act(options.norm_act.clone())
                    .into()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::residual::meta::ResidualBlockMeta;

    #[test]
    fn test_stage_block_kind_build() {
        let options = StageBlockOptions::new().with_groups_width(Some(4));

        let config = StageBlockKind::SimpleBottleneck.build(&options, 8, 16, 32, 2);
        match &config {
            ResidualBlockConfig::SimpleBottleneck(inner) => {
                assert_eq!(inner.mid_channels, 16);
                assert_eq!(inner.effective_groups(), 4);
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert_eq!(config.in_channels(), 8);
        assert_eq!(config.out_channels(), 32);
        assert_eq!(config.stride(), 2);

        let config = StageBlockKind::SimplePreActBottleneck.build(&options, 8, 8, 8, 1);
        assert!(matches!(
            config,
            ResidualBlockConfig::SimplePreActBottleneck(_)
        ));
        assert!(config.has_residual());
    }
}
