//! # Cross Stage Partial Stage
//!
//! A [`CrossStage`] runs a transition block, splits its output along the
//! channel axis, and routes only one part through the repeated blocks.
//!
//! ```text
//! x = first_layer(input)                      # [B, out, H, W]
//! x1, x2 = split(x, csp_ratio)                # x2 has floor(ratio * out) channels
//! x2 = transition(blocks(x2))
//! out = cat([x1, x2], dim=1)                  # [B, out, H, W]
//! ```
//!
//! There is no transition after the concatenation.

use crate::errors::BlockError;
use crate::layers::mode::ForwardMode;
use crate::models::residual::dark_block::leaky_norm_act;
use crate::models::residual::meta::ResidualBlockMeta;
use crate::models::residual::projection::{Projection, ProjectionConfig};
use crate::models::residual::residual_block::ResidualBlock;
use crate::models::residual::stage::{StageBlockKind, StageBlockOptions, StageMeta};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};
use serde::{Deserialize, Serialize};

/// The fraction of channels routed through the blocks of a [`CrossStage`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CspRatio {
    /// Split into 2 chunks; the second goes through the blocks.
    #[default]
    Half,

    /// Split into 4 chunks; the last 3 are regrouped and go through the blocks.
    ThreeQuarters,
}

impl CspRatio {
    /// The ratio as a fraction.
    pub fn ratio(self) -> f64 {
        match self {
            Self::Half => 0.5,
            Self::ThreeQuarters => 0.75,
        }
    }

    /// The number of equal channel chunks the split uses.
    pub fn chunks(self) -> usize {
        match self {
            Self::Half => 2,
            Self::ThreeQuarters => 4,
        }
    }

    /// Channels routed through the blocks.
    pub fn block_channels(
        self,
        channels: usize,
    ) -> usize {
        (self.ratio() * channels as f64).floor() as usize
    }
}

impl TryFrom<f64> for CspRatio {
    type Error = BlockError;

    fn try_from(ratio: f64) -> Result<Self, Self::Error> {
        if ratio == 0.5 {
            Ok(Self::Half)
        } else if ratio == 0.75 {
            Ok(Self::ThreeQuarters)
        } else {
            Err(BlockError::UnsupportedCspRatio(ratio))
        }
    }
}

/// [`CrossStage`] Config.
#[derive(Config, Debug)]
pub struct CrossStageConfig {
    /// Input channels.
    pub in_channels: usize,

    /// Output channels.
    pub out_channels: usize,

    /// Number of blocks, including the first layer.
    pub num_blocks: usize,

    /// Stride of the first layer.
    #[config(default = 2)]
    pub stride: usize,

    /// The block family.
    #[config(default = "StageBlockKind::SimpleBottleneck")]
    pub kind: StageBlockKind,

    /// Per-block options.
    #[config(default = "StageBlockOptions::new().with_norm_act(leaky_norm_act())")]
    pub options: StageBlockOptions,

    /// How many channels go through the blocks.
    #[config(default = "CspRatio::Half")]
    pub csp_ratio: CspRatio,

    /// Apply a linear 1x1 transition to the block path.
    #[config(default = "true")]
    pub transition: bool,
}

impl StageMeta for CrossStageConfig {
    fn len(&self) -> usize {
        self.num_blocks
    }

    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl CrossStageConfig {
    /// Channels routed through the inner blocks.
    pub fn block_channels(&self) -> usize {
        self.csp_ratio.block_channels(self.out_channels)
    }

    /// Initialize a [`CrossStage`].
    ///
    /// # Panics
    ///
    /// If `num_blocks` is zero, or `out_channels` does not split evenly.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> CrossStage<B> {
        assert!(self.num_blocks > 0, "num_blocks must be > 0");
        let chunks = self.csp_ratio.chunks();
        assert_eq!(
            self.out_channels % chunks,
            0,
            "out_channels ({}) must split into {chunks} chunks",
            self.out_channels,
        );

        let block_channels = self.block_channels();

        tracing::debug!(
            in_channels = self.in_channels,
            out_channels = self.out_channels,
            block_channels,
            num_blocks = self.num_blocks,
            stride = self.stride,
            csp_ratio = ?self.csp_ratio,
            "init CrossStage"
        );

        let first_layer = self
            .kind
            .build(
                &self.options,
                self.in_channels,
                self.out_channels,
                self.out_channels,
                self.stride,
            )
            .init(device);

        let blocks = (1..self.num_blocks)
            .map(|_| {
                self.kind
                    .build(&self.options, block_channels, block_channels, block_channels, 1)
                    .init(device)
            })
            .collect();

        let transition = if self.transition {
            Some(
                ProjectionConfig::new(block_channels, block_channels)
                    .with_norm_act(self.options.norm_act.clone())
                    .init(device),
            )
        } else {
            None
        };

        CrossStage {
            chunks,
            first_layer,
            blocks,
            transition,
        }
    }
}

/// Cross stage partial stage.
#[derive(Module, Debug)]
pub struct CrossStage<B: Backend> {
    /// Number of channel chunks in the split.
    pub chunks: usize,

    /// Channel / stride transition block.
    pub first_layer: ResidualBlock<B>,

    /// Blocks applied to the routed part.
    pub blocks: Vec<ResidualBlock<B>>,

    /// Optional linear transition of the routed part.
    pub transition: Option<Projection<B>>,
}

impl<B: Backend> StageMeta for CrossStage<B> {
    fn len(&self) -> usize {
        self.blocks.len() + 1
    }

    fn in_channels(&self) -> usize {
        self.first_layer.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.first_layer.out_channels()
    }

    fn stride(&self) -> usize {
        self.first_layer.stride()
    }
}

impl<B: Backend> CrossStage<B> {
    /// Split the first layer output into the bypass and routed parts.
    fn split(
        &self,
        x: Tensor<B, 4>,
    ) -> (Tensor<B, 4>, Tensor<B, 4>) {
        let mut parts = x.chunk(self.chunks, 1);
        let rest = parts.split_off(1);
        let bypass = parts.remove(0);
        (bypass, Tensor::cat(rest, 1))
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
            &[("in_channels", self.in_channels())],
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let x = self.first_layer.forward(input, mode);
        let (x1, x2) = self.split(x);

        let x2 = self
            .blocks
            .iter()
            .fold(x2, |x, block| block.forward(x, mode));
        let x2 = match &self.transition {
            Some(transition) => transition.forward(x2),
            None => x2,
        };

        let x = Tensor::cat(vec![x1, x2], 1);

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
