//! # Sequential Stage
//!
//! A [`SequentialStage`] is a sequence of [`ResidualBlock`]s; the first
//! block carries the stride and the channel transition.
//!
//! [`SequentialStageConfig`] implements [`Config`], and provides
//! [`SequentialStageConfig::init`] to initialize a [`SequentialStage`].

use crate::layers::mode::ForwardMode;
use crate::models::residual::meta::ResidualBlockMeta;
use crate::models::residual::residual_block::{ResidualBlock, ResidualBlockConfig};
use crate::models::residual::stage::{StageBlockKind, StageBlockOptions, StageMeta};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// The smallest middle channel count of [`SequentialStageConfig::simple`].
pub const SIMPLE_STAGE_MIN_MID_CHANNELS: usize = 64;

/// [`SequentialStage`] Configuration.
#[derive(Config, Debug)]
pub struct SequentialStageConfig {
    /// The component blocks.
    pub blocks: Vec<ResidualBlockConfig>,
}

impl From<Vec<ResidualBlockConfig>> for SequentialStageConfig {
    fn from(blocks: Vec<ResidualBlockConfig>) -> Self {
        Self { blocks }
    }
}

impl StageMeta for SequentialStageConfig {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_channels(&self) -> usize {
        self.blocks[0].in_channels()
    }

    fn out_channels(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_channels()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl SequentialStageConfig {
    /// Build a stage of simple bottlenecks.
    ///
    /// ```text
    /// mid = max(floor(out_channels * bottle_ratio), 64)
    /// blocks = [(in, mid, out, stride), (out, mid, out, 1) * (num_blocks - 1)]
    /// ```
    pub fn simple(
        kind: StageBlockKind,
        num_blocks: usize,
        in_channels: usize,
        out_channels: usize,
        stride: usize,
        bottle_ratio: f64,
        options: &StageBlockOptions,
    ) -> Self {
        let mid_channels = ((out_channels as f64 * bottle_ratio).floor() as usize)
            .max(SIMPLE_STAGE_MIN_MID_CHANNELS);

        tracing::debug!(
            ?kind,
            num_blocks,
            in_channels,
            mid_channels,
            out_channels,
            stride,
            "build SequentialStage"
        );

        let blocks = (0..num_blocks)
            .map(|b| {
                if b == 0 {
                    kind.build(options, in_channels, mid_channels, out_channels, stride)
                } else {
                    kind.build(options, out_channels, mid_channels, out_channels, 1)
                }
            })
            .collect();

        Self { blocks }
    }

    /// Build a stage of `ResNet` basic or bottleneck blocks.
    pub fn resnet(
        num_blocks: usize,
        in_planes: usize,
        out_planes: usize,
        stride: usize,
        bottleneck: bool,
    ) -> Self {
        let blocks = (0..num_blocks)
            .map(|b| {
                if b == 0 {
                    ResidualBlockConfig::resnet(in_planes, out_planes, stride, bottleneck)
                } else {
                    ResidualBlockConfig::resnet(out_planes, out_planes, 1, bottleneck)
                }
            })
            .collect();

        Self { blocks }
    }

    /// Check if the config is valid.
    ///
    /// # Returns
    ///
    /// A `Result<(), String>`
    pub fn try_validate(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("blocks is empty".to_string());
        }

        for idx in 1..self.blocks.len() {
            let prev = &self.blocks[idx - 1];
            let curr = &self.blocks[idx];
            if prev.out_channels() != curr.in_channels() {
                return Err(format!(
                    "block[{}].out_channels({}) != block[{}].in_channels({})\n{:#?}",
                    idx - 1,
                    prev.out_channels(),
                    idx,
                    curr.in_channels(),
                    self,
                ));
            }
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{}", err);
        }
    }

    /// Initialize a new [`SequentialStage`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> SequentialStage<B> {
        self.expect_valid();

        SequentialStage {
            blocks: self
                .blocks
                .into_iter()
                .map(|block| block.init(device))
                .collect(),
        }
    }
}

/// Sequence of residual blocks.
#[derive(Module, Debug)]
pub struct SequentialStage<B: Backend> {
    /// The component blocks.
    pub blocks: Vec<ResidualBlock<B>>,
}

impl<B: Backend> StageMeta for SequentialStage<B> {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn in_channels(&self) -> usize {
        self.blocks[0].in_channels()
    }

    fn out_channels(&self) -> usize {
        self.blocks[self.blocks.len() - 1].out_channels()
    }

    fn stride(&self) -> usize {
        self.blocks
            .iter()
            .fold(1, |acc, block| acc * block.stride())
    }
}

impl<B: Backend> SequentialStage<B> {
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

        let x = self
            .blocks
            .iter()
            .fold(input, |x, block| block.forward(x, mode));

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
    use crate::models::residual::basic_block::BasicBlockConfig;
    use burn::backend::NdArray;

    type B = NdArray<f32>;

    #[test]
    fn test_simple_stage_config() {
        let options = StageBlockOptions::new();
        let config = SequentialStageConfig::simple(
            StageBlockKind::SimpleBottleneck,
            3,
            32,
            64,
            2,
            0.5,
            &options,
        );
        config.expect_valid();
        assert_eq!(config.len(), 3);
        assert_eq!(config.in_channels(), 32);
        assert_eq!(config.out_channels(), 64);
        assert_eq!(config.stride(), 2);
        assert_eq!(config.output_resolution([16, 16]), [8, 8]);

        for (idx, block) in config.blocks.iter().enumerate() {
            match block {
                ResidualBlockConfig::SimpleBottleneck(inner) => {
                    // floor(64 * 0.5) = 32 is clamped up.
                    assert_eq!(inner.mid_channels, SIMPLE_STAGE_MIN_MID_CHANNELS);
                    assert_eq!(inner.stride, if idx == 0 { 2 } else { 1 });
                }
                other => panic!("unexpected: {other:?}"),
            }
        }
        assert!(!config.blocks[0].has_residual());
        assert!(config.blocks[1].has_residual());
    }

    #[test]
    fn test_simple_stage_forward() {
        let device = Default::default();

        let stage: SequentialStage<B> = SequentialStageConfig::simple(
            StageBlockKind::SimplePreActBottleneck,
            2,
            16,
            32,
            2,
            0.5,
            &StageBlockOptions::new(),
        )
        .init(&device);
        assert_eq!(stage.len(), 2);
        assert_eq!(stage.stride(), 2);

        let output = stage.forward(Tensor::ones([2, 16, 8, 8], &device), ForwardMode::Eval);
        assert_eq!(output.dims(), [2, 32, 4, 4]);
    }

    #[test]
    fn test_resnet_stage() {
        let device = Default::default();

        let config = SequentialStageConfig::resnet(2, 16, 32, 2, false);
        config.expect_valid();
        assert_eq!(config.stride(), 2);

        let stage: SequentialStage<B> = config.init(&device);
        let output = stage.forward(Tensor::ones([1, 16, 8, 8], &device), ForwardMode::Eval);
        assert_eq!(output.dims(), [1, 32, 4, 4]);

        let config = SequentialStageConfig::resnet(2, 16, 64, 1, true);
        assert_eq!(config.out_channels(), 64);
        assert!(config.blocks[1].has_residual());
    }

    #[test]
    fn test_resnet_stage_odd_resolution() {
        let device = Default::default();

        let stage: SequentialStage<B> =
            SequentialStageConfig::resnet(2, 16, 32, 2, false).init(&device);
        assert_eq!(stage.output_resolution([7, 7]), [4, 4]);

        let output = stage.forward(Tensor::ones([1, 16, 7, 7], &device), ForwardMode::Eval);
        assert_eq!(output.dims(), [1, 32, 4, 4]);
    }

    #[test]
    fn test_try_validate() {
        let config = SequentialStageConfig::new(vec![]);
        assert_eq!(config.try_validate(), Err("blocks is empty".to_string()));

        let config: SequentialStageConfig = vec![
            BasicBlockConfig::new(8, 16).into(),
            BasicBlockConfig::new(8, 16).into(),
        ]
        .into();
        let err = config.try_validate().unwrap_err();
        assert!(err.starts_with("block[0].out_channels(16) != block[1].in_channels(8)"));
    }

    #[test]
    #[should_panic(expected = "blocks is empty")]
    fn test_expect_valid_panic() {
        SequentialStageConfig::new(vec![]).expect_valid();
    }
}
