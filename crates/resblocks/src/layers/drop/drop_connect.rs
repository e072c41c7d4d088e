//! # Drop Connect / Stochastic Depth
//!
//! Randomly drops whole samples of a residual branch during training,
//! rescaling the kept samples so the expected output is unchanged.
//!
//! Ref: Deep Networks with Stochastic Depth, <https://arxiv.org/abs/1603.09382>

use crate::layers::mode::ForwardMode;
use crate::utility::probability::expect_keep_probability;
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};
use burn::tensor::Distribution;

/// [`DropConnect`] Config.
#[derive(Config, Debug)]
pub struct DropConnectConfig {
    /// Probability that a sample's branch is kept; in ``(0, 1]``.
    #[config(default = "1.0")]
    pub keep_prob: f64,
}

impl DropConnectConfig {
    /// Initialize a [`DropConnect`].
    ///
    /// # Panics
    ///
    /// If `keep_prob` is not in ``(0, 1]``.
    pub fn init(&self) -> DropConnect {
        DropConnect {
            keep_prob: expect_keep_probability(self.keep_prob),
        }
    }

    /// Initialize a [`DropConnect`] only if it can drop anything.
    ///
    /// Returns `None` for ``keep_prob == 1``.
    pub fn init_if_active(&self) -> Option<DropConnect> {
        let layer = self.init();
        if layer.keep_prob < 1.0 {
            Some(layer)
        } else {
            None
        }
    }
}

/// Per-sample drop connect.
///
/// In [`ForwardMode::Train`]:
///
/// ```text
/// mask ~ Bernoulli(keep_prob), shape [batch, 1, ...]
/// out = x / keep_prob * mask
/// ```
///
/// In [`ForwardMode::Eval`] this is the identity.
#[derive(Module, Clone, Debug)]
pub struct DropConnect {
    /// Probability that a sample's branch is kept.
    pub keep_prob: f64,
}

impl DropConnect {
    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, ...]``.
    /// - `mode`: the forward mode.
    ///
    /// # Returns
    ///
    /// A tensor of the same shape as `input`.
    pub fn forward<B: Backend, const D: usize>(
        &self,
        input: Tensor<B, D>,
        mode: ForwardMode,
    ) -> Tensor<B, D> {
        if !mode.is_train() || self.keep_prob >= 1.0 {
            return input;
        }

        let mut mask_shape = [1; D];
        mask_shape[0] = input.dims()[0];

        let mask = Tensor::<B, D>::random(
            mask_shape,
            Distribution::Bernoulli(self.keep_prob),
            &input.device(),
        );

        input / self.keep_prob * mask
    }
}
