//! # `NormAct` - normalization followed by activation.
//!
//! The "activated batch norm" unit that every block uses after (or, for
//! pre-activation blocks, before) its convolutions.
//!
//! A [`NormActConfig`] is an abstract policy: the feature size of its
//! [`NormalizationConfig`] is a placeholder, replaced by
//! [`NormActConfig::init_sized`] with the channel count of the tensor
//! it will normalize.

use crate::layers::activation::activation_wrapper::{Activation, ActivationConfig};
use crate::layers::norm::normalization_wrapper::{Normalization, NormalizationConfig};
use bimm_contracts::unpack_shape_contract;
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};

/// [`NormAct`] Config.
#[derive(Config, Debug)]
pub struct NormActConfig {
    /// The [`Normalization`] config.
    #[config(default = "NormalizationConfig::default()")]
    pub norm: NormalizationConfig,

    /// The [`Activation`] config.
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,
}

impl NormActConfig {
    /// The same normalization, with an identity activation.
    ///
    /// Used for the norm that feeds a residual addition.
    pub fn linear(&self) -> Self {
        self.clone().with_act(ActivationConfig::Identity)
    }

    /// Initialize a [`NormAct`] over `num_features` channels.
    pub fn init_sized<B: Backend>(
        &self,
        num_features: usize,
        device: &B::Device,
    ) -> NormAct<B> {
        NormAct {
            norm: self
                .norm
                .clone()
                .with_num_features(num_features)
                .init(device),
            act: self.act.init(device),
        }
    }
}

/// Sequenced norm/activation layer.
#[derive(Module, Debug)]
pub struct NormAct<B: Backend> {
    /// Internal Norm Layer.
    pub norm: Normalization<B>,

    /// Activation layer.
    pub act: Activation<B>,
}

impl<B: Backend> NormAct<B> {
    /// The number of normalized channels.
    pub fn num_features(&self) -> usize {
        self.norm.num_features()
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, num_features, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_features, height, width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [_batch] = unpack_shape_contract!(
            ["batch", "num_features", "height", "width"],
            &input,
            &["batch"],
            &[("num_features", self.num_features())]
        );
        let x = self.norm.forward(input);
        self.act.forward(x)
    }
}
