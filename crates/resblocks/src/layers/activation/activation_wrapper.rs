//! # Activation Layer Wrapper
//!
//! Wraps the in-built `burn::nn` activations, plus the parameter-free
//! activations blocks refer to by name (`swish`, `mish`, `identity`).
//!
//! [`ActivationConfig::from_name`] is the activation-name lookup used by
//! block configs.

use crate::errors::BlockError;
use burn::nn::{
    Gelu, HardSigmoid, HardSigmoidConfig, LeakyRelu, LeakyReluConfig, PRelu, PReluConfig, Relu,
    Sigmoid, Tanh,
};
use burn::prelude::{Backend, Config, Module, Tensor};
use burn::tensor::activation;
use std::str::FromStr;

/// Default slope for the ``leaky_relu`` name lookup.
pub const DEFAULT_LEAKY_RELU_SLOPE: f64 = 0.01;

/// [`Activation`] Configuration.
#[derive(Config, Debug)]
#[non_exhaustive]
pub enum ActivationConfig {
    /// [`Relu`] activation layer.
    Relu,

    /// [`LeakyRelu`] activation layer.
    LeakyRelu(LeakyReluConfig),

    /// [`PRelu`] activation layer.
    PRelu(PReluConfig),

    /// [`Gelu`] activation layer.
    Gelu,

    /// [`Sigmoid`] activation layer.
    Sigmoid,

    /// [`Tanh`] activation layer.
    Tanh,

    /// [`HardSigmoid`] activation layer.
    HardSigmoid(HardSigmoidConfig),

    /// [`Swish`] (``x * sigmoid(x)``) activation layer.
    Swish,

    /// [`Mish`] activation layer.
    Mish,

    /// [`Identity`] pass-through; used for linear bottleneck outputs.
    Identity,
}

impl From<LeakyReluConfig> for ActivationConfig {
    fn from(config: LeakyReluConfig) -> Self {
        Self::LeakyRelu(config)
    }
}

impl From<PReluConfig> for ActivationConfig {
    fn from(config: PReluConfig) -> Self {
        Self::PRelu(config)
    }
}

impl From<HardSigmoidConfig> for ActivationConfig {
    fn from(config: HardSigmoidConfig) -> Self {
        Self::HardSigmoid(config)
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self::Relu
    }
}

impl FromStr for ActivationConfig {
    type Err = BlockError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::from_name(name)
    }
}

impl ActivationConfig {
    /// Look up an activation by name.
    ///
    /// Names are case-insensitive:
    /// ``relu``, ``leaky_relu``, ``prelu``, ``gelu``, ``sigmoid``, ``tanh``,
    /// ``hard_sigmoid``, ``swish`` / ``silu``, ``mish``, ``identity`` / ``none``.
    ///
    /// # Errors
    ///
    /// [`BlockError::UnknownActivation`] for any other name.
    pub fn from_name(name: &str) -> Result<Self, BlockError> {
        Ok(match name.to_ascii_lowercase().as_str() {
            "relu" => Self::Relu,
            "leaky_relu" => LeakyReluConfig::new()
                .with_negative_slope(DEFAULT_LEAKY_RELU_SLOPE)
                .into(),
            "prelu" => PReluConfig::new().into(),
            "gelu" => Self::Gelu,
            "sigmoid" => Self::Sigmoid,
            "tanh" => Self::Tanh,
            "hard_sigmoid" => HardSigmoidConfig::new().into(),
            "swish" | "silu" => Self::Swish,
            "mish" => Self::Mish,
            "identity" | "none" => Self::Identity,
            _ => return Err(BlockError::UnknownActivation(name.to_string())),
        })
    }

    /// Is this the identity activation?
    pub fn is_identity(&self) -> bool {
        matches!(self, Self::Identity)
    }

    /// Replace a leaky-relu slope; other activations are returned unchanged.
    pub fn with_leaky_slope(
        self,
        negative_slope: f64,
    ) -> Self {
        match self {
            Self::LeakyRelu(config) => config.with_negative_slope(negative_slope).into(),
            other => other,
        }
    }

    /// Initialize a wrapped activation layer.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Activation<B> {
        match self {
            ActivationConfig::Relu => Activation::Relu(Relu),
            ActivationConfig::LeakyRelu(conf) => Activation::LeakyRelu(conf.init()),
            ActivationConfig::PRelu(conf) => Activation::PRelu(conf.init(device)),
            ActivationConfig::Gelu => Activation::Gelu(Gelu),
            ActivationConfig::Sigmoid => Activation::Sigmoid(Sigmoid),
            ActivationConfig::Tanh => Activation::Tanh(Tanh),
            ActivationConfig::HardSigmoid(conf) => Activation::HardSigmoid(conf.init()),
            ActivationConfig::Swish => Activation::Swish(Swish),
            ActivationConfig::Mish => Activation::Mish(Mish),
            ActivationConfig::Identity => Activation::Identity(Identity),
        }
    }
}

/// Swish / SiLU activation: ``x * sigmoid(x)``.
#[derive(Module, Clone, Debug, Default)]
pub struct Swish;

impl Swish {
    /// Forward pass.
    pub fn forward<B: Backend, const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        activation::silu(input)
    }
}

/// Mish activation: ``x * tanh(softplus(x))``.
#[derive(Module, Clone, Debug, Default)]
pub struct Mish;

impl Mish {
    /// Forward pass.
    pub fn forward<B: Backend, const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        activation::mish(input)
    }
}

/// Identity activation.
#[derive(Module, Clone, Debug, Default)]
pub struct Identity;

impl Identity {
    /// Forward pass.
    pub fn forward<B: Backend, const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        input
    }
}

/// Activation Layer Wrapper.
#[derive(Module, Debug)]
#[non_exhaustive]
pub enum Activation<B: Backend> {
    /// [`Relu`] activation layer.
    Relu(Relu),

    /// [`LeakyRelu`] activation layer.
    LeakyRelu(LeakyRelu),

    /// [`PRelu`] activation layer.
    PRelu(PRelu<B>),

    /// [`Gelu`] activation layer.
    Gelu(Gelu),

    /// [`Sigmoid`] activation layer.
    Sigmoid(Sigmoid),

    /// [`Tanh`] activation layer.
    Tanh(Tanh),

    /// [`HardSigmoid`] activation layer.
    HardSigmoid(HardSigmoid),

    /// [`Swish`] activation layer.
    Swish(Swish),

    /// [`Mish`] activation layer.
    Mish(Mish),

    /// [`Identity`] activation layer.
    Identity(Identity),
}

impl<B: Backend> Activation<B> {
    /// Forward pass.
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        match self {
            Activation::Relu(layer) => layer.forward(input),
            Activation::LeakyRelu(layer) => layer.forward(input),
            Activation::PRelu(layer) => layer.forward(input),
            Activation::Gelu(layer) => layer.forward(input),
            Activation::Sigmoid(layer) => layer.forward(input),
            Activation::Tanh(layer) => layer.forward(input),
            Activation::HardSigmoid(layer) => layer.forward(input),
            Activation::Swish(layer) => layer.forward(input),
            Activation::Mish(layer) => layer.forward(input),
            Activation::Identity(layer) => layer.forward(input),
        }
    }

    /// Build a [`ActivationConfig`] for this module.
    pub fn to_config(&self) -> ActivationConfig {
        match self {
            Activation::Relu(_) => ActivationConfig::Relu,
            Activation::LeakyRelu(layer) => LeakyReluConfig::new()
                .with_negative_slope(layer.negative_slope)
                .into(),
            Activation::PRelu(layer) => PReluConfig::new()
                .with_alpha(layer.alpha_value)
                .with_num_parameters(layer.num_params())
                .into(),
            Activation::Gelu(_) => ActivationConfig::Gelu,
            Activation::Sigmoid(_) => ActivationConfig::Sigmoid,
            Activation::Tanh(_) => ActivationConfig::Tanh,
            Activation::HardSigmoid(layer) => HardSigmoidConfig::new()
                .with_alpha(layer.alpha)
                .with_beta(layer.beta)
                .into(),
            Activation::Swish(_) => ActivationConfig::Swish,
            Activation::Mish(_) => ActivationConfig::Mish,
            Activation::Identity(_) => ActivationConfig::Identity,
        }
    }
}
