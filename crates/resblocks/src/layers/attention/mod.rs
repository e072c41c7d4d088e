//! # Attention Modules
//!
//! Four interchangeable attention variants, selected by [`AttentionKind`]:
//!
//! | tag      | kind                   | module                          |
//! |----------|------------------------|---------------------------------|
//! | ``se``   | [`AttentionKind::Se`]   | [`se::SqueezeExcite`]           |
//! | ``eca``  | [`AttentionKind::Eca`]  | [`eca::EfficientChannelAttention`] |
//! | ``sse``  | [`AttentionKind::Sse`]  | [`sse::SpatialSqueezeExcite`]   |
//! | ``scse`` | [`AttentionKind::Scse`] | [`scse::SpatialChannelSqueezeExcite`] |
//!
//! No attention (``None``) builds [`Attention::Identity`].

pub mod eca;
pub mod scse;
pub mod se;
pub mod sse;

use crate::errors::BlockError;
use crate::layers::activation::activation_wrapper::{ActivationConfig, Identity};
use crate::layers::attention::eca::{EfficientChannelAttention, EfficientChannelAttentionConfig};
use crate::layers::attention::scse::{
    SpatialChannelSqueezeExcite, SpatialChannelSqueezeExciteConfig,
};
use crate::layers::attention::se::{SqueezeExcite, SqueezeExciteConfig};
use crate::layers::attention::sse::{SpatialSqueezeExcite, SpatialSqueezeExciteConfig};
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of attention variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttentionKind {
    /// Squeeze-and-Excitation.
    Se,

    /// Efficient Channel Attention.
    Eca,

    /// Spatial Squeeze-and-Excitation.
    Sse,

    /// Spatial + Channel Squeeze-and-Excitation.
    Scse,
}

/// Tag to [`AttentionKind`] table.
pub const ATTENTION_TABLE: [(&str, AttentionKind); 4] = [
    ("se", AttentionKind::Se),
    ("eca", AttentionKind::Eca),
    ("sse", AttentionKind::Sse),
    ("scse", AttentionKind::Scse),
];

impl AttentionKind {
    /// The canonical tag.
    pub fn tag(self) -> &'static str {
        ATTENTION_TABLE
            .iter()
            .find(|(_, kind)| *kind == self)
            .map(|(tag, _)| *tag)
            .unwrap_or_default()
    }

    /// Resolve an optional attention tag.
    ///
    /// `None` means no attention.
    ///
    /// # Errors
    ///
    /// [`BlockError::UnknownAttention`] for an unrecognized tag.
    pub fn lookup(name: Option<&str>) -> Result<Option<Self>, BlockError> {
        name.map(str::parse).transpose()
    }
}

impl FromStr for AttentionKind {
    type Err = BlockError;

    /// Case-insensitive tag lookup.
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        ATTENTION_TABLE
            .iter()
            .find(|(tag, _)| tag.eq_ignore_ascii_case(name))
            .map(|(_, kind)| *kind)
            .ok_or_else(|| BlockError::UnknownAttention(name.to_string()))
    }
}

impl fmt::Display for AttentionKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// [`Attention`] Config.
#[derive(Config, Debug)]
pub struct AttentionConfig {
    /// The attention variant; `None` for no attention.
    #[config(default = "None")]
    pub kind: Option<AttentionKind>,

    /// Input (and output) channels.
    pub channels: usize,

    /// Squeezed channels; only used by [`AttentionKind::Se`].
    pub reduction_channels: usize,

    /// Squeeze activation; only used by [`AttentionKind::Se`].
    #[config(default = "ActivationConfig::Relu")]
    pub act: ActivationConfig,
}

impl AttentionConfig {
    /// Initialize an [`Attention`] module.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Attention<B> {
        match self.kind {
            None => Attention::Identity(Identity),
            Some(AttentionKind::Se) => Attention::Se(
                SqueezeExciteConfig::new(self.channels, self.reduction_channels)
                    .with_act(self.act.clone())
                    .init(device),
            ),
            Some(AttentionKind::Eca) => {
                Attention::Eca(EfficientChannelAttentionConfig::new().init(device))
            }
            Some(AttentionKind::Sse) => {
                Attention::Sse(SpatialSqueezeExciteConfig::new(self.channels).init(device))
            }
            Some(AttentionKind::Scse) => Attention::Scse(
                SpatialChannelSqueezeExciteConfig::new(self.channels).init(device),
            ),
        }
    }
}

/// Attention module wrapper.
#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum Attention<B: Backend> {
    /// No attention; output equals input.
    Identity(Identity),

    /// [`SqueezeExcite`] attention.
    Se(SqueezeExcite<B>),

    /// [`EfficientChannelAttention`] attention.
    Eca(EfficientChannelAttention<B>),

    /// [`SpatialSqueezeExcite`] attention.
    Sse(SpatialSqueezeExcite<B>),

    /// [`SpatialChannelSqueezeExcite`] attention.
    Scse(SpatialChannelSqueezeExcite<B>),
}

impl<B: Backend> Attention<B> {
    /// The attention variant; `None` for identity.
    pub fn kind(&self) -> Option<AttentionKind> {
        match self {
            Self::Identity(_) => None,
            Self::Se(_) => Some(AttentionKind::Se),
            Self::Eca(_) => Some(AttentionKind::Eca),
            Self::Sse(_) => Some(AttentionKind::Sse),
            Self::Scse(_) => Some(AttentionKind::Scse),
        }
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, channels, height, width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Self::Identity(layer) => layer.forward(input),
            Self::Se(layer) => layer.forward(input),
            Self::Eca(layer) => layer.forward(input),
            Self::Sse(layer) => layer.forward(input),
            Self::Scse(layer) => layer.forward(input),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    type B = NdArray<f32>;

    #[test]
    fn test_lookup_case_insensitive() {
        for (tag, kind) in ATTENTION_TABLE {
            assert_eq!(tag.parse::<AttentionKind>(), Ok(kind));
            assert_eq!(tag.to_uppercase().parse::<AttentionKind>(), Ok(kind));
            assert_eq!(kind.tag(), tag);
            assert_eq!(kind.to_string(), tag);
        }
        assert_eq!("ScSe".parse::<AttentionKind>(), Ok(AttentionKind::Scse));
        assert_eq!(AttentionKind::lookup(Some("Eca")), Ok(Some(AttentionKind::Eca)));
        assert_eq!(AttentionKind::lookup(None), Ok(None));
    }

    #[test]
    fn test_lookup_unknown() {
        assert_eq!(
            "cbam".parse::<AttentionKind>(),
            Err(BlockError::UnknownAttention("cbam".to_string()))
        );
        assert_eq!(
            AttentionKind::lookup(Some("")),
            Err(BlockError::UnknownAttention(String::new()))
        );
        let err = AttentionKind::lookup(Some("se2")).unwrap_err();
        assert_eq!(err.to_string(), "unknown attention type: \"se2\"");
    }

    #[test]
    fn test_init_selects_module() {
        let device = Default::default();
        let channels = 8;

        let config = AttentionConfig::new(channels, 2);
        assert_eq!(config.kind, None);
        assert_eq!(config.channels, channels);
        assert_eq!(config.reduction_channels, 2);

        let none: Attention<B> = config.init(&device);
        assert!(matches!(none, Attention::Identity(_)));
        assert_eq!(none.kind(), None);

        for (_, kind) in ATTENTION_TABLE {
            let layer: Attention<B> = AttentionConfig::new(channels, 2)
                .with_kind(Some(kind))
                .init(&device);
            assert_eq!(layer.kind(), Some(kind));
            match kind {
                AttentionKind::Se => assert!(matches!(layer, Attention::Se(_))),
                AttentionKind::Eca => assert!(matches!(layer, Attention::Eca(_))),
                AttentionKind::Sse => assert!(matches!(layer, Attention::Sse(_))),
                AttentionKind::Scse => assert!(matches!(layer, Attention::Scse(_))),
            }
        }
    }

    #[test]
    fn test_identity_passthrough() {
        let device = Default::default();
        let layer: Attention<B> = AttentionConfig::new(4, 1).init(&device);

        let input: Tensor<B, 4> = Tensor::random([2, 4, 3, 3], Distribution::Default, &device);
        let output = layer.forward(input.clone());
        output.to_data().assert_eq(&input.to_data(), true);
    }

    #[test]
    fn test_shape_preserved_for_every_kind() {
        let device = Default::default();
        let input: Tensor<B, 4> = Tensor::random([2, 8, 5, 7], Distribution::Default, &device);

        for (_, kind) in ATTENTION_TABLE {
            let layer: Attention<B> = AttentionConfig::new(8, 2)
                .with_kind(Some(kind))
                .init(&device);
            assert_eq!(layer.forward(input.clone()).dims(), [2, 8, 5, 7]);
        }
    }
}
