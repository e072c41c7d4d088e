//! # Block Construction Errors

use thiserror::Error;

/// Errors raised while resolving block configuration.
///
/// All of these surface at construction time, before any forward pass.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlockError {
    /// The attention tag is not one of the known attention variants.
    #[error("unknown attention type: {0:?}")]
    UnknownAttention(String),

    /// The activation name is not one of the known activations.
    #[error("unknown activation: {0:?}")]
    UnknownActivation(String),

    /// The cross-stage split ratio is not supported.
    #[error("unsupported csp block ratio: {0} (expected 0.5 or 0.75)")]
    UnsupportedCspRatio(f64),
}
