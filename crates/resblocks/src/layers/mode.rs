//! # Forward Mode
//!
//! Blocks take an explicit [`ForwardMode`] rather than consulting
//! process-wide state; only stochastic layers change behavior with it.

use burn::prelude::Backend;
use serde::{Deserialize, Serialize};

/// Training / inference selector for a forward pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForwardMode {
    /// Training: stochastic layers sample.
    Train,

    /// Inference: stochastic layers are the identity.
    #[default]
    Eval,
}

impl ForwardMode {
    /// The conventional burn mode for a backend.
    ///
    /// ``Train`` iff the backend records gradients.
    pub fn from_backend<B: Backend>() -> Self {
        if B::ad_enabled() { Self::Train } else { Self::Eval }
    }

    /// Is this the training mode?
    pub fn is_train(self) -> bool {
        matches!(self, Self::Train)
    }
}
