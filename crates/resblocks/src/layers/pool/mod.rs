//! # Pooling Layers
//!
//! * [`global_avg_pool2d`] - spatial mean, keeping dims.
//! * [`blur_pool`] - anti-aliased strided downsampling.

pub mod blur_pool;

pub use blur_pool::*;

use burn::prelude::{Backend, Tensor};

/// Global average pool over the spatial dims.
///
/// # Arguments
///
/// - `input`: ``[batch, channels, height, width]``.
///
/// # Returns
///
/// ``[batch, channels, 1, 1]``
pub fn global_avg_pool2d<B: Backend>(input: Tensor<B, 4>) -> Tensor<B, 4> {
    input.mean_dim(3).mean_dim(2)
}
