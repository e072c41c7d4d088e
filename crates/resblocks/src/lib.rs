#![warn(missing_docs)]
//!# resblocks - Residual Blocks for Burn
//!
//! Building blocks for image-classification backbones.
//!
//! ## Notable Components
//!
//! * [`errors`] - construction-time lookup errors.
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::activation`] - activation wrapper and name lookup.
//!   * [`layers::norm`] - normalization wrapper and ``norm + act`` layers.
//!   * [`layers::conv`] - 3x3 / 1x1 convolution constructors.
//!   * [`layers::attention`] - SE / ECA / sSE / scSE attention.
//!   * [`layers::drop::drop_connect`] - drop connect / stochastic depth.
//!   * [`layers::pool`] - global average pooling and anti-aliased downsampling.
//!   * [`layers::blocks`] - miscellaneous small blocks.
//! * [`models`] - block families and stage assemblers.
//!   * [`models::residual`] - residual block variants and stages.
//! * [`utility`] - small numeric helpers.

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod errors;

#[cfg(test)]
pub(crate) mod testing;

pub mod layers;
pub mod models;
pub mod utility;
