//! # Residual Blocks and Stages
//!
//! Block variants, the [`residual_block::ResidualBlock`] wrapper, and the
//! stage assemblers which chain them.

pub mod basic_block;
pub mod bottleneck;
pub mod cross_stage;
pub mod csp_dark_block;
pub mod dark_block;
pub mod inverted_residual;
pub mod meta;
pub mod projection;
pub mod residual_block;
pub mod sequential_stage;
pub mod simple_bottleneck;
pub mod simple_preact_bottleneck;
pub mod stage;
pub mod util;
