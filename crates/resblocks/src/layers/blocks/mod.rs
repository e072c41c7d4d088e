//! # Miscellaneous Blocks
pub mod depthwise_separable;
