//! Common low-level modules for building residual blocks in Burn.
pub mod activation;
pub mod attention;
pub mod blocks;
pub mod conv;
pub mod drop;
pub mod mode;
pub mod norm;
pub mod pool;
