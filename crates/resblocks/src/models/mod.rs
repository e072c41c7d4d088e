//! # Block Families
pub mod residual;
