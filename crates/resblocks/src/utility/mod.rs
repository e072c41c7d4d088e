//! # Utility Functions

pub mod divisible;
pub mod probability;
