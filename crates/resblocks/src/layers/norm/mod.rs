//! # Normalization Layers
pub mod norm_act;
pub mod normalization_wrapper;
