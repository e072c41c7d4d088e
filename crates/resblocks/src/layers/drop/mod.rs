//! # Dropout Layers
pub mod drop_connect;
