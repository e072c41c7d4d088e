//! Test helpers.

use burn::prelude::{Backend, Tensor};
use burn::tensor::ElementConversion;

/// The largest absolute elementwise difference between two tensors.
pub fn max_abs_diff<B: Backend, const D: usize>(
    actual: Tensor<B, D>,
    expected: Tensor<B, D>,
) -> f32 {
    assert_eq!(actual.dims(), expected.dims());
    (actual - expected).abs().max().into_scalar().elem::<f32>()
}

/// Assert that two tensors have the same shape and are elementwise close.
pub fn assert_close<B: Backend, const D: usize>(
    actual: Tensor<B, D>,
    expected: Tensor<B, D>,
    tolerance: f32,
) {
    let diff = max_abs_diff(actual, expected);
    assert!(diff <= tolerance, "max |actual - expected| = {diff} > {tolerance}");
}

/// The mean of all elements of a tensor.
pub fn mean_scalar<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> f32 {
    tensor.mean().into_scalar().elem::<f32>()
}
