//! # Residual Block Utilities

/// Get the output resolution for a given input resolution.
///
/// Strided convolutions and pools are padded so that a partial final
/// window still produces an output, so odd sizes round up.
///
/// # Arguments
///
/// - `input_resolution`: ``[height_in, width_in]``.
///
/// # Returns
///
/// ``[ceil(height_in/stride), ceil(width_in/stride)]``
#[inline(always)]
pub fn stride_div_output_resolution(
    input_resolution: [usize; 2],
    stride: usize,
) -> [usize; 2] {
    let [height_in, width_in] = input_resolution;
    [height_in.div_ceil(stride), width_in.div_ceil(stride)]
}

/// Is the identity shortcut usable?
///
/// A residual addition of the unmodified input is only shape-compatible
/// when the channel counts match and there is no spatial stride.
#[inline(always)]
pub fn identity_shortcut_compatible(
    in_channels: usize,
    out_channels: usize,
    stride: usize,
) -> bool {
    in_channels == out_channels && stride == 1
}

/// Squeeze channels for SE attention, never zero.
#[inline(always)]
pub fn se_reduction_channels(planes: usize) -> usize {
    (planes / 4).max(1)
}
