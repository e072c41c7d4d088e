//! # Residual Block Meta API
//!
//! [`ResidualBlockMeta`] is implemented by every block config and module,
//! and by the stage assemblers.

use crate::models::residual::util::stride_div_output_resolution;

/// Channel and stride bookkeeping shared by blocks and their configs.
pub trait ResidualBlockMeta {
    /// The number of input channels.
    fn in_channels(&self) -> usize;

    /// The number of output channels.
    fn out_channels(&self) -> usize;

    /// The spatial stride.
    fn stride(&self) -> usize;

    /// Does the block add its unmodified input to its output?
    ///
    /// Only possible when ``in_channels == out_channels && stride == 1``.
    fn has_residual(&self) -> bool;

    /// Get the output resolution for a given input resolution.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[ceil(in_height/stride), ceil(in_width/stride)]``
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        stride_div_output_resolution(input_resolution, self.stride())
    }
}
