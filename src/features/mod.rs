//! Spectral feature extraction: packets → weighted series → short-time spectrum → log power.

mod encoding;
mod spectral;

pub use encoding::weight_transform;
pub use spectral::{sanitize, SpectralExtractor};

use ndarray::{Array1, Array2, ArrayView2, Axis};

/// Frames × frequency bins of log power for one flow window.
pub type FeatureFrames = Array2<f64>;

/// Mean over the rows of `frames`; an empty view yields zeros.
pub fn frame_mean(frames: ArrayView2<'_, f64>) -> Array1<f64> {
    frames
        .mean_axis(Axis(0))
        .unwrap_or_else(|| Array1::zeros(frames.ncols()))
}
