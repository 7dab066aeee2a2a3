//! Short-time Fourier transform over a flow's weighted series.

use super::{weight_transform, FeatureFrames};
use crate::intake::PacketMetadata;
use ndarray::Array2;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

/// Rectangular window, hop of `n_fft / 4`, no padding, one-sided output.
pub struct SpectralExtractor {
    n_fft: usize,
    hop: usize,
    fft: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for SpectralExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectralExtractor")
            .field("n_fft", &self.n_fft)
            .field("hop", &self.hop)
            .finish()
    }
}

impl SpectralExtractor {
    pub fn new(n_fft: usize) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(n_fft);
        Self {
            n_fft,
            hop: (n_fft / 4).max(1),
            fft,
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Frequency bins per frame.
    pub fn bins(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Frames produced for a series of `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        if len < self.n_fft {
            0
        } else {
            1 + (len - self.n_fft) / self.hop
        }
    }

    /// Encode each packet and transform the resulting series.
    pub fn extract(&self, packets: &[PacketMetadata]) -> FeatureFrames {
        let series: Vec<f64> = packets.iter().map(weight_transform).collect();
        self.transform(&series)
    }

    /// `log2(|X|² + 1)` per frame and bin, non-finite values zeroed.
    pub fn transform(&self, series: &[f64]) -> FeatureFrames {
        let bins = self.bins();
        let mut out = Array2::zeros((self.frame_count(series.len()), bins));
        let mut buf = vec![Complex::new(0.0, 0.0); self.n_fft];

        for (frame, mut row) in out.rows_mut().into_iter().enumerate() {
            let start = frame * self.hop;
            for (slot, &x) in buf.iter_mut().zip(&series[start..start + self.n_fft]) {
                *slot = Complex::new(x, 0.0);
            }
            self.fft.process(&mut buf);
            for (dst, c) in row.iter_mut().zip(&buf[..bins]) {
                *dst = (c.re * c.re + c.im * c.im + 1.0).log2();
            }
        }

        sanitize(&mut out);
        out
    }
}

/// Replace NaN and ±inf with zero.
pub fn sanitize(frames: &mut FeatureFrames) {
    frames.mapv_inplace(|v| if v.is_finite() { v } else { 0.0 });
}
