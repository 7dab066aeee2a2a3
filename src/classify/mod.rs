//! Distance of a flow's spectral frames to the learned cluster centers.

use crate::features::{frame_mean, FeatureFrames};
use ndarray::{s, Array2, ArrayView1};
use std::sync::Arc;

pub struct DistanceClassifier {
    centers: Arc<Array2<f64>>,
    window: usize,
    ceiling: f64,
}

impl DistanceClassifier {
    /// `window` frames are averaged per scored window; `ceiling` caps every distance.
    pub fn new(centers: Arc<Array2<f64>>, window: usize, ceiling: f64) -> Self {
        Self {
            centers,
            window,
            ceiling,
        }
    }

    pub fn centers(&self) -> &Array2<f64> {
        &self.centers
    }

    /// Euclidean distance to the closest center, at most the ceiling.
    pub fn nearest(&self, v: ArrayView1<'_, f64>) -> f64 {
        self.centers
            .rows()
            .into_iter()
            .map(|c| euclidean(v, c))
            .fold(self.ceiling, f64::min)
    }

    /// Worst window wins: the flow scores the largest per-window nearest distance.
    /// Short flows are scored on the mean of all frames.
    pub fn distance(&self, frames: &FeatureFrames) -> f64 {
        let n = frames.nrows();
        if n <= self.window {
            return self.nearest(frame_mean(frames.view()).view());
        }

        let mut worst = 0.0f64;
        let mut i = 0;
        while i + self.window < n {
            let mean = frame_mean(frames.slice(s![i..i + self.window, ..]));
            worst = worst.max(self.nearest(mean.view()));
            i += self.window;
        }
        worst
    }
}

fn euclidean(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}
