//! Rendezvous with the external trainer.
//!
//! The trainer owns clustering. This side only hands over samples, raises the
//! start flag once enough packets were seen, and reads back published centers.
//! Two independent tokens: `data` guards submitted samples, `learn` guards the
//! start/finish flags and the centers. Neither is held while taking the other.

use ndarray::Array2;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// One training sample: a mean feature vector.
pub type Sample = Vec<f64>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PublishError {
    #[error("center matrix shape {got:?}, expected ({k}, {dim})")]
    Shape {
        k: usize,
        dim: usize,
        got: (usize, usize),
    },
}

#[derive(Debug, Default)]
struct LearnState {
    started: bool,
    finished: bool,
    centers: Option<Arc<Array2<f64>>>,
}

/// Snapshot of the trainer's progress.
#[derive(Debug, Clone, Default)]
pub struct TrainerStatus {
    pub started: bool,
    pub finished: bool,
    pub centers: Option<Arc<Array2<f64>>>,
}

#[derive(Debug)]
pub struct TrainerLink {
    k: usize,
    dim: usize,
    target_packets: usize,
    collected_packets: AtomicUsize,
    data: Mutex<Vec<Sample>>,
    learn: Mutex<LearnState>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl TrainerLink {
    /// `k` centers of `dim` features; training may start after `target_packets` packets.
    pub fn new(k: usize, dim: usize, target_packets: usize) -> Self {
        Self {
            k,
            dim,
            target_packets,
            collected_packets: AtomicUsize::new(0),
            data: Mutex::new(Vec::new()),
            learn: Mutex::new(LearnState::default()),
        }
    }

    pub fn cluster_count(&self) -> usize {
        self.k
    }

    pub fn feature_dim(&self) -> usize {
        self.dim
    }

    // ---- analyzer side ----

    /// Add samples under the data token. `weight` counts toward the packet target.
    pub fn submit_samples(&self, samples: Vec<Sample>, weight: usize) {
        let mut data = lock(&self.data);
        data.extend(samples);
        self.collected_packets.fetch_add(weight, Ordering::AcqRel);
    }

    pub fn reached_target(&self) -> bool {
        self.collected_packets.load(Ordering::Acquire) >= self.target_packets
    }

    /// Under the learn token: start training if the target is reached and it has
    /// not started yet. Returns true when this call started it.
    pub fn trigger_training_if_ready(&self) -> bool {
        let mut learn = lock(&self.learn);
        if self.reached_target() && !learn.started {
            learn.started = true;
            return true;
        }
        false
    }

    pub fn status(&self) -> TrainerStatus {
        let learn = lock(&self.learn);
        TrainerStatus {
            started: learn.started,
            finished: learn.finished,
            centers: learn.centers.clone(),
        }
    }

    // ---- trainer side ----

    pub fn collected_packets(&self) -> usize {
        self.collected_packets.load(Ordering::Acquire)
    }

    /// Take every sample submitted so far.
    pub fn drain_samples(&self) -> Vec<Sample> {
        std::mem::take(&mut *lock(&self.data))
    }

    pub fn training_requested(&self) -> bool {
        lock(&self.learn).started
    }

    /// Publish the learned centers and mark training finished.
    pub fn publish_centers(&self, centers: Array2<f64>) -> Result<(), PublishError> {
        if centers.dim() != (self.k, self.dim) {
            return Err(PublishError::Shape {
                k: self.k,
                dim: self.dim,
                got: centers.dim(),
            });
        }
        let mut learn = lock(&self.learn);
        learn.centers = Some(Arc::new(centers));
        learn.finished = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_fires_once_after_target() {
        let link = TrainerLink::new(2, 3, 100);
        link.submit_samples(vec![vec![0.0; 3]], 60);
        assert!(!link.trigger_training_if_ready());
        link.submit_samples(vec![vec![1.0; 3]], 60);
        assert!(link.trigger_training_if_ready());
        assert!(!link.trigger_training_if_ready());
        assert!(link.training_requested());
        assert_eq!(link.drain_samples().len(), 2);
        assert!(link.drain_samples().is_empty());
    }

    #[test]
    fn publish_rejects_wrong_shape() {
        let link = TrainerLink::new(2, 3, 0);
        assert!(link.publish_centers(Array2::zeros((3, 3))).is_err());
        assert!(!link.status().finished);
        link.publish_centers(Array2::zeros((2, 3))).unwrap();
        let status = link.status();
        assert!(status.finished);
        assert_eq!(status.centers.unwrap().dim(), (2, 3));
    }
}
