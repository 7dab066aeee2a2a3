//! TRAIN → EXECUTE state machine.
//!
//! TRAIN feeds mean feature vectors to the trainer until it publishes centers;
//! EXECUTE scores flows against those centers. The transition happens once.

use crate::classify::DistanceClassifier;
use crate::config::AnalyzerConfig;
use crate::features::{frame_mean, FeatureFrames};
use crate::trainer::{Sample, TrainerLink};
use ndarray::{s, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Train,
    Execute,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Train => f.write_str("train"),
            Mode::Execute => f.write_str("execute"),
        }
    }
}

pub struct ModeController {
    core_id: u32,
    mode: Mode,
    trainer: Arc<TrainerLink>,
    classifier: Option<DistanceClassifier>,
    rng: StdRng,
    mean_win_train: usize,
    num_train_sample: usize,
    mean_win_test: usize,
    max_cluster_dist: f64,
    mode_verbose: bool,
    log_centers: bool,
}

impl ModeController {
    pub fn new(core_id: u32, config: &AnalyzerConfig, trainer: Arc<TrainerLink>) -> Self {
        let rng = match config.train_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            core_id,
            mode: Mode::Train,
            trainer,
            classifier: None,
            rng,
            mean_win_train: config.mean_win_train,
            num_train_sample: config.num_train_sample,
            mean_win_test: config.mean_win_test,
            max_cluster_dist: config.max_cluster_dist,
            mode_verbose: config.mode_verbose,
            log_centers: config.center_verbose && config.verbose_center_core == core_id,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn is_train(&self) -> bool {
        self.mode == Mode::Train
    }

    pub fn classifier(&self) -> Option<&DistanceClassifier> {
        self.classifier.as_ref()
    }

    /// Submit one flow's frames to the trainer and raise the start flag when
    /// the packet target is reached. `weight` is the packet count of the pass.
    pub fn submit(&mut self, frames: &FeatureFrames, weight: usize) {
        let samples = self.training_samples(frames);
        self.trainer.submit_samples(samples, weight);

        if self.trainer.trigger_training_if_ready() && self.mode_verbose {
            info!(core = self.core_id, "trigger the training of learner");
        }
    }

    /// Random sub-window means while the trainer still wants packets and the
    /// flow is long enough; otherwise the mean over all frames.
    fn training_samples(&mut self, frames: &FeatureFrames) -> Vec<Sample> {
        let n = frames.nrows();
        let win = self.mean_win_train;
        if n.saturating_sub(1) > win && !self.trainer.reached_target() {
            (0..self.num_train_sample)
                .map(|_| {
                    let start = self.rng.gen_range(0..n - 1 - win);
                    frame_mean(frames.slice(s![start..start + win, ..])).to_vec()
                })
                .collect()
        } else {
            vec![frame_mean(frames.view()).to_vec()]
        }
    }

    /// Enter EXECUTE if the trainer has finished. Returns true on the pass that
    /// transitions; never leaves EXECUTE once entered.
    pub fn poll_transition(&mut self) -> bool {
        if self.mode == Mode::Execute {
            return false;
        }
        let status = self.trainer.status();
        if !status.finished {
            return false;
        }

        let centers = status.centers.unwrap_or_else(|| {
            Arc::new(Array2::zeros((
                self.trainer.cluster_count(),
                self.trainer.feature_dim(),
            )))
        });
        if self.mode_verbose {
            info!(core = self.core_id, k = centers.nrows(), "enter execution mode");
        }
        if self.log_centers {
            info!(core = self.core_id, centers = ?centers, "adopted cluster centers");
        }
        self.classifier = Some(DistanceClassifier::new(
            centers,
            self.mean_win_test,
            self.max_cluster_dist,
        ));
        self.mode = Mode::Execute;
        true
    }

    /// Distance verdict for a flow; `None` while training.
    pub fn classify(&self, frames: &FeatureFrames) -> Option<f64> {
        self.classifier.as_ref().map(|c| c.distance(frames))
    }
}
