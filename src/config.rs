//! Analyzer configuration. Loaded once per worker, immutable afterwards.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::{error, warn};

/// Hard cap on the intake buffer (entries).
pub const MAX_INTAKE_BUFFER_SIZE: usize = 1 << 24;
/// Hard cap on the result buffer (records).
pub const MAX_RESULT_BUFFER_SIZE: usize = 1 << 22;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Frame length of the short-time transform
    pub n_fft: usize,
    /// Frames averaged per training sample
    pub mean_win_train: usize,
    /// Frames averaged per scored window
    pub mean_win_test: usize,
    /// Random sub-windows drawn per trained flow
    pub num_train_sample: usize,

    pub mode_verbose: bool,
    pub init_verbose: bool,
    pub center_verbose: bool,
    pub ip_verbose: bool,
    pub speed_verbose: bool,
    /// Seconds between throughput reports
    pub verbose_interval: f64,
    /// Flow whose verdicts are logged when `ip_verbose` is set
    pub verbose_ip_target: Option<String>,
    /// Core that logs the adopted cluster centers
    pub verbose_center_core: u32,

    pub save_to_file: bool,
    pub save_dir: PathBuf,
    pub save_file_prefix: String,

    /// Poll pause in microseconds
    pub pause_time: u64,
    /// Delay in microseconds after each TRAIN pass
    pub train_pause_time: u64,

    #[serde(alias = "meta_pkt_arr_size")]
    pub intake_buffer_size: usize,
    pub result_buffer_size: usize,

    /// Per-source cap on entries copied per fetch
    pub max_fetch: usize,
    /// Sources with fewer pending entries are skipped
    pub min_fetch: usize,
    /// Distance reported when no center is closer
    pub max_cluster_dist: f64,
    /// Seed for the training sub-window sampler
    pub train_seed: Option<u64>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            n_fft: 16,
            mean_win_train: 50,
            mean_win_test: 100,
            num_train_sample: 10,
            mode_verbose: true,
            init_verbose: true,
            center_verbose: false,
            ip_verbose: false,
            speed_verbose: false,
            verbose_interval: 5.0,
            verbose_ip_target: None,
            verbose_center_core: 0,
            save_to_file: false,
            save_dir: PathBuf::from("./results"),
            save_file_prefix: "analyzer".to_string(),
            pause_time: 1000,
            train_pause_time: 50_000,
            intake_buffer_size: 1 << 18,
            result_buffer_size: 1 << 16,
            max_fetch: 16_384,
            min_fetch: 50,
            max_cluster_dist: 1e10,
            train_seed: None,
        }
    }
}

impl AnalyzerConfig {
    /// Build from a JSON object. Unknown keys are ignored, absent keys keep defaults.
    pub fn from_json(value: &Value) -> Result<Self, ConfigError> {
        let has = |key: &str| value.get(key).is_some();
        if !has("intake_buffer_size") && !has("meta_pkt_arr_size") {
            warn!("critical tag not found: intake_buffer_size, use default");
        }
        if !has("result_buffer_size") {
            warn!("critical tag not found: result_buffer_size, use default");
        }

        let mut config: AnalyzerConfig = serde_json::from_value(value.clone())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(data: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(data)?;
        Self::from_json(&value)
    }

    /// Load from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_json_str(&data)
    }

    /// Check limits. An invalid IP target also clears `ip_verbose`.
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.intake_buffer_size > MAX_INTAKE_BUFFER_SIZE {
            error!(size = self.intake_buffer_size, "packet metadata buffer size exceeded");
            return Err(ConfigError::CriticalLimit {
                name: "intake_buffer_size",
                value: self.intake_buffer_size,
                max: MAX_INTAKE_BUFFER_SIZE,
            });
        }
        if self.result_buffer_size > MAX_RESULT_BUFFER_SIZE {
            error!(size = self.result_buffer_size, "result buffer size exceeded");
            return Err(ConfigError::CriticalLimit {
                name: "result_buffer_size",
                value: self.result_buffer_size,
                max: MAX_RESULT_BUFFER_SIZE,
            });
        }
        if self.intake_buffer_size == 0 {
            return Err(ConfigError::ZeroParameter("intake_buffer_size"));
        }
        if self.result_buffer_size == 0 {
            return Err(ConfigError::ZeroParameter("result_buffer_size"));
        }
        if self.max_fetch == 0 {
            return Err(ConfigError::ZeroParameter("max_fetch"));
        }
        if self.n_fft < 2 {
            return Err(ConfigError::InvalidFftSize(self.n_fft));
        }
        if self.mean_win_train == 0 {
            return Err(ConfigError::ZeroParameter("mean_win_train"));
        }
        if self.mean_win_test == 0 {
            return Err(ConfigError::ZeroParameter("mean_win_test"));
        }
        // a frame needs n_fft packets and a window needs that many frames,
        // so neither can usefully exceed what one intake buffer holds
        for (name, value) in [
            ("n_fft", self.n_fft),
            ("mean_win_train", self.mean_win_train),
            ("mean_win_test", self.mean_win_test),
        ] {
            if value > self.intake_buffer_size {
                warn!(
                    name,
                    value,
                    max = self.intake_buffer_size,
                    "parameter exceeds intake buffer"
                );
                return Err(ConfigError::OutOfRange {
                    name,
                    value,
                    max: self.intake_buffer_size,
                });
            }
        }
        if self.verbose_interval.is_nan() || self.verbose_interval < 0.0 {
            warn!(interval = self.verbose_interval, "invalid verbose time interval");
            return Err(ConfigError::NegativeInterval(self.verbose_interval));
        }
        match &self.verbose_ip_target {
            Some(target) => {
                if target.parse::<Ipv4Addr>().is_err() {
                    self.ip_verbose = false;
                    warn!(target = %target, "invalid target verbose IP address");
                    return Err(ConfigError::InvalidIpTarget(target.clone()));
                }
            }
            None => self.ip_verbose = false,
        }
        Ok(())
    }

    /// Parsed verbose target, when per-flow logging is enabled.
    pub fn ip_target(&self) -> Option<Ipv4Addr> {
        if !self.ip_verbose {
            return None;
        }
        self.verbose_ip_target.as_deref()?.parse().ok()
    }

    /// Feature vector length produced by the spectral transform.
    pub fn feature_dim(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Minimum packets a flow needs before it is analyzed.
    pub fn min_window(&self) -> usize {
        self.n_fft.saturating_mul(2)
    }

    /// `<save_dir>/<save_file_prefix>_<core_id>.json`
    pub fn result_path(&self, core_id: u32) -> PathBuf {
        self.save_dir
            .join(format!("{}_{}.json", self.save_file_prefix, core_id))
    }
}
