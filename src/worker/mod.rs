//! Analyzer worker: polls upstream sources, aggregates flows, extracts spectral
//! features and either trains or scores them. One worker runs on one thread;
//! every stage of a pass runs sequentially on it.

mod throughput;

pub use throughput::{Rate, Throughput};

use crate::config::AnalyzerConfig;
use crate::error::{ConfigError, StartupError};
use crate::features::SpectralExtractor;
use crate::flow::FlowTable;
use crate::intake::{Fetcher, IntakeBuffer, MetadataSource};
use crate::mode::{Mode, ModeController};
use crate::record::{FlowRecord, ResultRecorder};
use crate::trainer::TrainerLink;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Requests a running worker to stop. Checked between loop iterations only.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Outcome of one run, available after stop.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub core_id: u32,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub runtime_secs: f64,
    pub packets: u64,
    pub bytes: u64,
    pub mpps: f64,
    pub gbps: f64,
    /// Records appended over the run, including overwritten ones
    pub records: usize,
    /// Fetches that hit a full intake buffer
    pub saturations: u64,
    /// EXECUTE verdicts for the `ip_verbose` target flow
    pub target_verdicts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_to: Option<PathBuf>,
}

/// State owned by one run.
struct Session {
    config: AnalyzerConfig,
    intake: IntakeBuffer,
    flows: FlowTable,
    fetcher: Fetcher,
    extractor: SpectralExtractor,
    controller: ModeController,
    recorder: ResultRecorder,
    meter: Throughput,
    ip_target: Option<u32>,
    target_verdicts: usize,
}

pub struct AnalyzerWorker {
    core_id: u32,
    config: Option<AnalyzerConfig>,
    trainer: Option<Arc<TrainerLink>>,
    sources: Vec<Arc<dyn MetadataSource>>,
    stop: StopHandle,
    session: Option<Session>,
    running: bool,
    summary: Option<RunSummary>,
}

impl AnalyzerWorker {
    pub fn new(core_id: u32) -> Self {
        Self {
            core_id,
            config: None,
            trainer: None,
            sources: Vec::new(),
            stop: StopHandle::default(),
            session: None,
            running: false,
            summary: None,
        }
    }

    pub fn core_id(&self) -> u32 {
        self.core_id
    }

    pub fn config(&self) -> Option<&AnalyzerConfig> {
        self.config.as_ref()
    }

    /// Validate and install a configuration. A worker is configured once.
    pub fn configure(&mut self, mut config: AnalyzerConfig) -> Result<(), ConfigError> {
        if self.config.is_some() {
            warn!(core = self.core_id, "analyzer configuration overlap");
            return Err(ConfigError::AlreadyConfigured);
        }
        config.validate()?;
        self.config = Some(config);
        Ok(())
    }

    /// Parse, validate and install. On failure the worker stays unconfigured.
    pub fn configure_via_json(&mut self, value: &Value) -> Result<(), ConfigError> {
        if self.config.is_some() {
            warn!(core = self.core_id, "analyzer configuration overlap");
            return Err(ConfigError::AlreadyConfigured);
        }
        let config = AnalyzerConfig::from_json(value)?;
        self.configure(config)
    }

    pub fn bind_trainer(&mut self, trainer: Arc<TrainerLink>) {
        self.trainer = Some(trainer);
    }

    pub fn register_source(&mut self, source: Arc<dyn MetadataSource>) {
        self.sources.push(source);
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Request a stop; takes effect at the next loop iteration.
    pub fn stop(&self) {
        self.stop.stop();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn mode(&self) -> Option<Mode> {
        self.session.as_ref().map(|s| s.controller.mode())
    }

    /// Flows held by the aggregator, eligible or not.
    pub fn pending_flows(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.flows.len())
    }

    pub fn flow_len(&self, address: u32) -> Option<usize> {
        self.session.as_ref()?.flows.flow_len(address)
    }

    pub fn results(&self) -> Option<&ResultRecorder> {
        self.session.as_ref().map(|s| &s.recorder)
    }

    pub fn summary(&self) -> Option<&RunSummary> {
        self.summary.as_ref()
    }

    /// Check preconditions and allocate buffers. Nothing is allocated on failure.
    ///
    /// A worker runs once: starting it again while running or after `finish`
    /// is refused, so held flows, results and the adopted mode are never reset.
    pub fn start(&mut self) -> Result<(), StartupError> {
        let session = self.open_session()?;
        self.session = Some(session);
        self.running = true;
        Ok(())
    }

    fn open_session(&self) -> Result<Session, StartupError> {
        if self.running {
            warn!(core = self.core_id, "analyzer already running");
            return Err(StartupError::AlreadyRunning);
        }
        if self.session.is_some() {
            warn!(core = self.core_id, "analyzer already finished");
            return Err(StartupError::AlreadyFinished);
        }
        let Some(config) = self.config.as_ref() else {
            warn!(core = self.core_id, "no analyzer config found");
            return Err(StartupError::MissingConfig);
        };
        let Some(trainer) = self.trainer.clone() else {
            warn!(core = self.core_id, "no learner bound");
            return Err(StartupError::MissingTrainer);
        };
        if self.sources.is_empty() {
            warn!(core = self.core_id, "no parser bound");
            return Err(StartupError::NoSources);
        }
        if trainer.feature_dim() != config.feature_dim() {
            warn!(core = self.core_id, "trainer feature dimension mismatch");
            return Err(StartupError::FeatureDim {
                expected: config.feature_dim(),
                got: trainer.feature_dim(),
            });
        }

        let intake = IntakeBuffer::allocate(config.intake_buffer_size).inspect_err(|e| {
            warn!(core = self.core_id, error = %e, "intake allocation failed");
        })?;
        let recorder = ResultRecorder::allocate(config.result_buffer_size).inspect_err(|e| {
            warn!(core = self.core_id, error = %e, "result allocation failed");
        })?;

        if config.init_verbose {
            info!(core = self.core_id, sources = self.sources.len(), "analyzer start");
        }
        Ok(Session {
            config: config.clone(),
            intake,
            flows: FlowTable::new(config.min_window()),
            fetcher: Fetcher::new(self.core_id, config.max_fetch, config.min_fetch),
            extractor: SpectralExtractor::new(config.n_fft),
            controller: ModeController::new(self.core_id, config, trainer),
            recorder,
            meter: Throughput::new(),
            ip_target: config.ip_target().map(u32::from),
            target_verdicts: 0,
        })
    }

    /// Start, poll until a stop is requested, then finish.
    pub fn run(&mut self) -> Result<RunSummary, StartupError> {
        let mut session = self.open_session()?;
        self.running = true;
        let pause = Duration::from_micros(session.config.pause_time);
        while !self.stop.is_stop_requested() {
            std::thread::sleep(pause);
            session.poll(self.core_id, &self.sources);
        }
        let summary = session.close(self.core_id);
        self.session = Some(session);
        Ok(self.conclude(summary))
    }

    /// One loop iteration without the pause: diagnostics, fetch, analyze.
    /// Returns the number of entries fetched.
    pub fn poll_once(&mut self) -> usize {
        if !self.running {
            return 0;
        }
        match self.session.as_mut() {
            Some(session) => session.poll(self.core_id, &self.sources),
            None => 0,
        }
    }

    /// Stop semantics: freeze the end time, fold counters, persist and report.
    /// Returns `None` when the worker was not running.
    pub fn finish(&mut self) -> Option<RunSummary> {
        if !self.running {
            return None;
        }
        let summary = self.session.as_mut()?.close(self.core_id);
        Some(self.conclude(summary))
    }

    fn conclude(&mut self, summary: RunSummary) -> RunSummary {
        self.running = false;
        self.summary = Some(summary.clone());
        self.stop.clear();
        summary
    }

    /// Lifetime rate of the last run. Zero while still running.
    pub fn overall_performance(&self) -> Rate {
        if self.running {
            warn!(core = self.core_id, "analysis not finished, do not collect result");
            return Rate::default();
        }
        self.summary
            .as_ref()
            .map(|s| Rate {
                mpps: s.mpps,
                gbps: s.gbps,
            })
            .unwrap_or_default()
    }
}

impl Session {
    fn poll(&mut self, core_id: u32, sources: &[Arc<dyn MetadataSource>]) -> usize {
        if self.meter.interval_elapsed().as_secs_f64() > self.config.verbose_interval {
            let training = self.controller.is_train();
            let rate = self.meter.roll(!training);
            if self.config.speed_verbose && !training {
                info!(
                    core = core_id,
                    mpps = rate.mpps,
                    gbps = rate.gbps,
                    "analyzer throughput"
                );
            }
        }

        let fetched = self.fetcher.fetch_all(sources, &mut self.intake);
        if fetched == 0 {
            return 0;
        }

        self.analyze(core_id);
        self.meter.add_packets(fetched);
        fetched
    }

    /// Aggregate the intake buffer and process eligible flows. In TRAIN only the
    /// first eligible flow is handled, followed by the training pause.
    fn analyze(&mut self, core_id: u32) {
        let pass = self.flows.aggregate(&mut self.intake);
        self.meter.add_bytes(pass.bytes);
        debug!(core = core_id, pass_len = pass.packets, flows = self.flows.len(), "aggregated");

        for address in self.flows.eligible() {
            let Some(window) = self.flows.take(address) else {
                continue;
            };
            let frames = self.extractor.extract(&window.packets);

            if self.controller.is_train() {
                self.controller.submit(&frames, pass.packets);
                if self.controller.poll_transition() {
                    self.meter.restart_analysis();
                }
                if self.config.train_pause_time > 0 {
                    std::thread::sleep(Duration::from_micros(self.config.train_pause_time));
                }
                return;
            }

            let distance = self
                .controller
                .classify(&frames)
                .unwrap_or(self.config.max_cluster_dist);

            if self.ip_target == Some(address) {
                self.target_verdicts += 1;
                info!(
                    core = core_id,
                    address = %window.ipv4(),
                    packets = window.len(),
                    distance,
                    "target flow verdict"
                );
            }

            self.recorder.record(FlowRecord {
                address,
                distance,
                packet_count: window.len(),
            });
        }
    }

    /// Fold the counters, persist if asked and build the run's summary.
    fn close(&mut self, core_id: u32) -> RunSummary {
        let ended_at = Utc::now();
        let (packets, bytes, runtime_secs) = self.meter.finish();
        let rate = Rate::over(packets, bytes, runtime_secs);

        let mut saved_to = None;
        if self.config.save_to_file {
            let path = self.config.result_path(core_id);
            match self.recorder.save_json(&path) {
                Ok(()) => {
                    info!(core = core_id, path = %path.display(), "saved results");
                    saved_to = Some(path);
                }
                Err(e) => {
                    warn!(
                        core = core_id,
                        path = %path.display(),
                        error = %e,
                        "failed to save results"
                    );
                }
            }
        }

        info!(
            core = core_id,
            runtime_secs,
            mpps = rate.mpps,
            gbps = rate.gbps,
            "analyzer stop"
        );

        RunSummary {
            core_id,
            started_at: self.meter.started_at(),
            ended_at,
            runtime_secs,
            packets,
            bytes,
            mpps: rate.mpps,
            gbps: rate.gbps,
            records: self.recorder.total(),
            saturations: self.intake.saturations(),
            target_verdicts: self.target_verdicts,
            saved_to,
        }
    }
}
