//! Diagnostic unit orchestration.
//!
//! A diagnostic unit is the full measurement sequence for one (host, target)
//! pair: capture start → ping → MTR → HTTP → capture stop → analysis. Steps
//! within a unit run strictly in order; separate units share nothing and are
//! run in parallel with rayon. Running the tools themselves (SSH, subprocesses)
//! is the job of a [`MeasurementSource`] implementation.

use std::time::{Duration, Instant};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::{analyze_layers, http_statistics, summarize_monitoring, MonitoringSummary};
use crate::analysis::types::*;
use crate::config::Config;
use crate::ingest::{Capture, IngestError};

/// A measurement step that failed.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Command failed on {host}: {message}")]
    CommandFailed { host: String, message: String },
    #[error("{tool} is not available on {host}")]
    ToolUnavailable { host: String, tool: String },
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
    #[error("Could not parse tool output: {0}")]
    Parse(#[from] IngestError),
}

/// Opaque handle for a running packet capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureHandle(pub String);

/// Runs the network tools for a probe host.
///
/// Implementations must be usable from several worker threads at once; each
/// call should be independent.
pub trait MeasurementSource: Sync {
    fn ping(&self, host: &Host, target: &Target, count: u32) -> Result<PingResult, ProbeError>;

    fn mtr(&self, host: &Host, target: &Target, cycles: u32) -> Result<Vec<MtrHop>, ProbeError>;

    /// One timed HTTP request.
    fn http(&self, host: &Host, url: &str) -> Result<HttpSample, ProbeError>;

    fn start_capture(
        &self,
        host: &Host,
        target: &Target,
        max_packets: u32,
    ) -> Result<CaptureHandle, ProbeError>;

    fn stop_capture(&self, host: &Host, handle: &CaptureHandle) -> Result<Capture, ProbeError>;

    /// Called instead of [`stop_capture`](Self::stop_capture) when a unit is abandoned.
    fn abort_capture(&self, _host: &Host, _handle: &CaptureHandle) {}

    /// Connection-tracking table snapshot, if the host exposes one.
    fn conntrack(&self, _host: &Host) -> Result<Option<ConntrackSnapshot>, ProbeError> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    StartCapture,
    Ping,
    Mtr,
    Http,
    StopCapture,
    Conntrack,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub step: Step,
    pub attempts: u32,
    pub error: String,
}

/// Everything a diagnostic unit produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitReport {
    pub host: Host,
    pub target: Target,
    pub measurements: Measurements,
    pub analysis: LayeredAnalysis,
    pub failures: Vec<StepFailure>,
    /// First step skipped because the unit ran out of time
    pub abandoned_at: Option<Step>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
}

/// Tracks the unit budget and records failures.
struct UnitRun {
    deadline: Instant,
    retries: u32,
    failures: Vec<StepFailure>,
    abandoned_at: Option<Step>,
}

impl UnitRun {
    /// False once the deadline has passed; records the step that was skipped.
    fn may_start(&mut self, step: Step) -> bool {
        if self.abandoned_at.is_some() {
            return false;
        }
        if Instant::now() >= self.deadline {
            log::warn!("Unit deadline reached, abandoning at {:?}", step);
            self.abandoned_at = Some(step);
            return false;
        }
        true
    }

    /// Run `f` with up to `retries` extra attempts. Failures become `None`.
    fn attempt<T>(&mut self, step: Step, mut f: impl FnMut() -> Result<T, ProbeError>) -> Option<T> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match f() {
                Ok(value) => return Some(value),
                Err(e) if attempts <= self.retries && Instant::now() < self.deadline => {
                    log::debug!("{:?} attempt {} failed, retrying: {}", step, attempts, e);
                }
                Err(e) => {
                    log::warn!("{:?} failed after {} attempt(s): {}", step, attempts, e);
                    self.failures.push(StepFailure {
                        step,
                        attempts,
                        error: e.to_string(),
                    });
                    return None;
                }
            }
        }
    }
}

/// Run one diagnostic unit and analyse whatever it managed to measure.
///
/// A step that still fails after its retries leaves its measurement missing.
/// The unit deadline is checked before each step; once it passes, the
/// remaining steps are skipped and the analysis runs on what was collected.
pub fn run_diagnostic_unit<S: MeasurementSource + ?Sized>(
    source: &S,
    host: &Host,
    target: &Target,
    config: &Config,
) -> UnitReport {
    let opts = &config.orchestration;
    let started = Instant::now();
    let mut run = UnitRun {
        deadline: started + opts.unit_timeout,
        retries: opts.retries,
        failures: Vec::new(),
        abandoned_at: None,
    };
    let mut measurements = Measurements::default();

    log::info!("Starting diagnostics {} -> {}", host.id, target.display_name());

    let mut capture = None;
    if opts.capture_packets && run.may_start(Step::StartCapture) {
        capture = run.attempt(Step::StartCapture, || {
            source.start_capture(host, target, opts.max_capture_packets)
        });
    }

    if run.may_start(Step::Ping) {
        measurements.ping = run.attempt(Step::Ping, || source.ping(host, target, opts.ping_count));
    }

    if run.may_start(Step::Mtr) {
        measurements.mtr = run.attempt(Step::Mtr, || source.mtr(host, target, opts.mtr_cycles));
    }

    if let Some(url) = &target.url {
        let mut samples = Vec::new();
        for _ in 0..opts.http_samples {
            if !run.may_start(Step::Http) {
                break;
            }
            if let Some(sample) = run.attempt(Step::Http, || source.http(host, url)) {
                samples.push(sample);
            }
        }
        if !samples.is_empty() {
            measurements.http = Some(http_statistics(&samples));
        }
    }

    if let Some(handle) = capture {
        if run.may_start(Step::StopCapture) {
            let stopped = run.attempt(Step::StopCapture, || source.stop_capture(host, &handle));
            if let Some(capture) = stopped {
                measurements.tcp_events = Some(capture.events);
                measurements.packets = Some(capture.summary);
            }
        } else {
            source.abort_capture(host, &handle);
        }
    }

    if run.may_start(Step::Conntrack) {
        measurements.conntrack = run.attempt(Step::Conntrack, || source.conntrack(host)).flatten();
    }

    let analysis = analyze_layers(host, target, &measurements, &config.analysis);

    UnitReport {
        host: host.clone(),
        target: target.clone(),
        measurements,
        analysis,
        failures: run.failures,
        abandoned_at: run.abandoned_at,
        elapsed: started.elapsed(),
    }
}

/// Run independent units in parallel. Results come back in input order, but
/// consumers should key them by (host id, target ip) rather than position.
pub fn run_diagnostic_units<S: MeasurementSource + ?Sized>(
    source: &S,
    pairs: &[(Host, Target)],
    config: &Config,
) -> Vec<UnitReport> {
    log::info!("Running {} diagnostic units", pairs.len());
    pairs
        .par_iter()
        .map(|(host, target)| run_diagnostic_unit(source, host, target, config))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringIteration {
    pub index: u32,
    pub ping: Option<PingResult>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringReport {
    pub host_id: String,
    pub target_ip: String,
    pub iterations: Vec<MonitoringIteration>,
    pub summary: MonitoringSummary,
}

/// Ping the target repeatedly, `monitoring_interval` apart, and summarise.
pub fn run_monitoring<S: MeasurementSource + ?Sized>(
    source: &S,
    host: &Host,
    target: &Target,
    config: &Config,
) -> MonitoringReport {
    let opts = &config.orchestration;
    let mut iterations = Vec::with_capacity(opts.monitoring_iterations as usize);

    for index in 0..opts.monitoring_iterations {
        let (ping, error) = match source.ping(host, target, opts.ping_count) {
            Ok(ping) => (Some(ping), None),
            Err(e) => {
                log::warn!("Monitoring iteration {} for {} failed: {}", index, target.ip, e);
                (None, Some(e.to_string()))
            }
        };
        iterations.push(MonitoringIteration { index, ping, error });

        if index + 1 < opts.monitoring_iterations && !opts.monitoring_interval.is_zero() {
            std::thread::sleep(opts.monitoring_interval);
        }
    }

    let pings: Vec<Option<PingResult>> = iterations.iter().map(|i| i.ping.clone()).collect();
    MonitoringReport {
        host_id: host.id.clone(),
        target_ip: target.ip.clone(),
        summary: summarize_monitoring(&pings),
        iterations,
    }
}
