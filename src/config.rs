//! Configuration for the analysis engine and the probe orchestration around it.
//!
//! Every field has a default, so a YAML file only needs to name the values it
//! overrides:
//!
//! ```yaml
//! analysis:
//!   significant_hop_latency_ms: 8.0
//! orchestration:
//!   ping_count: 50
//!   unit_timeout: "3m"
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level configuration structure that mirrors the YAML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub analysis: AnalysisConfig,
    pub orchestration: OrchestrationConfig,
}

/// Thresholds used by the analysis engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Hops with avg latency above this contribute to path latency
    pub significant_hop_latency_ms: f64,
    /// Allowed |phase sum − total| as % of total before flagging
    pub phase_sum_tolerance_pct: f64,
    /// Observed handshake over MTR prediction, as %, before flagging
    pub path_variance_alert_pct: f64,
    pub bufferbloat: BufferbloatThresholds,
    /// stddev/avg × 100 above which jitter is called out
    pub jitter_cv_alert_pct: f64,
    pub conntrack_warning_pct: f64,
    pub conntrack_critical_pct: f64,
    pub retransmission_moderate_pct: f64,
    pub retransmission_high_pct: f64,
    /// Duplicate ACKs as a fraction of all packets
    pub duplicate_ack_ratio: f64,
    pub sack_rate_alert_pct: f64,
    pub hop_loss_alert_pct: f64,
    /// Avg increase over the previous hop that counts as a spike
    pub latency_spike_ms: f64,
}

/// max/min RTT ratios for bufferbloat classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferbloatThresholds {
    pub mild_ratio: f64,
    pub moderate_ratio: f64,
    pub severe_ratio: f64,
}

/// How a diagnostic unit drives the external collaborators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestrationConfig {
    pub ping_count: u32,
    pub mtr_cycles: u32,
    pub http_samples: u32,
    pub capture_packets: bool,
    pub max_capture_packets: u32,
    /// Extra attempts per failed step
    pub retries: u32,
    /// Budget for one (host, target) unit; checked at step boundaries
    #[serde(with = "humantime_serde")]
    pub unit_timeout: Duration,
    pub monitoring_iterations: u32,
    #[serde(with = "humantime_serde")]
    pub monitoring_interval: Duration,
    /// Worker threads for parallel units (0 = rayon default)
    pub threads: usize,
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid analysis configuration: {0}")]
    InvalidAnalysis(String),
    #[error("Invalid orchestration configuration: {0}")]
    InvalidOrchestration(String),
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            significant_hop_latency_ms: 5.0,
            phase_sum_tolerance_pct: 10.0,
            path_variance_alert_pct: 50.0,
            bufferbloat: BufferbloatThresholds::default(),
            jitter_cv_alert_pct: 50.0,
            conntrack_warning_pct: 75.0,
            conntrack_critical_pct: 90.0,
            retransmission_moderate_pct: 1.0,
            retransmission_high_pct: 5.0,
            duplicate_ack_ratio: 0.1,
            sack_rate_alert_pct: 5.0,
            hop_loss_alert_pct: 5.0,
            latency_spike_ms: 20.0,
        }
    }
}

impl Default for BufferbloatThresholds {
    fn default() -> Self {
        Self {
            mild_ratio: 5.0,
            moderate_ratio: 10.0,
            severe_ratio: 20.0,
        }
    }
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            ping_count: 20,
            mtr_cycles: 10,
            http_samples: 5,
            capture_packets: true,
            max_capture_packets: 2000,
            retries: 0,
            unit_timeout: Duration::from_secs(300),
            monitoring_iterations: 60,
            monitoring_interval: Duration::from_secs(60),
            threads: 0,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.analysis.validate()?;
        self.orchestration.validate()
    }
}

impl AnalysisConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_negative = [
            ("significant_hop_latency_ms", self.significant_hop_latency_ms),
            ("phase_sum_tolerance_pct", self.phase_sum_tolerance_pct),
            ("path_variance_alert_pct", self.path_variance_alert_pct),
            ("jitter_cv_alert_pct", self.jitter_cv_alert_pct),
            ("retransmission_moderate_pct", self.retransmission_moderate_pct),
            ("retransmission_high_pct", self.retransmission_high_pct),
            ("duplicate_ack_ratio", self.duplicate_ack_ratio),
            ("sack_rate_alert_pct", self.sack_rate_alert_pct),
            ("hop_loss_alert_pct", self.hop_loss_alert_pct),
            ("latency_spike_ms", self.latency_spike_ms),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(ConfigError::InvalidAnalysis(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }

        if self.retransmission_moderate_pct > self.retransmission_high_pct {
            return Err(ConfigError::InvalidAnalysis(
                "retransmission_moderate_pct must not exceed retransmission_high_pct".to_string(),
            ));
        }
        if self.conntrack_warning_pct > self.conntrack_critical_pct {
            return Err(ConfigError::InvalidAnalysis(
                "conntrack_warning_pct must not exceed conntrack_critical_pct".to_string(),
            ));
        }
        let bb = &self.bufferbloat;
        if !(bb.mild_ratio <= bb.moderate_ratio && bb.moderate_ratio <= bb.severe_ratio) {
            return Err(ConfigError::InvalidAnalysis(
                "bufferbloat ratios must satisfy mild <= moderate <= severe".to_string(),
            ));
        }
        Ok(())
    }
}

impl OrchestrationConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ping_count == 0 {
            return Err(ConfigError::InvalidOrchestration(
                "ping_count must be at least 1".to_string(),
            ));
        }
        if self.http_samples == 0 {
            return Err(ConfigError::InvalidOrchestration(
                "http_samples must be at least 1".to_string(),
            ));
        }
        if self.unit_timeout.is_zero() {
            return Err(ConfigError::InvalidOrchestration(
                "unit_timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
