//! Sample statistics: HTTP timing aggregation and continuous-monitoring summaries.

use serde::{Deserialize, Serialize};

use super::types::*;

/// Latency spread (max − min) under which a monitoring run counts as stable.
pub const STABLE_VARIABILITY_MS: Millis = 20.0;

/// min/max/avg/median over a slice of values. `None` when empty or when no
/// value is finite. The median is the upper middle element (`sorted[n / 2]`).
pub fn phase_stat(values: &[f64]) -> Option<PhaseStat> {
    let mut valid: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if valid.is_empty() {
        return None;
    }
    valid.sort_by(f64::total_cmp);

    let n = valid.len();
    Some(PhaseStat {
        min: valid[0],
        max: valid[n - 1],
        avg: valid.iter().sum::<f64>() / n as f64,
        median: valid[n / 2],
    })
}

/// Aggregate curl samples into per-phase statistics.
///
/// Only successful samples contribute timings. Status code and remote IP come
/// from the first successful sample.
pub fn http_statistics(samples: &[HttpSample]) -> HttpStatistics {
    let successful: Vec<&HttpSample> = samples.iter().filter(|s| s.success).collect();

    let mut stats = HttpStatistics {
        samples: samples.len(),
        success_rate: if samples.is_empty() {
            0.0
        } else {
            successful.len() as f64 / samples.len() as f64
        },
        ..HttpStatistics::default()
    };

    if successful.is_empty() {
        log::debug!("No successful HTTP samples out of {}", samples.len());
        return stats;
    }

    let collect = |f: &dyn Fn(&HttpPhaseTimings) -> f64| -> Vec<f64> {
        successful.iter().map(|s| f(&s.timings)).collect()
    };
    let totals: Vec<f64> = successful.iter().filter_map(|s| s.timings.total_ms).collect();

    stats.total = phase_stat(&totals);
    stats.dns_lookup = phase_stat(&collect(&|t| t.dns_lookup_ms));
    stats.tcp_handshake = phase_stat(&collect(&|t| t.tcp_handshake_ms));
    stats.tls_handshake = phase_stat(&collect(&|t| t.tls_handshake_ms));
    stats.server_processing = phase_stat(&collect(&|t| t.server_processing_ms));
    stats.content_download = phase_stat(&collect(&|t| t.content_download_ms));
    stats.status_code = successful[0].status_code;
    stats.remote_ip = successful[0].remote_ip.clone();

    stats
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitoringStatus {
    Completed,
    NoData,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stability {
    Stable,
    Variable,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyTrend {
    pub min: Millis,
    pub max: Millis,
    pub avg: Millis,
    pub median: Millis,
    /// max − min
    pub variability: Millis,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LossTrend {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

/// Summary of a continuous-monitoring run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringSummary {
    pub status: MonitoringStatus,
    pub total_iterations: usize,
    pub successful_iterations: usize,
    pub latency: Option<LatencyTrend>,
    pub packet_loss: Option<LossTrend>,
    pub stability: Option<Stability>,
}

/// Summarise repeated pings. Failed iterations are `None`; an iteration with
/// no average latency also counts as failed.
pub fn summarize_monitoring(iterations: &[Option<PingResult>]) -> MonitoringSummary {
    let successful: Vec<&PingResult> = iterations
        .iter()
        .flatten()
        .filter(|p| p.avg_ms.is_some_and(f64::is_finite))
        .collect();

    let latencies: Vec<f64> = successful.iter().filter_map(|p| p.avg_ms).collect();
    let losses: Vec<f64> = successful.iter().map(|p| p.loss_pct()).collect();

    let (latency, loss) = match (phase_stat(&latencies), phase_stat(&losses)) {
        (Some(latency), Some(loss)) => (latency, loss),
        _ => {
            return MonitoringSummary {
                status: MonitoringStatus::NoData,
                total_iterations: iterations.len(),
                successful_iterations: 0,
                latency: None,
                packet_loss: None,
                stability: None,
            };
        }
    };

    let variability = latency.max - latency.min;
    let stability = if variability < STABLE_VARIABILITY_MS {
        Stability::Stable
    } else {
        Stability::Variable
    };

    MonitoringSummary {
        status: MonitoringStatus::Completed,
        total_iterations: iterations.len(),
        successful_iterations: successful.len(),
        latency: Some(LatencyTrend {
            min: latency.min,
            max: latency.max,
            avg: latency.avg,
            median: latency.median,
            variability,
        }),
        packet_loss: Some(LossTrend {
            min: loss.min,
            max: loss.max,
            avg: loss.avg,
        }),
        stability: Some(stability),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(total: f64, tls: f64) -> HttpSample {
        HttpSample {
            success: true,
            status_code: Some(200),
            timings: HttpPhaseTimings {
                dns_lookup_ms: 2.0,
                tcp_handshake_ms: 10.0,
                tls_handshake_ms: tls,
                server_processing_ms: 30.0,
                content_download_ms: total - 42.0 - tls,
                total_ms: Some(total),
            },
            size_bytes: 1256,
            speed_bps: 9000,
            remote_ip: Some("93.184.216.34".into()),
        }
    }

    #[test]
    fn test_phase_stat_median_is_upper_middle() {
        let stat = phase_stat(&[4.0, 1.0, 3.0, 2.0]).unwrap();
        assert_eq!(stat.min, 1.0);
        assert_eq!(stat.max, 4.0);
        assert_eq!(stat.avg, 2.5);
        assert_eq!(stat.median, 3.0);
        assert!(phase_stat(&[]).is_none());
    }

    #[test]
    fn test_http_statistics() {
        let mut failed = sample(0.0, 0.0);
        failed.success = false;
        failed.status_code = None;
        let samples = vec![failed, sample(100.0, 20.0), sample(140.0, 30.0)];

        let stats = http_statistics(&samples);
        assert_eq!(stats.samples, 3);
        assert!((stats.success_rate - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(stats.total.unwrap().avg, 120.0);
        assert_eq!(stats.tls_handshake.unwrap().max, 30.0);
        assert_eq!(stats.status_code, Some(200));
        assert_eq!(stats.remote_ip.as_deref(), Some("93.184.216.34"));
    }

    #[test]
    fn test_http_statistics_empty() {
        let stats = http_statistics(&[]);
        assert_eq!(stats.success_rate, 0.0);
        assert!(stats.total.is_none());
        assert!(stats.dns_lookup.is_none());
    }

    fn ping(avg: f64, received: u32) -> Option<PingResult> {
        Some(PingResult {
            target: "10.1.0.5".into(),
            packets_sent: 10,
            packets_received: received,
            min_ms: Some(avg),
            avg_ms: Some(avg),
            max_ms: Some(avg),
            stddev_ms: Some(0.0),
        })
    }

    #[test]
    fn test_monitoring_summary() {
        let summary = summarize_monitoring(&[ping(10.0, 10), None, ping(14.0, 9), ping(12.0, 10)]);
        assert_eq!(summary.status, MonitoringStatus::Completed);
        assert_eq!(summary.total_iterations, 4);
        assert_eq!(summary.successful_iterations, 3);
        let latency = summary.latency.unwrap();
        assert_eq!(latency.variability, 4.0);
        assert_eq!(latency.median, 12.0);
        assert_eq!(summary.packet_loss.unwrap().max, 10.0);
        assert_eq!(summary.stability, Some(Stability::Stable));
    }

    #[test]
    fn test_monitoring_variable_and_no_data() {
        let summary = summarize_monitoring(&[ping(10.0, 10), ping(45.0, 10)]);
        assert_eq!(summary.stability, Some(Stability::Variable));

        let empty = summarize_monitoring(&[None, None]);
        assert_eq!(empty.status, MonitoringStatus::NoData);
        assert_eq!(empty.total_iterations, 2);
        assert!(empty.latency.is_none());
    }
}
