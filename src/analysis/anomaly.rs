//! Single-signal anomaly detectors: bufferbloat, conntrack exhaustion and
//! measurement sanity checks.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::*;
use crate::config::AnalysisConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferbloatLevel {
    None,
    Mild,
    Moderate,
    Severe,
}

impl fmt::Display for BufferbloatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BufferbloatLevel::None => write!(f, "none"),
            BufferbloatLevel::Mild => write!(f, "mild"),
            BufferbloatLevel::Moderate => write!(f, "moderate"),
            BufferbloatLevel::Severe => write!(f, "severe"),
        }
    }
}

/// Bufferbloat estimate from a ping run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferbloatAssessment {
    /// max/min RTT
    pub ratio: f64,
    pub level: BufferbloatLevel,
    /// stddev/avg × 100
    pub coefficient_variation_pct: Option<f64>,
    pub high_jitter: bool,
}

/// Classify bufferbloat by the max/min RTT ratio. `None` without a positive min.
pub fn detect_bufferbloat(ping: &PingResult, config: &AnalysisConfig) -> Option<BufferbloatAssessment> {
    let min = ping.min_ms.filter(|v| *v > 0.0)?;
    let max = ping.max_ms?;
    let ratio = max / min;

    let thresholds = &config.bufferbloat;
    let level = if ratio > thresholds.severe_ratio {
        BufferbloatLevel::Severe
    } else if ratio > thresholds.moderate_ratio {
        BufferbloatLevel::Moderate
    } else if ratio > thresholds.mild_ratio {
        BufferbloatLevel::Mild
    } else {
        BufferbloatLevel::None
    };

    let coefficient_variation_pct = match (ping.stddev_ms, ping.avg_ms) {
        (Some(stddev), Some(avg)) if avg > 0.0 => Some(stddev / avg * 100.0),
        _ => None,
    };
    let high_jitter = coefficient_variation_pct
        .map(|cv| cv > config.jitter_cv_alert_pct)
        .unwrap_or(false);

    Some(BufferbloatAssessment {
        ratio,
        level,
        coefficient_variation_pct,
        high_jitter,
    })
}

/// Conntrack usage, or `None` when the table size is unknown.
pub fn conntrack_usage_pct(snapshot: &ConntrackSnapshot) -> Option<f64> {
    if snapshot.max == 0 {
        None
    } else {
        Some(ratio_pct(snapshot.count, snapshot.max))
    }
}

/// ok below the warning threshold, medium above it, high above critical.
pub fn grade_conntrack(snapshot: &ConntrackSnapshot, config: &AnalysisConfig) -> Option<Severity> {
    let usage = conntrack_usage_pct(snapshot)?;
    Some(if usage > config.conntrack_critical_pct {
        Severity::High
    } else if usage > config.conntrack_warning_pct {
        Severity::Medium
    } else {
        Severity::Ok
    })
}

/// Anomaly insights, appended after the cross-layer rules.
pub fn detect_anomalies(measurements: &Measurements, config: &AnalysisConfig) -> Vec<Insight> {
    let mut insights = Vec::new();

    if let Some(ping) = &measurements.ping {
        if let Some(bloat) = detect_bufferbloat(ping, config) {
            let severity = match bloat.level {
                BufferbloatLevel::Severe => Some(Severity::High),
                BufferbloatLevel::Moderate => Some(Severity::Medium),
                BufferbloatLevel::Mild => Some(Severity::Low),
                BufferbloatLevel::None => None,
            };
            if let Some(severity) = severity {
                insights.push(Insight::new(
                    severity,
                    LayerLink::L3,
                    format!(
                        "Bufferbloat detected: {} (max/min={:.1}x)",
                        bloat.level, bloat.ratio
                    ),
                ));
            }
            if let Some(cv) = bloat.coefficient_variation_pct.filter(|_| bloat.high_jitter) {
                insights.push(Insight::new(
                    Severity::Medium,
                    LayerLink::L3,
                    format!("High jitter (CV={:.1}%)", cv),
                ));
            }
        }
    }

    if let Some(snapshot) = &measurements.conntrack {
        if let (Some(severity), Some(usage)) =
            (grade_conntrack(snapshot, config), conntrack_usage_pct(snapshot))
        {
            match severity {
                Severity::High => insights.push(Insight::new(
                    Severity::High,
                    LayerLink::L4,
                    format!("Conntrack table {:.1}% full - likely causing packet drops", usage),
                )),
                Severity::Medium => insights.push(Insight::new(
                    Severity::Medium,
                    LayerLink::L4,
                    format!("Conntrack table {:.1}% full", usage),
                )),
                _ => {}
            }
        }
    }

    insights.extend(check_measurement_sanity(measurements, config));
    insights
}

/// Report records that violate their own invariants. Never fatal.
pub fn check_measurement_sanity(measurements: &Measurements, config: &AnalysisConfig) -> Vec<Insight> {
    let mut insights = Vec::new();

    if let Some(ping) = &measurements.ping {
        if ping.packets_received > ping.packets_sent {
            log::warn!(
                "Ping to {} reports {} received of {} sent, clamping",
                ping.target,
                ping.packets_received,
                ping.packets_sent
            );
            insights.push(Insight::new(
                Severity::Low,
                LayerLink::L3,
                format!(
                    "Ping reported more replies ({}) than requests ({})",
                    ping.packets_received, ping.packets_sent
                ),
            ));
        }
    }

    if let Some(hops) = &measurements.mtr {
        let inconsistent: Vec<String> = hops
            .iter()
            .filter(|h| h.has_inconsistent_stats())
            .map(|h| h.hop.to_string())
            .collect();
        if !inconsistent.is_empty() {
            insights.push(Insight::new(
                Severity::Low,
                LayerLink::L3,
                format!(
                    "MTR hop(s) {} report avg latency outside best/worst range",
                    inconsistent.join(", ")
                ),
            ));
        }
    }

    if let Some(http) = &measurements.http {
        let timings = http.avg_timings();
        if let Some(deviation) = timings.sum_deviation_pct() {
            if deviation > config.phase_sum_tolerance_pct {
                insights.push(Insight::new(
                    Severity::Low,
                    LayerLink::L7,
                    format!(
                        "HTTP phase timings sum to {:.1}ms but total is {:.1}ms ({:.1}% off)",
                        timings.phase_sum(),
                        timings.total_ms.unwrap_or(0.0),
                        deviation
                    ),
                ));
            }
        }
    }

    insights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping(min: f64, avg: f64, max: f64, stddev: f64) -> PingResult {
        PingResult {
            target: "203.0.113.10".into(),
            packets_sent: 50,
            packets_received: 50,
            min_ms: Some(min),
            avg_ms: Some(avg),
            max_ms: Some(max),
            stddev_ms: Some(stddev),
        }
    }

    #[test]
    fn test_bufferbloat_levels() {
        let config = AnalysisConfig::default();
        let level = |max| detect_bufferbloat(&ping(2.0, 3.0, max, 0.5), &config).unwrap().level;
        assert_eq!(level(8.0), BufferbloatLevel::None);
        assert_eq!(level(12.0), BufferbloatLevel::Mild);
        assert_eq!(level(30.0), BufferbloatLevel::Moderate);
        assert_eq!(level(50.0), BufferbloatLevel::Severe);
    }

    #[test]
    fn test_bufferbloat_needs_positive_min() {
        let config = AnalysisConfig::default();
        assert!(detect_bufferbloat(&ping(0.0, 3.0, 10.0, 1.0), &config).is_none());
    }

    #[test]
    fn test_high_jitter_cv() {
        let config = AnalysisConfig::default();
        let assessment = detect_bufferbloat(&ping(10.0, 20.0, 40.0, 15.0), &config).unwrap();
        assert!(assessment.high_jitter);
        assert!((assessment.coefficient_variation_pct.unwrap() - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_conntrack_grading() {
        let config = AnalysisConfig::default();
        let grade = |count| grade_conntrack(&ConntrackSnapshot { count, max: 1000 }, &config);
        assert_eq!(grade(500), Some(Severity::Ok));
        assert_eq!(grade(800), Some(Severity::Medium));
        assert_eq!(grade(950), Some(Severity::High));
        assert_eq!(grade_conntrack(&ConntrackSnapshot { count: 5, max: 0 }, &config), None);
    }

    #[test]
    fn test_anomaly_order() {
        let measurements = Measurements {
            ping: Some(ping(1.0, 5.0, 40.0, 1.0)),
            conntrack: Some(ConntrackSnapshot { count: 95, max: 100 }),
            ..Measurements::default()
        };
        let insights = detect_anomalies(&measurements, &AnalysisConfig::default());
        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0].layers, LayerLink::L3);
        assert_eq!(insights[0].message, "Bufferbloat detected: severe (max/min=40.0x)");
        assert_eq!(insights[1].severity, Severity::High);
        assert!(insights[1].message.contains("95.0%"));
    }

    #[test]
    fn test_sanity_flags_phase_sum_mismatch() {
        let stat = |avg| Some(PhaseStat { min: avg, max: avg, avg, median: avg });
        let http = HttpStatistics {
            samples: 1,
            success_rate: 1.0,
            total: stat(200.0),
            dns_lookup: stat(5.0),
            tcp_handshake: stat(10.0),
            tls_handshake: stat(15.0),
            server_processing: stat(20.0),
            content_download: stat(50.0),
            ..HttpStatistics::default()
        };
        let measurements = Measurements {
            http: Some(http),
            ..Measurements::default()
        };
        let insights = check_measurement_sanity(&measurements, &AnalysisConfig::default());
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].layers, LayerLink::L7);
    }

    #[test]
    fn test_sanity_flags_received_above_sent() {
        let mut bad = ping(1.0, 2.0, 3.0, 0.1);
        bad.packets_received = 60;
        let measurements = Measurements {
            ping: Some(bad),
            ..Measurements::default()
        };
        let insights = check_measurement_sanity(&measurements, &AnalysisConfig::default());
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].severity, Severity::Low);
    }
}
