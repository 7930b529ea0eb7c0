//! Path-to-transport correlation and MTR path summaries.
//!
//! Compares the round trip the MTR path predicts (last hop avg × 2) with the
//! TCP handshake time actually observed, and summarises hop-level problems.

use super::types::*;
use crate::config::AnalysisConfig;

/// Default significance threshold for a contributing hop.
pub const SIGNIFICANT_HOP_LATENCY_MS: Millis = 5.0;

/// Correlate MTR hop latencies with an observed TCP handshake time.
///
/// `significant_hop_ms` selects which hops are reported as contributing
/// (strictly greater than), in original hop order. Without an observed
/// handshake the prediction and contributing hops are still reported, with
/// status `no_tcp_data` and zero variance.
pub fn correlate_mtr_to_tcp(
    hops: &[MtrHop],
    tcp_handshake_ms: Option<Millis>,
    significant_hop_ms: Millis,
) -> PathTransportCorrelation {
    let observed = tcp_handshake_ms.filter(|v| v.is_finite()).map(|v| v.max(0.0));
    let actual = observed.unwrap_or(0.0);

    let last_hop = match hops.last() {
        Some(hop) => hop,
        None => {
            return PathTransportCorrelation {
                status: CorrelationStatus::NoMtrData,
                mtr_predicted_rtt_ms: 0.0,
                tcp_actual_rtt_ms: actual,
                variance_ms: 0.0,
                variance_pct: 0.0,
                contributing_hops: Vec::new(),
            };
        }
    };

    let predicted = last_hop.avg() * 2.0;
    let contributing_hops = hops
        .iter()
        .filter(|hop| hop.avg() > significant_hop_ms)
        .map(|hop| ContributingHop {
            hop_number: hop.hop,
            host: hop.host.clone(),
            latency_ms: hop.avg(),
            loss_pct: hop.loss_pct,
        })
        .collect();

    let actual = match observed {
        Some(actual) => actual,
        None => {
            log::debug!("No TCP handshake time observed, skipping path variance");
            return PathTransportCorrelation {
                status: CorrelationStatus::NoTcpData,
                mtr_predicted_rtt_ms: predicted,
                tcp_actual_rtt_ms: 0.0,
                variance_ms: 0.0,
                variance_pct: 0.0,
                contributing_hops,
            };
        }
    };

    let variance_ms = actual - predicted;
    let variance_pct = if predicted > 0.0 {
        variance_ms / predicted * 100.0
    } else {
        0.0
    };

    PathTransportCorrelation {
        status: CorrelationStatus::Success,
        mtr_predicted_rtt_ms: predicted,
        tcp_actual_rtt_ms: actual,
        variance_ms,
        variance_pct,
        contributing_hops,
    }
}

/// Summarise an MTR hop list: problem hops and an overall path quality.
pub fn summarize_path(hops: &[MtrHop], config: &AnalysisConfig) -> PathSummary {
    let mut problematic_hops = Vec::new();
    let mut previous: Option<&MtrHop> = None;

    for hop in hops {
        if hop.loss_pct > config.hop_loss_alert_pct {
            problematic_hops.push(ProblematicHop {
                hop: hop.hop,
                host: hop.host.clone(),
                issue: HopIssue::HighPacketLoss,
                value: hop.loss_pct,
            });
        }

        // Compare with the previous hop in sequence, not by hop number, so gaps are harmless
        if let Some(prev) = previous {
            let increase = hop.avg() - prev.avg();
            if increase > config.latency_spike_ms {
                problematic_hops.push(ProblematicHop {
                    hop: hop.hop,
                    host: hop.host.clone(),
                    issue: HopIssue::LatencySpike,
                    value: increase,
                });
            }
        }

        if hop.has_inconsistent_stats() {
            log::warn!(
                "MTR hop {} ({}) reports avg outside best/worst range",
                hop.hop,
                hop.host
            );
            problematic_hops.push(ProblematicHop {
                hop: hop.hop,
                host: hop.host.clone(),
                issue: HopIssue::InconsistentStats,
                value: hop.avg(),
            });
        }

        previous = Some(hop);
    }

    let max_hop_latency_ms = hops.iter().map(MtrHop::avg).fold(0.0, f64::max);

    PathSummary {
        hop_count: hops.len(),
        final_hop: hops.last().cloned(),
        max_hop_latency_ms,
        problematic_hops,
        path_quality: assess_path_quality(hops),
    }
}

/// Overall path quality from loss on any hop and the final hop's latency.
pub fn assess_path_quality(hops: &[MtrHop]) -> PathQuality {
    let final_hop = match hops.last() {
        Some(hop) => hop,
        None => return PathQuality::Unknown,
    };

    let max_loss = hops.iter().map(|h| h.loss_pct).fold(0.0, f64::max);
    let final_stddev = final_hop.stddev_ms.unwrap_or(0.0);
    let final_avg = final_hop.avg();

    if max_loss > 10.0 {
        PathQuality::Poor
    } else if max_loss > 5.0 {
        PathQuality::Fair
    } else if final_stddev > 10.0 {
        PathQuality::Unstable
    } else if final_avg < 20.0 {
        PathQuality::Excellent
    } else if final_avg < 50.0 {
        PathQuality::Good
    } else {
        PathQuality::Acceptable
    }
}
