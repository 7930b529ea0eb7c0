//! Layered L3 → L4 → L7 analysis.
//!
//! Each layer is graded independently from its own measurement record, the
//! two correlators run, and the cross-layer rules append insights in a fixed
//! order. Missing measurements make a layer `unknown`; an unknown layer is
//! left out of the overall grade and never counts as degraded.

use super::anomaly::detect_anomalies;
use super::grader::{grade_jitter, grade_latency, grade_packet_loss};
use super::packet::{detect_packet_issues, l4_quality};
use super::path::{correlate_mtr_to_tcp, summarize_path};
use super::phase::{correlate_tcp_to_http_phases, sanitize};
use super::types::*;
use crate::config::AnalysisConfig;

/// Phases checked by the per-phase retransmission rule, after TLS.
const OTHER_RETRANSMISSION_PHASES: [HttpPhase; 3] = [
    HttpPhase::TcpHandshake,
    HttpPhase::ServerProcessing,
    HttpPhase::ContentDownload,
];

/// L3: excellent with no loss under 20ms, good under 1% loss and 50ms, else degraded.
pub fn grade_l3(ping: Option<&PingResult>) -> Quality {
    let ping = match ping {
        Some(ping) => ping,
        None => return Quality::Unknown,
    };

    let loss = ping.loss_pct();
    // No average means no replies came back
    let avg = ping.avg_ms.filter(|v| v.is_finite()).unwrap_or(f64::INFINITY);

    if loss == 0.0 && avg < 20.0 {
        Quality::Excellent
    } else if loss < 1.0 && avg < 50.0 {
        Quality::Good
    } else {
        Quality::Degraded
    }
}

/// L4 from the capture's quality score.
pub fn grade_l4(packets: Option<&PacketSummary>) -> Quality {
    packets.map(l4_quality).unwrap_or(Quality::Unknown)
}

/// L7: excellent under 100ms average total, good under 500ms, else degraded.
///
/// Statistics without a total (every sample failed) grade as degraded.
pub fn grade_l7(http: Option<&HttpStatistics>) -> Quality {
    let http = match http {
        Some(http) => http,
        None => return Quality::Unknown,
    };

    let total = http
        .total
        .map(|t| t.avg)
        .filter(|v| v.is_finite())
        .unwrap_or(f64::INFINITY);

    if total < 100.0 {
        Quality::Excellent
    } else if total < 500.0 {
        Quality::Good
    } else {
        Quality::Degraded
    }
}

/// Coarse overall grade. First match wins:
/// 1. at least one known layer and every known layer excellent → A+
/// 2. any layer degraded → C
/// 3. otherwise → B (this includes all layers unknown)
///
/// Only A+, B and C are produced here; the finer A/D/F grades exist only in
/// the per-metric grader.
pub fn overall_grade(l3: Quality, l4: Quality, l7: Quality) -> Grade {
    let known: Vec<Quality> = [l3, l4, l7].into_iter().filter(|q| q.is_known()).collect();

    if !known.is_empty() && known.iter().all(|q| *q == Quality::Excellent) {
        Grade::APlus
    } else if known.contains(&Quality::Degraded) {
        Grade::C
    } else {
        Grade::B
    }
}

fn grade_summary(grade: Grade) -> &'static str {
    match grade {
        Grade::APlus => "Excellent performance across all layers",
        Grade::C => "Performance degraded at one or more layers",
        _ => "Good overall performance",
    }
}

fn icmp_summary(ping: &PingResult, distance: Option<DistanceClass>) -> IcmpSummary {
    let avg = ping.avg_ms.filter(|v| v.is_finite());
    let distance_class = distance.or_else(|| avg.map(DistanceClass::from_avg_latency));

    let (latency_grade, latency_severity) = match (avg, distance_class) {
        (Some(avg), Some(class)) => grade_latency(avg, class),
        _ => (Grade::Unknown, Severity::High),
    };

    let loss = ping.loss_pct();
    IcmpSummary {
        avg_ms: ping.avg_ms,
        min_ms: ping.min_ms,
        max_ms: ping.max_ms,
        jitter_ms: ping.jitter_range_ms(),
        packet_loss_pct: loss,
        distance_class,
        latency_grade,
        latency_severity,
        loss_severity: grade_packet_loss(loss),
        jitter_severity: ping.stddev_ms.map(grade_jitter),
    }
}

fn connection_metrics(packets: &PacketSummary) -> ConnectionMetrics {
    ConnectionMetrics {
        quality_score: packets.quality_score,
        total_packets: packets.total_packets,
        retransmissions: packets.retransmissions,
        duplicate_acks: packets.duplicate_acks,
        out_of_order: packets.out_of_order,
        retransmission_rate_pct: packets.retransmission_rate_pct(),
        connection_success_rate_pct: packets.connection_success_rate_pct(),
    }
}

/// Share of the total spent in each phase; `None` without a positive total.
///
/// Negative or non-finite phase values count as 0.
pub fn phase_breakdown(timings: &HttpPhaseTimings) -> Option<PhaseBreakdown> {
    let total = timings.total_ms.filter(|t| t.is_finite() && *t > 0.0)?;
    let pct = |v: Millis| sanitize(v) / total * 100.0;
    Some(PhaseBreakdown {
        dns_pct: pct(timings.dns_lookup_ms),
        tcp_pct: pct(timings.tcp_handshake_ms),
        tls_pct: pct(timings.tls_handshake_ms),
        server_pct: pct(timings.server_processing_ms),
        download_pct: pct(timings.content_download_ms),
    })
}

/// Cross-layer rules, in order. Each may append an insight.
fn cross_layer_insights(
    l3: Quality,
    l4: Quality,
    phases: &PhaseCorrelation,
    path: &PathTransportCorrelation,
    path_summary: Option<&PathSummary>,
    config: &AnalysisConfig,
) -> Vec<Insight> {
    let mut insights = Vec::new();

    // L3 → L4: does the path explain TCP behaviour?
    if l3 == Quality::Degraded && l4 == Quality::Degraded {
        insights.push(Insight::new(
            Severity::High,
            LayerLink::L3ToL4,
            "Path issues causing TCP degradation: network path quality is directly impacting TCP connection quality",
        ));
    } else if l3 == Quality::Excellent && l4 == Quality::Degraded {
        insights.push(Insight::new(
            Severity::Medium,
            LayerLink::L3ToL4,
            "TCP issues despite good path: degradation not explained by the network path, investigate endpoint",
        ));
    }

    // L4 → L7: retransmissions during the TLS handshake stall the whole request
    let tls_retransmissions = phases.retransmissions_in(HttpPhase::TlsNegotiation);
    if tls_retransmissions > 0 {
        insights.push(Insight::new(
            Severity::High,
            LayerLink::L4ToL7,
            format!(
                "TCP retransmissions during TLS handshake: {} retransmissions",
                tls_retransmissions
            ),
        ));
    }

    for phase in OTHER_RETRANSMISSION_PHASES {
        let stats = match phases.phases.get(&phase) {
            Some(stats) if stats.retransmissions > 0 => stats,
            _ => continue,
        };
        let severity = if stats.retransmission_rate_pct > config.retransmission_high_pct {
            Severity::Medium
        } else {
            Severity::Low
        };
        insights.push(Insight::new(
            severity,
            LayerLink::L4ToL7,
            format!(
                "TCP retransmissions during {}: {} of {} events ({:.1}%)",
                phase, stats.retransmissions, stats.event_count, stats.retransmission_rate_pct
            ),
        ));
    }

    if path.status == CorrelationStatus::Success
        && path.mtr_predicted_rtt_ms > 0.0
        && path.variance_pct > config.path_variance_alert_pct
    {
        let hops: Vec<String> = path
            .contributing_hops
            .iter()
            .map(|h| format!("#{} {}", h.hop_number, h.host))
            .collect();
        let mut message = format!(
            "TCP handshake ({:.1}ms) exceeds MTR-predicted RTT ({:.1}ms) by {:.1}%",
            path.tcp_actual_rtt_ms, path.mtr_predicted_rtt_ms, path.variance_pct
        );
        if !hops.is_empty() {
            message.push_str(&format!("; latency-contributing hops: {}", hops.join(", ")));
        }
        insights.push(Insight::new(Severity::Medium, LayerLink::L3ToL4, message));
    }

    if let Some(summary) = path_summary {
        for problem in &summary.problematic_hops {
            let message = match problem.issue {
                HopIssue::HighPacketLoss => format!(
                    "MTR hop {} ({}) loses {:.1}% of packets",
                    problem.hop, problem.host, problem.value
                ),
                HopIssue::LatencySpike => format!(
                    "MTR hop {} ({}) adds {:.1}ms over the previous hop",
                    problem.hop, problem.host, problem.value
                ),
                // Reported by the measurement sanity check
                HopIssue::InconsistentStats => continue,
            };
            insights.push(Insight::new(Severity::Medium, LayerLink::L3, message));
        }
    }

    insights
}

/// Produce the layered analysis for one (host, target) pair.
///
/// The latency grade uses the heuristic distance class; see
/// [`analyze_layers_with_distance`] to supply a known one.
pub fn analyze_layers(
    host: &Host,
    target: &Target,
    measurements: &Measurements,
    config: &AnalysisConfig,
) -> LayeredAnalysis {
    analyze_layers_with_distance(host, target, measurements, None, config)
}

pub fn analyze_layers_with_distance(
    host: &Host,
    target: &Target,
    measurements: &Measurements,
    distance: Option<DistanceClass>,
    config: &AnalysisConfig,
) -> LayeredAnalysis {
    log::debug!("Analyzing layers for {} -> {}", host.id, target.ip);

    // L3
    let l3_quality = grade_l3(measurements.ping.as_ref());
    let path_summary = measurements
        .mtr
        .as_deref()
        .filter(|hops| !hops.is_empty())
        .map(|hops| summarize_path(hops, config));
    let layer3 = Layer3Analysis {
        quality: l3_quality,
        icmp: measurements.ping.as_ref().map(|p| icmp_summary(p, distance)),
        path: path_summary,
    };

    // L4
    let layer4 = Layer4Analysis {
        quality: grade_l4(measurements.packets.as_ref()),
        connection: measurements.packets.as_ref().map(connection_metrics),
    };

    // L7
    let timings = measurements.http.as_ref().map(HttpStatistics::avg_timings);
    let layer7 = Layer7Analysis {
        quality: grade_l7(measurements.http.as_ref()),
        phase_breakdown: timings.as_ref().and_then(phase_breakdown),
        http: timings.clone(),
    };

    log::debug!(
        "Layer quality for {} -> {}: L3={} L4={} L7={}",
        host.id,
        target.ip,
        layer3.quality,
        layer4.quality,
        layer7.quality
    );

    // Correlations
    let timings = timings.unwrap_or_default();
    let phase_correlation = correlate_tcp_to_http_phases(
        measurements.tcp_events.as_deref().unwrap_or(&[]),
        &timings,
    );
    let observed_handshake = measurements
        .http
        .as_ref()
        .and_then(|http| http.tcp_handshake)
        .map(|stat| stat.avg);
    let path_correlation = correlate_mtr_to_tcp(
        measurements.mtr.as_deref().unwrap_or(&[]),
        observed_handshake,
        config.significant_hop_latency_ms,
    );

    let mut insights = cross_layer_insights(
        layer3.quality,
        layer4.quality,
        &phase_correlation,
        &path_correlation,
        layer3.path.as_ref(),
        config,
    );
    if let Some(packets) = &measurements.packets {
        insights.extend(detect_packet_issues(packets, config));
    }
    insights.extend(detect_anomalies(measurements, config));

    let overall_grade = overall_grade(layer3.quality, layer4.quality, layer7.quality);
    log::info!(
        "{} -> {}: grade {} with {} insight(s)",
        host.id,
        target.ip,
        overall_grade,
        insights.len()
    );

    LayeredAnalysis {
        host_id: host.id.clone(),
        target_ip: target.ip.clone(),
        layer3,
        layer4,
        layer7,
        phase_correlation,
        path_correlation,
        insights,
        overall_grade,
        summary: grade_summary(overall_grade).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ping(avg: f64, received: u32) -> PingResult {
        PingResult {
            target: "10.1.0.5".into(),
            packets_sent: 100,
            packets_received: received,
            min_ms: Some(avg * 0.8),
            avg_ms: Some(avg),
            max_ms: Some(avg * 1.2),
            stddev_ms: Some(0.3),
        }
    }

    fn http_total(avg: f64) -> HttpStatistics {
        HttpStatistics {
            samples: 5,
            success_rate: 1.0,
            total: Some(PhaseStat { min: avg, max: avg, avg, median: avg }),
            ..HttpStatistics::default()
        }
    }

    #[test]
    fn test_grade_l3() {
        assert_eq!(grade_l3(None), Quality::Unknown);
        assert_eq!(grade_l3(Some(&ping(10.0, 100))), Quality::Excellent);
        assert_eq!(grade_l3(Some(&ping(30.0, 100))), Quality::Good);
        assert_eq!(grade_l3(Some(&ping(10.0, 99))), Quality::Degraded);
        assert_eq!(grade_l3(Some(&ping(60.0, 100))), Quality::Degraded);

        let mut silent = ping(10.0, 0);
        silent.avg_ms = None;
        assert_eq!(grade_l3(Some(&silent)), Quality::Degraded);
    }

    #[test]
    fn test_grade_l7() {
        assert_eq!(grade_l7(None), Quality::Unknown);
        assert_eq!(grade_l7(Some(&http_total(99.0))), Quality::Excellent);
        assert_eq!(grade_l7(Some(&http_total(100.0))), Quality::Good);
        assert_eq!(grade_l7(Some(&http_total(500.0))), Quality::Degraded);
        assert_eq!(grade_l7(Some(&HttpStatistics::default())), Quality::Degraded);
    }

    #[test]
    fn test_overall_grade_precedence() {
        use Quality::*;
        assert_eq!(overall_grade(Excellent, Unknown, Excellent), Grade::APlus);
        assert_eq!(overall_grade(Excellent, Degraded, Excellent), Grade::C);
        assert_eq!(overall_grade(Good, Excellent, Excellent), Grade::B);
        assert_eq!(overall_grade(Good, Degraded, Unknown), Grade::C);
        assert_eq!(overall_grade(Unknown, Unknown, Unknown), Grade::B);
    }

    #[test]
    fn test_phase_breakdown() {
        let timings = HttpPhaseTimings {
            dns_lookup_ms: 10.0,
            tcp_handshake_ms: 20.0,
            tls_handshake_ms: 30.0,
            server_processing_ms: 20.0,
            content_download_ms: 20.0,
            total_ms: Some(100.0),
        };
        let breakdown = phase_breakdown(&timings).unwrap();
        assert_eq!(breakdown.tls_pct, 30.0);
        assert!(phase_breakdown(&HttpPhaseTimings::default()).is_none());
    }

    #[test]
    fn test_phase_breakdown_ignores_bad_phase_values() {
        let timings = HttpPhaseTimings {
            dns_lookup_ms: -4.0,
            tcp_handshake_ms: f64::NAN,
            tls_handshake_ms: 30.0,
            server_processing_ms: f64::INFINITY,
            content_download_ms: 20.0,
            total_ms: Some(100.0),
        };
        let breakdown = phase_breakdown(&timings).unwrap();
        assert_eq!(breakdown.dns_pct, 0.0);
        assert_eq!(breakdown.tcp_pct, 0.0);
        assert_eq!(breakdown.server_pct, 0.0);
        assert_eq!(breakdown.tls_pct, 30.0);

        let json = serde_json::to_string(&breakdown).unwrap();
        let parsed: PhaseBreakdown = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, breakdown);

        let infinite_total = HttpPhaseTimings { total_ms: Some(f64::INFINITY), ..timings };
        assert!(phase_breakdown(&infinite_total).is_none());
    }

    #[test]
    fn test_other_phase_retransmissions_are_reported() {
        let mut phases = correlate_tcp_to_http_phases(&[], &HttpPhaseTimings::default());
        if let Some(stats) = phases.phases.get_mut(&HttpPhase::ContentDownload) {
            stats.event_count = 10;
            stats.retransmissions = 2;
            stats.retransmission_rate_pct = 20.0;
        }
        let path = correlate_mtr_to_tcp(&[], None, 5.0);
        let insights = cross_layer_insights(
            Quality::Good,
            Quality::Good,
            &phases,
            &path,
            None,
            &AnalysisConfig::default(),
        );
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].layers, LayerLink::L4ToL7);
        assert_eq!(insights[0].severity, Severity::Medium);
        assert!(insights[0].message.contains("content_download"));
    }

    #[test]
    fn test_distance_override() {
        let host = Host {
            id: "aws-use1".into(),
            provider: "aws".into(),
            region: "us-east-1".into(),
            address: "198.51.100.7".into(),
        };
        let target = Target { ip: "10.1.0.5".into(), url: None, name: None };
        let measurements = Measurements {
            ping: Some(ping(30.0, 100)),
            ..Measurements::default()
        };
        let config = AnalysisConfig::default();

        let heuristic = analyze_layers(&host, &target, &measurements, &config);
        let icmp = heuristic.layer3.icmp.unwrap();
        assert_eq!(icmp.distance_class, Some(DistanceClass::Regional));
        assert_eq!(icmp.latency_grade, Grade::A);

        let same_region = analyze_layers_with_distance(
            &host,
            &target,
            &measurements,
            Some(DistanceClass::SameRegion),
            &config,
        );
        assert_eq!(same_region.layer3.icmp.unwrap().latency_grade, Grade::D);
    }
}
