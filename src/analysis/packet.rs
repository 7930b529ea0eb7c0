//! TCP connection quality from packet capture counters.

use super::types::*;
use crate::config::AnalysisConfig;

/// Score a capture by its combined issue rate (retransmissions, duplicate
/// ACKs and out-of-order packets as a % of all packets).
pub fn score_connection(
    retransmissions: u64,
    duplicate_acks: u64,
    out_of_order: u64,
    total_packets: u64,
) -> ConnectionScore {
    if total_packets == 0 {
        return ConnectionScore::Unknown;
    }

    let issues = retransmissions + duplicate_acks + out_of_order;
    let issue_rate = ratio_pct(issues, total_packets);

    if issue_rate < 0.1 {
        ConnectionScore::Excellent
    } else if issue_rate < 1.0 {
        ConnectionScore::Good
    } else if issue_rate < 5.0 {
        ConnectionScore::Fair
    } else {
        ConnectionScore::Poor
    }
}

/// Layer 4 quality: excellent/good pass through, any other score is degraded.
pub fn l4_quality(summary: &PacketSummary) -> Quality {
    match summary.quality_score {
        ConnectionScore::Excellent => Quality::Excellent,
        ConnectionScore::Good => Quality::Good,
        _ => Quality::Degraded,
    }
}

/// Packet-level findings, in a fixed detection order.
pub fn detect_packet_issues(summary: &PacketSummary, config: &AnalysisConfig) -> Vec<Insight> {
    let mut issues = Vec::new();

    let retrans_rate = summary.retransmission_rate_pct();
    if retrans_rate > config.retransmission_high_pct {
        issues.push(Insight::new(
            Severity::High,
            LayerLink::L4,
            format!(
                "High retransmission rate: {:.2}% - check for packet loss or congestion",
                retrans_rate
            ),
        ));
    } else if retrans_rate > config.retransmission_moderate_pct {
        issues.push(Insight::new(
            Severity::Medium,
            LayerLink::L4,
            format!("Moderate retransmission rate: {:.2}%", retrans_rate),
        ));
    }

    if summary.total_packets > 0
        && summary.duplicate_acks as f64 > summary.total_packets as f64 * config.duplicate_ack_ratio
    {
        issues.push(Insight::new(
            Severity::Medium,
            LayerLink::L4,
            format!(
                "High number of duplicate ACKs: {} - possible packet loss or reordering",
                summary.duplicate_acks
            ),
        ));
    }

    if summary.out_of_order > 0 {
        issues.push(Insight::new(
            Severity::Low,
            LayerLink::L4,
            format!("Out-of-order packets detected: {}", summary.out_of_order),
        ));
    }

    let sack_rate = ratio_pct(summary.sack_events, summary.total_packets);
    if sack_rate > config.sack_rate_alert_pct {
        issues.push(Insight::new(
            Severity::Medium,
            LayerLink::L4,
            format!(
                "High SACK rate ({:.1}%) indicates packet loss or reordering",
                sack_rate
            ),
        ));
    }

    if summary.forced_closes > summary.graceful_closes {
        issues.push(Insight::new(
            Severity::Medium,
            LayerLink::L4,
            format!(
                "More RST than FIN: {} resets vs {} closes",
                summary.forced_closes, summary.graceful_closes
            ),
        ));
    }

    if let Some(success_rate) = summary.connection_success_rate_pct() {
        if success_rate < 100.0 {
            issues.push(Insight::new(
                Severity::High,
                LayerLink::L4,
                format!("Connection success rate: {:.1}%", success_rate),
            ));
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_connection() {
        assert_eq!(score_connection(0, 0, 0, 0), ConnectionScore::Unknown);
        assert_eq!(score_connection(0, 0, 0, 5000), ConnectionScore::Excellent);
        assert_eq!(score_connection(2, 1, 0, 1000), ConnectionScore::Good);
        assert_eq!(score_connection(10, 5, 5, 1000), ConnectionScore::Fair);
        assert_eq!(score_connection(40, 20, 10, 1000), ConnectionScore::Poor);
    }

    #[test]
    fn test_l4_quality_mapping() {
        let mut summary = PacketSummary::default();
        summary.quality_score = ConnectionScore::Good;
        assert_eq!(l4_quality(&summary), Quality::Good);
        summary.quality_score = ConnectionScore::Fair;
        assert_eq!(l4_quality(&summary), Quality::Degraded);
        summary.quality_score = ConnectionScore::Unknown;
        assert_eq!(l4_quality(&summary), Quality::Degraded);
    }

    #[test]
    fn test_clean_capture_has_no_issues() {
        let summary = PacketSummary {
            quality_score: ConnectionScore::Excellent,
            total_packets: 1000,
            connection_attempts: 3,
            successful_connections: 3,
            graceful_closes: 3,
            ..PacketSummary::default()
        };
        assert!(detect_packet_issues(&summary, &AnalysisConfig::default()).is_empty());
    }

    #[test]
    fn test_retransmission_storm() {
        let summary = PacketSummary {
            total_packets: 200,
            retransmissions: 30,
            duplicate_acks: 40,
            out_of_order: 2,
            forced_closes: 2,
            graceful_closes: 1,
            connection_attempts: 4,
            successful_connections: 3,
            ..PacketSummary::default()
        };
        let issues = detect_packet_issues(&summary, &AnalysisConfig::default());
        let severities: Vec<Severity> = issues.iter().map(|i| i.severity).collect();
        assert_eq!(
            severities,
            vec![
                Severity::High,   // 15% retransmissions
                Severity::Medium, // dup acks > 10%
                Severity::Low,    // reordering
                Severity::Medium, // RST > FIN
                Severity::High,   // 75% connection success
            ]
        );
        assert!(issues[0].message.contains("15.00%"));
    }

    #[test]
    fn test_moderate_retransmissions() {
        let summary = PacketSummary {
            total_packets: 100,
            retransmissions: 3,
            ..PacketSummary::default()
        };
        let issues = detect_packet_issues(&summary, &AnalysisConfig::default());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Medium);
    }
}
