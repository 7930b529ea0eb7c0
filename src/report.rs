//! Report generation for layered analyses.
//!
//! Generates both JSON and human-readable text reports. The analyses
//! themselves carry no timestamps; the report metadata does.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use color_eyre::eyre::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::types::*;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub generated_at: String,
    /// Input the analyses were produced from
    pub source: String,
    pub total_pairs: usize,
}

/// A set of analyses plus the grade distribution across them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiagnosticReport {
    pub metadata: ReportMetadata,
    pub grade_counts: BTreeMap<Grade, usize>,
    pub analyses: Vec<LayeredAnalysis>,
}

impl DiagnosticReport {
    /// Analyses are sorted by (host id, target ip) so parallel runs report stably.
    pub fn new(mut analyses: Vec<LayeredAnalysis>, source: &str) -> Self {
        analyses.sort_by(|a, b| (&a.host_id, &a.target_ip).cmp(&(&b.host_id, &b.target_ip)));

        let mut grade_counts = BTreeMap::new();
        for analysis in &analyses {
            *grade_counts.entry(analysis.overall_grade).or_insert(0) += 1;
        }

        Self {
            metadata: ReportMetadata {
                generated_at: chrono::Utc::now().to_rfc3339(),
                source: source.to_string(),
                total_pairs: analyses.len(),
            },
            grade_counts,
            analyses,
        }
    }

    pub fn high_severity_insights(&self) -> impl Iterator<Item = (&LayeredAnalysis, &Insight)> {
        self.analyses.iter().flat_map(|a| {
            a.insights
                .iter()
                .filter(|i| i.severity == Severity::High)
                .map(move |i| (a, i))
        })
    }
}

/// Generate JSON report
pub fn generate_json_report(report: &DiagnosticReport, output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)
        .context("Failed to serialize report to JSON")?;

    fs::write(output_path, json)
        .with_context(|| format!("Failed to write JSON report to {}", output_path.display()))?;

    log::info!("JSON report written to {}", output_path.display());
    Ok(())
}

fn fmt_ms(value: Option<Millis>) -> String {
    match value {
        Some(v) => format!("{:.2}ms", v),
        None => "n/a".to_string(),
    }
}

fn section(lines: &mut Vec<String>, title: &str) {
    lines.push("=".repeat(80));
    lines.push(format!("{:^80}", title));
    lines.push("=".repeat(80));
    lines.push(String::new());
}

fn render_analysis(lines: &mut Vec<String>, analysis: &LayeredAnalysis) {
    section(
        lines,
        &format!("{} -> {}", analysis.host_id, analysis.target_ip),
    );
    lines.push(format!(
        "Overall Grade: {}  ({})",
        analysis.overall_grade, analysis.summary
    ));
    lines.push(String::new());

    // Layer 3
    lines.push(format!("L3 Network:     {}", analysis.layer3.quality));
    if let Some(ref icmp) = analysis.layer3.icmp {
        lines.push(format!(
            "  Latency: avg {} (min {}, max {}), grade {} [{}]",
            fmt_ms(icmp.avg_ms),
            fmt_ms(icmp.min_ms),
            fmt_ms(icmp.max_ms),
            icmp.latency_grade,
            icmp.distance_class
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unclassified".to_string())
        ));
        lines.push(format!(
            "  Packet loss: {:.1}% ({})",
            icmp.packet_loss_pct, icmp.loss_severity
        ));
        if let Some(jitter) = icmp.jitter_ms {
            lines.push(format!("  Jitter (max-min): {:.2}ms", jitter));
        }
    }
    if let Some(ref path) = analysis.layer3.path {
        lines.push(format!(
            "  Path: {} hops, {} quality, max hop latency {:.2}ms",
            path.hop_count, path.path_quality, path.max_hop_latency_ms
        ));
    }

    // Layer 4
    lines.push(format!("L4 Transport:   {}", analysis.layer4.quality));
    if let Some(ref conn) = analysis.layer4.connection {
        lines.push(format!(
            "  {} packets, {} retransmissions ({:.2}%), {} dup ACKs, {} out-of-order",
            conn.total_packets,
            conn.retransmissions,
            conn.retransmission_rate_pct,
            conn.duplicate_acks,
            conn.out_of_order
        ));
    }

    // Layer 7
    lines.push(format!("L7 Application: {}", analysis.layer7.quality));
    if let Some(ref http) = analysis.layer7.http {
        lines.push(format!(
            "  DNS {:.1}ms | TCP {:.1}ms | TLS {:.1}ms | Server {:.1}ms | Download {:.1}ms | Total {}",
            http.dns_lookup_ms,
            http.tcp_handshake_ms,
            http.tls_handshake_ms,
            http.server_processing_ms,
            http.content_download_ms,
            fmt_ms(http.total_ms)
        ));
    }
    lines.push(String::new());

    let phases = &analysis.phase_correlation;
    if phases.status == CorrelationStatus::Success {
        lines.push("TCP Events by HTTP Phase:".to_string());
        for (phase, stats) in &phases.phases {
            lines.push(format!(
                "  {:<18} {:>8.1}ms  {:>5} events  {:>3} retrans ({:.1}%)  {} bytes",
                phase.as_str(),
                stats.duration_ms,
                stats.event_count,
                stats.retransmissions,
                stats.retransmission_rate_pct,
                stats.bytes
            ));
        }
        if phases.events_after_completion > 0 {
            lines.push(format!(
                "  ({} events after request completion)",
                phases.events_after_completion
            ));
        }
        lines.push(String::new());
    }

    let path = &analysis.path_correlation;
    if path.status == CorrelationStatus::Success {
        lines.push(format!(
            "Path vs Transport: MTR predicts {:.2}ms, TCP handshake took {:.2}ms ({:+.1}%)",
            path.mtr_predicted_rtt_ms, path.tcp_actual_rtt_ms, path.variance_pct
        ));
        for hop in &path.contributing_hops {
            lines.push(format!(
                "  hop {:>2} {:<20} {:.2}ms, {:.1}% loss",
                hop.hop_number, hop.host, hop.latency_ms, hop.loss_pct
            ));
        }
        lines.push(String::new());
    }

    if analysis.insights.is_empty() {
        lines.push("No issues detected.".to_string());
    } else {
        lines.push("Insights:".to_string());
        for insight in &analysis.insights {
            lines.push(format!(
                "  [{}] {}: {}",
                insight.severity.to_string().to_uppercase(),
                insight.layers,
                insight.message
            ));
        }
    }
    lines.push(String::new());
}

/// Render the plain-text report.
pub fn render_text_report(report: &DiagnosticReport) -> String {
    let mut lines: Vec<String> = Vec::new();

    section(&mut lines, "NETWORK DIAGNOSTICS: LAYERED ANALYSIS");

    lines.push(format!("Generated: {}", report.metadata.generated_at));
    lines.push(format!("Source: {}", report.metadata.source));
    lines.push(format!("Host/target pairs: {}", report.metadata.total_pairs));
    let grades: Vec<String> = report
        .grade_counts
        .iter()
        .map(|(grade, count)| format!("{}: {}", grade, count))
        .collect();
    lines.push(format!("Grades: {}", grades.join(", ")));
    lines.push(String::new());

    for analysis in &report.analyses {
        render_analysis(&mut lines, analysis);
    }

    lines.push("=".repeat(80));
    lines.join("\n")
}

/// Generate human-readable text report
pub fn generate_text_report(report: &DiagnosticReport, output_path: &Path) -> Result<()> {
    fs::write(output_path, render_text_report(report))
        .with_context(|| format!("Failed to write text report to {}", output_path.display()))?;

    log::info!("Text report written to {}", output_path.display());
    Ok(())
}

/// Print a summary to stdout
pub fn print_summary(report: &DiagnosticReport) {
    println!("\n=== LAYERED NETWORK ANALYSIS SUMMARY ===\n");
    println!("Pairs analyzed: {}", report.metadata.total_pairs);
    for (grade, count) in &report.grade_counts {
        println!("  {:<8} {}", grade.to_string(), count);
    }

    println!();
    for analysis in &report.analyses {
        println!(
            "{:<20} -> {:<16} {:<3}  L3={} L4={} L7={}",
            analysis.host_id,
            analysis.target_ip,
            analysis.overall_grade.to_string(),
            analysis.layer3.quality,
            analysis.layer4.quality,
            analysis.layer7.quality
        );
    }

    let high: Vec<_> = report.high_severity_insights().collect();
    if !high.is_empty() {
        println!("\nHigh severity:");
        for (analysis, insight) in high {
            println!(
                "  {} -> {} [{}] {}",
                analysis.host_id, analysis.target_ip, insight.layers, insight.message
            );
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze_layers;
    use crate::config::AnalysisConfig;
    use tempfile::TempDir;

    fn analysis(host_id: &str, ping_avg: Option<f64>) -> LayeredAnalysis {
        let host = Host {
            id: host_id.into(),
            provider: "aws".into(),
            region: "us-east-1".into(),
            address: "198.51.100.7".into(),
        };
        let target = Target { ip: "10.1.0.5".into(), url: None, name: None };
        let measurements = Measurements {
            ping: ping_avg.map(|avg| PingResult {
                target: "10.1.0.5".into(),
                packets_sent: 10,
                packets_received: 10,
                min_ms: Some(avg),
                avg_ms: Some(avg),
                max_ms: Some(avg),
                stddev_ms: Some(0.1),
            }),
            ..Measurements::default()
        };
        analyze_layers(&host, &target, &measurements, &AnalysisConfig::default())
    }

    #[test]
    fn test_report_sorts_and_counts() {
        let report = DiagnosticReport::new(
            vec![analysis("b-host", Some(80.0)), analysis("a-host", Some(5.0))],
            "bundle.json",
        );
        assert_eq!(report.analyses[0].host_id, "a-host");
        assert_eq!(report.grade_counts.get(&Grade::APlus), Some(&1));
        assert_eq!(report.grade_counts.get(&Grade::C), Some(&1));
    }

    #[test]
    fn test_text_report_lists_layers() {
        let report = DiagnosticReport::new(vec![analysis("a-host", None)], "bundle.json");
        let text = render_text_report(&report);
        assert!(text.contains("a-host -> 10.1.0.5"));
        assert!(text.contains("L3 Network:     unknown"));
        assert!(text.contains("Overall Grade: B"));
    }

    #[test]
    fn test_write_reports() {
        let dir = TempDir::new().unwrap();
        let report = DiagnosticReport::new(vec![analysis("a-host", Some(5.0))], "bundle.json");

        let json_path = dir.path().join("report.json");
        generate_json_report(&report, &json_path).unwrap();
        let parsed: DiagnosticReport =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed.analyses, report.analyses);

        let text_path = dir.path().join("report.txt");
        generate_text_report(&report, &text_path).unwrap();
        assert!(std::fs::read_to_string(&text_path).unwrap().contains("A+"));
    }
}
