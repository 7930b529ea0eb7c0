//! MTR report parsing, text (`mtr -r`) and JSON (`mtr -j`).

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use super::{parse_number, IngestError};
use crate::analysis::types::MtrHop;

/// Match: "  1.|-- 172.31.0.1   0.0%    10    0.3   0.3   0.2   0.4   0.1"
static HOP_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(\d+)\.\|--\s+(\S+)\s+(\d+(?:\.\d+)?)%\s+(\d+)\s+([\d.]+)\s+([\d.]+)\s+([\d.]+)\s+([\d.]+)\s+([\d.]+)",
    )
    .expect("Invalid MTR hop regex")
});

/// Build a hop, dropping latency figures for hops that never answered.
fn build_hop(
    hop: u32,
    host: String,
    loss_pct: f64,
    packets_sent: u32,
    packets_received: u32,
    latencies: [f64; 5],
) -> MtrHop {
    let answered = packets_received > 0 && loss_pct < 100.0;
    let value = |v: f64| if answered { Some(v) } else { None };
    MtrHop {
        hop,
        host,
        loss_pct: loss_pct.clamp(0.0, 100.0),
        packets_sent,
        packets_received,
        last_ms: value(latencies[0]),
        avg_ms: value(latencies[1]),
        best_ms: value(latencies[2]),
        worst_ms: value(latencies[3]),
        stddev_ms: value(latencies[4]),
    }
}

/// Parse `mtr -r` / `mtr --report` text output.
pub fn parse_mtr_report(output: &str) -> Result<Vec<MtrHop>, IngestError> {
    let mut hops = Vec::new();

    for line in output.lines() {
        let caps = match HOP_LINE.captures(line) {
            Some(caps) => caps,
            None => continue,
        };

        let loss_pct: f64 = parse_number("Loss%", &caps[3])?;
        let packets_sent: u32 = parse_number("Snt", &caps[4])?;
        // Text reports carry no receive count
        let lost = (packets_sent as f64 * loss_pct / 100.0).round() as u32;
        let packets_received = packets_sent.saturating_sub(lost);

        let mut latencies = [0.0; 5];
        for (slot, (idx, field)) in latencies
            .iter_mut()
            .zip([(5, "Last"), (6, "Avg"), (7, "Best"), (8, "Wrst"), (9, "StDev")])
        {
            *slot = parse_number(field, &caps[idx])?;
        }

        hops.push(build_hop(
            parse_number("hop", &caps[1])?,
            caps[2].to_string(),
            loss_pct,
            packets_sent,
            packets_received,
            latencies,
        ));
    }

    if hops.is_empty() {
        return Err(IngestError::NoMtrHops);
    }
    log::debug!("Parsed {} MTR hops from text report", hops.len());
    Ok(hops)
}

#[derive(Debug, Deserialize)]
struct MtrJson {
    report: MtrJsonReport,
}

#[derive(Debug, Deserialize)]
struct MtrJsonReport {
    #[serde(default)]
    hubs: Vec<MtrJsonHub>,
}

/// Older mtr releases emit `count` as a string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HopCount {
    Number(u32),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct MtrJsonHub {
    count: HopCount,
    #[serde(default)]
    host: Option<String>,
    #[serde(rename = "Loss%", default)]
    loss: f64,
    #[serde(rename = "Snt", default)]
    sent: u32,
    #[serde(rename = "Rcv", default)]
    received: Option<u32>,
    #[serde(rename = "Last", default)]
    last: f64,
    #[serde(rename = "Avg", default)]
    avg: f64,
    #[serde(rename = "Best", default)]
    best: f64,
    #[serde(rename = "Wrst", default)]
    worst: f64,
    #[serde(rename = "StDev", default)]
    stddev: f64,
}

/// Parse `mtr -j` output (`report.hubs[]`).
pub fn parse_mtr_json(output: &str) -> Result<Vec<MtrHop>, IngestError> {
    let parsed: MtrJson = serde_json::from_str(output)?;

    let mut hops = Vec::with_capacity(parsed.report.hubs.len());
    for hub in parsed.report.hubs {
        let hop = match hub.count {
            HopCount::Number(n) => n,
            HopCount::Text(s) => parse_number("count", &s)?,
        };
        let received = hub.received.unwrap_or_else(|| {
            let lost = (hub.sent as f64 * hub.loss / 100.0).round() as u32;
            hub.sent.saturating_sub(lost)
        });
        hops.push(build_hop(
            hop,
            hub.host.unwrap_or_else(|| "???".to_string()),
            hub.loss,
            hub.sent,
            received,
            [hub.last, hub.avg, hub.best, hub.worst, hub.stddev],
        ));
    }

    if hops.is_empty() {
        return Err(IngestError::NoMtrHops);
    }
    log::debug!("Parsed {} MTR hops from JSON report", hops.len());
    Ok(hops)
}
