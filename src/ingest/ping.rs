//! ICMP ping summary parsing (Linux iputils and BSD/macOS formats).

use std::sync::LazyLock;

use regex::Regex;

use super::{parse_number, IngestError};
use crate::analysis::types::PingResult;

struct PingPatterns {
    /// Match: "20 packets transmitted, 19 received" / "5 packets transmitted, 5 packets received"
    counts: Regex,
    /// Match: "rtt min/avg/max/mdev = 0.2/0.3/0.4/0.05 ms" (or "round-trip ... stddev")
    rtt: Regex,
}

impl PingPatterns {
    fn new() -> Self {
        Self {
            counts: Regex::new(r"(\d+) packets transmitted, (\d+) (?:packets )?received")
                .expect("Invalid counts regex"),
            rtt: Regex::new(
                r"(?:rtt|round-trip) min/avg/max/(?:mdev|stddev) = ([\d.]+)/([\d.]+)/([\d.]+)/([\d.]+)",
            )
            .expect("Invalid rtt regex"),
        }
    }
}

static PATTERNS: LazyLock<PingPatterns> = LazyLock::new(PingPatterns::new);

/// Parse the summary block of `ping -c N <target>`.
///
/// A run where every packet was lost has no rtt line; latency fields are then
/// left absent.
pub fn parse_ping_output(target: &str, output: &str) -> Result<PingResult, IngestError> {
    let counts = PATTERNS
        .counts
        .captures(output)
        .ok_or(IngestError::MissingPingStatistics)?;

    let packets_sent: u32 = parse_number("packets_transmitted", &counts[1])?;
    let mut packets_received: u32 = parse_number("packets_received", &counts[2])?;
    if packets_received > packets_sent {
        log::warn!(
            "ping to {} reports {} received of {} sent, clamping",
            target,
            packets_received,
            packets_sent
        );
        packets_received = packets_sent;
    }

    let mut result = PingResult {
        target: target.to_string(),
        packets_sent,
        packets_received,
        min_ms: None,
        avg_ms: None,
        max_ms: None,
        stddev_ms: None,
    };

    if let Some(rtt) = PATTERNS.rtt.captures(output) {
        result.min_ms = Some(parse_number("rtt_min", &rtt[1])?);
        result.avg_ms = Some(parse_number("rtt_avg", &rtt[2])?);
        result.max_ms = Some(parse_number("rtt_max", &rtt[3])?);
        result.stddev_ms = Some(parse_number("rtt_stddev", &rtt[4])?);
    }

    Ok(result)
}
