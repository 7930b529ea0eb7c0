//! tcpdump timeline parsing (`tcpdump -tttt -n -v tcp`).
//!
//! With `-v`, tcpdump prints an IP header line carrying the timestamp and then
//! an indented continuation line with the TCP segment. Both the one-line and
//! the two-line forms are accepted: a segment line takes the most recent
//! timestamp seen.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::analysis::packet::score_connection;
use crate::analysis::types::{PacketSummary, TcpEvent};

struct TcpdumpPatterns {
    /// Match: "2024-03-02 10:14:07.123456" at start of line
    timestamp: Regex,
    /// Match: "10.0.0.1.54321 > 93.184.216.34.443: Flags [S.],"
    segment: Regex,
    /// Match: "seq 1:518" or "seq 123456"
    seq: Regex,
    ack: Regex,
    win: Regex,
    length: Regex,
}

impl TcpdumpPatterns {
    fn new() -> Self {
        Self {
            timestamp: Regex::new(r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}(?:\.\d+)?)")
                .expect("Invalid timestamp regex"),
            segment: Regex::new(r"(\S+)\s+>\s+(\S+?):\s+Flags\s+\[([^\]]*)\]")
                .expect("Invalid segment regex"),
            seq: Regex::new(r"\bseq (\d+)(?::(\d+))?").expect("Invalid seq regex"),
            ack: Regex::new(r"\back (\d+)").expect("Invalid ack regex"),
            win: Regex::new(r"\bwin (\d+)").expect("Invalid win regex"),
            length: Regex::new(r"\blength (\d+)").expect("Invalid length regex"),
        }
    }
}

static PATTERNS: LazyLock<TcpdumpPatterns> = LazyLock::new(TcpdumpPatterns::new);

/// Parsed capture: the event timeline plus its counter summary.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capture {
    pub events: Vec<TcpEvent>,
    pub summary: PacketSummary,
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f").ok()
}

/// Per-direction state for retransmission, reordering and dup-ACK detection.
#[derive(Default)]
struct FlowState {
    seen_segments: HashSet<u64>,
    highest_seq_end: u64,
    last_pure_ack: Option<u64>,
}

/// Parse a tcpdump timeline and derive its counters.
///
/// Relative times are measured from the first timestamp in the capture.
/// A segment counts as a retransmission when tcpdump says so or when a
/// payload-carrying (src, dst, seq) repeats. Lines that cannot be parsed are
/// skipped.
pub fn parse_tcpdump_capture(output: &str) -> Capture {
    let mut capture = Capture::default();
    let mut first: Option<NaiveDateTime> = None;
    let mut current: Option<NaiveDateTime> = None;
    let mut flows: HashMap<(String, String), FlowState> = HashMap::new();
    let mut skipped = 0usize;

    for line in output.lines() {
        if line.trim().is_empty() {
            continue;
        }

        if let Some(caps) = PATTERNS.timestamp.captures(line) {
            match parse_timestamp(&caps[1]) {
                Some(ts) => {
                    first.get_or_insert(ts);
                    current = Some(ts);
                }
                None => {
                    skipped += 1;
                    continue;
                }
            }
        }

        let caps = match PATTERNS.segment.captures(line) {
            Some(caps) => caps,
            None => continue,
        };
        let (start, now) = match (first, current) {
            (Some(start), Some(now)) => (start, now),
            _ => {
                skipped += 1;
                continue;
            }
        };

        let src = caps[1].to_string();
        let dst = caps[2].to_string();
        let flags = caps[3].to_string();

        // Only the segment part; the -v IP header has its own "length"
        let tail = &line[caps.get(0).map(|m| m.start()).unwrap_or(0)..];
        let seq_caps = PATTERNS.seq.captures(tail);
        let seq: Option<u64> = seq_caps.as_ref().and_then(|c| c[1].parse().ok());
        let seq_end: Option<u64> = seq_caps
            .as_ref()
            .and_then(|c| c.get(2))
            .and_then(|m| m.as_str().parse().ok());
        let ack: Option<u64> = PATTERNS.ack.captures(tail).and_then(|c| c[1].parse().ok());
        let window_size: Option<u32> = PATTERNS.win.captures(tail).and_then(|c| c[1].parse().ok());
        let length: Option<u64> = PATTERNS.length.captures(tail).and_then(|c| c[1].parse().ok());

        let relative_time_ms = (now - start)
            .num_microseconds()
            .map(|us| us as f64 / 1000.0)
            .unwrap_or(0.0);

        let flow = flows.entry((src.clone(), dst.clone())).or_default();
        let has_payload = length.unwrap_or(0) > 0;
        let mut is_retransmission = line.to_ascii_lowercase().contains("retransmission");

        if let (Some(seq), true) = (seq, has_payload) {
            if !flow.seen_segments.insert(seq) {
                is_retransmission = true;
            } else if seq < flow.highest_seq_end && !is_retransmission {
                capture.summary.out_of_order += 1;
            }
            let end = seq_end.unwrap_or_else(|| seq.saturating_add(length.unwrap_or(0)));
            flow.highest_seq_end = flow.highest_seq_end.max(end);
        }

        if flags == "." && !has_payload {
            if ack.is_some() && flow.last_pure_ack == ack {
                capture.summary.duplicate_acks += 1;
            }
            flow.last_pure_ack = ack;
        } else if has_payload {
            flow.last_pure_ack = None;
        }

        let summary = &mut capture.summary;
        summary.total_packets += 1;
        if is_retransmission {
            summary.retransmissions += 1;
        }
        if tail.contains("sack") {
            summary.sack_events += 1;
        }
        if flags.contains('S') {
            if flags.contains('.') {
                summary.successful_connections += 1;
            } else {
                summary.connection_attempts += 1;
            }
        }
        if flags.contains('F') {
            summary.graceful_closes += 1;
        }
        if flags.contains('R') {
            summary.forced_closes += 1;
        }

        capture.events.push(TcpEvent {
            relative_time_ms: Some(relative_time_ms),
            src: Some(src),
            dst: Some(dst),
            flags: Some(flags),
            seq,
            ack,
            window_size,
            length,
            is_retransmission,
        });
    }

    let summary = &mut capture.summary;
    summary.quality_score = score_connection(
        summary.retransmissions,
        summary.duplicate_acks,
        summary.out_of_order,
        summary.total_packets,
    );

    if skipped > 0 {
        log::debug!("Skipped {} malformed tcpdump lines", skipped);
    }
    log::debug!(
        "Parsed {} TCP events ({} retransmissions)",
        capture.events.len(),
        capture.summary.retransmissions
    );
    capture
}

/// The event timeline only.
pub fn parse_tcpdump_timeline(output: &str) -> Vec<TcpEvent> {
    parse_tcpdump_capture(output).events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::types::ConnectionScore;

    const CAPTURE: &str = "\
2024-03-02 10:14:07.000000 IP 10.0.0.5.51234 > 93.184.216.34.443: Flags [S], seq 100, win 64240, options [mss 1460,sackOK], length 0
2024-03-02 10:14:07.010500 IP 93.184.216.34.443 > 10.0.0.5.51234: Flags [S.], seq 900, ack 101, win 65535, length 0
2024-03-02 10:14:07.011000 IP 10.0.0.5.51234 > 93.184.216.34.443: Flags [.], ack 1, win 502, length 0
2024-03-02 10:14:07.012000 IP 10.0.0.5.51234 > 93.184.216.34.443: Flags [P.], seq 1:518, ack 1, win 502, length 517
garbage line without structure
2024-03-02 10:14:07.250000 IP 10.0.0.5.51234 > 93.184.216.34.443: Flags [P.], seq 1:518, ack 1, win 502, length 517
2024-03-02 10:14:07.300000 IP 10.0.0.5.51234 > 93.184.216.34.443: Flags [R.], seq 518, ack 1, win 0, length 0
";

    #[test]
    fn test_timeline_relative_times() {
        let events = parse_tcpdump_timeline(CAPTURE);
        assert_eq!(events.len(), 6);
        assert_eq!(events[0].relative_time_ms, Some(0.0));
        assert!((events[1].relative_time_ms.unwrap() - 10.5).abs() < 1e-9);
        assert_eq!(events[1].flags.as_deref(), Some("S."));
        assert_eq!(events[1].src.as_deref(), Some("93.184.216.34.443"));
        assert_eq!(events[3].seq, Some(1));
        assert_eq!(events[3].length, Some(517));
        assert_eq!(events[3].window_size, Some(502));
    }

    #[test]
    fn test_repeated_segment_is_retransmission() {
        let capture = parse_tcpdump_capture(CAPTURE);
        let retrans: Vec<bool> = capture.events.iter().map(|e| e.is_retransmission).collect();
        assert_eq!(retrans, vec![false, false, false, false, true, false]);

        let summary = &capture.summary;
        assert_eq!(summary.total_packets, 6);
        assert_eq!(summary.retransmissions, 1);
        assert_eq!(summary.connection_attempts, 1);
        assert_eq!(summary.successful_connections, 1);
        assert_eq!(summary.forced_closes, 1);
        assert_eq!(summary.quality_score, ConnectionScore::Poor);
    }

    #[test]
    fn test_verbose_two_line_form() {
        let output = "\
2024-03-02 10:14:07.000000 IP (tos 0x0, ttl 64, id 1, offset 0, flags [DF], proto TCP (6), length 60)
    10.0.0.5.51234 > 93.184.216.34.443: Flags [S], cksum 0x1c2d (correct), seq 100, win 64240, length 0
2024-03-02 10:14:07.020000 IP (tos 0x0, ttl 57, id 0, offset 0, flags [DF], proto TCP (6), length 60)
    93.184.216.34.443 > 10.0.0.5.51234: Flags [S.], cksum 0x9a1b (correct), seq 900, ack 101, win 65535, length 0
";
        let events = parse_tcpdump_timeline(output);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].length, Some(0));
        assert!((events[1].relative_time_ms.unwrap() - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_explicit_retransmission_marker_and_dup_acks() {
        let output = "\
2024-03-02 10:14:07.000000 IP 10.0.0.5.1 > 10.0.0.6.80: Flags [.], ack 50, win 502, length 0
2024-03-02 10:14:07.001000 IP 10.0.0.5.1 > 10.0.0.6.80: Flags [.], ack 50, win 502, length 0
2024-03-02 10:14:07.002000 IP 10.0.0.6.80 > 10.0.0.5.1: Flags [P.], seq 50:100, ack 1, win 510, length 50 (retransmission)
";
        let capture = parse_tcpdump_capture(output);
        assert_eq!(capture.summary.duplicate_acks, 1);
        assert!(capture.events[2].is_retransmission);
        assert_eq!(capture.summary.out_of_order, 0);
    }

    #[test]
    fn test_sequence_number_near_wraparound() {
        let output = "\
2024-03-02 10:14:07.000000 IP 10.0.0.5.1 > 10.0.0.6.80: Flags [P.], seq 18446744073709551610, ack 1, win 502, length 100
2024-03-02 10:14:07.001000 IP 10.0.0.5.1 > 10.0.0.6.80: Flags [P.], seq 18446744073709551610, ack 1, win 502, length 100
";
        let capture = parse_tcpdump_capture(output);
        assert_eq!(capture.events.len(), 2);
        assert_eq!(capture.events[0].seq, Some(u64::MAX - 5));
        assert!(capture.events[1].is_retransmission);
    }

    #[test]
    fn test_empty_capture() {
        let capture = parse_tcpdump_capture("");
        assert!(capture.events.is_empty());
        assert_eq!(capture.summary.quality_score, ConnectionScore::Unknown);
    }
}
