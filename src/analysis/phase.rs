//! Mapping of TCP events onto HTTP timing phases.
//!
//! Phase boundaries are the running sum of the phase durations in timeline
//! order (DNS → TCP → TLS → server → download). An event belongs to the first
//! phase whose end boundary it does not exceed, so an event exactly on a
//! boundary goes to the earlier phase. Events past the last boundary happened
//! after the request completed and are counted separately, not bucketed.

use std::collections::BTreeMap;

use super::types::*;

/// Cumulative end offsets for each bucketed phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseBoundaries {
    ends: [(HttpPhase, Millis); 4],
}

impl PhaseBoundaries {
    /// Negative or non-finite durations are treated as 0.
    pub fn from_timings(timings: &HttpPhaseTimings) -> Self {
        let dns_end = sanitize(timings.dns_lookup_ms);
        let tcp_end = dns_end + sanitize(timings.tcp_handshake_ms);
        let tls_end = tcp_end + sanitize(timings.tls_handshake_ms);
        let server_end = tls_end + sanitize(timings.server_processing_ms);
        let download_end = server_end + sanitize(timings.content_download_ms);

        Self {
            ends: [
                (HttpPhase::TcpHandshake, tcp_end),
                (HttpPhase::TlsNegotiation, tls_end),
                (HttpPhase::ServerProcessing, server_end),
                (HttpPhase::ContentDownload, download_end),
            ],
        }
    }

    /// End of the whole request.
    pub fn request_end(&self) -> Millis {
        self.ends[3].1
    }

    /// Phase an event at `time_ms` falls in, or `None` if after completion.
    pub fn phase_at(&self, time_ms: Millis) -> Option<HttpPhase> {
        self.ends
            .iter()
            .find(|(_, end)| time_ms <= *end)
            .map(|(phase, _)| *phase)
    }
}

/// Negative or non-finite durations become 0.
pub(crate) fn sanitize(duration_ms: Millis) -> Millis {
    if duration_ms.is_finite() && duration_ms > 0.0 {
        duration_ms
    } else {
        0.0
    }
}

fn phase_duration(timings: &HttpPhaseTimings, phase: HttpPhase) -> Millis {
    sanitize(match phase {
        HttpPhase::TcpHandshake => timings.tcp_handshake_ms,
        HttpPhase::TlsNegotiation => timings.tls_handshake_ms,
        HttpPhase::ServerProcessing => timings.server_processing_ms,
        HttpPhase::ContentDownload => timings.content_download_ms,
    })
}

fn empty_phases(timings: &HttpPhaseTimings) -> BTreeMap<HttpPhase, PhaseStats> {
    HttpPhase::ALL
        .iter()
        .map(|&phase| {
            (
                phase,
                PhaseStats {
                    duration_ms: phase_duration(timings, phase),
                    ..PhaseStats::default()
                },
            )
        })
        .collect()
}

/// Bucket TCP events into HTTP phases and compute per-phase statistics.
pub fn correlate_tcp_to_http_phases(
    events: &[TcpEvent],
    timings: &HttpPhaseTimings,
) -> PhaseCorrelation {
    let mut correlation = PhaseCorrelation {
        status: CorrelationStatus::Success,
        phases: empty_phases(timings),
        total_bytes: 0,
        window_evolution: Vec::new(),
        events_after_completion: 0,
    };

    let boundaries = PhaseBoundaries::from_timings(timings);
    if boundaries.request_end() <= 0.0 {
        log::debug!("HTTP phase breakdown is empty, skipping TCP phase correlation");
        correlation.status = CorrelationStatus::NoData;
        return correlation;
    }

    if events.is_empty() {
        correlation.status = CorrelationStatus::NoTcpData;
        return correlation;
    }

    for event in events {
        let time_ms = match event.relative_time_ms.filter(|t| t.is_finite()) {
            // Events logged marginally before the request start belong to its first phase
            Some(time_ms) => time_ms.max(0.0),
            None => {
                log::warn!("Skipping TCP event without a usable timestamp");
                continue;
            }
        };

        let phase = match boundaries.phase_at(time_ms) {
            Some(phase) => phase,
            None => {
                correlation.events_after_completion += 1;
                continue;
            }
        };

        let stats = correlation.phases.entry(phase).or_default();
        stats.event_count += 1;
        if event.is_retransmission {
            stats.retransmissions += 1;
        }
        if let Some(length) = event.length {
            stats.bytes += length;
            correlation.total_bytes += length;
        }
        if let Some(window_size) = event.window_size {
            correlation.window_evolution.push(WindowSample {
                time_ms,
                phase,
                window_size,
            });
        }
    }

    for stats in correlation.phases.values_mut() {
        stats.retransmission_rate_pct = ratio_pct(stats.retransmissions as u64, stats.event_count as u64);
    }

    if correlation.events_after_completion > 0 {
        log::debug!(
            "{} TCP events fell after request completion ({:.1}ms)",
            correlation.events_after_completion,
            boundaries.request_end()
        );
    }

    correlation
}
