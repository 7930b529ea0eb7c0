//! Core data types for layered network analysis.
//!
//! Measurement records come in from the ingestion parsers (or any external
//! collaborator); analysis records go out to the reporting layer. Every
//! field that a tool may fail to report is an `Option`, so "missing" is a
//! typed state rather than a silent key-miss.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

/// Milliseconds, as reported by ping/mtr/curl.
pub type Millis = f64;

// ============================================================================
// Shared enums
// ============================================================================

/// Per-layer quality level shared by every component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Excellent,
    Good,
    Degraded,
    Unknown,
}

impl Quality {
    pub fn is_known(self) -> bool {
        self != Quality::Unknown
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quality::Excellent => write!(f, "excellent"),
            Quality::Good => write!(f, "good"),
            Quality::Degraded => write!(f, "degraded"),
            Quality::Unknown => write!(f, "unknown"),
        }
    }
}

/// Letter grade. Ordering runs best to worst, with `Unknown` last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    F,
    #[serde(rename = "unknown")]
    Unknown,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
            Grade::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Severity attached to grades and insights. Ordered least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Ok,
    Low,
    Medium,
    High,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Ok => write!(f, "ok"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
        }
    }
}

/// Latency threshold table selector.
///
/// This is a heuristic classification driven by the measured latency itself
/// (see [`DistanceClass::from_avg_latency`]), not a physical-distance lookup.
/// Callers that know the real topology may pick a class directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DistanceClass {
    SameRegion,
    Regional,
    CrossCountry,
}

impl DistanceClass {
    /// avg < 2ms → same-region, avg > 50ms → cross-country, otherwise regional.
    pub fn from_avg_latency(avg_ms: Millis) -> Self {
        if avg_ms < 2.0 {
            DistanceClass::SameRegion
        } else if avg_ms > 50.0 {
            DistanceClass::CrossCountry
        } else {
            DistanceClass::Regional
        }
    }
}

impl fmt::Display for DistanceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistanceClass::SameRegion => write!(f, "same-region"),
            DistanceClass::Regional => write!(f, "regional"),
            DistanceClass::CrossCountry => write!(f, "cross-country"),
        }
    }
}

impl FromStr for DistanceClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "same-region" => Ok(DistanceClass::SameRegion),
            "regional" => Ok(DistanceClass::Regional),
            "cross-country" => Ok(DistanceClass::CrossCountry),
            other => Err(format!("Unknown distance class: {}", other)),
        }
    }
}

/// Layer (or pair of layers) an insight refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerLink {
    L3,
    L4,
    L7,
    #[serde(rename = "L3→L4")]
    L3ToL4,
    #[serde(rename = "L4→L7")]
    L4ToL7,
    #[serde(rename = "L3→L7")]
    EndToEnd,
}

impl fmt::Display for LayerLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LayerLink::L3 => "L3",
            LayerLink::L4 => "L4",
            LayerLink::L7 => "L7",
            LayerLink::L3ToL4 => "L3→L4",
            LayerLink::L4ToL7 => "L4→L7",
            LayerLink::EndToEnd => "L3→L7",
        };
        write!(f, "{}", s)
    }
}

/// The four HTTP phases TCP events are bucketed into, in timeline order.
///
/// DNS time is part of the timeline but has no bucket of its own: events
/// seen before the TCP handshake ends are attributed to the handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HttpPhase {
    TcpHandshake,
    TlsNegotiation,
    ServerProcessing,
    ContentDownload,
}

impl HttpPhase {
    pub const ALL: [HttpPhase; 4] = [
        HttpPhase::TcpHandshake,
        HttpPhase::TlsNegotiation,
        HttpPhase::ServerProcessing,
        HttpPhase::ContentDownload,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HttpPhase::TcpHandshake => "tcp_handshake",
            HttpPhase::TlsNegotiation => "tls_negotiation",
            HttpPhase::ServerProcessing => "server_processing",
            HttpPhase::ContentDownload => "content_download",
        }
    }
}

impl fmt::Display for HttpPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connection quality score derived from packet capture counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionScore {
    Excellent,
    Good,
    Fair,
    Poor,
    #[default]
    Unknown,
}

impl FromStr for ConnectionScore {
    type Err = String;

    /// Case-insensitive; tools and older reports mix "EXCELLENT" and "excellent".
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "excellent" => Ok(ConnectionScore::Excellent),
            "good" => Ok(ConnectionScore::Good),
            "fair" => Ok(ConnectionScore::Fair),
            "poor" => Ok(ConnectionScore::Poor),
            "unknown" | "" => Ok(ConnectionScore::Unknown),
            other => Err(format!("Unknown connection quality score: {}", other)),
        }
    }
}

impl fmt::Display for ConnectionScore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionScore::Excellent => "excellent",
            ConnectionScore::Good => "good",
            ConnectionScore::Fair => "fair",
            ConnectionScore::Poor => "poor",
            ConnectionScore::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Outcome status of a correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrelationStatus {
    Success,
    /// Phase durations were all zero or missing
    NoData,
    /// No TCP events, or no observed handshake time, were supplied
    NoTcpData,
    /// No MTR hops were supplied
    NoMtrData,
}

// ============================================================================
// Probe and target descriptors
// ============================================================================

/// Probe host the measurements were taken from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    pub provider: String,
    pub region: String,
    pub address: String,
}

/// Destination being measured.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub ip: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl Target {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.ip)
    }
}

// ============================================================================
// Measurement records
// ============================================================================

/// Treat an explicit `null` like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// ICMP ping statistics for one probe invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub target: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub packets_sent: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub packets_received: u32,
    #[serde(default)]
    pub min_ms: Option<Millis>,
    #[serde(default)]
    pub avg_ms: Option<Millis>,
    #[serde(default)]
    pub max_ms: Option<Millis>,
    #[serde(default)]
    pub stddev_ms: Option<Millis>,
}

impl PingResult {
    /// Received count clamped to sent.
    pub fn received(&self) -> u32 {
        self.packets_received.min(self.packets_sent)
    }

    /// Packet loss in [0, 100]; 0 when nothing was sent.
    pub fn loss_pct(&self) -> f64 {
        if self.packets_sent == 0 {
            return 0.0;
        }
        let lost = self.packets_sent - self.received();
        lost as f64 / self.packets_sent as f64 * 100.0
    }

    /// max − min, when both are present.
    pub fn jitter_range_ms(&self) -> Option<Millis> {
        match (self.min_ms, self.max_ms) {
            (Some(min), Some(max)) => Some((max - min).max(0.0)),
            _ => None,
        }
    }
}

/// One hop of an MTR report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MtrHop {
    #[serde(default, deserialize_with = "null_as_default")]
    pub hop: u32,
    /// IP or "???" when unresolved
    #[serde(default = "unresolved_host", deserialize_with = "null_as_unresolved")]
    pub host: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub loss_pct: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub packets_sent: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub packets_received: u32,
    #[serde(default)]
    pub last_ms: Option<Millis>,
    #[serde(default)]
    pub avg_ms: Option<Millis>,
    #[serde(default)]
    pub best_ms: Option<Millis>,
    #[serde(default)]
    pub worst_ms: Option<Millis>,
    #[serde(default)]
    pub stddev_ms: Option<Millis>,
}

fn unresolved_host() -> String {
    "???".to_string()
}

fn null_as_unresolved<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::deserialize(deserializer)?.unwrap_or_else(unresolved_host))
}

impl MtrHop {
    /// Average latency, absent or negative treated as 0.
    pub fn avg(&self) -> Millis {
        self.avg_ms.filter(|v| v.is_finite()).unwrap_or(0.0).max(0.0)
    }

    /// True when best ≤ avg ≤ worst is violated (only checked if all three are present).
    pub fn has_inconsistent_stats(&self) -> bool {
        match (self.best_ms, self.avg_ms, self.worst_ms) {
            (Some(best), Some(avg), Some(worst)) => avg < best || avg > worst,
            _ => false,
        }
    }
}

/// Per-request HTTP timing breakdown.
///
/// Absent phases are 0 (curl reports 0 for a phase that did not happen,
/// e.g. TLS on plain HTTP). `total_ms` is absent when the tool gave no total.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpPhaseTimings {
    #[serde(default, deserialize_with = "null_as_default")]
    pub dns_lookup_ms: Millis,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tcp_handshake_ms: Millis,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tls_handshake_ms: Millis,
    #[serde(default, deserialize_with = "null_as_default")]
    pub server_processing_ms: Millis,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content_download_ms: Millis,
    #[serde(default)]
    pub total_ms: Option<Millis>,
}

impl HttpPhaseTimings {
    pub fn phase_sum(&self) -> Millis {
        self.dns_lookup_ms
            + self.tcp_handshake_ms
            + self.tls_handshake_ms
            + self.server_processing_ms
            + self.content_download_ms
    }

    /// |sum − total| / total × 100, when a positive total is known.
    pub fn sum_deviation_pct(&self) -> Option<f64> {
        let total = self.total_ms.filter(|t| *t > 0.0)?;
        Some((self.phase_sum() - total).abs() / total * 100.0)
    }
}

/// One curl sample, as produced by the curl timing parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSample {
    #[serde(default, deserialize_with = "null_as_default")]
    pub success: bool,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timings: HttpPhaseTimings,
    #[serde(default, deserialize_with = "null_as_default")]
    pub size_bytes: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub speed_bps: u64,
    #[serde(default)]
    pub remote_ip: Option<String>,
}

/// min/avg/max/median over a set of samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseStat {
    pub min: Millis,
    pub max: Millis,
    pub avg: Millis,
    pub median: Millis,
}

/// Aggregated HTTP statistics over several samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HttpStatistics {
    #[serde(default, deserialize_with = "null_as_default")]
    pub samples: usize,
    #[serde(default, deserialize_with = "null_as_default")]
    pub success_rate: f64,
    #[serde(default)]
    pub total: Option<PhaseStat>,
    #[serde(default)]
    pub dns_lookup: Option<PhaseStat>,
    #[serde(default)]
    pub tcp_handshake: Option<PhaseStat>,
    #[serde(default)]
    pub tls_handshake: Option<PhaseStat>,
    #[serde(default)]
    pub server_processing: Option<PhaseStat>,
    #[serde(default)]
    pub content_download: Option<PhaseStat>,
    #[serde(default)]
    pub status_code: Option<u16>,
    #[serde(default)]
    pub remote_ip: Option<String>,
}

impl HttpStatistics {
    /// Average per-phase timings, used as the phase boundaries for correlation.
    pub fn avg_timings(&self) -> HttpPhaseTimings {
        let avg = |s: &Option<PhaseStat>| s.map(|s| s.avg).unwrap_or(0.0);
        HttpPhaseTimings {
            dns_lookup_ms: avg(&self.dns_lookup),
            tcp_handshake_ms: avg(&self.tcp_handshake),
            tls_handshake_ms: avg(&self.tls_handshake),
            server_processing_ms: avg(&self.server_processing),
            content_download_ms: avg(&self.content_download),
            total_ms: self.total.map(|s| s.avg),
        }
    }
}

/// A single transport-layer event from capture analysis.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TcpEvent {
    /// Offset from request start; events without one are not bucketed
    #[serde(default)]
    pub relative_time_ms: Option<Millis>,
    #[serde(default)]
    pub src: Option<String>,
    #[serde(default)]
    pub dst: Option<String>,
    #[serde(default)]
    pub flags: Option<String>,
    #[serde(default)]
    pub seq: Option<u64>,
    #[serde(default)]
    pub ack: Option<u64>,
    #[serde(default)]
    pub window_size: Option<u32>,
    #[serde(default)]
    pub length: Option<u64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_retransmission: bool,
}

/// Packet-capture counters summarised by the capture analyser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketSummary {
    #[serde(deserialize_with = "null_as_default")]
    pub quality_score: ConnectionScore,
    #[serde(deserialize_with = "null_as_default")]
    pub total_packets: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub retransmissions: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub duplicate_acks: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub out_of_order: u64,
    #[serde(deserialize_with = "null_as_default")]
    pub sack_events: u64,
    /// SYN without ACK
    #[serde(deserialize_with = "null_as_default")]
    pub connection_attempts: u64,
    /// SYN-ACK
    #[serde(deserialize_with = "null_as_default")]
    pub successful_connections: u64,
    /// FIN
    #[serde(deserialize_with = "null_as_default")]
    pub graceful_closes: u64,
    /// RST
    #[serde(deserialize_with = "null_as_default")]
    pub forced_closes: u64,
}

impl PacketSummary {
    pub fn retransmission_rate_pct(&self) -> f64 {
        ratio_pct(self.retransmissions, self.total_packets)
    }

    /// None when no SYN was observed.
    pub fn connection_success_rate_pct(&self) -> Option<f64> {
        if self.connection_attempts == 0 {
            None
        } else {
            Some(ratio_pct(self.successful_connections, self.connection_attempts))
        }
    }
}

/// Kernel connection-tracking table snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConntrackSnapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub count: u64,
    /// 0 when the table size is unknown
    #[serde(default, deserialize_with = "null_as_default")]
    pub max: u64,
}

/// Everything measured for one (host, target) pair. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Measurements {
    pub ping: Option<PingResult>,
    pub mtr: Option<Vec<MtrHop>>,
    pub http: Option<HttpStatistics>,
    pub tcp_events: Option<Vec<TcpEvent>>,
    pub packets: Option<PacketSummary>,
    pub conntrack: Option<ConntrackSnapshot>,
}

// ============================================================================
// Correlation outputs
// ============================================================================

/// Per-phase bucket statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseStats {
    pub duration_ms: Millis,
    pub event_count: usize,
    pub retransmissions: usize,
    pub retransmission_rate_pct: f64,
    pub bytes: u64,
}

/// Window size observation, tagged with the phase it fell in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowSample {
    pub time_ms: Millis,
    pub phase: HttpPhase,
    pub window_size: u32,
}

/// TCP events mapped onto HTTP phases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseCorrelation {
    pub status: CorrelationStatus,
    pub phases: BTreeMap<HttpPhase, PhaseStats>,
    pub total_bytes: u64,
    pub window_evolution: Vec<WindowSample>,
    /// Events after the request completed
    pub events_after_completion: usize,
}

impl PhaseCorrelation {
    pub fn retransmissions_in(&self, phase: HttpPhase) -> usize {
        self.phases.get(&phase).map(|p| p.retransmissions).unwrap_or(0)
    }

    pub fn total_retransmissions(&self) -> usize {
        self.phases.values().map(|p| p.retransmissions).sum()
    }
}

/// A hop that adds significant latency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContributingHop {
    pub hop_number: u32,
    pub host: String,
    pub latency_ms: Millis,
    pub loss_pct: f64,
}

/// MTR-predicted RTT vs observed TCP handshake time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathTransportCorrelation {
    pub status: CorrelationStatus,
    pub mtr_predicted_rtt_ms: Millis,
    pub tcp_actual_rtt_ms: Millis,
    pub variance_ms: Millis,
    pub variance_pct: f64,
    pub contributing_hops: Vec<ContributingHop>,
}

// ============================================================================
// Layered analysis output
// ============================================================================

/// A severity-tagged finding. Order in a report is detection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Insight {
    pub severity: Severity,
    pub layers: LayerLink,
    pub message: String,
}

impl Insight {
    pub fn new(severity: Severity, layers: LayerLink, message: impl Into<String>) -> Self {
        Self {
            severity,
            layers,
            message: message.into(),
        }
    }
}

/// ICMP view of layer 3.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcmpSummary {
    pub avg_ms: Option<Millis>,
    pub min_ms: Option<Millis>,
    pub max_ms: Option<Millis>,
    pub jitter_ms: Option<Millis>,
    pub packet_loss_pct: f64,
    pub distance_class: Option<DistanceClass>,
    pub latency_grade: Grade,
    pub latency_severity: Severity,
    pub loss_severity: Severity,
    pub jitter_severity: Option<Severity>,
}

/// Path quality from the MTR view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathQuality {
    Excellent,
    Good,
    Acceptable,
    Unstable,
    Fair,
    Poor,
    Unknown,
}

impl fmt::Display for PathQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PathQuality::Excellent => "excellent",
            PathQuality::Good => "good",
            PathQuality::Acceptable => "acceptable",
            PathQuality::Unstable => "unstable",
            PathQuality::Fair => "fair",
            PathQuality::Poor => "poor",
            PathQuality::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Why a hop was flagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HopIssue {
    HighPacketLoss,
    LatencySpike,
    InconsistentStats,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProblematicHop {
    pub hop: u32,
    pub host: String,
    pub issue: HopIssue,
    /// Loss % for packet loss, latency increase (ms) for spikes, avg for inconsistent stats
    pub value: f64,
}

/// Summary of an MTR hop list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathSummary {
    pub hop_count: usize,
    pub final_hop: Option<MtrHop>,
    pub max_hop_latency_ms: Millis,
    pub problematic_hops: Vec<ProblematicHop>,
    pub path_quality: PathQuality,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer3Analysis {
    pub quality: Quality,
    pub icmp: Option<IcmpSummary>,
    pub path: Option<PathSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub quality_score: ConnectionScore,
    pub total_packets: u64,
    pub retransmissions: u64,
    pub duplicate_acks: u64,
    pub out_of_order: u64,
    pub retransmission_rate_pct: f64,
    pub connection_success_rate_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer4Analysis {
    pub quality: Quality,
    pub connection: Option<ConnectionMetrics>,
}

/// Share of total request time spent in each phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseBreakdown {
    pub dns_pct: f64,
    pub tcp_pct: f64,
    pub tls_pct: f64,
    pub server_pct: f64,
    pub download_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer7Analysis {
    pub quality: Quality,
    pub http: Option<HttpPhaseTimings>,
    pub phase_breakdown: Option<PhaseBreakdown>,
}

/// Unified L3/L4/L7 diagnosis for one (host, target) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayeredAnalysis {
    pub host_id: String,
    pub target_ip: String,
    pub layer3: Layer3Analysis,
    pub layer4: Layer4Analysis,
    pub layer7: Layer7Analysis,
    pub phase_correlation: PhaseCorrelation,
    pub path_correlation: PathTransportCorrelation,
    pub insights: Vec<Insight>,
    pub overall_grade: Grade,
    pub summary: String,
}

/// Percentage helper: 0 when the denominator is 0.
pub(crate) fn ratio_pct(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loss_pct() {
        let ping = PingResult {
            target: "10.0.0.1".into(),
            packets_sent: 20,
            packets_received: 19,
            min_ms: None,
            avg_ms: None,
            max_ms: None,
            stddev_ms: None,
        };
        assert!((ping.loss_pct() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_loss_pct_clamps_received_above_sent() {
        let ping = PingResult {
            target: "10.0.0.1".into(),
            packets_sent: 4,
            packets_received: 9,
            min_ms: None,
            avg_ms: None,
            max_ms: None,
            stddev_ms: None,
        };
        assert_eq!(ping.loss_pct(), 0.0);

        let nothing_sent = PingResult { packets_sent: 0, packets_received: 0, ..ping };
        assert_eq!(nothing_sent.loss_pct(), 0.0);
    }

    #[test]
    fn test_grade_serializes_as_letter() {
        assert_eq!(serde_json::to_string(&Grade::APlus).unwrap(), "\"A+\"");
        assert_eq!(serde_json::to_string(&Grade::Unknown).unwrap(), "\"unknown\"");
        assert_eq!(Grade::APlus.to_string(), "A+");
    }

    #[test]
    fn test_layer_link_serialization() {
        assert_eq!(serde_json::to_string(&LayerLink::L3ToL4).unwrap(), "\"L3→L4\"");
        let parsed: LayerLink = serde_json::from_str("\"L4→L7\"").unwrap();
        assert_eq!(parsed, LayerLink::L4ToL7);
    }

    #[test]
    fn test_connection_score_is_case_insensitive() {
        assert_eq!("EXCELLENT".parse::<ConnectionScore>().unwrap(), ConnectionScore::Excellent);
        assert_eq!(" Good ".parse::<ConnectionScore>().unwrap(), ConnectionScore::Good);
        assert!("superb".parse::<ConnectionScore>().is_err());
    }

    #[test]
    fn test_distance_class_heuristic() {
        assert_eq!(DistanceClass::from_avg_latency(1.5), DistanceClass::SameRegion);
        assert_eq!(DistanceClass::from_avg_latency(2.0), DistanceClass::Regional);
        assert_eq!(DistanceClass::from_avg_latency(50.0), DistanceClass::Regional);
        assert_eq!(DistanceClass::from_avg_latency(50.1), DistanceClass::CrossCountry);
        assert_eq!("cross_country".parse::<DistanceClass>().unwrap(), DistanceClass::CrossCountry);
    }

    #[test]
    fn test_mtr_hop_inconsistent_stats() {
        let hop = MtrHop {
            hop: 1,
            host: "10.0.0.1".into(),
            loss_pct: 0.0,
            packets_sent: 10,
            packets_received: 10,
            last_ms: Some(1.0),
            avg_ms: Some(9.0),
            best_ms: Some(1.0),
            worst_ms: Some(5.0),
            stddev_ms: Some(0.5),
        };
        assert!(hop.has_inconsistent_stats());
        let partial = MtrHop { worst_ms: None, ..hop };
        assert!(!partial.has_inconsistent_stats());
    }

    #[test]
    fn test_http_sum_deviation() {
        let timings = HttpPhaseTimings {
            dns_lookup_ms: 5.0,
            tcp_handshake_ms: 10.0,
            tls_handshake_ms: 15.0,
            server_processing_ms: 20.0,
            content_download_ms: 50.0,
            total_ms: Some(80.0),
        };
        assert!((timings.sum_deviation_pct().unwrap() - 25.0).abs() < 1e-9);
        let no_total = HttpPhaseTimings { total_ms: None, ..timings };
        assert!(no_total.sum_deviation_pct().is_none());
    }
}
