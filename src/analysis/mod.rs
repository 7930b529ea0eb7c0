//! Layered network analysis engine.
//!
//! Pure functions over measurement records: per-metric grading, TCP-to-HTTP
//! phase correlation, MTR-to-TCP path correlation, packet quality scoring,
//! anomaly detection and the layered aggregator that ties them together.
//! Nothing in here performs I/O.

pub mod types;
pub mod grader;
pub mod phase;
pub mod path;
pub mod packet;
pub mod anomaly;
pub mod stats;
pub mod layered;

pub use types::*;
pub use grader::{grade_jitter, grade_latency, grade_packet_loss, grade_severity};
pub use phase::{correlate_tcp_to_http_phases, PhaseBoundaries};
pub use path::{assess_path_quality, correlate_mtr_to_tcp, summarize_path, SIGNIFICANT_HOP_LATENCY_MS};
pub use packet::{detect_packet_issues, l4_quality, score_connection};
pub use anomaly::{
    check_measurement_sanity, conntrack_usage_pct, detect_anomalies, detect_bufferbloat,
    grade_conntrack, BufferbloatAssessment, BufferbloatLevel,
};
pub use stats::{http_statistics, summarize_monitoring, MonitoringSummary};
pub use layered::{analyze_layers, analyze_layers_with_distance, overall_grade};
