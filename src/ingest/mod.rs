//! Parsers for raw network tool output.
//!
//! This is where text from ping, mtr, curl and tcpdump is normalised into the
//! typed measurement records the analysis engine consumes. Quality strings,
//! units (seconds → ms) and unresolved hosts are all settled here.

pub mod ping;
pub mod mtr;
pub mod curl;
pub mod tcpdump;

pub use ping::parse_ping_output;
pub use mtr::{parse_mtr_json, parse_mtr_report};
pub use curl::{parse_curl_timing, CURL_WRITE_OUT_FORMAT};
pub use tcpdump::{parse_tcpdump_capture, parse_tcpdump_timeline, Capture};

/// Raw tool output that could not be turned into a measurement record.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("No packet statistics found in ping output")]
    MissingPingStatistics,
    #[error("No hops found in MTR output")]
    NoMtrHops,
    #[error("Invalid MTR JSON: {0}")]
    InvalidMtrJson(#[from] serde_json::Error),
    #[error("Missing field in curl output: {0}")]
    MissingCurlField(&'static str),
    #[error("Invalid value for {field}: {value:?}")]
    InvalidNumber { field: String, value: String },
}

/// Parse a number captured from tool output, naming the field on failure.
pub(crate) fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, IngestError> {
    value.trim().parse().map_err(|_| IngestError::InvalidNumber {
        field: field.to_string(),
        value: value.to_string(),
    })
}
