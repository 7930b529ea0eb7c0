//! curl `-w` timing output parsing.

use std::collections::HashMap;

use super::{parse_number, IngestError};
use crate::analysis::types::{HttpPhaseTimings, HttpSample};

/// The `--write-out` format this parser understands.
pub const CURL_WRITE_OUT_FORMAT: &str = "time_namelookup:%{time_namelookup}\\n\
time_connect:%{time_connect}\\n\
time_appconnect:%{time_appconnect}\\n\
time_starttransfer:%{time_starttransfer}\\n\
time_total:%{time_total}\\n\
http_code:%{http_code}\\n\
size_download:%{size_download}\\n\
speed_download:%{speed_download}\\n\
remote_ip:%{remote_ip}\\n";

const KNOWN_KEYS: [&str; 9] = [
    "time_namelookup",
    "time_connect",
    "time_appconnect",
    "time_starttransfer",
    "time_total",
    "http_code",
    "size_download",
    "speed_download",
    "remote_ip",
];

/// Parse one curl sample. Lines that are not `key:value` pairs for a known
/// key (e.g. `-v` chatter on the same stream) are ignored.
///
/// Phase durations are derived from curl's cumulative timestamps:
/// tcp = connect − dns, tls = appconnect − connect (0 without TLS),
/// server = starttransfer − (appconnect or connect), download = total − starttransfer.
pub fn parse_curl_timing(output: &str) -> Result<HttpSample, IngestError> {
    let fields: HashMap<&str, &str> = output
        .lines()
        .filter_map(|line| line.trim().split_once(':'))
        .filter(|(key, _)| KNOWN_KEYS.contains(key))
        .map(|(key, value)| (key, value.trim()))
        .collect();

    let seconds = |key: &'static str| -> Result<f64, IngestError> {
        match fields.get(key) {
            Some(value) => parse_number::<f64>(key, value).map(|s| s * 1000.0),
            None => Ok(0.0),
        }
    };

    if !fields.contains_key("time_total") {
        return Err(IngestError::MissingCurlField("time_total"));
    }

    let dns = seconds("time_namelookup")?;
    let connect = seconds("time_connect")?;
    let appconnect = seconds("time_appconnect")?;
    let start_transfer = seconds("time_starttransfer")?;
    let total = seconds("time_total")?;

    let handshake_done = if appconnect > 0.0 { appconnect } else { connect };
    let timings = HttpPhaseTimings {
        dns_lookup_ms: non_negative("dns_lookup", dns),
        tcp_handshake_ms: non_negative("tcp_handshake", connect - dns),
        tls_handshake_ms: if appconnect > 0.0 {
            non_negative("tls_handshake", appconnect - connect)
        } else {
            0.0
        },
        server_processing_ms: non_negative("server_processing", start_transfer - handshake_done),
        content_download_ms: non_negative("content_download", total - start_transfer),
        total_ms: Some(total),
    };

    let status_code = match fields.get("http_code") {
        Some(code) => Some(parse_number::<u16>("http_code", code)?).filter(|c| *c != 0),
        None => None,
    };
    let size_bytes = match fields.get("size_download") {
        Some(size) => parse_number::<f64>("size_download", size)? as u64,
        None => 0,
    };
    let speed_bps = match fields.get("speed_download") {
        Some(speed) => parse_number::<f64>("speed_download", speed)? as u64,
        None => 0,
    };
    let remote_ip = fields
        .get("remote_ip")
        .filter(|ip| !ip.is_empty())
        .map(|ip| ip.to_string());

    Ok(HttpSample {
        success: status_code.is_some(),
        status_code,
        timings,
        size_bytes,
        speed_bps,
        remote_ip,
    })
}

fn non_negative(phase: &str, value: f64) -> f64 {
    if value < 0.0 {
        log::debug!("curl reported negative {} duration ({:.3}ms), clamping", phase, value);
        0.0
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTTPS: &str = "\
time_namelookup:0.004
time_connect:0.014
time_appconnect:0.045
time_starttransfer:0.090
time_total:0.100
http_code:200
size_download:1256
speed_download:12560.000
remote_ip:93.184.216.34
";

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_parse_https_sample() {
        let sample = parse_curl_timing(HTTPS).unwrap();
        assert!(sample.success);
        assert_eq!(sample.status_code, Some(200));
        assert!(approx(sample.timings.dns_lookup_ms, 4.0));
        assert!(approx(sample.timings.tcp_handshake_ms, 10.0));
        assert!(approx(sample.timings.tls_handshake_ms, 31.0));
        assert!(approx(sample.timings.server_processing_ms, 45.0));
        assert!(approx(sample.timings.content_download_ms, 10.0));
        assert!(approx(sample.timings.total_ms.unwrap(), 100.0));
        assert_eq!(sample.size_bytes, 1256);
        assert_eq!(sample.remote_ip.as_deref(), Some("93.184.216.34"));
    }

    #[test]
    fn test_plain_http_has_no_tls_phase() {
        let output = "time_namelookup:0.002\ntime_connect:0.012\ntime_appconnect:0.000\n\
                      time_starttransfer:0.050\ntime_total:0.060\nhttp_code:301\n";
        let sample = parse_curl_timing(output).unwrap();
        assert_eq!(sample.timings.tls_handshake_ms, 0.0);
        assert!(approx(sample.timings.server_processing_ms, 38.0));
    }

    #[test]
    fn test_verbose_noise_and_ipv6() {
        let output = "* Connected to example.com\n< HTTP/2 200\ntime_total:0.010\nhttp_code:200\nremote_ip:2606:2800:220:1::1\n";
        let sample = parse_curl_timing(output).unwrap();
        assert_eq!(sample.remote_ip.as_deref(), Some("2606:2800:220:1::1"));
    }

    #[test]
    fn test_failed_request() {
        let sample = parse_curl_timing("time_total:5.000\nhttp_code:000\n").unwrap();
        assert!(!sample.success);
        assert!(sample.status_code.is_none());
    }

    #[test]
    fn test_missing_total_is_an_error() {
        assert!(matches!(
            parse_curl_timing("http_code:200\n"),
            Err(IngestError::MissingCurlField("time_total"))
        ));
    }
}
