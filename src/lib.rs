//! # netdiag - Layered network diagnostics for multi-cloud probes
//!
//! This library turns raw per-layer network measurements taken from remote
//! probe hosts into a single cross-layer diagnosis per (host, target) pair.
//!
//! ## Overview
//!
//! A probe host runs standard tools against a target: ICMP ping and MTR for
//! the network path (L3), a packet capture for TCP behaviour (L4) and timed
//! HTTP requests (L7). The analysis engine grades each layer, maps TCP events
//! onto HTTP phases, compares the MTR-predicted round trip with the observed
//! TCP handshake, and emits severity-tagged insights plus an overall grade.
//!
//! ## Architecture
//!
//! - `analysis`: the pure analysis engine (grader, correlators, aggregator)
//! - `ingest`: parsers for ping, mtr, curl and tcpdump output
//! - `orchestrator`: diagnostic units over a pluggable `MeasurementSource`
//! - `bundle`: offline analysis of pre-collected measurements
//! - `report`: JSON and text reports
//! - `config` / `config_loader`: YAML configuration and file loading
//!
//! ## Example Usage
//!
//! ```rust
//! use netdiag::analysis::{analyze_layers, Grade, Host, Measurements, PingResult, Target};
//! use netdiag::config::AnalysisConfig;
//!
//! let host = Host {
//!     id: "aws-use1".into(),
//!     provider: "aws".into(),
//!     region: "us-east-1".into(),
//!     address: "198.51.100.7".into(),
//! };
//! let target = Target { ip: "10.1.0.5".into(), url: None, name: None };
//! let measurements = Measurements {
//!     ping: Some(PingResult {
//!         target: "10.1.0.5".into(),
//!         packets_sent: 20,
//!         packets_received: 20,
//!         min_ms: Some(0.3),
//!         avg_ms: Some(0.4),
//!         max_ms: Some(0.6),
//!         stddev_ms: Some(0.05),
//!     }),
//!     ..Measurements::default()
//! };
//!
//! let analysis = analyze_layers(&host, &target, &measurements, &AnalysisConfig::default());
//! assert_eq!(analysis.overall_grade, Grade::APlus);
//! ```
//!
//! ## Error Handling
//!
//! The analysis engine never fails: missing or malformed measurements show up
//! as `unknown` layers and `no_data` statuses. Parsers and collaborators use
//! typed `thiserror` errors; file loading and the CLI use `color_eyre`.

pub mod config;
pub mod config_loader;
pub mod analysis;
pub mod ingest;
pub mod orchestrator;
pub mod bundle;
pub mod report;
