//! Offline analysis of pre-collected measurement bundles.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::{analyze_layers_with_distance, DistanceClass, Host, LayeredAnalysis, Measurements, Target};
use crate::config::AnalysisConfig;

/// One (host, target) pair with whatever was measured for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BundleEntry {
    pub host: Host,
    pub target: Target,
    #[serde(default)]
    pub measurements: Measurements,
    /// Known distance class; the latency heuristic is used when absent
    #[serde(default)]
    pub distance: Option<DistanceClass>,
}

/// Analyse every entry in parallel. Output order follows input order.
pub fn analyze_bundle(entries: &[BundleEntry], config: &AnalysisConfig) -> Vec<LayeredAnalysis> {
    entries
        .par_iter()
        .map(|entry| {
            analyze_layers_with_distance(
                &entry.host,
                &entry.target,
                &entry.measurements,
                entry.distance,
                config,
            )
        })
        .collect()
}
