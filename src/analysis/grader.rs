//! Per-metric grading against fixed threshold tables.
//!
//! All functions are pure and total: negative, NaN or infinite input falls
//! into the worst bucket.

use super::types::*;

/// Upper bounds (exclusive) for A+, A, B, C. Anything at or above the last
/// bound grades D.
type LatencyTable = [(Millis, Grade); 4];

const SAME_REGION: LatencyTable = [
    (2.0, Grade::APlus),
    (5.0, Grade::A),
    (15.0, Grade::B),
    (30.0, Grade::C),
];

const REGIONAL: LatencyTable = [
    (20.0, Grade::APlus),
    (40.0, Grade::A),
    (70.0, Grade::B),
    (100.0, Grade::C),
];

const CROSS_COUNTRY: LatencyTable = [
    (50.0, Grade::APlus),
    (70.0, Grade::A),
    (100.0, Grade::B),
    (150.0, Grade::C),
];

fn table_for(distance: DistanceClass) -> &'static LatencyTable {
    match distance {
        DistanceClass::SameRegion => &SAME_REGION,
        DistanceClass::Regional => &REGIONAL,
        DistanceClass::CrossCountry => &CROSS_COUNTRY,
    }
}

/// Severity implied by a letter grade.
pub fn grade_severity(grade: Grade) -> Severity {
    match grade {
        Grade::APlus | Grade::A => Severity::Ok,
        Grade::B => Severity::Low,
        Grade::C => Severity::Medium,
        Grade::D | Grade::F | Grade::Unknown => Severity::High,
    }
}

/// Grade a latency within a distance class.
pub fn grade_latency(latency_ms: Millis, distance: DistanceClass) -> (Grade, Severity) {
    if !latency_ms.is_finite() || latency_ms < 0.0 {
        return (Grade::D, Severity::High);
    }

    let grade = table_for(distance)
        .iter()
        .find(|(bound, _)| latency_ms < *bound)
        .map(|(_, grade)| *grade)
        .unwrap_or(Grade::D);

    (grade, grade_severity(grade))
}

/// 0 → ok, < 1% → low, < 5% → medium, otherwise high.
pub fn grade_packet_loss(loss_pct: f64) -> Severity {
    if !loss_pct.is_finite() || loss_pct < 0.0 {
        Severity::High
    } else if loss_pct == 0.0 {
        Severity::Ok
    } else if loss_pct < 1.0 {
        Severity::Low
    } else if loss_pct < 5.0 {
        Severity::Medium
    } else {
        Severity::High
    }
}

/// < 1ms → ok, < 5ms → low, otherwise high.
pub fn grade_jitter(stddev_ms: Millis) -> Severity {
    if !stddev_ms.is_finite() || stddev_ms < 0.0 {
        Severity::High
    } else if stddev_ms < 1.0 {
        Severity::Ok
    } else if stddev_ms < 5.0 {
        Severity::Low
    } else {
        Severity::High
    }
}
