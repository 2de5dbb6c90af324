//! Nearest-rank latency statistics.

use std::fmt;

use serde::Serialize;

use crate::driver::Sample;

/// Index of the `p`th percentile in a sorted sequence of length `n`.
///
/// Nearest-rank: `min(n - 1, ceil(p / 100 * n) - 1)`, never interpolated.
/// Always within `0..n` for `n >= 1`; `p` at or below zero maps to the
/// first element.
pub fn percentile_index(n: usize, p: f64) -> usize {
    if n == 0 {
        return 0;
    }
    let rank = (p / 100.0 * n as f64).ceil();
    let rank = if rank.is_nan() || rank < 1.0 {
        1
    } else if rank >= n as f64 {
        n
    } else {
        rank as usize
    };
    rank - 1
}

/// The `p`th percentile of an ascending slice, or `None` if it is empty.
pub fn percentile(sorted: &[f64], p: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    Some(sorted[percentile_index(sorted.len(), p)])
}

/// Summary of the post-warmup samples of one run, in microseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    pub samples: usize,
    pub min_us: f64,
    pub p50_us: f64,
    pub p90_us: f64,
    pub p99_us: f64,
    pub max_us: f64,
    pub avg_us: f64,
}

impl Summary {
    /// Summarise RTT samples. Returns `None` when there are none.
    pub fn from_samples(samples: &[Sample]) -> Option<Self> {
        Self::from_micros(samples.iter().map(Sample::micros).collect())
    }

    /// Summarise raw microsecond values. Returns `None` when empty.
    pub fn from_micros(mut values: Vec<f64>) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        values.sort_by(f64::total_cmp);

        let n = values.len();
        let sum: f64 = values.iter().sum();
        Some(Self {
            samples: n,
            min_us: values[0],
            p50_us: values[percentile_index(n, 50.0)],
            p90_us: values[percentile_index(n, 90.0)],
            p99_us: values[percentile_index(n, 99.0)],
            max_us: values[n - 1],
            avg_us: sum / n as f64,
        })
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Samples: {}", self.samples)?;
        writeln!(f, "min: {:.2} µs", self.min_us)?;
        writeln!(f, "p50: {:.2} µs", self.p50_us)?;
        writeln!(f, "p90: {:.2} µs", self.p90_us)?;
        writeln!(f, "p99: {:.2} µs", self.p99_us)?;
        writeln!(f, "max: {:.2} µs", self.max_us)?;
        write!(f, "avg: {:.2} µs", self.avg_us)
    }
}

/// Human-readable report, including the zero-sample case.
pub fn format_report(summary: Option<&Summary>) -> String {
    match summary {
        Some(summary) => summary.to_string(),
        None => "Samples: 0\nno data".to_string(),
    }
}
