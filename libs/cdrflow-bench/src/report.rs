use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Metrics of one completed benchmark run.
#[derive(Debug, Clone, Serialize)]
pub struct BenchReport {
    pub topology: String,
    pub description: String,
    pub iterations: u64,
    #[serde(serialize_with = "as_millis")]
    pub elapsed: Duration,
    pub throughput: f64,
    pub peak_concurrency: usize,
    pub concurrency_samples: usize,
    pub arch_mem_bytes: u64,
    pub bytes_per_op: u64,
    pub allocs_per_op: u64,
    pub validated: bool,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

impl BenchReport {
    /// Items per second; 0 for an empty or instantaneous run.
    pub fn throughput_of(iterations: u64, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if iterations == 0 || secs == 0.0 { 0.0 } else { iterations as f64 / secs }
    }

    pub fn per_op(total: u64, iterations: u64) -> u64 {
        if iterations == 0 { 0 } else { total / iterations }
    }

    /// Column header matching the [`fmt::Display`] row layout.
    pub fn table_header() -> String {
        format!(
            "{:<10} {:>10} {:>12} {:>14} {:>8} {:>14} {:>10} {:>10}",
            "topology", "records", "elapsed_ms", "items/s", "peak", "arch_mem_B", "B/op", "allocs/op"
        )
    }
}

impl fmt::Display for BenchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<10} {:>10} {:>12.1} {:>14.1} {:>8} {:>14} {:>10} {:>10}",
            self.topology,
            self.iterations,
            self.elapsed.as_secs_f64() * 1000.0,
            self.throughput,
            self.peak_concurrency,
            self.arch_mem_bytes,
            self.bytes_per_op,
            self.allocs_per_op,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> BenchReport {
        BenchReport {
            topology: "pool".into(),
            description: "workers=600 buffer=1".into(),
            iterations: 1_000,
            elapsed: Duration::from_millis(500),
            throughput: BenchReport::throughput_of(1_000, Duration::from_millis(500)),
            peak_concurrency: 600,
            concurrency_samples: 50,
            arch_mem_bytes: 4_096,
            bytes_per_op: 0,
            allocs_per_op: 0,
            validated: false,
        }
    }

    #[test]
    fn test_throughput() {
        assert_eq!(BenchReport::throughput_of(1_000, Duration::from_millis(500)), 2_000.0);
        assert_eq!(BenchReport::throughput_of(0, Duration::from_secs(1)), 0.0);
        assert_eq!(BenchReport::throughput_of(10, Duration::ZERO), 0.0);
    }

    #[test]
    fn test_per_op() {
        assert_eq!(BenchReport::per_op(10_000, 100), 100);
        assert_eq!(BenchReport::per_op(10_000, 0), 0);
    }

    #[test]
    fn test_row_has_header_width() {
        let row = report().to_string();
        assert!(row.starts_with("pool"));
        assert!(row.contains("2000.0"));
        assert_eq!(row.len(), BenchReport::table_header().len());
    }

    #[test]
    fn test_json_elapsed_in_millis() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(json["elapsed"], 500.0);
        assert_eq!(json["peak_concurrency"], 600);
        assert_eq!(json["topology"], "pool");
    }
}
