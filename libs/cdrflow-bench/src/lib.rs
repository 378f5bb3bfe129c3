//! Benchmark harness: drives a topology with generated records and measures it.

pub mod alloc;
pub mod error;
pub mod harness;
pub mod report;
pub mod sampler;
pub mod validator;

pub use alloc::{AllocSnapshot, CountingAllocator};
pub use error::BenchError;
pub use harness::{BenchOptions, run_benchmark, run_benchmark_with_sink};
pub use report::BenchReport;
pub use sampler::ConcurrencySampler;
pub use validator::RecordValidator;
