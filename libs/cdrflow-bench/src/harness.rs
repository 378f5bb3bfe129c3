use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use cdrflow_api::{CallRecord, RateZoneTable, RecordGenerator, StageConfig, StageSet};
use cdrflow_engine::{RunContext, Topology, recv_or_cancel, send_or_cancel};

use crate::alloc::{AllocSnapshot, tracking_active};
use crate::error::BenchError;
use crate::report::BenchReport;
use crate::sampler::ConcurrencySampler;
use crate::validator::RecordValidator;

#[derive(Debug, Clone)]
pub struct BenchOptions {
    pub iterations: u64,
    pub sample_interval: Duration,
    /// Fixed generator seed; `None` seeds from the OS.
    pub seed: Option<u64>,
    /// Check every drained record, not only the count.
    pub validate: bool,
}

impl Default for BenchOptions {
    fn default() -> Self {
        Self {
            iterations: 10_000,
            sample_interval: Duration::from_millis(1),
            seed: None,
            validate: false,
        }
    }
}

pub async fn run_benchmark(
    topology: &dyn Topology,
    stage_config: &StageConfig,
    opts: &BenchOptions,
    token: &CancellationToken,
) -> Result<BenchReport, BenchError> {
    run_benchmark_with_sink(topology, stage_config, opts, token, |_| {}).await
}

/// Drive `topology` with `opts.iterations` generated records and measure it.
///
/// Every drained record is passed to `sink` before it is dropped. Cancelling
/// `token` before all records drain ends the run with
/// [`BenchError::Interrupted`]; a drained count
/// different from the injected count ends it with [`BenchError::DataLoss`].
pub async fn run_benchmark_with_sink<F>(
    topology: &dyn Topology,
    stage_config: &StageConfig,
    opts: &BenchOptions,
    token: &CancellationToken,
    mut sink: F,
) -> Result<BenchReport, BenchError>
where
    F: FnMut(&CallRecord),
{
    stage_config.validate()?;
    let n = opts.iterations;
    if !tracking_active() {
        tracing::debug!("counting allocator not installed, memory metrics will read 0");
    }

    // Общие read-only данные строим до замера памяти архитектуры.
    let table = Arc::new(RateZoneTable::build(stage_config.rate_zone_keys));
    let stages = Arc::new(StageSet::build(stage_config, table)?);
    let validator = opts.validate.then(|| Arc::new(RecordValidator::new()));

    // ═══════════════════════════════════════════════════════════════
    //  Startup: static architecture memory
    // ═══════════════════════════════════════════════════════════════

    let run_token = token.child_token();
    let ctx = RunContext::new(stages, run_token.clone());

    let before_start = AllocSnapshot::now();
    let (input_tx, input_rx) = mpsc::channel::<CallRecord>(1);
    let mut output = topology.start(&ctx, input_rx);
    let after_start = AllocSnapshot::now();
    let arch_mem_bytes = after_start.live_growth_since(&before_start);

    tracing::info!(
        topology = topology.name(),
        config = %topology.describe(),
        iterations = n,
        arch_mem_bytes,
        live_tasks = ctx.live_tasks(),
        "benchmark started"
    );

    // ═══════════════════════════════════════════════════════════════
    //  Measured loop
    // ═══════════════════════════════════════════════════════════════

    let sampler = ConcurrencySampler::spawn(ctx.tracker.clone(), opts.sample_interval, &run_token);

    let loop_start = AllocSnapshot::now();
    let started = Instant::now();

    let feeder = {
        let token = run_token.clone();
        let validator = validator.clone();
        let generator = match opts.seed {
            Some(seed) => RecordGenerator::with_seed(n, seed),
            None => RecordGenerator::new(n),
        };
        tokio::spawn(async move {
            let mut sent = 0u64;
            for record in generator {
                if let Some(validator) = &validator {
                    validator.register(&record);
                }
                if !send_or_cancel(&input_tx, record, &token).await {
                    break;
                }
                sent += 1;
            }
            // dropping input_tx closes the topology's input
            sent
        })
    };

    let mut received = 0u64;
    let mut failure = None;
    while let Some(record) = recv_or_cancel(&mut output, &run_token).await {
        if let Some(validator) = &validator {
            if let Err(e) = validator.check(&record) {
                failure = Some(e);
                break;
            }
        }
        sink(&record);
        received += 1;
    }

    let elapsed = started.elapsed();
    let loop_end = AllocSnapshot::now();
    // A cancel that lands after the last record drained does not void the run.
    let interrupted = token.is_cancelled() && received < n;

    // ═══════════════════════════════════════════════════════════════
    //  Teardown
    // ═══════════════════════════════════════════════════════════════

    let (peak_concurrency, concurrency_samples) = sampler.stop().await;
    run_token.cancel();
    drop(output);
    ctx.shutdown().await;
    let sent = match feeder.await {
        Ok(sent) => sent,
        Err(e) => {
            tracing::warn!(error = %e, "record feeder ended abnormally");
            0
        }
    };

    if interrupted {
        tracing::warn!(topology = topology.name(), sent, received, "benchmark interrupted");
        return Err(BenchError::Interrupted { sent, received });
    }
    if let Some(e) = failure {
        tracing::error!(topology = topology.name(), error = %e, "record validation failed");
        return Err(e);
    }
    if received != n {
        tracing::error!(topology = topology.name(), sent = n, received, "data loss detected");
        return Err(BenchError::DataLoss { sent: n, received });
    }

    let report = BenchReport {
        topology: topology.name().to_string(),
        description: topology.describe(),
        iterations: n,
        elapsed,
        throughput: BenchReport::throughput_of(n, elapsed),
        peak_concurrency,
        concurrency_samples,
        arch_mem_bytes,
        bytes_per_op: BenchReport::per_op(loop_end.bytes_allocated_since(&loop_start), n),
        allocs_per_op: BenchReport::per_op(loop_end.allocations_since(&loop_start), n),
        validated: opts.validate,
    };

    tracing::info!(
        topology = topology.name(),
        elapsed_ms = elapsed.as_millis() as u64,
        throughput = report.throughput,
        peak_concurrency,
        "benchmark finished"
    );
    Ok(report)
}
